//! Series-resistance calibration against a target irradiance response.
//!
//! A bounded golden-section search over `[0, Rs_max]`; every trial
//! resistance regenerates a consistent parameter set (so the reference
//! boundary conditions keep holding) and is scored by the squared mismatch
//! between its calculated response and the target table. The search never
//! fails on an imperfect match: it returns the best candidate found and its
//! residual, leaving the quality judgement with the caller.

use thiserror::Error;
use uom::si::{electrical_resistance::ohm, f64::ElectricalResistance};

use crate::support::search::GoldenSection;

use super::{
    eir::{EirTable, TableShapeError, calculate_effective_irradiance_response},
    equation::ConvergenceError,
    generate::{GenerateConfig, ParameterGenerationError, regenerate_with_series_resistance},
    input::{ModuleRatings, OperatingPoint},
    iv_curve::CurveConfig,
    parameters::SingleDiodeParameters,
};

/// Configuration for the series-resistance search.
#[derive(Debug, Clone, Copy)]
pub struct OptimizeConfig {
    /// Maximum number of bracket reductions.
    pub max_iters: usize,

    /// Bracket tolerance as a fraction of the physical resistance bound.
    pub rs_tol_fraction: f64,

    /// Configuration for the per-trial parameter regeneration.
    pub generate: GenerateConfig,

    /// Configuration for the per-trial response calculation.
    pub curve: CurveConfig,
}

impl Default for OptimizeConfig {
    fn default() -> Self {
        Self {
            max_iters: 100,
            rs_tol_fraction: 1e-6,
            generate: GenerateConfig::default(),
            curve: CurveConfig::default(),
        }
    }
}

/// Outcome of a series-resistance calibration.
#[derive(Debug, Clone)]
pub struct OptimizeOutcome {
    /// Best parameter set found.
    pub parameters: SingleDiodeParameters,

    /// Sum of squared relative-efficiency mismatches at the target points.
    pub residual: f64,

    /// Bracket reductions performed.
    pub iters: usize,
}

/// Errors that can occur while calibrating series resistance.
#[derive(Debug, Error)]
pub enum OptimizeError {
    /// The target table has no entries to match.
    #[error("target response table is empty")]
    EmptyTarget,

    /// The calculated and target tables disagree in shape.
    #[error("response table shapes differ")]
    Table(#[from] TableShapeError),

    /// Scoring the starting parameters failed.
    #[error("response calculation failed")]
    Convergence(#[from] ConvergenceError),

    /// Regenerating the final parameters failed.
    #[error("parameter regeneration failed")]
    Generation(#[from] ParameterGenerationError),
}

/// Calibrates series resistance so the calculated response tracks a target.
///
/// The returned residual is never worse than that of the starting
/// parameters: when no trial beats the incumbent, the incumbent is returned
/// unchanged. Trial resistances whose regeneration or scoring fails are
/// skipped, not fatal.
///
/// # Errors
///
/// Returns an [`OptimizeError`] when the target is empty or shaped
/// differently than the calculated response, or when the starting
/// parameters themselves cannot be scored.
pub fn optimize_series_resistance(
    parameters: &SingleDiodeParameters,
    ratings: &ModuleRatings,
    target: &EirTable,
    config: &OptimizeConfig,
) -> Result<OptimizeOutcome, OptimizeError> {
    if target.is_empty() {
        return Err(OptimizeError::EmptyTarget);
    }

    let grid = target.grid();
    let incumbent_residual = score(parameters, &grid, target, config)?;

    let rs_max = ratings.maximum_series_resistance();
    let search = GoldenSection {
        max_iters: config.max_iters,
        x_tol: config.rs_tol_fraction * rs_max.get::<ohm>(),
    };

    let best = search.minimize(0.0, rs_max.get::<ohm>(), |rs| {
        let trial = regenerate_with_series_resistance(
            ratings,
            ElectricalResistance::new::<ohm>(rs),
            parameters.shunt,
            parameters.bandgap,
            &config.generate,
        );

        // Infeasible trials steer the search away instead of aborting it.
        let residual = trial
            .ok()
            .and_then(|trial| score(&trial, &grid, target, config).ok())
            .unwrap_or(f64::INFINITY);

        Ok::<_, OptimizeError>(residual)
    })?;

    if best.value < incumbent_residual {
        let parameters = regenerate_with_series_resistance(
            ratings,
            ElectricalResistance::new::<ohm>(best.x),
            parameters.shunt,
            parameters.bandgap,
            &config.generate,
        )?;

        Ok(OptimizeOutcome {
            parameters,
            residual: best.value,
            iters: best.iters,
        })
    } else {
        Ok(OptimizeOutcome {
            parameters: *parameters,
            residual: incumbent_residual,
            iters: best.iters,
        })
    }
}

fn score(
    parameters: &SingleDiodeParameters,
    grid: &[OperatingPoint],
    target: &EirTable,
    config: &OptimizeConfig,
) -> Result<f64, OptimizeError> {
    let calculated = calculate_effective_irradiance_response(parameters, grid, &config.curve)?;
    Ok(calculated.sum_squared_difference(target)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use uom::ConstZero;

    use crate::models::photovoltaic::module::core::test_support::{
        irradiance_sweep, reference_parameters, thin_film_ratings,
    };

    /// Builds a target table from a parameter set with a known series
    /// resistance, so the optimizer has an exactly attainable goal.
    fn attainable_target(rs_ohm: f64) -> (SingleDiodeParameters, EirTable) {
        let ratings = thin_film_ratings();
        let parameters = reference_parameters();
        let config = OptimizeConfig::default();

        let shifted = regenerate_with_series_resistance(
            &ratings,
            ElectricalResistance::new::<ohm>(rs_ohm),
            parameters.shunt,
            parameters.bandgap,
            &config.generate,
        )
        .unwrap();

        let grid = irradiance_sweep(&[1000.0, 800.0, 600.0, 400.0, 200.0]);
        let target =
            calculate_effective_irradiance_response(&shifted, &grid, &config.curve).unwrap();

        (parameters, target)
    }

    #[test]
    fn recovers_an_attainable_series_resistance() {
        let ratings = thin_film_ratings();
        let config = OptimizeConfig::default();
        let (start, target) = attainable_target(6.0);

        let outcome = optimize_series_resistance(&start, &ratings, &target, &config).unwrap();

        assert_relative_eq!(outcome.parameters.rs.get::<ohm>(), 6.0, epsilon = 0.05);
        assert!(outcome.residual < 1e-8);
    }

    #[test]
    fn never_returns_a_worse_residual_than_the_start() {
        let ratings = thin_film_ratings();
        let config = OptimizeConfig::default();
        let (start, target) = attainable_target(6.0);

        let grid = target.grid();
        let start_residual =
            calculate_effective_irradiance_response(&start, &grid, &config.curve)
                .unwrap()
                .sum_squared_difference(&target)
                .unwrap();

        let outcome = optimize_series_resistance(&start, &ratings, &target, &config).unwrap();

        assert!(outcome.residual <= start_residual);
    }

    #[test]
    fn result_stays_within_the_physical_bound() {
        let ratings = thin_film_ratings();
        let config = OptimizeConfig::default();
        let (start, target) = attainable_target(6.0);

        let outcome = optimize_series_resistance(&start, &ratings, &target, &config).unwrap();

        assert!(outcome.parameters.rs >= ElectricalResistance::ZERO);
        assert!(outcome.parameters.rs <= ratings.maximum_series_resistance());
    }

    #[test]
    fn keeps_the_incumbent_when_it_is_already_optimal() {
        let ratings = thin_film_ratings();
        let config = OptimizeConfig::default();
        let parameters = reference_parameters();

        let grid = irradiance_sweep(&[1000.0, 600.0, 200.0]);
        let target =
            calculate_effective_irradiance_response(&parameters, &grid, &config.curve).unwrap();

        let outcome =
            optimize_series_resistance(&parameters, &ratings, &target, &config).unwrap();

        // The incumbent matches its own response exactly.
        assert_relative_eq!(outcome.residual, 0.0);
    }

    #[test]
    fn rejects_an_empty_target() {
        let ratings = thin_film_ratings();
        let parameters = reference_parameters();
        let target = EirTable { points: Vec::new() };

        let result = optimize_series_resistance(
            &parameters,
            &ratings,
            &target,
            &OptimizeConfig::default(),
        );

        assert!(matches!(result, Err(OptimizeError::EmptyTarget)));
    }
}
