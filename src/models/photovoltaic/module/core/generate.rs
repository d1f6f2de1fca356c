//! Single-diode parameter generation from datasheet ratings.
//!
//! The joint boundary-condition solve decomposes into nested bounded stages:
//!
//! 1. a closed-form shunt resistance estimate from the I–V slope heuristic,
//! 2. an ideality-factor solve against the maximum-power current condition,
//!    with the light and saturation currents recovered in closed form from
//!    the short- and open-circuit conditions at every trial,
//! 3. a series-resistance solve against the `dP/dV = 0` stationarity
//!    condition at the rated maximum-power point (default generation only;
//!    the advanced recalculation holds series resistance fixed), and
//! 4. a gamma temperature-coefficient solve matching the datasheet power
//!    temperature coefficient at an elevated temperature.
//!
//! Every stage is a bracketed bisection with a fixed iteration budget, so
//! generation is deterministic and terminates in bounded time.

mod config;
mod error;
mod problem;

pub use config::GenerateConfig;
pub use error::ParameterGenerationError;

use twine_solvers::equation::bisection;
use uom::si::{
    electric_current::ampere,
    electrical_resistance::ohm,
    f64::{ElectricCurrent, ElectricPotential, ElectricalResistance},
    power::watt,
    temperature_interval::kelvin,
};
use uom::ConstZero;

use crate::support::constraint::Constrained;
use crate::support::units::{TemperatureCoefficient, fraction_per_kelvin, per_kelvin};

use super::{
    equation::ResolvedCell,
    input::{ModuleRatings, ParameterOverrides},
    iv_curve::max_power_point,
    parameters::{ShuntModel, SingleDiodeParameters},
};
use problem::{
    CoefficientModel, CoefficientProblem, SeriesResistanceModel, StationarityProblem, StcSystem,
    solve_ideality,
};

/// Widening factor applied to the closed-form shunt estimate so the
/// ideality-factor bracket stays sign-definite across the resistance range.
const SHUNT_ESTIMATE_MARGIN: f64 = 2.0;

/// Generates a parameter set from datasheet ratings alone.
///
/// The shunt resistance comes from the closed-form slope estimate; all five
/// parameters are then refined so the short-circuit, open-circuit,
/// maximum-power, and stationarity conditions hold at the reference
/// conditions.
///
/// Identical ratings always produce identical parameters.
///
/// # Errors
///
/// Returns a [`ParameterGenerationError`] when the ratings are invalid or a
/// solve stage fails to converge.
pub fn generate_default_parameters(
    ratings: &ModuleRatings,
    config: &GenerateConfig,
) -> Result<SingleDiodeParameters, ParameterGenerationError> {
    ratings.validate()?;

    let shunt = ShuntModel::at_reference(default_shunt_estimate(ratings)?)?;

    solve(ratings, None, shunt, ratings.bandgap, config)
}

/// Re-derives the dependent parameters with caller-fixed fields held.
///
/// Fields not overridden keep their values from `parameters`. The light
/// current, saturation current, ideality factor, and gamma temperature
/// coefficient are re-solved so the reference boundary conditions hold
/// exactly; series resistance is never re-solved here.
///
/// Recalculating twice with the same inputs yields identical parameters.
///
/// # Errors
///
/// Returns a [`ParameterGenerationError`] when the ratings are invalid or a
/// solve stage fails to converge.
pub fn recalculate_advanced_parameters(
    ratings: &ModuleRatings,
    parameters: &SingleDiodeParameters,
    overrides: &ParameterOverrides,
    config: &GenerateConfig,
) -> Result<SingleDiodeParameters, ParameterGenerationError> {
    ratings.validate()?;

    let rs = overrides.rs.map_or(parameters.rs, Constrained::into_inner);
    let shunt = overrides.shunt.unwrap_or(parameters.shunt);
    let bandgap = overrides
        .bandgap
        .map_or(parameters.bandgap, Constrained::into_inner);

    solve(ratings, Some(rs), shunt, bandgap, config)
}

/// Regenerates a parameter set with a fixed series resistance.
///
/// Shared by the advanced recalculation and the series-resistance optimizer.
pub(crate) fn regenerate_with_series_resistance(
    ratings: &ModuleRatings,
    rs: ElectricalResistance,
    shunt: ShuntModel,
    bandgap: ElectricPotential,
    config: &GenerateConfig,
) -> Result<SingleDiodeParameters, ParameterGenerationError> {
    solve(ratings, Some(rs), shunt, bandgap, config)
}

fn solve(
    ratings: &ModuleRatings,
    rs: Option<ElectricalResistance>,
    shunt: ShuntModel,
    bandgap: ElectricPotential,
    config: &GenerateConfig,
) -> Result<SingleDiodeParameters, ParameterGenerationError> {
    let system = StcSystem::new(ratings, shunt.rsh_stc());
    system.check_physical()?;

    let rs_max = ratings.maximum_series_resistance();
    let (rs, gamma) = match rs {
        Some(rs) => {
            let rs = rs.get::<ohm>();
            (rs, solve_ideality(&system, rs, config)?)
        }
        None => solve_series_resistance(&system, rs_max.get::<ohm>(), config)?,
    };

    let i0 = system.saturation_current(gamma, rs);
    let il = system.light_current(gamma, rs);
    if !(i0 > 0.0 && i0.is_finite() && il > 0.0) {
        return Err(ParameterGenerationError::NonPhysical {
            context: "derived diode currents are not positive and finite".into(),
        });
    }

    let base = SingleDiodeParameters {
        il: ElectricCurrent::new::<ampere>(il),
        i0: ElectricCurrent::new::<ampere>(i0),
        rs: ElectricalResistance::new::<ohm>(rs),
        shunt,
        gamma,
        mu_gamma: fraction_per_kelvin(0.0),
        mu_il: ratings.mu_isc,
        bandgap,
        cells_in_series: ratings.cells_in_series,
        rs_max,
        g_ref: ratings.g_ref,
        t_ref: ratings.t_ref,
    };

    let mu_gamma = solve_gamma_coefficient(&base, ratings, config)?;

    Ok(SingleDiodeParameters { mu_gamma, ..base })
}

fn default_shunt_estimate(
    ratings: &ModuleRatings,
) -> Result<ElectricalResistance, ParameterGenerationError> {
    // Slope heuristic: the shunt sets the I–V slope approaching short
    // circuit, the series resistance the slope approaching open circuit.
    let estimate = (ratings.vmp / (ratings.isc - ratings.imp)
        - (ratings.voc - ratings.vmp) / ratings.imp)
        * SHUNT_ESTIMATE_MARGIN;

    if estimate <= ElectricalResistance::ZERO {
        return Err(ParameterGenerationError::NonPhysical {
            context: "shunt slope estimate is not positive".into(),
        });
    }

    Ok(estimate)
}

fn solve_series_resistance(
    system: &StcSystem,
    rs_max: f64,
    config: &GenerateConfig,
) -> Result<(f64, f64), ParameterGenerationError> {
    let model = SeriesResistanceModel { system, config };

    let solution = bisection::solve(
        &model,
        &StationarityProblem,
        [0.0, rs_max],
        &config.rs_bisection(),
        |event: &bisection::Event<'_, _, _>| {
            // Trial resistances at the physical bound leave the ideality
            // solve without a bracket. Steer the search back toward lower
            // resistance, where the stationarity residual is negative.
            if event.result().is_err() {
                return Some(bisection::Action::assume_negative());
            }
            None
        },
    )?;

    if solution.status != bisection::Status::Converged {
        return Err(ParameterGenerationError::MaxIters {
            stage: "series resistance",
            residual: solution.residual,
            iters: solution.iters,
        });
    }

    let fit = solution.snapshot.output;
    Ok((fit.rs, fit.gamma))
}

fn solve_gamma_coefficient(
    base: &SingleDiodeParameters,
    ratings: &ModuleRatings,
    config: &GenerateConfig,
) -> Result<TemperatureCoefficient, ParameterGenerationError> {
    let stc = ResolvedCell::new(base, ratings.reference_conditions())?;
    let p_ref = max_power_point(&stc, &config.curve)?.power.get::<watt>();

    let model = CoefficientModel {
        base,
        mu_target: per_kelvin(ratings.mu_pmp),
        t_elevated: ratings.t_ref + config.coefficient_delta_t,
        delta_t: config.coefficient_delta_t.get::<kelvin>(),
        p_ref,
        curve: &config.curve,
    };

    let solution = bisection::solve(
        &model,
        &CoefficientProblem,
        [config.coefficient_bracket.0, config.coefficient_bracket.1],
        &config.coefficient_bisection(),
        |event: &bisection::Event<'_, _, _>| {
            // A failed trial means the diode degraded past solvability; that
            // side behaves like an over-negative power coefficient.
            if event.result().is_err() {
                return Some(bisection::Action::assume_negative());
            }
            None
        },
    )?;

    if solution.status != bisection::Status::Converged {
        return Err(ParameterGenerationError::MaxIters {
            stage: "gamma coefficient",
            residual: solution.residual,
            iters: solution.iters,
        });
    }

    Ok(fraction_per_kelvin(solution.snapshot.output.mu))
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use uom::si::electric_current::ampere;
    use uom::si::electric_potential::volt;

    use crate::models::photovoltaic::module::core::equation::EquationConfig;
    use crate::models::photovoltaic::module::core::input::OperatingPoint;
    use crate::models::photovoltaic::module::core::test_support::{
        reference_parameters, thin_film_ratings,
    };

    #[test]
    fn default_parameters_reproduce_reference_conditions() {
        let ratings = thin_film_ratings();
        let parameters =
            generate_default_parameters(&ratings, &GenerateConfig::default()).unwrap();

        let cell = ResolvedCell::new(&parameters, ratings.reference_conditions()).unwrap();

        // Zero current at open circuit.
        let at_voc = cell.current_residual(ratings.voc, ElectricCurrent::ZERO);
        assert!(at_voc.get::<ampere>().abs() < 1e-6);

        // Rated current at the rated maximum-power voltage.
        let at_mpp = cell.current_residual(ratings.vmp, ratings.imp);
        assert!(at_mpp.get::<ampere>().abs() < 1e-6);

        // The rated current also comes back out of the implicit solve.
        let imp = cell
            .current_at(ratings.vmp, &EquationConfig::default())
            .unwrap();
        assert_relative_eq!(
            imp.get::<ampere>(),
            ratings.imp.get::<ampere>(),
            max_relative = 1e-4
        );
    }

    #[test]
    fn generation_is_deterministic() {
        let ratings = thin_film_ratings();
        let config = GenerateConfig::default();

        let first = generate_default_parameters(&ratings, &config).unwrap();
        let second = generate_default_parameters(&ratings, &config).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn series_resistance_stays_within_its_physical_bound() {
        let ratings = thin_film_ratings();
        let parameters =
            generate_default_parameters(&ratings, &GenerateConfig::default()).unwrap();

        assert!(parameters.rs >= ElectricalResistance::ZERO);
        assert!(parameters.rs <= ratings.maximum_series_resistance());
        assert!(parameters.gamma > 0.0);
        assert!(parameters.i0 > ElectricCurrent::ZERO);
    }

    #[test]
    fn power_temperature_coefficient_is_matched() {
        let ratings = thin_film_ratings();
        let config = GenerateConfig::default();
        let parameters = generate_default_parameters(&ratings, &config).unwrap();

        let stc = ResolvedCell::new(&parameters, ratings.reference_conditions()).unwrap();
        let p_ref = max_power_point(&stc, &config.curve).unwrap().power;

        let t_hot = ratings.t_ref + config.coefficient_delta_t;
        let hot = ResolvedCell::new(
            &parameters,
            OperatingPoint::new(ratings.g_ref, t_hot),
        )
        .unwrap();
        let p_hot = max_power_point(&hot, &config.curve).unwrap().power;

        let modeled = (p_hot.get::<watt>() - p_ref.get::<watt>())
            / (p_ref.get::<watt>() * config.coefficient_delta_t.get::<kelvin>());

        assert_relative_eq!(modeled, per_kelvin(ratings.mu_pmp), epsilon = 1e-6);
    }

    #[test]
    fn advanced_recalculation_preserves_reference_conditions() {
        let ratings = thin_film_ratings();
        let config = GenerateConfig::default();
        let parameters = reference_parameters();

        let shunt = ShuntModel::at_reference(ElectricalResistance::new::<ohm>(3000.0)).unwrap();
        let recalculated = recalculate_advanced_parameters(
            &ratings,
            &parameters,
            &ParameterOverrides::shunt(shunt),
            &config,
        )
        .unwrap();

        assert_relative_eq!(recalculated.shunt.rsh_stc().get::<ohm>(), 3000.0);
        assert_relative_eq!(
            recalculated.rs.get::<ohm>(),
            parameters.rs.get::<ohm>()
        );

        let cell = ResolvedCell::new(&recalculated, ratings.reference_conditions()).unwrap();
        assert!(
            cell.current_residual(ratings.voc, ElectricCurrent::ZERO)
                .get::<ampere>()
                .abs()
                < 1e-6
        );
        assert!(
            cell.current_residual(ratings.vmp, ratings.imp)
                .get::<ampere>()
                .abs()
                < 1e-6
        );
    }

    #[test]
    fn advanced_recalculation_is_idempotent() {
        let ratings = thin_film_ratings();
        let config = GenerateConfig::default();
        let parameters = reference_parameters();

        let shunt = ShuntModel::at_reference(ElectricalResistance::new::<ohm>(3000.0)).unwrap();
        let overrides = ParameterOverrides::shunt(shunt);

        let first =
            recalculate_advanced_parameters(&ratings, &parameters, &overrides, &config).unwrap();
        let second =
            recalculate_advanced_parameters(&ratings, &first, &overrides, &config).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn inconsistent_ratings_are_rejected() {
        let mut ratings = thin_film_ratings();
        ratings.imp = ratings.isc * 1.5;

        let result = generate_default_parameters(&ratings, &GenerateConfig::default());
        assert!(matches!(
            result,
            Err(ParameterGenerationError::InvalidRatings(_))
        ));
    }

    #[test]
    fn ideality_factor_lands_in_a_plausible_range() {
        let parameters = reference_parameters();

        assert!(parameters.gamma > 0.5);
        assert!(parameters.gamma < 3.0);

        // The knee voltage implied by the fit stays below open circuit.
        let a = parameters.ideality_voltage(parameters.t_ref);
        assert!(a.get::<volt>() > 1.0);
    }
}
