//! Effective irradiance response.
//!
//! Relative module efficiency across irradiance and temperature, normalized
//! to 1.0 at the reference conditions. Calculated tables share their shape
//! with caller-supplied target tables so the two can be differenced
//! directly.

use thiserror::Error;
use uom::si::{f64::Ratio, ratio::ratio};

use super::{
    equation::{ConvergenceError, ResolvedCell},
    input::OperatingPoint,
    iv_curve::{CurveConfig, max_power_point},
    parameters::SingleDiodeParameters,
};

/// Relative efficiency at one irradiance and temperature condition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EirPoint {
    /// Conditions the efficiency applies to.
    pub at: OperatingPoint,

    /// Efficiency relative to the reference conditions; 1.0 at reference.
    pub relative_efficiency: f64,
}

impl EirPoint {
    /// Relative efficiency expressed as a percent deviation from reference;
    /// 0 means the condition matches reference-normalized efficiency.
    #[must_use]
    pub fn deviation_percent(&self) -> f64 {
        (self.relative_efficiency - 1.0) * 100.0
    }
}

/// An ordered effective-irradiance-response table.
///
/// Built either as a calculation result or as a caller-supplied target; both
/// share this shape so tables can be compared point-for-point.
#[derive(Debug, Clone, PartialEq)]
pub struct EirTable {
    /// Table entries, in the caller's grid order.
    pub points: Vec<EirPoint>,
}

impl EirTable {
    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the table has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// The conditions grid of the table, in order.
    #[must_use]
    pub fn grid(&self) -> Vec<OperatingPoint> {
        self.points.iter().map(|point| point.at).collect()
    }

    /// Sum of squared relative-efficiency differences against another table.
    ///
    /// # Errors
    ///
    /// Returns a [`TableShapeError`] unless the tables are keyed identically.
    pub fn sum_squared_difference(&self, other: &EirTable) -> Result<f64, TableShapeError> {
        if self.len() != other.len() {
            return Err(TableShapeError::LengthMismatch {
                left: self.len(),
                right: other.len(),
            });
        }

        let mut total = 0.0;
        for (index, (a, b)) in self.points.iter().zip(&other.points).enumerate() {
            if a.at != b.at {
                return Err(TableShapeError::ConditionMismatch { index });
            }
            let diff = a.relative_efficiency - b.relative_efficiency;
            total += diff * diff;
        }

        Ok(total)
    }
}

/// Errors comparing response tables of different shapes.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum TableShapeError {
    /// The tables hold different numbers of entries.
    #[error("tables have different lengths: {left} vs {right}")]
    LengthMismatch { left: usize, right: usize },

    /// The tables disagree on the conditions of an entry.
    #[error("tables disagree on conditions at index {index}")]
    ConditionMismatch { index: usize },
}

/// Calculates the effective irradiance response over a conditions grid.
///
/// For each grid point the maximum power is solved directly (no full curve)
/// and normalized as `(Pmp(G,T)/G) / (Pmp(Gref,Tref)/Gref)`. A grid point at
/// the reference conditions evaluates to exactly 1.0 by construction.
///
/// # Errors
///
/// Returns a [`ConvergenceError`] when a maximum-power solve fails or a grid
/// point is infeasible.
pub fn calculate_effective_irradiance_response(
    parameters: &SingleDiodeParameters,
    grid: &[OperatingPoint],
    config: &CurveConfig,
) -> Result<EirTable, ConvergenceError> {
    let reference = OperatingPoint::new(parameters.g_ref, parameters.t_ref);
    let reference_cell = ResolvedCell::new(parameters, reference)?;
    let reference_yield = max_power_point(&reference_cell, config)?.power / parameters.g_ref;

    let mut points = Vec::with_capacity(grid.len());
    for &at in grid {
        let cell = ResolvedCell::new(parameters, at)?;
        let power = max_power_point(&cell, config)?.power;
        let specific_yield = power / at.irradiance;

        let relative_efficiency: Ratio = specific_yield / reference_yield;
        points.push(EirPoint {
            at,
            relative_efficiency: relative_efficiency.get::<ratio>(),
        });
    }

    Ok(EirTable { points })
}

#[cfg(test)]
mod tests {
    use super::*;

    use uom::si::heat_flux_density::watt_per_square_meter;

    use crate::models::photovoltaic::module::core::constants;
    use crate::models::photovoltaic::module::core::test_support::{
        irradiance_sweep, reference_parameters,
    };
    use crate::support::units::Irradiance;

    #[test]
    fn reference_conditions_normalize_to_exactly_one() {
        let parameters = reference_parameters();
        let grid = [OperatingPoint::new(parameters.g_ref, parameters.t_ref)];

        let table = calculate_effective_irradiance_response(
            &parameters,
            &grid,
            &CurveConfig::default(),
        )
        .unwrap();

        assert_eq!(table.points[0].relative_efficiency, 1.0);
        assert_eq!(table.points[0].deviation_percent(), 0.0);
    }

    #[test]
    fn response_varies_smoothly_across_the_sweep() {
        let parameters = reference_parameters();
        let grid = irradiance_sweep(&[1000.0, 800.0, 600.0, 400.0, 200.0]);

        let table = calculate_effective_irradiance_response(
            &parameters,
            &grid,
            &CurveConfig::default(),
        )
        .unwrap();

        assert_eq!(table.len(), 5);
        for point in &table.points {
            assert!(point.relative_efficiency.is_finite());
            assert!(point.relative_efficiency > 0.5);
            assert!(point.relative_efficiency < 1.5);
        }
    }

    #[test]
    fn noct_irradiance_is_a_valid_grid_point() {
        let parameters = reference_parameters();
        let grid = [OperatingPoint::new(
            constants::noct_irradiance(),
            parameters.t_ref,
        )];

        let table = calculate_effective_irradiance_response(
            &parameters,
            &grid,
            &CurveConfig::default(),
        )
        .unwrap();

        assert!(table.points[0].relative_efficiency.is_finite());
    }

    #[test]
    fn mismatched_tables_cannot_be_differenced() {
        let parameters = reference_parameters();
        let config = CurveConfig::default();

        let full = calculate_effective_irradiance_response(
            &parameters,
            &irradiance_sweep(&[1000.0, 800.0, 600.0]),
            &config,
        )
        .unwrap();
        let short = calculate_effective_irradiance_response(
            &parameters,
            &irradiance_sweep(&[1000.0, 800.0]),
            &config,
        )
        .unwrap();

        assert!(matches!(
            full.sum_squared_difference(&short),
            Err(TableShapeError::LengthMismatch { left: 3, right: 2 })
        ));

        let mut shifted = full.clone();
        shifted.points[1].at.irradiance = Irradiance::new::<watt_per_square_meter>(750.0);
        assert!(matches!(
            full.sum_squared_difference(&shifted),
            Err(TableShapeError::ConditionMismatch { index: 1 })
        ));
    }

    #[test]
    fn identical_tables_have_zero_residual() {
        let parameters = reference_parameters();
        let grid = irradiance_sweep(&[1000.0, 600.0, 200.0]);

        let table = calculate_effective_irradiance_response(
            &parameters,
            &grid,
            &CurveConfig::default(),
        )
        .unwrap();

        assert_eq!(table.sum_squared_difference(&table).unwrap(), 0.0);
    }
}
