use twine_solvers::equation::bisection;
use uom::si::{
    electric_current::ampere,
    electrical_resistance::ohm,
    f64::{ElectricCurrent, ElectricalResistance, TemperatureInterval},
    temperature_interval::kelvin,
};

use super::super::iv_curve::CurveConfig;

/// Solver configuration for parameter generation.
#[derive(Debug, Clone, Copy)]
pub struct GenerateConfig {
    /// Maximum iteration count per bisection stage.
    pub max_iters: usize,

    /// Ideality-factor search bracket.
    pub gamma_bracket: (f64, f64),

    /// Absolute tolerance on the ideality factor.
    pub gamma_tol: f64,

    /// Absolute tolerance on the boundary-condition current residuals.
    pub current_tol: ElectricCurrent,

    /// Absolute tolerance on the series resistance.
    pub rs_tol: ElectricalResistance,

    /// Gamma temperature-coefficient search bracket, fraction per kelvin.
    pub coefficient_bracket: (f64, f64),

    /// Temperature rise used to fit the power temperature coefficient.
    pub coefficient_delta_t: TemperatureInterval,

    /// Absolute tolerance on the power-coefficient residual, per kelvin.
    pub coefficient_tol: f64,

    /// Configuration for the inner maximum-power solves.
    pub curve: CurveConfig,
}

impl Default for GenerateConfig {
    fn default() -> Self {
        Self {
            max_iters: 100,
            // Validation range of the ideality factor.
            gamma_bracket: (0.1, 5.0),
            gamma_tol: 1e-12,
            current_tol: ElectricCurrent::new::<ampere>(1e-9),
            rs_tol: ElectricalResistance::new::<ohm>(1e-9),
            // ±3 %/°C expressed as a fraction per kelvin.
            coefficient_bracket: (-0.03, 0.03),
            coefficient_delta_t: TemperatureInterval::new::<kelvin>(25.0),
            coefficient_tol: 1e-9,
            curve: CurveConfig::default(),
        }
    }
}

impl GenerateConfig {
    /// Bisection configuration for the ideality-factor stage.
    pub(super) fn gamma_bisection(&self) -> bisection::Config {
        bisection::Config {
            max_iters: self.max_iters,
            x_abs_tol: self.gamma_tol,
            x_rel_tol: 0.0,
            residual_tol: self.current_tol.get::<ampere>(),
        }
    }

    /// Bisection configuration for the series-resistance stage.
    pub(super) fn rs_bisection(&self) -> bisection::Config {
        bisection::Config {
            max_iters: self.max_iters,
            x_abs_tol: self.rs_tol.get::<ohm>(),
            x_rel_tol: 0.0,
            residual_tol: self.current_tol.get::<ampere>(),
        }
    }

    /// Bisection configuration for the gamma-coefficient stage.
    pub(super) fn coefficient_bisection(&self) -> bisection::Config {
        bisection::Config {
            max_iters: self.max_iters,
            x_abs_tol: 1e-12,
            x_rel_tol: 0.0,
            residual_tol: self.coefficient_tol,
        }
    }
}
