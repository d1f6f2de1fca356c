//! Boundary-condition formulations for the generation solves.
//!
//! The reference-condition system is kept in scalar SI form: the bisection
//! stages iterate on plain floats, and quantities convert back at the module
//! boundary. Exponentials are shifted so that small trial ideality factors
//! cannot overflow. Each stage's model output carries the fitted values
//! along with the residual, so a converged solution is read straight off
//! the final snapshot.

use std::convert::Infallible;

use twine_core::{EquationProblem, Model};
use twine_solvers::equation::bisection;
use uom::si::{
    electric_current::ampere,
    electric_potential::volt,
    electrical_resistance::ohm,
    f64::{ElectricalResistance, ThermodynamicTemperature},
    power::watt,
};

use crate::support::units::fraction_per_kelvin;

use super::super::{
    constants,
    equation::{ConvergenceError, ResolvedCell},
    input::{ModuleRatings, OperatingPoint},
    iv_curve::{CurveConfig, max_power_point},
    parameters::SingleDiodeParameters,
};
use super::{GenerateConfig, ParameterGenerationError};

/// The reference-condition boundary system in scalar SI units.
pub(super) struct StcSystem {
    isc: f64,
    voc: f64,
    imp: f64,
    vmp: f64,
    ns: f64,
    vt: f64,
    rsh: f64,
}

impl StcSystem {
    pub(super) fn new(ratings: &ModuleRatings, rsh_stc: ElectricalResistance) -> Self {
        Self {
            isc: ratings.isc.get::<ampere>(),
            voc: ratings.voc.get::<volt>(),
            imp: ratings.imp.get::<ampere>(),
            vmp: ratings.vmp.get::<volt>(),
            ns: f64::from(ratings.cells_in_series),
            vt: constants::thermal_voltage(ratings.t_ref).get::<volt>(),
            rsh: rsh_stc.get::<ohm>(),
        }
    }

    /// Rejects shunt resistances too small to admit a positive saturation
    /// current. The check is made at zero series resistance; the saturation
    /// numerator only grows with series resistance.
    pub(super) fn check_physical(&self) -> Result<(), ParameterGenerationError> {
        if self.saturation_numerator(0.0) <= 0.0 {
            return Err(ParameterGenerationError::NonPhysical {
                context: "shunt resistance is too small for the rated currents".into(),
            });
        }
        Ok(())
    }

    fn ideality_voltage(&self, gamma: f64) -> f64 {
        self.ns * gamma * self.vt
    }

    fn saturation_numerator(&self, rs: f64) -> f64 {
        self.isc * (1.0 + rs / self.rsh) - self.voc / self.rsh
    }

    /// `I0·exp(v/a)`, with both exponents shifted by `v` so the term stays
    /// finite for arbitrarily sharp diodes.
    fn scaled_diode_term(&self, gamma: f64, rs: f64, v: f64) -> f64 {
        let a = self.ideality_voltage(gamma);
        self.saturation_numerator(rs)
            / (((self.voc - v) / a).exp() - ((self.isc * rs - v) / a).exp())
    }

    /// Saturation current satisfying the short- and open-circuit conditions.
    pub(super) fn saturation_current(&self, gamma: f64, rs: f64) -> f64 {
        self.scaled_diode_term(gamma, rs, 0.0)
    }

    /// Light current from the short-circuit condition.
    pub(super) fn light_current(&self, gamma: f64, rs: f64) -> f64 {
        let a = self.ideality_voltage(gamma);
        let i0 = self.saturation_current(gamma, rs);
        self.isc + i0 * ((self.isc * rs / a).exp() - 1.0) + self.isc * rs / self.rsh
    }

    /// Residual of the maximum-power current condition, A.
    pub(super) fn mpp_current_residual(&self, gamma: f64, rs: f64) -> f64 {
        let v_diode = self.vmp + self.imp * rs;
        let il = self.light_current(gamma, rs);
        let i0 = self.saturation_current(gamma, rs);
        il - (self.scaled_diode_term(gamma, rs, v_diode) - i0) - v_diode / self.rsh - self.imp
    }

    /// Residual of the `dP/dV = 0` stationarity condition at the rated
    /// maximum-power point, A.
    pub(super) fn power_slope_residual(&self, gamma: f64, rs: f64) -> f64 {
        let v_diode = self.vmp + self.imp * rs;
        let a = self.ideality_voltage(gamma);
        let s = self.scaled_diode_term(gamma, rs, v_diode) / a + 1.0 / self.rsh;
        let di_dv = -s / (1.0 + rs * s);
        self.imp + self.vmp * di_dv
    }
}

/// A trial ideality factor with its maximum-power current residual.
#[derive(Debug, Clone, Copy)]
pub(super) struct KneeFit {
    pub(super) gamma: f64,
    pub(super) residual: f64,
}

/// Model adapter for the ideality-factor solve at a fixed series resistance.
pub(super) struct IdealityModel<'a> {
    pub(super) system: &'a StcSystem,
    pub(super) rs: f64,
}

impl Model for IdealityModel<'_> {
    type Input = f64;
    type Output = KneeFit;
    type Error = Infallible;

    fn call(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
        Ok(KneeFit {
            gamma: *input,
            residual: self.system.mpp_current_residual(*input, self.rs),
        })
    }
}

/// Equation problem for the ideality-factor solve.
pub(super) struct KneeProblem;

impl EquationProblem<1> for KneeProblem {
    type Input = f64;
    type Output = KneeFit;
    type Error = Infallible;

    fn input(&self, x: &[f64; 1]) -> Result<Self::Input, Self::Error> {
        Ok(x[0])
    }

    fn residuals(
        &self,
        _input: &Self::Input,
        output: &Self::Output,
    ) -> Result<[f64; 1], Self::Error> {
        Ok([output.residual])
    }
}

/// Solves the ideality factor from the maximum-power current condition.
pub(super) fn solve_ideality(
    system: &StcSystem,
    rs: f64,
    config: &GenerateConfig,
) -> Result<f64, ParameterGenerationError> {
    let model = IdealityModel { system, rs };

    let solution = bisection::solve(
        &model,
        &KneeProblem,
        [config.gamma_bracket.0, config.gamma_bracket.1],
        &config.gamma_bisection(),
        |_event: &bisection::Event<'_, _, _>| None,
    )?;

    if solution.status != bisection::Status::Converged {
        return Err(ParameterGenerationError::MaxIters {
            stage: "ideality factor",
            residual: solution.residual,
            iters: solution.iters,
        });
    }

    Ok(solution.snapshot.output.gamma)
}

/// A trial series resistance with its fitted knee and stationarity residual.
#[derive(Debug, Clone, Copy)]
pub(super) struct StationarityFit {
    pub(super) rs: f64,
    pub(super) gamma: f64,
    pub(super) residual: f64,
}

/// Model adapter for the series-resistance solve.
///
/// Each trial resistance first fits the ideality factor, so the short-
/// circuit, open-circuit, and maximum-power current conditions hold at
/// every iterate; the exposed residual is the remaining stationarity
/// condition.
pub(super) struct SeriesResistanceModel<'a> {
    pub(super) system: &'a StcSystem,
    pub(super) config: &'a GenerateConfig,
}

impl Model for SeriesResistanceModel<'_> {
    type Input = f64;
    type Output = StationarityFit;
    type Error = ParameterGenerationError;

    fn call(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
        let gamma = solve_ideality(self.system, *input, self.config)?;
        Ok(StationarityFit {
            rs: *input,
            gamma,
            residual: self.system.power_slope_residual(gamma, *input),
        })
    }
}

/// Equation problem for the series-resistance solve.
pub(super) struct StationarityProblem;

impl EquationProblem<1> for StationarityProblem {
    type Input = f64;
    type Output = StationarityFit;
    type Error = Infallible;

    fn input(&self, x: &[f64; 1]) -> Result<Self::Input, Self::Error> {
        Ok(x[0])
    }

    fn residuals(
        &self,
        _input: &Self::Input,
        output: &Self::Output,
    ) -> Result<[f64; 1], Self::Error> {
        Ok([output.residual])
    }
}

/// A trial gamma temperature coefficient with its power-coefficient
/// mismatch.
#[derive(Debug, Clone, Copy)]
pub(super) struct CoefficientFit {
    pub(super) mu: f64,
    pub(super) residual: f64,
}

/// Model adapter for the gamma temperature-coefficient solve.
///
/// Each trial coefficient rebuilds the parameter set and compares the
/// modeled relative power change at an elevated temperature against the
/// datasheet power coefficient.
pub(super) struct CoefficientModel<'a> {
    pub(super) base: &'a SingleDiodeParameters,
    pub(super) mu_target: f64,
    pub(super) t_elevated: ThermodynamicTemperature,
    pub(super) delta_t: f64,
    pub(super) p_ref: f64,
    pub(super) curve: &'a CurveConfig,
}

impl Model for CoefficientModel<'_> {
    type Input = f64;
    type Output = CoefficientFit;
    type Error = ConvergenceError;

    fn call(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
        let trial = SingleDiodeParameters {
            mu_gamma: fraction_per_kelvin(*input),
            ..*self.base
        };

        let cell = ResolvedCell::new(&trial, OperatingPoint::new(trial.g_ref, self.t_elevated))?;
        let p = max_power_point(&cell, self.curve)?.power.get::<watt>();

        let modeled = (p - self.p_ref) / (self.p_ref * self.delta_t);
        Ok(CoefficientFit {
            mu: *input,
            residual: modeled - self.mu_target,
        })
    }
}

/// Equation problem for the gamma temperature-coefficient solve.
pub(super) struct CoefficientProblem;

impl EquationProblem<1> for CoefficientProblem {
    type Input = f64;
    type Output = CoefficientFit;
    type Error = Infallible;

    fn input(&self, x: &[f64; 1]) -> Result<Self::Input, Self::Error> {
        Ok(x[0])
    }

    fn residuals(
        &self,
        _input: &Self::Input,
        output: &Self::Output,
    ) -> Result<[f64; 1], Self::Error> {
        Ok([output.residual])
    }
}
