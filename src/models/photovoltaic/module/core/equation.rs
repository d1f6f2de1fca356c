//! Single-diode equation evaluation at a resolved operating point.
//!
//! The terminal current of the equivalent circuit satisfies
//!
//! `I = IL − I0·[exp((V + I·Rs)/(Ns·γ·Vt)) − 1] − (V + I·Rs)/Rsh`
//!
//! with current appearing on both sides, so current-from-voltage is a
//! bracketed root solve. Resolving a parameter set at an operating point
//! applies the irradiance and temperature corrections once; every subsequent
//! query against the resolved cell is a pure function of its arguments.

use std::convert::Infallible;

use thiserror::Error;
use twine_core::{EquationProblem, Model};
use twine_solvers::equation::bisection;
use uom::si::{
    electric_current::ampere,
    electric_potential::volt,
    f64::{
        ElectricCurrent, ElectricPotential, ElectricalConductance, ElectricalResistance, Power,
        Ratio, ThermodynamicTemperature,
    },
    ratio::ratio,
    thermodynamic_temperature::kelvin,
};
use uom::ConstZero;

use crate::support::units::Irradiance;

use super::{input::OperatingPoint, parameters::SingleDiodeParameters};

/// Fraction of the light current admitted below zero when bracketing the
/// current solve. The root at open circuit sits at numerically-zero current
/// and may land a solver tolerance below it.
const BRACKET_GUARD: f64 = 1e-6;

/// Solver configuration for the implicit current and voltage solves.
#[derive(Debug, Clone, Copy)]
pub struct EquationConfig {
    /// Maximum iteration count for a bisection solve.
    pub max_iters: usize,

    /// Relative tolerance on the solved current or voltage.
    pub rel_tol: f64,

    /// Absolute tolerance on the current residual.
    pub residual_tol: ElectricCurrent,
}

impl Default for EquationConfig {
    fn default() -> Self {
        Self {
            max_iters: 100,
            rel_tol: 1e-9,
            residual_tol: ElectricCurrent::new::<ampere>(1e-9),
        }
    }
}

impl EquationConfig {
    /// Converts this configuration into a bisection solver configuration.
    fn bisection(&self) -> bisection::Config {
        bisection::Config {
            max_iters: self.max_iters,
            x_abs_tol: 0.0,
            x_rel_tol: self.rel_tol,
            residual_tol: self.residual_tol.get::<ampere>(),
        }
    }
}

/// Errors that can occur while evaluating the single-diode equation.
#[derive(Debug, Error)]
pub enum ConvergenceError {
    /// The operating point lies outside the model's domain.
    #[error("operating point is infeasible: {irradiance:?}, {temperature:?}")]
    InfeasibleOperatingPoint {
        irradiance: Irradiance,
        temperature: ThermodynamicTemperature,
    },

    /// The bisection solver encountered an error.
    #[error("bisection solver error")]
    Bisection(#[from] bisection::Error),

    /// The solver reached the iteration limit without converging.
    #[error("solver hit iteration limit: residual={residual:?}")]
    MaxIters {
        /// Best current residual achieved.
        residual: ElectricCurrent,

        /// Iteration count performed by the solver.
        iters: usize,
    },
}

/// A single-diode cell with irradiance and temperature corrections applied.
///
/// All fields describe the equivalent circuit at one operating point; the
/// struct holds no iteration state and is safe to query concurrently.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedCell {
    /// Light-generated current at the operating point.
    pub il: ElectricCurrent,

    /// Diode saturation current at the operating point.
    pub i0: ElectricCurrent,

    /// Modified ideality voltage `Ns·γ(T)·Vt(T)`.
    pub ideality_voltage: ElectricPotential,

    /// Series resistance.
    pub rs: ElectricalResistance,

    /// Shunt resistance at the operating point.
    pub rsh: ElectricalResistance,
}

impl ResolvedCell {
    /// Applies the operating-condition corrections of a parameter set.
    ///
    /// # Errors
    ///
    /// Returns [`ConvergenceError::InfeasibleOperatingPoint`] when the
    /// corrections leave the equivalent circuit outside its physical domain
    /// (non-positive irradiance, temperature, currents, or ideality).
    pub fn new(
        parameters: &SingleDiodeParameters,
        at: OperatingPoint,
    ) -> Result<Self, ConvergenceError> {
        let infeasible = || ConvergenceError::InfeasibleOperatingPoint {
            irradiance: at.irradiance,
            temperature: at.temperature,
        };

        if at.irradiance <= Irradiance::ZERO || at.temperature.get::<kelvin>() <= 0.0 {
            return Err(infeasible());
        }

        let gamma = parameters.gamma_at(at.temperature);
        if gamma <= 0.0 {
            return Err(infeasible());
        }

        let cell = Self {
            il: parameters.light_current_at(at.irradiance, at.temperature),
            i0: parameters.saturation_current_at(at.temperature),
            ideality_voltage: parameters.ideality_voltage(at.temperature),
            rs: parameters.rs,
            rsh: parameters.shunt.at_irradiance(at.irradiance, parameters.g_ref),
        };

        let physical = cell.il > ElectricCurrent::ZERO
            && cell.i0 > ElectricCurrent::ZERO
            && cell.i0.get::<ampere>().is_finite()
            && cell.rsh > ElectricalResistance::ZERO;
        if !physical {
            return Err(infeasible());
        }

        Ok(cell)
    }

    /// Right-hand side of the implicit equation: the circuit current implied
    /// by a terminal voltage and an assumed branch current.
    fn circuit_current(&self, v: ElectricPotential, i: ElectricCurrent) -> ElectricCurrent {
        let v_diode = v + i * self.rs;
        let x = (v_diode / self.ideality_voltage).get::<ratio>();
        self.il - self.i0 * (x.exp() - 1.0) - v_diode / self.rsh
    }

    /// Residual of the implicit equation at a voltage-current pair.
    #[must_use]
    pub fn current_residual(&self, v: ElectricPotential, i: ElectricCurrent) -> ElectricCurrent {
        self.circuit_current(v, i) - i
    }

    /// Slope `dI/dV` of the terminal current, from implicit differentiation.
    #[must_use]
    pub fn current_slope(&self, v: ElectricPotential, i: ElectricCurrent) -> ElectricalConductance {
        let v_diode = v + i * self.rs;
        let x = (v_diode / self.ideality_voltage).get::<ratio>();
        let s: ElectricalConductance =
            self.i0 / self.ideality_voltage * x.exp() + Ratio::new::<ratio>(1.0) / self.rsh;
        let denom = (Ratio::new::<ratio>(1.0) + self.rs * s).get::<ratio>();
        -(s / denom)
    }

    /// Terminal current at a voltage, by bracketed bisection over `[0, IL]`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConvergenceError`] when no root brackets within the
    /// light-current range or the iteration budget is exhausted.
    pub fn current_at(
        &self,
        v: ElectricPotential,
        config: &EquationConfig,
    ) -> Result<ElectricCurrent, ConvergenceError> {
        let model = CurrentModel { cell: self, v };
        let problem = ImplicitCurrentProblem;

        let il = self.il.get::<ampere>();
        let solution = bisection::solve(
            &model,
            &problem,
            [-BRACKET_GUARD * il, il],
            &config.bisection(),
            |_event: &bisection::Event<'_, _, _>| None,
        )?;

        if solution.status != bisection::Status::Converged {
            return Err(ConvergenceError::MaxIters {
                residual: ElectricCurrent::new::<ampere>(solution.residual),
                iters: solution.iters,
            });
        }

        Ok(solution.snapshot.output)
    }

    /// Power delivered at a voltage.
    ///
    /// # Errors
    ///
    /// Propagates failures of the underlying current solve.
    pub fn power_at(
        &self,
        v: ElectricPotential,
        config: &EquationConfig,
    ) -> Result<Power, ConvergenceError> {
        Ok(v * self.current_at(v, config)?)
    }

    /// Open-circuit voltage at the operating point.
    ///
    /// The upper bracket is the ideal-diode voltage `a·ln(IL/I0 + 1)`; shunt
    /// current only lowers the open-circuit voltage, so the root always lies
    /// below it.
    ///
    /// # Errors
    ///
    /// Returns a [`ConvergenceError`] when the solve fails to converge.
    pub fn open_circuit_voltage(
        &self,
        config: &EquationConfig,
    ) -> Result<ElectricPotential, ConvergenceError> {
        let hi = self.ideality_voltage * (self.il / self.i0).get::<ratio>().ln_1p();

        let model = OpenCircuitModel { cell: self };
        let problem = OpenCircuitProblem;

        let solution = bisection::solve(
            &model,
            &problem,
            [0.0, hi.get::<volt>()],
            &config.bisection(),
            |_event: &bisection::Event<'_, _, _>| None,
        )?;

        if solution.status != bisection::Status::Converged {
            return Err(ConvergenceError::MaxIters {
                residual: ElectricCurrent::new::<ampere>(solution.residual),
                iters: solution.iters,
            });
        }

        Ok(solution.snapshot.output.voltage)
    }
}

/// A zero-current circuit state: the trial voltage and the current it
/// implies.
#[derive(Debug, Clone, Copy)]
struct OpenCircuitState {
    voltage: ElectricPotential,
    current: ElectricCurrent,
}

/// Model adapter exposing the assumed branch current as the input variable.
struct CurrentModel<'a> {
    cell: &'a ResolvedCell,
    v: ElectricPotential,
}

impl Model for CurrentModel<'_> {
    type Input = ElectricCurrent;
    type Output = ElectricCurrent;
    type Error = Infallible;

    fn call(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
        Ok(self.cell.circuit_current(self.v, *input))
    }
}

/// Equation problem driving the assumed current to the implied current.
struct ImplicitCurrentProblem;

impl EquationProblem<1> for ImplicitCurrentProblem {
    type Input = ElectricCurrent;
    type Output = ElectricCurrent;
    type Error = Infallible;

    fn input(&self, x: &[f64; 1]) -> Result<Self::Input, Self::Error> {
        Ok(ElectricCurrent::new::<ampere>(x[0]))
    }

    fn residuals(
        &self,
        input: &Self::Input,
        output: &Self::Output,
    ) -> Result<[f64; 1], Self::Error> {
        Ok([(*output - *input).get::<ampere>()])
    }
}

/// Model adapter exposing the terminal voltage as the input variable, with
/// the branch current pinned at zero.
struct OpenCircuitModel<'a> {
    cell: &'a ResolvedCell,
}

impl Model for OpenCircuitModel<'_> {
    type Input = ElectricPotential;
    type Output = OpenCircuitState;
    type Error = Infallible;

    fn call(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
        Ok(OpenCircuitState {
            voltage: *input,
            current: self.cell.circuit_current(*input, ElectricCurrent::ZERO),
        })
    }
}

/// Equation problem driving the zero-current circuit current to zero.
struct OpenCircuitProblem;

impl EquationProblem<1> for OpenCircuitProblem {
    type Input = ElectricPotential;
    type Output = OpenCircuitState;
    type Error = Infallible;

    fn input(&self, x: &[f64; 1]) -> Result<Self::Input, Self::Error> {
        Ok(ElectricPotential::new::<volt>(x[0]))
    }

    fn residuals(
        &self,
        _input: &Self::Input,
        output: &Self::Output,
    ) -> Result<[f64; 1], Self::Error> {
        Ok([output.current.get::<ampere>()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use uom::si::heat_flux_density::watt_per_square_meter;
    use uom::si::thermodynamic_temperature::degree_celsius;

    use crate::models::photovoltaic::module::core::test_support::reference_parameters;

    fn stc_cell() -> ResolvedCell {
        let parameters = reference_parameters();
        ResolvedCell::new(
            &parameters,
            OperatingPoint::new(parameters.g_ref, parameters.t_ref),
        )
        .expect("reference conditions are feasible")
    }

    #[test]
    fn short_circuit_current_is_near_the_light_current() {
        let cell = stc_cell();
        let config = EquationConfig::default();

        let isc = cell
            .current_at(ElectricPotential::ZERO, &config)
            .expect("short-circuit solve should succeed");

        // The diode passes almost nothing at zero bias; only the shunt leak
        // separates Isc from IL.
        let leak = cell.il - isc;
        assert!(leak >= ElectricCurrent::ZERO);
        assert!(leak < cell.il * 0.05);
    }

    #[test]
    fn terminal_current_vanishes_at_open_circuit() {
        let cell = stc_cell();
        let config = EquationConfig::default();

        let voc = cell
            .open_circuit_voltage(&config)
            .expect("open-circuit solve should succeed");
        let i = cell
            .current_at(voc, &config)
            .expect("current solve at voc should succeed");

        assert!(i.get::<ampere>().abs() < 1e-6);
    }

    #[test]
    fn terminal_current_decreases_with_voltage() {
        let cell = stc_cell();
        let config = EquationConfig::default();

        let voc = cell.open_circuit_voltage(&config).unwrap();

        let mut previous = cell.current_at(ElectricPotential::ZERO, &config).unwrap();
        for k in 1..=20 {
            let v = voc * (f64::from(k) / 20.0);
            let i = cell.current_at(v, &config).unwrap();
            assert!(i <= previous + ElectricCurrent::new::<ampere>(1e-6));
            previous = i;
        }
    }

    #[test]
    fn current_slope_is_negative() {
        let cell = stc_cell();
        let config = EquationConfig::default();

        let v = ElectricPotential::new::<volt>(150.0);
        let i = cell.current_at(v, &config).unwrap();

        assert!(cell.current_slope(v, i) < ElectricalConductance::ZERO);
    }

    #[test]
    fn rejects_non_positive_irradiance() {
        let parameters = reference_parameters();

        let result = ResolvedCell::new(
            &parameters,
            OperatingPoint::new(
                Irradiance::new::<watt_per_square_meter>(0.0),
                ThermodynamicTemperature::new::<degree_celsius>(25.0),
            ),
        );

        assert!(matches!(
            result,
            Err(ConvergenceError::InfeasibleOperatingPoint { .. })
        ));
    }

    #[test]
    fn resolving_at_reference_reproduces_reference_values() {
        let parameters = reference_parameters();
        let cell = stc_cell();

        assert_relative_eq!(
            cell.il.get::<ampere>(),
            parameters.il.get::<ampere>()
        );
        assert_relative_eq!(
            cell.rsh.get::<uom::si::electrical_resistance::ohm>(),
            parameters.shunt.rsh_stc().get::<uom::si::electrical_resistance::ohm>(),
            epsilon = 1e-9
        );
    }
}
