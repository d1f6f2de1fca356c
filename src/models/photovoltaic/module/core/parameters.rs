//! The single-diode parameter set and its operating-condition dependence.

use uom::si::{
    f64::{ElectricCurrent, ElectricPotential, ElectricalResistance, ThermodynamicTemperature},
    ratio::ratio,
    temperature_interval::kelvin as delta_kelvin,
    thermodynamic_temperature::kelvin as abs_kelvin,
};

use crate::support::constraint::{ConstraintError, ConstraintResult, StrictlyPositive};
use crate::support::units::{Irradiance, TemperatureCoefficient, TemperatureDifference};

use super::constants;

/// Default dark-to-reference shunt resistance multiple.
const DARK_SHUNT_MULTIPLE: f64 = 4.0;

/// Default exponential dependency of shunt resistance on irradiance.
const DEFAULT_EXP_DEPENDENCY: f64 = 5.5;

/// Supported range of the exponential dependency.
const EXP_DEPENDENCY_RANGE: (f64, f64) = (1.0, 100.0);

/// Irradiance-dependent shunt resistance.
///
/// Shunt resistance rises as irradiance falls, approaching the dark value at
/// zero irradiance:
///
/// `Rsh(G) = Rsh_base + (Rsh_dark − Rsh_base)·exp(−δ·G/Gref)`
///
/// where `Rsh_base` is fixed so that `Rsh(Gref)` equals the reference value
/// exactly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShuntModel {
    rsh_stc: ElectricalResistance,
    rsh_dark: ElectricalResistance,
    exp_dependency: f64,
}

impl ShuntModel {
    /// Constructs a validated shunt model.
    ///
    /// # Errors
    ///
    /// Returns an error if either resistance is not strictly positive, the
    /// exponential dependency is outside its supported range, or the implied
    /// base resistance is not positive.
    pub fn new(
        rsh_stc: ElectricalResistance,
        rsh_dark: ElectricalResistance,
        exp_dependency: f64,
    ) -> ConstraintResult<Self> {
        let rsh_stc = StrictlyPositive::new(rsh_stc)?.into_inner();
        let rsh_dark = StrictlyPositive::new(rsh_dark)?.into_inner();

        if exp_dependency.is_nan() {
            return Err(ConstraintError::NotANumber);
        }
        if exp_dependency < EXP_DEPENDENCY_RANGE.0 {
            return Err(ConstraintError::BelowMinimum);
        }
        if exp_dependency > EXP_DEPENDENCY_RANGE.1 {
            return Err(ConstraintError::AboveMaximum);
        }

        let model = Self {
            rsh_stc,
            rsh_dark,
            exp_dependency,
        };
        StrictlyPositive::new(model.base_resistance())?;

        Ok(model)
    }

    /// Constructs a shunt model from the reference-condition resistance,
    /// using the default dark multiple and exponential dependency.
    ///
    /// # Errors
    ///
    /// Returns an error if the resistance is not strictly positive.
    pub fn at_reference(rsh_stc: ElectricalResistance) -> ConstraintResult<Self> {
        Self::new(
            rsh_stc,
            rsh_stc * DARK_SHUNT_MULTIPLE,
            DEFAULT_EXP_DEPENDENCY,
        )
    }

    /// Shunt resistance at the reference irradiance.
    #[must_use]
    pub fn rsh_stc(&self) -> ElectricalResistance {
        self.rsh_stc
    }

    /// Shunt resistance in the dark.
    #[must_use]
    pub fn rsh_dark(&self) -> ElectricalResistance {
        self.rsh_dark
    }

    /// Exponential dependency of shunt resistance on irradiance.
    #[must_use]
    pub fn exp_dependency(&self) -> f64 {
        self.exp_dependency
    }

    /// Asymptotic shunt resistance at high irradiance.
    fn base_resistance(&self) -> ElectricalResistance {
        let decay = (-self.exp_dependency).exp();
        (self.rsh_stc - self.rsh_dark * decay) / (1.0 - decay)
    }

    /// Shunt resistance at the given irradiance.
    #[must_use]
    pub fn at_irradiance(&self, g: Irradiance, g_ref: Irradiance) -> ElectricalResistance {
        let base = self.base_resistance();
        let decay = (-self.exp_dependency * (g / g_ref).get::<ratio>()).exp();
        base + (self.rsh_dark - base) * decay
    }
}

/// The five single-diode parameters at reference conditions, plus the
/// dependence models that carry them to arbitrary operating points.
///
/// Parameter sets are produced whole by the generators and recalculators.
/// There is no partial-update path: to change a field, regenerate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SingleDiodeParameters {
    /// Light-generated current at reference conditions.
    pub il: ElectricCurrent,

    /// Diode reverse saturation current at reference conditions.
    pub i0: ElectricCurrent,

    /// Series resistance.
    pub rs: ElectricalResistance,

    /// Irradiance-dependent shunt resistance.
    pub shunt: ShuntModel,

    /// Diode ideality factor at reference conditions.
    pub gamma: f64,

    /// Fractional temperature dependence of the ideality factor.
    pub mu_gamma: TemperatureCoefficient,

    /// Fractional temperature coefficient of the light current.
    pub mu_il: TemperatureCoefficient,

    /// Bandgap voltage of the cell material.
    pub bandgap: ElectricPotential,

    /// Number of cells in one series string.
    pub cells_in_series: u32,

    /// Physical upper bound on series resistance for the source ratings.
    pub rs_max: ElectricalResistance,

    /// Reference irradiance.
    pub g_ref: Irradiance,

    /// Reference cell temperature.
    pub t_ref: ThermodynamicTemperature,
}

impl SingleDiodeParameters {
    /// Ideality factor at the given cell temperature.
    #[must_use]
    pub fn gamma_at(&self, temperature: ThermodynamicTemperature) -> f64 {
        let delta = temperature.minus(self.t_ref);
        self.gamma * (1.0 + (self.mu_gamma * delta).get::<ratio>())
    }

    /// Light-generated current at the given conditions.
    ///
    /// Scales linearly with the irradiance ratio and with the short-circuit
    /// temperature coefficient.
    #[must_use]
    pub fn light_current_at(
        &self,
        irradiance: Irradiance,
        temperature: ThermodynamicTemperature,
    ) -> ElectricCurrent {
        let g_ratio = (irradiance / self.g_ref).get::<ratio>();
        let delta = temperature.minus(self.t_ref);
        let thermal = 1.0 + (self.mu_il * delta).get::<ratio>();
        self.il * (g_ratio * thermal)
    }

    /// Diode saturation current at the given cell temperature.
    ///
    /// Follows the Arrhenius-type scaling with the bandgap voltage as the
    /// activation energy, reducing exactly to the reference value at `t_ref`.
    #[must_use]
    pub fn saturation_current_at(&self, temperature: ThermodynamicTemperature) -> ElectricCurrent {
        let t = temperature.get::<abs_kelvin>();
        let t_ref = self.t_ref.get::<abs_kelvin>();
        let gamma_t = self.gamma_at(temperature);

        let eg_kelvin =
            self.bandgap * constants::elementary_charge() / constants::boltzmann_constant();
        let exponent = eg_kelvin.get::<delta_kelvin>()
            * (1.0 / (self.gamma * t_ref) - 1.0 / (gamma_t * t));

        self.i0 * ((t / t_ref).powi(3) * exponent.exp())
    }

    /// Modified ideality voltage `Ns·γ(T)·Vt(T)`.
    #[must_use]
    pub fn ideality_voltage(&self, temperature: ThermodynamicTemperature) -> ElectricPotential {
        constants::thermal_voltage(temperature)
            * (f64::from(self.cells_in_series) * self.gamma_at(temperature))
    }
}
