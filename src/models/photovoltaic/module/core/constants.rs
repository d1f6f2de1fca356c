//! Physical constants and reference conditions shared by the module solvers.

use uom::si::{
    electric_charge::coulomb,
    electric_potential::volt,
    energy::joule,
    f64::{
        ElectricCharge, ElectricPotential, Energy, HeatCapacity, TemperatureInterval,
        ThermodynamicTemperature,
    },
    heat_flux_density::watt_per_square_meter,
    temperature_interval::kelvin as delta_kelvin,
    thermodynamic_temperature::{degree_celsius, kelvin as abs_kelvin},
};

use crate::support::units::{Irradiance, TemperatureDifference};

/// Elementary charge, C.
#[must_use]
pub fn elementary_charge() -> ElectricCharge {
    ElectricCharge::new::<coulomb>(1.602_176_634e-19)
}

/// Boltzmann constant, J/K.
#[must_use]
pub fn boltzmann_constant() -> HeatCapacity {
    Energy::new::<joule>(1.380_649e-23) / TemperatureInterval::new::<delta_kelvin>(1.0)
}

/// Absolute zero.
#[must_use]
pub fn absolute_zero() -> ThermodynamicTemperature {
    ThermodynamicTemperature::new::<abs_kelvin>(0.0)
}

/// Thermal voltage `kT/q` at the given cell temperature.
#[must_use]
pub fn thermal_voltage(temperature: ThermodynamicTemperature) -> ElectricPotential {
    boltzmann_constant() * temperature.minus(absolute_zero()) / elementary_charge()
}

/// Standard Test Conditions irradiance, 1000 W/m².
#[must_use]
pub fn stc_irradiance() -> Irradiance {
    Irradiance::new::<watt_per_square_meter>(1000.0)
}

/// Standard Test Conditions cell temperature, 25 °C.
#[must_use]
pub fn stc_temperature() -> ThermodynamicTemperature {
    ThermodynamicTemperature::new::<degree_celsius>(25.0)
}

/// Nominal Operating Cell Temperature rating irradiance, 800 W/m².
#[must_use]
pub fn noct_irradiance() -> Irradiance {
    Irradiance::new::<watt_per_square_meter>(800.0)
}

/// Ambient temperature of the NOCT rating conditions, 20 °C.
#[must_use]
pub fn noct_ambient_temperature() -> ThermodynamicTemperature {
    ThermodynamicTemperature::new::<degree_celsius>(20.0)
}

/// Crystalline silicon bandgap voltage.
///
/// The conventional default when a datasheet does not state the cell
/// material's bandgap.
#[must_use]
pub fn silicon_bandgap() -> ElectricPotential {
    ElectricPotential::new::<volt>(1.121)
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    #[test]
    fn thermal_voltage_at_stc() {
        let vt = thermal_voltage(stc_temperature());
        assert_relative_eq!(vt.get::<volt>(), 0.025_693, epsilon = 1e-6);
    }

    #[test]
    fn reference_conditions() {
        assert_relative_eq!(
            stc_irradiance().get::<watt_per_square_meter>(),
            1000.0
        );
        assert_relative_eq!(stc_temperature().get::<abs_kelvin>(), 298.15);
        assert_relative_eq!(
            noct_irradiance().get::<watt_per_square_meter>(),
            800.0
        );
        assert_relative_eq!(noct_ambient_temperature().get::<abs_kelvin>(), 293.15);
    }
}
