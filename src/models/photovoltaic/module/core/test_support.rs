use uom::si::{
    electric_current::ampere,
    electric_potential::volt,
    f64::{ElectricCurrent, ElectricPotential, Power, ThermodynamicTemperature},
    heat_flux_density::watt_per_square_meter,
    power::watt,
    thermodynamic_temperature::degree_celsius,
};

use crate::support::units::{Irradiance, percent_per_celsius};

use super::{
    generate::{GenerateConfig, generate_default_parameters},
    input::{ModuleRatings, OperatingPoint},
    parameters::SingleDiodeParameters,
};

/// Datasheet ratings of a 480 W thin-film module with 264 series cells.
pub(super) fn thin_film_ratings() -> ModuleRatings {
    ModuleRatings {
        isc: ElectricCurrent::new::<ampere>(2.62),
        voc: ElectricPotential::new::<volt>(225.4),
        imp: ElectricCurrent::new::<ampere>(2.49),
        vmp: ElectricPotential::new::<volt>(192.8),
        pmp: Power::new::<watt>(480.07),
        mu_isc: percent_per_celsius(0.04),
        mu_voc: percent_per_celsius(-0.28),
        mu_pmp: percent_per_celsius(-0.32),
        cells_in_series: 264,
        bandgap: ElectricPotential::new::<volt>(1.5),
        g_ref: Irradiance::new::<watt_per_square_meter>(1000.0),
        t_ref: ThermodynamicTemperature::new::<degree_celsius>(25.0),
    }
}

/// Default-generated parameters for [`thin_film_ratings`].
pub(super) fn reference_parameters() -> SingleDiodeParameters {
    generate_default_parameters(&thin_film_ratings(), &GenerateConfig::default())
        .expect("fixture ratings must generate")
}

/// A 25 °C grid over the given irradiance levels, W/m².
pub(super) fn irradiance_sweep(levels: &[f64]) -> Vec<OperatingPoint> {
    levels
        .iter()
        .map(|&g| {
            OperatingPoint::new(
                Irradiance::new::<watt_per_square_meter>(g),
                ThermodynamicTemperature::new::<degree_celsius>(25.0),
            )
        })
        .collect()
}
