use uom::si::{
    ISQ, Quantity, SI,
    f64::{Ratio, TemperatureInterval},
    ratio::ratio,
    temperature_interval::kelvin,
};
use uom::typenum::{N1, Z0};

/// Irradiance, W/m² in SI.
///
/// [`uom`] models this dimension as a heat flux density; the alias names it
/// for the plane-of-array irradiance it represents throughout this crate.
/// Construct values with `uom::si::heat_flux_density::watt_per_square_meter`.
pub type Irradiance = uom::si::f64::HeatFluxDensity;

/// Fractional temperature coefficient, 1/K in SI.
///
/// A relative change per unit temperature change, e.g. the datasheet
/// short-circuit current coefficient expressed as a fraction (not percent).
pub type TemperatureCoefficient = Quantity<ISQ<Z0, Z0, Z0, Z0, N1, Z0, Z0>, SI<f64>, f64>;

/// Builds a [`TemperatureCoefficient`] from a fractional change per kelvin.
#[must_use]
pub fn fraction_per_kelvin(value: f64) -> TemperatureCoefficient {
    Ratio::new::<ratio>(value) / TemperatureInterval::new::<kelvin>(1.0)
}

/// Builds a [`TemperatureCoefficient`] from a datasheet value in %/°C.
///
/// # Example
///
/// ```
/// use pv_models::support::units::percent_per_celsius;
/// use uom::si::{f64::TemperatureInterval, ratio::ratio, temperature_interval::kelvin};
///
/// // A power coefficient of -0.32 %/°C over a 10 K rise is a -3.2% change.
/// let mu = percent_per_celsius(-0.32);
/// let change = mu * TemperatureInterval::new::<kelvin>(10.0);
/// assert!((change.get::<ratio>() + 0.032).abs() < 1e-12);
/// ```
#[must_use]
pub fn percent_per_celsius(value: f64) -> TemperatureCoefficient {
    fraction_per_kelvin(value / 100.0)
}

/// Returns the fractional change per kelvin a coefficient represents.
#[must_use]
pub fn per_kelvin(coefficient: TemperatureCoefficient) -> f64 {
    (coefficient * TemperatureInterval::new::<kelvin>(1.0)).get::<ratio>()
}
