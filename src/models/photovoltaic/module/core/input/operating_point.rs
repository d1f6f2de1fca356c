use uom::si::f64::ThermodynamicTemperature;

use crate::support::units::Irradiance;

/// Irradiance and cell temperature for a single model query.
///
/// Operating points are constructed per query and never persisted by the
/// engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OperatingPoint {
    /// Plane-of-array irradiance on the module.
    pub irradiance: Irradiance,

    /// Cell temperature.
    pub temperature: ThermodynamicTemperature,
}

impl OperatingPoint {
    /// Constructs an operating point.
    #[must_use]
    pub fn new(irradiance: Irradiance, temperature: ThermodynamicTemperature) -> Self {
        Self {
            irradiance,
            temperature,
        }
    }
}
