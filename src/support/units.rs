//! Extensions to [`uom`].
//!
//! This crate uses [`uom`] for all physical units (e.g., voltage, current,
//! irradiance, temperature). This module provides extensions that are useful
//! for photovoltaic modeling but aren't included in [`uom`].
//!
//! ## Temperature differences
//!
//! The [`TemperatureDifference`] trait provides a [`minus`](TemperatureDifference::minus) method
//! for subtracting one absolute temperature from another to get a temperature interval:
//!
//! ```
//! use uom::si::f64::ThermodynamicTemperature;
//! use uom::si::thermodynamic_temperature::kelvin;
//! use pv_models::support::units::TemperatureDifference;
//!
//! let t1 = ThermodynamicTemperature::new::<kelvin>(300.0);
//! let t2 = ThermodynamicTemperature::new::<kelvin>(250.0);
//! let delta_t = t1.minus(t2);
//! // delta_t is a TemperatureInterval, not a ThermodynamicTemperature
//! ```
//!
//! This extension trait is currently needed due to limitations in [`uom`].
//! See [`TemperatureDifference`] for details.
//!
//! ## Temperature coefficients
//!
//! Datasheets quote electrical temperature coefficients in percent per degree
//! Celsius. [`percent_per_celsius`] converts such a value into a fractional
//! [`TemperatureCoefficient`] quantity that composes dimensionally with the
//! rest of the model.

mod quantities;
mod temperature_difference;

pub use quantities::{
    Irradiance, TemperatureCoefficient, fraction_per_kelvin, per_kelvin, percent_per_celsius,
};
pub use temperature_difference::TemperatureDifference;
