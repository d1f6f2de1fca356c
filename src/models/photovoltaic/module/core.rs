//! Single-diode module model core.
//!
//! A photovoltaic module is represented by the single-diode equivalent
//! circuit: a light-driven current source, a diode, and series and shunt
//! resistances. The core derives the circuit's five parameters from
//! datasheet ratings, evaluates the implicit diode equation at arbitrary
//! operating points, sweeps I–V curves, computes the effective irradiance
//! response, and calibrates series resistance against a measured response.
//!
//! Everything here is synchronous and stateless between calls: each
//! operation takes its full input and returns a fresh result, so calls are
//! safe to issue concurrently with no locking.

pub mod constants;

mod eir;
mod equation;
mod generate;
mod input;
mod iv_curve;
mod measurements;
mod optimize;
mod parameters;

#[cfg(test)]
mod test_support;

pub use eir::{EirPoint, EirTable, TableShapeError, calculate_effective_irradiance_response};
pub use equation::{ConvergenceError, EquationConfig, ResolvedCell};
pub use generate::{
    GenerateConfig, ParameterGenerationError, generate_default_parameters,
    recalculate_advanced_parameters,
};
pub use input::{InvalidRatingsError, ModuleRatings, OperatingPoint, ParameterOverrides};
pub use iv_curve::{
    CurveConfig, CurveError, IvCurve, IvPoint, MaxPowerPoint, ModelConsistencyWarning,
    generate_iv_curve, max_power_point,
};
pub use measurements::{
    KeyPoints, MIN_CURVE_POINTS, MeasuredCurve, MeasurementError, MeasurementSummary,
    extract_key_points, summarize_key_points,
};
pub use optimize::{OptimizeConfig, OptimizeError, OptimizeOutcome, optimize_series_resistance};
pub use parameters::{ShuntModel, SingleDiodeParameters};
