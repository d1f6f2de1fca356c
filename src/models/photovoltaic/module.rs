//! Single-diode PV module model.
//!
//! The computational core lives in the internal [`core`] module and is
//! re-exported here; this module additionally provides the thin
//! [`twine_core::Model`] adapters.

mod core;

pub use self::core::{
    ConvergenceError, CurveConfig, CurveError, EirPoint, EirTable, EquationConfig,
    GenerateConfig, InvalidRatingsError, IvCurve, IvPoint, KeyPoints, MIN_CURVE_POINTS,
    MaxPowerPoint, MeasuredCurve, MeasurementError, MeasurementSummary,
    ModelConsistencyWarning, ModuleRatings, OperatingPoint, OptimizeConfig, OptimizeError,
    OptimizeOutcome, ParameterGenerationError, ParameterOverrides, ResolvedCell, ShuntModel,
    SingleDiodeParameters, TableShapeError, calculate_effective_irradiance_response, constants,
    extract_key_points, generate_default_parameters, generate_iv_curve, max_power_point,
    optimize_series_resistance, recalculate_advanced_parameters, summarize_key_points,
};

use twine_core::Model;

/// I–V curve generation as a [`Model`].
///
/// Wraps a parameter set and sweep configuration, exposing the operating
/// point as the model input so orchestration layers can sweep conditions
/// without touching the core API.
#[derive(Debug, Clone)]
pub struct IvCurveModel {
    parameters: SingleDiodeParameters,
    num_points: usize,
    config: CurveConfig,
}

impl IvCurveModel {
    /// Constructs an adapter over a parameter set.
    #[must_use]
    pub fn new(parameters: SingleDiodeParameters, num_points: usize, config: CurveConfig) -> Self {
        Self {
            parameters,
            num_points,
            config,
        }
    }
}

impl Model for IvCurveModel {
    type Input = OperatingPoint;
    type Output = IvCurve;
    type Error = CurveError;

    fn call(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
        generate_iv_curve(&self.parameters, *input, self.num_points, &self.config)
    }
}
