//! I–V curve generation and maximum-power solving.

use thiserror::Error;
use uom::si::{
    electric_current::ampere,
    electric_potential::volt,
    f64::{ElectricCurrent, ElectricPotential, Power},
    power::watt,
};

use crate::support::search::GoldenSection;

use super::{
    equation::{ConvergenceError, EquationConfig, ResolvedCell},
    input::OperatingPoint,
    parameters::SingleDiodeParameters,
};

/// Sweep and refinement configuration for curve generation.
#[derive(Debug, Clone, Copy)]
pub struct CurveConfig {
    /// Configuration for the inner current solves.
    pub equation: EquationConfig,

    /// Iteration cap for the golden-section maximum-power refinement.
    pub mpp_max_iters: usize,

    /// Absolute voltage tolerance for the maximum-power refinement.
    pub mpp_voltage_tol: ElectricPotential,

    /// Current rise between adjacent samples reported as a consistency
    /// violation. Set above the current solve tolerance so solver noise does
    /// not trip the check.
    pub monotonicity_tol: ElectricCurrent,
}

impl Default for CurveConfig {
    fn default() -> Self {
        Self {
            equation: EquationConfig::default(),
            mpp_max_iters: 100,
            mpp_voltage_tol: ElectricPotential::new::<volt>(1e-6),
            monotonicity_tol: ElectricCurrent::new::<ampere>(1e-6),
        }
    }
}

/// A single sample of an I–V curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IvPoint {
    /// Terminal voltage.
    pub voltage: ElectricPotential,

    /// Terminal current.
    pub current: ElectricCurrent,
}

/// The maximum-power point of an I–V curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaxPowerPoint {
    /// Voltage at maximum power.
    pub voltage: ElectricPotential,

    /// Current at maximum power.
    pub current: ElectricCurrent,

    /// Maximum power.
    pub power: Power,
}

/// Non-fatal inconsistency found while sweeping a curve.
///
/// A well-posed parameter set produces non-increasing current as voltage
/// rises; a violation signals malformed parameters. The curve is still
/// returned so the caller can inspect it.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("current rises by {rise:?} after sample {index}")]
pub struct ModelConsistencyWarning {
    /// Index of the first sample of the offending pair.
    pub index: usize,

    /// Size of the current rise.
    pub rise: ElectricCurrent,
}

/// An ordered voltage sweep with its maximum-power point.
#[derive(Debug, Clone, PartialEq)]
pub struct IvCurve {
    /// Samples ordered from short circuit to open circuit.
    pub points: Vec<IvPoint>,

    /// Maximum-power point, refined beyond the sample spacing.
    pub mpp: MaxPowerPoint,

    /// Consistency warning, if the sweep was not monotonic.
    pub warning: Option<ModelConsistencyWarning>,
}

/// Errors that can occur while generating a curve.
#[derive(Debug, Error)]
pub enum CurveError {
    /// The requested sample count cannot span the voltage range.
    #[error("curve needs at least 2 samples, got {points}")]
    TooFewPoints { points: usize },

    /// A current or voltage solve failed.
    #[error("current solve failed")]
    Convergence(#[from] ConvergenceError),
}

/// Generates an I–V curve at an operating point.
///
/// Voltage samples span `[0, Voc]` inclusive; current at each sample comes
/// from the implicit equation solve. The maximum-power point is taken from
/// the best sample and refined by golden-section search between its
/// bracketing neighbors.
///
/// # Errors
///
/// Returns a [`CurveError`] on fewer than 2 requested samples or when a
/// current solve fails.
pub fn generate_iv_curve(
    parameters: &SingleDiodeParameters,
    at: OperatingPoint,
    num_points: usize,
    config: &CurveConfig,
) -> Result<IvCurve, CurveError> {
    if num_points < 2 {
        return Err(CurveError::TooFewPoints { points: num_points });
    }

    let cell = ResolvedCell::new(parameters, at)?;
    let voc = cell.open_circuit_voltage(&config.equation)?;

    let mut points = Vec::with_capacity(num_points);
    let last = num_points - 1;
    for k in 0..num_points {
        let voltage = if k == last {
            voc
        } else {
            voc * (k as f64 / last as f64)
        };
        let current = cell.current_at(voltage, &config.equation)?;
        points.push(IvPoint { voltage, current });
    }

    let warning = points.windows(2).enumerate().find_map(|(index, pair)| {
        let rise = pair[1].current - pair[0].current;
        (rise > config.monotonicity_tol).then_some(ModelConsistencyWarning { index, rise })
    });

    let best = points
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| {
            let pa = (a.voltage * a.current).get::<watt>();
            let pb = (b.voltage * b.current).get::<watt>();
            pa.total_cmp(&pb)
        })
        .map(|(index, _)| index)
        .unwrap_or(0);

    let lo = points[best.saturating_sub(1)].voltage;
    let hi = points[(best + 1).min(last)].voltage;
    let mut mpp = refine_max_power(&cell, lo, hi, config)?;

    // Keep the sample if refinement landed below it.
    let sample = points[best];
    let sample_power = sample.voltage * sample.current;
    if sample_power > mpp.power {
        mpp = MaxPowerPoint {
            voltage: sample.voltage,
            current: sample.current,
            power: sample_power,
        };
    }

    Ok(IvCurve {
        points,
        mpp,
        warning,
    })
}

/// Solves for the maximum-power point directly, without sampling a curve.
///
/// # Errors
///
/// Propagates failures of the open-circuit and current solves.
pub fn max_power_point(
    cell: &ResolvedCell,
    config: &CurveConfig,
) -> Result<MaxPowerPoint, ConvergenceError> {
    let voc = cell.open_circuit_voltage(&config.equation)?;
    refine_max_power(cell, ElectricPotential::new::<volt>(0.0), voc, config)
}

fn refine_max_power(
    cell: &ResolvedCell,
    lo: ElectricPotential,
    hi: ElectricPotential,
    config: &CurveConfig,
) -> Result<MaxPowerPoint, ConvergenceError> {
    let search = GoldenSection {
        max_iters: config.mpp_max_iters,
        x_tol: config.mpp_voltage_tol.get::<volt>(),
    };

    let best = search.maximize(lo.get::<volt>(), hi.get::<volt>(), |v| {
        cell.power_at(ElectricPotential::new::<volt>(v), &config.equation)
            .map(|p| p.get::<watt>())
    })?;

    let voltage = ElectricPotential::new::<volt>(best.x);
    let current = cell.current_at(voltage, &config.equation)?;

    Ok(MaxPowerPoint {
        voltage,
        current,
        power: voltage * current,
    })
}
