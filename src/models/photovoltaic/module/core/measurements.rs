//! Processing of measured I–V data into ratings and target responses.
//!
//! Flash-test data arrives either as full I–V sweeps or as key points per
//! condition. Full sweeps reduce to key points; key points at multiple
//! conditions reduce to reference-condition ratings, temperature
//! coefficients, and a target response table for the series-resistance
//! calibration.

use thiserror::Error;
use uom::si::{
    electric_current::ampere,
    electric_potential::volt,
    f64::{ElectricCurrent, ElectricPotential, Power, ThermodynamicTemperature},
    heat_flux_density::watt_per_square_meter,
    power::watt,
    thermodynamic_temperature::kelvin,
};

use crate::support::units::{Irradiance, TemperatureCoefficient, fraction_per_kelvin};

use super::{
    eir::{EirPoint, EirTable},
    input::{ModuleRatings, OperatingPoint},
    iv_curve::IvPoint,
};

/// Minimum sample count for a measured sweep.
pub const MIN_CURVE_POINTS: usize = 40;

/// Condition-matching half-widths for grouping measured data.
const TEMPERATURE_MATCH_KELVIN: f64 = 0.5;
const IRRADIANCE_MATCH: f64 = 0.5;

/// A measured I–V sweep at one irradiance and temperature condition.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasuredCurve {
    /// Conditions the sweep was taken at.
    pub at: OperatingPoint,

    /// Measured samples, in any order.
    pub points: Vec<IvPoint>,
}

/// Key electrical points extracted from one measured condition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyPoints {
    /// Conditions the points apply to.
    pub at: OperatingPoint,

    /// Short-circuit current.
    pub isc: ElectricCurrent,

    /// Open-circuit voltage.
    pub voc: ElectricPotential,

    /// Current at maximum power.
    pub imp: ElectricCurrent,

    /// Voltage at maximum power.
    pub vmp: ElectricPotential,

    /// Maximum power.
    pub pmp: Power,
}

/// Reference ratings, coefficients, and target response distilled from
/// measured key points.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementSummary {
    /// Key points at the reference conditions.
    pub reference: KeyPoints,

    /// Short-circuit current coefficient, present with a temperature sweep.
    pub isc_coefficient: Option<TemperatureCoefficient>,

    /// Open-circuit voltage coefficient, present with a temperature sweep.
    pub voc_coefficient: Option<TemperatureCoefficient>,

    /// Power coefficient, present with a temperature sweep.
    pub power_coefficient: Option<TemperatureCoefficient>,

    /// Measured relative-efficiency target, present with an irradiance sweep.
    pub response: Option<EirTable>,
}

impl MeasurementSummary {
    /// Assembles datasheet-style ratings from the summary.
    ///
    /// The cell count and bandgap are not measurable from I–V data and must
    /// be supplied.
    ///
    /// # Errors
    ///
    /// Returns [`MeasurementError::MissingTemperatureSweep`] when the data
    /// held no temperature sweep to derive coefficients from.
    pub fn to_ratings(
        &self,
        cells_in_series: u32,
        bandgap: ElectricPotential,
    ) -> Result<ModuleRatings, MeasurementError> {
        let (Some(mu_isc), Some(mu_voc), Some(mu_pmp)) = (
            self.isc_coefficient,
            self.voc_coefficient,
            self.power_coefficient,
        ) else {
            return Err(MeasurementError::MissingTemperatureSweep);
        };

        Ok(ModuleRatings {
            isc: self.reference.isc,
            voc: self.reference.voc,
            imp: self.reference.imp,
            vmp: self.reference.vmp,
            pmp: self.reference.pmp,
            mu_isc,
            mu_voc,
            mu_pmp,
            cells_in_series,
            bandgap,
            g_ref: self.reference.at.irradiance,
            t_ref: self.reference.at.temperature,
        })
    }
}

/// Errors that can occur while processing measured data.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum MeasurementError {
    /// The sweep holds too few samples to trust its interpolations.
    #[error("sweep has {points} samples; at least {required} are required")]
    TooFewPoints { points: usize, required: usize },

    /// No sample at or bracketing zero voltage.
    #[error("sweep never reaches short circuit")]
    NoShortCircuitSample,

    /// Current never falls to zero within or just beyond the sweep.
    #[error("sweep never crosses open circuit")]
    NoOpenCircuitCrossing,

    /// No measurement at the reference conditions.
    #[error("no measurement at the reference conditions")]
    MissingReferenceConditions,

    /// Fewer than two temperatures at the reference irradiance.
    #[error("no temperature sweep at the reference irradiance")]
    MissingTemperatureSweep,
}

/// Reduces a measured sweep to its key electrical points.
///
/// Short-circuit current and open-circuit voltage come from linear
/// interpolation at the axis crossings; the maximum-power point comes from
/// the best sample refined by a parabolic fit through its neighbors.
///
/// # Errors
///
/// Returns a [`MeasurementError`] on sweeps that are too short or never
/// cross an axis.
pub fn extract_key_points(curve: &MeasuredCurve) -> Result<KeyPoints, MeasurementError> {
    if curve.points.len() < MIN_CURVE_POINTS {
        return Err(MeasurementError::TooFewPoints {
            points: curve.points.len(),
            required: MIN_CURVE_POINTS,
        });
    }

    let mut samples: Vec<(f64, f64)> = curve
        .points
        .iter()
        .map(|p| (p.voltage.get::<volt>(), p.current.get::<ampere>()))
        .collect();
    samples.sort_by(|a, b| a.0.total_cmp(&b.0));

    let isc = short_circuit_current(&samples)?;
    let voc = open_circuit_voltage(&samples)?;
    let (vmp, pmp) = maximum_power(&samples);

    Ok(KeyPoints {
        at: curve.at,
        isc: ElectricCurrent::new::<ampere>(isc),
        voc: ElectricPotential::new::<volt>(voc),
        imp: ElectricCurrent::new::<ampere>(pmp / vmp),
        vmp: ElectricPotential::new::<volt>(vmp),
        pmp: Power::new::<watt>(pmp),
    })
}

/// Distills key points at multiple conditions into ratings material.
///
/// The entry at the reference conditions supplies the ratings; entries at
/// the reference irradiance and other temperatures supply the coefficients
/// by least-squares regression; entries at the reference temperature and
/// other irradiances supply the measured relative-efficiency target.
///
/// # Errors
///
/// Returns [`MeasurementError::MissingReferenceConditions`] when no entry
/// matches the reference conditions.
pub fn summarize_key_points(
    points: &[KeyPoints],
    reference: OperatingPoint,
) -> Result<MeasurementSummary, MeasurementError> {
    let at_reference = points
        .iter()
        .find(|p| matches_conditions(p.at, reference))
        .copied()
        .ok_or(MeasurementError::MissingReferenceConditions)?;

    let temperature_sweep: Vec<&KeyPoints> = points
        .iter()
        .filter(|p| matches_irradiance(p.at.irradiance, reference.irradiance))
        .collect();

    let coefficients = if temperature_sweep.len() >= 2 {
        let temps: Vec<f64> = temperature_sweep
            .iter()
            .map(|p| p.at.temperature.get::<kelvin>())
            .collect();

        let coefficient = |values: Vec<f64>, reference_value: f64| {
            fraction_per_kelvin(least_squares_slope(&temps, &values) / reference_value)
        };

        Some((
            coefficient(
                temperature_sweep.iter().map(|p| p.isc.get::<ampere>()).collect(),
                at_reference.isc.get::<ampere>(),
            ),
            coefficient(
                temperature_sweep.iter().map(|p| p.voc.get::<volt>()).collect(),
                at_reference.voc.get::<volt>(),
            ),
            coefficient(
                temperature_sweep.iter().map(|p| p.pmp.get::<watt>()).collect(),
                at_reference.pmp.get::<watt>(),
            ),
        ))
    } else {
        None
    };

    let irradiance_sweep: Vec<&KeyPoints> = points
        .iter()
        .filter(|p| matches_temperature(p.at.temperature, reference.temperature))
        .collect();

    let response = (irradiance_sweep.len() >= 2).then(|| {
        let reference_yield =
            (at_reference.pmp / reference.irradiance).get::<uom::si::area::square_meter>();

        EirTable {
            points: irradiance_sweep
                .iter()
                .map(|p| EirPoint {
                    at: p.at,
                    relative_efficiency: (p.pmp / p.at.irradiance)
                        .get::<uom::si::area::square_meter>()
                        / reference_yield,
                })
                .collect(),
        }
    });

    let (isc_coefficient, voc_coefficient, power_coefficient) = match coefficients {
        Some((isc, voc, pmp)) => (Some(isc), Some(voc), Some(pmp)),
        None => (None, None, None),
    };

    Ok(MeasurementSummary {
        reference: at_reference,
        isc_coefficient,
        voc_coefficient,
        power_coefficient,
        response,
    })
}

fn matches_conditions(a: OperatingPoint, reference: OperatingPoint) -> bool {
    matches_temperature(a.temperature, reference.temperature)
        && matches_irradiance(a.irradiance, reference.irradiance)
}

fn matches_temperature(a: ThermodynamicTemperature, b: ThermodynamicTemperature) -> bool {
    (a.get::<kelvin>() - b.get::<kelvin>()).abs() < TEMPERATURE_MATCH_KELVIN
}

fn matches_irradiance(a: Irradiance, b: Irradiance) -> bool {
    (a.get::<watt_per_square_meter>() - b.get::<watt_per_square_meter>()).abs() < IRRADIANCE_MATCH
}

/// Current at zero voltage from the sorted samples.
fn short_circuit_current(samples: &[(f64, f64)]) -> Result<f64, MeasurementError> {
    let first = samples[0];
    if first.0 > IRRADIANCE_MATCH {
        return Err(MeasurementError::NoShortCircuitSample);
    }
    if first.0 >= 0.0 && first.0 <= f64::EPSILON {
        return Ok(first.1);
    }

    // Interpolate across the pair bracketing v = 0, or extrapolate from the
    // first two samples when the sweep starts just above zero.
    let pair = samples
        .windows(2)
        .find(|w| w[0].0 <= 0.0 && w[1].0 > 0.0)
        .map_or((samples[0], samples[1]), |w| (w[0], w[1]));

    Ok(interpolate_y_at_x(pair.0, pair.1, 0.0))
}

/// Voltage at zero current from the sorted samples.
fn open_circuit_voltage(samples: &[(f64, f64)]) -> Result<f64, MeasurementError> {
    if let Some(w) = samples
        .windows(2)
        .find(|w| w[0].1 >= 0.0 && w[1].1 < 0.0)
    {
        return Ok(interpolate_x_at_y(w[0], w[1], 0.0));
    }

    // No crossing measured: extrapolate the final slope to zero current.
    let n = samples.len();
    let (a, b) = (samples[n - 2], samples[n - 1]);
    if b.1 >= a.1 {
        return Err(MeasurementError::NoOpenCircuitCrossing);
    }

    let voc = interpolate_x_at_y(a, b, 0.0);
    if voc < b.0 {
        return Err(MeasurementError::NoOpenCircuitCrossing);
    }
    Ok(voc)
}

/// Voltage and power at the maximum-power sample, refined by a parabolic
/// fit through the neighboring samples.
fn maximum_power(samples: &[(f64, f64)]) -> (f64, f64) {
    let powers: Vec<f64> = samples.iter().map(|(v, i)| v * i).collect();
    let best = powers
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(k, _)| k)
        .unwrap_or(0);

    if best == 0 || best == samples.len() - 1 {
        return (samples[best].0, powers[best]);
    }

    let (x0, y0) = (samples[best - 1].0, powers[best - 1]);
    let (x1, y1) = (samples[best].0, powers[best]);
    let (x2, y2) = (samples[best + 1].0, powers[best + 1]);

    // Vertex of the parabola through the three samples.
    let d0 = (y1 - y0) / (x1 - x0);
    let d1 = (y2 - y1) / (x2 - x1);
    let curvature = (d1 - d0) / (x2 - x0);
    if curvature >= 0.0 {
        return (x1, y1);
    }

    let vertex = (x0 + x1) / 2.0 - d0 / (2.0 * curvature);
    let power = y1 + curvature * (vertex - x1) * (vertex - x1)
        + (d0 + curvature * (x1 - x0)) * (vertex - x1);

    if power > y1 {
        (vertex, power)
    } else {
        (x1, y1)
    }
}

fn interpolate_y_at_x(a: (f64, f64), b: (f64, f64), x: f64) -> f64 {
    a.1 + (b.1 - a.1) * (x - a.0) / (b.0 - a.0)
}

fn interpolate_x_at_y(a: (f64, f64), b: (f64, f64), y: f64) -> f64 {
    a.0 + (b.0 - a.0) * (y - a.1) / (b.1 - a.1)
}

fn least_squares_slope(xs: &[f64], ys: &[f64]) -> f64 {
    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;

    let covariance: f64 = xs
        .iter()
        .zip(ys)
        .map(|(x, y)| (x - mean_x) * (y - mean_y))
        .sum();
    let variance: f64 = xs.iter().map(|x| (x - mean_x) * (x - mean_x)).sum();

    covariance / variance
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use uom::si::thermodynamic_temperature::degree_celsius;

    use crate::models::photovoltaic::module::core::iv_curve::{CurveConfig, generate_iv_curve};
    use crate::models::photovoltaic::module::core::test_support::{
        reference_parameters, thin_film_ratings,
    };

    fn synthetic_curve() -> MeasuredCurve {
        let parameters = reference_parameters();
        let at = OperatingPoint::new(parameters.g_ref, parameters.t_ref);
        let curve = generate_iv_curve(&parameters, at, 201, &CurveConfig::default()).unwrap();

        MeasuredCurve {
            at,
            points: curve.points,
        }
    }

    fn key_points_at(t_celsius: f64, g: f64, isc: f64, voc: f64, pmp: f64) -> KeyPoints {
        let vmp = voc * 0.85;
        KeyPoints {
            at: OperatingPoint::new(
                Irradiance::new::<watt_per_square_meter>(g),
                ThermodynamicTemperature::new::<degree_celsius>(t_celsius),
            ),
            isc: ElectricCurrent::new::<ampere>(isc),
            voc: ElectricPotential::new::<volt>(voc),
            imp: ElectricCurrent::new::<ampere>(pmp / vmp),
            vmp: ElectricPotential::new::<volt>(vmp),
            pmp: Power::new::<watt>(pmp),
        }
    }

    #[test]
    fn recovers_key_points_from_a_synthetic_sweep() {
        let ratings = thin_film_ratings();
        let key = extract_key_points(&synthetic_curve()).unwrap();

        assert_relative_eq!(
            key.isc.get::<ampere>(),
            ratings.isc.get::<ampere>(),
            max_relative = 5e-3
        );
        assert_relative_eq!(
            key.voc.get::<volt>(),
            ratings.voc.get::<volt>(),
            max_relative = 5e-3
        );
        assert_relative_eq!(
            key.pmp.get::<watt>(),
            (ratings.imp * ratings.vmp).get::<watt>(),
            max_relative = 0.01
        );
    }

    #[test]
    fn rejects_short_sweeps() {
        let mut curve = synthetic_curve();
        curve.points.truncate(10);

        assert!(matches!(
            extract_key_points(&curve),
            Err(MeasurementError::TooFewPoints {
                points: 10,
                required: MIN_CURVE_POINTS
            })
        ));
    }

    #[test]
    fn summarizes_sweeps_into_coefficients_and_response() {
        let reference = OperatingPoint::new(
            Irradiance::new::<watt_per_square_meter>(1000.0),
            ThermodynamicTemperature::new::<degree_celsius>(25.0),
        );

        // Temperature sweep at 1000 W/m² with a -0.35 %/°C power slope and
        // an irradiance sweep at 25 °C.
        let points = vec![
            key_points_at(15.0, 1000.0, 1.745, 90.31, 118.53),
            key_points_at(25.0, 1000.0, 1.749, 89.71, 114.52),
            key_points_at(50.0, 1000.0, 1.759, 88.21, 104.50),
            key_points_at(25.0, 800.0, 1.399, 88.85, 91.85),
            key_points_at(25.0, 600.0, 1.049, 87.75, 68.68),
            key_points_at(25.0, 400.0, 0.700, 86.27, 45.29),
            key_points_at(25.0, 200.0, 0.350, 83.67, 21.88),
        ];

        let summary = summarize_key_points(&points, reference).unwrap();

        assert_relative_eq!(summary.reference.pmp.get::<watt>(), 114.52);

        // The power slope over 15..50 °C is negative; Isc rises slightly.
        let mu_pmp = summary.power_coefficient.unwrap();
        assert!(crate::support::units::per_kelvin(mu_pmp) < 0.0);
        let mu_isc = summary.isc_coefficient.unwrap();
        assert!(crate::support::units::per_kelvin(mu_isc) > 0.0);

        // The response is normalized to the reference entry.
        let response = summary.response.clone().unwrap();
        assert_eq!(response.len(), 5);
        let at_reference = response
            .points
            .iter()
            .find(|p| p.at == reference)
            .unwrap();
        assert_relative_eq!(at_reference.relative_efficiency, 1.0);

        // Ratings assemble once coefficients are present.
        let ratings = summary
            .to_ratings(264, ElectricPotential::new::<volt>(1.5))
            .unwrap();
        assert!(ratings.validate().is_ok());
    }

    #[test]
    fn summary_without_reference_conditions_is_an_error() {
        let reference = OperatingPoint::new(
            Irradiance::new::<watt_per_square_meter>(1000.0),
            ThermodynamicTemperature::new::<degree_celsius>(25.0),
        );
        let points = vec![key_points_at(25.0, 800.0, 1.4, 88.9, 91.9)];

        assert!(matches!(
            summarize_key_points(&points, reference),
            Err(MeasurementError::MissingReferenceConditions)
        ));
    }

    #[test]
    fn summary_without_temperature_sweep_cannot_make_ratings() {
        let reference = OperatingPoint::new(
            Irradiance::new::<watt_per_square_meter>(1000.0),
            ThermodynamicTemperature::new::<degree_celsius>(25.0),
        );
        let points = vec![
            key_points_at(25.0, 1000.0, 1.749, 89.71, 114.52),
            key_points_at(25.0, 600.0, 1.049, 87.75, 68.68),
        ];

        let summary = summarize_key_points(&points, reference).unwrap();
        assert!(summary.power_coefficient.is_none());
        assert!(summary.response.is_some());

        assert!(matches!(
            summary.to_ratings(264, ElectricPotential::new::<volt>(1.5)),
            Err(MeasurementError::MissingTemperatureSweep)
        ));
    }
}
