use thiserror::Error;
use uom::si::f64::{
    ElectricCurrent, ElectricPotential, ElectricalResistance, Power, ThermodynamicTemperature,
};
use uom::si::{electric_potential::volt, thermodynamic_temperature::kelvin};

use crate::support::constraint::{Constraint, StrictlyPositive};
use crate::support::units::{Irradiance, TemperatureCoefficient};

use super::OperatingPoint;

/// Fractional tolerance on the `pmp ≈ imp·vmp` consistency check.
const POWER_TOLERANCE: f64 = 0.01;

/// Supported bandgap voltage range, V.
const BANDGAP_RANGE: (f64, f64) = (0.5, 4.0);

/// Datasheet electrical ratings of a module at its reference conditions.
///
/// All values come straight from a manufacturer datasheet. The generators
/// call [`ModuleRatings::validate`] on entry, so a struct holding
/// inconsistent values never reaches a solver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModuleRatings {
    /// Short-circuit current at reference conditions.
    pub isc: ElectricCurrent,

    /// Open-circuit voltage at reference conditions.
    pub voc: ElectricPotential,

    /// Current at the maximum-power point.
    pub imp: ElectricCurrent,

    /// Voltage at the maximum-power point.
    pub vmp: ElectricPotential,

    /// Rated maximum power.
    pub pmp: Power,

    /// Fractional temperature coefficient of the short-circuit current.
    pub mu_isc: TemperatureCoefficient,

    /// Fractional temperature coefficient of the open-circuit voltage.
    pub mu_voc: TemperatureCoefficient,

    /// Fractional temperature coefficient of the maximum power.
    pub mu_pmp: TemperatureCoefficient,

    /// Number of cells in one series string.
    pub cells_in_series: u32,

    /// Bandgap voltage of the cell material.
    pub bandgap: ElectricPotential,

    /// Reference irradiance at which the ratings apply.
    pub g_ref: Irradiance,

    /// Reference cell temperature at which the ratings apply.
    pub t_ref: ThermodynamicTemperature,
}

impl ModuleRatings {
    /// Checks the physical ordering invariants of the ratings.
    ///
    /// # Errors
    ///
    /// Returns an [`InvalidRatingsError`] describing the first violated
    /// invariant.
    pub fn validate(&self) -> Result<(), InvalidRatingsError> {
        require_positive(&self.isc, "isc")?;
        require_positive(&self.voc, "voc")?;
        require_positive(&self.imp, "imp")?;
        require_positive(&self.vmp, "vmp")?;
        require_positive(&self.pmp, "pmp")?;
        require_positive(&self.g_ref, "g_ref")?;

        if self.t_ref.get::<kelvin>() <= 0.0 {
            return Err(InvalidRatingsError::NonPositive { name: "t_ref" });
        }

        if self.cells_in_series == 0 {
            return Err(InvalidRatingsError::NoCells);
        }

        if self.imp >= self.isc {
            return Err(InvalidRatingsError::CurrentOrdering {
                isc: self.isc,
                imp: self.imp,
            });
        }

        if self.vmp >= self.voc {
            return Err(InvalidRatingsError::VoltageOrdering {
                voc: self.voc,
                vmp: self.vmp,
            });
        }

        let product = self.imp * self.vmp;
        let mismatch = (self.pmp - product).abs();
        if mismatch > self.pmp * POWER_TOLERANCE {
            return Err(InvalidRatingsError::PowerMismatch {
                pmp: self.pmp,
                product,
            });
        }

        let bandgap = self.bandgap.get::<volt>();
        if !(bandgap > BANDGAP_RANGE.0 && bandgap < BANDGAP_RANGE.1) {
            return Err(InvalidRatingsError::BandgapRange {
                bandgap: self.bandgap,
            });
        }

        Ok(())
    }

    /// Returns the reference operating point of the ratings.
    #[must_use]
    pub fn reference_conditions(&self) -> OperatingPoint {
        OperatingPoint::new(self.g_ref, self.t_ref)
    }

    /// Physical upper bound on series resistance for these ratings.
    ///
    /// At this value the voltage drop from the maximum-power point to open
    /// circuit is pure series resistance; satisfying the boundary conditions
    /// beyond it requires a non-physical shunt.
    #[must_use]
    pub fn maximum_series_resistance(&self) -> ElectricalResistance {
        (self.voc - self.vmp) / self.imp
    }
}

fn require_positive<T>(value: &T, name: &'static str) -> Result<(), InvalidRatingsError>
where
    T: PartialOrd + num_traits::Zero,
{
    StrictlyPositive::check(value).map_err(|_| InvalidRatingsError::NonPositive { name })
}

/// Errors describing physically inconsistent module ratings.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum InvalidRatingsError {
    /// A rating that must be strictly positive is zero, negative, or NaN.
    #[error("rating `{name}` must be strictly positive")]
    NonPositive { name: &'static str },

    /// The maximum-power current must sit strictly below the short-circuit
    /// current.
    #[error("mpp current {imp:?} is not below the short-circuit current {isc:?}")]
    CurrentOrdering {
        isc: ElectricCurrent,
        imp: ElectricCurrent,
    },

    /// The maximum-power voltage must sit strictly below the open-circuit
    /// voltage.
    #[error("mpp voltage {vmp:?} is not below the open-circuit voltage {voc:?}")]
    VoltageOrdering {
        voc: ElectricPotential,
        vmp: ElectricPotential,
    },

    /// The rated power disagrees with the MPP current-voltage product.
    #[error("rated power {pmp:?} is inconsistent with imp·vmp = {product:?}")]
    PowerMismatch { pmp: Power, product: Power },

    /// The series cell count is zero.
    #[error("cell count must be at least 1")]
    NoCells,

    /// The bandgap voltage lies outside the supported range.
    #[error("bandgap voltage {bandgap:?} is outside the supported range")]
    BandgapRange { bandgap: ElectricPotential },
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::models::photovoltaic::module::core::test_support::thin_film_ratings;
    use uom::si::{electric_current::ampere, electrical_resistance::ohm, power::watt};

    #[test]
    fn accepts_consistent_ratings() {
        thin_film_ratings().validate().expect("ratings are valid");
    }

    #[test]
    fn rejects_mpp_current_above_isc() {
        let mut ratings = thin_film_ratings();
        ratings.imp = ratings.isc + ElectricCurrent::new::<ampere>(0.1);
        ratings.pmp = ratings.imp * ratings.vmp;

        assert!(matches!(
            ratings.validate(),
            Err(InvalidRatingsError::CurrentOrdering { .. })
        ));
    }

    #[test]
    fn rejects_mpp_voltage_above_voc() {
        let mut ratings = thin_film_ratings();
        ratings.vmp = ratings.voc;

        assert!(matches!(
            ratings.validate(),
            Err(InvalidRatingsError::VoltageOrdering { .. })
        ));
    }

    #[test]
    fn rejects_inconsistent_rated_power() {
        let mut ratings = thin_film_ratings();
        ratings.pmp = Power::new::<watt>(400.0);

        assert!(matches!(
            ratings.validate(),
            Err(InvalidRatingsError::PowerMismatch { .. })
        ));
    }

    #[test]
    fn rejects_non_positive_ratings() {
        let mut ratings = thin_film_ratings();
        ratings.isc = ElectricCurrent::new::<ampere>(0.0);

        assert!(matches!(
            ratings.validate(),
            Err(InvalidRatingsError::NonPositive { name: "isc" })
        ));
    }

    #[test]
    fn series_resistance_bound_follows_the_knee_slope() {
        let ratings = thin_film_ratings();
        let expected = (225.4 - 192.8) / 2.49;

        approx::assert_relative_eq!(
            ratings.maximum_series_resistance().get::<ohm>(),
            expected,
            epsilon = 1e-9
        );
    }
}
