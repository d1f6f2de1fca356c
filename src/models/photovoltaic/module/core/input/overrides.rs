use uom::si::f64::{ElectricPotential, ElectricalResistance};

use crate::support::constraint::{Constrained, NonNegative, StrictlyPositive};

use super::super::parameters::ShuntModel;

/// Caller-fixed fields for the advanced parameter recalculation.
///
/// Any field left as `None` keeps its value from the parameter set being
/// recalculated. Overridden fields are held fixed while the dependent
/// parameters are re-derived against the reference boundary conditions.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParameterOverrides {
    /// Series resistance to hold fixed.
    pub rs: Option<Constrained<ElectricalResistance, NonNegative>>,

    /// Shunt resistance model to hold fixed.
    pub shunt: Option<ShuntModel>,

    /// Bandgap voltage to hold fixed.
    pub bandgap: Option<Constrained<ElectricPotential, StrictlyPositive>>,
}

impl ParameterOverrides {
    /// Overrides only the shunt resistance model.
    ///
    /// This is the common manual-tuning move: pick a new shunt model to
    /// reshape the low-light behavior and let the recalculation restore the
    /// reference boundary conditions.
    #[must_use]
    pub fn shunt(shunt: ShuntModel) -> Self {
        Self {
            shunt: Some(shunt),
            ..Self::default()
        }
    }

    /// Overrides only the series resistance.
    #[must_use]
    pub fn series_resistance(rs: Constrained<ElectricalResistance, NonNegative>) -> Self {
        Self {
            rs: Some(rs),
            ..Self::default()
        }
    }
}
