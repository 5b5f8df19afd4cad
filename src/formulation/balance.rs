//! The energy balance of each load zone.
use crate::model::Model;
use crate::optimisation::{KeysWithOffset, LinearExpr, Problem};
use crate::timescale::TimepointID;
use crate::zone::ZoneID;
use indexmap::IndexMap;

/// Keys for the zone balance constraints
pub type ZoneBalanceKeys = KeysWithOffset<(ZoneID, TimepointID)>;

/// Injections into and withdrawals from each zone, collected as the problem is formulated
#[derive(Debug, Default)]
pub struct ZoneBalance {
    injections: IndexMap<(ZoneID, TimepointID), LinearExpr>,
    withdrawals: IndexMap<(ZoneID, TimepointID), LinearExpr>,
}

impl ZoneBalance {
    /// Add power flowing into a zone
    pub fn add_injection(&mut self, zone: &ZoneID, tp: &TimepointID, expr: impl Into<LinearExpr>) {
        *self
            .injections
            .entry((zone.clone(), tp.clone()))
            .or_default() += expr.into();
    }

    /// Add power flowing out of a zone, in addition to demand
    pub fn add_withdrawal(&mut self, zone: &ZoneID, tp: &TimepointID, expr: impl Into<LinearExpr>) {
        *self
            .withdrawals
            .entry((zone.clone(), tp.clone()))
            .or_default() += expr.into();
    }
}

/// Add a constraint that supply meets demand in every zone and timepoint.
///
/// The constraints are added as one contiguous block so that their duals (the marginal cost of
/// energy) can be read from the solution.
pub fn add_zone_balance_constraints(
    problem: &mut Problem,
    model: &Model,
    balance: &ZoneBalance,
) -> ZoneBalanceKeys {
    let mut keys = ZoneBalanceKeys::new(problem.num_rows());
    for zone in model.zones.values() {
        for tp in model.timescales.timepoints.keys() {
            let key = (zone.id.clone(), tp.clone());
            let mut net = balance.injections.get(&key).cloned().unwrap_or_default();
            if let Some(withdrawal) = balance.withdrawals.get(&key) {
                net -= withdrawal;
            }
            let row = problem.add_eq(&net, zone.demand_in(tp).value());
            keys.push(key, row);
        }
    }

    keys
}
