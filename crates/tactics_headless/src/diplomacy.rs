//! Strategic layer backed by a scenario's relation table.

use std::collections::{BTreeMap, BTreeSet};

use tactics_core::interfaces::{Relation, StrategicLayer};
use tactics_core::stack::{EmpireId, SystemId};

use crate::scenario::{RetreatRoute, Scenario};

/// Answers diplomacy and retreat queries from the tables a [`Scenario`]
/// declares. Unlisted pairs of different empires are at war.
#[derive(Debug, Clone, Default)]
pub struct ScenarioDiplomacy {
    relations: BTreeMap<(EmpireId, EmpireId), Relation>,
    grievances: BTreeSet<(EmpireId, EmpireId)>,
    routes: BTreeMap<EmpireId, Vec<RetreatRoute>>,
}

impl ScenarioDiplomacy {
    /// Build the tables for `scenario`.
    #[must_use]
    pub fn from_scenario(scenario: &Scenario) -> Self {
        let relations = scenario
            .relations
            .iter()
            .map(|entry| (key(EmpireId(entry.a), EmpireId(entry.b)), entry.relation))
            .collect();
        let grievances = scenario
            .grievances
            .iter()
            .map(|&(holder, against)| (EmpireId(holder), EmpireId(against)))
            .collect();
        let mut routes: BTreeMap<EmpireId, Vec<RetreatRoute>> = BTreeMap::new();
        for route in &scenario.retreat_routes {
            routes.entry(EmpireId(route.empire)).or_default().push(*route);
        }
        Self {
            relations,
            grievances,
            routes,
        }
    }
}

fn key(a: EmpireId, b: EmpireId) -> (EmpireId, EmpireId) {
    (a.min(b), a.max(b))
}

impl StrategicLayer for ScenarioDiplomacy {
    fn relation(&self, empire: EmpireId, other: EmpireId) -> Relation {
        if empire == other {
            return Relation::Allied;
        }
        self.relations
            .get(&key(empire, other))
            .copied()
            .unwrap_or(Relation::War)
    }

    fn has_grievance(&self, empire: EmpireId, other: EmpireId) -> bool {
        self.grievances.contains(&(empire, other))
    }

    /// Closest route the stack is fast enough for, excluding the battle's
    /// own system. Ties go to the lower system id.
    fn nearest_retreat_system(&self, empire: EmpireId, origin: SystemId, speed: u32) -> Option<SystemId> {
        self.routes
            .get(&empire)?
            .iter()
            .filter(|route| route.system != origin.0 && speed >= route.min_speed)
            .min_by_key(|route| (route.distance, route.system))
            .map(|route| SystemId(route.system))
    }
}

impl From<&Scenario> for ScenarioDiplomacy {
    fn from(scenario: &Scenario) -> Self {
        Self::from_scenario(scenario)
    }
}
