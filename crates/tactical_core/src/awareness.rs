//! Behaviour-state refresh: morale and threat assessment.
//!
//! Runs after perception each tick and derives the unit's
//! [`BehaviourState`] from what it has noticed:
//!
//! - A wounded unit facing a threat breaks and flees. The threshold scales
//!   with bravery: `hp × max × 2 < constitution × (max − bravery)`.
//! - Fleeing lasts `flee_recovery_time × max / bravery` seconds, drained
//!   faster with allies nearby and slower with threats nearby.
//! - Any noticed conscious enemy otherwise means combat.
//! - With no threats, a unit below half HP rests; everyone else explores.

use tracing::debug;

use crate::config::SimConfig;
use crate::ids::UnitId;
use crate::map::Map;
use crate::math::Fixed;
use crate::unit::{BehaviourState, Unit};

/// Allies and threats among a unit's noticed units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Headcount {
    /// Conscious units of the same allegiance.
    pub allies: u32,
    /// Conscious units of another allegiance.
    pub threats: u32,
}

/// Count conscious allies and threats `unit` has noticed.
#[must_use]
pub fn headcount(map: &Map, unit: &Unit) -> Headcount {
    let mut count = Headcount::default();
    for &other in unit.memory().noticed.keys() {
        let Some(other) = map.unit(other) else {
            continue;
        };
        if !other.is_conscious() {
            continue;
        }
        if other.allegiance == unit.allegiance {
            count.allies += 1;
        } else {
            count.threats += 1;
        }
    }
    count
}

/// True when HP is low enough for morale to break.
#[must_use]
pub fn is_shaken(unit: &Unit, config: &SimConfig) -> bool {
    let max = i64::from(config.max_stat_score);
    let bravery = i64::from(unit.stats().bravery).min(max);
    let constitution = i64::from(unit.stats().constitution);
    i64::from(unit.hp()) * max * 2 < constitution * (max - bravery)
}

/// Seconds a unit keeps fleeing once its morale breaks.
#[must_use]
pub fn flee_window(unit: &Unit, config: &SimConfig) -> Fixed {
    let bravery = Fixed::from_num(unit.stats().bravery.max(1));
    config.flee_recovery_time * config.max_stat() / bravery
}

/// Refresh `unit`'s behaviour state after `dt` seconds.
pub fn refresh(map: &mut Map, config: &SimConfig, unit: UnitId, dt: Fixed) {
    let Some(me) = map.unit(unit) else {
        return;
    };
    let count = headcount(map, me);
    let previous = me.behaviour_state();
    let mut flee_timer = me.flee_timer();

    let state = if previous == BehaviourState::Fleeing && flee_timer > Fixed::ZERO {
        let recovery = dt * Fixed::from_num(1 + count.allies) / Fixed::from_num(1 + count.threats);
        flee_timer = (flee_timer - recovery).max(Fixed::ZERO);
        if flee_timer > Fixed::ZERO {
            BehaviourState::Fleeing
        } else {
            settle(me, count)
        }
    } else if count.threats > 0 && is_shaken(me, config) {
        flee_timer = flee_window(me, config);
        BehaviourState::Fleeing
    } else {
        settle(me, count)
    };

    if state == BehaviourState::Fleeing && previous != BehaviourState::Fleeing {
        debug!("{} breaks and flees", me.name);
    }
    let changed = state != previous;
    if let Some(me) = map.unit_mut(unit) {
        me.behaviour_state = state;
        me.flee_timer = if state == BehaviourState::Fleeing {
            flee_timer
        } else {
            Fixed::ZERO
        };
    }
    if changed {
        map.notify_unit(unit);
    }
}

fn settle(unit: &Unit, count: Headcount) -> BehaviourState {
    if count.threats > 0 {
        BehaviourState::Combat
    } else if i64::from(unit.hp()) * 2 < i64::from(unit.stats().constitution) {
        BehaviourState::Resting
    } else {
        BehaviourState::Exploring
    }
}
