//! Local, one-step-at-a-time movement.
//!
//! There is no route planning. [`step_toward`] looks at the unit's sign
//! vector toward a target and starts a single step onto the matching
//! neighbour, trying a short fixed list of alternatives if that tile is
//! blocked. [`advance`] then slides the unit's continuous position onto the
//! new tile over the following ticks.
//!
//! All calculations use fixed-point math so that seeded runs replay exactly.

use tracing::{trace, warn};

use crate::ids::UnitId;
use crate::map::Map;
use crate::math::{Fixed, Vec2Fixed};
use crate::tile::TileCoord;

/// Result of asking a unit to step toward a point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// A step onto this tile has begun.
    Started(TileCoord),
    /// A previous step is still in progress; nothing changed.
    AlreadyMoving,
    /// The unit already stands on the target.
    AtTarget,
    /// Every candidate tile is off the map, occupied or impassable.
    Blocked,
}

/// Tiles tried, in order, when stepping from `here` in direction `(dx, dy)`.
///
/// The direct step comes first. A diagonal step falls back to its vertical
/// then horizontal component. After that, a step with a vertical component
/// tries the two tiles beside the vertical target (east first), and a purely
/// horizontal step tries the two tiles beside the horizontal target (north
/// first).
#[must_use]
pub fn candidate_steps(here: TileCoord, dx: i32, dy: i32) -> Vec<TileCoord> {
    let mut candidates = vec![here.offset(dx, dy)];
    if dx != 0 && dy != 0 {
        candidates.push(here.offset(0, dy));
        candidates.push(here.offset(dx, 0));
    }
    if dy != 0 {
        candidates.push(here.offset(1, dy));
        candidates.push(here.offset(-1, dy));
    } else if dx != 0 {
        candidates.push(here.offset(dx, 1));
        candidates.push(here.offset(dx, -1));
    }
    candidates.dedup();
    candidates
}

/// Start a single step that brings `unit` closer to `target`.
///
/// Does nothing while a step is already in progress. Starvation (no free
/// tile) is not an error: the unit simply waits this tick.
pub fn step_toward(map: &mut Map, unit: UnitId, target: Vec2Fixed) -> StepOutcome {
    let Some(me) = map.unit(unit) else {
        return StepOutcome::Blocked;
    };
    if me.is_moving() {
        return StepOutcome::AlreadyMoving;
    }
    let (dx, dy) = (target - me.position()).signum();
    if (dx, dy) == (0, 0) {
        return StepOutcome::AtTarget;
    }
    let here = me.tile();

    let Some(destination) = candidate_steps(here, dx, dy)
        .into_iter()
        .find(|&candidate| map.can_step(here, candidate))
    else {
        trace!("{} is blocked at {}", me.name, here);
        return StepOutcome::Blocked;
    };

    match map.begin_move(unit, destination) {
        Ok(()) => StepOutcome::Started(destination),
        Err(err) => {
            warn!("Step toward {:?} failed: {}", target, err);
            StepOutcome::Blocked
        }
    }
}

/// Continue a step in progress by `dt` seconds.
///
/// Speed is `dexterity / 10 × cost(source → destination)` tiles per second.
/// The unit never overshoots: once the remaining distance is covered its
/// position snaps to the tile centre and the step ends.
pub fn advance(map: &mut Map, unit: UnitId, dt: Fixed) {
    let Some(me) = map.unit(unit) else {
        return;
    };
    let Some(source) = me.action().move_source else {
        return;
    };
    let destination = me.tile();
    let position = me.position();
    let dexterity = Fixed::from_num(me.stats().dexterity);

    let cost = match map.cost_between(source, destination) {
        Ok(cost) => cost,
        Err(err) => {
            warn!("{} has a broken step: {}", me.name, err);
            Fixed::ONE
        }
    };
    let distance = dexterity / Fixed::from_num(10) * dt * cost;

    let goal = destination.to_position();
    let remaining = goal - position;
    let arrived = remaining.length() <= distance;

    if let Some(me) = map.unit_mut(unit) {
        if arrived {
            me.position = goal;
            me.action.move_source = None;
        } else {
            me.position = position + remaining.normalize().scale(distance);
        }
    }
    map.notify_unit(unit);
}
