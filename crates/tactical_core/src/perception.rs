//! Noticing and forgetting other units and ground treasure.
//!
//! A unit notices everything within its `perception` radius (inclusive,
//! measured between continuous positions). Units that drop out of sight are
//! remembered for `intelligence` seconds of continuous invisibility. Both
//! directions of the relationship are kept: the perceiver's `noticed` map and
//! the target's `noticed_by` set always agree.

use std::collections::BTreeMap;

use tracing::{debug, trace};

use crate::ids::{TreasureId, UnitId};
use crate::map::Map;
use crate::math::{Fixed, Vec2Fixed};
use crate::tile::TileCoord;

/// Refresh `unit`'s memory after `dt` seconds.
pub fn refresh(map: &mut Map, unit: UnitId, dt: Fixed) {
    let Some(me) = map.unit(unit) else {
        return;
    };
    let position = me.position();
    let radius = Fixed::from_num(me.stats().perception);
    let memory_span = Fixed::from_num(me.stats().intelligence);
    let seeks_loot = map.seeks_loot(me.allegiance);

    let others: Vec<(UnitId, Vec2Fixed)> = map
        .units()
        .filter(|(other, u)| *other != unit && !u.is_dead())
        .map(|(other, u)| (other, u.position()))
        .collect();

    for (other, other_position) in others {
        if position.within(other_position, radius) {
            notice_unit(map, unit, other);
        } else {
            fade_unit(map, unit, other, dt, memory_span);
        }
    }

    if seeks_loot {
        scan_treasure(map, unit, position, radius);
    }
    prune_treasure(map, unit);
}

fn notice_unit(map: &mut Map, unit: UnitId, other: UnitId) {
    let Some(me) = map.unit_mut(unit) else {
        return;
    };
    if me.memory.noticed.insert(other, Fixed::ZERO).is_none() {
        trace!("{} notices {:?}", me.name, other);
    }
    if let Some(target) = map.unit_mut(other) {
        target.memory.noticed_by.insert(unit);
    }
}

fn fade_unit(map: &mut Map, unit: UnitId, other: UnitId, dt: Fixed, memory_span: Fixed) {
    let Some(me) = map.unit_mut(unit) else {
        return;
    };
    let Some(unseen) = me.memory.noticed.get_mut(&other) else {
        return;
    };
    *unseen = unseen.saturating_add(dt);
    if *unseen < memory_span {
        return;
    }

    me.memory.noticed.remove(&other);
    trace!("{} forgets {:?}", me.name, other);
    if let Some(target) = map.unit_mut(other) {
        target.memory.noticed_by.remove(&unit);
    }
}

fn scan_treasure(map: &mut Map, unit: UnitId, position: Vec2Fixed, radius: Fixed) {
    let Some(me) = map.unit(unit) else {
        return;
    };

    let mut visible_tiles: BTreeMap<TileCoord, bool> = BTreeMap::new();
    let mut spotted: Vec<TreasureId> = Vec::new();
    for (id, treasure) in map.treasure_iter() {
        if me.memory.treasure.contains(&id) {
            continue;
        }
        let Some(coord) = treasure.tile() else {
            continue;
        };
        let visible = *visible_tiles
            .entry(coord)
            .or_insert_with(|| position.within(coord.to_position(), radius));
        if visible {
            spotted.push(id);
        }
    }

    if spotted.is_empty() {
        return;
    }
    if let Some(me) = map.unit_mut(unit) {
        debug!("{} spots {} treasure", me.name, spotted.len());
        me.memory.treasure.extend(spotted.iter().copied());
    }
    for id in spotted {
        map.mark_treasure_noticed(id, unit);
    }
}

fn prune_treasure(map: &mut Map, unit: UnitId) {
    let Some(me) = map.unit(unit) else {
        return;
    };
    let gone: Vec<TreasureId> = me
        .memory
        .treasure
        .iter()
        .copied()
        .filter(|&id| map.treasure(id).and_then(|t| t.tile()).is_none())
        .collect();
    if gone.is_empty() {
        return;
    }
    if let Some(me) = map.unit_mut(unit) {
        for id in gone {
            me.memory.treasure.remove(&id);
        }
    }
}
