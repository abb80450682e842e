//! The tactical map: tile grid, unit and treasure registries.
//!
//! The map is the single owner of simulation state. Every mutation that a
//! renderer could care about goes through a map method, which keeps tile
//! occupancy consistent with unit positions and fires the matching change
//! notification.
//!
//! # Invariants
//!
//! - A tile's occupant is the unit whose current tile it is, and vice versa.
//!   Dead units occupy nothing.
//! - A registered treasure lies on exactly one tile pile, and that pile lists
//!   it exactly once.
//! - Unit update order is registration order and never changes except by
//!   removal.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use tracing::{debug, info};

use crate::error::{Result, TacticalError};
use crate::ids::{TreasureId, UnitId};
use crate::math::Fixed;
use crate::observer::{Observers, SubscriptionId};
use crate::tile::{Direction, Tile, TileCoord};
use crate::treasure::Treasure;
use crate::unit::{Allegiance, HealthState, Unit};

/// RGB display colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Colour {
    /// Red.
    pub r: u8,
    /// Green.
    pub g: u8,
    /// Blue.
    pub b: u8,
}

impl Colour {
    /// Pure green.
    pub const GREEN: Self = Self::new(0, 255, 0);
    /// Pure red.
    pub const RED: Self = Self::new(255, 0, 0);
    /// Pure blue.
    pub const BLUE: Self = Self::new(0, 0, 255);
    /// White, used for allegiances without an entry.
    pub const WHITE: Self = Self::new(255, 255, 255);

    /// Create a colour from components.
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Per-allegiance settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllegianceProfile {
    /// Colour renderers tint units of this allegiance with.
    pub colour: Colour,
    /// Whether units of this allegiance scan the ground for treasure.
    #[serde(default)]
    pub seeks_loot: bool,
}

/// Tile grid plus everything standing or lying on it.
#[derive(Debug)]
pub struct Map {
    width: i32,
    height: i32,
    pub(crate) tiles: Vec<Tile>,
    pub(crate) units: SlotMap<UnitId, Unit>,
    unit_order: Vec<UnitId>,
    pub(crate) treasure: SlotMap<TreasureId, Treasure>,
    allegiances: BTreeMap<Allegiance, AllegianceProfile>,
    terrain_effects: bool,
    pub(crate) observers: Observers,
}

impl Map {
    /// Create an open map. Negative dimensions are treated as zero.
    #[must_use]
    pub fn new(width: i32, height: i32) -> Self {
        let width = width.max(0);
        let height = height.max(0);
        let mut tiles = Vec::with_capacity((width as usize) * (height as usize));
        for y in 0..height {
            for x in 0..width {
                tiles.push(Tile::new(TileCoord::new(x, y)));
            }
        }

        Self {
            width,
            height,
            tiles,
            units: SlotMap::with_key(),
            unit_order: Vec::new(),
            treasure: SlotMap::with_key(),
            allegiances: BTreeMap::new(),
            terrain_effects: true,
            observers: Observers::default(),
        }
    }

    /// Width in tiles.
    #[must_use]
    pub const fn width(&self) -> i32 {
        self.width
    }

    /// Height in tiles.
    #[must_use]
    pub const fn height(&self) -> i32 {
        self.height
    }

    /// Whether tile costs affect movement speed.
    #[must_use]
    pub const fn terrain_effects(&self) -> bool {
        self.terrain_effects
    }

    /// Enable or disable tile costs. Diagonal slowdown always applies.
    pub fn set_terrain_effects(&mut self, enabled: bool) {
        self.terrain_effects = enabled;
    }

    // ------------------------------------------------------------------
    // Tiles
    // ------------------------------------------------------------------

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            return None;
        }
        Some((y as usize) * (self.width as usize) + (x as usize))
    }

    /// Tile at `(x, y)`, or `None` when out of bounds.
    #[must_use]
    pub fn tile_at(&self, x: i32, y: i32) -> Option<&Tile> {
        self.index(x, y).map(|i| &self.tiles[i])
    }

    /// Tile at `coord`, or `None` when out of bounds.
    #[must_use]
    pub fn tile(&self, coord: TileCoord) -> Option<&Tile> {
        self.tile_at(coord.x, coord.y)
    }

    fn tile_mut(&mut self, coord: TileCoord) -> Result<&mut Tile> {
        let index = self
            .index(coord.x, coord.y)
            .ok_or(TacticalError::TileOutOfBounds {
                x: coord.x,
                y: coord.y,
            })?;
        Ok(&mut self.tiles[index])
    }

    /// All tiles in row-major order.
    pub fn tiles(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.iter()
    }

    /// Up to eight in-bounds neighbours of `coord`, in compass order
    /// N, NE, E, SE, S, SW, W, NW.
    pub fn adjacent_tiles(&self, coord: TileCoord) -> impl Iterator<Item = &Tile> + '_ {
        Direction::COMPASS
            .iter()
            .filter_map(move |&direction| self.tile(coord.step(direction)))
    }

    /// Movement cost multiplier for stepping from `from` onto `to`, honouring
    /// the map's terrain effects setting.
    ///
    /// # Errors
    ///
    /// Fails if either tile is out of bounds or the tiles are not neighbours.
    pub fn cost_between(&self, from: TileCoord, to: TileCoord) -> Result<Fixed> {
        let source = self.tile(from).ok_or(TacticalError::TileOutOfBounds {
            x: from.x,
            y: from.y,
        })?;
        let destination = self.tile(to).ok_or(TacticalError::TileOutOfBounds { x: to.x, y: to.y })?;
        source.cost_to_enter_tile(destination, self.terrain_effects)
    }

    /// True when a walking unit could step from `from` onto `to` right now.
    #[must_use]
    pub fn can_step(&self, from: TileCoord, to: TileCoord) -> bool {
        self.tile(to).is_some_and(Tile::is_free)
            && self
                .cost_between(from, to)
                .is_ok_and(|cost| cost > Fixed::ZERO)
    }

    /// Change a tile's sprite.
    ///
    /// # Errors
    ///
    /// Returns [`TacticalError::TileOutOfBounds`] for coordinates off the map.
    pub fn set_tile_sprite(&mut self, coord: TileCoord, sprite: u32) -> Result<()> {
        self.tile_mut(coord)?.sprite = sprite;
        self.notify_tile(coord);
        Ok(())
    }

    /// Change a tile's movement costs.
    ///
    /// # Errors
    ///
    /// Returns [`TacticalError::TileOutOfBounds`] for coordinates off the map.
    pub fn set_tile_costs(&mut self, coord: TileCoord, enter: Fixed, leave: Fixed) -> Result<()> {
        let tile = self.tile_mut(coord)?;
        tile.cost_to_enter = enter;
        tile.cost_to_leave = leave;
        self.notify_tile(coord);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Notifications
    // ------------------------------------------------------------------

    /// Subscribe to tile changes.
    pub fn on_tile_changed(&mut self, callback: impl FnMut(&Tile) + 'static) -> SubscriptionId {
        self.observers.on_tile_changed(callback)
    }

    /// Subscribe to unit changes.
    pub fn on_unit_changed(
        &mut self,
        callback: impl FnMut(UnitId, &Unit) + 'static,
    ) -> SubscriptionId {
        self.observers.on_unit_changed(callback)
    }

    /// Subscribe to treasure changes.
    pub fn on_treasure_changed(
        &mut self,
        callback: impl FnMut(TreasureId, &Treasure) + 'static,
    ) -> SubscriptionId {
        self.observers.on_treasure_changed(callback)
    }

    /// Remove a subscription. Returns `false` if it was not active.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    pub(crate) fn notify_tile(&mut self, coord: TileCoord) {
        if let Some(index) = self.index(coord.x, coord.y) {
            self.observers.tile_changed(&self.tiles[index]);
        }
    }

    pub(crate) fn notify_unit(&mut self, id: UnitId) {
        if let Some(unit) = self.units.get(id) {
            self.observers.unit_changed(id, unit);
        }
    }

    pub(crate) fn notify_treasure(&mut self, id: TreasureId) {
        if let Some(treasure) = self.treasure.get(id) {
            self.observers.treasure_changed(id, treasure);
        }
    }

    // ------------------------------------------------------------------
    // Allegiances
    // ------------------------------------------------------------------

    /// Configure an allegiance.
    pub fn set_allegiance(&mut self, allegiance: Allegiance, profile: AllegianceProfile) {
        self.allegiances.insert(allegiance, profile);
    }

    /// Display colour for an allegiance, if configured.
    #[must_use]
    pub fn allegiance_colour(&self, allegiance: Allegiance) -> Option<Colour> {
        self.allegiances.get(&allegiance).map(|p| p.colour)
    }

    /// Whether units of this allegiance look for treasure.
    #[must_use]
    pub fn seeks_loot(&self, allegiance: Allegiance) -> bool {
        self.allegiances
            .get(&allegiance)
            .is_some_and(|p| p.seeks_loot)
    }

    // ------------------------------------------------------------------
    // Units
    // ------------------------------------------------------------------

    /// Register a unit and occupy its home tile.
    ///
    /// # Errors
    ///
    /// Fails if the home tile is off the map or already occupied.
    pub fn place_unit(&mut self, mut unit: Unit) -> Result<UnitId> {
        let home = unit.tile;
        let tile = self.tile(home).ok_or(TacticalError::TileOutOfBounds {
            x: home.x,
            y: home.y,
        })?;
        if !tile.is_free() {
            return Err(TacticalError::TileOccupied(home));
        }

        unit.position = home.to_position();
        unit.action.move_source = None;
        debug!("Placing {} at {}", unit.name, home);
        let id = self.units.insert(unit);
        self.unit_order.push(id);
        self.tile_mut(home)?.occupant = Some(id);

        self.notify_tile(home);
        self.notify_unit(id);
        Ok(id)
    }

    /// Remove a unit from the map entirely, vacating its tile and erasing it
    /// from every other unit's memory. Carried treasure stays with the unit.
    ///
    /// # Errors
    ///
    /// Returns [`TacticalError::UnitNotFound`] for unknown handles.
    pub fn remove_unit(&mut self, id: UnitId) -> Result<Unit> {
        let mut unit = self.units.remove(id).ok_or(TacticalError::UnitNotFound(id))?;
        self.unit_order.retain(|&other| other != id);

        let memory = unit.forget_everything();
        self.erase_from_memories(id, &memory);

        if let Some(index) = self.index(unit.tile.x, unit.tile.y) {
            if self.tiles[index].occupant == Some(id) {
                self.tiles[index].occupant = None;
                self.notify_tile(unit.tile);
            }
        }
        Ok(unit)
    }

    /// Unit by handle.
    #[must_use]
    pub fn unit(&self, id: UnitId) -> Option<&Unit> {
        self.units.get(id)
    }

    pub(crate) fn unit_mut(&mut self, id: UnitId) -> Option<&mut Unit> {
        self.units.get_mut(id)
    }

    /// Handles of all registered units, in update order.
    #[must_use]
    pub fn unit_ids(&self) -> &[UnitId] {
        &self.unit_order
    }

    /// All registered units, dead ones included, in update order.
    pub fn units(&self) -> impl Iterator<Item = (UnitId, &Unit)> {
        self.unit_order
            .iter()
            .filter_map(|&id| self.units.get(id).map(|unit| (id, unit)))
    }

    /// Number of registered units.
    #[must_use]
    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    /// Change a unit's sprite key.
    ///
    /// # Errors
    ///
    /// Returns [`TacticalError::UnitNotFound`] for unknown handles.
    pub fn set_unit_sprite(&mut self, id: UnitId, sprite: impl Into<String>) -> Result<()> {
        self.unit_mut(id).ok_or(TacticalError::UnitNotFound(id))?.sprite = sprite.into();
        self.notify_unit(id);
        Ok(())
    }

    /// Start a single step onto an adjacent tile.
    ///
    /// Occupancy moves immediately: the unit leaves its old tile and holds
    /// the destination for the whole step. The continuous position catches
    /// up over the following ticks.
    ///
    /// # Errors
    ///
    /// Fails if the unit is unknown, dead or already moving, or the
    /// destination is off the map, not adjacent, occupied or impassable.
    pub fn begin_move(&mut self, id: UnitId, destination: TileCoord) -> Result<()> {
        let unit = self.units.get(id).ok_or(TacticalError::UnitNotFound(id))?;
        if unit.is_dead() {
            return Err(TacticalError::InvalidState(format!(
                "{} cannot move while dead",
                unit.name
            )));
        }
        if unit.is_moving() {
            return Err(TacticalError::AlreadyMoving(id));
        }
        let source = unit.tile;

        let cost = self.cost_between(source, destination)?;
        let target = self.tile(destination).ok_or(TacticalError::TileOutOfBounds {
            x: destination.x,
            y: destination.y,
        })?;
        if !target.is_free() {
            return Err(TacticalError::TileOccupied(destination));
        }
        if cost <= Fixed::ZERO {
            return Err(TacticalError::Impassable {
                from: source,
                to: destination,
            });
        }

        self.tile_mut(source)?.occupant = None;
        self.tile_mut(destination)?.occupant = Some(id);
        if let Some(unit) = self.units.get_mut(id) {
            unit.tile = destination;
            unit.action.move_source = Some(source);
        }

        self.notify_tile(source);
        self.notify_tile(destination);
        self.notify_unit(id);
        Ok(())
    }

    /// Move a unit instantly to any free tile, ignoring tile costs and
    /// cancelling a step in progress.
    ///
    /// # Errors
    ///
    /// Fails if the unit is unknown or dead, or the destination is off the map
    /// or held by another unit.
    pub fn teleport_unit(&mut self, id: UnitId, destination: TileCoord) -> Result<()> {
        let unit = self.units.get(id).ok_or(TacticalError::UnitNotFound(id))?;
        if unit.is_dead() {
            return Err(TacticalError::InvalidState(format!(
                "{} cannot teleport while dead",
                unit.name
            )));
        }
        let source = unit.tile;
        let target = self.tile(destination).ok_or(TacticalError::TileOutOfBounds {
            x: destination.x,
            y: destination.y,
        })?;
        if target.occupant.is_some_and(|other| other != id) {
            return Err(TacticalError::TileOccupied(destination));
        }

        self.tile_mut(source)?.occupant = None;
        self.tile_mut(destination)?.occupant = Some(id);
        if let Some(unit) = self.units.get_mut(id) {
            unit.tile = destination;
            unit.position = destination.to_position();
            unit.action.move_source = None;
        }

        self.notify_tile(source);
        self.notify_tile(destination);
        self.notify_unit(id);
        Ok(())
    }

    /// Set a unit's HP, clamped to `0..=constitution`, applying the health
    /// state transition.
    ///
    /// Reaching zero kills the unit: carried
    /// treasure drops onto its tile, perception memory is cleared in both
    /// directions and the tile is vacated. Dead units stay dead.
    ///
    /// Returns `true` if this call killed the unit.
    ///
    /// # Errors
    ///
    /// Returns [`TacticalError::UnitNotFound`] for unknown handles.
    pub fn set_unit_hp(&mut self, id: UnitId, hp: i32) -> Result<bool> {
        let unit = self.units.get_mut(id).ok_or(TacticalError::UnitNotFound(id))?;
        if unit.is_dead() {
            return Ok(false);
        }
        let max = i32::try_from(unit.stats().constitution).unwrap_or(i32::MAX);
        let hp = hp.clamp(0, max);
        unit.hp = hp;
        let dies = hp == 0 && unit.health_state == HealthState::Conscious;
        if dies {
            self.kill(id)?;
        } else {
            self.notify_unit(id);
        }
        Ok(dies)
    }

    /// Subtract `amount` HP. Returns `true` if the blow was lethal.
    ///
    /// # Errors
    ///
    /// Returns [`TacticalError::UnitNotFound`] for unknown handles.
    pub fn damage_unit(&mut self, id: UnitId, amount: u32) -> Result<bool> {
        let hp = self.units.get(id).ok_or(TacticalError::UnitNotFound(id))?.hp;
        let amount = i32::try_from(amount).unwrap_or(i32::MAX);
        self.set_unit_hp(id, hp.saturating_sub(amount))
    }

    /// Restore up to `amount` HP, capped at constitution. Returns the HP
    /// actually restored. Dead units cannot be healed.
    ///
    /// # Errors
    ///
    /// Returns [`TacticalError::UnitNotFound`] for unknown handles.
    pub fn heal_unit(&mut self, id: UnitId, amount: u32) -> Result<u32> {
        let unit = self.units.get(id).ok_or(TacticalError::UnitNotFound(id))?;
        if unit.is_dead() {
            return Ok(0);
        }
        let max = i32::try_from(unit.stats().constitution).unwrap_or(i32::MAX);
        let amount = i32::try_from(amount).unwrap_or(i32::MAX);
        let healed = unit.hp.saturating_add(amount).min(max).max(unit.hp);
        let restored = (healed - unit.hp).unsigned_abs();
        if restored > 0 {
            self.set_unit_hp(id, healed)?;
        }
        Ok(restored)
    }

    fn kill(&mut self, id: UnitId) -> Result<()> {
        let unit = self.units.get_mut(id).ok_or(TacticalError::UnitNotFound(id))?;
        unit.health_state = HealthState::Dead;
        unit.brain.reset();
        let tile = unit.tile;
        let carried = std::mem::take(&mut unit.carried);
        let memory = unit.forget_everything();
        unit.position = tile.to_position();
        info!("{} has died at {}", unit.name, tile);

        for treasure in carried {
            self.place_treasure(treasure, tile.x, tile.y)?;
        }
        self.erase_from_memories(id, &memory);

        let vacated = self.tile_mut(tile)?;
        if vacated.occupant == Some(id) {
            vacated.occupant = None;
        }
        self.notify_tile(tile);
        self.notify_unit(id);
        Ok(())
    }

    /// Remove `id` from the memories of everyone it noticed or was noticed by.
    fn erase_from_memories(&mut self, id: UnitId, memory: &crate::unit::Memory) {
        for &other in memory.noticed.keys() {
            if let Some(unit) = self.units.get_mut(other) {
                unit.memory.noticed_by.remove(&id);
            }
        }
        for &other in &memory.noticed_by {
            if let Some(unit) = self.units.get_mut(other) {
                unit.memory.noticed.remove(&id);
            }
        }
    }

    // ------------------------------------------------------------------
    // Treasure
    // ------------------------------------------------------------------

    /// Put treasure on top of the pile at `(x, y)`. Accepts a bare gold value
    /// or an existing [`Treasure`].
    ///
    /// # Errors
    ///
    /// Returns [`TacticalError::TileOutOfBounds`] when the tile does not exist.
    pub fn place_treasure(
        &mut self,
        treasure: impl Into<Treasure>,
        x: i32,
        y: i32,
    ) -> Result<TreasureId> {
        let coord = TileCoord::new(x, y);
        if self.tile(coord).is_none() {
            return Err(TacticalError::TileOutOfBounds { x, y });
        }

        let mut treasure = treasure.into();
        treasure.detach();
        treasure.tile = Some(coord);
        let id = self.treasure.insert(treasure);
        self.tile_mut(coord)?.treasure.push(id);

        self.notify_treasure(id);
        self.notify_tile(coord);
        Ok(id)
    }

    /// Detach treasure from its tile and the registry, handing back the value.
    ///
    /// # Errors
    ///
    /// Returns [`TacticalError::TreasureNotFound`] if it is not registered.
    pub fn remove_treasure(&mut self, id: TreasureId) -> Result<Treasure> {
        let mut treasure = self
            .treasure
            .remove(id)
            .ok_or(TacticalError::TreasureNotFound(id))?;
        let coord = treasure.tile;
        treasure.detach();

        if let Some(coord) = coord {
            if let Ok(tile) = self.tile_mut(coord) {
                tile.treasure.retain(|&other| other != id);
            }
            self.notify_tile(coord);
        }
        self.observers.treasure_changed(id, &treasure);
        Ok(treasure)
    }

    /// Treasure by handle.
    #[must_use]
    pub fn treasure(&self, id: TreasureId) -> Option<&Treasure> {
        self.treasure.get(id)
    }

    /// All ground treasure, in registry order.
    pub fn treasure_iter(&self) -> impl Iterator<Item = (TreasureId, &Treasure)> {
        self.treasure.iter()
    }

    /// Number of treasure pieces on the ground.
    #[must_use]
    pub fn treasure_count(&self) -> usize {
        self.treasure.len()
    }

    /// Change a ground treasure's sprite key.
    ///
    /// # Errors
    ///
    /// Returns [`TacticalError::TreasureNotFound`] for unknown handles.
    pub fn set_treasure_sprite(&mut self, id: TreasureId, sprite: impl Into<String>) -> Result<()> {
        self.treasure
            .get_mut(id)
            .ok_or(TacticalError::TreasureNotFound(id))?
            .sprite = sprite.into();
        self.notify_treasure(id);
        Ok(())
    }

    /// Record that `unit` has noticed `treasure`.
    pub(crate) fn mark_treasure_noticed(&mut self, treasure: TreasureId, unit: UnitId) {
        let Some(entry) = self.treasure.get_mut(treasure) else {
            return;
        };
        if !entry.noticed_by.contains(&unit) {
            entry.noticed_by.push(unit);
            self.notify_treasure(treasure);
        }
    }

    /// Move the whole pile at the unit's tile into its inventory, oldest piece
    /// first. Returns how many pieces were taken.
    ///
    /// # Errors
    ///
    /// Returns [`TacticalError::UnitNotFound`] for unknown handles.
    pub fn pick_up_pile(&mut self, id: UnitId) -> Result<usize> {
        let tile = self.units.get(id).ok_or(TacticalError::UnitNotFound(id))?.tile;
        let pile = self.tile(tile).map(|t| t.treasure.clone()).unwrap_or_default();

        let mut taken = Vec::with_capacity(pile.len());
        for treasure_id in pile {
            taken.push(self.remove_treasure(treasure_id)?);
        }
        let count = taken.len();
        if let Some(unit) = self.units.get_mut(id) {
            unit.carried.extend(taken);
        }
        self.notify_unit(id);
        Ok(count)
    }

    // ------------------------------------------------------------------
    // Validation
    // ------------------------------------------------------------------

    /// Check occupancy and treasure invariants.
    ///
    /// # Errors
    ///
    /// Returns [`TacticalError::InvalidState`] describing the first violation.
    pub fn validate(&self) -> Result<()> {
        for (id, unit) in self.units() {
            let occupant = self.tile(unit.tile).and_then(Tile::occupant);
            match (unit.is_dead(), occupant == Some(id)) {
                (false, false) => {
                    return Err(TacticalError::InvalidState(format!(
                        "{} is not the occupant of its tile {}",
                        unit.name, unit.tile
                    )));
                }
                (true, true) => {
                    return Err(TacticalError::InvalidState(format!(
                        "dead unit {} still occupies {}",
                        unit.name, unit.tile
                    )));
                }
                _ => {}
            }
        }

        for tile in &self.tiles {
            if let Some(id) = tile.occupant {
                let owner = self.units.get(id).map(|u| u.tile);
                if owner != Some(tile.coord()) {
                    return Err(TacticalError::InvalidState(format!(
                        "tile {} names occupant {id:?} which is elsewhere",
                        tile.coord()
                    )));
                }
            }
            for &treasure_id in &tile.treasure {
                let lies_here = self
                    .treasure
                    .get(treasure_id)
                    .is_some_and(|t| t.tile == Some(tile.coord()));
                if !lies_here {
                    return Err(TacticalError::InvalidState(format!(
                        "tile {} lists treasure {treasure_id:?} which is not there",
                        tile.coord()
                    )));
                }
            }
        }

        for (id, treasure) in self.treasure.iter() {
            let listed = treasure
                .tile
                .and_then(|coord| self.tile(coord))
                .map_or(0, |tile| tile.treasure.iter().filter(|&&t| t == id).count());
            if listed != 1 {
                return Err(TacticalError::InvalidState(format!(
                    "treasure {id:?} is listed {listed} times on its tile"
                )));
            }
        }
        Ok(())
    }
}
