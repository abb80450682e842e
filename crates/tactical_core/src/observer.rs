//! Change notifications from the map to external observers.
//!
//! Three independent channels carry tile, unit and treasure changes.
//! Callbacks run synchronously inside the mutating call, in subscription
//! order, and only receive shared references: observers can read what
//! changed but cannot feed back into the simulation.

use std::fmt;

use crate::ids::{TreasureId, UnitId};
use crate::tile::Tile;
use crate::treasure::Treasure;
use crate::unit::Unit;

/// Token returned by a subscription, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

/// Callback for tile changes.
pub type TileObserver = dyn FnMut(&Tile);
/// Callback for unit changes.
pub type UnitObserver = dyn FnMut(UnitId, &Unit);
/// Callback for treasure changes.
pub type TreasureObserver = dyn FnMut(TreasureId, &Treasure);

/// Ordered list of subscribers for one kind of change.
pub struct Channel<F: ?Sized> {
    subscribers: Vec<(SubscriptionId, Box<F>)>,
}

impl<F: ?Sized> Default for Channel<F> {
    fn default() -> Self {
        Self {
            subscribers: Vec::new(),
        }
    }
}

impl<F: ?Sized> Channel<F> {
    fn push(&mut self, id: SubscriptionId, callback: Box<F>) {
        self.subscribers.push((id, callback));
    }

    fn remove(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sub, _)| *sub != id);
        self.subscribers.len() != before
    }

    /// Number of active subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    /// True when nobody is listening.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

impl<F: ?Sized> fmt::Debug for Channel<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

/// The three change channels owned by a map.
#[derive(Debug, Default)]
pub struct Observers {
    next_id: u64,
    /// Tile sprite, cost, occupancy and pile changes.
    pub tile: Channel<TileObserver>,
    /// Unit position, tile, HP and state changes.
    pub unit: Channel<UnitObserver>,
    /// Treasure placement, removal and noticing.
    pub treasure: Channel<TreasureObserver>,
}

impl Observers {
    fn allocate(&mut self) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Subscribe to tile changes.
    pub fn on_tile_changed(&mut self, callback: impl FnMut(&Tile) + 'static) -> SubscriptionId {
        let id = self.allocate();
        self.tile.push(id, Box::new(callback));
        id
    }

    /// Subscribe to unit changes.
    pub fn on_unit_changed(
        &mut self,
        callback: impl FnMut(UnitId, &Unit) + 'static,
    ) -> SubscriptionId {
        let id = self.allocate();
        self.unit.push(id, Box::new(callback));
        id
    }

    /// Subscribe to treasure changes.
    pub fn on_treasure_changed(
        &mut self,
        callback: impl FnMut(TreasureId, &Treasure) + 'static,
    ) -> SubscriptionId {
        let id = self.allocate();
        self.treasure.push(id, Box::new(callback));
        id
    }

    /// Remove a subscription from whichever channel holds it.
    ///
    /// Returns `false` if the id was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.tile.remove(id) || self.unit.remove(id) || self.treasure.remove(id)
    }

    pub(crate) fn tile_changed(&mut self, tile: &Tile) {
        for (_, callback) in &mut self.tile.subscribers {
            callback(tile);
        }
    }

    pub(crate) fn unit_changed(&mut self, id: UnitId, unit: &Unit) {
        for (_, callback) in &mut self.unit.subscribers {
            callback(id, unit);
        }
    }

    pub(crate) fn treasure_changed(&mut self, id: TreasureId, treasure: &Treasure) {
        for (_, callback) in &mut self.treasure.subscribers {
            callback(id, treasure);
        }
    }
}
