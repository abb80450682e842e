//! Stable handles for units and treasure.
//!
//! Behaviours remember other entities (a combat target, a treasure pile to
//! loot) across many ticks. Keys carry a version, so a key to a removed
//! entity never resolves to whatever later reuses its slot.

use slotmap::new_key_type;

new_key_type! {
    /// Handle to a unit registered in a map.
    pub struct UnitId;

    /// Handle to a treasure lying on the map.
    pub struct TreasureId;
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    #[test]
    fn test_stale_key_does_not_resolve_after_reuse() {
        let mut units: SlotMap<UnitId, &str> = SlotMap::with_key();
        let old = units.insert("scout");
        assert_eq!(units.remove(old), Some("scout"));

        let new = units.insert("bandit");
        assert_ne!(new, old);
        assert_eq!(units.get(old), None);
        assert_eq!(units.get(new), Some(&"bandit"));
    }

    #[test]
    fn test_iteration_follows_insertion_order() {
        let mut piles: SlotMap<TreasureId, u32> = SlotMap::with_key();
        let a = piles.insert(10);
        let b = piles.insert(20);
        let c = piles.insert(30);
        piles.remove(b);
        let order: Vec<TreasureId> = piles.keys().collect();
        assert_eq!(order, vec![a, c]);
    }
}
