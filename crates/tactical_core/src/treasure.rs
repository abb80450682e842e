//! Gold and other valuables.
//!
//! A treasure is in exactly one place at a time: on a tile's pile (and in the
//! map's treasure registry), carried by a unit as an owned value, or orphaned
//! after being removed from the map.

use serde::{Deserialize, Serialize};

use crate::ids::UnitId;
use crate::tile::TileCoord;

/// Sprite key used for plain gold.
pub const DEFAULT_TREASURE_SPRITE: &str = "gold";

/// A pile element of value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Treasure {
    /// Gold value.
    pub gp: u32,
    /// Sprite key consumed by renderers.
    pub sprite: String,
    #[serde(skip)]
    pub(crate) tile: Option<TileCoord>,
    #[serde(skip)]
    pub(crate) noticed_by: Vec<UnitId>,
}

impl Treasure {
    /// Create loose treasure worth `gp`.
    #[must_use]
    pub fn new(gp: u32) -> Self {
        Self {
            gp,
            sprite: DEFAULT_TREASURE_SPRITE.to_string(),
            tile: None,
            noticed_by: Vec::new(),
        }
    }

    /// Set the sprite key.
    #[must_use]
    pub fn with_sprite(mut self, sprite: impl Into<String>) -> Self {
        self.sprite = sprite.into();
        self
    }

    /// Tile this treasure lies on. `None` once picked up or removed.
    #[must_use]
    pub const fn tile(&self) -> Option<TileCoord> {
        self.tile
    }

    /// Units that have noticed this treasure while it lay on the ground.
    #[must_use]
    pub fn noticed_by(&self) -> &[UnitId] {
        &self.noticed_by
    }

    /// Strip map-only state when the treasure leaves the ground.
    pub(crate) fn detach(&mut self) {
        self.tile = None;
        self.noticed_by.clear();
    }
}

impl From<u32> for Treasure {
    fn from(gp: u32) -> Self {
        Self::new(gp)
    }
}

/// Total gold value of a set of treasure.
#[must_use]
pub fn total_gp<'a>(treasure: impl IntoIterator<Item = &'a Treasure>) -> u64 {
    treasure.into_iter().map(|t| u64::from(t.gp)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_treasure_is_loose() {
        let t = Treasure::from(20);
        assert_eq!(t.gp, 20);
        assert_eq!(t.sprite, DEFAULT_TREASURE_SPRITE);
        assert!(t.tile().is_none());
        assert!(t.noticed_by().is_empty());
    }

    #[test]
    fn test_total_gp() {
        let pile = vec![Treasure::new(20), Treasure::new(10).with_sprite("gem")];
        assert_eq!(total_gp(&pile), 30);
    }
}
