//! Heading for noticed treasure and scooping up the pile.

use tracing::{debug, warn};

use crate::ai::{Behaviour, Continuation, SimContext, WeightTable};
use crate::ids::{TreasureId, UnitId};
use crate::math::Fixed;
use crate::pathfinding::step_toward;
use crate::selection::select_weighted;
use crate::simulation::LootEvent;
use crate::unit::BehaviourState;

/// Starting appeal of a single noticed treasure.
const BASE_APPEAL: u32 = 100;

/// Pick a noticed treasure, walk to it and take the whole pile on its tile.
///
/// Each noticed treasure starts at an appeal of 100. Every noticed ally
/// already heading for the same tile lowers it by
/// `max_stat × loot_greed_fraction − greed`, so a very greedy unit competes
/// harder. Appeal falls off with distance. The behaviour's own weight is
/// `options × greed`, heavily suppressed in combat and zero while a combat
/// target is held.
#[derive(Debug, Default)]
pub struct Loot {
    options: Vec<(TreasureId, u32)>,
}

impl Loot {
    /// Registered name.
    pub const NAME: &'static str = "loot";

    /// Per-treasure appeal from the most recent weighing.
    #[must_use]
    pub fn options(&self) -> &[(TreasureId, u32)] {
        &self.options
    }
}

impl Behaviour for Loot {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn weigh(&mut self, ctx: &SimContext<'_>, unit: UnitId, _: &WeightTable) -> Option<u32> {
        self.options.clear();
        let me = ctx.map.unit(unit)?;
        if me.memory().treasure.is_empty() || me.action().combat_target.is_some() {
            return None;
        }

        let max = ctx.config.max_stat();
        let greed = Fixed::from_num(me.stats().greed);
        let rivalry = max * ctx.config.loot_greed_fraction - greed;

        for &option in &me.memory().treasure {
            let Some(tile) = ctx.map.treasure(option).and_then(|t| t.tile()) else {
                continue;
            };

            let mut appeal = Fixed::from_num(BASE_APPEAL);
            for &other in me.memory().noticed.keys() {
                let Some(ally) = ctx.map.unit(other) else {
                    continue;
                };
                if ally.allegiance != me.allegiance {
                    continue;
                }
                let heading_here = ally
                    .action()
                    .loot_target
                    .and_then(|target| ctx.map.treasure(target))
                    .and_then(|target| target.tile())
                    == Some(tile);
                if heading_here {
                    appeal -= rivalry;
                }
            }

            let distance = me.distance_to(tile.to_position());
            if distance > Fixed::ONE {
                appeal /= distance;
            }
            if appeal > Fixed::ZERO {
                self.options.push((option, appeal.ceil().to_num::<u32>()));
            }
        }

        if self.options.is_empty() {
            return None;
        }

        let mut total = Fixed::from_num(self.options.len()) * greed;
        if me.behaviour_state() == BehaviourState::Combat {
            let divisor = max - greed;
            if divisor > Fixed::ONE {
                total /= divisor;
            }
        }
        Some(total.ceil().to_num::<u32>())
    }

    fn run(&mut self, ctx: &mut SimContext<'_>, unit: UnitId, _dt: Fixed) -> Continuation {
        let Some(me) = ctx.map.unit(unit) else {
            return Continuation::Complete;
        };

        let Some(target) = me.action().loot_target else {
            return self.choose(ctx, unit);
        };

        let Some(tile) = ctx.map.treasure(target).and_then(|t| t.tile()) else {
            debug!("{} lost sight of its loot", me.name);
            clear_target(ctx, unit);
            return Continuation::Complete;
        };

        if me.tile() == tile && !me.is_moving() {
            match ctx.map.pick_up_pile(unit) {
                Ok(pieces) => {
                    debug!("{} loots {} pieces at {}", ctx.unit_name(unit), pieces, tile);
                    ctx.events.loot.push(LootEvent { unit, tile, pieces });
                }
                Err(err) => warn!("Loot failed: {}", err),
            }
            clear_target(ctx, unit);
            return Continuation::Complete;
        }

        step_toward(ctx.map, unit, tile.to_position());
        Continuation::Continue
    }
}

impl Loot {
    fn choose(&mut self, ctx: &mut SimContext<'_>, unit: UnitId) -> Continuation {
        let weights: Vec<u32> = self.options.iter().map(|&(_, weight)| weight).collect();
        let index = match select_weighted(&weights, &mut *ctx.rng) {
            Ok(index) => index,
            Err(err) => {
                warn!("{} is trying to loot with nothing to pick: {}", ctx.unit_name(unit), err);
                return Continuation::Complete;
            }
        };

        let target = self.options[index].0;
        if let Some(tile) = ctx.map.treasure(target).and_then(|t| t.tile()) {
            debug!("{} is heading to loot at {}", ctx.unit_name(unit), tile);
        }
        if let Some(me) = ctx.map.unit_mut(unit) {
            me.action.loot_target = Some(target);
        }
        self.options.clear();
        Continuation::Continue
    }
}

fn clear_target(ctx: &mut SimContext<'_>, unit: UnitId) {
    if let Some(me) = ctx.map.unit_mut(unit) {
        me.action.loot_target = None;
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::mock::StepRng;

    use super::*;
    use crate::ai::{update_unit, Activity};
    use crate::config::SimConfig;
    use crate::map::{AllegianceProfile, Colour, Map};
    use crate::simulation::TickEvents;
    use crate::tile::TileCoord;
    use crate::unit::{Allegiance, Stats, Unit};

    fn looter(name: &str, x: i32, y: i32, greed: u32) -> Unit {
        Unit::new(name, Allegiance(1), TileCoord::new(x, y))
            .with_stats(Stats {
                constitution: 10,
                dexterity: 10,
                perception: 5,
                intelligence: 5,
                bravery: 50,
                greed,
                ..Stats::default()
            })
            .unwrap()
    }

    fn loot_map(width: i32) -> Map {
        let mut map = Map::new(width, 1);
        map.set_allegiance(
            Allegiance(1),
            AllegianceProfile {
                colour: Colour::GREEN,
                seeks_loot: true,
            },
        );
        map
    }

    fn weigh(map: &mut Map, unit: UnitId) -> (Option<u32>, Vec<(TreasureId, u32)>) {
        let config = SimConfig::default();
        let mut events = TickEvents::default();
        let mut rng = StepRng::new(0, 1);
        let ctx = SimContext {
            map,
            rng: &mut rng,
            config: &config,
            events: &mut events,
        };
        let mut loot = Loot::default();
        let weight = loot.weigh(&ctx, unit, &WeightTable::default());
        (weight, loot.options().to_vec())
    }

    #[test]
    fn test_no_noticed_treasure_means_no_weight() {
        let mut map = loot_map(5);
        let a = map.place_unit(looter("a", 0, 0, 50)).unwrap();
        map.place_treasure(10, 2, 0).unwrap();
        assert_eq!(weigh(&mut map, a).0, None);
    }

    #[test]
    fn test_weight_scales_with_greed_and_options() {
        let mut map = loot_map(5);
        let a = map.place_unit(looter("a", 0, 0, 30)).unwrap();
        let near = map.place_treasure(10, 1, 0).unwrap();
        let far = map.place_treasure(10, 4, 0).unwrap();
        crate::perception::refresh(&mut map, a, Fixed::ONE);

        let (weight, options) = weigh(&mut map, a);
        assert_eq!(weight, Some(60));
        assert_eq!(options, vec![(near, 100), (far, 25)]);
    }

    fn contested_appeal(greed: u32) -> Vec<(TreasureId, u32)> {
        let mut map = loot_map(5);
        let a = map.place_unit(looter("a", 0, 0, greed)).unwrap();
        let b = map.place_unit(looter("b", 1, 0, 0)).unwrap();
        let pile = map.place_treasure(10, 3, 0).unwrap();
        crate::perception::refresh(&mut map, a, Fixed::ONE);
        map.unit_mut(b).unwrap().action.loot_target = Some(pile);
        weigh(&mut map, a).1
    }

    #[test]
    fn test_allies_heading_to_same_tile_lower_appeal() {
        // 100 - (70 - 50) = 80, then / 3.
        assert_eq!(contested_appeal(50)[0].1, 27);
        // A greedier looter wants it more: 100 - (70 - 80) = 110, then / 3.
        assert_eq!(contested_appeal(80)[0].1, 37);
    }

    #[test]
    fn test_combat_suppresses_and_target_disables() {
        let mut map = loot_map(5);
        let a = map.place_unit(looter("a", 0, 0, 50)).unwrap();
        map.place_treasure(10, 1, 0).unwrap();
        crate::perception::refresh(&mut map, a, Fixed::ONE);

        map.unit_mut(a).unwrap().behaviour_state = BehaviourState::Combat;
        // 1 × 50 / (100 - 50)
        assert_eq!(weigh(&mut map, a).0, Some(1));

        let foe = map.place_unit(looter("foe", 4, 0, 0)).unwrap();
        map.unit_mut(a).unwrap().action.combat_target = Some(foe);
        assert_eq!(weigh(&mut map, a).0, None);
    }

    #[test]
    fn test_looter_walks_to_pile_and_takes_it_all() {
        let config = SimConfig::default();
        let mut map = loot_map(5);
        let mut unit = looter("a", 0, 0, 50);
        unit.register_behaviour(Box::new(Loot::default())).unwrap();
        let a = map.place_unit(unit).unwrap();
        map.place_treasure(10, 2, 0).unwrap();
        map.place_treasure(5, 2, 0).unwrap();
        let mut rng = StepRng::new(0, 1);
        let mut events = TickEvents::default();
        let mut ctx = SimContext {
            map: &mut map,
            rng: &mut rng,
            config: &config,
            events: &mut events,
        };

        for _ in 0..4 {
            update_unit(&mut ctx, a, Fixed::ONE);
        }

        assert_eq!(ctx.map.treasure_count(), 0);
        let me = ctx.map.unit(a).unwrap();
        assert_eq!(me.carried().len(), 2);
        assert_eq!(me.tile(), TileCoord::new(2, 0));
        assert_eq!(me.action().loot_target, None);
        assert_eq!(me.activity(), Activity::Deciding);
        assert_eq!(ctx.events.loot.len(), 1);
        assert_eq!(ctx.events.loot[0].pieces, 2);
    }

    #[test]
    fn test_vanished_target_completes() {
        let config = SimConfig::default();
        let mut map = loot_map(5);
        let a = map.place_unit(looter("a", 0, 0, 50)).unwrap();
        let pile = map.place_treasure(10, 2, 0).unwrap();
        map.unit_mut(a).unwrap().action.loot_target = Some(pile);
        map.remove_treasure(pile).unwrap();
        let mut rng = StepRng::new(0, 1);
        let mut events = TickEvents::default();
        let mut ctx = SimContext {
            map: &mut map,
            rng: &mut rng,
            config: &config,
            events: &mut events,
        };

        assert_eq!(Loot::default().run(&mut ctx, a, Fixed::ONE), Continuation::Complete);
        assert_eq!(ctx.map.unit(a).unwrap().action().loot_target, None);
    }
}
