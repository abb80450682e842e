//! Combat behaviours: pick a target, close the distance, hit it, and run
//! away when morale breaks.
//!
//! The chosen target lives in the unit's
//! [`ActionState::combat_target`](crate::unit::ActionState) so that every
//! combat behaviour (and the loot behaviour) can see it. Distances are
//! measured between continuous positions, not tiles.

use tracing::{debug, warn};

use crate::ai::{Activity, Behaviour, Continuation, SimContext, WeightTable};
use crate::awareness::headcount;
use crate::ids::UnitId;
use crate::map::Map;
use crate::math::Fixed;
use crate::pathfinding::{step_toward, StepOutcome};
use crate::selection::select_weighted;
use crate::simulation::AttackEvent;
use crate::unit::{BehaviourState, HealthState, Unit};

/// Weight of the target, reposition and attack options when viable.
const ENGAGE_WEIGHT: u32 = 10;
/// Weight of backing off from a target that is too close.
const BACK_OFF_WEIGHT: u32 = 3;

/// The live target `unit` is fighting, if any, with the distance to it.
fn current_target(map: &Map, me: &Unit) -> Option<(UnitId, Fixed)> {
    let target = me.action().combat_target?;
    let other = map.unit(target).filter(|other| other.is_conscious())?;
    Some((target, me.distance_to(other.position())))
}

/// Lottery weight for attacking `target` from `distance` tiles away.
fn target_priority(target: &Unit, distance: Fixed, range: Fixed) -> u32 {
    let base: u32 = match (target.health_state(), target.behaviour_state()) {
        (HealthState::Stable | HealthState::Dying, _) => 1,
        (_, BehaviourState::Fleeing) => 20,
        _ => 100,
    };
    let mut weight = Fixed::from_num(base);
    if distance > Fixed::ONE {
        weight /= distance;
    }
    if distance > range {
        weight /= distance;
    }
    weight.ceil().to_num::<u32>()
}

/// Choose an enemy to fight.
#[derive(Debug, Default)]
pub struct Target {
    candidates: Vec<(UnitId, u32)>,
}

impl Target {
    /// Registered name.
    pub const NAME: &'static str = "target";
}

impl Behaviour for Target {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn on_update(&mut self, ctx: &mut SimContext<'_>, unit: UnitId, activity: Activity, _: Fixed) {
        if activity != Activity::Deciding {
            return;
        }
        let Some(me) = ctx.map.unit(unit) else {
            return;
        };
        if me.action().combat_target.is_none() {
            return;
        }
        let stale = me.behaviour_state() != BehaviourState::Combat
            || current_target(ctx.map, me).is_none();
        if stale {
            if let Some(me) = ctx.map.unit_mut(unit) {
                me.action.combat_target = None;
            }
        }
    }

    fn weigh(&mut self, ctx: &SimContext<'_>, unit: UnitId, _: &WeightTable) -> Option<u32> {
        self.candidates.clear();
        let me = ctx.map.unit(unit)?;
        if me.behaviour_state() != BehaviourState::Combat {
            return None;
        }
        if current_target(ctx.map, me).is_some() {
            return None;
        }

        for &other in me.memory().noticed.keys() {
            let Some(enemy) = ctx.map.unit(other) else {
                continue;
            };
            if enemy.allegiance == me.allegiance || enemy.is_dead() {
                continue;
            }
            let distance = me.distance_to(enemy.position());
            let weight = target_priority(enemy, distance, ctx.config.engagement_range);
            if weight > 0 {
                self.candidates.push((other, weight));
            }
        }

        (!self.candidates.is_empty()).then_some(ENGAGE_WEIGHT)
    }

    fn run(&mut self, ctx: &mut SimContext<'_>, unit: UnitId, _dt: Fixed) -> Continuation {
        let weights: Vec<u32> = self.candidates.iter().map(|&(_, weight)| weight).collect();
        let index = match select_weighted(&weights, &mut *ctx.rng) {
            Ok(index) => index,
            Err(err) => {
                warn!("{} has no one to target: {}", ctx.unit_name(unit), err);
                return Continuation::Complete;
            }
        };

        let target = self.candidates[index].0;
        debug!("{} is now seeking {}", ctx.unit_name(unit), ctx.unit_name(target));
        if let Some(me) = ctx.map.unit_mut(unit) {
            me.action.combat_target = Some(target);
        }
        self.candidates.clear();
        Continuation::Complete
    }
}

/// Move into (or well inside) engagement range of the target.
#[derive(Debug, Default)]
pub struct Reposition;

impl Reposition {
    /// Registered name.
    pub const NAME: &'static str = "reposition";
}

impl Behaviour for Reposition {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn weigh(&mut self, ctx: &SimContext<'_>, unit: UnitId, _: &WeightTable) -> Option<u32> {
        let me = ctx.map.unit(unit)?;
        if me.behaviour_state() != BehaviourState::Combat {
            return None;
        }
        let (_, distance) = current_target(ctx.map, me)?;
        let range = ctx.config.engagement_range;
        if distance > range {
            Some(ENGAGE_WEIGHT)
        } else if range - distance >= ctx.config.reposition_margin {
            Some(BACK_OFF_WEIGHT)
        } else {
            None
        }
    }

    fn run(&mut self, ctx: &mut SimContext<'_>, unit: UnitId, _dt: Fixed) -> Continuation {
        let Some(me) = ctx.map.unit(unit) else {
            return Continuation::Complete;
        };
        if me.behaviour_state() != BehaviourState::Combat {
            return Continuation::Complete;
        }
        let Some((target, distance)) = current_target(ctx.map, me) else {
            return Continuation::Complete;
        };
        if distance <= ctx.config.engagement_range {
            debug!("{} has reached {}", me.name, ctx.unit_name(target));
            return Continuation::Complete;
        }

        let Some(goal) = ctx.map.unit(target).map(Unit::position) else {
            return Continuation::Complete;
        };
        step_toward(ctx.map, unit, goal);
        Continuation::Continue
    }
}

/// Hit the target once, then wait out the cooldown.
#[derive(Debug, Default)]
pub struct Attack {
    cooldown: Option<Fixed>,
}

impl Attack {
    /// Registered name.
    pub const NAME: &'static str = "attack";
}

impl Behaviour for Attack {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn weigh(&mut self, ctx: &SimContext<'_>, unit: UnitId, _: &WeightTable) -> Option<u32> {
        let me = ctx.map.unit(unit)?;
        if me.behaviour_state() != BehaviourState::Combat {
            return None;
        }
        let (_, distance) = current_target(ctx.map, me)?;
        (distance <= ctx.config.engagement_range).then_some(ENGAGE_WEIGHT)
    }

    fn run(&mut self, ctx: &mut SimContext<'_>, unit: UnitId, dt: Fixed) -> Continuation {
        if let Some(cooldown) = self.cooldown {
            let cooldown = cooldown - dt;
            if cooldown > Fixed::ZERO {
                self.cooldown = Some(cooldown);
                return Continuation::Continue;
            }
            self.cooldown = None;
            return Continuation::Complete;
        }

        let Some(me) = ctx.map.unit(unit) else {
            return Continuation::Complete;
        };
        let Some(target) = me.action().combat_target else {
            warn!("{} is attacking without a target", me.name);
            return Continuation::Complete;
        };
        if !ctx.map.unit(target).is_some_and(Unit::is_conscious) {
            debug!("{} lost its target before striking", me.name);
            return Continuation::Complete;
        }
        let damage = me.stats().strength;
        let dexterity = me.stats().dexterity.max(1);

        let lethal = match ctx.map.damage_unit(target, damage) {
            Ok(lethal) => lethal,
            Err(err) => {
                warn!("Attack failed: {}", err);
                return Continuation::Complete;
            }
        };
        debug!(
            "{} attacks {} for {} damage",
            ctx.unit_name(unit),
            ctx.unit_name(target),
            damage
        );
        ctx.events.attacks.push(AttackEvent {
            attacker: unit,
            target,
            damage,
        });
        if lethal {
            ctx.events.deaths.push(target);
        }

        self.cooldown = Some(ctx.config.attack_tempo / Fixed::from_num(dexterity));
        Continuation::Continue
    }
}

/// Step directly away from the nearest threat.
#[derive(Debug, Default)]
pub struct Flee {
    stepping: bool,
}

impl Flee {
    /// Registered name.
    pub const NAME: &'static str = "flee";
}

impl Behaviour for Flee {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn weigh(&mut self, ctx: &SimContext<'_>, unit: UnitId, _: &WeightTable) -> Option<u32> {
        let me = ctx.map.unit(unit)?;
        let fleeing = me.behaviour_state() == BehaviourState::Fleeing;
        (fleeing && headcount(ctx.map, me).threats > 0).then_some(ctx.config.max_stat_score)
    }

    fn run(&mut self, ctx: &mut SimContext<'_>, unit: UnitId, _dt: Fixed) -> Continuation {
        let Some(me) = ctx.map.unit(unit) else {
            return Continuation::Complete;
        };
        if self.stepping {
            if me.is_moving() {
                return Continuation::Continue;
            }
            self.stepping = false;
            return Continuation::Complete;
        }

        let here = me.position();
        let nearest = me
            .memory()
            .noticed
            .keys()
            .filter_map(|&other| ctx.map.unit(other))
            .filter(|other| other.is_conscious() && other.allegiance != me.allegiance)
            .map(Unit::position)
            .min_by_key(|&position| here.distance_squared(position));
        let Some(threat) = nearest else {
            return Continuation::Complete;
        };

        let away = here + (here - threat);
        match step_toward(ctx.map, unit, away) {
            StepOutcome::Started(_) => {
                self.stepping = true;
                Continuation::Continue
            }
            _ => Continuation::Complete,
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::mock::StepRng;

    use super::*;
    use crate::ai::update_unit;
    use crate::config::SimConfig;
    use crate::simulation::TickEvents;
    use crate::tile::TileCoord;
    use crate::unit::{Allegiance, Stats};

    fn soldier(name: &str, allegiance: u32, x: i32, y: i32) -> Unit {
        Unit::new(name, Allegiance(allegiance), TileCoord::new(x, y))
            .with_stats(Stats {
                strength: 4,
                constitution: 20,
                dexterity: 25,
                perception: 5,
                intelligence: 3,
                bravery: 100,
                ..Stats::default()
            })
            .unwrap()
    }

    fn with_kit(mut unit: Unit) -> Unit {
        unit.register_behaviour(Box::new(Target::default())).unwrap();
        unit.register_behaviour(Box::new(Reposition)).unwrap();
        unit.register_behaviour(Box::new(Attack::default())).unwrap();
        unit
    }

    fn tick_unit(map: &mut Map, id: UnitId, rng: &mut StepRng, events: &mut TickEvents) {
        let config = SimConfig::default();
        let mut ctx = SimContext {
            map,
            rng,
            config: &config,
            events,
        };
        update_unit(&mut ctx, id, Fixed::ONE);
    }

    #[test]
    fn test_priority_tiers() {
        let range = Fixed::from_num(1.5);
        let mut enemy = soldier("e", 2, 0, 0);
        assert_eq!(target_priority(&enemy, Fixed::ONE, range), 100);
        // 100 / 2 / 2
        assert_eq!(target_priority(&enemy, Fixed::from_num(2), range), 25);
        // 100 / 3 / 3, rounded up
        assert_eq!(target_priority(&enemy, Fixed::from_num(3), range), 12);

        enemy.behaviour_state = BehaviourState::Fleeing;
        assert_eq!(target_priority(&enemy, Fixed::ONE, range), 20);
        enemy.health_state = HealthState::Dying;
        assert_eq!(target_priority(&enemy, Fixed::ONE, range), 1);
        assert_eq!(target_priority(&enemy, Fixed::from_num(4), range), 1);
    }

    #[test]
    fn test_adjacent_enemies_fight() {
        let mut map = Map::new(4, 4);
        let a = map.place_unit(with_kit(soldier("a", 1, 0, 0))).unwrap();
        let b = map.place_unit(soldier("b", 2, 1, 0)).unwrap();
        let mut rng = StepRng::new(0, 1);
        let mut events = TickEvents::default();

        // Tick 1: notices b, enters combat, picks it as target.
        tick_unit(&mut map, a, &mut rng, &mut events);
        assert_eq!(map.unit(a).unwrap().behaviour_state(), BehaviourState::Combat);
        assert_eq!(map.unit(a).unwrap().action().combat_target, Some(b));
        assert!(events.attacks.is_empty());

        // Tick 2: in range, so attack is the only option.
        tick_unit(&mut map, a, &mut rng, &mut events);
        assert_eq!(map.unit(b).unwrap().hp(), 16);
        assert_eq!(events.attacks.len(), 1);
        assert_eq!(map.unit(a).unwrap().activity(), Activity::Running(Attack::NAME));
    }

    #[test]
    fn test_attack_lands_once_per_cooldown() {
        let mut map = Map::new(4, 4);
        let a = map.place_unit(with_kit(soldier("a", 1, 0, 0))).unwrap();
        let b = map.place_unit(soldier("b", 2, 1, 0)).unwrap();
        let mut rng = StepRng::new(0, 1);
        let mut events = TickEvents::default();
        tick_unit(&mut map, a, &mut rng, &mut events);

        // Cooldown is 50 / 25 = 2 seconds: strike, then two ticks of waiting.
        for _ in 0..3 {
            tick_unit(&mut map, a, &mut rng, &mut events);
        }
        assert_eq!(events.attacks.len(), 1);
        assert_eq!(map.unit(b).unwrap().hp(), 16);

        tick_unit(&mut map, a, &mut rng, &mut events);
        assert_eq!(events.attacks.len(), 2);
        assert_eq!(map.unit(b).unwrap().hp(), 12);
    }

    #[test]
    fn test_lethal_attack_reports_death() {
        let mut map = Map::new(4, 4);
        let a = map.place_unit(with_kit(soldier("a", 1, 0, 0))).unwrap();
        let b = map.place_unit(soldier("b", 2, 1, 0)).unwrap();
        map.set_unit_hp(b, 3).unwrap();
        let mut rng = StepRng::new(0, 1);
        let mut events = TickEvents::default();

        tick_unit(&mut map, a, &mut rng, &mut events);
        tick_unit(&mut map, a, &mut rng, &mut events);
        assert_eq!(events.deaths, vec![b]);
        assert!(map.unit(b).unwrap().is_dead());
        assert!(map.tile_at(1, 0).unwrap().is_free());
    }

    #[test]
    fn test_distant_target_triggers_reposition() {
        let mut map = Map::new(6, 1);
        let a = map.place_unit(with_kit(soldier("a", 1, 0, 0))).unwrap();
        map.place_unit(soldier("b", 2, 4, 0)).unwrap();
        let mut rng = StepRng::new(0, 1);
        let mut events = TickEvents::default();

        tick_unit(&mut map, a, &mut rng, &mut events);
        tick_unit(&mut map, a, &mut rng, &mut events);
        let me = map.unit(a).unwrap();
        assert_eq!(me.activity(), Activity::Running(Reposition::NAME));
        assert_eq!(me.tile(), TileCoord::new(1, 0));
        assert!(events.attacks.is_empty());
    }

    #[test]
    fn test_target_dropped_outside_combat() {
        let mut map = Map::new(12, 1);
        let a = map.place_unit(with_kit(soldier("a", 1, 0, 0))).unwrap();
        let b = map.place_unit(soldier("b", 2, 1, 0)).unwrap();
        let mut rng = StepRng::new(0, 1);
        let mut events = TickEvents::default();
        tick_unit(&mut map, a, &mut rng, &mut events);
        assert_eq!(map.unit(a).unwrap().action().combat_target, Some(b));

        map.teleport_unit(b, TileCoord::new(11, 0)).unwrap();
        // Forgotten after intelligence (3) seconds out of sight.
        for _ in 0..4 {
            tick_unit(&mut map, a, &mut rng, &mut events);
        }
        let me = map.unit(a).unwrap();
        assert_eq!(me.behaviour_state(), BehaviourState::Exploring);
        assert_eq!(me.action().combat_target, None);
    }

    #[test]
    fn test_attack_without_target_completes() {
        let config = SimConfig::default();
        let mut map = Map::new(2, 2);
        let a = map.place_unit(soldier("a", 1, 0, 0)).unwrap();
        let mut rng = StepRng::new(0, 1);
        let mut events = TickEvents::default();
        let mut ctx = SimContext {
            map: &mut map,
            rng: &mut rng,
            config: &config,
            events: &mut events,
        };
        let outcome = Attack::default().run(&mut ctx, a, Fixed::ONE);
        assert_eq!(outcome, Continuation::Complete);
        assert!(events.attacks.is_empty());
    }

    #[test]
    fn test_flee_steps_away_from_threat() {
        let mut map = Map::new(5, 1);
        let mut coward = soldier("coward", 1, 2, 0);
        coward.register_behaviour(Box::new(Flee::default())).unwrap();
        let a = map.place_unit(coward).unwrap();
        map.place_unit(soldier("b", 2, 3, 0)).unwrap();
        // Bravery 100 never breaks on its own.
        map.set_unit_hp(a, 4).unwrap();
        map.unit_mut(a).unwrap().behaviour_state = BehaviourState::Fleeing;
        map.unit_mut(a).unwrap().flee_timer = Fixed::from_num(10);
        let mut rng = StepRng::new(0, 1);
        let mut events = TickEvents::default();

        tick_unit(&mut map, a, &mut rng, &mut events);
        let me = map.unit(a).unwrap();
        assert_eq!(me.activity(), Activity::Running(Flee::NAME));
        assert_eq!(me.tile(), TileCoord::new(1, 0));
    }
}
