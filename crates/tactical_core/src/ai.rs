//! Weighted-utility decision core.
//!
//! Every conscious unit runs the same pipeline once per tick, in this order:
//!
//! 1. **Movement continuation** - advance a step in progress
//!    ([`pathfinding::advance`]).
//! 2. **Perception** - notice and forget units and treasure
//!    ([`perception::refresh`]).
//! 3. **Awareness** - derive the [`BehaviourState`](crate::unit::BehaviourState)
//!    ([`awareness::refresh`]).
//! 4. **Hooks** - every behaviour's [`Behaviour::on_update`].
//! 5. **Decision** - while [`Activity::Deciding`], weigh every behaviour,
//!    drop zero weights and run a weighted lottery.
//! 6. **Action** - run the current behaviour. [`Continuation::Complete`]
//!    returns the unit to deciding.
//!
//! Behaviours never touch the brain directly. They get the map through a
//! [`SimContext`] and report back through return values.

use std::fmt;

use rand::RngCore;
use tracing::{debug, warn};

use crate::awareness;
use crate::config::SimConfig;
use crate::error::{Result, TacticalError};
use crate::ids::UnitId;
use crate::map::Map;
use crate::math::Fixed;
use crate::pathfinding;
use crate::perception;
use crate::selection::select_weighted;
use crate::simulation::TickEvents;

/// Everything a behaviour may read or change during a tick.
pub struct SimContext<'a> {
    /// The shared map.
    pub map: &'a mut Map,
    /// Random source for lotteries and random picks.
    pub rng: &'a mut dyn RngCore,
    /// Tuning constants.
    pub config: &'a SimConfig,
    /// Notable things that happened this tick.
    pub events: &'a mut TickEvents,
}

impl SimContext<'_> {
    /// Name of a unit for log messages.
    #[must_use]
    pub fn unit_name(&self, id: UnitId) -> String {
        self.map
            .unit(id)
            .map_or_else(|| format!("{id:?}"), |unit| unit.name.clone())
    }
}

impl fmt::Debug for SimContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimContext")
            .field("map", &self.map)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Whether a behaviour wants to keep running next tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuation {
    /// Run again next tick.
    Continue,
    /// Done; go back to deciding.
    Complete,
}

/// What a unit's AI is currently doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Activity {
    /// Idle; the next tick weighs all behaviours.
    #[default]
    Deciding,
    /// Running the named behaviour.
    Running(&'static str),
}

/// A pluggable AI option.
///
/// `weigh` is called while the unit is deciding and may read the map and the
/// weights already produced this round, but never change other behaviours'
/// weights. `run` is called every tick while this behaviour is current.
/// State that must survive between ticks lives in the behaviour object or,
/// when other behaviours need it, in the unit's
/// [`ActionState`](crate::unit::ActionState).
pub trait Behaviour: fmt::Debug {
    /// Unique name within a unit.
    fn name(&self) -> &'static str;

    /// Hook run every tick before the decision step, with the unit's
    /// activity as it stands going into the step.
    fn on_update(
        &mut self,
        _ctx: &mut SimContext<'_>,
        _unit: UnitId,
        _activity: Activity,
        _dt: Fixed,
    ) {
    }

    /// How attractive this behaviour is right now. `None` or `Some(0)` means
    /// not viable.
    fn weigh(&mut self, ctx: &SimContext<'_>, unit: UnitId, weights: &WeightTable) -> Option<u32>;

    /// Perform one tick of the behaviour.
    fn run(&mut self, ctx: &mut SimContext<'_>, unit: UnitId, dt: Fixed) -> Continuation;
}

/// Named weights collected during one decision round, in registration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WeightTable {
    entries: Vec<(&'static str, u32)>,
}

impl WeightTable {
    /// Record a weight.
    ///
    /// # Errors
    ///
    /// A name may only be weighed once per round; a second weight is rejected
    /// with [`TacticalError::DuplicateBehaviour`].
    pub fn insert(&mut self, name: &'static str, weight: u32) -> Result<()> {
        if self.contains(name) {
            return Err(TacticalError::DuplicateBehaviour {
                unit: String::new(),
                name: name.to_string(),
            });
        }
        self.entries.push((name, weight));
        Ok(())
    }

    /// Weight recorded for `name` this round.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<u32> {
        self.entries
            .iter()
            .find(|(entry, _)| *entry == name)
            .map(|&(_, weight)| weight)
    }

    /// True if `name` has been weighed this round.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Number of recorded weights.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing has been weighed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Recorded weights in order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, u32)> + '_ {
        self.entries.iter().copied()
    }

    fn clear(&mut self) {
        self.entries.clear();
    }

    fn retain_positive(&mut self) {
        self.entries.retain(|&(_, weight)| weight > 0);
    }
}

/// A unit's registered behaviours and decision state.
#[derive(Debug, Default)]
pub struct Brain {
    behaviours: Vec<Box<dyn Behaviour>>,
    weights: WeightTable,
    current: Activity,
}

impl Brain {
    /// Register a behaviour.
    ///
    /// # Errors
    ///
    /// Returns [`TacticalError::DuplicateBehaviour`] if the name is taken.
    pub fn register(&mut self, unit: &str, behaviour: Box<dyn Behaviour>) -> Result<()> {
        let name = behaviour.name();
        if self.behaviours.iter().any(|b| b.name() == name) {
            return Err(TacticalError::DuplicateBehaviour {
                unit: unit.to_string(),
                name: name.to_string(),
            });
        }
        self.behaviours.push(behaviour);
        Ok(())
    }

    /// Remove a behaviour by name. If it was running, the unit goes back to
    /// deciding.
    ///
    /// # Errors
    ///
    /// Returns [`TacticalError::UnknownBehaviour`] if no behaviour has that name.
    pub fn unregister(&mut self, unit: &str, name: &str) -> Result<Box<dyn Behaviour>> {
        let index = self
            .behaviours
            .iter()
            .position(|b| b.name() == name)
            .ok_or_else(|| TacticalError::UnknownBehaviour {
                unit: unit.to_string(),
                name: name.to_string(),
            })?;
        if self.current == Activity::Running(self.behaviours[index].name()) {
            self.current = Activity::Deciding;
        }
        Ok(self.behaviours.remove(index))
    }

    /// Current activity.
    #[must_use]
    pub const fn current(&self) -> Activity {
        self.current
    }

    /// Weights from the most recent decision round, zeros dropped.
    #[must_use]
    pub const fn last_weights(&self) -> &WeightTable {
        &self.weights
    }

    /// Registered behaviour names, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.behaviours.iter().map(|b| b.name())
    }

    /// Empty brain that only reports `current`. Stands in on the unit while
    /// the real brain is stepping.
    fn stand_in(current: Activity) -> Self {
        Self {
            current,
            ..Self::default()
        }
    }

    /// Abandon whatever is running.
    pub fn reset(&mut self) {
        self.current = Activity::Deciding;
        self.weights.clear();
    }

    fn step(&mut self, ctx: &mut SimContext<'_>, unit: UnitId, dt: Fixed) {
        for behaviour in &mut self.behaviours {
            behaviour.on_update(ctx, unit, self.current, dt);
        }

        if self.current == Activity::Deciding {
            self.decide(ctx, unit);
            if let Some(u) = ctx.map.unit_mut(unit) {
                u.brain.current = self.current;
            }
        }

        let Activity::Running(name) = self.current else {
            return;
        };
        let Some(behaviour) = self.behaviours.iter_mut().find(|b| b.name() == name) else {
            warn!(
                "{} is running '{}' which is not registered",
                ctx.unit_name(unit),
                name
            );
            self.current = Activity::Deciding;
            return;
        };
        if behaviour.run(ctx, unit, dt) == Continuation::Complete {
            debug!("{} finished '{}'", ctx.unit_name(unit), name);
            self.current = Activity::Deciding;
        }
    }

    fn decide(&mut self, ctx: &mut SimContext<'_>, unit: UnitId) {
        self.weights.clear();
        for behaviour in &mut self.behaviours {
            let Some(weight) = behaviour.weigh(ctx, unit, &self.weights) else {
                continue;
            };
            if let Err(err) = self.weights.insert(behaviour.name(), weight) {
                warn!("{}: {}", ctx.unit_name(unit), err);
            }
        }
        self.weights.retain_positive();
        if self.weights.is_empty() {
            return;
        }

        let values: Vec<u32> = self.weights.iter().map(|(_, weight)| weight).collect();
        match select_weighted(&values, &mut *ctx.rng) {
            Ok(index) => {
                let (name, weight) = self.weights.entries[index];
                debug!(
                    "{} chose '{}' ({} of {})",
                    ctx.unit_name(unit),
                    name,
                    weight,
                    values.iter().map(|&w| u64::from(w)).sum::<u64>()
                );
                self.current = Activity::Running(name);
            }
            Err(err) => warn!("{}: {}", ctx.unit_name(unit), err),
        }
    }
}

/// Run one tick of the full pipeline for a single unit.
///
/// Units that are not conscious are skipped entirely.
pub fn update_unit(ctx: &mut SimContext<'_>, unit: UnitId, dt: Fixed) {
    if !ctx.map.unit(unit).is_some_and(|u| u.is_conscious()) {
        return;
    }

    pathfinding::advance(ctx.map, unit, dt);
    perception::refresh(ctx.map, unit, dt);
    awareness::refresh(ctx.map, ctx.config, unit, dt);

    let Some(mut brain) = ctx
        .map
        .unit_mut(unit)
        .map(|u| {
            let stand_in = Brain::stand_in(u.brain.current);
            std::mem::replace(&mut u.brain, stand_in)
        })
    else {
        return;
    };
    brain.step(ctx, unit, dt);
    if let Some(u) = ctx.map.unit_mut(unit) {
        if !u.is_conscious() {
            brain.reset();
        }
        u.brain = brain;
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use rand::rngs::mock::StepRng;

    use super::*;
    use crate::tile::TileCoord;
    use crate::unit::{Allegiance, Stats, Unit};

    /// Weighs a fixed value and completes after `runs` ticks.
    #[derive(Debug)]
    struct Fixture {
        name: &'static str,
        weight: Option<u32>,
        runs: u32,
        ran: u32,
    }

    impl Fixture {
        fn boxed(name: &'static str, weight: Option<u32>, runs: u32) -> Box<dyn Behaviour> {
            Box::new(Self {
                name,
                weight,
                runs,
                ran: 0,
            })
        }
    }

    impl Behaviour for Fixture {
        fn name(&self) -> &'static str {
            self.name
        }

        fn weigh(&mut self, _: &SimContext<'_>, _: UnitId, _: &WeightTable) -> Option<u32> {
            self.weight
        }

        fn run(&mut self, _: &mut SimContext<'_>, _: UnitId, _: Fixed) -> Continuation {
            self.ran += 1;
            if self.ran >= self.runs {
                Continuation::Complete
            } else {
                Continuation::Continue
            }
        }
    }

    /// Loses one HP every run and never completes.
    #[derive(Debug)]
    struct Bleed;

    impl Behaviour for Bleed {
        fn name(&self) -> &'static str {
            "bleed"
        }

        fn weigh(&mut self, _: &SimContext<'_>, _: UnitId, _: &WeightTable) -> Option<u32> {
            Some(1)
        }

        fn run(&mut self, ctx: &mut SimContext<'_>, unit: UnitId, _: Fixed) -> Continuation {
            let _ = ctx.map.damage_unit(unit, 1);
            Continuation::Continue
        }
    }

    fn setup(behaviours: Vec<Box<dyn Behaviour>>) -> (Map, UnitId) {
        let mut map = Map::new(3, 3);
        let mut unit = Unit::new("tester", Allegiance(1), TileCoord::new(1, 1))
            .with_stats(Stats {
                constitution: 10,
                dexterity: 10,
                ..Stats::default()
            })
            .unwrap();
        for behaviour in behaviours {
            unit.register_behaviour(behaviour).unwrap();
        }
        let id = map.place_unit(unit).unwrap();
        (map, id)
    }

    fn tick(map: &mut Map, id: UnitId, rng: &mut StepRng) {
        let config = SimConfig::default();
        let mut events = TickEvents::default();
        let mut ctx = SimContext {
            map,
            rng,
            config: &config,
            events: &mut events,
        };
        update_unit(&mut ctx, id, Fixed::ONE);
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let mut unit = Unit::new("tester", Allegiance(1), TileCoord::new(0, 0));
        unit.register_behaviour(Fixture::boxed("a", Some(1), 1))
            .unwrap();
        assert!(matches!(
            unit.register_behaviour(Fixture::boxed("a", Some(1), 1)),
            Err(TacticalError::DuplicateBehaviour { .. })
        ));
    }

    #[test]
    fn test_lottery_picks_by_cumulative_weight() {
        // Draw 1 + (3 % 4) = 4 lands past "a" (weight 3) into "b".
        let (mut map, id) = setup(vec![
            Fixture::boxed("a", Some(3), 5),
            Fixture::boxed("b", Some(1), 5),
        ]);
        tick(&mut map, id, &mut StepRng::new(3, 0));
        assert_eq!(map.unit(id).unwrap().activity(), Activity::Running("b"));
    }

    #[test]
    fn test_zero_and_missing_weights_leave_unit_idle() {
        let (mut map, id) = setup(vec![
            Fixture::boxed("a", Some(0), 1),
            Fixture::boxed("b", None, 1),
        ]);
        tick(&mut map, id, &mut StepRng::new(0, 1));
        assert_eq!(map.unit(id).unwrap().activity(), Activity::Deciding);
    }

    #[test]
    fn test_running_behaviour_continues_until_complete() {
        let (mut map, id) = setup(vec![Fixture::boxed("a", Some(1), 3)]);
        let mut rng = StepRng::new(0, 1);
        tick(&mut map, id, &mut rng);
        tick(&mut map, id, &mut rng);
        assert_eq!(map.unit(id).unwrap().activity(), Activity::Running("a"));
        tick(&mut map, id, &mut rng);
        assert_eq!(map.unit(id).unwrap().activity(), Activity::Deciding);
    }

    #[test]
    fn test_unregister_running_behaviour_resets() {
        let (mut map, id) = setup(vec![Fixture::boxed("a", Some(1), 5)]);
        tick(&mut map, id, &mut StepRng::new(0, 1));
        let unit = map.unit_mut(id).unwrap();
        unit.unregister_behaviour("a").unwrap();
        assert_eq!(unit.activity(), Activity::Deciding);
        assert!(matches!(
            unit.unregister_behaviour("a"),
            Err(TacticalError::UnknownBehaviour { .. })
        ));
    }

    #[test]
    fn test_observers_see_running_behaviour_mid_step() {
        let (mut map, id) = setup(vec![Box::new(Bleed)]);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&seen);
        map.on_unit_changed(move |_, unit| {
            log.borrow_mut().push((unit.hp(), unit.activity()));
        });

        let mut rng = StepRng::new(0, 1);
        tick(&mut map, id, &mut rng);
        tick(&mut map, id, &mut rng);

        let wounds: Vec<(i32, Activity)> = seen
            .borrow()
            .iter()
            .copied()
            .filter(|&(hp, _)| hp < 10)
            .collect();
        assert_eq!(
            wounds,
            vec![(9, Activity::Running("bleed")), (8, Activity::Running("bleed"))]
        );
        assert_eq!(map.unit(id).unwrap().hp(), 8);
        assert_eq!(map.unit(id).unwrap().behaviour_names().count(), 1);
    }

    #[test]
    fn test_dead_units_skip_the_core() {
        let (mut map, id) = setup(vec![Fixture::boxed("a", Some(1), 5)]);
        map.damage_unit(id, 100).unwrap();
        tick(&mut map, id, &mut StepRng::new(0, 1));
        assert_eq!(map.unit(id).unwrap().activity(), Activity::Deciding);
    }

    #[test]
    fn test_weight_table_rejects_second_weight() {
        let mut table = WeightTable::default();
        table.insert("wander", 5).unwrap();
        assert!(table.insert("wander", 7).is_err());
        assert_eq!(table.get("wander"), Some(5));
    }
}
