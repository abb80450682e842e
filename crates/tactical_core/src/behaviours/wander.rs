//! Idle behaviours: wander, rest and the optional teleport.

use tracing::{debug, warn};

use crate::ai::{Behaviour, Continuation, SimContext, WeightTable};
use crate::ids::UnitId;
use crate::math::Fixed;
use crate::pathfinding::{step_toward, StepOutcome};
use crate::selection::pick_index;
use crate::simulation::TeleportEvent;
use crate::tile::{Tile, TileCoord};
use crate::unit::BehaviourState;

/// Step onto a random free neighbour.
#[derive(Debug, Default)]
pub struct Wander {
    wandering: bool,
}

impl Wander {
    /// Registered name.
    pub const NAME: &'static str = "wander";
}

impl Behaviour for Wander {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn weigh(&mut self, ctx: &SimContext<'_>, unit: UnitId, _: &WeightTable) -> Option<u32> {
        let me = ctx.map.unit(unit)?;
        (me.behaviour_state() == BehaviourState::Exploring).then_some(ctx.config.max_stat_score)
    }

    fn run(&mut self, ctx: &mut SimContext<'_>, unit: UnitId, _dt: Fixed) -> Continuation {
        let Some(me) = ctx.map.unit(unit) else {
            return Continuation::Complete;
        };

        if self.wandering {
            if me.is_moving() {
                return Continuation::Continue;
            }
            self.wandering = false;
            return Continuation::Complete;
        }

        let here = me.tile();
        let options: Vec<TileCoord> = ctx
            .map
            .adjacent_tiles(here)
            .map(Tile::coord)
            .filter(|&coord| ctx.map.can_step(here, coord))
            .collect();
        let Some(choice) = pick_index(options.len(), &mut *ctx.rng) else {
            return Continuation::Complete;
        };

        let destination = options[choice];
        match step_toward(ctx.map, unit, destination.to_position()) {
            StepOutcome::Started(_) => {
                self.wandering = true;
                Continuation::Continue
            }
            outcome => {
                warn!(
                    "{} could not wander to {}: {:?}",
                    ctx.unit_name(unit),
                    destination,
                    outcome
                );
                Continuation::Complete
            }
        }
    }
}

/// Stand still for a while, then recover a little HP.
#[derive(Debug, Default)]
pub struct Rest {
    remaining: Option<Fixed>,
}

impl Rest {
    /// Registered name.
    pub const NAME: &'static str = "rest";
}

impl Behaviour for Rest {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn weigh(&mut self, ctx: &SimContext<'_>, unit: UnitId, _: &WeightTable) -> Option<u32> {
        let me = ctx.map.unit(unit)?;
        let max = ctx.config.max_stat_score;
        match me.behaviour_state() {
            BehaviourState::Exploring => Some(max / me.stats().constitution.max(1)),
            BehaviourState::Resting => Some(max),
            _ => None,
        }
    }

    fn run(&mut self, ctx: &mut SimContext<'_>, unit: UnitId, dt: Fixed) -> Continuation {
        let Some(remaining) = self.remaining else {
            self.remaining = Some(ctx.config.rest_duration);
            return Continuation::Continue;
        };

        let remaining = remaining - dt;
        if remaining > Fixed::ZERO {
            self.remaining = Some(remaining);
            return Continuation::Continue;
        }

        self.remaining = None;
        match ctx.map.heal_unit(unit, ctx.config.rest_recovery) {
            Ok(0) => {}
            Ok(healed) => debug!("{} rests and recovers {} HP", ctx.unit_name(unit), healed),
            Err(err) => warn!("Rest failed: {}", err),
        }
        Continuation::Complete
    }
}

/// Jump to a random free tile, then wait out a cooldown.
#[derive(Debug, Default)]
pub struct Teleport {
    cooldown: Option<Fixed>,
}

impl Teleport {
    /// Registered name.
    pub const NAME: &'static str = "teleport";
}

impl Behaviour for Teleport {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn weigh(&mut self, _: &SimContext<'_>, _: UnitId, _: &WeightTable) -> Option<u32> {
        Some(1)
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

        let Some(from) = ctx.map.unit(unit).map(|u| u.tile()) else {
            return Continuation::Complete;
        };
        let width = ctx.map.width() as usize;
        let height = ctx.map.height() as usize;

        for _ in 0..ctx.config.teleport_attempts {
            let (Some(x), Some(y)) = (
                pick_index(width, &mut *ctx.rng),
                pick_index(height, &mut *ctx.rng),
            ) else {
                break;
            };
            let to = TileCoord::new(x as i32, y as i32);
            if !ctx.map.tile(to).is_some_and(Tile::is_free) {
                continue;
            }
            return match ctx.map.teleport_unit(unit, to) {
                Ok(()) => {
                    debug!("{} teleports from {} to {}", ctx.unit_name(unit), from, to);
                    ctx.events.teleports.push(TeleportEvent { unit, from, to });
                    self.cooldown = Some(ctx.config.teleport_cooldown);
                    Continuation::Continue
                }
                Err(err) => {
                    warn!("Teleport failed: {}", err);
                    Continuation::Complete
                }
            };
        }

        debug!("{} found nowhere to teleport", ctx.unit_name(unit));
        Continuation::Complete
    }
}
