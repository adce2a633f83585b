//! Core simulation loop.
//!
//! One call to [`Simulation::tick`] advances the world by exactly one step
//! and returns the events produced during that step. Nothing runs between
//! ticks; the caller decides how fast to drive the loop, from real-time
//! pacing to one tick per external command.
//!
//! # Determinism
//!
//! - Positional math is fixed-point ([`Fixed`])
//! - Every random decision goes through the injected [`RandomSource`]
//! - Buildings, soldiers, spawns and agents are processed in stored order
//!
//! Two simulations built from the same config, seed and map produce the
//! same [`state_hash`](Simulation::state_hash) after the same ticks.
//!
//! # Example
//!
//! ```
//! use conquest_core::config::SimConfig;
//! use conquest_core::map::{BuildingSpec, MapData};
//! use conquest_core::simulation::Simulation;
//!
//! let map = MapData {
//!     buildings: vec![
//!         BuildingSpec::new(100.0, 100.0, "player", 50),
//!         BuildingSpec::new(400.0, 100.0, "enemy", 50),
//!     ],
//!     ..MapData::default()
//! };
//!
//! let mut sim = Simulation::from_map(SimConfig::default(), &map);
//! assert!(sim.send_troops(0, 1).unwrap());
//! let events = sim.tick();
//! assert_eq!(events.len(), 1);
//! ```

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeSet, HashMap};
use std::hash::{Hash, Hasher};

use tracing::{debug, info};

use crate::ai::AiAgent;
use crate::buildings::{Building, BuildingId};
use crate::config::SimConfig;
use crate::error::{GameError, Result};
use crate::events::{Outcome, SimEvent, TickEvents};
use crate::factions::Team;
use crate::geometry::{segment_intersects_rect, Rect};
use crate::map::MapData;
use crate::math::{Fixed, Vec2Fixed};
use crate::random::{RandomSource, SeededRandom};
use crate::snapshot::WorldSnapshot;
use crate::soldiers::{HitOutcome, ScheduledSpawn, Soldier};

/// Obstruction cache key: both endpoints rounded to whole units, in
/// canonical order so a path and its reverse share an entry.
type PathKey = ((i32, i32), (i32, i32));

/// The territory-control simulation.
///
/// # Tick Order
///
/// 1. Generate troops in every building, scaled by the intensity multiplier
/// 2. Turn due scheduled spawns into soldiers
/// 3. Move soldiers; resolve arrivals into hit and capture events
/// 4. Poll each AI agent and dispatch its command
/// 5. Evaluate victory
pub struct Simulation<R: RandomSource = SeededRandom> {
    config: SimConfig,
    tick: u64,
    buildings: Vec<Building>,
    obstacles: Vec<Rect>,
    soldiers: Vec<Soldier>,
    pending: Vec<ScheduledSpawn>,
    agents: Vec<AiAgent>,
    /// Non-neutral factions present at load.
    factions: BTreeSet<Team>,
    path_cache: HashMap<PathKey, bool>,
    victory: Option<Outcome>,
    victory_frames: u32,
    finished: bool,
    /// Events from dispatches made between ticks, delivered with the next tick.
    queued_events: TickEvents,
    rng: R,
}

impl Simulation<SeededRandom> {
    /// Create an empty simulation using the config's seed.
    #[must_use]
    pub fn new(config: SimConfig) -> Self {
        let rng = SeededRandom::new(config.seed);
        Self::with_random(config, rng)
    }

    /// Create a simulation and load `map` into it.
    #[must_use]
    pub fn from_map(config: SimConfig, map: &MapData) -> Self {
        let mut sim = Self::new(config);
        sim.load_map(map);
        sim
    }
}

impl<R: RandomSource> Simulation<R> {
    /// Create an empty simulation drawing randomness from `rng`.
    #[must_use]
    pub fn with_random(config: SimConfig, rng: R) -> Self {
        Self {
            config,
            tick: 0,
            buildings: Vec::new(),
            obstacles: Vec::new(),
            soldiers: Vec::new(),
            pending: Vec::new(),
            agents: Vec::new(),
            factions: BTreeSet::new(),
            path_cache: HashMap::new(),
            victory: None,
            victory_frames: 0,
            finished: false,
            queued_events: TickEvents::default(),
            rng,
        }
    }

    /// Replace the world with `map`.
    ///
    /// Resets the tick counter, soldiers, spawns, victory state and the
    /// obstruction cache, then creates one AI agent per non-neutral faction
    /// found among the buildings.
    pub fn load_map(&mut self, map: &MapData) {
        self.buildings = map.to_buildings(self.config.building.max_count);
        self.obstacles = map.to_obstacles();
        self.soldiers.clear();
        self.pending.clear();
        self.path_cache.clear();
        self.queued_events = TickEvents::default();
        self.tick = 0;
        self.victory = None;
        self.victory_frames = 0;
        self.finished = false;

        self.factions = self
            .buildings
            .iter()
            .map(|b| b.team)
            .filter(|team| !team.is_neutral())
            .collect();
        self.agents = self.factions.iter().map(|&team| AiAgent::new(team)).collect();

        info!(
            buildings = self.buildings.len(),
            obstacles = self.obstacles.len(),
            factions = self.factions.len(),
            "Map loaded"
        );
    }

    /// Advance the simulation by one tick.
    ///
    /// Returns the tick's events in order. Once the simulation is
    /// finished this changes nothing and returns no events.
    pub fn tick(&mut self) -> TickEvents {
        if self.finished {
            return TickEvents::default();
        }

        let mut events = std::mem::take(&mut self.queued_events);

        let intensity = self.intensity();
        for building in &mut self.buildings {
            building.update(&self.config, intensity);
        }

        self.materialize_spawns();
        self.advance_soldiers(&mut events);
        self.run_agents(&mut events);
        self.check_victory(&mut events);

        self.tick += 1;

        #[cfg(debug_assertions)]
        {
            let hash = self.state_hash();
            debug!(tick = self.tick, state_hash = hash, "Simulation state hash");
        }

        events
    }

    /// Tick until finished or until `max_ticks` more ticks have run.
    ///
    /// Returns the number of ticks advanced.
    pub fn run_until_finished(&mut self, max_ticks: u64) -> u64 {
        let mut advanced = 0;
        while !self.finished && advanced < max_ticks {
            self.tick();
            advanced += 1;
        }
        advanced
    }

    /// Dispatch troops from one building toward another.
    ///
    /// Returns `Ok(false)` without touching anything when the path is
    /// obstructed or the simulation has finished. The dispatch's spawn
    /// event is delivered with the next tick's events.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidBuildingId`] for an unknown building.
    pub fn send_troops(&mut self, from: BuildingId, to: BuildingId) -> Result<bool> {
        self.building(from)?;
        self.building(to)?;
        if self.finished {
            return Ok(false);
        }

        let mut events = std::mem::take(&mut self.queued_events);
        let accepted = self.dispatch(from, to, &mut events);
        self.queued_events = events;
        Ok(accepted)
    }

    /// Put a soldier directly into play, skipping the dispatch queue.
    ///
    /// Used by tools and tests that stage arrivals.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidBuildingId`] if the soldier's target
    /// does not exist.
    pub fn add_soldier(&mut self, soldier: Soldier) -> Result<()> {
        self.building(soldier.target)?;
        self.soldiers.push(soldier);
        Ok(())
    }

    /// Whether the straight path `p1`–`p2` crosses an obstacle.
    ///
    /// Memoized on the rounded endpoints. The first query for a key
    /// decides the cached answer until the cache is cleared.
    pub fn is_path_blocked(&mut self, p1: Vec2Fixed, p2: Vec2Fixed) -> bool {
        path_blocked(&mut self.path_cache, &self.obstacles, p1, p2)
    }

    /// Generation speed-up for the current tick.
    ///
    /// 1 until `start_tick` ticks have elapsed, then growing linearly by
    /// `growth_per_second` per simulated second.
    #[must_use]
    pub fn intensity(&self) -> Fixed {
        intensity_at(&self.config, self.tick)
    }

    /// Ticks advanced since the map was loaded.
    #[must_use]
    pub const fn get_tick(&self) -> u64 {
        self.tick
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Buildings in ID order.
    #[must_use]
    pub fn buildings(&self) -> &[Building] {
        &self.buildings
    }

    /// Look up one building.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidBuildingId`] for an unknown ID.
    pub fn building(&self, id: BuildingId) -> Result<&Building> {
        self.buildings.get(id).ok_or(GameError::InvalidBuildingId(id))
    }

    /// Static obstacles.
    #[must_use]
    pub fn obstacles(&self) -> &[Rect] {
        &self.obstacles
    }

    /// Soldiers in flight.
    #[must_use]
    pub fn soldiers(&self) -> &[Soldier] {
        &self.soldiers
    }

    /// Dispatched soldiers not yet in play.
    #[must_use]
    pub fn pending_spawns(&self) -> &[ScheduledSpawn] {
        &self.pending
    }

    /// Factions discovered at load.
    #[must_use]
    pub fn factions(&self) -> &BTreeSet<Team> {
        &self.factions
    }

    /// AI agents in faction order.
    #[must_use]
    pub fn agents(&self) -> &[AiAgent] {
        &self.agents
    }

    /// Decided outcome, if any.
    #[must_use]
    pub fn victory(&self) -> Option<Outcome> {
        self.victory
    }

    /// Ticks run since the victory was decided.
    #[must_use]
    pub fn victory_frames(&self) -> u32 {
        self.victory_frames
    }

    /// Whether further ticks are no-ops.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Read-only copy of the world.
    #[must_use]
    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            tick: self.tick,
            buildings: self.buildings.clone(),
            soldiers: self.soldiers.clone(),
            pending_spawns: self.pending.len(),
            victory: self.victory,
            victory_frames: self.victory_frames,
            finished: self.finished,
        }
    }

    /// Compute a hash of the current simulation state.
    ///
    /// Covers everything that influences future ticks except the random
    /// source and the obstruction cache, which only memoizes static data.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();

        self.tick.hash(&mut hasher);
        self.buildings.hash(&mut hasher);
        self.soldiers.hash(&mut hasher);
        self.pending.hash(&mut hasher);

        for agent in &self.agents {
            agent.team.hash(&mut hasher);
            agent.cooldown_counter.hash(&mut hasher);
        }

        self.victory.hash(&mut hasher);
        self.victory_frames.hash(&mut hasher);
        self.finished.hash(&mut hasher);

        hasher.finish()
    }

    /// Due spawns join the soldier list in dispatch order.
    fn materialize_spawns(&mut self) {
        let mut due = Vec::new();
        self.pending.retain_mut(|spawn| {
            if spawn.countdown() {
                due.push(spawn.materialize());
                false
            } else {
                true
            }
        });
        self.soldiers.extend(due);
    }

    /// Soldiers move and resolve in creation order, so arrivals at one
    /// building in the same tick land oldest first.
    fn advance_soldiers(&mut self, events: &mut TickEvents) {
        let soldiers = std::mem::take(&mut self.soldiers);
        let mut remaining = Vec::with_capacity(soldiers.len());

        for mut soldier in soldiers {
            let Some(target) = self.buildings.get_mut(soldier.target) else {
                continue;
            };
            if !soldier.advance(target.position, &self.config) {
                remaining.push(soldier);
                continue;
            }

            let position = target.position;
            match soldier.hit(target, &self.config, &mut self.rng) {
                Some(HitOutcome::Hit { team, target_team }) => events.push(SimEvent::Hit {
                    position,
                    team,
                    target_team,
                }),
                Some(HitOutcome::Capture { team }) => {
                    debug!(target = soldier.target, %team, "Building captured");
                    events.push(SimEvent::Capture { position, team });
                    self.path_cache.clear();
                }
                None => {}
            }
        }

        self.soldiers = remaining;
    }

    fn run_agents(&mut self, events: &mut TickEvents) {
        for index in 0..self.agents.len() {
            let command = {
                let Self {
                    config,
                    buildings,
                    obstacles,
                    agents,
                    path_cache,
                    rng,
                    ..
                } = self;
                let buildings: &[Building] = buildings;
                agents[index].poll(buildings, &config.ai, rng, |from, to| {
                    path_blocked(
                        path_cache,
                        obstacles,
                        buildings[from].position,
                        buildings[to].position,
                    )
                })
            };

            if let Some(command) = command {
                self.dispatch(command.from, command.to, events);
            }
        }
    }

    /// Commit a dispatch between two valid building IDs.
    fn dispatch(&mut self, from: BuildingId, to: BuildingId, events: &mut TickEvents) -> bool {
        let origin = self.buildings[from].position;
        let destination = self.buildings[to].position;
        if self.is_path_blocked(origin, destination) {
            debug!(from, to, "Dispatch rejected: path blocked");
            return false;
        }

        let source = &mut self.buildings[from];
        let amount = (f64::from(source.count) * self.config.soldier.send_fraction).floor() as i32;
        source.count -= amount;
        let team = source.team;

        events.push(SimEvent::Spawn { position: origin });

        let delay = self.config.soldier.send_delay;
        self.pending.extend((0..amount as u32).map(|i| ScheduledSpawn {
            origin,
            target: to,
            team,
            frames_left: i.saturating_mul(delay),
        }));

        debug!(from, to, amount, %team, "Troops dispatched");
        true
    }

    fn check_victory(&mut self, events: &mut TickEvents) {
        if self.victory.is_some() {
            self.victory_frames = self.victory_frames.saturating_add(1);
            if self.victory_frames > self.config.victory.display_ticks {
                self.finished = true;
            }
            return;
        }

        if self.factions.is_empty() {
            return;
        }

        let alive: Vec<Team> = self
            .factions
            .iter()
            .copied()
            .filter(|&team| {
                self.buildings.iter().any(|b| b.team == team)
                    || self.soldiers.iter().any(|s| s.team == team)
            })
            .collect();

        if alive.len() >= self.factions.len() {
            return;
        }

        let outcome = match alive.as_slice() {
            [winner] => Outcome::Winner(*winner),
            [] => Outcome::None,
            _ => Outcome::Multiple,
        };
        info!(tick = self.tick, winner = %outcome, "Victory decided");

        self.victory = Some(outcome);
        events.push(SimEvent::Victory { winner: outcome });
        if self.config.victory.fast_finish {
            self.finished = true;
        }
    }
}

/// Intensity multiplier after `elapsed` ticks.
#[must_use]
pub fn intensity_at(config: &SimConfig, elapsed: u64) -> Fixed {
    let ramp = &config.intensity;
    if !ramp.enabled || elapsed <= ramp.start_tick {
        return Fixed::ONE;
    }
    let over = Fixed::saturating_from_num(elapsed - ramp.start_tick);
    let seconds = over / Fixed::from_num(config.tick_rate.max(1));
    Fixed::ONE + ramp.growth_per_second.saturating_mul(seconds)
}

fn path_key(p1: Vec2Fixed, p2: Vec2Fixed) -> PathKey {
    let a = p1.rounded();
    let b = p2.rounded();
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

fn path_blocked(
    cache: &mut HashMap<PathKey, bool>,
    obstacles: &[Rect],
    p1: Vec2Fixed,
    p2: Vec2Fixed,
) -> bool {
    *cache.entry(path_key(p1, p2)).or_insert_with(|| {
        let (a, b) = if (p1.x, p1.y) <= (p2.x, p2.y) {
            (p1, p2)
        } else {
            (p2, p1)
        };
        obstacles
            .iter()
            .any(|rect| segment_intersects_rect(a, b, rect))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::{BuildingSpec, MapData, ObstacleSpec};

    fn duel() -> MapData {
        MapData {
            buildings: vec![
                BuildingSpec::new(100.0, 100.0, "player", 100),
                BuildingSpec::new(500.0, 100.0, "enemy", 10),
            ],
            ..MapData::default()
        }
    }

    fn walled_duel() -> MapData {
        MapData {
            obstacles: vec![ObstacleSpec {
                x: 280.0,
                y: 0.0,
                w: 40.0,
                h: 400.0,
            }],
            ..duel()
        }
    }

    fn passive_config() -> SimConfig {
        let mut config = SimConfig::default();
        config.ai.min_attack_count = i32::MAX;
        config
    }

    #[test]
    fn load_discovers_factions_and_agents() {
        let sim = Simulation::from_map(SimConfig::default(), &duel());
        assert_eq!(sim.buildings().len(), 2);
        assert_eq!(
            sim.factions().iter().copied().collect::<Vec<_>>(),
            vec![Team::Player, Team::Enemy]
        );
        assert_eq!(sim.agents().len(), 2);
        assert_eq!(sim.get_tick(), 0);
    }

    #[test]
    fn dispatch_schedules_staggered_spawns() {
        let mut sim = Simulation::from_map(passive_config(), &duel());
        assert!(sim.send_troops(0, 1).unwrap());
        assert_eq!(sim.buildings()[0].count, 20);

        let delays: Vec<u32> = sim.pending_spawns().iter().map(|s| s.frames_left).collect();
        assert_eq!(delays.len(), 80);
        assert_eq!(delays[0], 0);
        assert_eq!(delays[79], 395);

        let events = sim.tick();
        assert_eq!(
            events.events[0],
            SimEvent::Spawn {
                position: Vec2Fixed::from_ints(100, 100)
            }
        );
        assert_eq!(sim.soldiers().len(), 1);
    }

    #[test]
    fn blocked_dispatch_changes_nothing() {
        let mut sim = Simulation::from_map(passive_config(), &walled_duel());
        assert!(!sim.send_troops(0, 1).unwrap());
        assert_eq!(sim.buildings()[0].count, 100);
        assert!(sim.pending_spawns().is_empty());
        assert!(sim.tick().is_empty());
    }

    #[test]
    fn invalid_ids_are_errors() {
        let mut sim = Simulation::from_map(passive_config(), &duel());
        assert!(matches!(
            sim.send_troops(0, 7),
            Err(GameError::InvalidBuildingId(7))
        ));
        assert!(sim.add_soldier(Soldier::new(Vec2Fixed::ZERO, 9, Team::Player)).is_err());
    }

    #[test]
    fn path_queries_are_memoized_symmetrically() {
        let mut sim = Simulation::from_map(passive_config(), &walled_duel());
        let a = Vec2Fixed::from_ints(100, 100);
        let b = Vec2Fixed::from_ints(500, 100);
        assert!(sim.is_path_blocked(a, b));
        assert!(sim.is_path_blocked(b, a));
        assert_eq!(sim.path_cache.len(), 1);
    }

    #[test]
    fn capture_clears_path_cache() {
        let mut map = walled_duel();
        map.buildings.push(BuildingSpec::new(300.0, 500.0, "neutral", 0));
        let mut sim = Simulation::from_map(passive_config(), &map);
        let a = Vec2Fixed::from_ints(100, 100);
        let b = Vec2Fixed::from_ints(500, 100);
        assert!(sim.is_path_blocked(a, b));
        assert!(!sim.path_cache.is_empty());

        let target = sim.buildings()[2].position;
        sim.add_soldier(Soldier::new(target, 2, Team::Player)).unwrap();
        let events = sim.tick();

        assert!(events
            .iter()
            .any(|e| matches!(e, SimEvent::Capture { team: Team::Player, .. })));
        assert!(sim.path_cache.is_empty());
    }

    #[test]
    fn load_map_clears_path_cache() {
        let mut sim = Simulation::from_map(passive_config(), &walled_duel());
        sim.is_path_blocked(Vec2Fixed::from_ints(100, 100), Vec2Fixed::from_ints(500, 100));
        assert_eq!(sim.path_cache.len(), 1);

        sim.load_map(&duel());
        assert!(sim.path_cache.is_empty());
        assert!(!sim.is_path_blocked(
            Vec2Fixed::from_ints(100, 100),
            Vec2Fixed::from_ints(500, 100)
        ));
    }

    #[test]
    fn distant_buildings_tick_without_overflow() {
        let far = MapData {
            buildings: vec![
                BuildingSpec::new(0.0, 0.0, "player", 100),
                BuildingSpec::new(50_000.0, 0.0, "enemy", 100),
            ],
            ..MapData::default()
        };
        let mut sim = Simulation::from_map(SimConfig::default(), &far);
        sim.run_until_finished(120);
        assert_eq!(sim.get_tick(), 120);

        let corners = MapData {
            buildings: vec![
                BuildingSpec::new(-1.0e6, -1.0e6, "player", 100),
                BuildingSpec::new(1.0e6, 1.0e6, "enemy", 100),
                BuildingSpec::new(1.0e6, -1.0e6, "neutral", 5),
            ],
            obstacles: vec![ObstacleSpec {
                x: -10.0,
                y: -5.0e5,
                w: 20.0,
                h: 1.0e6,
            }],
            ..MapData::default()
        };
        let mut sim = Simulation::from_map(SimConfig::default(), &corners);
        assert!(sim.is_path_blocked(
            Vec2Fixed::from_ints(-1_000_000, -1_000_000),
            Vec2Fixed::from_ints(1_000_000, 1_000_000)
        ));
        sim.run_until_finished(120);
        assert_eq!(sim.get_tick(), 120);
    }

    #[test]
    fn intensity_ramps_after_start() {
        let config = SimConfig::default();
        assert_eq!(intensity_at(&config, 0), Fixed::ONE);
        assert_eq!(intensity_at(&config, 3600), Fixed::ONE);
        let later = intensity_at(&config, 3600 + 600);
        let expected = Fixed::ONE + config.intensity.growth_per_second * Fixed::from_num(10);
        assert_eq!(later, expected);
    }

    #[test]
    fn intensity_can_be_disabled() {
        let mut config = SimConfig::default();
        config.intensity.enabled = false;
        assert_eq!(intensity_at(&config, 1_000_000), Fixed::ONE);
    }

    #[test]
    fn empty_map_never_declares_victory() {
        let mut sim = Simulation::new(SimConfig::default());
        sim.run_until_finished(50);
        assert_eq!(sim.victory(), None);
        assert!(!sim.is_finished());
    }

    #[test]
    fn finished_simulation_is_frozen() {
        let mut config = passive_config();
        config.victory.fast_finish = true;
        let map = MapData {
            buildings: vec![BuildingSpec::new(0.0, 0.0, "player", 5)],
            ..MapData::default()
        };
        let mut sim = Simulation::from_map(config, &map);
        // Only one faction was discovered, so nobody can be eliminated.
        sim.run_until_finished(10);
        assert!(!sim.is_finished());

        sim.buildings[0].team = Team::Neutral;
        let events = sim.tick();
        assert_eq!(events.victory(), Some(Outcome::None));
        assert!(sim.is_finished());

        let before = sim.state_hash();
        assert!(sim.tick().is_empty());
        assert_eq!(sim.state_hash(), before);
        assert!(!sim.send_troops(0, 0).unwrap());
    }
}
