//! Headless runner serving the JSON-lines protocol.
//!
//! The runner owns one [`Simulation`] and advances it only when told to.
//! Nothing ticks on a timer: a controller (test harness, recording tool,
//! external AI) decides when the next frame happens.

use std::convert::Infallible;
use std::io::{BufRead, Write};

use conquest_core::config::SimConfig;
use conquest_core::map::MapData;
use conquest_core::random::{RandomSource, SeededRandom};
use conquest_core::simulation::Simulation;
use tracing::{debug, info, warn};

use crate::protocol::{Command, EventOutput, ProtocolError, Response};

/// Headless game runner.
pub struct HeadlessRunner<R: RandomSource = SeededRandom> {
    sim: Simulation<R>,
    commands_processed: u64,
}

impl HeadlessRunner<SeededRandom> {
    /// Create a runner around an empty world.
    #[must_use]
    pub fn new(config: SimConfig) -> Self {
        Self::from_simulation(Simulation::new(config))
    }

    /// Create a runner with `map` already loaded.
    #[must_use]
    pub fn with_map(config: SimConfig, map: &MapData) -> Self {
        Self::from_simulation(Simulation::from_map(config, map))
    }
}

impl<R: RandomSource> HeadlessRunner<R> {
    /// Wrap an existing simulation.
    #[must_use]
    pub fn from_simulation(sim: Simulation<R>) -> Self {
        Self {
            sim,
            commands_processed: 0,
        }
    }

    /// The simulation being served.
    #[must_use]
    pub fn simulation(&self) -> &Simulation<R> {
        &self.sim
    }

    /// Commands handled so far, malformed lines excluded.
    #[must_use]
    pub fn commands_processed(&self) -> u64 {
        self.commands_processed
    }

    /// Serve the protocol until `quit` or end of input.
    ///
    /// Prints `ready` first. Malformed lines produce an `error` response
    /// and processing continues.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Io`] if reading or writing fails.
    pub fn run<In: BufRead, Out: Write>(
        &mut self,
        input: In,
        mut output: Out,
    ) -> Result<(), ProtocolError> {
        info!("Headless runner starting");
        write_response(&mut output, &Response::ready(self.sim.get_tick()))?;

        for line in input.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let command = match Command::from_json(line) {
                Ok(command) => command,
                Err(e) => {
                    warn!(error = %e, "Rejected input line");
                    write_response(&mut output, &Response::error(e.to_string(), None))?;
                    continue;
                }
            };

            self.dispatch(&command, &mut |response| write_response(&mut output, &response))?;
            if command == Command::Quit {
                break;
            }
        }

        info!(
            commands = self.commands_processed,
            tick = self.sim.get_tick(),
            "Headless runner shutting down"
        );
        Ok(())
    }

    /// Apply one command and collect its responses.
    pub fn execute(&mut self, command: &Command) -> Vec<Response> {
        let mut responses = Vec::new();
        let result: Result<(), Infallible> = self.dispatch(command, &mut |response| {
            responses.push(response);
            Ok(())
        });
        match result {
            Ok(()) => responses,
            Err(never) => match never {},
        }
    }

    /// Apply one command, handing each response to `emit` as soon as it
    /// exists. A `step` emits one `tick` response per tick.
    ///
    /// # Errors
    ///
    /// Stops at the first error returned by `emit`.
    pub fn dispatch<E>(
        &mut self,
        command: &Command,
        emit: &mut impl FnMut(Response) -> Result<(), E>,
    ) -> Result<(), E> {
        debug!(cmd = command.name(), "Processing command");
        self.commands_processed += 1;

        match command {
            Command::Step { count } => self.step(*count, emit),
            Command::Query => emit(Response::state(&self.sim.snapshot())),
            Command::LoadMap { path } => emit(self.load_map(path)),
            Command::Send { from, to } => emit(match self.sim.send_troops(*from, *to) {
                Ok(accepted) => Response::Dispatch { accepted },
                Err(e) => Response::error(e.to_string(), Some(command.name())),
            }),
            Command::Hash => emit(Response::Hash {
                tick: self.sim.get_tick(),
                hash: self.sim.state_hash(),
            }),
            Command::Quit => emit(Response::Bye),
        }
    }

    fn step<E>(
        &mut self,
        count: u32,
        emit: &mut impl FnMut(Response) -> Result<(), E>,
    ) -> Result<(), E> {
        if count > 0 && self.sim.is_finished() {
            return emit(Response::error("game is finished", Some("step")));
        }

        for _ in 0..count {
            if self.sim.is_finished() {
                break;
            }
            let events = self.sim.tick();
            emit(Response::Tick {
                tick: self.sim.get_tick(),
                events: events.iter().map(EventOutput::from).collect(),
            })?;
        }
        Ok(())
    }

    fn load_map(&mut self, path: &str) -> Response {
        match MapData::load(path) {
            Ok(map) => {
                self.sim.load_map(&map);
                Response::Loaded {
                    buildings: self.sim.buildings().len(),
                    obstacles: self.sim.obstacles().len(),
                    factions: self.sim.factions().iter().copied().collect(),
                }
            }
            Err(e) => {
                warn!(path, error = %e, "Failed to load map");
                Response::error(e.to_string(), Some("load_map"))
            }
        }
    }
}

fn write_response<W: Write>(output: &mut W, response: &Response) -> Result<(), ProtocolError> {
    output.write_all(response.to_json_line().as_bytes())?;
    output.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use conquest_core::map::BuildingSpec;

    fn duel() -> MapData {
        MapData {
            buildings: vec![
                BuildingSpec::new(540.0, 1700.0, "PLAYER", 100),
                BuildingSpec::new(540.0, 220.0, "ENEMY", 100),
            ],
            ..MapData::default()
        }
    }

    #[test]
    fn test_step_reports_each_tick() {
        let mut runner = HeadlessRunner::with_map(SimConfig::default(), &duel());
        let responses = runner.execute(&Command::Step { count: 3 });
        let ticks: Vec<u64> = responses
            .iter()
            .map(|r| match r {
                Response::Tick { tick, .. } => *tick,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(ticks, vec![1, 2, 3]);
    }

    #[test]
    fn test_send_unknown_building_is_error() {
        let mut runner = HeadlessRunner::with_map(SimConfig::default(), &duel());
        let responses = runner.execute(&Command::Send { from: 0, to: 9 });
        assert!(matches!(
            responses.as_slice(),
            [Response::Error { cmd: Some(cmd), .. }] if cmd == "send"
        ));
    }

    #[test]
    fn test_send_is_accepted_and_spawn_follows() {
        let mut runner = HeadlessRunner::with_map(SimConfig::default(), &duel());
        assert_eq!(
            runner.execute(&Command::Send { from: 0, to: 1 }),
            vec![Response::Dispatch { accepted: true }]
        );
        let responses = runner.execute(&Command::Step { count: 1 });
        let Response::Tick { events, .. } = &responses[0] else {
            panic!("expected tick");
        };
        assert_eq!(
            events.first(),
            Some(&EventOutput::Spawn {
                x: 540.0,
                y: 1700.0
            })
        );
    }

    #[test]
    fn test_missing_map_file_is_error() {
        let mut runner = HeadlessRunner::new(SimConfig::default());
        let responses = runner.execute(&Command::LoadMap {
            path: "/nonexistent/map.json".to_string(),
        });
        assert!(matches!(responses.as_slice(), [Response::Error { .. }]));
    }

    #[test]
    fn test_hash_matches_simulation() {
        let mut runner = HeadlessRunner::with_map(SimConfig::default(), &duel());
        runner.execute(&Command::Step { count: 10 });
        let expected = runner.simulation().state_hash();
        assert_eq!(
            runner.execute(&Command::Hash),
            vec![Response::Hash {
                tick: 10,
                hash: expected
            }]
        );
    }

    /// Accepts `lines` lines of output, then reports a closed pipe.
    struct ClosingPipe {
        lines: usize,
    }

    impl Write for ClosingPipe {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if self.lines == 0 {
                return Err(std::io::ErrorKind::BrokenPipe.into());
            }
            let newlines = buf.iter().filter(|&&b| b == b'\n').count();
            self.lines = self.lines.saturating_sub(newlines);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_step_streams_ticks_as_they_run() {
        let lonely = MapData {
            buildings: vec![BuildingSpec::new(0.0, 0.0, "PLAYER", 5)],
            ..MapData::default()
        };
        let mut runner = HeadlessRunner::with_map(SimConfig::default(), &lonely);
        let input = b"{\"cmd\":\"step\",\"count\":1000000}\n";

        // ready plus two ticks get through, the third write fails.
        let result = runner.run(&input[..], ClosingPipe { lines: 3 });
        assert!(matches!(result, Err(ProtocolError::Io(_))));
        assert_eq!(runner.simulation().get_tick(), 3);
    }

    #[test]
    fn test_run_survives_garbage_lines() {
        let input = b"not json\n\n{\"cmd\":\"hash\"}\n{\"cmd\":\"quit\"}\n{\"cmd\":\"step\"}\n";
        let mut output = Vec::new();
        let mut runner = HeadlessRunner::with_map(SimConfig::default(), &duel());
        runner.run(&input[..], &mut output).unwrap();

        let text = String::from_utf8(output).unwrap();
        let types: Vec<String> = text
            .lines()
            .map(|line| {
                let value: serde_json::Value = serde_json::from_str(line).unwrap();
                value["type"].as_str().unwrap().to_string()
            })
            .collect();
        assert_eq!(types, vec!["ready", "error", "hash", "bye"]);
        assert_eq!(runner.commands_processed(), 2);
        assert_eq!(runner.simulation().get_tick(), 0);
    }
}
