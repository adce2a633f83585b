//! End-to-end tests of the headless runner over in-memory pipes and
//! temporary files.

use std::io::Write;
use std::path::{Path, PathBuf};

use conquest_core::config::SimConfig;
use conquest_core::events::SimEvent;
use conquest_core::factions::Team;
use conquest_core::map::{BuildingSpec, MapData};
use conquest_core::simulation::Simulation;
use conquest_headless::capture::{self, record_to_file, CaptureHeader};
use conquest_headless::protocol::{EventOutput, Response};
use conquest_headless::runner::HeadlessRunner;
use conquest_headless::{load_sim_config, run_batch, verify_determinism, BatchConfig};
use conquest_test_utils::fixtures::{duel_map, fast_config, map_of, skirmish_map};
use serde_json::json;

fn shipped_map() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../maps/skirmish.json")
}

fn session(runner: &mut HeadlessRunner, script: &str) -> Vec<Response> {
    let mut output = Vec::new();
    runner.run(script.as_bytes(), &mut output).unwrap();
    String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[test]
fn load_map_reports_world_and_factions() {
    let script = format!(
        "{}\n{{\"cmd\":\"quit\"}}\n",
        json!({"cmd": "load_map", "path": shipped_map()})
    );
    let mut runner = HeadlessRunner::new(SimConfig::default());
    let responses = session(&mut runner, &script);

    assert_eq!(
        responses,
        vec![
            Response::ready(0),
            Response::Loaded {
                buildings: 9,
                obstacles: 2,
                factions: vec![Team::Player, Team::Enemy],
            },
            Response::Bye,
        ]
    );
}

#[test]
fn shipped_map_matches_fixture() {
    let from_file = MapData::load(shipped_map()).unwrap();
    let a = Simulation::from_map(SimConfig::default(), &from_file);
    let b = Simulation::from_map(SimConfig::default(), &skirmish_map());
    assert_eq!(a.state_hash(), b.state_hash());
}

#[test]
fn ron_map_loads_through_protocol() {
    let mut file = tempfile::Builder::new().suffix(".ron").tempfile().unwrap();
    writeln!(
        file,
        r#"(buildings: [(x: 10.0, y: 10.0, team: "green", count: 5), (x: 90.0, y: 10.0, team: "yellow", count: 5)])"#
    )
    .unwrap();

    let mut runner = HeadlessRunner::new(SimConfig::default());
    let script = format!("{}\n", json!({"cmd": "load_map", "path": file.path()}));
    let responses = session(&mut runner, &script);
    assert_eq!(
        responses[1],
        Response::Loaded {
            buildings: 2,
            obstacles: 0,
            factions: vec![Team::Green, Team::Yellow],
        }
    );
}

#[test]
fn stepping_matches_direct_simulation() {
    let mut runner = HeadlessRunner::with_map(SimConfig::default().with_seed(8), &skirmish_map());
    let responses = session(
        &mut runner,
        "{\"cmd\":\"step\",\"count\":300}\n{\"cmd\":\"hash\"}\n",
    );

    let mut direct = Simulation::from_map(SimConfig::default().with_seed(8), &skirmish_map());
    let mut expected_events = Vec::new();
    for _ in 0..300 {
        expected_events.push(direct.tick());
    }

    let ticks: Vec<&Vec<EventOutput>> = responses
        .iter()
        .filter_map(|r| match r {
            Response::Tick { events, .. } => Some(events),
            _ => None,
        })
        .collect();
    assert_eq!(ticks.len(), 300);
    for (got, want) in ticks.iter().zip(&expected_events) {
        let want: Vec<EventOutput> = want.iter().map(EventOutput::from).collect();
        assert_eq!(*got, &want);
    }
    assert_eq!(
        responses.last(),
        Some(&Response::Hash {
            tick: 300,
            hash: direct.state_hash()
        })
    );
}

#[test]
fn step_stops_when_finished() {
    // An empty PLAYER outpost right next to a full ENEMY garrison: the
    // first arrivals capture it and PLAYER is eliminated.
    let map = map_of(vec![
        BuildingSpec::new(540.0, 1000.0, "PLAYER", 0),
        BuildingSpec::new(540.0, 900.0, "ENEMY", 100),
    ]);
    let mut sim = Simulation::from_map(fast_config(1), &map);
    assert!(sim.send_troops(1, 0).unwrap());
    sim.run_until_finished(1_000);
    assert!(sim.is_finished());
    let finished_at = sim.get_tick();

    let mut runner = HeadlessRunner::with_map(fast_config(1), &map);
    let script = format!(
        "{}\n{}\n{}\n",
        json!({"cmd": "send", "from": 1, "to": 0}),
        json!({"cmd": "step", "count": finished_at + 50}),
        json!({"cmd": "step"}),
    );
    let responses = session(&mut runner, &script);

    assert_eq!(responses[1], Response::Dispatch { accepted: true });
    let ticks = responses
        .iter()
        .filter(|r| matches!(r, Response::Tick { .. }))
        .count() as u64;
    assert_eq!(ticks, finished_at);
    assert!(matches!(responses.last(), Some(Response::Error { .. })));
}

#[test]
fn query_reports_float_state() {
    let mut runner = HeadlessRunner::with_map(SimConfig::default(), &duel_map());
    let responses = session(&mut runner, "{\"cmd\":\"query\"}\n");
    let Response::State(state) = &responses[1] else {
        panic!("expected state, got {:?}", responses[1]);
    };
    assert_eq!(state.tick, 0);
    assert_eq!(state.buildings.len(), 2);
    assert_eq!(state.buildings[0].x, 540.0);
    assert_eq!(state.buildings[0].y, 1700.0);
    assert_eq!(state.buildings[0].team, Team::Player);
    assert_eq!(state.buildings[1].count, 100);
    assert!(state.victory.is_none());
    assert!(!state.finished);
}

#[test]
fn capture_file_replays_every_tick() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("captures/duel.bin");

    let config = fast_config(6);
    let mut sim = Simulation::from_map(config.clone(), &duel_map());
    let header = CaptureHeader::new(config.seed, config.tick_rate, None);
    let summary = record_to_file(&mut sim, &header, &path, 5_000).unwrap();

    let reader = capture::open(&path).unwrap();
    assert_eq!(reader.header(), &header);
    let frames = reader.read_all().unwrap();
    assert_eq!(frames.len() as u64, summary.frames);

    let last = frames.last().unwrap();
    assert_eq!(last.snapshot.finished, summary.finished);
    assert_eq!(last.snapshot.victory, summary.victory);
    if summary.finished {
        let announced = frames
            .iter()
            .flat_map(|f| f.events.iter())
            .filter(|e| matches!(e, SimEvent::Victory { .. }))
            .count();
        assert_eq!(announced, 1);
    }
}

#[test]
fn batch_and_verify_agree_on_hashes() {
    let config = load_sim_config(None, None, None).unwrap();
    let results = run_batch(
        BatchConfig::new("duel", 2).with_seed(3).with_max_ticks(500),
        &config,
        &duel_map(),
    );
    let report = verify_determinism(&config.clone().with_seed(3), &duel_map(), 2, 500);

    assert!(report.is_deterministic());
    assert_eq!(results.games[0].final_hash, report.final_hashes[0]);
}

#[test]
fn shipped_config_spells_out_the_defaults() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../maps/default.ron");
    let config = load_sim_config(Some(&path), None, None).unwrap();
    assert_eq!(config, SimConfig::default());
}
