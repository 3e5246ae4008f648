//! Integration tests for branch traces
//!
//! A run records its decisions, the trace is written as JSON lines and a
//! second run is checked against it.

use std::fs;

use tempfile::TempDir;

use zonofloat::context::AnalysisContext;
use zonofloat::diagnostics::{DiagnosticRecorder, ObserverSet, TraceReplayer, TraceStore};
use zonofloat::domain::Zonotope;
use zonofloat::error::EngineError;
use zonofloat::expr::{evaluate, parse_expression};
use zonofloat::numerics::FloatFormat;
use zonofloat::path::{BranchOption, Memory};

const PROGRAM: &str = "if x > 0 then sqrt(x) else 0 - x";

fn run(nominal: f64, tolerance: f64, replayer: Option<&TraceReplayer>) -> DiagnosticRecorder {
    let recorder = DiagnosticRecorder::new();
    let mut observers = ObserverSet::new();
    observers.push(recorder.clone());
    if let Some(replayer) = replayer {
        observers.push(replayer.clone());
    }
    let mut ctx = AnalysisContext::default().with_observer(observers);
    let mut inputs = Memory::new();
    inputs.insert(
        "x",
        Zonotope::input_f64(&mut ctx, nominal, tolerance, FloatFormat::DOUBLE),
    );
    let expr = parse_expression(PROGRAM).unwrap();
    evaluate(&mut ctx, &expr, &inputs, FloatFormat::DOUBLE).unwrap();
    recorder
}

#[test]
fn test_trace_round_trip_and_replay() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("run.jsonl");

    let recorder = run(0.05, 0.2, None);
    let entries = recorder.log().trace.clone();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e.site == "if@0"));
    assert!(entries.iter().all(|e| e.unstable));

    let store = TraceStore::create(&path, Some(PROGRAM.to_string())).unwrap();
    store.append_all(&entries).unwrap();

    let loaded = TraceStore::load(&path).unwrap();
    assert_eq!(loaded.header.id, store.header().id);
    assert_eq!(loaded.header.label.as_deref(), Some(PROGRAM));
    assert_eq!(loaded.entries, entries);

    let replayer = TraceReplayer::from_trace(loaded);
    run(0.05, 0.2, Some(&replayer));
    assert_eq!(replayer.checked(), 2);
    assert!(replayer.is_consistent());
}

#[test]
fn test_replay_detects_a_path_not_taken() {
    let recorder = run(0.05, 0.2, None);
    let replayer = TraceReplayer::new(recorder.log().trace.clone());

    // A stable input opens only the float path
    run(4.0, 1.0, Some(&replayer));
    let mismatches = replayer.mismatches();
    assert_eq!(mismatches.len(), 1);
    let missing = &mismatches[0];
    assert_eq!(missing.sequence, 1);
    assert!(missing.found.is_none());
    assert_eq!(
        missing.expected.as_ref().map(|e| e.option),
        Some(BranchOption::RealSide(false))
    );
}

#[test]
fn test_malformed_trace_reports_the_line() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.jsonl");
    let store = TraceStore::create(&path, None).unwrap();
    drop(store);
    let mut contents = fs::read_to_string(&path).unwrap();
    contents.push_str("{not json}\n");
    fs::write(&path, contents).unwrap();

    let err = TraceStore::load(&path).unwrap_err();
    match err {
        EngineError::Read(e) => assert!(e.input.ends_with(":2"), "location was {}", e.input),
        other => panic!("expected a read error, got {:?}", other),
    }
}

#[test]
fn test_trace_without_header_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("headless.jsonl");
    fs::write(&path, "").unwrap();
    assert!(matches!(TraceStore::load(&path), Err(EngineError::Read(_))));
}
