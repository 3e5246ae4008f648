//! Integration tests for the split/merge execution-path engine
//!
//! Tests cover:
//! - Forking on an unstable comparison and joining both outcomes
//! - Nested splits driven by the expression front-end
//! - Loops whose exit is decided differently by floats and reals
//! - Forks dropped inside a loop body
//! - Error propagation out of splits

use zonofloat::context::AnalysisContext;
use zonofloat::diagnostics::DiagnosticRecorder;
use zonofloat::domain::{CompareOp, Zonotope};
use zonofloat::error::EngineError;
use zonofloat::expr::{evaluate, parse_expression};
use zonofloat::numerics::{from_f64, to_f64, FloatFormat, RoundingConfig};
use zonofloat::path::{continuous_flow, split_merge, BranchOption, ForkRole, Memory};

fn double(x: f64) -> zonofloat::BuiltFloat {
    from_f64(x, FloatFormat::DOUBLE, &mut RoundingConfig::nearest())
}

fn var(memory: &Memory, name: &str) -> Zonotope {
    memory.get(name).cloned().unwrap()
}

// =============================================================================
// SPLIT / MERGE
// =============================================================================

#[test]
fn test_unstable_sign_test_forks_and_joins() {
    let recorder = DiagnosticRecorder::new();
    let mut ctx = AnalysisContext::default().with_observer(recorder.clone());
    let x = Zonotope::from_bounds(&mut ctx, double(0.05), &double(-0.1), &double(0.1));
    let mut memory = Memory::new();
    memory.insert("x", x);

    let merged = split_merge(&mut ctx, "sign", &memory, |ctx, mem| {
        let x = var(mem, "x");
        let zero = Zonotope::from_f64(ctx, 0.0, FloatFormat::DOUBLE);
        let outcome = x.compare(ctx, &zero, CompareOp::Gt);
        let sign = if ctx.branch("sign", &outcome)? { 1.0 } else { -1.0 };
        let y = Zonotope::from_f64(ctx, sign, FloatFormat::DOUBLE);
        mem.insert("y", y);
        Ok(())
    })
    .unwrap();

    assert_eq!(merged.forks_run, 2);
    assert_eq!(merged.forks_dropped, 0);
    assert_eq!(merged.role, ForkRole::Both);

    let y = var(&merged.memory, "y");
    assert_eq!(to_f64(y.implementation()), 1.0);
    assert_eq!(to_f64(y.real_min()), -1.0);
    assert_eq!(to_f64(y.real_max()), 1.0);
    assert!(merged.memory.contains("x"));

    let log = recorder.log();
    let options: Vec<_> = log.trace.iter().map(|e| e.option).collect();
    assert_eq!(
        options,
        vec![BranchOption::Consistent(true), BranchOption::RealSide(false)]
    );
    // Each fork re-evaluates the comparison
    assert_eq!(log.unstable_count, 2);
    assert_eq!(ctx.split_depth(), 0);
}

#[test]
fn test_nested_ifs_join_every_path() {
    let recorder = DiagnosticRecorder::new();
    let mut ctx = AnalysisContext::default().with_observer(recorder.clone());
    let mut inputs = Memory::new();
    inputs.insert(
        "x",
        Zonotope::from_bounds(&mut ctx, double(0.05), &double(-0.05), &double(0.15)),
    );
    let expr =
        parse_expression("if x > 0 then (if x > 0.1 then 1 else 2) else 3").unwrap();
    let z = evaluate(&mut ctx, &expr, &inputs, FloatFormat::DOUBLE).unwrap();

    assert_eq!(to_f64(z.implementation()), 2.0);
    assert_eq!(to_f64(z.real_min()), 1.0);
    assert_eq!(to_f64(z.real_max()), 3.0);

    let log = recorder.log();
    assert_eq!(log.trace.len(), 4);
    let roles: Vec<_> = log.trace.iter().map(|e| e.role).collect();
    assert_eq!(roles, vec![ForkRole::Both; 4]);
    assert!(log.diagnoses.iter().any(|d| d.contains("if@")));
}

#[test]
fn test_stable_if_runs_a_single_fork() {
    let recorder = DiagnosticRecorder::new();
    let mut ctx = AnalysisContext::default().with_observer(recorder.clone());
    let mut inputs = Memory::new();
    inputs.insert("x", Zonotope::input_f64(&mut ctx, 4.0, 1.0, FloatFormat::DOUBLE));
    let expr = parse_expression("if x >= 0 then sqrt(x) else -x").unwrap();
    let z = evaluate(&mut ctx, &expr, &inputs, FloatFormat::DOUBLE).unwrap();

    assert_eq!(to_f64(z.implementation()), 2.0);
    assert_eq!(recorder.log().trace.len(), 1);
    assert_eq!(recorder.log().unstable_count, 0);
    assert_eq!(recorder.log().domain_violations(), 0);
}

#[test]
fn test_fork_local_failure_drops_only_that_fork() {
    let mut ctx = AnalysisContext::default();
    let mut memory = Memory::new();
    memory.insert("x", Zonotope::input_f64(&mut ctx, 0.05, 0.2, FloatFormat::DOUBLE));
    let merged = split_merge(&mut ctx, "guard", &memory, |ctx, mem| {
        let x = var(mem, "x");
        let zero = Zonotope::from_f64(ctx, 0.0, FloatFormat::DOUBLE);
        let outcome = x.compare(ctx, &zero, CompareOp::Gt);
        if !ctx.branch("guard", &outcome)? {
            return Err(EngineError::AnticipatedTermination("x <= 0".into()));
        }
        Ok(())
    })
    .unwrap();
    assert_eq!(merged.forks_run, 2);
    assert_eq!(merged.forks_dropped, 1);
    assert_eq!(merged.role, ForkRole::Both);
    assert_eq!(merged.memory, memory);
}

#[test]
fn test_replay_divergence_aborts_the_split() {
    let mut ctx = AnalysisContext::default();
    let mut memory = Memory::new();
    memory.insert("x", Zonotope::input_f64(&mut ctx, 0.05, 0.2, FloatFormat::DOUBLE));
    let mut calls = 0;
    let err = split_merge(&mut ctx, "a", &memory, |ctx, mem| {
        calls += 1;
        let x = var(mem, "x");
        let zero = Zonotope::from_f64(ctx, 0.0, FloatFormat::DOUBLE);
        let outcome = x.compare(ctx, &zero, CompareOp::Gt);
        // The second fork reaches another site first
        let site = if calls == 1 { "a" } else { "b" };
        ctx.branch(site, &outcome)?;
        Ok(())
    })
    .unwrap_err();
    assert!(matches!(err, EngineError::ReplayDiverged { ref expected, ref found } if expected == "a" && found == "b"));
    assert!(!err.is_fork_local());
    assert_eq!(ctx.split_depth(), 0);
}

// =============================================================================
// LOOPS
// =============================================================================

#[test]
fn test_loop_with_unstable_exit_joins_every_exit() {
    let mut ctx = AnalysisContext::default();
    let mut memory = Memory::new();
    memory.insert("x", Zonotope::input_f64(&mut ctx, 1.0, 1.0, FloatFormat::DOUBLE));

    let outcome = continuous_flow(
        &mut ctx,
        "while@0",
        &memory,
        |ctx, mem| {
            let x = var(mem, "x");
            let limit = Zonotope::parse(ctx, "1.2", FloatFormat::DOUBLE)?;
            Ok(x.compare(ctx, &limit, CompareOp::Lt))
        },
        |ctx, mem| {
            let x = var(mem, "x");
            let step = Zonotope::from_f64(ctx, 0.5, FloatFormat::DOUBLE);
            mem.insert("x", x.add(ctx, &step));
            Ok(())
        },
    )
    .unwrap();

    // Floats leave after one step, reals may leave after zero, one or two
    assert_eq!(outcome.iterations, 3);
    assert_eq!(outcome.role, ForkRole::Both);
    let x = var(&outcome.memory, "x");
    assert_eq!(to_f64(x.implementation()), 1.5);
    assert_eq!(to_f64(x.real_min()), 0.5);
    assert_eq!(to_f64(x.real_max()), 2.5);
}

#[test]
fn test_loop_drops_a_fork_that_terminates_in_the_body() {
    let mut ctx = AnalysisContext::default();
    let mut memory = Memory::new();
    memory.insert("x", Zonotope::input_f64(&mut ctx, 1.0, 1.0, FloatFormat::DOUBLE));

    let outcome = continuous_flow(
        &mut ctx,
        "while@2",
        &memory,
        |ctx, mem| {
            let x = var(mem, "x");
            let limit = Zonotope::parse(ctx, "1.2", FloatFormat::DOUBLE)?;
            Ok(x.compare(ctx, &limit, CompareOp::Lt))
        },
        |_, _| Err(EngineError::AnticipatedTermination("assertion failed".into())),
    )
    .unwrap();

    // The float fork enters the body and dies, the real fork exits at once
    assert_eq!(outcome.iterations, 1);
    assert_eq!(outcome.forks_dropped, 1);
    let x = var(&outcome.memory, "x");
    assert_eq!(to_f64(x.implementation()), 1.0);
    assert_eq!(to_f64(x.real_min()), 0.5);
    assert_eq!(to_f64(x.real_max()), 1.5);
    assert_eq!(ctx.split_depth(), 0);
}

#[test]
fn test_loop_iteration_limit() {
    let mut ctx = AnalysisContext::new(zonofloat::EngineConfig {
        max_loop_iterations: 5,
        ..Default::default()
    });
    let mut memory = Memory::new();
    memory.insert("i", Zonotope::from_f64(&mut ctx, 0.0, FloatFormat::DOUBLE));
    let err = continuous_flow(
        &mut ctx,
        "while@1",
        &memory,
        |ctx, mem| {
            let i = var(mem, "i");
            let zero = Zonotope::from_f64(ctx, 0.0, FloatFormat::DOUBLE);
            Ok(i.compare(ctx, &zero, CompareOp::Ge))
        },
        |ctx, mem| {
            let i = var(mem, "i");
            let one = Zonotope::from_f64(ctx, 1.0, FloatFormat::DOUBLE);
            mem.insert("i", i.add(ctx, &one));
            Ok(())
        },
    )
    .unwrap_err();
    assert!(matches!(err, EngineError::LoopIterationLimit { limit: 5, .. }));
    assert_eq!(ctx.split_depth(), 0);
}
