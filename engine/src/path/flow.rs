//! Split/merge and bounded loops.
//!
//! A split runs its body once per fork. Every fork starts from the state
//! saved at the split (memory, symbol counter, rounding state) and replays
//! the decisions of its prefix; decisions taken for the first time queue
//! the remaining options as new forks. Fork results are then joined by
//! [`MergeMemory`].

use tracing::{debug, warn};

use super::explorer::{ForkRole, PathExplorer};
use super::memory::{Memory, MergeMemory};
use crate::context::{AnalysisContext, ExplorerScope};
use crate::domain::CompareOutcome;
use crate::error::{EngineError, EngineResult};

/// Result of [`split_merge`]
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub memory: Memory,
    /// Semantics still carried by the merged state
    pub role: ForkRole,
    pub forks_run: usize,
    pub forks_dropped: usize,
}

/// Result of [`continuous_flow`]
#[derive(Debug, Clone)]
pub struct LoopOutcome {
    pub memory: Memory,
    pub role: ForkRole,
    pub iterations: usize,
    pub forks_dropped: usize,
}

struct Forks<T> {
    completed: Vec<(ForkRole, Memory, T)>,
    run: usize,
    dropped: usize,
}

/// Run `body` once per fork of a split starting in `role`. Fork-local
/// errors drop the fork; any other error aborts the split.
fn explore<T>(
    ctx: &mut AnalysisContext,
    site: &str,
    role: ForkRole,
    memory: &Memory,
    mut body: impl FnMut(&mut AnalysisContext, &mut Memory) -> EngineResult<T>,
) -> EngineResult<Forks<T>> {
    let checkpoint = ctx.checkpoint();
    let mut forks = Forks {
        completed: Vec::new(),
        run: 0,
        dropped: 0,
    };
    let mut last_symbol = checkpoint.symbol_index();
    {
        let mut scope = ExplorerScope::new(ctx, PathExplorer::new(role));
        let mut prefix = Some(Vec::new());
        while let Some(p) = prefix {
            scope.restore(&checkpoint);
            scope.explorer_mut().begin_fork(p);
            let mut fork_memory = memory.clone();
            forks.run += 1;
            match body(&mut *scope, &mut fork_memory) {
                Ok(value) => {
                    let fork_role = scope.explorer().role();
                    forks.completed.push((fork_role, fork_memory, value));
                }
                Err(e) if e.is_fork_local() => {
                    warn!(site, fork = forks.run, error = %e, "fork terminated, dropped from the join");
                    forks.dropped += 1;
                }
                Err(e) => return Err(e),
            }
            last_symbol = last_symbol.max(scope.symbols().next_index());
            prefix = scope.explorer_mut().next_pending();
        }
    }
    ctx.restore(&checkpoint);
    ctx.advance_symbols(last_symbol);
    debug!(site, forks = forks.run, dropped = forks.dropped, "split explored");
    Ok(forks)
}

/// Run `body` on every execution path it opens and join the resulting
/// memories.
///
/// ```
/// use zonofloat::context::AnalysisContext;
/// use zonofloat::domain::{CompareOp, Zonotope};
/// use zonofloat::numerics::FloatFormat;
/// use zonofloat::path::{split_merge, Memory};
///
/// let mut ctx = AnalysisContext::default();
/// let mut memory = Memory::new();
/// memory.insert("x", Zonotope::input_f64(&mut ctx, 0.05, 0.2, FloatFormat::DOUBLE));
/// let merged = split_merge(&mut ctx, "if@0", &memory, |ctx, mem| {
///     let x = mem.get("x").cloned().unwrap();
///     let zero = Zonotope::from_f64(ctx, 0.0, FloatFormat::DOUBLE);
///     let outcome = x.compare(ctx, &zero, CompareOp::Gt);
///     let y = if ctx.branch("if@0", &outcome)? { x } else { x.neg() };
///     mem.insert("y", y);
///     Ok(())
/// })
/// .unwrap();
/// assert_eq!(merged.forks_run, 2);
/// ```
pub fn split_merge(
    ctx: &mut AnalysisContext,
    site: &str,
    memory: &Memory,
    mut body: impl FnMut(&mut AnalysisContext, &mut Memory) -> EngineResult<()>,
) -> EngineResult<MergeOutcome> {
    let role = ctx.current_role();
    let forks = explore(ctx, site, role, memory, &mut body)?;
    let mut merge = MergeMemory::new(site);
    for (fork_role, fork_memory, ()) in forks.completed {
        merge.push(fork_role, fork_memory);
    }
    for _ in 0..forks.dropped {
        merge.drop_fork();
    }
    let (memory, role) = merge.finish(ctx)?;
    Ok(MergeOutcome {
        memory,
        role,
        forks_run: forks.run,
        forks_dropped: forks.dropped,
    })
}

/// Bounded loop `while condition { body }`. Every iteration is a split:
/// forks leaving the loop accumulate into the exit state, forks staying in
/// it are joined into the next iteration's state. The loop ends when no
/// fork stays.
pub fn continuous_flow(
    ctx: &mut AnalysisContext,
    site: &str,
    memory: &Memory,
    mut condition: impl FnMut(&mut AnalysisContext, &Memory) -> EngineResult<CompareOutcome>,
    mut body: impl FnMut(&mut AnalysisContext, &mut Memory) -> EngineResult<()>,
) -> EngineResult<LoopOutcome> {
    let limit = ctx.config().max_loop_iterations;
    let mut state = memory.clone();
    let mut role = ctx.current_role();
    let mut exits = MergeMemory::new(site);
    let mut forks_dropped = 0;

    for iteration in 1..=limit {
        let forks = explore(ctx, site, role, &state, |ctx, mem| {
            let outcome = condition(ctx, mem)?;
            if ctx.branch(site, &outcome)? {
                body(ctx, mem)?;
                Ok(true)
            } else {
                Ok(false)
            }
        })?;
        forks_dropped += forks.dropped;

        let mut continuing = MergeMemory::new(site);
        for (fork_role, fork_memory, stays) in forks.completed {
            if stays {
                continuing.push(fork_role, fork_memory);
            } else {
                exits.push(fork_role, fork_memory);
            }
        }
        debug!(
            site,
            iteration,
            continuing = continuing.len(),
            exited = exits.len(),
            "loop iteration"
        );

        if continuing.is_empty() {
            for _ in 0..forks_dropped {
                exits.drop_fork();
            }
            let (memory, role) = exits.finish(ctx)?;
            return Ok(LoopOutcome {
                memory,
                role,
                iterations: iteration,
                forks_dropped,
            });
        }

        let (next, next_role) = continuing.finish(ctx)?;
        if next == state && next_role == role {
            warn!(site, iteration, "loop state no longer changes");
            return Err(EngineError::LoopNotConverging {
                site: site.to_string(),
                iterations: iteration,
            });
        }
        state = next;
        role = next_role;
    }

    warn!(site, limit, "loop iteration limit reached");
    Err(EngineError::LoopIterationLimit {
        site: site.to_string(),
        limit,
    })
}
