//! Evaluation of expressions on zonotopes.
//!
//! Literals are rounded into the target format, variables are looked up in
//! the input memory and every `if` is a split/merge at site `if@<offset>`.

use tracing::trace;

use super::parser::{BinaryOp, Condition, Expr};
use crate::context::AnalysisContext;
use crate::domain::Zonotope;
use crate::error::{EngineError, EngineResult, ReadError};
use crate::numerics::FloatFormat;
use crate::path::{split_merge, Memory};

/// Memory slot holding the value of an `if` inside its split
const IF_RESULT: &str = "%if";

/// Evaluate `expr` for values of `format`, with inputs taken from `inputs`
pub fn evaluate(
    ctx: &mut AnalysisContext,
    expr: &Expr,
    inputs: &Memory,
    format: FloatFormat,
) -> EngineResult<Zonotope> {
    match expr {
        Expr::Number(text) => Ok(Zonotope::parse(ctx, text, format)?),
        Expr::Var(name) => inputs
            .get(name)
            .cloned()
            .ok_or_else(|| ReadError::new(name.as_str(), "unknown variable").into()),
        Expr::Neg(inner) => Ok(evaluate(ctx, inner, inputs, format)?.neg()),
        Expr::Binary { op, lhs, rhs } => {
            let a = evaluate(ctx, lhs, inputs, format)?;
            let b = evaluate(ctx, rhs, inputs, format)?;
            Ok(match op {
                BinaryOp::Add => a.add(ctx, &b),
                BinaryOp::Sub => a.sub(ctx, &b),
                BinaryOp::Mul => a.mul(ctx, &b),
                BinaryOp::Div => a.div(ctx, &b),
            })
        }
        Expr::Call { name, args } => call(ctx, name, args, inputs, format),
        Expr::If {
            offset,
            condition,
            then_branch,
            else_branch,
        } => {
            let site = format!("if@{}", offset);
            let merged = split_merge(ctx, &site, inputs, |ctx, memory| {
                let taken = decide(ctx, &site, condition, memory, format)?;
                let branch = if taken { then_branch } else { else_branch };
                let value = evaluate(ctx, branch, memory, format)?;
                memory.insert(IF_RESULT, value);
                Ok(())
            })?;
            trace!(site = %site, forks = merged.forks_run, "if merged");
            let mut memory = merged.memory;
            memory
                .remove(IF_RESULT)
                .ok_or(EngineError::EmptyBranch { site })
        }
    }
}

fn decide(
    ctx: &mut AnalysisContext,
    site: &str,
    condition: &Condition,
    memory: &Memory,
    format: FloatFormat,
) -> EngineResult<bool> {
    let lhs = evaluate(ctx, &condition.lhs, memory, format)?;
    let rhs = evaluate(ctx, &condition.rhs, memory, format)?;
    let outcome = lhs.compare(ctx, &rhs, condition.op);
    ctx.branch(site, &outcome)
}

fn call(
    ctx: &mut AnalysisContext,
    name: &str,
    args: &[Expr],
    inputs: &Memory,
    format: FloatFormat,
) -> EngineResult<Zonotope> {
    let arity = match name {
        "sqrt" | "exp" | "log" | "sin" | "cos" | "abs" => 1,
        "pow" | "powi" => 2,
        _ => return Err(ReadError::new(name, "unknown function").into()),
    };
    if args.len() != arity {
        return Err(ReadError::new(
            name,
            format!("expects {} argument(s), got {}", arity, args.len()),
        )
        .into());
    }
    if name == "powi" {
        let n = match &args[1] {
            Expr::Number(text) => text.parse::<i64>().ok(),
            Expr::Neg(inner) => match inner.as_ref() {
                Expr::Number(text) => text.parse::<i64>().ok().and_then(i64::checked_neg),
                _ => None,
            },
            _ => None,
        }
        .ok_or_else(|| ReadError::new(name, "exponent must be an integer literal"))?;
        let base = evaluate(ctx, &args[0], inputs, format)?;
        return Ok(base.powi(ctx, n));
    }

    let x = evaluate(ctx, &args[0], inputs, format)?;
    Ok(match name {
        "sqrt" => x.sqrt(ctx),
        "exp" => x.exp(ctx),
        "log" => x.log(ctx),
        "sin" => x.sin(ctx),
        "cos" => x.cos(ctx),
        "abs" => x.abs(ctx),
        _ => {
            let y = evaluate(ctx, &args[1], inputs, format)?;
            x.pow(ctx, &y)
        }
    })
}
