// zonofloat precision-analysis CLI
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use tracing::{info, Level};

use zonofloat::config::{EngineConfig, FloatKind};
use zonofloat::context::AnalysisContext;
use zonofloat::diagnostics::{DiagnosticRecorder, ObserverSet, TraceReplayer, TraceStore};
use zonofloat::domain::Zonotope;
use zonofloat::expr::{evaluate, parse_expression};
use zonofloat::numerics::{
    parse_literal, to_f64, FloatFormat, RoundingConfig, RoundingMode,
};
use zonofloat::path::Memory;

#[derive(Parser)]
#[command(name = "zonofloat")]
#[command(version)]
#[command(about = "Floating-point precision analysis with an affine error domain", long_about = None)]
struct Cli {
    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "warn")]
    log_level: Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate an expression and bound its error against the reals
    Eval {
        /// Expression, e.g. "if x > 0 then sqrt(x) else -x"
        #[arg(value_name = "EXPR")]
        expression: String,

        /// Target floating-point type (float, double, long_double)
        #[arg(short, long, default_value = "double")]
        kind: FloatKind,

        /// Input as name=nominal[:tolerance]; repeatable
        #[arg(short, long = "input", value_name = "NAME=VALUE")]
        inputs: Vec<String>,

        /// Engine configuration JSON file
        #[arg(short, long, value_name = "CONFIG")]
        config: Option<PathBuf>,

        /// Print the full dump of the result
        #[arg(long)]
        persist: bool,

        /// Write the branch trace to this JSON-lines file
        #[arg(long, value_name = "TRACE")]
        trace: Option<PathBuf>,

        /// Check decisions against a previously written trace
        #[arg(long, value_name = "TRACE")]
        replay: Option<PathBuf>,
    },

    /// Round a literal to a custom format
    Round {
        /// Decimal or hexadecimal literal
        #[arg(value_name = "LITERAL", allow_hyphen_values = true)]
        literal: String,

        /// Stored mantissa bits
        #[arg(short, long, default_value = "52")]
        mantissa_bits: u32,

        /// Exponent bits
        #[arg(short, long, default_value = "11")]
        exponent_bits: u32,

        /// Rounding mode (nearest, highest, lowest, zero)
        #[arg(long, default_value = "nearest")]
        mode: RoundingMode,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Eval {
            expression,
            kind,
            inputs,
            config,
            persist,
            trace,
            replay,
        } => eval_command(expression, kind, inputs, config, persist, trace, replay),
        Commands::Round {
            literal,
            mantissa_bits,
            exponent_bits,
            mode,
        } => round_command(literal, mantissa_bits, exponent_bits, mode),
    }
}

fn eval_command(
    expression: String,
    kind: FloatKind,
    inputs: Vec<String>,
    config: Option<PathBuf>,
    persist: bool,
    trace: Option<PathBuf>,
    replay: Option<PathBuf>,
) -> Result<()> {
    let config = match config {
        Some(path) => EngineConfig::from_json(&path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    config.validate().context("Invalid engine configuration")?;
    let format = config.format_of(kind);

    let expr = parse_expression(&expression).context("Failed to parse expression")?;

    let recorder = DiagnosticRecorder::new();
    let mut observers = ObserverSet::new();
    observers.push(recorder.clone());
    let replayer = match replay {
        Some(path) => {
            let loaded = TraceStore::load(&path)
                .with_context(|| format!("Failed to load trace {}", path.display()))?;
            info!(id = %loaded.header.id, entries = loaded.entries.len(), "replaying trace");
            let replayer = TraceReplayer::from_trace(loaded);
            observers.push(replayer.clone());
            Some(replayer)
        }
        None => None,
    };
    let mut ctx = AnalysisContext::new(config).with_observer(observers);

    let mut memory = Memory::new();
    for arg in &inputs {
        let (name, value) = parse_input(&mut ctx, arg, format)?;
        memory.insert(name, value);
    }

    let result = evaluate(&mut ctx, &expr, &memory, format)
        .with_context(|| format!("Failed to evaluate '{}'", expression))?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if persist {
        result.persist("result.", &mut out)?;
    } else {
        result.light_persist("result: ", &mut out)?;
    }
    let error_bound = result.error_bound(ctx.rounding_mut());
    writeln!(out, "error bound: {}", error_bound)?;

    let log = recorder.log();
    writeln!(
        out,
        "comparisons: {} ({} unstable), worst relative error: {:e}",
        log.compare_count, log.unstable_count, log.worst_relative_error
    )?;
    for diagnosis in &log.diagnoses {
        writeln!(out, "  - {}", diagnosis)?;
    }

    if let Some(path) = trace {
        let store = TraceStore::create(&path, Some(expression.clone()))
            .with_context(|| format!("Failed to create trace {}", path.display()))?;
        store.append_all(&log.trace)?;
        writeln!(out, "trace {} written to {}", store.header().id, path.display())?;
    }

    if let Some(replayer) = replayer {
        let mismatches = replayer.mismatches();
        if !mismatches.is_empty() {
            for m in &mismatches {
                writeln!(
                    out,
                    "  decision {}: expected {:?}, found {:?}",
                    m.sequence,
                    m.expected.as_ref().map(|e| (&e.site, e.option)),
                    m.found.as_ref().map(|e| (&e.site, e.option))
                )?;
            }
            bail!("{} decision(s) differ from the replayed trace", mismatches.len());
        }
    }

    Ok(())
}

/// Parse `name=nominal[:tolerance]`
fn parse_input(ctx: &mut AnalysisContext, arg: &str, format: FloatFormat) -> Result<(String, Zonotope)> {
    let Some((name, value)) = arg.split_once('=') else {
        bail!("Input '{}' must have the form name=nominal[:tolerance]", arg);
    };
    let (nominal, tolerance) = match value.split_once(':') {
        Some((n, t)) => (n, t),
        None => (value, "0"),
    };
    let real = ctx.real_format();
    let nominal = parse_literal(nominal, real, &mut RoundingConfig::nearest())
        .with_context(|| format!("Invalid nominal value for '{}'", name))?;
    let tolerance = parse_literal(tolerance, real, &mut RoundingConfig::upward())
        .with_context(|| format!("Invalid tolerance for '{}'", name))?;
    Ok((
        name.trim().to_string(),
        Zonotope::input(ctx, &nominal, &tolerance, format),
    ))
}

fn round_command(literal: String, mantissa_bits: u32, exponent_bits: u32, mode: RoundingMode) -> Result<()> {
    let format = FloatFormat::try_new(mantissa_bits, exponent_bits).context("Invalid format")?;
    let mut config = RoundingConfig::with_mode(mode);
    let value = parse_literal(&literal, format, &mut config).context("Invalid literal")?;

    println!("format:  {}", format);
    println!("hex:     {}", value.to_hex_string());
    println!("decimal: {}", to_f64(&value));
    if format.total_bits() <= 128 {
        println!(
            "bits:    {:0width$b}",
            value.to_bits(),
            width = format.total_bits() as usize
        );
    }
    println!("flags:   {:?}", config.flags());
    Ok(())
}
