// crates/batchred-cli/src/main.rs

#![forbid(unsafe_code)]
#![deny(
    rust_2018_idioms,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo
)]

mod profile;

use anyhow::{bail, ensure, Context, Result};
use batchred_core::{
    io::{read_batches_auto, read_proofs_auto, write_auto, write_batches_auto, write_proofs_auto},
    Batch, BatchProof, FrontierState, Ledger, MemoryLedger, ProvingBackend, Reducer, SumReducer,
    Value,
};
use batchred_prover::SumTranscriptBackend;
use batchred_reducer::{
    dispatch, prepare_batches, BatchProver, FrontierTracker, ReduceReport, ReducerOptions,
    ReductionCoordinator,
};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::profile::Overrides;

type Backend = SumTranscriptBackend;

#[derive(Parser, Debug)]
#[command(
    name = "batchred",
    about = "batchred reference CLI",
    long_about = "batchred reference CLI.\n\nDispatch values into an in-memory log, slice it into padded batches, prove and verify batches, and reduce the log into its running sum exactly once.",
    version = env!("CARGO_PKG_VERSION"),
    disable_help_subcommand = true
)]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Args, Debug, Clone)]
struct ReducerArgs {
    /// TOML profile with a `[reducer]` table
    #[arg(long)]
    config: Option<PathBuf>,

    /// Entries per batch (>0)
    #[arg(long)]
    batch_size: Option<u32>,

    /// Consecutive unproductive rounds before giving up
    #[arg(long)]
    max_retries: Option<u32>,

    /// Prove batches one after another instead of on the thread pool
    #[arg(long, default_value_t = false)]
    sequential: bool,
}

impl ReducerArgs {
    fn resolve(&self) -> Result<ReducerOptions> {
        profile::resolve(
            self.config.as_deref(),
            Overrides {
                batch_size: self.batch_size,
                max_retries: self.max_retries,
                sequential: self.sequential,
            },
        )
    }
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Dispatch values, reduce, then reduce again; repeat the whole cycle `--repeat` times.
    Run {
        /// Values to dispatch (comma separated)
        #[arg(long, value_delimiter = ',', allow_negative_numbers = true, default_value = "1,2,3,4,5")]
        values: Vec<Value>,

        /// How many times to dispatch the values and reduce
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        repeat: u32,

        /// Write the per-cycle reports as JSON
        #[arg(long)]
        report: Option<PathBuf>,

        #[command(flatten)]
        reducer: ReducerArgs,
    },

    /// Dispatch values into a fresh log and write the sliced batches (CBOR/JSON)
    Slice {
        /// Values to dispatch (comma separated)
        #[arg(long, value_delimiter = ',', allow_negative_numbers = true, required = true)]
        values: Vec<Value>,

        /// Output path for batches (CBOR/JSON)
        #[arg(long, default_value = "batches.cbor")]
        out: PathBuf,

        #[command(flatten)]
        reducer: ReducerArgs,
    },

    /// Prove every batch in a batches file
    Prove {
        /// Input path to batches (CBOR/JSON)
        #[arg(long)]
        batches: PathBuf,

        /// Output path for proofs (CBOR/JSON)
        #[arg(long, default_value = "proofs.cbor")]
        out: PathBuf,

        /// Prove one batch after another instead of on the thread pool
        #[arg(long, default_value_t = false)]
        sequential: bool,
    },

    /// Verify proofs against their batches and apply them to a rebuilt log
    Verify {
        /// Input path to batches (CBOR/JSON)
        #[arg(long)]
        batches: PathBuf,

        /// Input path to proofs (CBOR/JSON)
        #[arg(long)]
        proofs: PathBuf,
    },
}

fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.cmd {
        Cmd::Run {
            values,
            repeat,
            report,
            reducer,
        } => run(&values, repeat, report, &reducer),

        Cmd::Slice {
            values,
            out,
            reducer,
        } => slice(&values, out, &reducer),

        Cmd::Prove {
            batches,
            out,
            sequential,
        } => prove(batches, out, sequential),

        Cmd::Verify { batches, proofs } => verify(batches, proofs),
    }
}

/// Initialize tracing with an env-driven filter (default INFO).
fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = fmt::layer().with_target(false).with_level(true).compact();

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}

fn run(values: &[Value], repeat: u32, report: Option<PathBuf>, args: &ReducerArgs) -> Result<()> {
    let opts = args.resolve()?;
    info!(?opts, n = values.len(), repeat, "reducing");

    let coord = ReductionCoordinator::<_, _, Backend>::new(
        Arc::new(MemoryLedger::new()),
        SumReducer::new(),
        opts,
    );
    println!("Fresh aggregate: {}", coord.aggregate());

    let mut reports: Vec<ReduceReport> = Vec::new();
    for cycle in 1..=repeat {
        for v in values {
            coord
                .dispatch(*v)
                .with_context(|| format!("dispatching {v}"))?;
        }
        let first = coord.run().context("reduction failed")?;
        let second = coord.run().context("re-reduction failed")?;
        ensure!(
            second.committed_batches == 0 && second.frontier == first.frontier,
            "re-running the reducer changed the frontier"
        );
        println!(
            "Cycle {cycle}: {} batches committed in {} rounds → aggregate {} (re-run: {})",
            first.committed_batches, first.rounds, first.frontier.aggregate, second.frontier.aggregate
        );
        reports.push(first);
    }

    if let Some(path) = report {
        write_auto(&path, &reports)
            .with_context(|| format!("writing report to {}", path.display()))?;
        println!("Wrote {} reports → {}", reports.len(), path.display());
    }
    Ok(())
}

fn slice(values: &[Value], out: PathBuf, args: &ReducerArgs) -> Result<()> {
    let opts = args.resolve()?;
    let ledger = MemoryLedger::new();
    let reducer = SumReducer::new();
    for v in values {
        dispatch(&ledger, &reducer, *v).with_context(|| format!("dispatching {v}"))?;
    }
    let batches = prepare_batches(&ledger, opts.batch_size).context("slicing")?;

    write_batches_auto(&out, &batches)
        .with_context(|| format!("writing batches to {}", out.display()))?;
    println!(
        "Sliced {} actions into {} batches of {} → {}",
        ledger.len(),
        batches.len(),
        opts.batch_size,
        out.display()
    );
    Ok(())
}

fn prove(batches: PathBuf, out: PathBuf, sequential: bool) -> Result<()> {
    info!(batches=%batches.display(), out=%out.display(), sequential, "proving");
    let batches_v = read_batches_auto(&batches)?;

    let prover = BatchProver::<Backend, _>::new(SumReducer::new());
    let proofs = prover
        .prove_all(&batches_v, !sequential)
        .into_iter()
        .enumerate()
        .map(|(i, r)| r.with_context(|| format!("proving batch #{i}")))
        .collect::<Result<Vec<BatchProof>>>()?;

    write_proofs_auto(&out, &proofs)
        .with_context(|| format!("writing proofs to {}", out.display()))?;
    let bytes: usize = proofs.iter().map(BatchProof::len).sum();
    println!(
        "Proved {} batches, wrote {} ({bytes} proof bytes)",
        proofs.len(),
        out.display()
    );
    Ok(())
}

fn verify(batches: PathBuf, proofs: PathBuf) -> Result<()> {
    info!(batches=%batches.display(), proofs=%proofs.display(), "verifying");
    let batches_v = read_batches_auto(&batches)?;
    let proofs_v = read_proofs_auto(&proofs)?;
    ensure!(
        batches_v.len() == proofs_v.len(),
        "{} batches but {} proofs",
        batches_v.len(),
        proofs_v.len()
    );

    let reducer = SumReducer::new();
    for (i, (b, p)) in batches_v.iter().zip(&proofs_v).enumerate() {
        ensure!(b.is_well_formed(), "batch #{i} is not well formed");
        let public = b.public_inputs(reducer.delta(&b.entries));
        ensure!(Backend::verify(p, &public), "proof #{i} does not verify");
    }
    println!("OK: {} proofs verified", proofs_v.len());

    if batches_v.first().map(|b| b.start_position) == Some(0) {
        let f = apply_from_genesis(&batches_v, &proofs_v)?;
        println!(
            "Applied to a rebuilt log: position {} → aggregate {}",
            f.committed_position, f.aggregate
        );
    }
    Ok(())
}

/// Rebuild the log the batches were sliced from and advance through them.
fn apply_from_genesis(
    batches: &[Batch],
    proofs: &[BatchProof],
) -> Result<FrontierState> {
    let ledger = Arc::new(MemoryLedger::new());
    for a in batches.iter().flat_map(Batch::real_actions) {
        let pos = ledger.append(a.value)?;
        if pos != a.position {
            bail!("batches skip position {pos}");
        }
    }
    let tracker: FrontierTracker<_, _, Backend> =
        FrontierTracker::new(Arc::clone(&ledger), SumReducer::new());
    for (i, (b, p)) in batches.iter().zip(proofs).enumerate() {
        tracker.record_proved(b);
        tracker
            .advance(b, p)
            .with_context(|| format!("applying batch #{i}"))?;
    }
    Ok(ledger.frontier())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn run_defaults_to_reference_values() {
        let cli = Cli::try_parse_from(["batchred", "run"]).unwrap();
        match cli.cmd {
            Cmd::Run { values, repeat, .. } => {
                assert_eq!(values, vec![1, 2, 3, 4, 5]);
                assert_eq!(repeat, 1);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn slice_accepts_negative_values_for_validation_to_reject() {
        let cli = Cli::try_parse_from([
            "batchred", "slice", "--values", "3,-1", "--batch-size", "4",
        ])
        .unwrap();
        match cli.cmd {
            Cmd::Slice { values, reducer, .. } => {
                assert_eq!(values, vec![3, -1]);
                assert_eq!(reducer.batch_size, Some(4));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn zero_repeat_is_rejected() {
        assert!(Cli::try_parse_from(["batchred", "run", "--repeat", "0"]).is_err());
    }

    #[test]
    fn slice_prove_verify_across_files() {
        let dir = std::env::temp_dir().join(format!(
            "batchred_cli_{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        let batches = dir.join("batches.cbor");
        let proofs = dir.join("proofs.json");
        let args = ReducerArgs {
            config: None,
            batch_size: Some(2),
            max_retries: None,
            sequential: false,
        };

        slice(&[1, 2, 3, 4, 5], batches.clone(), &args).unwrap();
        prove(batches.clone(), proofs.clone(), true).unwrap();
        verify(batches.clone(), proofs.clone()).unwrap();

        let f = apply_from_genesis(
            &read_batches_auto(&batches).unwrap(),
            &read_proofs_auto(&proofs).unwrap(),
        )
        .unwrap();
        assert_eq!(f.aggregate, 15);
        let _ = std::fs::remove_dir_all(dir);
    }
}
