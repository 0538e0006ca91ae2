//! batchred-bench-harness
//!
//! Run small end-to-end benchmarks (dispatch -> slice -> prove -> persist ->
//! race consumers to the final aggregate) and append CSV rows into
//! `benchmarks/reports/bench-<unix>.csv`.
//!
//! Usage examples:
//!   cargo run -p batchred-bench-harness -- --profile benchmarks/profiles/small.toml
//!   cargo run --release -p batchred-bench-harness -- --profile benchmarks/profiles/medium.toml

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use anyhow::{ensure, Context, Result};
use rand::{rngs::StdRng, Rng as _, SeedableRng};
use serde::Deserialize;

use batchred_core::io::{write_batches_auto, write_proofs_auto};
use batchred_core::{Ledger, MemoryLedger, SumReducer, Value};
use batchred_prover::SumTranscriptBackend;
use batchred_reducer::{
    dispatch, prepare_batches, BatchProver, ReducerOptions, ReductionCoordinator,
};

#[derive(Debug, Deserialize)]
struct Profile {
    /// Actions dispatched per repeat
    n: u64,
    /// Entries per batch
    batch_size: u32,
    /// Concurrent producer threads
    producers: u32,
    /// Concurrent consumer threads racing to reduce
    consumers: u32,
    /// Repetitions of the whole pipeline
    repeats: u32,
    /// RNG seed for dispatched values
    #[serde(default)]
    seed: u64,
}

fn parse_flag(name: &str, default: &str) -> String {
    let mut it = std::env::args().skip(1);
    while let Some(k) = it.next() {
        if k == format!("--{name}") {
            return it.next().unwrap_or_else(|| default.to_string());
        }
    }
    default.to_string()
}

fn dur_ms(d: Duration) -> u128 {
    d.as_millis()
}

fn values_for(profile: &Profile, producer: u32, rep: u32) -> Vec<Value> {
    let share = profile.n / u64::from(profile.producers.max(1));
    let seed = profile.seed ^ (u64::from(rep) << 32) ^ u64::from(producer);
    let mut rng = StdRng::seed_from_u64(seed);
    (0..share).map(|_| rng.random_range(1..=1_000_000)).collect()
}

fn main() -> Result<()> {
    let profile_path = PathBuf::from(parse_flag("profile", "benchmarks/profiles/small.toml"));
    let profile_src = fs::read_to_string(&profile_path)
        .with_context(|| format!("read profile {}", profile_path.display()))?;
    let profile: Profile = toml::from_str(&profile_src).context("parse profile toml")?;
    ensure!(profile.batch_size > 0, "batch_size must be positive");
    println!(
        "Profile: n={}, batch_size={}, producers={}, consumers={}, repeats={}",
        profile.n, profile.batch_size, profile.producers, profile.consumers, profile.repeats
    );

    fs::create_dir_all("benchmarks/reports").ok();

    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    let csv_path = PathBuf::from(format!("benchmarks/reports/bench-{ts}.csv"));
    let mut csv = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&csv_path)?;
    writeln!(
        csv,
        "timestamp,n,batch_size,producers,consumers,repeat,stage,ms,extra"
    )?;
    let row_prefix = format!(
        "{ts},{},{},{},{}",
        profile.n, profile.batch_size, profile.producers, profile.consumers
    );

    let reducer = SumReducer::new();
    let opts = ReducerOptions {
        batch_size: profile.batch_size,
        ..ReducerOptions::default()
    };

    for rep in 0..profile.repeats {
        let ledger = Arc::new(MemoryLedger::new());
        let inputs: Vec<Vec<Value>> = (0..profile.producers.max(1))
            .map(|p| values_for(&profile, p, rep))
            .collect();
        let expected: i128 = inputs.iter().flatten().map(|v| i128::from(*v)).sum();

        // 1) concurrent dispatch
        let t0 = Instant::now();
        thread::scope(|s| -> Result<()> {
            let handles: Vec<_> = inputs
                .iter()
                .map(|vals| {
                    let ledger = Arc::clone(&ledger);
                    s.spawn(move || -> Result<()> {
                        for v in vals {
                            dispatch(ledger.as_ref(), &reducer, *v)?;
                        }
                        Ok(())
                    })
                })
                .collect();
            for h in handles {
                h.join()
                    .map_err(|_| anyhow::anyhow!("producer thread panicked"))??;
            }
            Ok(())
        })?;
        writeln!(
            csv,
            "{row_prefix},{rep},dispatch,{},len={}",
            dur_ms(t0.elapsed()),
            ledger.len()
        )?;

        // 2) slice
        let t0 = Instant::now();
        let batches = prepare_batches(ledger.as_ref(), profile.batch_size)?;
        writeln!(
            csv,
            "{row_prefix},{rep},slice,{},n_batches={}",
            dur_ms(t0.elapsed()),
            batches.len()
        )?;

        // 3) prove (rayon)
        let prover = BatchProver::<SumTranscriptBackend, _>::new(reducer);
        let t0 = Instant::now();
        let proofs = prover
            .prove_all(&batches, true)
            .into_iter()
            .collect::<Result<Vec<_>, _>>()?;
        writeln!(
            csv,
            "{row_prefix},{rep},prove,{},proof_bytes={}",
            dur_ms(t0.elapsed()),
            proofs.iter().map(|p| p.len()).sum::<usize>()
        )?;

        // 4) persist batches + proofs (CBOR)
        let batches_path = PathBuf::from(format!("benchmarks/tmp-batches-{ts}-{rep}.cbor"));
        let proofs_path = PathBuf::from(format!("benchmarks/tmp-proofs-{ts}-{rep}.cbor"));
        let t0 = Instant::now();
        write_batches_auto(&batches_path, &batches)?;
        write_proofs_auto(&proofs_path, &proofs)?;
        let bytes = fs::metadata(&batches_path)?.len() + fs::metadata(&proofs_path)?.len();
        writeln!(
            csv,
            "{row_prefix},{rep},persist,{},file_bytes={bytes}",
            dur_ms(t0.elapsed())
        )?;
        let _ = fs::remove_file(&batches_path);
        let _ = fs::remove_file(&proofs_path);

        // 5) consumers race to reduce the whole log
        let coords: Vec<_> = (0..profile.consumers.max(1))
            .map(|_| {
                ReductionCoordinator::<_, _, SumTranscriptBackend>::new(
                    Arc::clone(&ledger),
                    reducer,
                    opts,
                )
            })
            .collect();
        let t0 = Instant::now();
        let reports = thread::scope(|s| {
            let handles: Vec<_> = coords.iter().map(|c| s.spawn(move || c.run())).collect();
            handles
                .into_iter()
                .map(|h| {
                    h.join()
                        .map_err(|_| anyhow::anyhow!("consumer thread panicked"))?
                        .map_err(anyhow::Error::from)
                })
                .collect::<Result<Vec<_>>>()
        })?;
        let f = ledger.frontier();
        ensure!(
            f.aggregate == expected,
            "aggregate {} != expected {expected}",
            f.aggregate
        );
        writeln!(
            csv,
            "{row_prefix},{rep},reduce,{},committed={};stale={};conflicts={};digest={}",
            dur_ms(t0.elapsed()),
            reports.iter().map(|r| r.committed_batches).sum::<u64>(),
            reports.iter().map(|r| r.stale_rejections).sum::<u64>(),
            reports.iter().map(|r| r.conflicts).sum::<u64>(),
            hex::encode(&f.committed_digest.as_bytes()[..8])
        )?;
    }

    println!("Wrote report → {}", csv_path.display());
    Ok(())
}
