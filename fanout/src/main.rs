//! Concurrent dispatch harness for a throttled remote operation.
//!
//! Builds a prompt per input record, fans the records out across a fixed
//! worker pool, pushes every call through one shared [`Throttle`] to a
//! simulated network-bound completion operation, and persists the aggregated
//! `id -> outcome` mapping as pretty-printed JSON.
//!
//! The throttle guarantees the pool as a whole never exceeds `--rpm` calls
//! per minute, however the records are distributed across workers. Failures
//! injected with `--fail-every` surface out of the throttled call verbatim
//! and are recorded per id; the pool keeps going.

use std::{
    collections::BTreeMap,
    fs::File,
    io::BufWriter,
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    thread,
    time::Duration,
};

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use evenpace::{CallsPerMinute, Throttle};

#[derive(Parser, Debug)]
#[command(
    name = "evenpace-fanout",
    about = "Worker-pool dispatch demo driving a throttled simulated remote call"
)]
struct Args {
    /// Calls per minute granted to the remote operation, across all workers.
    #[arg(long, default_value_t = 15.0)]
    rpm: f64,

    #[arg(long, default_value_t = 10)]
    workers: usize,

    #[arg(long, default_value_t = 30)]
    records: usize,

    /// Simulated remote latency per call, in milliseconds.
    #[arg(long, default_value_t = 0)]
    op_ms: u64,

    /// Fail every Nth call (0 disables failure injection).
    #[arg(long, default_value_t = 0)]
    fail_every: u64,

    #[arg(long, default_value = "fanout_results.json")]
    out: PathBuf,
}

struct Record {
    id: String,
    question: String,
}

#[derive(Serialize)]
struct Outcome {
    main_question: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    generated_questions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

const TOPICS: &[&str] = &[
    "request batching",
    "connection pooling",
    "backpressure",
    "retry budgets",
    "queue depth",
    "cache invalidation",
    "clock skew",
    "load shedding",
    "circuit breaking",
    "tail latency",
];

fn sample_records(count: usize) -> Vec<Record> {
    (1..=count)
        .map(|i| Record {
            id: format!("Q{i}"),
            question: format!(
                "How does {} affect a throttled client?",
                TOPICS[(i - 1) % TOPICS.len()]
            ),
        })
        .collect()
}

fn build_prompt(record: &Record) -> String {
    format!("Please generate related questions for: {}", record.question)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let rate = CallsPerMinute::try_from(args.rpm)
        .context("--rpm must be a finite value greater than 0")?;
    let throttle = Arc::new(Throttle::new(rate));

    info!(
        rpm = args.rpm,
        workers = args.workers,
        records = args.records,
        "starting dispatch"
    );

    // The operation is wrapped once at setup time; every worker clone paces
    // against the same schedule.
    let calls = Arc::new(AtomicU64::new(0));
    let op_ms = args.op_ms;
    let fail_every = args.fail_every;
    let complete = throttle.wrap(move |prompt: String| -> anyhow::Result<String> {
        let n = calls.fetch_add(1, Ordering::Relaxed) + 1;

        if op_ms > 0 {
            thread::sleep(Duration::from_millis(op_ms));
        }
        if fail_every > 0 && n.is_multiple_of(fail_every) {
            anyhow::bail!("simulated upstream rejection for call #{n}");
        }

        Ok(format!(
            "1. {prompt}\n2. What prior work does it build on?\n3. Where does it break down under load?"
        ))
    });

    let records = sample_records(args.records);
    let total = records.len() as u64;
    let done = AtomicU64::new(0);
    let stop = AtomicBool::new(false);

    let mut results: BTreeMap<String, Outcome> = BTreeMap::new();

    thread::scope(|s| {
        let reporter = s.spawn(|| {
            while !stop.load(Ordering::Relaxed) {
                thread::sleep(Duration::from_millis(500));
                let done_now = done.load(Ordering::Relaxed);
                if done_now < total {
                    info!(done = done_now, total, "dispatch progress");
                }
            }
        });

        let chunk = records.len().div_ceil(args.workers.max(1)).max(1);
        let mut handles = Vec::new();

        for batch in records.chunks(chunk) {
            let complete = complete.clone();
            let done = &done;

            handles.push(s.spawn(move || {
                let mut collected = Vec::with_capacity(batch.len());

                for record in batch {
                    let outcome = match complete.call(build_prompt(record)) {
                        Ok(text) => Outcome {
                            main_question: record.question.clone(),
                            generated_questions: Some(text),
                            error: None,
                        },
                        Err(err) => {
                            warn!(id = %record.id, error = %err, "record failed");
                            Outcome {
                                main_question: record.question.clone(),
                                generated_questions: None,
                                error: Some(err.to_string()),
                            }
                        }
                    };

                    done.fetch_add(1, Ordering::Relaxed);
                    collected.push((record.id.clone(), outcome));
                }

                collected
            }));
        }

        for handle in handles {
            for (id, outcome) in handle.join().expect("worker panicked") {
                results.insert(id, outcome);
            }
        }

        stop.store(true, Ordering::Relaxed);
        reporter.join().expect("reporter panicked");
    });

    let failed = results.values().filter(|o| o.error.is_some()).count();

    let file = File::create(&args.out)
        .with_context(|| format!("creating {}", args.out.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), &results)
        .context("serializing results")?;

    info!(
        path = %args.out.display(),
        records = results.len(),
        failed,
        "wrote aggregated results"
    );

    Ok(())
}
