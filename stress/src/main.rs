use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use clap::{Parser, ValueEnum};
use hdrhistogram::Histogram;

use evenpace::{CallsPerMinute, Throttle};

mod governor_compare;

#[derive(Clone, Copy, Debug, PartialEq, ValueEnum)]
enum Limiter {
    /// Use the evenpace throttle.
    Evenpace,
    /// Use governor (GCRA, burst = 1) behind a blocking poll.
    Governor,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "evenpace-stress",
    about = "Load / pacing-measurement harness for evenpace"
)]
struct Args {
    #[arg(long, value_enum, default_value_t = Limiter::Evenpace)]
    limiter: Limiter,

    #[arg(long, default_value_t = 8)]
    threads: usize,

    #[arg(long, default_value_t = 10)]
    duration_s: u64,

    /// Calls per minute enforced across all threads.
    #[arg(long, default_value_t = 6000.0)]
    rpm: f64,

    /// Simulated work inside each delegated call, in microseconds.
    #[arg(long, default_value_t = 0)]
    op_us: u64,
}

fn main() {
    let args = Args::parse();

    match args.limiter {
        Limiter::Evenpace => run_evenpace(&args),
        Limiter::Governor => governor_compare::run(&args),
    }
}

fn run_evenpace(args: &Args) {
    let rate = CallsPerMinute::try_from(args.rpm).unwrap();
    let floor = rate.min_interval();
    let throttle = Arc::new(Throttle::new(rate));

    let started = Instant::now();
    let deadline = started + Duration::from_secs(args.duration_s);

    let mut handles = Vec::with_capacity(args.threads);
    for _ in 0..args.threads {
        let throttle = Arc::clone(&throttle);
        let op_us = args.op_us;

        handles.push(std::thread::spawn(move || {
            let mut releases = Vec::new();

            while Instant::now() < deadline {
                let at = throttle.guarded_call(|| {
                    let at = started.elapsed().as_micros() as u64;
                    if op_us > 0 {
                        std::thread::sleep(Duration::from_micros(op_us));
                    }
                    at
                });

                releases.push(at);
            }

            releases
        }));
    }

    let mut releases: Vec<u64> = Vec::new();
    for handle in handles {
        releases.extend(handle.join().expect("worker panicked"));
    }

    print_results(args, started.elapsed(), &releases, floor);
}

/// Merge the per-thread release timestamps, histogram the consecutive gaps,
/// and print the distribution against the configured floor.
fn print_results(args: &Args, elapsed: Duration, releases: &[u64], floor: Duration) {
    let mut releases = releases.to_vec();
    releases.sort_unstable();

    let mut hist = Histogram::<u64>::new_with_bounds(1, 3_600_000_000, 3).unwrap();
    for pair in releases.windows(2) {
        let _ = hist.record((pair[1] - pair[0]).max(1));
    }

    println!(
        "limiter={:?} threads={} duration_s={} rpm={} op_us={}",
        args.limiter, args.threads, args.duration_s, args.rpm, args.op_us
    );
    println!(
        "elapsed_s={:.3} releases={} releases_per_s={:.1}",
        elapsed.as_secs_f64(),
        releases.len(),
        releases.len() as f64 / elapsed.as_secs_f64()
    );
    println!("configured_floor_us={}", floor.as_micros());

    if hist.is_empty() {
        println!("no release gaps recorded");
        return;
    }

    println!(
        "gap_us min={} p50={} p95={} p99={} max={}",
        hist.min(),
        hist.value_at_quantile(0.50),
        hist.value_at_quantile(0.95),
        hist.value_at_quantile(0.99),
        hist.max()
    );
}
