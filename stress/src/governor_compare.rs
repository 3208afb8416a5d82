use std::{
    num::NonZeroU32,
    sync::Arc,
    time::{Duration, Instant},
};

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};

use evenpace::CallsPerMinute;

use crate::Args;

pub(crate) fn run(args: &Args) {
    let floor = CallsPerMinute::try_from(args.rpm).unwrap().min_interval();

    // A burst of 1 makes GCRA space every cell by the full emission interval,
    // the closest governor gets to evenpace's spacing contract. Governor has
    // no blocking sync API, so a poll loop stands in for the in-lock sleep.
    let rpm = (args.rpm.round().max(1.0) as u64).min(u32::MAX as u64) as u32;
    let quota = Quota::per_minute(NonZeroU32::new(rpm.max(1)).unwrap())
        .allow_burst(NonZeroU32::new(1).unwrap());
    let limiter: Arc<DefaultDirectRateLimiter> = Arc::new(RateLimiter::direct(quota));

    let poll = (floor / 20).max(Duration::from_micros(50));

    let started = Instant::now();
    let deadline = started + Duration::from_secs(args.duration_s);

    let mut handles = Vec::with_capacity(args.threads);
    for _ in 0..args.threads {
        let limiter = Arc::clone(&limiter);
        let op_us = args.op_us;

        handles.push(std::thread::spawn(move || {
            let mut releases = Vec::new();

            'work: while Instant::now() < deadline {
                while limiter.check().is_err() {
                    if Instant::now() >= deadline {
                        break 'work;
                    }
                    std::thread::sleep(poll);
                }

                releases.push(started.elapsed().as_micros() as u64);

                if op_us > 0 {
                    std::thread::sleep(Duration::from_micros(op_us));
                }
            }

            releases
        }));
    }

    let mut releases: Vec<u64> = Vec::new();
    for handle in handles {
        releases.extend(handle.join().expect("worker panicked"));
    }

    crate::print_results(args, started.elapsed(), &releases, floor);
}
