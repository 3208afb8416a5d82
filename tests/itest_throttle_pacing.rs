use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
    thread,
    time::{Duration, Instant},
};

use evenpace::{CallsPerMinute, Throttle};

const SLACK: Duration = Duration::from_millis(10);

fn shared(rpm: f64) -> Arc<Throttle> {
    Arc::new(Throttle::new(CallsPerMinute::try_from(rpm).unwrap()))
}

/// Runs `workers` threads, each issuing one throttled call that yields a
/// `(key, value)` pair, and returns the sorted release instants plus the
/// collected mapping.
fn fan_out(
    throttle: &Arc<Throttle>,
    workers: usize,
) -> (Vec<Instant>, BTreeMap<String, String>) {
    let releases = Arc::new(Mutex::new(Vec::new()));
    let results = Arc::new(Mutex::new(BTreeMap::new()));

    let handles: Vec<_> = (0..workers)
        .map(|i| {
            let throttle = Arc::clone(throttle);
            let releases = Arc::clone(&releases);
            let results = Arc::clone(&results);

            thread::spawn(move || {
                let (at, value) = throttle.guarded_call(|| {
                    (Instant::now(), format!("result for worker {i}"))
                });

                releases.lock().unwrap().push(at);
                results.lock().unwrap().insert(format!("W{i}"), value);
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("worker panicked");
    }

    let mut releases = releases.lock().unwrap().clone();
    releases.sort();
    let results = results.lock().unwrap().clone();

    (releases, results)
}

#[test]
fn worker_pool_respects_the_wall_clock_floor_and_collects_every_result() {
    // 40ms floor; ten workers, one call each.
    let throttle = shared(1500.0);
    let floor = throttle.min_interval();

    let (releases, results) = fan_out(&throttle, 10);

    assert_eq!(results.len(), 10);
    for i in 0..10 {
        assert_eq!(
            results.get(&format!("W{i}")).map(String::as_str),
            Some(format!("result for worker {i}").as_str())
        );
    }

    // Regardless of how the threads interleave, first-to-last release spans
    // at least nine full intervals.
    let span = *releases.last().unwrap() - releases[0];
    assert!(
        span + SLACK >= floor * 9,
        "span {span:?} fell below nine {floor:?} intervals"
    );

    for pair in releases.windows(2) {
        let gap = pair[1] - pair[0];
        assert!(
            gap + SLACK >= floor,
            "release gap {gap:?} fell below the {floor:?} floor"
        );
    }
}

#[test]
fn a_failing_record_does_not_poison_the_pool() {
    // 10ms floor so the whole batch stays quick.
    let throttle = shared(6000.0);
    let outcomes = Arc::new(Mutex::new(Vec::new()));

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let throttle = Arc::clone(&throttle);
            let outcomes = Arc::clone(&outcomes);

            thread::spawn(move || {
                let outcome: Result<usize, String> = throttle.guarded_call(|| {
                    if i == 2 {
                        Err(format!("record {i} rejected upstream"))
                    } else {
                        Ok(i * 100)
                    }
                });

                outcomes.lock().unwrap().push((i, outcome));
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("worker panicked");
    }

    let outcomes = outcomes.lock().unwrap().clone();
    assert_eq!(outcomes.len(), 4);

    for (i, outcome) in outcomes {
        if i == 2 {
            assert_eq!(outcome, Err("record 2 rejected upstream".to_string()));
        } else {
            assert_eq!(outcome, Ok(i * 100));
        }
    }

    // The instance is still usable after the failure.
    assert_eq!(throttle.guarded_call(|| 7), 7);
}

#[test]
#[ignore = "full-scale pacing scenario, runs for ~36s"]
fn ten_workers_at_rate_fifteen_span_at_least_thirty_six_seconds() {
    // 4s floor, exactly as a 15-calls-per-minute budget demands.
    let throttle = shared(15.0);
    let floor = throttle.min_interval();
    assert_eq!(floor, Duration::from_secs(4));

    let started = Instant::now();
    let (releases, results) = fan_out(&throttle, 10);

    assert_eq!(results.len(), 10);

    let span = *releases.last().unwrap() - releases[0];
    assert!(
        span + SLACK >= Duration::from_secs(36),
        "span {span:?} fell below the 36s wall-clock floor"
    );
    assert!(started.elapsed() >= Duration::from_secs(36) - SLACK);
}
