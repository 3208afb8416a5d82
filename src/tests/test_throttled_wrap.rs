use std::{
    sync::{Arc, Mutex},
    thread,
    time::{Duration, Instant},
};

use crate::{CallsPerMinute, Throttle};

const SLACK: Duration = Duration::from_millis(10);

fn shared(rpm: f64) -> Arc<Throttle> {
    Arc::new(Throttle::new(CallsPerMinute::try_from(rpm).unwrap()))
}

#[test]
fn wrapped_operation_passes_arguments_and_result_through() {
    let throttle = shared(10.0);
    let add = throttle.wrap(|(a, b): (i32, i32)| a + b);

    assert_eq!(add.call((3, 4)), 7);
    assert_eq!(add.throttle().min_interval(), Duration::from_secs(6));
}

#[test]
fn wrapped_failures_surface_unchanged() {
    let throttle = shared(6000.0);
    let risky = throttle.wrap(|fail: bool| {
        if fail {
            Err("remote unavailable")
        } else {
            Ok(42)
        }
    });

    assert_eq!(risky.call(true), Err("remote unavailable"));
    // The handle stays usable after a failure.
    assert_eq!(risky.call(false), Ok(42));
}

#[test]
fn clones_share_one_release_schedule() {
    let throttle = shared(1200.0); // 50ms floor
    let floor = throttle.min_interval();

    let record = throttle.wrap(|_: ()| Instant::now());
    let releases = Arc::new(Mutex::new(Vec::new()));

    let handles: Vec<_> = (0..3)
        .map(|_| {
            let record = record.clone();
            let releases = Arc::clone(&releases);

            thread::spawn(move || {
                for _ in 0..2 {
                    let at = record.call(());
                    releases.lock().unwrap().push(at);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("caller thread panicked");
    }

    let mut releases = releases.lock().unwrap().clone();
    assert_eq!(releases.len(), 6);
    releases.sort();

    // Cloned handles pace against the same throttle, so the floor holds
    // across all of them.
    for pair in releases.windows(2) {
        let gap = pair[1] - pair[0];
        assert!(
            gap + SLACK >= floor,
            "release gap {gap:?} fell below the {floor:?} floor"
        );
    }
}
