//! Edge case tests for fos-net
//!
//! Admission under contention, descriptor handling, scheduler config.

use std::sync::{Arc, Barrier, Mutex};
use std::thread;

use fos_net::*;

fn limited(max: usize, per_server: usize) -> RequestScheduler {
    RequestScheduler::with_config(
        SchedulerConfig::default()
            .maximum_requests(max)
            .maximum_requests_per_server(per_server),
    )
}

// ============================================================================
// DESCRIPTOR TESTS
// ============================================================================

#[test]
fn test_descriptor_defaults() {
    let req = RequestDescriptor::new();
    assert!(!req.throttle);
    assert!(!req.throttle_by_server);
    assert!(req.url.is_none());
    assert_eq!(req.kind, RequestKind::Other);
}

#[test]
fn test_descriptor_builder() {
    let req = RequestDescriptor::for_url("https://tiles.example.com/0/0/0.png")
        .throttle(true)
        .throttle_by_server(true)
        .kind(RequestKind::Imagery);

    assert!(req.throttle);
    assert!(req.throttle_by_server);
    assert_eq!(req.kind, RequestKind::Imagery);
    assert_eq!(req.server_key().as_deref(), Some("tiles.example.com:443"));
}

// ============================================================================
// ADMISSION TESTS
// ============================================================================

#[test]
fn test_global_limit_reached() {
    let scheduler = limited(2, 10);
    let req = RequestDescriptor::for_url("http://a.com/").throttle(true);

    let a = scheduler.try_admit(&req);
    let b = scheduler.try_admit(&req);
    let c = scheduler.try_admit(&req);

    assert!(a.is_admitted());
    assert!(b.is_admitted());
    assert!(!c.is_admitted());

    let stats = scheduler.statistics();
    assert_eq!(stats.active_requests, 2);
    assert_eq!(stats.admitted_requests, 2);
    assert_eq!(stats.throttled_requests, 1);
}

#[test]
fn test_per_server_ignored_without_flag() {
    let scheduler = limited(10, 1);
    let req = RequestDescriptor::for_url("http://a.com/").throttle(true);

    let _a = scheduler.try_admit(&req);
    assert!(scheduler.try_admit(&req).is_admitted());
    assert_eq!(scheduler.active_for_server("a.com:80"), 0);
}

#[test]
fn test_set_config_at_runtime() {
    let scheduler = RequestScheduler::new();
    let req = RequestDescriptor::for_url("http://example.invalid/testuri").throttle(true);
    assert!(scheduler.try_admit(&req).is_admitted());

    scheduler.set_config(scheduler.config().maximum_requests(0));
    assert!(!scheduler.try_admit(&req).is_admitted());
}

#[test]
fn test_throttled_is_not_counted_active() {
    let scheduler = limited(0, 0);
    let req = RequestDescriptor::for_url("http://a.com/").throttle(true);
    for _ in 0..5 {
        assert!(matches!(scheduler.try_admit(&req), Admission::Throttled));
    }
    assert_eq!(scheduler.statistics().active_requests, 0);
    assert_eq!(scheduler.statistics().throttled_requests, 5);
}

#[test]
fn test_stats_serialize() {
    let scheduler = RequestScheduler::new();
    let json = serde_json::to_string(&scheduler.statistics()).unwrap();
    assert!(json.contains("\"active_requests\":0"));
}

// ============================================================================
// CONCURRENCY TESTS
// ============================================================================

#[test]
fn test_concurrent_admission_never_over_admits() {
    const THREADS: usize = 16;
    const MAX: usize = 5;

    let scheduler = Arc::new(limited(MAX, MAX));
    let barrier = Arc::new(Barrier::new(THREADS));
    let permits = Arc::new(Mutex::new(Vec::new()));

    let handles: Vec<_> = (0..THREADS)
        .map(|i| {
            let scheduler = Arc::clone(&scheduler);
            let barrier = Arc::clone(&barrier);
            let permits = Arc::clone(&permits);
            thread::spawn(move || {
                let req = RequestDescriptor::for_url(&format!("https://a.com/{i}"))
                    .throttle(true)
                    .throttle_by_server(true);
                barrier.wait();
                if let Some(permit) = scheduler.try_admit(&req).into_permit() {
                    permits.lock().unwrap().push(permit);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(permits.lock().unwrap().len(), MAX);
    assert_eq!(scheduler.statistics().active_requests, MAX);
    assert_eq!(scheduler.statistics().throttled_requests, (THREADS - MAX) as u64);

    permits.lock().unwrap().clear();
    assert_eq!(scheduler.statistics().active_requests, 0);
    assert_eq!(scheduler.active_for_server("a.com:443"), 0);
}

#[test]
fn test_global_scheduler_is_shared() {
    let a = RequestScheduler::global();
    let b = RequestScheduler::global();
    assert!(Arc::ptr_eq(&a, &b));
}
