//! End-to-end use of the public API the way request handlers use it.

use std::sync::Arc;
use std::time::Duration;

use checkin_guard::config::GuardConfig;
use checkin_guard::ratelimit::{client_identifier, ManualClock, ANONYMOUS_IDENTIFIER};
use checkin_guard::{Limiters, Policy, RateLimitConfig, RateLimiter};
use tokio_test::{assert_err, assert_ok};

#[test]
fn test_checkin_requests_from_same_client_are_throttled() {
    let clock = Arc::new(ManualClock::new(1_700_000_000_000));
    let limiters = Limiters::with_clock(&GuardConfig::default().limits, clock.clone()).unwrap();

    let client = client_identifier(Some("203.0.113.9, 10.0.0.1"), None);
    let other = client_identifier(None, Some("198.51.100.2"));

    for _ in 0..10 {
        assert_ok!(limiters.guard(Policy::Checkin, &client));
        clock.advance(1_000);
    }
    let throttled = assert_err!(limiters.guard(Policy::Checkin, &client));
    assert_eq!(throttled.result.retry_after_ms, 60_000);

    // A different client and the anonymous bucket are unaffected
    assert_ok!(limiters.guard(Policy::Checkin, &other));
    assert_ok!(limiters.guard(Policy::Checkin, ANONYMOUS_IDENTIFIER));

    // Staff clears the block explicitly
    limiters.checkin().reset(&client);
    let result = assert_ok!(limiters.guard(Policy::Checkin, &client));
    assert_eq!(result.remaining, 9);
}

#[test]
fn test_peek_reports_without_consuming() {
    let clock = Arc::new(ManualClock::new(0));
    let limiter = RateLimiter::with_clock(RateLimitConfig::new(2, 1_000), clock.clone()).unwrap();

    assert_eq!(limiter.peek("status").remaining, 2);
    limiter.check("status");
    assert_eq!(limiter.peek("status").remaining, 1);
    assert_eq!(limiter.peek("status").remaining, 1);
    assert_eq!(limiter.check("status").remaining, 0);

    let denied = limiter.check("status");
    assert!(!denied.allowed);
    assert_eq!(denied.retry_after_secs(), 1);
}

#[test]
fn test_load_config_from_file_and_environment() {
    let path = std::env::temp_dir().join(format!("checkin-guard-{}.yaml", std::process::id()));
    std::fs::write(
        &path,
        "limits:\n  database:\n    max_requests: 12\n    window_ms: 30000\nlogging:\n  json: true\n",
    )
    .unwrap();

    std::env::set_var("CHECKIN_GUARD__CLEANUP__INTERVAL_SECS", "45");
    let loaded = GuardConfig::load(Some(&path));
    std::env::remove_var("CHECKIN_GUARD__CLEANUP__INTERVAL_SECS");
    std::fs::remove_file(&path).unwrap();

    let config = loaded.unwrap();
    assert_eq!(config.limits.database, RateLimitConfig::new(12, 30_000));
    assert_eq!(config.limits.checkin, RateLimitConfig::new(10, 60_000));
    assert_eq!(config.cleanup.interval(), Duration::from_secs(45));
    assert!(config.logging.json);
}

#[tokio::test(start_paused = true)]
async fn test_background_cleanup_reclaims_idle_clients() {
    let clock = Arc::new(ManualClock::new(0));
    let limiters = Limiters::with_clock(&GuardConfig::default().limits, clock.clone()).unwrap();

    for i in 0..20 {
        let client = format!("10.0.0.{}", i);
        assert_ok!(limiters.guard(Policy::Database, &client));
    }
    assert_eq!(limiters.database().len(), 20);

    limiters.start_cleanup(Duration::from_secs(60)).unwrap();
    clock.advance(60_000);
    tokio::time::sleep(Duration::from_secs(61)).await;

    assert!(limiters.database().is_empty());
    limiters.destroy();
}
