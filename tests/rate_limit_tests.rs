use rand::Rng;

use shrike::limiters::{build_limiter, RateLimiter, TokenBucketLimiter};
use shrike::settings::{LimiterAlgorithm, LimiterSettings};

fn random_key() -> String {
    format!("client-{}", rand::thread_rng().gen::<u32>())
}

fn small_settings() -> LimiterSettings {
    LimiterSettings {
        max_requests: 3,
        window_seconds: 60,
        capacity: 3,
        refill_rate: 0.1,
    }
}

#[test]
fn every_algorithm_enforces_its_budget() {
    for algorithm in [
        LimiterAlgorithm::FixedWindow,
        LimiterAlgorithm::SlidingWindow,
        LimiterAlgorithm::TokenBucket,
    ] {
        let limiter = build_limiter(algorithm, small_settings());
        let key = random_key();

        // Budget is 3 for every algorithm with these settings
        for n in 0..3 {
            assert!(
                limiter.allow_request(&key).unwrap(),
                "{} denied request {} within budget",
                algorithm,
                n
            );
        }
        assert!(
            !limiter.allow_request(&key).unwrap(),
            "{} admitted over budget",
            algorithm
        );
        assert_eq!(limiter.remaining_requests(&key).unwrap(), 0);
        assert!(limiter.retry_after_seconds(&key).unwrap() > 0.0);
    }
}

#[test]
fn keys_do_not_share_quota() {
    for algorithm in [
        LimiterAlgorithm::FixedWindow,
        LimiterAlgorithm::SlidingWindow,
        LimiterAlgorithm::TokenBucket,
    ] {
        let limiter = build_limiter(algorithm, small_settings());
        let exhausted = random_key();
        let fresh = random_key();

        for _ in 0..3 {
            assert!(limiter.allow_request(&exhausted).unwrap());
        }
        assert!(!limiter.allow_request(&exhausted).unwrap());

        assert_eq!(limiter.remaining_requests(&fresh).unwrap(), 3);
        assert!(limiter.allow_request(&fresh).unwrap());
    }
}

#[tokio::test]
async fn token_bucket_honors_refill_through_the_trait() {
    let limiter = build_limiter(
        LimiterAlgorithm::TokenBucket,
        LimiterSettings {
            capacity: 5,
            refill_rate: 10.0,
            ..Default::default()
        },
    );
    let key = random_key();

    for _ in 0..5 {
        assert!(limiter.allow_request(&key).unwrap());
    }
    assert!(!limiter.allow_request(&key).unwrap());

    // 0.2s at 10 tokens/s refills at least 2 tokens
    tokio::time::sleep(tokio::time::Duration::from_millis(200)).await;
    assert!(limiter.allow_request(&key).unwrap());
}

#[tokio::test]
async fn expired_clients_are_swept_from_every_algorithm() {
    // A burst of distinct clients, each seen once, must not pin memory
    // forever once their window has passed
    let limiter = build_limiter(
        LimiterAlgorithm::SlidingWindow,
        LimiterSettings {
            max_requests: 3,
            window_seconds: 1,
            ..Default::default()
        },
    );
    for n in 0..500 {
        assert!(limiter.allow_request(&format!("client-{}", n)).unwrap());
    }

    tokio::time::sleep(tokio::time::Duration::from_millis(1200)).await;
    assert_eq!(limiter.expire_keys().unwrap(), 500);

    // Swept clients start fresh on their next request
    assert!(limiter.allow_request("client-0").unwrap());
    assert_eq!(limiter.remaining_requests("client-0").unwrap(), 2);
}

#[test]
fn weighted_admission_is_token_bucket_specific() {
    let limiter = TokenBucketLimiter::new(LimiterSettings {
        capacity: 10,
        refill_rate: 1.0,
        ..Default::default()
    });
    let key = random_key();

    // A heavy request spends five tokens at once
    assert!(limiter.allow_request_weighted(&key, 5.0).unwrap());
    assert_eq!(limiter.available_tokens(&key).unwrap(), 5);

    // Too expensive: denied, nothing spent
    assert!(!limiter.allow_request_weighted(&key, 6.0).unwrap());
    assert_eq!(limiter.available_tokens(&key).unwrap(), 5);
}
