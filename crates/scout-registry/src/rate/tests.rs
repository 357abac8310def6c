//! Unit tests for the rate budget

use super::*;
use crate::clock::ManualClock;
use proptest::prelude::*;

fn manual_budget(max: u32, window_secs: u64) -> (Arc<ManualClock>, RateBudget) {
    let clock = Arc::new(ManualClock::new());
    let budget = RateBudget::with_clock(max, Duration::from_secs(window_secs), clock.clone()).unwrap();
    (clock, budget)
}

/// Largest number of instants that fall inside any trailing window
fn max_in_any_window(mut instants: Vec<Instant>, window: Duration) -> usize {
    instants.sort();
    let mut worst = 0;
    for (i, start) in instants.iter().enumerate() {
        let count = instants[i..]
            .iter()
            .take_while(|at| at.duration_since(*start) < window)
            .count();
        worst = worst.max(count);
    }
    worst
}

#[test]
fn test_rejects_zero_requests() {
    let err = RateBudget::new(0, Duration::from_secs(60)).unwrap_err();
    assert!(matches!(err, ScoutError::ConfigValidation { ref field, .. } if field == "rate_limit_requests"));
}

#[test]
fn test_rejects_zero_window() {
    let err = RateBudget::new(10, Duration::ZERO).unwrap_err();
    assert!(matches!(err, ScoutError::ConfigValidation { ref field, .. } if field == "rate_limit_window_seconds"));
}

#[test]
fn test_try_admit_until_full() {
    let (clock, budget) = manual_budget(2, 60);

    assert!(budget.try_admit().is_ok());
    clock.advance(Duration::from_secs(10));
    assert!(budget.try_admit().is_ok());

    // Oldest slot was taken 10s ago, so it frees in 50s
    assert_eq!(budget.try_admit().unwrap_err(), Duration::from_secs(50));
}

#[test]
fn test_slots_free_after_window() {
    let (clock, budget) = manual_budget(1, 60);

    budget.try_admit().unwrap();
    clock.advance(Duration::from_secs(59));
    assert!(budget.try_admit().is_err());

    clock.advance(Duration::from_secs(1));
    assert!(budget.try_admit().is_ok());
}

#[test]
fn test_snapshot() {
    let (clock, budget) = manual_budget(3, 60);

    let empty = budget.snapshot();
    assert_eq!(empty.remaining, 3);
    assert_eq!(empty.next_release, None);

    budget.try_admit().unwrap();
    clock.advance(Duration::from_secs(15));
    budget.try_admit().unwrap();

    let snapshot = budget.snapshot();
    assert_eq!(snapshot.limit, 3);
    assert_eq!(snapshot.used, 2);
    assert_eq!(snapshot.remaining, 1);
    assert_eq!(snapshot.next_release, Some(Duration::from_secs(45)));
}

#[tokio::test]
async fn test_admit_waits_for_oldest_slot() {
    let (clock, budget) = manual_budget(2, 60);

    let first = budget.admit().await;
    let second = budget.admit().await;
    assert_eq!(first.waited, Duration::ZERO);
    assert_eq!(second.waited, Duration::ZERO);

    clock.advance(Duration::from_secs(5));
    let third = budget.admit().await;

    assert_eq!(third.waited, Duration::from_secs(55));
    assert_eq!(third.at.duration_since(first.at), Duration::from_secs(60));
    assert_eq!(clock.sleeps(), vec![Duration::from_secs(55)]);
}

#[tokio::test(start_paused = true)]
async fn test_admit_with_tokio_clock() {
    let budget = RateBudget::new(2, Duration::from_secs(60)).unwrap();
    let start = Instant::now();

    budget.admit().await;
    budget.admit().await;
    let third = budget.admit().await;

    assert!(third.at.duration_since(start) >= Duration::from_secs(60));
    assert!(third.waited >= Duration::from_secs(60));
}

#[tokio::test]
async fn test_concurrent_admissions_respect_budget() {
    let (_clock, budget) = manual_budget(3, 60);
    let budget = Arc::new(budget);

    let mut handles = Vec::new();
    for _ in 0..12 {
        let budget = budget.clone();
        handles.push(tokio::spawn(async move { budget.admit().await }));
    }

    let mut instants = Vec::new();
    for handle in handles {
        instants.push(handle.await.unwrap().at);
    }

    assert_eq!(instants.len(), 12);
    assert!(max_in_any_window(instants, Duration::from_secs(60)) <= 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_admissions_multi_thread() {
    let (_clock, budget) = manual_budget(5, 30);
    let budget = Arc::new(budget);

    let handles: Vec<_> = (0..40)
        .map(|_| {
            let budget = budget.clone();
            tokio::spawn(async move { budget.admit().await.at })
        })
        .collect();

    let mut instants = Vec::new();
    for handle in handles {
        instants.push(handle.await.unwrap());
    }

    assert!(max_in_any_window(instants, Duration::from_secs(30)) <= 5);
}

#[tokio::test]
async fn test_cancelled_waiter_leaves_window_consistent() {
    let budget = Arc::new(RateBudget::new(1, Duration::from_secs(3600)).unwrap());
    budget.admit().await;

    let waiter = {
        let budget = budget.clone();
        tokio::spawn(async move { budget.admit().await })
    };
    tokio::task::yield_now().await;
    waiter.abort();
    assert!(waiter.await.unwrap_err().is_cancelled());

    let snapshot = budget.snapshot();
    assert_eq!(snapshot.used, 1);
    assert!(budget.try_admit().is_err());
}

proptest! {
    #[test]
    fn prop_window_never_exceeds_budget(
        max in 1u32..6,
        window_secs in 1u64..120,
        steps in proptest::collection::vec(0u64..90, 1..80),
    ) {
        let (clock, budget) = manual_budget(max, window_secs);
        let mut admitted = Vec::new();

        for step in steps {
            clock.advance(Duration::from_secs(step));
            match budget.try_admit() {
                Ok(at) => admitted.push(at),
                Err(wait) => {
                    prop_assert!(wait > Duration::ZERO);
                    prop_assert!(wait <= Duration::from_secs(window_secs));
                }
            }
        }

        prop_assert!(max_in_any_window(admitted, Duration::from_secs(window_secs)) <= max as usize);
    }
}
