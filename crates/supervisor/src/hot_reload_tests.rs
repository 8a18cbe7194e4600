#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

struct FakeBuildRunner {
    succeed: bool,
    delay_ms: u64,
    run_count: AtomicUsize,
    cancel_count: AtomicUsize,
}

impl FakeBuildRunner {
    fn new(succeed: bool, delay_ms: u64) -> Self {
        Self {
            succeed,
            delay_ms,
            run_count: AtomicUsize::new(0),
            cancel_count: AtomicUsize::new(0),
        }
    }
}

#[async_trait::async_trait]
impl BuildRunner for FakeBuildRunner {
    async fn run(&self) -> bool {
        self.run_count.fetch_add(1, Ordering::SeqCst);
        if self.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        }
        self.succeed
    }

    async fn cancel(&self) {
        self.cancel_count.fetch_add(1, Ordering::SeqCst);
    }
}

fn counting_on_restart(counter: Arc<AtomicUsize>) -> OnRestart {
    Arc::new(move || {
        let counter = Arc::clone(&counter);
        Box::pin(async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    })
}

fn failing_on_restart() -> OnRestart {
    Arc::new(|| Box::pin(async { Err(RestartError(anyhow::anyhow!("restart callback failed"))) }))
}

#[tokio::test]
async fn a_single_change_triggers_exactly_one_build_and_restart() {
    let build = Arc::new(FakeBuildRunner::new(true, 0));
    let restart_count = Arc::new(AtomicUsize::new(0));
    let controller = HotReloadController::new(build.clone(), counting_on_restart(restart_count.clone()));

    let outcome = controller.handle_file_change().await.expect("a cycle should have run");
    assert!(outcome.restart_error.is_none());
    assert_eq!(build.run_count.load(Ordering::SeqCst), 1);
    assert_eq!(restart_count.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn a_failed_build_skips_restart_and_does_not_fail_the_call() {
    let build = Arc::new(FakeBuildRunner::new(false, 0));
    let restart_count = Arc::new(AtomicUsize::new(0));
    let controller = HotReloadController::new(build.clone(), counting_on_restart(restart_count.clone()));

    let outcome = controller.handle_file_change().await.expect("a cycle should have run");
    assert!(outcome.restart_error.is_none());
    assert_eq!(build.run_count.load(Ordering::SeqCst), 1);
    assert_eq!(restart_count.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn a_failing_restart_callback_is_reported_in_the_outcome() {
    let build = Arc::new(FakeBuildRunner::new(true, 0));
    let controller = HotReloadController::new(build.clone(), failing_on_restart());

    let outcome = controller.handle_file_change().await.expect("a cycle should have run");
    assert!(outcome.restart_error.is_some());
}

#[tokio::test]
async fn a_burst_of_changes_during_one_cycle_collapses_into_exactly_one_extra_cycle() {
    let build = Arc::new(FakeBuildRunner::new(true, 150));
    let restart_count = Arc::new(AtomicUsize::new(0));
    let controller = Arc::new(HotReloadController::new(
        build.clone(),
        counting_on_restart(restart_count.clone()),
    ));

    let driver = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.handle_file_change().await })
    };

    // Let the first cycle's build start, then fire a burst of coalesced
    // changes while it is still in flight.
    tokio::time::sleep(Duration::from_millis(30)).await;
    let mut followers = Vec::new();
    for _ in 0..5 {
        let controller = Arc::clone(&controller);
        followers.push(tokio::spawn(async move { controller.handle_file_change().await }));
    }

    driver.await.expect("driver task should not panic");
    for follower in followers {
        follower.await.expect("follower task should not panic");
    }

    // One cycle for the original change, one coalesced cycle for the burst.
    assert_eq!(build.run_count.load(Ordering::SeqCst), 2);
    assert_eq!(restart_count.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn a_change_after_the_cycle_is_fully_idle_starts_a_fresh_cycle() {
    let build = Arc::new(FakeBuildRunner::new(true, 0));
    let restart_count = Arc::new(AtomicUsize::new(0));
    let controller = HotReloadController::new(build.clone(), counting_on_restart(restart_count.clone()));

    controller.handle_file_change().await;
    controller.handle_file_change().await;

    assert_eq!(build.run_count.load(Ordering::SeqCst), 2);
    assert_eq!(restart_count.load(Ordering::SeqCst), 2);
}
