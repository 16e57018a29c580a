use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use leadwatch_engine::{PollControl, PollMode, PollScheduler};

fn counting_poll(
    count: &Arc<AtomicUsize>,
    stop_after: usize,
) -> impl FnMut() -> std::future::Ready<PollControl> + Send + 'static {
    let count = Arc::clone(count);
    move || {
        let seen = count.fetch_add(1, Ordering::SeqCst) + 1;
        let control = if seen >= stop_after {
            PollControl::Stop
        } else {
            PollControl::Continue
        };
        std::future::ready(control)
    }
}

async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn polls_immediately_then_every_period() {
    let count = Arc::new(AtomicUsize::new(0));
    let scheduler = PollScheduler::new(Duration::from_secs(2));
    let handle = scheduler.spawn(PollMode::Repeating, counting_poll(&count, usize::MAX));

    settle().await;
    assert_eq!(count.load(Ordering::SeqCst), 1);

    tokio::time::sleep(Duration::from_millis(2100)).await;
    assert_eq!(count.load(Ordering::SeqCst), 2);

    tokio::time::sleep(Duration::from_secs(4)).await;
    assert_eq!(count.load(Ordering::SeqCst), 4);
    assert!(!handle.is_finished());
}

#[tokio::test(start_paused = true)]
async fn trigger_polls_without_waiting_for_the_tick() {
    let count = Arc::new(AtomicUsize::new(0));
    let scheduler = PollScheduler::new(Duration::from_secs(60));
    let handle = scheduler.spawn(PollMode::Repeating, counting_poll(&count, usize::MAX));

    settle().await;
    assert_eq!(count.load(Ordering::SeqCst), 1);

    handle.trigger_now();
    settle().await;
    assert_eq!(count.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn once_mode_runs_a_single_poll() {
    let count = Arc::new(AtomicUsize::new(0));
    let scheduler = PollScheduler::new(Duration::from_millis(10));
    let handle = scheduler.spawn(PollMode::Once, counting_poll(&count, usize::MAX));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert!(handle.is_finished());
}

#[tokio::test(start_paused = true)]
async fn poll_can_stop_the_poller() {
    let count = Arc::new(AtomicUsize::new(0));
    let scheduler = PollScheduler::new(Duration::from_millis(10));
    let handle = scheduler.spawn(PollMode::Repeating, counting_poll(&count, 3));

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(count.load(Ordering::SeqCst), 3);
    assert!(handle.is_finished());
}

#[tokio::test(start_paused = true)]
async fn dropping_the_handle_cancels_polling() {
    let count = Arc::new(AtomicUsize::new(0));
    let scheduler = PollScheduler::new(Duration::from_millis(10));
    let handle = scheduler.spawn(PollMode::Repeating, counting_poll(&count, usize::MAX));

    settle().await;
    drop(handle);
    let after_drop = count.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(count.load(Ordering::SeqCst), after_drop);
}

#[test]
fn zero_period_is_raised_to_a_millisecond() {
    assert_eq!(
        PollScheduler::new(Duration::ZERO).period(),
        Duration::from_millis(1)
    );
}
