use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollMode {
    /// Run on every tick until cancelled or the job asks to stop.
    Repeating,
    /// Run once, right away.
    Once,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollControl {
    Continue,
    Stop,
}

/// Fixed-interval poller with a "run now" trigger.
///
/// A poll runs immediately on spawn and then on every tick. Polls never
/// overlap: triggers that arrive while a poll is in flight collapse into a
/// single follow-up poll.
#[derive(Debug, Clone, Copy)]
pub struct PollScheduler {
    period: Duration,
}

impl PollScheduler {
    pub fn new(period: Duration) -> Self {
        Self {
            period: period.max(Duration::from_millis(1)),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn spawn<F, Fut>(&self, mode: PollMode, mut poll: F) -> PollHandle
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = PollControl> + Send + 'static,
    {
        let trigger = Arc::new(Notify::new());
        let cancel = CancellationToken::new();
        let period = self.period;

        let task = tokio::spawn({
            let trigger = Arc::clone(&trigger);
            let cancel = cancel.clone();
            async move {
                let mut ticker = tokio::time::interval(period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        _ = trigger.notified() => ticker.reset(),
                        _ = ticker.tick() => {}
                    }
                    let control = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        control = poll() => control,
                    };
                    if control == PollControl::Stop || mode == PollMode::Once {
                        break;
                    }
                }
            }
        });

        PollHandle {
            trigger,
            cancel,
            task,
        }
    }
}

/// Owner of a running poller. Dropping the handle cancels it.
#[derive(Debug)]
pub struct PollHandle {
    trigger: Arc<Notify>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl PollHandle {
    /// Polls now instead of waiting for the next tick.
    pub fn trigger_now(&self) {
        self.trigger.notify_one();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
