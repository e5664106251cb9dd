use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveTime;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::domain::time_of_day::minutes_of_day;

/// Clock source for the current time of day. Swapped for a fixed closure in
/// tests so layouts are deterministic.
pub type NowProvider = Arc<dyn Fn() -> NaiveTime + Send + Sync>;

pub fn local_now() -> NowProvider {
    Arc::new(|| chrono::Local::now().time())
}

pub const TICK_INTERVAL: Duration = Duration::from_secs(30);

/// Publishes the minute-of-day on a fixed cadence.
///
/// The timeline only needs minute resolution, so subscribers are woken when
/// the minute actually changes, not on every tick.
pub struct TimelineTicker {
    sender: watch::Sender<u16>,
    handle: JoinHandle<()>,
}

impl TimelineTicker {
    pub fn spawn(now_provider: NowProvider) -> Self {
        Self::spawn_every(TICK_INTERVAL, now_provider)
    }

    pub fn spawn_every(period: Duration, now_provider: NowProvider) -> Self {
        let (sender, _) = watch::channel(minutes_of_day(now_provider()));
        let task_sender = sender.clone();
        let handle = tokio::spawn(async move {
            let mut ticks = tokio::time::interval(period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticks.tick().await;
                let minutes = minutes_of_day(now_provider());
                task_sender.send_if_modified(|current| {
                    if *current == minutes {
                        false
                    } else {
                        *current = minutes;
                        true
                    }
                });
            }
        });
        TimelineTicker { sender, handle }
    }

    /// Most recently published minute-of-day.
    pub fn minutes(&self) -> u16 {
        *self.sender.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<u16> {
        self.sender.subscribe()
    }

    pub fn shutdown(&self) {
        self.handle.abort();
    }
}

impl Drop for TimelineTicker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
