use crate::{device_client::DeviceClient, services::sync::SettingsStore};
use log::{debug, info};
use std::time::Duration;
use tokio::{
    task::AbortHandle,
    time::{Instant, Interval, MissedTickBehavior, interval, interval_at},
};

/// Repeating refresh of the read-only display fields
///
/// Every tick spawns its own fetch so a slow device never delays the cadence;
/// stale responses are dropped by the settings store. Stopping or dropping
/// the poller cancels the timer, fetches already in flight still complete.
pub struct Poller {
    handle: AbortHandle,
}

impl Poller {
    /// Start polling the time (and sun times when supported) every `period`
    ///
    /// When `settings_refresh` is set, the full settings record is
    /// reconciled on that period as well.
    pub fn start<C>(
        store: SettingsStore<C>,
        period: Duration,
        settings_refresh: Option<Duration>,
    ) -> Self
    where
        C: DeviceClient + Send + Sync + 'static,
    {
        info!(
            "poller started: time every {period:?}, settings {}",
            settings_refresh
                .map(|refresh| format!("every {refresh:?}"))
                .unwrap_or_else(|| "on demand".to_string())
        );

        let task = tokio::spawn(async move {
            let mut time_ticker = interval(period);
            time_ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            // first settings refresh is left to the bootstrap
            let mut settings_ticker = settings_refresh.map(|refresh| {
                let mut ticker = interval_at(Instant::now() + refresh, refresh);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                ticker
            });

            loop {
                tokio::select! {
                    _ = time_ticker.tick() => {
                        let store = store.clone();
                        tokio::spawn(async move {
                            if let Err(e) = store.update_time().await {
                                debug!("time poll failed: {e:#}");
                            }
                        });
                    }
                    _ = next_tick(&mut settings_ticker) => {
                        let store = store.clone();
                        tokio::spawn(async move {
                            if let Err(e) = store.fetch_settings().await {
                                debug!("settings poll failed: {e:#}");
                            }
                        });
                    }
                }
            }
        });

        Self {
            handle: task.abort_handle(),
        }
    }

    pub fn stop(&self) {
        if !self.handle.is_finished() {
            self.handle.abort();
            info!("poller stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

/// Tick of an optional timer; never resolves when the timer is disabled
async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
