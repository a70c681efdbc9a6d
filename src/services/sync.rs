//! Settings store
//!
//! Reconciles device reads into the shared [`PanelState`]. Every read takes
//! a sequence number when issued, and a response (or failure) is applied
//! only when no newer response of the same kind was applied before it. A
//! successful read clears the error left by a failed read of its kind.

use crate::{
    config::AppConfig,
    device_client::DeviceClient,
    model::{PanelState, ReadKind, SharedState},
};
use anyhow::Result;
use log::{debug, error};
use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

/// Which reads the device supports and how regions are selected
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreOptions {
    pub preferred_region: String,
    pub regions: bool,
    pub sun_times: bool,
}

impl StoreOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            preferred_region: config.panel.preferred_region.clone(),
            regions: config.variant.regions,
            sun_times: config.variant.sun_times,
        }
    }
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            preferred_region: "Europe/Kyiv".to_string(),
            regions: true,
            sun_times: true,
        }
    }
}

pub struct SettingsStore<C> {
    client: Arc<C>,
    state: SharedState,
    options: Arc<StoreOptions>,
    sequence: Arc<AtomicU64>,
}

impl<C> Clone for SettingsStore<C> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            state: self.state.clone(),
            options: self.options.clone(),
            sequence: self.sequence.clone(),
        }
    }
}

impl<C> SettingsStore<C>
where
    C: DeviceClient + Send + Sync + 'static,
{
    pub fn new(client: Arc<C>, state: SharedState, options: StoreOptions) -> Self {
        Self {
            client,
            state,
            options: Arc::new(options),
            sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Fetch the full settings record and overwrite every bound control
    pub async fn fetch_settings(&self) -> Result<()> {
        self.reconcile(
            ReadKind::Settings,
            "fetch settings",
            self.client.settings(),
            |state, settings| state.reconcile_settings(&settings),
        )
        .await
    }

    /// Repopulate the region selector from an empty list
    pub async fn fetch_regions(&self) -> Result<()> {
        if !self.options.regions {
            debug!("fetch regions skipped: not supported by device");
            return Ok(());
        }

        let preferred = self.options.preferred_region.clone();
        self.reconcile(
            ReadKind::Regions,
            "fetch regions",
            self.client.regions(),
            move |state, regions| state.regions.repopulate(regions, &preferred),
        )
        .await
    }

    pub async fn fetch_sun_times(&self) -> Result<()> {
        if !self.options.sun_times {
            debug!("fetch sun times skipped: not supported by device");
            return Ok(());
        }

        self.reconcile(
            ReadKind::SunTimes,
            "fetch sun times",
            self.client.sun_times(),
            |state, sun_times| state.sun_times = Some(sun_times),
        )
        .await
    }

    pub async fn fetch_current_time(&self) -> Result<()> {
        self.reconcile(
            ReadKind::CurrentTime,
            "fetch current time",
            self.client.current_time(),
            |state, clock| state.current_time = Some(clock.current_time),
        )
        .await
    }

    /// Fetch the current time, then refresh sun times so both match the device region
    pub async fn update_time(&self) -> Result<()> {
        self.fetch_current_time().await?;
        self.fetch_sun_times().await
    }

    /// Populate the whole panel before the first interaction
    ///
    /// All reads run concurrently; the first failure is reported after every
    /// read has completed.
    pub async fn bootstrap(&self) -> Result<()> {
        debug!("bootstrap() called");
        self.state.write().await.start_loading();

        let (settings, regions, sun_times, current_time) = tokio::join!(
            self.fetch_settings(),
            self.fetch_regions(),
            self.fetch_sun_times(),
            self.fetch_current_time()
        );

        self.state.write().await.stop_loading();

        settings.and(regions).and(sun_times).and(current_time)
    }

    fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed) + 1
    }

    async fn reconcile<T>(
        &self,
        kind: ReadKind,
        operation: &str,
        read: impl Future<Output = Result<T>>,
        apply: impl FnOnce(&mut PanelState, T),
    ) -> Result<()> {
        let seq = self.next_sequence();
        let response = read.await;

        let mut state = self.state.write().await;
        match response {
            Ok(value) => {
                if state.accept_read(kind, seq) {
                    apply(&mut *state, value);
                }
                Ok(())
            }
            Err(e) => {
                if state.reject_read(kind, seq, format!("{operation} failed: {e:#}")) {
                    error!("{operation} failed: {e:#}");
                }
                Err(e.context(format!("{operation} failed")))
            }
        }
    }
}
