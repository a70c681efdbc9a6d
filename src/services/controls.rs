//! Control binder
//!
//! One setter per panel control. Setters validate or clamp locally, write the
//! result into the shared state (both controls of a linked pair) and then
//! send the update. Plain setting updates are fire-and-forget: the returned
//! handle may be awaited but the panel never waits for the device.

use crate::{
    device_client::DeviceClient,
    model::{ControlSource, Property, SharedState},
    operator::{ERASE_NETWORK_DATA_PROMPT, Operator, RESTART_PROMPT},
    services::sync::SettingsStore,
    types::{Effect, Rgb},
};
use anyhow::{Context, Result, ensure};
use log::{debug, error, info};
use std::{future::Future, sync::Arc};
use tokio::task::JoinHandle;

pub struct ControlBinder<C, O> {
    store: SettingsStore<C>,
    operator: Arc<O>,
}

impl<C, O> Clone for ControlBinder<C, O> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            operator: self.operator.clone(),
        }
    }
}

impl<C, O> ControlBinder<C, O>
where
    C: DeviceClient + Send + Sync + 'static,
    O: Operator + Send + Sync + 'static,
{
    pub fn new(store: SettingsStore<C>, operator: Arc<O>) -> Self {
        Self { store, operator }
    }

    pub fn store(&self) -> &SettingsStore<C> {
        &self.store
    }

    fn state(&self) -> &SharedState {
        self.store.state()
    }

    pub async fn set_from_slider(&self, property: Property, value: i64) -> JoinHandle<()> {
        self.set_linked(property, ControlSource::Slider, value).await
    }

    pub async fn set_from_input(&self, property: Property, value: i64) -> JoinHandle<()> {
        self.set_linked(property, ControlSource::Input, value).await
    }

    async fn set_linked(
        &self,
        property: Property,
        source: ControlSource,
        value: i64,
    ) -> JoinHandle<()> {
        let clamped = self.state().write().await.apply_linked(property, value);
        debug!("{} set from {source:?}: {clamped}", property.label());

        self.fire("set", move |client| async move {
            match property {
                Property::Brightness => client.set_brightness(clamped).await,
                Property::StairsSpeed => client.set_stairs_speed(clamped).await,
                Property::LedCount => client.set_led_count(clamped).await,
            }
        })
    }

    /// Parse a `#rrggbb` picker value and send it as separate channels
    pub async fn set_color(&self, hex: &str) -> Result<JoinHandle<()>> {
        let color: Rgb = hex.parse()?;
        self.state().write().await.apply_color(color);
        debug!("color set: {color}");

        Ok(self.fire("set color", move |client| async move {
            client.set_color(color).await
        }))
    }

    /// Activate group-size button `index` (1-based) and send it
    pub async fn set_stairs_group_size(&self, index: u16) -> Result<JoinHandle<()>> {
        self.state().write().await.group_size.select(index)?;
        debug!("stairs group size set: {index}");

        Ok(self.fire("set stairs group size", move |client| async move {
            client.set_stairs_group_size(index).await
        }))
    }

    /// Toggle the sun-based trigger and show the device's message
    pub async fn toggle_ignore_sun(&self) -> Result<()> {
        let toggle = match self.store.client().toggle_ignore_sun().await {
            Ok(toggle) => toggle,
            Err(e) => return Err(self.fail("toggle ignore sun", e).await),
        };

        let label = {
            let mut state = self.state().write().await;
            state.ignore_sun = toggle.ignore_sun;
            state.ignore_sun_label()
        };
        info!("{label}");

        self.operator.notify(toggle.message).await;
        Ok(())
    }

    pub async fn save_parameters(&self) -> Result<()> {
        match self.store.client().save_parameters().await {
            Ok(ack) => {
                info!("save parameters: {ack}");
                self.operator.notify(ack).await;
                Ok(())
            }
            Err(e) => Err(self.fail("save parameters", e).await),
        }
    }

    /// Returns `false` when the operator declined and nothing was sent
    pub async fn erase_network_data(&self) -> Result<bool> {
        if !self.operator.confirm(ERASE_NETWORK_DATA_PROMPT).await {
            info!("erase network data cancelled");
            return Ok(false);
        }

        match self.store.client().erase_network_data().await {
            Ok(ack) => {
                info!("erase network data: {ack}");
                self.operator.notify(ack).await;
                Ok(true)
            }
            Err(e) => Err(self.fail("erase network data", e).await),
        }
    }

    /// Returns `false` when the operator declined and nothing was sent
    pub async fn restart_board(&self) -> Result<bool> {
        if !self.operator.confirm(RESTART_PROMPT).await {
            info!("restart cancelled");
            return Ok(false);
        }

        match self.store.client().restart().await {
            Ok(()) => {
                info!("restart requested");
                Ok(true)
            }
            Err(e) => Err(self.fail("restart", e).await),
        }
    }

    /// Change the region selection without sending it
    pub async fn select_region(&self, name: &str) -> Result<()> {
        self.state().write().await.regions.select(name)
    }

    /// Send the selected region and refresh time and sun times for it
    pub async fn update_region(&self) -> Result<()> {
        ensure!(
            self.store.options().regions,
            "failed to update region: device does not support regions"
        );

        let region = self
            .state()
            .read()
            .await
            .regions
            .selected_region()
            .cloned()
            .context("failed to update region: no region selected")?;

        let name = region.name.clone();
        match self.store.client().set_region(region).await {
            Ok(ack) => info!("region set to {name}: {ack}"),
            Err(e) => return Err(self.fail("update region", e).await),
        }

        self.store.update_time().await
    }

    pub fn trigger_effect(&self, effect: Effect) -> JoinHandle<()> {
        debug!("trigger effect {effect:?}");
        self.fire("trigger effect", move |client| async move {
            client.trigger_effect(effect).await
        })
    }

    /// Spawn an update request; failures are logged and shown as the panel error
    fn fire<F, Fut>(&self, operation: &'static str, request: F) -> JoinHandle<()>
    where
        F: FnOnce(Arc<C>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<String>> + Send + 'static,
    {
        let client = self.store.client().clone();
        let state = self.state().clone();

        tokio::spawn(async move {
            match request(client).await {
                Ok(ack) => debug!("{operation}: {ack}"),
                Err(e) => {
                    error!("{operation} failed: {e:#}");
                    state
                        .write()
                        .await
                        .set_error(format!("{operation} failed: {e:#}"));
                }
            }
        })
    }

    async fn fail(&self, operation: &str, e: anyhow::Error) -> anyhow::Error {
        error!("{operation} failed: {e:#}");
        self.state()
            .write()
            .await
            .set_error(format!("{operation} failed: {e:#}"));
        e.context(format!("{operation} failed"))
    }
}
