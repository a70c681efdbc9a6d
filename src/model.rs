use anyhow::{Result, bail, ensure};
use log::{debug, warn};
use serde::Serialize;
use std::{fmt, sync::Arc};
use tokio::sync::RwLock;

use crate::types::{DeviceSettings, Region, Rgb, SunTimes};

/// Panel state shared between the control binder, the settings store and the poller
pub type SharedState = Arc<RwLock<PanelState>>;

/// Properties edited through a slider and a numeric field
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Property {
    Brightness,
    StairsSpeed,
    LedCount,
}

impl Property {
    pub const ALL: [Property; 3] = [
        Property::Brightness,
        Property::StairsSpeed,
        Property::LedCount,
    ];

    pub fn range(&self) -> (u16, u16) {
        match self {
            Property::Brightness => (0, 100),
            Property::StairsSpeed => (10, 100),
            Property::LedCount => (1, 1000),
        }
    }

    /// Clamp raw operator input into the valid range
    pub fn clamp(&self, value: i64) -> u16 {
        let (min, max) = self.range();
        // result is within u16 bounds after clamping
        value.clamp(i64::from(min), i64::from(max)) as u16
    }

    pub fn label(&self) -> &'static str {
        match self {
            Property::Brightness => "Brightness",
            Property::StairsSpeed => "Stairs speed",
            Property::LedCount => "LED count",
        }
    }
}

/// Which of the two paired controls an edit came from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlSource {
    Slider,
    Input,
}

/// A slider and a numeric field showing the same value
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LinkedControl {
    pub slider: u16,
    pub input: u16,
}

impl LinkedControl {
    pub fn set(&mut self, value: u16) {
        self.slider = value;
        self.input = value;
    }

    pub fn is_consistent(&self) -> bool {
        self.slider == self.input
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum ButtonStyle {
    Active,
    #[default]
    Inactive,
}

/// Exclusive-selection button row for the stairs group size
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GroupButtons {
    buttons: Vec<ButtonStyle>,
}

impl GroupButtons {
    pub fn new(count: u16) -> Self {
        Self {
            buttons: vec![ButtonStyle::Inactive; usize::from(count.max(1))],
        }
    }

    /// Number of buttons in the row, never zero
    pub fn count(&self) -> u16 {
        // the row length originates from a u16
        self.buttons.len() as u16
    }

    pub fn styles(&self) -> &[ButtonStyle] {
        &self.buttons
    }

    /// 1-based index of the active button
    pub fn active(&self) -> Option<u16> {
        self.buttons
            .iter()
            .position(|style| *style == ButtonStyle::Active)
            .map(|index| index as u16 + 1)
    }

    /// Activate button `index` (1-based) and reset all others
    pub fn select(&mut self, index: u16) -> Result<()> {
        ensure!(
            (1..=self.count()).contains(&index),
            "failed to select group size {index}: row has buttons 1 to {}",
            self.count()
        );

        for (position, style) in self.buttons.iter_mut().enumerate() {
            *style = if position + 1 == usize::from(index) {
                ButtonStyle::Active
            } else {
                ButtonStyle::Inactive
            };
        }

        Ok(())
    }
}

impl Default for GroupButtons {
    fn default() -> Self {
        Self::new(5)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RegionSelector {
    pub options: Vec<Region>,
    pub selected: Option<usize>,
}

impl RegionSelector {
    pub fn selected_region(&self) -> Option<&Region> {
        self.selected.and_then(|index| self.options.get(index))
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.options.iter().position(|region| region.name == name)
    }

    /// Replace all options and pick the selection
    ///
    /// Selection order: the previously selected region when still listed,
    /// then `preferred` when listed, then the first option. The previous
    /// selection mirrors what was last sent to the device.
    pub fn repopulate(&mut self, options: Vec<Region>, preferred: &str) {
        let previous = self.selected_region().map(|region| region.name.clone());

        self.options = options;
        self.selected = previous
            .and_then(|name| self.position(&name))
            .or_else(|| self.position(preferred))
            .or(if self.options.is_empty() { None } else { Some(0) });
    }

    pub fn select(&mut self, name: &str) -> Result<()> {
        let Some(index) = self.position(name) else {
            bail!("failed to select region {name:?}: not in the region list");
        };
        self.selected = Some(index);
        Ok(())
    }
}

/// Kinds of reads that are reconciled into the state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadKind {
    Settings,
    Regions,
    SunTimes,
    CurrentTime,
}

/// Sequence numbers of the newest applied response per read kind
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ReadWatermarks {
    settings: u64,
    regions: u64,
    sun_times: u64,
    current_time: u64,
}

impl ReadWatermarks {
    fn slot(&mut self, kind: ReadKind) -> &mut u64 {
        match kind {
            ReadKind::Settings => &mut self.settings,
            ReadKind::Regions => &mut self.regions,
            ReadKind::SunTimes => &mut self.sun_times,
            ReadKind::CurrentTime => &mut self.current_time,
        }
    }

    /// Whether a response with `seq` is older than the newest applied one
    pub fn is_stale(&self, kind: ReadKind, seq: u64) -> bool {
        let applied = match kind {
            ReadKind::Settings => self.settings,
            ReadKind::Regions => self.regions,
            ReadKind::SunTimes => self.sun_times,
            ReadKind::CurrentTime => self.current_time,
        };
        seq <= applied
    }

    /// Record `seq` as applied unless a newer response already was
    pub fn advance(&mut self, kind: ReadKind, seq: u64) -> bool {
        let slot = self.slot(kind);
        if seq <= *slot {
            return false;
        }
        *slot = seq;
        true
    }
}

/// Client-side mirror of the device state
///
/// The device owns the authoritative copy. This state changes only through
/// the reconciliation functions (whole-record overwrite from a fetch) and the
/// optimistic setters (single field written before the device confirms).
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PanelState {
    // Bound controls
    pub brightness: LinkedControl,
    pub stairs_speed: LinkedControl,
    pub led_count: LinkedControl,
    pub color: String,
    pub group_size: GroupButtons,
    pub ignore_sun: bool,

    // Read-only display
    pub regions: RegionSelector,
    pub sun_times: Option<SunTimes>,
    pub current_time: Option<String>,

    // UI state
    pub is_loading: bool,
    pub error_message: Option<String>,

    #[serde(skip)]
    watermarks: ReadWatermarks,
    #[serde(skip)]
    error_source: Option<ReadKind>,
}

impl Default for PanelState {
    fn default() -> Self {
        Self::new(GroupButtons::default().count())
    }
}

impl PanelState {
    pub fn new(group_buttons: u16) -> Self {
        Self {
            brightness: LinkedControl::default(),
            stairs_speed: LinkedControl::default(),
            led_count: LinkedControl::default(),
            color: Rgb::default().to_hex(),
            group_size: GroupButtons::new(group_buttons),
            ignore_sun: false,
            regions: RegionSelector::default(),
            sun_times: None,
            current_time: None,
            is_loading: false,
            error_message: None,
            watermarks: ReadWatermarks::default(),
            error_source: None,
        }
    }

    pub fn shared(self) -> SharedState {
        Arc::new(RwLock::new(self))
    }

    pub fn control(&self, property: Property) -> &LinkedControl {
        match property {
            Property::Brightness => &self.brightness,
            Property::StairsSpeed => &self.stairs_speed,
            Property::LedCount => &self.led_count,
        }
    }

    fn control_mut(&mut self, property: Property) -> &mut LinkedControl {
        match property {
            Property::Brightness => &mut self.brightness,
            Property::StairsSpeed => &mut self.stairs_speed,
            Property::LedCount => &mut self.led_count,
        }
    }

    /// Clamp `value`, write it into both paired controls and return what to send
    pub fn apply_linked(&mut self, property: Property, value: i64) -> u16 {
        let clamped = property.clamp(value);
        if i64::from(clamped) != value {
            debug!("{} {value} clamped to {clamped}", property.label());
        }
        self.control_mut(property).set(clamped);
        clamped
    }

    pub fn apply_color(&mut self, color: Rgb) {
        self.color = color.to_hex();
    }

    pub fn ignore_sun_label(&self) -> &'static str {
        if self.ignore_sun {
            "Ignore Sun: ON"
        } else {
            "Ignore Sun: OFF"
        }
    }

    /// Overwrite every bound control from a device snapshot
    pub fn reconcile_settings(&mut self, settings: &DeviceSettings) {
        self.brightness.set(settings.brightness);
        self.stairs_speed.set(settings.stairs_speed);
        self.led_count.set(settings.led_count);
        self.color = settings.color.to_hex();

        let group_size = settings.stairs_group_size.clamp(1, self.group_size.count());
        if group_size != settings.stairs_group_size {
            warn!(
                "device group size {} outside button row, showing {group_size}",
                settings.stairs_group_size
            );
        }
        // in range after clamping
        let _ = self.group_size.select(group_size);

        self.ignore_sun = settings.ignore_sun;
    }

    /// Check whether a read response with sequence `seq` is still the newest
    ///
    /// An accepted response also clears an error left by a failed read of
    /// the same kind.
    pub fn accept_read(&mut self, kind: ReadKind, seq: u64) -> bool {
        let accepted = self.watermarks.advance(kind, seq);
        if !accepted {
            debug!("dropping stale {kind:?} response #{seq}");
        } else if self.error_source == Some(kind) {
            self.clear_error();
        }
        accepted
    }

    /// Record a failed read unless a newer response of the same kind was applied
    pub fn reject_read(&mut self, kind: ReadKind, seq: u64, error: String) -> bool {
        if self.watermarks.is_stale(kind, seq) {
            debug!("dropping stale {kind:?} failure #{seq}");
            return false;
        }
        self.set_error(error);
        self.error_source = Some(kind);
        true
    }

    /// Start a loading operation (sets is_loading=true, clears error)
    pub fn start_loading(&mut self) {
        self.is_loading = true;
        self.clear_error();
    }

    pub fn stop_loading(&mut self) {
        self.is_loading = false;
    }

    /// Set an error message and stop loading
    pub fn set_error(&mut self, error: String) {
        self.is_loading = false;
        self.error_message = Some(error);
        self.error_source = None;
    }

    pub fn clear_error(&mut self) {
        self.error_message = None;
        self.error_source = None;
    }
}

impl fmt::Display for PanelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for property in Property::ALL {
            let control = self.control(property);
            writeln!(
                f,
                "{:<13} slider {:>4} | input {:>4}",
                property.label(),
                control.slider,
                control.input
            )?;
        }
        writeln!(f, "{:<13} {}", "Color", self.color)?;

        let row: Vec<String> = self
            .group_size
            .styles()
            .iter()
            .enumerate()
            .map(|(index, style)| match style {
                ButtonStyle::Active => format!("[{}]", index + 1),
                ButtonStyle::Inactive => format!(" {} ", index + 1),
            })
            .collect();
        writeln!(f, "{:<13} {}", "Group size", row.join(""))?;
        writeln!(f, "{}", self.ignore_sun_label())?;

        match self.regions.selected_region() {
            Some(region) => writeln!(f, "{:<13} {} ({})", "Region", region.name, region.timezone)?,
            None => writeln!(f, "{:<13} -", "Region")?,
        }
        match &self.sun_times {
            Some(sun) => writeln!(f, "{:<13} {} / {}", "Sunrise/set", sun.sunrise, sun.sunset)?,
            None => writeln!(f, "{:<13} -", "Sunrise/set")?,
        }
        writeln!(
            f,
            "{:<13} {}",
            "Current time",
            self.current_time.as_deref().unwrap_or("-")
        )?;

        if self.is_loading {
            writeln!(f, "(loading)")?;
        }
        if let Some(error) = &self.error_message {
            writeln!(f, "error: {error}")?;
        }

        Ok(())
    }
}
