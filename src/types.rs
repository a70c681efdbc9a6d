//! Wire types exchanged with the staircase controller

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// RGB color as sent to and reported by the device
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Color picker representation, e.g. `#12ff00`
    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Rgb {
    type Err = anyhow::Error;

    /// Parses `#rrggbb` (the leading `#` is optional)
    fn from_str(s: &str) -> Result<Self> {
        let digits = s.trim().strip_prefix('#').unwrap_or(s.trim());

        ensure!(
            digits.len() == 6 && digits.chars().all(|c| c.is_ascii_hexdigit()),
            "failed to parse color {s:?}: expected six hex digits"
        );

        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&digits[range], 16)
                .with_context(|| format!("failed to parse color {s:?}"))
        };

        Ok(Self {
            r: channel(0..2)?,
            g: channel(2..4)?,
            b: channel(4..6)?,
        })
    }
}

/// Full settings snapshot returned by `/get-settings`
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct DeviceSettings {
    pub brightness: u16,
    pub stairs_speed: u16,
    pub led_count: u16,
    pub color: Rgb,
    pub stairs_group_size: u16,
    pub ignore_sun: bool,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct Region {
    #[serde(rename = "region")]
    pub name: String,
    pub timezone: String,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct SunTimes {
    pub sunrise: String,
    pub sunset: String,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ClockState {
    pub current_time: String,
}

/// Response of `/toggle-ignore-sun`: the new state and a message for the operator
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct IgnoreSunToggle {
    pub ignore_sun: bool,
    pub message: String,
}

/// One-shot lighting commands without optimistic state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Effect {
    LedOn,
    LedOff,
    Wave,
    Stairs,
    ToggleWaveDirection,
    ResetToRgb,
    MotionDetected1,
    MotionDetected2,
}

impl Effect {
    pub const ALL: [Effect; 8] = [
        Effect::LedOn,
        Effect::LedOff,
        Effect::Wave,
        Effect::Stairs,
        Effect::ToggleWaveDirection,
        Effect::ResetToRgb,
        Effect::MotionDetected1,
        Effect::MotionDetected2,
    ];

    pub fn endpoint(&self) -> &'static str {
        match self {
            Effect::LedOn => "/led-on",
            Effect::LedOff => "/led-off",
            Effect::Wave => "/wave-effect",
            Effect::Stairs => "/stairs-effect",
            Effect::ToggleWaveDirection => "/toggle-wave-direction",
            Effect::ResetToRgb => "/reset-to-rgb",
            Effect::MotionDetected1 => "/motion-detected-1",
            Effect::MotionDetected2 => "/motion-detected-2",
        }
    }
}

impl FromStr for Effect {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim().trim_start_matches('/');
        Effect::ALL
            .into_iter()
            .find(|effect| effect.endpoint().trim_start_matches('/') == name)
            .or(match name {
                "on" => Some(Effect::LedOn),
                "off" => Some(Effect::LedOff),
                "wave" => Some(Effect::Wave),
                "stairs" => Some(Effect::Stairs),
                "rgb" => Some(Effect::ResetToRgb),
                _ => None,
            })
            .with_context(|| format!("failed to parse effect: unknown effect {s:?}"))
    }
}
