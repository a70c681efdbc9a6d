//! Panel services
//!
//! This module contains the panel logic separated from HTTP concerns.
//! Services work against the [`DeviceClient`](crate::device_client::DeviceClient)
//! trait so they can be tested with a mocked device.

pub mod controls;
pub mod poller;
pub mod sync;
