//! Interaction with the person operating the panel
//!
//! Destructive commands ask for confirmation before any request is issued,
//! and acknowledgement messages returned by the device are shown through
//! [`Operator::notify`] before the command completes.

#[cfg(any(test, feature = "mock"))]
use mockall::automock;
use trait_variant::make;

#[make(Send)]
#[cfg_attr(any(test, feature = "mock"), automock)]
pub trait Operator {
    /// Ask a yes/no question; `false` means the command is abandoned
    async fn confirm(&self, prompt: &'static str) -> bool;

    /// Show a message and wait until it has been acknowledged
    async fn notify(&self, message: String);
}

pub const ERASE_NETWORK_DATA_PROMPT: &str = "Are you sure you want to erase network data?";
pub const RESTART_PROMPT: &str = "Are you sure you want to restart the board?";
