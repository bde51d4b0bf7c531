#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Connection state of a driver.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connected,
    Scanning,
    /// Scanning was interrupted by a transport failure and the driver is
    /// trying to bring the link back.
    Reconnecting,
}

impl ConnectionState {
    pub fn is_connected(self) -> bool {
        self != ConnectionState::Disconnected
    }

    /// Reconnecting counts as scanning from the consumer's point of view.
    pub fn is_scanning(self) -> bool {
        matches!(
            self,
            ConnectionState::Scanning | ConnectionState::Reconnecting
        )
    }
}
