//! Port reconciler

use std::fmt;

use serde::{Deserialize, Serialize};

/// One step of moving network exposure to the declared port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortAction {
    ClosePort(u16),
    OpenPort(u16),
    /// Tell website consumers about the new port
    AnnounceEndpoint,
}

impl fmt::Display for PortAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortAction::ClosePort(port) => write!(f, "close-port {port}"),
            PortAction::OpenPort(port) => write!(f, "open-port {port}"),
            PortAction::AnnounceEndpoint => write!(f, "announce-endpoint"),
        }
    }
}

/// Declared port against the port of the last applied configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortState {
    pub current: Option<u16>,
    pub previous: Option<u16>,
}

impl PortState {
    #[must_use]
    pub fn new(current: Option<u16>, previous: Option<u16>) -> Self {
        Self { current, previous }
    }

    /// Compute the actions moving exposure from `previous` to `current`
    ///
    /// The old port is closed before the new one is opened, and the endpoint
    /// is announced only once the new port is open.
    #[must_use]
    pub fn reconcile(&self) -> Vec<PortAction> {
        if self.current == self.previous {
            return Vec::new();
        }

        let mut actions = Vec::with_capacity(3);
        if let Some(previous) = self.previous {
            actions.push(PortAction::ClosePort(previous));
        }
        if let Some(current) = self.current {
            actions.push(PortAction::OpenPort(current));
            actions.push(PortAction::AnnounceEndpoint);
        }
        actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unchanged_port_is_noop() {
        assert!(PortState::new(Some(8080), Some(8080)).reconcile().is_empty());
        assert!(PortState::new(None, None).reconcile().is_empty());
    }

    #[test]
    fn test_changed_port_closes_then_opens() {
        assert_eq!(
            PortState::new(Some(9090), Some(8080)).reconcile(),
            vec![
                PortAction::ClosePort(8080),
                PortAction::OpenPort(9090),
                PortAction::AnnounceEndpoint
            ]
        );
    }

    #[test]
    fn test_first_port_only_opens() {
        assert_eq!(
            PortState::new(Some(8080), None).reconcile(),
            vec![PortAction::OpenPort(8080), PortAction::AnnounceEndpoint]
        );
    }

    #[test]
    fn test_removed_port_only_closes() {
        assert_eq!(
            PortState::new(None, Some(8080)).reconcile(),
            vec![PortAction::ClosePort(8080)]
        );
    }
}
