//! Socket Configuration Module

use std::num::NonZeroU32;

/// Backlog used when `listen` is given a non-positive value
pub const DEFAULT_BACKLOG: i32 = 128;

/// Receive calls allowed per readiness dispatch by default
pub const DEFAULT_RECV_MAX: u32 = 2;

/// Per-dispatch receive limit
///
/// Bounds how many receive calls one socket may make between two readiness
/// dispatches, so that a busy socket cannot starve the others on the same
/// reactor. Once the limit is reached, receive calls report
/// [`SocketError::Later`](crate::SocketError::Later) without touching the OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvLimit {
    /// No limit
    Unlimited,
    /// At most this many receive calls per dispatch
    PerDispatch(NonZeroU32),
}

impl RecvLimit {
    /// Check whether `count` receive calls exhaust the limit
    pub(crate) fn is_reached(self, count: u32) -> bool {
        match self {
            RecvLimit::Unlimited => false,
            RecvLimit::PerDispatch(max) => count >= max.get(),
        }
    }
}

impl Default for RecvLimit {
    fn default() -> Self {
        NonZeroU32::new(DEFAULT_RECV_MAX).map_or(RecvLimit::Unlimited, RecvLimit::PerDispatch)
    }
}

/// Integer form: any non-positive value means unlimited
impl From<i32> for RecvLimit {
    fn from(max: i32) -> Self {
        u32::try_from(max)
            .ok()
            .and_then(NonZeroU32::new)
            .map_or(RecvLimit::Unlimited, RecvLimit::PerDispatch)
    }
}

/// Socket configuration
///
/// Accepted sockets inherit the configuration of their listener.
#[derive(Debug, Clone)]
pub struct SocketConfig {
    /// Receive limit installed at open
    pub recv_limit: RecvLimit,
    /// Backlog substituted for non-positive `listen` arguments
    pub backlog: i32,
    /// Enable address reuse before binding stream sockets
    pub reuse_address: bool,
    /// Try to enable packet info on datagram sockets
    pub packet_info: bool,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            recv_limit: RecvLimit::default(),
            backlog: DEFAULT_BACKLOG,
            reuse_address: true,
            packet_info: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_config_default() {
        let config = SocketConfig::default();
        assert_eq!(config.backlog, 128);
        assert_eq!(config.recv_limit, RecvLimit::from(2));
        assert!(config.reuse_address);
        assert!(config.packet_info);
    }

    #[test]
    fn test_recv_limit_from_sentinel() {
        assert_eq!(RecvLimit::from(-1), RecvLimit::Unlimited);
        assert_eq!(RecvLimit::from(0), RecvLimit::Unlimited);
        assert_eq!(RecvLimit::from(i32::MIN), RecvLimit::Unlimited);
        assert_eq!(
            RecvLimit::from(5),
            RecvLimit::PerDispatch(NonZeroU32::new(5).unwrap())
        );
    }

    #[test]
    fn test_recv_limit_reached() {
        let limit = RecvLimit::from(2);
        assert!(!limit.is_reached(0));
        assert!(!limit.is_reached(1));
        assert!(limit.is_reached(2));
        assert!(!RecvLimit::Unlimited.is_reached(u32::MAX));
    }
}
