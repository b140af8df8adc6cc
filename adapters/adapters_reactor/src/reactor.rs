//! Reactor Interface Module
//!
//! The contract between an event loop and the sockets registered with it.
//!
//! A POSIX reactor watches file descriptors for readability and writability.
//! A Windows reactor waits on event-object handles; the socket backend decides
//! what an event signal means by asking the socket which network events fired.

use std::io;
#[cfg(unix)]
use std::os::unix::io::RawFd;
#[cfg(windows)]
use std::os::windows::io::RawHandle;

bitflags::bitflags! {
    /// Readiness directions of a file descriptor
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Readiness: u8 {
        /// Readable (or a pending connection, or end of stream)
        const READ = 0b01;
        /// Writable (or a completed or failed connect)
        const WRITE = 0b10;
    }
}

/// Opaque token identifying one registration
///
/// Tokens are never reused by [`PollReactor`](crate::PollReactor), so a stale
/// token can never address a newer registration for the same descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Registration(u64);

impl Registration {
    /// Create a registration token
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the numeric token
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Callback run when a registered descriptor is ready
#[cfg(unix)]
pub type ReadinessHandler = Box<dyn FnMut(Readiness)>;

/// Callback run when a registered event object is signalled
#[cfg(windows)]
pub type SignalHandler = Box<dyn FnMut()>;

/// Reactor errors
#[derive(Debug, thiserror::Error)]
pub enum ReactorError {
    /// The configured registration limit was reached
    #[error("registration limit of {0} reached")]
    TooManyRegistrations(usize),
    /// The handle already has a live registration
    #[error("native handle {0} is already registered")]
    AlreadyRegistered(i64),
    /// Waiting for events failed
    #[error("waiting for events failed: {0}")]
    Wait(#[source] io::Error),
    /// Creating or configuring a native object failed
    #[error("native reactor operation failed: {0}")]
    Io(#[from] io::Error),
}

/// Registration interface of a single-threaded reactor
///
/// All methods take `&self` so that a reactor can be shared through `Rc`
/// between the event loop and the sockets registered with it, and so that
/// callbacks can call back into the reactor while it is dispatching.
pub trait Reactor {
    /// Register a file descriptor with an initially empty interest set
    ///
    /// # Arguments
    ///
    /// * `fd` - Descriptor to watch; the caller keeps ownership
    /// * `handler` - Callback run with the ready directions, restricted to the interest set
    ///
    /// # Returns
    ///
    /// * `Ok(Registration)` - Token for later updates and removal
    /// * `Err(ReactorError)` - The descriptor could not be registered
    #[cfg(unix)]
    fn add_file_descriptor(
        &self,
        fd: RawFd,
        handler: ReadinessHandler,
    ) -> Result<Registration, ReactorError>;

    /// Replace the interest set of a registration
    #[cfg(unix)]
    fn set_file_descriptor_events(&self, registration: Registration, interest: Readiness);

    /// Remove a registration
    ///
    /// After this returns the handler is never called again, even if the
    /// descriptor was reported ready in the wake currently being dispatched.
    #[cfg(unix)]
    fn remove_file_descriptor(&self, registration: Registration);

    /// Register an event-object handle
    #[cfg(windows)]
    fn add_handle(
        &self,
        handle: RawHandle,
        handler: SignalHandler,
    ) -> Result<Registration, ReactorError>;

    /// Start waiting on a registered handle
    #[cfg(windows)]
    fn enable_handle(&self, registration: Registration);

    /// Remove a registered handle
    #[cfg(windows)]
    fn remove_handle(&self, registration: Registration);
}

/// Reactor configuration
#[derive(Debug, Clone)]
pub struct ReactorConfig {
    /// Maximum number of simultaneous registrations
    pub max_registrations: usize,
}

impl Default for ReactorConfig {
    fn default() -> Self {
        Self {
            max_registrations: 1024,
        }
    }
}

/// Reactor state information
#[derive(Debug, Clone)]
pub struct ReactorInfo {
    /// Configuration
    pub config: ReactorConfig,
    /// Number of live registrations
    pub registrations: usize,
    /// Number of registrations with a non-empty interest set
    pub active: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_readiness_flags() {
        let both = Readiness::READ | Readiness::WRITE;
        assert!(both.contains(Readiness::READ));
        assert!(both.contains(Readiness::WRITE));
        assert!(Readiness::empty().is_empty());
        assert_eq!(both & Readiness::WRITE, Readiness::WRITE);
    }

    #[test]
    fn test_registration_token() {
        let token = Registration::new(42);
        assert_eq!(token.id(), 42);
        assert!(Registration::new(1) < Registration::new(2));
    }

    #[test]
    fn test_reactor_config_default() {
        assert_eq!(ReactorConfig::default().max_registrations, 1024);
    }

    #[test]
    fn test_reactor_error_display() {
        let err = ReactorError::TooManyRegistrations(8);
        assert_eq!(err.to_string(), "registration limit of 8 reached");
        let err = ReactorError::AlreadyRegistered(5);
        assert!(err.to_string().contains('5'));
    }
}
