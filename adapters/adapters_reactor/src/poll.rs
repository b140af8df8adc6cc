//! Poll Reactor Module
//!
//! A level-triggered, single-threaded reactor over `poll(2)`.
//!
//! Each call to [`PollReactor::run_once`] builds a poll set from the
//! registrations with a non-empty interest set, waits once, and runs the
//! callbacks of the ready descriptors in registration order. Registration state
//! is re-read before every callback, so a callback may remove or reconfigure
//! any registration (its own included) and the change takes effect within the
//! same wake.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io;
use std::os::unix::io::RawFd;
use std::rc::Rc;
use std::time::Duration;

use tracing::trace;

use crate::reactor::{
    Reactor, ReactorConfig, ReactorError, ReactorInfo, Readiness, ReadinessHandler, Registration,
};

/// One registered descriptor
struct FdEntry {
    fd: RawFd,
    interest: Readiness,
    handler: Rc<RefCell<ReadinessHandler>>,
}

/// Internal registration table
struct PollState {
    next_token: u64,
    entries: BTreeMap<Registration, FdEntry>,
}

/// `poll(2)` reactor
pub struct PollReactor {
    config: ReactorConfig,
    state: RefCell<PollState>,
}

impl PollReactor {
    /// Create a reactor with default configuration
    pub fn new() -> Self {
        Self::with_config(ReactorConfig::default())
    }

    /// Create a reactor with custom configuration
    pub fn with_config(config: ReactorConfig) -> Self {
        Self {
            config,
            state: RefCell::new(PollState {
                next_token: 1,
                entries: BTreeMap::new(),
            }),
        }
    }

    /// Get reactor information
    pub fn info(&self) -> ReactorInfo {
        let state = self.state.borrow();
        ReactorInfo {
            config: self.config.clone(),
            registrations: state.entries.len(),
            active: state
                .entries
                .values()
                .filter(|entry| !entry.interest.is_empty())
                .count(),
        }
    }

    /// Number of live registrations
    pub fn registrations(&self) -> usize {
        self.state.borrow().entries.len()
    }

    /// Wait for readiness once and run the callbacks of ready descriptors
    ///
    /// # Arguments
    ///
    /// * `timeout` - Maximum time to wait; `None` waits indefinitely
    ///
    /// # Returns
    ///
    /// * `Ok(usize)` - Number of callbacks run (zero on timeout, on an
    ///   interrupted wait, or when nothing is being watched)
    /// * `Err(ReactorError::Wait)` - `poll(2)` failed
    pub fn run_once(&self, timeout: Option<Duration>) -> Result<usize, ReactorError> {
        let (tokens, mut fds): (Vec<Registration>, Vec<libc::pollfd>) = {
            let state = self.state.borrow();
            state
                .entries
                .iter()
                .filter(|(_, entry)| !entry.interest.is_empty())
                .map(|(token, entry)| {
                    let pollfd = libc::pollfd {
                        fd: entry.fd,
                        events: poll_events(entry.interest),
                        revents: 0,
                    };
                    (*token, pollfd)
                })
                .unzip()
        };

        if fds.is_empty() {
            return Ok(0);
        }

        let timeout_ms = match timeout {
            Some(duration) => duration.as_millis().min(i32::MAX as u128) as libc::c_int,
            None => -1,
        };

        // SAFETY: `fds` is a live, correctly sized array of pollfd structures.
        let rc = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, timeout_ms) };
        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(0);
            }
            return Err(ReactorError::Wait(err));
        }

        let mut dispatched = 0;
        for (token, pollfd) in tokens.iter().zip(fds.iter()) {
            if pollfd.revents == 0 {
                continue;
            }

            let (handler, ready) = {
                let state = self.state.borrow();
                let Some(entry) = state.entries.get(token) else {
                    trace!(token = token.id(), "registration removed during dispatch");
                    continue;
                };
                (entry.handler.clone(), readiness(pollfd.revents) & entry.interest)
            };
            if ready.is_empty() {
                continue;
            }

            (handler.borrow_mut())(ready);
            dispatched += 1;
        }

        Ok(dispatched)
    }
}

impl Default for PollReactor {
    fn default() -> Self {
        Self::new()
    }
}

impl Reactor for PollReactor {
    fn add_file_descriptor(
        &self,
        fd: RawFd,
        handler: ReadinessHandler,
    ) -> Result<Registration, ReactorError> {
        let mut state = self.state.borrow_mut();

        if state.entries.len() >= self.config.max_registrations {
            return Err(ReactorError::TooManyRegistrations(self.config.max_registrations));
        }
        if state.entries.values().any(|entry| entry.fd == fd) {
            return Err(ReactorError::AlreadyRegistered(i64::from(fd)));
        }

        let token = Registration::new(state.next_token);
        state.next_token += 1;
        state.entries.insert(
            token,
            FdEntry {
                fd,
                interest: Readiness::empty(),
                handler: Rc::new(RefCell::new(handler)),
            },
        );
        trace!(fd, token = token.id(), "descriptor registered");
        Ok(token)
    }

    fn set_file_descriptor_events(&self, registration: Registration, interest: Readiness) {
        if let Some(entry) = self.state.borrow_mut().entries.get_mut(&registration) {
            entry.interest = interest;
        }
    }

    fn remove_file_descriptor(&self, registration: Registration) {
        // Bind the removed entry so its handler is dropped after the borrow ends.
        let removed = self.state.borrow_mut().entries.remove(&registration);
        if let Some(entry) = removed {
            trace!(fd = entry.fd, token = registration.id(), "descriptor removed");
        }
    }
}

fn poll_events(interest: Readiness) -> libc::c_short {
    let mut events = 0;
    if interest.contains(Readiness::READ) {
        events |= libc::POLLIN;
    }
    if interest.contains(Readiness::WRITE) {
        events |= libc::POLLOUT;
    }
    events
}

/// Error and hang-up conditions are reported in both directions so that the
/// owner discovers them through whichever operation it attempts next.
fn readiness(revents: libc::c_short) -> Readiness {
    let mut ready = Readiness::empty();
    if revents & (libc::POLLIN | libc::POLLHUP | libc::POLLERR) != 0 {
        ready |= Readiness::READ;
    }
    if revents & (libc::POLLOUT | libc::POLLHUP | libc::POLLERR) != 0 {
        ready |= Readiness::WRITE;
    }
    ready
}
