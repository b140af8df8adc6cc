//! Adapters Layer: Reactor
//!
//! Provides the single-threaded event reactor interface that event-driven
//! sockets register their native handles with, together with a reference
//! implementation built on `poll(2)`.
//!
//! ## Overview
//!
//! The `adapters_reactor` crate is part of the adapters layer. It provides:
//! - **[`Reactor`]**: the registration interface consumed by socket backends.
//!   On POSIX targets a registration is a file descriptor plus a readiness
//!   interest set; on Windows it is an event-object handle that is signalled
//!   when the associated socket has network events pending.
//! - **[`PollReactor`]** (unix only): a level-triggered reactor over `poll(2)`.
//!   The embedder drives it by calling [`PollReactor::run_once`].
//!
//! ## Modules
//!
//! - **[`reactor`](reactor/index.html)**: interface types and configuration
//! - **[`poll`](poll/index.html)**: the `poll(2)` reference reactor
//!
//! ## Architecture
//!
//! Everything here is single-threaded. Callbacks run on the thread that calls
//! `run_once`, and may register, modify or remove registrations (including
//! their own) while they run.
//!
//! ## See Also
//!
//! - [`adapters_socket`](../adapters_socket/index.html): event-driven sockets built on this interface

pub mod reactor;
#[cfg(unix)]
pub mod poll;

pub use reactor::{Reactor, ReactorConfig, ReactorError, ReactorInfo, Readiness, Registration};
#[cfg(unix)]
pub use reactor::ReadinessHandler;
#[cfg(windows)]
pub use reactor::SignalHandler;
#[cfg(unix)]
pub use poll::PollReactor;
