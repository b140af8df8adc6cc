//! Platform Layer
//!
//! OS error tables, native address sizes and packet-info ancillary I/O.
//!
//! Each platform module exports the same items:
//! - `SOCKADDR_IN_LEN` / `SOCKADDR_IN6_LEN`: native address structure sizes
//! - `os_condition`: raw error code to [`OsCondition`](crate::error::OsCondition)
//! - `prepare`: per-handle setup applied at open and accept
//! - `enable_pktinfo`: best-effort packet-info setup for datagram sockets
//! - `send_msg_from` / `recv_msg_to`: ancillary-data datagram I/O, returning
//!   `None` when the facility is unavailable so the caller can fall back

#[cfg(unix)]
mod unix;
#[cfg(unix)]
pub(crate) use self::unix::*;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
pub(crate) use self::windows::*;
