//! Error Classifier Module
//!
//! Maps OS failures to the small logical error vocabulary of the socket layer.
//!
//! Classification happens in two steps. The platform layer turns a raw OS code
//! into an [`OsCondition`], a neutral name for the conditions this layer cares
//! about. [`classify`] then applies the per-operation table: each operation
//! recognises only a few conditions and reports everything else as
//! [`SocketError::Unknown`].

use std::io;

use crate::socket::SocketClass;
use crate::sys;

/// Logical socket errors
///
/// Success is represented by `Ok(..)` and, for the stored last error, by
/// `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum SocketError {
    /// The operation would block; retry after the next readiness event
    #[error("operation would block")]
    Later,
    /// A non-blocking connect was started and will complete asynchronously
    #[error("connect in progress")]
    InProgress,
    /// The requested address is not available on this host
    #[error("address not available")]
    AddressNotAvailable,
    /// The requested address is already in use
    #[error("address in use")]
    AddressInUse,
    /// Permission denied
    #[error("access denied")]
    AccessDenied,
    /// The peer refused the connection or datagram
    #[error("connection refused")]
    ConnectionRefused,
    /// The peer reset the connection
    #[error("connection reset")]
    ConnectionReset,
    /// The connection attempt timed out
    #[error("connection timed out")]
    ConnectionTimedOut,
    /// Any failure without a specific classification
    #[error("unknown socket error")]
    Unknown,
}

/// Socket operations with their own classification table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Starting a connect
    Connect,
    /// The deferred outcome of a pending connect
    ConnectResult,
    /// Binding a local address
    Bind,
    /// Entering the listening state
    Listen,
    /// Accepting a connection
    Accept,
    /// Any send variant
    Send,
    /// Any receive variant
    Recv,
    /// Querying the peer or local address
    AddressQuery,
}

/// OS failure conditions recognised by at least one operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OsCondition {
    WouldBlock,
    InProgress,
    AddressNotAvailable,
    AddressInUse,
    AccessDenied,
    ConnectionRefused,
    ConnectionReset,
    TimedOut,
}

/// Apply the classification table of an operation
///
/// # Arguments
///
/// * `op` - Operation that failed
/// * `class` - Class of the socket; a datagram reset is reported as a refusal
/// * `condition` - Recognised OS condition, or `None` if the code is not recognised
pub fn classify(op: Operation, class: SocketClass, condition: Option<OsCondition>) -> SocketError {
    use OsCondition as C;

    let Some(condition) = condition else {
        return SocketError::Unknown;
    };

    match (op, condition) {
        (Operation::Connect, C::InProgress) => SocketError::InProgress,
        (Operation::ConnectResult, C::TimedOut) => SocketError::ConnectionTimedOut,
        (Operation::ConnectResult, C::ConnectionRefused) => SocketError::ConnectionRefused,
        (Operation::Bind, C::AddressNotAvailable) => SocketError::AddressNotAvailable,
        (Operation::Bind, C::AddressInUse) => SocketError::AddressInUse,
        (Operation::Bind, C::AccessDenied) => SocketError::AccessDenied,
        (Operation::Listen, C::AddressInUse) => SocketError::AddressInUse,
        (Operation::Accept, C::WouldBlock) => SocketError::Later,
        (Operation::Send | Operation::Recv, C::WouldBlock) => SocketError::Later,
        (Operation::Send | Operation::Recv, C::ConnectionRefused) => SocketError::ConnectionRefused,
        (Operation::Send | Operation::Recv, C::ConnectionReset) => match class {
            SocketClass::Datagram => SocketError::ConnectionRefused,
            SocketClass::Stream => SocketError::ConnectionReset,
        },
        _ => SocketError::Unknown,
    }
}

/// Classify a raw OS error code for an operation
pub fn classify_code(op: Operation, class: SocketClass, code: i32) -> SocketError {
    classify(op, class, sys::os_condition(op, code))
}

/// Classify an `io::Error` returned by a socket call
pub fn classify_io(op: Operation, class: SocketClass, err: &io::Error) -> SocketError {
    match err.raw_os_error() {
        Some(code) => classify_code(op, class, code),
        None => SocketError::Unknown,
    }
}

/// Classify the deferred result of a connect
///
/// # Arguments
///
/// * `code` - Pending socket error; zero means the connect succeeded
pub fn classify_connect_result(code: i32) -> Result<(), SocketError> {
    if code == 0 {
        return Ok(());
    }
    Err(classify_code(Operation::ConnectResult, SocketClass::Stream, code))
}
