//! Error taxonomy (§7). Every fallible boundary returns one of these, or a
//! component-scoped error that converts into `SlsError` via `#[from]`.

use thiserror::Error;

/// Transport-level failures (§7 "Transport").
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    #[error("command service request failed")]
    CommandFailed,
    #[error("telemetry device unavailable")]
    DeviceUnavailable,
    #[error("shutting down")]
    Shutdown,
}

/// Reasons a periodic subsystem body can fail (§7 "Subsystem").
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BodyFailure {
    #[error("subsystem {0} body panicked or returned a fatal error")]
    Failed(&'static str),
}

/// Crate-wide error type. Subsystem bodies never propagate this directly
/// (§7 propagation policy) but it is the return type of every other
/// fallible operation: clock arming, telemetry I/O, and the command
/// service's client helper.
#[derive(Debug, Error)]
pub enum SlsError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("deadline missed: body took {actual_ms}ms, deadline {deadline_ms}ms")]
    DeadlineMiss { actual_ms: u64, deadline_ms: u64 },

    #[error(transparent)]
    Body(#[from] BodyFailure),

    #[error("restart budget exceeded for subsystem {0}, shutting down")]
    FatalShutdown(&'static str),

    #[error("failed to arm timer: {0}")]
    ClockError(String),
}

pub type SlsResult<T> = Result<T, SlsError>;
