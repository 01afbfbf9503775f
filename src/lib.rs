//! # Space Launch Vehicle Simulator Core
//!
//! A soft real-time core for simulating a space-launch vehicle's flight
//! software: a fixed-priority periodic scheduler, a request/reply command
//! service, a ring-buffered telemetry device, and the vehicle/engine state
//! machines that drive a countdown through orbit insertion (or an abort).
//!
//! ## Architecture
//!
//! - [`scheduler`] - fixed-priority periodic task runner with deadline
//!   monitoring and restart-with-backoff
//! - [`vehicle_state`] - the shared, lock-free vehicle state singleton
//! - [`command_service`] - the packed-binary TCP request/reply endpoint
//! - [`telemetry_device`] - the fixed-size ring buffer telemetry stream
//! - [`subsystems`] - the periodic bodies: Safety Monitor, Flight Control,
//!   Engine Control, Telemetry
//! - [`fault`] - the fault taxonomy and bounded fault history
//! - [`config`] - the configuration object the core is built from
//! - [`event_sink`] - the leveled logging surface
//! - [`error`] - the error taxonomy
//! - [`clock`] - monotonic time and pulse primitives

#![deny(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]

pub mod clock;
pub mod command_service;
pub mod config;
pub mod error;
pub mod event_sink;
pub mod fault;
pub mod scheduler;
pub mod subsystems;
pub mod telemetry_device;
pub mod vehicle_state;

pub use command_service::{client_send, CommandReply, CommandService, OperatorCommand};
pub use config::{PhysicsConfig, SchedulerConfig, SimConfig, TaskConfig};
pub use error::{BodyFailure, SlsError, SlsResult, TransportError};
pub use event_sink::{EventSink, Level};
pub use fault::{FaultKind, FaultManager, FaultRecord, Severity};
pub use scheduler::{PeriodicTask, Scheduler, TaskStats};
pub use telemetry_device::{ReadOutcome, TelemetryDevice, TelemetryReader};
pub use vehicle_state::{MissionPhase, SystemState, VehicleState};
