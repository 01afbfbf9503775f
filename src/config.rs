//! Simulation configuration.
//!
//! A configuration object is assumed as input by the core; parsing it from a
//! file or the environment is explicitly out of scope. `SimConfig` is the
//! type that input is expected to deserialize (or be hand-built) into, built
//! once at process start and shared read-only across every task via `Arc`.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Priority and timing configuration for one periodic subsystem.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TaskConfig {
    pub period_ms: u32,
    pub priority: u8,
    /// Deadline as a multiple of `period_ms`. Default 1.5.
    pub deadline_factor: f64,
}

impl TaskConfig {
    pub const fn new(period_ms: u32, priority: u8) -> Self {
        Self {
            period_ms,
            priority,
            deadline_factor: 1.5,
        }
    }

    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms as u64)
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_secs_f64(self.period_ms as f64 / 1000.0 * self.deadline_factor)
    }
}

/// Physical constants driving the flight and engine models (§4.G/H).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PhysicsConfig {
    pub gravity_ms2: f64,
    pub thrust_max_n: f64,
    pub dry_mass_kg: f64,
    pub fuel_mass_kg: f64,
    pub fuel_consumption_kgs: f64,
    pub drag_coefficient: f64,
    pub frontal_area_m2: f64,
    pub speed_of_sound_ms: f64,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity_ms2: 9.81,
            thrust_max_n: 7_600_000.0,
            dry_mass_kg: 120_000.0,
            fuel_mass_kg: 400_000.0,
            fuel_consumption_kgs: 1_000.0,
            drag_coefficient: 0.3,
            frontal_area_m2: 50.0,
            speed_of_sound_ms: 343.0,
        }
    }
}

/// Per-subsystem periodic task configuration, keyed by the names used in
/// §4.F's priority table.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub safety_monitor: TaskConfig,
    pub flight_control: TaskConfig,
    pub engine_control: TaskConfig,
    pub telemetry: TaskConfig,
    /// Restart budget `R` before a subsystem failure is promoted to
    /// `FatalShutdown`.
    pub max_restarts: u8,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            safety_monitor: TaskConfig::new(200, 60),
            flight_control: TaskConfig::new(10, 50),
            engine_control: TaskConfig::new(20, 45),
            telemetry: TaskConfig::new(100, 40),
            max_restarts: 3,
        }
    }
}

/// Top-level configuration object, constructed once and shared read-only.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SimConfig {
    pub scheduler: SchedulerConfig,
    pub physics: PhysicsConfig,
    /// Telemetry ring buffer size in bytes (default 8192, §4.C).
    pub telemetry_ring_bytes: usize,
    /// Number of independent engines (`N` in §4.H).
    pub engine_count: usize,
    /// TCP port the Command Service listens on.
    pub command_port: u16,
    /// TCP port the Telemetry Device streams readers from.
    pub telemetry_port: u16,
    pub event_drop_threshold: crate::event_sink::Level,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            scheduler: SchedulerConfig::default(),
            physics: PhysicsConfig::default(),
            telemetry_ring_bytes: 8192,
            engine_count: 4,
            command_port: 7878,
            telemetry_port: 7879,
            event_drop_threshold: crate::event_sink::Level::Debug,
        }
    }
}

impl SimConfig {
    /// Preset with tighter deadlines and a zero restart budget, matching a
    /// hard real-time launch rehearsal profile.
    pub fn strict() -> Self {
        let mut cfg = Self::default();
        cfg.scheduler.flight_control.deadline_factor = 1.2;
        cfg.scheduler.engine_control.deadline_factor = 1.2;
        cfg.scheduler.max_restarts = 0;
        cfg
    }
}
