//! Shared Vehicle State (§4.E) and the tagged types that ride on it (§3).
//!
//! Every scalar is a lock-free atomic with a single designated writer
//! (documented per accessor below); readers use acquire loads and tolerate a
//! tick of cross-field skew, matching the "eventual, not atomic snapshot"
//! contract. `f64` fields are stored as their bit pattern in an `AtomicU64`,
//! an "atomic scalar, not a lock" approach favored for per-subsystem packed
//! state fields elsewhere in this crate.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MissionPhase {
    PreLaunch = 0,
    Countdown = 1,
    Ignition = 2,
    Liftoff = 3,
    Ascent = 4,
    StageSeparation = 5,
    OrbitInsertion = 6,
    MissionComplete = 7,
    Abort = 8,
}

impl MissionPhase {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => MissionPhase::PreLaunch,
            1 => MissionPhase::Countdown,
            2 => MissionPhase::Ignition,
            3 => MissionPhase::Liftoff,
            4 => MissionPhase::Ascent,
            5 => MissionPhase::StageSeparation,
            6 => MissionPhase::OrbitInsertion,
            7 => MissionPhase::MissionComplete,
            _ => MissionPhase::Abort,
        }
    }

    /// True for every phase reachable before `Liftoff`, where ground
    /// support holds the vehicle (§3 invariant, §4.G step 2).
    pub fn is_ground_held(self) -> bool {
        matches!(
            self,
            MissionPhase::PreLaunch | MissionPhase::Countdown | MissionPhase::Ignition
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, MissionPhase::MissionComplete | MissionPhase::Abort)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum SystemState {
    Nominal = 0,
    Degraded = 1,
    SafeMode = 2,
}

impl SystemState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => SystemState::Nominal,
            1 => SystemState::Degraded,
            _ => SystemState::SafeMode,
        }
    }
}

fn load_f64(a: &AtomicU64, order: Ordering) -> f64 {
    f64::from_bits(a.load(order))
}

fn store_f64(a: &AtomicU64, v: f64, order: Ordering) {
    a.store(v.to_bits(), order);
}

/// Process-global vehicle state singleton. Constructed once at init, shared
/// via `Arc` by every subsystem task.
#[derive(Debug)]
pub struct VehicleState {
    mission_time_s: AtomicU64,
    altitude_m: AtomicU64,
    velocity_ms: AtomicU64,
    acceleration_ms2: AtomicU64,
    fuel_pct: AtomicU64,
    mass_kg: AtomicU64,
    dynamic_pressure_pa: AtomicU64,
    mach: AtomicU64,
    phase: AtomicU8,
    system_state: AtomicU8,
    /// mission_go / throttle / abort_requested are the fields the Command
    /// Service (§4.D) owns exclusively.
    mission_go: AtomicU8,
    throttle: AtomicU8,
    abort_requested: AtomicU8,
    created_at: Instant,
}

impl VehicleState {
    pub fn new(dry_mass_kg: f64, fuel_mass_kg: f64) -> Self {
        Self {
            mission_time_s: AtomicU64::new((-600.0f64).to_bits()),
            altitude_m: AtomicU64::new(0.0f64.to_bits()),
            velocity_ms: AtomicU64::new(0.0f64.to_bits()),
            acceleration_ms2: AtomicU64::new(0.0f64.to_bits()),
            fuel_pct: AtomicU64::new(100.0f64.to_bits()),
            mass_kg: AtomicU64::new((dry_mass_kg + fuel_mass_kg).to_bits()),
            dynamic_pressure_pa: AtomicU64::new(0.0f64.to_bits()),
            mach: AtomicU64::new(0.0f64.to_bits()),
            phase: AtomicU8::new(MissionPhase::PreLaunch as u8),
            system_state: AtomicU8::new(SystemState::Nominal as u8),
            mission_go: AtomicU8::new(0),
            throttle: AtomicU8::new(0),
            abort_requested: AtomicU8::new(0),
            created_at: Instant::now(),
        }
    }

    // --- Flight Control is the sole writer of the physics fields below ---

    pub fn mission_time_s(&self) -> f64 {
        load_f64(&self.mission_time_s, Ordering::Acquire)
    }
    pub fn set_mission_time_s(&self, v: f64) {
        store_f64(&self.mission_time_s, v, Ordering::Release)
    }

    pub fn altitude_m(&self) -> f64 {
        load_f64(&self.altitude_m, Ordering::Acquire)
    }
    pub fn set_altitude_m(&self, v: f64) {
        store_f64(&self.altitude_m, v, Ordering::Release)
    }

    pub fn velocity_ms(&self) -> f64 {
        load_f64(&self.velocity_ms, Ordering::Acquire)
    }
    pub fn set_velocity_ms(&self, v: f64) {
        store_f64(&self.velocity_ms, v, Ordering::Release)
    }

    pub fn acceleration_ms2(&self) -> f64 {
        load_f64(&self.acceleration_ms2, Ordering::Acquire)
    }
    pub fn set_acceleration_ms2(&self, v: f64) {
        store_f64(&self.acceleration_ms2, v, Ordering::Release)
    }

    pub fn fuel_pct(&self) -> f64 {
        load_f64(&self.fuel_pct, Ordering::Acquire)
    }
    pub fn set_fuel_pct(&self, v: f64) {
        store_f64(&self.fuel_pct, v.clamp(0.0, 100.0), Ordering::Release)
    }

    pub fn mass_kg(&self) -> f64 {
        load_f64(&self.mass_kg, Ordering::Acquire)
    }
    pub fn set_mass_kg(&self, v: f64) {
        store_f64(&self.mass_kg, v, Ordering::Release)
    }

    pub fn dynamic_pressure_pa(&self) -> f64 {
        load_f64(&self.dynamic_pressure_pa, Ordering::Acquire)
    }
    pub fn set_dynamic_pressure_pa(&self, v: f64) {
        store_f64(&self.dynamic_pressure_pa, v, Ordering::Release)
    }

    pub fn mach(&self) -> f64 {
        load_f64(&self.mach, Ordering::Acquire)
    }
    pub fn set_mach(&self, v: f64) {
        store_f64(&self.mach, v, Ordering::Release)
    }

    pub fn phase(&self) -> MissionPhase {
        MissionPhase::from_u8(self.phase.load(Ordering::Acquire))
    }
    pub fn set_phase(&self, phase: MissionPhase) {
        self.phase.store(phase as u8, Ordering::Release);
    }

    pub fn system_state(&self) -> SystemState {
        SystemState::from_u8(self.system_state.load(Ordering::Acquire))
    }
    pub fn set_system_state(&self, state: SystemState) {
        self.system_state.store(state as u8, Ordering::Release);
    }

    pub fn uptime(&self) -> std::time::Duration {
        self.created_at.elapsed()
    }

    // --- Command Service is the sole writer of the fields below ---

    pub fn mission_go(&self) -> bool {
        self.mission_go.load(Ordering::Acquire) != 0
    }
    pub fn set_mission_go(&self, go: bool) {
        self.mission_go.store(go as u8, Ordering::Release);
    }

    pub fn throttle(&self) -> u8 {
        self.throttle.load(Ordering::Acquire)
    }
    pub fn set_throttle(&self, v: u8) {
        self.throttle.store(v.min(100), Ordering::Release);
    }

    pub fn abort_requested(&self) -> bool {
        self.abort_requested.load(Ordering::Acquire) != 0
    }
    pub fn set_abort_requested(&self, v: bool) {
        self.abort_requested.store(v as u8, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_hold_vehicle_on_ground() {
        let vs = VehicleState::new(120_000.0, 400_000.0);
        assert_eq!(vs.phase(), MissionPhase::PreLaunch);
        assert_eq!(vs.altitude_m(), 0.0);
        assert_eq!(vs.velocity_ms(), 0.0);
        assert!(vs.phase().is_ground_held());
    }

    #[test]
    fn fuel_pct_is_clamped_on_write() {
        let vs = VehicleState::new(120_000.0, 400_000.0);
        vs.set_fuel_pct(150.0);
        assert_eq!(vs.fuel_pct(), 100.0);
        vs.set_fuel_pct(-5.0);
        assert_eq!(vs.fuel_pct(), 0.0);
    }

    #[test]
    fn throttle_is_clamped_on_write() {
        let vs = VehicleState::new(120_000.0, 400_000.0);
        vs.set_throttle(250);
        assert_eq!(vs.throttle(), 100);
    }

    #[test]
    fn abort_is_terminal_and_idempotent() {
        let vs = VehicleState::new(120_000.0, 400_000.0);
        vs.set_phase(MissionPhase::Abort);
        vs.set_abort_requested(true);
        vs.set_mission_go(false);
        vs.set_abort_requested(true);
        assert!(vs.abort_requested());
        assert!(!vs.mission_go());
        assert!(vs.phase().is_terminal());
    }
}
