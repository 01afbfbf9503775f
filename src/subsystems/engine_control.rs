//! Engine Control Subsystem (§4.H, 50 Hz). Simulates `N` independent engines
//! through an ignition sequence and steady burn, derives simulated sensor
//! signals with deterministic noise, and raises faults on threshold
//! violations. Publishes an `EngineSummary` to Flight Control; never writes
//! `VehicleState` physics fields directly (§4.E).

use super::flight_control::EngineSummary;
use super::Lcg;
use crate::error::BodyFailure;
use crate::event_sink::EventSink;
use crate::fault::{FaultKind, FaultManager};
use crate::scheduler::PeriodicTask;
use crate::vehicle_state::{MissionPhase, VehicleState};
use std::sync::Arc;
use tokio::sync::watch;

const COMPONENT: &str = "ENG";

/// One engine's lifecycle (§3 `EngineState`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineFsm {
    Offline,
    PreStart,
    Ignition,
    Running,
    Shutdown,
    /// Sticky — requires an external reset; the simulation does not clear
    /// this on its own.
    Fault,
}

#[derive(Debug, Clone, Copy)]
pub struct EngineState {
    pub fsm: EngineFsm,
    pub chamber_pa: f64,
    pub turbopump_rpm: f64,
    pub nozzle_k: f64,
    pub thrust_pct: f64,
    /// Seconds since the engine entered its current FSM state.
    elapsed_in_state_s: f64,
}

impl EngineState {
    fn new() -> Self {
        Self {
            fsm: EngineFsm::Offline,
            chamber_pa: CHAMBER_PA_REST,
            turbopump_rpm: 0.0,
            nozzle_k: NOZZLE_K_REST,
            thrust_pct: 0.0,
            elapsed_in_state_s: 0.0,
        }
    }
}

/// Ambient chamber pressure at rest (§4.H: "101_325 at rest").
const CHAMBER_PA_REST: f64 = 101_325.0;
/// `P_max`: peak chamber pressure feeding both the running-pressure formula
/// and the `ChamberPressureHigh` threshold, chosen so nominal running
/// pressure at min-throttle (60%) sits comfortably between the low and
/// high fault thresholds.
const CHAMBER_PA_MAX: f64 = 4_000_000.0;
const CHAMBER_PA_LOW: f64 = 1_000_000.0;
const TURBOPUMP_RPM_REST: f64 = 0.0;
const TURBOPUMP_RPM_MIN: f64 = 8_000.0;
const NOZZLE_K_REST: f64 = 300.0;
const NOZZLE_K_RUNNING: f64 = 2_500.0;
const NOZZLE_K_OVER_TEMP: f64 = 3_000.0;
const SENSOR_FAULT_CHANCE: f64 = 1e-4;

pub struct EngineControl {
    state: Arc<VehicleState>,
    events: Arc<EventSink>,
    engine_summary_tx: watch::Sender<EngineSummary>,
    faults: FaultManager,
    engines: Vec<EngineState>,
    rng: Lcg,
}

impl EngineControl {
    pub fn new(
        state: Arc<VehicleState>,
        events: Arc<EventSink>,
        engine_summary_tx: watch::Sender<EngineSummary>,
        engine_count: usize,
        seed: u64,
    ) -> Self {
        Self {
            state,
            events,
            engine_summary_tx,
            faults: FaultManager::new(),
            engines: (0..engine_count).map(|_| EngineState::new()).collect(),
            rng: Lcg::new(seed),
        }
    }

    pub fn faults(&self) -> &FaultManager {
        &self.faults
    }

    fn advance_ignition_sequence(&mut self, idx: usize, dt_s: f64, aborting: bool) {
        let engine = &mut self.engines[idx];
        engine.elapsed_in_state_s += dt_s;

        if aborting {
            if !matches!(engine.fsm, EngineFsm::Shutdown | EngineFsm::Fault | EngineFsm::Offline) {
                engine.fsm = EngineFsm::Shutdown;
                engine.elapsed_in_state_s = 0.0;
            }
        }

        match engine.fsm {
            EngineFsm::Offline => {
                engine.fsm = EngineFsm::PreStart;
                engine.elapsed_in_state_s = 0.0;
            }
            EngineFsm::PreStart => {
                // [0s, 1s): purge/pressurize, turbopump held at rest.
                // [1s, 3s): turbopump RPM ramps linearly 0 -> 12000 (§4.H).
                if engine.elapsed_in_state_s < 1.0 {
                    engine.turbopump_rpm = TURBOPUMP_RPM_REST;
                } else {
                    let ramp_t = ((engine.elapsed_in_state_s - 1.0) / 2.0).clamp(0.0, 1.0);
                    engine.turbopump_rpm = ramp_t * 12_000.0;
                }
                if engine.elapsed_in_state_s >= 3.0 {
                    engine.fsm = EngineFsm::Ignition;
                    engine.elapsed_in_state_s = 0.0;
                }
            }
            EngineFsm::Ignition => {
                // [3s, 4s): chamber ignition enabled, turbopump holds at the
                // ramp's full speed; engine reaches Running at t >= 4s.
                engine.turbopump_rpm = 12_000.0;
                if engine.elapsed_in_state_s >= 1.0 {
                    engine.fsm = EngineFsm::Running;
                    engine.elapsed_in_state_s = 0.0;
                }
            }
            EngineFsm::Running => {
                engine.thrust_pct = 60.0;
            }
            EngineFsm::Shutdown => {
                // 2-second linear ramp down.
                let frac = (1.0 - engine.elapsed_in_state_s / 2.0).clamp(0.0, 1.0);
                engine.thrust_pct *= frac;
                engine.turbopump_rpm *= frac;
                if engine.elapsed_in_state_s >= 2.0 {
                    engine.fsm = EngineFsm::Offline;
                    engine.thrust_pct = 0.0;
                    engine.turbopump_rpm = 0.0;
                    engine.elapsed_in_state_s = 0.0;
                }
            }
            EngineFsm::Fault => {
                // Sticky: stays until something external resets it. There is
                // no reset operation exposed yet (§9 open question), so once
                // entered an engine stays faulted for the rest of the run.
                engine.thrust_pct = 0.0;
            }
        }
    }

    fn simulate_signals(&mut self, idx: usize) {
        let noise = self.rng.next_symmetric();
        let engine = &mut self.engines[idx];
        if matches!(engine.fsm, EngineFsm::Running) {
            let t = engine.thrust_pct / 100.0;
            engine.chamber_pa =
                (CHAMBER_PA_REST + (CHAMBER_PA_MAX - CHAMBER_PA_REST) * t) * (1.0 + 0.02 * noise);
            engine.turbopump_rpm = (8_000.0 + 4_000.0 * t) * (1.0 + 0.05 * noise);
            engine.nozzle_k = NOZZLE_K_RUNNING + 50.0 * noise;
        } else {
            engine.chamber_pa = CHAMBER_PA_REST;
            engine.nozzle_k = NOZZLE_K_REST;
        }
    }

    fn check_faults(&mut self, idx: usize, mission_time_s: f64) {
        let injected = self.rng.chance(SENSOR_FAULT_CHANCE);
        let engine = self.engines[idx];
        if engine.fsm != EngineFsm::Running {
            return;
        }

        let kind = if engine.chamber_pa > CHAMBER_PA_MAX {
            Some(FaultKind::ChamberPressureHigh)
        } else if engine.chamber_pa < CHAMBER_PA_LOW {
            Some(FaultKind::ChamberPressureLow)
        } else if engine.turbopump_rpm < TURBOPUMP_RPM_MIN {
            Some(FaultKind::TurbopumpUnderspeed)
        } else if engine.nozzle_k > NOZZLE_K_OVER_TEMP {
            Some(FaultKind::NozzleOverTemp)
        } else if injected {
            Some(FaultKind::SensorInjected)
        } else {
            None
        };

        if let Some(kind) = kind {
            self.faults.record(Some(idx as u8), kind, mission_time_s);
            self.events.warn(
                COMPONENT,
                &format!("engine {idx} fault {kind:?} ({:?})", kind.severity()),
            );
            if kind.severity() >= crate::fault::Severity::Critical {
                self.engines[idx].fsm = EngineFsm::Fault;
            }
        }
    }
}

impl PeriodicTask for EngineControl {
    fn tick(&mut self, dt_s: f64) -> Result<(), BodyFailure> {
        if dt_s <= 0.0 {
            return Ok(());
        }
        let phase = self.state.phase();
        let mission_time_s = self.state.mission_time_s();
        let aborting = phase == MissionPhase::Abort;
        let should_run = matches!(
            phase,
            MissionPhase::Ignition
                | MissionPhase::Liftoff
                | MissionPhase::Ascent
                | MissionPhase::StageSeparation
                | MissionPhase::OrbitInsertion
        ) || aborting;

        if should_run {
            for idx in 0..self.engines.len() {
                self.advance_ignition_sequence(idx, dt_s, aborting);
                self.simulate_signals(idx);
                self.check_faults(idx, mission_time_s);
            }
        }

        let all_running = !self.engines.is_empty()
            && self.engines.iter().all(|e| e.fsm == EngineFsm::Running);
        let worst_active_severity = self.faults.active().map(|r| r.kind.severity()).max();
        let _ = self.engine_summary_tx.send(EngineSummary {
            all_running,
            worst_active_severity,
        });

        Ok(())
    }
}

impl std::fmt::Debug for EngineControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineControl")
            .field("engines", &self.engines.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_sink::Level;

    fn harness(n: usize) -> (EngineControl, Arc<VehicleState>, watch::Receiver<EngineSummary>) {
        let state = Arc::new(VehicleState::new(120_000.0, 400_000.0));
        let events = Arc::new(EventSink::new(Level::Debug));
        let (tx, rx) = watch::channel(EngineSummary::default());
        (EngineControl::new(state.clone(), events, tx, n, 7), state, rx)
    }

    #[test]
    fn engines_reach_running_after_ignition_sequence() {
        let (mut ec, state, rx) = harness(2);
        state.set_phase(MissionPhase::Ignition);
        for _ in 0..10 {
            ec.tick(0.5).unwrap();
        }
        assert!(rx.borrow().all_running);
    }

    #[test]
    fn idle_phase_never_starts_engines() {
        let (mut ec, state, rx) = harness(2);
        state.set_phase(MissionPhase::PreLaunch);
        for _ in 0..20 {
            ec.tick(0.5).unwrap();
        }
        assert!(!rx.borrow().all_running);
        assert!(ec.engines.iter().all(|e| e.fsm == EngineFsm::Offline));
    }

    #[test]
    fn abort_drives_running_engines_to_shutdown_then_offline() {
        let (mut ec, state, _rx) = harness(1);
        state.set_phase(MissionPhase::Ignition);
        for _ in 0..10 {
            ec.tick(0.5).unwrap();
        }
        assert_eq!(ec.engines[0].fsm, EngineFsm::Running);
        state.set_phase(MissionPhase::Abort);
        for _ in 0..10 {
            ec.tick(0.5).unwrap();
        }
        assert_eq!(ec.engines[0].fsm, EngineFsm::Offline);
        assert_eq!(ec.engines[0].thrust_pct, 0.0);
    }

    #[test]
    fn fault_state_is_sticky_until_end_of_run() {
        let (mut ec, state, _rx) = harness(1);
        state.set_phase(MissionPhase::Ignition);
        for _ in 0..10 {
            ec.tick(0.5).unwrap();
        }
        ec.engines[0].chamber_pa = CHAMBER_PA_MAX + 1.0;
        ec.check_faults(0, 100.0);
        assert_eq!(ec.engines[0].fsm, EngineFsm::Fault);
        ec.tick(0.1).unwrap();
        assert_eq!(ec.engines[0].fsm, EngineFsm::Fault);
    }
}
