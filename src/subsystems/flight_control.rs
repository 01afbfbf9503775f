//! Flight Control Subsystem (§4.G, 100 Hz). Owns the dynamics integrator,
//! the single-axis autopilot, and the mission-phase policy. The only writer
//! of `VehicleState`'s physics fields (§4.E).

use crate::config::PhysicsConfig;
use crate::error::BodyFailure;
use crate::event_sink::EventSink;
use crate::scheduler::PeriodicTask;
use crate::vehicle_state::{MissionPhase, VehicleState};
use std::sync::Arc;
use tokio::sync::watch;

const COMPONENT: &str = "FCC";

/// Published by Engine Control each tick: the fact Flight Control needs
/// about individual engines (§4.G's Ignition→Liftoff transition condition
/// "all engines state==Running") and the worst currently-active fault
/// severity, which the Safety Monitor polls off the same channel rather
/// than sharing `FaultManager` across subsystem tasks.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineSummary {
    pub all_running: bool,
    pub worst_active_severity: Option<crate::fault::Severity>,
}

pub fn engine_summary_channel() -> (watch::Sender<EngineSummary>, watch::Receiver<EngineSummary>) {
    watch::channel(EngineSummary::default())
}

pub struct FlightControl {
    state: Arc<VehicleState>,
    physics: PhysicsConfig,
    events: Arc<EventSink>,
    engine_summary: watch::Receiver<EngineSummary>,
    last_phase: MissionPhase,
    // Autopilot PID working state (single dominant vertical axis).
    target_velocity_ms: f64,
    integral_error: f64,
    prev_error: f64,
}

impl FlightControl {
    pub fn new(
        state: Arc<VehicleState>,
        physics: PhysicsConfig,
        events: Arc<EventSink>,
        engine_summary: watch::Receiver<EngineSummary>,
    ) -> Self {
        Self {
            state,
            physics,
            events,
            engine_summary,
            last_phase: MissionPhase::PreLaunch,
            target_velocity_ms: 0.0,
            integral_error: 0.0,
            prev_error: 0.0,
        }
    }

    fn next_phase(&self, phase: MissionPhase, mission_time_s: f64, abort_requested: bool) -> MissionPhase {
        if abort_requested && !phase.is_terminal() {
            return MissionPhase::Abort;
        }
        match phase {
            MissionPhase::PreLaunch if mission_time_s >= -600.0 => MissionPhase::Countdown,
            MissionPhase::Countdown if mission_time_s >= -6.0 => MissionPhase::Ignition,
            MissionPhase::Ignition if self.engine_summary.borrow().all_running => {
                MissionPhase::Liftoff
            }
            MissionPhase::Liftoff if mission_time_s >= 10.0 => MissionPhase::Ascent,
            MissionPhase::Ascent if mission_time_s >= 120.0 => MissionPhase::StageSeparation,
            MissionPhase::StageSeparation if mission_time_s >= 125.0 => {
                MissionPhase::OrbitInsertion
            }
            MissionPhase::OrbitInsertion if mission_time_s >= 480.0 => {
                MissionPhase::MissionComplete
            }
            other => other,
        }
    }

    fn on_phase_entry(&mut self, phase: MissionPhase) {
        if phase == MissionPhase::StageSeparation {
            let mass = self.state.mass_kg();
            self.state.set_mass_kg(mass * 0.3);
        }
        if phase == MissionPhase::Liftoff {
            // Autopilot starts fresh from the vehicle's actual state at
            // liftoff rather than carrying over ground-held zeros.
            self.target_velocity_ms = self.state.velocity_ms();
            self.integral_error = 0.0;
            self.prev_error = 0.0;
        }
    }
}

impl PeriodicTask for FlightControl {
    fn tick(&mut self, dt_s: f64) -> Result<(), BodyFailure> {
        if dt_s <= 0.0 {
            return Ok(());
        }

        let mission_time_s = self.state.mission_time_s() + dt_s;
        self.state.set_mission_time_s(mission_time_s);

        let phase = self.state.phase();
        let new_phase = self.next_phase(phase, mission_time_s, self.state.abort_requested());
        if new_phase != self.last_phase {
            self.on_phase_entry(new_phase);
            self.state.set_phase(new_phase);
            self.last_phase = new_phase;
        }
        let phase = new_phase;
        let ground_held = phase.is_ground_held();
        // §4.G step 2's powered-flight thrust profile applies only across
        // Liftoff..OrbitInsertion; Abort and MissionComplete command zero
        // thrust rather than falling through to the "not ground-held" case.
        let powered_flight = matches!(
            phase,
            MissionPhase::Liftoff
                | MissionPhase::Ascent
                | MissionPhase::StageSeparation
                | MissionPhase::OrbitInsertion
        );

        let throttle_frac = if phase == MissionPhase::Ascent {
            0.75
        } else {
            1.0
        };

        let (thrust_n, fuel_rate_kgs) = if ground_held {
            if phase == MissionPhase::Ignition {
                (0.5 * self.physics.thrust_max_n, 0.0)
            } else {
                (0.0, 0.0)
            }
        } else if powered_flight {
            (
                self.physics.thrust_max_n * throttle_frac,
                self.physics.fuel_consumption_kgs,
            )
        } else {
            // Abort / MissionComplete: thrust commanded to zero (§8 S3).
            (0.0, 0.0)
        };

        if fuel_rate_kgs > 0.0 {
            let mass = self.state.mass_kg();
            let new_mass = (mass - fuel_rate_kgs * dt_s).max(self.physics.dry_mass_kg);
            self.state.set_mass_kg(new_mass);
        }
        let mass = self.state.mass_kg();
        let fuel_pct = ((mass - self.physics.dry_mass_kg) / self.physics.fuel_mass_kg * 100.0)
            .clamp(0.0, 100.0);
        self.state.set_fuel_pct(fuel_pct);

        let mut accel = thrust_n / mass - self.physics.gravity_ms2;
        let mut v = self.state.velocity_ms();

        if powered_flight {
            // Autopilot tracks a reference trajectory computed without
            // drag/noise, correcting for the difference (§4.G). Active only
            // across Liftoff..OrbitInsertion, never during Abort or
            // MissionComplete.
            let nominal_accel = thrust_n / mass - self.physics.gravity_ms2;
            self.target_velocity_ms += nominal_accel * dt_s;
            let error = self.target_velocity_ms - v;
            self.integral_error += error * dt_s;
            let derivative = (error - self.prev_error) / dt_s;
            let correction = (0.1 * error + 0.01 * self.integral_error - 0.05 * derivative)
                .clamp(-10.0, 10.0);
            self.prev_error = error;
            accel += correction;
        }

        let mut z = self.state.altitude_m();
        if ground_held {
            v = 0.0;
            z = 0.0;
            accel = 0.0;
        } else {
            v += accel * dt_s;
            z += v * dt_s;
        }

        let rho = 1.225 * (-z / 8000.0).exp();
        let q = 0.5 * rho * v * v;
        let mach = v.abs() / self.physics.speed_of_sound_ms;

        if !ground_held && z < 100_000.0 && v != 0.0 {
            let drag_force =
                0.5 * rho * v * v * self.physics.drag_coefficient * self.physics.frontal_area_m2;
            let drag_accel = -(drag_force / mass) * v.signum();
            v += drag_accel * dt_s;
        }

        if z < 0.0 {
            if !ground_held {
                self.events.warn(COMPONENT, "altitude went negative during flight");
            }
            z = 0.0;
        }
        if fuel_pct < 5.0 && !ground_held {
            self.events.warn(COMPONENT, "fuel critically low");
        }
        if q > 50_000.0 {
            self.events.warn(COMPONENT, "dynamic pressure exceeds 50 kPa");
        }
        if accel.abs() > 5.0 * self.physics.gravity_ms2 {
            self.events.warn(COMPONENT, "acceleration exceeds 5g");
        }

        self.state.set_velocity_ms(v);
        self.state.set_altitude_m(z);
        self.state.set_acceleration_ms2(accel);
        self.state.set_dynamic_pressure_pa(q);
        self.state.set_mach(mach);

        Ok(())
    }
}
