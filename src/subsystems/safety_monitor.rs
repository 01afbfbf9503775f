//! Safety Monitor Subsystem (§4.F, 5 Hz, highest priority). A lightweight
//! watchdog over `VehicleState` and the active fault set: it writes nothing
//! that other subsystems own, only `system_state`, escalating to `SafeMode`
//! when conditions stay out of bounds for more than one consecutive tick.
//! A polling loop over this vehicle's physics and fault history rather than
//! an interrupt- or event-driven design, so a single missed tick can't
//! mask a real fault.

use super::flight_control::EngineSummary;
use crate::error::BodyFailure;
use crate::event_sink::EventSink;
use crate::fault::Severity;
use crate::scheduler::PeriodicTask;
use crate::vehicle_state::{SystemState, VehicleState};
use std::sync::Arc;
use tokio::sync::watch;

const COMPONENT: &str = "SAFE";

/// Read-only view into the active fault set, shared by Engine Control and
/// polled here rather than duplicated.
pub trait FaultView: Send {
    fn has_active_at_or_above(&self, severity: Severity) -> bool;
}

/// Production wiring: Engine Control is the only fault source (§4.H), so
/// the Safety Monitor just reads the worst severity off its summary
/// channel rather than sharing `FaultManager` across subsystem tasks.
impl FaultView for watch::Receiver<EngineSummary> {
    fn has_active_at_or_above(&self, severity: Severity) -> bool {
        self.borrow()
            .worst_active_severity
            .map_or(false, |s| s >= severity)
    }
}

pub struct SafetyMonitor<F: FaultView> {
    state: Arc<VehicleState>,
    events: Arc<EventSink>,
    faults: F,
    consecutive_major_ticks: u32,
}

impl<F: FaultView> SafetyMonitor<F> {
    pub fn new(state: Arc<VehicleState>, events: Arc<EventSink>, faults: F) -> Self {
        Self {
            state,
            events,
            faults,
            consecutive_major_ticks: 0,
        }
    }
}

impl<F: FaultView> PeriodicTask for SafetyMonitor<F> {
    fn tick(&mut self, _dt_s: f64) -> Result<(), BodyFailure> {
        let major_or_worse = self.faults.has_active_at_or_above(Severity::Major);
        let catastrophic = self.faults.has_active_at_or_above(Severity::Catastrophic);

        if catastrophic {
            self.events
                .critical(COMPONENT, "catastrophic fault active, forcing SafeMode");
            self.state.set_system_state(SystemState::SafeMode);
            self.consecutive_major_ticks = 0;
            return Ok(());
        }

        if major_or_worse {
            self.consecutive_major_ticks += 1;
        } else {
            self.consecutive_major_ticks = 0;
        }

        let system_state = if self.consecutive_major_ticks >= 2 {
            SystemState::SafeMode
        } else if major_or_worse {
            SystemState::Degraded
        } else {
            SystemState::Nominal
        };

        if system_state != self.state.system_state() {
            self.events.warn(
                COMPONENT,
                &format!("system state transition -> {system_state:?}"),
            );
            self.state.set_system_state(system_state);
        }

        Ok(())
    }
}
