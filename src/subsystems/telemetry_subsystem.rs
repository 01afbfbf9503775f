//! Telemetry Subsystem (§4.I, 10 Hz). Samples `VehicleState` and appends one
//! ASCII record per tick to the Telemetry Device. The only writer of the
//! ring; never blocks past its own tick on a lagging reader, since
//! `TelemetryDevice::write_record` only ever overwrites the oldest data.

use crate::error::BodyFailure;
use crate::event_sink::EventSink;
use crate::scheduler::PeriodicTask;
use crate::telemetry_device::TelemetryDevice;
use crate::vehicle_state::VehicleState;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

const COMPONENT: &str = "TLM";

pub struct TelemetrySubsystem {
    state: Arc<VehicleState>,
    device: Arc<TelemetryDevice>,
    events: Arc<EventSink>,
}

impl TelemetrySubsystem {
    pub fn new(state: Arc<VehicleState>, device: Arc<TelemetryDevice>, events: Arc<EventSink>) -> Self {
        Self {
            state,
            device,
            events,
        }
    }

    /// Format one record per §6's grammar:
    /// `<sec>.<millis>,alt=<f>,vel=<f>,thr=<i>,go=<0|1>\n`. The timestamp is
    /// wall-clock seconds since the Unix epoch with a three-digit
    /// millisecond suffix, matching §6's example
    /// (`1691000000.123,alt=...`) rather than (possibly negative)
    /// mission-relative time.
    fn format_record(&self) -> String {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        format!(
            "{}.{:03},alt={:.3},vel={:.3},thr={},go={}\n",
            now.as_secs(),
            now.subsec_millis(),
            self.state.altitude_m(),
            self.state.velocity_ms(),
            self.state.throttle(),
            self.state.mission_go() as u8,
        )
    }
}

impl PeriodicTask for TelemetrySubsystem {
    fn tick(&mut self, _dt_s: f64) -> Result<(), BodyFailure> {
        let record = self.format_record();
        if self.device.write_record(record.as_bytes()).is_err() {
            self.events.warn(COMPONENT, "telemetry record write failed");
        }
        Ok(())
    }
}
