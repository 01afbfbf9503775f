//! Main simulator binary (§6): wires the shared vehicle state, telemetry
//! ring, Command Service, and the four periodic subsystems together under
//! the scheduler, then runs until a fatal shutdown is raised.

use sls_core::config::SimConfig;
use sls_core::subsystems::flight_control::engine_summary_channel;
use sls_core::subsystems::{EngineControl, FlightControl, SafetyMonitor, TelemetrySubsystem};
use sls_core::{CommandService, EventSink, Level, Scheduler, TelemetryDevice, VehicleState};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

#[tokio::main]
async fn main() {
    EventSink::init_global_subscriber();

    let config = SimConfig::default();
    let events = Arc::new(EventSink::new(Level::Info));
    let state = Arc::new(VehicleState::new(
        config.physics.dry_mass_kg,
        config.physics.fuel_mass_kg,
    ));
    let telemetry_device = TelemetryDevice::new(config.telemetry_ring_bytes);
    let shutdown = Arc::new(AtomicBool::new(false));
    let scheduler = Scheduler::new(
        Arc::clone(&events),
        Arc::clone(&shutdown),
        config.scheduler.max_restarts,
    );

    let (engine_summary_tx, engine_summary_rx_fcc) = engine_summary_channel();
    let engine_summary_rx_safe = engine_summary_rx_fcc.clone();

    let seed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0x5EED);

    {
        let state = Arc::clone(&state);
        let physics = config.physics;
        let events = Arc::clone(&events);
        scheduler.spawn(
            "FCC",
            config.scheduler.flight_control,
            move || {
                FlightControl::new(
                    Arc::clone(&state),
                    physics,
                    Arc::clone(&events),
                    engine_summary_rx_fcc.clone(),
                )
            },
        );
    }

    {
        let state = Arc::clone(&state);
        let events = Arc::clone(&events);
        let engine_count = config.engine_count;
        scheduler.spawn(
            "ENG",
            config.scheduler.engine_control,
            move || {
                EngineControl::new(
                    Arc::clone(&state),
                    Arc::clone(&events),
                    engine_summary_tx.clone(),
                    engine_count,
                    seed,
                )
            },
        );
    }

    {
        let state = Arc::clone(&state);
        let events = Arc::clone(&events);
        scheduler.spawn(
            "SAFE",
            config.scheduler.safety_monitor,
            move || {
                SafetyMonitor::new(
                    Arc::clone(&state),
                    Arc::clone(&events),
                    engine_summary_rx_safe.clone(),
                )
            },
        );
    }

    {
        let state = Arc::clone(&state);
        let events = Arc::clone(&events);
        let device = Arc::clone(&telemetry_device);
        scheduler.spawn(
            "TLM",
            config.scheduler.telemetry,
            move || TelemetrySubsystem::new(Arc::clone(&state), Arc::clone(&device), Arc::clone(&events)),
        );
    }

    let command_service = CommandService::new(Arc::clone(&state), Arc::clone(&events));
    let command_port = config.command_port;
    let serving = {
        let svc = Arc::clone(&command_service);
        tokio::spawn(async move {
            if let Err(err) = svc.serve(command_port).await {
                tracing::error!("command service exited: {err}");
            }
        })
    };

    let telemetry_port = config.telemetry_port;
    let telemetry_serving = {
        let device = Arc::clone(&telemetry_device);
        let shutdown = Arc::clone(&shutdown);
        tokio::spawn(async move {
            if let Err(err) = sls_core::telemetry_device::serve(device, telemetry_port, shutdown).await {
                tracing::error!("telemetry device exited: {err}");
            }
        })
    };

    events.info(
        "MAIN",
        &format!("sls-sim listening: commands on {command_port}, telemetry on {telemetry_port}"),
    );

    loop {
        if shutdown.load(Ordering::Acquire) {
            events.critical("MAIN", "fatal shutdown raised by a subsystem restart budget");
            break;
        }
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = tokio::time::sleep(std::time::Duration::from_millis(200)) => {}
        }
    }
    shutdown.store(true, Ordering::Release);
    command_service.request_shutdown();
    let _ = serving.await;
    telemetry_device.close();
    let _ = telemetry_serving.await;

    events.info("MAIN", "sls-sim shut down cleanly");
}
