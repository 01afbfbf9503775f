//! Command Service (§4.D): a named synchronous request/reply endpoint
//! (`sls_fcc`, §6) over TCP, with the exact little-endian packed wire frames
//! `{type: i32, value: i32}` → `{ok: i32, mission_go: i32, throttle: i32}`.
//!
//! One receiver task owns the endpoint's mutable state and processes
//! commands strictly one at a time: every TCP connection handler forwards
//! its decoded command to that single task over an mpsc channel and awaits
//! a oneshot reply, so replies complete before the next command is taken
//! off the channel regardless of how many clients are connected, over the
//! exact packed binary frames above rather than a JSON command surface.

use crate::error::TransportError;
use crate::event_sink::EventSink;
use crate::vehicle_state::VehicleState;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};

pub const REQUEST_FRAME_BYTES: usize = 8;
pub const REPLY_FRAME_BYTES: usize = 12;

const TYPE_STATUS: i32 = 1;
const TYPE_GO: i32 = 2;
const TYPE_NOGO: i32 = 3;
const TYPE_ABORT: i32 = 4;
const TYPE_THROTTLE: i32 = 5;
const TYPE_PULSE: i32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorCommand {
    Status,
    Go,
    NoGo,
    Abort,
    Throttle(u8),
    /// Reserved scheduler-tick pulse, multiplexed on the same endpoint.
    /// Never produces a reply.
    Pulse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandReply {
    pub ok: bool,
    pub mission_go: bool,
    pub throttle: u8,
}

impl OperatorCommand {
    pub fn decode(frame: [u8; REQUEST_FRAME_BYTES]) -> Result<Self, TransportError> {
        let ty = i32::from_le_bytes(frame[0..4].try_into().unwrap());
        let value = i32::from_le_bytes(frame[4..8].try_into().unwrap());
        match ty {
            TYPE_STATUS => Ok(OperatorCommand::Status),
            TYPE_GO => Ok(OperatorCommand::Go),
            TYPE_NOGO => Ok(OperatorCommand::NoGo),
            TYPE_ABORT => Ok(OperatorCommand::Abort),
            TYPE_THROTTLE => Ok(OperatorCommand::Throttle(value.clamp(0, 255) as u8)),
            TYPE_PULSE => Ok(OperatorCommand::Pulse),
            _ => Err(TransportError::CommandFailed),
        }
    }

    pub fn encode(self) -> [u8; REQUEST_FRAME_BYTES] {
        let (ty, value) = match self {
            OperatorCommand::Status => (TYPE_STATUS, 0),
            OperatorCommand::Go => (TYPE_GO, 0),
            OperatorCommand::NoGo => (TYPE_NOGO, 0),
            OperatorCommand::Abort => (TYPE_ABORT, 0),
            OperatorCommand::Throttle(v) => (TYPE_THROTTLE, v as i32),
            OperatorCommand::Pulse => (TYPE_PULSE, 0),
        };
        let mut frame = [0u8; REQUEST_FRAME_BYTES];
        frame[0..4].copy_from_slice(&ty.to_le_bytes());
        frame[4..8].copy_from_slice(&value.to_le_bytes());
        frame
    }
}

impl CommandReply {
    pub fn encode(self) -> [u8; REPLY_FRAME_BYTES] {
        let mut frame = [0u8; REPLY_FRAME_BYTES];
        frame[0..4].copy_from_slice(&(self.ok as i32).to_le_bytes());
        frame[4..8].copy_from_slice(&(self.mission_go as i32).to_le_bytes());
        frame[8..12].copy_from_slice(&(self.throttle as i32).to_le_bytes());
        frame
    }

    pub fn decode(frame: [u8; REPLY_FRAME_BYTES]) -> Self {
        let ok = i32::from_le_bytes(frame[0..4].try_into().unwrap()) != 0;
        let mission_go = i32::from_le_bytes(frame[4..8].try_into().unwrap()) != 0;
        let throttle = i32::from_le_bytes(frame[8..12].try_into().unwrap()).clamp(0, 100) as u8;
        Self {
            ok,
            mission_go,
            throttle,
        }
    }
}

/// Applies one command's mutation to `VehicleState` per the semantics
/// table in §4.D and returns the reply that reflects the post-mutation
/// state. `Pulse` is handled by the caller before reaching here (it never
/// produces a reply).
fn apply(state: &VehicleState, command: OperatorCommand) -> CommandReply {
    match command {
        OperatorCommand::Status => {}
        OperatorCommand::Go => {
            state.set_mission_go(true);
            state.set_abort_requested(false);
        }
        OperatorCommand::NoGo => {
            state.set_mission_go(false);
        }
        OperatorCommand::Abort => {
            state.set_abort_requested(true);
            state.set_mission_go(false);
        }
        OperatorCommand::Throttle(v) => {
            state.set_throttle(v);
        }
        OperatorCommand::Pulse => {}
    }
    CommandReply {
        ok: true,
        mission_go: state.mission_go(),
        throttle: state.throttle(),
    }
}

struct PendingRequest {
    command: OperatorCommand,
    reply_tx: oneshot::Sender<CommandReply>,
}

/// The request/reply endpoint. `serve` owns the single processing task and
/// the TCP accept loop; `client_send` is the standalone client helper used
/// by the operator console and tests.
pub struct CommandService {
    state: Arc<VehicleState>,
    events: Arc<EventSink>,
    shutdown: AtomicBool,
}

impl CommandService {
    pub fn new(state: Arc<VehicleState>, events: Arc<EventSink>) -> Arc<Self> {
        Arc::new(Self {
            state,
            events,
            shutdown: AtomicBool::new(false),
        })
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Bind the listener and run the accept loop plus the single serializing
    /// processor task until shutdown is requested.
    pub async fn serve(self: Arc<Self>, port: u16) -> Result<(), TransportError> {
        let listener = TcpListener::bind(("0.0.0.0", port))
            .await
            .map_err(|_| TransportError::DeviceUnavailable)?;
        let (tx, mut rx) = mpsc::channel::<PendingRequest>(64);

        let processor = {
            let svc = Arc::clone(&self);
            tokio::spawn(async move {
                while let Some(req) = rx.recv().await {
                    if svc.is_shutdown() {
                        // Reply receiver is dropped; the client maps that
                        // to CommandFailed/Shutdown per §7.
                        continue;
                    }
                    let reply = apply(&svc.state, req.command);
                    let _ = req.reply_tx.send(reply);
                }
            })
        };

        loop {
            if self.is_shutdown() {
                break;
            }
            tokio::select! {
                accepted = listener.accept() => {
                    let Ok((socket, _)) = accepted else { continue };
                    let tx = tx.clone();
                    let svc = Arc::clone(&self);
                    tokio::spawn(async move { svc.handle_connection(socket, tx).await });
                }
                _ = tokio::time::sleep(std::time::Duration::from_millis(100)) => {}
            }
        }
        drop(tx);
        processor.abort();
        Ok(())
    }

    async fn handle_connection(&self, mut socket: TcpStream, tx: mpsc::Sender<PendingRequest>) {
        let mut frame = [0u8; REQUEST_FRAME_BYTES];
        loop {
            if self.is_shutdown() {
                return;
            }
            match socket.read_exact(&mut frame).await {
                Ok(_) => {}
                Err(_) => return,
            }
            let command = match OperatorCommand::decode(frame) {
                Ok(c) => c,
                Err(_) => continue,
            };
            if command == OperatorCommand::Pulse {
                continue;
            }
            let (reply_tx, reply_rx) = oneshot::channel();
            if tx
                .send(PendingRequest { command, reply_tx })
                .await
                .is_err()
            {
                return;
            }
            match reply_rx.await {
                Ok(reply) => {
                    if socket.write_all(&reply.encode()).await.is_err() {
                        return;
                    }
                }
                Err(_) => {
                    self.events.warn("FCC", "command dropped during shutdown");
                    return;
                }
            }
        }
    }
}

/// Client helper (§4.D): connect, send one command, receive the reply,
/// disconnect. Used by the operator console and integration tests.
pub async fn client_send(
    host: &str,
    port: u16,
    command: OperatorCommand,
) -> Result<CommandReply, TransportError> {
    let mut stream = TcpStream::connect((host, port))
        .await
        .map_err(|_| TransportError::CommandFailed)?;
    stream
        .write_all(&command.encode())
        .await
        .map_err(|_| TransportError::CommandFailed)?;
    let mut reply_frame = [0u8; REPLY_FRAME_BYTES];
    stream
        .read_exact(&mut reply_frame)
        .await
        .map_err(|_| TransportError::CommandFailed)?;
    Ok(CommandReply::decode(reply_frame))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttle_value_clamps_on_decode_and_encode() {
        let cmd = OperatorCommand::decode([5, 0, 0, 0, 250, 0, 0, 0]).unwrap();
        assert_eq!(cmd, OperatorCommand::Throttle(250u8.min(255)));
    }

    #[test]
    fn apply_go_clears_abort_and_sets_mission_go() {
        let state = VehicleState::new(120_000.0, 400_000.0);
        state.set_abort_requested(true);
        let reply = apply(&state, OperatorCommand::Go);
        assert!(reply.mission_go);
        assert!(!state.abort_requested());
    }

    #[test]
    fn apply_nogo_leaves_abort_requested_untouched() {
        let state = VehicleState::new(120_000.0, 400_000.0);
        state.set_abort_requested(true);
        let reply = apply(&state, OperatorCommand::NoGo);
        assert!(!reply.mission_go);
        assert!(state.abort_requested());
    }

    #[test]
    fn apply_abort_is_idempotent() {
        let state = VehicleState::new(120_000.0, 400_000.0);
        apply(&state, OperatorCommand::Abort);
        apply(&state, OperatorCommand::Abort);
        assert!(state.abort_requested());
        assert!(!state.mission_go());
    }

    #[test]
    fn apply_throttle_clamps_in_service_not_just_state() {
        let state = VehicleState::new(120_000.0, 400_000.0);
        let reply = apply(&state, OperatorCommand::Throttle(100));
        assert_eq!(reply.throttle, 100);
    }

    #[test]
    fn reply_wire_round_trip() {
        let reply = CommandReply {
            ok: true,
            mission_go: false,
            throttle: 42,
        };
        let decoded = CommandReply::decode(reply.encode());
        assert_eq!(decoded, reply);
    }
}
