//! Telemetry Device (§4.C): a fixed-size circular byte buffer exposed as a
//! read-only, multi-reader byte stream with drop-oldest overwrite and
//! strict record alignment — no reader ever observes a partial record that
//! has been clobbered in place.
//!
//! A writer mutex and a reader-head mutex over a buffer "shared immutably
//! otherwise" collapses naturally to one `Mutex<RingState>` in Rust, since
//! the buffer can't actually be mutated through a shared reference while
//! readers copy out of it. What's preserved is the contract, not a literal
//! lock count: writers hold the lock only for a bounded memcpy-and-scan,
//! and readers never block a writer for more than that.

use crate::error::TransportError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::sync::Notify;

fn physical_index(pos: u64, cap: usize) -> usize {
    (pos % cap as u64) as usize
}

#[derive(Debug)]
struct RingState {
    buf: Vec<u8>,
    /// Total bytes ever appended by the writer (monotonic).
    total_written: u64,
    /// Sequence number of the oldest byte still present; always aligned to
    /// the start of a complete record.
    valid_start: u64,
    closed: bool,
}

/// Outcome of a read attempt, mirroring §4.C's EAGAIN/EOF/data contract
/// without overloading `Result<usize, _>` where `0` is ambiguous between
/// "no data yet" and "EOF."
#[derive(Debug, PartialEq, Eq)]
pub enum ReadOutcome {
    Data(usize),
    WouldBlock,
    Eof,
}

#[derive(Debug)]
pub struct TelemetryDevice {
    state: Mutex<RingState>,
    notify: Notify,
}

impl TelemetryDevice {
    pub fn new(capacity_bytes: usize) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(RingState {
                buf: vec![0u8; capacity_bytes],
                total_written: 0,
                valid_start: 0,
                closed: false,
            }),
            notify: Notify::new(),
        })
    }

    /// Append one newline-terminated record (§3 `TelemetryRecord`). Larger
    /// than the ring capacity is rejected rather than silently truncated.
    pub fn write_record(&self, record: &[u8]) -> Result<(), TransportError> {
        debug_assert!(
            record.last() == Some(&b'\n'),
            "telemetry records must be newline-terminated"
        );
        let mut st = self.state.lock().unwrap();
        let cap = st.buf.len();
        if record.len() > cap {
            return Err(TransportError::DeviceUnavailable);
        }
        let start = st.total_written;
        for (i, &b) in record.iter().enumerate() {
            let idx = physical_index(start + i as u64, cap);
            st.buf[idx] = b;
        }
        st.total_written += record.len() as u64;

        let min_valid = st.total_written.saturating_sub(cap as u64);
        if min_valid > st.valid_start {
            let total_written = st.total_written;
            let mut pos = min_valid;
            while pos < total_written && st.buf[physical_index(pos, cap)] != b'\n' {
                pos += 1;
            }
            st.valid_start = (pos + 1).min(total_written);
        }
        drop(st);
        self.notify.notify_waiters();
        Ok(())
    }

    pub fn close(&self) {
        self.state.lock().unwrap().closed = true;
        self.notify.notify_waiters();
    }

    /// Open a reader positioned at the oldest record currently available.
    pub fn open_reader(self: &Arc<Self>) -> Result<TelemetryReader, TransportError> {
        let st = self.state.lock().unwrap();
        if st.closed {
            return Err(TransportError::DeviceUnavailable);
        }
        Ok(TelemetryReader {
            device: Arc::clone(self),
            pos: st.valid_start,
        })
    }

    fn try_read(&self, pos: &mut u64, out: &mut [u8]) -> ReadOutcome {
        let st = self.state.lock().unwrap();
        if *pos < st.valid_start {
            // Reader fell too far behind; the bytes it wanted were
            // clobbered. Jump to the oldest still-available record
            // boundary rather than returning torn data.
            *pos = st.valid_start;
        }
        if *pos >= st.total_written {
            return if st.closed {
                ReadOutcome::Eof
            } else {
                ReadOutcome::WouldBlock
            };
        }
        let cap = st.buf.len();
        let available = (st.total_written - *pos) as usize;
        let start_idx = physical_index(*pos, cap);
        let until_wrap = cap - start_idx;
        let n = available.min(out.len()).min(until_wrap);
        out[..n].copy_from_slice(&st.buf[start_idx..start_idx + n]);
        *pos += n as u64;
        ReadOutcome::Data(n)
    }
}

/// A single reader's cursor into the shared ring. Independent readers each
/// carry their own position; none of them move the others.
pub struct TelemetryReader {
    device: Arc<TelemetryDevice>,
    pos: u64,
}

impl TelemetryReader {
    /// Non-blocking read: returns `WouldBlock` immediately if no new bytes
    /// are available, matching the `EAGAIN` semantics of §4.C.
    pub fn try_read(&mut self, out: &mut [u8]) -> ReadOutcome {
        self.device.try_read(&mut self.pos, out)
    }

    /// Blocking read: suspends until at least one byte is available or the
    /// device is closed.
    pub async fn read(&mut self, out: &mut [u8]) -> ReadOutcome {
        loop {
            match self.device.try_read(&mut self.pos, out) {
                ReadOutcome::WouldBlock => self.device.notify.notified().await,
                other => return other,
            }
        }
    }
}

/// Serve the device's byte stream to any number of concurrent TCP readers
/// (§6: the named `/dev/sls_telemetry` endpoint realized as a well-known
/// TCP port per §9's "Unix socket ... or an in-process publisher with the
/// same contract" allowance). Every accepted connection gets its own
/// `TelemetryReader` cursor and is fed with blocking reads until the peer
/// disconnects or `shutdown` is set.
pub async fn serve(
    device: Arc<TelemetryDevice>,
    port: u16,
    shutdown: Arc<AtomicBool>,
) -> Result<(), TransportError> {
    let listener = TcpListener::bind(("0.0.0.0", port))
        .await
        .map_err(|_| TransportError::DeviceUnavailable)?;

    loop {
        if shutdown.load(Ordering::Acquire) {
            return Ok(());
        }
        tokio::select! {
            accepted = listener.accept() => {
                let Ok((socket, _)) = accepted else { continue };
                let device = Arc::clone(&device);
                let shutdown = Arc::clone(&shutdown);
                tokio::spawn(async move { stream_to_client(device, socket, shutdown).await });
            }
            _ = tokio::time::sleep(std::time::Duration::from_millis(100)) => {}
        }
    }
}

async fn stream_to_client(
    device: Arc<TelemetryDevice>,
    mut socket: tokio::net::TcpStream,
    shutdown: Arc<AtomicBool>,
) {
    let Ok(mut reader) = device.open_reader() else {
        return;
    };
    let mut buf = [0u8; 4096];
    loop {
        if shutdown.load(Ordering::Acquire) {
            return;
        }
        match reader.read(&mut buf).await {
            ReadOutcome::Data(n) => {
                if socket.write_all(&buf[..n]).await.is_err() {
                    return;
                }
            }
            ReadOutcome::Eof => return,
            ReadOutcome::WouldBlock => unreachable!("blocking read never returns WouldBlock"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(s: &str) -> Vec<u8> {
        let mut v = s.as_bytes().to_vec();
        v.push(b'\n');
        v
    }

    #[test]
    fn reader_sees_own_writes_in_order() {
        let dev = TelemetryDevice::new(4096);
        let mut r = dev.open_reader().unwrap();
        dev.write_record(&record("a=1")).unwrap();
        dev.write_record(&record("a=2")).unwrap();
        let mut buf = [0u8; 64];
        let mut collected = Vec::new();
        loop {
            match r.try_read(&mut buf) {
                ReadOutcome::Data(n) => collected.extend_from_slice(&buf[..n]),
                _ => break,
            }
        }
        assert_eq!(collected, b"a=1\na=2\n");
    }

    #[test]
    fn empty_ring_returns_would_block() {
        let dev = TelemetryDevice::new(4096);
        let mut r = dev.open_reader().unwrap();
        let mut buf = [0u8; 16];
        assert_eq!(r.try_read(&mut buf), ReadOutcome::WouldBlock);
    }

    #[test]
    fn closed_empty_ring_returns_eof() {
        let dev = TelemetryDevice::new(4096);
        let mut r = dev.open_reader().unwrap();
        dev.close();
        let mut buf = [0u8; 16];
        assert_eq!(r.try_read(&mut buf), ReadOutcome::Eof);
    }

    #[test]
    fn overwrite_preserves_record_alignment_and_drops_oldest() {
        // A small ring that can hold only a few records at once.
        let dev = TelemetryDevice::new(32);
        let mut r = dev.open_reader().unwrap();
        for i in 0..20 {
            dev.write_record(&record(&format!("n={:02}", i))).unwrap();
        }
        let mut buf = [0u8; 256];
        let mut collected = Vec::new();
        loop {
            match r.try_read(&mut buf) {
                ReadOutcome::Data(n) => collected.extend_from_slice(&buf[..n]),
                _ => break,
            }
        }
        let text = String::from_utf8(collected).unwrap();
        for line in text.lines() {
            assert!(line.starts_with("n="), "record split or corrupted: {line:?}");
        }
        // The last record must always have survived.
        assert!(text.contains("n=19"));
    }

    #[test]
    fn late_reader_opens_at_current_tail_not_from_zero() {
        let dev = TelemetryDevice::new(64);
        for i in 0..5000 {
            dev.write_record(&record(&format!("r{i}"))).unwrap();
        }
        let mut r = dev.open_reader().unwrap();
        let mut buf = [0u8; 8];
        // Whatever is read first must be a complete, still-valid record,
        // not R0 (long since overwritten in a 64-byte ring).
        let mut got = Vec::new();
        loop {
            match r.try_read(&mut buf) {
                ReadOutcome::Data(n) => got.extend_from_slice(&buf[..n]),
                _ => break,
            }
        }
        let text = String::from_utf8(got).unwrap();
        for line in text.lines() {
            assert!(line.starts_with('r'));
        }
    }
}
