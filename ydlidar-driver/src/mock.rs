//! Scripted in-memory transport for tests.

use crate::constants::{
    LIDAR_CMD_FORCE_SCAN, LIDAR_CMD_FORCE_STOP, LIDAR_CMD_SCAN, LIDAR_CMD_STOP,
    PACKET_HEADER_WORD,
};
use crate::error::{Result, YDLidarError};
use crate::transport::{byte_time_for, Transport};
use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

#[derive(Default)]
struct MockState {
    open: bool,
    baud_rate: u32,
    opens: usize,
    open_failures: usize,
    read_failures: usize,
    write_limit: Option<usize>,
    rx: VecDeque<u8>,
    written: Vec<u8>,
    replies: HashMap<u8, Vec<u8>>,
    stream: Vec<u8>,
    streaming: bool,
    dtr: Vec<bool>,
}

/// Handles are cheap clones sharing one simulated device.
#[derive(Clone, Default)]
pub(crate) struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub(crate) fn new() -> MockTransport {
        MockTransport::default()
    }

    pub(crate) fn opened() -> MockTransport {
        let transport = MockTransport::new();
        transport.lock().open = true;
        transport
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    /// Bytes the device sends next.
    pub(crate) fn push(&self, data: &[u8]) {
        self.lock().rx.extend(data);
    }

    /// Reply queued every time the command byte is received.
    pub(crate) fn set_reply(&self, command: u8, reply: Vec<u8>) {
        self.lock().replies.insert(command, reply);
    }

    /// Bytes repeated for as long as the device is scanning.
    pub(crate) fn set_stream(&self, stream: Vec<u8>) {
        self.lock().stream = stream;
    }

    pub(crate) fn fail_next_opens(&self, count: usize) {
        self.lock().open_failures = count;
    }

    pub(crate) fn fail_next_reads(&self, count: usize) {
        self.lock().read_failures = count;
    }

    pub(crate) fn set_write_limit(&self, limit: Option<usize>) {
        self.lock().write_limit = limit;
    }

    pub(crate) fn written(&self) -> Vec<u8> {
        self.lock().written.clone()
    }

    pub(crate) fn clear_written(&self) {
        self.lock().written.clear();
    }

    pub(crate) fn opens(&self) -> usize {
        self.lock().opens
    }

    pub(crate) fn dtr_history(&self) -> Vec<bool> {
        self.lock().dtr.clone()
    }

    pub(crate) fn is_streaming(&self) -> bool {
        self.lock().streaming
    }
}

impl Transport for MockTransport {
    fn open(&mut self, _port_name: &str, baud_rate: u32) -> Result<()> {
        let mut state = self.lock();
        if state.open_failures > 0 {
            state.open_failures -= 1;
            return Err(io::Error::new(io::ErrorKind::NotFound, "no such device").into());
        }
        state.open = true;
        state.baud_rate = baud_rate;
        state.opens += 1;
        Ok(())
    }

    fn close(&mut self) {
        let mut state = self.lock();
        state.open = false;
        state.streaming = false;
        state.rx.clear();
    }

    fn is_open(&self) -> bool {
        self.lock().open
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        let mut state = self.lock();
        if !state.open {
            return Err(YDLidarError::PortClosed);
        }
        let n = state.write_limit.map_or(data.len(), |l| l.min(data.len()));
        state.written.extend_from_slice(&data[..n]);
        if n == data.len() && data.len() >= 2 {
            let command = data[1];
            if let Some(reply) = state.replies.get(&command).cloned() {
                state.rx.extend(reply);
            }
            match command {
                LIDAR_CMD_SCAN | LIDAR_CMD_FORCE_SCAN => state.streaming = true,
                LIDAR_CMD_STOP | LIDAR_CMD_FORCE_STOP => state.streaming = false,
                _ => (),
            }
        }
        Ok(n)
    }

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let mut state = self.lock();
        if !state.open {
            return Err(YDLidarError::PortClosed);
        }
        if state.read_failures > 0 {
            state.read_failures -= 1;
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged").into());
        }
        if state.rx.is_empty() && state.streaming && !state.stream.is_empty() {
            let stream = state.stream.clone();
            state.rx.extend(stream);
            drop(state);
            // pace the simulated rotation
            std::thread::sleep(Duration::from_millis(2));
            state = self.lock();
        }
        if state.rx.is_empty() {
            drop(state);
            std::thread::sleep(timeout);
            return Ok(0);
        }
        let n = buf.len().min(state.rx.len());
        for (dst, src) in buf.iter_mut().zip(state.rx.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }

    fn bytes_to_read(&mut self) -> Result<usize> {
        Ok(self.lock().rx.len())
    }

    fn flush_input(&mut self) -> Result<()> {
        self.lock().rx.clear();
        Ok(())
    }

    fn set_dtr(&mut self, level: bool) -> Result<()> {
        self.lock().dtr.push(level);
        Ok(())
    }

    fn byte_time(&self) -> Duration {
        byte_time_for(self.lock().baud_rate)
    }
}

/// Reply header followed by `payload`.
pub(crate) fn response(type_code: u8, payload: &[u8]) -> Vec<u8> {
    let size = (payload.len() as u32).to_le_bytes();
    let mut data = vec![0xA5, 0x5A, size[0], size[1], size[2], size[3], type_code];
    data.extend_from_slice(payload);
    data
}

/// Answer to the scan command.
pub(crate) fn scan_response() -> Vec<u8> {
    vec![0xA5, 0x5A, 0x05, 0x00, 0x00, 0x40, 0x81]
}

/// Encodes one sample package. `samples` are (quality, distance word) pairs;
/// qualities are ignored without intensity.
pub(crate) fn package(
    package_type: u8,
    first_q6: u16,
    last_q6: u16,
    samples: &[(u8, u16)],
    intensity: bool,
) -> Vec<u8> {
    let n = samples.len() as u8;
    let first = (first_q6 << 1) | 1;
    let last = (last_q6 << 1) | 1;
    let mut checksum = PACKET_HEADER_WORD ^ first ^ last ^ (u16::from(package_type) | (u16::from(n) << 8));
    let mut data = vec![0xAA, 0x55, package_type, n];
    data.extend_from_slice(&first.to_le_bytes());
    data.extend_from_slice(&last.to_le_bytes());
    data.extend_from_slice(&[0, 0]);
    for (quality, distance) in samples {
        if intensity {
            checksum ^= u16::from(*quality);
            data.push(*quality);
        }
        checksum ^= *distance;
        data.extend_from_slice(&distance.to_le_bytes());
    }
    data[8..10].copy_from_slice(&checksum.to_le_bytes());
    data
}

/// One full revolution: `packages` packages of `samples` samples each, the
/// first one flagged as ring start with a 10 Hz scan frequency.
pub(crate) fn revolution(packages: usize, samples: usize) -> Vec<u8> {
    let total = (packages * samples) as f64;
    let step = 23040. / total;
    let mut data = Vec::new();
    for p in 0..packages {
        let first = (p * samples) as f64 * step;
        let last = first + (samples.saturating_sub(1)) as f64 * step;
        let package_type = if p == 0 { (100 << 1) | 0x01 } else { 0x00 };
        let words: Vec<(u8, u16)> = (0..samples).map(|i| (0, 1000 + 4 * i as u16)).collect();
        data.extend(package(package_type, first as u16, last as u16, &words, false));
    }
    data
}
