use crate::constants::{
    HEADER_SIZE, LIDAR_ANS_SYNC_BYTE1, LIDAR_ANS_SYNC_BYTE2, LIDAR_CMDFLAG_HAS_PAYLOAD,
    LIDAR_CMD_FORCE_STOP, LIDAR_CMD_STOP, LIDAR_CMD_SYNC_BYTE, READ_SLICE_MS,
};
use crate::error::{Result, YDLidarError};
use crate::numeric::to_string;
use crate::response::ResponseHeader;
use crate::time::sleep_ms;
use crate::transport::Transport;
use log::trace;
use std::time::{Duration, Instant};

/// Serializes one request.
///
/// Without payload a frame is `A5 <cmd>`. With payload the command gets the
/// payload flag and the frame continues with a length byte, the payload and
/// the XOR of every byte before it.
pub(crate) fn command_frame(command: u8, payload: &[u8]) -> Result<Vec<u8>> {
    if payload.is_empty() {
        return Ok(vec![LIDAR_CMD_SYNC_BYTE, command]);
    }
    let size = u8::try_from(payload.len()).map_err(|_| {
        YDLidarError::InvalidPackage(format!("payload of {} bytes", payload.len()))
    })?;
    let mut frame = Vec::with_capacity(payload.len() + 4);
    frame.push(LIDAR_CMD_SYNC_BYTE);
    frame.push(command | LIDAR_CMDFLAG_HAS_PAYLOAD);
    frame.push(size);
    frame.extend_from_slice(payload);
    let checksum = frame.iter().fold(0u8, |acc, b| acc ^ b);
    frame.push(checksum);
    Ok(frame)
}

/// Writes one request frame. A short write is an error; it is not retried.
pub(crate) fn send_command(
    transport: &mut dyn Transport,
    command: u8,
    payload: &[u8],
) -> Result<()> {
    if !transport.is_open() {
        return Err(YDLidarError::PortClosed);
    }
    let frame = command_frame(command, payload)?;
    trace!("-> {}", to_string(&frame));
    let written = transport.write(&frame)?;
    if written != frame.len() {
        return Err(YDLidarError::ShortWrite {
            written,
            expected: frame.len(),
        });
    }
    Ok(())
}

pub(crate) fn stop_scan(transport: &mut dyn Transport) -> Result<()> {
    send_command(transport, LIDAR_CMD_FORCE_STOP, &[])?;
    send_command(transport, LIDAR_CMD_STOP, &[])?;
    Ok(())
}

pub(crate) fn stop_scan_and_flush(transport: &mut dyn Transport) -> Result<()> {
    stop_scan(transport)?;
    sleep_ms(READ_SLICE_MS);
    transport.flush_input()?;
    Ok(())
}

fn slice_of(deadline: Instant) -> Option<Duration> {
    let remaining = deadline.saturating_duration_since(Instant::now());
    if remaining.is_zero() {
        return None;
    }
    Some(remaining.min(Duration::from_millis(READ_SLICE_MS)))
}

/// Waits for the next reply header, skipping bytes until `A5 5A`.
pub(crate) fn wait_response_header(
    transport: &mut dyn Transport,
    timeout: Duration,
) -> Result<ResponseHeader> {
    wait_response_header_or_cancel(transport, timeout, &|| false)
}

/// Same as [`wait_response_header`], giving up with `TimeoutError` as soon as
/// `cancelled` returns true. It is polled between read slices.
pub(crate) fn wait_response_header_or_cancel(
    transport: &mut dyn Transport,
    timeout: Duration,
    cancelled: &dyn Fn() -> bool,
) -> Result<ResponseHeader> {
    let deadline = Instant::now() + timeout;
    let mut header = Vec::with_capacity(HEADER_SIZE);
    let mut byte = [0u8; 1];
    loop {
        if cancelled() {
            return Err(YDLidarError::TimeoutError);
        }
        let slice = slice_of(deadline).ok_or(YDLidarError::TimeoutError)?;
        if transport.read(&mut byte, slice)? == 0 {
            continue;
        }
        let b = byte[0];
        match header.len() {
            0 => {
                if b == LIDAR_ANS_SYNC_BYTE1 {
                    header.push(b);
                }
            }
            1 => {
                if b == LIDAR_ANS_SYNC_BYTE2 {
                    header.push(b);
                } else if b != LIDAR_ANS_SYNC_BYTE1 {
                    header.clear();
                }
            }
            _ => {
                header.push(b);
                if header.len() == HEADER_SIZE {
                    trace!("<- {}", to_string(&header));
                    return ResponseHeader::parse(&header);
                }
            }
        }
    }
}

/// Blocks until at least `data_count` bytes can be read.
///
/// Returns the number of available bytes, or `DataTimeout` carrying what was
/// available when the deadline passed.
pub(crate) fn wait_for_data(
    transport: &mut dyn Transport,
    data_count: usize,
    timeout: Duration,
) -> Result<usize> {
    let deadline = Instant::now() + timeout;
    loop {
        let available = transport.bytes_to_read()?;
        if available >= data_count {
            return Ok(available);
        }
        if Instant::now() >= deadline {
            return Err(YDLidarError::DataTimeout {
                requested: data_count,
                available,
            });
        }
        sleep_ms(1);
    }
}

/// Reads exactly `size` bytes before the deadline.
pub(crate) fn read_exact(
    transport: &mut dyn Transport,
    size: usize,
    timeout: Duration,
) -> Result<Vec<u8>> {
    let deadline = Instant::now() + timeout;
    let mut data = vec![0u8; size];
    let mut filled = 0;
    while filled < size {
        let slice = slice_of(deadline).ok_or(YDLidarError::DataTimeout {
            requested: size,
            available: filled,
        })?;
        filled += transport.read(&mut data[filled..], slice)?;
    }
    trace!("<- {}", to_string(&data));
    Ok(data)
}

/// Sends a command and returns the body of its answer.
pub(crate) fn query(
    transport: &mut dyn Transport,
    command: u8,
    payload: &[u8],
    answer_type: u8,
    answer_size: usize,
    timeout: Duration,
) -> Result<Vec<u8>> {
    let deadline = Instant::now() + timeout;
    send_command(transport, command, payload)?;
    let header = wait_response_header(transport, timeout)?;
    header.expect(answer_type, Some(answer_size))?;
    wait_for_data(
        transport,
        answer_size,
        deadline.saturating_duration_since(Instant::now()),
    )?;
    read_exact(transport, answer_size, Duration::from_millis(READ_SLICE_MS))
}
