use crate::constants::READ_SLICE_MS;
use crate::error::{Result, YDLidarError};
use crate::transport::{byte_time_for, Transport};
use log::{debug, trace};
use serialport::SerialPort;
use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

/// [`Transport`] over a serial port.
pub struct SerialTransport {
    port: Option<Box<dyn SerialPort>>,
    baud_rate: u32,
    read_timeout: Duration,
}

impl SerialTransport {
    pub fn new() -> SerialTransport {
        SerialTransport {
            port: None,
            baud_rate: 0,
            read_timeout: Duration::from_millis(READ_SLICE_MS),
        }
    }

    /// Wraps a port that is already open.
    pub fn from_port(port: Box<dyn SerialPort>) -> SerialTransport {
        let baud_rate = port.baud_rate().unwrap_or(0);
        let read_timeout = port.timeout();
        SerialTransport {
            port: Some(port),
            baud_rate,
            read_timeout,
        }
    }

    fn port(&mut self) -> Result<&mut Box<dyn SerialPort>> {
        self.port.as_mut().ok_or(YDLidarError::PortClosed)
    }
}

impl Default for SerialTransport {
    fn default() -> Self {
        SerialTransport::new()
    }
}

impl Transport for SerialTransport {
    fn open(&mut self, port_name: &str, baud_rate: u32) -> Result<()> {
        self.close();
        let port = serialport::new(port_name, baud_rate)
            .timeout(Duration::from_millis(READ_SLICE_MS))
            .open()?;
        debug!("Opened {} at {} baud", port_name, baud_rate);
        self.port = Some(port);
        self.baud_rate = baud_rate;
        self.read_timeout = Duration::from_millis(READ_SLICE_MS);
        Ok(())
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            debug!("Closed serial port");
        }
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        let port = self.port()?;
        let written = port.write(data)?;
        port.flush()?;
        Ok(written)
    }

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if timeout != self.read_timeout {
            self.port()?.set_timeout(timeout)?;
            self.read_timeout = timeout;
        }
        match self.port()?.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(YDLidarError::IoError(e)),
        }
    }

    fn bytes_to_read(&mut self) -> Result<usize> {
        let n_u32: u32 = self.port()?.bytes_to_read()?;
        Ok(n_u32.try_into().unwrap_or(0))
    }

    fn flush_input(&mut self) -> Result<()> {
        let port = self.port()?;
        let n_read = port.bytes_to_read()? as usize;
        if n_read == 0 {
            return Ok(());
        }
        trace!("Flushing {} bytes", n_read);
        let mut packet: Vec<u8> = vec![0; n_read];
        match port.read(packet.as_mut_slice()) {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == ErrorKind::TimedOut => Ok(()),
            Err(e) => Err(YDLidarError::IoError(e)),
        }
    }

    fn set_dtr(&mut self, level: bool) -> Result<()> {
        self.port()?.write_data_terminal_ready(level)?;
        Ok(())
    }

    fn byte_time(&self) -> Duration {
        byte_time_for(self.baud_rate)
    }
}
