use std::io;
use thiserror::Error;
use ydlidar_data::ConnectionState;

/// Coarse classification of [`YDLidarError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Opening, reading or writing the transport failed.
    Io,
    /// The device sent something the protocol does not allow.
    Protocol,
    /// Nothing arrived before the deadline.
    Timeout,
    /// The driver is not in a state that allows the call.
    Precondition,
    /// The link was lost for good while scanning.
    TerminalDisconnect,
}

#[derive(Debug, Error)]
pub enum YDLidarError {
    #[error("Response header must be always seven bytes. Actually {0} bytes.")]
    InvalidHeaderLength(usize),
    #[error("Header sign must start with 0xA5 0x5A. Observed = {0}.")]
    InvalidMagicNumber(String),
    #[error("Expected response length of {0} bytes but found {1} bytes.")]
    InvalidResponseLength(usize, usize),
    #[error("Expected type code {0} but obtained {1}.")]
    InvalidTypeCode(usize, usize),
    #[error("Malformed package: {0}")]
    InvalidPackage(String),
    // Last two bit are reserved bits, which should be ignored.
    #[error("Device health error. Error code = {0:#010b}. See the development manual for details.")]
    DeviceHealthError(usize),
    #[error("Checksum mismatched. Calculated = {1:04X}, expected = {0:04X}.")]
    ChecksumMismatch(u16, u16),
    #[error("Operation timed out")]
    TimeoutError,
    #[error("Timed out waiting for {requested} bytes, {available} available")]
    DataTimeout { requested: usize, available: usize },
    #[error("Serial port is not open")]
    PortClosed,
    #[error("Short write: {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },
    #[error("Driver is {actual:?}, expected {expected:?}")]
    InvalidState {
        expected: ConnectionState,
        actual: ConnectionState,
    },
    #[error("Driver is not scanning")]
    NotScanning,
    #[error("Device mismatch: {0}")]
    DeviceMismatch(String),
    #[error("Connection lost and could not be restored")]
    TerminalDisconnect,
    #[error(transparent)]
    SerialError(#[from] serialport::Error),
    #[error(transparent)]
    IoError(#[from] io::Error),
}

impl YDLidarError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            YDLidarError::InvalidHeaderLength(_)
            | YDLidarError::InvalidMagicNumber(_)
            | YDLidarError::InvalidResponseLength(_, _)
            | YDLidarError::InvalidTypeCode(_, _)
            | YDLidarError::InvalidPackage(_)
            | YDLidarError::DeviceHealthError(_)
            | YDLidarError::ChecksumMismatch(_, _) => ErrorKind::Protocol,
            YDLidarError::TimeoutError | YDLidarError::DataTimeout { .. } => ErrorKind::Timeout,
            YDLidarError::InvalidState { .. }
            | YDLidarError::NotScanning
            | YDLidarError::DeviceMismatch(_) => ErrorKind::Precondition,
            YDLidarError::TerminalDisconnect => ErrorKind::TerminalDisconnect,
            YDLidarError::PortClosed
            | YDLidarError::ShortWrite { .. }
            | YDLidarError::SerialError(_)
            | YDLidarError::IoError(_) => ErrorKind::Io,
        }
    }

    /// Errors that mean the transport itself is gone.
    pub(crate) fn is_transport_failure(&self) -> bool {
        self.kind() == ErrorKind::Io
    }
}

pub type Result<T> = std::result::Result<T, YDLidarError>;
