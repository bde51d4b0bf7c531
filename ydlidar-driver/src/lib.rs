mod command;
mod constants;
mod driver_threads;
mod error;
#[cfg(test)]
mod mock;
mod numeric;
mod packet;
mod response;
mod scan;
mod serial;
mod time;
mod transport;

use crate::command::{query, send_command, stop_scan, stop_scan_and_flush, wait_response_header};
use crate::constants::{
    LIDAR_ANS_LENGTH_DEVHEALTH, LIDAR_ANS_LENGTH_DEVINFO, LIDAR_ANS_LENGTH_FREQUENCY,
    LIDAR_ANS_LENGTH_HEART_BEAT, LIDAR_ANS_LENGTH_OFFSET_ANGLE, LIDAR_ANS_LENGTH_SAMPLING_RATE,
    LIDAR_ANS_TYPE_DEVHEALTH, LIDAR_ANS_TYPE_DEVINFO, LIDAR_ANS_TYPE_MEASUREMENT,
    LIDAR_CMD_FORCE_SCAN, LIDAR_CMD_GET_AIMSPEED, LIDAR_CMD_GET_DEVICE_HEALTH,
    LIDAR_CMD_GET_DEVICE_INFO, LIDAR_CMD_GET_OFFSET_ANGLE, LIDAR_CMD_GET_SAMPLING_RATE,
    LIDAR_CMD_RESET, LIDAR_CMD_SCAN, LIDAR_CMD_SET_AIMSPEED_ADD, LIDAR_CMD_SET_AIMSPEED_ADDMIC,
    LIDAR_CMD_SET_AIMSPEED_DIS, LIDAR_CMD_SET_AIMSPEED_DISMIC, LIDAR_CMD_SET_HEART_BEAT,
    LIDAR_CMD_SET_SAMPLING_RATE, LIDAR_CMD_STOP,
};
use crate::driver_threads::{lock, spawn, Acquisition, DriverThreads, Shared};
use crate::response::{
    parse_device_health, parse_device_info, parse_heart_beat, parse_offset_angle,
    parse_sampling_rate, parse_scan_frequency,
};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use log::{debug, info, warn};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use ydlidar_data::{
    model_baud_rate, ConnectionState, DeviceHealth, DeviceInfo, DriverConfig, OffsetAngle,
    Sample, SamplingRate, Scan, ScanFrequency, YdlidarModel,
};

pub use crate::driver_threads::DriverStats;
pub use crate::error::{ErrorKind, Result, YDLidarError};
pub use crate::packet::{DecoderConfig, DecoderStats, Package, PacketDecoder};
pub use crate::response::ResponseHeader;
pub use crate::scan::ascend_scan_data;
pub use crate::serial::SerialTransport;
pub use crate::transport::Transport;

/// Lifecycle bookkeeping, only touched by caller threads.
#[derive(Default)]
struct Control {
    threads: Option<DriverThreads>,
    scan_rx: Option<Receiver<Scan>>,
    port_name: String,
    baud_rate: u32,
}

impl Control {
    /// Stops the acquisition thread, if any, and waits for it.
    fn release_scan(&mut self) {
        self.scan_rx = None;
        if let Some(mut threads) = self.threads.take() {
            threads.join();
        }
    }
}

/// Driver of one YDLiDAR device.
///
/// Every method takes `&self`, so one driver can be shared between a control
/// thread and consumer threads. Revolutions are decoded on a background
/// thread started by [`YdlidarDriver::start_scan`].
///
/// ```no_run
/// use std::time::Duration;
/// use ydlidar_data::YdlidarModel;
/// use ydlidar_driver::run_driver;
///
/// let driver = run_driver("/dev/ttyUSB0", YdlidarModel::G4).unwrap();
/// let scan = driver.grab_scan_data(Duration::from_secs(1)).unwrap();
/// println!("{} samples", scan.len());
/// ```
pub struct YdlidarDriver<T: Transport + 'static> {
    shared: Arc<Shared<T>>,
    control: Mutex<Control>,
    config: Mutex<DriverConfig>,
}

impl YdlidarDriver<SerialTransport> {
    /// Driver over a serial port, opened by `connect`.
    pub fn serial(config: DriverConfig) -> YdlidarDriver<SerialTransport> {
        YdlidarDriver::new(SerialTransport::new(), config)
    }
}

impl<T: Transport + 'static> YdlidarDriver<T> {
    pub fn new(transport: T, config: DriverConfig) -> YdlidarDriver<T> {
        YdlidarDriver {
            shared: Arc::new(Shared::new(transport, &config)),
            control: Mutex::new(Control::default()),
            config: Mutex::new(config),
        }
    }

    fn control(&self) -> MutexGuard<'_, Control> {
        lock(&self.control)
    }

    /// Copy of the current settings.
    pub fn config(&self) -> DriverConfig {
        lock(&self.config).clone()
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    pub fn is_scanning(&self) -> bool {
        self.state().is_scanning()
    }

    pub fn stats(&self) -> DriverStats {
        self.shared.stats()
    }

    /// Enables or disables reconnecting after the link is lost while scanning.
    /// Takes effect immediately, also for a running scan.
    pub fn set_auto_reconnect(&self, enable: bool) {
        self.shared.auto_reconnect.store(enable, Ordering::SeqCst);
    }

    /// Sample words with intensity byte. Only allowed while not scanning.
    pub fn set_intensities(&self, enable: bool) -> Result<()> {
        let state = self.state();
        if state.is_scanning() {
            return Err(YDLidarError::InvalidState {
                expected: ConnectionState::Connected,
                actual: state,
            });
        }
        lock(&self.config).intensities = enable;
        Ok(())
    }

    fn expect_state(&self, expected: ConnectionState) -> Result<()> {
        let actual = self.state();
        match actual == expected {
            true => Ok(()),
            false => Err(YDLidarError::InvalidState { expected, actual }),
        }
    }

    fn ensure_connected(&self) -> Result<()> {
        let actual = self.state();
        match actual.is_connected() {
            true => Ok(()),
            false => Err(YDLidarError::InvalidState {
                expected: ConnectionState::Connected,
                actual,
            }),
        }
    }

    /// Opens the transport and stops whatever the device was doing.
    pub fn connect(&self, port_name: &str, baud_rate: u32) -> Result<()> {
        let mut control = self.control();
        self.expect_state(ConnectionState::Disconnected)?;
        {
            let mut transport = self.shared.transport();
            transport.open(port_name, baud_rate)?;
            if let Err(e) = stop_scan_and_flush(&mut *transport) {
                transport.close();
                return Err(e);
            }
        }
        control.port_name = port_name.to_string();
        control.baud_rate = baud_rate;
        self.shared.terminated.store(false, Ordering::SeqCst);
        self.shared.set_state(ConnectionState::Connected);
        info!("Connected to {} at {} baud", port_name, baud_rate);
        Ok(())
    }

    /// Stops scanning and releases the transport. Allowed in any state.
    pub fn disconnect(&self) {
        let mut control = self.control();
        control.release_scan();
        {
            let mut transport = self.shared.transport();
            if transport.is_open() {
                if let Err(e) = stop_scan(&mut *transport) {
                    warn!("Failed to stop the scan: {}", e);
                }
                if self.shared.motor_dtr.load(Ordering::SeqCst) {
                    if let Err(e) = transport.set_dtr(false) {
                        warn!("Failed to stop the motor: {}", e);
                    }
                }
                transport.close();
            }
        }
        self.shared.terminated.store(false, Ordering::SeqCst);
        if self.state() != ConnectionState::Disconnected {
            info!("Disconnected from {}", control.port_name);
        }
        self.shared.set_state(ConnectionState::Disconnected);
    }

    /// Starts the motor and the sample stream.
    ///
    /// Unless `force` is set, the device must first answer a health and a
    /// device info request (devices that only stream are exempt); otherwise
    /// the call fails with `DeviceMismatch`. A device reporting an error
    /// status fails with `DeviceHealthError`.
    pub fn start_scan(&self, force: bool, timeout: Duration) -> Result<()> {
        let mut control = self.control();
        let state = self.state();
        if state.is_scanning() {
            return Ok(());
        }
        self.expect_state(ConnectionState::Connected)?;

        let config = self.config();
        if !force && !config.single_channel {
            self.identify_device(timeout)?;
        }

        let scan_command = match force {
            true => LIDAR_CMD_FORCE_SCAN,
            false => LIDAR_CMD_SCAN,
        };
        {
            let mut transport = self.shared.transport();
            if self.shared.motor_dtr.load(Ordering::SeqCst) {
                transport.set_dtr(true)?;
            }
            transport.flush_input()?;
            send_command(&mut *transport, scan_command, &[])?;
            let started = wait_response_header(&mut *transport, timeout)
                .and_then(|header| header.expect(LIDAR_ANS_TYPE_MEASUREMENT, None));
            if let Err(e) = started {
                if let Err(e) = stop_scan(&mut *transport) {
                    warn!("Failed to stop the scan: {}", e);
                }
                return Err(e);
            }
        }

        let (threads, scan_rx) = spawn(Acquisition {
            shared: self.shared.clone(),
            config,
            port_name: control.port_name.clone(),
            baud_rate: control.baud_rate,
            scan_command,
        });
        control.threads = Some(threads);
        control.scan_rx = Some(scan_rx);
        self.shared.terminated.store(false, Ordering::SeqCst);
        self.shared.set_state(ConnectionState::Scanning);
        Ok(())
    }

    /// Checks that a supported device answers, and learns how its motor is
    /// driven.
    fn identify_device(&self, timeout: Duration) -> Result<()> {
        let mismatch = |e: YDLidarError| YDLidarError::DeviceMismatch(e.to_string());
        let health = self.get_health(timeout).map_err(mismatch)?;
        if health.is_error() {
            return Err(YDLidarError::DeviceHealthError(health.status.into()));
        }
        let info = self.get_device_info(timeout).map_err(mismatch)?;
        match YdlidarModel::from_model_number(info.model_number) {
            Some(model) => {
                debug!("Found {:?}, serial number {}", model, info.serial_string());
                self.shared
                    .motor_dtr
                    .store(model.supports_motor_dtr(), Ordering::SeqCst);
            }
            None => warn!("Unknown model number {}", info.model_number),
        }
        Ok(())
    }

    /// Stops the acquisition thread, the sample stream and the motor.
    pub fn stop(&self) -> Result<()> {
        let mut control = self.control();
        control.release_scan();
        if self.state() == ConnectionState::Disconnected {
            return Ok(());
        }

        let mut transport = self.shared.transport();
        if !transport.is_open() {
            // the link was lost while reconnecting
            self.shared.set_state(ConnectionState::Disconnected);
            return Ok(());
        }
        self.shared.set_state(ConnectionState::Connected);
        stop_scan_and_flush(&mut *transport)?;
        if self.shared.motor_dtr.load(Ordering::SeqCst) {
            transport.set_dtr(false)?;
        }
        Ok(())
    }

    /// Reboots the device. Returns whether it answered before `timeout`.
    pub fn reset(&self, timeout: Duration) -> Result<bool> {
        let _control = self.control();
        self.expect_state(ConnectionState::Connected)?;
        let mut transport = self.shared.transport();
        send_command(&mut *transport, LIDAR_CMD_RESET, &[])?;
        let acknowledged = match wait_response_header(&mut *transport, timeout) {
            Ok(_) => true,
            Err(YDLidarError::TimeoutError) => false,
            Err(e) => return Err(e),
        };
        transport.flush_input()?;
        Ok(acknowledged)
    }

    pub fn start_motor(&self) -> Result<()> {
        self.ensure_connected()?;
        match self.shared.motor_dtr.load(Ordering::SeqCst) {
            true => self.shared.transport().set_dtr(true),
            // the motor follows the scan command
            false => Ok(()),
        }
    }

    pub fn stop_motor(&self) -> Result<()> {
        self.ensure_connected()?;
        let mut transport = self.shared.transport();
        match self.shared.motor_dtr.load(Ordering::SeqCst) {
            true => transport.set_dtr(false),
            false => send_command(&mut *transport, LIDAR_CMD_STOP, &[]),
        }
    }

    fn next_scan(&self, timeout: Duration) -> Result<Scan> {
        let scan_rx = {
            let mut control = self.control();
            if control.scan_rx.is_some() && self.shared.terminated.load(Ordering::SeqCst) {
                control.release_scan();
                return Err(YDLidarError::TerminalDisconnect);
            }
            control.scan_rx.clone().ok_or(YDLidarError::NotScanning)?
        };
        match scan_rx.recv_timeout(timeout) {
            Ok(scan) => Ok(scan),
            Err(RecvTimeoutError::Timeout) => Err(YDLidarError::TimeoutError),
            Err(RecvTimeoutError::Disconnected) => {
                let mut control = self.control();
                match control.scan_rx.is_some() && self.shared.terminated.load(Ordering::SeqCst)
                {
                    true => {
                        control.release_scan();
                        Err(YDLidarError::TerminalDisconnect)
                    }
                    false => Err(YDLidarError::NotScanning),
                }
            }
        }
    }

    /// Waits for the next revolution.
    ///
    /// Fails with `NotScanning` when no scan runs, `TimeoutError` when no
    /// revolution completes in time and `TerminalDisconnect` once when the
    /// link was lost for good.
    pub fn grab_scan_data(&self, timeout: Duration) -> Result<Scan> {
        self.next_scan(timeout)
    }

    /// Like [`YdlidarDriver::grab_scan_data`], copying the samples into
    /// `buffer`. Returns the sample count.
    pub fn wait_scan_data(&self, buffer: &mut Vec<Sample>, timeout: Duration) -> Result<usize> {
        let scan = self.next_scan(timeout)?;
        buffer.clear();
        buffer.extend_from_slice(&scan.samples);
        Ok(buffer.len())
    }

    fn query(
        &self,
        command: u8,
        payload: &[u8],
        answer_type: u8,
        answer_size: usize,
        timeout: Duration,
    ) -> Result<Vec<u8>> {
        self.ensure_connected()?;
        let mut transport = self.shared.transport();
        query(
            &mut *transport,
            command,
            payload,
            answer_type,
            answer_size,
            timeout,
        )
    }

    pub fn get_device_info(&self, timeout: Duration) -> Result<DeviceInfo> {
        let body = self.query(
            LIDAR_CMD_GET_DEVICE_INFO,
            &[],
            LIDAR_ANS_TYPE_DEVINFO,
            LIDAR_ANS_LENGTH_DEVINFO,
            timeout,
        )?;
        parse_device_info(&body)
    }

    pub fn get_health(&self, timeout: Duration) -> Result<DeviceHealth> {
        let body = self.query(
            LIDAR_CMD_GET_DEVICE_HEALTH,
            &[],
            LIDAR_ANS_TYPE_DEVHEALTH,
            LIDAR_ANS_LENGTH_DEVHEALTH,
            timeout,
        )?;
        parse_device_health(&body)
    }

    fn scan_frequency_command(&self, command: u8, timeout: Duration) -> Result<ScanFrequency> {
        let body = self.query(
            command,
            &[],
            LIDAR_ANS_TYPE_DEVINFO,
            LIDAR_ANS_LENGTH_FREQUENCY,
            timeout,
        )?;
        parse_scan_frequency(&body)
    }

    pub fn get_scan_frequency(&self, timeout: Duration) -> Result<ScanFrequency> {
        self.scan_frequency_command(LIDAR_CMD_GET_AIMSPEED, timeout)
    }

    /// Raises the target scan frequency by 1 Hz. Returns the new frequency.
    pub fn set_scan_frequency_add(&self, timeout: Duration) -> Result<ScanFrequency> {
        self.scan_frequency_command(LIDAR_CMD_SET_AIMSPEED_ADD, timeout)
    }

    /// Lowers the target scan frequency by 1 Hz.
    pub fn set_scan_frequency_dis(&self, timeout: Duration) -> Result<ScanFrequency> {
        self.scan_frequency_command(LIDAR_CMD_SET_AIMSPEED_DIS, timeout)
    }

    /// Raises the target scan frequency by 0.1 Hz.
    pub fn set_scan_frequency_add_mic(&self, timeout: Duration) -> Result<ScanFrequency> {
        self.scan_frequency_command(LIDAR_CMD_SET_AIMSPEED_ADDMIC, timeout)
    }

    /// Lowers the target scan frequency by 0.1 Hz.
    pub fn set_scan_frequency_dis_mic(&self, timeout: Duration) -> Result<ScanFrequency> {
        self.scan_frequency_command(LIDAR_CMD_SET_AIMSPEED_DISMIC, timeout)
    }

    pub fn get_sampling_rate(&self, timeout: Duration) -> Result<SamplingRate> {
        let body = self.query(
            LIDAR_CMD_GET_SAMPLING_RATE,
            &[],
            LIDAR_ANS_TYPE_DEVINFO,
            LIDAR_ANS_LENGTH_SAMPLING_RATE,
            timeout,
        )?;
        parse_sampling_rate(&body)
    }

    /// Switches the device to its next sampling rate and returns it.
    pub fn set_sampling_rate(&self, timeout: Duration) -> Result<SamplingRate> {
        let body = self.query(
            LIDAR_CMD_SET_SAMPLING_RATE,
            &[],
            LIDAR_ANS_TYPE_DEVINFO,
            LIDAR_ANS_LENGTH_SAMPLING_RATE,
            timeout,
        )?;
        parse_sampling_rate(&body)
    }

    pub fn get_zero_offset_angle(&self, timeout: Duration) -> Result<OffsetAngle> {
        let body = self.query(
            LIDAR_CMD_GET_OFFSET_ANGLE,
            &[],
            LIDAR_ANS_TYPE_DEVINFO,
            LIDAR_ANS_LENGTH_OFFSET_ANGLE,
            timeout,
        )?;
        parse_offset_angle(&body)
    }

    /// Turns the device's heartbeat protection on or off. Returns the state
    /// reported back.
    pub fn set_heart_beat(&self, enable: bool, timeout: Duration) -> Result<bool> {
        let body = self.query(
            LIDAR_CMD_SET_HEART_BEAT,
            &[u8::from(enable)],
            LIDAR_ANS_TYPE_DEVINFO,
            LIDAR_ANS_LENGTH_HEART_BEAT,
            timeout,
        )?;
        parse_heart_beat(&body)
    }
}

impl<T: Transport + 'static> Drop for YdlidarDriver<T> {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Function to launch YDLiDAR.
/// # Arguments
///
/// * `port_name` - Serial port name such as `/dev/ttyUSB0`.
/// * `model` - Model
pub fn run_driver(
    port_name: &str,
    model: YdlidarModel,
) -> Result<YdlidarDriver<SerialTransport>> {
    let config = DriverConfig::for_model(model);
    let timeout = config.timeout;
    let driver = YdlidarDriver::serial(config);
    driver.connect(port_name, model_baud_rate(model))?;
    driver.start_scan(false, timeout)?;
    Ok(driver)
}
