use crate::command::{send_command, wait_response_header_or_cancel};
use crate::constants::{
    LIDAR_ANS_TYPE_MEASUREMENT, LIDAR_CMD_SET_HEART_BEAT, READ_CHUNK_SIZE, READ_SLICE_MS,
};
use crate::error::Result;
use crate::packet::{DecoderConfig, Package, PacketDecoder};
use crate::scan::Revolution;
use crate::time::now_ns;
use crate::transport::Transport;
use crossbeam_channel::{
    bounded, Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError,
};
use crossbeam_utils::atomic::AtomicCell;
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use ydlidar_data::{ConnectionState, DriverConfig, Sample, Scan};

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Counters of the acquisition thread.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DriverStats {
    pub packages: u64,
    pub revolutions: u64,
    pub resyncs: u64,
    pub checksum_errors: u64,
    pub invalid_packages: u64,
    /// Samples beyond the revolution capacity.
    pub dropped_samples: u64,
    /// Revolutions replaced before a consumer took them.
    pub dropped_scans: u64,
    pub timeouts: u64,
    pub reconnects: u64,
}

#[derive(Default)]
struct StatsCounters {
    packages: AtomicU64,
    revolutions: AtomicU64,
    resyncs: AtomicU64,
    checksum_errors: AtomicU64,
    invalid_packages: AtomicU64,
    dropped_samples: AtomicU64,
    dropped_scans: AtomicU64,
    timeouts: AtomicU64,
    reconnects: AtomicU64,
}

/// State shared by the driver handle and its acquisition thread.
pub(crate) struct Shared<T> {
    pub(crate) transport: Mutex<T>,
    state: Mutex<ConnectionState>,
    snapshot: AtomicCell<ConnectionState>,
    pub(crate) auto_reconnect: AtomicBool,
    pub(crate) motor_dtr: AtomicBool,
    /// Set when the acquisition thread gave up on the link.
    pub(crate) terminated: AtomicBool,
    stats: StatsCounters,
}

impl<T: Transport> Shared<T> {
    pub(crate) fn new(transport: T, config: &DriverConfig) -> Shared<T> {
        Shared {
            transport: Mutex::new(transport),
            state: Mutex::new(ConnectionState::Disconnected),
            snapshot: AtomicCell::new(ConnectionState::Disconnected),
            auto_reconnect: AtomicBool::new(config.auto_reconnect),
            motor_dtr: AtomicBool::new(config.motor_dtr),
            terminated: AtomicBool::new(false),
            stats: StatsCounters::default(),
        }
    }

    pub(crate) fn transport(&self) -> MutexGuard<'_, T> {
        lock(&self.transport)
    }

    pub(crate) fn state(&self) -> ConnectionState {
        self.snapshot.load()
    }

    pub(crate) fn set_state(&self, state: ConnectionState) {
        let mut current = lock(&self.state);
        if *current != state {
            debug!("{:?} -> {:?}", *current, state);
        }
        *current = state;
        self.snapshot.store(state);
    }

    pub(crate) fn stats(&self) -> DriverStats {
        let s = &self.stats;
        DriverStats {
            packages: s.packages.load(Ordering::Relaxed),
            revolutions: s.revolutions.load(Ordering::Relaxed),
            resyncs: s.resyncs.load(Ordering::Relaxed),
            checksum_errors: s.checksum_errors.load(Ordering::Relaxed),
            invalid_packages: s.invalid_packages.load(Ordering::Relaxed),
            dropped_samples: s.dropped_samples.load(Ordering::Relaxed),
            dropped_scans: s.dropped_scans.load(Ordering::Relaxed),
            timeouts: s.timeouts.load(Ordering::Relaxed),
            reconnects: s.reconnects.load(Ordering::Relaxed),
        }
    }
}

/// Cancellation signal of the acquisition thread. It fires when the paired
/// sender is dropped.
#[derive(Clone)]
pub(crate) struct StopToken(Receiver<()>);

impl StopToken {
    pub(crate) fn new() -> (Sender<()>, StopToken) {
        let (tx, rx) = bounded(0);
        (tx, StopToken(rx))
    }

    pub(crate) fn is_stopped(&self) -> bool {
        matches!(self.0.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Sleeps for `duration`, returning early with `true` when stopped.
    pub(crate) fn wait(&self, duration: Duration) -> bool {
        matches!(self.0.recv_timeout(duration), Err(RecvTimeoutError::Disconnected))
    }
}

/// Handle of the acquisition thread. Dropping it stops and joins the thread.
pub(crate) struct DriverThreads {
    stop_tx: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl DriverThreads {
    pub(crate) fn join(&mut self) {
        self.stop_tx.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Acquisition thread panicked");
            }
        }
    }
}

impl Drop for DriverThreads {
    fn drop(&mut self) {
        self.join();
    }
}

/// Reads the transport in short slices until the decoder yields a package.
///
/// Returns `Ok(None)` when `timeout` passes, the token is stopped, or more
/// than `max_decode_errors` corrupted packages arrived in a row.
pub(crate) fn wait_package<T: Transport>(
    transport: &Mutex<T>,
    decoder: &mut PacketDecoder,
    timeout: Duration,
    max_decode_errors: usize,
    stop: &StopToken,
) -> Result<Option<Package>> {
    let deadline = Instant::now() + timeout;
    let slice = Duration::from_millis(READ_SLICE_MS);
    let mut buf = [0u8; READ_CHUNK_SIZE];
    let mut stamp = now_ns();
    loop {
        if let Some(package) = decoder.next_package(stamp) {
            return Ok(Some(package));
        }
        if decoder.consecutive_errors() > max_decode_errors {
            return Ok(None);
        }
        if stop.is_stopped() || Instant::now() >= deadline {
            return Ok(None);
        }
        let n = lock(transport).read(&mut buf, slice)?;
        if n > 0 {
            decoder.push(&buf[..n]);
            stamp = now_ns();
        }
    }
}

/// Everything the acquisition thread needs to keep a scan running.
pub(crate) struct Acquisition<T> {
    pub(crate) shared: Arc<Shared<T>>,
    pub(crate) config: DriverConfig,
    pub(crate) port_name: String,
    pub(crate) baud_rate: u32,
    pub(crate) scan_command: u8,
}

/// Starts the acquisition thread. The returned receiver yields the latest
/// complete revolution.
pub(crate) fn spawn<T: Transport + 'static>(
    acquisition: Acquisition<T>,
) -> (DriverThreads, Receiver<Scan>) {
    let (stop_tx, stop) = StopToken::new();
    let (scan_tx, scan_rx) = bounded(1);
    let worker = Worker {
        acquisition,
        stop,
        scan_tx,
        scan_rx: scan_rx.clone(),
    };
    let thread = std::thread::spawn(move || worker.run());
    let threads = DriverThreads {
        stop_tx: Some(stop_tx),
        thread: Some(thread),
    };
    (threads, scan_rx)
}

enum Recovery {
    Resumed,
    Stopped,
    Lost,
}

struct Worker<T> {
    acquisition: Acquisition<T>,
    stop: StopToken,
    scan_tx: Sender<Scan>,
    // kept to evict a revolution nobody took
    scan_rx: Receiver<Scan>,
}

impl<T: Transport> Worker<T> {
    fn run(self) {
        let shared = &self.acquisition.shared;
        let config = &self.acquisition.config;
        let byte_time = shared.transport().byte_time();
        let mut decoder =
            PacketDecoder::new(DecoderConfig::from_driver_config(config, byte_time));
        let mut revolution = Revolution::new(config.max_scan_nodes);
        let mut timeouts = 0;
        let mut last_heart_beat = Instant::now();

        debug!("Acquisition started");
        while !self.stop.is_stopped() {
            let result = match self.heart_beat(&mut last_heart_beat) {
                Err(e) if e.is_transport_failure() => Err(e),
                _ => wait_package(
                    &shared.transport,
                    &mut decoder,
                    config.package_timeout,
                    config.max_decode_errors,
                    &self.stop,
                ),
            };
            let failed = match result {
                Ok(Some(package)) => {
                    timeouts = 0;
                    for sample in package.samples {
                        if let Some(samples) = revolution.push(sample) {
                            self.publish(samples);
                        }
                    }
                    self.record(&decoder, &revolution);
                    false
                }
                Ok(None) if self.stop.is_stopped() => break,
                Ok(None) if decoder.consecutive_errors() > config.max_decode_errors => {
                    self.record(&decoder, &revolution);
                    warn!("{} corrupted packages in a row", decoder.consecutive_errors());
                    true
                }
                Ok(None) => {
                    timeouts += 1;
                    shared.stats.timeouts.fetch_add(1, Ordering::Relaxed);
                    self.record(&decoder, &revolution);
                    warn!("No package within {:?}", config.package_timeout);
                    timeouts > config.timeout_count_limit
                }
                Err(e) => {
                    warn!("Transport failure: {}", e);
                    true
                }
            };
            if !failed {
                continue;
            }

            match self.recover() {
                Recovery::Resumed => {
                    decoder.reset();
                    revolution.clear();
                    timeouts = 0;
                }
                Recovery::Stopped => break,
                Recovery::Lost => {
                    shared.terminated.store(true, Ordering::SeqCst);
                    break;
                }
            }
        }
        debug!("Acquisition finished");
    }

    fn record(&self, decoder: &PacketDecoder, revolution: &Revolution) {
        let stats = &self.acquisition.shared.stats;
        let d = decoder.stats();
        stats.packages.store(d.packages, Ordering::Relaxed);
        stats.resyncs.store(d.resyncs, Ordering::Relaxed);
        stats.checksum_errors.store(d.checksum_errors, Ordering::Relaxed);
        stats.invalid_packages.store(d.invalid_packages, Ordering::Relaxed);
        stats
            .dropped_samples
            .store(revolution.dropped(), Ordering::Relaxed);
    }

    /// Hands a revolution to the consumer, replacing one not taken yet.
    fn publish(&self, samples: Vec<Sample>) {
        let stats = &self.acquisition.shared.stats;
        stats.revolutions.fetch_add(1, Ordering::Relaxed);
        if let Err(TrySendError::Full(scan)) = self.scan_tx.try_send(Scan::from_samples(samples))
        {
            if self.scan_rx.try_recv().is_ok() {
                stats.dropped_scans.fetch_add(1, Ordering::Relaxed);
            }
            let _ = self.scan_tx.try_send(scan);
        }
    }

    /// Sends the heartbeat command when it is due. Failures are logged and
    /// returned.
    fn heart_beat(&self, last: &mut Instant) -> Result<()> {
        let config = &self.acquisition.config;
        if !config.heart_beat || last.elapsed() < config.heart_beat_interval {
            return Ok(());
        }
        *last = Instant::now();
        let mut transport = self.acquisition.shared.transport();
        send_command(&mut *transport, LIDAR_CMD_SET_HEART_BEAT, &[0x01]).map_err(|e| {
            warn!("Heartbeat failed: {}", e);
            e
        })
    }

    /// Brings the link back after a failure, or gives up on it.
    fn recover(&self) -> Recovery {
        let shared = &self.acquisition.shared;
        let config = &self.acquisition.config;

        if !shared.auto_reconnect.load(Ordering::SeqCst) {
            error!("Link lost, auto reconnect is disabled");
            shared.transport().close();
            shared.set_state(ConnectionState::Disconnected);
            return Recovery::Lost;
        }

        shared.set_state(ConnectionState::Reconnecting);
        shared.transport().close();
        for attempt in 1..=config.reconnect_retries {
            if self.stop.wait(config.reconnect_backoff) {
                return Recovery::Stopped;
            }
            warn!(
                "Reconnecting to {} ({}/{})",
                self.acquisition.port_name, attempt, config.reconnect_retries
            );
            match self.reopen() {
                Ok(()) => {
                    info!("Reconnected to {}", self.acquisition.port_name);
                    shared.stats.reconnects.fetch_add(1, Ordering::Relaxed);
                    shared.set_state(ConnectionState::Scanning);
                    return Recovery::Resumed;
                }
                Err(e) => {
                    warn!("Reconnect attempt {} failed: {}", attempt, e);
                    shared.transport().close();
                    if self.stop.is_stopped() {
                        return Recovery::Stopped;
                    }
                }
            }
        }

        error!(
            "Giving up on {} after {} attempts",
            self.acquisition.port_name, config.reconnect_retries
        );
        shared.transport().close();
        shared.set_state(ConnectionState::Disconnected);
        Recovery::Lost
    }

    fn reopen(&self) -> Result<()> {
        let acquisition = &self.acquisition;
        let mut transport = acquisition.shared.transport();
        transport.open(&acquisition.port_name, acquisition.baud_rate)?;
        transport.flush_input()?;
        if acquisition.shared.motor_dtr.load(Ordering::SeqCst) {
            transport.set_dtr(true)?;
        }
        send_command(&mut *transport, acquisition.scan_command, &[])?;
        let header =
            wait_response_header_or_cancel(&mut *transport, acquisition.config.timeout, &|| {
                self.stop.is_stopped()
            })?;
        header.expect(LIDAR_ANS_TYPE_MEASUREMENT, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::LIDAR_CMD_SCAN;
    use crate::mock::{package, revolution, scan_response, MockTransport};
    use ydlidar_data::LidarType;

    fn test_config() -> DriverConfig {
        DriverConfig {
            lidar_type: LidarType::Tof,
            package_timeout: Duration::from_millis(100),
            reconnect_backoff: Duration::from_millis(20),
            timeout: Duration::from_millis(100),
            ..Default::default()
        }
    }

    fn start(
        transport: MockTransport,
        config: DriverConfig,
    ) -> (Arc<Shared<MockTransport>>, DriverThreads, Receiver<Scan>) {
        let shared = Arc::new(Shared::new(transport, &config));
        shared.set_state(ConnectionState::Scanning);
        let (threads, scan_rx) = spawn(Acquisition {
            shared: shared.clone(),
            config,
            port_name: "mock".to_string(),
            baud_rate: 115_200,
            scan_command: LIDAR_CMD_SCAN,
        });
        (shared, threads, scan_rx)
    }

    #[test]
    fn test_stop_token() {
        let (tx, stop) = StopToken::new();
        assert!(!stop.is_stopped());
        assert!(!stop.wait(Duration::from_millis(5)));
        drop(tx);
        assert!(stop.is_stopped());
        let start = Instant::now();
        assert!(stop.wait(Duration::from_secs(10)));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_wait_package_timeout() {
        let transport = Mutex::new(MockTransport::opened());
        let (_tx, stop) = StopToken::new();
        let mut decoder = PacketDecoder::new(DecoderConfig::default());
        let start = Instant::now();
        let package =
            wait_package(&transport, &mut decoder, Duration::from_millis(50), 64, &stop).unwrap();
        assert!(package.is_none());
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_wait_package_stopped() {
        let transport = Mutex::new(MockTransport::opened());
        let (tx, stop) = StopToken::new();
        drop(tx);
        let mut decoder = PacketDecoder::new(DecoderConfig::default());
        let start = Instant::now();
        let package =
            wait_package(&transport, &mut decoder, Duration::from_secs(5), 64, &stop).unwrap();
        assert!(package.is_none());
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_wait_package() {
        let mock = MockTransport::opened();
        mock.push(&package(0x00, 64, 128, &[(0, 40), (0, 44)], false));
        let transport = Mutex::new(mock);
        let (_tx, stop) = StopToken::new();
        let mut decoder = PacketDecoder::new(DecoderConfig::default());
        let package = wait_package(&transport, &mut decoder, Duration::from_millis(100), 64, &stop)
            .unwrap()
            .unwrap();
        assert_eq!(package.samples.len(), 2);
    }

    #[test]
    fn test_wait_package_read_error() {
        let mock = MockTransport::opened();
        mock.fail_next_reads(1);
        let transport = Mutex::new(mock);
        let (_tx, stop) = StopToken::new();
        let mut decoder = PacketDecoder::new(DecoderConfig::default());
        let result = wait_package(&transport, &mut decoder, Duration::from_millis(100), 64, &stop);
        assert!(result.unwrap_err().is_transport_failure());
    }

    #[test]
    fn test_wait_package_decode_errors() {
        let mock = MockTransport::opened();
        let mut corrupted = package(0x00, 64, 128, &[(0, 40), (0, 44)], false);
        corrupted[8] ^= 0xFF;
        mock.push(&corrupted.repeat(4));
        let transport = Mutex::new(mock);
        let (_tx, stop) = StopToken::new();
        let mut decoder = PacketDecoder::new(DecoderConfig::default());
        let start = Instant::now();
        let package =
            wait_package(&transport, &mut decoder, Duration::from_secs(5), 2, &stop).unwrap();
        assert!(package.is_none());
        assert!(decoder.consecutive_errors() > 2);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_publishes_revolutions() {
        let mock = MockTransport::opened();
        mock.set_stream(revolution(4, 10));
        let mut transport = mock.clone();
        send_command(&mut transport, LIDAR_CMD_SCAN, &[]).unwrap();
        mock.clear_written();

        let (shared, mut threads, scan_rx) = start(mock, test_config());
        for _ in 0..3 {
            let scan = scan_rx.recv_timeout(Duration::from_secs(2)).unwrap();
            assert_eq!(scan.len(), 40);
            assert!(scan.samples[0].sync);
            assert!(scan.samples[1..].iter().all(|s| !s.sync));
            assert_eq!(scan.frequency_hz(), Some(10.));
        }
        threads.join();
        assert!(shared.stats().revolutions >= 3);
        assert!(shared.stats().packages >= 12);
        assert!(!shared.terminated.load(Ordering::SeqCst));
    }

    #[test]
    fn test_revolution_capacity() {
        let mock = MockTransport::opened();
        mock.set_stream(revolution(4, 10));
        let mut transport = mock.clone();
        send_command(&mut transport, LIDAR_CMD_SCAN, &[]).unwrap();

        let config = DriverConfig {
            max_scan_nodes: 25,
            ..test_config()
        };
        let (shared, mut threads, scan_rx) = start(mock, config);
        let scan = scan_rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(scan.len(), 25);
        threads.join();
        assert!(shared.stats().dropped_samples >= 15);
    }

    #[test]
    fn test_newest_revolution_wins() {
        let mock = MockTransport::opened();
        mock.set_stream(revolution(2, 5));
        let mut transport = mock.clone();
        send_command(&mut transport, LIDAR_CMD_SCAN, &[]).unwrap();

        let (shared, mut threads, scan_rx) = start(mock, test_config());
        std::thread::sleep(Duration::from_millis(200));
        assert!(scan_rx.len() <= 1);
        threads.join();
        assert!(shared.stats().dropped_scans > 0);
    }

    #[test]
    fn test_lost_without_auto_reconnect() {
        let mock = MockTransport::opened();
        mock.fail_next_reads(1);
        let config = DriverConfig {
            auto_reconnect: false,
            ..test_config()
        };
        let (shared, mut threads, scan_rx) = start(mock.clone(), config);
        assert!(matches!(
            scan_rx.recv_timeout(Duration::from_secs(2)),
            Err(RecvTimeoutError::Disconnected)
        ));
        threads.join();
        assert!(shared.terminated.load(Ordering::SeqCst));
        assert_eq!(shared.state(), ConnectionState::Disconnected);
        assert!(!mock.is_open());
    }

    #[test]
    fn test_lost_on_corrupted_stream() {
        let mock = MockTransport::opened();
        let mut corrupted = package(0x00, 64, 128, &[(0, 40), (0, 44)], false);
        corrupted[8] ^= 0xFF;
        mock.set_stream(corrupted.repeat(4));
        let mut transport = mock.clone();
        send_command(&mut transport, LIDAR_CMD_SCAN, &[]).unwrap();

        let config = DriverConfig {
            auto_reconnect: false,
            max_decode_errors: 4,
            timeout_count_limit: 1000,
            ..test_config()
        };
        let (shared, mut threads, scan_rx) = start(mock, config);
        assert!(matches!(
            scan_rx.recv_timeout(Duration::from_secs(2)),
            Err(RecvTimeoutError::Disconnected)
        ));
        threads.join();
        assert!(shared.terminated.load(Ordering::SeqCst));
        assert!(shared.stats().checksum_errors > 4);
        assert_eq!(shared.stats().packages, 0);
    }

    #[test]
    fn test_corrupted_stream_ends_before_package_timeout() {
        let mock = MockTransport::opened();
        let mut corrupted = package(0x00, 64, 128, &[(0, 40), (0, 44)], false);
        corrupted[8] ^= 0xFF;
        mock.set_stream(corrupted.repeat(4));
        let mut transport = mock.clone();
        send_command(&mut transport, LIDAR_CMD_SCAN, &[]).unwrap();

        let config = DriverConfig {
            auto_reconnect: false,
            max_decode_errors: 4,
            package_timeout: Duration::from_secs(2),
            ..test_config()
        };
        let begin = Instant::now();
        let (shared, mut threads, scan_rx) = start(mock, config);
        assert!(matches!(
            scan_rx.recv_timeout(Duration::from_secs(5)),
            Err(RecvTimeoutError::Disconnected)
        ));
        assert!(begin.elapsed() < Duration::from_secs(1));
        threads.join();
        assert!(shared.terminated.load(Ordering::SeqCst));
        assert_eq!(shared.stats().timeouts, 0);
    }

    #[test]
    fn test_reconnect_exhausted() {
        let mock = MockTransport::opened();
        mock.fail_next_reads(1);
        mock.fail_next_opens(10);
        let (shared, mut threads, scan_rx) = start(mock.clone(), test_config());
        let start = Instant::now();
        assert!(matches!(
            scan_rx.recv_timeout(Duration::from_secs(2)),
            Err(RecvTimeoutError::Disconnected)
        ));
        // three attempts, each after the backoff
        assert!(start.elapsed() >= Duration::from_millis(60));
        threads.join();
        assert!(shared.terminated.load(Ordering::SeqCst));
        assert_eq!(shared.state(), ConnectionState::Disconnected);
        assert_eq!(mock.opens(), 0);
    }

    #[test]
    fn test_reconnect_resumes() {
        let mock = MockTransport::opened();
        mock.set_stream(revolution(4, 10));
        mock.set_reply(LIDAR_CMD_SCAN, scan_response());
        mock.fail_next_reads(1);

        let (shared, mut threads, scan_rx) = start(mock.clone(), test_config());
        let scan = scan_rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(scan.samples[0].sync);
        assert_eq!(shared.state(), ConnectionState::Scanning);
        assert_eq!(mock.opens(), 1);
        assert_eq!(shared.stats().reconnects, 1);
        threads.join();
    }

    #[test]
    fn test_stop_during_backoff() {
        let mock = MockTransport::opened();
        mock.fail_next_reads(1);
        let config = DriverConfig {
            reconnect_backoff: Duration::from_secs(30),
            ..test_config()
        };
        let (shared, mut threads, _scan_rx) = start(mock, config);
        let deadline = Instant::now() + Duration::from_secs(2);
        while shared.state() != ConnectionState::Reconnecting && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(shared.state(), ConnectionState::Reconnecting);
        let start = Instant::now();
        threads.join();
        assert!(start.elapsed() < Duration::from_secs(1));
        assert!(!shared.terminated.load(Ordering::SeqCst));
    }

    #[test]
    fn test_stop_during_reopen() {
        let mock = MockTransport::opened();
        mock.fail_next_reads(1);
        let config = DriverConfig {
            reconnect_backoff: Duration::from_millis(10),
            timeout: Duration::from_secs(2),
            ..test_config()
        };
        let (shared, mut threads, _scan_rx) = start(mock.clone(), config);
        let deadline = Instant::now() + Duration::from_secs(2);
        while mock.opens() == 0 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(mock.opens(), 1);
        assert_eq!(shared.state(), ConnectionState::Reconnecting);
        // the device never answers the scan command
        let start = Instant::now();
        threads.join();
        assert!(start.elapsed() < Duration::from_millis(200));
        assert!(!shared.terminated.load(Ordering::SeqCst));
        assert!(!mock.is_open());
    }

    #[test]
    fn test_heart_beat_write_failure() {
        let mock = MockTransport::opened();
        mock.set_stream(revolution(4, 10));
        let mut transport = mock.clone();
        send_command(&mut transport, LIDAR_CMD_SCAN, &[]).unwrap();
        mock.set_write_limit(Some(1));

        let config = DriverConfig {
            auto_reconnect: false,
            heart_beat: true,
            heart_beat_interval: Duration::from_millis(20),
            timeout_count_limit: 1000,
            ..test_config()
        };
        let (shared, mut threads, _scan_rx) = start(mock, config);
        let deadline = Instant::now() + Duration::from_secs(2);
        while !shared.terminated.load(Ordering::SeqCst) && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        threads.join();
        assert!(shared.terminated.load(Ordering::SeqCst));
        assert_eq!(shared.state(), ConnectionState::Disconnected);
        assert_eq!(shared.stats().timeouts, 0);
    }

    #[test]
    fn test_heart_beat() {
        let mock = MockTransport::opened();
        let config = DriverConfig {
            heart_beat: true,
            heart_beat_interval: Duration::from_millis(20),
            package_timeout: Duration::from_millis(30),
            timeout_count_limit: 1000,
            ..test_config()
        };
        let (_shared, mut threads, _scan_rx) = start(mock.clone(), config);
        std::thread::sleep(Duration::from_millis(150));
        threads.join();
        let frame = [0xA5, 0xD9, 0x01, 0x01, 0xA5 ^ 0xD9 ^ 0x01 ^ 0x01];
        let written = mock.written();
        let count = written.windows(frame.len()).filter(|w| *w == frame).count();
        assert!(count >= 2);
    }
}
