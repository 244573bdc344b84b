//! Streaming session
//!
//! Drives frame source → OSC packetizer → transport:
//!
//! ```text
//! Connecting ──► LiveStreaming ──(init error, operator says y)──► RecordedStreaming
//!     │               │                                                 │
//!     └───────────────┴──────────────────► Terminated ◄─────────────────┘
//! ```
//!
//! Device errors are classified once at the SDK boundary. The acquisition
//! scope releases the device before an error propagates; the session scope
//! decides whether to offer the recorded fallback and hands the error back
//! to the caller for reporting.

pub mod progress;

pub use progress::ProgressTicker;

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::{AppConfig, NetworkConfig};
use crate::console::Console;
use crate::device::status::{DeviceStage, StatusCode};
use crate::device::{AcquisitionDevice, DeviceBackend, DeviceSerial};
use crate::error::{DeviceError, Error, NetworkError, Result};
use crate::network::OscTransport;
use crate::osc::OscPacketizer;
use crate::source::{FrameSource, LiveSource, RecordedSource};

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Connecting,
    LiveStreaming,
    RecordedStreaming,
    Terminated,
}

/// Counters for the current session
#[derive(Debug, Clone)]
pub struct StreamStats {
    pub started_at: DateTime<Utc>,
    pub frames_forwarded: u64,
    pub send_failures: u64,
}

impl Default for StreamStats {
    fn default() -> Self {
        Self {
            started_at: Utc::now(),
            frames_forwarded: 0,
            send_failures: 0,
        }
    }
}

/// One streaming session: owns the device backend, the console and the
/// packetizer; borrows the transport for the duration of a run.
pub struct Streamer<B: DeviceBackend, C: Console> {
    config: AppConfig,
    backend: B,
    console: C,
    packetizer: OscPacketizer,
    running: Arc<AtomicBool>,
    state: StreamState,
    stats: StreamStats,
}

impl<B: DeviceBackend, C: Console> Streamer<B, C> {
    pub fn new(
        config: AppConfig,
        backend: B,
        console: C,
        running: Arc<AtomicBool>,
    ) -> Result<Self> {
        config.validate()?;
        let packetizer = OscPacketizer::new(config.network.osc_address.clone())?;
        Ok(Self {
            config,
            backend,
            console,
            packetizer,
            running,
            state: StreamState::Connecting,
            stats: StreamStats::default(),
        })
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn stats(&self) -> &StreamStats {
        &self.stats
    }

    pub fn console(&self) -> &C {
        &self.console
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Connect, stream from the live device, and fall back to recorded
    /// playback if the device fails to initialise and the operator agrees.
    pub fn run_session<T, F>(&mut self, connect: F) -> Result<()>
    where
        T: OscTransport,
        F: FnOnce(&NetworkConfig) -> std::result::Result<T, NetworkError>,
    {
        let mut transport = self.connect(connect)?;

        let result = match self.stream_live(&mut transport) {
            Err(err) if err.offers_fallback() => self.offer_fallback(&mut transport, err),
            other => other,
        };

        self.finish(&transport);
        result
    }

    /// Connect and go straight to recorded playback.
    pub fn run_replay<T, F>(&mut self, connect: F) -> Result<()>
    where
        T: OscTransport,
        F: FnOnce(&NetworkConfig) -> std::result::Result<T, NetworkError>,
    {
        let mut transport = self.connect(connect)?;
        let result = self.stream_recorded(&mut transport);
        self.finish(&transport);
        result
    }

    fn connect<T, F>(&mut self, connect: F) -> Result<T>
    where
        T: OscTransport,
        F: FnOnce(&NetworkConfig) -> std::result::Result<T, NetworkError>,
    {
        self.state = StreamState::Connecting;
        let transport = match connect(&self.config.network) {
            Ok(transport) => transport,
            Err(e) => {
                self.state = StreamState::Terminated;
                return Err(e.into());
            }
        };

        let port = self.config.network.port;
        self.console.message(&format!("Unicorn Streaming to OSC port {}", port));
        self.console.message("Press CTRL+C to quit.");
        self.console.message("----------------------------------\n");
        tracing::info!(
            "Sending {} to {}:{}",
            self.packetizer.address(),
            self.config.network.host,
            port
        );

        self.stats = StreamStats::default();
        Ok(transport)
    }

    fn finish<T: OscTransport>(&mut self, transport: &T) {
        self.state = StreamState::Terminated;
        let sender = transport.stats();
        tracing::info!(
            "Forwarded {} frames ({} send failures) since {}",
            self.stats.frames_forwarded,
            self.stats.send_failures,
            self.stats.started_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        tracing::info!(
            "Sender: {} packets, {:.1} KB, {} failures",
            sender.packets_sent,
            sender.bytes_sent as f64 / 1024.0,
            sender.send_failures
        );
    }

    fn offer_fallback<T: OscTransport>(&mut self, transport: &mut T, err: Error) -> Result<()> {
        tracing::warn!("Live streaming unavailable: {}", err);

        if self.console.confirm_fallback() {
            if let Err(replay_err) = self.stream_recorded(transport) {
                tracing::error!("Recorded playback stopped: {}", replay_err);
                self.console.message(&replay_err.diagnostic());
            }
        }

        Err(err)
    }

    /// Live streaming from a device of the backend.
    pub fn stream_live<T: OscTransport>(&mut self, transport: &mut T) -> Result<()> {
        self.state = StreamState::LiveStreaming;

        let devices = self.backend.available_devices(self.config.device.only_paired)?;
        if devices.is_empty() {
            self.console.message("No device available. Please pair with a Unicorn device first.");
            return Err(DeviceError::new(
                DeviceStage::Enumerate,
                StatusCode::GeneralError,
                "no device available",
            )
            .into());
        }

        self.console.show_devices(&devices);
        let serial = &devices[self.choose_device(&devices)?];

        self.console.message(&format!("Trying to connect to '{}'.", serial));
        let device = self.backend.open(serial)?;
        self.console.message(&format!("Connected to '{}'.", serial));
        if let Some(handle) = device.handle() {
            self.console.message(&format!("Device Handle: {}", handle));
        }

        let mut source = LiveSource::new(device, self.config.device.frame_length)?;
        let configuration = source.configuration()?;
        let geometry = source.geometry();

        self.console.message("\nAcquisition Configuration:");
        self.console.message(&format!("Sampling Rate: {}Hz", geometry.sampling_rate));
        self.console.message(&format!("Frame Length: {}", geometry.frame_length));
        self.console.message(&format!("Number Of Acquired Channels: {}", geometry.channels));
        tracing::debug!("Enabled channels: {:?}", configuration.enabled_channel_names());

        match self.acquire(&mut source, transport) {
            Ok(()) => {
                self.release(source)?;
                Ok(())
            }
            Err(err) => {
                tracing::error!("Acquisition aborted: {}", err);
                if let Err(cleanup) = self.release(source) {
                    tracing::warn!("Cleanup after failed acquisition: {}", cleanup);
                }
                Err(err)
            }
        }
    }

    fn choose_device(
        &mut self,
        devices: &[DeviceSerial],
    ) -> std::result::Result<usize, DeviceError> {
        if let Some(wanted) = &self.config.device.serial {
            return devices.iter().position(|d| &d.0 == wanted).ok_or_else(|| {
                DeviceError::new(
                    DeviceStage::Select,
                    StatusCode::GeneralError,
                    format!("configured device '{}' not found", wanted),
                )
            });
        }

        if devices.len() == 1 {
            return Ok(0);
        }

        match self.console.select_device(devices) {
            Some(index) if index < devices.len() => Ok(index),
            _ => Err(DeviceError::new(
                DeviceStage::Select,
                StatusCode::GeneralError,
                "invalid device selection",
            )),
        }
    }

    fn acquire<D, T>(&mut self, source: &mut LiveSource<D>, transport: &mut T) -> Result<()>
    where
        D: AcquisitionDevice,
        T: OscTransport,
    {
        source.start(self.config.device.test_signal)?;
        self.console.message("\nData acquisition started.");

        let every = source.geometry().ticks_every(self.config.console.max_update_hz);
        let mut ticker = ProgressTicker::new(every);

        while transport.is_reachable() && self.is_running() {
            let frame = source.next_frame()?;
            self.forward(transport, frame)?;
            if ticker.advance() {
                self.console.progress_tick();
            }
        }

        if !self.is_running() {
            tracing::info!("Shutdown requested, stopping acquisition");
        }
        Ok(())
    }

    /// Stop acquisition and close the device, reporting each step.
    fn release<D: AcquisitionDevice>(
        &mut self,
        source: LiveSource<D>,
    ) -> std::result::Result<(), DeviceError> {
        let was_acquiring = source.is_acquiring();
        source.shutdown()?;
        if was_acquiring {
            self.console.message("\nData acquisition stopped.");
        }
        self.console.message("Disconnected from Unicorn.");
        Ok(())
    }

    /// Loop over the configured recording while the destination is reachable.
    pub fn stream_recorded<T: OscTransport>(&mut self, transport: &mut T) -> Result<()> {
        self.state = StreamState::RecordedStreaming;

        let recording = &self.config.recording;
        let mut source = RecordedSource::new(recording.path.clone(), recording.sampling_rate);
        let banner = format!("Streaming recorded data from {}: ", source.path().display());
        self.console.message(&banner);

        let every = self.config.console.recorded_tick_every;
        let mut ticker = ProgressTicker::starting_with_tick(every);

        while transport.is_reachable() && self.is_running() {
            let frame = source.next_frame()?;
            self.forward(transport, frame)?;
            if ticker.advance() {
                self.console.progress_tick();
            }
        }

        tracing::info!(
            "Recorded playback ended after {} frames ({} passes)",
            source.frames_emitted(),
            source.passes()
        );
        Ok(())
    }

    /// Packetize and send one frame. A failed send loses the frame and is
    /// logged; streaming continues.
    fn forward<T: OscTransport>(&mut self, transport: &mut T, frame: &[f32]) -> Result<()> {
        let packet = self.packetizer.packetize(frame)?;
        match transport.send_packet(&packet) {
            Ok(()) => self.stats.frames_forwarded += 1,
            Err(e) => {
                self.stats.send_failures += 1;
                tracing::warn!("Failed to send packet: {}", e);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::AmplifierConfiguration;
    use crate::network::SenderStats;
    use rosc::{OscPacket, OscType};
    use std::cell::RefCell;
    use std::collections::{HashSet, VecDeque};
    use std::io::Write;
    use std::path::PathBuf;
    use std::rc::Rc;

    // ── Test doubles ──────────────────────────────────────────────────────

    #[derive(Default)]
    struct MockTransport {
        sent: Vec<Vec<u8>>,
        attempts: usize,
        reachable_for: usize,
        fail_on: HashSet<usize>,
    }

    impl MockTransport {
        fn reachable_for(attempts: usize) -> Self {
            Self {
                reachable_for: attempts,
                ..Self::default()
            }
        }

        fn first_values(&self) -> Vec<f32> {
            self.sent
                .iter()
                .map(|p| match rosc::decoder::decode_udp(p).unwrap().1 {
                    OscPacket::Message(msg) => match msg.args[0] {
                        OscType::Float(v) => v,
                        _ => panic!("expected float"),
                    },
                    OscPacket::Bundle(_) => panic!("expected message"),
                })
                .collect()
        }
    }

    impl OscTransport for MockTransport {
        fn send_packet(&mut self, packet: &[u8]) -> std::result::Result<(), NetworkError> {
            let attempt = self.attempts;
            self.attempts += 1;
            if self.fail_on.contains(&attempt) {
                return Err(NetworkError::SendFailed("injected".into()));
            }
            self.sent.push(packet.to_vec());
            Ok(())
        }

        fn is_reachable(&self) -> bool {
            self.attempts < self.reachable_for
        }

        fn stats(&self) -> SenderStats {
            SenderStats {
                packets_sent: self.sent.len() as u64,
                bytes_sent: self.sent.iter().map(|p| p.len() as u64).sum(),
                send_failures: (self.attempts - self.sent.len()) as u64,
            }
        }
    }

    #[derive(Default)]
    struct ScriptedConsole {
        selections: VecDeque<Option<usize>>,
        fallback_answer: bool,
        select_calls: usize,
        fallback_calls: usize,
        ticks: usize,
        messages: Vec<String>,
    }

    impl Console for ScriptedConsole {
        fn show_devices(&mut self, devices: &[DeviceSerial]) {
            self.messages.push(format!("{} devices", devices.len()));
        }
        fn select_device(&mut self, _devices: &[DeviceSerial]) -> Option<usize> {
            self.select_calls += 1;
            self.selections.pop_front().flatten()
        }
        fn confirm_fallback(&mut self) -> bool {
            self.fallback_calls += 1;
            self.fallback_answer
        }
        fn progress_tick(&mut self) {
            self.ticks += 1;
        }
        fn message(&mut self, text: &str) {
            self.messages.push(text.to_string());
        }
        fn wait_for_exit(&mut self) {}
    }

    type CallLog = Rc<RefCell<Vec<String>>>;
    type DeviceResult<T> = std::result::Result<T, DeviceError>;

    fn failure(stage: DeviceStage, code: StatusCode) -> DeviceError {
        DeviceError::new(stage, code, format!("{} failed", stage))
    }

    #[derive(Default)]
    struct MockBackend {
        serials: Vec<&'static str>,
        fail_open: bool,
        fail_channels: bool,
        fail_start: bool,
        fail_get_data_at: Option<u64>,
        log: CallLog,
    }

    impl MockBackend {
        fn with_devices(serials: Vec<&'static str>) -> Self {
            Self {
                serials,
                ..Self::default()
            }
        }

        fn calls(&self) -> Vec<String> {
            self.log.borrow().clone()
        }
    }

    impl DeviceBackend for MockBackend {
        type Device = MockDevice;

        fn available_devices(&mut self, _only_paired: bool) -> DeviceResult<Vec<DeviceSerial>> {
            self.log.borrow_mut().push("enumerate".into());
            Ok(self.serials.iter().map(|s| DeviceSerial(s.to_string())).collect())
        }

        fn open(&mut self, serial: &DeviceSerial) -> DeviceResult<MockDevice> {
            self.log.borrow_mut().push(format!("open {}", serial));
            if self.fail_open {
                return Err(failure(DeviceStage::Open, StatusCode::OpenDeviceFailed));
            }
            Ok(MockDevice {
                counter: 0,
                fail_channels: self.fail_channels,
                fail_start: self.fail_start,
                fail_at: self.fail_get_data_at,
                log: self.log.clone(),
            })
        }
    }

    struct MockDevice {
        counter: u64,
        fail_channels: bool,
        fail_start: bool,
        fail_at: Option<u64>,
        log: CallLog,
    }

    impl AcquisitionDevice for MockDevice {
        fn acquired_channels(&self) -> DeviceResult<usize> {
            if self.fail_channels {
                return Err(failure(DeviceStage::QueryChannels, StatusCode::InvalidHandle));
            }
            Ok(17)
        }
        fn configuration(&self) -> DeviceResult<AmplifierConfiguration> {
            Ok(AmplifierConfiguration::default())
        }
        fn sampling_rate(&self) -> u32 {
            250
        }
        fn handle(&self) -> Option<u64> {
            Some(42)
        }
        fn start_acquisition(&mut self, _test_signal: bool) -> DeviceResult<()> {
            self.log.borrow_mut().push("start".into());
            if self.fail_start {
                return Err(failure(DeviceStage::Start, StatusCode::BluetoothSocketFailed));
            }
            Ok(())
        }
        fn get_data(&mut self, _scans: u32, buffer: &mut [f32]) -> DeviceResult<()> {
            if Some(self.counter) == self.fail_at {
                return Err(DeviceError::new(
                    DeviceStage::GetData,
                    StatusCode::ConnectionProblem,
                    "Bluetooth connection lost",
                ));
            }
            self.counter += 1;
            buffer.iter_mut().for_each(|v| *v = self.counter as f32);
            Ok(())
        }
        fn stop_acquisition(&mut self) -> DeviceResult<()> {
            self.log.borrow_mut().push("stop".into());
            Ok(())
        }
        fn close(&mut self) -> DeviceResult<()> {
            self.log.borrow_mut().push("close".into());
            Ok(())
        }
    }

    fn write_capture(name: &str, rows: usize) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "unicorn-osc-stream-{}-{}.csv",
            std::process::id(),
            name
        ));
        let mut file = std::fs::File::create(&path).unwrap();
        for row in 1..=rows {
            writeln!(file, "{},0,0,0,0,0,0,0,99", row).unwrap();
        }
        path
    }

    fn test_config(recording: Option<PathBuf>) -> AppConfig {
        let mut config = AppConfig::default();
        if let Some(path) = recording {
            config.recording.path = path;
        }
        // No pacing in tests
        config.recording.sampling_rate = 0;
        config
    }

    fn streamer(
        config: AppConfig,
        backend: MockBackend,
        console: ScriptedConsole,
    ) -> Streamer<MockBackend, ScriptedConsole> {
        Streamer::new(config, backend, console, Arc::new(AtomicBool::new(true))).unwrap()
    }

    // ── Scenarios ─────────────────────────────────────────────────────────

    #[test]
    fn test_unreachable_destination_skips_enumeration() {
        let mut s = streamer(
            test_config(None),
            MockBackend::with_devices(vec!["UN-1"]),
            ScriptedConsole::default(),
        );

        let err = s
            .run_session(|config| {
                Err::<MockTransport, _>(NetworkError::ConnectionFailed {
                    port: config.port,
                    reason: "refused".into(),
                })
            })
            .unwrap_err();

        assert_eq!(err.diagnostic(), "Error connecting to port 7000: refused");
        assert!(s.backend().calls().is_empty());
        assert_eq!(s.state(), StreamState::Terminated);
    }

    #[test]
    fn test_single_device_opens_without_prompt() {
        let mut s = streamer(
            test_config(None),
            MockBackend::with_devices(vec!["UN-1"]),
            ScriptedConsole::default(),
        );
        let mut transport = MockTransport::reachable_for(30);

        s.stream_live(&mut transport).unwrap();

        assert_eq!(s.console().select_calls, 0);
        assert_eq!(
            s.backend().calls(),
            vec!["enumerate", "open UN-1", "start", "stop", "close"]
        );
        assert_eq!(transport.sent.len(), 30);
        assert_eq!(transport.first_values()[..3], [1.0, 2.0, 3.0]);
        // 250 Hz / 1 scan / 25 Hz = every 10 frames
        assert_eq!(s.console().ticks, 3);
    }

    #[test]
    fn test_send_failure_does_not_stop_streaming() {
        let mut s = streamer(
            test_config(None),
            MockBackend::with_devices(vec!["UN-1"]),
            ScriptedConsole::default(),
        );
        let mut transport = MockTransport::reachable_for(30);
        transport.fail_on.insert(4);

        s.stream_live(&mut transport).unwrap();

        assert_eq!(transport.attempts, 30);
        assert_eq!(transport.sent.len(), 29);
        assert_eq!(s.stats().send_failures, 1);
        assert_eq!(s.stats().frames_forwarded, 29);
        // The lost frame is skipped, later frames keep their order
        assert_eq!(transport.first_values()[3..6], [4.0, 6.0, 7.0]);
        // Ticks count frames, not successful sends
        assert_eq!(s.console().ticks, 3);
    }

    #[test]
    fn test_selection_prompt_with_several_devices() {
        let mut console = ScriptedConsole::default();
        console.selections.push_back(Some(1));
        let mut s = streamer(
            test_config(None),
            MockBackend::with_devices(vec!["UN-1", "UN-2"]),
            console,
        );
        let mut transport = MockTransport::reachable_for(1);

        s.stream_live(&mut transport).unwrap();

        assert_eq!(s.console().select_calls, 1);
        assert!(s.backend().calls().contains(&"open UN-2".to_string()));
    }

    #[test]
    fn test_out_of_range_selection_offers_fallback() {
        let mut console = ScriptedConsole::default();
        console.selections.push_back(Some(5));
        let mut s = streamer(
            test_config(None),
            MockBackend::with_devices(vec!["UN-1", "UN-2"]),
            console,
        );

        let err = s
            .run_session(|_| Ok(MockTransport::reachable_for(10)))
            .unwrap_err();

        assert!(matches!(err, Error::Device(ref e) if e.stage == DeviceStage::Select));
        assert_eq!(s.console().fallback_calls, 1);
        assert!(!s.backend().calls().iter().any(|c| c.starts_with("open")));
    }

    #[test]
    fn test_configured_serial_skips_prompt() {
        let mut config = test_config(None);
        config.device.serial = Some("UN-2".into());
        let mut s = streamer(
            config,
            MockBackend::with_devices(vec!["UN-1", "UN-2"]),
            ScriptedConsole::default(),
        );
        let mut transport = MockTransport::reachable_for(1);

        s.stream_live(&mut transport).unwrap();

        assert_eq!(s.console().select_calls, 0);
        assert!(s.backend().calls().contains(&"open UN-2".to_string()));
    }

    #[test]
    fn test_zero_devices_fallback_streams_recording() {
        let path = write_capture("fallback", 3);
        let mut console = ScriptedConsole::default();
        console.fallback_answer = true;
        let mut s = streamer(
            test_config(Some(path.clone())),
            MockBackend::with_devices(vec![]),
            console,
        );

        let err = s
            .run_session(|_| Ok(MockTransport::reachable_for(7)))
            .unwrap_err();
        assert!(matches!(err, Error::Device(ref e) if e.stage == DeviceStage::Enumerate));
        assert_eq!(s.console().fallback_calls, 1);
        assert_eq!(s.stats().frames_forwarded, 7);
        assert_eq!(s.state(), StreamState::Terminated);

        // Replaying the same capture directly yields rows 1,2,3 then restarts
        let mut transport = MockTransport::reachable_for(7);
        s.stream_recorded(&mut transport).unwrap();
        assert_eq!(
            transport.first_values(),
            vec![1.0, 2.0, 3.0, 1.0, 2.0, 3.0, 1.0]
        );

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_zero_devices_declined_fallback() {
        let mut s = streamer(
            test_config(None),
            MockBackend::with_devices(vec![]),
            ScriptedConsole::default(),
        );

        let err = s
            .run_session(|_| Ok(MockTransport::reachable_for(10)))
            .unwrap_err();

        assert!(err.offers_fallback());
        assert_eq!(s.console().fallback_calls, 1);
        assert_eq!(s.stats().frames_forwarded, 0);
    }

    #[test]
    fn test_mid_stream_device_error_cleans_up_without_fallback() {
        let mut backend = MockBackend::with_devices(vec!["UN-1"]);
        backend.fail_get_data_at = Some(5);
        let mut s = streamer(test_config(None), backend, ScriptedConsole::default());

        let err = s
            .run_session(|_| Ok(MockTransport::reachable_for(100)))
            .unwrap_err();

        assert!(matches!(err, Error::Device(ref e) if e.stage == DeviceStage::GetData));
        assert_eq!(
            err.diagnostic(),
            "An error occurred. Error Code: 9 - Bluetooth connection lost"
        );
        assert_eq!(s.console().fallback_calls, 0);
        assert_eq!(s.stats().frames_forwarded, 5);
        assert_eq!(
            s.backend().calls(),
            vec!["enumerate", "open UN-1", "start", "stop", "close"]
        );
    }

    #[test]
    fn test_shutdown_flag_stops_live_loop() {
        let running = Arc::new(AtomicBool::new(false));
        let mut s = Streamer::new(
            test_config(None),
            MockBackend::with_devices(vec!["UN-1"]),
            ScriptedConsole::default(),
            running,
        )
        .unwrap();
        let mut transport = MockTransport::reachable_for(100);

        s.stream_live(&mut transport).unwrap();

        assert!(transport.sent.is_empty());
        assert_eq!(
            s.backend().calls(),
            vec!["enumerate", "open UN-1", "start", "stop", "close"]
        );
    }

    #[test]
    fn test_recorded_ticks_every_256_frames() {
        let path = write_capture("ticks", 100);
        let mut s = streamer(
            test_config(Some(path.clone())),
            MockBackend::with_devices(vec![]),
            ScriptedConsole::default(),
        );
        let mut transport = MockTransport::reachable_for(600);

        s.stream_recorded(&mut transport).unwrap();

        assert_eq!(transport.sent.len(), 600);
        // Frames 0, 256 and 512
        assert_eq!(s.console().ticks, 3);
        assert_eq!(transport.first_values()[99..102], [100.0, 1.0, 2.0]);

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_missing_recording_ends_replay_with_error() {
        let mut s = streamer(
            test_config(Some(PathBuf::from("/nonexistent/rec.csv"))),
            MockBackend::with_devices(vec![]),
            ScriptedConsole::default(),
        );

        let err = s
            .run_replay(|_| Ok(MockTransport::reachable_for(10)))
            .unwrap_err();
        assert!(matches!(err, Error::Recording(_)));
    }

    #[test]
    fn test_open_failure_offers_fallback() {
        let mut backend = MockBackend::with_devices(vec!["UN-1"]);
        backend.fail_open = true;
        let mut s = streamer(test_config(None), backend, ScriptedConsole::default());

        let err = s.run_session(|_| Ok(MockTransport::reachable_for(10))).unwrap_err();

        assert!(matches!(err, Error::Device(ref e) if e.stage == DeviceStage::Open));
        assert_eq!(err.diagnostic(), "An error occurred. Error Code: 4 - open device failed");
        assert_eq!(s.console().fallback_calls, 1);
        assert_eq!(s.backend().calls(), vec!["enumerate", "open UN-1"]);
    }

    #[test]
    fn test_channel_query_failure_closes_device_and_offers_fallback() {
        let mut backend = MockBackend::with_devices(vec!["UN-1"]);
        backend.fail_channels = true;
        let mut s = streamer(test_config(None), backend, ScriptedConsole::default());

        let err = s.run_session(|_| Ok(MockTransport::reachable_for(10))).unwrap_err();

        assert!(matches!(err, Error::Device(ref e) if e.stage == DeviceStage::QueryChannels));
        assert_eq!(s.console().fallback_calls, 1);
        assert_eq!(s.backend().calls(), vec!["enumerate", "open UN-1", "close"]);
    }

    #[test]
    fn test_start_failure_closes_device_without_fallback() {
        let mut backend = MockBackend::with_devices(vec!["UN-1"]);
        backend.fail_start = true;
        let mut s = streamer(test_config(None), backend, ScriptedConsole::default());

        let err = s.run_session(|_| Ok(MockTransport::reachable_for(10))).unwrap_err();

        assert!(matches!(err, Error::Device(ref e) if e.stage == DeviceStage::Start));
        assert!(!err.offers_fallback());
        assert_eq!(s.console().fallback_calls, 0);
        // Acquisition never started, so only the close is issued
        assert_eq!(s.backend().calls(), vec!["enumerate", "open UN-1", "start", "close"]);
        assert_eq!(s.stats().frames_forwarded, 0);
    }

    #[test]
    fn test_operator_sees_handle_and_shutdown_steps() {
        let mut s = streamer(
            test_config(None),
            MockBackend::with_devices(vec!["UN-1"]),
            ScriptedConsole::default(),
        );
        let mut transport = MockTransport::reachable_for(2);

        s.stream_live(&mut transport).unwrap();

        let messages = &s.console().messages;
        let connected = messages.iter().position(|m| m == "Connected to 'UN-1'.").unwrap();
        assert_eq!(messages[connected + 1], "Device Handle: 42");
        assert_eq!(
            messages[messages.len() - 2..],
            ["\nData acquisition stopped.".to_string(), "Disconnected from Unicorn.".to_string()]
        );
    }
}
