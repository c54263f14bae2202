use std::sync::mpsc as std_mpsc;
use std::thread;
use std::time::Duration;

use tokio::sync::mpsc as tokio_mpsc;

use crate::engine::ProtocolEngine;
use crate::error::Result;
use crate::mode::{DeviceModel, LocatorSource, OperatingMode, PowerReportMode};
use crate::report::Satellite;
use crate::sink::StatusSink;
use crate::transport::Transport;

/// Delay between loop passes while the line is idle.
const IDLE_POLL: Duration = Duration::from_millis(50);

/// Commands sent from the host into the session loop.
///
/// Selections held by the host UI (band checkboxes, pause entry, report
/// modes) travel inside these variants; the protocol side never reads
/// them back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserCommand {
    StartBeacon,
    Stop,
    StartGenerator,
    /// Full set of band enables, indexed like [`crate::mode::BANDS`].
    SetBands(Vec<bool>),
    SetTxPause(u32),
    SetStartupMode(OperatingMode),
    SetLocatorSource(LocatorSource),
    SetPowerReportMode(PowerReportMode),
    SetReportedPower(u8),
    SetCallsign(String),
    SetLocator(String),
    SetDeviceName(String),
    /// Step a generator digit up; the index picks the digit column.
    GeneratorUp(usize),
    GeneratorDown(usize),
    SaveSettings,
    /// Debug passthrough, sent verbatim.
    SendRaw(String),
    Quit,
}

/// Status updates pushed from the session loop to the host.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusEvent {
    Connected,
    Disconnected,
    Error(String),
    LinkOk(bool),
    Time(String),
    RunMode(OperatingMode),
    StartupMode(OperatingMode),
    TxPause(u32),
    BandEnabled { band: usize, enabled: bool },
    LocatorSource(LocatorSource),
    PowerReportMode(PowerReportMode),
    Callsign(String),
    Locator(String),
    ReportedPower(u8),
    DeviceName(String),
    GeneratorDigits(String),
    DeviceModel(DeviceModel),
    HardwareVersion(String),
    HardwareRevision(String),
    FirmwareVersion(String),
    FirmwareRevision(String),
    FilterInstalled(usize),
    Position(String),
    GpsLock(bool),
    Satellites(Vec<Satellite>),
    TransmitFrequency(u64),
    TransmitOn(bool),
    PauseProgress(u32),
    NextBand(usize),
    BandProgress { band: usize, seconds: u16 },
    CycleComplete,
    Log(String),
}

/// A [`StatusSink`] that forwards every update into an unbounded channel.
///
/// `unbounded_send` never blocks, so a slow consumer cannot stall the
/// protocol loop; a closed channel just drops the update.
pub struct ChannelSink {
    tx: tokio_mpsc::UnboundedSender<StatusEvent>,
}

impl ChannelSink {
    pub fn new(tx: tokio_mpsc::UnboundedSender<StatusEvent>) -> Self {
        Self { tx }
    }

    fn emit(&self, event: StatusEvent) {
        let _ = self.tx.send(event);
    }
}

impl StatusSink for ChannelSink {
    fn time(&mut self, hhmmss: &str) {
        self.emit(StatusEvent::Time(hhmmss.to_string()));
    }
    fn run_mode(&mut self, mode: OperatingMode) {
        self.emit(StatusEvent::RunMode(mode));
    }
    fn startup_mode(&mut self, mode: OperatingMode) {
        self.emit(StatusEvent::StartupMode(mode));
    }
    fn tx_pause(&mut self, seconds: u32) {
        self.emit(StatusEvent::TxPause(seconds));
    }
    fn band_enabled(&mut self, band: usize, enabled: bool) {
        self.emit(StatusEvent::BandEnabled { band, enabled });
    }
    fn locator_source(&mut self, source: LocatorSource) {
        self.emit(StatusEvent::LocatorSource(source));
    }
    fn power_report_mode(&mut self, mode: PowerReportMode) {
        self.emit(StatusEvent::PowerReportMode(mode));
    }
    fn callsign(&mut self, call: &str) {
        self.emit(StatusEvent::Callsign(call.to_string()));
    }
    fn locator(&mut self, locator: &str) {
        self.emit(StatusEvent::Locator(locator.to_string()));
    }
    fn reported_power(&mut self, dbm: u8) {
        self.emit(StatusEvent::ReportedPower(dbm));
    }
    fn device_name(&mut self, name: &str) {
        self.emit(StatusEvent::DeviceName(name.to_string()));
    }
    fn generator_digits(&mut self, digits: &str) {
        self.emit(StatusEvent::GeneratorDigits(digits.to_string()));
    }
    fn device_model(&mut self, model: &DeviceModel) {
        self.emit(StatusEvent::DeviceModel(model.clone()));
    }
    fn hardware_version(&mut self, version: &str) {
        self.emit(StatusEvent::HardwareVersion(version.to_string()));
    }
    fn hardware_revision(&mut self, revision: &str) {
        self.emit(StatusEvent::HardwareRevision(revision.to_string()));
    }
    fn firmware_version(&mut self, version: &str) {
        self.emit(StatusEvent::FirmwareVersion(version.to_string()));
    }
    fn firmware_revision(&mut self, revision: &str) {
        self.emit(StatusEvent::FirmwareRevision(revision.to_string()));
    }
    fn filter_installed(&mut self, band: usize) {
        self.emit(StatusEvent::FilterInstalled(band));
    }
    fn position(&mut self, locator: &str) {
        self.emit(StatusEvent::Position(locator.to_string()));
    }
    fn gps_lock(&mut self, locked: bool) {
        self.emit(StatusEvent::GpsLock(locked));
    }
    fn satellites(&mut self, satellites: &[Satellite]) {
        self.emit(StatusEvent::Satellites(satellites.to_vec()));
    }
    fn transmit_frequency(&mut self, centi_hz: u64) {
        self.emit(StatusEvent::TransmitFrequency(centi_hz));
    }
    fn transmit_on(&mut self, on: bool) {
        self.emit(StatusEvent::TransmitOn(on));
    }
    fn pause_progress(&mut self, seconds: u32) {
        self.emit(StatusEvent::PauseProgress(seconds));
    }
    fn next_band(&mut self, band: usize) {
        self.emit(StatusEvent::NextBand(band));
    }
    fn band_progress(&mut self, band: usize, seconds: u16) {
        self.emit(StatusEvent::BandProgress { band, seconds });
    }
    fn cycle_complete(&mut self) {
        self.emit(StatusEvent::CycleComplete);
    }
    fn log_line(&mut self, line: &str) {
        self.emit(StatusEvent::Log(line.to_string()));
    }
    fn link_ok(&mut self, ok: bool) {
        self.emit(StatusEvent::LinkOk(ok));
    }
}

/// Run the protocol session on a blocking thread.
///
/// Commands from `cmd_rx` execute immediately; between commands the engine
/// ticks, sleeping only while the line is idle. The loop exits on
/// [`UserCommand::Quit`], a dropped command channel, or a fatal transport
/// error; nothing times it out from the inside.
pub fn session_loop(
    transport: Box<dyn Transport>,
    cmd_rx: std_mpsc::Receiver<UserCommand>,
    event_tx: tokio_mpsc::UnboundedSender<StatusEvent>,
) {
    let sink = Box::new(ChannelSink::new(event_tx.clone()));
    let mut engine = ProtocolEngine::new(transport, sink);
    let _ = event_tx.send(StatusEvent::Connected);

    // Prime the mirror with the device's full state before serving the host.
    if let Err(e) = engine.resync() {
        let _ = event_tx.send(StatusEvent::Error(e.to_string()));
        let _ = event_tx.send(StatusEvent::Disconnected);
        return;
    }

    loop {
        match cmd_rx.try_recv() {
            Ok(UserCommand::Quit) => {
                engine.close();
                let _ = event_tx.send(StatusEvent::Disconnected);
                return;
            }
            Ok(cmd) => {
                if let Err(e) = execute_command(&mut engine, cmd) {
                    let _ = event_tx.send(StatusEvent::Error(e.to_string()));
                }
            }
            Err(std_mpsc::TryRecvError::Empty) => {}
            Err(std_mpsc::TryRecvError::Disconnected) => {
                engine.close();
                return;
            }
        }

        match engine.tick() {
            Ok(true) => {}
            Ok(false) => thread::sleep(IDLE_POLL),
            Err(e) => {
                let _ = event_tx.send(StatusEvent::Error(e.to_string()));
                let _ = event_tx.send(StatusEvent::Disconnected);
                return;
            }
        }
    }
}

fn execute_command(engine: &mut ProtocolEngine, cmd: UserCommand) -> Result<()> {
    match cmd {
        UserCommand::StartBeacon => engine.start_beacon(),
        UserCommand::Stop => engine.stop(),
        UserCommand::StartGenerator => engine.start_generator(),
        UserCommand::SetBands(bands) => engine.set_bands(&bands),
        UserCommand::SetTxPause(seconds) => engine.set_tx_pause(seconds),
        UserCommand::SetStartupMode(mode) => engine.set_startup_mode(mode),
        UserCommand::SetLocatorSource(source) => engine.set_locator_source(source),
        UserCommand::SetPowerReportMode(mode) => engine.set_power_report_mode(mode),
        UserCommand::SetReportedPower(dbm) => engine.set_reported_power(dbm),
        UserCommand::SetCallsign(call) => engine.set_callsign(&call),
        UserCommand::SetLocator(locator) => engine.set_locator(&locator),
        UserCommand::SetDeviceName(name) => engine.set_device_name(&name),
        UserCommand::GeneratorUp(digit) => engine.generator_up(digit),
        UserCommand::GeneratorDown(digit) => engine.generator_down(digit),
        UserCommand::SaveSettings => engine.save_settings(),
        UserCommand::SendRaw(text) => engine.send_raw(&text),
        UserCommand::Quit => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io;
    use std::sync::{Arc, Mutex};

    struct MockTransport {
        rx: VecDeque<u8>,
        sent: Arc<Mutex<Vec<u8>>>,
    }

    impl Transport for MockTransport {
        fn bytes_to_read(&mut self) -> io::Result<u32> {
            Ok(self.rx.len() as u32)
        }

        fn read_byte(&mut self) -> io::Result<Option<u8>> {
            Ok(self.rx.pop_front())
        }

        fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
            self.sent.lock().unwrap().extend_from_slice(buf);
            Ok(())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_session_quits_on_command() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let transport = MockTransport {
            rx: VecDeque::new(),
            sent: sent.clone(),
        };
        let (cmd_tx, cmd_rx) = std_mpsc::channel();
        let (event_tx, mut event_rx) = tokio_mpsc::unbounded_channel();

        cmd_tx.send(UserCommand::SetCallsign("W1AW".to_string())).unwrap();
        cmd_tx.send(UserCommand::Quit).unwrap();
        session_loop(Box::new(transport), cmd_rx, event_tx);

        assert_eq!(event_rx.try_recv().unwrap(), StatusEvent::Connected);
        // Drain to the terminal event.
        let mut last = None;
        while let Ok(event) = event_rx.try_recv() {
            last = Some(event);
        }
        assert_eq!(last, Some(StatusEvent::Disconnected));
        let sent = String::from_utf8(sent.lock().unwrap().clone()).unwrap();
        assert!(sent.contains("[DCS] S W1AW\r\n"));
    }

    #[test]
    fn test_channel_sink_forwards_updates() {
        let (tx, mut rx) = tokio_mpsc::unbounded_channel();
        let mut sink = ChannelSink::new(tx);
        sink.time("12:34:56");
        sink.transmit_on(true);
        sink.band_progress(6, 103);
        assert_eq!(rx.try_recv().unwrap(), StatusEvent::Time("12:34:56".to_string()));
        assert_eq!(rx.try_recv().unwrap(), StatusEvent::TransmitOn(true));
        assert_eq!(
            rx.try_recv().unwrap(),
            StatusEvent::BandProgress {
                band: 6,
                seconds: 103
            }
        );
    }

    #[test]
    fn test_channel_sink_survives_dropped_consumer() {
        let (tx, rx) = tokio_mpsc::unbounded_channel();
        drop(rx);
        let mut sink = ChannelSink::new(tx);
        // Must not panic or block.
        sink.log_line("orphaned");
    }
}
