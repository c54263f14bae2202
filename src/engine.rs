use std::time::Instant;

use log::{debug, trace, warn};

use crate::clock::MirrorClock;
use crate::command::{Command, RESYNC_OPCODES, opcode};
use crate::error::Result;
use crate::frame::{self, Frame};
use crate::frequency::{DIGIT_STEPS, GeneratorFrequency};
use crate::mode::{BANDS, LocatorSource, MAX_REPORTED_DBM, OperatingMode, PowerReportMode};
use crate::report::{self, Report, ReportError, Satellite};
use crate::sink::StatusSink;
use crate::transport::Transport;

/// Reads allowed per opcode while waiting for its resync reply.
const RESYNC_READ_LIMIT: usize = 100;
/// Longest callsign the WSPR protocol encodes.
const CALLSIGN_MAX: usize = 6;
/// Longest pause the firmware accepts (five digits on the wire).
const TX_PAUSE_MAX: u32 = 99_999;

/// Connection lifecycle of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Transport open, no well-formed frame seen yet.
    Disconnected,
    /// Frames are arriving.
    Connected,
    /// Shut down; terminal.
    Closed,
}

/// The protocol session: owns the transport and the sink, composes the
/// codec, the dispatch table, the mirror clock, and the generator
/// frequency register.
///
/// Single-threaded by construction: one reader, one writer, both driven
/// from [`tick`](Self::tick) on whatever thread hosts the session.
pub struct ProtocolEngine {
    transport: Box<dyn Transport>,
    sink: Box<dyn StatusSink>,
    clock: MirrorClock,
    generator: GeneratorFrequency,
    state: LinkState,
    /// Satellite entries accumulate here between GPS time reports.
    satellites: Vec<String>,
}

impl ProtocolEngine {
    pub fn new(transport: Box<dyn Transport>, sink: Box<dyn StatusSink>) -> Self {
        Self {
            transport,
            sink,
            clock: MirrorClock::new(),
            generator: GeneratorFrequency::new(),
            state: LinkState::Disconnected,
            satellites: Vec::new(),
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Current generator register value, centihertz.
    pub fn generator_frequency(&self) -> u64 {
        self.generator.centi_hz()
    }

    /// Mark the session closed. Subsequent ticks do nothing.
    pub fn close(&mut self) {
        self.state = LinkState::Closed;
    }

    /// One pass of the main loop: read at most one line, dispatch it, run
    /// the mirror clock. An informational frame is the device's liveness
    /// signal and triggers a full resync.
    ///
    /// Never blocks beyond the codec's bounded read. Returns whether a
    /// line was dispatched, so callers can poll harder while traffic is
    /// flowing.
    pub fn tick(&mut self) -> Result<bool> {
        if self.state == LinkState::Closed {
            return Ok(false);
        }

        let line = frame::read_line(self.transport.as_mut())?;
        let dispatched = !line.is_empty();
        if dispatched {
            let code = self.dispatch(&line)?;
            if code.as_deref() == Some(opcode::MIN) {
                self.resync()?;
            }
        }

        self.clock.poll(Instant::now(), self.sink.as_mut());
        Ok(dispatched)
    }

    /// Re-query every tracked setting in a fixed order.
    ///
    /// After each query, up to [`RESYNC_READ_LIMIT`] bounded reads wait for
    /// a reply carrying the queried opcode. Every frame read while waiting
    /// is dispatched normally; unsolicited pushes interleave freely and
    /// must not be suppressed. An exhausted cap moves on without retry.
    pub fn resync(&mut self) -> Result<()> {
        debug!("resyncing device state");
        for code in RESYNC_OPCODES {
            self.resync_step(code)?;
        }
        Ok(())
    }

    fn resync_step(&mut self, code: &'static str) -> Result<()> {
        self.send(&Command::Query(code))?;
        for _ in 0..RESYNC_READ_LIMIT {
            let line = frame::read_line_wait(self.transport.as_mut())?;
            if line.is_empty() {
                continue;
            }
            if self.dispatch(&line)?.as_deref() == Some(code) {
                return Ok(());
            }
        }
        debug!("no {code} reply within the read limit");
        Ok(())
    }

    /// Decode and dispatch one inbound line. Returns the opcode when the
    /// line carried a well-formed frame, whether or not it was understood.
    fn dispatch(&mut self, line: &str) -> Result<Option<String>> {
        trace!("RX: {line}");
        let Some(frame) = Frame::decode_line(line) else {
            debug!("discarding unframed line: {line:?}");
            return Ok(None);
        };

        if self.state == LinkState::Disconnected {
            self.state = LinkState::Connected;
        }
        self.sink.link_ok(true);

        match report::parse(&frame) {
            Ok(report) => self.apply(report)?,
            Err(ReportError::UnknownOpcode(code)) => {
                warn!("unsupported opcode {code:?}: firmware may be newer than this client");
            }
            Err(ReportError::InvalidPayload { opcode, payload }) => {
                // Never guess: ask the device for the authoritative value.
                warn!("invalid {opcode} payload {payload:?}; re-querying");
                self.send(&Command::Query(opcode))?;
            }
        }
        Ok(Some(frame.opcode))
    }

    /// Apply one decoded report to the sink and the owned state.
    fn apply(&mut self, report: Report) -> Result<()> {
        match report {
            Report::CurrentMode(mode) => self.sink.run_mode(mode),
            Report::TxPause(seconds) => self.sink.tx_pause(seconds),
            Report::StartupMode(mode) => self.sink.startup_mode(mode),
            Report::BandEnabled { band, enabled } => self.sink.band_enabled(band, enabled),
            Report::LocatorSource(source) => self.sink.locator_source(source),
            Report::PowerReportMode(mode) => self.sink.power_report_mode(mode),
            Report::Callsign(call) => self.sink.callsign(&call),
            Report::Locator(locator) => self.sink.locator(&locator),
            Report::ReportedPower(dbm) => self.sink.reported_power(dbm),
            Report::DeviceName(name) => self.sink.device_name(&name),
            Report::GeneratorFrequency(centi_hz) => match self.generator.set(centi_hz) {
                Ok(()) => self.sink.generator_digits(&self.generator.digits()),
                Err(e) => {
                    warn!("{e}; re-querying");
                    self.send(&Command::Query(opcode::DGF))?;
                }
            },
            Report::ProductModel(model) => self.sink.device_model(&model),
            Report::HardwareVersion(version) => self.sink.hardware_version(&version),
            Report::HardwareRevision(revision) => self.sink.hardware_revision(&revision),
            Report::FirmwareVersion(version) => self.sink.firmware_version(&version),
            Report::FirmwareRevision(revision) => self.sink.firmware_revision(&revision),
            Report::ReferenceFrequency(raw) => debug!("reference frequency: {raw}"),
            Report::FilterInstalled(band) => self.sink.filter_installed(band),
            Report::GpsLocator(locator) => self.sink.position(&locator),
            Report::GpsTime(text) => self.apply_gps_time(&text),
            Report::GpsLock(locked) => self.sink.gps_lock(locked),
            Report::SatelliteInfo(entry) => self.satellites.push(entry),
            Report::TransmitFrequency(centi_hz) => self.sink.transmit_frequency(centi_hz),
            Report::TransmitOn(on) => self.sink.transmit_on(on),
            Report::PauseProgress(seconds) => self.sink.pause_progress(seconds),
            Report::Informational(text) => self.sink.log_line(&text),
            Report::FilterSelected(raw) => debug!("filter selection: {raw}"),
            Report::SupplyVoltage(raw) => debug!("supply voltage: {raw}"),
            Report::NextBand(band) => self.sink.next_band(band),
            Report::BandStatus { band, seconds } => self.sink.band_progress(band, seconds),
            Report::CycleComplete => self.sink.cycle_complete(),
        }
        Ok(())
    }

    /// A GPS time report disciplines the mirror clock and flushes the
    /// satellite batch gathered since the previous one. A malformed time
    /// is dropped; the mirror keeps its prior state.
    fn apply_gps_time(&mut self, text: &str) {
        match self.clock.set_time(text, Instant::now()) {
            Ok(()) => self.sink.time(text),
            Err(e) => debug!("{e}"),
        }
        if !self.satellites.is_empty() {
            let batch: Vec<Satellite> = self
                .satellites
                .iter()
                .filter_map(|entry| Satellite::parse(entry))
                .collect();
            self.sink.satellites(&batch);
            self.satellites.clear();
        }
    }

    /// Encode and transmit one command.
    pub fn send(&mut self, command: &Command) -> Result<()> {
        let bytes = command.to_bytes();
        trace!("TX: {}", String::from_utf8_lossy(&bytes).trim_end());
        self.transport.write_all(&bytes)?;
        self.transport.flush()?;
        Ok(())
    }

    // --- User actions ---

    pub fn start_beacon(&mut self) -> Result<()> {
        self.send(&Command::SetMode(OperatingMode::WsprBeacon))
    }

    pub fn stop(&mut self) -> Result<()> {
        self.send(&Command::SetMode(OperatingMode::Idle))
    }

    pub fn start_generator(&mut self) -> Result<()> {
        self.send(&Command::SetMode(OperatingMode::SignalGenerator))
    }

    /// Push the full set of band enables, one command per band.
    pub fn set_bands(&mut self, enabled: &[bool]) -> Result<()> {
        for (band, &on) in enabled.iter().enumerate().take(BANDS.len()) {
            self.send(&Command::SetBandEnabled { band, enabled: on })?;
        }
        Ok(())
    }

    /// Set the pause between transmit cycles. A value past the firmware's
    /// five digits is not sent; the device is re-queried instead so the
    /// display falls back to the authoritative value.
    pub fn set_tx_pause(&mut self, seconds: u32) -> Result<()> {
        if seconds > TX_PAUSE_MAX {
            self.send(&Command::Query(opcode::OTP))
        } else {
            self.send(&Command::SetTxPause(seconds))
        }
    }

    pub fn set_startup_mode(&mut self, mode: OperatingMode) -> Result<()> {
        self.send(&Command::SetStartupMode(mode))
    }

    pub fn set_locator_source(&mut self, source: LocatorSource) -> Result<()> {
        self.send(&Command::SetLocatorSource(source))
    }

    pub fn set_power_report_mode(&mut self, mode: PowerReportMode) -> Result<()> {
        self.send(&Command::SetPowerReportMode(mode))
    }

    pub fn set_reported_power(&mut self, dbm: u8) -> Result<()> {
        self.send(&Command::SetReportedPower(dbm.min(MAX_REPORTED_DBM)))
    }

    /// Set the callsign, truncated to six characters. The beacon is
    /// stopped first so a partial call is never transmitted.
    pub fn set_callsign(&mut self, call: &str) -> Result<()> {
        let call: String = call.chars().take(CALLSIGN_MAX).collect();
        self.send(&Command::SetMode(OperatingMode::Idle))?;
        self.send(&Command::SetCallsign(call))
    }

    pub fn set_locator(&mut self, locator: &str) -> Result<()> {
        self.send(&Command::SetLocator(locator.to_string()))
    }

    pub fn set_device_name(&mut self, name: &str) -> Result<()> {
        self.send(&Command::SetDeviceName(name.to_string()))
    }

    /// Step one generator digit up. `digit` indexes [`DIGIT_STEPS`];
    /// out-of-range positions are ignored.
    pub fn generator_up(&mut self, digit: usize) -> Result<()> {
        let Some(&step) = DIGIT_STEPS.get(digit) else {
            return Ok(());
        };
        self.generator.increase(step);
        self.push_generator()
    }

    /// Step one generator digit down.
    pub fn generator_down(&mut self, digit: usize) -> Result<()> {
        let Some(&step) = DIGIT_STEPS.get(digit) else {
            return Ok(());
        };
        self.generator.decrease(step);
        self.push_generator()
    }

    /// Send the register's value to the device and mirror it to the sink.
    fn push_generator(&mut self) -> Result<()> {
        self.send(&Command::SetGeneratorFrequency(self.generator.centi_hz()))?;
        self.sink.generator_digits(&self.generator.digits());
        Ok(())
    }

    pub fn save_settings(&mut self) -> Result<()> {
        self.send(&Command::SaveSettings)
    }

    pub fn send_raw(&mut self, text: &str) -> Result<()> {
        self.send(&Command::Raw(text.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io;
    use std::sync::{Arc, Mutex};

    /// Transport fed from a canned byte queue, recording everything sent.
    struct MockTransport {
        rx: VecDeque<u8>,
        sent: Arc<Mutex<Vec<u8>>>,
    }

    impl MockTransport {
        fn new(inbound: &str) -> (Self, Arc<Mutex<Vec<u8>>>) {
            let sent = Arc::new(Mutex::new(Vec::new()));
            (
                Self {
                    rx: inbound.bytes().collect(),
                    sent: sent.clone(),
                },
                sent,
            )
        }
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

    /// Sink recording each update as one descriptive line.
    #[derive(Clone, Default)]
    struct RecordingSink(Arc<Mutex<Vec<String>>>);

    impl RecordingSink {
        fn events(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }

        fn push(&self, event: String) {
            self.0.lock().unwrap().push(event);
        }
    }

    impl StatusSink for RecordingSink {
        fn time(&mut self, hhmmss: &str) {
            self.push(format!("time {hhmmss}"));
        }
        fn run_mode(&mut self, mode: OperatingMode) {
            self.push(format!("run_mode {mode}"));
        }
        fn callsign(&mut self, call: &str) {
            self.push(format!("callsign {call}"));
        }
        fn generator_digits(&mut self, digits: &str) {
            self.push(format!("generator {digits}"));
        }
        fn transmit_on(&mut self, on: bool) {
            self.push(format!("transmit_on {on}"));
        }
        fn satellites(&mut self, satellites: &[Satellite]) {
            self.push(format!("satellites {}", satellites.len()));
        }
        fn log_line(&mut self, line: &str) {
            self.push(format!("log {line}"));
        }
        fn band_progress(&mut self, band: usize, seconds: u16) {
            self.push(format!("band_progress {band} {seconds}"));
        }
    }

    fn engine_with(inbound: &str) -> (ProtocolEngine, Arc<Mutex<Vec<u8>>>, RecordingSink) {
        let (transport, sent) = MockTransport::new(inbound);
        let sink = RecordingSink::default();
        let engine = ProtocolEngine::new(Box::new(transport), Box::new(sink.clone()));
        (engine, sent, sink)
    }

    fn sent_text(sent: &Arc<Mutex<Vec<u8>>>) -> String {
        String::from_utf8(sent.lock().unwrap().clone()).unwrap()
    }

    #[test]
    fn test_unknown_opcode_does_not_halt_loop() {
        let (mut engine, sent, sink) = engine_with("{ZZZ} whatever\r\n{CCM} W\r\n");
        engine.tick().unwrap();
        engine.tick().unwrap(); // skips the leftover LF
        engine.tick().unwrap();
        assert_eq!(sink.events(), vec!["run_mode WSPR Beacon"]);
        // Unknown opcodes are a diagnostic, not a corrective query.
        assert_eq!(sent_text(&sent), "");
    }

    #[test]
    fn test_invalid_payload_triggers_corrective_query() {
        let (mut engine, sent, _sink) = engine_with("{CCM} Q\r\n");
        engine.tick().unwrap();
        assert_eq!(sent_text(&sent), "[CCM] G\r\n");
    }

    #[test]
    fn test_first_frame_connects() {
        let (mut engine, _sent, _sink) = engine_with("{GLC} T\r\n");
        assert_eq!(engine.state(), LinkState::Disconnected);
        engine.tick().unwrap();
        assert_eq!(engine.state(), LinkState::Connected);
    }

    #[test]
    fn test_closed_engine_ignores_ticks() {
        let (mut engine, _sent, sink) = engine_with("{CCM} W\r\n");
        engine.close();
        assert!(!engine.tick().unwrap());
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_resync_step_dispatches_interleaved_frames() {
        // Query DCS; an unsolicited TON frame arrives before the reply.
        // Both must be dispatched and the DCS match still detected.
        let (mut engine, sent, sink) = engine_with("{TON} T\r\n{DCS} W1AW\r\n");
        engine.resync_step(opcode::DCS).unwrap();
        assert_eq!(sent_text(&sent), "[DCS] G\r\n");
        assert_eq!(sink.events(), vec!["transmit_on true", "callsign W1AW"]);
    }

    #[test]
    fn test_resync_step_gives_up_after_read_limit() {
        let (mut engine, sent, _sink) = engine_with("");
        engine.resync_step(opcode::DCS).unwrap();
        // Query sent, cap exhausted, no retry.
        assert_eq!(sent_text(&sent), "[DCS] G\r\n");
    }

    #[test]
    fn test_push_frame_dispatched_before_reply_recognized() {
        // End to end: query the callsign; the device emits a GPS time push
        // first. The time must reach the sink before the callsign does.
        let (mut engine, sent, sink) = engine_with("{GTM} 12:34:56\r\n{DCS} W1AW\r\n");
        engine.send(&Command::Query(opcode::DCS)).unwrap();
        assert_eq!(sent_text(&sent), "[DCS] G\r\n");

        engine.tick().unwrap();
        engine.tick().unwrap(); // leftover LF
        engine.tick().unwrap();
        assert_eq!(sink.events(), vec!["time 12:34:56", "callsign W1AW"]);
    }

    #[test]
    fn test_informational_frame_triggers_resync() {
        let (mut engine, sent, sink) = engine_with("{MIN} Booting\r\n");
        engine.tick().unwrap();

        assert_eq!(sink.events(), vec!["log Booting"]);
        let sent = sent_text(&sent);
        for code in RESYNC_OPCODES {
            assert!(sent.contains(&format!("[{code}] G\r\n")), "missing {code}");
        }
        // Queries go out in the fixed order.
        assert!(sent.find("[CCM] G").unwrap() < sent.find("[FLP] G").unwrap());
    }

    #[test]
    fn test_gps_time_flushes_satellite_batch() {
        let (mut engine, _sent, sink) = engine_with(
            "{GSI} 12 210 45 33\n{GSI} 04 090 10 17\n{GSI} bad entry\n{GTM} 08:15:00\n",
        );
        for _ in 0..4 {
            engine.tick().unwrap();
        }
        assert_eq!(sink.events(), vec!["time 08:15:00", "satellites 2"]);
    }

    #[test]
    fn test_malformed_gps_time_keeps_prior_clock() {
        let (mut engine, _sent, sink) = engine_with("{GTM} 12:34:56\r\n{GTM} garbage\r\n");
        engine.tick().unwrap();
        engine.tick().unwrap();
        engine.tick().unwrap();
        // The bad update is dropped silently: no second time event.
        assert_eq!(sink.events(), vec!["time 12:34:56"]);
    }

    #[test]
    fn test_generator_reply_syncs_register() {
        let (mut engine, _sent, sink) = engine_with("{DGF} 000140971025\r\n");
        engine.tick().unwrap();
        assert_eq!(engine.generator_frequency(), 140_971_025);
        assert_eq!(sink.events(), vec!["generator 000140971025"]);
    }

    #[test]
    fn test_generator_reply_out_of_range_requeries() {
        let (mut engine, sent, sink) = engine_with("{DGF} 999999999999\r\n");
        engine.tick().unwrap();
        assert_eq!(engine.generator_frequency(), 100_000_000);
        assert!(sink.events().is_empty());
        assert_eq!(sent_text(&sent), "[DGF] G\r\n");
    }

    #[test]
    fn test_generator_steps_send_and_mirror() {
        let (mut engine, sent, sink) = engine_with("");
        engine.generator_up(2).unwrap(); // +1 MHz
        engine.generator_down(10).unwrap(); // -1 cHz
        assert_eq!(engine.generator_frequency(), 199_999_999);
        assert_eq!(
            sent_text(&sent),
            "[DGF] S 000200000000\r\n[DGF] S 000199999999\r\n"
        );
        assert_eq!(
            sink.events(),
            vec!["generator 000200000000", "generator 000199999999"]
        );
    }

    #[test]
    fn test_generator_step_out_of_range_position_ignored() {
        let (mut engine, sent, _sink) = engine_with("");
        engine.generator_up(11).unwrap();
        assert_eq!(engine.generator_frequency(), 100_000_000);
        assert_eq!(sent_text(&sent), "");
    }

    #[test]
    fn test_set_callsign_stops_beacon_first() {
        let (mut engine, sent, _sink) = engine_with("");
        engine.set_callsign("W1AW/MOBILE").unwrap();
        assert_eq!(sent_text(&sent), "[CCM] S N\r\n[DCS] S W1AW/M\r\n");
    }

    #[test]
    fn test_set_bands_batch() {
        let (mut engine, sent, _sink) = engine_with("");
        let mut bands = [false; 16];
        bands[6] = true; // 20m
        engine.set_bands(&bands).unwrap();
        let sent = sent_text(&sent);
        assert!(sent.contains("[OBD] S 06 E\r\n"));
        assert!(sent.contains("[OBD] S 00 D\r\n"));
        assert!(sent.contains("[OBD] S 15 D\r\n"));
        assert_eq!(sent.matches("[OBD]").count(), 16);
    }

    #[test]
    fn test_oversize_pause_requeries_instead_of_sending() {
        let (mut engine, sent, _sink) = engine_with("");
        engine.set_tx_pause(100_000).unwrap();
        assert_eq!(sent_text(&sent), "[OTP] G\r\n");
    }

    #[test]
    fn test_reported_power_clamped_on_send() {
        let (mut engine, sent, _sink) = engine_with("");
        engine.set_reported_power(87).unwrap();
        assert_eq!(sent_text(&sent), "[DPD] S 60\r\n");
    }

    #[test]
    fn test_band_progress_reaches_sink() {
        let (mut engine, _sent, sink) = engine_with("{TWS} 06 103\r\n");
        engine.tick().unwrap();
        assert_eq!(sink.events(), vec!["band_progress 6 103"]);
    }
}
