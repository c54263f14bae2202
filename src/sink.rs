use crate::mode::{DeviceModel, LocatorSource, OperatingMode, PowerReportMode};
use crate::report::Satellite;

/// Receiver for state mirrored out of the device.
///
/// One update method per observable quantity, pushed one-way; the engine
/// never reads anything back through this trait. Every method defaults to a
/// no-op so a host implements only what it renders.
pub trait StatusSink: Send {
    /// UTC time, `hh:mm:ss`. Fed by GPS time frames and mirror-clock ticks.
    fn time(&mut self, _hhmmss: &str) {}

    /// Routine the transmitter is currently running.
    fn run_mode(&mut self, _mode: OperatingMode) {}

    /// Routine the transmitter starts at power-on.
    fn startup_mode(&mut self, _mode: OperatingMode) {}

    /// Configured pause between transmit cycles, in seconds.
    fn tx_pause(&mut self, _seconds: u32) {}

    /// Per-band transmit enable. `band` indexes [`crate::mode::BANDS`].
    fn band_enabled(&mut self, _band: usize, _enabled: bool) {}

    /// Whether the reported position comes from GPS or manual entry.
    fn locator_source(&mut self, _source: LocatorSource) {}

    /// Whether the power field carries power or encoded altitude.
    fn power_report_mode(&mut self, _mode: PowerReportMode) {}

    /// Configured callsign.
    fn callsign(&mut self, _call: &str) {}

    /// Manually configured Maidenhead locator.
    fn locator(&mut self, _locator: &str) {}

    /// Power reported in transmissions, dBm.
    fn reported_power(&mut self, _dbm: u8) {}

    /// User-assigned device name.
    fn device_name(&mut self, _name: &str) {}

    /// Signal generator frequency as its 12-digit decimal form.
    fn generator_digits(&mut self, _digits: &str) {}

    /// Detected transmitter model.
    fn device_model(&mut self, _model: &DeviceModel) {}

    fn hardware_version(&mut self, _version: &str) {}
    fn hardware_revision(&mut self, _revision: &str) {}
    fn firmware_version(&mut self, _version: &str) {}
    fn firmware_revision(&mut self, _revision: &str) {}

    /// A low-pass filter is fitted for `band`.
    fn filter_installed(&mut self, _band: usize) {}

    /// Maidenhead locator computed from the GPS fix.
    fn position(&mut self, _locator: &str) {}

    /// GPS position lock status.
    fn gps_lock(&mut self, _locked: bool) {}

    /// Visible GPS satellites, one batch per GPS time report.
    fn satellites(&mut self, _satellites: &[Satellite]) {}

    /// Current output frequency, in centihertz.
    fn transmit_frequency(&mut self, _centi_hz: u64) {}

    /// RF output on/off indicator.
    fn transmit_on(&mut self, _on: bool) {}

    /// Seconds elapsed in the pause part of the cycle.
    fn pause_progress(&mut self, _seconds: u32) {}

    /// Band queued for the next transmission.
    fn next_band(&mut self, _band: usize) {}

    /// Seconds elapsed in the transmission on `band`.
    fn band_progress(&mut self, _band: usize, _seconds: u16) {}

    /// One full pass over the enabled bands finished.
    fn cycle_complete(&mut self) {}

    /// Informational line from the microcontroller.
    fn log_line(&mut self, _line: &str) {}

    /// Link health: set once well-formed frames are arriving.
    fn link_ok(&mut self, _ok: bool) {}
}
