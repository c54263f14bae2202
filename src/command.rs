use crate::frame;
use crate::mode::{LocatorSource, OperatingMode, PowerReportMode};

/// Three-letter opcodes spoken by the transmitter firmware.
///
/// The same opcode is used in both directions: the client sends
/// `[OPC] G` to query and `[OPC] S <value>` to set, and the device
/// answers (or pushes unsolicited) `{OPC} <value>`.
pub mod opcode {
    /// Current running mode (idle / beacon / generator).
    pub const CCM: &str = "CCM";
    /// Pause between transmit cycles, seconds.
    pub const OTP: &str = "OTP";
    /// Mode started at power-on.
    pub const OSM: &str = "OSM";
    /// Per-band transmit enable.
    pub const OBD: &str = "OBD";
    /// Reported-position source (GPS or manual).
    pub const OLC: &str = "OLC";
    /// Power-field contents (power or encoded altitude).
    pub const OPW: &str = "OPW";
    /// Callsign.
    pub const DCS: &str = "DCS";
    /// Maidenhead locator, manual entry.
    pub const DL4: &str = "DL4";
    /// Reported power, dBm.
    pub const DPD: &str = "DPD";
    /// User-assigned device name.
    pub const DNM: &str = "DNM";
    /// Signal generator frequency, 12 digits of centihertz.
    pub const DGF: &str = "DGF";
    /// Factory product number.
    pub const FPN: &str = "FPN";
    /// Hardware version.
    pub const FHV: &str = "FHV";
    /// Hardware revision.
    pub const FHR: &str = "FHR";
    /// Firmware version.
    pub const FSV: &str = "FSV";
    /// Firmware revision.
    pub const FSR: &str = "FSR";
    /// Reference oscillator frequency.
    pub const FRF: &str = "FRF";
    /// Low-pass filter fitted for a band.
    pub const FLP: &str = "FLP";
    /// GPS-derived Maidenhead locator.
    pub const GL4: &str = "GL4";
    /// GPS time of day.
    pub const GTM: &str = "GTM";
    /// GPS position lock.
    pub const GLC: &str = "GLC";
    /// Visible GPS satellite entry.
    pub const GSI: &str = "GSI";
    /// Current output frequency, centihertz.
    pub const TFQ: &str = "TFQ";
    /// RF output on/off.
    pub const TON: &str = "TON";
    /// Pause progress, seconds.
    pub const MPS: &str = "MPS";
    /// Informational message; also the liveness signal.
    pub const MIN: &str = "MIN";
    /// Low-pass filter selection.
    pub const LPI: &str = "LPI";
    /// Microcontroller supply voltage.
    pub const MVC: &str = "MVC";
    /// Band queued for the next transmission.
    pub const TBN: &str = "TBN";
    /// Band currently transmitting and seconds elapsed.
    pub const TWS: &str = "TWS";
    /// Transmit cycle complete.
    pub const TCC: &str = "TCC";
    /// Save settings to EEPROM (outbound only).
    pub const CSE: &str = "CSE";
}

/// Settings re-queried, in this order, by the full-state resync routine.
pub const RESYNC_OPCODES: [&str; 18] = [
    opcode::CCM,
    opcode::OTP,
    opcode::OSM,
    opcode::OBD,
    opcode::OLC,
    opcode::OPW,
    opcode::DCS,
    opcode::DL4,
    opcode::DPD,
    opcode::DNM,
    opcode::DGF,
    opcode::FPN,
    opcode::FHV,
    opcode::FHR,
    opcode::FSV,
    opcode::FSR,
    opcode::FRF,
    opcode::FLP,
];

/// An outbound command to the transmitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Ask for the current value of a setting (`[OPC] G`).
    Query(&'static str),
    /// Switch the running mode: start the beacon, the generator, or idle.
    SetMode(OperatingMode),
    /// Select the mode started at power-on.
    SetStartupMode(OperatingMode),
    /// Enable or disable one band. `band` indexes [`crate::mode::BANDS`].
    SetBandEnabled { band: usize, enabled: bool },
    /// Pause between transmit cycles, seconds (five digits on the wire).
    SetTxPause(u32),
    /// Select where the reported position comes from.
    SetLocatorSource(LocatorSource),
    /// Select what the power field carries.
    SetPowerReportMode(PowerReportMode),
    /// Set the callsign.
    SetCallsign(String),
    /// Set the manual Maidenhead locator.
    SetLocator(String),
    /// Set the reported power, dBm (two digits on the wire).
    SetReportedPower(u8),
    /// Set the user-assigned device name.
    SetDeviceName(String),
    /// Set the signal generator frequency, centihertz (twelve digits).
    SetGeneratorFrequency(u64),
    /// Persist the current settings to EEPROM.
    SaveSettings,
    /// Raw diagnostic passthrough; sent verbatim, no opcode, no terminator.
    Raw(String),
}

impl Command {
    /// Render this command to its wire representation.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Command::Query(op) => frame::encode_command(op, "G"),
            Command::SetMode(mode) => {
                frame::encode_command(opcode::CCM, &format!("S {}", mode.code()))
            }
            Command::SetStartupMode(mode) => {
                frame::encode_command(opcode::OSM, &format!("S {}", mode.code()))
            }
            Command::SetBandEnabled { band, enabled } => {
                let state = if *enabled { 'E' } else { 'D' };
                frame::encode_command(opcode::OBD, &format!("S {band:02} {state}"))
            }
            Command::SetTxPause(seconds) => {
                frame::encode_command(opcode::OTP, &format!("S {seconds:05}"))
            }
            Command::SetLocatorSource(source) => {
                frame::encode_command(opcode::OLC, &format!("S {}", source.code()))
            }
            Command::SetPowerReportMode(mode) => {
                frame::encode_command(opcode::OPW, &format!("S {}", mode.code()))
            }
            Command::SetCallsign(call) => frame::encode_command(opcode::DCS, &format!("S {call}")),
            Command::SetLocator(locator) => {
                frame::encode_command(opcode::DL4, &format!("S {locator}"))
            }
            Command::SetReportedPower(dbm) => {
                frame::encode_command(opcode::DPD, &format!("S {dbm:02}"))
            }
            Command::SetDeviceName(name) => {
                frame::encode_command(opcode::DNM, &format!("S {name}"))
            }
            Command::SetGeneratorFrequency(centi_hz) => {
                frame::encode_command(opcode::DGF, &format!("S {centi_hz:012}"))
            }
            Command::SaveSettings => frame::encode_command(opcode::CSE, "S"),
            Command::Raw(text) => frame::encode_command("", text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_rendering() {
        assert_eq!(Command::Query(opcode::DCS).to_bytes(), b"[DCS] G\r\n");
        assert_eq!(Command::Query(opcode::DGF).to_bytes(), b"[DGF] G\r\n");
    }

    #[test]
    fn test_set_mode_rendering() {
        assert_eq!(
            Command::SetMode(OperatingMode::WsprBeacon).to_bytes(),
            b"[CCM] S W\r\n"
        );
        assert_eq!(
            Command::SetMode(OperatingMode::Idle).to_bytes(),
            b"[CCM] S N\r\n"
        );
        assert_eq!(
            Command::SetStartupMode(OperatingMode::SignalGenerator).to_bytes(),
            b"[OSM] S S\r\n"
        );
    }

    #[test]
    fn test_band_enable_zero_padded() {
        assert_eq!(
            Command::SetBandEnabled {
                band: 6,
                enabled: true
            }
            .to_bytes(),
            b"[OBD] S 06 E\r\n"
        );
        assert_eq!(
            Command::SetBandEnabled {
                band: 15,
                enabled: false
            }
            .to_bytes(),
            b"[OBD] S 15 D\r\n"
        );
    }

    #[test]
    fn test_tx_pause_five_digits() {
        assert_eq!(Command::SetTxPause(0).to_bytes(), b"[OTP] S 00000\r\n");
        assert_eq!(Command::SetTxPause(480).to_bytes(), b"[OTP] S 00480\r\n");
        assert_eq!(Command::SetTxPause(99_999).to_bytes(), b"[OTP] S 99999\r\n");
    }

    #[test]
    fn test_reported_power_two_digits() {
        assert_eq!(Command::SetReportedPower(0).to_bytes(), b"[DPD] S 00\r\n");
        assert_eq!(Command::SetReportedPower(23).to_bytes(), b"[DPD] S 23\r\n");
    }

    #[test]
    fn test_generator_frequency_twelve_digits() {
        assert_eq!(
            Command::SetGeneratorFrequency(140_971_025).to_bytes(),
            b"[DGF] S 000140971025\r\n"
        );
    }

    #[test]
    fn test_text_commands() {
        assert_eq!(
            Command::SetCallsign("W1AW".to_string()).to_bytes(),
            b"[DCS] S W1AW\r\n"
        );
        assert_eq!(
            Command::SetLocator("FN31".to_string()).to_bytes(),
            b"[DL4] S FN31\r\n"
        );
        assert_eq!(Command::SaveSettings.to_bytes(), b"[CSE] S\r\n");
    }

    #[test]
    fn test_raw_passthrough_untouched() {
        assert_eq!(
            Command::Raw("[CCM] G\r\n".to_string()).to_bytes(),
            b"[CCM] G\r\n"
        );
    }

    #[test]
    fn test_resync_order() {
        assert_eq!(RESYNC_OPCODES.len(), 18);
        assert_eq!(RESYNC_OPCODES[0], opcode::CCM);
        assert_eq!(RESYNC_OPCODES[17], opcode::FLP);
        // Every entry unique.
        for (i, a) in RESYNC_OPCODES.iter().enumerate() {
            assert!(!RESYNC_OPCODES[i + 1..].contains(a));
        }
    }
}
