use thiserror::Error;

use crate::command::opcode;
use crate::frame::Frame;
use crate::mode::{BANDS, DeviceModel, LocatorSource, MAX_REPORTED_DBM, OperatingMode, PowerReportMode};

/// Why an inbound frame could not be turned into a [`Report`].
///
/// Neither case is fatal: an unknown opcode is reported and skipped (the
/// firmware may simply be newer than this client), and an invalid payload
/// is answered with a corrective query instead of a guess.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReportError {
    #[error("unknown opcode {0:?}")]
    UnknownOpcode(String),

    #[error("invalid {opcode} payload: {payload:?}")]
    InvalidPayload {
        opcode: &'static str,
        payload: String,
    },
}

/// One visible GPS satellite, from a `GSI` frame: `id az el snr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Satellite {
    pub id: u16,
    /// Azimuth in degrees.
    pub azimuth: u16,
    /// Elevation in degrees.
    pub elevation: u16,
    /// Signal-to-noise ratio in dB.
    pub snr: u16,
}

impl Satellite {
    /// Parse one satellite entry. Returns `None` for entries with missing
    /// or non-numeric fields; a bad entry is dropped from the batch rather
    /// than poisoning it.
    pub fn parse(line: &str) -> Option<Self> {
        let mut fields = line.split_whitespace();
        let id = parse_u16(fields.next()?)?;
        let azimuth = parse_u16(fields.next()?)?;
        let elevation = parse_u16(fields.next()?)?;
        let snr = parse_u16(fields.next()?)?;
        Some(Self {
            id,
            azimuth,
            elevation,
            snr,
        })
    }
}

/// A decoded inbound frame, one variant per known opcode.
///
/// The device makes no distinction between solicited replies and
/// unsolicited pushes, so neither does this type: every variant must be
/// safe to apply unsolicited, repeatedly, and in any order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Report {
    /// `CCM`: routine currently running.
    CurrentMode(OperatingMode),
    /// `OTP`: pause between transmit cycles, seconds.
    TxPause(u32),
    /// `OSM`: routine selected for power-on.
    StartupMode(OperatingMode),
    /// `OBD`: one band's transmit enable.
    BandEnabled { band: usize, enabled: bool },
    /// `OLC`: reported-position source.
    LocatorSource(LocatorSource),
    /// `OPW`: power-field contents.
    PowerReportMode(PowerReportMode),
    /// `DCS`: callsign.
    Callsign(String),
    /// `DL4`: manually entered Maidenhead locator.
    Locator(String),
    /// `DPD`: reported power, dBm (clamped to the WSPR maximum).
    ReportedPower(u8),
    /// `DNM`: user-assigned device name.
    DeviceName(String),
    /// `DGF`: signal generator frequency, centihertz.
    GeneratorFrequency(u64),
    /// `FPN`: factory product number.
    ProductModel(DeviceModel),
    /// `FHV` / `FHR`: hardware version and revision.
    HardwareVersion(String),
    HardwareRevision(String),
    /// `FSV` / `FSR`: firmware version and revision.
    FirmwareVersion(String),
    FirmwareRevision(String),
    /// `FRF`: reference oscillator frequency, raw text.
    ReferenceFrequency(String),
    /// `FLP`: a low-pass filter is fitted for this band.
    FilterInstalled(usize),
    /// `GL4`: Maidenhead locator from the GPS fix.
    GpsLocator(String),
    /// `GTM`: GPS time, raw `hh:mm:ss` text (the mirror clock parses it).
    GpsTime(String),
    /// `GLC`: GPS position lock.
    GpsLock(bool),
    /// `GSI`: one satellite entry, raw; accumulated until the next `GTM`.
    SatelliteInfo(String),
    /// `TFQ`: current output frequency, centihertz.
    TransmitFrequency(u64),
    /// `TON`: RF output on/off.
    TransmitOn(bool),
    /// `MPS`: pause progress, seconds.
    PauseProgress(u32),
    /// `MIN`: informational message; doubles as the liveness signal.
    Informational(String),
    /// `LPI`: low-pass filter selection, raw text.
    FilterSelected(String),
    /// `MVC`: microcontroller supply voltage, raw text.
    SupplyVoltage(String),
    /// `TBN`: band queued for the next transmission.
    NextBand(usize),
    /// `TWS`: band currently transmitting and seconds elapsed.
    BandStatus { band: usize, seconds: u16 },
    /// `TCC`: one full pass over the enabled bands finished.
    CycleComplete,
}

/// Decode a frame's payload against its opcode.
///
/// This is the command table: each arm is one handler's validation. No arm
/// panics on any input; bad payloads come back as errors for the engine
/// to answer with a corrective query.
pub fn parse(frame: &Frame) -> Result<Report, ReportError> {
    let data = frame.payload.as_str();
    let invalid = |op: &'static str| ReportError::InvalidPayload {
        opcode: op,
        payload: data.to_string(),
    };

    let report = match frame.opcode.as_str() {
        opcode::CCM => Report::CurrentMode(parse_mode(data).ok_or_else(|| invalid(opcode::CCM))?),
        opcode::OTP => Report::TxPause(parse_u32(data).ok_or_else(|| invalid(opcode::OTP))?),
        opcode::OSM => Report::StartupMode(parse_mode(data).ok_or_else(|| invalid(opcode::OSM))?),
        opcode::OBD => {
            let (band, enabled) = parse_band_enable(data).ok_or_else(|| invalid(opcode::OBD))?;
            Report::BandEnabled { band, enabled }
        }
        opcode::OLC => Report::LocatorSource(
            first_char(data)
                .and_then(LocatorSource::from_code)
                .ok_or_else(|| invalid(opcode::OLC))?,
        ),
        opcode::OPW => Report::PowerReportMode(
            first_char(data)
                .and_then(PowerReportMode::from_code)
                .ok_or_else(|| invalid(opcode::OPW))?,
        ),
        opcode::DCS => Report::Callsign(data.to_string()),
        opcode::DL4 => Report::Locator(data.to_string()),
        opcode::DPD => {
            let dbm = parse_u32(data).ok_or_else(|| invalid(opcode::DPD))?;
            Report::ReportedPower((dbm.min(MAX_REPORTED_DBM as u32)) as u8)
        }
        opcode::DNM => Report::DeviceName(data.to_string()),
        opcode::DGF => {
            if data.len() != 12 {
                return Err(invalid(opcode::DGF));
            }
            Report::GeneratorFrequency(parse_u64(data).ok_or_else(|| invalid(opcode::DGF))?)
        }
        opcode::FPN => Report::ProductModel(DeviceModel::from_product_number(data)),
        opcode::FHV => Report::HardwareVersion(data.to_string()),
        opcode::FHR => Report::HardwareRevision(data.to_string()),
        opcode::FSV => Report::FirmwareVersion(data.to_string()),
        opcode::FSR => Report::FirmwareRevision(data.to_string()),
        opcode::FRF => Report::ReferenceFrequency(data.to_string()),
        opcode::FLP => Report::FilterInstalled(parse_filter(data).ok_or_else(|| invalid(opcode::FLP))?),
        opcode::GL4 => Report::GpsLocator(data.to_string()),
        opcode::GTM => Report::GpsTime(data.to_string()),
        opcode::GLC => {
            Report::GpsLock(parse_bool(data).ok_or_else(|| invalid(opcode::GLC))?)
        }
        opcode::GSI => Report::SatelliteInfo(data.to_string()),
        opcode::TFQ => Report::TransmitFrequency(parse_u64(data).ok_or_else(|| invalid(opcode::TFQ))?),
        opcode::TON => Report::TransmitOn(parse_bool(data).ok_or_else(|| invalid(opcode::TON))?),
        opcode::MPS => Report::PauseProgress(parse_u32(data).ok_or_else(|| invalid(opcode::MPS))?),
        opcode::MIN => Report::Informational(data.to_string()),
        opcode::LPI => Report::FilterSelected(data.to_string()),
        opcode::MVC => Report::SupplyVoltage(data.to_string()),
        opcode::TBN => {
            let band = parse_u32(data).ok_or_else(|| invalid(opcode::TBN))? as usize;
            if band >= BANDS.len() {
                return Err(invalid(opcode::TBN));
            }
            Report::NextBand(band)
        }
        opcode::TWS => {
            let (band, seconds) = parse_band_status(data).ok_or_else(|| invalid(opcode::TWS))?;
            Report::BandStatus { band, seconds }
        }
        opcode::TCC => Report::CycleComplete,
        _ => return Err(ReportError::UnknownOpcode(frame.opcode.clone())),
    };
    Ok(report)
}

fn first_char(data: &str) -> Option<char> {
    data.chars().next()
}

/// Single-character mode payloads (`CCM`, `OSM`).
fn parse_mode(data: &str) -> Option<OperatingMode> {
    first_char(data).and_then(OperatingMode::from_code)
}

/// `T`/`F` payloads (`GLC`, `TON`).
fn parse_bool(data: &str) -> Option<bool> {
    match first_char(data)? {
        'T' => Some(true),
        'F' => Some(false),
        _ => None,
    }
}

fn all_digits(data: &str) -> bool {
    !data.is_empty() && data.bytes().all(|b| b.is_ascii_digit())
}

fn parse_u16(data: &str) -> Option<u16> {
    all_digits(data).then(|| data.parse().ok()).flatten()
}

fn parse_u32(data: &str) -> Option<u32> {
    all_digits(data).then(|| data.parse().ok()).flatten()
}

fn parse_u64(data: &str) -> Option<u64> {
    all_digits(data).then(|| data.parse().ok()).flatten()
}

/// Two-digit band index, range-checked against the band table.
fn band_index(data: &str) -> Option<usize> {
    let bytes = data.as_bytes();
    if bytes.len() != 2 || !bytes.iter().all(u8::is_ascii_digit) {
        return None;
    }
    let band = ((bytes[0] - b'0') * 10 + (bytes[1] - b'0')) as usize;
    (band < BANDS.len()).then_some(band)
}

/// `OBD` payload: `NN E` / `NN D`.
fn parse_band_enable(data: &str) -> Option<(usize, bool)> {
    if !data.is_ascii() || data.len() < 4 {
        return None;
    }
    let band = band_index(&data[..2])?;
    let enabled = match data.as_bytes()[3] {
        b'E' => true,
        b'D' => false,
        _ => return None,
    };
    Some((band, enabled))
}

/// `TWS` payload: `NN SSS` (band, seconds into the transmission).
fn parse_band_status(data: &str) -> Option<(usize, u16)> {
    if !data.is_ascii() || data.len() < 6 {
        return None;
    }
    let band = band_index(&data[..2])?;
    let seconds = parse_u16(&data[3..6])?;
    Some((band, seconds))
}

/// `FLP` payload: two filler characters, then the band index digits.
fn parse_filter(data: &str) -> Option<usize> {
    if !data.is_ascii() || data.len() < 3 {
        return None;
    }
    let band = parse_u32(&data[2..])? as usize;
    (band < BANDS.len()).then_some(band)
}
