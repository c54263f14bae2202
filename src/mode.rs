use std::fmt;

/// Software routine the transmitter runs.
///
/// The firmware reports this in `CCM` (current mode) frames and accepts it
/// in `CCM`/`OSM` set commands as a single character: `N` idle, `W` WSPR
/// beacon, `S` signal generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatingMode {
    /// Idle, no RF output.
    Idle,
    /// WSPR beacon cycle.
    WsprBeacon,
    /// Constant-carrier signal generator.
    SignalGenerator,
}

impl OperatingMode {
    /// Decode from the single-character wire code.
    pub fn from_code(code: char) -> Option<Self> {
        match code {
            'N' => Some(Self::Idle),
            'W' => Some(Self::WsprBeacon),
            'S' => Some(Self::SignalGenerator),
            _ => None,
        }
    }

    /// Encode to the single-character wire code.
    pub fn code(self) -> char {
        match self {
            Self::Idle => 'N',
            Self::WsprBeacon => 'W',
            Self::SignalGenerator => 'S',
        }
    }
}

impl fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::WsprBeacon => write!(f, "WSPR Beacon"),
            Self::SignalGenerator => write!(f, "Signal Generator"),
        }
    }
}

/// Where the reported Maidenhead position comes from (`OLC` frames).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocatorSource {
    /// Position computed from the GPS fix.
    Gps,
    /// Position entered by the user.
    Manual,
}

impl LocatorSource {
    pub fn from_code(code: char) -> Option<Self> {
        match code {
            'G' => Some(Self::Gps),
            'M' => Some(Self::Manual),
            _ => None,
        }
    }

    pub fn code(self) -> char {
        match self {
            Self::Gps => 'G',
            Self::Manual => 'M',
        }
    }
}

/// How the power field of the WSPR transmission is filled (`OPW` frames).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PowerReportMode {
    /// Report the configured output power.
    Normal,
    /// Encode GPS altitude into the power field (balloon flights).
    Altitude,
}

impl PowerReportMode {
    pub fn from_code(code: char) -> Option<Self> {
        match code {
            'N' => Some(Self::Normal),
            'A' => Some(Self::Altitude),
            _ => None,
        }
    }

    pub fn code(self) -> char {
        match self {
            Self::Normal => 'N',
            Self::Altitude => 'A',
        }
    }
}

/// Transmitter model, decoded from the factory product number (`FPN` frames).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceModel {
    /// WSPR TX LP1 (product 01011).
    Lp1,
    /// WSPR TX Desktop (product 01012).
    Desktop,
    /// WSPR Mini (product 01017).
    Mini,
    /// Product number this client does not know.
    Unknown(String),
}

impl DeviceModel {
    pub fn from_product_number(number: &str) -> Self {
        match number {
            "01011" => Self::Lp1,
            "01012" => Self::Desktop,
            "01017" => Self::Mini,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for DeviceModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lp1 => write!(f, "WSPR TX LP1"),
            Self::Desktop => write!(f, "WSPR TX Desktop"),
            Self::Mini => write!(f, "WSPR Mini"),
            Self::Unknown(number) => write!(f, "unknown device ({number})"),
        }
    }
}

/// Amateur bands the transmitter can cycle through, in firmware band-index
/// order. Band indices on the wire (`OBD`, `TBN`, `TWS`, `FLP`) index into
/// this table.
pub const BANDS: [&str; 16] = [
    "2190m", "630m", "160m", "80m", "40m", "30m", "20m", "17m", "15m", "12m", "10m", "6m", "4m",
    "2m", "70cm", "23cm",
];

/// Power levels (dBm) the WSPR protocol can encode.
pub const POWER_LEVELS: [u8; 19] = [
    0, 3, 7, 10, 13, 17, 20, 23, 27, 30, 33, 37, 40, 43, 47, 50, 53, 57, 60,
];

/// Largest reportable power; `DPD` values above this are clamped.
pub const MAX_REPORTED_DBM: u8 = 60;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operating_mode_roundtrip() {
        for mode in [
            OperatingMode::Idle,
            OperatingMode::WsprBeacon,
            OperatingMode::SignalGenerator,
        ] {
            assert_eq!(OperatingMode::from_code(mode.code()), Some(mode));
        }
    }

    #[test]
    fn test_operating_mode_unknown_code() {
        assert_eq!(OperatingMode::from_code('X'), None);
        assert_eq!(OperatingMode::from_code('n'), None);
    }

    #[test]
    fn test_locator_source_roundtrip() {
        assert_eq!(LocatorSource::from_code('G'), Some(LocatorSource::Gps));
        assert_eq!(LocatorSource::from_code('M'), Some(LocatorSource::Manual));
        assert_eq!(LocatorSource::from_code('Z'), None);
    }

    #[test]
    fn test_power_report_mode_roundtrip() {
        assert_eq!(PowerReportMode::from_code('N'), Some(PowerReportMode::Normal));
        assert_eq!(PowerReportMode::from_code('A'), Some(PowerReportMode::Altitude));
        assert_eq!(PowerReportMode::from_code('G'), None);
    }

    #[test]
    fn test_device_model_decode() {
        assert_eq!(DeviceModel::from_product_number("01011"), DeviceModel::Lp1);
        assert_eq!(DeviceModel::from_product_number("01012"), DeviceModel::Desktop);
        assert_eq!(DeviceModel::from_product_number("01017"), DeviceModel::Mini);
        assert_eq!(
            DeviceModel::from_product_number("99999"),
            DeviceModel::Unknown("99999".to_string())
        );
    }

    #[test]
    fn test_band_table() {
        assert_eq!(BANDS.len(), 16);
        assert_eq!(BANDS[0], "2190m");
        assert_eq!(BANDS[15], "23cm");
    }

    #[test]
    fn test_power_levels_sorted() {
        assert!(POWER_LEVELS.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(*POWER_LEVELS.last().unwrap(), MAX_REPORTED_DBM);
    }
}
