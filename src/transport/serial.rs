use std::io;
use std::time::Duration;

use log::{debug, info, warn};

use crate::error::{Result, WsprError};

use super::Transport;

/// Serial settings the transmitter firmware expects: 9600 baud, 8N1, no
/// flow control.
const BAUD_RATE: u32 = 9600;
const DATA_BITS: serialport::DataBits = serialport::DataBits::Eight;
const STOP_BITS: serialport::StopBits = serialport::StopBits::One;
const PARITY: serialport::Parity = serialport::Parity::None;
const FLOW_CONTROL: serialport::FlowControl = serialport::FlowControl::None;

/// Per-read timeout. Bounds every blocking read the protocol layer makes.
const READ_TIMEOUT: Duration = Duration::from_secs(1);

/// A transport backed by a native serial port.
pub struct SerialTransport {
    port: Box<dyn serialport::SerialPort>,
}

impl SerialTransport {
    pub fn new(port: Box<dyn serialport::SerialPort>) -> Self {
        Self { port }
    }
}

impl Transport for SerialTransport {
    fn bytes_to_read(&mut self) -> io::Result<u32> {
        self.port
            .bytes_to_read()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }

    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let mut buf = [0u8; 1];
        match io::Read::read(&mut self.port, &mut buf) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(buf[0])),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        io::Write::write_all(&mut self.port, buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        io::Write::flush(&mut self.port)
    }
}

/// List the serial ports present on this machine.
///
/// Finding none is fatal at startup; there is nothing to configure against.
pub fn available_ports() -> Result<Vec<String>> {
    let ports = serialport::available_ports().map_err(WsprError::Serial)?;

    if ports.is_empty() {
        warn!("no serial ports found");
        return Err(WsprError::PortNotFound);
    }
    for port in &ports {
        debug!("found port: {} ({:?})", port.port_name, port.port_type);
    }
    Ok(ports.into_iter().map(|p| p.port_name).collect())
}

/// Open a serial port with the transmitter's fixed settings.
pub fn open_port(port_name: &str) -> Result<SerialTransport> {
    let port = serialport::new(port_name, BAUD_RATE)
        .data_bits(DATA_BITS)
        .stop_bits(STOP_BITS)
        .parity(PARITY)
        .flow_control(FLOW_CONTROL)
        .timeout(READ_TIMEOUT)
        .open()
        .map_err(WsprError::Serial)?;

    info!("opened {} at {} baud", port_name, BAUD_RATE);
    Ok(SerialTransport::new(port))
}
