// Byte transport and timing collaborators for the motor controller
//
// The controller only ever writes complete frames and waits; both are behind
// traits so a recording fake can stand in for the serial port in tests.

use serialport::SerialPort;
use std::io::Write;
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

use super::rrc::{Result, RrcError};

/// Default serial configuration for the RRC board
pub const DEFAULT_BAUDRATE: u32 = 1_000_000;
pub const DEFAULT_TIMEOUT_MS: u64 = 1000;

/// Duplex byte stream the controller writes frames to
pub trait Transport {
    /// Write one complete frame
    fn write(&mut self, bytes: &[u8]) -> Result<()>;

    /// Release the underlying device
    fn close(&mut self) -> Result<()>;
}

/// Real-time wait used between pulses
pub trait Delay {
    fn sleep(&mut self, duration: Duration);
}

/// Blocks the calling thread
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadDelay;

impl Delay for ThreadDelay {
    fn sleep(&mut self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Serial-port transport to the board
pub struct SerialTransport {
    port: Option<Box<dyn SerialPort>>,
    name: String,
}

impl SerialTransport {
    /// Open a connection to the board
    pub fn open_with_baudrate(port_name: &str, baudrate: u32) -> Result<Self> {
        let mut port = serialport::new(port_name, baudrate)
            .timeout(Duration::from_millis(DEFAULT_TIMEOUT_MS))
            .open()?;

        // The board's MCU resets when DTR toggles
        port.write_request_to_send(false)?;
        port.write_data_terminal_ready(false)?;

        info!("Connected to {} at {} baud", port_name, baudrate);
        Ok(Self {
            port: Some(port),
            name: port_name.to_string(),
        })
    }
}

impl Transport for SerialTransport {
    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let port = self.port.as_mut().ok_or(RrcError::NotConnected)?;
        port.write_all(bytes)?;
        port.flush()?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(mut port) = self.port.take() {
            port.flush()?;
            debug!("Closed serial port {}", self.name);
        }
        Ok(())
    }
}
