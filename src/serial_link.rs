use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{self, Read, Write};
use std::time::Duration;

/// Line parameters expected by the analyzer firmware: 115200 baud, 8N1,
/// DTR asserted, RTS deasserted, no flow control.
pub const BAUD_RATE: u32 = 115_200;

/// Byte pipe the capture engine runs on.
///
/// The engine treats the link purely as a byte stream; all framing and timing
/// lives in the protocol layer. Implemented by [`FalaLink`] for real hardware
/// and by scripted doubles in tests.
pub trait ByteLink {
    /// Bounded read of whatever is available, up to `buf.len()` bytes.
    ///
    /// `Ok(0)` means the link was idle for the whole timeout, which is not an
    /// error. `Err` means a link fault.
    fn read_chunk(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize>;

    /// Bounded write, returning how many bytes the link accepted.
    fn write_chunk(&mut self, data: &[u8], timeout: Duration) -> io::Result<usize>;

    /// Drop any bytes queued on the receive side.
    fn discard_input(&mut self) -> io::Result<()>;
}

#[derive(Debug, thiserror::Error)]
pub enum FalaLinkError {
    #[error("Serial port error: {0}")]
    SerialPort(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Serial connection to the analyzer.
pub struct FalaLink {
    serial: Box<dyn SerialPort>,
}

impl FalaLink {
    /// Open `port` with the analyzer's line parameters.
    pub fn open(port: &str) -> Result<Self, FalaLinkError> {
        log::debug!("Opening {port} at {BAUD_RATE} baud");
        let mut serial = serialport::new(port, BAUD_RATE)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(Duration::from_millis(10))
            .open()?;

        serial.write_data_terminal_ready(true)?;
        serial.write_request_to_send(false)?;

        Ok(Self { serial })
    }

    /// Name of the underlying port, if the platform reports one.
    pub fn port_name(&self) -> Option<String> {
        self.serial.name()
    }
}

impl ByteLink for FalaLink {
    fn read_chunk(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        self.serial.set_timeout(timeout).map_err(io::Error::from)?;
        match self.serial.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {
                Ok(0)
            }
            Err(e) => Err(e),
        }
    }

    fn write_chunk(&mut self, data: &[u8], timeout: Duration) -> io::Result<usize> {
        self.serial.set_timeout(timeout).map_err(io::Error::from)?;
        self.serial.write(data)
    }

    fn discard_input(&mut self) -> io::Result<()> {
        self.serial
            .clear(ClearBuffer::Input)
            .map_err(io::Error::from)
    }
}
