use crate::fala_scope::FalaScope;
use crate::header::{parse_header, CaptureHeader, MIN_HEADER_LEN};
use crate::serial_link::{ByteLink, FalaLink, FalaLinkError};
use serialport::SerialPortType;
use std::io;
use std::time::Duration;

/// Host → device byte asking for an identification header.
pub const IDENTIFY_BYTE: &[u8] = b"?";

/// Product name used when the port does not report one.
pub const DEVICE_LONGNAME: &str = "BP5+ binmode-FALA";

const IDENTIFY_READ_LEN: usize = 64;
const IDENTIFY_TIMEOUT: Duration = Duration::from_millis(100);

/// A port that answered the identification handshake.
#[derive(Debug, Clone)]
pub struct FalaDevice {
    pub name: String,
    pub port: String,
    /// Capabilities reported during identification (channel count, sample
    /// memory size, current sample rate).
    pub header: CaptureHeader,
}

#[derive(Debug, thiserror::Error)]
pub enum FalaConnectorError {
    #[error("Serial link error: {0}")]
    Link(#[from] FalaLinkError),

    #[error("Serial port error: {0}")]
    SerialPort(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Port {port} did not identify as a FALA device")]
    NotAFala { port: String },

    #[error("No FALA device found. Please connect one or specify the port manually")]
    DeviceNotFound,
}

pub struct FalaConnector;

impl FalaConnector {
    /// Connect to a FALA device and hand back an idle scope.
    ///
    /// With `port` given, that port is probed and opened; otherwise the first
    /// discovered device wins.
    pub fn connect(port: Option<&str>) -> Result<FalaScope, FalaConnectorError> {
        let device = match port {
            Some(port) => {
                log::debug!("Probing {port} for a FALA device");
                let header = Self::probe(port)?;
                FalaDevice {
                    name: DEVICE_LONGNAME.to_string(),
                    port: port.to_string(),
                    header,
                }
            }
            None => Self::get_available_devices()?
                .into_iter()
                .next()
                .ok_or(FalaConnectorError::DeviceNotFound)?,
        };
        FalaScope::open(&device).map_err(FalaConnectorError::Link)
    }

    /// Run the `"?"` identification handshake against one port.
    ///
    /// The port is opened just for the probe and closed again; opening for
    /// acquisition is a separate step.
    pub fn probe(port: &str) -> Result<CaptureHeader, FalaConnectorError> {
        let mut link = FalaLink::open(port)?;
        Self::identify(&mut link, port)
    }

    /// All ports currently answering the identification handshake.
    ///
    /// Only USB serial ports are considered. Ports that fail to open or to
    /// identify are skipped, not errors — a scan over absent devices is a
    /// normal outcome.
    pub fn get_available_devices() -> Result<Vec<FalaDevice>, FalaConnectorError> {
        let mut devices = Vec::new();
        for info in serialport::available_ports()? {
            let SerialPortType::UsbPort(usb) = &info.port_type else {
                continue;
            };
            match Self::probe(&info.port_name) {
                Ok(header) => {
                    let name = usb
                        .product
                        .clone()
                        .unwrap_or_else(|| DEVICE_LONGNAME.to_string());
                    devices.push(FalaDevice {
                        name,
                        port: info.port_name.clone(),
                        header,
                    });
                }
                Err(e) => {
                    log::debug!("Skipping {}: {e}", info.port_name);
                }
            }
        }
        Ok(devices)
    }

    fn identify(link: &mut dyn ByteLink, port: &str) -> Result<CaptureHeader, FalaConnectorError> {
        let written = link.write_chunk(IDENTIFY_BYTE, IDENTIFY_TIMEOUT)?;
        if written != IDENTIFY_BYTE.len() {
            return Err(FalaConnectorError::NotAFala {
                port: port.to_string(),
            });
        }

        let mut buf = [0u8; IDENTIFY_READ_LEN];
        let len = link.read_chunk(&mut buf, IDENTIFY_TIMEOUT)?;
        if len < MIN_HEADER_LEN {
            log::debug!("{port}: identify answer too short ({len} bytes)");
            return Err(FalaConnectorError::NotAFala {
                port: port.to_string(),
            });
        }

        parse_header(&buf[..len]).map_err(|e| {
            log::debug!("{port}: identify failed: {e}");
            FalaConnectorError::NotAFala {
                port: port.to_string(),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct FakePort {
        answer: Vec<u8>,
        written: Vec<u8>,
    }

    impl ByteLink for FakePort {
        fn read_chunk(&mut self, buf: &mut [u8], _timeout: Duration) -> io::Result<usize> {
            let n = self.answer.len().min(buf.len());
            buf[..n].copy_from_slice(&self.answer[..n]);
            self.answer.clear();
            Ok(n)
        }

        fn write_chunk(&mut self, data: &[u8], _timeout: Duration) -> io::Result<usize> {
            self.written.extend_from_slice(data);
            Ok(data.len())
        }

        fn discard_input(&mut self) -> io::Result<()> {
            self.answer.clear();
            Ok(())
        }
    }

    #[test]
    fn identify_accepts_a_fala_answer() {
        let mut port = FakePort {
            answer: b"$FALADATA;8;0;0;N;8000000;0;0;".to_vec(),
            ..FakePort::default()
        };
        let hd = FalaConnector::identify(&mut port, "/dev/ttyACM0").unwrap();
        assert_eq!(port.written, b"?");
        assert_eq!(hd.channel_count, 8);
        assert_eq!(hd.sample_rate, 8_000_000);
    }

    #[test]
    fn identify_rejects_silence_and_noise() {
        // No answer at all.
        let mut silent = FakePort::default();
        assert!(matches!(
            FalaConnector::identify(&mut silent, "/dev/ttyACM0"),
            Err(FalaConnectorError::NotAFala { .. })
        ));

        // Something talked back, but not a FALA header.
        let mut noisy = FakePort {
            answer: b"NMEA $GPGGA,123519,4807.038,N,".to_vec(),
            ..FakePort::default()
        };
        assert!(matches!(
            FalaConnector::identify(&mut noisy, "/dev/ttyACM0"),
            Err(FalaConnectorError::NotAFala { .. })
        ));
    }
}
