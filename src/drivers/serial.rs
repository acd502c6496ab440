//! Serial bridge backend.
//!
//! A small microcontroller sits between the sensors and the SBC and speaks a
//! line protocol over USB serial:
//! - host sends `RESET` or `CFG <gain> <data_rate>`, bridge answers `OK`
//! - otherwise the bridge streams one signed decimal count per line
//!
//! The bit-level HX711 clocking and the ADS1115 I2C transactions live on the
//! bridge firmware; this side only frames lines.
use std::io::{BufRead, BufReader, Write};
use std::time::Duration;
use serialport::SerialPort;
use crate::drivers::source::{LoadCellAmplifier, PressureAdc};
use crate::drivers::AcquisitionError;
const READ_TIMEOUT: Duration = Duration::from_secs(2);
pub struct SerialBridge {
    device: String,
    reader: BufReader<Box<dyn SerialPort>>,
    line: String,
}
impl SerialBridge {
    pub fn open(device: &str, port_name: &str, baud_rate: u32) -> Result<Self, AcquisitionError> {
        let port = serialport::new(port_name, baud_rate)
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(|e| AcquisitionError::init(device, format!("{port_name}: {e}")))?;
        log::info!("{device}: opened {port_name} at {baud_rate} baud");
        Ok(Self {
            device: device.to_owned(),
            reader: BufReader::new(port),
            line: String::new(),
        })
    }
    fn command(&mut self, cmd: &str) -> Result<(), AcquisitionError> {
        let device = self.device.clone();
        let port = self.reader.get_mut();
        port.write_all(format!("{cmd}\n").as_bytes())
            .and_then(|_| port.flush())
            .map_err(|e| AcquisitionError::init(&device, format!("{cmd}: {e}")))?;
        // skip samples still in flight until the acknowledgement shows up
        for _ in 0..64 {
            let reply = self
                .next_line()
                .map_err(|e| AcquisitionError::init(&device, format!("{cmd}: {e}")))?;
            if reply == "OK" {
                return Ok(());
            }
            if let Some(reason) = reply.strip_prefix("ERR") {
                return Err(AcquisitionError::init(&device, format!("{cmd}:{reason}")));
            }
        }
        Err(AcquisitionError::init(&device, format!("{cmd}: no acknowledgement")))
    }
    fn next_line(&mut self) -> Result<&str, AcquisitionError> {
        self.line.clear();
        let n = self
            .reader
            .read_line(&mut self.line)
            .map_err(|e| AcquisitionError::read(&self.device, e))?;
        if n == 0 {
            return Err(AcquisitionError::Closed(self.device.clone()));
        }
        Ok(self.line.trim())
    }
    fn next_count(&mut self) -> Result<i64, AcquisitionError> {
        let device = self.device.clone();
        let line = self.next_line()?;
        parse_count(line).ok_or_else(|| AcquisitionError::read(&device, format!("bad line '{line}'")))
    }
}
fn parse_count(line: &str) -> Option<i64> {
    line.parse().ok()
}
impl LoadCellAmplifier for SerialBridge {
    fn reset(&mut self) -> Result<(), AcquisitionError> {
        self.command("RESET")
    }
    fn read_raw(&mut self) -> Result<i32, AcquisitionError> {
        let count = self.next_count()?;
        // HX711 output is 24-bit two's complement
        if !(-(1 << 23)..(1 << 23)).contains(&count) {
            return Err(AcquisitionError::read(&self.device, format!("{count} out of 24-bit range")));
        }
        Ok(count as i32)
    }
}
impl PressureAdc for SerialBridge {
    fn configure(&mut self, gain: u8, data_rate: u16) -> Result<(), AcquisitionError> {
        self.command(&format!("CFG {gain} {data_rate}"))
    }
    fn read_raw(&mut self) -> Result<i16, AcquisitionError> {
        let count = self.next_count()?;
        i16::try_from(count)
            .map_err(|_| AcquisitionError::read(&self.device, format!("{count} out of 16-bit range")))
    }
}
impl Drop for SerialBridge {
    fn drop(&mut self) {
        log::info!("{}: releasing serial bridge", self.device);
    }
}
