//! Windfreak SynthHD (Mini) microwave source over a serial port.
//!
//! The synthesizer takes short ASCII commands:
//! - `f1775.3000000` frequency in MHz
//! - `W10.000` output power in dBm
//! - `E1r1` / `E0r0` PLL + RF output on / off

use std::io::Write;
use std::time::Duration;

use log::{debug, info};
use serialport::SerialPort;

use crate::instrument::{InstrumentError, SignalSource};

pub const BAUD_RATE: u32 = 115_200;

pub struct SynthHd {
    device: String,
    port: Box<dyn SerialPort>,
}

impl SynthHd {
    pub fn open(device: &str, timeout: Duration) -> Result<Self, InstrumentError> {
        let port = serialport::new(device, BAUD_RATE).timeout(timeout).open()?;
        info!("Opened SynthHD on {device}");
        Ok(Self {
            device: device.to_string(),
            port,
        })
    }

    fn command(&mut self, command: &str) -> Result<(), InstrumentError> {
        debug!("{} <- {command}", self.device);
        self.port.write_all(command.as_bytes())?;
        self.port.flush()?;
        Ok(())
    }
}

impl SignalSource for SynthHd {
    fn enable(&mut self, on: bool) -> Result<(), InstrumentError> {
        self.command(enable_command(on))
    }

    fn set_power(&mut self, dbm: f64) -> Result<(), InstrumentError> {
        self.command(&power_command(dbm))
    }

    fn set_frequency(&mut self, mhz: f64) -> Result<(), InstrumentError> {
        self.command(&frequency_command(mhz))
    }
}

fn enable_command(on: bool) -> &'static str {
    if on { "E1r1" } else { "E0r0" }
}

fn power_command(dbm: f64) -> String {
    format!("W{dbm:.3}")
}

fn frequency_command(mhz: f64) -> String {
    format!("f{mhz:.7}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_formatting() {
        assert_eq!(frequency_command(1775.3), "f1775.3000000");
        assert_eq!(power_command(10.0), "W10.000");
        assert_eq!(enable_command(true), "E1r1");
        assert_eq!(enable_command(false), "E0r0");
    }
}
