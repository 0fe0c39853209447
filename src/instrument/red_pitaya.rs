//! Red Pitaya digitizer over SCPI/TCP.
//!
//! Protocol (text, `\r\n` terminated):
//! - `ACQ:START` / `ACQ:STOP` arm and freeze the acquisition buffer
//! - `ACQ:SOUR{n}:DATA?` returns the buffer as `{v0,v1,...}`
//!
//! The probe value is field 1 of the reply. A reply that arrives but cannot be
//! read as a number is a recoverable `Parse` error; socket failures are not.

use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

use log::{debug, info, warn};

use crate::instrument::{Digitizer, InstrumentError};

pub const DEFAULT_PORT: u16 = 5000;

/// Index of the buffer field used as the sample value.
const SAMPLE_FIELD: usize = 1;

pub struct RedPitaya {
    host: String,
    reader: BufReader<TcpStream>,
    closed: bool,
}

impl RedPitaya {
    pub fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self, InstrumentError> {
        let addr = (host, port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| InstrumentError::connection(host, "host name did not resolve"))?;
        let stream = TcpStream::connect_timeout(&addr, timeout)?;
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;
        stream.set_nodelay(true)?;
        info!("Connected to Red Pitaya at {addr}");

        Ok(Self {
            host: host.to_string(),
            reader: BufReader::new(stream),
            closed: false,
        })
    }

    fn send(&mut self, command: &str) -> Result<(), InstrumentError> {
        if self.closed {
            return Err(InstrumentError::connection(&self.host, "connection already closed"));
        }
        let stream = self.reader.get_mut();
        stream.write_all(command.as_bytes())?;
        stream.write_all(b"\r\n")?;
        Ok(())
    }

    fn query(&mut self, command: &str) -> Result<String, InstrumentError> {
        self.send(command)?;
        let mut line = Vec::new();
        let n = self.reader.read_until(b'\n', &mut line)?;
        if n == 0 {
            return Err(InstrumentError::connection(&self.host, "connection closed by peer"));
        }
        Ok(String::from_utf8_lossy(&line).trim_end().to_string())
    }
}

impl Digitizer for RedPitaya {
    fn trigger_acquisition(&mut self) -> Result<(), InstrumentError> {
        self.send("ACQ:START")?;
        self.send("ACQ:STOP")
    }

    fn read_channel_sample(&mut self, channel: u8) -> Result<f64, InstrumentError> {
        let reply = self.query(&format!("ACQ:SOUR{channel}:DATA?"))?;
        let value = parse_data_reply(&reply, SAMPLE_FIELD);
        if let Err(e) = &value {
            debug!("Unreadable reply on channel {channel}: {e}");
        }
        value
    }

    fn close(&mut self) -> Result<(), InstrumentError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        match self.reader.get_ref().shutdown(Shutdown::Both) {
            Ok(()) => {
                info!("Closed Red Pitaya connection ({})", self.host);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotConnected => {
                warn!("Red Pitaya connection ({}) was already down", self.host);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Extract field `index` from a `{v0,v1,...}` buffer reply.
pub fn parse_data_reply(reply: &str, index: usize) -> Result<f64, InstrumentError> {
    let body = reply.trim().trim_start_matches('{').trim_end_matches('}');
    let field = body
        .split(',')
        .nth(index)
        .ok_or_else(|| InstrumentError::parse(reply, format!("missing field {index}")))?;
    let value: f64 = field
        .trim()
        .parse()
        .map_err(|e| InstrumentError::parse(reply, format!("field {index}: {e}")))?;
    if !value.is_finite() {
        return Err(InstrumentError::parse(reply, format!("field {index} is not finite")));
    }
    Ok(value)
}
