use thiserror::Error;

/// Failure reported by a signal source or digitizer.
///
/// Only `Parse` is recoverable: the reply arrived but could not be read as a
/// number, so the instrument is still talking to us. Everything else means
/// the link itself is gone.
#[derive(Debug, Error)]
pub enum InstrumentError {
    #[error("malformed reply {reply:?}: {reason}")]
    Parse { reply: String, reason: String },
    #[error("connection to {instrument} lost: {reason}")]
    Connection { instrument: String, reason: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),
}

impl InstrumentError {
    pub fn parse(reply: impl Into<String>, reason: impl Into<String>) -> Self {
        InstrumentError::Parse {
            reply: reply.into(),
            reason: reason.into(),
        }
    }

    pub fn connection(instrument: impl Into<String>, reason: impl Into<String>) -> Self {
        InstrumentError::Connection {
            instrument: instrument.into(),
            reason: reason.into(),
        }
    }

    /// Whether the sweep may mark the point failed and carry on.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, InstrumentError::Parse { .. })
    }
}
