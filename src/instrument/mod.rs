//! Instrument capabilities used by the sweep controller.
//!
//! The controller only knows the two traits below. Concrete drivers:
//!
//! - `RedPitaya`: SCPI digitizer over TCP
//! - `SynthHd`: Windfreak SynthHD microwave source over a serial port
//! - `SimulatedBench`: an in-process source/digitizer pair with a synthetic resonance

pub mod error;
pub mod red_pitaya;
pub mod sim;
pub mod synth_hd;

pub use error::InstrumentError;
pub use red_pitaya::RedPitaya;
pub use sim::{BenchSettings, SimulatedBench, SimulatedDigitizer, SimulatedSource};
pub use synth_hd::SynthHd;

/// A tunable microwave source.
pub trait SignalSource {
    fn enable(&mut self, on: bool) -> Result<(), InstrumentError>;
    fn set_power(&mut self, dbm: f64) -> Result<(), InstrumentError>;
    fn set_frequency(&mut self, mhz: f64) -> Result<(), InstrumentError>;
}

/// A sampling front-end that can be triggered and read one channel at a time.
pub trait Digitizer {
    fn trigger_acquisition(&mut self) -> Result<(), InstrumentError>;
    fn read_channel_sample(&mut self, channel: u8) -> Result<f64, InstrumentError>;
    /// Release the connection. Called exactly once at the end of a sweep.
    fn close(&mut self) -> Result<(), InstrumentError>;
}
