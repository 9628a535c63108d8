//! Board-independent channel components.
//!
//! Each component owns its pins and runtime state and reaches the hardware
//! only through a small register-layout trait (or constant table) supplied
//! by the board family:
//!
//! | Component | Layout |
//! |-----------|--------|
//! | [`encoder::EncoderChannel`] | [`encoder::EncoderHw`] |
//! | [`adc::AdcPipeline`] | [`adc::AdcHw`] |
//! | [`dac::DacChannel`] | [`dac::DacTable`] |
//! | [`dio::DigitalPort`] | [`dio::PortLayout`] |
//! | [`watchdog::WatchdogSupervisor`] | [`watchdog::WatchdogHw`] |
//!
//! None of the scan methods allocate, sleep or fail.

pub mod adc;
pub mod dac;
pub mod dio;
pub mod encoder;
pub mod scale;
pub mod watchdog;

pub use adc::{AdcFormat, AdcHw, AdcPipeline, OffsetSign, PipelineState};
pub use dac::{DacChannel, DacTable};
pub use dio::{DigitalPort, PortDir, PortLayout, ResetOutcome, ResetSchedule};
pub use encoder::{EncoderChannel, EncoderHw};
pub use scale::ScaleCache;
pub use watchdog::{WatchdogConfig, WatchdogHw, WatchdogSupervisor, snap_timebase};
