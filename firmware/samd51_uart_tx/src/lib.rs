#![cfg_attr(not(test), no_std)]

// Public modules for testing
pub mod baud;
pub mod config;
pub mod frame;
pub mod handshake;
pub mod monitor;
pub mod transmitter;
pub mod validate;
pub mod writer;

pub use config::{FrameFormat, Generics, Parity, ParityMode, StopBits};
pub use monitor::{LineError, LineMonitor, Received};
pub use transmitter::{ConfigError, Transmitter, TxInput, TxOutput};
pub use validate::{validate, Diagnostic, Diagnostics, Level};
pub use writer::StreamWriter;
