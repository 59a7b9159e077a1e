/// Line Monitor
/// Receiver-side sampler that rebuilds words from the serial line, edge by edge
///
/// Reads the line the way a UART receiver does: wait for the falling edge of a
/// start bit, move half a bit period in, then sample once per bit period.

use core::fmt;

use crate::config::{FrameFormat, Parity};
use crate::frame::{parity_bit, Field};

/// A frame read back off the line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Received {
    pub data: u16,
    pub parity_bit: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineError {
    /// Line was back high by the middle of the start bit
    StartGlitch,
    /// Parity bit disagrees with the data bits
    ParityMismatch { data: u16, expected: bool, seen: bool },
    /// A stop bit read low
    MissingStopBit { index: u8 },
}

impl fmt::Display for LineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineError::StartGlitch => f.write_str("start bit did not hold low"),
            LineError::ParityMismatch { data, expected, seen } => write!(
                f,
                "parity bit for 0x{:03X} is {}, expected {}",
                data, *seen as u8, *expected as u8
            ),
            LineError::MissingStopBit { index } => write!(f, "stop bit {} read low", index),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Receiving {
        field: Field,
        /// Edges left before the next sample
        countdown: u32,
        data: u16,
        parity: Option<bool>,
    },
}

pub struct LineMonitor {
    format: FrameFormat,
    divisor: u32,
    phase: Phase,
    last_level: bool,
}

impl LineMonitor {
    /// `divisor` is the transmitter's clock edges per bit
    pub fn new(format: FrameFormat, divisor: u32) -> Self {
        LineMonitor {
            format,
            divisor: divisor.max(1),
            phase: Phase::Idle,
            last_level: true,
        }
    }

    /// Waiting for a start bit
    pub fn is_idle(&self) -> bool {
        self.phase == Phase::Idle
    }

    /// Feed the line level seen after one clock edge. Returns a result once
    /// the last stop bit has been sampled, or as soon as the frame is known bad.
    pub fn observe(&mut self, level: bool) -> Option<Result<Received, LineError>> {
        let previous = core::mem::replace(&mut self.last_level, level);
        if self.phase == Phase::Idle {
            if !(previous && !level) {
                return None;
            }
            self.phase = Phase::Receiving {
                field: Field::Start,
                countdown: self.divisor / 2,
                data: 0,
                parity: None,
            };
        }
        self.receive(level)
    }

    fn receive(&mut self, level: bool) -> Option<Result<Received, LineError>> {
        let Phase::Receiving {
            field,
            countdown,
            mut data,
            mut parity,
        } = self.phase
        else {
            return None;
        };

        if countdown > 0 {
            self.phase = Phase::Receiving {
                field,
                countdown: countdown - 1,
                data,
                parity,
            };
            return None;
        }

        let failure = match field {
            Field::Start if level => Some(LineError::StartGlitch),
            Field::Start => None,
            Field::Data(i) => {
                if level {
                    data |= 1 << i;
                }
                None
            }
            Field::Parity => {
                parity = Some(level);
                let expected = match self.format.parity {
                    Parity::Even => parity_bit(data),
                    Parity::Odd => !parity_bit(data),
                    // No parity field is sent without parity
                    Parity::None => level,
                };
                if level != expected {
                    Some(LineError::ParityMismatch {
                        data,
                        expected,
                        seen: level,
                    })
                } else {
                    None
                }
            }
            Field::Stop(index) if !level => Some(LineError::MissingStopBit { index }),
            Field::Stop(_) => None,
        };

        if let Some(error) = failure {
            self.phase = Phase::Idle;
            return Some(Err(error));
        }

        match field.next(&self.format) {
            Some(next) => {
                self.phase = Phase::Receiving {
                    field: next,
                    countdown: self.divisor - 1,
                    data,
                    parity,
                };
                None
            }
            None => {
                self.phase = Phase::Idle;
                Some(Ok(Received {
                    data,
                    parity_bit: parity,
                }))
            }
        }
    }
}
