/// UART Transmitter
/// Steppable TX engine, advanced once per rising clock edge
///
/// The engine owns no clock of its own. A driver loop (simulation bench,
/// timer interrupt, SysTick poll) calls [`Transmitter::clock`] for every edge
/// and reads the registered outputs back.

use core::fmt;

use crate::baud::BaudGenerator;
use crate::config::{FrameFormat, Generics};
use crate::frame::{Field, Frame};
use crate::handshake::{Beat, Handshake};
use crate::validate::{has_errors, validate, BaudPlan, Diagnostic, Diagnostics};

/// Inputs sampled at one clock edge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TxInput {
    /// Synchronous, active high
    pub reset: bool,
    pub stream: Beat,
}

impl TxInput {
    pub fn idle() -> Self {
        TxInput::default()
    }

    pub fn reset() -> Self {
        TxInput {
            reset: true,
            stream: Beat::idle(),
        }
    }

    pub fn word(data: u16) -> Self {
        TxInput {
            reset: false,
            stream: Beat::word(data),
        }
    }
}

/// Registered outputs after an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxOutput {
    pub ready: bool,
    /// Serial line, high when idle
    pub tx: bool,
    /// Word captured at this edge, already masked to the data width
    pub accepted: Option<u16>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Sending { frame: Frame, field: Field },
}

/// Construction refused. Carries the full report, warnings included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    diagnostics: Diagnostics,
}

impl ConfigError {
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut errors = self.errors();
        match errors.next() {
            Some(first) => {
                f.write_str(&first.message)?;
                let more = errors.count();
                if more > 0 {
                    write!(f, " (+{} more)", more)?;
                }
                Ok(())
            }
            None => f.write_str("invalid configuration"),
        }
    }
}

pub struct Transmitter {
    format: FrameFormat,
    baud: BaudGenerator,
    handshake: Handshake,
    state: State,
    tx: bool,
}

impl Transmitter {
    /// Validate `generics` and build an engine. Warnings come back alongside
    /// the engine; any error refuses construction.
    ///
    /// The engine starts as if reset had just been asserted: line high,
    /// ready low until the first edge without reset.
    pub fn new(generics: &Generics) -> Result<(Self, Diagnostics), ConfigError> {
        let diagnostics = validate(generics);
        if has_errors(&diagnostics) {
            return Err(ConfigError { diagnostics });
        }

        // A report without errors guarantees both
        let (Some(format), Some(plan)) = (
            generics.frame_format(),
            BaudPlan::new(generics.sys_clk_hz, generics.baud_rate),
        ) else {
            return Err(ConfigError { diagnostics });
        };

        let transmitter = Transmitter {
            format,
            baud: BaudGenerator::new(plan.divisor),
            handshake: Handshake::new(),
            state: State::Idle,
            tx: true,
        };
        Ok((transmitter, diagnostics))
    }

    pub fn format(&self) -> &FrameFormat {
        &self.format
    }

    /// Clock edges per baud period
    pub fn divisor(&self) -> u32 {
        self.baud.divisor()
    }

    /// Clock edges one frame keeps ready low
    pub fn frame_edges(&self) -> u64 {
        self.format.field_count() as u64 * self.divisor() as u64
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn ready(&self) -> bool {
        self.handshake.ready()
    }

    pub fn tx(&self) -> bool {
        self.tx
    }

    pub fn is_busy(&self) -> bool {
        matches!(self.state, State::Sending { .. })
    }

    /// Advance one rising edge
    pub fn clock(&mut self, input: TxInput) -> TxOutput {
        if input.reset {
            self.state = State::Idle;
            self.handshake.close();
            self.baud.reset();
            self.tx = true;
            return self.output(None);
        }

        let tick = self.baud.clock();
        let mut accepted = None;

        self.state = match self.state {
            State::Idle => match self.handshake.sample(input.stream) {
                Some(word) => {
                    let frame = Frame::new(&self.format, word);
                    // Start bit gets a full period from this edge
                    self.baud.reset();
                    accepted = Some(frame.data);
                    State::Sending {
                        frame,
                        field: Field::Start,
                    }
                }
                None => {
                    self.handshake.open();
                    State::Idle
                }
            },
            State::Sending { frame, field } if tick => match field.next(&self.format) {
                Some(next) => State::Sending { frame, field: next },
                None => {
                    self.handshake.open();
                    State::Idle
                }
            },
            sending => sending,
        };

        self.tx = match self.state {
            State::Idle => true,
            State::Sending { frame, field } => frame.level(field),
        };
        self.output(accepted)
    }

    fn output(&self, accepted: Option<u16>) -> TxOutput {
        TxOutput {
            ready: self.handshake.ready(),
            tx: self.tx,
            accepted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::Level;

    fn build(generics: Generics) -> Transmitter {
        let (transmitter, diagnostics) = Transmitter::new(&generics).unwrap();
        assert!(!has_errors(&diagnostics));
        transmitter
    }

    /// Hold reset for two edges, release for two, as the bench does
    fn settle(transmitter: &mut Transmitter) {
        transmitter.clock(TxInput::reset());
        transmitter.clock(TxInput::reset());
        transmitter.clock(TxInput::idle());
        transmitter.clock(TxInput::idle());
        assert!(transmitter.ready());
    }

    /// Send `word` from idle and record the line while the frame is in flight
    fn send(transmitter: &mut Transmitter, word: u16) -> std::vec::Vec<bool> {
        let output = transmitter.clock(TxInput::word(word));
        assert!(output.accepted.is_some());
        let mut line = std::vec![output.tx];
        loop {
            let output = transmitter.clock(TxInput::idle());
            if !transmitter.is_busy() {
                break;
            }
            line.push(output.tx);
        }
        line
    }

    /// Collapse a per-edge trace into one level per baud period
    fn per_bit(line: &[bool], divisor: u32) -> std::vec::Vec<bool> {
        line.chunks(divisor as usize).map(|chunk| {
            assert!(chunk.iter().all(|&b| b == chunk[0]), "level changed mid-bit");
            chunk[0]
        }).collect()
    }

    #[test]
    fn test_refuses_errors() {
        let err = Transmitter::new(&Generics::new(7_000_000, 7_372_800, 8, "none", 1))
            .err()
            .unwrap();
        assert!(err.errors().count() >= 1);
        let mut text: heapless::String<256> = heapless::String::new();
        core::fmt::write(&mut text, format_args!("{}", err)).unwrap();
        assert!(text.starts_with(
            "The system clock frequency must be greater than the baud rate for baud rate generation to work."
        ));
    }

    #[test]
    fn test_warnings_returned_with_engine() {
        let (transmitter, diagnostics) =
            Transmitter::new(&Generics::new(25_000_000, 1_843_200, 8, "none", 1)).unwrap();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].level, Level::Warning);
        assert_eq!(transmitter.divisor(), 14);
    }

    #[test]
    fn test_ready_only_after_reset_release() {
        let mut transmitter = build(Generics::default());
        assert!(!transmitter.ready());
        assert!(transmitter.tx());

        let output = transmitter.clock(TxInput::reset());
        assert!(!output.ready);
        assert!(output.tx);

        // Valid during reset is ignored
        let output = transmitter.clock(TxInput { reset: true, stream: Beat::word(0x55) });
        assert_eq!(output.accepted, None);

        // First edge out of reset settles into idle; ready shows after it
        let output = transmitter.clock(TxInput::word(0x55));
        assert_eq!(output.accepted, None);
        assert!(output.ready);

        let output = transmitter.clock(TxInput::word(0x55));
        assert_eq!(output.accepted, Some(0x55));
        assert!(!output.ready);
        assert!(!output.tx);
    }

    #[test]
    fn test_frame_8n1_bit_exact() {
        let mut transmitter = build(Generics::new(8_000, 1_000, 8, "none", 1));
        settle(&mut transmitter);
        let divisor = transmitter.divisor();
        assert_eq!(divisor, 8);

        let line = send(&mut transmitter, 0b1100_1010);
        assert_eq!(line.len() as u64, transmitter.frame_edges());
        assert_eq!(
            per_bit(&line, divisor),
            [false, false, true, false, true, false, false, true, true, true]
        );
    }

    #[test]
    fn test_parity_on_the_wire() {
        for (mode, expected) in [("even", true), ("odd", false)] {
            let mut transmitter = build(Generics::new(4_000, 1_000, 7, mode, 2));
            settle(&mut transmitter);
            // 0b0010_0011 has three ones
            let bits = per_bit(&send(&mut transmitter, 0x23), 4);
            assert_eq!(bits.len(), 11);
            assert_eq!(bits[8], expected, "parity {}", mode);
            assert_eq!(&bits[9..], [true, true]);
        }
    }

    #[test]
    fn test_ready_low_for_whole_frame() {
        let mut transmitter = build(Generics::new(125_000_000, 115_200, 9, "odd", 2));
        settle(&mut transmitter);

        let output = transmitter.clock(TxInput::word(0x1A5));
        assert_eq!(output.accepted, Some(0x1A5));

        let mut low_edges = 1;
        while !transmitter.clock(TxInput::word(0x000)).ready {
            low_edges += 1;
        }
        assert_eq!(low_edges, transmitter.frame_edges());
        assert_eq!(transmitter.frame_edges(), 13 * 1085);
    }

    #[test]
    fn test_valid_held_is_accepted_once_per_frame() {
        let mut transmitter = build(Generics::new(10_000, 1_000, 8, "none", 1));
        settle(&mut transmitter);

        let mut accepted = std::vec::Vec::new();
        for _ in 0..(transmitter.frame_edges() * 3 + 2) {
            if let Some(word) = transmitter.clock(TxInput::word(0x42)).accepted {
                accepted.push(word);
            }
        }
        // One idle edge separates frames
        assert_eq!(accepted.len(), 3);
    }

    #[test]
    fn test_back_to_back_burst() {
        let mut transmitter = build(Generics::new(3_000, 1_000, 5, "none", 1));
        settle(&mut transmitter);

        let words = [0x1F, 0x00, 0x15];
        let mut line = std::vec::Vec::new();
        let mut next = 0;
        while next < words.len() || transmitter.is_busy() {
            let input = match words.get(next) {
                Some(&word) => TxInput::word(word),
                None => TxInput::idle(),
            };
            let output = transmitter.clock(input);
            if output.accepted.is_some() {
                next += 1;
            }
            line.push(output.tx);
        }

        // Each frame is 7 periods of 3 edges, and one idle edge follows it
        let frame = 7 * 3;
        assert_eq!(line.len(), 3 * frame + 3);
        assert_eq!(per_bit(&line[..frame], 3), [false, true, true, true, true, true, true]);
        assert!(line[frame]);
        assert_eq!(per_bit(&line[frame + 1..2 * frame + 1], 3), [false, false, false, false, false, false, true]);
        assert!(line[2 * frame + 1]);
        assert_eq!(per_bit(&line[2 * frame + 2..3 * frame + 2], 3), [false, true, false, true, false, true, true]);
        assert!(line[3 * frame + 2]);
    }

    #[test]
    fn test_reset_aborts_frame() {
        let mut transmitter = build(Generics::new(8_000, 1_000, 8, "none", 1));
        settle(&mut transmitter);
        transmitter.clock(TxInput::word(0x00));
        for _ in 0..20 {
            transmitter.clock(TxInput::idle());
        }
        assert!(transmitter.is_busy());
        assert!(!transmitter.tx());

        let output = transmitter.clock(TxInput::reset());
        assert_eq!(transmitter.state(), State::Idle);
        assert!(output.tx);
        assert!(!output.ready);

        // Fresh frame after release starts from a clean phase
        transmitter.clock(TxInput::idle());
        let line = send(&mut transmitter, 0xFF);
        assert_eq!(line.len() as u64, transmitter.frame_edges());
        assert_eq!(per_bit(&line, 8)[0], false);
    }

    #[test]
    fn test_divisor_one_frame() {
        let (mut transmitter, diagnostics) =
            Transmitter::new(&Generics::new(1_400_000, 1_000_000, 5, "even", 2)).unwrap();
        // Below double the baud rate: only allowed with two stop bits
        assert!(diagnostics.iter().all(|d| d.level == Level::Warning));
        assert_eq!(transmitter.divisor(), 1);
        settle(&mut transmitter);
        let bits = send(&mut transmitter, 0b10110);
        assert_eq!(bits, [false, false, true, true, false, true, true, true, true]);
    }

    #[test]
    fn test_independent_instances() {
        let mut slow = build(Generics::new(8_000, 1_000, 8, "none", 1));
        let mut fast = build(Generics::new(2_000, 1_000, 8, "none", 1));
        settle(&mut slow);
        settle(&mut fast);

        slow.clock(TxInput::word(0x01));
        fast.clock(TxInput::word(0x01));
        for _ in 0..2 {
            slow.clock(TxInput::idle());
            fast.clock(TxInput::idle());
        }
        // fast is already on data bit 0, slow still in its start bit
        assert!(fast.tx());
        assert!(!slow.tx());
    }

    #[test]
    fn test_frame_edges_past_u32() {
        let (transmitter, diagnostics) =
            Transmitter::new(&Generics::new(500_000_000, 1, 8, "none", 1)).unwrap();
        assert!(diagnostics.iter().all(|d| d.level == Level::Warning));
        assert_eq!(transmitter.divisor(), 500_000_000);
        assert_eq!(transmitter.frame_edges(), 5_000_000_000);
    }
}
