/// Parameter Validation
/// Derived baud quantities and the diagnostics raised against a set of generics

use core::fmt::{self, Write};
use heapless::{String, Vec};

use crate::config::{Generics, ParityMode, MAX_DATA_BITS, MIN_DATA_BITS};

/// Room for every rule firing at once
pub const MAX_DIAGNOSTICS: usize = 8;
pub const MAX_MESSAGE_LEN: usize = 192;

/// Divisor counters wider than this are flagged
pub const MAX_COUNTER_BITS: u32 = 20;

/// Allowed divergence of the generated rate, in hundredths of a percent
pub const MAX_DIVERGENCE_BP: u64 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// Configuration must not run
    Error,
    /// Worth reporting, never blocks
    Warning,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Error => f.write_str("error"),
            Level::Warning => f.write_str("warning"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub level: Level,
    pub message: String<MAX_MESSAGE_LEN>,
}

impl Diagnostic {
    fn new(level: Level, args: fmt::Arguments<'_>) -> Self {
        let mut message = String::new();
        // Messages are sized to fit; anything longer is cut
        let _ = message.write_fmt(args);
        Diagnostic { level, message }
    }

    pub fn is_error(&self) -> bool {
        self.level == Level::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(assertion {}): {}", self.level, self.message)
    }
}

pub type Diagnostics = Vec<Diagnostic, MAX_DIAGNOSTICS>;

/// Quantities derived from the clock and baud generics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaudPlan {
    /// round(sys_clk_hz / baud_rate), never zero
    pub divisor: u32,
    /// Bits needed for a counter running 0..divisor
    pub counter_bits: u32,
    /// Rate the divisor actually produces, truncated to whole baud
    pub actual_rate: u32,
    /// |actual - requested| / requested, in hundredths of a percent
    pub divergence_bp: u64,
}

impl BaudPlan {
    /// None when no usable divisor exists (zero baud, or a clock under half the baud rate)
    pub fn new(sys_clk_hz: u32, baud_rate: u32) -> Option<Self> {
        if baud_rate == 0 {
            return None;
        }
        let sys_clk = sys_clk_hz as u64;
        let baud = baud_rate as u64;

        // Round half up
        let divisor = (sys_clk + baud / 2) / baud;
        if divisor == 0 {
            return None;
        }

        // sys_clk / divisor - baud, over baud, without leaving integers
        let generated = baud * divisor;
        let divergence_bp = sys_clk.abs_diff(generated) * 10_000 / generated;

        Some(BaudPlan {
            divisor: divisor as u32,
            counter_bits: u64::BITS - (divisor - 1).leading_zeros(),
            actual_rate: (sys_clk / divisor) as u32,
            divergence_bp,
        })
    }
}

/// Check a parameter set. Every rule is evaluated; the result lists the ones
/// that fired, in rule order.
pub fn validate(generics: &Generics) -> Diagnostics {
    let mut diagnostics = Diagnostics::new();
    let sys_clk = generics.sys_clk_hz as u64;
    let baud = generics.baud_rate as u64;

    if baud >= sys_clk {
        raise(
            &mut diagnostics,
            Level::Error,
            format_args!(
                "The system clock frequency must be greater than the baud rate for baud rate generation to work."
            ),
        );
    }

    if let ParityMode::Unknown(name) = &generics.parity_mode {
        raise(&mut diagnostics, Level::Error, format_args!("Unknown PARITY_MODE: '{}'.", name));
    }

    if sys_clk < 2 * baud {
        // A second stop bit absorbs the extra idle period; a single one cannot
        let level = if generics.stop_bits_width == 2 {
            Level::Warning
        } else {
            Level::Error
        };
        raise(
            &mut diagnostics,
            level,
            format_args!(
                "The system clock frequency is not at least double the baud rate. This will cause an extra stop bit to be sent after each transaction."
            ),
        );
    }

    if let Some(plan) = BaudPlan::new(generics.sys_clk_hz, generics.baud_rate) {
        if plan.counter_bits > MAX_COUNTER_BITS {
            raise(
                &mut diagnostics,
                Level::Warning,
                format_args!(
                    "A {}-bit counter is necessary to implement a divisor of {}. Are your design parameters correct?",
                    plan.counter_bits, plan.divisor
                ),
            );
        }

        if plan.divergence_bp > MAX_DIVERGENCE_BP {
            raise(
                &mut diagnostics,
                Level::Warning,
                format_args!(
                    "The generated baud rate diverges from the requested rate by {}.{:02}% ({} Bd generated, {} Bd requested).",
                    plan.divergence_bp / 100,
                    plan.divergence_bp % 100,
                    plan.actual_rate,
                    generics.baud_rate
                ),
            );
        }
    }

    if baud == 0 {
        raise(&mut diagnostics, Level::Error, format_args!("The baud rate must be greater than zero."));
    }

    if !(MIN_DATA_BITS..=MAX_DATA_BITS).contains(&generics.data_bits_width) {
        raise(
            &mut diagnostics,
            Level::Error,
            format_args!(
                "Unsupported DATA_BITS_WIDTH: {}. Expected a value from {} to {}.",
                generics.data_bits_width, MIN_DATA_BITS, MAX_DATA_BITS
            ),
        );
    }

    if !(1..=2).contains(&generics.stop_bits_width) {
        raise(
            &mut diagnostics,
            Level::Error,
            format_args!(
                "Unsupported STOP_BITS_WIDTH: {}. Expected 1 or 2.",
                generics.stop_bits_width
            ),
        );
    }

    diagnostics
}

fn raise(diagnostics: &mut Diagnostics, level: Level, args: fmt::Arguments<'_>) {
    // MAX_DIAGNOSTICS covers every rule
    let _ = diagnostics.push(Diagnostic::new(level, args));
}

/// True if any diagnostic forbids running
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}
