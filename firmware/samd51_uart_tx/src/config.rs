/// Transmitter Configuration
/// Raw generics as handed to the top level, and the typed frame format they validate into

use core::fmt;
use heapless::String;

/// Longest PARITY_MODE text kept for diagnostics
pub const MAX_PARITY_NAME_LEN: usize = 24;

/// Supported data word widths
pub const MIN_DATA_BITS: u8 = 5;
pub const MAX_DATA_BITS: u8 = 9;

/// Most fields a frame can have: start + 9 data + parity + 2 stop
pub const MAX_FRAME_FIELDS: usize = 13;

/// Parity setting exactly as supplied, unknown names included
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParityMode {
    None,
    Even,
    Odd,
    Unknown(String<MAX_PARITY_NAME_LEN>),
}

impl From<&str> for ParityMode {
    fn from(value: &str) -> Self {
        match value {
            "none" => ParityMode::None,
            "even" => ParityMode::Even,
            "odd" => ParityMode::Odd,
            other => {
                // Overlong names are cut at capacity
                let mut name = String::new();
                for c in other.chars() {
                    if name.push(c).is_err() {
                        break;
                    }
                }
                ParityMode::Unknown(name)
            }
        }
    }
}

impl ParityMode {
    /// Name as it appears in the PARITY_MODE generic
    pub fn as_str(&self) -> &str {
        match self {
            ParityMode::None => "none",
            ParityMode::Even => "even",
            ParityMode::Odd => "odd",
            ParityMode::Unknown(name) => name.as_str(),
        }
    }

    /// Typed parity, if the mode is one we can transmit
    pub fn known(&self) -> Option<Parity> {
        match self {
            ParityMode::None => Some(Parity::None),
            ParityMode::Even => Some(Parity::Even),
            ParityMode::Odd => Some(Parity::Odd),
            ParityMode::Unknown(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    None,
    Even,
    Odd,
}

impl Parity {
    /// Letter used in the usual 8N1 shorthand
    pub fn letter(self) -> char {
        match self {
            Parity::None => 'N',
            Parity::Even => 'E',
            Parity::Odd => 'O',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopBits {
    One = 1,
    Two = 2,
}

impl StopBits {
    pub fn from_width(width: u8) -> Option<Self> {
        match width {
            1 => Some(StopBits::One),
            2 => Some(StopBits::Two),
            _ => None,
        }
    }

    pub fn count(self) -> u8 {
        self as u8
    }
}

/// The parameter set of one transmitter instance, named after the HDL generics.
///
/// Nothing here is checked on construction; run it through
/// [`validate`](crate::validate::validate) or [`Transmitter::new`](crate::Transmitter::new).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generics {
    pub sys_clk_hz: u32,
    pub baud_rate: u32,
    pub data_bits_width: u8,
    pub parity_mode: ParityMode,
    pub stop_bits_width: u8,
}

impl Default for Generics {
    /// 125 MHz system clock, 115200 Bd, 8N1
    fn default() -> Self {
        Generics {
            sys_clk_hz: 125_000_000,
            baud_rate: 115_200,
            data_bits_width: 8,
            parity_mode: ParityMode::None,
            stop_bits_width: 1,
        }
    }
}

impl Generics {
    pub fn new(
        sys_clk_hz: u32,
        baud_rate: u32,
        data_bits_width: u8,
        parity_mode: &str,
        stop_bits_width: u8,
    ) -> Self {
        Generics {
            sys_clk_hz,
            baud_rate,
            data_bits_width,
            parity_mode: ParityMode::from(parity_mode),
            stop_bits_width,
        }
    }

    /// Typed framing, or None if any framing generic is out of range
    pub fn frame_format(&self) -> Option<FrameFormat> {
        if !(MIN_DATA_BITS..=MAX_DATA_BITS).contains(&self.data_bits_width) {
            return None;
        }
        Some(FrameFormat {
            data_bits: self.data_bits_width,
            parity: self.parity_mode.known()?,
            stop_bits: StopBits::from_width(self.stop_bits_width)?,
        })
    }
}

impl fmt::Display for Generics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SYS_CLK_HZ={} BAUD_RATE={} DATA_BITS_WIDTH={} PARITY_MODE={} STOP_BITS_WIDTH={}",
            self.sys_clk_hz,
            self.baud_rate,
            self.data_bits_width,
            self.parity_mode.as_str(),
            self.stop_bits_width
        )
    }
}

/// Validated framing rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameFormat {
    pub data_bits: u8,
    pub parity: Parity,
    pub stop_bits: StopBits,
}

impl FrameFormat {
    /// Baud periods one frame occupies on the wire
    pub fn field_count(&self) -> u8 {
        let parity = if self.parity == Parity::None { 0 } else { 1 };
        1 + self.data_bits + parity + self.stop_bits.count()
    }

    /// Mask selecting the data bits of a word
    pub fn data_mask(&self) -> u16 {
        (1u16 << self.data_bits) - 1
    }
}

impl fmt::Display for FrameFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            self.data_bits,
            self.parity.letter(),
            self.stop_bits.count()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parity_mode_from_str() {
        assert_eq!(ParityMode::from("none"), ParityMode::None);
        assert_eq!(ParityMode::from("even"), ParityMode::Even);
        assert_eq!(ParityMode::from("odd"), ParityMode::Odd);

        // Names are case sensitive, like the HDL string compare
        let mode = ParityMode::from("Even");
        assert_eq!(mode.known(), None);
        assert_eq!(mode.as_str(), "Even");
    }

    #[test]
    fn test_parity_mode_unknown_truncates() {
        let long = "abcdefghijklmnopqrstuvwxyz0123456789";
        let mode = ParityMode::from(long);
        assert_eq!(mode.as_str().len(), MAX_PARITY_NAME_LEN);
        assert!(long.starts_with(mode.as_str()));
    }

    #[test]
    fn test_stop_bits_from_width() {
        assert_eq!(StopBits::from_width(1), Some(StopBits::One));
        assert_eq!(StopBits::from_width(2), Some(StopBits::Two));
        assert_eq!(StopBits::from_width(0), None);
        assert_eq!(StopBits::from_width(3), None);
        assert_eq!(StopBits::Two.count(), 2);
    }

    #[test]
    fn test_frame_format_from_generics() {
        let format = Generics::default().frame_format().unwrap();
        assert_eq!(format.data_bits, 8);
        assert_eq!(format.parity, Parity::None);
        assert_eq!(format.stop_bits, StopBits::One);
        assert_eq!(format.field_count(), 10);
        assert_eq!(format.data_mask(), 0xFF);
    }

    #[test]
    fn test_frame_format_rejects_out_of_range() {
        assert!(Generics::new(125_000_000, 115_200, 4, "none", 1).frame_format().is_none());
        assert!(Generics::new(125_000_000, 115_200, 10, "none", 1).frame_format().is_none());
        assert!(Generics::new(125_000_000, 115_200, 8, "na", 1).frame_format().is_none());
        assert!(Generics::new(125_000_000, 115_200, 8, "none", 3).frame_format().is_none());
    }

    #[test]
    fn test_field_count_extremes() {
        let smallest = Generics::new(125_000_000, 115_200, 5, "none", 1).frame_format().unwrap();
        assert_eq!(smallest.field_count(), 7);

        let largest = Generics::new(125_000_000, 115_200, 9, "odd", 2).frame_format().unwrap();
        assert_eq!(largest.field_count() as usize, MAX_FRAME_FIELDS);
        assert_eq!(largest.data_mask(), 0x1FF);
    }

    #[test]
    fn test_display() {
        let generics = Generics::new(50_000_000, 9600, 7, "even", 2);
        let mut text: String<128> = String::new();
        core::fmt::write(&mut text, format_args!("{}", generics)).unwrap();
        assert_eq!(
            text.as_str(),
            "SYS_CLK_HZ=50000000 BAUD_RATE=9600 DATA_BITS_WIDTH=7 PARITY_MODE=even STOP_BITS_WIDTH=2"
        );

        let mut short: String<8> = String::new();
        core::fmt::write(&mut short, format_args!("{}", generics.frame_format().unwrap())).unwrap();
        assert_eq!(short.as_str(), "7E2");
    }
}
