/// Transmission Frame
/// One accepted word and the field sequence it is sent as

use heapless::Vec;

use crate::config::{FrameFormat, Parity, MAX_FRAME_FIELDS};

/// Position within a frame. Indices count from zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Start,
    Data(u8),
    Parity,
    Stop(u8),
}

impl Field {
    /// The field sent after this one, or None once the last stop bit is done
    pub fn next(self, format: &FrameFormat) -> Option<Field> {
        match self {
            Field::Start => Some(Field::Data(0)),
            Field::Data(i) if i + 1 < format.data_bits => Some(Field::Data(i + 1)),
            Field::Data(_) if format.parity == Parity::None => Some(Field::Stop(0)),
            Field::Data(_) => Some(Field::Parity),
            Field::Parity => Some(Field::Stop(0)),
            Field::Stop(i) if i + 1 < format.stop_bits.count() => Some(Field::Stop(i + 1)),
            Field::Stop(_) => None,
        }
    }
}

/// All fields of a frame in wire order
pub fn fields(format: FrameFormat) -> impl Iterator<Item = Field> {
    core::iter::successors(Some(Field::Start), move |field| field.next(&format))
}

/// Even-parity bit of a word: set when the count of ones is odd
pub fn parity_bit(word: u16) -> bool {
    word.count_ones() % 2 == 1
}

/// A word captured at the accepting edge, owned until its last stop bit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub data: u16,
    pub parity_bit: Option<bool>,
}

impl Frame {
    /// Capture `word`, dropping any bits above the data width
    pub fn new(format: &FrameFormat, word: u16) -> Self {
        let data = word & format.data_mask();
        let parity_bit = match format.parity {
            Parity::None => None,
            Parity::Even => Some(parity_bit(data)),
            Parity::Odd => Some(!parity_bit(data)),
        };
        Frame { data, parity_bit }
    }

    /// Line level while `field` is on the wire
    pub fn level(&self, field: Field) -> bool {
        match field {
            Field::Start => false,
            Field::Data(i) => (self.data >> i) & 1 == 1,
            // Only reachable when parity is enabled
            Field::Parity => self.parity_bit.unwrap_or(true),
            Field::Stop(_) => true,
        }
    }

    /// Every line level of the frame, one per baud period
    pub fn levels(&self, format: &FrameFormat) -> Vec<bool, MAX_FRAME_FIELDS> {
        let mut bits = Vec::new();
        for field in fields(*format) {
            // Capacity covers the widest format
            let _ = bits.push(self.level(field));
        }
        bits
    }
}
