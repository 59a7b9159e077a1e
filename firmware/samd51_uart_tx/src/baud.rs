/// Baud Tick Generator
/// Integer clock divider producing one tick per serial bit period

pub struct BaudGenerator {
    divisor: u32,
    count: u32,
}

impl BaudGenerator {
    /// Create a generator at its initial phase. A divisor of zero is run as one.
    pub fn new(divisor: u32) -> Self {
        BaudGenerator {
            divisor: divisor.max(1),
            count: 0,
        }
    }

    pub fn divisor(&self) -> u32 {
        self.divisor
    }

    /// Edges counted since the last tick
    pub fn phase(&self) -> u32 {
        self.count
    }

    /// Advance one clock edge. Returns true on the edge that closes a bit period.
    pub fn clock(&mut self) -> bool {
        if self.count + 1 >= self.divisor {
            self.count = 0;
            true
        } else {
            self.count += 1;
            false
        }
    }

    /// Return to the initial phase
    pub fn reset(&mut self) {
        self.count = 0;
    }
}
