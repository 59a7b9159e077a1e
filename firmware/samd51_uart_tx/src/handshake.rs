/// Streaming Input Handshake
/// Ready/valid acceptance, decided once per clock edge
///
/// A transfer happens on the edge where the producer's valid and the engine's
/// ready are both seen high. The producer never waits for ready before raising
/// valid, and may present its next word on the edge right after a transfer.

/// What the producer drives into the engine for one edge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Beat {
    pub valid: bool,
    pub data: u16,
}

impl Beat {
    /// Valid low, data don't-care
    pub fn idle() -> Self {
        Beat::default()
    }

    /// Valid high with `data`
    pub fn word(data: u16) -> Self {
        Beat { valid: true, data }
    }
}

/// Engine side of the handshake: the registered ready flag
pub struct Handshake {
    ready: bool,
}

impl Handshake {
    /// Ready starts low and is raised by the owning state machine
    pub fn new() -> Self {
        Handshake { ready: false }
    }

    /// Ready as the producer sees it before the next edge
    pub fn ready(&self) -> bool {
        self.ready
    }

    /// Sample `beat` at a clock edge. Returns the word if a transfer fires;
    /// ready is low from then on until [`open`](Self::open) is called.
    pub fn sample(&mut self, beat: Beat) -> Option<u16> {
        if self.ready && beat.valid {
            self.ready = false;
            Some(beat.data)
        } else {
            None
        }
    }

    /// Raise ready for the cycle after this edge
    pub fn open(&mut self) {
        self.ready = true;
    }

    /// Drop ready for the cycle after this edge
    pub fn close(&mut self) {
        self.ready = false;
    }
}

impl Default for Handshake {
    fn default() -> Self {
        Handshake::new()
    }
}
