/// Stream Writer
/// Producer side of the ready/valid stream, fed from a word queue
///
/// Valid goes high as soon as a word is queued and stays high, holding the
/// same word, until the engine takes it. The next queued word is presented
/// on the edge right after the transfer.

use heapless::Deque;

use crate::handshake::Beat;

pub struct StreamWriter<const N: usize> {
    queue: Deque<u16, N>,
    sent: u32,
}

impl<const N: usize> StreamWriter<N> {
    pub fn new() -> Self {
        StreamWriter {
            queue: Deque::new(),
            sent: 0,
        }
    }

    /// Queue a word. Hands it back if the queue is full.
    pub fn push(&mut self, word: u16) -> Result<(), u16> {
        self.queue.push_back(word)
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.queue.is_full()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Words the engine has taken so far
    pub fn sent(&self) -> u32 {
        self.sent
    }

    /// What to drive for the next edge
    pub fn beat(&self) -> Beat {
        match self.queue.front() {
            Some(&word) => Beat::word(word),
            None => Beat::idle(),
        }
    }

    /// Report the outcome of the edge just driven. Pops the head word when
    /// the engine accepted it.
    pub fn complete(&mut self, accepted: Option<u16>) -> Option<u16> {
        accepted?;
        let word = self.queue.pop_front()?;
        self.sent += 1;
        Some(word)
    }

    /// Drop everything still queued
    pub fn clear(&mut self) {
        self.queue.clear();
    }
}

impl<const N: usize> Default for StreamWriter<N> {
    fn default() -> Self {
        StreamWriter::new()
    }
}
