/// Simulation bench
/// Clocks the engine edge by edge with a stream writer on its input and a line
/// monitor on its output, checking every word makes it across.

use std::collections::VecDeque;

use anyhow::{anyhow, bail, Result};
use samd51_uart_tx::handshake::Beat;
use samd51_uart_tx::{LineMonitor, Received, StreamWriter, Transmitter, TxInput};

/// Words the writer holds at once; longer bursts are refilled as it drains
const WRITER_DEPTH: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// One word at a time, the next only after the previous was read back
    Single,
    /// Valid held high across all words
    Burst,
}

/// One word's trip across the line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub word: u16,
    pub received: Received,
    /// Edge the engine took the word on
    pub accepted_at: u64,
    /// Edge the monitor finished reading it on
    pub read_at: u64,
    /// Line level per bit period, present when tracing
    pub waveform: Option<String>,
}

pub struct Bench {
    engine: Transmitter,
    monitor: LineMonitor,
    writer: StreamWriter<WRITER_DEPTH>,
    edges: u64,
    line: Vec<bool>,
    trace: bool,
}

impl Bench {
    pub fn new(engine: Transmitter, trace: bool) -> Self {
        let monitor = LineMonitor::new(*engine.format(), engine.divisor());
        Bench {
            engine,
            monitor,
            writer: StreamWriter::new(),
            edges: 0,
            line: Vec::new(),
            trace,
        }
    }

    pub fn engine(&self) -> &Transmitter {
        &self.engine
    }

    /// Edges clocked so far
    pub fn edges(&self) -> u64 {
        self.edges
    }

    /// Two idle edges, two with reset held, two released
    pub fn reset(&mut self) {
        self.writer.clear();
        self.clock(TxInput::idle());
        self.clock(TxInput::idle());
        self.clock(TxInput::reset());
        self.clock(TxInput::reset());
        self.clock(TxInput::idle());
        self.clock(TxInput::idle());
        self.monitor = LineMonitor::new(*self.engine.format(), self.engine.divisor());
    }

    fn clock(&mut self, input: TxInput) -> (Option<u16>, Option<Received>, Option<anyhow::Error>) {
        let output = self.engine.clock(input);
        self.edges += 1;
        if self.trace {
            self.line.push(output.tx);
        }
        match self.monitor.observe(output.tx) {
            Some(Ok(received)) => (output.accepted, Some(received), None),
            Some(Err(error)) => (output.accepted, None, Some(anyhow!(error))),
            None => (output.accepted, None, None),
        }
    }

    /// Longest stretch without progress before giving up: a full frame of
    /// waiting for ready, a full frame on the line, and the idle edges between
    fn patience(&self) -> u64 {
        2 * self.engine.frame_edges() + 4
    }

    /// Send `words` and read each back off the line. `on_delivery` sees every
    /// word as soon as the monitor has it.
    pub fn run(
        &mut self,
        words: &[u16],
        mode: Mode,
        mut on_delivery: impl FnMut(&Delivery) -> Result<()>,
    ) -> Result<Vec<Delivery>> {
        let mask = self.engine.format().data_mask();
        let mut pending = words.iter().copied();
        // Accepted by the engine, not yet read back: (word, accepted_at, line offset)
        let mut in_flight: VecDeque<(u16, u64, usize)> = VecDeque::new();
        let mut deliveries = Vec::with_capacity(words.len());
        let mut last_progress = self.edges;

        while deliveries.len() < words.len() {
            match mode {
                Mode::Single => {
                    if self.writer.is_empty() && in_flight.is_empty() {
                        if let Some(word) = pending.next() {
                            self.writer.push(word).map_err(|w| anyhow!("writer refused 0x{:X}", w))?;
                        }
                    }
                }
                Mode::Burst => {
                    while !self.writer.is_full() {
                        let Some(word) = pending.next() else { break };
                        self.writer.push(word).map_err(|w| anyhow!("writer refused 0x{:X}", w))?;
                    }
                }
            }

            let input = TxInput {
                reset: false,
                stream: self.writer.beat(),
            };
            let line_offset = self.line.len();
            let (accepted, received, error) = self.clock(input);

            if let Some(word) = self.writer.complete(accepted) {
                in_flight.push_back((word, self.edges, line_offset));
                last_progress = self.edges;
            }

            if let Some(error) = error {
                return Err(error.context(format!("line error after {} edges", self.edges)));
            }

            if let Some(received) = received {
                let Some((word, accepted_at, offset)) = in_flight.pop_front() else {
                    bail!("read 0x{:X} off the line with nothing sent", received.data);
                };
                if received.data != word & mask {
                    bail!(
                        "sent 0x{:X} but read 0x{:X} off the line",
                        word & mask,
                        received.data
                    );
                }
                let delivery = Delivery {
                    word,
                    received,
                    accepted_at,
                    read_at: self.edges,
                    waveform: self.trace.then(|| self.waveform(offset)),
                };
                on_delivery(&delivery)?;
                deliveries.push(delivery);
                last_progress = self.edges;
            }

            if self.edges - last_progress > self.patience() {
                let waiting = in_flight
                    .front()
                    .map(|&(word, ..)| word)
                    .or_else(|| match self.writer.beat() {
                        Beat { valid: true, data } => Some(data),
                        _ => None,
                    });
                match waiting {
                    Some(word) => bail!(
                        "timed out after {} edges waiting on 0x{:X}",
                        self.edges - last_progress,
                        word
                    ),
                    None => bail!("timed out after {} edges", self.edges - last_progress),
                }
            }
        }

        if self.trace {
            self.line.clear();
        }
        Ok(deliveries)
    }

    /// Line levels from `offset` on, one character per bit period
    fn waveform(&self, offset: usize) -> String {
        let divisor = self.engine.divisor() as usize;
        let fields = self.engine.format().field_count() as usize;
        self.line[offset..]
            .chunks(divisor)
            .take(fields)
            .map(|chunk| if chunk[0] { '1' } else { '0' })
            .collect()
    }
}
