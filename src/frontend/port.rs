/// Serial port mirror
/// Replays words read back by the bench onto a real port opened with the same framing

use std::io::Write;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use samd51_uart_tx::{FrameFormat, Parity, StopBits};
use serialport::{DataBits, FlowControl, SerialPort};

pub struct PortMirror {
    port: Box<dyn SerialPort>,
    path: String,
}

/// Port settings for a frame format. Ports top out at 8 data bits.
pub fn port_settings(format: &FrameFormat) -> Result<(DataBits, serialport::Parity, serialport::StopBits)> {
    let data_bits = match format.data_bits {
        5 => DataBits::Five,
        6 => DataBits::Six,
        7 => DataBits::Seven,
        8 => DataBits::Eight,
        n => bail!("serial ports carry 5 to 8 data bits, not {}", n),
    };
    let parity = match format.parity {
        Parity::None => serialport::Parity::None,
        Parity::Even => serialport::Parity::Even,
        Parity::Odd => serialport::Parity::Odd,
    };
    let stop_bits = match format.stop_bits {
        StopBits::One => serialport::StopBits::One,
        StopBits::Two => serialport::StopBits::Two,
    };
    Ok((data_bits, parity, stop_bits))
}

impl PortMirror {
    pub fn open(path: &str, baud_rate: u32, format: &FrameFormat) -> Result<Self> {
        let (data_bits, parity, stop_bits) = port_settings(format)?;
        let port = serialport::new(path, baud_rate)
            .data_bits(data_bits)
            .parity(parity)
            .stop_bits(stop_bits)
            .flow_control(FlowControl::None)
            .timeout(Duration::from_millis(200))
            .open()
            .with_context(|| format!("failed to open {}", path))?;
        Ok(PortMirror {
            port,
            path: path.to_string(),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Words are already masked to at most 8 bits by the engine
    pub fn write_word(&mut self, word: u16) -> Result<()> {
        self.port
            .write_all(&[word as u8])
            .with_context(|| format!("failed to write to {}", self.path))
    }

    pub fn flush(&mut self) -> Result<()> {
        self.port
            .flush()
            .with_context(|| format!("failed to flush {}", self.path))
    }
}
