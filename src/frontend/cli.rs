/// Command line
/// Generics come from flags or the environment variable of the same name

use clap::{Args, Parser, Subcommand};
use samd51_uart_tx::Generics;

#[derive(Parser, Debug)]
#[command(name = "static-uart-tx", version, about = "Check and exercise a parameterized UART transmitter")]
pub struct Cli {
    #[command(flatten)]
    pub generics: GenericArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Clone)]
pub struct GenericArgs {
    /// System clock frequency in Hz
    #[arg(long, env = "SYS_CLK_HZ", default_value_t = 125_000_000, global = true)]
    pub sys_clk_hz: u32,

    /// Requested baud rate in Bd
    #[arg(long, env = "BAUD_RATE", default_value_t = 115_200, global = true)]
    pub baud_rate: u32,

    /// Data bits per frame
    #[arg(long, env = "DATA_BITS_WIDTH", default_value_t = 8, global = true)]
    pub data_bits_width: u8,

    /// none, even or odd. Anything else is reported by `check`.
    #[arg(long, env = "PARITY_MODE", default_value = "none", global = true)]
    pub parity_mode: String,

    /// Stop bits per frame
    #[arg(long, env = "STOP_BITS_WIDTH", default_value_t = 1, global = true)]
    pub stop_bits_width: u8,
}

impl GenericArgs {
    pub fn generics(&self) -> Generics {
        Generics::new(
            self.sys_clk_hz,
            self.baud_rate,
            self.data_bits_width,
            &self.parity_mode,
            self.stop_bits_width,
        )
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Evaluate the parameter assertions and print the baud plan
    Check,
    /// Push words through the simulated transmitter and read them back off the line
    Send(SendArgs),
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Words to send: decimal, 0x hex or 0b binary
    #[arg(required = true, value_parser = parse_word)]
    pub words: Vec<u16>,

    /// Keep valid high across words instead of one transaction at a time
    #[arg(long)]
    pub burst: bool,

    /// Print each frame as it appeared on the line
    #[arg(long)]
    pub trace: bool,

    /// Passes over the words; 0 repeats until Ctrl-C
    #[arg(long, default_value_t = 1)]
    pub repeat: u32,

    /// Mirror received words onto this serial port
    #[arg(long)]
    pub port: Option<String>,
}

pub fn parse_word(text: &str) -> Result<u16, String> {
    let text = text.trim().replace('_', "");
    let (digits, radix) = if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        (hex, 16)
    } else if let Some(bin) = text.strip_prefix("0b").or_else(|| text.strip_prefix("0B")) {
        (bin, 2)
    } else {
        (text.as_str(), 10)
    };
    u16::from_str_radix(digits, radix).map_err(|e| format!("invalid word '{}': {}", text, e))
}
