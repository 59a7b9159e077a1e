use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;

use samd51_uart_tx::validate::{has_errors, BaudPlan};
use samd51_uart_tx::{validate, Diagnostic, Generics, Level, Transmitter};

/// Tagged status line on stderr
macro_rules! status {
    ($tag:expr, $($arg:tt)*) => {{
        eprintln!("[{}] {}", $tag, format_args!($($arg)*));
    }};
}

mod bench;
mod cli;
mod port;

use bench::{Bench, Mode};
use cli::{Cli, Command, SendArgs};
use port::PortMirror;

fn report(diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        match diagnostic.level {
            Level::Error => status!("ERROR", "{}", diagnostic),
            Level::Warning => status!("WARN", "{}", diagnostic),
        }
    }
}

fn check(generics: &Generics) -> Result<()> {
    status!("CONFIG", "{}", generics);
    let diagnostics = validate(generics);
    report(&diagnostics);

    if let Some(plan) = BaudPlan::new(generics.sys_clk_hz, generics.baud_rate) {
        status!(
            "BAUD",
            "divisor {} ({}-bit counter), {} Bd generated, {}.{:02}% off",
            plan.divisor,
            plan.counter_bits,
            plan.actual_rate,
            plan.divergence_bp / 100,
            plan.divergence_bp % 100
        );
    }

    if has_errors(&diagnostics) {
        let count = diagnostics.iter().filter(|d| d.is_error()).count();
        bail!("{} assertion error(s)", count);
    }
    if let Some(format) = generics.frame_format() {
        status!("OK", "{} frames", format);
    }
    Ok(())
}

fn send(generics: &Generics, args: &SendArgs) -> Result<()> {
    status!("CONFIG", "{}", generics);
    let engine = match Transmitter::new(generics) {
        Ok((engine, diagnostics)) => {
            report(&diagnostics);
            engine
        }
        Err(error) => {
            report(error.diagnostics());
            return Err(anyhow!("{}", error)).context("transmitter refused");
        }
    };
    let mode = if args.burst { Mode::Burst } else { Mode::Single };
    let mut bench = Bench::new(engine, args.trace);
    let engine = bench.engine();
    status!(
        "INIT",
        "{} frames, divisor {}, {} edges per frame",
        engine.format(),
        engine.divisor(),
        engine.frame_edges()
    );

    let mut mirror = match &args.port {
        Some(path) => {
            let mirror = PortMirror::open(path, generics.baud_rate, engine.format())?;
            status!("PORT", "Mirroring to {}", mirror.path());
            Some(mirror)
        }
        None => None,
    };

    let running = Arc::new(AtomicBool::new(true));
    let handler_flag = running.clone();
    ctrlc::set_handler(move || handler_flag.store(false, Ordering::SeqCst))
        .context("failed to install Ctrl-C handler")?;

    bench.reset();

    let mut pass: u32 = 0;
    while running.load(Ordering::SeqCst) && (args.repeat == 0 || pass < args.repeat) {
        pass += 1;
        let started = bench.edges();
        let deliveries = bench
            .run(&args.words, mode, |delivery| {
                match &delivery.waveform {
                    Some(waveform) => println!(
                        "0x{:03X} -> 0x{:03X}  {}  edges {}..{}",
                        delivery.word,
                        delivery.received.data,
                        waveform,
                        delivery.accepted_at,
                        delivery.read_at
                    ),
                    None => println!("0x{:03X} -> 0x{:03X}", delivery.word, delivery.received.data),
                }
                if let Some(mirror) = mirror.as_mut() {
                    mirror.write_word(delivery.received.data)?;
                }
                Ok(())
            })
            .with_context(|| format!("pass {} failed", pass))?;

        status!(
            "PASS",
            "{}: {} words in {} edges",
            pass,
            deliveries.len(),
            bench.edges() - started
        );
    }

    if let Some(mirror) = mirror.as_mut() {
        mirror.flush()?;
    }
    if !running.load(Ordering::SeqCst) {
        status!("STOP", "Interrupted after {} passes", pass);
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let generics = cli.generics.generics();

    match &cli.command {
        Command::Check => check(&generics),
        Command::Send(args) => send(&generics, args),
    }
}
