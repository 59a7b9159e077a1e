#![no_std]
#![no_main]

use panic_halt as _;

use cortex_m_rt::entry;

use atsamd_hal as hal;
use hal::clock::GenericClockController;
use hal::gpio::Pins;
use hal::pac::{CorePeripherals, Peripherals};
use hal::prelude::*;

use usb_device::prelude::*;
use usbd_serial::{SerialPort, USB_CLASS_CDC};
use usb_device::bus::UsbBusAllocator;
use heapless;

mod uart;

use samd51_uart_tx::{validate, Generics, Transmitter};
use uart::UartLine;

/// Core clock after GenericClockController setup
const CPU_HZ: u32 = 120_000_000;
/// Engine edges per second, one per SysTick wrap
const ENGINE_HZ: u32 = 96_000;
const BAUD_RATE: u32 = 9_600;

/// Debug output macro for USB-CDC serial
macro_rules! debug_write {
    ($serial:expr, $($arg:tt)*) => {{
        use core::fmt::Write;
        let mut buffer = heapless::String::<256>::new();
        let _ = write!(&mut buffer, $($arg)*);
        let _ = $serial.write(buffer.as_bytes());
    }};
}

#[entry]
fn main() -> ! {
    // Taken exactly once at entry
    let Some(mut peripherals) = Peripherals::take() else {
        loop {}
    };
    let Some(core) = CorePeripherals::take() else {
        loop {}
    };

    // Configure clocks
    let mut clocks = GenericClockController::with_internal_32kosc(
        peripherals.GCLK,
        &mut peripherals.MCLK,
        &mut peripherals.OSC32KCTRL,
        &mut peripherals.OSCCTRL,
        &mut peripherals.NVMCTRL,
    );

    // Configure pins
    let pins = Pins::new(peripherals.PORT);

    // =======================================================================
    // USB CDC-ACM Setup (Host PC Communication)
    // =======================================================================

    static mut USB_BUS: Option<UsbBusAllocator<hal::usb::UsbBus>> = None;

    let mut gclk0 = clocks.gclk0();
    let Some(usb_clock) = clocks.usb(&mut gclk0) else {
        loop {}
    };
    let usb_bus = hal::usb::UsbBus::new(
        &usb_clock,
        &mut peripherals.MCLK,
        pins.pa24,  // USB D-
        pins.pa25,  // USB D+
        peripherals.USB,
    );

    let bus_allocator = unsafe {
        USB_BUS = Some(UsbBusAllocator::new(usb_bus));
        match USB_BUS.as_ref() {
            Some(allocator) => allocator,
            None => loop {},
        }
    };

    let mut serial = SerialPort::new(bus_allocator);

    let mut usb_dev = UsbDeviceBuilder::new(bus_allocator, UsbVidPid(0x1d50, 0x615c))
        .manufacturer("Great Scott Gadgets")
        .product("Static UART TX")
        .serial_number("UART-TX-001")
        .device_class(USB_CLASS_CDC)
        .build();

    let mut usb_configured = false;
    let mut startup_sent = false;

    // =======================================================================
    // UART TX Engine (PA04, bit-banged)
    // =======================================================================

    let generics = Generics::new(ENGINE_HZ, BAUD_RATE, 8, "none", 1);
    let report = validate(&generics);

    // An engine refused by validation leaves the pin idle and nothing is sent
    let mut line = match Transmitter::new(&generics) {
        Ok((engine, _)) => Some(UartLine::new(
            engine,
            core.SYST,
            CPU_HZ,
            ENGINE_HZ,
            pins.pa04.into_push_pull_output(),
        )),
        Err(_) => None,
    };

    // Status LED (Cynthion has an LED on the SAMD51)
    let mut led = pins.pa15.into_push_pull_output();
    led.set_high().ok();

    // =======================================================================
    // Main Loop
    // =======================================================================

    let mut rx_buffer = [0u8; 64];
    let mut last_usb_state = usb_dev.state();
    let mut line_idle = true;

    loop {
        // Poll USB and detect state changes
        let poll_result = usb_dev.poll(&mut [&mut serial]);
        let current_usb_state = usb_dev.state();

        if current_usb_state != last_usb_state {
            last_usb_state = current_usb_state;
            match current_usb_state {
                UsbDeviceState::Default => {
                    debug_write!(serial, "[USB] State: Default (device reset)\r\n");
                    usb_configured = false;
                    startup_sent = false;
                }
                UsbDeviceState::Addressed => {
                    debug_write!(serial, "[USB] State: Addressed (address assigned)\r\n");
                }
                UsbDeviceState::Configured => {
                    debug_write!(serial, "[USB] State: Configured (device ready)\r\n");
                    usb_configured = true;
                }
                UsbDeviceState::Suspend => {
                    debug_write!(serial, "[USB] State: Suspend (low power)\r\n");
                }
            }
        }

        // Send startup banner once after configuration
        if usb_configured && !startup_sent {
            startup_sent = true;
            debug_write!(serial, "\r\n");
            debug_write!(serial, "========================================\r\n");
            debug_write!(serial, "Static UART TX v0.1.0\r\n");
            debug_write!(serial, "========================================\r\n");
            debug_write!(serial, "[INIT] {}\r\n", generics);
            for diagnostic in report.iter() {
                debug_write!(serial, "[INIT] {}\r\n", diagnostic);
            }
            match &line {
                Some(line) => {
                    debug_write!(
                        serial,
                        "[INIT] Frame {} on PA04, divisor {}\r\n",
                        line.engine().format(),
                        line.engine().divisor()
                    );
                    debug_write!(serial, "[INIT] Queue depth: {}\r\n", uart::QUEUE_DEPTH);
                    debug_write!(serial, "[INIT] Ready for data\r\n\r\n");
                }
                None => {
                    debug_write!(serial, "[ERROR] Transmission halted\r\n\r\n");
                }
            }
        }

        let Some(line) = line.as_mut() else {
            // Keep USB alive so the report can still be read
            continue;
        };

        // Only take as many bytes as the queue can hold; the host is held
        // off by USB flow control otherwise
        if poll_result && line.room() > 0 {
            let room = line.room().min(rx_buffer.len());
            match serial.read(&mut rx_buffer[..room]) {
                Ok(count) => {
                    for &byte in &rx_buffer[..count] {
                        if line.queue(byte as u16).is_err() {
                            debug_write!(serial, "[WARN] Queue full, byte dropped\r\n");
                        }
                    }
                }
                Err(UsbError::WouldBlock) => {
                    // No data ready
                }
                Err(e) => {
                    debug_write!(serial, "[ERROR] USB read failed: {:?}\r\n", e);
                }
            }
        }

        if line.poll().is_some() {
            // Blink LED to show activity
            led.toggle().ok();
            line_idle = false;
        }

        // Report once per drained burst
        if !line_idle && line.is_idle() {
            line_idle = true;
            led.set_high().ok();
            if usb_configured {
                debug_write!(serial, "[UART-TX] Line idle, {} words sent\r\n", line.sent());
            }
        }
    }
}
