//! Pump controller firmware — main entry point.
//!
//! Startup ordering, UART bring-up and idle-loop pacing.  Everything with
//! domain logic lives in the library; this file only wires adapters to it.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter        LogEventSink   FileConfigSource        │
//! │  (RegisterChannel+ADC)  (EventSink)    (ConfigPort)            │
//! │  UartTransport · GpioOutput · SystemTicks · SystemDelay        │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              PumpService (pure logic)                  │    │
//! │  │  MonotonicClock · EventQueue · PumpController          │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use embedded_hal::delay::DelayNs;
use esp_idf_hal::gpio::AnyIOPin;
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_hal::uart::{config::Config as UartConfig, UartDriver};
use esp_idf_hal::units::Hertz;
use log::{info, warn};

use pumpctl::adapters::config_file::{self, FileConfigSource, DEFAULT_CONFIG_PATH};
use pumpctl::adapters::hardware::{Adc1Inputs, HardwareAdapter};
use pumpctl::adapters::log_sink::LogEventSink;
use pumpctl::adapters::serial::UartTransport;
use pumpctl::adapters::time::{SystemDelay, SystemTicks};
use pumpctl::app::service::PumpService;
use pumpctl::clock::TickSource;
use pumpctl::drivers::gpio::GpioOutput;
use pumpctl::drivers::hw_init;
use pumpctl::drivers::watchdog::Watchdog;
use pumpctl::error::Error;
use pumpctl::modbus::{ConnectionArgs, RegisterChannel};
use pumpctl::pins;

/// Target main-loop period.
const LOOP_PERIOD_MS: u32 = 10;
/// Settle time between binding the drive and the first register write.
const STARTUP_SETTLE_MS: u32 = 100;
/// Loop iterations between link status lines (~10 s).
const STATUS_LOG_INTERVAL: u32 = 1_000;

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  pumpctl v{}                      ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Initialise hardware peripherals ────────────────────
    hw_init::init_peripherals().map_err(Error::from)?;
    let mut watchdog = Watchdog::new();

    // ── 3. Load config from flash (or defaults) ───────────────
    if let Err(e) = config_file::mount_flash_fs() {
        warn!("Flash filesystem unavailable ({}), config file skipped", e);
    }
    let config = config_file::load_or_default(&FileConfigSource::new(DEFAULT_CONFIG_PATH));
    info!(
        "Modbus: slave {} @ {} baud, update every {}ms",
        config.modbus_id,
        config.modbus_baud,
        config.update_interval.as_millis()
    );

    // ── 4. RS-485 link to the drive ───────────────────────────
    let peripherals = Peripherals::take()?;
    let uart_config = UartConfig::default().baudrate(Hertz(config.modbus_baud));
    let uart = UartDriver::new(
        peripherals.uart1,
        peripherals.pins.gpio17, // TX
        peripherals.pins.gpio18, // RX
        Option::<AnyIOPin>::None,
        Option::<AnyIOPin>::None,
        &uart_config,
    )?;

    let mut channel = RegisterChannel::new(SystemDelay);
    channel.connect(ConnectionArgs {
        slave_id: config.modbus_id,
        serial: UartTransport::new(uart, pins::MODBUS_READ_TIMEOUT_MS),
        data_enable: Some(GpioOutput::new(pins::MODBUS_DE_GPIO)),
        receiver_enable: Some(GpioOutput::new(pins::MODBUS_RE_GPIO)),
    });
    let mut hw = HardwareAdapter::new(channel, Adc1Inputs);
    let mut sink = LogEventSink::new();

    SystemDelay.delay_ms(STARTUP_SETTLE_MS);

    // ── 5. Start the control core ─────────────────────────────
    let mut service = PumpService::new(config, SystemTicks::new());
    service.begin(&mut hw, &mut sink);

    info!("System ready. Entering control loop.");

    // ── 6. Control loop ───────────────────────────────────────
    let mut pacing = SystemTicks::new();
    let mut iterations: u32 = 0;

    loop {
        let started = pacing.millis();

        service.poll(&mut hw, &mut sink);
        watchdog.feed();

        iterations = iterations.wrapping_add(1);
        if iterations % STATUS_LOG_INTERVAL == 0 {
            info!(
                "Link {:?} | {:?} | {} modbus errors since boot",
                hw.registers().connection_status(),
                service.pump().regime(),
                sink.error_count()
            );
        }

        let elapsed = pacing.millis().wrapping_sub(started);
        if elapsed < LOOP_PERIOD_MS {
            SystemDelay.delay_ms(LOOP_PERIOD_MS - elapsed);
        }
    }
}
