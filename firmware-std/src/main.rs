//! fmradio: ESP-IDF std firmware
//!
//! Thread-based: the HTTP server task feeds a bounded command queue from
//! WebSocket frames, and one control thread owns the tuner, the NVS store
//! and all radio state.

mod nvs;
mod ws;

use std::thread;
use std::time::Duration;

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::delay::FreeRtos;
use esp_idf_svc::hal::gpio::AnyIOPin;
use esp_idf_svc::hal::i2c::{I2cConfig, I2cDriver};
use esp_idf_svc::hal::modem::Modem;
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::hal::prelude::*;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi};

use fmradio::board;
use fmradio::codec::TunerConfig;
use fmradio::control::Controller;
use fmradio::inbox::{command_queue, COMMAND_QUEUE_DEPTH};
use fmradio::protocol::VERSION;
use fmradio::tuner::{RadioState, Tuner};

use nvs::NvsStore;

/// Station credentials, baked in at build time
const WIFI_SSID: &str = match option_env!("FMRADIO_WIFI_SSID") {
    Some(ssid) => ssid,
    None => "",
};
const WIFI_PASS: &str = match option_env!("FMRADIO_WIFI_PASS") {
    Some(pass) => pass,
    None => "",
};

fn main() -> anyhow::Result<()> {
    esp_idf_svc::sys::link_patches();
    // Bind the ESP-IDF logger to the `log` facade
    esp_idf_svc::log::EspLogger::initialize_default();

    log::info!("fmradio v{} starting on {} (std)", VERSION, board::BOARD_NAME);
    log::info!(
        "band {:?}, tuner at 0x{:02X}, bus {} kHz",
        board::BAND,
        board::TUNER_ADDRESS,
        board::I2C_FREQ_HZ / 1000
    );

    // ── Peripherals ──────────────────────────────────────────────────

    let peripherals = Peripherals::take()?;
    let sys_loop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;

    // ── WiFi station ─────────────────────────────────────────────────

    let _wifi = connect_wifi(peripherals.modem, sys_loop, nvs.clone())?;

    // ── Tuner bus ────────────────────────────────────────────────────

    // Safety: the board module names two pins nothing else on this
    // firmware claims.
    let (sda, scl) = unsafe {
        (
            AnyIOPin::new(i32::from(board::SDA_PIN)),
            AnyIOPin::new(i32::from(board::SCL_PIN)),
        )
    };
    let i2c_config = I2cConfig::new().baudrate(board::I2C_FREQ_HZ.Hz());
    let i2c = I2cDriver::new(peripherals.i2c0, sda, scl, &i2c_config)?;
    let tuner = Tuner::new(i2c, FreeRtos);
    let radio = RadioState::new(board::TUNER_ADDRESS, TunerConfig::new(board::BAND));

    // ── Store and channels ───────────────────────────────────────────

    let store = NvsStore::open(nvs)?;
    let (commands, mut queue) = command_queue(COMMAND_QUEUE_DEPTH);

    // ── WebSocket transport ──────────────────────────────────────────

    let (_server, outbox) = ws::start(commands.clone())?;

    // ── Control thread ───────────────────────────────────────────────

    let mut controller = Controller::new(tuner, store, radio);
    let mut control_outbox = outbox.clone();
    thread::Builder::new()
        .name("control".into())
        .stack_size(8192)
        .spawn(move || {
            if let Err(e) = controller.power_up() {
                log::error!("power-up tuning failed: {}", e);
            }
            controller.run(&mut queue, &mut control_outbox);
        })?;
    log::info!("Control thread spawned");

    // ── Housekeeping ─────────────────────────────────────────────────

    // Keeps the server and WiFi driver alive
    loop {
        thread::sleep(Duration::from_secs(30));
        log::info!(
            "{} peers connected, {} inbound messages dropped",
            outbox.peers(),
            commands.dropped()
        );
    }
}

fn connect_wifi(
    modem: Modem,
    sys_loop: EspSystemEventLoop,
    nvs: EspDefaultNvsPartition,
) -> anyhow::Result<BlockingWifi<EspWifi<'static>>> {
    let mut wifi = BlockingWifi::wrap(EspWifi::new(modem, sys_loop.clone(), Some(nvs))?, sys_loop)?;

    if WIFI_SSID.is_empty() {
        log::warn!("FMRADIO_WIFI_SSID not set at build time");
    }
    let auth_method = if WIFI_PASS.is_empty() {
        AuthMethod::None
    } else {
        AuthMethod::WPA2Personal
    };
    wifi.set_configuration(&Configuration::Client(ClientConfiguration {
        ssid: WIFI_SSID
            .try_into()
            .map_err(|_| anyhow::anyhow!("WiFi SSID too long"))?,
        password: WIFI_PASS
            .try_into()
            .map_err(|_| anyhow::anyhow!("WiFi password too long"))?,
        auth_method,
        ..Default::default()
    }))?;

    wifi.start()?;
    log::info!("WiFi started, connecting to '{}'", WIFI_SSID);
    wifi.connect()?;
    wifi.wait_netif_up()?;

    let ip = wifi.wifi().sta_netif().get_ip_info()?;
    log::info!("WiFi connected, address {}", ip.ip);
    Ok(wifi)
}
