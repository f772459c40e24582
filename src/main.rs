// CardioMon — Firmware Entry Point
//
// Single-MCU biometric monitor: MAX30102 pulse oximeter (heart rate + SpO2),
// AD8232 single-lead ECG, SSD1306 OLED, MQTT telemetry.
//
// Timing model:
//   - One 1 kHz hardware timer interrupt owns the tick scheduler.  The ISR
//     does nothing but dispatch the task table into atomic due-flags.
//   - The cooperative main loop polls those flags and performs every bus
//     transaction: ECG ADC reads at 200 Hz, PPG FIFO reads at 50 Hz, display
//     refresh at 10 Hz, vital-sign MQTT publishes every 5 s.
//   - A double click starts an ECG export session, which drains the ring
//     buffer over MQTT in 20-sample batches every ~100 ms; a long press
//     cancels it.

mod config;
mod drivers;
mod ecg;
mod events;
mod filter;
mod input;
mod ppg;
mod scheduler;
mod transport;

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use esp_idf_hal::gpio::{AnyInputPin, Input, InputPin, PinDriver};
use esp_idf_hal::i2c::{I2cConfig, I2cDriver};
use esp_idf_hal::prelude::*;
use esp_idf_hal::timer::{config as timer_config, TimerDriver};
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::nvs::EspDefaultNvsPartition;

use crate::config::*;
use crate::drivers::ad8232::Ad8232;
use crate::drivers::display::OledDisplay;
use crate::drivers::max30102::Max30102;
use crate::ecg::{EcgPlot, EcgRecorder, PlotStep};
use crate::events::{ButtonEvent, Page};
use crate::input::InputManager;
use crate::ppg::PpgPipeline;
use crate::scheduler::{TaskId, TickScheduler, TASK_TABLE};
use crate::transport::{Telemetry, TransmitSchedule, VitalKind};

// ---------------------------------------------------------------------------
// ISR → main-loop flags.  Each cell has exactly one writer (the tick ISR)
// and one reader/clearer (the main loop), so Relaxed ordering suffices.
// ---------------------------------------------------------------------------
static ECG_DUE: AtomicU32 = AtomicU32::new(0);
static PPG_DUE: AtomicBool = AtomicBool::new(false);
static UI_DUE: AtomicBool = AtomicBool::new(false);
static SECOND_FLAG: AtomicBool = AtomicBool::new(false);
static ELAPSED_SECONDS: AtomicU32 = AtomicU32::new(0);

fn main() -> anyhow::Result<()> {
    // Link esp-idf-sys runtime patches and initialise logging.
    esp_idf_svc::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();
    log::info!("CardioMon firmware starting…");

    // ---- Peripherals ------------------------------------------------------
    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;

    // Button GPIO (pull-up, active LOW).
    let button = PinDriver::input(peripherals.pins.gpio3.downgrade_input())?;
    configure_pullup(&button);

    // AD8232 leads-off detect inputs.
    let lo_plus = PinDriver::input(peripherals.pins.gpio8.downgrade_input())?;
    let lo_minus = PinDriver::input(peripherals.pins.gpio9.downgrade_input())?;

    // ---- I2C bus (shared between OLED and MAX30102) ------------------------
    let i2c_config = I2cConfig::new().baudrate(400u32.kHz().into());
    let i2c = I2cDriver::new(
        peripherals.i2c0,
        peripherals.pins.gpio6, // SDA
        peripherals.pins.gpio7, // SCL
        &i2c_config,
    )?;
    // SAFETY: The I2C peripheral is a singleton obtained from `Peripherals::take()`.
    // It will live for the entire programme duration (embedded firmware never exits).
    let i2c_bus: &'static Mutex<I2cDriver<'static>> =
        Box::leak(Box::new(Mutex::new(unsafe { core::mem::transmute(i2c) })));

    // ---- Boot sequence ----------------------------------------------------
    let mut display = OledDisplay::new(i2c_bus);
    display.init()?;
    display.show_centered_text("CardioMon")?;

    let sensor = Max30102::new(i2c_bus);
    let oled_ok = display.is_connected();
    let ppg_ok = sensor.is_connected();
    if !oled_ok || !ppg_ok {
        log::error!("Self-test FAILED — OLED:{} MAX30102:{}", oled_ok, ppg_ok);
        // Continue anyway so we can still debug via serial.
    }
    sensor.init()?;

    let mut ecg_frontend = Ad8232::new(lo_plus, lo_minus)?;

    // ---- Transport (optional: the monitor works offline) -------------------
    let mut telemetry = match Telemetry::connect(peripherals.modem, sysloop, nvs) {
        Ok(t) => Some(t),
        Err(e) => {
            log::error!("Transport unavailable, continuing offline: {}", e);
            None
        }
    };

    // ---- Tick timer: the single periodic source of truth -------------------
    let mut timer = TimerDriver::new(
        peripherals.timer00,
        &timer_config::Config::new().auto_reload(true),
    )?;
    timer.set_alarm(timer.tick_hz() / TICK_HZ as u64)?;

    let mut scheduler = TickScheduler::new(TASK_TABLE, EPOCH_TICKS);
    // SAFETY: the callback runs in ISR context; it touches nothing but the
    // scheduler it owns and the atomic flag cells above.
    unsafe {
        timer.subscribe(move || {
            scheduler.on_tick(|task| match task {
                TaskId::EcgSample => {
                    ECG_DUE.fetch_add(1, Ordering::Relaxed);
                }
                TaskId::PpgStep => PPG_DUE.store(true, Ordering::Relaxed),
                TaskId::UiRefresh => UI_DUE.store(true, Ordering::Relaxed),
                TaskId::Epoch => {
                    ELAPSED_SECONDS.fetch_add(1, Ordering::Relaxed);
                    SECOND_FLAG.store(true, Ordering::Relaxed);
                }
            });
        })?;
    }
    timer.enable_interrupt()?;
    timer.enable_alarm(true)?;
    timer.enable(true)?;
    log::info!("Tick scheduler running at {} Hz", TICK_HZ);

    // ---- Cooperative main loop ---------------------------------------------
    let mut input = InputManager::new(button);
    let mut ppg = PpgPipeline::new();
    let mut recorder = EcgRecorder::new();
    let mut plot = EcgPlot::new();
    let mut schedule = TransmitSchedule::new();
    let mut page = Page::Vitals;
    let mut hr_alert = false;
    let mut last_upload = Instant::now();

    display.draw_vitals_page(&ppg.reading());
    display.flush()?;

    loop {
        // 1. Button input.
        if let Some(event) = input.update() {
            handle_button(event, &mut page, &mut recorder, &mut plot, &mut display);
        }

        // 2. ECG sampling (200 Hz).  Several ticks may have accumulated if
        //    the loop was busy; take them all so capture keeps pace.
        let pending = ECG_DUE.swap(0, Ordering::Relaxed);
        for _ in 0..pending {
            let raw = if ecg_frontend.leads_connected() {
                ecg_frontend.read_sample()
            } else {
                0
            };
            let sample = recorder.capture(raw);
            if page == Page::Ecg {
                match plot.push(sample) {
                    PlotStep::Segment { x0, y0, x1, y1 } => {
                        display.draw_trace_segment(x0, y0, x1, y1)
                    }
                    PlotStep::Wrap => display.clear_trace(),
                }
            }
        }

        // 3. PPG pipeline step (50 Hz).
        if PPG_DUE.swap(false, Ordering::Relaxed) {
            match sensor.read_fifo() {
                Ok((ir, red)) => {
                    ppg.process(ir, red);
                    if let Some(reading) = ppg.take_reading() {
                        log::info!(
                            "window complete: HR {} bpm, SpO2 {:.1} %",
                            reading.heart_rate,
                            reading.spo2
                        );
                    }
                    // High-rate cue, reported once per threshold crossing.
                    let alert = ppg.smoothed_heart_rate() >= HR_ALERT_BPM;
                    if alert != hr_alert {
                        hr_alert = alert;
                        if alert {
                            log::warn!(
                                "heart rate above {} bpm ({})",
                                HR_ALERT_BPM,
                                ppg.smoothed_heart_rate()
                            );
                        } else {
                            log::info!("heart rate back below {} bpm", HR_ALERT_BPM);
                        }
                    }
                }
                Err(e) => log::warn!("MAX30102 FIFO read failed: {}", e),
            }
        }

        // 4. Epoch (1 Hz): advance the transmit cadence.
        if SECOND_FLAG.swap(false, Ordering::Relaxed) {
            schedule.on_second();
        }

        // 5. Vital-sign publish, alternating heart rate and SpO2.
        if schedule.take_due() {
            if let Some(t) = telemetry.as_mut() {
                let reading = ppg.reading();
                let sent = match schedule.next_vital() {
                    VitalKind::HeartRate => {
                        t.send(MQTT_TOPIC_HEARTRATE, i32::from(ppg.smoothed_heart_rate()))
                    }
                    VitalKind::Spo2 => t.send(MQTT_TOPIC_SPO2, reading.spo2 as i32),
                };
                if !sent {
                    log::warn!("vital-sign publish failed");
                }
            }
        }

        // 6. ECG export drain: one batch per ~100 ms while a session runs.
        if recorder.is_exporting()
            && last_upload.elapsed() >= Duration::from_millis(ECG_UPLOAD_INTERVAL_MS)
        {
            last_upload = Instant::now();
            let timestamp = recorder.export_timestamp().unwrap_or(0);
            let mut batch = [0u16; ECG_BATCH_SAMPLES];
            let n = recorder.upload_batch(&mut batch);
            if n > 0 {
                if let Some(t) = telemetry.as_mut() {
                    if !t.send_batch(timestamp, &batch[..n]) {
                        log::warn!("ECG batch publish failed ({}%)", recorder.progress());
                    }
                }
            } else {
                log::info!("ECG export complete");
            }
        }

        // 7. Display refresh (10 Hz).
        if UI_DUE.swap(false, Ordering::Relaxed) {
            match page {
                Page::Vitals => display.draw_vitals_page(&ppg.reading()),
                Page::Ecg => display.draw_ecg_status(
                    recorder.is_exporting(),
                    recorder.progress(),
                    ecg_frontend.leads_connected(),
                ),
            }
            if let Err(e) = display.flush() {
                log::warn!("display flush failed: {}", e);
            }
        }

        thread::sleep(Duration::from_millis(1));
    }
}

/// Map classified button events onto page navigation and the export
/// state machine.
fn handle_button(
    event: ButtonEvent,
    page: &mut Page,
    recorder: &mut EcgRecorder,
    plot: &mut EcgPlot,
    display: &mut OledDisplay,
) {
    match event {
        ButtonEvent::SingleClick => {
            *page = page.next();
            log::info!("page switched to {:?}", page);
            if *page == Page::Ecg {
                *plot = EcgPlot::new();
                display.draw_ecg_frame();
            }
        }
        ButtonEvent::DoubleClick => {
            let timestamp = ELAPSED_SECONDS.load(Ordering::Relaxed);
            if recorder.start_export(timestamp) {
                log::info!(
                    "ECG export started at t={} s ({} samples)",
                    timestamp,
                    recorder.available()
                );
            } else {
                log::warn!("export already running — ignored");
            }
        }
        ButtonEvent::LongPress => {
            recorder.stop_export();
            log::info!("ECG export cancelled");
        }
    }
}

/// Configure internal pull-up on the button pin.  The PinDriver is already
/// created, so the pull mode goes through the raw API.
fn configure_pullup(_pin: &PinDriver<'_, AnyInputPin, Input>) {
    unsafe {
        esp_idf_sys::gpio_set_pull_mode(
            PIN_BUTTON,
            esp_idf_sys::gpio_pull_mode_t_GPIO_PULLUP_ONLY,
        );
    }
}
