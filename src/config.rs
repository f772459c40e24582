// CardioMon — Hardware & System Configuration
// Target: Seeed Studio Xiao ESP32-C3 (RISC-V)

// ---------------------------------------------------------------------------
// GPIO Pin Definitions (Xiao ESP32-C3 pinout)
// ---------------------------------------------------------------------------
pub const PIN_BUTTON: i32 = 3;       // D1/A1 — User button (INPUT_PULLUP, active LOW)
pub const PIN_I2C_SDA: i32 = 6;      // D4    — I2C data line (MAX30102 + OLED)
pub const PIN_I2C_SCL: i32 = 7;      // D5    — I2C clock line
pub const PIN_ECG_ADC: u32 = 2;      // D0/A0 — AD8232 analog output (ADC1_CH2)
pub const PIN_ECG_LO_PLUS: i32 = 8;  // D8    — AD8232 leads-off detect (+)
pub const PIN_ECG_LO_MINUS: i32 = 9; // D9    — AD8232 leads-off detect (−)

// ---------------------------------------------------------------------------
// I2C Bus
// ---------------------------------------------------------------------------
pub const I2C_ADDR_MAX30102: u8 = 0x57;
pub const I2C_ADDR_OLED: u8 = 0x3C;
pub const I2C_TIMEOUT_TICKS: u32 = 1000; // FreeRTOS ticks

// ---------------------------------------------------------------------------
// Tick Scheduler
//
// One 1 kHz hardware timer drives every periodic job in the firmware.  The
// divisors below derive the per-task rates; the task bodies never embed a
// rate of their own.
// ---------------------------------------------------------------------------
pub const TICK_HZ: u32 = 1000;        // base timer interrupt rate
pub const DIV_ECG: u32 = 5;           // 1000 / 5   = 200 Hz ECG sampling
pub const DIV_PPG: u32 = 20;          // 1000 / 20  =  50 Hz PPG pipeline trigger
pub const DIV_UI: u32 = 100;          // 1000 / 100 =  10 Hz display refresh
pub const EPOCH_TICKS: u32 = TICK_HZ; // 1 Hz epoch: seconds counter + transmit

// ---------------------------------------------------------------------------
// PPG Pipeline (MAX30102)
// ---------------------------------------------------------------------------
/// Effective PPG sample rate: the sensor runs at 200 Hz with 4× FIFO
/// averaging, so one FIFO read represents 20 ms.
pub const PPG_SAMPLE_HZ: u32 = 50;
/// Filtered samples collected per channel before feature extraction (3 s).
pub const PPG_WINDOW_SIZE: usize = 150;
/// Raw-count floor on both channels for "finger present".
pub const PPG_PRESENCE_THRESHOLD: u32 = 100_000;
/// Valid cardiac period band, in samples at `PPG_SAMPLE_HZ`.
pub const HR_PERIOD_MIN: usize = 15;  // 200 BPM
pub const HR_PERIOD_MAX: usize = 99;  // ~30 BPM
/// period → BPM numerator: 60 s/min × 50 samples/s = 3000.
pub const HR_BPM_NUMERATOR: u32 = 60 * PPG_SAMPLE_HZ;
/// One-pole smoothing weight applied to the heart rate sent upstream.
pub const HR_SMOOTH_ALPHA: f32 = 0.6;
/// Smoothed rate at or above this logs a high-rate warning.
pub const HR_ALERT_BPM: u16 = 70;

// ---------------------------------------------------------------------------
// ECG Capture (AD8232)
// ---------------------------------------------------------------------------
/// Ring buffer capacity: 5 seconds at 200 Hz.
pub const ECG_BUFFER_CAPACITY: usize = 1000;
/// One-pole smoothing weight applied to raw ADC samples before storage.
pub const ECG_SMOOTH_ALPHA: f32 = 0.6;
/// Samples per MQTT export batch (one batch every ~100 ms while draining).
pub const ECG_BATCH_SAMPLES: usize = 20;
pub const ECG_UPLOAD_INTERVAL_MS: u64 = 100;

// ---------------------------------------------------------------------------
// Display (SSD1306 OLED)
// ---------------------------------------------------------------------------
pub const SCREEN_WIDTH: u32 = 128;
pub const SCREEN_HEIGHT: u32 = 64;
pub const DISPLAY_BUFFER_SIZE: usize = (SCREEN_WIDTH as usize * SCREEN_HEIGHT as usize) / 8; // 1024
/// Scrolling ECG trace geometry (inside the axes on the ECG page).
pub const PLOT_X_ORIGIN: i32 = 2;
pub const PLOT_WIDTH: i32 = 118;
pub const PLOT_Y_TOP: i32 = 12;
pub const PLOT_Y_BOTTOM: i32 = 54;

// ---------------------------------------------------------------------------
// Button Timing (milliseconds)
// ---------------------------------------------------------------------------
pub const DEBOUNCE_MS: u64 = 50;
pub const LONG_PRESS_MS: u64 = 3000;
pub const DOUBLE_CLICK_WINDOW_MS: u64 = 400;

// ---------------------------------------------------------------------------
// Wi-Fi / MQTT Transport
// ---------------------------------------------------------------------------
pub const WIFI_SSID: &str = "cardiomon-net";
pub const WIFI_PASSWORD: &str = "cardiomon-pass";
pub const MQTT_BROKER_URL: &str = "mqtt://192.168.1.10:1883";
pub const MQTT_CLIENT_ID: &str = "cardiomon-c3";
pub const MQTT_TOPIC_HEARTRATE: &str = "health/heartrate";
pub const MQTT_TOPIC_SPO2: &str = "health/spo2";
pub const MQTT_TOPIC_ECG: &str = "health/ecg";
/// Seconds between vital-sign publishes (heart rate and SpO2 alternate).
pub const TRANSMIT_INTERVAL_SEC: u32 = 5;
/// Bounded publish retry policy — the core only ever sees a boolean result.
pub const MQTT_RETRY_COUNT: u32 = 3;
pub const MQTT_RETRY_DELAY_MS: u64 = 100;
