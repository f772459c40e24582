// CardioMon — MQTT Transport Shim
//
// Wi-Fi station + MQTT client over esp-idf-svc.  The core hands this module
// a topic and a value and only ever learns a boolean outcome; retry policy
// (a fixed attempt count with a short pause, never an unbounded wait) lives
// entirely here.
//
// `TransmitSchedule` is the once-per-second cadence driven by the tick
// scheduler's epoch task: every TRANSMIT_INTERVAL_SEC seconds one vital sign
// goes out, alternating heart rate and SpO2.

use std::thread;
use std::time::Duration;

use esp_idf_hal::modem::Modem;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::mqtt::client::{EspMqttClient, MqttClientConfiguration, QoS};
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi};

use crate::config::*;

// ---------------------------------------------------------------------------
// Vital-sign cadence
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VitalKind {
    HeartRate,
    Spo2,
}

/// Counts epoch callbacks and raises a due flag every
/// `TRANSMIT_INTERVAL_SEC` seconds.  Single-writer from the caller's side;
/// the flag is cleared by `take_due`.
pub struct TransmitSchedule {
    seconds: u32,
    due: bool,
    next: VitalKind,
}

impl TransmitSchedule {
    pub const fn new() -> Self {
        Self {
            seconds: 0,
            due: false,
            next: VitalKind::HeartRate,
        }
    }

    /// Called once per epoch (1 Hz).
    pub fn on_second(&mut self) {
        self.seconds += 1;
        if self.seconds >= TRANSMIT_INTERVAL_SEC {
            self.seconds = 0;
            self.due = true;
        }
    }

    /// Consume the due flag.
    pub fn take_due(&mut self) -> bool {
        let due = self.due;
        self.due = false;
        due
    }

    /// Which vital sign the upcoming publish carries; alternates on each
    /// call.
    pub fn next_vital(&mut self) -> VitalKind {
        let kind = self.next;
        self.next = match kind {
            VitalKind::HeartRate => VitalKind::Spo2,
            VitalKind::Spo2 => VitalKind::HeartRate,
        };
        kind
    }
}

// ---------------------------------------------------------------------------
// Wi-Fi + MQTT client
// ---------------------------------------------------------------------------

pub struct Telemetry {
    // Held to keep the station association alive.
    _wifi: BlockingWifi<EspWifi<'static>>,
    client: EspMqttClient<'static>,
}

impl Telemetry {
    /// Bring up Wi-Fi (blocking until the netif is up) and connect the MQTT
    /// client.  The broker connection is pumped by a background thread; lost
    /// connections surface as publish failures, nothing more.
    pub fn connect(
        modem: Modem,
        sysloop: EspSystemEventLoop,
        nvs: EspDefaultNvsPartition,
    ) -> anyhow::Result<Self> {
        let mut wifi = BlockingWifi::wrap(
            EspWifi::new(modem, sysloop.clone(), Some(nvs))?,
            sysloop,
        )?;
        wifi.set_configuration(&Configuration::Client(ClientConfiguration {
            ssid: WIFI_SSID.try_into().unwrap_or_default(),
            password: WIFI_PASSWORD.try_into().unwrap_or_default(),
            auth_method: AuthMethod::WPA2Personal,
            ..Default::default()
        }))?;
        wifi.start()?;
        wifi.connect()?;
        wifi.wait_netif_up()?;
        log::info!("Wi-Fi connected to {}", WIFI_SSID);

        let (client, mut connection) = EspMqttClient::new(
            MQTT_BROKER_URL,
            &MqttClientConfiguration {
                client_id: Some(MQTT_CLIENT_ID),
                ..Default::default()
            },
        )?;

        // Drain broker events so the client keeps making progress.
        thread::Builder::new()
            .name("mqtt".into())
            .stack_size(4096)
            .spawn(move || while connection.next().is_ok() {})?;

        log::info!("MQTT client connected to {}", MQTT_BROKER_URL);
        Ok(Self {
            _wifi: wifi,
            client,
        })
    }

    /// Publish a single integer value.  Bounded wait-and-retry; `false`
    /// after the final attempt.
    pub fn send(&mut self, topic: &str, value: i32) -> bool {
        let payload = value.to_string();
        self.publish_with_retry(topic, payload.as_bytes())
    }

    /// Publish one ECG export batch as JSON.
    pub fn send_batch(&mut self, timestamp: u32, samples: &[u16]) -> bool {
        if samples.is_empty() {
            return true;
        }
        let mut payload = format!("{{\"ts\":{},\"samples\":[", timestamp);
        for (i, s) in samples.iter().enumerate() {
            if i > 0 {
                payload.push(',');
            }
            payload.push_str(&s.to_string());
        }
        payload.push_str("]}");
        self.publish_with_retry(MQTT_TOPIC_ECG, payload.as_bytes())
    }

    fn publish_with_retry(&mut self, topic: &str, payload: &[u8]) -> bool {
        for attempt in 1..=MQTT_RETRY_COUNT {
            match self
                .client
                .publish(topic, QoS::AtMostOnce, false, payload)
            {
                Ok(_) => return true,
                Err(e) => {
                    log::warn!(
                        "MQTT publish to {} failed (attempt {}/{}): {}",
                        topic,
                        attempt,
                        MQTT_RETRY_COUNT,
                        e
                    );
                    thread::sleep(Duration::from_millis(MQTT_RETRY_DELAY_MS));
                }
            }
        }
        false
    }
}
