// CardioMon — AD8232 ECG Front-End Driver
//
// The AD8232 outputs an analog ECG waveform plus two digital leads-off
// detect lines (LO+ / LO−, both low when the electrodes make contact).
// The analog output is read through ADC1 with raw ESP-IDF oneshot calls.

use esp_idf_hal::gpio::{AnyInputPin, Input, PinDriver};

use crate::config::*;

pub struct Ad8232 {
    adc: esp_idf_sys::adc_oneshot_unit_handle_t,
    channel: esp_idf_sys::adc_channel_t,
    lo_plus: PinDriver<'static, AnyInputPin, Input>,
    lo_minus: PinDriver<'static, AnyInputPin, Input>,
}

impl Ad8232 {
    /// Set up ADC1 on the ECG channel (12-bit, 11 dB attenuation for the
    /// 0–3.3 V output swing).
    pub fn new(
        lo_plus: PinDriver<'static, AnyInputPin, Input>,
        lo_minus: PinDriver<'static, AnyInputPin, Input>,
    ) -> anyhow::Result<Self> {
        let mut handle: esp_idf_sys::adc_oneshot_unit_handle_t = core::ptr::null_mut();
        unsafe {
            let unit_cfg = esp_idf_sys::adc_oneshot_unit_init_cfg_t {
                unit_id: esp_idf_sys::adc_unit_t_ADC_UNIT_1,
                ulp_mode: esp_idf_sys::adc_ulp_mode_t_ADC_ULP_MODE_DISABLE,
                ..core::mem::zeroed()
            };
            esp_idf_sys::esp!(esp_idf_sys::adc_oneshot_new_unit(&unit_cfg, &mut handle))?;

            let chan_cfg = esp_idf_sys::adc_oneshot_chan_cfg_t {
                atten: esp_idf_sys::adc_atten_t_ADC_ATTEN_DB_11,
                bitwidth: esp_idf_sys::adc_bitwidth_t_ADC_BITWIDTH_12,
            };
            let channel = esp_idf_sys::adc_channel_t_ADC_CHANNEL_2; // GPIO2
            esp_idf_sys::esp!(esp_idf_sys::adc_oneshot_config_channel(
                handle, channel, &chan_cfg
            ))?;

            log::info!("AD8232 ADC ready on channel {}", channel);
            Ok(Self {
                adc: handle,
                channel,
                lo_plus,
                lo_minus,
            })
        }
    }

    /// Both leads-off detect lines low means the electrodes are attached.
    pub fn leads_connected(&self) -> bool {
        self.lo_plus.is_low() && self.lo_minus.is_low()
    }

    /// One point sample of the ECG waveform (12-bit).  A failed conversion
    /// reads as 0 — the capture path treats every read as a point sample and
    /// carries on.
    pub fn read_sample(&mut self) -> u16 {
        let mut raw: i32 = 0;
        let ret = unsafe { esp_idf_sys::adc_oneshot_read(self.adc, self.channel, &mut raw) };
        if ret == esp_idf_sys::ESP_OK {
            raw as u16
        } else {
            0
        }
    }
}
