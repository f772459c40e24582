// CardioMon — PPG Acquisition & Feature Extraction Pipeline
//
// Runs once per 50 Hz scheduler trigger: takes the two raw MAX30102 channel
// values (IR and RED), low-pass filters each, gates on finger presence, and
// accumulates filtered samples into fixed 150-sample windows.  When a window
// fills, heart rate and SpO2 are extracted exactly once and the
// `BiometricReading` is overwritten as a unit.
//
// The heart-rate detector is deliberately minimal: the first two falling
// mean-crossings of the IR window define one cardiac period.  Downstream
// calibration (the valid band and the smoothing weight) assumes exactly this
// definition, so it must not be made more robust without recalibrating.

use crate::config::*;
use crate::events::BiometricReading;
use crate::filter::{lowpass, FirFilter};

pub struct PpgPipeline {
    ir_filter: FirFilter,
    red_filter: FirFilter,
    ir_window: [f32; PPG_WINDOW_SIZE],
    red_window: [f32; PPG_WINDOW_SIZE],
    fill: usize,
    reading: BiometricReading,
    /// Previous raw estimate; the smoothing blends the new estimate against
    /// this, not against the previous smoothed value.
    last_rate: f32,
    smoothed_rate: f32,
}

impl PpgPipeline {
    pub const fn new() -> Self {
        Self {
            ir_filter: FirFilter::new(),
            red_filter: FirFilter::new(),
            ir_window: [0.0; PPG_WINDOW_SIZE],
            red_window: [0.0; PPG_WINDOW_SIZE],
            fill: 0,
            reading: BiometricReading {
                heart_rate: 0,
                spo2: 0.0,
                finger_detected: false,
                data_ready: false,
            },
            last_rate: 0.0,
            smoothed_rate: 0.0,
        }
    }

    /// Feed one raw sample pair.  Returns `true` when this call completed a
    /// window and refreshed the reading.
    pub fn process(&mut self, raw_ir: u32, raw_red: u32) -> bool {
        // The filters run unconditionally so their history stays continuous
        // across short presence dropouts.
        let ir = self.ir_filter.push(raw_ir as f32);
        let red = self.red_filter.push(raw_red as f32);

        // Presence gate: both channels must clear the threshold in the same
        // cycle.  Absence resets the windows and zeroes the rate at once —
        // no hold-last-value.
        if raw_ir <= PPG_PRESENCE_THRESHOLD || raw_red <= PPG_PRESENCE_THRESHOLD {
            self.fill = 0;
            self.reading.finger_detected = false;
            self.reading.heart_rate = 0;
            // The transmitted rate zeroes too; nothing stale leaves the
            // device while the finger is off.
            self.smoothed_rate = 0.0;
            return false;
        }
        self.reading.finger_detected = true;

        self.ir_window[self.fill] = ir;
        self.red_window[self.fill] = red;
        self.fill += 1;

        if self.fill < PPG_WINDOW_SIZE {
            return false;
        }

        // Window complete: extract features once, then start over.
        let heart_rate = estimate_heart_rate(&self.ir_window);
        let spo2 = estimate_spo2(&self.ir_window, &self.red_window);
        self.smoothed_rate = lowpass(self.last_rate, heart_rate as f32, HR_SMOOTH_ALPHA);
        self.last_rate = heart_rate as f32;
        self.reading = BiometricReading {
            heart_rate,
            spo2,
            finger_detected: true,
            data_ready: true,
        };
        self.fill = 0;
        true
    }

    /// Current reading (may be stale; check `data_ready`).
    pub fn reading(&self) -> BiometricReading {
        self.reading
    }

    /// Consume a fresh reading, clearing `data_ready`.
    pub fn take_reading(&mut self) -> Option<BiometricReading> {
        if !self.reading.data_ready {
            return None;
        }
        self.reading.data_ready = false;
        let mut reading = self.reading;
        reading.data_ready = true;
        Some(reading)
    }

    /// One-pole smoothed heart rate, used for the MQTT publishes.
    pub fn smoothed_heart_rate(&self) -> u16 {
        self.smoothed_rate as u16
    }
}

/// Two-crossing heart-rate detector.
///
/// Finds the first two indices where the IR signal falls through the window
/// mean; the index delta is the cardiac period in samples.  Periods outside
/// `HR_PERIOD_MIN..=HR_PERIOD_MAX` (and windows with fewer than two
/// crossings) report 0.
pub fn estimate_heart_rate(window: &[f32]) -> u16 {
    let mean = window.iter().sum::<f32>() / window.len() as f32;

    let mut first = None;
    let mut period = None;
    let mut i = 0;
    while i + 1 < window.len() {
        if window[i] > mean && window[i + 1] < mean {
            match first {
                None => first = Some(i),
                Some(start) => {
                    period = Some(i - start);
                    break;
                }
            }
        }
        i += 1;
    }

    match period {
        Some(p) if (HR_PERIOD_MIN..=HR_PERIOD_MAX).contains(&p) => {
            (HR_BPM_NUMERATOR / p as u32) as u16
        }
        _ => 0,
    }
}

/// Empirical SpO2 from the min/max envelope of both channels:
/// `R = ((IRmax−IRmin)·REDmin) / ((REDmax−REDmin)·IRmin)`, then the fixed
/// calibration quadratic.  No AC/DC separation beyond min/max.
pub fn estimate_spo2(ir: &[f32], red: &[f32]) -> f32 {
    let (mut ir_min, mut ir_max) = (ir[0], ir[0]);
    let (mut red_min, mut red_max) = (red[0], red[0]);
    for (&i, &r) in ir.iter().zip(red.iter()).skip(1) {
        ir_min = ir_min.min(i);
        ir_max = ir_max.max(i);
        red_min = red_min.min(r);
        red_max = red_max.max(r);
    }

    let denom = (red_max - red_min) * ir_min;
    if denom == 0.0 {
        // Degenerate window (flat channel); no meaningful ratio.
        return 0.0;
    }
    let r = ((ir_max - ir_min) * red_min) / denom;
    -45.060 * r * r + 30.354 * r + 94.845
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
#[cfg(test)]
mod tests {
    use super::*;

    /// Square wave with the given period: first half above zero, second half
    /// below, giving one falling mean-crossing per period.
    fn square_window(period: usize) -> [f32; PPG_WINDOW_SIZE] {
        let mut w = [0.0; PPG_WINDOW_SIZE];
        for (i, s) in w.iter_mut().enumerate() {
            *s = if (i % period) < period / 2 { 1.0 } else { -1.0 };
        }
        w
    }

    #[test]
    fn heart_rate_from_square_wave_period() {
        // Period 40 samples at 50 Hz → 75 BPM.
        assert_eq!(estimate_heart_rate(&square_window(40)), 75);
        // Period 50 → 60 BPM.
        assert_eq!(estimate_heart_rate(&square_window(50)), 60);
    }

    #[test]
    fn heart_rate_rejects_out_of_band_periods() {
        // Period 10 → 300 BPM, below the 15-sample floor.
        assert_eq!(estimate_heart_rate(&square_window(10)), 0);
        // Two crossings 125 samples apart — above the 99-sample ceiling.
        let mut w = [-1.0f32; PPG_WINDOW_SIZE];
        for s in w.iter_mut().take(10) {
            *s = 10.0;
        }
        for s in w.iter_mut().skip(125).take(10) {
            *s = 10.0;
        }
        assert_eq!(estimate_heart_rate(&w), 0);
    }

    #[test]
    fn heart_rate_zero_without_two_crossings() {
        // Monotonic ramp: never falls through the mean.
        let mut ramp = [0.0f32; PPG_WINDOW_SIZE];
        for (i, s) in ramp.iter_mut().enumerate() {
            *s = i as f32;
        }
        assert_eq!(estimate_heart_rate(&ramp), 0);

        // Exactly one crossing.
        let mut single = [1.0f32; PPG_WINDOW_SIZE];
        for s in single.iter_mut().skip(PPG_WINDOW_SIZE / 2) {
            *s = -1.0;
        }
        assert_eq!(estimate_heart_rate(&single), 0);
    }

    #[test]
    fn spo2_invariant_under_uniform_scaling() {
        let mut ir = [0.0f32; PPG_WINDOW_SIZE];
        let mut red = [0.0f32; PPG_WINDOW_SIZE];
        for i in 0..PPG_WINDOW_SIZE {
            let phase = i as f32 * 0.15;
            ir[i] = 110_000.0 + 1_000.0 * phase.sin();
            red[i] = 105_000.0 + 3_000.0 * phase.cos();
        }
        let base = estimate_spo2(&ir, &red);

        let ir_scaled: Vec<f32> = ir.iter().map(|v| v * 3.7).collect();
        let red_scaled: Vec<f32> = red.iter().map(|v| v * 3.7).collect();
        let scaled = estimate_spo2(&ir_scaled, &red_scaled);

        assert!((base - scaled).abs() < 0.05, "{base} vs {scaled}");
        assert!(base > 80.0 && base < 100.5, "implausible SpO2 {base}");
    }

    /// Raw square wave above the presence threshold: 20 samples high, 20
    /// low, one 40-sample (75 BPM) period at the effective rate.
    fn square_raw(i: usize) -> u32 {
        if (i / 20) % 2 == 0 {
            150_000
        } else {
            110_000
        }
    }

    #[test]
    fn smoothing_blends_against_previous_raw_estimate() {
        let mut ppg = PpgPipeline::new();
        for i in 0..PPG_WINDOW_SIZE {
            ppg.process(square_raw(i), square_raw(i));
        }
        let hr1 = ppg.reading().heart_rate;

        for i in PPG_WINDOW_SIZE..(2 * PPG_WINDOW_SIZE) {
            ppg.process(square_raw(i), square_raw(i));
        }
        // The second window sits past the FIR transient: one falling
        // mean-crossing every 40 samples.
        assert_eq!(ppg.reading().heart_rate, 75);
        let expected = lowpass(hr1 as f32, 75.0, HR_SMOOTH_ALPHA);
        assert_eq!(ppg.smoothed_heart_rate(), expected as u16);

        for i in (2 * PPG_WINDOW_SIZE)..(3 * PPG_WINDOW_SIZE) {
            ppg.process(square_raw(i), square_raw(i));
        }
        // Two identical raw estimates in a row converge the blend exactly.
        assert_eq!(ppg.smoothed_heart_rate(), 75);
    }

    #[test]
    fn presence_loss_zeroes_transmitted_rate() {
        let mut ppg = PpgPipeline::new();
        for i in 0..(2 * PPG_WINDOW_SIZE) {
            ppg.process(square_raw(i), square_raw(i));
        }
        assert!(ppg.smoothed_heart_rate() > 0);

        // Finger lifted: the rate sent upstream drops to zero at once, not
        // on the next window.
        ppg.process(50_000, 110_000);
        assert_eq!(ppg.smoothed_heart_rate(), 0);
        assert_eq!(ppg.reading().heart_rate, 0);
    }

    #[test]
    fn window_completion_sets_data_ready_once() {
        let mut ppg = PpgPipeline::new();
        let mut completions = 0;
        for i in 0..PPG_WINDOW_SIZE {
            // Presence threshold cleared; small wobble so the window isn't flat.
            let wobble = ((i % 40) as u32) * 50;
            if ppg.process(120_000 + wobble, 115_000 + wobble) {
                completions += 1;
            }
        }
        assert_eq!(completions, 1);

        let reading = ppg.take_reading().expect("reading should be fresh");
        assert!(reading.finger_detected);
        assert!(reading.data_ready);
        // Consuming clears the flag.
        assert!(ppg.take_reading().is_none());
    }

    #[test]
    fn presence_loss_mid_window_resets_everything() {
        let mut ppg = PpgPipeline::new();
        for _ in 0..80 {
            ppg.process(120_000, 115_000);
        }
        assert!(ppg.reading().finger_detected);

        // Sample 81: finger lifted — immediate effects, no hold-last-value.
        ppg.process(50_000, 115_000);
        assert!(!ppg.reading().finger_detected);
        assert_eq!(ppg.reading().heart_rate, 0);

        // The window restarted from empty: a full 150 good samples are needed
        // before the next extraction.
        let mut completed = false;
        for i in 0..PPG_WINDOW_SIZE {
            completed = ppg.process(120_000, 115_000);
            if completed {
                assert_eq!(i, PPG_WINDOW_SIZE - 1);
            }
        }
        assert!(completed);
    }
}
