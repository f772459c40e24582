// CardioMon — Streaming Low-Pass FIR Filter
//
// 29-tap linear-phase FIR used on both PPG channels (one instance per
// channel, each with its own history).  Hamming-window design, ~5 Hz cutoff
// at the 50 Hz effective sample rate: keeps the 0.5–4 Hz cardiac band and
// strips high-frequency noise before windowing.
//
// The filter is streaming: one input in, one output out, with phase history
// preserved across calls.

pub const FIR_TAPS: usize = 29;

/// Coefficient vector (MATLAB fdatool, Hamming window).  Symmetric with unit
/// DC gain, so a constant input converges to itself.
pub const FIR_COEFFS: [f32; FIR_TAPS] = [
    -0.001542701735,
    -0.002211477375,
    -0.003286228748,
    -0.00442651147,
    -0.004758632276,
    -0.003007677384,
    0.002192312852,
    0.01188309677,
    0.02637642808,
    0.04498152807,
    0.06596207619,
    0.0867607221,
    0.1044560149,
    0.1163498312,
    0.1205424443,
    0.1163498312,
    0.1044560149,
    0.0867607221,
    0.06596207619,
    0.04498152807,
    0.02637642808,
    0.01188309677,
    0.002192312852,
    -0.003007677384,
    -0.004758632276,
    -0.00442651147,
    -0.003286228748,
    -0.002211477375,
    -0.001542701735,
];

pub struct FirFilter {
    /// Circular history of past inputs; `pos` is the slot the next input
    /// overwrites.
    history: [f32; FIR_TAPS],
    pos: usize,
}

impl FirFilter {
    pub const fn new() -> Self {
        Self {
            history: [0.0; FIR_TAPS],
            pos: 0,
        }
    }

    /// Push one raw sample, get one filtered sample:
    /// `y[n] = Σ h[k] · x[n−k]`.
    pub fn push(&mut self, input: f32) -> f32 {
        self.history[self.pos] = input;

        let mut acc = 0.0f32;
        let mut idx = self.pos;
        for &coeff in FIR_COEFFS.iter() {
            acc += coeff * self.history[idx];
            idx = if idx == 0 { FIR_TAPS - 1 } else { idx - 1 };
        }

        self.pos = (self.pos + 1) % FIR_TAPS;
        acc
    }
}

/// One-pole IIR smoothing: `alpha · new + (1 − alpha) · last`.  Used on the
/// reported heart rate and on raw ECG samples before storage.
pub fn lowpass(last: f32, new: f32, alpha: f32) -> f32 {
    alpha * new + (1.0 - alpha) * last
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coefficients_are_symmetric() {
        for k in 0..FIR_TAPS {
            assert_eq!(FIR_COEFFS[k], FIR_COEFFS[FIR_TAPS - 1 - k]);
        }
    }

    #[test]
    fn dc_gain_is_unity() {
        // Feed a constant long enough to flush the history; the output must
        // converge to the same constant (coefficient sum ≈ 1).
        let mut filter = FirFilter::new();
        let mut out = 0.0;
        for _ in 0..(2 * FIR_TAPS) {
            out = filter.push(120_000.0);
        }
        assert!((out - 120_000.0).abs() < 50.0, "settled at {out}");
    }

    #[test]
    fn impulse_response_reproduces_coefficients() {
        let mut filter = FirFilter::new();
        let mut outputs = Vec::with_capacity(FIR_TAPS);
        outputs.push(filter.push(1.0));
        for _ in 1..FIR_TAPS {
            outputs.push(filter.push(0.0));
        }
        for (out, coeff) in outputs.iter().zip(FIR_COEFFS.iter()) {
            assert!((out - coeff).abs() < 1e-6);
        }
    }

    #[test]
    fn lowpass_blends_toward_new_value() {
        let out = lowpass(100.0, 50.0, 0.6);
        assert!((out - 70.0).abs() < 1e-6);
        // alpha = 1 passes the new value straight through.
        assert_eq!(lowpass(10.0, 42.0, 1.0), 42.0);
    }
}
