// CardioMon — System Events & Data Types

// ---------------------------------------------------------------------------
// Biometric Reading (output of the PPG pipeline)
// ---------------------------------------------------------------------------
/// The single source of truth for the vitals shown on screen and sent over
/// MQTT.  Overwritten as a unit at the end of every full sample window.
#[derive(Debug, Clone, Copy, Default)]
pub struct BiometricReading {
    /// Beats per minute; 0 when no plausible cardiac period was found.
    pub heart_rate: u16,
    /// Blood oxygen saturation in percent.
    pub spo2: f32,
    /// Both PPG channels above the presence threshold this cycle.
    pub finger_detected: bool,
    /// A fresh window has completed since the reading was last consumed.
    pub data_ready: bool,
}

// ---------------------------------------------------------------------------
// Display Pages
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Page {
    #[default]
    Vitals,
    Ecg,
}

impl Page {
    pub fn next(self) -> Self {
        match self {
            Self::Vitals => Self::Ecg,
            Self::Ecg => Self::Vitals,
        }
    }
}

// ---------------------------------------------------------------------------
// Button Events — produced by the input manager, consumed by the main loop
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEvent {
    /// Single click — switch display page.
    SingleClick,
    /// Double click — start an ECG export session.
    DoubleClick,
    /// Long press (≥ 3 s) — cancel a running export.
    LongPress,
}
