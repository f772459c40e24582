// CardioMon — ECG Capture & Export
//
// 200 Hz ECG samples are smoothed and stored in a fixed ring buffer holding
// the most recent 5 seconds.  A button-triggered export session freezes
// capture and drains the buffer oldest-first in small batches; new samples
// arriving during an export are dropped, not queued (single buffer, so an
// export leaves a gap in the record for its duration — accepted tradeoff).
//
// Capture and export are mutually exclusive by construction: the recorder is
// an explicit two-state machine, not a bare flag.

use crate::config::*;
use crate::filter::lowpass;

/// A bounded, externally triggered episode of draining the ring buffer.
#[derive(Debug, Clone, Copy)]
struct ExportSession {
    start_timestamp: u32,
    /// Sample count snapshotted at `start_export`; the progress denominator.
    total: usize,
    drained: usize,
}

#[derive(Debug, Clone, Copy)]
enum ExportState {
    Idle,
    Exporting(ExportSession),
}

pub struct EcgRecorder {
    buf: [u16; ECG_BUFFER_CAPACITY],
    /// Next write slot, wrapping mod capacity.
    write: usize,
    /// Stored sample count, saturating at capacity.
    available: usize,
    smooth_state: f32,
    state: ExportState,
    export_complete: bool,
}

impl EcgRecorder {
    pub const fn new() -> Self {
        Self {
            buf: [0; ECG_BUFFER_CAPACITY],
            write: 0,
            available: 0,
            smooth_state: 0.0,
            state: ExportState::Idle,
            export_complete: false,
        }
    }

    /// Smooth one raw ADC sample and, when idle, append it at the write
    /// cursor.  While an export session is active the sample is silently
    /// dropped.  Returns the smoothed value either way so the live trace can
    /// keep scrolling.
    pub fn capture(&mut self, raw: u16) -> u16 {
        self.smooth_state = lowpass(self.smooth_state, raw as f32, ECG_SMOOTH_ALPHA);
        let sample = self.smooth_state as u16;

        if let ExportState::Idle = self.state {
            self.buf[self.write] = sample;
            self.write = (self.write + 1) % ECG_BUFFER_CAPACITY;
            if self.available < ECG_BUFFER_CAPACITY {
                self.available += 1;
            }
        }
        sample
    }

    /// Stored sample count (oldest samples are overwritten once the buffer
    /// is full).
    pub fn available(&self) -> usize {
        self.available
    }

    pub fn is_exporting(&self) -> bool {
        matches!(self.state, ExportState::Exporting(_))
    }

    /// Begin draining the buffer.  Fails (returns `false`, no state change)
    /// if a session is already running; nested sessions don't exist.
    pub fn start_export(&mut self, timestamp: u32) -> bool {
        if self.is_exporting() {
            return false;
        }
        self.export_complete = false;
        self.state = ExportState::Exporting(ExportSession {
            start_timestamp: timestamp,
            total: self.available,
            drained: 0,
        });
        true
    }

    /// Copy up to `out.len()` samples, oldest first, advancing the read
    /// cursor.  Returns 0 once the session is drained, at which point the
    /// recorder transitions back to `Idle` and capture resumes.
    pub fn upload_batch(&mut self, out: &mut [u16]) -> usize {
        let session = match &mut self.state {
            ExportState::Exporting(s) => s,
            ExportState::Idle => return 0,
        };

        let count = out.len().min(session.total - session.drained);
        if count == 0 {
            self.state = ExportState::Idle;
            self.export_complete = true;
            return 0;
        }

        // Oldest stored sample: slot 0 until the buffer wraps, then the
        // write cursor itself.
        let oldest = if self.available < ECG_BUFFER_CAPACITY {
            0
        } else {
            self.write
        };
        for (k, slot) in out.iter_mut().take(count).enumerate() {
            *slot = self.buf[(oldest + session.drained + k) % ECG_BUFFER_CAPACITY];
        }
        session.drained += count;
        count
    }

    /// Abort a running session.  Unconditional and idempotent; the session
    /// carries no side effects beyond its own cursor, so there is nothing to
    /// roll back.
    pub fn stop_export(&mut self) {
        self.state = ExportState::Idle;
    }

    /// Drain progress in percent.  100 when the snapshot was empty.
    pub fn progress(&self) -> u8 {
        match &self.state {
            ExportState::Exporting(s) => {
                if s.total == 0 {
                    100
                } else {
                    (s.drained * 100 / s.total) as u8
                }
            }
            ExportState::Idle => {
                if self.export_complete {
                    100
                } else {
                    0
                }
            }
        }
    }

    /// True only after a session drained fully (not after `stop_export`).
    pub fn is_export_complete(&self) -> bool {
        self.export_complete
    }

    /// Timestamp the running session was started with.
    pub fn export_timestamp(&self) -> Option<u32> {
        match &self.state {
            ExportState::Exporting(s) => Some(s.start_timestamp),
            ExportState::Idle => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Scrolling trace automaton
// ---------------------------------------------------------------------------

/// What the display should do with one live sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlotStep {
    /// Draw a line segment between consecutive sample columns.
    Segment {
        x0: i32,
        y0: i32,
        x1: i32,
        y1: i32,
    },
    /// The x-cursor hit the plot width: clear the trace region, redraw the
    /// axes, and restart from the left edge.
    Wrap,
}

/// X-cursor state machine for the scrolling ECG trace.  Pure geometry — the
/// display driver executes the steps.
pub struct EcgPlot {
    x: i32,
    last_y: i32,
}

impl EcgPlot {
    pub const fn new() -> Self {
        Self {
            x: 0,
            last_y: PLOT_Y_BOTTOM,
        }
    }

    pub fn push(&mut self, sample: u16) -> PlotStep {
        let y = Self::scale(sample);

        if self.x + 1 >= PLOT_WIDTH {
            self.x = 0;
            self.last_y = y;
            return PlotStep::Wrap;
        }

        let step = PlotStep::Segment {
            x0: PLOT_X_ORIGIN + self.x,
            y0: self.last_y,
            x1: PLOT_X_ORIGIN + self.x + 1,
            y1: y,
        };
        self.x += 1;
        self.last_y = y;
        step
    }

    /// Map a 12-bit ADC sample into the plot band (larger sample → higher on
    /// screen → smaller y).
    fn scale(sample: u16) -> i32 {
        let span = PLOT_Y_BOTTOM - PLOT_Y_TOP;
        PLOT_Y_BOTTOM - (sample as i32).min(4095) * span / 4095
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_counts_up_to_capacity_then_wraps() {
        let mut rec = EcgRecorder::new();
        for i in 0..100u16 {
            rec.capture(i);
        }
        assert_eq!(rec.available(), 100);

        for i in 0..(ECG_BUFFER_CAPACITY as u16 + 50) {
            rec.capture(i);
        }
        // Saturates at capacity; the write cursor keeps wrapping.
        assert_eq!(rec.available(), ECG_BUFFER_CAPACITY);
        assert!(rec.write < ECG_BUFFER_CAPACITY);
    }

    #[test]
    fn capture_smoothing_converges_to_constant_input() {
        let mut rec = EcgRecorder::new();
        let mut stored = 0;
        for _ in 0..50 {
            stored = rec.capture(2000);
        }
        // Geometric convergence; the f32 state sits just under the input.
        assert!((i32::from(stored) - 2000).abs() <= 1);
    }

    #[test]
    fn export_of_fifty_samples_batch_by_batch() {
        let mut rec = EcgRecorder::new();
        for _ in 0..50 {
            rec.capture(2048);
        }
        assert_eq!(rec.available(), 50);

        assert!(rec.start_export(1234));
        assert_eq!(rec.export_timestamp(), Some(1234));
        assert!(!rec.start_export(5678), "nested sessions must be refused");

        let mut batch = [0u16; 1];
        let mut non_zero_batches = 0;
        let mut last_progress = 0u8;
        loop {
            let n = rec.upload_batch(&mut batch);
            let p = rec.progress();
            assert!(p >= last_progress, "progress must be monotone");
            last_progress = p;
            if n == 0 {
                break;
            }
            assert!(!rec.is_export_complete());
            non_zero_batches += 1;
        }

        assert_eq!(non_zero_batches, 50);
        assert_eq!(last_progress, 100);
        assert!(rec.is_export_complete());
        assert!(!rec.is_exporting());
    }

    #[test]
    fn capture_during_export_is_dropped() {
        let mut rec = EcgRecorder::new();
        for _ in 0..50 {
            rec.capture(1000);
        }
        rec.start_export(0);

        let write_before = rec.write;
        for _ in 0..25 {
            rec.capture(3000);
        }
        assert_eq!(rec.available(), 50);
        assert_eq!(rec.write, write_before);

        // Drain fully; capture then resumes.
        let mut batch = [0u16; ECG_BATCH_SAMPLES];
        while rec.upload_batch(&mut batch) != 0 {}
        rec.capture(3000);
        assert_eq!(rec.available(), 51);
    }

    #[test]
    fn export_drains_oldest_first_after_wrap() {
        let mut rec = EcgRecorder::new();
        // Overfill by 10: samples 0..capacity+10, so the oldest kept is 10.
        for i in 0..(ECG_BUFFER_CAPACITY + 10) {
            rec.capture((i % 4096) as u16);
        }
        rec.start_export(0);
        let mut batch = [0u16; 4];
        assert_eq!(rec.upload_batch(&mut batch), 4);
        // After a wrap the oldest surviving sample sits at the write cursor.
        assert_eq!(batch[0], rec.buf[rec.write]);
    }

    #[test]
    fn empty_export_reports_complete_at_once() {
        let mut rec = EcgRecorder::new();
        rec.start_export(7);
        assert_eq!(rec.progress(), 100);
        let mut batch = [0u16; ECG_BATCH_SAMPLES];
        assert_eq!(rec.upload_batch(&mut batch), 0);
        assert!(rec.is_export_complete());
    }

    #[test]
    fn stop_export_cancels_without_completion() {
        let mut rec = EcgRecorder::new();
        for _ in 0..30 {
            rec.capture(500);
        }
        rec.start_export(0);
        rec.stop_export();
        rec.stop_export(); // idempotent
        assert!(!rec.is_exporting());
        assert!(!rec.is_export_complete());
        // Capture resumes immediately.
        rec.capture(500);
        assert_eq!(rec.available(), 31);
    }

    #[test]
    fn plot_wraps_at_trace_width() {
        let mut plot = EcgPlot::new();
        let mut wraps = 0;
        let mut segments = 0;
        for _ in 0..(2 * PLOT_WIDTH) {
            match plot.push(2048) {
                PlotStep::Wrap => wraps += 1,
                PlotStep::Segment { x0, x1, .. } => {
                    assert!(x0 >= PLOT_X_ORIGIN && x1 < PLOT_X_ORIGIN + PLOT_WIDTH);
                    segments += 1;
                }
            }
        }
        assert_eq!(wraps, 2);
        assert_eq!(segments as i32, 2 * PLOT_WIDTH - 2);
    }

    #[test]
    fn plot_scale_is_inverted_and_clamped() {
        let mut plot = EcgPlot::new();
        // Low sample → bottom of the band; max sample → top.
        match plot.push(0) {
            PlotStep::Segment { y1, .. } => assert_eq!(y1, PLOT_Y_BOTTOM),
            PlotStep::Wrap => unreachable!(),
        }
        match plot.push(4095) {
            PlotStep::Segment { y1, .. } => assert_eq!(y1, PLOT_Y_TOP),
            PlotStep::Wrap => unreachable!(),
        }
    }
}
