// CardioMon — SSD1306 OLED Driver
//
// 128×64 monochrome OLED on the shared I2C bus.  All drawing goes through an
// in-RAM framebuffer implementing the embedded-graphics `DrawTarget`; the
// UI refresh task flushes the whole buffer at 10 Hz.

use std::sync::Mutex;

use embedded_graphics::{
    mono_font::{ascii::FONT_6X10, ascii::FONT_9X15, MonoTextStyle},
    pixelcolor::BinaryColor,
    prelude::*,
    primitives::{Line, PrimitiveStyle, Rectangle},
    text::Text,
};
use esp_idf_hal::i2c::I2cDriver;

use crate::config::*;
use crate::events::BiometricReading;

/// Thread-safe handle to a shared I2C bus.
pub type SharedBus = &'static Mutex<I2cDriver<'static>>;

// ---------------------------------------------------------------------------
// Framebuffer
// ---------------------------------------------------------------------------

/// Page-organised SSD1306 framebuffer: bit `y % 8` of byte
/// `x + (y / 8) * WIDTH`.
struct FrameBuffer {
    buf: [u8; DISPLAY_BUFFER_SIZE],
}

impl FrameBuffer {
    const fn new() -> Self {
        Self {
            buf: [0; DISPLAY_BUFFER_SIZE],
        }
    }

    fn set_pixel(&mut self, x: i32, y: i32, on: bool) {
        if x < 0 || y < 0 || x >= SCREEN_WIDTH as i32 || y >= SCREEN_HEIGHT as i32 {
            return;
        }
        let idx = x as usize + (y as usize / 8) * SCREEN_WIDTH as usize;
        let bit = 1u8 << (y as usize % 8);
        if on {
            self.buf[idx] |= bit;
        } else {
            self.buf[idx] &= !bit;
        }
    }
}

impl OriginDimensions for FrameBuffer {
    fn size(&self) -> Size {
        Size::new(SCREEN_WIDTH, SCREEN_HEIGHT)
    }
}

impl DrawTarget for FrameBuffer {
    type Color = BinaryColor;
    type Error = core::convert::Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            self.set_pixel(point.x, point.y, color.is_on());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

pub struct OledDisplay {
    bus: SharedBus,
    fb: FrameBuffer,
}

impl OledDisplay {
    pub fn new(bus: SharedBus) -> Self {
        Self {
            bus,
            fb: FrameBuffer::new(),
        }
    }

    /// Standard SSD1306 init sequence (charge pump on, horizontal
    /// addressing).
    pub fn init(&mut self) -> anyhow::Result<()> {
        const INIT: [u8; 25] = [
            0xAE, // display off
            0xD5, 0x80, // clock divide
            0xA8, 0x3F, // multiplex 64
            0xD3, 0x00, // display offset
            0x40, // start line 0
            0x8D, 0x14, // charge pump on
            0x20, 0x00, // horizontal addressing
            0xA1, // segment remap
            0xC8, // COM scan direction
            0xDA, 0x12, // COM pins
            0x81, 0xCF, // contrast
            0xD9, 0xF1, // precharge
            0xDB, 0x40, // VCOM detect
            0xA4, // resume from RAM
            0xA6, // normal (non-inverted)
        ];
        for &cmd in INIT.iter() {
            self.command(cmd)?;
        }
        self.clear();
        self.flush()?;
        self.command(0xAF)?; // display on
        log::info!("SSD1306 initialised");
        Ok(())
    }

    /// Verify the panel answers on the I2C bus.
    pub fn is_connected(&self) -> bool {
        let mut bus = self.bus.lock().unwrap();
        bus.write(I2C_ADDR_OLED, &[0x00, 0xE3], I2C_TIMEOUT_TICKS) // NOP
            .is_ok()
    }

    /// Push the whole framebuffer to the panel.
    pub fn flush(&mut self) -> anyhow::Result<()> {
        // Reset the addressing window to the full screen.
        self.command(0x21)?; // column range
        self.command(0x00)?;
        self.command(0x7F)?;
        self.command(0x22)?; // page range
        self.command(0x00)?;
        self.command(0x07)?;

        let mut packet = [0u8; DISPLAY_BUFFER_SIZE + 1];
        packet[0] = 0x40; // data control byte
        packet[1..].copy_from_slice(&self.fb.buf);

        let mut bus = self.bus.lock().unwrap();
        bus.write(I2C_ADDR_OLED, &packet, I2C_TIMEOUT_TICKS)?;
        Ok(())
    }

    pub fn clear(&mut self) {
        self.fb.buf = [0; DISPLAY_BUFFER_SIZE];
    }

    /// Boot splash: one line of text, roughly centered.
    pub fn show_centered_text(&mut self, text: &str) -> anyhow::Result<()> {
        self.clear();
        let style = MonoTextStyle::new(&FONT_9X15, BinaryColor::On);
        let width = text.len() as i32 * 9;
        let x = ((SCREEN_WIDTH as i32 - width) / 2).max(0);
        Text::new(text, Point::new(x, 36), style).draw(&mut self.fb)?;
        self.flush()
    }

    // ---- Vitals page ------------------------------------------------------

    /// Heart-rate / SpO2 page, laid out like the original monitor: title,
    /// separator, two large value rows, finger status in the corner.
    pub fn draw_vitals_page(&mut self, reading: &BiometricReading) {
        self.clear();
        let small = MonoTextStyle::new(&FONT_6X10, BinaryColor::On);
        let large = MonoTextStyle::new(&FONT_9X15, BinaryColor::On);

        let _ = Text::new("Heart Rate & SpO2", Point::new(0, 8), small).draw(&mut self.fb);
        let _ = Line::new(Point::new(0, 10), Point::new(127, 10))
            .into_styled(PrimitiveStyle::with_stroke(BinaryColor::On, 1))
            .draw(&mut self.fb);

        let hr_text = format!("HR:   {:3} bpm", reading.heart_rate);
        let _ = Text::new(&hr_text, Point::new(4, 30), large).draw(&mut self.fb);

        let spo2_text = format!("SpO2: {:3} %", reading.spo2 as u16);
        let _ = Text::new(&spo2_text, Point::new(4, 50), large).draw(&mut self.fb);

        let status = if reading.finger_detected { "OK" } else { "--" };
        let _ = Text::new(status, Point::new(114, 8), small).draw(&mut self.fb);

        let _ = Text::new("1/2", Point::new(56, 62), small).draw(&mut self.fb);
    }

    // ---- ECG page ---------------------------------------------------------

    /// Static ECG page chrome: title and the two axes around the trace
    /// region.  Called on page entry and after every trace wrap.
    pub fn draw_ecg_frame(&mut self) {
        self.clear();
        let small = MonoTextStyle::new(&FONT_6X10, BinaryColor::On);
        let stroke = PrimitiveStyle::with_stroke(BinaryColor::On, 1);

        let _ = Text::new("ECG Monitor", Point::new(0, 8), small).draw(&mut self.fb);

        // X axis below the trace band, Y axis to its left.
        let _ = Line::new(
            Point::new(PLOT_X_ORIGIN - 1, PLOT_Y_BOTTOM + 1),
            Point::new(PLOT_X_ORIGIN + PLOT_WIDTH, PLOT_Y_BOTTOM + 1),
        )
        .into_styled(stroke)
        .draw(&mut self.fb);
        let _ = Line::new(
            Point::new(PLOT_X_ORIGIN - 1, PLOT_Y_TOP - 1),
            Point::new(PLOT_X_ORIGIN - 1, PLOT_Y_BOTTOM + 1),
        )
        .into_styled(stroke)
        .draw(&mut self.fb);

        let _ = Text::new("2/2", Point::new(56, 62), small).draw(&mut self.fb);
    }

    /// Wipe the trace band only (axes and chrome stay).
    pub fn clear_trace(&mut self) {
        let _ = Rectangle::new(
            Point::new(PLOT_X_ORIGIN, PLOT_Y_TOP),
            Size::new(PLOT_WIDTH as u32, (PLOT_Y_BOTTOM - PLOT_Y_TOP + 1) as u32),
        )
        .into_styled(PrimitiveStyle::with_fill(BinaryColor::Off))
        .draw(&mut self.fb);
    }

    /// One scrolling-trace segment between consecutive sample columns.
    pub fn draw_trace_segment(&mut self, x0: i32, y0: i32, x1: i32, y1: i32) {
        let _ = Line::new(Point::new(x0, y0), Point::new(x1, y1))
            .into_styled(PrimitiveStyle::with_stroke(BinaryColor::On, 1))
            .draw(&mut self.fb);
    }

    /// Export status in the ECG page header: draining progress or lead
    /// state.
    pub fn draw_ecg_status(&mut self, exporting: bool, progress: u8, leads_ok: bool) {
        // Blank the header corner before redrawing it.
        let _ = Rectangle::new(Point::new(80, 0), Size::new(48, 10))
            .into_styled(PrimitiveStyle::with_fill(BinaryColor::Off))
            .draw(&mut self.fb);

        let small = MonoTextStyle::new(&FONT_6X10, BinaryColor::On);
        let text = if exporting {
            format!("UP {:3}%", progress)
        } else if leads_ok {
            "LIVE".to_string()
        } else {
            "LEAD?".to_string()
        };
        let _ = Text::new(&text, Point::new(84, 8), small).draw(&mut self.fb);
    }

    fn command(&mut self, cmd: u8) -> anyhow::Result<()> {
        let mut bus = self.bus.lock().unwrap();
        bus.write(I2C_ADDR_OLED, &[0x00, cmd], I2C_TIMEOUT_TICKS)?;
        Ok(())
    }
}
