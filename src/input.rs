// CardioMon — Button Input Manager
//
// Debounced single-button handler with single-click, double-click, and
// long-press detection, polled from the main loop.  Click semantics are the
// caller's business (page switch / start export / cancel export) — this
// module only classifies presses.

use std::time::Instant;

use esp_idf_hal::gpio::{AnyInputPin, Input, PinDriver};

use crate::config::*;
use crate::events::ButtonEvent;

pub struct InputManager {
    pin: PinDriver<'static, AnyInputPin, Input>,

    // Debounce state
    last_raw: bool,
    last_debounce: Instant,

    // Press tracking
    press_start: Option<Instant>,
    button_down: bool,

    // Double-click state machine
    waiting_for_second_click: bool,
    first_click_time: Instant,
}

impl InputManager {
    pub fn new(pin: PinDriver<'static, AnyInputPin, Input>) -> Self {
        let now = Instant::now();
        Self {
            pin,
            last_raw: true, // pull-up → idle HIGH
            last_debounce: now,
            press_start: None,
            button_down: false,
            waiting_for_second_click: false,
            first_click_time: now,
        }
    }

    /// Poll the pin; call every ~10 ms.  Returns at most one classified
    /// event per call.
    pub fn update(&mut self) -> Option<ButtonEvent> {
        let current = self.pin.is_high(); // true = released (pull-up)
        let now = Instant::now();

        // ---- debounce filter ----
        if current != self.last_raw {
            self.last_debounce = now;
        }
        self.last_raw = current;

        let stable_ms = now.duration_since(self.last_debounce).as_millis() as u64;
        if stable_ms < DEBOUNCE_MS {
            // Signal still bouncing — only the double-click timeout can fire.
            return self.check_double_click_timeout(now);
        }

        let pressed = !current; // active LOW

        // ---- pressed edge ----
        if pressed && !self.button_down {
            self.button_down = true;
            self.press_start = Some(now);
        }

        // ---- released edge ----
        if !pressed && self.button_down {
            self.button_down = false;
            let hold_ms = self
                .press_start
                .map(|t| now.duration_since(t).as_millis() as u64)
                .unwrap_or(0);

            if hold_ms >= LONG_PRESS_MS {
                self.waiting_for_second_click = false;
                return Some(ButtonEvent::LongPress);
            }
            if self.waiting_for_second_click {
                // Second click inside the window → double-click.
                self.waiting_for_second_click = false;
                return Some(ButtonEvent::DoubleClick);
            }
            // First short click — open the double-click window.
            self.waiting_for_second_click = true;
            self.first_click_time = now;
        }

        self.check_double_click_timeout(now)
    }

    /// A single click is only reported once the double-click window expires
    /// without a second press.
    fn check_double_click_timeout(&mut self, now: Instant) -> Option<ButtonEvent> {
        if self.waiting_for_second_click {
            let elapsed = now.duration_since(self.first_click_time).as_millis() as u64;
            if elapsed > DOUBLE_CLICK_WINDOW_MS {
                self.waiting_for_second_click = false;
                return Some(ButtonEvent::SingleClick);
            }
        }
        None
    }
}
