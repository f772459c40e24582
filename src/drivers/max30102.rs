// CardioMon — MAX30102 Pulse Oximeter Driver
//
// Custom register-level driver over the shared I2C bus.  Configures the
// sensor for SpO2 mode at 200 Hz with 4× FIFO sample averaging, so one FIFO
// read yields a 50 Hz (IR, RED) pair.

use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use esp_idf_hal::i2c::I2cDriver;

use crate::config::*;

/// Thread-safe handle to a shared I2C bus.
pub type SharedBus = &'static Mutex<I2cDriver<'static>>;

// MAX30102 register addresses
const REG_INTERRUPT_STATUS1: u8 = 0x00;
const REG_INTERRUPT_STATUS2: u8 = 0x01;
const REG_INTERRUPT_ENABLE1: u8 = 0x02;
const REG_INTERRUPT_ENABLE2: u8 = 0x03;
const REG_FIFO_WR_POINTER: u8 = 0x04;
const REG_FIFO_OV_COUNTER: u8 = 0x05;
const REG_FIFO_RD_POINTER: u8 = 0x06;
const REG_FIFO_DATA: u8 = 0x07;
const REG_FIFO_CONFIG: u8 = 0x08;
const REG_MODE_CONFIG: u8 = 0x09;
const REG_SPO2_CONFIG: u8 = 0x0A;
const REG_LED1_PULSE_AMPLITUDE: u8 = 0x0C;
const REG_LED2_PULSE_AMPLITUDE: u8 = 0x0D;
const REG_TEMPERATURE_CONFIG: u8 = 0x21;
const REG_PART_ID: u8 = 0xFF;
const PART_ID_EXPECTED: u8 = 0x15;

/// ADC samples are 18-bit magnitudes.
const SAMPLE_MASK: u32 = 0x0003_FFFF;

pub struct Max30102 {
    bus: SharedBus,
}

impl Max30102 {
    pub fn new(bus: SharedBus) -> Self {
        Self { bus }
    }

    /// Verify the device is reachable on the I2C bus.
    pub fn is_connected(&self) -> bool {
        let mut bus = self.bus.lock().unwrap();
        let mut buf = [0u8; 1];
        match bus.write_read(I2C_ADDR_MAX30102, &[REG_PART_ID], &mut buf, I2C_TIMEOUT_TICKS) {
            Ok(()) => buf[0] == PART_ID_EXPECTED,
            Err(_) => false,
        }
    }

    /// Reset the part and configure SpO2 mode: 200 Hz sample rate, 4× FIFO
    /// averaging, 215 µs LED pulse width, both LED currents at 0x2F.
    pub fn init(&self) -> anyhow::Result<()> {
        self.write_reg(REG_MODE_CONFIG, 0x40)?; // reset
        thread::sleep(Duration::from_millis(5));

        // FIFO almost-full + new-data + ALC-overflow interrupts.
        self.write_reg(REG_INTERRUPT_ENABLE1, 0xE0)?;
        self.write_reg(REG_INTERRUPT_ENABLE2, 0x00)?;

        // Clear the FIFO pointers.
        self.write_reg(REG_FIFO_WR_POINTER, 0x00)?;
        self.write_reg(REG_FIFO_OV_COUNTER, 0x00)?;
        self.write_reg(REG_FIFO_RD_POINTER, 0x00)?;

        // 4× sample averaging, no rollover, almost-full at 15 free slots.
        self.write_reg(REG_FIFO_CONFIG, 0x4F)?;
        // SpO2 mode (IR + RED).
        self.write_reg(REG_MODE_CONFIG, 0x03)?;
        // 15.63 pA ADC resolution, 200 Hz, 215 µs pulse width.
        self.write_reg(REG_SPO2_CONFIG, 0x2A)?;

        self.write_reg(REG_LED1_PULSE_AMPLITUDE, 0x2F)?; // IR
        self.write_reg(REG_LED2_PULSE_AMPLITUDE, 0x2F)?; // RED

        self.write_reg(REG_TEMPERATURE_CONFIG, 0x01)?;

        // Reading the status registers clears any pending interrupt.
        let mut scratch = [0u8; 1];
        self.read_regs(REG_INTERRUPT_STATUS1, &mut scratch)?;
        self.read_regs(REG_INTERRUPT_STATUS2, &mut scratch)?;

        log::info!("MAX30102 initialised (SpO2 mode, 200 Hz, 4x averaging)");
        Ok(())
    }

    /// Burst-read one FIFO entry: 6 bytes, IR channel first, each masked to
    /// 18 bits.
    pub fn read_fifo(&self) -> anyhow::Result<(u32, u32)> {
        let mut raw = [0u8; 6];
        self.read_regs(REG_FIFO_DATA, &mut raw)?;

        let ir = (u32::from(raw[0]) << 16 | u32::from(raw[1]) << 8 | u32::from(raw[2]))
            & SAMPLE_MASK;
        let red = (u32::from(raw[3]) << 16 | u32::from(raw[4]) << 8 | u32::from(raw[5]))
            & SAMPLE_MASK;
        Ok((ir, red))
    }

    fn write_reg(&self, reg: u8, value: u8) -> anyhow::Result<()> {
        let mut bus = self.bus.lock().unwrap();
        bus.write(I2C_ADDR_MAX30102, &[reg, value], I2C_TIMEOUT_TICKS)?;
        Ok(())
    }

    fn read_regs(&self, reg: u8, buf: &mut [u8]) -> anyhow::Result<()> {
        let mut bus = self.bus.lock().unwrap();
        bus.write_read(I2C_ADDR_MAX30102, &[reg], buf, I2C_TIMEOUT_TICKS)?;
        Ok(())
    }
}
