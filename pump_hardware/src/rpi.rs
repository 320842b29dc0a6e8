//! Raspberry Pi backend (rppal).
use std::thread::sleep;
use std::time::Duration;

use pump_traits::{BoxError, CharacterDisplay, CurrentSensor, PumpId, RelayBank, SwitchBank, SwitchId};
use rppal::gpio::{Gpio, InputPin, OutputPin};
use rppal::i2c::I2c;
use rppal::spi::{Bus, Mode, SlaveSelect, Spi};
use tracing::{debug, trace};

use crate::error::{HwError, Result};

fn gpio_err(e: rppal::gpio::Error) -> HwError {
    HwError::Gpio(e.to_string())
}

/// Contactor relays on two GPIO outputs.
pub struct GpioRelays {
    pins: [OutputPin; 2],
    active_high: bool,
}

impl GpioRelays {
    pub fn new(pump1_pin: u8, pump2_pin: u8, active_high: bool) -> Result<Self> {
        let gpio = Gpio::new().map_err(gpio_err)?;
        let mut pins = [
            gpio.get(pump1_pin).map_err(gpio_err)?.into_output(),
            gpio.get(pump2_pin).map_err(gpio_err)?.into_output(),
        ];
        // Both contactors open before anything else runs.
        for pin in &mut pins {
            if active_high {
                pin.set_low();
            } else {
                pin.set_high();
            }
        }
        Ok(Self { pins, active_high })
    }
}

impl RelayBank for GpioRelays {
    fn set_relay(&mut self, pump: PumpId, on: bool) -> std::result::Result<(), BoxError> {
        let pin = &mut self.pins[pump.index()];
        if on == self.active_high {
            pin.set_high();
        } else {
            pin.set_low();
        }
        trace!(pump = pump.number(), on, "relay");
        Ok(())
    }
}

/// Operator switches and the float, wired to 3V3 with internal pull-downs.
pub struct GpioSwitches {
    manual: InputPin,
    pump_select: InputPin,
    float: InputPin,
}

impl GpioSwitches {
    pub fn new(manual_pin: u8, select_pin: u8, float_pin: u8) -> Result<Self> {
        let gpio = Gpio::new().map_err(gpio_err)?;
        Ok(Self {
            manual: gpio.get(manual_pin).map_err(gpio_err)?.into_input_pulldown(),
            pump_select: gpio.get(select_pin).map_err(gpio_err)?.into_input_pulldown(),
            float: gpio.get(float_pin).map_err(gpio_err)?.into_input_pulldown(),
        })
    }
}

impl SwitchBank for GpioSwitches {
    fn read_switch(&mut self, id: SwitchId) -> std::result::Result<bool, BoxError> {
        let pin = match id {
            SwitchId::Manual => &self.manual,
            SwitchId::PumpSelect => &self.pump_select,
            SwitchId::Float => &self.float,
        };
        Ok(pin.is_high())
    }
}

/// MCP3008 10-bit ADC on SPI0; the ACS712 output sits on one channel.
pub struct Mcp3008CurrentSensor {
    spi: Spi,
    channel: u8,
}

impl Mcp3008CurrentSensor {
    pub fn new(channel: u8, clock_hz: u32) -> Result<Self> {
        if channel > 7 {
            return Err(HwError::Spi(format!("mcp3008 channel {channel} out of range")));
        }
        let spi = Spi::new(Bus::Spi0, SlaveSelect::Ss0, clock_hz, Mode::Mode0)
            .map_err(|e| HwError::Spi(e.to_string()))?;
        Ok(Self { spi, channel })
    }
}

impl CurrentSensor for Mcp3008CurrentSensor {
    fn read_raw_sample(&mut self) -> std::result::Result<u16, BoxError> {
        // Start bit, single-ended, channel select.
        let tx = [0x01, 0x80 | (self.channel << 4), 0x00];
        let mut rx = [0u8; 3];
        self.spi
            .transfer(&mut rx, &tx)
            .map_err(|e| HwError::Spi(e.to_string()))?;
        let counts = (u16::from(rx[1] & 0x03) << 8) | u16::from(rx[2]);
        // Left-align 10 bits into the 16-bit range the core expects.
        Ok(counts << 6)
    }
}

// PCF8574 backpack wiring: P0=RS, P1=RW, P2=EN, P3=backlight, P4..P7=D4..D7.
const LCD_RS: u8 = 0x01;
const LCD_EN: u8 = 0x04;
const LCD_BACKLIGHT: u8 = 0x08;
const LCD_CLEAR: u8 = 0x01;
const LCD_LINE_ADDR: [u8; 2] = [0x80, 0xC0];

/// HD44780 16x2 behind a PCF8574 I2C expander, 4-bit mode.
pub struct I2cLcd {
    i2c: I2c,
    cols: usize,
}

impl I2cLcd {
    pub fn new(address: u16, cols: usize) -> Result<Self> {
        let mut i2c = I2c::new().map_err(|e| HwError::I2c(e.to_string()))?;
        i2c.set_slave_address(address)
            .map_err(|e| HwError::I2c(e.to_string()))?;
        let mut lcd = Self { i2c, cols };
        lcd.init()?;
        debug!(address, cols, "lcd ready");
        Ok(lcd)
    }

    fn init(&mut self) -> Result<()> {
        sleep(Duration::from_millis(50));
        // Force 8-bit mode three times, then drop to 4-bit.
        for _ in 0..3 {
            self.write_nibble(0x03, 0)?;
            sleep(Duration::from_millis(5));
        }
        self.write_nibble(0x02, 0)?;
        self.command(0x28)?; // 4-bit, 2 lines, 5x8
        self.command(0x0C)?; // display on, cursor off
        self.command(LCD_CLEAR)?;
        sleep(Duration::from_millis(2));
        self.command(0x06)?; // entry mode: increment
        Ok(())
    }

    fn write_raw(&mut self, byte: u8) -> Result<()> {
        self.i2c
            .write(&[byte])
            .map(|_| ())
            .map_err(|e| HwError::I2c(e.to_string()))
    }

    fn write_nibble(&mut self, nibble: u8, rs: u8) -> Result<()> {
        let out = (nibble << 4) | LCD_BACKLIGHT | rs;
        self.write_raw(out | LCD_EN)?;
        sleep(Duration::from_micros(1));
        self.write_raw(out)?;
        sleep(Duration::from_micros(50));
        Ok(())
    }

    fn send(&mut self, byte: u8, rs: u8) -> Result<()> {
        self.write_nibble(byte >> 4, rs)?;
        self.write_nibble(byte & 0x0F, rs)
    }

    fn command(&mut self, cmd: u8) -> Result<()> {
        self.send(cmd, 0)
    }

    fn write_line(&mut self, row: usize, text: &str) -> Result<()> {
        self.command(LCD_LINE_ADDR[row])?;
        let mut written = 0;
        for ch in text.chars().take(self.cols) {
            let byte = if ch.is_ascii() { ch as u8 } else { b'?' };
            self.send(byte, LCD_RS)?;
            written += 1;
        }
        for _ in written..self.cols {
            self.send(b' ', LCD_RS)?;
        }
        Ok(())
    }
}

impl CharacterDisplay for I2cLcd {
    fn width(&self) -> usize {
        self.cols
    }

    fn show_lines(&mut self, line1: &str, line2: &str) -> std::result::Result<(), BoxError> {
        self.write_line(0, line1)?;
        self.write_line(1, line2)?;
        Ok(())
    }
}
