//! 16×2 character status panel.
//!
//! The HD44780 driver bit-bangs the 4-bit bus through sysfs GPIO. Wiring
//! comes from a TOML pin map embedded at compile time from
//! `contrib/hw/lcd-16x2.toml`; a deployment can point at an alternate file.
//! When no panel hardware is reachable, [`LogPanel`] routes the lines to the
//! log instead.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use thiserror::Error;

const EMBEDDED_PANEL_CONFIG: &str = include_str!("../../../contrib/hw/lcd-16x2.toml");

// HD44780 command set, 4-bit bus.
const CMD_CLEAR: u8 = 0x01;
const CMD_ENTRY_LEFT_TO_RIGHT: u8 = 0x06;
const CMD_DISPLAY_ON: u8 = 0x0C;
const CMD_FUNCTION_4BIT_2LINE: u8 = 0x28;
const CMD_SET_DDRAM: u8 = 0x80;
const LINE2_DDRAM_OFFSET: u8 = 0x40;

const ENABLE_PULSE: Duration = Duration::from_micros(50);
const COMMAND_SETTLE: Duration = Duration::from_micros(100);
const CLEAR_SETTLE: Duration = Duration::from_millis(2);

#[derive(Error, Debug)]
pub enum PanelError {
    #[error("gpio: {0}")]
    Gpio(#[from] std::io::Error),
    #[error("bad panel config {path}: {reason}")]
    BadConfig { path: PathBuf, reason: String },
}

/// Panel geometry and wiring, `[panel]` + `[pins]` sections.
#[derive(Debug, Clone, Deserialize)]
pub struct PanelConfig {
    pub panel: Geometry,
    pub pins: PinMap,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Geometry {
    pub columns: usize,
    pub rows: usize,
}

/// BCM pin numbers for the 4-bit bus.
#[derive(Debug, Clone, Deserialize)]
pub struct PinMap {
    pub rs: u32,
    pub en: u32,
    pub d4: u32,
    pub d5: u32,
    pub d6: u32,
    pub d7: u32,
}

impl PanelConfig {
    /// The compile-time default wiring.
    pub fn embedded() -> Self {
        toml::from_str(EMBEDDED_PANEL_CONFIG).expect("embedded panel config parses")
    }

    /// Load an alternate wiring file.
    pub fn from_file(path: &Path) -> Result<Self, PanelError> {
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|e| PanelError::BadConfig {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

/// Two-line character display for attendance status.
pub trait StatusPanel {
    fn show(&mut self, line1: &str, line2: &str) -> Result<(), PanelError>;
    fn clear(&mut self) -> Result<(), PanelError>;
}

/// One exported sysfs GPIO line, held for the panel's lifetime.
struct Gpio {
    value_path: PathBuf,
}

impl Gpio {
    fn export(pin: u32) -> Result<Self, PanelError> {
        let gpio_dir = PathBuf::from(format!("/sys/class/gpio/gpio{pin}"));
        if !gpio_dir.exists() {
            std::fs::write("/sys/class/gpio/export", pin.to_string())?;
        }
        std::fs::write(gpio_dir.join("direction"), "out")?;
        Ok(Self {
            value_path: gpio_dir.join("value"),
        })
    }

    fn set(&self, high: bool) -> Result<(), PanelError> {
        std::fs::write(&self.value_path, if high { "1" } else { "0" })?;
        Ok(())
    }
}

/// HD44780 16×2 panel on the 4-bit GPIO bus.
pub struct Hd44780 {
    rs: Gpio,
    en: Gpio,
    /// D4..D7, least significant bit first.
    data: [Gpio; 4],
    columns: usize,
}

impl Hd44780 {
    /// Export the pins and run the 4-bit initialisation sequence.
    pub fn open(config: &PanelConfig) -> Result<Self, PanelError> {
        let pins = &config.pins;
        let mut panel = Self {
            rs: Gpio::export(pins.rs)?,
            en: Gpio::export(pins.en)?,
            data: [
                Gpio::export(pins.d4)?,
                Gpio::export(pins.d5)?,
                Gpio::export(pins.d6)?,
                Gpio::export(pins.d7)?,
            ],
            columns: config.panel.columns,
        };
        panel.init()?;
        tracing::info!(columns = panel.columns, "HD44780 panel initialised");
        Ok(panel)
    }

    fn init(&mut self) -> Result<(), PanelError> {
        self.rs.set(false)?;
        // Datasheet wake-up: 0x3 three times, then switch to 4-bit mode.
        for _ in 0..3 {
            self.write_nibble(0x3)?;
            thread::sleep(Duration::from_millis(5));
        }
        self.write_nibble(0x2)?;
        thread::sleep(COMMAND_SETTLE);

        self.command(CMD_FUNCTION_4BIT_2LINE)?;
        self.command(CMD_DISPLAY_ON)?;
        self.command(CMD_ENTRY_LEFT_TO_RIGHT)?;
        self.command(CMD_CLEAR)?;
        thread::sleep(CLEAR_SETTLE);
        Ok(())
    }

    fn command(&mut self, byte: u8) -> Result<(), PanelError> {
        self.rs.set(false)?;
        self.write_byte(byte)
    }

    fn write_char(&mut self, ch: u8) -> Result<(), PanelError> {
        self.rs.set(true)?;
        self.write_byte(ch)
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), PanelError> {
        let (high, low) = nibbles(byte);
        self.write_nibble(high)?;
        self.write_nibble(low)?;
        thread::sleep(COMMAND_SETTLE);
        Ok(())
    }

    fn write_nibble(&mut self, nibble: u8) -> Result<(), PanelError> {
        for (bit, pin) in self.data.iter().enumerate() {
            pin.set((nibble >> bit) & 1 == 1)?;
        }
        self.en.set(true)?;
        thread::sleep(ENABLE_PULSE);
        self.en.set(false)?;
        Ok(())
    }

    fn write_line(&mut self, ddram_addr: u8, line: &str) -> Result<(), PanelError> {
        self.command(CMD_SET_DDRAM | ddram_addr)?;
        for ch in printable(line, self.columns) {
            self.write_char(ch)?;
        }
        Ok(())
    }
}

impl StatusPanel for Hd44780 {
    fn show(&mut self, line1: &str, line2: &str) -> Result<(), PanelError> {
        self.clear()?;
        self.write_line(0, line1)?;
        self.write_line(LINE2_DDRAM_OFFSET, line2)
    }

    fn clear(&mut self) -> Result<(), PanelError> {
        self.command(CMD_CLEAR)?;
        thread::sleep(CLEAR_SETTLE);
        Ok(())
    }
}

/// Fallback panel: the lines go to the log instead of hardware.
#[derive(Debug, Default)]
pub struct LogPanel;

impl StatusPanel for LogPanel {
    fn show(&mut self, line1: &str, line2: &str) -> Result<(), PanelError> {
        tracing::info!(line1, line2, "status panel");
        Ok(())
    }

    fn clear(&mut self) -> Result<(), PanelError> {
        Ok(())
    }
}

/// Split a byte into (high, low) nibbles for the 4-bit bus.
fn nibbles(byte: u8) -> (u8, u8) {
    (byte >> 4, byte & 0x0F)
}

/// Clip a line to the panel width and replace anything the HD44780 ROM
/// cannot show with '?'.
fn printable(line: &str, columns: usize) -> impl Iterator<Item = u8> + '_ {
    line.chars().take(columns).map(|c| {
        if c.is_ascii_graphic() || c == ' ' {
            c as u8
        } else {
            b'?'
        }
    })
}
