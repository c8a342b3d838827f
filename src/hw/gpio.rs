use crate::services::Gpio;
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tracing::warn;

pub const SYSFS_GPIO_ROOT: &str = "/sys/class/gpio";
// udev needs a moment to fix permissions on freshly exported pins.
const EXPORT_SETTLE: Duration = Duration::from_millis(100);

/// LEDs and buttons through the sysfs GPIO interface.
///
/// Logical output `i` is `led_pins[i]`; logical input `i` is `button_pins[i]`.
/// Pins exported here are unexported on release.
pub struct SysfsGpio {
    root: PathBuf,
    led_pins: Vec<u32>,
    button_pins: Vec<u32>,
    states: Vec<bool>,
    buttons_active_high: bool,
    exported: Vec<u32>,
}

impl SysfsGpio {
    pub fn new(
        root: &Path,
        led_pins: &[u32],
        button_pins: &[u32],
        buttons_active_high: bool,
    ) -> Result<Self> {
        let mut gpio = Self {
            root: root.to_path_buf(),
            led_pins: led_pins.to_vec(),
            button_pins: button_pins.to_vec(),
            states: vec![false; led_pins.len()],
            buttons_active_high,
            exported: Vec::new(),
        };
        for pin in led_pins {
            gpio.export(*pin)?;
            gpio.write_attr(*pin, "direction", "out")?;
            gpio.write_attr(*pin, "value", "0")?;
        }
        for pin in button_pins {
            gpio.export(*pin)?;
            gpio.write_attr(*pin, "direction", "in")?;
        }
        Ok(gpio)
    }

    fn pin_dir(&self, pin: u32) -> PathBuf {
        self.root.join(format!("gpio{pin}"))
    }

    fn export(&mut self, pin: u32) -> Result<()> {
        if self.pin_dir(pin).exists() {
            return Ok(());
        }
        let export = self.root.join("export");
        fs::write(&export, pin.to_string())
            .with_context(|| format!("failed to export GPIO {pin} via {}", export.display()))?;
        self.exported.push(pin);
        thread::sleep(EXPORT_SETTLE);
        Ok(())
    }

    fn write_attr(&self, pin: u32, attr: &str, value: &str) -> Result<()> {
        let path = self.pin_dir(pin).join(attr);
        fs::write(&path, value).with_context(|| format!("failed to write {}", path.display()))
    }

    fn led_pin(&self, index: usize) -> Result<u32> {
        self.led_pins
            .get(index)
            .copied()
            .ok_or_else(|| anyhow!("no LED at index {index}"))
    }
}

impl Gpio for SysfsGpio {
    fn set_output(&mut self, index: usize, on: bool) -> Result<()> {
        let pin = self.led_pin(index)?;
        self.write_attr(pin, "value", if on { "1" } else { "0" })?;
        self.states[index] = on;
        Ok(())
    }

    fn get_output(&self, index: usize) -> bool {
        self.states.get(index).copied().unwrap_or(false)
    }

    fn read_input(&mut self, index: usize) -> Result<bool> {
        let pin = self
            .button_pins
            .get(index)
            .copied()
            .ok_or_else(|| anyhow!("no button at index {index}"))?;
        let path = self.pin_dir(pin).join("value");
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let high = raw.trim() == "1";
        Ok(high == self.buttons_active_high)
    }

    fn output_count(&self) -> usize {
        self.led_pins.len()
    }

    fn release(&mut self) {
        for index in 0..self.led_pins.len() {
            let _ = self.set_output(index, false);
        }
        let unexport = self.root.join("unexport");
        for pin in self.exported.drain(..) {
            if let Err(err) = fs::write(&unexport, pin.to_string()) {
                warn!(pin, error = %err, "failed to unexport GPIO pin");
            }
        }
    }
}

impl Drop for SysfsGpio {
    fn drop(&mut self) {
        self.release();
    }
}
