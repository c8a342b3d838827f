use crate::config::LedMap;
use crate::scheduler::Pacer;
use crate::services::Gpio;
use anyhow::Result;
use std::time::Duration;

/// Status LED patterns over the logical LED indices.
#[derive(Debug, Clone)]
pub struct StatusLeds {
    map: LedMap,
    gap: Duration,
}

impl StatusLeds {
    pub fn new(map: LedMap, gap: Duration) -> Self {
        Self { map, gap }
    }

    /// Running LED on, everything else off.
    pub fn startup(&self, gpio: &mut dyn Gpio) -> Result<()> {
        for index in self.map.all() {
            gpio.set_output(index, index == self.map.running)?;
        }
        Ok(())
    }

    pub fn set(&self, gpio: &mut dyn Gpio, index: usize, on: bool) -> Result<()> {
        gpio.set_output(index, on)
    }

    pub fn toggle(&self, gpio: &mut dyn Gpio, index: usize) -> Result<()> {
        let on = gpio.get_output(index);
        gpio.set_output(index, !on)
    }

    /// Toggle each LED in `leds` `times` times, pausing before every toggle.
    pub fn toggle_leds(
        &self,
        gpio: &mut dyn Gpio,
        pacer: &mut dyn Pacer,
        leds: &[usize],
        times: u32,
    ) -> Result<()> {
        for _ in 0..times {
            pacer.pause(self.gap);
            for index in leds {
                self.toggle(gpio, *index)?;
            }
        }
        Ok(())
    }

    /// Blink `flashes` times. Odd toggle count, so an LED that started off ends on.
    pub fn flash(
        &self,
        gpio: &mut dyn Gpio,
        pacer: &mut dyn Pacer,
        leds: &[usize],
        flashes: u32,
    ) -> Result<()> {
        if flashes == 0 {
            return Ok(());
        }
        self.toggle_leds(gpio, pacer, leds, flashes * 2 - 1)
    }

    /// All off, light each LED in turn, then put them all out together.
    pub fn farewell(&self, gpio: &mut dyn Gpio, pacer: &mut dyn Pacer) -> Result<()> {
        let all = self.map.all();
        for index in all {
            gpio.set_output(index, false)?;
        }
        for index in all {
            self.flash(gpio, pacer, &[index], 1)?;
        }
        self.flash(gpio, pacer, &all, 1)
    }

    /// On/off state of every output, in index order.
    pub fn snapshot(&self, gpio: &dyn Gpio) -> Vec<bool> {
        (0..gpio.output_count())
            .map(|index| gpio.get_output(index))
            .collect()
    }
}
