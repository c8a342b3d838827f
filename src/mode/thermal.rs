/// One tick's view of the CPU temperature sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ThermalSample {
    /// Not a whole-second tick; the sensor was not read.
    NotSampled,
    Reading(f32),
    Failed,
}

/// Outcome of feeding a sample to the watchdog.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ThermalVerdict {
    Normal(f32),
    Overheated(f32),
    /// The read failed but the failure streak is still below the limit.
    ReadFailed { consecutive: u32 },
    /// Too many failed reads in a row; treated like overheating.
    FailSafe { consecutive: u32 },
}

impl ThermalVerdict {
    pub fn requires_shutdown(&self) -> bool {
        matches!(
            self,
            ThermalVerdict::Overheated(_) | ThermalVerdict::FailSafe { .. }
        )
    }
}

/// Tracks the temperature limit and the consecutive failed-read streak.
#[derive(Debug, Clone)]
pub struct ThermalWatchdog {
    limit_c: f32,
    max_failures: u32,
    consecutive_failures: u32,
}

impl ThermalWatchdog {
    pub fn new(limit_c: f32, max_failures: u32) -> Self {
        Self {
            limit_c,
            max_failures: max_failures.max(1),
            consecutive_failures: 0,
        }
    }

    pub fn observe(&mut self, sample: ThermalSample) -> Option<ThermalVerdict> {
        let reading = match sample {
            ThermalSample::NotSampled => return None,
            ThermalSample::Reading(temp) if temp.is_finite() => Some(temp),
            ThermalSample::Reading(_) | ThermalSample::Failed => None,
        };

        let Some(temp) = reading else {
            self.consecutive_failures = self.consecutive_failures.saturating_add(1);
            let consecutive = self.consecutive_failures;
            return Some(if consecutive >= self.max_failures {
                ThermalVerdict::FailSafe { consecutive }
            } else {
                ThermalVerdict::ReadFailed { consecutive }
            });
        };

        self.consecutive_failures = 0;
        Some(if temp > self.limit_c {
            ThermalVerdict::Overheated(temp)
        } else {
            ThermalVerdict::Normal(temp)
        })
    }
}
