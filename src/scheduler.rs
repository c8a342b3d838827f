//! Fixed-period loop timing: tick counting, boundary detection, drive edges.

use crossbeam_channel::{tick, Receiver};
use std::thread;
use std::time::{Duration, Instant};

/// Integer tick counter. Elapsed time is always derived from the count, never summed.
#[derive(Debug, Clone)]
pub struct TickClock {
    tick_ms: u64,
    ticks: u64,
}

impl TickClock {
    pub fn new(tick_ms: u64) -> Self {
        Self {
            tick_ms: tick_ms.max(1),
            ticks: 0,
        }
    }

    /// Move to the next tick.
    pub fn advance(&mut self) {
        self.ticks = self.ticks.saturating_add(1);
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn tick_ms(&self) -> u64 {
        self.tick_ms
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.ticks.saturating_mul(self.tick_ms)
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.elapsed_ms() / 1000
    }

    pub fn on_second(&self) -> bool {
        self.on_interval(1000)
    }

    pub fn on_half_second(&self) -> bool {
        self.on_interval(500)
    }

    /// True on ticks whose elapsed time is a whole multiple of `interval_ms`.
    pub fn on_interval(&self, interval_ms: u64) -> bool {
        interval_ms > 0 && self.elapsed_ms() % interval_ms == 0
    }

    /// Milliseconds since the tick recorded in `mark`.
    pub fn ms_since(&self, mark: u64) -> u64 {
        self.ticks.saturating_sub(mark).saturating_mul(self.tick_ms)
    }
}

/// Detects the absent-to-present edge of the removable drive.
#[derive(Debug, Clone, Default)]
pub struct DriveWatch {
    present_last_tick: bool,
}

impl DriveWatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record this tick's presence and report whether the drive just appeared.
    pub fn observe(&mut self, present: bool) -> bool {
        let inserted = present && !self.present_last_tick;
        self.present_last_tick = present;
        inserted
    }

    pub fn present(&self) -> bool {
        self.present_last_tick
    }
}

/// Blocks the control thread between ticks and between flash toggles.
pub trait Pacer {
    fn wait_for_tick(&mut self);
    fn pause(&mut self, gap: Duration);
}

/// Wall-clock pacing. A slow tick leaves at most one pending tick, so the loop
/// runs behind instead of bursting to catch up.
pub struct TickPacer {
    ticker: Receiver<Instant>,
}

impl TickPacer {
    pub fn new(period: Duration) -> Self {
        Self {
            ticker: tick(period),
        }
    }
}

impl Pacer for TickPacer {
    fn wait_for_tick(&mut self) {
        let _ = self.ticker.recv();
    }

    fn pause(&mut self, gap: Duration) {
        thread::sleep(gap);
    }
}

/// Runs ticks back to back. Used with simulated hardware.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDelay;

impl Pacer for NoDelay {
    fn wait_for_tick(&mut self) {}

    fn pause(&mut self, _gap: Duration) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quarter_second_ticks_hit_second_boundaries_every_fourth_tick() {
        let mut clock = TickClock::new(250);
        let mut seconds = Vec::new();
        let mut halves = Vec::new();
        for _ in 0..8 {
            clock.advance();
            if clock.on_second() {
                seconds.push(clock.ticks());
            }
            if clock.on_half_second() {
                halves.push(clock.ticks());
            }
        }
        assert_eq!(seconds, vec![4, 8]);
        assert_eq!(halves, vec![2, 4, 6, 8]);
    }

    #[test]
    fn eighth_second_ticks_do_not_drift() {
        let mut clock = TickClock::new(125);
        for _ in 0..80_000 {
            clock.advance();
        }
        assert_eq!(clock.elapsed_ms(), 10_000_000);
        assert!(clock.on_second());
        assert_eq!(clock.elapsed_secs(), 10_000);
    }

    #[test]
    fn ms_since_counts_from_mark() {
        let mut clock = TickClock::new(250);
        for _ in 0..10 {
            clock.advance();
        }
        let mark = clock.ticks();
        for _ in 0..6 {
            clock.advance();
        }
        assert_eq!(clock.ms_since(mark), 1500);
        assert_eq!(clock.ms_since(100), 0);
    }

    #[test]
    fn zero_interval_never_fires() {
        let mut clock = TickClock::new(250);
        clock.advance();
        assert!(!clock.on_interval(0));
    }

    #[test]
    fn drive_edge_fires_once_per_insertion() {
        let mut watch = DriveWatch::new();
        let edges: Vec<bool> = [false, true, true, false, true]
            .into_iter()
            .map(|present| watch.observe(present))
            .collect();
        assert_eq!(edges, vec![false, true, false, false, true]);
        assert!(watch.present());
    }

    #[test]
    fn drive_present_at_startup_counts_as_insertion() {
        let mut watch = DriveWatch::new();
        assert!(watch.observe(true));
    }

    #[test]
    fn tick_pacer_waits_roughly_one_period() {
        let mut pacer = TickPacer::new(Duration::from_millis(20));
        let start = Instant::now();
        pacer.wait_for_tick();
        pacer.wait_for_tick();
        assert!(start.elapsed() >= Duration::from_millis(30));
    }
}
