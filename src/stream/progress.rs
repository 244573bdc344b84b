//! Console progress throttling

/// Decides on which frames the progress indicator ticks.
///
/// Purely observational: it counts frames handed to it and never influences
/// whether a frame is sent.
#[derive(Debug, Clone)]
pub struct ProgressTicker {
    every: u64,
    count: u64,
    ticks: u64,
}

impl ProgressTicker {
    /// Tick on frames `every`, `2 * every`, ...
    pub fn new(every: u64) -> Self {
        Self {
            every: every.max(1),
            count: 0,
            ticks: 0,
        }
    }

    /// Tick on the first frame, then every `every` frames after it.
    pub fn starting_with_tick(every: u64) -> Self {
        let every = every.max(1);
        Self {
            every,
            count: every - 1,
            ticks: 0,
        }
    }

    /// Count one frame; returns true when the indicator should tick.
    pub fn advance(&mut self) -> bool {
        self.count = self.count.wrapping_add(1);
        let tick = self.count % self.every == 0;
        if tick {
            self.ticks += 1;
        }
        tick
    }

    pub fn every(&self) -> u64 {
        self.every
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}
