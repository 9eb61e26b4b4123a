use std::time::{Duration, Instant};

pub const DEFAULT_COUNTDOWN_TICKS: u32 = 3;
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Polled countdown: the UI asks it where it stands on every repaint instead of
/// owning a timer thread.
#[derive(Clone, Debug)]
pub struct Countdown {
    remaining: u32,
    next_tick_at: Instant,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CountdownStep {
    Pending,
    Tick(u32),
    Expired,
}

impl Countdown {
    pub fn start(ticks: u32, now: Instant) -> Self {
        Self {
            remaining: ticks,
            next_tick_at: now + TICK_INTERVAL,
        }
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn advance(&mut self, now: Instant) -> CountdownStep {
        if self.remaining == 0 {
            return CountdownStep::Expired;
        }

        let before = self.remaining;
        while self.remaining > 0 && now >= self.next_tick_at {
            self.remaining -= 1;
            self.next_tick_at += TICK_INTERVAL;
        }

        match self.remaining {
            0 => CountdownStep::Expired,
            n if n != before => CountdownStep::Tick(n),
            _ => CountdownStep::Pending,
        }
    }
}
