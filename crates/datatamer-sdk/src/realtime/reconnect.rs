use std::time::Duration;

use super::options::RealtimeOptions;

/// Growth factor used once exponential backoff is enabled.
pub(crate) const EXPONENTIAL_FACTOR: f64 = 1.5;

/// Reconnect delay schedule.
///
/// Each call to [`next_delay`](Backoff::next_delay) yields the current delay
/// and then grows it by `factor`, capped at `max`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Backoff {
    initial: Duration,
    current: Duration,
    max: Duration,
    factor: f64,
}

impl Backoff {
    pub(crate) fn fixed(interval: Duration) -> Self {
        Self {
            initial: interval,
            current: interval,
            max: interval,
            factor: 1.0,
        }
    }

    pub(crate) fn exponential(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            current: initial,
            max: max.max(initial),
            factor: EXPONENTIAL_FACTOR,
        }
    }

    pub(crate) fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        let grown = (self.current.as_nanos() as f64 * self.factor).round() as u64;
        self.current = Duration::from_nanos(grown).min(self.max);
        delay
    }

    pub(crate) fn reset(&mut self) {
        self.current = self.initial;
    }

    #[cfg(test)]
    pub(crate) fn current(&self) -> Duration {
        self.current
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ReconnectPhase {
    Idle,
    Scheduled,
    Exhausted,
}

/// What to do after the stream was lost.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ReconnectDecision {
    /// Schedule attempt number `attempt` after `delay`.
    Retry { attempt: u32, delay: Duration },
    /// Attempts just ran out; report the failure once.
    Exhausted,
    /// Nothing to do (disabled, already scheduled or already exhausted).
    Stop,
}

/// Reconnect bookkeeping for one realtime client.
#[derive(Clone, Debug)]
pub(crate) struct ReconnectState {
    should_reconnect: bool,
    attempts: u32,
    max_attempts: u32,
    backoff: Backoff,
    phase: ReconnectPhase,
}

impl ReconnectState {
    pub(crate) fn new(options: &RealtimeOptions) -> Self {
        Self {
            should_reconnect: options.reconnect,
            attempts: 0,
            max_attempts: options.max_reconnect_attempts,
            backoff: Backoff::fixed(options.reconnect_interval),
            phase: ReconnectPhase::Idle,
        }
    }

    pub(crate) fn on_connection_lost(&mut self) -> ReconnectDecision {
        if !self.should_reconnect || self.phase != ReconnectPhase::Idle {
            return ReconnectDecision::Stop;
        }
        if self.attempts >= self.max_attempts {
            self.phase = ReconnectPhase::Exhausted;
            return ReconnectDecision::Exhausted;
        }

        self.attempts += 1;
        self.phase = ReconnectPhase::Scheduled;
        ReconnectDecision::Retry {
            attempt: self.attempts,
            delay: self.backoff.next_delay(),
        }
    }

    /// Returns `true` if the fired timer should open a new connection.
    pub(crate) fn on_timer_fired(&mut self) -> bool {
        if self.should_reconnect && self.phase == ReconnectPhase::Scheduled {
            self.phase = ReconnectPhase::Idle;
            true
        } else {
            false
        }
    }

    pub(crate) fn on_open(&mut self) {
        self.attempts = 0;
        self.backoff.reset();
        self.phase = ReconnectPhase::Idle;
    }

    /// Stop reconnecting and cancel any scheduled attempt.
    pub(crate) fn disable(&mut self) {
        self.should_reconnect = false;
        if self.phase == ReconnectPhase::Scheduled {
            self.phase = ReconnectPhase::Idle;
        }
    }

    pub(crate) fn enable_exponential(
        &mut self,
        initial: Duration,
        max: Duration,
        max_attempts: u32,
    ) {
        self.should_reconnect = true;
        self.max_attempts = max_attempts;
        self.backoff = Backoff::exponential(initial, max);
    }

    pub(crate) fn attempts(&self) -> u32 {
        self.attempts
    }

    #[cfg(test)]
    pub(crate) fn phase(&self) -> ReconnectPhase {
        self.phase
    }
}
