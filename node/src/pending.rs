//! Retry bookkeeping for one in-flight bootstrap operation.

use std::time::Duration;

/// How many attempts an operation may make.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttemptLimit {
    Bounded(u32),
    Unbounded,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingOperation {
    attempts: u32,
    limit: AttemptLimit,
    retry_delay: Duration,
    retry_armed: bool,
}

impl PendingOperation {
    pub fn new(limit: AttemptLimit, retry_delay: Duration) -> Self {
        Self {
            attempts: 0,
            limit,
            retry_delay,
            retry_armed: false,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn limit(&self) -> AttemptLimit {
        self.limit
    }

    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    /// Whether another attempt is allowed.
    pub fn can_attempt(&self) -> bool {
        match self.limit {
            AttemptLimit::Bounded(max) => self.attempts < max,
            AttemptLimit::Unbounded => true,
        }
    }

    /// Record an attempt. Returns `false`, recording nothing, when the
    /// budget is spent.
    pub fn record_attempt(&mut self) -> bool {
        if !self.can_attempt() {
            return false;
        }
        self.attempts = self.attempts.saturating_add(1);
        true
    }

    /// Note that a delayed retry has been scheduled for an attempt already
    /// recorded.
    pub fn arm_retry(&mut self) {
        self.retry_armed = true;
    }

    pub fn retry_armed(&self) -> bool {
        self.retry_armed
    }

    /// Consume the scheduled retry. Returns `false` when none was armed, so a
    /// stray or duplicate retry timer sends nothing.
    pub fn take_retry(&mut self) -> bool {
        std::mem::replace(&mut self.retry_armed, false)
    }

    /// Attempts left, `None` when unbounded.
    pub fn remaining(&self) -> Option<u32> {
        match self.limit {
            AttemptLimit::Bounded(max) => Some(max.saturating_sub(self.attempts)),
            AttemptLimit::Unbounded => None,
        }
    }
}
