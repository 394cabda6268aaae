//! Retry policy for transient server errors.
//!
//! A failed statement is classified from its error text. Deadlocks are
//! retried after a pause, a severed connection is re-established once, and
//! strict SQL mode violations are retried after relaxing `SQL_MODE`. Going
//! over the iteration budget is unrecoverable.

use std::time::Duration;

/// Error texts that mark a deadlock.
const DEADLOCK_PATTERNS: &[&str] = &[
    "deadlock found when trying to get lock",
    "deadlock detected",
];

/// Error texts that mark a severed connection.
const GONE_AWAY_PATTERNS: &[&str] = &["server has gone away", "connection closed"];

/// Error texts produced by strict SQL mode.
const STRICT_MODE_PATTERNS: &[&str] = &[
    "doesn't have a default value",
    "incorrect datetime value",
    "incorrect date value",
    "data too long for column",
];

/// Statement issued to relax strict SQL mode.
pub const RELAX_SQL_MODE: &str = "SET SQL_MODE = ''";

/// Classification of a statement error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Deadlock,
    GoneAway,
    StrictMode,
    Other,
}

impl ErrorClass {
    pub fn classify(message: &str) -> Self {
        let message = message.to_lowercase();
        let matches = |patterns: &[&str]| patterns.iter().any(|p| message.contains(p));

        if matches(DEADLOCK_PATTERNS) {
            ErrorClass::Deadlock
        } else if matches(GONE_AWAY_PATTERNS) {
            ErrorClass::GoneAway
        } else if matches(STRICT_MODE_PATTERNS) {
            ErrorClass::StrictMode
        } else {
            ErrorClass::Other
        }
    }
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Sleep, then run the statement again as attempt `iteration`.
    Retry { delay: Duration, iteration: u32 },
    /// Sleep, reconnect and run the statement again without counting an iteration.
    Reconnect { delay: Duration },
    /// Relax SQL mode, then run the statement again as attempt `iteration`.
    RelaxSqlMode { iteration: u32 },
    /// The iteration budget is spent; abort the whole operation.
    Exhausted { class: ErrorClass },
    /// Not retryable; report the error.
    Fail,
}

/// Retry settings of a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retry_on_deadlock: bool,
    pub retry_on_gone_away: bool,
    pub relax_sql_mode: bool,
    /// Pause before a deadlock retry. Reconnects wait ten times as long.
    pub delay: Duration,
    pub max_iterations: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retry_on_deadlock: true,
            retry_on_gone_away: true,
            relax_sql_mode: true,
            delay: Duration::from_secs(1),
            max_iterations: 3,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries anything.
    pub fn disabled() -> Self {
        Self {
            retry_on_deadlock: false,
            retry_on_gone_away: false,
            relax_sql_mode: false,
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Decide how to handle `message`, the error of attempt number `iteration`
    /// (the first attempt is 0).
    pub fn decide(&self, message: &str, iteration: u32) -> RetryDecision {
        match ErrorClass::classify(message) {
            ErrorClass::Deadlock if self.retry_on_deadlock => {
                let next = iteration + 1;
                if next > self.max_iterations {
                    RetryDecision::Exhausted {
                        class: ErrorClass::Deadlock,
                    }
                } else {
                    RetryDecision::Retry {
                        delay: self.delay,
                        iteration: next,
                    }
                }
            }
            ErrorClass::GoneAway if self.retry_on_gone_away => RetryDecision::Reconnect {
                delay: self.delay * 10,
            },
            ErrorClass::StrictMode if self.relax_sql_mode => {
                let next = iteration + 1;
                if next > self.max_iterations {
                    RetryDecision::Exhausted {
                        class: ErrorClass::StrictMode,
                    }
                } else {
                    RetryDecision::RelaxSqlMode { iteration: next }
                }
            }
            _ => RetryDecision::Fail,
        }
    }
}
