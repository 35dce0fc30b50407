//! Adaptive circuit breaker state machine.
//!
//! One record per breaker id. The failure threshold adapts to the observed
//! failure rate inside a sliding window: sustained failure tightens it toward
//! `min_threshold`, healthy traffic relaxes it toward `max_threshold`.
//! Recovery from `open` is strictly success-driven; there is no timed
//! re-test.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Finite states of a breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CircuitState {
    /// Normal operation
    Closed,
    /// Failing; primary work should stand down
    Open,
    /// Probing recovery; one failure reopens
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half-open",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "closed" => Some(Self::Closed),
            "open" => Some(Self::Open),
            "half-open" | "half_open" => Some(Self::HalfOpen),
            _ => None,
        }
    }
}

/// Classified result of one observed tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerOutcome {
    Failure,
    Success,
}

/// Per-breaker tuning. Every field is overridable per breaker id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerTuning {
    pub initial_threshold: i64,
    pub min_threshold: i64,
    pub max_threshold: i64,
    pub adaptation_rate: f64,
    pub window_seconds: i64,
}

impl Default for BreakerTuning {
    fn default() -> Self {
        Self {
            initial_threshold: 3,
            min_threshold: 1,
            max_threshold: 10,
            adaptation_rate: 0.2,
            window_seconds: 60,
        }
    }
}

impl BreakerTuning {
    /// Clamp a threshold into the configured band.
    pub fn clamp(&self, threshold: i64) -> i64 {
        threshold.clamp(self.min_threshold, self.max_threshold)
    }

    /// Reject inverted or degenerate bands.
    pub fn validate(&self) -> Result<(), String> {
        if self.min_threshold < 1 {
            return Err(format!("min_threshold {} must be >= 1", self.min_threshold));
        }
        if self.min_threshold > self.max_threshold {
            return Err(format!(
                "min_threshold {} exceeds max_threshold {}",
                self.min_threshold, self.max_threshold
            ));
        }
        if !(0.0..=1.0).contains(&self.adaptation_rate) {
            return Err(format!(
                "adaptation_rate {} outside [0, 1]",
                self.adaptation_rate
            ));
        }
        if self.window_seconds <= 0 {
            return Err(format!("window_seconds {} must be positive", self.window_seconds));
        }
        Ok(())
    }
}

/// Durable breaker record, one row per `cb_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitRecord {
    pub cb_id: String,
    pub state: CircuitState,
    pub failure_count: i64,
    pub success_count: i64,
    pub current_threshold: i64,
    pub window_start: DateTime<Utc>,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CircuitRecord {
    /// A closed breaker starting a fresh window now.
    pub fn fresh(cb_id: impl Into<String>, tuning: &BreakerTuning) -> Self {
        let now = Utc::now();
        Self {
            cb_id: cb_id.into(),
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            current_threshold: tuning.clamp(tuning.initial_threshold),
            window_start: now,
            last_failure_at: None,
            last_success_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Failure share of the current window; 0 when the window is empty.
    pub fn failure_rate(&self) -> f64 {
        let total = self.failure_count + self.success_count;
        if total == 0 {
            0.0
        } else {
            self.failure_count as f64 / total as f64
        }
    }

    /// Apply one classified outcome. Returns the state the breaker left.
    ///
    /// An expired window is reset before the outcome is counted. Threshold
    /// adaptation needs mixed evidence: a window that has seen only failures
    /// keeps the threshold where it is, so a cold breaker still trips at
    /// exactly `initial_threshold` consecutive failures.
    pub fn apply(
        &mut self,
        outcome: BreakerOutcome,
        tuning: &BreakerTuning,
        now: DateTime<Utc>,
    ) -> CircuitState {
        let previous = self.state;

        if now - self.window_start > Duration::seconds(tuning.window_seconds) {
            self.failure_count = 0;
            self.success_count = 0;
            self.window_start = now;
        }

        match outcome {
            BreakerOutcome::Failure => {
                self.failure_count += 1;
                self.last_failure_at = Some(now);

                if self.success_count > 0 {
                    self.adapt_threshold(tuning);
                }

                self.state = match self.state {
                    CircuitState::HalfOpen => CircuitState::Open,
                    CircuitState::Closed if self.failure_count >= self.current_threshold => {
                        CircuitState::Open
                    }
                    other => other,
                };
            }
            BreakerOutcome::Success => {
                self.success_count += 1;
                self.last_success_at = Some(now);

                if self.failure_rate() <= 0.5 {
                    self.adapt_threshold(tuning);
                }

                self.state = match self.state {
                    CircuitState::Open => CircuitState::HalfOpen,
                    CircuitState::HalfOpen => {
                        self.failure_count = 0;
                        CircuitState::Closed
                    }
                    CircuitState::Closed => CircuitState::Closed,
                };
            }
        }

        self.updated_at = now;
        previous
    }

    /// Recompute the threshold from the current failure rate.
    ///
    /// Decreases round down so sustained failure always makes progress toward
    /// `min_threshold`; increases round to nearest. Both are clamped.
    fn adapt_threshold(&mut self, tuning: &BreakerTuning) {
        let current = self.current_threshold as f64;
        let rate = self.failure_rate();

        let raw = if rate > 0.5 {
            current - tuning.adaptation_rate * current
        } else {
            current + tuning.adaptation_rate * (1.0 - rate) * current
        };

        let stepped = if raw < current { raw.floor() } else { raw.round() };
        self.current_threshold = tuning.clamp(stepped as i64);
    }

    /// Human-readable status line for the `Stop` summary.
    pub fn summary(&self) -> String {
        format!(
            "Circuit '{}': state={} failures={} successes={} failure_rate={:.2} adaptive_threshold={} last_failure={} last_success={}",
            self.cb_id,
            self.state.as_str(),
            self.failure_count,
            self.success_count,
            self.failure_rate(),
            self.current_threshold,
            self.last_failure_at
                .map_or_else(|| "never".to_string(), |t| t.to_rfc3339()),
            self.last_success_at
                .map_or_else(|| "never".to_string(), |t| t.to_rfc3339()),
        )
    }
}
