use std::time::{Duration, Instant};

/// Limits how many alerts fire back to back.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertPolicy {
    /// Alerts allowed before suppression kicks in.
    pub max_consecutive: u32,
    /// Quiet gap that clears the consecutive count. The gap must strictly
    /// exceed this to reset; a gap of exactly the cooldown does not.
    pub cooldown: Duration,
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self {
            max_consecutive: 2,
            cooldown: Duration::from_secs(10),
        }
    }
}

/// Outcome of one detection reaching the limiter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AlertDecision {
    /// Play the alert; `count` of `max` in the current burst.
    Fire { count: u32, max: u32 },
    /// Burst budget exhausted. Firing resumes once detections pause for
    /// longer than `reset_after`.
    Suppress { reset_after: Duration },
}

/// Tracks consecutive alerts. Every detection, fired or suppressed,
/// refreshes the cooldown window, so a sustained stream of detections never
/// resets the count.
#[derive(Debug)]
pub struct AlertRateLimiter {
    policy: AlertPolicy,
    consecutive: u32,
    last_detection: Option<Instant>,
}

impl AlertRateLimiter {
    pub fn new(policy: AlertPolicy) -> Self {
        Self {
            policy,
            consecutive: 0,
            last_detection: None,
        }
    }

    pub fn policy(&self) -> AlertPolicy {
        self.policy
    }

    /// Records a detection at `now` and decides whether its alert fires.
    pub fn evaluate(&mut self, now: Instant) -> AlertDecision {
        if let Some(last) = self.last_detection {
            if now.saturating_duration_since(last) > self.policy.cooldown {
                self.consecutive = 0;
            }
        }

        self.consecutive += 1;
        self.last_detection = Some(now);

        if self.consecutive <= self.policy.max_consecutive {
            AlertDecision::Fire {
                count: self.consecutive,
                max: self.policy.max_consecutive,
            }
        } else {
            AlertDecision::Suppress {
                reset_after: self.policy.cooldown,
            }
        }
    }

    /// Forgets all history, as if no detection had ever been seen.
    pub fn reset(&mut self) {
        self.consecutive = 0;
        self.last_detection = None;
    }
}
