use std::time::Duration;

/// Loop bounds and pacing for one harvest run. Read once at start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestSettings {
    /// Stop starting sessions once this many unique listings are collected.
    pub target_count: usize,
    /// Maximum number of sessions (token acquisition attempts) per run.
    pub token_budget: u32,
    /// Pause between two requests of the same session.
    pub request_delay: Duration,
    /// Pause after a session ends, before the next acquisition.
    pub session_delay: Duration,
    /// Pause after a failed acquisition.
    pub acquisition_cooldown: Duration,
}

impl Default for HarvestSettings {
    fn default() -> Self {
        Self {
            target_count: 500,
            token_budget: 20,
            request_delay: Duration::from_millis(500),
            session_delay: Duration::from_secs(2),
            acquisition_cooldown: Duration::from_secs(5),
        }
    }
}

impl HarvestSettings {
    /// Same bounds with every delay set to zero.
    pub fn without_delays(self) -> Self {
        Self {
            request_delay: Duration::ZERO,
            session_delay: Duration::ZERO,
            acquisition_cooldown: Duration::ZERO,
            ..self
        }
    }
}
