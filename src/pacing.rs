//! Randomized pacing between browser actions
//!
//! Every navigation, scroll and click is followed by a pause. The pause gives
//! the page time to render and keeps request rates low. Every pause is also a
//! cancellation point: a cancelled token turns the next (or current) pause
//! into [`HarvestError::Cancelled`].

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{ConfigError, HarvestError};

/// The situations that are followed by a pause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pause {
    AfterNavigation,
    AfterScroll,
    BetweenDetails,
    AfterDetailOpen,
    BetweenAreas,
    AfterClick,
}

impl Pause {
    pub const ALL: [Pause; 6] = [
        Pause::AfterNavigation,
        Pause::AfterScroll,
        Pause::BetweenDetails,
        Pause::AfterDetailOpen,
        Pause::BetweenAreas,
        Pause::AfterClick,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::AfterNavigation => "after_navigation",
            Self::AfterScroll => "after_scroll",
            Self::BetweenDetails => "between_details",
            Self::AfterDetailOpen => "after_detail_open",
            Self::BetweenAreas => "between_areas",
            Self::AfterClick => "after_click",
        }
    }
}

/// Inclusive delay range in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayRange {
    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    pub const fn zero() -> Self {
        Self::new(0, 0)
    }
}

/// Delay range for each [`Pause`] kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    pub after_navigation: DelayRange,
    pub after_scroll: DelayRange,
    pub between_details: DelayRange,
    pub after_detail_open: DelayRange,
    pub between_areas: DelayRange,
    pub after_click: DelayRange,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            after_navigation: DelayRange::new(4_000, 6_000),
            after_scroll: DelayRange::new(1_500, 2_500),
            between_details: DelayRange::new(2_000, 4_000),
            after_detail_open: DelayRange::new(3_000, 5_000),
            between_areas: DelayRange::new(3_000, 5_000),
            after_click: DelayRange::new(1_000, 2_000),
        }
    }
}

impl PacingConfig {
    /// No delays at all
    pub fn none() -> Self {
        Self {
            after_navigation: DelayRange::zero(),
            after_scroll: DelayRange::zero(),
            between_details: DelayRange::zero(),
            after_detail_open: DelayRange::zero(),
            between_areas: DelayRange::zero(),
            after_click: DelayRange::zero(),
        }
    }

    pub fn range(&self, pause: Pause) -> DelayRange {
        match pause {
            Pause::AfterNavigation => self.after_navigation,
            Pause::AfterScroll => self.after_scroll,
            Pause::BetweenDetails => self.between_details,
            Pause::AfterDetailOpen => self.after_detail_open,
            Pause::BetweenAreas => self.between_areas,
            Pause::AfterClick => self.after_click,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for pause in Pause::ALL {
            let range = self.range(pause);
            if range.min_ms > range.max_ms {
                return Err(ConfigError::InvertedPacing {
                    kind: pause.name(),
                    min_ms: range.min_ms,
                    max_ms: range.max_ms,
                });
            }
        }
        Ok(())
    }
}

/// Trait for implementing pacing strategies
#[async_trait::async_trait]
pub trait Pacer: Send + Sync {
    /// Wait out a pause, or fail if the run has been cancelled
    async fn pause(&self, pause: Pause) -> Result<(), HarvestError>;
}

/// Uniformly random delay within the configured range
pub struct JitterPacer {
    config: PacingConfig,
    cancel: CancellationToken,
}

impl JitterPacer {
    pub fn new(config: PacingConfig, cancel: CancellationToken) -> Self {
        Self { config, cancel }
    }

    /// Draw the delay for one pause
    pub fn draw(&self, pause: Pause) -> Duration {
        let range = self.config.range(pause);
        if range.max_ms == 0 {
            return Duration::ZERO;
        }
        let millis = rand::rng().random_range(range.min_ms..=range.max_ms);
        Duration::from_millis(millis)
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

#[async_trait::async_trait]
impl Pacer for JitterPacer {
    async fn pause(&self, pause: Pause) -> Result<(), HarvestError> {
        if self.cancel.is_cancelled() {
            return Err(HarvestError::Cancelled);
        }

        let delay = self.draw(pause);
        if delay.is_zero() {
            return Ok(());
        }
        debug!(pause = pause.name(), delay_ms = delay.as_millis() as u64, "Pausing");

        tokio::select! {
            _ = self.cancel.cancelled() => Err(HarvestError::Cancelled),
            _ = sleep(delay) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draw_stays_in_range() {
        let pacer = JitterPacer::new(PacingConfig::default(), CancellationToken::new());
        for _ in 0..100 {
            let delay = pacer.draw(Pause::AfterScroll);
            assert!(delay >= Duration::from_millis(1_500));
            assert!(delay <= Duration::from_millis(2_500));
        }
    }

    #[test]
    fn test_inverted_range_is_rejected() {
        let config = PacingConfig {
            after_click: DelayRange::new(900, 100),
            ..PacingConfig::none()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvertedPacing { kind: "after_click", .. })
        ));
    }

    #[tokio::test]
    async fn test_cancelled_pause_fails() {
        let token = CancellationToken::new();
        let pacer = JitterPacer::new(PacingConfig::none(), token.clone());
        assert!(pacer.pause(Pause::AfterClick).await.is_ok());
        token.cancel();
        assert!(matches!(
            pacer.pause(Pause::AfterClick).await,
            Err(HarvestError::Cancelled)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_long_pause() {
        let token = CancellationToken::new();
        let pacer = JitterPacer::new(PacingConfig::default(), token.clone());
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            canceller.cancel();
        });
        assert!(matches!(
            pacer.pause(Pause::AfterNavigation).await,
            Err(HarvestError::Cancelled)
        ));
    }
}
