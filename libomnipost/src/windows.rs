//! Publish window and minimum spacing checks
//!
//! Consulted by the queue service whenever a post is scheduled or
//! rescheduled. The scheduler and worker never look at windows: a post that
//! was accepted is published when due.

use chrono::{DateTime, Duration, FixedOffset, Offset, Timelike, Utc};
use tracing::debug;

use crate::error::{OmnipostError, Result, WindowViolation};
use crate::store::PostStore;
use crate::types::PlatformWindow;

/// Minutes since local midnight of `at` in the given offset
pub fn minute_of_day(at: DateTime<Utc>, offset: FixedOffset) -> u32 {
    let local = at.with_timezone(&offset);
    local.hour() * 60 + local.minute()
}

/// Check the time-of-day half of a window, ignoring spacing
///
/// Disabled windows accept everything. The range is inclusive at both ends,
/// so an 8–22 window accepts 22:00 but not 22:01.
pub fn check_window(
    window: &PlatformWindow,
    at: DateTime<Utc>,
    offset: FixedOffset,
) -> std::result::Result<(), WindowViolation> {
    if !window.enabled {
        return Ok(());
    }
    let minutes = minute_of_day(at, offset);
    let start = u32::from(window.start_hour) * 60;
    let end = u32::from(window.end_hour) * 60;
    if minutes < start || minutes > end {
        return Err(WindowViolation::OutsideWindow {
            platform: window.platform_id.clone(),
        });
    }
    Ok(())
}

/// Validates candidate schedule times against stored windows
#[derive(Debug, Clone, Copy)]
pub struct WindowValidator {
    offset: FixedOffset,
}

impl Default for WindowValidator {
    fn default() -> Self {
        Self {
            offset: Utc.fix(),
        }
    }
}

impl WindowValidator {
    /// Validator reading minute-of-day at `utc_offset_minutes` east of UTC
    pub fn new(utc_offset_minutes: i32) -> Result<Self> {
        let offset = FixedOffset::east_opt(utc_offset_minutes * 60).ok_or_else(|| {
            OmnipostError::InvalidInput(format!(
                "UTC offset out of range: {} minutes",
                utc_offset_minutes
            ))
        })?;
        Ok(Self { offset })
    }

    /// Check `candidate` for each of `platforms`
    ///
    /// Platforms without a window, or with a disabled one, are unconstrained.
    /// `exclude_id` names the post being edited so it does not collide with
    /// itself in the spacing check.
    pub async fn validate(
        &self,
        store: &dyn PostStore,
        platforms: &[String],
        candidate: DateTime<Utc>,
        exclude_id: Option<&str>,
    ) -> Result<()> {
        let windows = store.windows().await?;

        for platform in platforms {
            let platform = platform.to_lowercase();
            let Some(window) = windows
                .iter()
                .find(|w| w.enabled && w.platform_id.eq_ignore_ascii_case(&platform))
            else {
                continue;
            };

            check_window(window, candidate, self.offset)?;

            if window.min_gap_minutes > 0 {
                let gap = Duration::minutes(i64::from(window.min_gap_minutes));
                let conflict = store
                    .has_gap_conflict(&platform, candidate - gap, candidate + gap, exclude_id)
                    .await?;
                if conflict {
                    debug!(platform = %platform, %candidate, "rejected by minimum spacing");
                    return Err(WindowViolation::MinGap {
                        platform,
                        min_gap_minutes: window.min_gap_minutes,
                    }
                    .into());
                }
            }
        }

        Ok(())
    }
}
