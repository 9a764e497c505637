//! Launch-time execution windows.

use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::WindowConfig;
use crate::constants::events;
use crate::error::TradingError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ExecutionWindow {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl ExecutionWindow {
    /// `start = launch + pre_launch_offset`, `end = start + window_duration`.
    pub fn for_launch(launch_time: DateTime<Utc>, options: &WindowConfig) -> Self {
        let start_time = launch_time + Duration::milliseconds(options.pre_launch_offset_ms);
        let end_time = start_time + Duration::milliseconds(options.window_duration_ms as i64);
        Self {
            start_time,
            end_time,
        }
    }

    pub fn is_open(&self) -> bool {
        let now = Utc::now();
        now >= self.start_time && is_within_execution_window(self.end_time)
    }
}

/// Block until the window for `launch_time` opens.
///
/// Returns immediately when the start is already in the past. Wakes at most
/// every `poll_interval_ms` so a cancelled token is noticed promptly even when
/// the launch is hours away.
pub async fn wait_for_execution_window(
    launch_time: DateTime<Utc>,
    options: &WindowConfig,
    cancel: &CancellationToken,
) -> Result<ExecutionWindow, TradingError> {
    let window = ExecutionWindow::for_launch(launch_time, options);
    let poll = StdDuration::from_millis(options.poll_interval_ms.max(1));

    debug!(
        "[WINDOW] Waiting for window {} .. {}",
        window.start_time.to_rfc3339(),
        window.end_time.to_rfc3339()
    );

    loop {
        if cancel.is_cancelled() {
            return Err(TradingError::Cancelled);
        }

        let now = Utc::now();
        if now >= window.start_time {
            info!(
                event = events::WINDOW_OPENED,
                "⏰ [WINDOW] Execution window open (start {}, closes {})",
                window.start_time.to_rfc3339(),
                window.end_time.to_rfc3339()
            );
            return Ok(window);
        }

        let remaining = (window.start_time - now).to_std().unwrap_or(StdDuration::ZERO);
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("[WINDOW] Wait cancelled before window opened");
                return Err(TradingError::Cancelled);
            }
            _ = tokio::time::sleep(remaining.min(poll)) => {}
        }
    }
}

/// True while the current time is strictly before `end_time`.
pub fn is_within_execution_window(end_time: DateTime<Utc>) -> bool {
    Utc::now() < end_time
}
