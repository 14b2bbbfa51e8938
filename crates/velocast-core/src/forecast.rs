//! Rolling-window capacity forecasts over velocity history.
//!
//! Every window reports `None` rather than zero when there is nothing to
//! average, and the availability-adjusted projection is `None` whenever the
//! window's historical availability is unknown or zero.

use serde::{Deserialize, Serialize};

use crate::domain::VelocityRecord;
use crate::ValidationError;

/// Window sizes, in sprints, reported by every forecast.
pub const FORECAST_WINDOWS: [usize; 4] = [1, 3, 5, 10];

/// Forecast for one rolling window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowForecast {
    pub window: usize,
    /// Records actually averaged: `min(window, history length)`.
    pub sprints_used: usize,
    pub mean_points: Option<f64>,
    pub mean_seconds: Option<f64>,
    pub mean_available_days: Option<f64>,
    pub projected_points: Option<f64>,
    pub projected_seconds: Option<f64>,
}

impl WindowForecast {
    pub fn has_data(&self) -> bool {
        self.sprints_used > 0
    }
}

/// Read-only forecast snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub available_days: f64,
    pub history_len: usize,
    pub windows: Vec<WindowForecast>,
}

impl ForecastResult {
    pub fn window(&self, window: usize) -> Option<&WindowForecast> {
        self.windows.iter().find(|forecast| forecast.window == window)
    }
}

/// Project next-sprint capacity from chronological history (most recent last).
///
/// # Errors
///
/// Returns [`ValidationError::InvalidAvailability`] when `available_days` is
/// negative or not finite. Missing history is never an error.
pub fn forecast(
    history: &[VelocityRecord],
    available_days: f64,
) -> Result<ForecastResult, ValidationError> {
    if !available_days.is_finite() || available_days < 0.0 {
        return Err(ValidationError::InvalidAvailability {
            value: available_days.to_string(),
        });
    }

    let windows = FORECAST_WINDOWS
        .iter()
        .map(|&window| window_forecast(history, window, available_days))
        .collect();

    Ok(ForecastResult {
        available_days,
        history_len: history.len(),
        windows,
    })
}

fn window_forecast(history: &[VelocityRecord], window: usize, available_days: f64) -> WindowForecast {
    let used = window.min(history.len());
    let recent = &history[history.len() - used..];

    let mean_points = mean(recent.iter().map(|record| record.achieved_points));
    let mean_seconds = mean(recent.iter().map(|record| record.achieved_seconds as f64));
    let mean_available_days = if recent.iter().all(|record| record.available_days.is_some()) {
        mean(recent.iter().filter_map(|record| record.available_days))
    } else {
        None
    };

    let scale = mean_available_days
        .filter(|days| *days > 0.0)
        .map(|days| available_days / days);

    WindowForecast {
        window,
        sprints_used: used,
        mean_points,
        mean_seconds,
        mean_available_days,
        projected_points: scale.zip(mean_points).map(|(scale, points)| scale * points),
        projected_seconds: scale.zip(mean_seconds).map(|(scale, seconds)| scale * seconds),
    }
}

fn mean<I>(values: I) -> Option<f64>
where
    I: Iterator<Item = f64>,
{
    let (sum, count) = values.fold((0.0, 0_usize), |(sum, count), value| (sum + value, count + 1));
    (count > 0).then(|| sum / count as f64)
}
