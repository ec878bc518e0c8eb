// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::time::Duration;

use serde::Serialize;

/// Counters accumulated by the pacer since start or the last [`take`](crate::core::pacer::Pacer::take_stats).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PacerStats {
    /// Frames handed to `submit_frame`, including ones dropped on arrival.
    pub submitted_frames: u64,
    /// Frames discarded by either queue.
    pub dropped_frames: u64,
    pub rendered_frames: u64,
    /// Time from capture to the start of rendering, summed.
    #[serde(serialize_with = "serialize_millis")]
    pub total_pacer_time: Duration,
    /// Time spent inside the renderer, summed.
    #[serde(serialize_with = "serialize_millis")]
    pub total_render_time: Duration,
    pub relaxation_activations: u64,
}

impl PacerStats {
    pub fn average_pacer_time(&self) -> Option<Duration> {
        average(self.total_pacer_time, self.rendered_frames)
    }

    pub fn average_render_time(&self) -> Option<Duration> {
        average(self.total_render_time, self.rendered_frames)
    }

    /// Fraction of submitted frames that were dropped.
    pub fn drop_ratio(&self) -> f64 {
        if self.submitted_frames == 0 {
            0.0
        } else {
            self.dropped_frames as f64 / self.submitted_frames as f64
        }
    }
}

fn average(total: Duration, count: u64) -> Option<Duration> {
    let count = u32::try_from(count).ok().filter(|&c| c > 0)?;
    Some(total / count)
}

fn serialize_millis<S: serde::Serializer>(
    value: &Duration,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_f64(value.as_secs_f64() * 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_averages() {
        let stats = PacerStats {
            rendered_frames: 4,
            total_render_time: Duration::from_millis(20),
            ..Default::default()
        };
        assert_eq!(stats.average_render_time(), Some(Duration::from_millis(5)));
        assert_eq!(stats.average_pacer_time(), Some(Duration::ZERO));
        assert_eq!(PacerStats::default().average_render_time(), None);
    }

    #[test]
    fn test_drop_ratio() {
        let stats = PacerStats {
            submitted_frames: 10,
            dropped_frames: 3,
            ..Default::default()
        };
        assert!((stats.drop_ratio() - 0.3).abs() < f64::EPSILON);
    }

    #[test]
    fn test_serializes_durations_as_millis() {
        let stats = PacerStats {
            total_pacer_time: Duration::from_micros(1500),
            ..Default::default()
        };
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["total_pacer_time"], serde_json::json!(1.5));
    }
}
