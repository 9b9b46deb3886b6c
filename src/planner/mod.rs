//! Segment planning for fixed-interval splits

use tracing::debug;

use crate::domain::model::Segment;

/// Trailing remainders shorter than this are merged into the previous segment
pub const MIN_TAIL_SECONDS: f64 = 1.0;

/// Partitions a timeline into fixed-interval segments
pub struct SegmentPlanner;

impl SegmentPlanner {
    /// Plan segments covering `[0, total_duration_seconds)`.
    ///
    /// Every segment is `interval_seconds` long except the last, which holds the
    /// remainder. A remainder under [`MIN_TAIL_SECONDS`] extends the previous
    /// segment instead of producing a near-empty clip. Non-positive inputs yield
    /// an empty plan.
    pub fn plan(total_duration_seconds: f64, interval_seconds: u32) -> Vec<Segment> {
        let mut segments: Vec<Segment> = Vec::new();
        if !(total_duration_seconds > 0.0) || interval_seconds == 0 {
            return segments;
        }

        let interval = f64::from(interval_seconds);
        let mut step: u64 = 0;
        loop {
            let current_time = step as f64 * interval;
            if current_time >= total_duration_seconds {
                break;
            }
            let remaining = total_duration_seconds - current_time;

            if remaining >= interval {
                segments.push(Segment::new(segments.len(), current_time, interval));
            } else if remaining < MIN_TAIL_SECONDS && !segments.is_empty() {
                if let Some(previous) = segments.last_mut() {
                    debug!(
                        "Merging {:.3}s tail into segment {}",
                        remaining, previous.index
                    );
                    previous.duration_seconds = total_duration_seconds - previous.start_seconds;
                }
            } else {
                segments.push(Segment::new(segments.len(), current_time, remaining));
            }
            step += 1;
        }

        debug!(
            "Planned {} segments for {:.3}s at {}s interval",
            segments.len(),
            total_duration_seconds,
            interval_seconds
        );
        segments
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    fn assert_partition(segments: &[Segment], total: f64) {
        let sum: f64 = segments.iter().map(|s| s.duration_seconds).sum();
        assert!((sum - total).abs() < EPSILON, "sum {} != total {}", sum, total);
        assert!(segments[0].start_seconds.abs() < EPSILON);
        for (i, pair) in segments.windows(2).enumerate() {
            assert_eq!(pair[0].index, i);
            assert!(pair[1].start_seconds > pair[0].start_seconds);
            assert!((pair[0].end_seconds() - pair[1].start_seconds).abs() < EPSILON);
        }
    }

    #[test]
    fn test_short_tail_merges_into_previous() {
        let segments = SegmentPlanner::plan(10.4, 5);
        assert_eq!(segments.len(), 2);
        assert!((segments[0].duration_seconds - 5.0).abs() < EPSILON);
        assert!((segments[1].start_seconds - 5.0).abs() < EPSILON);
        assert!((segments[1].duration_seconds - 5.4).abs() < EPSILON);
        assert_partition(&segments, 10.4);
    }

    #[test]
    fn test_long_tail_gets_its_own_segment() {
        let segments = SegmentPlanner::plan(11.5, 5);
        assert_eq!(segments.len(), 3);
        assert!((segments[2].start_seconds - 10.0).abs() < EPSILON);
        assert!((segments[2].duration_seconds - 1.5).abs() < EPSILON);
        assert_partition(&segments, 11.5);
    }

    #[test]
    fn test_video_shorter_than_interval() {
        let segments = SegmentPlanner::plan(2.0, 5);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].start_seconds, 0.0);
        assert_eq!(segments[0].duration_seconds, 2.0);
    }

    #[test]
    fn test_sub_second_video_is_kept() {
        let segments = SegmentPlanner::plan(0.4, 5);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].duration_seconds, 0.4);
    }

    #[test]
    fn test_exact_multiple_has_no_tail() {
        let segments = SegmentPlanner::plan(30.0, 10);
        assert_eq!(segments.len(), 3);
        assert!(segments.iter().all(|s| s.duration_seconds == 10.0));
    }

    #[test]
    fn test_degenerate_inputs_produce_empty_plan() {
        assert!(SegmentPlanner::plan(0.0, 5).is_empty());
        assert!(SegmentPlanner::plan(-3.0, 5).is_empty());
        assert!(SegmentPlanner::plan(f64::NAN, 5).is_empty());
        assert!(SegmentPlanner::plan(10.0, 0).is_empty());
    }

    #[test]
    fn test_coverage_across_durations_and_intervals() {
        for interval in [1u32, 2, 3, 5, 7, 10, 60] {
            for tenths in 1..=1500u32 {
                let total = f64::from(tenths) / 10.0;
                let segments = SegmentPlanner::plan(total, interval);
                assert!(!segments.is_empty());
                assert_partition(&segments, total);
                for segment in &segments[..segments.len() - 1] {
                    assert!((segment.duration_seconds - f64::from(interval)).abs() < EPSILON);
                }
            }
        }
    }
}
