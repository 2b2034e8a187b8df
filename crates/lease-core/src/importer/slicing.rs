//! Decomposition of an allocation window into bounded jobs.

use crate::{
    config::SliceLimits,
    models::{AllocationWindow, JobSlice},
};

/// Whether a window is long enough to become a plan at all.
pub fn is_plannable(window: &AllocationWindow, limits: SliceLimits) -> bool {
    window.total_duration() >= limits.minimum
}

/// Cuts `window` into consecutive slices of at most `limits.maximum`.
///
/// Slices shorter than `limits.minimum` are not returned; in practice only
/// the trailing remainder can be that short. Each slice carries the share of
/// the window's invoice amount proportional to its length, so a dropped
/// remainder also drops its share.
pub fn slice_window(window: &AllocationWindow, limits: SliceLimits) -> Vec<JobSlice> {
    let total = window.total_duration();
    let mut slices = Vec::new();
    if !total.is_positive() || !limits.maximum.is_positive() {
        return slices;
    }

    let total_secs = total.as_secs_f64();
    let mut remaining = total;
    let mut cursor = window.start_at;
    let mut order_index = 0;

    while remaining.is_positive() {
        let duration = remaining.min(limits.maximum);

        if duration >= limits.minimum {
            slices.push(JobSlice {
                order_index,
                start_at: cursor,
                duration,
                invoice_amount: duration.as_secs_f64() / total_secs * window.invoice_amount,
            });
            order_index += 1;
        }

        cursor = cursor.checked_add(duration).unwrap_or(window.stop_at);
        remaining -= duration;
    }

    slices
}

#[cfg(test)]
mod tests {
    use jiff::{SignedDuration, Timestamp};

    use super::*;

    fn window(start: i64, stop: i64, invoice_amount: f64) -> AllocationWindow {
        AllocationWindow {
            node_id: "node-a".into(),
            start_at: Timestamp::from_second(start).unwrap(),
            stop_at: Timestamp::from_second(stop).unwrap(),
            invoice_amount,
            compute_class: "gpu".into(),
        }
    }

    fn limits(minimum: i64, maximum: i64) -> SliceLimits {
        SliceLimits {
            minimum: SignedDuration::from_secs(minimum),
            maximum: SignedDuration::from_secs(maximum),
        }
    }

    fn summary(slices: &[JobSlice]) -> Vec<(u32, i64, i64, f64)> {
        slices
            .iter()
            .map(|s| {
                (
                    s.order_index,
                    s.start_at.as_second(),
                    s.duration.as_secs(),
                    (s.invoice_amount * 1e6).round() / 1e6,
                )
            })
            .collect()
    }

    #[test]
    fn test_window_splits_into_max_sized_jobs_with_short_tail() {
        let slices = slice_window(&window(0, 150, 150.0), limits(10, 60));
        assert_eq!(
            summary(&slices),
            vec![(0, 0, 60, 60.0), (1, 60, 60, 60.0), (2, 120, 30, 30.0)]
        );
    }

    #[test]
    fn test_remainder_below_minimum_is_dropped() {
        let slices = slice_window(&window(0, 65, 65.0), limits(10, 60));
        assert_eq!(summary(&slices), vec![(0, 0, 60, 60.0)]);
    }

    #[test]
    fn test_window_shorter_than_maximum_is_one_job() {
        let slices = slice_window(&window(100, 145, 9.0), limits(10, 60));
        assert_eq!(summary(&slices), vec![(0, 100, 45, 9.0)]);
    }

    #[test]
    fn test_exact_multiple_has_no_remainder() {
        let slices = slice_window(&window(0, 180, 3.0), limits(10, 60));
        assert_eq!(slices.len(), 3);
        assert!(slices.iter().all(|s| s.duration.as_secs() == 60));
    }

    #[test]
    fn test_window_below_minimum_is_not_plannable() {
        let w = window(0, 9, 1.0);
        assert!(!is_plannable(&w, limits(10, 60)));
        assert!(slice_window(&w, limits(10, 60)).is_empty());
        assert!(is_plannable(&window(0, 10, 1.0), limits(10, 60)));
    }

    #[test]
    fn test_empty_window_yields_nothing() {
        assert!(slice_window(&window(50, 50, 1.0), limits(10, 60)).is_empty());
    }

    #[test]
    fn test_slicing_invariants_hold_across_window_lengths() {
        let limits = limits(7, 25);
        for length in 7..=200 {
            let w = window(1_000, 1_000 + length, length as f64 * 2.0);
            let slices = slice_window(&w, limits);

            let indices: Vec<u32> = slices.iter().map(|s| s.order_index).collect();
            let expected: Vec<u32> = (0..slices.len() as u32).collect();
            assert_eq!(indices, expected, "length {length}");

            assert!(slices.windows(2).all(|p| p[0].start_at <= p[1].start_at));
            assert!(slices.iter().all(|s| s.duration >= limits.minimum));
            assert!(slices.iter().all(|s| s.duration <= limits.maximum));

            let covered: i64 = slices.iter().map(|s| s.duration.as_secs()).sum();
            assert!(covered <= length);
            assert!(length - covered < 7, "length {length} shortfall {}", length - covered);

            for s in &slices {
                let expected = s.duration.as_secs_f64() / length as f64 * w.invoice_amount;
                assert!((s.invoice_amount - expected).abs() < 1e-9);
            }
        }
    }
}
