//! Ordinary least-squares slope.

use aegis_core::TimeSeriesPoint;

/// Least-squares gradient of `points`, in value units per second.
///
/// Fewer than two points, or points that all share one timestamp, have no
/// assertable trend and yield 0. Timestamps are shifted so the first point
/// sits at x = 0; the gradient is unchanged but the sums stay small for
/// Unix-epoch inputs.
pub fn slope(points: &[TimeSeriesPoint]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }

    let origin = points[0].timestamp;
    let n = points.len() as f64;
    let (mut sum_x, mut sum_y, mut sum_xy, mut sum_xx) = (0.0, 0.0, 0.0, 0.0);
    for p in points {
        let x = p.timestamp - origin;
        sum_x += x;
        sum_y += p.value;
        sum_xy += x * p.value;
        sum_xx += x * x;
    }

    let denominator = n * sum_xx - sum_x * sum_x;
    if denominator == 0.0 {
        return 0.0;
    }
    (n * sum_xy - sum_x * sum_y) / denominator
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points(raw: &[(f64, f64)]) -> Vec<TimeSeriesPoint> {
        raw.iter().map(|&(t, v)| TimeSeriesPoint::new(t, v)).collect()
    }

    #[test]
    fn test_rising_series_is_positive() {
        let s = slope(&points(&[(0.0, 10.0), (1.0, 20.0), (2.0, 30.0)]));
        assert!(s > 0.0);
        assert!((s - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_flat_series_is_zero() {
        assert_eq!(slope(&points(&[(0.0, 50.0), (1.0, 50.0), (2.0, 50.0)])), 0.0);
    }

    #[test]
    fn test_falling_series_is_negative() {
        assert!(slope(&points(&[(0.0, 90.0), (1.0, 80.0), (2.0, 70.0)])) < 0.0);
    }

    #[test]
    fn test_short_series_is_zero() {
        assert_eq!(slope(&[]), 0.0);
        assert_eq!(slope(&points(&[(5.0, 100.0)])), 0.0);
    }

    #[test]
    fn test_identical_timestamps_is_zero() {
        assert_eq!(slope(&points(&[(3.0, 1.0), (3.0, 9.0), (3.0, 4.0)])), 0.0);
    }

    #[test]
    fn test_epoch_timestamps() {
        let s = slope(&points(&[
            (1_700_000_000.0, 1.0),
            (1_700_000_015.0, 2.5),
            (1_700_000_030.0, 4.0),
        ]));
        assert!((s - 0.1).abs() < 1e-9);
    }
}
