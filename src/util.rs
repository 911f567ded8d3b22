/*!
Miscellaneous utilities for `coinburn`
*/

use chrono::{Duration, NaiveDate};
use num::{Float, NumCast};

/// Trailing rolling mean over `window` values with a minimum period of one.
///
/// The first `window - 1` outputs average over however many values are available so far,
/// so no output is ever undefined. A window of zero is treated as one.
pub fn rolling_mean<F: Float>(values: &[F], window: usize) -> Vec<F> {
    let window = window.max(1);
    let mut out = Vec::with_capacity(values.len());
    let mut sum = F::zero();
    for (i, &value) in values.iter().enumerate() {
        sum = sum + value;
        if i >= window {
            sum = sum - values[i - window];
        }
        let count: F = NumCast::from((i + 1).min(window)).unwrap_or_else(F::one);
        out.push(sum / count);
    }
    out
}

/// Iterate over every calendar day in `[start, end]`
pub fn days_inclusive(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    let days = (end - start).num_days().max(-1) + 1;
    (0..days).map(move |offset| start + Duration::days(offset))
}

/// Truncate a string to at most `max_chars` characters, respecting character boundaries
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rolling_mean_min_period_one() {
        let means = rolling_mean(&[2.0, 4.0, 6.0, 8.0], 2);
        assert_eq!(means, vec![2.0, 3.0, 5.0, 7.0]);
        let means = rolling_mean(&[3.0f32], 30);
        assert_eq!(means, vec![3.0]);
        assert!(rolling_mean::<f64>(&[], 30).is_empty());
    }

    #[test]
    fn day_ranges() {
        let start = NaiveDate::from_ymd_opt(2024, 2, 27).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let days: Vec<_> = days_inclusive(start, end).collect();
        assert_eq!(days.len(), 4);
        assert_eq!(days[2], NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        assert_eq!(days_inclusive(end, start).count(), 0);
        assert_eq!(days_inclusive(start, start).count(), 1);
    }

    #[test]
    fn truncation() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("", 0), "");
    }
}
