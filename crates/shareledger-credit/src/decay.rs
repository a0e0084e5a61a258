//! Exponential time decay of transfer value.

/// `0.5 ^ ((now - t) / half_life)`.
///
/// Interactions in the future (clock skew) get 1.0; value is never amplified.
/// A non-positive half-life decays everything older than `now` to zero.
pub fn decay_factor(interaction_time: i64, now: i64, half_life_ms: i64) -> f64 {
    if now <= interaction_time {
        return 1.0;
    }
    if half_life_ms <= 0 {
        return 0.0;
    }
    let age = now.saturating_sub(interaction_time) as f64;
    0.5f64.powf(age / half_life_ms as f64)
}

/// `floor(raw * decay_factor)`.
pub fn decayed_value(raw_bytes: u64, interaction_time: i64, now: i64, half_life_ms: i64) -> u64 {
    let factor = decay_factor(interaction_time, now, half_life_ms);
    if factor >= 1.0 {
        return raw_bytes;
    }
    (raw_bytes as f64 * factor).floor() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{MB, MILLIS_PER_DAY};
    use proptest::prelude::*;

    const HALF_LIFE: i64 = 90 * MILLIS_PER_DAY;

    #[test]
    fn test_no_decay_at_interaction_time() {
        assert_eq!(decay_factor(1000, 1000, HALF_LIFE), 1.0);
        assert_eq!(decayed_value(12345, 1000, 1000, HALF_LIFE), 12345);
    }

    #[test]
    fn test_future_interaction_not_amplified() {
        assert_eq!(decay_factor(5000, 1000, HALF_LIFE), 1.0);
        assert_eq!(decayed_value(777, 5000, 1000, HALF_LIFE), 777);
    }

    #[test]
    fn test_one_half_life() {
        let factor = decay_factor(0, HALF_LIFE, HALF_LIFE);
        assert!((factor - 0.5).abs() < 1e-12);
        assert_eq!(decayed_value(1000, 0, HALF_LIFE, HALF_LIFE), 500);
    }

    #[test]
    fn test_ten_mb_after_25_days() {
        let raw = 10 * MB as u64;
        let value = decayed_value(raw, 0, 25 * MILLIS_PER_DAY, HALF_LIFE);
        let expected = (raw as f64 * 0.5f64.powf(25.0 / 90.0)).floor() as u64;
        assert_eq!(value, expected);
        // about 8.2 MiB
        assert!(value > 8 * MB as u64 && value < (83 * MB as u64) / 10);
    }

    #[test]
    fn test_very_old_approaches_zero() {
        assert_eq!(decayed_value(10 * MB as u64, 0, 100 * 365 * MILLIS_PER_DAY, HALF_LIFE), 0);
    }

    proptest! {
        #[test]
        fn prop_decay_non_increasing(
            raw in 0u64..=1u64 << 40,
            t in 0i64..1_000_000_000_000,
            a in 0i64..10_000_000_000,
            b in 0i64..10_000_000_000,
        ) {
            let (near, far) = if a <= b { (a, b) } else { (b, a) };
            let v_near = decayed_value(raw, t, t + near, HALF_LIFE);
            let v_far = decayed_value(raw, t, t + far, HALF_LIFE);
            prop_assert!(v_far <= v_near);
            prop_assert!(v_near <= raw);
        }

        #[test]
        fn prop_factor_in_unit_interval(t in any::<i64>(), now in any::<i64>()) {
            let f = decay_factor(t, now, HALF_LIFE);
            prop_assert!((0.0..=1.0).contains(&f));
        }
    }
}
