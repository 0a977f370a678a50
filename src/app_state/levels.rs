//! Pure level-curve math.
//!
//! The curve is triangular: the cumulative XP required to *reach* level `L`
//! is `50 * L * (L + 1)`, so each level window is `100 * (L + 1)` XP wide.

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct LevelProgress {
    pub(crate) level: u32,
    pub(crate) xp_into_level: u64,
    pub(crate) xp_to_next: u64,
    pub(crate) percent: f64,
}

/// Cumulative XP required to reach `level`. Saturates at `u64::MAX` for
/// levels whose threshold no longer fits.
pub(crate) fn xp_for_level(level: u32) -> u64 {
    let level = u64::from(level);
    50u64.saturating_mul(level).saturating_mul(level + 1)
}

/// Level derived from cumulative XP. Negative XP clamps to level 0.
pub(crate) fn level_for_xp(xp: i64) -> u32 {
    if xp <= 0 {
        return 0;
    }
    let xp = xp as u64;
    let x = xp as f64;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let mut level = ((-1.0 + (1.0 + 8.0 * x / 100.0).sqrt()) / 2.0) as u32;
    // The float estimate can land one off at exact thresholds; nudge it onto
    // the integer boundary so level_for_xp(xp_for_level(l)) == l holds. The
    // comparisons stay in u64 so a saturated threshold never wraps negative.
    while xp_for_level(level + 1) <= xp {
        level += 1;
    }
    while level > 0 && xp_for_level(level) > xp {
        level -= 1;
    }
    level
}

/// Level, XP into the current level, XP left in the window and percent
/// progress for `xp`. The window size `100 * (level + 1)` equals the distance
/// between consecutive thresholds of this curve.
pub(crate) fn progress(xp: i64) -> LevelProgress {
    let level = level_for_xp(xp);
    let xp_start = xp_for_level(level);
    let window = 100 * (u64::from(level) + 1);
    let xp_into_level = (xp.max(0) as u64).saturating_sub(xp_start);
    let xp_to_next = window.saturating_sub(xp_into_level);
    let percent = if window == 0 {
        0.0
    } else {
        100.0 * xp_into_level as f64 / window as f64
    };
    LevelProgress {
        level,
        xp_into_level,
        xp_to_next,
        percent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_and_negative_xp_clamp_to_level_zero() {
        assert_eq!(xp_for_level(0), 0);
        assert_eq!(level_for_xp(0), 0);
        assert_eq!(level_for_xp(-5), 0);
    }

    #[test]
    fn thresholds_are_exact() {
        for level in 0..500 {
            let xp = xp_for_level(level) as i64;
            assert_eq!(level_for_xp(xp), level, "at threshold of level {level}");
            if xp > 0 {
                assert_eq!(level_for_xp(xp - 1), level - 1, "just below level {level}");
            }
        }
    }

    #[test]
    fn boundary_round_trip_is_idempotent() {
        for x in (0..200_000).step_by(7) {
            let l = level_for_xp(x);
            assert_eq!(level_for_xp(xp_for_level(l) as i64), l);
        }
    }

    #[test]
    fn level_is_monotonic_in_xp() {
        let mut prev = 0;
        for x in 0..50_000 {
            let l = level_for_xp(x);
            assert!(l >= prev, "level dropped at xp {x}");
            prev = l;
        }
    }

    #[test]
    fn window_equals_threshold_delta() {
        // progress() renders against 100 * (level + 1); for this curve that
        // must coincide with the actual distance between thresholds.
        for level in 0..1000u32 {
            let delta = xp_for_level(level + 1) - xp_for_level(level);
            assert_eq!(delta, 100 * (u64::from(level) + 1));
        }
    }

    #[test]
    fn curve_saturates_instead_of_overflowing() {
        assert_eq!(xp_for_level(u32::MAX), u64::MAX);
        assert!(xp_for_level(u32::MAX - 1) <= xp_for_level(u32::MAX));
    }

    #[test]
    fn extreme_xp_resolves_without_panicking() {
        let top = level_for_xp(i64::MAX);
        assert!(top > 0);
        assert!(xp_for_level(top) <= i64::MAX as u64);
        assert!(xp_for_level(top + 1) > i64::MAX as u64);
        let p = progress(i64::MAX);
        assert_eq!(p.level, top);
    }

    #[test]
    fn xp_150_is_level_one() {
        assert_eq!(xp_for_level(1), 100);
        assert_eq!(level_for_xp(150), 1);
        let p = progress(150);
        assert_eq!(p.level, 1);
        assert_eq!(p.xp_into_level, 50);
        assert_eq!(p.xp_to_next, 150);
        assert!((p.percent - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn progress_at_zero() {
        let p = progress(0);
        assert_eq!(p.level, 0);
        assert_eq!(p.xp_into_level, 0);
        assert_eq!(p.xp_to_next, 100);
        assert_eq!(p.percent, 0.0);
    }
}
