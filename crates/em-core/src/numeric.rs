use crate::CoreError;

/// Floating point type used throughout system
pub type Real = f64;

/// Slack applied before flooring the step count so that horizons which are an
/// exact multiple of `dt` in decimal (`1.0 / 0.1`) do not lose their last step
/// to binary rounding.
pub const GRID_EPS: Real = 1e-9;

pub fn ensure_finite(v: Real, what: &'static str) -> Result<Real, CoreError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(CoreError::NonFinite { what, value: v })
    }
}

/// Number of fixed steps on `[t_start, t_end]`: `floor((t_end - t_start) / dt)`.
///
/// The output grid never extends past `t_end`; a trajectory on this grid has
/// `step_count + 1` samples.
pub fn step_count(t_start: Real, t_end: Real, dt: Real) -> Result<usize, CoreError> {
    ensure_finite(t_start, "t_start")?;
    ensure_finite(t_end, "t_end")?;
    ensure_finite(dt, "dt")?;
    if dt <= 0.0 {
        return Err(CoreError::InvalidArg {
            what: "dt must be positive",
        });
    }
    if t_end < t_start {
        return Err(CoreError::InvalidArg {
            what: "t_end must not precede t_start",
        });
    }
    let steps = ((t_end - t_start) / dt + GRID_EPS).floor();
    if steps >= usize::MAX as Real {
        return Err(CoreError::InvalidArg {
            what: "horizon holds too many steps",
        });
    }
    let steps = steps as usize;
    // The widest spacing in ulps sits at one end of the grid.
    let distinct = |k: usize| grid_time(t_start, dt, k + 1) > grid_time(t_start, dt, k);
    if !distinct(0) || (steps > 0 && !distinct(steps - 1)) {
        return Err(CoreError::InvalidArg {
            what: "dt is too small to separate grid times",
        });
    }
    Ok(steps)
}

/// Time of grid point `k`, computed from the index rather than by accumulation.
#[inline]
pub fn grid_time(t_start: Real, dt: Real, k: usize) -> Real {
    t_start + k as Real * dt
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn grid_stays_inside_horizon(
            t_start in -10.0_f64..10.0,
            span in 0.0_f64..50.0,
            dt in 1e-3_f64..2.0,
        ) {
            let t_end = t_start + span;
            let n = step_count(t_start, t_end, dt).unwrap();
            let last = grid_time(t_start, dt, n);
            prop_assert!(last <= t_end + 1e-6 * dt.max(1.0));
            prop_assert!(grid_time(t_start, dt, n + 1) > t_end - 1e-6 * dt.max(1.0));
        }
    }
}
