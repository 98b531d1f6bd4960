//! Order statistics over real-numeric arrays.
//!
//! Everything here operates on the eight integer kinds, `f32`/`f64` and
//! logical bytes; string and complex arrays are rejected with
//! `UnsupportedKind`. Blank elements are not skipped: callers drop or
//! replace blanks before sorting or clipping.

use num_traits::AsPrimitive;

use crate::array::{dispatch_real, DataArray};
use crate::error::{CoreError, Result};
use crate::kind::Element;

// ============================================================================
// Sorting
// ============================================================================

/// Check whether the flat element order is non-decreasing.
pub fn is_sorted(array: &DataArray) -> Result<bool> {
    Ok(dispatch_real!(&array.values,
        buf => buf.as_slice().windows(2).all(|w| w[0] <= w[1]),
        _ => return Err(unsupported(array, "sortedness check"))))
}

/// Sort the elements ascending, in place and flat across all dimensions.
///
/// Unstable sort with NaN compared as equal, so NaN placement is undefined.
pub fn sort_increasing(array: &mut DataArray) -> Result<()> {
    dispatch_real!(&mut array.values,
        buf => buf
            .as_mut_slice()
            .sort_unstable_by(|a, b| a.partial_cmp(b).unwrap_or(core::cmp::Ordering::Equal)),
        _ => return Err(unsupported(array, "sorting")));
    Ok(())
}

/// Duplicate and sort, skipping the sort when the input already is sorted.
///
/// The copy keeps the input's backend tag, so a mapped array yields a
/// mapped sorted copy.
pub fn sorted_copy(array: &DataArray) -> Result<DataArray> {
    let already = is_sorted(array)?;
    let mut copy = array.duplicate()?;
    if !already {
        sort_increasing(&mut copy)?;
    }
    Ok(copy)
}

// ============================================================================
// Quantiles
// ============================================================================

/// Quantile of a sorted array by R-7 linear interpolation at rank
/// `q * (n - 1)`.
///
/// `q` must lie in `[0, 1]`. Sortedness is a precondition, not validated;
/// use [`sorted_copy`] first when in doubt.
pub fn quantile(array: &DataArray, q: f64) -> Result<f64> {
    if !(0.0..=1.0).contains(&q) {
        return Err(CoreError::InvalidArgument {
            reason: format!("quantile {q} is outside [0, 1]"),
        });
    }
    Ok(dispatch_real!(&array.values,
        buf => quantile_of(buf.as_slice(), q),
        _ => return Err(unsupported(array, "quantile"))))
}

fn quantile_of<T: Element + AsPrimitive<f64>>(sorted: &[T], q: f64) -> f64 {
    let rank = q * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let a = sorted[lo].as_();
    let b = sorted[hi].as_();
    a + (b - a) * (rank - lo as f64)
}

/// A quantile interval `(qmin, qmax)` used to select the central part of a
/// distribution.
///
/// When only the lower quantile is given the range is symmetric,
/// `(Q, 1 - Q)`, so a lone `qmin` above `0.5` would describe an empty
/// interval and is rejected.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuantileRange {
    qmin: f64,
    qmax: Option<f64>,
}

impl QuantileRange {
    pub fn new(qmin: f64, qmax: Option<f64>) -> Result<QuantileRange> {
        if !(0.0..=1.0).contains(&qmin) {
            return Err(CoreError::InvalidArgument {
                reason: format!("lower quantile {qmin} is outside [0, 1]"),
            });
        }
        match qmax {
            Some(q) if !(0.0..=1.0).contains(&q) => Err(CoreError::InvalidArgument {
                reason: format!("upper quantile {q} is outside [0, 1]"),
            }),
            Some(q) if q <= qmin => Err(CoreError::InvalidArgument {
                reason: format!("upper quantile {q} must be larger than the lower quantile {qmin}"),
            }),
            None if qmin > 0.5 => Err(CoreError::InvalidArgument {
                reason: format!(
                    "with no upper quantile the range is ({qmin}, {}), which is empty; \
                     give a lower quantile of at most 0.5 or an explicit upper quantile",
                    1.0 - qmin
                ),
            }),
            _ => Ok(QuantileRange { qmin, qmax }),
        }
    }

    /// The concrete `(qmin, qmax)` pair, filling in the symmetric upper
    /// bound when none was given.
    pub fn resolve(&self) -> (f64, f64) {
        (self.qmin, self.qmax.unwrap_or(1.0 - self.qmin))
    }

    /// Evaluate both quantiles on a sorted array, yielding the value pair
    /// to feed into [`DataArray::blank_outside_range`].
    pub fn bounds(&self, sorted: &DataArray) -> Result<(f64, f64)> {
        let (qmin, qmax) = self.resolve();
        Ok((quantile(sorted, qmin)?, quantile(sorted, qmax)?))
    }
}

// ============================================================================
// Sigma clipping
// ============================================================================

/// Iterative sigma clipping: repeatedly compute mean and standard deviation
/// and discard elements further than `multiplier * std` from the mean.
///
/// `param` selects the termination mode. A value below `1.0` is a tolerance:
/// clipping stops when the relative change in the standard deviation between
/// rounds drops below it. A value of `1.0` or more is an exact round count
/// and must be a whole number.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SigmaClip {
    multiplier: f64,
    param: f64,
}

/// Statistics of the surviving subset after sigma clipping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SigmaClipResult {
    /// Number of elements that survived all clipping rounds.
    pub remaining: usize,
    pub mean: f64,
    pub std: f64,
    /// Median of the surviving subset.
    pub median: f64,
    /// Number of clipping rounds actually run.
    pub rounds: usize,
}

impl SigmaClip {
    pub fn new(multiplier: f64, param: f64) -> Result<SigmaClip> {
        if !(multiplier > 0.0) {
            return Err(CoreError::InvalidArgument {
                reason: format!("sigma-clipping multiplier {multiplier} must be greater than zero"),
            });
        }
        if !(param > 0.0) {
            return Err(CoreError::InvalidArgument {
                reason: format!("sigma-clipping parameter {param} must be greater than zero"),
            });
        }
        if param >= 1.0 && param.fract() != 0.0 {
            return Err(CoreError::InvalidArgument {
                reason: format!(
                    "sigma-clipping parameter {param} is 1 or larger, so it is a number of \
                     rounds and must be a whole number"
                ),
            });
        }
        Ok(SigmaClip { multiplier, param })
    }

    pub fn clip(&self, array: &DataArray) -> Result<SigmaClipResult> {
        let mut values: Vec<f64> = dispatch_real!(&array.values,
            buf => buf.as_slice().iter().map(|&v| v.as_()).collect(),
            _ => return Err(unsupported(array, "sigma clipping")));
        // Clipping around the mean only ever removes from both ends of a
        // sorted sequence, so the survivors stay a contiguous subrange.
        values.sort_unstable_by(|a, b| a.partial_cmp(b).unwrap_or(core::cmp::Ordering::Equal));

        let by_rounds = self.param >= 1.0;
        let max_rounds = if by_rounds { self.param as usize } else { usize::MAX };

        let mut lo = 0usize;
        let mut hi = values.len();
        let mut rounds = 0usize;
        let mut prev_std = f64::INFINITY;
        let (mean, std) = loop {
            let (m, s) = mean_std(&values[lo..hi]);
            if !by_rounds && rounds > 0 && (s == 0.0 || (prev_std - s) / s < self.param) {
                break (m, s);
            }
            if by_rounds && rounds == max_rounds {
                break (m, s);
            }
            prev_std = s;
            rounds += 1;

            let low_cut = m - self.multiplier * s;
            let high_cut = m + self.multiplier * s;
            while lo < hi && values[lo] < low_cut {
                lo += 1;
            }
            while hi > lo && values[hi - 1] > high_cut {
                hi -= 1;
            }
            if lo == hi {
                return Err(CoreError::InvalidArgument {
                    reason: format!(
                        "sigma clipping with multiplier {} discarded every element",
                        self.multiplier
                    ),
                });
            }
        };

        Ok(SigmaClipResult {
            remaining: hi - lo,
            mean,
            std,
            median: quantile_of(&values[lo..hi], 0.5),
            rounds,
        })
    }
}

// ============================================================================
// Internals
// ============================================================================

fn unsupported(array: &DataArray, context: &'static str) -> CoreError {
    CoreError::UnsupportedKind {
        kind: array.kind(),
        context,
    }
}

/// Population mean and standard deviation.
fn mean_std(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values
        .iter()
        .map(|v| {
            let d = v - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    (mean, var.sqrt())
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::kind::ElementKind;

    #[test]
    fn test_is_sorted() {
        let sorted = DataArray::from_slice(&[1i32, 2, 2, 9], &[4]).unwrap();
        assert!(is_sorted(&sorted).unwrap());
        let unsorted = DataArray::from_slice(&[3.0f32, 1.0, 2.0], &[3]).unwrap();
        assert!(!is_sorted(&unsorted).unwrap());
        let single = DataArray::from_slice(&[7u8], &[1]).unwrap();
        assert!(is_sorted(&single).unwrap());
    }

    #[test]
    fn test_sort_increasing_in_place() {
        let mut arr = DataArray::from_slice(&[3i32, 1, 4, 1, 5, 9], &[6]).unwrap();
        sort_increasing(&mut arr).unwrap();
        assert_eq!(arr.as_slice::<i32>().unwrap(), &[1, 1, 3, 4, 5, 9]);
    }

    #[test]
    fn test_sort_flat_across_dimensions() {
        let mut arr = DataArray::from_slice(&[5i16, 2, 8, 1], &[2, 2]).unwrap();
        sort_increasing(&mut arr).unwrap();
        assert_eq!(arr.as_slice::<i16>().unwrap(), &[1, 2, 5, 8]);
        assert_eq!(arr.shape(), &[2, 2]);
    }

    #[test]
    fn test_sorted_copy_leaves_input_alone() {
        let arr = DataArray::from_slice(&[3.0f64, 1.0, 2.0], &[3]).unwrap();
        let copy = sorted_copy(&arr).unwrap();
        assert_eq!(copy.as_slice::<f64>().unwrap(), &[1.0, 2.0, 3.0]);
        assert_eq!(arr.as_slice::<f64>().unwrap(), &[3.0, 1.0, 2.0]);
    }

    #[test]
    fn test_sorted_copy_of_sorted_input() {
        let arr = DataArray::from_slice(&[1u32, 2, 3], &[3]).unwrap();
        let copy = sorted_copy(&arr).unwrap();
        assert_eq!(copy.as_slice::<u32>().unwrap(), &[1, 2, 3]);
    }

    #[test]
    fn test_stats_reject_string_and_complex() {
        let strs = DataArray::zeros(ElementKind::Str, &[2]).unwrap();
        assert!(matches!(
            is_sorted(&strs),
            Err(CoreError::UnsupportedKind { .. })
        ));
        let complex = DataArray::zeros(ElementKind::C32, &[2]).unwrap();
        assert!(matches!(
            quantile(&complex, 0.5),
            Err(CoreError::UnsupportedKind { .. })
        ));
        let mut complex = complex;
        assert!(sort_increasing(&mut complex).is_err());
    }

    #[test]
    fn test_quantile_interpolation() {
        let arr = DataArray::from_slice(&[1.0f64, 2.0, 3.0, 4.0, 5.0], &[5]).unwrap();
        assert_eq!(quantile(&arr, 0.0).unwrap(), 1.0);
        assert_eq!(quantile(&arr, 0.5).unwrap(), 3.0);
        assert_eq!(quantile(&arr, 1.0).unwrap(), 5.0);
        assert_eq!(quantile(&arr, 0.25).unwrap(), 2.0);
        // Between ranks 2 and 3 at fraction 0.2.
        assert_relative_eq!(quantile(&arr, 0.55).unwrap(), 3.2, max_relative = 1e-12);
    }

    #[test]
    fn test_quantile_of_integers() {
        let arr = DataArray::from_slice(&[10u8, 20], &[2]).unwrap();
        assert_eq!(quantile(&arr, 0.5).unwrap(), 15.0);
    }

    #[test]
    fn test_quantile_rejects_out_of_range() {
        let arr = DataArray::from_slice(&[1.0f64], &[1]).unwrap();
        assert!(matches!(
            quantile(&arr, -0.1),
            Err(CoreError::InvalidArgument { .. })
        ));
        assert!(matches!(
            quantile(&arr, 1.5),
            Err(CoreError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_quantile_range_validation() {
        assert!(QuantileRange::new(0.25, Some(0.9)).is_ok());
        assert!(QuantileRange::new(0.25, None).is_ok());
        // A lone lower quantile above 0.5 describes an empty interval.
        assert!(matches!(
            QuantileRange::new(0.7, None),
            Err(CoreError::InvalidArgument { .. })
        ));
        assert!(QuantileRange::new(-0.1, None).is_err());
        assert!(QuantileRange::new(0.2, Some(1.2)).is_err());
        assert!(QuantileRange::new(0.5, Some(0.4)).is_err());
    }

    #[test]
    fn test_quantile_range_resolve_and_bounds() {
        let range = QuantileRange::new(0.25, None).unwrap();
        assert_eq!(range.resolve(), (0.25, 0.75));

        let sorted = DataArray::from_slice(&[1.0f64, 2.0, 3.0, 4.0, 5.0], &[5]).unwrap();
        let full = QuantileRange::new(0.0, Some(1.0)).unwrap();
        assert_eq!(full.bounds(&sorted).unwrap(), (1.0, 5.0));
        assert_eq!(range.bounds(&sorted).unwrap(), (2.0, 4.0));
    }

    #[test]
    fn test_sigma_clip_validation() {
        assert!(SigmaClip::new(3.0, 3.0).is_ok());
        assert!(SigmaClip::new(3.0, 0.01).is_ok());
        assert!(matches!(
            SigmaClip::new(1.0, 0.0),
            Err(CoreError::InvalidArgument { .. })
        ));
        assert!(matches!(
            SigmaClip::new(0.0, 3.0),
            Err(CoreError::InvalidArgument { .. })
        ));
        // A round count must be a whole number.
        assert!(matches!(
            SigmaClip::new(3.0, 2.5),
            Err(CoreError::InvalidArgument { .. })
        ));
        assert!(SigmaClip::new(3.0, 1.0).is_ok());
    }

    #[test]
    fn test_sigma_clip_round_mode_runs_exactly_that_many_rounds() {
        let mut data = vec![1.0f64; 10];
        data.push(1000.0);
        let arr = DataArray::from_slice(&data, &[11]).unwrap();

        let result = SigmaClip::new(3.0, 3.0).unwrap().clip(&arr).unwrap();
        assert_eq!(result.rounds, 3);
        assert_eq!(result.remaining, 10);
        assert_eq!(result.mean, 1.0);
        assert_eq!(result.std, 0.0);
        assert_eq!(result.median, 1.0);
    }

    #[test]
    fn test_sigma_clip_tolerance_mode_stops_when_converged() {
        let mut data = vec![1.0f64; 10];
        data.push(1000.0);
        let arr = DataArray::from_slice(&data, &[11]).unwrap();

        let result = SigmaClip::new(3.0, 0.01).unwrap().clip(&arr).unwrap();
        assert_eq!(result.remaining, 10);
        assert_eq!(result.mean, 1.0);
        assert_eq!(result.rounds, 1);
    }

    #[test]
    fn test_sigma_clip_on_integers() {
        let arr = DataArray::from_slice(&[5i32, 5, 5, 5, 5, 5, 5, 5], &[8]).unwrap();
        let result = SigmaClip::new(2.0, 2.0).unwrap().clip(&arr).unwrap();
        assert_eq!(result.remaining, 8);
        assert_eq!(result.mean, 5.0);
        assert_eq!(result.median, 5.0);
        assert_eq!(result.rounds, 2);
    }

    #[test]
    fn test_mean_std_is_population_form() {
        let (m, s) = mean_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert_relative_eq!(m, 5.0);
        assert_relative_eq!(s, 2.0);
    }

    #[test]
    fn test_sigma_clip_that_empties_the_set_errors() {
        // Mean 5, std 5; a half-sigma cut of (2.5, 7.5) removes both.
        let arr = DataArray::from_slice(&[0.0f64, 10.0], &[2]).unwrap();
        assert!(matches!(
            SigmaClip::new(0.5, 0.01).unwrap().clip(&arr),
            Err(CoreError::InvalidArgument { .. })
        ));
    }
}
