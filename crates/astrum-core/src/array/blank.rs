//! Blank handling: sentinel detection, replacement, and mask-driven blanking.
//!
//! Every blank test goes through [`Element::is_blank`], the one place the
//! NaN-inequality subtlety lives. Writes, by contrast, are ordinary
//! assignments of the sentinel bit pattern.

use num_traits::AsPrimitive;

use crate::error::{CoreError, Result};
use crate::kind::{BLANK_STRING, Element, ElementKind, Scalar};

use super::{DataArray, Values, dispatch_fixed, dispatch_real};

impl DataArray {
    /// Whether the element at flat index `index` is the blank sentinel.
    ///
    /// Kind-dispatched: floating kinds use the NaN test, never equality.
    pub fn is_blank_at(&self, index: usize) -> Result<bool> {
        if index >= self.len() {
            return Err(CoreError::IndexOutOfBounds {
                index,
                len: self.len(),
            });
        }
        Ok(dispatch_fixed!(&self.values,
            buf => buf.as_slice()[index].is_blank(),
            strings => strings[index] == BLANK_STRING))
    }

    /// Rescan the whole array for blanks.
    ///
    /// The `any_blank` flag is advisory and conservatively true; this is the
    /// exact answer, used to re-establish the flag after operations (like
    /// conversion) that reset it.
    pub fn has_any_blank(&self) -> bool {
        dispatch_fixed!(&self.values,
            buf => buf.as_slice().iter().any(|&x| x.is_blank()),
            strings => strings.iter().any(|s| s == BLANK_STRING))
    }

    /// Overwrite every blank element with `value`, which must be of the
    /// array's own kind ([`CoreError::UnsupportedConversion`] otherwise).
    ///
    /// The scan is NaN-aware; the write is a plain assignment. Clears the
    /// `any_blank` flag — unless `value` is itself the kind's sentinel, in
    /// which case the rewrite leaves every blank in place and the flag must
    /// stay as it was.
    pub fn replace_blanks(&mut self, value: &Scalar) -> Result<()> {
        match (&mut self.values, value) {
            (Values::U8(buf), Scalar::U8(v)) => replace_in(buf.as_mut_slice(), *v),
            (Values::I8(buf), Scalar::I8(v)) => replace_in(buf.as_mut_slice(), *v),
            (Values::U16(buf), Scalar::U16(v)) => replace_in(buf.as_mut_slice(), *v),
            (Values::I16(buf), Scalar::I16(v)) => replace_in(buf.as_mut_slice(), *v),
            (Values::U32(buf), Scalar::U32(v)) => replace_in(buf.as_mut_slice(), *v),
            (Values::I32(buf), Scalar::I32(v)) => replace_in(buf.as_mut_slice(), *v),
            (Values::U64(buf), Scalar::U64(v)) => replace_in(buf.as_mut_slice(), *v),
            (Values::I64(buf), Scalar::I64(v)) => replace_in(buf.as_mut_slice(), *v),
            (Values::F32(buf), Scalar::F32(v)) => replace_in(buf.as_mut_slice(), *v),
            (Values::F64(buf), Scalar::F64(v)) => replace_in(buf.as_mut_slice(), *v),
            (Values::C32(buf), Scalar::C32(v)) => replace_in(buf.as_mut_slice(), *v),
            (Values::C64(buf), Scalar::C64(v)) => replace_in(buf.as_mut_slice(), *v),
            (Values::Logical(buf), Scalar::Logical(v)) => replace_in(buf.as_mut_slice(), *v),
            (Values::Str(strings), Scalar::Str(v)) => {
                for s in strings.iter_mut() {
                    if s == BLANK_STRING {
                        s.clone_from(v);
                    }
                }
            }
            _ => {
                return Err(CoreError::UnsupportedConversion {
                    from: value.kind(),
                    to: self.kind(),
                });
            }
        }
        if !value.is_blank() {
            self.any_blank = false;
        }
        Ok(())
    }

    /// Blank every element whose corresponding `mask` element is non-zero.
    ///
    /// The mask must have the same shape ([`CoreError::ShapeMismatch`]). It
    /// is converted to `F32` first unless it already is: a mask built from
    /// overlapping model profiles can carry fractional values in 0–1, and
    /// rounding it to an integer would turn soft masking into all-or-nothing.
    /// An all-zero mask takes a fast path that skips the write pass.
    pub fn apply_mask(&mut self, mask: &DataArray) -> Result<()> {
        self.ensure_same_shape(mask)?;

        let converted;
        let mask_values: &[f32] = if mask.kind() == ElementKind::F32 {
            mask.as_slice::<f32>()?
        } else {
            converted = mask.convert(ElementKind::F32)?;
            converted.as_slice::<f32>()?
        };

        // Nothing to blank: avoid the dispatch-heavy write loop entirely.
        if mask_values.iter().all(|&m| m == 0.0) {
            return Ok(());
        }

        dispatch_fixed!(&mut self.values,
            buf => mask_into(buf.as_mut_slice(), mask_values),
            strings => {
                for (s, &m) in strings.iter_mut().zip(mask_values) {
                    if m != 0.0 {
                        s.replace_range(.., BLANK_STRING);
                    }
                }
            });

        self.any_blank = true;
        Ok(())
    }

    /// Blank every element below `greater_equal` or at/above `less_than`.
    ///
    /// This is the statistics front end's range selection: `greater_equal`
    /// names the smallest value kept, `less_than` the first value dropped.
    /// Either bound may be absent. Real-numeric kinds only.
    pub fn blank_outside_range(
        &mut self,
        greater_equal: Option<f64>,
        less_than: Option<f64>,
    ) -> Result<()> {
        if greater_equal.is_none() && less_than.is_none() {
            return Ok(());
        }
        let blanked = dispatch_real!(&mut self.values,
            buf => blank_outside(buf.as_mut_slice(), greater_equal, less_than),
            _ => {
                return Err(CoreError::UnsupportedKind {
                    kind: self.kind(),
                    context: "range selection",
                });
            });
        if blanked > 0 {
            self.any_blank = true;
        }
        Ok(())
    }
}

fn replace_in<T: Element>(data: &mut [T], value: T) {
    for x in data.iter_mut() {
        if x.is_blank() {
            *x = value;
        }
    }
}

fn mask_into<T: Element>(data: &mut [T], mask: &[f32]) {
    for (x, &m) in data.iter_mut().zip(mask) {
        if m != 0.0 {
            *x = T::blank();
        }
    }
}

fn blank_outside<T>(data: &mut [T], greater_equal: Option<f64>, less_than: Option<f64>) -> usize
where
    T: Element + AsPrimitive<f64>,
{
    let mut blanked = 0;
    for x in data.iter_mut() {
        let v: f64 = (*x).as_();
        let below = greater_equal.is_some_and(|ge| v < ge);
        let above = less_than.is_some_and(|lt| v >= lt);
        if below || above {
            *x = T::blank();
            blanked += 1;
        }
    }
    blanked
}
