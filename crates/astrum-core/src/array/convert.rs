//! Elementwise conversion between element kinds.
//!
//! Dispatch is destination-kind-first: one routine per destination, each
//! matching exhaustively on the source kind. The destination buffer is
//! allocated under the input's backend tag before any element is converted,
//! so a mapped result is written straight into its backing file and the
//! array never has to fit on the heap. Numeric pairs follow the host's
//! `as`-cast semantics (truncating float-to-int, saturating out-of-range) —
//! no overflow checking, by contract; callers pick a safe target kind.

use num_complex::{Complex32, Complex64};
use num_traits::AsPrimitive;

use crate::error::{CoreError, Result};
use crate::kind::{Element, ElementKind};

use super::{DataArray, Values, dispatch_real};

impl DataArray {
    /// Produce a new array of kind `to` with identical shape and the same
    /// backend tag (a mapped input yields a mapped output in the same
    /// scratch directory).
    ///
    /// `Str` converts only to itself; complex kinds convert only between
    /// `C32` and `C64`; `Logical` casts as a byte source but is not a
    /// destination. The output carries no blank flag and no WCS metadata —
    /// its contents are freshly computed, so the caller re-establishes
    /// `any_blank` via [`DataArray::has_any_blank`] when needed.
    pub fn convert(&self, to: ElementKind) -> Result<DataArray> {
        let from = self.kind();

        // Identity is a plain buffer copy for every kind, including the ones
        // with no cross-kind path.
        if from == to {
            let mut out = self.duplicate()?;
            out.set_any_blank(false);
            out.set_wcs(None);
            return Ok(out);
        }

        macro_rules! real_dst {
            ($ty:ty, $variant:ident, $fill:ident) => {{
                let mut out = self.alloc_like::<$ty>()?;
                $fill(&self.values, out.as_mut_slice())?;
                Ok(DataArray::from_values(
                    Values::$variant(out),
                    self.shape().to_vec(),
                ))
            }};
        }

        match to {
            ElementKind::U8 => real_dst!(u8, U8, convert_into_u8),
            ElementKind::I8 => real_dst!(i8, I8, convert_into_i8),
            ElementKind::U16 => real_dst!(u16, U16, convert_into_u16),
            ElementKind::I16 => real_dst!(i16, I16, convert_into_i16),
            ElementKind::U32 => real_dst!(u32, U32, convert_into_u32),
            ElementKind::I32 => real_dst!(i32, I32, convert_into_i32),
            ElementKind::U64 => real_dst!(u64, U64, convert_into_u64),
            ElementKind::I64 => real_dst!(i64, I64, convert_into_i64),
            ElementKind::F32 => real_dst!(f32, F32, convert_into_f32),
            ElementKind::F64 => real_dst!(f64, F64, convert_into_f64),
            ElementKind::C32 => match &self.values {
                Values::C64(src) => {
                    let mut out = self.alloc_like::<Complex32>()?;
                    for (d, c) in out.as_mut_slice().iter_mut().zip(src.as_slice()) {
                        *d = Complex32::new(c.re as f32, c.im as f32);
                    }
                    Ok(DataArray::from_values(
                        Values::C32(out),
                        self.shape().to_vec(),
                    ))
                }
                _ => Err(CoreError::UnsupportedConversion { from, to }),
            },
            ElementKind::C64 => match &self.values {
                Values::C32(src) => {
                    let mut out = self.alloc_like::<Complex64>()?;
                    for (d, c) in out.as_mut_slice().iter_mut().zip(src.as_slice()) {
                        *d = Complex64::new(f64::from(c.re), f64::from(c.im));
                    }
                    Ok(DataArray::from_values(
                        Values::C64(out),
                        self.shape().to_vec(),
                    ))
                }
                _ => Err(CoreError::UnsupportedConversion { from, to }),
            },
            ElementKind::Str => Err(CoreError::UnsupportedConversion { from, to }),
            // Mirrors the closed destination switch of the original engine:
            // logical is readable as bytes but never a conversion target.
            ElementKind::Logical => Err(CoreError::UnsupportedKind {
                kind: to,
                context: "type conversion destination",
            }),
        }
    }
}

fn cast_into<S, D>(src: &[S], dst: &mut [D])
where
    S: Element + AsPrimitive<D>,
    D: Copy + 'static,
{
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = s.as_();
    }
}

macro_rules! impl_convert_into {
    ($fn_name:ident, $dst:ty) => {
        fn $fn_name(src: &Values, dst: &mut [$dst]) -> Result<()> {
            dispatch_real!(src,
                buf => cast_into(buf.as_slice(), dst),
                _ => {
                    return Err(CoreError::UnsupportedConversion {
                        from: src.kind(),
                        to: <$dst as Element>::KIND,
                    });
                });
            Ok(())
        }
    };
}

impl_convert_into!(convert_into_u8, u8);
impl_convert_into!(convert_into_i8, i8);
impl_convert_into!(convert_into_u16, u16);
impl_convert_into!(convert_into_i16, i16);
impl_convert_into!(convert_into_u32, u32);
impl_convert_into!(convert_into_i32, i32);
impl_convert_into!(convert_into_u64, u64);
impl_convert_into!(convert_into_i64, i64);
impl_convert_into!(convert_into_f32, f32);
impl_convert_into!(convert_into_f64, f64);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::{AllocOptions, StorageBackend};
    use crate::kind::Scalar;

    #[test]
    fn test_lossless_round_trip_i32_via_f64() {
        let arr = DataArray::from_slice(&[-40_000i32, 0, 7, 2_000_000], &[4]).unwrap();
        let wide = arr.convert(ElementKind::F64).unwrap();
        assert_eq!(wide.as_slice::<f64>().unwrap(), &[-40_000.0, 0.0, 7.0, 2_000_000.0]);
        let back = wide.convert(ElementKind::I32).unwrap();
        assert_eq!(back.as_slice::<i32>().unwrap(), arr.as_slice::<i32>().unwrap());
    }

    #[test]
    fn test_narrowing_follows_host_cast() {
        let arr = DataArray::from_slice(&[2.9f64, -2.9, 300.0, f64::NAN], &[4]).unwrap();
        let out = arr.convert(ElementKind::U8).unwrap();
        // Truncation toward zero, saturation out of range, NaN to zero.
        assert_eq!(out.as_slice::<u8>().unwrap(), &[2, 0, 255, 0]);

        let out = arr.convert(ElementKind::I32).unwrap();
        assert_eq!(out.as_slice::<i32>().unwrap(), &[2, -2, 300, 0]);
    }

    #[test]
    fn test_double_to_float_loses_precision() {
        // f64 -> f32 -> f64 is not an identity; only the f32-representable
        // part survives.
        let fine = 1.0 + f64::EPSILON;
        let arr = DataArray::from_slice(&[fine], &[1]).unwrap();
        let back = arr
            .convert(ElementKind::F32)
            .unwrap()
            .convert(ElementKind::F64)
            .unwrap();
        assert_eq!(back.as_slice::<f64>().unwrap()[0], 1.0);
    }

    #[test]
    fn test_shape_preserved() {
        let arr = DataArray::zeros(ElementKind::U16, &[3, 5]).unwrap();
        let out = arr.convert(ElementKind::F32).unwrap();
        assert_eq!(out.shape(), &[3, 5]);
        assert_eq!(out.len(), 15);
        assert_eq!(out.kind(), ElementKind::F32);
    }

    #[test]
    fn test_output_resets_blank_flag_and_wcs() {
        let mut arr = DataArray::from_slice(&[1.0f64, f64::NAN], &[2]).unwrap();
        arr.set_any_blank(true);
        arr.set_wcs(Some(crate::array::Wcs::from_bytes(vec![7])));

        let out = arr.convert(ElementKind::F64).unwrap();
        assert!(!out.any_blank());
        assert!(out.wcs().is_none());
        // The caller re-establishes the flag by rescanning.
        assert!(out.has_any_blank());
    }

    #[test]
    fn test_string_identity_only() {
        let mut arr = DataArray::zeros(ElementKind::Str, &[2]).unwrap();
        arr.str_slice_mut().unwrap()[0] = "M81".into();

        let copy = arr.convert(ElementKind::Str).unwrap();
        assert_eq!(copy.str_slice().unwrap()[0], "M81");

        assert!(matches!(
            arr.convert(ElementKind::F64),
            Err(CoreError::UnsupportedConversion { .. })
        ));
        let numeric = DataArray::zeros(ElementKind::F64, &[2]).unwrap();
        assert!(matches!(
            numeric.convert(ElementKind::Str),
            Err(CoreError::UnsupportedConversion { .. })
        ));
    }

    #[test]
    fn test_complex_converts_only_within_complex() {
        let arr = DataArray::from_slice(&[Complex32::new(1.5, -2.5)], &[1]).unwrap();
        let wide = arr.convert(ElementKind::C64).unwrap();
        assert_eq!(
            wide.as_slice::<Complex64>().unwrap()[0],
            Complex64::new(1.5, -2.5)
        );
        let back = wide.convert(ElementKind::C32).unwrap();
        assert_eq!(
            back.as_slice::<Complex32>().unwrap()[0],
            Complex32::new(1.5, -2.5)
        );

        assert!(matches!(
            arr.convert(ElementKind::F32),
            Err(CoreError::UnsupportedConversion { .. })
        ));
        let real = DataArray::zeros(ElementKind::F32, &[1]).unwrap();
        assert!(matches!(
            real.convert(ElementKind::C32),
            Err(CoreError::UnsupportedConversion { .. })
        ));
    }

    #[test]
    fn test_logical_source_but_not_destination() {
        let mut arr = DataArray::zeros(ElementKind::Logical, &[3]).unwrap();
        arr.logical_slice_mut().unwrap().copy_from_slice(&[0, 1, 1]);

        let out = arr.convert(ElementKind::I16).unwrap();
        assert_eq!(out.as_slice::<i16>().unwrap(), &[0, 1, 1]);

        let ints = DataArray::zeros(ElementKind::I16, &[3]).unwrap();
        assert!(matches!(
            ints.convert(ElementKind::Logical),
            Err(CoreError::UnsupportedKind { .. })
        ));
    }

    #[test]
    fn test_mapped_input_yields_mapped_output() {
        let dir = tempfile::tempdir().unwrap();
        let options = AllocOptions {
            mapped: true,
            scratch_dir: Some(dir.path().to_path_buf()),
        };
        let mut arr = DataArray::alloc(ElementKind::I32, &[4], &options).unwrap();
        arr.as_mut_slice::<i32>()
            .unwrap()
            .copy_from_slice(&[1, 2, 3, 4]);

        let path_count;
        {
            let out = arr.convert(ElementKind::F64).unwrap();
            assert_eq!(out.backend(), StorageBackend::Mapped);
            assert_eq!(out.as_slice::<f64>().unwrap(), &[1.0, 2.0, 3.0, 4.0]);
            path_count = std::fs::read_dir(dir.path()).unwrap().count();
            assert_eq!(path_count, 2, "input and output backing files");
        }
        assert_eq!(
            std::fs::read_dir(dir.path()).unwrap().count(),
            1,
            "output backing file removed when the output drops"
        );
    }

    #[test]
    fn test_mapped_complex_widening_stays_mapped() {
        let dir = tempfile::tempdir().unwrap();
        let options = AllocOptions {
            mapped: true,
            scratch_dir: Some(dir.path().to_path_buf()),
        };
        let mut arr = DataArray::alloc(ElementKind::C32, &[2], &options).unwrap();
        arr.as_mut_slice::<Complex32>().unwrap()[1] = Complex32::new(0.5, -0.5);

        let out = arr.convert(ElementKind::C64).unwrap();
        assert_eq!(out.backend(), StorageBackend::Mapped);
        assert_eq!(
            out.as_slice::<Complex64>().unwrap()[1],
            Complex64::new(0.5, -0.5)
        );
    }

    #[test]
    fn test_converted_blanks_become_plain_values() {
        // Conversion is a raw numeric cast; an integer sentinel is carried
        // as its numeric value, not re-encoded as the target's sentinel.
        let mut arr = DataArray::from_slice(&[7i16, 0], &[2]).unwrap();
        arr.as_mut_slice::<i16>().unwrap()[1] = i16::MIN;
        let out = arr.convert(ElementKind::F64).unwrap();
        assert_eq!(out.as_slice::<f64>().unwrap(), &[7.0, -32768.0]);
        assert!(!out.has_any_blank());
    }

    #[test]
    fn test_replace_blanks_then_convert() {
        let mut arr = DataArray::from_slice(&[1.0f64, f64::NAN, 3.0], &[3]).unwrap();
        arr.set_any_blank(true);
        arr.replace_blanks(&Scalar::F64(2.0)).unwrap();
        let out = arr.convert(ElementKind::U8).unwrap();
        assert_eq!(out.as_slice::<u8>().unwrap(), &[1, 2, 3]);
    }
}
