use crate::{Error, Result};
use digit_layout::types;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::ops::Deref;
use tensor::{Blob, Tensor};

/// 归一化分母的修正量，全遮蔽的切片因此输出 0 而非 NaN。
pub const EPSILON: f64 = 1e-6;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaskMode {
    /// 指数前后各乘一次掩码，被遮蔽的位置以 0 参与求最大值。
    #[default]
    Multiply,
    /// 求最大值前将被遮蔽的位置替换为负无穷。
    NegInfinity,
}

/// 沿 `axis` 的数值稳定 softmax，可选掩码中非零表示保留。
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MaskedSoftmax {
    pub axis: isize,
    pub mode: MaskMode,
}

impl Default for MaskedSoftmax {
    fn default() -> Self {
        Self {
            axis: -1,
            mode: MaskMode::default(),
        }
    }
}

impl MaskedSoftmax {
    pub fn forward<const N: usize>(
        &self,
        scores: &Tensor<&[u8], N>,
        mask: Option<&Tensor<&[u8], N>>,
    ) -> Result<Tensor<Blob, N>> {
        let &Self { axis, mode } = self;

        let dt = scores.dt();
        if !matches!(dt, types::F16 | types::BF16 | types::F32 | types::F64) {
            return Err(Error::UnsupportedType(dt));
        }
        let shape = scores.shape();
        let axis = normalize_axis(axis, shape.len())?;
        tracing::trace!(?shape, axis, ?mode, masked = mask.is_some(), "softmax");

        let x = scores.to_f64_vec()?;
        let keep = mask
            .map(|mask| -> Result<Vec<f64>> {
                let mask = mask.clone().broadcast_to(shape)?.to_f64_vec()?;
                Ok(mask
                    .into_iter()
                    .map(|m| if m != 0. { 1. } else { 0. })
                    .collect())
            })
            .transpose()?;

        let scheme = Scheme {
            outer: shape[..axis].iter().product(),
            len: shape[axis],
            inner: shape[axis + 1..].iter().product(),
        };

        let mut y = vec![0.; x.len()];
        let mut fully_masked = 0usize;
        for idx in scheme.slices() {
            let x_ = idx.iter().map(|&i| x[i]).collect::<Vec<_>>();
            let keep_ = keep
                .as_ref()
                .map(|keep| idx.iter().map(|&i| keep[i]).collect::<Vec<_>>());
            if keep_.as_ref().is_some_and(|k| k.iter().all(|&k| k == 0.)) {
                fully_masked += 1
            }
            for (&i, p) in idx.iter().zip_eq(normalize(mode, &x_, keep_.as_deref())) {
                y[i] = p
            }
        }
        if fully_masked > 0 {
            tracing::debug!(fully_masked, "fully masked slices normalized to zeros")
        }

        Tensor::from_slice(shape, &y)?.cast(dt)
    }
}

/// 以默认的 [`MaskMode::Multiply`] 计算 softmax。
pub fn masked_softmax<T, const N: usize>(
    scores: &Tensor<T, N>,
    mask: Option<&Tensor<Blob, N>>,
    axis: isize,
) -> Result<Tensor<Blob, N>>
where
    T: Deref<Target = [u8]>,
{
    let mask = mask.map(|m| m.as_deref());
    MaskedSoftmax {
        axis,
        ..Default::default()
    }
    .forward(&scores.as_deref(), mask.as_ref())
}

pub(crate) fn normalize_axis(axis: isize, ndim: usize) -> Result<usize> {
    if ndim == 0 {
        return Err(Error::invalid("softmax needs at least one dimension"));
    }
    let n = ndim as isize;
    if !(-n..n).contains(&axis) {
        return Err(Error::invalid(format!(
            "axis {axis} out of range for {ndim} dimensions"
        )));
    }
    Ok(axis.rem_euclid(n) as usize)
}

/// 将张量视为 `[outer, len, inner]`，沿中间维归一化。
struct Scheme {
    outer: usize,
    len: usize,
    inner: usize,
}

impl Scheme {
    fn slices(&self) -> impl Iterator<Item = Vec<usize>> {
        let &Self { outer, len, inner } = self;
        (0..outer * inner).map(move |i| {
            let base = i / inner * len * inner + i % inner;
            (0..len).map(|k| base + k * inner).collect()
        })
    }
}

fn normalize(mode: MaskMode, x: &[f64], keep: Option<&[f64]>) -> Vec<f64> {
    let masked = match (mode, keep) {
        (_, None) => x.to_vec(),
        // 被遮蔽的位置直接置 0，负无穷乘 0 会得到 NaN
        (MaskMode::Multiply, Some(keep)) => x
            .iter()
            .zip_eq(keep)
            .map(|(&x, &k)| if k == 0. { 0. } else { x })
            .collect(),
        (MaskMode::NegInfinity, Some(keep)) => x
            .iter()
            .zip_eq(keep)
            .map(|(&x, &k)| if k == 0. { f64::NEG_INFINITY } else { x })
            .collect(),
    };

    let Some(max) = masked.iter().copied().max_by(f64::total_cmp) else {
        return vec![];
    };
    // 整个切片为负无穷时 exp(x - max) 为 NaN
    let mut e = if max == f64::NEG_INFINITY {
        vec![0.; masked.len()]
    } else {
        masked.iter().map(|x| (x - max).exp()).collect::<Vec<_>>()
    };
    if let Some(keep) = keep {
        for (e, k) in e.iter_mut().zip_eq(keep) {
            *e *= k
        }
    }

    let sum = e.iter().sum::<f64>() + EPSILON;
    e.into_iter().map(|e| e / sum).collect()
}

#[cfg(test)]
mod test {
    use super::{MaskMode, MaskedSoftmax, masked_softmax};
    use crate::Error;
    use digit_layout::types as ty;
    use tensor::{Blob, Tensor, half::f16};

    fn assert_close(actual: &[f64], expected: &[f64], tol: f64) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() <= tol, "{actual:?} != {expected:?}")
        }
    }

    #[test]
    fn test_no_mask() {
        let x = Tensor::<Blob>::from_slice(&[1, 3], &[1.0f32, 2., 3.]).unwrap();
        let y = masked_softmax(&x, None, -1).unwrap();
        assert_eq!(y.dt(), ty::F32);
        assert_eq!(y.shape(), &[1, 3]);
        assert_close(
            &y.to_f64_vec().unwrap(),
            &[0.0900, 0.2447, 0.6652],
            1e-4,
        )
    }

    #[test]
    fn test_mask() {
        let x = Tensor::<Blob>::from_slice(&[1, 3], &[1.0f32, 2., 3.]).unwrap();
        let m = Tensor::<Blob>::from_slice(&[1, 3], &[1i64, 0, 1]).unwrap();
        let y = masked_softmax(&x, Some(&m), -1).unwrap().to_vec::<f32>().unwrap();
        assert_eq!(y[1], 0.);
        assert_close(
            &y.iter().map(|&y| y as f64).collect::<Vec<_>>(),
            &[0.1192, 0., 0.8808],
            1e-4,
        )
    }

    #[test]
    fn test_masked_neg_infinity() {
        let x = Tensor::<Blob>::from_slice(&[3], &[1.0f64, f64::NEG_INFINITY, 3.]).unwrap();
        let m = Tensor::<Blob>::from_slice(&[3], &[1u8, 0, 1]).unwrap();
        for mode in [MaskMode::Multiply, MaskMode::NegInfinity] {
            let y = MaskedSoftmax { axis: -1, mode }
                .forward(&x.as_deref(), Some(&m.as_deref()))
                .unwrap()
                .to_vec::<f64>()
                .unwrap();
            assert!(y.iter().all(|y| y.is_finite()), "{y:?}");
            assert_eq!(y[1], 0.);
            assert_close(&y, &[0.1192, 0., 0.8808], 1e-4)
        }
    }

    #[test]
    fn test_mask_values_are_boolean() {
        let x = Tensor::<Blob>::from_slice(&[3], &[1.0f64, 2., 3.]).unwrap();
        let ones = Tensor::<Blob>::from_slice(&[3], &[1u8, 0, 1]).unwrap();
        let weights = Tensor::<Blob>::from_slice(&[3], &[7u8, 0, 0xff]).unwrap();
        assert_eq!(
            masked_softmax(&x, Some(&ones), 0).unwrap().to_vec::<f64>().unwrap(),
            masked_softmax(&x, Some(&weights), 0).unwrap().to_vec::<f64>().unwrap(),
        )
    }

    #[test]
    fn test_fully_masked() {
        let x = Tensor::<Blob>::from_slice(&[2, 2], &[4.0f32, -3., 0.5, 9.]).unwrap();
        let m = Tensor::<Blob>::from_slice(&[2, 2], &[false, false, true, true]).unwrap();
        for mode in [MaskMode::Multiply, MaskMode::NegInfinity] {
            let y = MaskedSoftmax { axis: 1, mode }
                .forward(&x.as_deref(), Some(&m.as_deref()))
                .unwrap()
                .to_vec::<f32>()
                .unwrap();
            assert_eq!(&y[..2], &[0., 0.]);
            assert!((y[2] + y[3] - 1.).abs() < 1e-5)
        }
    }

    #[test]
    fn test_broadcast_mask() {
        let x = Tensor::<Blob>::from_slice(&[2, 3], &[0.0f64, 1., 2., 5., 5., 5.]).unwrap();
        let m = Tensor::<Blob>::from_slice(&[2], &[1i32, 0]).unwrap();
        let y = masked_softmax(&x, Some(&m), -1);
        assert!(matches!(y, Err(Error::InvalidArgument(_))));

        let m = Tensor::<Blob>::from_slice(&[1, 3], &[1i32, 1, 0]).unwrap();
        let y = masked_softmax(&x, Some(&m), -1).unwrap().to_vec::<f64>().unwrap();
        assert_eq!(y[2], 0.);
        assert_eq!(y[5], 0.);
        assert!((y[3] - 0.5).abs() < 1e-6);
        assert!((y[0] + y[1] - 1.).abs() < 1e-5)
    }

    #[test]
    fn test_axis() {
        let x = Tensor::<Blob>::from_slice(&[2, 2], &[0.0f64, 10., 0., -10.]).unwrap();
        let y = masked_softmax(&x, None, 0).unwrap().to_vec::<f64>().unwrap();
        assert!((y[0] - 0.5).abs() < 1e-6);
        assert!((y[2] - 0.5).abs() < 1e-6);
        assert!((y[1] + y[3] - 1.).abs() < 1e-5);
        assert!(y[1] > 0.999);

        let y_ = masked_softmax(&x, None, -2).unwrap().to_vec::<f64>().unwrap();
        assert_eq!(y, y_)
    }

    #[test]
    fn test_invalid() {
        let x = Tensor::<Blob>::from_slice(&[2, 3], &[0.0f32; 6]).unwrap();
        for axis in [2, -3] {
            assert!(matches!(
                masked_softmax(&x, None, axis),
                Err(Error::InvalidArgument(_))
            ))
        }

        let m = Tensor::<Blob>::zeros(ty::U8, &[3, 2]);
        assert!(matches!(
            masked_softmax(&x, Some(&m), -1),
            Err(Error::InvalidArgument(_))
        ));

        let scalar = Tensor::<Blob>::full(&[], 1.0f32);
        assert!(matches!(
            masked_softmax(&scalar, None, 0),
            Err(Error::InvalidArgument(_))
        ));

        let ints = Tensor::<Blob>::zeros(ty::I32, &[3]);
        assert!(matches!(
            masked_softmax(&ints, None, -1),
            Err(Error::UnsupportedType(_))
        ))
    }

    #[test]
    fn test_half() {
        let x = Tensor::<Blob>::from_slice(
            &[3],
            &[f16::from_f32(1.), f16::from_f32(2.), f16::from_f32(3.)],
        )
        .unwrap();
        let y = masked_softmax(&x, None, 0).unwrap();
        assert_eq!(y.dt(), ty::F16);
        let y = y.to_f64_vec().unwrap();
        assert!((y.iter().sum::<f64>() - 1.).abs() < 1e-2);
        assert!((y[2] - 0.6652).abs() < 1e-3)
    }

    #[test]
    fn test_mode_divergence() {
        // 保留的分数都远小于 0 时，乘法掩码让被遮蔽的 0 成为最大值，指数全部下溢
        let x = Tensor::<Blob>::from_slice(&[3], &[-1000.0f64, -1001., 5.]).unwrap();
        let m = Tensor::<Blob>::from_slice(&[3], &[1u8, 1, 0]).unwrap();

        let multiply = masked_softmax(&x, Some(&m), -1).unwrap().to_vec::<f64>().unwrap();
        assert_eq!(multiply, [0., 0., 0.]);

        let sentinel = MaskedSoftmax {
            axis: -1,
            mode: MaskMode::NegInfinity,
        }
        .forward(&x.as_deref(), Some(&m.as_deref()))
        .unwrap()
        .to_vec::<f64>()
        .unwrap();
        assert!((sentinel[0] - 0.7311).abs() < 1e-4);
        assert!((sentinel[1] - 0.2689).abs() < 1e-4);
        assert_eq!(sentinel[2], 0.)
    }

    #[test]
    fn test_modes_agree_on_moderate_scores() {
        let x = Tensor::<Blob>::from_slice(&[2, 3], &[0.5f64, 2., 1., 3., 0.25, 4.]).unwrap();
        let m = Tensor::<Blob>::from_slice(&[2, 3], &[1u8, 0, 1, 1, 1, 0]).unwrap();
        let a = masked_softmax(&x, Some(&m), -1).unwrap().to_vec::<f64>().unwrap();
        let b = MaskedSoftmax {
            axis: -1,
            mode: MaskMode::NegInfinity,
        }
        .forward(&x.as_deref(), Some(&m.as_deref()))
        .unwrap()
        .to_vec::<f64>()
        .unwrap();
        for (a, b) in a.iter().zip(&b) {
            assert!((a - b).abs() < 1e-5)
        }
    }

    #[test]
    fn test_input_untouched() {
        let x = Tensor::<Blob>::from_slice(&[3], &[1.0f32, 2., 3.]).unwrap();
        let m = Tensor::<Blob>::from_slice(&[3], &[1u8, 0, 1]).unwrap();
        let _ = masked_softmax(&x, Some(&m), -1).unwrap();
        assert_eq!(x.to_vec::<f32>().unwrap(), [1., 2., 3.]);
        assert_eq!(m.to_vec::<u8>().unwrap(), [1, 0, 1])
    }
}
