use crate::{Error, Result};
use std::ops::Deref;
use tensor::{Blob, Element, Tensor, dispatch};

/// 非填充位置为 1.0、填充位置为 0.0 的 `f32` 掩码，形状与 `v` 相同。
///
/// 整数类型按 `i64` 比较，浮点类型按 `f64` 比较。
pub fn compute_mask<T, const N: usize>(v: &Tensor<T, N>, padding_idx: i64) -> Result<Tensor<Blob, N>>
where
    T: Deref<Target = [u8]>,
{
    let mask = dispatch!(v.dt() => {
        E => v
            .to_vec::<E>()?
            .into_iter()
            .map(|x| {
                let padding = if E::IS_FLOAT {
                    x.to_f64() == padding_idx as f64
                } else {
                    x.to_i64() == padding_idx
                };
                if padding { 0.0f32 } else { 1. }
            })
            .collect::<Vec<_>>(),
        _ => return Err(Error::UnsupportedType(v.dt())),
    });
    Tensor::from_slice(v.shape(), &mask)
}

/// 由打包序列的逐步批大小生成 `[n_steps, batch]` 的时间优先掩码。
///
/// `batch_sizes[t]` 是第 `t` 步仍未结束的序列数，必须非零且不增。
pub fn generate_mask(batch_sizes: &[usize]) -> Result<Tensor<Blob>> {
    if let Some(t) = batch_sizes.iter().position(|&n| n == 0) {
        return Err(Error::invalid(format!("batch size at step {t} is zero")));
    }
    if let Some(t) = batch_sizes.windows(2).position(|w| w[1] > w[0]) {
        return Err(Error::invalid(format!(
            "batch sizes must not increase, got {} after {} at step {}",
            batch_sizes[t + 1],
            batch_sizes[t],
            t + 1
        )));
    }

    let n_steps = batch_sizes.len();
    let batch = batch_sizes.first().copied().unwrap_or(0);
    let mask = batch_sizes
        .iter()
        .flat_map(|&n| (0..batch).map(move |b| if b < n { 1.0f32 } else { 0. }))
        .collect::<Vec<_>>();
    tracing::trace!(n_steps, batch, "generate mask");
    Tensor::from_slice(&[n_steps, batch], &mask)
}
