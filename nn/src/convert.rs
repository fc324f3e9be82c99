use crate::Result;
use digit_layout::types;
use std::ops::Deref;
use tensor::{Blob, Tensor};

/// 转换为 `i64` 张量，浮点数向零截断。
pub fn to_long_tensor<T, const N: usize>(array: &Tensor<T, N>) -> Result<Tensor<Blob, N>>
where
    T: Deref<Target = [u8]>,
{
    array.cast(types::I64)
}

/// 转换为 `f32` 张量，布尔值映射为 0 和 1。
pub fn to_float_tensor<T, const N: usize>(array: &Tensor<T, N>) -> Result<Tensor<Blob, N>>
where
    T: Deref<Target = [u8]>,
{
    array.cast(types::F32)
}
