use crate::{Error, Result, Tensor};
use ndarray_layout::ArrayLayout;

impl<T, const N: usize> Tensor<T, N> {
    pub fn broadcast(self, axis: usize, times: usize) -> Self {
        self.map_layout(|l| l.broadcast(axis, times))
    }

    pub fn slice(self, axis: usize, start: usize, len: usize) -> Self {
        self.map_layout(|l| l.slice(axis, start, 1, len))
    }

    pub fn index(self, axis: usize, index: usize) -> Self {
        self.map_layout(|l| l.index(axis, index))
    }

    /// 按 NumPy 规则把张量广播到 `shape`：尾部对齐，长度为 1 的维度被拉伸，缺失的前导维度被补齐。
    pub fn broadcast_to(self, shape: &[usize]) -> Result<Self> {
        let src = self.layout.shape();
        let incompatible = || {
            Error::invalid(format!(
                "shape {src:?} cannot be broadcast to {shape:?}"
            ))
        };
        if src.len() > shape.len() {
            return Err(incompatible());
        }

        let lead = shape.len() - src.len();
        let mut strides = vec![0isize; shape.len()];
        for (i, (&d, &s)) in src.iter().zip(self.layout.strides()).enumerate() {
            strides[lead + i] = match shape[lead + i] {
                n if n == d => s,
                _ if d == 1 => 0,
                _ => return Err(incompatible()),
            }
        }

        let layout = ArrayLayout::new(shape, &strides, self.layout.offset());
        Ok(self.map_layout(|_| layout))
    }

    fn map_layout(mut self, f: impl FnOnce(&ArrayLayout<N>) -> ArrayLayout<N>) -> Self {
        self.layout = f(&self.layout);
        self
    }
}
