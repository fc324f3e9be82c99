use crate::{Element, Error, Result, Tensor, dispatch};
use digit_layout::DigitLayout;
use itertools::Itertools;
use std::ops::{Deref, DerefMut};

/// 主机存储。
pub type Blob = Box<[u8]>;

impl<const N: usize> Tensor<Blob, N> {
    pub fn zeros(dt: DigitLayout, shape: &[usize]) -> Self {
        Tensor::new(dt, shape).map(|size| vec![0u8; size].into_boxed_slice())
    }

    pub fn full<E: Element>(shape: &[usize], val: E) -> Self {
        let mut ans = Self::zeros(E::DT, shape);
        for bytes in ans.item.chunks_exact_mut(E::DT.nbytes()) {
            val.write(bytes)
        }
        ans
    }

    pub fn from_slice<E: Element>(shape: &[usize], data: &[E]) -> Result<Self> {
        let mut ans = Self::zeros(E::DT, shape);
        if ans.num_elements() != data.len() {
            return Err(Error::invalid(format!(
                "{} elements cannot fill shape {shape:?}",
                data.len()
            )));
        }
        for (bytes, &val) in ans.item.chunks_exact_mut(E::DT.nbytes()).zip(data) {
            val.write(bytes)
        }
        Ok(ans)
    }

    /// 已连续则原样返回，否则复制为连续存储。
    pub fn into_contiguous(self) -> Self {
        if self.is_contiguous() {
            return self;
        }
        let mut ans = Self::zeros(self.dt, self.layout.shape());
        let size = self.dt.nbytes();
        for (dst, src) in ans.item.chunks_exact_mut(size).zip_eq(self.offsets()) {
            dst.copy_from_slice(&self.item[src..][..size])
        }
        ans
    }
}

impl<T: Deref<Target = [u8]>, const N: usize> Tensor<T, N> {
    /// 按行优先顺序遍历每个元素的字节偏移。
    pub fn offsets(&self) -> Offsets {
        Offsets::new(
            self.layout.shape(),
            self.layout.strides(),
            self.layout.offset(),
        )
    }

    pub fn read<E: Element>(&self, indices: &[usize]) -> Result<E> {
        self.check_dt::<E>()?;
        let shape = self.layout.shape();
        if indices.len() != shape.len() || indices.iter().zip(shape).any(|(i, d)| i >= d) {
            return Err(Error::invalid(format!(
                "index {indices:?} out of range for shape {shape:?}"
            )));
        }
        let offset = indices
            .iter()
            .zip(self.layout.strides())
            .fold(self.layout.offset(), |acc, (&i, &s)| acc + i as isize * s);
        Ok(E::read(&self.item[offset as usize..]))
    }

    pub fn to_vec<E: Element>(&self) -> Result<Vec<E>> {
        self.check_dt::<E>()?;
        Ok(self
            .offsets()
            .map(|offset| E::read(&self.item[offset..]))
            .collect())
    }

    /// 将任意受支持类型的元素读为 `f64`。
    pub fn to_f64_vec(&self) -> Result<Vec<f64>> {
        dispatch!(self.dt => {
            E => Ok(self
                .offsets()
                .map(|offset| E::read(&self.item[offset..]).to_f64())
                .collect()),
            _ => Err(Error::UnsupportedType(self.dt)),
        })
    }

    /// 转换为 `dt` 类型的连续张量。
    pub fn cast(&self, dt: DigitLayout) -> Result<Tensor<Blob, N>> {
        let mut ans = Tensor::<Blob, N>::zeros(dt, self.layout.shape());
        dispatch!(self.dt => {
            S => dispatch!(dt => {
                D => {
                    for (bytes, offset) in ans
                        .item
                        .chunks_exact_mut(dt.nbytes())
                        .zip_eq(self.offsets())
                    {
                        D::convert(S::read(&self.item[offset..])).write(bytes)
                    }
                    Ok(ans)
                },
                _ => Err(Error::UnsupportedType(dt)),
            }),
            _ => Err(Error::UnsupportedType(self.dt)),
        })
    }

    fn check_dt<E: Element>(&self) -> Result<()> {
        if self.dt == E::DT {
            Ok(())
        } else {
            Err(Error::TypeMismatch {
                expected: E::DT,
                actual: self.dt,
            })
        }
    }
}

impl<T: DerefMut<Target = [u8]>, const N: usize> Tensor<T, N> {
    pub fn write<E: Element>(&mut self, indices: &[usize], val: E) -> Result<()> {
        self.as_deref().read::<E>(indices)?;
        let offset = indices
            .iter()
            .zip(self.layout.strides())
            .fold(self.layout.offset(), |acc, (&i, &s)| acc + i as isize * s);
        val.write(&mut self.item[offset as usize..]);
        Ok(())
    }
}

/// 步长布局的字节偏移迭代器。
pub struct Offsets {
    shape: Vec<usize>,
    strides: Vec<isize>,
    idx: Vec<usize>,
    next: Option<isize>,
}

impl Offsets {
    fn new(shape: &[usize], strides: &[isize], offset: isize) -> Self {
        Self {
            shape: shape.to_vec(),
            strides: strides.to_vec(),
            idx: vec![0; shape.len()],
            next: if shape.contains(&0) {
                None
            } else {
                Some(offset)
            },
        }
    }
}

impl Iterator for Offsets {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;

        self.next = None;
        let mut offset = current;
        for i in (0..self.shape.len()).rev() {
            self.idx[i] += 1;
            offset += self.strides[i];
            if self.idx[i] < self.shape[i] {
                self.next = Some(offset);
                break;
            }
            offset -= self.strides[i] * self.shape[i] as isize;
            self.idx[i] = 0
        }

        Some(current as usize)
    }
}
