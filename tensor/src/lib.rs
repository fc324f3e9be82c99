mod element;
mod error;
mod fmt;
mod host;
mod transform;

use digit_layout::DigitLayout;
use ndarray_layout::{ArrayLayout, Endian::BigEndian};
use std::ops::Deref;

pub extern crate digit_layout;
pub extern crate half;
pub extern crate ndarray_layout;

pub use element::{Element, dt_from_name, dt_name};
pub use error::{Error, Result};
pub use fmt::Fmt;
pub use host::{Blob, Offsets};

/// 带数据类型与步长布局的张量，`item` 是存储或存储的引用。
#[derive(Clone)]
pub struct Tensor<T, const N: usize = 4> {
    dt: DigitLayout,
    layout: ArrayLayout<N>,
    item: T,
}

impl<const N: usize> Tensor<usize, N> {
    /// 描述一个连续张量，`item` 为所需的字节数。
    pub fn new(dt: DigitLayout, shape: &[usize]) -> Self {
        let element_size = dt.nbytes();
        let layout = ArrayLayout::new_contiguous(shape, BigEndian, element_size);
        let size = layout.num_elements() * element_size;
        Self {
            dt,
            layout,
            item: size,
        }
    }
}

impl<T, const N: usize> Tensor<T, N> {
    pub const fn dt(&self) -> DigitLayout {
        self.dt
    }

    pub fn shape(&self) -> &[usize] {
        self.layout.shape()
    }

    pub fn strides(&self) -> &[isize] {
        self.layout.strides()
    }

    pub const fn layout(&self) -> &ArrayLayout<N> {
        &self.layout
    }

    pub fn ndim(&self) -> usize {
        self.layout.ndim()
    }

    pub fn num_elements(&self) -> usize {
        self.layout.num_elements()
    }

    pub fn take(self) -> T {
        self.item
    }

    pub const fn get(&self) -> &T {
        &self.item
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.item
    }

    pub fn is_contiguous(&self) -> bool {
        if self.layout.ndim() == 0 {
            return self.layout.offset() == 0;
        }
        match self.layout.merge_be(0, self.layout.ndim()) {
            Some(layout) => {
                let &[s] = layout.strides() else {
                    unreachable!()
                };
                s == self.dt.nbytes() as isize && layout.offset() == 0
            }
            None => false,
        }
    }
}

impl<T, const N: usize> Tensor<T, N> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Tensor<U, N> {
        let Self { dt, layout, item } = self;
        Tensor {
            dt,
            layout,
            item: f(item),
        }
    }
}

impl<T: Deref, const N: usize> Tensor<T, N> {
    pub fn as_deref(&self) -> Tensor<&<T as Deref>::Target, N> {
        Tensor {
            dt: self.dt,
            layout: self.layout.clone(),
            item: self.item.deref(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::Tensor;
    use digit_layout::types as ty;

    #[test]
    fn test_new() {
        let t = Tensor::<usize>::new(ty::F32, &[2, 3, 5]);
        assert_eq!(t.shape(), &[2, 3, 5]);
        assert_eq!(t.strides(), &[60, 20, 4]);
        assert_eq!(t.ndim(), 3);
        assert_eq!(t.num_elements(), 30);
        assert_eq!(*t.get(), 120);
        assert!(t.is_contiguous())
    }

    #[test]
    fn test_map() {
        let t = Tensor::<usize>::new(ty::U8, &[4]).map(|size| vec![7u8; size]);
        assert_eq!(t.dt(), ty::U8);
        assert_eq!(t.as_deref().take(), &[7u8; 4][..])
    }
}
