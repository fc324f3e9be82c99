use crate::{Element, Tensor, dispatch};
use half::{bf16, f16};
use std::{fmt, ops::Deref};

pub trait DataFmt {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result;
}

macro_rules! float {
    ($( $ty:ty ),+) => {
        $(
            impl DataFmt for $ty {
                fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                    let val = Element::to_f64(*self);
                    if val == 0. {
                        write!(f, " ________")
                    } else {
                        write!(f, "{val:>9.3e}")
                    }
                }
            }
        )+
    };
}

macro_rules! int {
    ($( $ty:ty ),+) => {
        $(
            impl DataFmt for $ty {
                fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                    if *self == 0 {
                        write!(f, " ________")
                    } else {
                        write!(f, "{self:>6}")
                    }
                }
            }
        )+
    };
}

float!(f16, bf16, f32, f64);
int!(i8, i16, i32, i64, u8, u16, u32, u64);

impl DataFmt for bool {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if *self {
            write!(f, "{:>6}", 1)
        } else {
            write!(f, " ________")
        }
    }
}

/// 按矩阵打印张量，高维张量逐个打印最后两维，零值显示为横线。
pub struct Fmt<'a, T, const N: usize>(pub &'a Tensor<T, N>);

impl<T: Deref<Target = [u8]>, const N: usize> fmt::Display for Fmt<'_, T, N> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let tensor = self.0.as_deref();
        dispatch!(tensor.dt() => {
            E => write_tensor::<E, N>(&tensor, &mut vec![], f),
            _ => write!(f, "<{:?}>", tensor.dt()),
        })
    }
}

fn write_tensor<E: Element + DataFmt, const N: usize>(
    tensor: &Tensor<&[u8], N>,
    indices: &mut Vec<[usize; 2]>,
    f: &mut fmt::Formatter,
) -> fmt::Result {
    let offset = tensor.layout().offset();
    match *tensor.shape() {
        [] => {
            write!(f, "<>")?;
            write_indices(f, indices)?;
            write_matrix::<E>(f, tensor.get(), offset, [1, 1], [0, 0])
        }
        [len] => {
            let &[stride] = tensor.strides() else {
                unreachable!()
            };
            write!(f, "<{len}>")?;
            write_indices(f, indices)?;
            write_matrix::<E>(f, tensor.get(), offset, [len, 1], [stride, 0])
        }
        [rows, cols] => {
            let &[rs, cs] = tensor.strides() else {
                unreachable!()
            };
            write!(f, "<{rows}x{cols}>")?;
            write_indices(f, indices)?;
            write_matrix::<E>(f, tensor.get(), offset, [rows, cols], [rs, cs])
        }
        [batch, ..] => {
            for i in 0..batch {
                indices.push([i, batch]);
                write_tensor::<E, N>(&tensor.clone().index(0, i), indices, f)?;
                indices.pop();
            }
            Ok(())
        }
    }
}

fn write_matrix<E: Element + DataFmt>(
    f: &mut fmt::Formatter,
    data: &[u8],
    offset: isize,
    shape: [usize; 2],
    strides: [isize; 2],
) -> fmt::Result {
    let [rows, cols] = shape;
    let [rs, cs] = strides;
    for r in 0..rows as isize {
        for c in 0..cols as isize {
            let at = (offset + r * rs + c * cs) as usize;
            DataFmt::fmt(&E::read(&data[at..]), f)?;
            write!(f, " ")?;
        }
        writeln!(f)?;
    }
    Ok(())
}

fn write_indices(f: &mut fmt::Formatter, indices: &[[usize; 2]]) -> fmt::Result {
    for &[i, b] in indices {
        write!(f, ", {i}/{b}")?;
    }
    writeln!(f)
}
