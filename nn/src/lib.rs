//! 训练流程中使用的无状态张量工具：带掩码的 softmax、掩码生成、序列填充、循环层状态初始化、类型转换与参数计数。

mod convert;
mod hidden;
mod mask;
mod pad;
mod params;
mod softmax;

pub use convert::{to_float_tensor, to_long_tensor};
pub use hidden::{init_hidden, init_hidden_cell};
pub use mask::{compute_mask, generate_mask};
pub use pad::{PadOptions, Side, pad_sequences};
pub use params::{Module, Parameter, count_parameters};
pub use softmax::{EPSILON, MaskMode, MaskedSoftmax, masked_softmax};
pub use tensor::{Blob, Error, Fmt, Result, Tensor};
