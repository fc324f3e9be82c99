use digit_layout::DigitLayout;
use tensor::{Blob, Tensor};

/// 循环层的初始隐状态与细胞状态，形状均为 `[num_layers * num_directions, batch, hidden_size]`。
pub fn init_hidden(
    num_layers_directions: usize,
    batch: usize,
    hidden_size: usize,
    dt: DigitLayout,
) -> (Tensor<Blob>, Tensor<Blob>) {
    zeros_pair(dt, &[num_layers_directions, batch, hidden_size])
}

/// 单步循环单元的初始状态，形状均为 `[batch, hidden_size]`。
pub fn init_hidden_cell(batch: usize, hidden_size: usize, dt: DigitLayout) -> (Tensor<Blob>, Tensor<Blob>) {
    zeros_pair(dt, &[batch, hidden_size])
}

fn zeros_pair(dt: DigitLayout, shape: &[usize]) -> (Tensor<Blob>, Tensor<Blob>) {
    (Tensor::zeros(dt, shape), Tensor::zeros(dt, shape))
}
