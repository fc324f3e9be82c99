use tensor::{Blob, Tensor};

/// 模型参数。
pub struct Parameter {
    pub name: String,
    pub value: Tensor<Blob>,
    pub requires_grad: bool,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: Tensor<Blob>) -> Self {
        Self {
            name: name.into(),
            value,
            requires_grad: true,
        }
    }

    /// 冻结参数，不再计入可训练参数。
    pub fn frozen(mut self) -> Self {
        self.requires_grad = false;
        self
    }

    pub fn numel(&self) -> usize {
        self.value.shape().iter().product()
    }
}

pub trait Module {
    fn parameters(&self) -> Vec<&Parameter>;
}

impl Module for [Parameter] {
    fn parameters(&self) -> Vec<&Parameter> {
        self.iter().collect()
    }
}

impl Module for Vec<Parameter> {
    fn parameters(&self) -> Vec<&Parameter> {
        self.as_slice().parameters()
    }
}

/// 需要梯度的参数的元素总数。
pub fn count_parameters<M: Module + ?Sized>(module: &M) -> usize {
    let (trainable, frozen) = module
        .parameters()
        .into_iter()
        .partition::<Vec<_>, _>(|p| p.requires_grad);
    if !frozen.is_empty() {
        tracing::trace!(
            frozen = ?frozen.iter().map(|p| &p.name).collect::<Vec<_>>(),
            "skip frozen parameters"
        )
    }
    trainable.iter().map(|p| p.numel()).sum()
}
