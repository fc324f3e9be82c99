use crate::{Error, Result};
use digit_layout::{DigitLayout, types};
use serde::{Deserialize, Serialize};
use std::{ops::Deref, str::FromStr};
use tensor::{Blob, Tensor};

/// 填充或截断发生在序列的哪一端。
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    #[default]
    Pre,
    Post,
}

impl FromStr for Side {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pre" => Ok(Self::Pre),
            "post" => Ok(Self::Post),
            _ => Err(Error::invalid(format!("side \"{s}\" not understood"))),
        }
    }
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PadOptions {
    /// 缺省为最长序列的长度。
    pub maxlen: Option<usize>,
    #[serde(with = "dtype")]
    pub dtype: DigitLayout,
    pub padding: Side,
    pub truncating: Side,
    pub value: f64,
}

impl Default for PadOptions {
    fn default() -> Self {
        Self {
            maxlen: None,
            dtype: types::I32,
            padding: Side::Pre,
            truncating: Side::Pre,
            value: 0.,
        }
    }
}

/// 将 `[len, ..sample]` 形状的序列对齐为 `[n, maxlen, ..sample]`。
///
/// 样本形状取自第一个非空序列，空序列只包含填充值。
pub fn pad_sequences<T, const N: usize>(
    sequences: &[Tensor<T, N>],
    options: &PadOptions,
) -> Result<Tensor<Blob, N>>
where
    T: Deref<Target = [u8]>,
{
    let &PadOptions {
        maxlen,
        dtype,
        padding,
        truncating,
        value,
    } = options;

    let mut lengths = Vec::with_capacity(sequences.len());
    for (i, seq) in sequences.iter().enumerate() {
        match seq.shape().first() {
            Some(&len) => lengths.push(len),
            None => return Err(Error::invalid(format!("sequence at position {i} is a scalar"))),
        }
    }
    let maxlen = maxlen.unwrap_or_else(|| lengths.iter().copied().max().unwrap_or(0));

    let sample = sequences
        .iter()
        .zip(&lengths)
        .find(|(_, len)| **len > 0)
        .map_or(&[][..], |(seq, _)| &seq.shape()[1..]);

    let mut shape = vec![sequences.len(), maxlen];
    shape.extend_from_slice(sample);

    // 用类型转换得到填充值在目标类型下的字节
    let fill = Tensor::<Blob, N>::full(&[], value).cast(dtype)?.take();
    let mut ans = Tensor::<Blob, N>::zeros(dtype, &shape);
    let step = sample.iter().product::<usize>() * dtype.nbytes();
    let row = maxlen * step;
    for bytes in ans.get_mut().chunks_exact_mut(fill.len()) {
        bytes.copy_from_slice(&fill)
    }

    let mut truncated = 0usize;
    for (i, (seq, &len)) in sequences.iter().zip(&lengths).enumerate() {
        if len == 0 {
            continue;
        }
        if &seq.shape()[1..] != sample {
            return Err(Error::invalid(format!(
                "shape of sample {:?} of sequence at position {i} is different from expected shape {sample:?}",
                &seq.shape()[1..],
            )));
        }

        let kept = len.min(maxlen);
        if kept < len {
            truncated += 1
        }
        let skip = match truncating {
            Side::Pre => len - kept,
            Side::Post => 0,
        };
        let at = match padding {
            Side::Pre => maxlen - kept,
            Side::Post => 0,
        };

        let data = seq.cast(dtype)?.take();
        let dst = &mut ans.get_mut()[i * row..][at * step..][..kept * step];
        dst.copy_from_slice(&data[skip * step..][..kept * step])
    }
    if truncated > 0 {
        tracing::debug!(truncated, maxlen, "sequences truncated while padding")
    }

    Ok(ans)
}

mod dtype {
    use digit_layout::DigitLayout;
    use serde::{Deserialize, Deserializer, Serializer, de, ser};
    use tensor::{dt_from_name, dt_name};

    pub fn serialize<S: Serializer>(dt: &DigitLayout, s: S) -> Result<S::Ok, S::Error> {
        match dt_name(*dt) {
            Some(name) => s.serialize_str(name),
            None => Err(<S::Error as ser::Error>::custom(format!(
                "unsupported data type {dt:?}"
            ))),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DigitLayout, D::Error> {
        let name = String::deserialize(d)?;
        dt_from_name(&name).ok_or_else(|| {
            <D::Error as de::Error>::custom(format!("unknown data type \"{name}\""))
        })
    }
}
