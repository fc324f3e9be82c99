use digit_layout::{DigitLayout, types};
use half::{bf16, f16};

/// 可以在主机存储上读写的标量类型。
pub trait Element: Copy + Send + Sync + 'static {
    const DT: DigitLayout;
    const IS_FLOAT: bool;

    fn read(bytes: &[u8]) -> Self;
    fn write(self, bytes: &mut [u8]);

    fn to_f64(self) -> f64;
    fn from_f64(val: f64) -> Self;
    fn to_i64(self) -> i64;
    fn from_i64(val: i64) -> Self;

    /// 按 `S` 到 `Self` 的规则转换：涉及浮点时经过 `f64`，整数之间经过 `i64`。
    fn convert<S: Element>(val: S) -> Self {
        if S::IS_FLOAT || Self::IS_FLOAT {
            Self::from_f64(val.to_f64())
        } else {
            Self::from_i64(val.to_i64())
        }
    }
}

macro_rules! primitive {
    ($float:tt; $( $ty:ty => $dt:ident ),+) => {
        $(
            impl Element for $ty {
                const DT: DigitLayout = types::$dt;
                const IS_FLOAT: bool = $float;

                fn read(bytes: &[u8]) -> Self {
                    let mut buf = [0; size_of::<$ty>()];
                    buf.copy_from_slice(&bytes[..size_of::<$ty>()]);
                    <$ty>::from_ne_bytes(buf)
                }

                fn write(self, bytes: &mut [u8]) {
                    bytes[..size_of::<$ty>()].copy_from_slice(&self.to_ne_bytes())
                }

                fn to_f64(self) -> f64 {
                    self as _
                }

                fn from_f64(val: f64) -> Self {
                    val as _
                }

                primitive!(@i64 $float, $ty);
            }
        )+
    };

    (@i64 false, $ty:ty) => {
        fn to_i64(self) -> i64 {
            i64::try_from(self).unwrap_or(i64::MAX)
        }

        fn from_i64(val: i64) -> Self {
            <$ty>::try_from(val).unwrap_or(if val < 0 { <$ty>::MIN } else { <$ty>::MAX })
        }
    };

    (@i64 true, $ty:ty) => {
        fn to_i64(self) -> i64 {
            self as _
        }

        fn from_i64(val: i64) -> Self {
            val as _
        }
    };
}

primitive!(false;
    i8  => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8  => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64
);

primitive!(true;
    f32 => F32,
    f64 => F64
);

macro_rules! half {
    ($( $ty:ident => $dt:ident ),+) => {
        $(
            impl Element for $ty {
                const DT: DigitLayout = types::$dt;
                const IS_FLOAT: bool = true;

                fn read(bytes: &[u8]) -> Self {
                    $ty::from_ne_bytes([bytes[0], bytes[1]])
                }

                fn write(self, bytes: &mut [u8]) {
                    bytes[..2].copy_from_slice(&self.to_ne_bytes())
                }

                fn to_f64(self) -> f64 {
                    $ty::to_f64(self)
                }

                fn from_f64(val: f64) -> Self {
                    $ty::from_f64(val)
                }

                fn to_i64(self) -> i64 {
                    $ty::to_f32(self) as _
                }

                fn from_i64(val: i64) -> Self {
                    $ty::from_f64(val as _)
                }
            }
        )+
    };
}

half!(f16 => F16, bf16 => BF16);

impl Element for bool {
    const DT: DigitLayout = types::Bool;
    const IS_FLOAT: bool = false;

    fn read(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }

    fn write(self, bytes: &mut [u8]) {
        bytes[0] = self as _
    }

    fn to_f64(self) -> f64 {
        if self { 1. } else { 0. }
    }

    fn from_f64(val: f64) -> Self {
        val != 0.
    }

    fn to_i64(self) -> i64 {
        self as _
    }

    fn from_i64(val: i64) -> Self {
        val != 0
    }
}

const NAMED: [(&str, DigitLayout); 13] = [
    ("bool", types::Bool),
    ("i8", types::I8),
    ("i16", types::I16),
    ("i32", types::I32),
    ("i64", types::I64),
    ("u8", types::U8),
    ("u16", types::U16),
    ("u32", types::U32),
    ("u64", types::U64),
    ("f16", types::F16),
    ("bf16", types::BF16),
    ("f32", types::F32),
    ("f64", types::F64),
];

/// 主机端支持的数据类型名，用于配置文件。
pub fn dt_name(dt: DigitLayout) -> Option<&'static str> {
    NAMED.iter().find(|(_, d)| *d == dt).map(|(name, _)| *name)
}

pub fn dt_from_name(name: &str) -> Option<DigitLayout> {
    NAMED.iter().find(|(n, _)| *n == name).map(|(_, dt)| *dt)
}

/// 按运行时数据类型选择 [`Element`] 实现。
#[macro_export]
macro_rules! dispatch {
    ($dt:expr => { $ty:ident => $body:expr, _ => $other:expr $(,)? }) => {
        match $dt {
            $crate::digit_layout::types::Bool => { type $ty = bool; $body }
            $crate::digit_layout::types::I8 => { type $ty = i8; $body }
            $crate::digit_layout::types::I16 => { type $ty = i16; $body }
            $crate::digit_layout::types::I32 => { type $ty = i32; $body }
            $crate::digit_layout::types::I64 => { type $ty = i64; $body }
            $crate::digit_layout::types::U8 => { type $ty = u8; $body }
            $crate::digit_layout::types::U16 => { type $ty = u16; $body }
            $crate::digit_layout::types::U32 => { type $ty = u32; $body }
            $crate::digit_layout::types::U64 => { type $ty = u64; $body }
            $crate::digit_layout::types::F16 => { type $ty = $crate::half::f16; $body }
            $crate::digit_layout::types::BF16 => { type $ty = $crate::half::bf16; $body }
            $crate::digit_layout::types::F32 => { type $ty = f32; $body }
            $crate::digit_layout::types::F64 => { type $ty = f64; $body }
            _ => $other,
        }
    };
}
