//! Conversions between binding signatures and interpreter values.

use alloc::{boxed::Box, format, vec, vec::Vec};
use tinywasm::types::{ValType, WasmValue};

/// A value that crosses the boundary as a single wasm value
pub trait WasmType: Sized {
    const VAL_TYPE: ValType;

    fn from_wasm_value(value: &WasmValue) -> Option<Self>;
    fn into_wasm_value(self) -> WasmValue;
}

macro_rules! impl_wasm_type {
    ($($t:ty => $variant:ident),*) => {$(
        impl WasmType for $t {
            const VAL_TYPE: ValType = ValType::$variant;

            fn from_wasm_value(value: &WasmValue) -> Option<Self> {
                match value {
                    WasmValue::$variant(value) => Some(*value),
                    _ => None,
                }
            }

            fn into_wasm_value(self) -> WasmValue {
                WasmValue::$variant(self)
            }
        }
    )*};
}

impl_wasm_type!(i32 => I32, i64 => I64, f32 => F32, f64 => F64);

/// The parameters of a binding: `()`, a single value or a tuple
pub trait WasmParams: Sized {
    fn val_types() -> Box<[ValType]>;
    fn from_wasm_values(values: &[WasmValue]) -> tinywasm::Result<Self>;
}

/// The result of a binding: `()` or a single value
pub trait WasmResults {
    fn val_types() -> Box<[ValType]>;
    fn into_wasm_values(self) -> Vec<WasmValue>;
}

fn argument<T: WasmType>(values: &[WasmValue], index: usize) -> tinywasm::Result<T> {
    let value = values
        .get(index)
        .ok_or_else(|| tinywasm::Error::Other(format!("missing argument {index} of {}", values.len())))?;

    T::from_wasm_value(value).ok_or_else(|| {
        tinywasm::Error::Other(format!("argument {index}: expected {:?}, found {:?}", T::VAL_TYPE, value.val_type()))
    })
}

impl<T: WasmType> WasmParams for T {
    fn val_types() -> Box<[ValType]> {
        Box::new([T::VAL_TYPE])
    }

    fn from_wasm_values(values: &[WasmValue]) -> tinywasm::Result<Self> {
        argument(values, 0)
    }
}

impl<T: WasmType> WasmResults for T {
    fn val_types() -> Box<[ValType]> {
        Box::new([T::VAL_TYPE])
    }

    fn into_wasm_values(self) -> Vec<WasmValue> {
        vec![self.into_wasm_value()]
    }
}

impl WasmResults for () {
    fn val_types() -> Box<[ValType]> {
        Box::default()
    }

    fn into_wasm_values(self) -> Vec<WasmValue> {
        Vec::new()
    }
}

macro_rules! impl_wasm_params {
    ($($T:ident $idx:tt),*) => {
        impl<$($T: WasmType),*> WasmParams for ($($T,)*) {
            fn val_types() -> Box<[ValType]> {
                vec![$($T::VAL_TYPE),*].into_boxed_slice()
            }

            #[allow(unused_variables)]
            fn from_wasm_values(values: &[WasmValue]) -> tinywasm::Result<Self> {
                Ok(($(argument::<$T>(values, $idx)?,)*))
            }
        }
    };
}

impl_wasm_params!();
impl_wasm_params!(T1 0, T2 1);
impl_wasm_params!(T1 0, T2 1, T3 2);
impl_wasm_params!(T1 0, T2 1, T3 2, T4 3);
impl_wasm_params!(T1 0, T2 1, T3 2, T4 3, T5 4);
impl_wasm_params!(T1 0, T2 1, T3 2, T4 3, T5 4, T6 5);
impl_wasm_params!(T1 0, T2 1, T3 2, T4 3, T5 4, T6 5, T7 6);

// Value stacks are kept per width: i32 and f32 share one, i64 and f64 another.
fn stack_of(ty: ValType) -> u8 {
    match ty {
        ValType::I32 | ValType::F32 => 0,
        ValType::I64 | ValType::F64 => 1,
        ValType::V128 => 2,
        _ => 3,
    }
}

fn retag(value: &WasmValue, ty: ValType) -> WasmValue {
    match (value, ty) {
        (WasmValue::I32(v), ValType::F32) => WasmValue::F32(f32::from_bits(*v as u32)),
        (WasmValue::F32(v), ValType::I32) => WasmValue::I32(v.to_bits() as i32),
        (WasmValue::I64(v), ValType::F64) => WasmValue::F64(f64::from_bits(*v as u64)),
        (WasmValue::F64(v), ValType::I64) => WasmValue::I64(v.to_bits() as i64),
        (value, _) => *value,
    }
}

/// Put host function arguments back in declaration order
///
/// The interpreter pops them off its value stacks in declaration order, so
/// the arguments sharing a stack arrive reversed and typed by the wrong
/// parameter.
pub(crate) fn declaration_order(types: &[ValType], args: &[WasmValue]) -> Vec<WasmValue> {
    let mut ordered = args.to_vec();
    for stack in 0..4 {
        let slots: Vec<usize> = (0..types.len().min(args.len())).filter(|&i| stack_of(types[i]) == stack).collect();
        for (slot, source) in slots.iter().zip(slots.iter().rev()) {
            ordered[*slot] = retag(&args[*source], types[*slot]);
        }
    }
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_width_arguments_are_reversed() {
        let types = [ValType::I32, ValType::I32, ValType::I32];
        let popped = [WasmValue::I32(3), WasmValue::I32(2), WasmValue::I32(1)];
        let args = declaration_order(&types, &popped);
        assert_eq!(<(i32, i32, i32)>::from_wasm_values(&args).unwrap(), (1, 2, 3));
    }

    #[test]
    fn stacks_are_reordered_independently() {
        // (i32 7, f64 0.5, f32 1.5, i64 9): the 32-bit pair and the 64-bit pair each arrive swapped
        let types = [ValType::I32, ValType::F64, ValType::F32, ValType::I64];
        let popped = [
            WasmValue::I32(1.5f32.to_bits() as i32),
            WasmValue::F64(f64::from_bits(9)),
            WasmValue::F32(f32::from_bits(7)),
            WasmValue::I64(0.5f64.to_bits() as i64),
        ];

        let args = declaration_order(&types, &popped);
        assert_eq!(<(i32, f64, f32, i64)>::from_wasm_values(&args).unwrap(), (7, 0.5, 1.5, 9));
    }

    #[test]
    fn single_arguments_are_untouched() {
        let args = declaration_order(&[ValType::F64], &[WasmValue::F64(2.0)]);
        assert_eq!(f64::from_wasm_values(&args).unwrap(), 2.0);
    }

    #[test]
    fn mismatched_values_are_errors() {
        assert!(i32::from_wasm_values(&[WasmValue::F64(1.0)]).is_err());
        assert!(<(i32, i32)>::from_wasm_values(&[WasmValue::I32(1)]).is_err());
        assert_eq!(<() as WasmResults>::val_types().len(), 0);
        assert_eq!(7i32.into_wasm_values(), vec![WasmValue::I32(7)]);
    }
}
