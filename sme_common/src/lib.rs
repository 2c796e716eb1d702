mod krw;

pub mod helpers;
pub mod op;

pub use krw::{Krw, KrwConversionError, KRW_CURRENCY_CODE, KRW_CURRENCY_CODE_LOWER};
