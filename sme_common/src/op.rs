//! Operator boilerplate for transparent `i64` newtypes.
//!
//! The wrapped value is reached through `value()` and rebuilt with `From<i64>`, so any type
//! providing those two can use these arms.

#[macro_export]
macro_rules! op {
    (binary $t:ty, $trait:ident, $method:ident, $op:tt) => {
        impl core::ops::$trait for $t {
            type Output = Self;

            fn $method(self, rhs: Self) -> Self::Output {
                Self::from(self.value() $op rhs.value())
            }
        }
    };
    (inplace $t:ty, $trait:ident, $method:ident, $op:tt) => {
        impl core::ops::$trait for $t {
            fn $method(&mut self, rhs: Self) {
                *self = Self::from(self.value() $op rhs.value());
            }
        }
    };
    (unary $t:ty, $trait:ident, $method:ident, $op:tt) => {
        impl core::ops::$trait for $t {
            type Output = Self;

            fn $method(self) -> Self::Output {
                Self::from($op self.value())
            }
        }
    };
}
