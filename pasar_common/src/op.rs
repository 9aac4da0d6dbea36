//! Operator boilerplate for integer newtype wrappers.
//!
//! The std::ops trait being implemented must be in scope at the call site.

#[macro_export]
macro_rules! op {
    (binary $t:ty, $imp:ident, $method:ident) => {
        impl $imp for $t {
            type Output = Self;

            fn $method(self, rhs: Self) -> Self::Output {
                Self($imp::$method(self.0, rhs.0))
            }
        }
    };
    (inplace $t:ty, $imp:ident, $method:ident) => {
        impl $imp for $t {
            fn $method(&mut self, rhs: Self) {
                $imp::$method(&mut self.0, rhs.0)
            }
        }
    };
    (unary $t:ty, $imp:ident, $method:ident) => {
        impl $imp for $t {
            type Output = Self;

            fn $method(self) -> Self::Output {
                Self($imp::$method(self.0))
            }
        }
    };
}
