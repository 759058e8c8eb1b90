//! Index types. See [`::index_vec`].

pub use index_vec::{Idx, IndexSlice, IndexVec, index_vec};

/// Creates a new index to use with [`::index_vec`]. Indices are backed by `NonZero<u32>` so that
/// `Option<Index>` stays four bytes wide.
#[macro_export]
macro_rules! newtype_index {
    () => {};
    ($(#[$attr:meta])* $vis:vis struct $name:ident; $($rest:tt)*) => {
        $(#[$attr])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[repr(transparent)]
        $vis struct $name(std::num::NonZero<u32>);

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}({:?})", stringify!($name), self.get())
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.get())
            }
        }

        impl $crate::index::Idx for $name {
            #[inline(always)]
            fn from_usize(value: usize) -> Self {
                let value = u32::try_from(value).expect("index overflowed");
                Self::new(value)
            }

            #[inline(always)]
            fn index(self) -> usize {
                self.get() as usize
            }
        }

        impl $name {
            #[inline(always)]
            $vis const fn new(value: u32) -> Self {
                let inner_repr = value.checked_add(1).expect("index overflowed");
                Self(std::num::NonZero::new(inner_repr).expect("inner_repr should never be zero"))
            }

            #[inline(always)]
            $vis const fn get(self) -> u32 {
                self.0.get() - 1
            }
        }

        $crate::newtype_index!($($rest)*);
    };
}

newtype_index! {
    /// Function of the contract, constructor and fallback included.
    pub struct FunctionId;
    /// Parameter or local variable, numbered per function.
    pub struct LocalId;
    pub struct StorageId;
    pub struct ImmutableId;
    pub struct EventId;
}

#[cfg(test)]
mod tests {
    use super::*;

    newtype_index!(
        struct MyIndex;
    );

    #[test]
    fn test_newtype_index() {
        assert_eq!(MyIndex::new(0).get(), 0);
        assert_eq!(MyIndex::new(1).get(), 1);
        assert_eq!(MyIndex::new(0xFFFF_FF00).get(), 0xFFFF_FF00);
        assert_eq!(LocalId::from_usize(7).index(), 7);
    }

    #[test]
    fn test_index_size() {
        assert_eq!(std::mem::size_of::<MyIndex>(), 4);
        assert_eq!(std::mem::size_of::<Option<MyIndex>>(), 4);
        assert_eq!(std::mem::size_of::<FunctionId>(), 4);
        assert_eq!(std::mem::size_of::<Option<LocalId>>(), 4);
    }
}
