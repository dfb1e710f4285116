/// Declares a `u32` newtype used to index one of the arenas of the program
/// model or of the entity manager.
#[macro_export]
macro_rules! index_type {
    ($(#[$meta:meta])* $vis:vis struct $name:ident;) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
        $vis struct $name(pub u32);

        impl $name {
            #[inline]
            pub fn index(self) -> usize {
                self.0 as usize
            }

            #[inline]
            pub fn from_index(index: usize) -> Self {
                Self(u32::try_from(index).expect(concat!(
                    stringify!($name),
                    " overflowed u32"
                )))
            }
        }
    };
}

/// Builds a `HashSet` from a list of elements, used to state expected
/// points-to sets in tests.
#[cfg(test)]
macro_rules! set {
    [ $( $elem:expr ),* $(,)? ] => {
        [$( $elem ),*]
            .into_iter()
            .collect::<hashbrown::HashSet<_>>()
    };
}

#[cfg(test)]
pub(crate) use set;
