macro_rules! impl_id {
    ($name:ident) => {
        impl $name {
            #[doc = concat!("Creates a `", stringify!($name), "`.")]
            #[inline]
            pub const fn new(n: u16) -> $name {
                $name(n)
            }

            /// Returns the value as a primitive.
            #[inline]
            pub const fn get(self) -> u16 {
                self.0
            }
        }

        impl From<u16> for $name {
            #[inline]
            fn from(n: u16) -> $name {
                $name(n)
            }
        }

        crate::utils::delegate_fmt!($name);
    };
}
