//! Weak references into host memory
//!
//! A handle is only an address. The host owns the object and may free it at
//! any time, so handles are compared and stored but never dereferenced here;
//! reads go through [`crate::host::HostAccess`].

use std::fmt;

macro_rules! host_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(usize);

        impl $name {
            /// `None` for a null address.
            pub fn new(address: usize) -> Option<Self> {
                (address != 0).then_some(Self(address))
            }

            pub fn from_ptr<T>(ptr: *const T) -> Option<Self> {
                Self::new(ptr as usize)
            }

            pub fn address(self) -> usize {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({:#x})"), self.0)
            }
        }
    };
}

host_handle!(
    /// `idPlayer*`
    PlayerHandle
);
host_handle!(
    /// `idWeapon*`
    WeaponHandle
);
host_handle!(
    /// Host ammo-count object
    AmmoHandle
);
