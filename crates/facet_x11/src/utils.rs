/// Number of bytes needed to align `len` to 4
pub(crate) fn pad(len: usize) -> usize {
    len.wrapping_neg() % 4
}

/// Server supplied strings are usually ASCII, fall back to raw bytes for the rest
pub(crate) fn display_maybe_utf8(buf: &[u8]) -> String {
    match std::str::from_utf8(buf) {
        Ok(text) => text.to_owned(),
        Err(_) => format!("{:?}", buf),
    }
}

/// Set of `u32` flags with named constants and `|`
macro_rules! bitmask {
    ($(#[$meta:meta])* bitmask $name:ident { $($flag:ident = $value:literal,)* }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        #[repr(transparent)]
        pub struct $name(u32);

        impl $name {
            $(pub const $flag: Self = Self($value);)*
        }

        impl ::std::ops::BitOr for $name {
            type Output = Self;

            fn bitor(self, rhs: Self) -> Self {
                Self(self.0 | rhs.0)
            }
        }

        impl From<$name> for u32 {
            fn from(mask: $name) -> u32 {
                mask.0
            }
        }
    };
}
pub(crate) use bitmask;

/// Fieldless enum that can be decoded from its wire value
macro_rules! wire_enum {
    (#[repr($repr:ident)] $(#[$meta:meta])* enum $name:ident { $($variant:ident = $value:literal,)* }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr($repr)]
        pub enum $name {
            $($variant = $value,)*
        }

        impl TryFrom<$repr> for $name {
            type Error = $repr;

            fn try_from(raw: $repr) -> Result<Self, $repr> {
                [$(Self::$variant),*]
                    .into_iter()
                    .find(|variant| *variant as $repr == raw)
                    .ok_or(raw)
            }
        }
    };
}
pub(crate) use wire_enum;

/// Typed wrapper over [`crate::ResourceId`]
macro_rules! resource_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(transparent)]
        pub struct $name($crate::ResourceId);

        impl $name {
            pub fn id(self) -> $crate::ResourceId {
                self.0
            }
        }

        impl From<$crate::ResourceId> for $name {
            fn from(id: $crate::ResourceId) -> Self {
                Self(id)
            }
        }

        impl From<u32> for $name {
            fn from(raw: u32) -> Self {
                Self($crate::ResourceId::new(raw))
            }
        }

        impl From<$name> for u32 {
            fn from(typed: $name) -> u32 {
                typed.0.value()
            }
        }
    };
}
pub(crate) use resource_id;
