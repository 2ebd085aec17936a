//! Handle flags and poll event bits
//!
//! Both sets are small bit masks. They are kept as newtypes rather than raw
//! integers so that a handle flag can never be passed where a poll event is
//! expected, but they can still carry unknown bits: `create`, `open` and
//! `poll` validate the bits themselves and report `InvalidArgument`.

use std::fmt;
use std::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, Not};

macro_rules! bit_set {
    (
        $(#[$meta:meta])*
        $name:ident { $($(#[$fmeta:meta])* $flag:ident = $bit:expr,)+ }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub struct $name(u8);

        impl $name {
            $($(#[$fmeta])* pub const $flag: Self = Self($bit);)+

            /// Every bit this set defines
            pub const ALL: Self = Self(0 $(| $bit)+);

            const NAMES: &'static [(&'static str, Self)] = &[$((stringify!($flag), Self::$flag)),+];

            #[must_use]
            pub const fn empty() -> Self {
                Self(0)
            }

            /// Build a set from raw bits, rejecting unknown bits
            #[must_use]
            pub const fn from_bits(bits: u8) -> Option<Self> {
                if bits & !Self::ALL.0 == 0 {
                    Some(Self(bits))
                } else {
                    None
                }
            }

            /// Build a set from raw bits, keeping unknown bits as they are
            #[must_use]
            pub const fn from_bits_retain(bits: u8) -> Self {
                Self(bits)
            }

            #[must_use]
            pub const fn bits(self) -> u8 {
                self.0
            }

            #[must_use]
            pub const fn is_empty(self) -> bool {
                self.0 == 0
            }

            /// True if no bits outside `ALL` are set
            #[must_use]
            pub const fn is_known(self) -> bool {
                self.0 & !Self::ALL.0 == 0
            }

            #[must_use]
            pub const fn contains(self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }

            #[must_use]
            pub const fn intersects(self, other: Self) -> bool {
                self.0 & other.0 != 0
            }

            pub fn insert(&mut self, other: Self) {
                self.0 |= other.0;
            }

            pub fn remove(&mut self, other: Self) {
                self.0 &= !other.0;
            }
        }

        impl BitOr for $name {
            type Output = Self;

            fn bitor(self, rhs: Self) -> Self {
                Self(self.0 | rhs.0)
            }
        }

        impl BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: Self) {
                self.0 |= rhs.0;
            }
        }

        impl BitAnd for $name {
            type Output = Self;

            fn bitand(self, rhs: Self) -> Self {
                Self(self.0 & rhs.0)
            }
        }

        impl BitAndAssign for $name {
            fn bitand_assign(&mut self, rhs: Self) {
                self.0 &= rhs.0;
            }
        }

        impl Not for $name {
            type Output = Self;

            fn not(self) -> Self {
                Self(!self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.is_empty() {
                    return write!(f, "{}(empty)", stringify!($name));
                }
                let mut first = true;
                for (name, flag) in Self::NAMES {
                    if self.contains(*flag) {
                        if !first {
                            f.write_str(" | ")?;
                        }
                        f.write_str(name)?;
                        first = false;
                    }
                }
                let unknown = self.0 & !Self::ALL.0;
                if unknown != 0 {
                    if !first {
                        f.write_str(" | ")?;
                    }
                    write!(f, "{unknown:#04x}")?;
                }
                Ok(())
            }
        }
    };
}

bit_set! {
    /// Capabilities carried by a queue handle
    QueueFlags {
        /// The handle may read messages
        READER = 0b001,
        /// The handle may write messages
        WRITER = 0b010,
        /// Read and write fail with `WouldBlock` instead of suspending
        NON_BLOCKING = 0b100,
    }
}

bit_set! {
    /// Readiness conditions reported by `poll`
    PollEvents {
        /// A message can be read, or the writers are gone (end-of-stream)
        READABLE = 0b0001,
        /// A message can be written, or the readers are gone (broken pipe)
        WRITABLE = 0b0010,
        /// Every reader handle has been closed
        NO_READERS = 0b0100,
        /// Every writer handle has been closed
        NO_WRITERS = 0b1000,
    }
}

impl QueueFlags {
    /// True if the handle takes part in the reader or writer counts
    #[must_use]
    pub const fn has_endpoint(self) -> bool {
        self.intersects(Self(Self::READER.0 | Self::WRITER.0))
    }
}
