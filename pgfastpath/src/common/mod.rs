//! Supporting utility macros.

/// Trace when `verbose` feature enabled.
macro_rules! verbose {
    ($($tt:tt)*) => {
        #[cfg(feature = "verbose")]
        tracing::trace!($($tt)*)
    };
}

/// Create and enter `Span` when `verbose` feature enabled.
macro_rules! span {
    ($($tt:tt)*) => {
        #[cfg(feature = "verbose")]
        let s = tracing::trace_span!($($tt)*);
        #[cfg(feature = "verbose")]
        let _s = s.enter();
    };
}

/// Declare an error type with a fixed message, optionally carrying one value.
macro_rules! unit_error {
    ($(#[$doc:meta])* pub struct $name:ident($msg:literal);) => {
        $(#[$doc])*
        pub struct $name;

        impl std::error::Error for $name { }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str($msg)
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "\"{self}\"")
            }
        }
    };
    ($(#[$doc:meta])* pub struct $name:ident($msg:literal, $field:ident: $ty:ty);) => {
        $(#[$doc])*
        pub struct $name {
            pub(crate) $field: $ty,
        }

        impl $name {
            #[doc = concat!("Returns the offending `", stringify!($field), "`.")]
            pub fn $field(&self) -> &$ty {
                &self.$field
            }
        }

        impl std::error::Error for $name { }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($msg, ": {:?}"), self.$field)
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "\"{self}\"")
            }
        }
    };
}

pub(crate) use verbose;
pub(crate) use span;
pub(crate) use unit_error;
