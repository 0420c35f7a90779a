//! Error construction macros.

/// Creates a [`crate::error::RelayError`] from a kind, a static description,
/// and optionally a dynamic detail.
#[macro_export]
macro_rules! relay_error {
    ($kind:expr, $desc:expr) => {
        $crate::error::RelayError::from(($kind, $desc))
    };
    ($kind:expr, $desc:expr, $detail:expr) => {
        $crate::error::RelayError::from(($kind, $desc, $detail.to_string()))
    };
}

/// Creates a [`crate::error::RelayError`] and returns it from the current
/// function. Takes the same arguments as [`relay_error!`].
#[macro_export]
macro_rules! bail {
    ($kind:expr, $desc:expr) => {
        return ::core::result::Result::Err($crate::relay_error!($kind, $desc))
    };
    ($kind:expr, $desc:expr, $detail:expr) => {
        return ::core::result::Result::Err($crate::relay_error!($kind, $desc, $detail))
    };
}
