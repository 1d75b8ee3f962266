//! Utility macros for the HTTP crate.

/// Returns early with an error if a condition is not met.
///
/// Like `assert!`, but for validation that should fail the current
/// operation instead of panicking.
macro_rules! ensure {
    ($predicate:expr, $error:expr) => {
        if !$predicate {
            return Err($error);
        }
    };
}

pub(crate) use ensure;
