//! Result type definition and extension traits.
//!
//! Provides functional combinators for Result types, enabling clean error handling
//! without unwrap/expect/panic.

/// The standard Result type for replset core operations.
///
/// Use the `?` operator, `match`, or combinator methods to handle results.
pub type Result<T> = std::result::Result<T, crate::error::Error>;

/// Extension trait for any displayable Result, used where a failure is
/// reported and then tolerated.
pub trait ResultExt<T, E> {
    /// Convert a Result to an Option, logging the error as a warning.
    fn into_option_logged(self, context: &str) -> Option<T>;
}

impl<T, E: std::fmt::Display> ResultExt<T, E> for std::result::Result<T, E> {
    fn into_option_logged(self, context: &str) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(error = %e, "{context}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_option_logged_ok() {
        let result: std::result::Result<i32, String> = Ok(42);
        assert_eq!(result.into_option_logged("pass failed"), Some(42));
    }

    #[test]
    fn test_into_option_logged_err() {
        let result: std::result::Result<i32, String> = Err("boom".to_string());
        assert_eq!(result.into_option_logged("pass failed"), None);
    }
}
