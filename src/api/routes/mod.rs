//! API Routes
//!
//! Route handlers organized by functionality.

pub mod backends;
pub mod batches;
pub mod classify;
pub mod dashboard;
pub mod health;

use crate::api::error::ApiResult;
use crate::classify::Backend;

/// Parse an optional backend name; blank means the registry default
pub(crate) fn parse_backend(value: Option<&str>) -> ApiResult<Option<Backend>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(name) => Ok(Some(name.parse::<Backend>()?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_backend() {
        assert_eq!(parse_backend(None).unwrap(), None);
        assert_eq!(parse_backend(Some(" ")).unwrap(), None);
        assert_eq!(parse_backend(Some("BERT")).unwrap(), Some(Backend::Bert));
        assert!(parse_backend(Some("gpt")).is_err());
    }
}
