//! Cheap sanity checks on a CSS selector before it goes to the browser
//!
//! Not a parser. Catches the mistakes that would otherwise come back as an
//! opaque CDP error.

use crate::error::{DiagnosticsError, Result};

pub fn validate_selector(selector: &str) -> Result<()> {
    let trimmed = selector.trim();
    if trimmed.is_empty() {
        return Err(invalid("Selector cannot be empty"));
    }

    if trimmed.starts_with(|c: char| c.is_ascii_digit()) {
        return Err(invalid("Selector cannot start with a number"));
    }

    let open = trimmed.matches('[').count();
    let close = trimmed.matches(']').count();
    if open != close {
        return Err(invalid("Unbalanced brackets"));
    }

    Ok(())
}

fn invalid(reason: &str) -> DiagnosticsError {
    DiagnosticsError::InvalidSelector(reason.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_common_selectors() {
        for selector in ["#modal", ".card > .title", "div[data-id='7']", "  body  ", "a:hover"] {
            assert!(validate_selector(selector).is_ok(), "{} rejected", selector);
        }
    }

    #[test]
    fn test_rejects_empty() {
        let err = validate_selector("   ").unwrap_err();
        assert_eq!(err.to_string(), "Invalid selector: Selector cannot be empty");
    }

    #[test]
    fn test_rejects_leading_digit() {
        assert!(matches!(
            validate_selector("1st-item"),
            Err(DiagnosticsError::InvalidSelector(_))
        ));
    }

    #[test]
    fn test_rejects_unbalanced_brackets() {
        let err = validate_selector("input[type='text'").unwrap_err();
        assert_eq!(err.to_string(), "Invalid selector: Unbalanced brackets");
    }
}
