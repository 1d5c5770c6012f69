//! Address normalisation and syntax screening.

use once_cell::sync::Lazy;
use regex::Regex;

const BYTE_ORDER_MARK: char = '\u{FEFF}';

static ADDRESS_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}$").expect("address pattern compiles")
});

/// Strip byte-order marks, trim surrounding whitespace and lower-case.
///
/// Two inputs are the same address for deduplication iff their normalised
/// forms are equal. The function is idempotent.
pub fn normalize_address(raw: &str) -> String {
    let without_bom: String = raw.chars().filter(|c| *c != BYTE_ORDER_MARK).collect();
    without_bom.trim().to_lowercase()
}

/// Returns `true` when `address` matches `local@label(.label)*.tld` where the
/// final label has at least two alphabetic characters.
pub fn is_syntactically_valid(address: &str) -> bool {
    let normalized = normalize_address(address);
    !normalized.is_empty() && ADDRESS_PATTERN.is_match(&normalized)
}

/// Domain part of an address (everything after the last `@`).
pub fn split_domain(address: &str) -> Option<&str> {
    address
        .rsplit_once('@')
        .map(|(_, domain)| domain)
        .filter(|domain| !domain.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn accepts_basic() {
        assert!(is_syntactically_valid("user@example.com"));
        assert!(is_syntactically_valid("first.last+tag@mail.example.co.uk"));
    }

    #[test]
    fn rejects_malformed() {
        assert!(!is_syntactically_valid("not-an-email"));
        assert!(!is_syntactically_valid("user@"));
        assert!(!is_syntactically_valid("@example.com"));
        assert!(!is_syntactically_valid("user@example.c"));
        assert!(!is_syntactically_valid("user@example.c0m"));
        assert!(!is_syntactically_valid("us er@example.com"));
    }

    #[test]
    fn empty_after_normalization_is_invalid() {
        assert!(!is_syntactically_valid(""));
        assert!(!is_syntactically_valid("   "));
        assert!(!is_syntactically_valid("\u{FEFF}"));
    }

    #[test]
    fn normalization_strips_bom_and_case() {
        assert_eq!(normalize_address("\u{FEFF}  A@X.COM \t"), "a@x.com");
        assert!(is_syntactically_valid("\u{FEFF}User@Example.COM"));
    }

    #[test]
    fn split_takes_last_at() {
        assert_eq!(split_domain("a@b@example.com"), Some("example.com"));
        assert_eq!(split_domain("user@"), None);
        assert_eq!(split_domain("no-at-sign"), None);
    }

    proptest! {
        #[test]
        fn normalize_is_idempotent(raw in "\\PC{0,40}") {
            let once = normalize_address(&raw);
            prop_assert_eq!(normalize_address(&once), once);
        }

        #[test]
        fn validity_ignores_case_and_padding(local in "[a-z0-9._%+-]{1,12}", label in "[a-z0-9-]{1,12}", tld in "[a-z]{2,6}") {
            let address = format!("{local}@{label}.{tld}");
            prop_assert!(is_syntactically_valid(&address));
            let padded = format!(" \u{FEFF}{} ", address.to_uppercase());
            prop_assert!(is_syntactically_valid(&padded));
        }
    }
}
