//! Phone number normalization and ownership matching.
//!
//! WhatsApp delivers numbers as bare digits with country code
//! (`573000000001`) while the back office stores whatever the clerk typed
//! (`+57 300 000 0001`, `300-000-0001`). Matching is done on digits only.

/// Shortest digit tail accepted for a suffix match. Anything shorter would
/// let unrelated numbers collide.
pub const MIN_SUFFIX_DIGITS: usize = 7;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum PhoneMatch {
    /// One number is the other with a country or trunk prefix added.
    Suffix,
    Exact,
}

pub fn normalize_digits(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

pub fn match_phone(stored: &str, requested: &str) -> Option<PhoneMatch> {
    let stored = normalize_digits(stored);
    let requested = normalize_digits(requested);
    if stored.is_empty() || requested.is_empty() {
        return None;
    }
    if stored == requested {
        return Some(PhoneMatch::Exact);
    }

    let (shorter, longer) =
        if stored.len() < requested.len() { (&stored, &requested) } else { (&requested, &stored) };
    if shorter.len() >= MIN_SUFFIX_DIGITS && longer.ends_with(shorter.as_str()) {
        return Some(PhoneMatch::Suffix);
    }
    None
}

/// Digits used to pre-filter candidate rows before [`match_phone`] decides.
pub fn lookup_tail(requested: &str) -> Option<String> {
    let digits = normalize_digits(requested);
    if digits.len() < MIN_SUFFIX_DIGITS {
        return None;
    }
    Some(digits[digits.len() - MIN_SUFFIX_DIGITS..].to_string())
}

/// Masks a number for logs, keeping the last four digits.
pub fn mask(raw: &str) -> String {
    let digits = normalize_digits(raw);
    if digits.len() <= 4 {
        return "****".to_string();
    }
    format!("****{}", &digits[digits.len() - 4..])
}

#[cfg(test)]
mod tests {
    use super::{lookup_tail, mask, match_phone, normalize_digits, PhoneMatch};

    #[test]
    fn separators_and_plus_are_ignored() {
        assert_eq!(normalize_digits("+57 (300) 000-0001"), "573000000001");
        assert_eq!(match_phone("+57 300 000 0001", "573000000001"), Some(PhoneMatch::Exact));
    }

    #[test]
    fn country_code_difference_is_a_suffix_match() {
        assert_eq!(match_phone("300 000 0001", "+573000000001"), Some(PhoneMatch::Suffix));
        assert_eq!(match_phone("+5999 461 2345", "4612345"), Some(PhoneMatch::Suffix));
    }

    #[test]
    fn short_or_different_numbers_do_not_match() {
        assert_eq!(match_phone("0001", "573000000001"), None);
        assert_eq!(match_phone("573000000002", "573000000001"), None);
        assert_eq!(match_phone("", "573000000001"), None);
    }

    #[test]
    fn tail_and_mask_use_trailing_digits() {
        assert_eq!(lookup_tail("+57 300 000 0001").as_deref(), Some("0000001"));
        assert_eq!(lookup_tail("12345"), None);
        assert_eq!(mask("+57 300 000 0001"), "****0001");
    }
}
