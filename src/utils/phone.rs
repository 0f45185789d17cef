use regex::Regex;
use std::sync::LazyLock;

static PHONE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?\d{7,15}$").expect("valid phone regex"));

/// Strips formatting characters, keeping a leading `+`.
pub fn normalize_phone(phone: &str) -> String {
    let trimmed = phone.trim();
    let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();
    if trimmed.starts_with('+') {
        format!("+{digits}")
    } else {
        digits
    }
}

/// Loose international check: 7 to 15 digits after formatting is removed.
pub fn is_plausible_phone(phone: &str) -> bool {
    PHONE_REGEX.is_match(&normalize_phone(phone))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_phone() {
        assert_eq!(normalize_phone("(234) 567-8901"), "2345678901");
        assert_eq!(normalize_phone(" +1 234 567 8901 "), "+12345678901");
    }

    #[test]
    fn test_is_plausible_phone() {
        assert!(is_plausible_phone("+44 20 7946 0958"));
        assert!(is_plausible_phone("555-0100"));
        assert!(!is_plausible_phone("12345"));
        assert!(!is_plausible_phone("call me"));
    }
}
