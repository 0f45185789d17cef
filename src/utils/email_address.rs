//! Mail address parsing and normalization.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@<>,;]+@[^\s@<>,;]+\.[^\s@<>,;]+$").expect("valid email regex")
});

static NAMED_ADDRESS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*?)\s*<([^<>]+)>$").expect("valid address regex"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailAddress {
    /// Lower-cased, otherwise as written.
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

pub fn is_valid_email(value: &str) -> bool {
    EMAIL_REGEX.is_match(value.trim())
}

/// Trimmed and lower-cased. Used as the CRM identity key.
pub fn canonical_email(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Comparison form: lower-cased with any `+subaddress` tag removed from the
/// local part, so `Team+Events@x.org` matches `team@x.org`.
pub fn normalize_address(value: &str) -> String {
    let lowered = canonical_email(value);
    match lowered.split_once('@') {
        Some((local, domain)) => {
            let local = local.split('+').next().unwrap_or(local);
            format!("{local}@{domain}")
        }
        None => lowered,
    }
}

/// Parses an RFC 5322 style address list header value such as
/// `"Doe, Jane" <jane@x.org>, bob@y.org`. Entries without a usable address
/// are dropped.
pub fn parse_address_list(header: &str) -> Vec<EmailAddress> {
    split_addresses(header)
        .into_iter()
        .filter_map(|entry| parse_address(&entry))
        .collect()
}

pub fn parse_address(entry: &str) -> Option<EmailAddress> {
    let entry = entry.trim();
    if entry.is_empty() {
        return None;
    }

    let (name, email) = match NAMED_ADDRESS_REGEX.captures(entry) {
        Some(caps) => {
            let name = caps
                .get(1)
                .map(|m| m.as_str().trim().trim_matches('"').trim().to_string())
                .filter(|n| !n.is_empty());
            let email = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
            (name, email.to_string())
        }
        None => (None, entry.to_string()),
    };

    if !is_valid_email(&email) {
        return None;
    }

    Some(EmailAddress {
        email: canonical_email(&email),
        name,
    })
}

/// Splits on commas that are not inside quotes or angle brackets.
fn split_addresses(header: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut in_angle = false;

    for c in header.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            '<' if !in_quotes => {
                in_angle = true;
                current.push(c);
            }
            '>' if !in_quotes => {
                in_angle = false;
                current.push(c);
            }
            ',' | ';' if !in_quotes && !in_angle => {
                parts.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    parts.push(current);

    parts
        .into_iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_case_and_subaddress() {
        assert_eq!(normalize_address(" Team+Events@Example.ORG "), "team@example.org");
        assert_eq!(normalize_address("plain@example.org"), "plain@example.org");
        assert_eq!(normalize_address("not-an-address"), "not-an-address");
    }

    #[test]
    fn parses_named_and_bare_addresses() {
        let parsed = parse_address_list(r#""Doe, Jane" <Jane@X.org>, bob@y.org"#);
        assert_eq!(
            parsed,
            vec![
                EmailAddress {
                    email: "jane@x.org".into(),
                    name: Some("Doe, Jane".into()),
                },
                EmailAddress {
                    email: "bob@y.org".into(),
                    name: None,
                },
            ]
        );
    }

    #[test]
    fn drops_garbage_entries() {
        let parsed = parse_address_list("undisclosed-recipients:;, <>, ok@z.io");
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].email, "ok@z.io");
    }

    #[test]
    fn validates_email_shape() {
        assert!(is_valid_email("runner@race.org"));
        assert!(!is_valid_email("runner@race"));
        assert!(!is_valid_email("runner race@x.org"));
    }
}
