//! Address header splitting.

use std::fmt;

/// An address with its display name.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EmailAddress {
    /// Mailbox, e.g. `notify@example.com`.
    pub address: String,
    /// Display name, empty if none was given.
    pub name: String,
}

impl EmailAddress {
    /// Creates an address without display name.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: String::new(),
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Splits a decoded header value using its last `<...>` pair.
    ///
    /// Without brackets the whole value is the address.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        let bracketed = value
            .rfind('<')
            .and_then(|open| value[open..].find('>').map(|close| (open, open + close)));

        match bracketed {
            Some((open, close)) => Self {
                address: value[open + 1..close].trim().to_string(),
                name: unquote(value[..open].trim()).to_string(),
            },
            None => Self::new(value),
        }
    }

    /// Splits a list header such as `To` on top-level commas.
    #[must_use]
    pub fn parse_list(value: &str) -> Vec<Self> {
        split_top_level(value)
            .into_iter()
            .filter(|part| !part.trim().is_empty())
            .map(Self::parse)
            .collect()
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            f.write_str(&self.address)
        } else {
            write!(f, "{} <{}>", self.name, self.address)
        }
    }
}

fn unquote(name: &str) -> &str {
    name.strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(name)
}

/// Splits on commas outside quotes and angle brackets.
fn split_top_level(value: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut in_angle = false;
    let mut escaped = false;
    let mut start = 0;

    for (i, c) in value.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            '<' if !in_quotes => in_angle = true,
            '>' if !in_quotes => in_angle = false,
            ',' if !in_quotes && !in_angle => {
                parts.push(&value[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&value[start..]);
    parts
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_parse_bracketed() {
        let addr = EmailAddress::parse("\"Doe, John\" <john@example.com>");
        assert_eq!(addr.address, "john@example.com");
        assert_eq!(addr.name, "Doe, John");
    }

    #[test]
    fn test_parse_uses_last_brackets() {
        let addr = EmailAddress::parse("Support <old@example.com> <new@example.com>");
        assert_eq!(addr.address, "new@example.com");
        assert_eq!(addr.name, "Support <old@example.com>");
    }

    #[test]
    fn test_parse_bare() {
        let addr = EmailAddress::parse("  notify@example.com ");
        assert_eq!(addr, EmailAddress::new("notify@example.com"));
        assert_eq!(addr.to_string(), "notify@example.com");
    }

    #[test]
    fn test_parse_list_respects_quotes() {
        let list = EmailAddress::parse_list(
            "\"Doe, John\" <john@example.com>, jane@example.com,, Bob <bob@example.com>",
        );
        let addresses: Vec<_> = list.iter().map(|a| a.address.as_str()).collect();
        assert_eq!(
            addresses,
            ["john@example.com", "jane@example.com", "bob@example.com"]
        );
    }

    proptest! {
        #[test]
        fn prop_name_and_address_survive(
            name in "[A-Za-z][A-Za-z ]{0,20}[A-Za-z]",
            local in "[a-z0-9.]{1,12}",
            domain in "[a-z]{1,10}\\.[a-z]{2,3}",
        ) {
            let address = format!("{local}@{domain}");
            let parsed = EmailAddress::parse(&format!("{name} <{address}>"));
            prop_assert_eq!(&parsed.address, &address);
            prop_assert_eq!(&parsed.name, &name);
        }

        #[test]
        fn prop_list_count_matches(count in 1usize..6) {
            let header = (0..count)
                .map(|i| format!("\"User, {i}\" <u{i}@example.com>"))
                .collect::<Vec<_>>()
                .join(", ");
            prop_assert_eq!(EmailAddress::parse_list(&header).len(), count);
        }
    }
}
