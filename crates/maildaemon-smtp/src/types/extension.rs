//! EHLO keywords.

/// An extension advertised in the EHLO reply.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Extension {
    /// STARTTLS.
    StartTls,
    /// AUTH with the mechanisms this client knows.
    Auth(Vec<AuthMechanism>),
    /// SIZE with its optional limit.
    Size(Option<usize>),
    /// 8BITMIME.
    EightBitMime,
    /// Anything else, verbatim.
    Unknown(String),
}

impl Extension {
    /// Parses one EHLO line after the greeting.
    ///
    /// The obsolete `AUTH=` spelling still sent by some servers is read as
    /// `AUTH`.
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        let (keyword, params) = line
            .split_once([' ', '='])
            .unwrap_or((line, ""));

        match keyword.to_ascii_uppercase().as_str() {
            "STARTTLS" => Self::StartTls,
            "AUTH" => Self::Auth(
                params
                    .split_whitespace()
                    .filter_map(AuthMechanism::parse)
                    .collect(),
            ),
            "SIZE" => Self::Size(params.trim().parse().ok()),
            "8BITMIME" => Self::EightBitMime,
            _ => Self::Unknown(line.to_string()),
        }
    }
}

/// SASL mechanism, in order of preference when a password is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AuthMechanism {
    /// PLAIN.
    Plain,
    /// LOGIN.
    Login,
    /// `XOAUTH2` bearer token.
    XOAuth2,
}

impl AuthMechanism {
    /// Parses a mechanism name, ignoring case.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "PLAIN" => Some(Self::Plain),
            "LOGIN" => Some(Self::Login),
            "XOAUTH2" => Some(Self::XOAuth2),
            _ => None,
        }
    }

    /// Mechanism name as sent in AUTH.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "PLAIN",
            Self::Login => "LOGIN",
            Self::XOAuth2 => "XOAUTH2",
        }
    }
}
