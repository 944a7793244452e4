//! Connection addressing.

use serde_json::Value;

/// Mail protocol spoken by a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    /// IMAP4rev1.
    Imap,
    /// POP3.
    Pop,
    /// SMTP submission.
    Smtp,
}

impl Protocol {
    /// Parses a protocol name, ignoring case.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_uppercase().as_str() {
            "IMAP" => Some(Self::Imap),
            "POP" | "POP3" => Some(Self::Pop),
            "SMTP" => Some(Self::Smtp),
            _ => None,
        }
    }

    /// Well-known plaintext ports, preferred first.
    #[must_use]
    pub const fn ports(self) -> &'static [u16] {
        match self {
            Self::Imap => &[143],
            Self::Pop => &[110],
            Self::Smtp => &[25, 465, 587],
        }
    }

    /// Well-known SSL ports, preferred first.
    #[must_use]
    pub const fn ssl_ports(self) -> &'static [u16] {
        match self {
            Self::Imap => &[993],
            Self::Pop => &[995],
            Self::Smtp => &[465, 587],
        }
    }

    /// The port used when none is configured.
    #[must_use]
    pub const fn default_port(self, ssl: bool) -> u16 {
        let ports = if ssl { self.ssl_ports() } else { self.ports() };
        ports[0]
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Imap => "IMAP",
            Self::Pop => "POP",
            Self::Smtp => "SMTP",
        })
    }
}

/// Where and how to reach a server.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionSettings {
    /// Name of the connection in the configuration.
    pub name: String,
    /// Protocol.
    pub protocol: Protocol,
    /// Server hostname.
    pub domain: String,
    /// Explicit port, if configured.
    pub port: Option<u16>,
    /// Implicit TLS.
    pub ssl: bool,
    /// Authenticate with a bearer token instead of a password.
    pub oauth: bool,
    /// Opaque data for the token provider.
    pub oauth_data: Option<Value>,
}

impl ConnectionSettings {
    /// Creates settings with SSL on and no explicit port.
    #[must_use]
    pub fn new(name: impl Into<String>, protocol: Protocol, domain: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            protocol,
            domain: domain.into(),
            port: None,
            ssl: true,
            oauth: false,
            oauth_data: None,
        }
    }

    /// Sets an explicit port.
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Turns implicit TLS on or off.
    #[must_use]
    pub const fn with_ssl(mut self, ssl: bool) -> Self {
        self.ssl = ssl;
        self
    }

    /// The configured port, or the protocol's first well-known port for the
    /// SSL setting.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.protocol.default_port(self.ssl))
    }
}

impl std::fmt::Display for ConnectionSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({} {}:{}, {})",
            self.name,
            self.protocol,
            self.domain,
            self.port(),
            if self.ssl { "SSL" } else { "plaintext" }
        )
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_protocol_names() {
        assert_eq!(Protocol::from_name("imap"), Some(Protocol::Imap));
        assert_eq!(Protocol::from_name(" POP "), Some(Protocol::Pop));
        assert_eq!(Protocol::from_name("Smtp"), Some(Protocol::Smtp));
        assert_eq!(Protocol::from_name("nntp"), None);
    }

    #[test]
    fn test_default_ports() {
        let imap = ConnectionSettings::new("a", Protocol::Imap, "example.com");
        assert_eq!(imap.port(), 993);
        assert_eq!(imap.clone().with_ssl(false).port(), 143);

        let smtp = ConnectionSettings::new("b", Protocol::Smtp, "example.com").with_ssl(false);
        assert_eq!(smtp.port(), 25);
        assert_eq!(smtp.with_ssl(true).port(), 465);
    }

    #[test]
    fn test_explicit_port_wins() {
        let pop = ConnectionSettings::new("c", Protocol::Pop, "example.com")
            .with_ssl(false)
            .with_port(2110);
        assert_eq!(pop.port(), 2110);
    }

    fn protocol() -> impl Strategy<Value = Protocol> {
        prop_oneof![
            Just(Protocol::Imap),
            Just(Protocol::Pop),
            Just(Protocol::Smtp)
        ]
    }

    proptest! {
        #[test]
        fn prop_unset_port_is_first_well_known(protocol in protocol(), ssl: bool) {
            let settings = ConnectionSettings::new("x", protocol, "host").with_ssl(ssl);
            let expected = if ssl { protocol.ssl_ports()[0] } else { protocol.ports()[0] };
            prop_assert_eq!(settings.port(), expected);
        }
    }
}
