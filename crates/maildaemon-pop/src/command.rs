//! POP3 commands (RFC 1939, RFC 2595).

/// POP3 command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// USER name
    User(String),
    /// PASS secret
    Pass(String),
    /// APOP name digest
    Apop {
        /// Mailbox name.
        name: String,
        /// Hex MD5 of the greeting timestamp and the secret.
        digest: String,
    },
    /// STLS
    Stls,
    /// STAT
    Stat,
    /// LIST, for the whole drop or one message
    List(Option<u32>),
    /// UIDL, for the whole drop or one message
    Uidl(Option<u32>),
    /// RETR msg
    Retr(u32),
    /// TOP msg n
    Top {
        /// Message number.
        msg: u32,
        /// Body lines to include after the header.
        lines: u32,
    },
    /// DELE msg
    Dele(u32),
    /// NOOP
    Noop,
    /// RSET
    Rset,
    /// QUIT
    Quit,
}

impl Command {
    /// Serializes the command to bytes.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let line = match self {
            Self::User(name) => format!("USER {name}"),
            Self::Pass(secret) => format!("PASS {secret}"),
            Self::Apop { name, digest } => format!("APOP {name} {digest}"),
            Self::Stls => "STLS".to_string(),
            Self::Stat => "STAT".to_string(),
            Self::List(None) => "LIST".to_string(),
            Self::List(Some(msg)) => format!("LIST {msg}"),
            Self::Uidl(None) => "UIDL".to_string(),
            Self::Uidl(Some(msg)) => format!("UIDL {msg}"),
            Self::Retr(msg) => format!("RETR {msg}"),
            Self::Top { msg, lines } => format!("TOP {msg} {lines}"),
            Self::Dele(msg) => format!("DELE {msg}"),
            Self::Noop => "NOOP".to_string(),
            Self::Rset => "RSET".to_string(),
            Self::Quit => "QUIT".to_string(),
        };
        let mut buf = line.into_bytes();
        buf.extend_from_slice(b"\r\n");
        buf
    }

    /// Returns true if a successful reply is followed by a dot-terminated
    /// body.
    #[must_use]
    pub const fn is_multiline(&self) -> bool {
        matches!(
            self,
            Self::List(None) | Self::Uidl(None) | Self::Retr(_) | Self::Top { .. }
        )
    }

    /// Command line safe to log: secrets are masked.
    #[must_use]
    pub fn redacted(&self) -> String {
        match self {
            Self::Pass(_) => "PASS ***".to_string(),
            Self::Apop { name, .. } => format!("APOP {name} ***"),
            other => String::from_utf8_lossy(&other.serialize())
                .trim_end()
                .to_string(),
        }
    }
}
