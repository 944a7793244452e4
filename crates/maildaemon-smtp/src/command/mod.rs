//! Client commands.
//!
//! A [`Command`] renders as its command line without the CRLF. Use
//! [`Command::to_bytes`] for the wire and [`Command::redacted`] for logs:
//! AUTH initial responses carry credentials.

use std::fmt;

use crate::types::{Address, AuthMechanism};

/// SMTP command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// EHLO with the client hostname.
    Ehlo {
        /// Client hostname.
        hostname: String,
    },
    /// STARTTLS.
    StartTls,
    /// AUTH, optionally with a SASL initial response.
    Auth {
        /// Mechanism.
        mechanism: AuthMechanism,
        /// Base64 initial response.
        initial_response: Option<String>,
    },
    /// MAIL FROM, opening a transaction.
    MailFrom {
        /// Envelope sender.
        from: Address,
        /// `SIZE=` parameter, when the server advertises SIZE.
        size: Option<usize>,
        /// `BODY=8BITMIME`, when the server advertises 8BITMIME.
        eight_bit: bool,
    },
    /// RCPT TO.
    RcptTo {
        /// Envelope recipient.
        to: Address,
    },
    /// DATA.
    Data,
    /// RSET.
    Rset,
    /// NOOP.
    Noop,
    /// QUIT.
    Quit,
}

impl Command {
    /// The command line including CRLF.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        format!("{self}\r\n").into_bytes()
    }

    /// The command line with credentials masked.
    #[must_use]
    pub fn redacted(&self) -> String {
        match self {
            Self::Auth {
                mechanism,
                initial_response: Some(_),
            } => format!("AUTH {} ***", mechanism.as_str()),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ehlo { hostname } => write!(f, "EHLO {hostname}"),
            Self::StartTls => f.write_str("STARTTLS"),
            Self::Auth {
                mechanism,
                initial_response,
            } => {
                write!(f, "AUTH {}", mechanism.as_str())?;
                if let Some(response) = initial_response {
                    write!(f, " {response}")?;
                }
                Ok(())
            }
            Self::MailFrom {
                from,
                size,
                eight_bit,
            } => {
                write!(f, "MAIL FROM:<{}>", from.as_str())?;
                if let Some(size) = size {
                    write!(f, " SIZE={size}")?;
                }
                if *eight_bit {
                    f.write_str(" BODY=8BITMIME")?;
                }
                Ok(())
            }
            Self::RcptTo { to } => write!(f, "RCPT TO:<{}>", to.as_str()),
            Self::Data => f.write_str("DATA"),
            Self::Rset => f.write_str("RSET"),
            Self::Noop => f.write_str("NOOP"),
            Self::Quit => f.write_str("QUIT"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn mail_from(size: Option<usize>, eight_bit: bool) -> Command {
        Command::MailFrom {
            from: Address::new("daemon@example.com").unwrap(),
            size,
            eight_bit,
        }
    }

    #[test]
    fn test_mail_from_parameters() {
        assert_eq!(mail_from(None, false).to_bytes(), b"MAIL FROM:<daemon@example.com>\r\n");
        assert_eq!(
            mail_from(Some(2048), true).to_string(),
            "MAIL FROM:<daemon@example.com> SIZE=2048 BODY=8BITMIME"
        );
    }

    #[test]
    fn test_auth_is_redacted() {
        let auth = Command::Auth {
            mechanism: AuthMechanism::Plain,
            initial_response: Some("AHVzZXIAcGFzcw==".into()),
        };
        assert_eq!(auth.to_bytes(), b"AUTH PLAIN AHVzZXIAcGFzcw==\r\n");
        assert_eq!(auth.redacted(), "AUTH PLAIN ***");

        let login = Command::Auth {
            mechanism: AuthMechanism::Login,
            initial_response: None,
        };
        assert_eq!(login.redacted(), "AUTH LOGIN");
    }

    #[test]
    fn test_simple_commands() {
        let rcpt = Command::RcptTo {
            to: Address::new("a@example.com").unwrap(),
        };
        for (command, line) in [
            (Command::Ehlo { hostname: "localhost".into() }, "EHLO localhost"),
            (rcpt, "RCPT TO:<a@example.com>"),
            (Command::StartTls, "STARTTLS"),
            (Command::Data, "DATA"),
            (Command::Rset, "RSET"),
            (Command::Noop, "NOOP"),
            (Command::Quit, "QUIT"),
        ] {
            assert_eq!(command.redacted(), line);
        }
    }
}
