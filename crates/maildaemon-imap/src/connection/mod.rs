//! IMAP connection management.
//!
//! - TLS/plaintext stream abstraction
//! - Framed I/O for IMAP protocol
//! - Type-state client
//! - Runtime-state session wrapper

mod client;
mod framed;
mod session;
mod stream;

pub use client::{AuthResult, Authenticated, Client, NotAuthenticated, Selected};
pub use framed::FramedStream;
pub use session::Session;
pub use stream::{ImapStream, tls_connector};
