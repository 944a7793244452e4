//! Drains a scripted mail drop the way the daemon's POP session does.

use std::io::{self, Cursor};
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use maildaemon_pop::{Client, Error};

/// Replays a server script and records everything written.
struct MockStream {
    responses: Cursor<Vec<u8>>,
    sent: Vec<u8>,
}

impl MockStream {
    fn new(responses: &[u8]) -> Self {
        Self {
            responses: Cursor::new(responses.to_vec()),
            sent: Vec::new(),
        }
    }
}

impl AsyncRead for MockStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let data = self.responses.get_ref();
        let pos = usize::try_from(self.responses.position()).unwrap();
        if pos >= data.len() {
            return Poll::Ready(Ok(()));
        }

        let remaining = &data[pos..];
        let line_end = remaining
            .iter()
            .position(|&b| b == b'\n')
            .map_or(remaining.len(), |i| i + 1);
        let to_read = line_end.min(buf.remaining());
        buf.put_slice(&remaining[..to_read]);
        self.responses.set_position((pos + to_read) as u64);
        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for MockStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.sent.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[tokio::test]
async fn test_drain_mail_drop() {
    let script = b"+OK ready\r\n\
        +OK\r\n\
        +OK 2 messages\r\n\
        +OK\r\n1 10\r\n2 11\r\n.\r\n\
        +OK\r\nSubject: one\r\n\r\nbody\r\n.\r\n\
        +OK\r\nSubject: two\r\n\r\n.\r\n\
        +OK deleted\r\n\
        +OK bye\r\n";
    let client = Client::from_stream(MockStream::new(script)).await.unwrap();
    assert!(client.apop_timestamp().is_none());

    let mut client = client.login("me", "pw").await.unwrap();
    let ids: Vec<u32> = client.list().await.unwrap().into_iter().map(|(n, _)| n).collect();
    assert_eq!(ids, vec![1, 2]);

    let first = client.retr(1).await.unwrap();
    let second = client.retr(2).await.unwrap();
    assert!(first.starts_with(b"Subject: one"));
    assert_eq!(second, b"Subject: two\r\n\r\n");

    client.dele(1).await.unwrap();
    let sent = String::from_utf8(client.get_ref().sent.clone()).unwrap();
    assert_eq!(
        sent,
        "USER me\r\nPASS pw\r\nLIST\r\nRETR 1\r\nRETR 2\r\nDELE 1\r\n"
    );
    client.quit().await.unwrap();
}

#[tokio::test]
async fn test_refused_password_keeps_authorization_state() {
    let script = b"+OK ready\r\n\
        +OK\r\n\
        -ERR invalid password\r\n\
        +OK bye\r\n";
    let client = Client::from_stream(MockStream::new(script)).await.unwrap();

    let rejected = client.login("me", "wrong").await.unwrap_err();
    assert!(matches!(rejected.error, Error::Err(ref text) if text == "invalid password"));
    rejected.client.quit().await.unwrap();
}

#[tokio::test]
async fn test_connection_drop_is_an_io_error() {
    let script = b"+OK ready\r\n+OK\r\n+OK\r\n+OK\r\n+OK\r\n1 10\r\n";
    let client = Client::from_stream(MockStream::new(script)).await.unwrap();
    let mut client = client.login("me", "pw").await.unwrap();

    // STAT reply consumed as "+OK" with no numbers.
    assert!(matches!(client.stat().await, Err(Error::Protocol(_))));
    assert!(matches!(client.list().await, Err(Error::Io(_))));
}
