//! Content-Length-framed stdio transport.
//!
//! Messages are framed the LSP way: `Content-Length: <n>\r\n\r\n<body>`.
//! Two tasks bridge stdin/stdout to a [`Connection`]; logging goes to
//! stderr so stdout stays clean for the protocol.

use lis_protocol::LisMessage;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::connection::Connection;

/// Spawn reader/writer tasks over stdin/stdout and return the server-side
/// connection. The reader task ends (closing the connection) on EOF or a
/// framing error; both are fatal transport faults from the server's view.
pub fn stdio_connection() -> Connection {
    let (to_server, from_stdin) = mpsc::unbounded_channel::<LisMessage>();
    let (to_stdout, mut from_server) = mpsc::unbounded_channel::<LisMessage>();

    tokio::spawn(async move {
        let mut reader = BufReader::new(tokio::io::stdin());
        loop {
            match read_message(&mut reader).await {
                Ok(Some(message)) => {
                    if to_server.send(message).is_err() {
                        break;
                    }
                }
                Ok(None) => {
                    debug!("stdin closed, stopping reader");
                    break;
                }
                Err(e) => {
                    error!("transport read error: {e}");
                    break;
                }
            }
        }
    });

    tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(message) = from_server.recv().await {
            let body = match serde_json::to_string(&message) {
                Ok(body) => body,
                Err(e) => {
                    warn!("failed to serialize outbound message: {e}");
                    continue;
                }
            };
            let frame = format!("Content-Length: {}\r\n\r\n{}", body.len(), body);
            if stdout.write_all(frame.as_bytes()).await.is_err() {
                break;
            }
            if stdout.flush().await.is_err() {
                break;
            }
        }
    });

    Connection::new(to_stdout, from_stdin)
}

/// Read one framed message; `Ok(None)` on clean EOF.
async fn read_message<R>(reader: &mut R) -> std::io::Result<Option<LisMessage>>
where
    R: AsyncBufReadExt + Unpin,
{
    let mut content_length: Option<usize> = None;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).await? == 0 {
            return Ok(None);
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some(value) = line.strip_prefix("Content-Length:") {
            content_length = value.trim().parse::<usize>().ok();
        }
        // Other headers (Content-Type) are ignored.
    }

    let len = content_length.ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidData, "missing Content-Length header")
    })?;
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    let message = serde_json::from_slice::<LisMessage>(&body)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    Ok(Some(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_framed_message() {
        let body = r#"{"jsonrpc":"2.0","method":"initialized"}"#;
        let frame = format!("Content-Length: {}\r\n\r\n{}", body.len(), body);
        let mut reader = BufReader::new(frame.as_bytes());
        let message = read_message(&mut reader).await.unwrap().unwrap();
        match message {
            LisMessage::Notification(n) => assert_eq!(n.method, "initialized"),
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[tokio::test]
    async fn clean_eof_yields_none() {
        let mut reader = BufReader::new(&b""[..]);
        assert!(read_message(&mut reader).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn missing_content_length_is_an_error() {
        let mut reader = BufReader::new(&b"X-Header: 1\r\n\r\n{}"[..]);
        assert!(read_message(&mut reader).await.is_err());
    }
}
