//! HTTPC wire protocol.
//!
//! ## Protocol Flow
//!
//! ```text
//! Client                                    Server
//!   |                                         |
//!   |  HTTPC-HELLO\n                          |
//!   |<----------------------------------------|
//!   |  <id1>,<id2>,...\n                      |
//!   |---------------------------------------->|
//!   |  HTTPC-FALLBACK\n  |  HTTPC-USE:<id>\n  |
//!   |<----------------------------------------|
//!   |                                         |
//!   |  rotation round:                        |
//!   |    outer(seed)[{"temp_key": ...}]       |
//!   |<----------------------------------------|  close
//!   |                                         |
//!   |  request round:                         |
//!   |    outer(seed)[inner(temp_key)[req]]    |
//!   |---------------------------------------->|  client half-closes
//!   |    outer(seed)[inner(temp_key)[resp]]   |
//!   |<----------------------------------------|  close
//! ```
//!
//! Tokens are newline-terminated lines. Binary frames carry no length prefix;
//! the sender closes its write side and the receiver reads to EOF.

pub mod envelope;
pub mod handshake;

pub use envelope::{decode_inbound, encode_outbound, open_rotation, seal_rotation, RotationRecord};
pub use handshake::{accept, negotiate, Selection};

use std::future::Future;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::timeout;

use crate::error::{Error, Result};

/// Server greeting.
pub const HELLO: &str = "HTTPC-HELLO";

/// Server reply when no certificate is shared.
pub const FALLBACK: &str = "HTTPC-FALLBACK";

/// Prefix of the server's certificate selection.
pub const USE_PREFIX: &str = "HTTPC-USE:";

/// Separator in the client's id list.
pub const ID_SEPARATOR: char = ',';

/// Longest accepted token line, newline included.
pub const MAX_LINE_LEN: usize = 4096;

/// Read one `\n`-terminated line without consuming anything past it.
///
/// The trailing `\n` (and a `\r` before it) is stripped. Invalid UTF-8 is
/// replaced rather than rejected.
pub async fn read_line<R>(reader: &mut R, max_len: usize) -> Result<String>
where
    R: AsyncRead + Unpin,
{
    let mut line = Vec::with_capacity(64);

    loop {
        let mut byte = [0u8; 1];
        let n = reader.read(&mut byte).await?;
        if n == 0 {
            return Err(Error::handshake("connection closed mid-line"));
        }
        if byte[0] == b'\n' {
            break;
        }
        if line.len() >= max_len {
            return Err(Error::invalid("token line too long"));
        }
        line.push(byte[0]);
    }

    if line.last() == Some(&b'\r') {
        line.pop();
    }

    Ok(String::from_utf8_lossy(&line).into_owned())
}

/// Read until EOF, failing if more than `limit` bytes arrive.
pub async fn read_to_end_limited<R>(reader: &mut R, limit: usize) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    reader.take(limit as u64 + 1).read_to_end(&mut buf).await?;

    if buf.len() > limit {
        return Err(Error::PayloadTooLarge { limit });
    }
    Ok(buf)
}

/// Await `fut`, failing with [`Error::Timeout`] once `limit` elapses.
pub async fn with_deadline<T>(limit: Duration, fut: impl Future<Output = Result<T>>) -> Result<T> {
    timeout(limit, fut)
        .await
        .map_err(|_| Error::Timeout(limit.as_millis() as u64))?
}
