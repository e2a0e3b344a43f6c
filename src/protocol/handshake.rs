//! Certificate-selection handshake.
//!
//! Server: `AWAIT_IDS → SELECT → {FALLBACK | SELECTED}`.
//! Client: `SEND_HELLO → AWAIT_SELECTION → {FALLBACK | PROCEED}`.
//!
//! Both sides run over any `AsyncRead + AsyncWrite` stream so the exchange can
//! be driven over TCP or an in-memory pipe.

use std::collections::BTreeSet;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::certs::{Certificate, CertificateMap, CertificateStore};
use crate::crypto::SecureRandom;
use crate::error::{Error, Result};
use crate::protocol::{read_line, with_deadline, FALLBACK, HELLO, ID_SEPARATOR, MAX_LINE_LEN, USE_PREFIX};

/// Server's answer to the client's id list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// No shared certificate
    Fallback,
    /// Use the certificate with this id
    Use(String),
}

impl Selection {
    /// Parse a reply line (without its newline).
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim();
        if line == FALLBACK {
            return Ok(Selection::Fallback);
        }

        match line.strip_prefix(USE_PREFIX) {
            Some(id) if !id.trim().is_empty() => Ok(Selection::Use(id.trim().to_string())),
            Some(_) => Err(Error::handshake("selection names no certificate")),
            None => Err(Error::handshake(format!("unexpected selection reply: {:?}", line))),
        }
    }

    /// Wire form, newline included.
    pub fn to_line(&self) -> String {
        match self {
            Selection::Fallback => format!("{}\n", FALLBACK),
            Selection::Use(id) => format!("{}{}\n", USE_PREFIX, id),
        }
    }
}

/// Encode an id list as sent by the client, newline included.
pub fn encode_ids<I, S>(ids: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let joined = ids
        .into_iter()
        .map(|id| id.as_ref().to_string())
        .collect::<Vec<_>>()
        .join(&ID_SEPARATOR.to_string());
    format!("{}\n", joined)
}

/// Parse the client's id list. Blank entries are dropped.
pub fn parse_ids(line: &str) -> BTreeSet<String> {
    line.trim()
        .split(ID_SEPARATOR)
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

/// Pick uniformly at random among the certificates both sides hold.
pub fn select(client_ids: &BTreeSet<String>, certs: &CertificateMap) -> Option<Certificate> {
    let matches: Vec<&Certificate> = client_ids.iter().filter_map(|id| certs.get(id)).collect();
    SecureRandom::choose(&matches).map(|c| (*c).clone())
}

/// Run the server side of the handshake.
///
/// Returns `None` after sending the fallback token; the caller should close
/// the connection. On error the token has not been sent. The whole exchange
/// uses one snapshot of `store`, so the chosen id always has a seed even if
/// the store refreshes meanwhile.
pub async fn accept<S>(stream: &mut S, store: &CertificateStore) -> Result<Option<Certificate>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let certs = store.snapshot();

    stream.write_all(format!("{}\n", HELLO).as_bytes()).await?;

    let line = read_line(stream, MAX_LINE_LEN).await?;
    let client_ids = parse_ids(&line);

    let chosen = select(&client_ids, &certs);
    let reply = match &chosen {
        Some(cert) => Selection::Use(cert.id.clone()),
        None => Selection::Fallback,
    };
    stream.write_all(reply.to_line().as_bytes()).await?;
    stream.flush().await?;

    Ok(chosen)
}

/// Run the client side of the handshake.
///
/// Every read is bounded by `step_timeout`. A fallback reply surfaces as
/// [`Error::Fallback`].
pub async fn negotiate<S>(
    stream: &mut S,
    store: &CertificateStore,
    step_timeout: Duration,
) -> Result<Certificate>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let certs = store.snapshot();
    let greeting = with_deadline(step_timeout, read_line(stream, MAX_LINE_LEN)).await?;
    if greeting.trim() != HELLO {
        return Err(Error::handshake("missing greeting"));
    }

    let mut ids: Vec<&str> = certs.keys().map(String::as_str).collect();
    ids.sort_unstable();
    stream.write_all(encode_ids(ids).as_bytes()).await?;
    stream.flush().await?;

    let reply = with_deadline(step_timeout, read_line(stream, MAX_LINE_LEN)).await?;

    match Selection::parse(&reply)? {
        Selection::Fallback => Err(Error::Fallback),
        Selection::Use(id) => certs
            .get(&id)
            .cloned()
            .ok_or(Error::CertificateNotFound(id)),
    }
}
