//! Length-framed request/reply codec shared by the agent and the server.
//!
//! Every frame starts with one ASCII line:
//!   `<command> <meta_len>\n`             (no payload)
//!   `<command> <meta_len> <data_len>\n`  (with payload)
//! followed by exactly `meta_len` bytes of JSON and `data_len` raw bytes.
//! Replies use the same shape with a status word (`ok`/`error`) in place of
//! the command.

use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::ProtocolError;
use crate::message::{STATUS_ERROR, STATUS_OK};

pub struct RequestFrame {
    pub command: String,
    pub meta: Value,
    pub data: Vec<u8>,
}

#[derive(Debug)]
pub enum Reply {
    Ok(Option<Value>),
    Error(Option<Value>),
}

impl Reply {
    pub fn into_result(self) -> Result<Option<Value>, ProtocolError> {
        match self {
            Reply::Ok(payload) => Ok(payload),
            Reply::Error(payload) => {
                let message = payload
                    .as_ref()
                    .and_then(|v| v.get("error"))
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown error")
                    .to_string();
                Err(ProtocolError::ServerError(message))
            }
        }
    }
}

async fn read_line<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<String, ProtocolError> {
    let mut line = String::new();
    let n = reader.read_line(&mut line).await?;
    if n == 0 {
        return Err(ProtocolError::ConnectionClosed);
    }
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    Ok(line)
}

/// Read one `<command> <meta_len> [data_len]` frame.
pub async fn read_request<R: AsyncBufRead + Unpin>(
    reader: &mut R,
) -> Result<RequestFrame, ProtocolError> {
    let line = read_line(reader).await?;
    let parts: Vec<&str> = line.split_whitespace().collect();
    let (command, meta_len, data_len) = match parts.as_slice() {
        [command, meta_len] => (command.to_string(), meta_len.parse::<usize>()?, 0usize),
        [command, meta_len, data_len] => (
            command.to_string(),
            meta_len.parse::<usize>()?,
            data_len.parse::<usize>()?,
        ),
        _ => return Err(ProtocolError::MalformedFrame(line)),
    };

    let mut meta_bytes = vec![0u8; meta_len];
    reader.read_exact(&mut meta_bytes).await?;
    let meta: Value = serde_json::from_slice(&meta_bytes)?;

    let mut data = vec![0u8; data_len];
    reader.read_exact(&mut data).await?;

    Ok(RequestFrame {
        command,
        meta,
        data,
    })
}

/// Write one `<command> <meta_len> [data_len]` frame.
pub async fn write_request<W: AsyncWrite + Unpin>(
    writer: &mut W,
    command: &str,
    meta: &impl Serialize,
    data: &[u8],
) -> Result<(), ProtocolError> {
    let meta_bytes = serde_json::to_vec(meta)?;
    let header_line = if data.is_empty() {
        format!("{command} {}\n", meta_bytes.len())
    } else {
        format!("{command} {} {}\n", meta_bytes.len(), data.len())
    };
    writer.write_all(header_line.as_bytes()).await?;
    writer.write_all(&meta_bytes).await?;
    writer.write_all(data).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one `<status> [reply_len]` reply.
pub async fn read_reply<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<Reply, ProtocolError> {
    let line = read_line(reader).await?;
    let parts: Vec<&str> = line.split_whitespace().collect();
    let (status, reply_len) = match parts.as_slice() {
        [status] => (*status, 0usize),
        [status, reply_len] => (*status, reply_len.parse::<usize>()?),
        _ => return Err(ProtocolError::MalformedFrame(line)),
    };

    let payload = if reply_len > 0 {
        let mut buf = vec![0u8; reply_len];
        reader.read_exact(&mut buf).await?;
        Some(serde_json::from_slice(&buf)?)
    } else {
        None
    };

    match status {
        STATUS_OK => Ok(Reply::Ok(payload)),
        STATUS_ERROR => Ok(Reply::Error(payload)),
        other => Err(ProtocolError::UnexpectedStatus(other.to_string())),
    }
}

pub async fn write_reply_ok<W: AsyncWrite + Unpin>(
    writer: &mut W,
    payload: Option<&impl Serialize>,
) -> Result<(), ProtocolError> {
    write_reply(writer, STATUS_OK, payload).await
}

pub async fn write_reply_error<W: AsyncWrite + Unpin>(
    writer: &mut W,
    message: &str,
) -> Result<(), ProtocolError> {
    let payload = serde_json::json!({ "error": message });
    write_reply(writer, STATUS_ERROR, Some(&payload)).await
}

async fn write_reply<W: AsyncWrite + Unpin>(
    writer: &mut W,
    status: &str,
    payload: Option<&impl Serialize>,
) -> Result<(), ProtocolError> {
    match payload {
        Some(payload) => {
            let bytes = serde_json::to_vec(payload)?;
            writer
                .write_all(format!("{status} {}\n", bytes.len()).as_bytes())
                .await?;
            writer.write_all(&bytes).await?;
        }
        None => {
            writer.write_all(format!("{status} 0\n").as_bytes()).await?;
        }
    }
    writer.flush().await?;
    Ok(())
}

/// Apply a per-operation deadline to a network read/write future.
pub async fn with_deadline<F, T>(duration: std::time::Duration, fut: F) -> Result<T, ProtocolError>
where
    F: std::future::Future<Output = Result<T, ProtocolError>>,
{
    tokio::time::timeout(duration, fut)
        .await
        .map_err(|_| ProtocolError::Timeout)?
}
