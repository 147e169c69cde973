//! Content-Length framed JSON codec.
//!
//! Every LSP message is a UTF-8 JSON body preceded by header lines and a
//! blank line, of which only `Content-Length` matters:
//!
//! ```text
//! Content-Length: 123\r\n
//! \r\n
//! {"jsonrpc":"2.0",...}
//! ```
//!
//! Unknown header lines are skipped. A body that fails to parse as JSON is
//! a [`Error::Deserialize`] the caller may treat as non-fatal: the exact
//! byte count was already consumed, so the stream stays aligned on the next
//! frame boundary.

use serde::Serialize;
use serde_json::Value as JsonValue;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::Result;

/// Serialize a payload into a framed byte buffer ready to write.
pub fn encode<T: Serialize>(payload: &T) -> Result<Vec<u8>> {
	let body = serde_json::to_vec(payload)?;
	let mut framed = Vec::with_capacity(body.len() + 32);
	framed.extend_from_slice(format!("Content-Length: {}\r\n\r\n", body.len()).as_bytes());
	framed.extend_from_slice(&body);
	Ok(framed)
}

/// Read one framed body from the stream.
///
/// Returns `Ok(None)` on clean EOF between frames. EOF inside a declared
/// body surfaces as an I/O error from the exact read.
pub async fn read_frame<R>(reader: &mut R, scratch: &mut String) -> Result<Option<Vec<u8>>>
where
	R: AsyncBufRead + Unpin,
{
	let mut content_length: Option<usize> = None;

	let length = loop {
		scratch.clear();
		if reader.read_line(scratch).await? == 0 {
			return Ok(None);
		}

		let line = scratch.trim_end_matches(['\r', '\n']);
		if line.is_empty() {
			// Blank line terminates the header block; without a
			// Content-Length there is no body to read, keep scanning.
			match content_length {
				Some(length) => break length,
				None => continue,
			}
		}

		if let Some(value) = line.strip_prefix("Content-Length:")
			&& let Ok(length) = value.trim().parse::<usize>()
		{
			content_length = Some(length);
		}
	};

	let mut body = vec![0u8; length];
	reader.read_exact(&mut body).await?;
	Ok(Some(body))
}

/// Read one frame and parse its body as JSON.
pub async fn read_message<R>(reader: &mut R, scratch: &mut String) -> Result<Option<JsonValue>>
where
	R: AsyncBufRead + Unpin,
{
	match read_frame(reader, scratch).await? {
		None => Ok(None),
		Some(body) => Ok(Some(serde_json::from_slice(&body)?)),
	}
}
