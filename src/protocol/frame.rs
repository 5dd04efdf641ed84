//! Command encoding and reply parsing
//!
//! The parser scans the buffer without consuming it and only advances once a
//! complete reply is available, so a partial read never loses bytes.

use super::types::{FrameError, Reply};
use bytes::{Buf, BufMut, Bytes, BytesMut};

const CRLF: &[u8] = b"\r\n";

/// Encode one command as a RESP2 array of bulk strings.
pub fn write_command(buf: &mut BytesMut, args: &[&[u8]]) {
    buf.put_u8(b'*');
    buf.put_slice(args.len().to_string().as_bytes());
    buf.put_slice(CRLF);

    for arg in args {
        buf.put_u8(b'$');
        buf.put_slice(arg.len().to_string().as_bytes());
        buf.put_slice(CRLF);
        buf.put_slice(arg);
        buf.put_slice(CRLF);
    }
}

/// Parse one reply from the front of the buffer.
///
/// Returns `Ok(Some(reply))` and consumes its bytes when a complete reply is
/// present, `Ok(None)` when more data is needed.
pub fn decode(buf: &mut BytesMut) -> Result<Option<Reply>, FrameError> {
    match parse_at(buf, 0)? {
        Some((reply, end)) => {
            buf.advance(end);
            Ok(Some(reply))
        }
        None => Ok(None),
    }
}

/// Parse the reply starting at `pos`, returning it with the offset of its end.
fn parse_at(input: &[u8], pos: usize) -> Result<Option<(Reply, usize)>, FrameError> {
    let Some(&prefix) = input.get(pos) else {
        return Ok(None);
    };
    let Some((line, body)) = take_line(input, pos + 1) else {
        return Ok(None);
    };

    match prefix {
        b'+' => Ok(Some((Reply::Simple(utf8(line)?), body))),
        b'-' => Ok(Some((Reply::Error(utf8(line)?), body))),
        b':' => Ok(Some((Reply::Integer(integer(line)?), body))),
        b'$' => parse_bulk(input, line, body),
        b'*' => parse_array(input, line, body),
        other => Err(FrameError::UnknownPrefix(other as char)),
    }
}

/// Bulk string: the length line has been read, data follows at `body`.
fn parse_bulk(input: &[u8], line: &[u8], body: usize) -> Result<Option<(Reply, usize)>, FrameError> {
    let len = integer(line)?;
    if len == -1 {
        return Ok(Some((Reply::Null, body)));
    }
    if len < 0 {
        return Err(FrameError::BadLength(len));
    }

    let len = len as usize;
    let end = body + len + CRLF.len();
    if input.len() < end {
        return Ok(None);
    }
    if &input[body + len..end] != CRLF {
        return Err(FrameError::MissingTerminator);
    }

    let data = Bytes::copy_from_slice(&input[body..body + len]);
    Ok(Some((Reply::Bulk(data), end)))
}

/// Array: the count line has been read, elements follow at `body`.
fn parse_array(input: &[u8], line: &[u8], body: usize) -> Result<Option<(Reply, usize)>, FrameError> {
    let count = integer(line)?;
    if count == -1 {
        return Ok(Some((Reply::Null, body)));
    }
    if count < 0 {
        return Err(FrameError::BadLength(count));
    }

    let mut items = Vec::with_capacity(count as usize);
    let mut pos = body;
    for _ in 0..count {
        match parse_at(input, pos)? {
            Some((item, end)) => {
                items.push(item);
                pos = end;
            }
            None => return Ok(None),
        }
    }

    Ok(Some((Reply::Array(items), pos)))
}

/// Find the CRLF-terminated line starting at `from`.
///
/// Returns the line without its terminator and the offset just past it.
fn take_line(input: &[u8], from: usize) -> Option<(&[u8], usize)> {
    let mut i = from;
    while i + 1 < input.len() {
        if &input[i..i + 2] == CRLF {
            return Some((&input[from..i], i + 2));
        }
        i += 1;
    }
    None
}

fn utf8(line: &[u8]) -> Result<String, FrameError> {
    std::str::from_utf8(line)
        .map(str::to_string)
        .map_err(|_| FrameError::InvalidUtf8)
}

fn integer(line: &[u8]) -> Result<i64, FrameError> {
    std::str::from_utf8(line)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or(FrameError::BadInteger)
}
