//! RESP2 framing shared by the server and the peer client

use std::fmt;

use bytes::{Buf, BufMut, BytesMut};

/// Largest bulk payload accepted (512 MB)
const MAX_BULK_LEN: usize = 512 * 1024 * 1024;

/// Largest array accepted (1M elements)
const MAX_ARRAY_LEN: usize = 1024 * 1024;

/// One RESP value
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// `+OK\r\n`
    Simple(String),
    /// `-ERR message\r\n`
    Error(String),
    /// `:1000\r\n`
    Integer(i64),
    /// `$6\r\nfoobar\r\n`
    Bulk(Vec<u8>),
    /// `$-1\r\n`
    Null,
    /// `*2\r\n...`
    Array(Vec<Frame>),
}

/// Malformed or oversized input
#[derive(Debug, Clone, PartialEq)]
pub enum FrameError {
    /// Leading byte is not a RESP type marker
    UnknownType(u8),
    /// Header or terminator could not be parsed
    Invalid(&'static str),
    /// Declared length exceeds the configured maximum
    TooLarge {
        /// "bulk string" or "array"
        kind: &'static str,
        /// Declared length
        len: usize,
        /// Limit
        max: usize,
    },
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::UnknownType(b) => write!(f, "unknown RESP type byte {:?}", *b as char),
            FrameError::Invalid(what) => write!(f, "invalid frame: {}", what),
            FrameError::TooLarge { kind, len, max } => {
                write!(f, "{} too large: {} (max {})", kind, len, max)
            }
        }
    }
}

impl std::error::Error for FrameError {}

impl Frame {
    /// Bulk string frame
    pub fn bulk(data: impl Into<Vec<u8>>) -> Self {
        Frame::Bulk(data.into())
    }

    /// Error frame with the conventional `ERR` prefix
    pub fn err(msg: impl fmt::Display) -> Self {
        Frame::Error(format!("ERR {}", msg))
    }

    /// Command frame: an array of bulk strings
    pub fn command(parts: &[&str]) -> Self {
        Frame::Array(parts.iter().map(|p| Frame::bulk(p.as_bytes())).collect())
    }

    /// Append the wire encoding to `dst`
    pub fn encode(&self, dst: &mut BytesMut) {
        match self {
            Frame::Simple(s) => {
                dst.put_u8(b'+');
                dst.put_slice(s.as_bytes());
                dst.put_slice(b"\r\n");
            }
            Frame::Error(e) => {
                dst.put_u8(b'-');
                dst.put_slice(e.as_bytes());
                dst.put_slice(b"\r\n");
            }
            Frame::Integer(n) => dst.put_slice(format!(":{}\r\n", n).as_bytes()),
            Frame::Bulk(data) => {
                dst.put_slice(format!("${}\r\n", data.len()).as_bytes());
                dst.put_slice(data);
                dst.put_slice(b"\r\n");
            }
            Frame::Null => dst.put_slice(b"$-1\r\n"),
            Frame::Array(items) => {
                dst.put_slice(format!("*{}\r\n", items.len()).as_bytes());
                for item in items {
                    item.encode(dst);
                }
            }
        }
    }

    /// Encoded bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();
        self.encode(&mut buf);
        buf.to_vec()
    }

    /// Take one complete frame off the front of `buf`
    ///
    /// Returns `Ok(None)` and leaves `buf` untouched when more input is needed.
    pub fn decode(buf: &mut BytesMut) -> Result<Option<Frame>, FrameError> {
        let mut pos = 0;
        match parse(&buf[..], &mut pos)? {
            Some(frame) => {
                buf.advance(pos);
                Ok(Some(frame))
            }
            None => Ok(None),
        }
    }
}

fn parse(src: &[u8], pos: &mut usize) -> Result<Option<Frame>, FrameError> {
    let Some(&marker) = src.get(*pos) else {
        return Ok(None);
    };
    *pos += 1;

    let Some(header) = line(src, pos) else {
        return Ok(None);
    };

    match marker {
        b'+' => Ok(Some(Frame::Simple(text(header)?))),
        b'-' => Ok(Some(Frame::Error(text(header)?))),
        b':' => Ok(Some(Frame::Integer(number(header)?))),
        b'$' => {
            let len = number(header)?;
            if len == -1 {
                return Ok(Some(Frame::Null));
            }
            let len = length(len, "bulk string", MAX_BULK_LEN)?;

            if src.len() < *pos + len + 2 {
                return Ok(None);
            }
            let data = src[*pos..*pos + len].to_vec();
            if &src[*pos + len..*pos + len + 2] != b"\r\n" {
                return Err(FrameError::Invalid("bulk string not terminated by CRLF"));
            }
            *pos += len + 2;

            Ok(Some(Frame::Bulk(data)))
        }
        b'*' => {
            let len = number(header)?;
            if len == -1 {
                return Ok(Some(Frame::Null));
            }
            let len = length(len, "array", MAX_ARRAY_LEN)?;

            let mut items = Vec::with_capacity(len.min(64));
            for _ in 0..len {
                match parse(src, pos)? {
                    Some(item) => items.push(item),
                    None => return Ok(None),
                }
            }

            Ok(Some(Frame::Array(items)))
        }
        other => Err(FrameError::UnknownType(other)),
    }
}

fn line<'a>(src: &'a [u8], pos: &mut usize) -> Option<&'a [u8]> {
    let start = *pos;
    let end = src[start..].windows(2).position(|w| w == b"\r\n")? + start;
    *pos = end + 2;
    Some(&src[start..end])
}

fn text(line: &[u8]) -> Result<String, FrameError> {
    String::from_utf8(line.to_vec()).map_err(|_| FrameError::Invalid("line is not UTF-8"))
}

fn number(line: &[u8]) -> Result<i64, FrameError> {
    std::str::from_utf8(line)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or(FrameError::Invalid("expected an integer"))
}

fn length(len: i64, kind: &'static str, max: usize) -> Result<usize, FrameError> {
    let len = usize::try_from(len).map_err(|_| FrameError::Invalid("negative length"))?;
    if len > max {
        return Err(FrameError::TooLarge { kind, len, max });
    }
    Ok(len)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(data: &[u8]) -> Frame {
        let mut buf = BytesMut::from(data);
        let frame = Frame::decode(&mut buf).unwrap().unwrap();
        assert!(buf.is_empty());
        frame
    }

    #[test]
    fn test_scalar_frames() {
        assert_eq!(decode_all(b"+OK\r\n"), Frame::Simple("OK".to_string()));
        assert_eq!(decode_all(b"-ERR boom\r\n"), Frame::Error("ERR boom".to_string()));
        assert_eq!(decode_all(b":-12\r\n"), Frame::Integer(-12));
        assert_eq!(decode_all(b"$-1\r\n"), Frame::Null);
    }

    #[test]
    fn test_binary_bulk_string() {
        let frame = Frame::bulk(vec![0u8, b'\r', b'\n', 255]);
        assert_eq!(decode_all(&frame.to_bytes()), frame);
    }

    #[test]
    fn test_command_encoding() {
        let frame = Frame::command(&["GET", "scores", "Tom"]);
        assert_eq!(
            frame.to_bytes(),
            b"*3\r\n$3\r\nGET\r\n$6\r\nscores\r\n$3\r\nTom\r\n".to_vec()
        );
    }

    #[test]
    fn test_incomplete_input_is_kept() {
        for partial in [
            &b"$6\r\nfoo"[..],
            &b"*2\r\n$3\r\nGET\r\n"[..],
            &b"+OK"[..],
            &b"$"[..],
        ] {
            let mut buf = BytesMut::from(partial);
            assert_eq!(Frame::decode(&mut buf).unwrap(), None);
            assert_eq!(&buf[..], partial);
        }
    }

    #[test]
    fn test_pipelined_frames() {
        let mut buf = BytesMut::from(&b"+A\r\n:1\r\n"[..]);
        assert_eq!(Frame::decode(&mut buf).unwrap(), Some(Frame::Simple("A".into())));
        assert_eq!(Frame::decode(&mut buf).unwrap(), Some(Frame::Integer(1)));
        assert_eq!(Frame::decode(&mut buf).unwrap(), None);
    }

    #[test]
    fn test_malformed_input() {
        let mut buf = BytesMut::from(&b"?what\r\n"[..]);
        assert_eq!(Frame::decode(&mut buf), Err(FrameError::UnknownType(b'?')));

        let mut buf = BytesMut::from(&b"$3\r\nfoobar\r\n"[..]);
        assert!(matches!(Frame::decode(&mut buf), Err(FrameError::Invalid(_))));

        let mut buf = BytesMut::from(&b"*99999999\r\n"[..]);
        assert!(matches!(
            Frame::decode(&mut buf),
            Err(FrameError::TooLarge { kind: "array", .. })
        ));
    }
}
