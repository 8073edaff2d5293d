use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::errors::FrameError;
use super::frame::{Frame, OutboundFrame};

/// Framing codec for the STOMP text protocol.
///
/// Inbound EOLs between frames (server heartbeats) are consumed silently.
/// Bodies are delimited by the trailing NUL, or by `content-length` when the
/// broker sends one.
#[derive(Debug, Default)]
pub struct StompCodec;

impl StompCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for StompCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // Heartbeats are bare EOLs between frames.
        while src.first().is_some_and(|b| *b == b'\r' || *b == b'\n') {
            let _ = src.split_to(1);
        }

        let Some(header_end) = find_header_end(src) else {
            return Ok(None);
        };

        let head = std::str::from_utf8(&src[..header_end])
            .map_err(|_| FrameError::Invalid("non-UTF-8 frame header".to_string()))?;

        let mut lines = head.lines();
        let command = match lines.next() {
            Some(line) if !line.trim().is_empty() => line.trim_end_matches('\r').to_string(),
            _ => return Err(FrameError::Invalid("missing command line".to_string())),
        };

        let mut headers = Vec::new();
        for line in lines {
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                continue;
            }
            let Some((name, value)) = line.split_once(':') else {
                return Err(FrameError::Invalid(format!("header without colon: {line}")));
            };
            headers.push((name.to_string(), value.to_string()));
        }

        let body_start = skip_blank_line(src, header_end);

        let content_length = headers
            .iter()
            .find(|(n, _)| n == "content-length")
            .and_then(|(_, v)| v.trim().parse::<usize>().ok());

        let body_end = match content_length {
            Some(len) => {
                // Body plus the terminating NUL must be buffered.
                if src.len() < body_start + len + 1 {
                    return Ok(None);
                }
                body_start + len
            }
            None => match src[body_start..].iter().position(|b| *b == 0) {
                Some(offset) => body_start + offset,
                None => return Ok(None),
            },
        };

        let frame_bytes = src.split_to(body_end + 1);
        let body = String::from_utf8_lossy(&frame_bytes[body_start..body_end]).into_owned();

        Ok(Some(Frame {
            command,
            headers,
            body,
        }))
    }
}

impl Encoder<OutboundFrame> for StompCodec {
    type Error = FrameError;

    fn encode(&mut self, item: OutboundFrame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            OutboundFrame::Heartbeat => {
                dst.put_u8(b'\n');
            }
            OutboundFrame::Frame(frame) => {
                dst.extend_from_slice(frame.command.as_bytes());
                dst.put_u8(b'\n');
                for (name, value) in &frame.headers {
                    dst.extend_from_slice(name.as_bytes());
                    dst.put_u8(b':');
                    dst.extend_from_slice(value.as_bytes());
                    dst.put_u8(b'\n');
                }
                dst.put_u8(b'\n');
                dst.extend_from_slice(frame.body.as_bytes());
                dst.put_u8(0);
            }
        }
        Ok(())
    }
}

/// Offset of the `\n` closing the header section, i.e. the first EOL that is
/// immediately followed by another (optionally `\r`-prefixed) EOL.
fn find_header_end(src: &BytesMut) -> Option<usize> {
    let mut i = 0;
    while i < src.len() {
        if src[i] == b'\n' {
            match src.get(i + 1) {
                Some(b'\n') => return Some(i),
                Some(b'\r') if src.get(i + 2) == Some(&b'\n') => return Some(i),
                _ => {}
            }
        }
        i += 1;
    }
    None
}

/// First body byte after the blank line at `header_end`.
fn skip_blank_line(src: &BytesMut, header_end: usize) -> usize {
    if src.get(header_end + 1) == Some(&b'\r') {
        header_end + 3
    } else {
        header_end + 2
    }
}
