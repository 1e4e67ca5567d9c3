use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Result, WsError};

pub const MAX_FRAME_SIZE: usize = 64 * 1024;

const OPCODE_TEXT: u8 = 0x1;
const OPCODE_CLOSE: u8 = 0x8;
const OPCODE_PING: u8 = 0x9;
const OPCODE_PONG: u8 = 0xA;

#[derive(Debug, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Ping(Vec<u8>),
    Pong,
    Close,
}

/// Read one frame off `stream`. Text frames only are surfaced as payload;
/// every non-text, non-control opcode (binary, fragmented continuations)
/// is treated as a protocol violation rather than reassembled.
pub async fn read_frame<S: AsyncRead + Unpin>(stream: &mut S, max_len: usize) -> Result<Frame> {
    let mut header = [0u8; 2];
    stream.read_exact(&mut header).await?;

    let opcode = header[0] & 0x0F;
    let masked = header[1] & 0x80 != 0;
    let mut payload_len = (header[1] & 0x7F) as u64;

    if opcode == OPCODE_CLOSE {
        return Ok(Frame::Close);
    }

    match payload_len {
        126 => {
            let mut ext = [0u8; 2];
            stream.read_exact(&mut ext).await?;
            payload_len = u16::from_be_bytes(ext) as u64;
        }
        127 => {
            let mut ext = [0u8; 8];
            stream.read_exact(&mut ext).await?;
            payload_len = u64::from_be_bytes(ext);
        }
        _ => {}
    }

    if payload_len as usize > max_len || payload_len as usize > MAX_FRAME_SIZE {
        return Err(WsError::Protocol(format!("frame of {payload_len} bytes exceeds limit")));
    }

    // RFC 6455 §5.1: a server MUST close the connection on an unmasked
    // client frame. Control frames still carry a mask key, so this check
    // applies uniformly across ping/pong/text.
    if !masked {
        return Err(WsError::Protocol("client frame must be masked".into()));
    }
    let mut mask = [0u8; 4];
    stream.read_exact(&mut mask).await?;

    let mut payload = vec![0u8; payload_len as usize];
    stream.read_exact(&mut payload).await?;
    for (i, byte) in payload.iter_mut().enumerate() {
        *byte ^= mask[i % 4];
    }

    match opcode {
        OPCODE_TEXT => Ok(Frame::Text(String::from_utf8_lossy(&payload).into_owned())),
        OPCODE_PING => Ok(Frame::Ping(payload)),
        OPCODE_PONG => Ok(Frame::Pong),
        other => Err(WsError::Protocol(format!("unsupported opcode 0x{other:x}"))),
    }
}

fn build_header(opcode: u8, len: usize) -> Vec<u8> {
    let mut header = vec![0x80 | opcode];
    if len < 126 {
        header.push(len as u8);
    } else if len < 65536 {
        header.push(126);
        header.extend_from_slice(&(len as u16).to_be_bytes());
    } else {
        header.push(127);
        header.extend_from_slice(&(len as u64).to_be_bytes());
    }
    header
}

/// Write an unmasked text frame — servers never mask outgoing frames.
pub async fn write_text<S: AsyncWrite + Unpin>(stream: &mut S, text: &str) -> Result<()> {
    let bytes = text.as_bytes();
    let mut out = build_header(OPCODE_TEXT, bytes.len());
    out.extend_from_slice(bytes);
    stream.write_all(&out).await?;
    Ok(())
}

pub async fn write_pong<S: AsyncWrite + Unpin>(stream: &mut S, payload: &[u8]) -> Result<()> {
    let mut out = build_header(OPCODE_PONG, payload.len());
    out.extend_from_slice(payload);
    stream.write_all(&out).await?;
    Ok(())
}

pub async fn write_close<S: AsyncWrite + Unpin>(stream: &mut S) -> Result<()> {
    stream.write_all(&[0x88, 0x00]).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn masked_text_frame(text: &str, mask: [u8; 4]) -> Vec<u8> {
        let bytes = text.as_bytes();
        let mut out = vec![0x81, 0x80 | (bytes.len() as u8)];
        out.extend_from_slice(&mask);
        for (i, b) in bytes.iter().enumerate() {
            out.push(b ^ mask[i % 4]);
        }
        out
    }

    #[tokio::test]
    async fn reads_masked_text_frame() {
        let raw = masked_text_frame("hello", [0x11, 0x22, 0x33, 0x44]);
        let mut cursor = Cursor::new(raw);
        let frame = read_frame(&mut cursor, MAX_FRAME_SIZE).await.unwrap();
        assert_eq!(frame, Frame::Text("hello".into()));
    }

    #[tokio::test]
    async fn rejects_unmasked_client_frame() {
        let raw = vec![0x81, 0x05, b'h', b'e', b'l', b'l', b'o'];
        let mut cursor = Cursor::new(raw);
        assert!(read_frame(&mut cursor, MAX_FRAME_SIZE).await.is_err());
    }

    #[tokio::test]
    async fn close_frame_is_recognised() {
        let raw = vec![0x88, 0x00];
        let mut cursor = Cursor::new(raw);
        let frame = read_frame(&mut cursor, MAX_FRAME_SIZE).await.unwrap();
        assert_eq!(frame, Frame::Close);
    }

    #[tokio::test]
    async fn writes_unmasked_text_frame() {
        let mut buf = Vec::new();
        write_text(&mut buf, "hi").await.unwrap();
        assert_eq!(buf, vec![0x81, 0x02, b'h', b'i']);
    }

    #[tokio::test]
    async fn oversized_frame_is_rejected() {
        let mut out = vec![0x81, 0x80 | 127u8];
        out.extend_from_slice(&((MAX_FRAME_SIZE as u64) + 1).to_be_bytes());
        out.extend_from_slice(&[0, 0, 0, 0]);
        let mut cursor = Cursor::new(out);
        assert!(read_frame(&mut cursor, MAX_FRAME_SIZE).await.is_err());
    }
}
