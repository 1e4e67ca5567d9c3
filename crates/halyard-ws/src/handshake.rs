use base64::Engine;
use sha1::{Digest, Sha1};

use crate::error::{Result, WsError};

/// RFC 6455 §1.3 magic GUID, appended to the client's key before hashing.
const WS_MAGIC: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Compute the `Sec-WebSocket-Accept` value for a given `Sec-WebSocket-Key`.
pub fn accept_key(client_key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(client_key.as_bytes());
    hasher.update(WS_MAGIC.as_bytes());
    let digest = hasher.finalize();
    base64::engine::general_purpose::STANDARD.encode(digest)
}

/// Extract the `Sec-WebSocket-Key` header value from a raw HTTP upgrade
/// request. Case-sensitive on the header name.
pub fn extract_key(request: &str) -> Result<String> {
    for line in request.split("\r\n") {
        if let Some(rest) = line.strip_prefix("Sec-WebSocket-Key: ") {
            return Ok(rest.trim().to_string());
        }
    }
    Err(WsError::Handshake("missing Sec-WebSocket-Key header".into()))
}

/// Build the `101 Switching Protocols` response for a given client key.
pub fn build_response(client_key: &str) -> String {
    let accept = accept_key(client_key);
    format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Accept: {accept}\r\n\r\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The canonical RFC 6455 §1.3 worked example.
    #[test]
    fn rfc6455_worked_example() {
        assert_eq!(accept_key("dGhlIHNhbXBsZSBub25jZQ=="), "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
    }

    #[test]
    fn extracts_key_from_request_headers() {
        let req = "GET /ws HTTP/1.1\r\nHost: localhost\r\nSec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\nUpgrade: websocket\r\n\r\n";
        assert_eq!(extract_key(req).unwrap(), "dGhlIHNhbXBsZSBub25jZQ==");
    }

    #[test]
    fn missing_key_header_is_an_error() {
        let req = "GET /ws HTTP/1.1\r\nHost: localhost\r\n\r\n";
        assert!(extract_key(req).is_err());
    }
}
