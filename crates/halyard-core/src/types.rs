use serde::{Deserialize, Serialize};
use std::fmt;

/// Session key: `"<transport>:<conversation_id>"`.
///
/// One session per (transport, conversation) pair — Alice on Telegram and
/// Alice on Discord are two distinct sessions, since the key carries no
/// user identity, only the transport and its own conversation id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey(pub String);

impl SessionKey {
    pub fn build(transport: &str, conv_id: i64) -> Self {
        Self(format!("{}:{}", transport, conv_id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Splits back into `(transport, conv_id)`. The transport name may not
    /// itself contain `:`; the split is on the *last* colon so a transport
    /// name is never mistaken for part of the id.
    pub fn parse(&self) -> std::result::Result<(String, i64), String> {
        let (transport, conv_id) = self
            .0
            .rsplit_once(':')
            .ok_or_else(|| format!("malformed session key: {}", self.0))?;
        if transport.is_empty() {
            return Err(format!("malformed session key: {}", self.0));
        }
        let conv_id = conv_id
            .parse::<i64>()
            .map_err(|_| format!("malformed session key: {}", self.0))?;
        Ok((transport.to_string(), conv_id))
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod session_key_tests {
    use super::*;

    #[test]
    fn build_and_parse_roundtrip() {
        let key = SessionKey::build("telegram", 100);
        assert_eq!(key.as_str(), "telegram:100");
        let (transport, conv_id) = key.parse().unwrap();
        assert_eq!(transport, "telegram");
        assert_eq!(conv_id, 100);
    }

    #[test]
    fn parse_rejects_missing_colon() {
        let key = SessionKey("no-colon-here".to_string());
        assert!(key.parse().is_err());
    }

    #[test]
    fn parse_rejects_non_numeric_conv_id() {
        let key = SessionKey("telegram:not-a-number".to_string());
        assert!(key.parse().is_err());
    }

    #[test]
    fn negative_conv_id_is_valid() {
        let key = SessionKey::build("websocket", -7);
        let (_, conv_id) = key.parse().unwrap();
        assert_eq!(conv_id, -7);
    }
}
