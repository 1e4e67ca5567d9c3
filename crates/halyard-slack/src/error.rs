/// Errors produced by the Slack webhook adapter.
#[derive(Debug, thiserror::Error)]
pub enum SlackError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("webhook returned status {0}")]
    BadStatus(reqwest::StatusCode),
}
