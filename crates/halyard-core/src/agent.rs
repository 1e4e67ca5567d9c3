//! Collaborator interface for the language-model back-end.
//!
//! The LLM chat client itself is out of scope for the core — orchestration
//! only needs something it can hand a prompt to and get text back.
//! [`EchoLanguageModel`] is the trivial built-in implementation used in
//! tests and examples to exercise the full inbound→session→outbound path
//! without a network dependency.

use async_trait::async_trait;

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Completes a single prompt (already fully built by the caller —
    /// history, summary, and system context all folded in) and returns the
    /// reply text.
    async fn complete(&self, prompt: &str) -> crate::error::Result<String>;
}

/// Echoes the prompt's last line back, prefixed. Deterministic, offline,
/// sufficient to drive the session summarisation and orchestration tests.
pub struct EchoLanguageModel;

#[async_trait]
impl LanguageModel for EchoLanguageModel {
    async fn complete(&self, prompt: &str) -> crate::error::Result<String> {
        let last_line = prompt.lines().last().unwrap_or("").trim();
        Ok(format!("echo: {}", last_line))
    }
}

/// Collaborator interface for invoking a named tool with a single string of
/// arguments — used by the cron scheduler's `Tool` action kind.
///
/// The tool registry itself (shell, file, search, ... implementations) is
/// out of scope; this trait exists so the scheduler's dispatch code path
/// is complete and testable without depending on any concrete registry.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    /// Invoke `name` with `args` and return its textual result.
    async fn invoke(&self, name: &str, args: &str) -> crate::error::Result<String>;
}

/// Always fails with [`crate::error::HalyardError::NotFound`] — the
/// built-in stand-in used where no tool registry is configured.
pub struct NoToolInvoker;

#[async_trait]
impl ToolInvoker for NoToolInvoker {
    async fn invoke(&self, name: &str, _args: &str) -> crate::error::Result<String> {
        Err(crate::error::HalyardError::NotFound(format!(
            "no tool registry configured, cannot invoke {name}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echo_model_reflects_last_line() {
        let model = EchoLanguageModel;
        let reply = model.complete("line one\nline two").await.unwrap();
        assert_eq!(reply, "echo: line two");
    }

    #[tokio::test]
    async fn no_tool_invoker_always_fails() {
        let err = NoToolInvoker.invoke("shell", "echo hi").await.unwrap_err();
        assert_eq!(err.code(), "not_found");
    }
}
