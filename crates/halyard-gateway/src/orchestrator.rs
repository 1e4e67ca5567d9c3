//! The agent loop: drain inbound bus traffic, run it
//! through Shield and the PII firewall, fold it into session history, ask
//! the language model for a reply, and push the reply back out through
//! the outbound queue. Every inbound [`BusMessageKind`] — user input,
//! cron/heartbeat system events, tool results — takes the same path; the
//! cron and heartbeat adapters deliberately inject their content as
//! ordinary inbound traffic specifically so this loop notices and reacts
//! to it the same way it would a chat message.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use halyard_bus::{Bus, BusError};
use halyard_core::agent::LanguageModel;
use halyard_core::config::HalyardConfig;
use halyard_core::pii;
use halyard_core::shield;
use halyard_sessions::{Role, SessionManager};

const REJECTION_REPLY: &str = "Rejected: injection detected.";

/// Poll interval used while blocking on `consume_inbound`.
const POLL_TIMEOUT_MS: u64 = 500;

pub struct Orchestrator {
    bus: Arc<Bus>,
    sessions: Arc<SessionManager>,
    llm: Arc<dyn LanguageModel>,
    config: HalyardConfig,
}

impl Orchestrator {
    pub fn new(
        bus: Arc<Bus>,
        sessions: Arc<SessionManager>,
        llm: Arc<dyn LanguageModel>,
        config: HalyardConfig,
    ) -> Self {
        Self { bus, sessions, llm, config }
    }

    pub async fn run(&self, shutdown: CancellationToken) {
        info!("orchestrator loop starting");
        loop {
            let msg = tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("orchestrator loop stopping");
                    return;
                }
                result = self.bus.consume_inbound(POLL_TIMEOUT_MS) => result,
            };

            let msg = match msg {
                Ok(msg) => msg,
                Err(BusError::Timeout { .. }) | Err(BusError::NotFound) => continue,
                Err(BusError::Eof) => {
                    info!("bus shut down, orchestrator loop exiting");
                    return;
                }
                Err(e) => {
                    warn!(error = %e, "failed to consume inbound message");
                    continue;
                }
            };

            if let Err(e) = self.handle(&msg).await {
                warn!(error = %e, channel = %msg.channel, "failed to handle inbound message");
            }
        }
    }

    async fn handle(&self, msg: &halyard_bus::BusMessage) -> halyard_core::error::Result<()> {
        let key = &msg.session_key;

        if self.config.shield.enabled && shield::detect_injection(msg.content.as_bytes()) {
            warn!(channel = %msg.channel, conversation_id = msg.conversation_id, "rejected inbound message: injection detected");
            self.bus
                .publish_outbound(&msg.channel, msg.conversation_id, REJECTION_REPLY.as_bytes())
                .await?;
            return Ok(());
        }

        let categories = pii::Categories {
            email: self.config.pii.email,
            phone: self.config.pii.phone,
            ssn: self.config.pii.ssn,
            credit_card: self.config.pii.credit_card,
            ipv4: self.config.pii.ip_address,
        };
        let sanitized = pii::redact(msg.content.as_bytes(), categories);

        self.sessions.add_message(key, Role::User, &sanitized).await?;

        let history = self.sessions.get_history(key, self.config.sessions.max_history).await?;
        let prompt = render_prompt(&history);

        let reply = match self.llm.complete(&prompt).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "language model failed to produce a reply");
                return Ok(());
            }
        };

        self.sessions.add_message(key, Role::Assistant, &reply).await?;
        self.bus.publish_outbound(&msg.channel, msg.conversation_id, reply.as_bytes()).await?;
        Ok(())
    }
}

fn render_prompt(history: &[halyard_sessions::Message]) -> String {
    let mut out = String::new();
    for turn in history {
        out.push_str(turn.role.as_str());
        out.push_str(": ");
        out.push_str(&turn.content);
        out.push('\n');
    }
    out
}
