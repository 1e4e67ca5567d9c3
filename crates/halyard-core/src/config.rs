use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Top-level config (halyard.toml + HALYARD_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HalyardConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub channels: ChannelsConfig,
    #[serde(default)]
    pub shield: ShieldConfig,
    #[serde(default)]
    pub pii: PiiConfig,
    #[serde(default)]
    pub auth: TokenAuthConfig,
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub cron: CronConfig,
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
    #[serde(default)]
    pub websocket: WebSocketConfig,
}

/// Gateway binding configuration — the health/status HTTP surface only;
/// the core wire protocol is `halyard-ws`, not this listener.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
        }
    }
}

fn default_port() -> u16 {
    8088
}
fn default_bind() -> String {
    "127.0.0.1".to_string()
}

/// Shield (byte-grammar filter) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShieldConfig {
    /// Master switch — when false, the orchestration task skips the
    /// input-injection check entirely.
    #[serde(default = "bool_true")]
    pub enabled: bool,
}

impl Default for ShieldConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// PII firewall configuration — per-category toggles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PiiConfig {
    #[serde(default = "bool_true")]
    pub email: bool,
    #[serde(default = "bool_true")]
    pub phone: bool,
    #[serde(default = "bool_true")]
    pub ssn: bool,
    #[serde(default = "bool_true")]
    pub credit_card: bool,
    #[serde(default = "bool_true")]
    pub ip_address: bool,
}

impl Default for PiiConfig {
    fn default() -> Self {
        Self {
            email: true,
            phone: true,
            ssn: true,
            credit_card: true,
            ip_address: true,
        }
    }
}

/// Bearer-token auth store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenAuthConfig {
    /// Development mode: `Validate` grants the all-ones permission mask to
    /// any token, including an unknown one. Never enable in production.
    #[serde(default)]
    pub dev_mode_grant_all: bool,
    /// Default expiry in seconds for newly created tokens (0 = no expiry).
    #[serde(default)]
    pub default_expiry_secs: u64,
}

impl Default for TokenAuthConfig {
    fn default() -> Self {
        Self {
            dev_mode_grant_all: false,
            default_expiry_secs: 0,
        }
    }
}

/// Message bus configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    #[serde(default = "default_bus_capacity")]
    pub inbound_capacity: usize,
    #[serde(default = "default_bus_capacity")]
    pub outbound_capacity: usize,
    #[serde(default = "default_arena_bytes")]
    pub arena_bytes: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            inbound_capacity: default_bus_capacity(),
            outbound_capacity: default_bus_capacity(),
            arena_bytes: default_arena_bytes(),
        }
    }
}

fn default_bus_capacity() -> usize {
    256
}
fn default_arena_bytes() -> usize {
    64 * 1024
}

/// Session manager configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    #[serde(default = "default_max_history")]
    pub max_history: usize,
    #[serde(default = "default_keep_recent")]
    pub keep_recent: usize,
    #[serde(default = "default_session_table_capacity")]
    pub table_capacity: usize,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            max_history: default_max_history(),
            keep_recent: default_keep_recent(),
            table_capacity: default_session_table_capacity(),
        }
    }
}

fn default_max_history() -> usize {
    30
}
fn default_keep_recent() -> usize {
    10
}
fn default_session_table_capacity() -> usize {
    256
}

/// Cron scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CronConfig {
    #[serde(default = "default_cron_tick_secs")]
    pub tick_secs: u64,
    #[serde(default = "default_cron_capacity")]
    pub job_capacity: usize,
}

impl Default for CronConfig {
    fn default() -> Self {
        Self {
            tick_secs: default_cron_tick_secs(),
            job_capacity: default_cron_capacity(),
        }
    }
}

fn default_cron_tick_secs() -> u64 {
    1
}
fn default_cron_capacity() -> usize {
    32
}

/// Heartbeat configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    #[serde(default = "default_heartbeat_interval")]
    pub interval_secs: u64,
    #[serde(default = "default_workspace_path")]
    pub workspace_path: String,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_heartbeat_interval(),
            workspace_path: default_workspace_path(),
        }
    }
}

fn default_heartbeat_interval() -> u64 {
    1800
}
fn default_workspace_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.halyard/workspace", home)
}

/// Hand-rolled WebSocket server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSocketConfig {
    #[serde(default = "default_ws_port")]
    pub port: u16,
    #[serde(default = "default_ws_max_clients")]
    pub max_clients: usize,
    #[serde(default = "default_ws_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            port: default_ws_port(),
            max_clients: default_ws_max_clients(),
            max_frame_bytes: default_ws_max_frame_bytes(),
        }
    }
}

fn default_ws_port() -> u16 {
    18790
}
fn default_ws_max_clients() -> usize {
    16
}
fn default_ws_max_frame_bytes() -> usize {
    64 * 1024
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.halyard/halyard.db", home)
}

/// Channel adapters enabled for this deployment. Each sub-config is `None`
/// when that channel is not configured; the gateway skips registering it.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChannelsConfig {
    pub telegram: Option<TelegramConfig>,
    pub discord: Option<DiscordConfig>,
    pub slack: Option<SlackConfig>,
    #[serde(default = "bool_true")]
    pub tui_enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    pub bot_token: String,
    /// Channel id to poll for inbound messages.
    pub channel_id: u64,
}

/// Webhook-only outbound channel (Slack-style): a fixed webhook URL,
/// `poll` always returns `Timeout`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackConfig {
    pub webhook_url: String,
}

fn bool_true() -> bool {
    true
}

impl HalyardConfig {
    /// Load config from a TOML file with HALYARD_* env var overrides.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: HalyardConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("HALYARD_").split("_"))
            .extract()
            .map_err(|e| crate::error::HalyardError::Config(e.to_string()))?;

        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.halyard/halyard.toml", home)
}
