//! Config schema types (server, auth, upstream, database).

use {
    secrecy::SecretString,
    serde::Deserialize,
};

use crate::profile::CallProfile;

pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_DATABASE_URL: &str = "sqlite://bridgeway.db?mode=rwc";
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 30;

/// Env var overriding `[auth].token`.
pub const ENV_TOKEN: &str = "BRIDGEWAY_TOKEN";

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BridgewayConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub upstream: UpstreamConfig,
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.into(),
            port: DEFAULT_PORT,
        }
    }
}

/// Shared-secret header check. No token means the check is disabled.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub token: Option<SecretString>,
}

/// Upstream defaults from the config file plus the call timeout.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    #[serde(flatten)]
    pub profile: CallProfile,
    pub timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            profile: CallProfile::default(),
            timeout_secs: DEFAULT_UPSTREAM_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// sqlx connection URL.
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATABASE_URL.into(),
        }
    }
}

impl BridgewayConfig {
    /// Apply process environment overrides (see [`Self::with_overrides_from`]).
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|name| std::env::var(name).ok())
    }

    /// Environment values take precedence over the file: the upstream
    /// variables replace individual `[upstream]` keys and `BRIDGEWAY_TOKEN`
    /// replaces `[auth].token`.
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(token) = lookup(ENV_TOKEN).filter(|t| !t.is_empty()) {
            self.auth.token = Some(SecretString::new(token));
        }
        let env = CallProfile::from_lookup(&lookup);
        self.upstream.profile = env.or(self.upstream.profile);
        self
    }

    /// The lowest-precedence tier handed to the resolver: configured values
    /// (env already applied) over compiled-in defaults.
    pub fn upstream_defaults(&self) -> CallProfile {
        self.upstream
            .profile
            .clone()
            .or(CallProfile::compiled_defaults())
    }

    pub fn redacted(&self) -> serde_json::Value {
        serde_json::json!({
            "server": { "bind": self.server.bind, "port": self.server.port },
            "auth": { "token": self.auth.token.as_ref().map(|_| "***") },
            "upstream": {
                "defaults": self.upstream_defaults().redacted(),
                "timeout_secs": self.upstream.timeout_secs,
            },
            "database": { "url": self.database.url },
        })
    }
}
