use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    pub stripe: StripeConfig,
    #[serde(default)]
    pub postmark: PostmarkConfig,
    #[serde(default)]
    pub google: GoogleConfig,
    #[serde(default)]
    pub gmail: GmailConfig,
    #[serde(default)]
    pub registration: RegistrationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthConfig {
    /// Bearer token required on `/api/v1/admin/*`.
    pub admin_api_key: String,
    /// Bearer token required on `/cron/*`.
    pub cron_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeConfig {
    pub secret_key: String,
    pub webhook_secret: String,
    #[serde(default = "default_currency")]
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostmarkConfig {
    pub server_token: String,
    pub from_email: String,
    #[serde(default = "default_postmark_url")]
    pub base_url: String,
}

impl Default for PostmarkConfig {
    fn default() -> Self {
        Self {
            server_token: String::new(),
            from_email: "no-reply@eventpilot.app".to_string(),
            base_url: default_postmark_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GmailConfig {
    /// Run the background mailbox poller.
    pub poll_enabled: bool,
    pub poll_interval_secs: u64,
    /// Gmail search query used by scheduled ingestion.
    pub default_query: String,
}

impl Default for GmailConfig {
    fn default() -> Self {
        Self {
            poll_enabled: false,
            poll_interval_secs: 300,
            default_query: "newer_than:2d".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationConfig {
    /// Upper bound for the submission transaction.
    pub transaction_timeout_secs: u64,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            transaction_timeout_secs: 30,
        }
    }
}

fn default_currency() -> String {
    "usd".to_string()
}

fn default_postmark_url() -> String {
    "https://api.postmarkapp.com".to_string()
}

impl Config {
    pub fn from_toml() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        use std::io::ErrorKind;

        // Without a config file everything comes from the environment
        let config_result = std::fs::read_to_string(&config_path);

        let mut config: Config = match config_result {
            Ok(config_str) => toml::from_str(&config_str)
                .map_err(|e| format!("Failed to parse config file: {e}"))?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                fn get_env(name: &str) -> Option<String> {
                    env::var(name).ok()
                }
                fn get_env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
                    env::var(name)
                        .ok()
                        .and_then(|v| v.parse::<T>().ok())
                        .unwrap_or(default)
                }

                let database_url = get_env("DATABASE_URL")
                    .ok_or("DATABASE_URL is not set and no config.toml was found")?;

                Config {
                    server: ServerConfig {
                        host: get_env("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                        port: get_env_parse("SERVER_PORT", 8080u16),
                    },
                    database: DatabaseConfig {
                        url: database_url,
                        max_connections: get_env_parse("DB_MAX_CONNECTIONS", 10u32),
                    },
                    auth: AuthConfig::default(),
                    stripe: StripeConfig {
                        secret_key: get_env("STRIPE_SECRET_KEY").unwrap_or_default(),
                        webhook_secret: get_env("STRIPE_WEBHOOK_SECRET").unwrap_or_default(),
                        currency: default_currency(),
                    },
                    postmark: PostmarkConfig::default(),
                    google: GoogleConfig::default(),
                    gmail: GmailConfig::default(),
                    registration: RegistrationConfig::default(),
                }
            }
            Err(e) => {
                return Err(format!("Cannot read config file {config_path}: {e}").into());
            }
        };

        // Environment always wins over the file
        if let Ok(v) = env::var("SERVER_HOST") {
            config.server.host = v;
        }
        if let Ok(v) = env::var("SERVER_PORT")
            && let Ok(p) = v.parse()
        {
            config.server.port = p;
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            config.database.url = v;
        }
        if let Ok(v) = env::var("DB_MAX_CONNECTIONS")
            && let Ok(mc) = v.parse()
        {
            config.database.max_connections = mc;
        }
        if let Ok(v) = env::var("ADMIN_API_KEY") {
            config.auth.admin_api_key = v;
        }
        if let Ok(v) = env::var("CRON_SECRET") {
            config.auth.cron_secret = v;
        }
        if let Ok(v) = env::var("STRIPE_SECRET_KEY") {
            config.stripe.secret_key = v;
        }
        if let Ok(v) = env::var("STRIPE_WEBHOOK_SECRET") {
            config.stripe.webhook_secret = v;
        }
        if let Ok(v) = env::var("STRIPE_CURRENCY") {
            config.stripe.currency = v;
        }
        if let Ok(v) = env::var("POSTMARK_SERVER_TOKEN") {
            config.postmark.server_token = v;
        }
        if let Ok(v) = env::var("POSTMARK_FROM_EMAIL") {
            config.postmark.from_email = v;
        }
        if let Ok(v) = env::var("GOOGLE_CLIENT_ID") {
            config.google.client_id = v;
        }
        if let Ok(v) = env::var("GOOGLE_CLIENT_SECRET") {
            config.google.client_secret = v;
        }
        if let Ok(v) = env::var("GMAIL_POLL_ENABLED")
            && let Ok(b) = v.parse()
        {
            config.gmail.poll_enabled = b;
        }
        if let Ok(v) = env::var("GMAIL_POLL_INTERVAL_SECS")
            && let Ok(n) = v.parse()
        {
            config.gmail.poll_interval_secs = n;
        }
        if let Ok(v) = env::var("GMAIL_DEFAULT_QUERY") {
            config.gmail.default_query = v;
        }
        if let Ok(v) = env::var("REGISTRATION_TX_TIMEOUT_SECS")
            && let Ok(n) = v.parse()
        {
            config.registration.transaction_timeout_secs = n;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_toml_with_defaults() {
        let raw = r#"
            [server]
            host = "127.0.0.1"
            port = 9000

            [database]
            url = "postgres://localhost/eventpilot"
            max_connections = 5

            [stripe]
            secret_key = "sk_test_123"
            webhook_secret = "whsec_123"
        "#;
        let config: Config = toml::from_str(raw).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.stripe.currency, "usd");
        assert_eq!(config.registration.transaction_timeout_secs, 30);
        assert_eq!(config.gmail.default_query, "newer_than:2d");
        assert!(!config.gmail.poll_enabled);
        assert!(config.auth.admin_api_key.is_empty());
    }
}
