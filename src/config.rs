use std::time::Duration;

/// Knobs for live connections and fan-out.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewaySettings {
    /// Outbound frames a session may have queued before it is evicted.
    pub send_queue: usize,
    pub write_timeout: Duration,
    pub max_message_len: usize,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            send_queue: 64,
            write_timeout: Duration::from_millis(5000),
            max_message_len: 1000,
        }
    }
}

pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub token_ttl_secs: i64,
    pub gateway: GatewaySettings,
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = GatewaySettings::default();

        let gateway = GatewaySettings {
            send_queue: env_parse::<usize>("ROOMCAST_SEND_QUEUE")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.send_queue),
            write_timeout: env_parse::<u64>("ROOMCAST_WRITE_TIMEOUT_MS")
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(defaults.write_timeout),
            max_message_len: env_parse::<usize>("ROOMCAST_MAX_MESSAGE_LEN")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_message_len),
        };

        Self {
            port: env_parse("PORT").unwrap_or(8000),
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:roomcast.db?mode=rwc".to_string()),
            token_ttl_secs: env_parse::<i64>("ROOMCAST_TOKEN_TTL_SECS")
                .filter(|s| *s > 0)
                .unwrap_or(3600),
            gateway,
        }
    }
}
