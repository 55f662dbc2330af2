use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub reservation: ReservationConfig,
    #[serde(default)]
    pub layaway: LayawayConfig,
    #[serde(default)]
    pub payments: PaymentsConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
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

/// 未付款预留的回收策略
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationConfig {
    pub sweep_interval_secs: u64,
    pub expiry_minutes: i64,
}

impl Default for ReservationConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 30 * 60,
            expiry_minutes: 15,
        }
    }
}

/// 分期付款参数，金额单位为美分
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayawayConfig {
    pub min_payment_floor: i64,
    pub min_initial_percent: i64,
    pub default_deadline_days: i64,
}

impl Default for LayawayConfig {
    fn default() -> Self {
        Self {
            min_payment_floor: 50,
            min_initial_percent: 10,
            default_deadline_days: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PaymentsConfig {
    pub webhook_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NotificationsConfig {
    #[serde(default)]
    pub webhook_url: Option<String>,
}

impl Config {
    pub fn from_toml() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        use std::io::ErrorKind;

        // 尝试读取配置文件，如果不存在则完全依赖环境变量
        let mut config: Config = match std::fs::read_to_string(&config_path) {
            Ok(config_str) => Self::parse(&config_str)?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                // 数据库 URL 在无配置文件时必须提供
                let database_url = get_env("DATABASE_URL")
                    .ok_or("DATABASE_URL is required when config.toml is absent")?;

                Config {
                    server: ServerConfig {
                        host: get_env("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                        port: get_env_parse("SERVER_PORT", 8080u16),
                    },
                    database: DatabaseConfig {
                        url: database_url,
                        max_connections: get_env_parse("DB_MAX_CONNECTIONS", 10u32),
                    },
                    reservation: ReservationConfig::default(),
                    layaway: LayawayConfig::default(),
                    payments: PaymentsConfig::default(),
                    notifications: NotificationsConfig::default(),
                }
            }
            Err(e) => {
                return Err(format!("Failed to read config file {config_path}: {e}").into());
            }
        };

        // 环境变量覆盖（即便文件存在时也覆盖）
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn parse(config_str: &str) -> Result<Self, Box<dyn std::error::Error>> {
        toml::from_str(config_str).map_err(|e| format!("Failed to parse config file: {e}").into())
    }

    fn apply_env_overrides(&mut self) {
        if let Some(v) = get_env("SERVER_HOST") {
            self.server.host = v;
        }
        if let Some(p) = get_env("SERVER_PORT").and_then(|v| v.parse().ok()) {
            self.server.port = p;
        }
        if let Some(v) = get_env("DATABASE_URL") {
            self.database.url = v;
        }
        if let Some(mc) = get_env("DB_MAX_CONNECTIONS").and_then(|v| v.parse().ok()) {
            self.database.max_connections = mc;
        }
        if let Some(n) = get_env("RESERVATION_SWEEP_INTERVAL_SECS").and_then(|v| v.parse().ok()) {
            self.reservation.sweep_interval_secs = n;
        }
        if let Some(n) = get_env("RESERVATION_EXPIRY_MINUTES").and_then(|v| v.parse().ok()) {
            self.reservation.expiry_minutes = n;
        }
        if let Some(n) = get_env("LAYAWAY_MIN_PAYMENT_FLOOR").and_then(|v| v.parse().ok()) {
            self.layaway.min_payment_floor = n;
        }
        if let Some(n) = get_env("LAYAWAY_MIN_INITIAL_PERCENT").and_then(|v| v.parse().ok()) {
            self.layaway.min_initial_percent = n;
        }
        if let Some(n) = get_env("LAYAWAY_DEFAULT_DEADLINE_DAYS").and_then(|v| v.parse().ok()) {
            self.layaway.default_deadline_days = n;
        }
        if let Some(v) = get_env("PAYMENT_WEBHOOK_SECRET") {
            self.payments.webhook_secret = v;
        }
        if let Some(v) = get_env("NOTIFICATION_WEBHOOK_URL") {
            self.notifications.webhook_url = Some(v);
        }
    }
}

fn get_env(name: &str) -> Option<String> {
    env::var(name).ok()
}

fn get_env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_sections_fall_back_to_defaults() {
        let config = Config::parse(
            r#"
            [server]
            host = "127.0.0.1"
            port = 9000

            [database]
            url = "postgres://localhost/tickets"
            max_connections = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.reservation.sweep_interval_secs, 1800);
        assert_eq!(config.reservation.expiry_minutes, 15);
        assert_eq!(config.layaway.min_initial_percent, 10);
        assert!(config.notifications.webhook_url.is_none());
    }

    #[test]
    fn explicit_sections_are_read() {
        let config = Config::parse(
            r#"
            [server]
            host = "0.0.0.0"
            port = 8080

            [database]
            url = "postgres://localhost/tickets"
            max_connections = 10

            [reservation]
            sweep_interval_secs = 60
            expiry_minutes = 5

            [layaway]
            min_payment_floor = 2000
            min_initial_percent = 20
            default_deadline_days = 14

            [payments]
            webhook_secret = "s3cret"
            "#,
        )
        .unwrap();

        assert_eq!(config.reservation.expiry_minutes, 5);
        assert_eq!(config.layaway.min_payment_floor, 2000);
        assert_eq!(config.payments.webhook_secret, "s3cret");
    }
}
