use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub sync: SyncConfig,
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

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub access_token_expires_in: i64, // seconds
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TelegramConfig {
    /// 为空时跳过通知发送
    #[serde(default)]
    pub bot_token: String,
    #[serde(default)]
    pub chat_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// 订单视图轮询兜底间隔（秒）
    pub poll_interval_secs: u64,
    /// 外发通知最大尝试次数
    pub notify_max_attempts: u32,
    /// 通知重试退避基数（秒），按尝试次数指数增长
    pub notify_backoff_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 60,
            notify_max_attempts: 3,
            notify_backoff_secs: 2,
        }
    }
}

impl Config {
    pub fn from_toml() -> AppResult<Self> {
        let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        use std::io::ErrorKind;

        // 尝试读取配置文件，如果不存在则完全依赖环境变量
        let config_result = std::fs::read_to_string(&config_path);

        let mut config: Config = match config_result {
            Ok(config_str) => {
                // 有配置文件：先解析再用环境变量覆盖
                toml::from_str(&config_str)
                    .map_err(|e| AppError::ConfigError(format!("解析配置文件失败: {e}")))?
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                // 无配置文件：使用环境变量与默认值构建
                fn get_env(name: &str) -> Option<String> {
                    env::var(name).ok()
                }
                fn get_env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
                    env::var(name)
                        .ok()
                        .and_then(|v| v.parse::<T>().ok())
                        .unwrap_or(default)
                }

                // 数据库 URL 在无配置文件时必须提供
                let database_url = get_env("DATABASE_URL").ok_or_else(|| {
                    AppError::ConfigError(
                        "缺少 DATABASE_URL 环境变量，且未找到配置文件 config.toml".to_string(),
                    )
                })?;

                Config {
                    server: ServerConfig {
                        host: get_env("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                        port: get_env_parse("SERVER_PORT", 8080u16),
                    },
                    database: DatabaseConfig {
                        url: database_url,
                        max_connections: get_env_parse("DB_MAX_CONNECTIONS", 10u32),
                    },
                    jwt: JwtConfig {
                        secret: get_env("JWT_SECRET")
                            .unwrap_or_else(|| "change-me-in-production".to_string()),
                        access_token_expires_in: get_env_parse("JWT_ACCESS_EXPIRES_IN", 7200i64),
                    },
                    telegram: TelegramConfig {
                        bot_token: get_env("TELEGRAM_BOT_TOKEN").unwrap_or_default(),
                        chat_id: get_env("TELEGRAM_CHAT_ID").unwrap_or_default(),
                    },
                    sync: SyncConfig {
                        poll_interval_secs: get_env_parse("SYNC_POLL_INTERVAL_SECS", 60u64),
                        notify_max_attempts: get_env_parse("NOTIFY_MAX_ATTEMPTS", 3u32),
                        notify_backoff_secs: get_env_parse("NOTIFY_BACKOFF_SECS", 2u64),
                    },
                }
            }
            Err(e) => {
                return Err(AppError::ConfigError(format!(
                    "无法读取配置文件 {config_path}: {e}"
                )));
            }
        };

        // 环境变量覆盖（即便文件存在时也覆盖）
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
        if let Ok(v) = env::var("JWT_SECRET") {
            config.jwt.secret = v;
        }
        if let Ok(v) = env::var("JWT_ACCESS_EXPIRES_IN")
            && let Ok(n) = v.parse()
        {
            config.jwt.access_token_expires_in = n;
        }
        if let Ok(v) = env::var("TELEGRAM_BOT_TOKEN") {
            config.telegram.bot_token = v;
        }
        if let Ok(v) = env::var("TELEGRAM_CHAT_ID") {
            config.telegram.chat_id = v;
        }
        if let Ok(v) = env::var("SYNC_POLL_INTERVAL_SECS")
            && let Ok(n) = v.parse()
        {
            config.sync.poll_interval_secs = n;
        }
        if let Ok(v) = env::var("NOTIFY_MAX_ATTEMPTS")
            && let Ok(n) = v.parse()
        {
            config.sync.notify_max_attempts = n;
        }
        if let Ok(v) = env::var("NOTIFY_BACKOFF_SECS")
            && let Ok(n) = v.parse()
        {
            config.sync.notify_backoff_secs = n;
        }

        Ok(config)
    }
}
