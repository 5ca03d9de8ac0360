use crate::config::TelegramConfig;
use crate::error::{AppError, AppResult};
use reqwest::Client;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct SendMessageRequest {
    pub chat_id: String,
    pub text: String,
    pub parse_mode: String,
}

#[derive(Clone)]
pub struct TelegramService {
    client: Client,
    config: TelegramConfig,
}

impl TelegramService {
    pub fn new(config: TelegramConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// 未配置bot时视为禁用，静默跳过
    pub fn is_configured(&self) -> bool {
        !self.config.bot_token.is_empty() && !self.config.chat_id.is_empty()
    }

    pub async fn send_message(&self, text: &str) -> AppResult<()> {
        if !self.is_configured() {
            log::debug!("Telegram not configured, skipping notification");
            return Ok(());
        }

        let url = format!(
            "https://api.telegram.org/bot{}/sendMessage",
            self.config.bot_token
        );

        let request = SendMessageRequest {
            chat_id: self.config.chat_id.clone(),
            text: text.to_string(),
            parse_mode: "HTML".to_string(),
        };

        let response = self.client.post(&url).json(&request).send().await?;
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        if !status.is_success() {
            log::error!("Telegram notification failed: {}, Error: {}", status, body);
            return Err(AppError::ExternalApiError(format!(
                "Telegram sending failed: {}",
                body
            )));
        }

        // Telegram在HTTP 200下也可能返回ok=false
        let parsed: serde_json::Value = serde_json::from_str(&body)?;
        if parsed.get("ok").and_then(|v| v.as_bool()) != Some(true) {
            log::error!("Telegram API rejected message: {}", body);
            return Err(AppError::ExternalApiError(format!(
                "Telegram sending failed: {}",
                body
            )));
        }

        log::info!("Telegram notification sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unconfigured_service_skips_sending() {
        let svc = TelegramService::new(TelegramConfig::default());
        assert!(!svc.is_configured());
    }

    #[tokio::test]
    async fn test_send_without_config_is_ok() {
        let svc = TelegramService::new(TelegramConfig::default());
        assert!(svc.send_message("ignored").await.is_ok());
    }
}
