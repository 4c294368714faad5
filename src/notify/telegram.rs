// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Telegram Bot API notifier (`sendMessage`).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::{NotifyError, Notifier, NotifyEvent, PaidNotice};
use crate::config::TelegramConfig;

const DEFAULT_API_BASE_URL: &str = "https://api.telegram.org";

#[derive(Debug, Deserialize)]
struct TelegramResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Sends plain-text messages to one chat.
#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    http: Client,
    api_base_url: String,
    bot_token: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(config: &TelegramConfig) -> Result<Self, NotifyError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| NotifyError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            bot_token: config.bot_token.clone(),
            chat_id: config.chat_id.clone(),
        })
    }

    #[cfg(test)]
    fn with_api_base_url(mut self, url: &str) -> Self {
        self.api_base_url = url.to_string();
        self
    }

    fn send_message_url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base_url, self.bot_token)
    }

    async fn send(&self, text: &str) -> Result<(), NotifyError> {
        let response = self
            .http
            .post(self.send_message_url())
            .json(&json!({
                "chat_id": self.chat_id,
                "text": text,
                "disable_web_page_preview": true,
            }))
            .send()
            .await
            // The URL carries the bot token.
            .map_err(|e| NotifyError::Transport(e.without_url().to_string()))?;

        let status = response.status();
        let body: Option<TelegramResponse> = response.json().await.ok();

        match body {
            Some(body) if status.is_success() && body.ok => Ok(()),
            body => Err(NotifyError::Rejected {
                status: status.as_u16(),
                description: body
                    .and_then(|b| b.description)
                    .unwrap_or_else(|| "no description".to_string()),
            }),
        }
    }
}

/// Message body for a paid request.
pub fn format_paid(notice: &PaidNotice) -> String {
    let mut lines = vec![
        "Escalatex402: paid request ✅".to_string(),
        format!("ID: {}", notice.request_id),
        format!("Title: {}", notice.title),
    ];
    if let Some(quote) = &notice.quote_amount {
        lines.push(format!("Tier/Quote: {quote} {}", notice.asset_symbol));
    }
    lines.push(format!("Tx: {}", notice.tx_sig));
    if let Some(url) = &notice.receipt_url {
        lines.push(format!("Receipt: {url}"));
    }
    lines.join("\n")
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn notify(&self, event: &NotifyEvent) -> Result<(), NotifyError> {
        match event {
            NotifyEvent::Paid(notice) => self.send(&format_paid(notice)).await,
            NotifyEvent::Test(text) => self.send(text).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn notice() -> PaidNotice {
        PaidNotice {
            request_id: Uuid::nil(),
            title: "Prod is down".into(),
            quote_amount: Some("25".into()),
            asset_symbol: "USDC".into(),
            tx_sig: "5igSig".into(),
            receipt_url: Some("https://solscan.io/tx/5igSig".into()),
        }
    }

    #[test]
    fn paid_message_lists_request_details() {
        let text = format_paid(&notice());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Escalatex402: paid request ✅");
        assert_eq!(lines[1], "ID: 00000000-0000-0000-0000-000000000000");
        assert_eq!(lines[2], "Title: Prod is down");
        assert_eq!(lines[3], "Tier/Quote: 25 USDC");
        assert_eq!(lines[4], "Tx: 5igSig");
        assert_eq!(lines[5], "Receipt: https://solscan.io/tx/5igSig");
    }

    #[test]
    fn optional_lines_are_omitted() {
        let mut notice = notice();
        notice.quote_amount = None;
        notice.receipt_url = None;
        let text = format_paid(&notice);
        assert!(!text.contains("Tier/Quote"));
        assert!(!text.contains("Receipt"));
    }

    #[test]
    fn send_url_embeds_token() {
        let notifier = TelegramNotifier::new(&TelegramConfig {
            bot_token: "123:abc".into(),
            chat_id: "42".into(),
        })
        .unwrap();
        assert_eq!(
            notifier.send_message_url(),
            "https://api.telegram.org/bot123:abc/sendMessage"
        );
    }

    #[tokio::test]
    async fn transport_error_hides_bot_token() {
        let notifier = TelegramNotifier::new(&TelegramConfig {
            bot_token: "123:SECRETTOKEN".into(),
            chat_id: "42".into(),
        })
        .unwrap()
        .with_api_base_url("http://127.0.0.1:1");

        let err = notifier.notify(&NotifyEvent::Test("ping".into())).await.unwrap_err();
        assert!(matches!(err, NotifyError::Transport(_)));
        assert!(!err.to_string().contains("SECRETTOKEN"));
    }

    #[test]
    fn decodes_error_response() {
        let body: TelegramResponse =
            serde_json::from_str(r#"{"ok":false,"error_code":400,"description":"Bad Request: chat not found"}"#)
                .unwrap();
        assert!(!body.ok);
        assert_eq!(body.description.as_deref(), Some("Bad Request: chat not found"));
    }
}
