//! Telegram Bot API delivery

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::notifier::{Notifier, NotifyError};
use teleglogger_types::Notification;

const API_BASE: &str = "https://api.telegram.org";

/// Upper bound for a single Bot API call
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Timestamp prefix, e.g. "Mon 02-Jan 15:04"
const TIMESTAMP_FORMAT: &str = "%a %d-%b %H:%M";

/// Sends notifications to a single Telegram chat
#[derive(Clone)]
pub struct TelegramNotifier {
    client: reqwest::Client,
    token: String,
    chat_id: i64,
}

/// Bot account returned by `getMe`
#[derive(Clone, Debug, Deserialize)]
pub struct BotUser {
    pub id: i64,
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
}

impl TelegramNotifier {
    pub fn new(token: impl Into<String>, chat_id: i64) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            token: token.into(),
            chat_id,
        })
    }

    /// Create a notifier and check the token against `getMe`
    pub async fn connect(token: impl Into<String>, chat_id: i64) -> Result<Self, NotifyError> {
        let notifier = Self::new(token, chat_id)?;
        let bot = notifier.get_me().await?;
        tracing::info!(bot_id = bot.id, username = ?bot.username, "telegram bot authorized");
        Ok(notifier)
    }

    pub async fn get_me(&self) -> Result<BotUser, NotifyError> {
        let response = self
            .client
            .get(self.method_url("getMe"))
            .send()
            .await
            .map_err(|e| e.without_url())?;
        parse_response(response).await
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", API_BASE, self.token, method)
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        tracing::info!(message = %notification, "sending notification");
        let text = format_message(Local::now(), notification);
        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&SendMessage {
                chat_id: self.chat_id,
                text: &text,
            })
            .send()
            .await
            .map_err(|e| e.without_url())?;
        parse_response::<serde_json::Value>(response).await?;
        Ok(())
    }
}

/// Prefix a notification with the local time it was sent
fn format_message(at: DateTime<Local>, notification: &Notification) -> String {
    format!("{}, {}", at.format(TIMESTAMP_FORMAT), notification)
}

async fn parse_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, NotifyError> {
    // Telegram reports failures in the body, with a 4xx status
    let body: ApiResponse<T> = response.json().await.map_err(|e| e.without_url())?;
    unwrap_response(body)
}

fn unwrap_response<T>(body: ApiResponse<T>) -> Result<T, NotifyError> {
    match body {
        ApiResponse {
            ok: true,
            result: Some(result),
            ..
        } => Ok(result),
        ApiResponse { description, .. } => Err(NotifyError::Rejected(
            description.unwrap_or_else(|| "no description".to_string()),
        )),
    }
}
