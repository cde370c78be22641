use std::time::Duration;

use serde::{Deserialize, Serialize};

use santa_draw::{DeliveryError, Notifier};

/// Sends notifications through the Telegram Bot API `sendMessage` method.
pub struct TelegramNotifier {
    client: reqwest::Client,
    /// Full `sendMessage` URL. Contains the bot token, so it never goes into errors or logs.
    endpoint: String,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
}

#[derive(Deserialize)]
struct ApiResponse {
    ok: bool,
    description: Option<String>,
}

impl TelegramNotifier {
    pub fn new(api_base: &str, token: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/bot{}/sendMessage", api_base.trim_end_matches('/'), token),
        })
    }
}

impl Notifier for TelegramNotifier {
    async fn send(&self, recipient_id: i64, text: &str) -> Result<(), DeliveryError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&SendMessage { chat_id: recipient_id, text })
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(e.without_url().to_string()))?;

        let status = resp.status();
        let body: ApiResponse = resp.json().await.map_err(|e| {
            DeliveryError::Transport(format!("unreadable response (HTTP {}): {}", status, e.without_url()))
        })?;

        if body.ok {
            Ok(())
        } else {
            // e.g. "Forbidden: bot was blocked by the user", "Bad Request: chat not found"
            Err(DeliveryError::Rejected(
                body.description.unwrap_or_else(|| format!("HTTP {}", status)),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, http::StatusCode, routing::post};
    use serde_json::{Value, json};

    async fn fake_send_message(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
        match body["chat_id"].as_i64() {
            Some(2) => (
                StatusCode::FORBIDDEN,
                Json(json!({ "ok": false, "error_code": 403, "description": "Forbidden: bot was blocked by the user" })),
            ),
            Some(_) if body["text"].as_str().is_some_and(|t| !t.is_empty()) => {
                (StatusCode::OK, Json(json!({ "ok": true, "result": { "message_id": 1 } })))
            }
            _ => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "ok": false, "error_code": 400, "description": "Bad Request: message text is empty" })),
            ),
        }
    }

    async fn fake_api() -> String {
        let app = Router::new().route("/botTEST/sendMessage", post(fake_send_message));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn delivers_and_reports_rejections() {
        let base = fake_api().await;
        let notifier = TelegramNotifier::new(&base, "TEST", Duration::from_secs(5)).unwrap();

        notifier.send(1, "hello").await.unwrap();

        match notifier.send(2, "hello").await {
            Err(DeliveryError::Rejected(reason)) => assert!(reason.contains("blocked")),
            other => panic!("unexpected: {:?}", other),
        }

        match notifier.send(1, "").await {
            Err(DeliveryError::Rejected(reason)) => assert!(reason.contains("empty")),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn unreachable_api_is_a_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let notifier =
            TelegramNotifier::new(&format!("http://{}", addr), "SECRET-TOKEN", Duration::from_secs(2)).unwrap();
        match notifier.send(1, "hello").await {
            Err(DeliveryError::Transport(reason)) => assert!(!reason.contains("SECRET-TOKEN")),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
