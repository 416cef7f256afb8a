//! 短信通知（Twilio Messages API）

use async_trait::async_trait;

use crate::config::{secret_or_env, NotificationsSection};

#[async_trait]
pub trait NotificationGateway: Send + Sync {
    /// 发送成功返回 true；失败只记日志
    async fn send(&self, destination: &str, body: &str) -> bool;
}

pub struct TwilioSms {
    client: reqwest::Client,
    base_url: String,
    account_sid: String,
    auth_token: String,
    from_number: String,
}

impl TwilioSms {
    /// 凭据不全时返回 None（通知功能随之关闭）
    pub fn from_config(cfg: &NotificationsSection) -> Option<Self> {
        let account_sid = secret_or_env(&cfg.account_sid, "TWILIO_ACCOUNT_SID")?;
        let auth_token = secret_or_env(&cfg.auth_token, "TWILIO_AUTH_TOKEN")?;
        let from_number = secret_or_env(&cfg.from_number, "TWILIO_PHONE_NUMBER")?;
        Some(Self {
            client: super::http_client(cfg.timeout_secs),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            account_sid,
            auth_token,
            from_number,
        })
    }

    fn messages_url(&self) -> String {
        format!("{}/Accounts/{}/Messages.json", self.base_url, self.account_sid)
    }

    async fn post(&self, destination: &str, body: &str) -> Result<(), String> {
        let resp = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[
                ("To", destination),
                ("From", self.from_number.as_str()),
                ("Body", body),
            ])
            .send()
            .await
            .map_err(|e| e.to_string())?;
        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            let text = resp.text().await.unwrap_or_default();
            Err(format!("status {}: {}", status, text))
        }
    }
}

#[async_trait]
impl NotificationGateway for TwilioSms {
    async fn send(&self, destination: &str, body: &str) -> bool {
        match self.post(destination, body).await {
            Ok(()) => {
                tracing::info!(destination, "sms sent");
                true
            }
            Err(e) => {
                tracing::warn!(destination, "sms send failed: {}", e);
                false
            }
        }
    }
}
