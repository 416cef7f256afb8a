//! 紧急联系人通知：对每个联系人并发发送一条短信，逐个记录结果

use futures_util::future::join_all;
use serde::Serialize;

use crate::integrations::NotificationGateway;
use crate::store::EmergencyContact;

/// 单个联系人的通知结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationOutcome {
    pub contact_name: String,
    pub phone_number: String,
    pub delivered: bool,
}

pub fn emergency_sms_body(user_id: &str, message: &str) -> String {
    format!(
        "Alerta de emergencia de {}: \"{}\". Por favor, comunícate con esta persona lo antes posible.",
        user_id, message
    )
}

pub async fn notify_contacts(
    gateway: &dyn NotificationGateway,
    contacts: &[EmergencyContact],
    body: &str,
) -> Vec<NotificationOutcome> {
    let sends = contacts.iter().map(|contact| async move {
        let delivered = gateway.send(&contact.phone_number, body).await;
        NotificationOutcome {
            contact_name: contact.name.clone(),
            phone_number: contact.phone_number.clone(),
            delivered,
        }
    });
    join_all(sends).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    struct RecordingGateway {
        sent: Mutex<Vec<String>>,
        reject: &'static str,
    }

    #[async_trait]
    impl NotificationGateway for RecordingGateway {
        async fn send(&self, destination: &str, _body: &str) -> bool {
            self.sent.lock().await.push(destination.to_string());
            destination != self.reject
        }
    }

    fn contact(name: &str, phone: &str) -> EmergencyContact {
        EmergencyContact {
            id: 0,
            user_id: "ana".to_string(),
            name: name.to_string(),
            phone_number: phone.to_string(),
            relationship: None,
        }
    }

    #[tokio::test]
    async fn test_notify_collects_per_contact_outcome() {
        let gateway = RecordingGateway {
            sent: Mutex::new(Vec::new()),
            reject: "+56900000002",
        };
        let contacts = vec![contact("Luis", "+56900000001"), contact("Marta", "+56900000002")];
        let outcomes = notify_contacts(&gateway, &contacts, "ayuda").await;

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].delivered);
        assert_eq!(outcomes[1].contact_name, "Marta");
        assert!(!outcomes[1].delivered);
        assert_eq!(gateway.sent.lock().await.len(), 2);
    }

    #[test]
    fn test_sms_body_mentions_user_and_message() {
        let body = emergency_sms_body("ana", "me caí");
        assert!(body.contains("ana"));
        assert!(body.contains("me caí"));
    }
}
