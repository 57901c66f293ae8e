//! Audit event <-> model mapper

use serde_json::{Map, Value};
use sgc_core::{AuditEvent, AuditEventType, DomainError};

use crate::models::AuditEventModel;

impl TryFrom<AuditEventModel> for AuditEvent {
    type Error = DomainError;

    fn try_from(model: AuditEventModel) -> Result<Self, Self::Error> {
        let meta = match model.meta {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };

        Ok(AuditEvent {
            id: model.id,
            ts: model.ts,
            event_type: model.event_type.parse::<AuditEventType>()?,
            user_id: model.user_id,
            ip: model.ip,
            user_agent: model.user_agent,
            meta,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    #[test]
    fn test_non_object_meta_is_wrapped() {
        let event = AuditEvent::try_from(AuditEventModel {
            id: 1,
            ts: Utc::now(),
            event_type: "login_fail".into(),
            user_id: None,
            ip: None,
            user_agent: None,
            meta: json!("legacy"),
        })
        .unwrap();
        assert_eq!(event.event_type, AuditEventType::LoginFail);
        assert_eq!(event.meta.get("value"), Some(&json!("legacy")));
    }
}
