//! In-memory implementation of AuditRepository

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use sgc_core::traits::{AuditQuery, AuditRepository, RepoResult};
use sgc_core::{AuditEvent, NewAuditEvent};

/// Append-only audit log held in process memory
#[derive(Default)]
pub struct MemoryAuditRepository {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuditRepository for MemoryAuditRepository {
    async fn append(&self, event: &NewAuditEvent) -> RepoResult<()> {
        let mut events = self.events.lock();
        let id = events.len() as i64 + 1;
        events.push(event.clone().into_event(id, Utc::now()));
        Ok(())
    }

    async fn list(&self, query: &AuditQuery) -> RepoResult<Vec<AuditEvent>> {
        let events = self.events.lock();
        Ok(events
            .iter()
            .rev()
            .filter(|e| query.user_id.map_or(true, |id| e.user_id == Some(id)))
            .filter(|e| query.event_type.map_or(true, |t| e.event_type == t))
            .take(query.limit.max(1) as usize)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sgc_core::AuditEventType;

    #[tokio::test]
    async fn test_list_newest_first_with_filters() {
        let repo = MemoryAuditRepository::new();
        repo.append(&NewAuditEvent::new(AuditEventType::LoginFail).meta("reason", "bad_password"))
            .await
            .unwrap();
        repo.append(&NewAuditEvent::new(AuditEventType::LoginSuccess).user(1))
            .await
            .unwrap();
        repo.append(&NewAuditEvent::new(AuditEventType::Logout).user(1))
            .await
            .unwrap();

        let all = repo.list(&AuditQuery::default()).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].event_type, AuditEventType::Logout);
        assert_eq!(all[2].meta["reason"], "bad_password");

        let mine = repo
            .list(&AuditQuery {
                user_id: Some(1),
                event_type: Some(AuditEventType::LoginSuccess),
                limit: 10,
            })
            .await
            .unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].id, 2);
    }
}
