//! Audit logger
//!
//! Appends events to the audit repository. A failed write is logged and
//! dropped; it never fails the operation being audited.

use sgc_core::{AuditEvent, AuditQuery, AuditRepository, NewAuditEvent};
use tracing::{debug, warn};

use super::error::ServiceResult;

/// Caller details stamped on every audit event
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientInfo {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

impl ClientInfo {
    pub fn new(ip: Option<String>, user_agent: Option<String>) -> Self {
        Self { ip, user_agent }
    }
}

/// Audit writer borrowed from the service context
pub struct AuditLogger<'a> {
    repo: &'a dyn AuditRepository,
}

impl<'a> AuditLogger<'a> {
    pub fn new(repo: &'a dyn AuditRepository) -> Self {
        Self { repo }
    }

    /// Append `event` with the caller's ip and user agent
    pub async fn record(&self, mut event: NewAuditEvent, client: &ClientInfo) {
        event.ip.clone_from(&client.ip);
        event.user_agent.clone_from(&client.user_agent);

        match self.repo.append(&event).await {
            Ok(()) => debug!(event = %event.event_type, user_id = ?event.user_id, "Audit event recorded"),
            Err(e) => warn!(
                event = %event.event_type,
                user_id = ?event.user_id,
                error = %e,
                "Failed to record audit event"
            ),
        }
    }

    /// Newest events first
    pub async fn recent(&self, query: &AuditQuery) -> ServiceResult<Vec<AuditEvent>> {
        Ok(self.repo.list(query).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sgc_core::{AuditEventType, DomainError, RepoResult};
    use sgc_db::MemoryAuditRepository;

    struct FailingAudit;

    #[async_trait]
    impl AuditRepository for FailingAudit {
        async fn append(&self, _: &NewAuditEvent) -> RepoResult<()> {
            Err(DomainError::DatabaseError("audit table locked".into()))
        }

        async fn list(&self, _: &AuditQuery) -> RepoResult<Vec<AuditEvent>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_record_stamps_client() {
        let repo = MemoryAuditRepository::new();
        let logger = AuditLogger::new(&repo);
        let client = ClientInfo::new(Some("10.1.1.1".into()), Some("curl/8".into()));

        logger
            .record(NewAuditEvent::new(AuditEventType::Logout).user(3), &client)
            .await;

        let events = logger.recent(&AuditQuery::default()).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].ip.as_deref(), Some("10.1.1.1"));
        assert_eq!(events[0].user_agent.as_deref(), Some("curl/8"));
        assert_eq!(events[0].user_id, Some(3));
    }

    #[tokio::test]
    async fn test_write_failure_is_swallowed() {
        let logger = AuditLogger::new(&FailingAudit);
        logger
            .record(NewAuditEvent::new(AuditEventType::LoginFail), &ClientInfo::default())
            .await;
    }
}
