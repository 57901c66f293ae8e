//! In-memory implementation of AccountRepository

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use sgc_core::traits::{AccountFilter, AccountQuery, AccountRepository, Page, RepoResult};
use sgc_core::{normalize_email, Account, AccountId, DomainError, NewAccount, Role};

#[derive(Default)]
struct AccountTable {
    last_id: AccountId,
    rows: BTreeMap<AccountId, Account>,
}

impl AccountTable {
    fn conflict(&self, username: &str, email: Option<&str>) -> Option<DomainError> {
        let username = username.trim().to_lowercase();
        for account in self.rows.values() {
            if account.username.to_lowercase() == username {
                return Some(DomainError::UsernameExists);
            }
            if email.is_some() && account.email.as_deref() == email {
                return Some(DomainError::EmailExists);
            }
        }
        None
    }

    fn get_mut(&mut self, id: AccountId) -> RepoResult<&mut Account> {
        self.rows
            .get_mut(&id)
            .ok_or(DomainError::AccountNotFound(id))
    }
}

/// Account table held in process memory
#[derive(Default)]
pub struct MemoryAccountRepository {
    table: Mutex<AccountTable>,
}

impl MemoryAccountRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountRepository for MemoryAccountRepository {
    async fn find_by_id(&self, id: AccountId) -> RepoResult<Option<Account>> {
        Ok(self.table.lock().rows.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> RepoResult<Option<Account>> {
        let Some(email) = normalize_email(email) else {
            return Ok(None);
        };
        let table = self.table.lock();
        Ok(table
            .rows
            .values()
            .find(|a| a.email.as_deref() == Some(email.as_str()))
            .cloned())
    }

    async fn find_by_username(&self, username: &str) -> RepoResult<Option<Account>> {
        let username = username.trim().to_lowercase();
        if username.is_empty() {
            return Ok(None);
        }
        let table = self.table.lock();
        Ok(table
            .rows
            .values()
            .find(|a| a.username.to_lowercase() == username)
            .cloned())
    }

    async fn username_exists(&self, username: &str) -> RepoResult<bool> {
        Ok(self.find_by_username(username).await?.is_some())
    }

    async fn email_exists(&self, email: &str) -> RepoResult<bool> {
        Ok(self.find_by_email(email).await?.is_some())
    }

    async fn create(&self, account: &NewAccount) -> RepoResult<Account> {
        let mut table = self.table.lock();
        if let Some(err) = table.conflict(&account.username, account.email.as_deref()) {
            return Err(err);
        }

        table.last_id += 1;
        let created = account.clone().into_account(table.last_id, Utc::now());
        table.rows.insert(created.id, created.clone());
        Ok(created)
    }

    async fn approve(
        &self,
        id: AccountId,
        role: Option<Role>,
        category: Option<&str>,
        now: DateTime<Utc>,
    ) -> RepoResult<Account> {
        let mut table = self.table.lock();
        let account = table.get_mut(id)?;
        account.approve(role, category.map(str::to_string), now);
        Ok(account.clone())
    }

    async fn reject(&self, id: AccountId) -> RepoResult<Account> {
        let mut table = self.table.lock();
        let account = table.get_mut(id)?;
        account.reject();
        Ok(account.clone())
    }

    async fn set_force_change(&self, id: AccountId, value: bool) -> RepoResult<Account> {
        let mut table = self.table.lock();
        let account = table.get_mut(id)?;
        account.force_change_password = value;
        Ok(account.clone())
    }

    async fn revoke_sessions(&self, id: AccountId, now: DateTime<Utc>) -> RepoResult<()> {
        self.table.lock().get_mut(id)?.sessions_valid_after = Some(now);
        Ok(())
    }

    async fn record_failed_login(&self, id: AccountId, now: DateTime<Utc>) -> RepoResult<Account> {
        let mut table = self.table.lock();
        let account = table.get_mut(id)?;
        account.register_failure(now);
        Ok(account.clone())
    }

    async fn reset_failed_logins(&self, id: AccountId) -> RepoResult<()> {
        self.table.lock().get_mut(id)?.register_success();
        Ok(())
    }

    async fn set_password(&self, id: AccountId, password_hash: &str) -> RepoResult<()> {
        self.table
            .lock()
            .get_mut(id)?
            .set_password(password_hash.to_string());
        Ok(())
    }

    async fn upgrade_password_hash(&self, id: AccountId, password_hash: &str) -> RepoResult<()> {
        self.table.lock().get_mut(id)?.password_hash = password_hash.to_string();
        Ok(())
    }

    async fn set_totp_secret(&self, id: AccountId, secret: &str) -> RepoResult<bool> {
        let mut table = self.table.lock();
        let account = table.get_mut(id)?;
        if account.has_totp() {
            return Ok(false);
        }
        account.totp_secret = Some(secret.to_string());
        Ok(true)
    }

    async fn list(&self, query: &AccountQuery) -> RepoResult<Page<Account>> {
        let table = self.table.lock();
        let mut matching: Vec<&Account> = table
            .rows
            .values()
            .filter(|a| query.filter.matches(a))
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let total = matching.len() as i64;
        let items = matching
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.per_page as usize)
            .cloned()
            .collect();

        Ok(Page {
            items,
            total,
            page: query.page,
            per_page: query.per_page,
        })
    }

    async fn export(&self, filter: &AccountFilter) -> RepoResult<Vec<Account>> {
        let table = self.table.lock();
        Ok(table
            .rows
            .values()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sgc_core::{AccountStatus, Role, MAX_FAILED_LOGINS};

    fn pending(username: &str, email: &str) -> NewAccount {
        NewAccount::pending(username, Some(email), "hash".into(), Role::Viewer, None)
    }

    #[tokio::test]
    async fn test_create_assigns_ids_and_normalizes() {
        let repo = MemoryAccountRepository::new();
        let a = repo.create(&pending("ana", " Ana@SGC.cl ")).await.unwrap();
        let b = repo.create(&pending("beto", "beto@sgc.cl")).await.unwrap();

        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
        assert_eq!(a.email.as_deref(), Some("ana@sgc.cl"));
        assert_eq!(a.status, AccountStatus::Pending);
        assert!(!a.is_active);
    }

    #[tokio::test]
    async fn test_uniqueness() {
        let repo = MemoryAccountRepository::new();
        repo.create(&pending("ana", "ana@sgc.cl")).await.unwrap();

        assert!(matches!(
            repo.create(&pending("ANA", "other@sgc.cl")).await,
            Err(DomainError::UsernameExists)
        ));
        assert!(matches!(
            repo.create(&pending("other", "ANA@sgc.cl")).await,
            Err(DomainError::EmailExists)
        ));
    }

    #[tokio::test]
    async fn test_lookups_are_lenient() {
        let repo = MemoryAccountRepository::new();
        repo.create(&pending("JuanPerez", "juan@sgc.cl")).await.unwrap();

        assert!(repo.find_by_username("  juanperez ").await.unwrap().is_some());
        assert!(repo.find_by_email("JUAN@sgc.cl").await.unwrap().is_some());
        assert!(repo.find_by_email("   ").await.unwrap().is_none());
        assert!(repo.username_exists("JUANPEREZ").await.unwrap());
    }

    #[tokio::test]
    async fn test_failed_logins_lock_and_reset() {
        let repo = MemoryAccountRepository::new();
        let id = repo.create(&pending("ana", "ana@sgc.cl")).await.unwrap().id;
        let now = Utc::now();

        for _ in 1..MAX_FAILED_LOGINS {
            let account = repo.record_failed_login(id, now).await.unwrap();
            assert!(!account.is_locked(now));
        }
        let account = repo.record_failed_login(id, now).await.unwrap();
        assert_eq!(account.failed_logins, MAX_FAILED_LOGINS);
        assert!(account.is_locked(now));

        repo.reset_failed_logins(id).await.unwrap();
        let account = repo.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(account.failed_logins, 0);
        assert!(account.lock_until.is_none());
    }

    #[tokio::test]
    async fn test_set_password_clears_force_flag() {
        let repo = MemoryAccountRepository::new();
        let account = repo.create(&pending("ana", "ana@sgc.cl")).await.unwrap();
        assert!(repo.set_force_change(account.id, true).await.unwrap().force_change_password);

        repo.upgrade_password_hash(account.id, "rehashed").await.unwrap();
        assert!(repo.find_by_id(account.id).await.unwrap().unwrap().force_change_password);

        repo.set_password(account.id, "new").await.unwrap();
        let stored = repo.find_by_id(account.id).await.unwrap().unwrap();
        assert_eq!(stored.password_hash, "new");
        assert!(!stored.force_change_password);
    }

    #[tokio::test]
    async fn test_missing_account_errors() {
        let repo = MemoryAccountRepository::new();
        assert!(matches!(
            repo.set_totp_secret(99, "S").await,
            Err(DomainError::AccountNotFound(99))
        ));
        assert!(matches!(repo.reject(99).await, Err(DomainError::AccountNotFound(99))));
    }

    #[tokio::test]
    async fn test_totp_secret_is_set_once() {
        let repo = MemoryAccountRepository::new();
        let id = repo.create(&pending("ana", "ana@sgc.cl")).await.unwrap().id;

        assert!(repo.set_totp_secret(id, "FIRST").await.unwrap());
        assert!(!repo.set_totp_secret(id, "SECOND").await.unwrap());
        let stored = repo.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.totp_secret.as_deref(), Some("FIRST"));
    }

    #[tokio::test]
    async fn test_approve_keeps_concurrent_password_change() {
        let repo = MemoryAccountRepository::new();
        let id = repo.create(&pending("ana", "ana@sgc.cl")).await.unwrap().id;

        // A password lands between an admin reading the row and approving it
        let _stale = repo.find_by_id(id).await.unwrap().unwrap();
        repo.set_password(id, "changed").await.unwrap();
        let approved = repo.approve(id, None, Some("operaciones"), Utc::now()).await.unwrap();

        assert_eq!(approved.password_hash, "changed");
        assert_eq!(approved.role, Role::Viewer);
        assert_eq!(approved.category.as_deref(), Some("operaciones"));
        assert!(approved.can_sign_in());

        let rejected = repo.reject(id).await.unwrap();
        assert_eq!(rejected.password_hash, "changed");
        assert!(!rejected.can_sign_in());
    }

    #[tokio::test]
    async fn test_revoke_sessions_sets_cutoff() {
        let repo = MemoryAccountRepository::new();
        let id = repo.create(&pending("ana", "ana@sgc.cl")).await.unwrap().id;
        let now = Utc::now();

        repo.revoke_sessions(id, now).await.unwrap();
        let stored = repo.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.sessions_valid_after, Some(now));
    }

    #[tokio::test]
    async fn test_list_and_export() {
        let repo = MemoryAccountRepository::new();
        for i in 0..25 {
            repo.create(&pending(&format!("user{i:02}"), &format!("u{i}@sgc.cl")))
                .await
                .unwrap();
        }
        repo.approve(3, Some(Role::Editor), None, Utc::now()).await.unwrap();

        let page = repo
            .list(&AccountQuery::new(AccountFilter::default(), Some(2), Some(20)))
            .await
            .unwrap();
        assert_eq!(page.total, 25);
        assert_eq!(page.items.len(), 5);

        let first = repo
            .list(&AccountQuery::new(AccountFilter::default(), None, None))
            .await
            .unwrap();
        assert_eq!(first.items[0].id, 25);

        let pending_only = AccountFilter {
            status: Some(AccountStatus::Pending),
            q: None,
        };
        assert_eq!(repo.export(&pending_only).await.unwrap().len(), 24);

        let search = AccountFilter {
            status: None,
            q: Some("USER1".into()),
        };
        let found = repo.export(&search).await.unwrap();
        assert_eq!(found.len(), 10);
        assert!(found.windows(2).all(|w| w[0].id < w[1].id));
    }
}
