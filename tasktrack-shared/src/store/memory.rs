/// In-memory store
///
/// Each table is a map behind a tokio `RwLock`. Every mutation takes the
/// write lock for its whole read-check-write, which gives the same atomicity
/// the PostgreSQL backend gets from single-statement updates. Data does not
/// survive a restart.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{AccountStore, AvatarStore, Store, StoreError, StoreResult, TaskStore};
use crate::models::account::{normalize_email, Account, CreateAccount};
use crate::models::avatar::Avatar;
use crate::models::task::{CreateTask, Task};
use crate::models::task_update::MergedUpdate;

#[derive(Debug, Default)]
pub struct MemoryStore {
    accounts: RwLock<HashMap<Uuid, Account>>,
    tasks: RwLock<HashMap<Uuid, Task>>,
    avatars: RwLock<HashMap<Uuid, Avatar>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn create_account(&self, data: CreateAccount, now: i64) -> StoreResult<Account> {
        let mut accounts = self.accounts.write().await;

        let email = normalize_email(&data.email);
        if accounts.values().any(|a| a.email == email) {
            return Err(StoreError::EmailTaken);
        }

        let account = Account::from_new(data, now);
        accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn find_account(&self, id: Uuid) -> StoreResult<Option<Account>> {
        Ok(self.accounts.read().await.get(&id).cloned())
    }

    async fn find_account_by_email(&self, email: &str) -> StoreResult<Option<Account>> {
        let email = normalize_email(email);
        Ok(self
            .accounts
            .read()
            .await
            .values()
            .find(|a| a.email == email)
            .cloned())
    }

    async fn add_token(&self, id: Uuid, token: &str, now: i64) -> StoreResult<bool> {
        let mut accounts = self.accounts.write().await;

        match accounts.get_mut(&id) {
            Some(account) if !account.has_token(token) => {
                account.active_tokens.push(token.to_string());
                account.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn remove_token(&self, id: Uuid, token: &str, now: i64) -> StoreResult<bool> {
        let mut accounts = self.accounts.write().await;

        match accounts.get_mut(&id) {
            Some(account) if account.has_token(token) => {
                account.active_tokens.retain(|t| t != token);
                account.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn clear_tokens(&self, id: Uuid, now: i64) -> StoreResult<bool> {
        let mut accounts = self.accounts.write().await;

        Ok(accounts
            .get_mut(&id)
            .map(|account| {
                account.active_tokens.clear();
                account.updated_at = now;
            })
            .is_some())
    }

    async fn update_password_hash(
        &self,
        id: Uuid,
        password_hash: &str,
        now: i64,
    ) -> StoreResult<bool> {
        let mut accounts = self.accounts.write().await;

        Ok(accounts
            .get_mut(&id)
            .map(|account| {
                account.password_hash = password_hash.to_string();
                account.updated_at = now;
            })
            .is_some())
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn create_task(&self, owner_id: Uuid, data: CreateTask, now: i64) -> StoreResult<Task> {
        let task = Task::from_new(owner_id, data, now);
        self.tasks.write().await.insert(task.id, task.clone());
        Ok(task)
    }

    async fn find_task(&self, owner_id: Uuid, id: Uuid) -> StoreResult<Option<Task>> {
        Ok(self
            .tasks
            .read()
            .await
            .get(&id)
            .filter(|t| t.owner_id == owner_id)
            .cloned())
    }

    async fn list_tasks(&self, owner_id: Uuid) -> StoreResult<Vec<Task>> {
        let mut tasks: Vec<Task> = self
            .tasks
            .read()
            .await
            .values()
            .filter(|t| t.owner_id == owner_id)
            .cloned()
            .collect();

        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(tasks)
    }

    async fn update_task(
        &self,
        owner_id: Uuid,
        id: Uuid,
        update: &MergedUpdate,
    ) -> StoreResult<Option<Task>> {
        let mut tasks = self.tasks.write().await;

        Ok(tasks
            .get_mut(&id)
            .filter(|t| t.owner_id == owner_id)
            .map(|task| {
                task.apply(update);
                task.clone()
            }))
    }

    async fn delete_task(&self, owner_id: Uuid, id: Uuid) -> StoreResult<bool> {
        let mut tasks = self.tasks.write().await;

        if tasks.get(&id).is_some_and(|t| t.owner_id == owner_id) {
            tasks.remove(&id);
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

#[async_trait]
impl AvatarStore for MemoryStore {
    async fn put_avatar(&self, avatar: Avatar) -> StoreResult<()> {
        self.avatars.write().await.insert(avatar.owner_id, avatar);
        Ok(())
    }

    async fn find_avatar(&self, owner_id: Uuid) -> StoreResult<Option<Avatar>> {
        Ok(self.avatars.read().await.get(&owner_id).cloned())
    }

    async fn delete_avatar(&self, owner_id: Uuid) -> StoreResult<bool> {
        Ok(self.avatars.write().await.remove(&owner_id).is_some())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::sync::Arc;

    fn new_account(email: &str) -> CreateAccount {
        CreateAccount {
            email: email.to_string(),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            mobile: None,
            password_hash: "hash".to_string(),
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected_case_insensitively() {
        let store = MemoryStore::new();
        store.create_account(new_account("a@example.com"), 0).await.unwrap();

        let result = store.create_account(new_account(" A@Example.com"), 0).await;
        assert!(matches!(result, Err(StoreError::EmailTaken)));
    }

    #[tokio::test]
    async fn test_find_by_email_case_insensitive() {
        let store = MemoryStore::new();
        let account = store.create_account(new_account("a@example.com"), 0).await.unwrap();

        let found = store.find_account_by_email("A@EXAMPLE.COM").await.unwrap();
        assert_eq!(found.map(|a| a.id), Some(account.id));
        assert!(store.find_account_by_email("b@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_token_set_operations() {
        let store = MemoryStore::new();
        let id = store.create_account(new_account("a@example.com"), 0).await.unwrap().id;

        assert!(store.add_token(id, "t1", 1).await.unwrap());
        assert!(store.add_token(id, "t2", 2).await.unwrap());
        assert!(!store.add_token(id, "t1", 3).await.unwrap());

        assert!(store.remove_token(id, "t1", 4).await.unwrap());
        assert!(!store.remove_token(id, "t1", 5).await.unwrap());

        let account = store.find_account(id).await.unwrap().unwrap();
        assert_eq!(account.active_tokens, vec!["t2".to_string()]);
        assert_eq!(account.updated_at, 4);

        assert!(store.clear_tokens(id, 6).await.unwrap());
        let account = store.find_account(id).await.unwrap().unwrap();
        assert!(account.active_tokens.is_empty());
    }

    #[tokio::test]
    async fn test_token_operations_on_missing_account() {
        let store = MemoryStore::new();
        let id = Uuid::new_v4();

        assert!(!store.add_token(id, "t", 0).await.unwrap());
        assert!(!store.remove_token(id, "t", 0).await.unwrap());
        assert!(!store.clear_tokens(id, 0).await.unwrap());
        assert!(!store.update_password_hash(id, "h", 0).await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_add_token_keeps_all() {
        let store = Arc::new(MemoryStore::new());
        let id = store.create_account(new_account("a@example.com"), 0).await.unwrap().id;

        let handles: Vec<_> = (0..20)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move { store.add_token(id, &format!("t{}", i), i).await })
            })
            .collect();

        for handle in handles {
            assert!(handle.await.unwrap().unwrap());
        }

        let account = store.find_account(id).await.unwrap().unwrap();
        assert_eq!(account.active_tokens.len(), 20);
    }

    #[tokio::test]
    async fn test_tasks_are_owner_scoped() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();

        let task = store
            .create_task(owner, CreateTask { title: "mine".into(), ..Default::default() }, 1)
            .await
            .unwrap();

        assert!(store.find_task(owner, task.id).await.unwrap().is_some());
        assert!(store.find_task(other, task.id).await.unwrap().is_none());
        assert!(store.list_tasks(other).await.unwrap().is_empty());

        let update = MergedUpdate {
            title: Some("stolen".into()),
            completed: None,
            metadata: None,
            metadata_changes: None,
            updated_at: 2,
        };
        assert!(store.update_task(other, task.id, &update).await.unwrap().is_none());
        assert!(!store.delete_task(other, task.id).await.unwrap());

        let unchanged = store.find_task(owner, task.id).await.unwrap().unwrap();
        assert_eq!(unchanged.title, "mine");
    }

    #[tokio::test]
    async fn test_list_tasks_newest_first() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();

        for (title, at) in [("old", 10), ("new", 30), ("mid", 20)] {
            store
                .create_task(owner, CreateTask { title: title.into(), ..Default::default() }, at)
                .await
                .unwrap();
        }

        let titles: Vec<String> = store
            .list_tasks(owner)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.title)
            .collect();
        assert_eq!(titles, vec!["new", "mid", "old"]);
    }

    #[tokio::test]
    async fn test_update_and_delete_task() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let task = store
            .create_task(owner, CreateTask { title: "t".into(), ..Default::default() }, 1)
            .await
            .unwrap();

        let update = MergedUpdate {
            title: None,
            completed: Some(true),
            metadata: None,
            metadata_changes: None,
            updated_at: 5,
        };
        let updated = store.update_task(owner, task.id, &update).await.unwrap().unwrap();
        assert!(updated.completed);
        assert_eq!(updated.updated_at, 5);

        assert!(store.delete_task(owner, task.id).await.unwrap());
        assert!(!store.delete_task(owner, task.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_interleaved_metadata_updates_keep_both_keys() {
        use crate::models::task_update::merge_update_at;
        use serde_json::json;

        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let task = store
            .create_task(
                owner,
                CreateTask {
                    title: "t".into(),
                    metadata: HashMap::from([("a".into(), "1".into())]),
                    ..Default::default()
                },
                1,
            )
            .await
            .unwrap();

        // Both updates are merged against the same read
        let first = merge_update_at(&json!({"metadata": {"b": "2"}}), &task.metadata, 2).unwrap();
        let second = merge_update_at(&json!({"metadata": {"c": "3"}}), &task.metadata, 3).unwrap();

        store.update_task(owner, task.id, &first).await.unwrap();
        let updated = store.update_task(owner, task.id, &second).await.unwrap().unwrap();

        assert_eq!(
            updated.metadata,
            HashMap::from([
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "2".to_string()),
                ("c".to_string(), "3".to_string()),
            ])
        );
    }

    #[tokio::test]
    async fn test_avatar_replace_and_delete() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();

        store
            .put_avatar(Avatar::new(owner, Bytes::from_static(b"one"), "image/png", 1))
            .await
            .unwrap();
        store
            .put_avatar(Avatar::new(owner, Bytes::from_static(b"two"), "image/jpeg", 2))
            .await
            .unwrap();

        let avatar = store.find_avatar(owner).await.unwrap().unwrap();
        assert_eq!(avatar.data, Bytes::from_static(b"two"));
        assert_eq!(avatar.content_type, "image/jpeg");

        assert!(store.delete_avatar(owner).await.unwrap());
        assert!(store.find_avatar(owner).await.unwrap().is_none());
        assert!(!store.delete_avatar(owner).await.unwrap());
    }
}
