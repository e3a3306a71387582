use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{Item, NewItem},
};

#[async_trait]
pub trait ItemRepository: Send + Sync {
    async fn init(&self) -> AppResult<()>;
    async fn create(&self, payload: NewItem) -> AppResult<Item>;
    /// All items, oldest first.
    async fn list(&self) -> AppResult<Vec<Item>>;
}

#[derive(Clone)]
pub struct PgItemRepository {
    pool: PgPool,
}

impl PgItemRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ItemRepository for PgItemRepository {
    async fn init(&self) -> AppResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn create(&self, payload: NewItem) -> AppResult<Item> {
        let item = sqlx::query_as::<_, Item>(
            r#"
            INSERT INTO items (id, name, description)
            VALUES ($1, $2, $3)
            RETURNING id, name, description, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(payload.name)
        .bind(payload.description)
        .fetch_one(&self.pool)
        .await?;

        Ok(item)
    }

    async fn list(&self) -> AppResult<Vec<Item>> {
        let items = sqlx::query_as::<_, Item>(
            r#"
            SELECT id, name, description, created_at, updated_at
            FROM items
            ORDER BY created_at ASC, seq ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }
}

#[derive(Default)]
pub struct InMemoryItemRepository {
    items: RwLock<Vec<Item>>,
}

impl InMemoryItemRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }
}

#[async_trait]
impl ItemRepository for InMemoryItemRepository {
    async fn init(&self) -> AppResult<()> {
        Ok(())
    }

    async fn create(&self, payload: NewItem) -> AppResult<Item> {
        let now = Utc::now();
        let item = Item {
            id: Uuid::new_v4(),
            name: payload.name,
            description: payload.description,
            created_at: now,
            updated_at: now,
        };

        self.items.write().await.push(item.clone());
        Ok(item)
    }

    async fn list(&self) -> AppResult<Vec<Item>> {
        Ok(self.items.read().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_repository_create_and_list() {
        let repo = InMemoryItemRepository::new();
        repo.init().await.expect("init should succeed");
        assert!(repo.is_empty().await);

        let created = repo
            .create(NewItem::new("a", "b"))
            .await
            .expect("create should succeed");
        assert_eq!(created.created_at, created.updated_at);

        let listed = repo.list().await.expect("list should succeed");
        assert_eq!(listed, vec![created.clone()]);
        assert!(!created.id.is_nil());
    }

    #[tokio::test]
    async fn in_memory_repository_keeps_insertion_order() {
        let repo = InMemoryItemRepository::new();
        for i in 0..5 {
            repo.create(NewItem::new(format!("item-{i}"), "filler"))
                .await
                .expect("create should succeed");
        }

        let names = repo
            .list()
            .await
            .expect("list should succeed")
            .into_iter()
            .map(|item| item.name)
            .collect::<Vec<_>>();
        assert_eq!(names, ["item-0", "item-1", "item-2", "item-3", "item-4"]);
        assert_eq!(repo.len().await, 5);
    }
}
