use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info};

use crate::{
    error::AppResult,
    models::{Item, NewItem},
    random::random_string,
    repository::ItemRepository,
};

pub const BACKGROUND_NAME_LEN: usize = 50;
pub const BACKGROUND_DESCRIPTION_LEN: usize = 10;

/// Starts the periodic writer. Each tick spawns its own write, so a slow
/// store lets writes from consecutive ticks overlap.
pub fn spawn_background_writer(
    repo: Arc<dyn ItemRepository>,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(interval_secs = every.as_secs_f64(), "background writer started");

        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let repo = Arc::clone(&repo);
            tokio::spawn(async move {
                debug!("background job running");
                match write_random_item(repo.as_ref()).await {
                    Ok(item) => info!(id = %item.id, name = %item.name, "background job saved item"),
                    Err(err) => error!(error = %err, "error in background job"),
                }
            });
        }
    })
}

pub async fn write_random_item(repo: &dyn ItemRepository) -> AppResult<Item> {
    let payload = NewItem::new(
        random_string(BACKGROUND_NAME_LEN)?,
        random_string(BACKGROUND_DESCRIPTION_LEN)?,
    );
    repo.create(payload).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::repository::InMemoryItemRepository;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn writes_one_item_per_interval() {
        let repo = Arc::new(InMemoryItemRepository::new());
        let handle = spawn_background_writer(repo.clone(), Duration::from_secs(10));

        tokio::time::sleep(Duration::from_secs(35)).await;
        handle.abort();

        let items = repo.list().await.unwrap();
        assert!(items.len() >= 3, "expected at least 3 items, got {}", items.len());
        assert!(items.iter().all(|item| item.name.len() == BACKGROUND_NAME_LEN));
        assert!(
            items
                .iter()
                .all(|item| item.description.len() == BACKGROUND_DESCRIPTION_LEN)
        );

        let names = items.iter().map(|item| &item.name).collect::<HashSet<_>>();
        assert_eq!(names.len(), items.len(), "names should be random");
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_is_written_before_the_first_interval() {
        let repo = Arc::new(InMemoryItemRepository::new());
        let handle = spawn_background_writer(repo.clone(), Duration::from_secs(10));

        tokio::time::sleep(Duration::from_secs(9)).await;
        handle.abort();

        assert!(repo.is_empty().await);
    }

    struct FailingRepository {
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl ItemRepository for FailingRepository {
        async fn init(&self) -> AppResult<()> {
            Ok(())
        }

        async fn create(&self, _payload: NewItem) -> AppResult<Item> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(AppError::validation("rejected"))
        }

        async fn list(&self) -> AppResult<Vec<Item>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn failures_do_not_stop_future_ticks() {
        let repo = Arc::new(FailingRepository {
            attempts: AtomicUsize::new(0),
        });
        let handle = spawn_background_writer(repo.clone(), Duration::from_secs(10));

        tokio::time::sleep(Duration::from_secs(45)).await;
        handle.abort();

        assert!(repo.attempts.load(Ordering::SeqCst) >= 4);
    }
}
