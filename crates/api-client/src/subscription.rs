//! Keeps cached queries in step with the realtime change feed.

use futures::{Stream, StreamExt};
use tokio::task::JoinHandle;

use taskboard_api::ChangeTable;

use crate::cache::{QueryCache, QueryKey};
use crate::sse::FeedMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Subscribed,
    /// Explicitly closed, or the feed ended (server gone, network lost).
    Unsubscribed,
}

/// Background task that invalidates one cache prefix whenever its table
/// changes. Dropping the subscription stops the task.
pub struct Subscription {
    table: ChangeTable,
    handle: JoinHandle<()>,
}

impl Subscription {
    /// Consume `feed`, invalidating `prefix` in `cache` on every change to
    /// `table` and on every lag notice.
    pub fn spawn<S>(feed: S, table: ChangeTable, prefix: QueryKey, cache: QueryCache) -> Self
    where
        S: Stream<Item = anyhow::Result<FeedMessage>> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut feed = Box::pin(feed);
            while let Some(message) = feed.next().await {
                match message {
                    Ok(FeedMessage::Change(event)) if event.table == table => {
                        cache.invalidate(&prefix);
                    }
                    Ok(FeedMessage::Change(_)) => {}
                    Ok(FeedMessage::Lagged(skipped)) => {
                        tracing::debug!(%table, skipped, "change feed lagged");
                        cache.invalidate(&prefix);
                    }
                    Err(e) => {
                        tracing::debug!(%table, "change feed closed: {e:#}");
                        break;
                    }
                }
            }
        });
        Self { table, handle }
    }

    pub fn table(&self) -> ChangeTable {
        self.table
    }

    pub fn state(&self) -> SubscriptionState {
        if self.handle.is_finished() {
            SubscriptionState::Unsubscribed
        } else {
            SubscriptionState::Subscribed
        }
    }

    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::key;
    use std::time::Duration;
    use taskboard_api::{ChangeEvent, ChangeOp};
    use tokio::sync::mpsc;
    use tokio_stream::wrappers::UnboundedReceiverStream;

    fn change(table: ChangeTable) -> anyhow::Result<FeedMessage> {
        Ok(FeedMessage::Change(ChangeEvent {
            table,
            op: ChangeOp::Update,
            id: "x".into(),
        }))
    }

    async fn next_generation(rx: &mut tokio::sync::watch::Receiver<u64>) -> u64 {
        tokio::time::timeout(Duration::from_secs(2), rx.changed())
            .await
            .expect("invalidation not observed")
            .unwrap();
        *rx.borrow_and_update()
    }

    #[tokio::test]
    async fn invalidates_only_for_its_table() {
        let cache = QueryCache::new();
        cache.insert(key(["tasks", "recent"]), &1).unwrap();
        cache.insert(key(["projects"]), &2).unwrap();
        let mut generation = cache.subscribe_generation();

        let (tx, rx) = mpsc::unbounded_channel();
        let sub = Subscription::spawn(
            UnboundedReceiverStream::new(rx),
            ChangeTable::Tasks,
            key(["tasks"]),
            cache.clone(),
        );
        assert_eq!(sub.state(), SubscriptionState::Subscribed);

        tx.send(change(ChangeTable::Projects)).unwrap();
        tx.send(change(ChangeTable::Tasks)).unwrap();
        assert_eq!(next_generation(&mut generation).await, 1);
        assert_eq!(cache.get::<i32>(&key(["tasks", "recent"])), None);
        assert_eq!(cache.get::<i32>(&key(["projects"])), Some(2));

        tx.send(Ok(FeedMessage::Lagged(4))).unwrap();
        assert_eq!(next_generation(&mut generation).await, 2);
    }

    #[tokio::test]
    async fn feed_end_marks_unsubscribed() {
        let (tx, rx) = mpsc::unbounded_channel();
        let sub = Subscription::spawn(
            UnboundedReceiverStream::new(rx),
            ChangeTable::Teams,
            key(["teams"]),
            QueryCache::new(),
        );
        tx.send(Err(anyhow::anyhow!("connection reset"))).unwrap();

        tokio::time::timeout(Duration::from_secs(2), async {
            while sub.state() == SubscriptionState::Subscribed {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        assert_eq!(sub.table(), ChangeTable::Teams);
        sub.unsubscribe();
    }
}
