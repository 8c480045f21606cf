//! Fetch run: pull messages from the provider and upsert them locally.

use std::fmt;

use tracing::{info, warn};

use crate::error::Result;
use crate::provider::MailProvider;
use crate::store::MailStore;

/// Counts for one fetch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchSummary {
    pub fetched: usize,
    pub stored: usize,
    pub failed: usize,
}

impl fmt::Display for FetchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "fetched {} message(s), stored {}, failed to store {}",
            self.fetched, self.stored, self.failed
        )
    }
}

/// Fetch up to `limit` messages and upsert each one.
///
/// A provider failure aborts the run; a failed upsert is logged and counted.
pub async fn fetch_and_store(
    provider: &dyn MailProvider,
    store: &dyn MailStore,
    limit: usize,
) -> Result<FetchSummary> {
    let messages = provider.fetch_messages(limit).await?;
    let mut summary = FetchSummary {
        fetched: messages.len(),
        ..Default::default()
    };

    for message in &messages {
        match store.upsert_message(message).await {
            Ok(()) => summary.stored += 1,
            Err(e) => {
                warn!(message_id = %message.id, error = %e, "Failed to store message");
                summary.failed += 1;
            }
        }
    }

    info!(
        provider = provider.name(),
        fetched = summary.fetched,
        stored = summary.stored,
        failed = summary.failed,
        "Fetch run complete"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::error::{Error, ProviderError};
    use crate::message::Message;
    use crate::store::LibSqlBackend;

    struct FixedProvider(Vec<Message>);

    #[async_trait]
    impl MailProvider for FixedProvider {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn fetch_messages(&self, max_results: usize) -> std::result::Result<Vec<Message>, ProviderError> {
            Ok(self.0.iter().take(max_results).cloned().collect())
        }
    }

    struct DownProvider;

    #[async_trait]
    impl MailProvider for DownProvider {
        fn name(&self) -> &str {
            "down"
        }

        async fn fetch_messages(&self, _max_results: usize) -> std::result::Result<Vec<Message>, ProviderError> {
            Err(ProviderError::AuthFailed {
                provider: "down".into(),
            })
        }
    }

    #[tokio::test]
    async fn stores_fetched_messages_up_to_limit() {
        let store = LibSqlBackend::new_memory().await.unwrap();
        let provider = FixedProvider(vec![
            Message::new("a").with_subject("one"),
            Message::new("b").with_subject("two"),
            Message::new("c").with_subject("three"),
        ]);

        let summary = fetch_and_store(&provider, &store, 2).await.unwrap();
        assert_eq!(
            summary,
            FetchSummary {
                fetched: 2,
                stored: 2,
                failed: 0
            }
        );
        assert!(store.get_message("a").await.unwrap().is_some());
        assert!(store.get_message("c").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn refetch_overwrites_existing_rows() {
        let store = LibSqlBackend::new_memory().await.unwrap();
        fetch_and_store(&FixedProvider(vec![Message::new("a").with_read(false)]), &store, 10)
            .await
            .unwrap();
        fetch_and_store(&FixedProvider(vec![Message::new("a").with_read(true)]), &store, 10)
            .await
            .unwrap();

        let stored = store.list_messages(10).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert!(stored[0].is_read);
    }

    #[tokio::test]
    async fn provider_failure_surfaces() {
        let store = LibSqlBackend::new_memory().await.unwrap();
        let err = fetch_and_store(&DownProvider, &store, 10).await.unwrap_err();
        assert!(matches!(err, Error::Provider(ProviderError::AuthFailed { .. })));
    }
}
