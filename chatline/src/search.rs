use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::api::ChatBackend;
use crate::models::validation::MAX_SEARCH_QUERY_LENGTH;
use crate::models::UserSummary;

#[derive(Debug, Clone, PartialEq)]
pub struct SearchHints {
    pub query: String,
    pub users: Vec<UserSummary>,
}

/// Search-as-you-type with a debounce.
///
/// Every call to `input` cancels the pending search and schedules a new one;
/// the request only goes out once the delay passes without further input.
pub struct UserSearch {
    backend: Arc<dyn ChatBackend>,
    delay: Duration,
    pending: Option<JoinHandle<()>>,
    hints_tx: mpsc::UnboundedSender<SearchHints>,
}

impl UserSearch {
    pub fn new(backend: Arc<dyn ChatBackend>, delay: Duration) -> (Self, mpsc::UnboundedReceiver<SearchHints>) {
        let (hints_tx, hints_rx) = mpsc::unbounded_channel();
        let search = Self {
            backend,
            delay,
            pending: None,
            hints_tx,
        };
        (search, hints_rx)
    }

    pub fn input(&mut self, query: &str) {
        self.cancel();

        let query: String = query.trim().chars().take(MAX_SEARCH_QUERY_LENGTH).collect();
        if query.is_empty() {
            let _ = self.hints_tx.send(SearchHints {
                query,
                users: Vec::new(),
            });
            return;
        }

        let backend = self.backend.clone();
        let hints_tx = self.hints_tx.clone();
        let delay = self.delay;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            debug!(query = %query, "Searching users");
            match backend.search_users(&query).await {
                Ok(users) => {
                    let _ = hints_tx.send(SearchHints { query, users });
                }
                Err(e) => warn!(query = %query, error = %e, "User search failed"),
            }
        }));
    }

    /// Drop the pending search, if any.
    pub fn cancel(&mut self) {
        if let Some(task) = self.pending.take() {
            task.abort();
        }
    }
}

impl Drop for UserSearch {
    fn drop(&mut self) {
        self.cancel();
    }
}
