use std::time::Duration;

use tracing::{debug, warn};

use crate::Result;
use crate::config::Config;
use crate::formatter;
use crate::history::{HistoryItem, HistoryStore};
use crate::http::{CancelToken, Dispatcher, RequestData, ResponseData};

/// One call per execution for the presentation layer: dispatch, format and
/// (optionally) record.
pub struct Workbench {
    dispatcher: Dispatcher,
    history: Option<HistoryStore>,
    timeout: Duration,
}

impl Workbench {
    pub fn new(dispatcher: Dispatcher, history: Option<HistoryStore>, timeout: Duration) -> Self {
        Self {
            dispatcher,
            history,
            timeout,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let history = config.history.enabled.then(|| {
            HistoryStore::new(config.history_dir()).with_capacity(config.history.max_items)
        });
        Ok(Self::new(Dispatcher::new()?, history, config.timeout()))
    }

    pub fn history(&self) -> Option<&HistoryStore> {
        self.history.as_ref()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Executes and formats; never fails.
    pub async fn send(&self, request: &RequestData, cancel: &CancelToken) -> ResponseData {
        let response = self
            .dispatcher
            .execute_cancellable(request, self.timeout, cancel)
            .await;
        formatter::apply(&response)
    }

    /// `Ok(None)` when history is disabled.
    pub fn record(
        &self,
        request: &RequestData,
        response: &ResponseData,
    ) -> Result<Option<HistoryItem>> {
        match &self.history {
            Some(store) => store.record(request, response).map(Some),
            None => Ok(None),
        }
    }

    /// Sends, then records unless the execution was cancelled. The response
    /// is returned even when recording fails.
    pub async fn send_and_record(
        &self,
        request: &RequestData,
        cancel: &CancelToken,
    ) -> (ResponseData, Result<Option<HistoryItem>>) {
        let response = self.send(request, cancel).await;
        if response.is_cancelled() {
            debug!("execution cancelled; not recorded");
            return (response, Ok(None));
        }

        let recorded = self.record(request, &response);
        if let Err(e) = &recorded {
            warn!(error = %e, "failed to record history");
        }
        (response, recorded)
    }
}
