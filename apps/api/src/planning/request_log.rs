use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::models::request_log::{NewRequestLog, RequestLog};
use crate::store::{PlannerStore, StoreError};

/// Appends audit entries for model calls. Never fails the caller: a storage
/// error is reported through tracing and the entry is dropped.
///
/// Profile and plan ids on an entry are weak references. If either row is
/// gone by the time the entry is written, the entry is kept without them.
#[derive(Clone)]
pub struct RequestLogger {
    store: Arc<dyn PlannerStore>,
}

impl RequestLogger {
    pub fn new(store: Arc<dyn PlannerStore>) -> Self {
        Self { store }
    }

    pub async fn record(&self, entry: NewRequestLog) -> Option<RequestLog> {
        let entry = match self.store.append_request_log(&entry).await {
            Ok(row) => return Some(logged(row)),
            Err(StoreError::NotFound(missing))
                if entry.profile_id.is_some() || entry.plan_id.is_some() =>
            {
                warn!(
                    "AI request for {} references a missing {missing}; logging it detached",
                    entry.profile_email
                );
                NewRequestLog {
                    profile_id: None,
                    plan_id: None,
                    ..entry
                }
            }
            Err(e) => {
                error!("Failed to log AI request for {}: {e}", entry.profile_email);
                return None;
            }
        };

        match self.store.append_request_log(&entry).await {
            Ok(row) => Some(logged(row)),
            Err(e) => {
                error!("Failed to log AI request for {}: {e}", entry.profile_email);
                None
            }
        }
    }
}

fn logged(row: RequestLog) -> RequestLog {
    debug!(
        "Logged {:?} request {} for {} ({:?})",
        row.request_type, row.id, row.profile_email, row.status
    );
    row
}
