use std::sync::Arc;

use gitfleet_ingest::IngestService;

/// Shared state handed to every route handler.
pub struct AppState {
    pub ingest: Arc<IngestService>,
}
