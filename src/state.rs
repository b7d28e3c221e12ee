use std::sync::Arc;

use crate::config::ExtractConfig;
use crate::fetch::Fetcher;

/// Shared application state passed to all handlers.
/// Holds only the outbound client pool and read-only extraction settings;
/// nothing here changes between requests.
#[derive(Clone)]
pub struct AppState {
    pub fetcher: Fetcher,
    pub extract: Arc<ExtractConfig>,
}
