use core_auth::TokenLifecycleManager;
use core_runtime::events::EventBus;
use provider_google_drive::DriveUploader;
use std::sync::Arc;

/// Shared state handed to every route handler.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<TokenLifecycleManager>,
    pub uploader: Arc<DriveUploader>,
    pub events: EventBus,
}

impl AppState {
    pub fn new(
        manager: Arc<TokenLifecycleManager>,
        uploader: Arc<DriveUploader>,
        events: EventBus,
    ) -> Self {
        Self {
            manager,
            uploader,
            events,
        }
    }
}
