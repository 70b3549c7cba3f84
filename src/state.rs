use std::{path::PathBuf, sync::Arc};

use crate::{
    chat::{ChatUsage, CompletionClient}, config::NetworkConfig, events::EventBus, image::ImageLimits,
    wallet::WalletConnector, Gateway,
};

/// Shared application state.
pub struct AppState {
    /// Directory containing built UI static files.
    pub ui_dir: PathBuf,
    pub network: NetworkConfig,
    /// Broadcast channel for WebSocket events.
    pub events: EventBus,
    pub wallet: Arc<WalletConnector>,
    pub gateway: Arc<Gateway>,
    /// Chat completion backend; chat routes fail without one.
    pub completion: Option<Arc<dyn CompletionClient>>,
    /// Chat turns charged per chatbot and account.
    pub chat_usage: ChatUsage,
    pub image_limits: ImageLimits,
}
