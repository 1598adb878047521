pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod models;
pub mod routes;

use std::sync::Arc;

use config::Config;
use db::store::{ConversationStore, MessageLog, NotificationStore, StoreError};
use gateway::delivery::DeliveryEngine;
use gateway::fanout::GatewayBroadcast;
use gateway::presence::PresenceRegistry;

/// Shared application state available to all route handlers and gateway
/// connections.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub conversations: Arc<dyn ConversationStore>,
    pub messages: Arc<dyn MessageLog>,
    pub notifications: Arc<dyn NotificationStore>,
    pub presence: Arc<PresenceRegistry>,
    pub broadcast: GatewayBroadcast,
    pub delivery: Arc<DeliveryEngine>,
}

impl AppState {
    /// Wire the stores, presence registry, broadcast hub and delivery engine
    /// around a single backing store.
    pub fn new<S>(config: Config, store: Arc<S>) -> Self
    where
        S: ConversationStore + MessageLog + NotificationStore + 'static,
    {
        let conversations: Arc<dyn ConversationStore> = store.clone();
        let messages: Arc<dyn MessageLog> = store.clone();
        let notifications: Arc<dyn NotificationStore> = store;
        let presence = Arc::new(PresenceRegistry::new());
        let broadcast = GatewayBroadcast::new();

        let delivery = Arc::new(DeliveryEngine::new(
            conversations.clone(),
            messages.clone(),
            notifications.clone(),
            presence.clone(),
            broadcast.clone(),
        ));

        Self {
            config: Arc::new(config),
            conversations,
            messages,
            notifications,
            presence,
            broadcast,
            delivery,
        }
    }

    /// Startup work that must finish before the listener accepts
    /// connections: the public conversation is created here, once.
    pub async fn bootstrap(&self) -> Result<(), StoreError> {
        let public = self.conversations.get_or_create_public().await?;
        tracing::info!(conversation_id = %public.id, "public conversation ready");
        Ok(())
    }
}
