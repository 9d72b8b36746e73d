use async_trait::async_trait;
use serenity::{http::Http, model::id::ChannelId};
use std::sync::Arc;
use tracing::warn;

/// Outbound text channel for reports that do not answer a command
/// (now playing after an auto-advance, errors raised by the voice driver).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Announcer: Send + Sync + 'static {
    async fn announce(&self, channel_id: ChannelId, text: &str);
}

pub struct ChannelAnnouncer {
    http: Arc<Http>,
}

impl ChannelAnnouncer {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Announcer for ChannelAnnouncer {
    async fn announce(&self, channel_id: ChannelId, text: &str) {
        if let Err(e) = channel_id.say(&self.http, text).await {
            warn!("No se pudo enviar mensaje al canal {}: {:?}", channel_id, e);
        }
    }
}
