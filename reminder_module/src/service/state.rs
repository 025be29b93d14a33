use std::sync::Arc;

use crate::linking::LinkingFlow;

use super::chat::ChatRelay;

#[derive(Clone)]
pub struct AppState {
    pub linking: Arc<LinkingFlow>,
    pub channel_secret: Option<String>,
    pub chat: Arc<ChatRelay>,
}

impl AppState {
    pub fn new(linking: Arc<LinkingFlow>, channel_secret: Option<String>, chat: ChatRelay) -> Self {
        Self {
            linking,
            channel_secret,
            chat: Arc::new(chat),
        }
    }
}
