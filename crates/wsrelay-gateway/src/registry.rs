//! Live client registry: `client_id -> Client`.
//!
//! Lets producers that only know a peer's id reach its mailbox. There is no
//! broadcast here; callers that need fan-out track their own id lists.

use std::sync::Arc;

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

use wsrelay_core::error::{RelayError, Result};
use wsrelay_core::protocol::Message;

use crate::client::Client;

#[derive(Default)]
pub struct ClientRegistry {
    clients: DashMap<String, Arc<Client>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self {
            clients: DashMap::new(),
        }
    }

    pub fn insert(&self, client: Arc<Client>) {
        self.clients.insert(client.id().to_string(), client);
    }

    pub fn remove(&self, id: &str) -> Option<Arc<Client>> {
        self.clients.remove(id).map(|(_, c)| c)
    }

    pub fn get(&self, id: &str) -> Option<Arc<Client>> {
        self.clients.get(id).map(|r| Arc::clone(r.value()))
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Enqueue `msg` for one client, waiting for mailbox space.
    pub async fn send_to(&self, id: &str, msg: Message, cancel: &CancellationToken) -> Result<()> {
        let client = self
            .get(id)
            .ok_or_else(|| RelayError::BadRequest(format!("client not connected: {id}")))?;
        client.outbound().send(msg, cancel).await
    }
}
