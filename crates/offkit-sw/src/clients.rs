//! Controlled pages and the claim operation.

use std::sync::atomic::{AtomicU64, Ordering};

use hashbrown::HashMap;
use tracing::debug;
use url::Url;

/// A page that can be controlled by the worker.
#[derive(Debug, Clone)]
pub struct Client {
    /// Client ID.
    pub id: String,
    /// Page URL.
    pub url: Url,
    /// Whether this worker controls the page.
    pub controlled: bool,
}

/// Registry of open pages.
#[derive(Debug, Default)]
pub struct Clients {
    clients: HashMap<String, Client>,
}

impl Clients {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an open page. Pages start uncontrolled; they come under the
    /// worker's control either through claiming or by reloading after
    /// activation.
    pub fn add_window(&mut self, url: Url) -> Client {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        let id = format!("client-{}", COUNTER.fetch_add(1, Ordering::Relaxed));
        let client = Client {
            id: id.clone(),
            url,
            controlled: false,
        };
        self.clients.insert(id, client.clone());
        client
    }

    /// Get a client by ID.
    pub fn get(&self, id: &str) -> Option<&Client> {
        self.clients.get(id)
    }

    /// Remove a client (page closed or navigated away).
    pub fn remove(&mut self, id: &str) -> Option<Client> {
        self.clients.remove(id)
    }

    /// Take control of every open, uncontrolled page without a reload.
    /// Returns how many pages were newly claimed.
    pub fn claim(&mut self) -> usize {
        let mut claimed = 0;
        for client in self.clients.values_mut() {
            if !client.controlled {
                client.controlled = true;
                claimed += 1;
            }
        }
        debug!(claimed, total = self.clients.len(), "claimed clients");
        claimed
    }

    /// Number of controlled pages.
    pub fn controlled_count(&self) -> usize {
        self.clients.values().filter(|c| c.controlled).count()
    }

    /// Total number of open pages.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Whether no pages are open.
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_get() {
        let mut clients = Clients::new();
        let client = clients.add_window(Url::parse("https://app.example.com/").unwrap());

        assert!(!client.controlled);
        assert!(clients.get(&client.id).is_some());
    }

    #[test]
    fn test_claim_controls_all_pages() {
        let mut clients = Clients::new();
        let origin = Url::parse("https://app.example.com/").unwrap();
        clients.add_window(origin.clone());
        clients.add_window(origin);

        assert_eq!(clients.controlled_count(), 0);
        assert_eq!(clients.claim(), 2);
        assert_eq!(clients.controlled_count(), 2);

        // Claiming again is a no-op.
        assert_eq!(clients.claim(), 0);
    }

    #[test]
    fn test_remove() {
        let mut clients = Clients::new();
        let client = clients.add_window(Url::parse("https://app.example.com/").unwrap());

        assert!(clients.remove(&client.id).is_some());
        assert!(clients.is_empty());
    }
}
