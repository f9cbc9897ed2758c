use std::{collections::HashMap, hash::Hash, time::Duration};

use tokio::{sync::Mutex, time::Instant};

use crate::models::Product;

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// Bounded in-memory map whose entries expire `ttl` after their last write.
///
/// When full, inserting a new key first drops expired entries and then the
/// entry closest to expiry.
pub struct ExpiringCache<K, V> {
    entries: Mutex<HashMap<K, Entry<V>>>,
    ttl: Duration,
    capacity: usize,
}

impl<K, V> ExpiringCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            capacity: capacity.max(1),
        }
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub async fn insert(&self, key: K, value: V) {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        if !entries.contains_key(&key) && entries.len() >= self.capacity {
            entries.retain(|_, entry| entry.expires_at > now);
            if entries.len() >= self.capacity {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.expires_at)
                    .map(|(k, _)| k.clone());
                if let Some(oldest) = oldest {
                    entries.remove(&oldest);
                }
            }
        }
        entries.insert(
            key,
            Entry {
                value,
                expires_at: now + self.ttl,
            },
        );
    }

    pub async fn remove(&self, key: &K) -> Option<V> {
        self.entries.lock().await.remove(key).map(|entry| entry.value)
    }

    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .await
            .values()
            .filter(|entry| entry.expires_at > now)
            .count()
    }
}

impl<K, V> ExpiringCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone + Default,
{
    /// Applies `f` to the live value for `key` (or a default one) and stores the result.
    pub async fn update<F, R>(&self, key: K, f: F) -> R
    where
        F: FnOnce(&mut V) -> R,
    {
        let mut value = self.get(&key).await.unwrap_or_default();
        let out = f(&mut value);
        self.insert(key, value).await;
        out
    }
}

/// Conversation state of one chat.
#[derive(Debug, Clone, Default)]
pub struct ChatSession {
    pub awaiting_credentials: bool,
    pub category_slug: Option<String>,
    pub page: i64,
    /// Messages removed when the product list is paged.
    pub last_message_ids: Vec<i64>,
    /// Products of the page on screen, matched by name on selection.
    pub last_products: Vec<Product>,
}

impl ChatSession {
    pub fn find_product(&self, name: &str) -> Option<&Product> {
        self.last_products.iter().find(|p| p.name == name)
    }
}
