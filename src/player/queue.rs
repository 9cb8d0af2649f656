//! Cola FIFO de peticiones de reproducción.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, UserId};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::debug;

/// Petición de reproducción ya resuelta, lista para sonar.
#[derive(Debug, Clone)]
pub struct TrackRequest {
    pub title: String,
    /// URL del stream de audio (consumida por el driver de voz).
    pub stream_url: String,
    /// Página canónica del track, para los embeds.
    pub webpage_url: String,
    pub requested_by: UserId,
    pub requested_by_name: String,
    /// Canal de texto donde anunciar "reproduciendo ahora".
    pub announce_channel: ChannelId,
    pub enqueued_at: DateTime<Utc>,
}

/// Cola FIFO sin límite con un único consumidor (el loop de reproducción).
///
/// El consumidor espera con timeout: que venza el plazo es un resultado
/// limpio (`None`), no un error.
#[derive(Debug, Default)]
pub struct TrackQueue {
    items: Mutex<VecDeque<TrackRequest>>,
    notify: Notify,
}

impl TrackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, request: TrackRequest) {
        debug!("➕ Agregado a la cola: {}", request.title);
        self.items.lock().push_back(request);
        self.notify.notify_one();
    }

    /// Espera el siguiente track hasta `timeout`. Devuelve `None` si el
    /// plazo vence con la cola vacía.
    pub async fn recv_timeout(&self, timeout: Duration) -> Option<TrackRequest> {
        let deadline = Instant::now() + timeout;

        loop {
            if let Some(request) = self.items.lock().pop_front() {
                return Some(request);
            }

            if tokio::time::timeout_at(deadline, self.notify.notified())
                .await
                .is_err()
            {
                return None;
            }
        }
    }

    /// Copia del contenido pendiente, en orden de reproducción.
    pub fn snapshot(&self) -> Vec<TrackRequest> {
        self.items.lock().iter().cloned().collect()
    }

    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn request(title: &str) -> TrackRequest {
        TrackRequest {
            title: title.to_string(),
            stream_url: format!("https://cdn.example/{title}"),
            webpage_url: format!("https://example.com/{title}"),
            requested_by: UserId::new(1),
            requested_by_name: "tester".to_string(),
            announce_channel: ChannelId::new(1),
            enqueued_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = TrackQueue::new();
        queue.push(request("a"));
        queue.push(request("b"));
        queue.push(request("c"));

        let timeout = Duration::from_millis(50);
        let titles: Vec<String> = [
            queue.recv_timeout(timeout).await.unwrap().title,
            queue.recv_timeout(timeout).await.unwrap().title,
            queue.recv_timeout(timeout).await.unwrap().title,
        ]
        .into();

        assert_eq!(titles, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_recv_wakes_on_push() {
        let queue = Arc::new(TrackQueue::new());

        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.recv_timeout(Duration::from_secs(5)).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.push(request("a"));

        let received = consumer.await.unwrap();
        assert_eq!(received.unwrap().title, "a");
    }

    #[tokio::test]
    async fn test_timeout_returns_none() {
        let queue = TrackQueue::new();
        let got = queue.recv_timeout(Duration::from_millis(30)).await;
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn test_snapshot_preserves_order() {
        let queue = TrackQueue::new();
        queue.push(request("a"));
        queue.push(request("b"));

        let titles: Vec<String> = queue.snapshot().into_iter().map(|r| r.title).collect();
        assert_eq!(titles, vec!["a", "b"]);
        assert_eq!(queue.len(), 2);
    }
}
