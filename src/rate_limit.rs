//! Fixed one-minute request windows keyed by client address.

use axum::http::HeaderMap;
use std::collections::HashMap;
use std::net::SocketAddr;
use tokio::sync::Mutex;

pub const PER_CLIENT_LIMIT: u32 = 60;
pub const PER_CLIENT_BURST: u32 = 10;
const MAX_TRACKED_CLIENTS: usize = 10_000;
const WINDOW_SECS: i64 = 60;

#[derive(Debug, Clone, Copy)]
struct Window {
    start_minute: i64,
    hits: u32,
}

#[derive(Debug, Default)]
pub struct RateLimiter {
    clients: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one request for `client` at `now_secs`; false once the client
    /// has used its allowance for the current minute.
    pub async fn allow(&self, client: &str, now_secs: i64) -> bool {
        let minute = now_secs.div_euclid(WINDOW_SECS);
        let mut clients = self.clients.lock().await;
        if clients.len() > MAX_TRACKED_CLIENTS {
            clients.retain(|_, w| w.start_minute == minute);
        }

        let window = clients.entry(client.to_string()).or_insert(Window {
            start_minute: minute,
            hits: 0,
        });
        if window.start_minute != minute {
            *window = Window {
                start_minute: minute,
                hits: 0,
            };
        }
        if window.hits >= PER_CLIENT_LIMIT + PER_CLIENT_BURST {
            return false;
        }
        window.hits += 1;
        true
    }
}

/// Address a request is counted against: the client a reverse proxy reports,
/// otherwise the socket peer.
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').map(str::trim).find(|hop| !hop.is_empty()))
            .map(str::to_string)
    };

    header("x-real-ip")
        .or_else(|| header("x-forwarded-for"))
        .or_else(|| peer.map(|p| p.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}
