use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Enforces a minimum spacing between consecutive backend requests.
///
/// Each run owns its own pacer, so concurrent runs for different languages
/// never wait on each other.
#[derive(Debug)]
pub struct RequestPacer {
    min_interval: Duration,
    last_request: Option<Instant>,
}

impl RequestPacer {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request: None,
        }
    }

    /// Wait until the next request is allowed, then mark it as sent.
    pub async fn wait(&mut self) {
        if let Some(last) = self.last_request {
            let next_allowed = last + self.min_interval;
            let now = Instant::now();
            if next_allowed > now {
                let remaining = next_allowed - now;
                debug!("Pacing backend request for {:?}", remaining);
                tokio::time::sleep(remaining).await;
            }
        }
        self.last_request = Some(Instant::now());
    }
}
