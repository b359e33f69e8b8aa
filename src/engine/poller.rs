// HTTP polling of a single target.

use std::time::Duration;

use crate::engine::config::Target;
use crate::error::TargetError;

/// Fetches target pages. One client is shared by every poll in the process.
#[derive(Debug, Clone)]
pub struct TargetPoller {
    client: reqwest::Client,
}

impl TargetPoller {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("propane/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self { client }
    }

    /// GET the target's URL and return the body. Every failure (connect,
    /// DNS, timeout, non-success status) is `Unreachable` for this target only.
    /// No retry here: the next cycle polls again.
    pub async fn fetch(&self, target: &Target, timeout: Duration) -> Result<Vec<u8>, TargetError> {
        let unreachable = |reason: String| TargetError::Unreachable {
            target: target.name.clone(),
            url: target.url.clone(),
            reason,
        };

        let request = async {
            let response = self
                .client
                .get(&target.url)
                .timeout(timeout)
                .send()
                .await?
                .error_for_status()?;
            Ok::<_, reqwest::Error>(response.bytes().await?)
        };

        match tokio::time::timeout(timeout, request).await {
            Ok(Ok(body)) => Ok(body.to_vec()),
            Ok(Err(e)) => Err(unreachable(describe(&e))),
            Err(_) => Err(unreachable(format!("timed out after {}s", timeout.as_secs_f32()))),
        }
    }
}

impl Default for TargetPoller {
    fn default() -> Self {
        Self::new()
    }
}

fn describe(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "timed out".to_string()
    } else if let Some(status) = e.status() {
        format!("HTTP {status}")
    } else if e.is_connect() {
        "connection failed".to_string()
    } else {
        e.to_string()
    }
}
