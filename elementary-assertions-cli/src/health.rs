use std::time::Duration;

use elementary_assertions::HealthProbe;
use tracing::debug;

/// `GET <endpoint>/health`, one attempt, anything but 200 fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct UreqHealthProbe;

fn health_url(endpoint: &str) -> String {
    format!("{}/health", endpoint.trim_end_matches('/'))
}

impl HealthProbe for UreqHealthProbe {
    fn check(&self, endpoint: &str, timeout: Duration) -> Result<(), String> {
        let url = health_url(endpoint);
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        debug!(%url, timeout_ms = timeout.as_millis() as u64, "probing WTI");

        match agent.get(&url).call() {
            Ok(response) if response.status() == 200 => Ok(()),
            Ok(response) => Err(format!("HTTP {}", response.status())),
            Err(ureq::Error::Status(code, _)) => Err(format!("HTTP {code}")),
            Err(ureq::Error::Transport(transport)) => Err(transport.to_string()),
        }
    }
}
