//! Completion ping for an external uptime monitor

use std::time::Duration;

use anyhow::{Context, Result};

/// Signals a successful rotation to whoever is watching
pub trait Heartbeat {
    fn send(&self, url: &str) -> Result<()>;
}

/// Plain HTTP GET
pub struct HttpHeartbeat {
    agent: ureq::Agent,
}

impl HttpHeartbeat {
    pub fn new(timeout: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }
}

impl Default for HttpHeartbeat {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

impl Heartbeat for HttpHeartbeat {
    fn send(&self, url: &str) -> Result<()> {
        self.agent
            .get(url)
            .call()
            .with_context(|| format!("GET {url} failed"))?;
        Ok(())
    }
}
