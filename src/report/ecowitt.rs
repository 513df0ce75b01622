use super::{ReportPayload, ReportSink};
use crate::config::ReportConfig;
use anyhow::{anyhow, Result};
use reqwest::Client;
use std::time::Duration;

/// Posts the payload as an Ecowitt-style form to `<server>:<port>/data/report/`.
/// One attempt per report; the next interval carries fresher data anyway.
#[derive(Clone)]
pub struct EcowittReporter {
    url: String,
    client: Client,
    timeout: Duration,
}

impl EcowittReporter {
    pub fn new(url: String) -> Self {
        Self {
            url,
            client: Client::new(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn from_config(cfg: &ReportConfig) -> Self {
        Self::new(cfg.url()).with_timeout(cfg.timeout_secs)
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs.max(1));
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait::async_trait]
impl ReportSink for EcowittReporter {
    async fn submit(&self, payload: &ReportPayload) -> Result<()> {
        let rsp = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .form(payload)
            .send()
            .await
            .map_err(|e| anyhow!("report request failed: {e}"))?;
        rsp.error_for_status_ref()
            .map_err(|e| anyhow!("report HTTP error: {e}"))?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "ecowitt"
    }
}
