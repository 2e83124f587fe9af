//! Liveness ping to an external URL.

use std::time::Duration;

use riskctl_scheduler::{BoxFuture, JobReport, ScheduledJob};
use tracing::{info, warn};

use crate::error::{JobError, JobResult};

pub struct HeartbeatJob {
    client: reqwest::Client,
    url: String,
}

impl HeartbeatJob {
    pub const NAME: &'static str = "heartbeat";

    pub fn new(url: impl Into<String>, timeout: Duration) -> JobResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| JobError::Heartbeat(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// GET the URL and return the status code.
    pub async fn ping(&self) -> JobResult<u16> {
        let response = self.client.get(&self.url).send().await.map_err(|e| {
            warn!(url = %self.url, error = %e, "Heartbeat request failed");
            JobError::Heartbeat(e.to_string())
        })?;
        let status = response.status().as_u16();
        info!(url = %self.url, status, "Heartbeat response");
        Ok(status)
    }
}

impl ScheduledJob for HeartbeatJob {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn run(&self) -> BoxFuture<'_, anyhow::Result<JobReport>> {
        Box::pin(async move {
            self.ping().await?;
            Ok(JobReport::Completed {
                users: 0,
                actions: 1,
                failures: 0,
            })
        })
    }
}
