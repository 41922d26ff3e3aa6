use crate::config::{Compression, PublishConfig};
use crate::record::MetricRecord;
use anyhow::{Context, Result};
use reqwest::header::{CONTENT_ENCODING, CONTENT_TYPE};
use reqwest::Client;
use tracing::{info, warn};

/// Destination for a cycle's batch.
#[allow(async_fn_in_trait)]
pub trait Publisher {
    async fn publish(&self, batch: &[MetricRecord]) -> Result<()>;
}

/// POSTs the batch as a JSON array to the logging endpoint.
pub struct HttpPublisher {
    client: Client,
    endpoint: String,
    compression: Compression,
}

impl HttpPublisher {
    pub fn new(cfg: &PublishConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(cfg.timeout())
            .tcp_nodelay(true)
            .pool_max_idle_per_host(2)
            .build()
            .context("building reqwest client")?;
        Ok(Self {
            client,
            endpoint: cfg.url.clone(),
            compression: cfg.compression,
        })
    }
}

impl Publisher for HttpPublisher {
    async fn publish(&self, batch: &[MetricRecord]) -> Result<()> {
        let body = serde_json::to_vec(batch).context("serializing batch")?;
        let mut req = self.client.post(&self.endpoint).header(CONTENT_TYPE, "application/json");
        req = match self.compression {
            Compression::Zstd => {
                let compressed = zstd::stream::encode_all(&body[..], 3).context("zstd compress")?;
                req.header(CONTENT_ENCODING, "zstd").body(compressed)
            }
            Compression::None => req.body(body),
        };
        let resp = req.send().await.context("send request")?;
        if !resp.status().is_success() {
            anyhow::bail!("logging endpoint returned status {}", resp.status());
        }
        Ok(())
    }
}

/// Publish and swallow any failure. Returns whether the batch was accepted.
pub async fn publish_contained<P: Publisher>(publisher: &P, batch: &[MetricRecord]) -> bool {
    match publisher.publish(batch).await {
        Ok(()) => {
            info!(records = batch.len(), "batch delivered");
            true
        }
        Err(e) => {
            warn!(error = ?e, records = batch.len(), "publish failed");
            false
        }
    }
}
