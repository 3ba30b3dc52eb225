use {
    async_trait::async_trait,
    gatehouse_protocol::ConfigurationEntry,
    tokio::sync::Mutex,
    tracing::{debug, info},
};

/// Receives every configuration the agent pulls.
///
/// Programming the gateway's data path lives behind this trait.
#[async_trait]
pub trait ConfigurationSink: Send + Sync {
    async fn apply(&self, gateway_id: &str, entries: &[ConfigurationEntry]) -> anyhow::Result<()>;
}

/// Sink that only logs what it receives, loudly when it changes.
#[derive(Debug, Default)]
pub struct LogSink {
    last: Mutex<Option<Vec<ConfigurationEntry>>>,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConfigurationSink for LogSink {
    async fn apply(&self, gateway_id: &str, entries: &[ConfigurationEntry]) -> anyhow::Result<()> {
        let mut last = self.last.lock().await;
        if last.as_deref() == Some(entries) {
            debug!(gateway_id, entries = entries.len(), "configuration unchanged");
            return Ok(());
        }

        info!(gateway_id, entries = entries.len(), "configuration updated");
        for entry in entries {
            debug!(
                gateway_id,
                direction = %entry.direction,
                service_id = %entry.service_id,
                ports = ?entry.ports,
                vip = %entry.service_vip,
                ip = %entry.service_ip,
                "configuration entry"
            );
        }
        *last = Some(entries.to_vec());
        Ok(())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, gatehouse_protocol::Direction};

    #[tokio::test]
    async fn remembers_last_configuration() {
        let sink = LogSink::new();
        let entries = vec![ConfigurationEntry {
            direction: Direction::SpokeToHub,
            service_id: "s1".into(),
            ports: vec![],
            service_vip: "10.10.10.10".into(),
            service_ip: "2.2.2.2".into(),
        }];

        sink.apply("1", &entries).await.unwrap();
        sink.apply("1", &entries).await.unwrap();
        assert_eq!(sink.last.lock().await.as_deref(), Some(entries.as_slice()));

        sink.apply("1", &[]).await.unwrap();
        assert_eq!(sink.last.lock().await.as_deref(), Some(&[][..]));
    }
}
