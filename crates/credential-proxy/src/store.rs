use std::time::Duration;

use anyhow::Context;

/// Get-by-key access to credential bindings. The store is external
/// infrastructure: bindings are written out-of-band before a proxied
/// request arrives, and evicted by TTL.
#[async_trait::async_trait]
pub trait CredentialStore: Send + Sync {
    /// The bearer token bound to an opaque id, or None when the id is
    /// unknown or expired.
    async fn get(&self, opaque_id: &str) -> anyhow::Result<Option<String>>;
}

/// Redis-backed store on a shared multiplexed connection, safe for
/// concurrent use across request tasks.
///
/// The connection is established on first use, not at `open`: a bad URL
/// is a startup failure, while an unreachable store only fails the
/// requests that need it.
pub struct RedisStore {
    client: redis::Client,
    connection: tokio::sync::OnceCell<redis::aio::ConnectionManager>,
}

impl RedisStore {
    pub fn open(url: &str) -> anyhow::Result<Self> {
        let client =
            redis::Client::open(url).with_context(|| format!("invalid redis url '{url}'"))?;
        Ok(Self {
            client,
            connection: tokio::sync::OnceCell::new(),
        })
    }

    async fn connection(&self) -> anyhow::Result<redis::aio::ConnectionManager> {
        let connection = self
            .connection
            .get_or_try_init(|| self.client.get_connection_manager())
            .await
            .context("connecting to redis")?;
        Ok(connection.clone())
    }

    /// Bind a credential to an opaque id. Pick a TTL short enough that a
    /// stolen id expires quickly; the proxy never refreshes a binding.
    pub async fn put(&self, opaque_id: &str, token: &str, ttl: Duration) -> anyhow::Result<()> {
        let mut connection = self.connection().await?;
        let _: () = redis::cmd("SET")
            .arg(opaque_id)
            .arg(token)
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut connection)
            .await
            .context("writing credential binding")?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl CredentialStore for RedisStore {
    async fn get(&self, opaque_id: &str) -> anyhow::Result<Option<String>> {
        let mut connection = self.connection().await?;
        let token: Option<String> = redis::cmd("GET")
            .arg(opaque_id)
            .query_async(&mut connection)
            .await
            .context("reading credential binding")?;
        Ok(token)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;

    use super::CredentialStore;

    /// In-memory stand-in for the external store.
    pub struct MemoryStore {
        bindings: HashMap<String, String>,
        pub unavailable: bool,
    }

    impl MemoryStore {
        pub fn with(bindings: &[(&str, &str)]) -> Self {
            Self {
                bindings: bindings
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                unavailable: false,
            }
        }
    }

    #[async_trait::async_trait]
    impl CredentialStore for MemoryStore {
        async fn get(&self, opaque_id: &str) -> anyhow::Result<Option<String>> {
            if self.unavailable {
                anyhow::bail!("store unreachable");
            }
            Ok(self.bindings.get(opaque_id).cloned())
        }
    }
}
