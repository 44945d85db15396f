use std::time::Duration;

use async_trait::async_trait;
use etcd_client::{
    Certificate, Client, Compare, CompareOp, ConnectOptions, GetOptions, Identity, TlsOptions,
    Txn, TxnOp,
};
use log::{debug, info};

use super::{IpamStore, Revisioned};
use crate::error::Result;

/// Connection settings for an etcd-compatible endpoint set.
#[derive(Clone)]
pub struct StoreOptions {
    pub endpoints: Vec<String>,
    pub config: Option<ConnectOptions>,
}

impl StoreOptions {
    pub fn new(endpoints: Vec<String>) -> Self {
        Self {
            endpoints,
            config: None,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        let config = self.config.take().unwrap_or_else(ConnectOptions::new);
        self.config = Some(config.with_connect_timeout(timeout));
        self
    }

    /// Enable mutual TLS with PEM encoded material.
    pub fn with_tls(
        mut self,
        root_cert: impl AsRef<str>,
        cert: impl AsRef<str>,
        private_key: impl AsRef<str>,
    ) -> Self {
        let tls_cfg = TlsOptions::default()
            .ca_certificate(Certificate::from_pem(root_cert.as_ref()))
            .identity(Identity::from_pem(cert.as_ref(), private_key.as_ref()));

        let config = self.config.take().unwrap_or_else(ConnectOptions::new);
        self.config = Some(config.with_tls(tls_cfg));
        self
    }
}

/// [`IpamStore`] backed by etcd or Xline.
#[derive(Clone)]
pub struct XlineIpamStore {
    client: Client,
}

impl XlineIpamStore {
    pub async fn connect(option: StoreOptions) -> Result<Self> {
        info!("connecting to store endpoints {:?}", option.endpoints);
        let client = Client::connect(option.endpoints, option.config).await?;
        Ok(Self { client })
    }
}

#[async_trait]
impl IpamStore for XlineIpamStore {
    async fn get(&self, key: &str) -> Result<Option<Revisioned>> {
        // Cloning the client is cheap; it shares the underlying channel.
        let mut client = self.client.clone();
        let resp = client.get(key, None).await?;
        Ok(resp.kvs().first().map(|kv| Revisioned {
            value: kv.value().to_vec(),
            mod_revision: kv.mod_revision(),
        }))
    }

    async fn put_if_revision(
        &self,
        key: &str,
        expected_mod_revision: i64,
        value: Vec<u8>,
    ) -> Result<bool> {
        let mut client = self.client.clone();

        // A missing key has no mod_revision, but its version is 0.
        let compare = if expected_mod_revision == 0 {
            Compare::version(key, CompareOp::Equal, 0)
        } else {
            Compare::mod_revision(key, CompareOp::Equal, expected_mod_revision)
        };
        let txn = Txn::new()
            .when([compare])
            .and_then([TxnOp::put(key, value, None)]);

        let resp = client.txn(txn).await?;
        debug!(
            "txn on {key} at revision {expected_mod_revision}: succeeded={}",
            resp.succeeded()
        );
        Ok(resp.succeeded())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let mut client = self.client.clone();
        let resp = client
            .get(prefix, Some(GetOptions::new().with_prefix()))
            .await?;
        Ok(resp
            .kvs()
            .iter()
            .map(|kv| {
                (
                    String::from_utf8_lossy(kv.key()).to_string(),
                    kv.value().to_vec(),
                )
            })
            .collect())
    }
}
