//! Esplora REST backend (Blockstream, mempool.space, self-hosted electrs).

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use bitcoin::{Address, OutPoint, Txid};
use reqwest::Client;
use serde::Deserialize;

use satchel_core::error::ProviderError;
use satchel_core::traits::ChainBackend;
use satchel_core::types::{AddressBalance, Utxo};

use crate::http::{build_client, read_json, read_text, transport_error};

#[derive(Deserialize)]
struct AddressInfo {
    chain_stats: ChainStats,
}

#[derive(Deserialize)]
struct ChainStats {
    funded_txo_sum: u64,
    spent_txo_sum: u64,
}

#[derive(Deserialize)]
struct EsploraUtxo {
    txid: String,
    vout: u32,
    value: u64,
    status: EsploraStatus,
}

#[derive(Deserialize)]
struct EsploraStatus {
    confirmed: bool,
}

/// Client for one Esplora-compatible API root.
#[derive(Debug, Clone)]
pub struct EsploraBackend {
    name: String,
    base_url: String,
    timeout: Duration,
    client: Result<Client, ProviderError>,
}

impl EsploraBackend {
    pub fn new(name: &str, base_url: &str, timeout: Duration) -> Self {
        Self {
            name: name.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
            client: build_client(timeout),
        }
    }

    fn client(&self) -> Result<&Client, ProviderError> {
        self.client.as_ref().map_err(Clone::clone)
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response, ProviderError> {
        self.client()?
            .get(format!("{}{path}", self.base_url))
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout))
    }
}

#[async_trait]
impl ChainBackend for EsploraBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn address_balance(&self, address: &Address) -> Result<AddressBalance, ProviderError> {
        let resp = self.get(&format!("/address/{address}")).await?;
        let info: AddressInfo = read_json(resp, self.timeout).await?;
        Ok(AddressBalance {
            confirmed_funded: info.chain_stats.funded_txo_sum,
            confirmed_spent: info.chain_stats.spent_txo_sum,
        })
    }

    async fn address_utxos(&self, address: &Address) -> Result<Vec<Utxo>, ProviderError> {
        let resp = self.get(&format!("/address/{address}/utxo")).await?;
        let raw: Vec<EsploraUtxo> = read_json(resp, self.timeout).await?;
        raw.into_iter()
            .map(|u| {
                let txid = Txid::from_str(&u.txid)
                    .map_err(|e| ProviderError::Decode(format!("txid {}: {e}", u.txid)))?;
                Ok(Utxo::new(
                    OutPoint { txid, vout: u.vout },
                    u.value,
                    u.status.confirmed,
                ))
            })
            .collect()
    }

    async fn raw_transaction(&self, txid: &Txid) -> Result<String, ProviderError> {
        let resp = self.get(&format!("/tx/{txid}/hex")).await?;
        Ok(read_text(resp, self.timeout).await?.trim().to_string())
    }

    async fn broadcast(&self, raw_tx_hex: &str) -> Result<String, ProviderError> {
        let resp = self
            .client()?
            .post(format!("{}/tx", self.base_url))
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(raw_tx_hex.to_string())
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;
        Ok(read_text(resp, self.timeout).await?.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::hashes::Hash;
    use bitcoin::{Network, PubkeyHash};
    use wiremock::matchers::{body_string, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TXID: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

    fn address() -> Address {
        Address::p2pkh(PubkeyHash::from_byte_array([7; 20]), Network::Bitcoin)
    }

    fn backend(server: &MockServer) -> EsploraBackend {
        EsploraBackend::new("esplora-test", &server.uri(), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn balance_reads_chain_stats() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/address/{}", address())))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "address": address().to_string(),
                "chain_stats": {
                    "funded_txo_count": 3, "funded_txo_sum": 12000,
                    "spent_txo_count": 1, "spent_txo_sum": 2000, "tx_count": 4
                },
                "mempool_stats": {
                    "funded_txo_count": 1, "funded_txo_sum": 999,
                    "spent_txo_count": 0, "spent_txo_sum": 0, "tx_count": 1
                }
            })))
            .mount(&server)
            .await;

        let bal = backend(&server).address_balance(&address()).await.unwrap();
        assert_eq!(bal.confirmed_funded, 12_000);
        assert_eq!(bal.confirmed_spent, 2_000);
    }

    #[tokio::test]
    async fn utxos_keep_provider_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/address/{}/utxo", address())))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {
                    "txid": TXID, "vout": 1, "value": 5000,
                    "status": {"confirmed": true, "block_height": 800000}
                },
                {"txid": TXID, "vout": 0, "value": 3000, "status": {"confirmed": false}}
            ])))
            .mount(&server)
            .await;

        let utxos = backend(&server).address_utxos(&address()).await.unwrap();
        assert_eq!(utxos.len(), 2);
        assert_eq!(utxos[0].outpoint.vout, 1);
        assert_eq!(utxos[0].value, 5_000);
        assert!(utxos[0].confirmed);
        assert!(!utxos[1].confirmed);
        assert!(utxos.iter().all(|u| !u.is_hydrated()));
    }

    #[tokio::test]
    async fn malformed_txid_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/address/{}/utxo", address())))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"txid": "zz", "vout": 0, "value": 1, "status": {"confirmed": true}}
            ])))
            .mount(&server)
            .await;

        let err = backend(&server).address_utxos(&address()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Decode(_)));
    }

    #[tokio::test]
    async fn raw_transaction_is_trimmed_hex() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/tx/{TXID}/hex")))
            .respond_with(ResponseTemplate::new(200).set_body_string("0100abcd\n"))
            .mount(&server)
            .await;

        let txid = Txid::from_str(TXID).unwrap();
        let hex = backend(&server).raw_transaction(&txid).await.unwrap();
        assert_eq!(hex, "0100abcd");
    }

    #[tokio::test]
    async fn broadcast_posts_hex_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tx"))
            .and(body_string("deadbeef"))
            .respond_with(ResponseTemplate::new(200).set_body_string(TXID))
            .mount(&server)
            .await;

        let txid = backend(&server).broadcast("deadbeef").await.unwrap();
        assert_eq!(txid, TXID);
    }

    #[tokio::test]
    async fn non_2xx_is_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tx"))
            .respond_with(
                ResponseTemplate::new(400).set_body_string("sendrawtransaction RPC error: dust"),
            )
            .mount(&server)
            .await;

        let err = backend(&server).broadcast("00").await.unwrap_err();
        match err {
            ProviderError::Status { status, body } => {
                assert_eq!(status, 400);
                assert!(body.contains("dust"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn slow_backend_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let backend = EsploraBackend::new("slow", &server.uri(), Duration::from_millis(100));
        let err = backend.address_balance(&address()).await.unwrap_err();
        assert_eq!(err, ProviderError::Timeout(Duration::from_millis(100)));
    }

    #[tokio::test]
    async fn unbuildable_client_fails_every_request() {
        let unavailable = ProviderError::Transport("client unavailable: no TLS backend".into());
        let backend = EsploraBackend {
            name: "broken".into(),
            base_url: "http://127.0.0.1:9".into(),
            timeout: Duration::from_secs(1),
            client: Err(unavailable.clone()),
        };
        assert_eq!(backend.address_balance(&address()).await.unwrap_err(), unavailable);
        assert_eq!(backend.broadcast("00").await.unwrap_err(), unavailable);
    }
}
