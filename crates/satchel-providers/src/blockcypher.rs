//! BlockCypher REST backend.
//!
//! The base URL includes the coin and chain segment, e.g.
//! `https://api.blockcypher.com/v1/btc/main`.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use bitcoin::{Address, OutPoint, Txid};
use reqwest::Client;
use serde::Deserialize;

use satchel_core::error::ProviderError;
use satchel_core::traits::ChainBackend;
use satchel_core::types::{AddressBalance, Utxo};

use crate::http::{build_client, read_json, transport_error};

#[derive(Deserialize)]
struct BalanceResponse {
    total_received: u64,
    total_sent: u64,
}

#[derive(Deserialize)]
struct AddressResponse {
    #[serde(default)]
    txrefs: Vec<TxRef>,
    #[serde(default)]
    unconfirmed_txrefs: Vec<TxRef>,
}

#[derive(Deserialize)]
struct TxRef {
    tx_hash: String,
    tx_output_n: i64,
    value: u64,
}

#[derive(Deserialize)]
struct TxResponse {
    hex: Option<String>,
}

#[derive(Deserialize)]
struct PushResponse {
    tx: PushedTx,
}

#[derive(Deserialize)]
struct PushedTx {
    hash: String,
}

/// Client for one BlockCypher chain endpoint.
#[derive(Debug, Clone)]
pub struct BlockCypherBackend {
    name: String,
    base_url: String,
    timeout: Duration,
    client: Result<Client, ProviderError>,
}

impl BlockCypherBackend {
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

fn txref_to_utxo(r: TxRef, confirmed: bool) -> Result<Utxo, ProviderError> {
    let txid = Txid::from_str(&r.tx_hash)
        .map_err(|e| ProviderError::Decode(format!("txid {}: {e}", r.tx_hash)))?;
    let vout = u32::try_from(r.tx_output_n)
        .map_err(|_| ProviderError::Decode(format!("output index {}", r.tx_output_n)))?;
    Ok(Utxo::new(OutPoint { txid, vout }, r.value, confirmed))
}

#[async_trait]
impl ChainBackend for BlockCypherBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn address_balance(&self, address: &Address) -> Result<AddressBalance, ProviderError> {
        let resp = self.get(&format!("/addrs/{address}/balance")).await?;
        let bal: BalanceResponse = read_json(resp, self.timeout).await?;
        Ok(AddressBalance {
            confirmed_funded: bal.total_received,
            confirmed_spent: bal.total_sent,
        })
    }

    async fn address_utxos(&self, address: &Address) -> Result<Vec<Utxo>, ProviderError> {
        let resp = self
            .get(&format!("/addrs/{address}?unspentOnly=true&includeScript=false&limit=2000"))
            .await?;
        let body: AddressResponse = read_json(resp, self.timeout).await?;

        let mut utxos = Vec::with_capacity(body.txrefs.len() + body.unconfirmed_txrefs.len());
        for r in body.txrefs {
            utxos.push(txref_to_utxo(r, true)?);
        }
        for r in body.unconfirmed_txrefs {
            utxos.push(txref_to_utxo(r, false)?);
        }
        Ok(utxos)
    }

    async fn raw_transaction(&self, txid: &Txid) -> Result<String, ProviderError> {
        let resp = self.get(&format!("/txs/{txid}?includeHex=true")).await?;
        let tx: TxResponse = read_json(resp, self.timeout).await?;
        tx.hex
            .ok_or_else(|| ProviderError::Decode("response has no hex field".into()))
    }

    async fn broadcast(&self, raw_tx_hex: &str) -> Result<String, ProviderError> {
        let resp = self
            .client()?
            .post(format!("{}/txs/push", self.base_url))
            .json(&serde_json::json!({ "tx": raw_tx_hex }))
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;
        let pushed: PushResponse = read_json(resp, self.timeout).await?;
        Ok(pushed.tx.hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::hashes::Hash;
    use bitcoin::{Network, PubkeyHash};
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TXID: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

    fn address() -> Address {
        Address::p2pkh(PubkeyHash::from_byte_array([9; 20]), Network::Bitcoin)
    }

    fn backend(server: &MockServer) -> BlockCypherBackend {
        BlockCypherBackend::new("blockcypher-test", &server.uri(), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn balance_uses_confirmed_totals() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/addrs/{}/balance", address())))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "address": address().to_string(),
                "total_received": 50000,
                "total_sent": 20000,
                "balance": 30000,
                "unconfirmed_balance": -1000,
                "final_balance": 29000
            })))
            .mount(&server)
            .await;

        let bal = backend(&server).address_balance(&address()).await.unwrap();
        assert_eq!(bal.spendable(), Some(30_000));
    }

    #[tokio::test]
    async fn utxos_confirmed_then_unconfirmed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/addrs/{}", address())))
            .and(query_param("unspentOnly", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "txrefs": [
                    {"tx_hash": TXID, "tx_output_n": 2, "value": 7000, "confirmations": 10},
                    {"tx_hash": TXID, "tx_output_n": 0, "value": 1000, "confirmations": 3}
                ],
                "unconfirmed_txrefs": [
                    {"tx_hash": TXID, "tx_output_n": 1, "value": 400, "confirmations": 0}
                ]
            })))
            .mount(&server)
            .await;

        let utxos = backend(&server).address_utxos(&address()).await.unwrap();
        let values: Vec<u64> = utxos.iter().map(|u| u.value).collect();
        assert_eq!(values, vec![7_000, 1_000, 400]);
        assert!(utxos[0].confirmed && utxos[1].confirmed);
        assert!(!utxos[2].confirmed);
    }

    #[tokio::test]
    async fn utxos_absent_fields_mean_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/addrs/{}", address())))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "address": address().to_string(),
                "n_tx": 0
            })))
            .mount(&server)
            .await;

        let utxos = backend(&server).address_utxos(&address()).await.unwrap();
        assert!(utxos.is_empty());
    }

    #[tokio::test]
    async fn negative_output_index_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/addrs/{}", address())))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "txrefs": [{"tx_hash": TXID, "tx_output_n": -1, "value": 7000}]
            })))
            .mount(&server)
            .await;

        let err = backend(&server).address_utxos(&address()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Decode(_)));
    }

    #[tokio::test]
    async fn raw_transaction_requires_hex() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/txs/{TXID}")))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"hash": TXID})),
            )
            .mount(&server)
            .await;

        let txid = Txid::from_str(TXID).unwrap();
        let err = backend(&server).raw_transaction(&txid).await.unwrap_err();
        assert!(matches!(err, ProviderError::Decode(_)));
    }

    #[tokio::test]
    async fn broadcast_pushes_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/txs/push"))
            .and(body_json(serde_json::json!({"tx": "cafe"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "tx": {"hash": TXID, "fees": 400}
            })))
            .mount(&server)
            .await;

        let txid = backend(&server).broadcast("cafe").await.unwrap();
        assert_eq!(txid, TXID);
    }

    #[tokio::test]
    async fn service_unavailable_is_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = backend(&server).address_balance(&address()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Status { status: 503, .. }));
    }

    #[tokio::test]
    async fn unbuildable_client_fails_every_request() {
        let unavailable = ProviderError::Transport("client unavailable: no TLS backend".into());
        let backend = BlockCypherBackend {
            name: "broken".into(),
            base_url: "http://127.0.0.1:9".into(),
            timeout: Duration::from_secs(1),
            client: Err(unavailable.clone()),
        };
        let txid = Txid::from_str(TXID).unwrap();
        assert_eq!(backend.raw_transaction(&txid).await.unwrap_err(), unavailable);
        assert_eq!(backend.broadcast("00").await.unwrap_err(), unavailable);
    }
}
