//! Prize-pool ledger client.
//!
//! The ledger is an external service holding the three prize slots.
//! A deposit is a read-modify-write: fetch the current pool, add the
//! amount to one slot, post the full pool back. Slot values travel as
//! two-decimal strings.

use std::collections::BTreeMap;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

const POOL_PATH: &str = "/prizepool";

/// Prize slot name → amount, e.g. `{"first": "12.50"}`.
pub type PrizePool = BTreeMap<String, String>;

#[derive(Debug, Deserialize)]
struct PoolRecord {
    #[serde(default)]
    prize: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct PoolUpdate<'a> {
    data: &'a PrizePool,
}

/// Ledger HTTP client.
#[derive(Debug, Clone)]
pub struct LedgerClient {
    http: reqwest::Client,
    pool_url: Url,
    auth: SecretString,
}

impl LedgerClient {
    pub fn new(base_url: &Url, auth: SecretString, transport: &TransportConfig) -> Result<Self, Error> {
        Self::from_reqwest(base_url, auth, transport.build_client()?)
    }

    pub fn from_reqwest(base_url: &Url, auth: SecretString, http: reqwest::Client) -> Result<Self, Error> {
        Ok(Self {
            http,
            pool_url: base_url.join(POOL_PATH)?,
            auth,
        })
    }

    /// Fetch the current pool.
    pub async fn pool(&self) -> Result<PrizePool, Error> {
        let body = self
            .http
            .get(self.pool_url.clone())
            .header("Authorization", self.auth.expose_secret())
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let records: Vec<PoolRecord> =
            serde_json::from_str(&body).map_err(|e| Error::Deserialization {
                message: e.to_string(),
                body: body.clone(),
            })?;
        let record = records.into_iter().next().ok_or_else(|| Error::Ledger {
            message: "ledger returned no prize pool".into(),
        })?;

        record
            .prize
            .into_iter()
            .map(|(slot, value)| Ok((slot, format_amount(parse_amount(&value)?))))
            .collect()
    }

    /// Add `amount` to `slot` and write the pool back. Returns the new pool.
    pub async fn deposit(&self, slot: &str, amount: f64) -> Result<PrizePool, Error> {
        let mut pool = self.pool().await?;

        let current = pool
            .get(slot)
            .map(|v| parse_amount(&serde_json::Value::String(v.clone())))
            .transpose()?
            .unwrap_or(0.0);
        pool.insert(slot.to_owned(), format_amount(current + amount));

        self.http
            .post(self.pool_url.clone())
            .header("Authorization", self.auth.expose_secret())
            .json(&PoolUpdate { data: &pool })
            .send()
            .await?
            .error_for_status()?;

        tracing::info!(slot, amount, total = %pool[slot], "Prize pool updated");
        Ok(pool)
    }
}

fn parse_amount(value: &serde_json::Value) -> Result<f64, Error> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        serde_json::Value::Null => Some(0.0),
        _ => None,
    }
    .ok_or_else(|| Error::Ledger {
        message: format!("unparseable prize amount: {value}"),
    })
}

fn format_amount(amount: f64) -> String {
    format!("{amount:.2}")
}
