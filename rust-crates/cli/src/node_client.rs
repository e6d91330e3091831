use cipher_loot::{
    Address,
    CiphertextHandle,
    auth::{
        self,
        Authorization,
    },
    coprocessor::DecryptRequest,
    draw::{
        EncryptedHistory,
        EncryptedResult,
        LatestEncryptedResult,
    },
    events::EventRecord,
    probability::ProbabilityConfig,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use ed25519_dalek::SigningKey;
use reqwest::{
    Response,
    StatusCode,
};
use serde::{
    Deserialize,
    Serialize,
    de::DeserializeOwned,
};
use std::collections::BTreeMap;
use url::Url;

pub const DEFAULT_NODE_URL: &str = "http://127.0.0.1:8080";

#[derive(Clone)]
pub struct NodeClient {
    base_url: String,
    http: reqwest::Client,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StatsData {
    pub total_draws: u64,
    pub protocol_id: u64,
    pub contract: Address,
    pub block_height: u64,
}

#[derive(Serialize)]
struct DrawRequestDto {
    player: Address,
    authorization: Authorization,
}

#[derive(Deserialize)]
struct DrawCountDto {
    count: u64,
}

#[derive(Serialize)]
struct DecryptRequestDto {
    user: Address,
    handles: Vec<CiphertextHandle>,
    authorization: Authorization,
}

#[derive(Deserialize)]
struct DecryptResponseDto {
    values: BTreeMap<CiphertextHandle, u64>,
}

#[derive(Deserialize)]
struct ErrorDto {
    error: String,
    message: String,
}

impl NodeClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into();
        Url::parse(&base_url)
            .wrap_err_with(|| format!("invalid node url {base_url}"))?;
        let base_url = base_url.trim_end_matches('/').to_string();
        let http = reqwest::Client::builder()
            .build()
            .wrap_err("failed to build HTTP client for node")?;
        Ok(Self { base_url, http })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Draw as the account owning `key`, signing over its next draw id.
    pub async fn draw(&self, key: &SigningKey) -> Result<EventRecord> {
        let player = auth::address_of(&key.verifying_key());
        let contract = self.stats().await?.contract;
        let draw_id = self.draw_count(&player).await? + 1;
        let digest = auth::draw_digest(&contract, &player, draw_id);
        let url = format!("{}/draw", self.base_url);
        let res = self
            .http
            .post(url)
            .json(&DrawRequestDto {
                player,
                authorization: Authorization::sign(key, &digest),
            })
            .send()
            .await
            .wrap_err("node request failed")?;
        Self::parse(res, "submitting draw").await
    }

    /// `None` when the player has no draw with that id.
    pub async fn encrypted_result(
        &self,
        player: &Address,
        draw_id: u64,
    ) -> Result<Option<EncryptedResult>> {
        let url = format!("{}/players/{}/draws/{}", self.base_url, player, draw_id);
        let res = self.get(url).await?;
        if res.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Self::parse(res, "fetching encrypted result").await.map(Some)
    }

    pub async fn latest(&self, player: &Address) -> Result<LatestEncryptedResult> {
        let url = format!("{}/players/{}/latest", self.base_url, player);
        let res = self.get(url).await?;
        Self::parse(res, "fetching latest result").await
    }

    pub async fn history(
        &self,
        player: &Address,
        offset: u64,
        limit: u64,
    ) -> Result<EncryptedHistory> {
        let url = format!("{}/players/{}/history", self.base_url, player);
        let res = self
            .http
            .get(url)
            .query(&[("offset", offset), ("limit", limit)])
            .send()
            .await
            .wrap_err("node request failed")?;
        Self::parse(res, "fetching history").await
    }

    pub async fn draw_count(&self, player: &Address) -> Result<u64> {
        let url = format!("{}/players/{}/count", self.base_url, player);
        let res = self.get(url).await?;
        let dto: DrawCountDto = Self::parse(res, "fetching draw count").await?;
        Ok(dto.count)
    }

    pub async fn stats(&self) -> Result<StatsData> {
        let url = format!("{}/stats", self.base_url);
        let res = self.get(url).await?;
        Self::parse(res, "fetching stats").await
    }

    pub async fn probability_config(&self) -> Result<ProbabilityConfig> {
        let url = format!("{}/config/probability", self.base_url);
        let res = self.get(url).await?;
        Self::parse(res, "fetching probability config").await
    }

    pub async fn events(&self, from_block: u64) -> Result<Vec<EventRecord>> {
        let url = format!("{}/events", self.base_url);
        let res = self
            .http
            .get(url)
            .query(&[("from_block", from_block)])
            .send()
            .await
            .wrap_err("node request failed")?;
        Self::parse(res, "fetching events").await
    }

    pub async fn decrypt(
        &self,
        key: &SigningKey,
        handles: &[CiphertextHandle],
    ) -> Result<BTreeMap<CiphertextHandle, u64>> {
        let contract = self.stats().await?.contract;
        let request = DecryptRequest::signed(key, contract, handles.to_vec());
        let url = format!("{}/decrypt", self.base_url);
        let res = self
            .http
            .post(url)
            .json(&DecryptRequestDto {
                user: request.user,
                handles: request.handles,
                authorization: request.authorization,
            })
            .send()
            .await
            .wrap_err("node request failed")?;
        let dto: DecryptResponseDto = Self::parse(res, "decrypting handles").await?;
        Ok(dto.values)
    }

    async fn get(&self, url: String) -> Result<Response> {
        self.http
            .get(url)
            .send()
            .await
            .wrap_err("node request failed")
    }

    async fn parse<T: DeserializeOwned>(res: Response, action: &str) -> Result<T> {
        let status = res.status();
        let bytes = res
            .bytes()
            .await
            .wrap_err("failed to read node response body")?;
        if !status.is_success() {
            return Err(match serde_json::from_slice::<ErrorDto>(&bytes) {
                Ok(dto) => eyre!(
                    "node responded with {status} when {action}: {} ({})",
                    dto.message,
                    dto.error
                ),
                Err(_) => {
                    let body = String::from_utf8_lossy(&bytes);
                    eyre!("node responded with {status} when {action}: {body}")
                }
            });
        }
        serde_json::from_slice(&bytes)
            .wrap_err_with(|| format!("invalid node payload when {action}"))
    }
}
