use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::address::Address;
use crate::error::WalletError;
use crate::ledger::{ProtocolParams, SignedTransaction, TransactionDraft, TxId, UtxoEntry};
use crate::provider::{ChainProvider, ErrorBody, ProviderError};

pub const AUTH_HEADER: &str = "x-auth-token";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub tx_id: TxId,
}

/// Chain-data-provider reached over HTTP.
#[derive(Clone, Debug)]
pub struct HttpChainProvider {
    client: Client,
    base: Url,
    token: Option<String>,
}

impl HttpChainProvider {
    pub fn new(base: Url, token: Option<String>, timeout: Duration) -> Result<Self, WalletError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|err| WalletError::Http(err.to_string()))?;
        Ok(Self {
            client,
            base,
            token,
        })
    }

    fn url(&self, path: &str) -> Result<Url, ProviderError> {
        self.base
            .join(path)
            .map_err(|err| ProviderError::Rejected(format!("invalid request path {path}: {err}")))
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ProviderError> {
        let url = self.url(path)?;
        debug!(%url, "provider GET");
        let response = self
            .client
            .get(url)
            .headers(self.headers()?)
            .send()
            .map_err(transport_error)?;
        decode(response)
    }

    fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ProviderError> {
        let url = self.url(path)?;
        debug!(%url, "provider POST");
        let response = self
            .client
            .post(url)
            .headers(self.headers()?)
            .json(body)
            .send()
            .map_err(transport_error)?;
        decode(response)
    }

    fn headers(&self) -> Result<HeaderMap, ProviderError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &self.token {
            headers.insert(
                AUTH_HEADER,
                HeaderValue::from_str(token)
                    .map_err(|err| ProviderError::Rejected(format!("invalid auth token: {err}")))?,
            );
        }
        Ok(headers)
    }
}

impl ChainProvider for HttpChainProvider {
    fn find_utxos(&self, address: &Address) -> Result<Vec<UtxoEntry>, ProviderError> {
        let encoded = address
            .encode()
            .map_err(|err| ProviderError::Rejected(err.to_string()))?;
        self.get_json(&format!("/utxos/{encoded}"))
    }

    fn fetch_protocol_params(&self) -> Result<ProtocolParams, ProviderError> {
        self.get_json("/protocol-params")
    }

    fn complete_and_balance(
        &self,
        draft: TransactionDraft,
    ) -> Result<TransactionDraft, ProviderError> {
        self.post_json("/tx/complete", &draft)
    }

    fn submit(&self, tx: &SignedTransaction) -> Result<TxId, ProviderError> {
        let response: SubmitResponse = self.post_json("/tx/submit", tx)?;
        Ok(response.tx_id)
    }
}

fn transport_error(err: reqwest::Error) -> ProviderError {
    if err.is_decode() {
        ProviderError::Decode(err.to_string())
    } else {
        ProviderError::Unreachable(err.to_string())
    }
}

fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return response
            .json()
            .map_err(|err| ProviderError::Decode(err.to_string()));
    }
    let text = response.text().map_err(transport_error)?;
    let body: Option<ErrorBody> = serde_json::from_str(&text).ok();
    match (status, body) {
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            Some(ErrorBody {
                script: Some(reason),
                ..
            }),
        ) => Err(ProviderError::Script { reason }),
        (StatusCode::UNPROCESSABLE_ENTITY, Some(body)) => Err(ProviderError::Balancing(body.error)),
        (_, Some(body)) => Err(ProviderError::Rejected(body.error)),
        (_, None) if text.is_empty() => Err(ProviderError::Rejected(format!("request failed: {status}"))),
        (_, None) => Err(ProviderError::Rejected(format!("request failed: {status}: {text}"))),
    }
}
