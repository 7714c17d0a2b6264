//! HTTP implementation of the backing-store collaborators.

use anyhow::{bail, Context};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use shared::{
    domain::{EntityKind, OrderId, RecordId},
    error::ApiError,
    protocol::{CreatedRecord, FieldMap, ListParams, OrderDetail, OrderRecord, Page},
};
use tracing::debug;
use url::Url;

use crate::{
    config::SyncSettings,
    error::{payload_message, EnrichmentError, MutationError, QueryError},
    EnrichmentService, MutationService, OrderQueryService,
};

#[derive(Clone)]
pub struct RestBackend {
    http: Client,
    base_url: Url,
}

impl RestBackend {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let base_url = Url::parse(base_url.trim())
            .with_context(|| format!("invalid backend url '{base_url}'"))?;
        if base_url.cannot_be_a_base() {
            bail!("backend url '{base_url}' cannot carry a path");
        }
        Ok(Self {
            http: Client::new(),
            base_url,
        })
    }

    pub fn from_settings(settings: &SyncSettings) -> anyhow::Result<Self> {
        Self::new(&settings.backend_url)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn query_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, QueryError> {
        let res = request.send().await.map_err(|err| QueryError::Transport {
            reason: err.to_string(),
        })?;
        let status = res.status();
        if !status.is_success() {
            let body = error_body(res).await;
            debug!(
                status = status.as_u16(),
                reason = ?body.as_ref().and_then(rejection_message),
                "order query rejected"
            );
            return Err(QueryError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        res.json::<T>().await.map_err(|err| QueryError::Decode {
            reason: err.to_string(),
        })
    }

    async fn mutate(&self, request: RequestBuilder) -> Result<Response, MutationError> {
        let res = request.send().await.map_err(|err| MutationError::Transport {
            reason: err.to_string(),
        })?;
        let status = res.status();
        if status.is_success() {
            return Ok(res);
        }

        let body = error_body(res).await;
        let message = body.as_ref().and_then(rejection_message);
        Err(MutationError::Rejected {
            status: status.as_u16(),
            message,
            body,
        })
    }
}

/// Keeps a JSON error body as-is; any other non-empty body becomes a string.
async fn error_body(res: Response) -> Option<Value> {
    let text = res.text().await.ok()?;
    if text.trim().is_empty() {
        return None;
    }
    Some(serde_json::from_str(&text).unwrap_or(Value::String(text)))
}

/// Reads an `ApiError` body first, then any loose `message` field.
fn rejection_message(body: &Value) -> Option<String> {
    match serde_json::from_value::<ApiError>(body.clone()) {
        Ok(api) => {
            debug!(code = ?api.code, "backing store returned a structured error");
            Some(api.message)
        }
        Err(_) => payload_message(body).map(str::to_string),
    }
}

#[async_trait]
impl OrderQueryService for RestBackend {
    async fn fetch_page(&self, params: &ListParams) -> Result<Page<OrderRecord>, QueryError> {
        let url = self.endpoint(&["orders"]);
        debug!(%url, ?params, "fetching order page");
        self.query_json(self.http.get(url).query(params)).await
    }

    async fn fetch_detail(&self, order_id: &OrderId) -> Result<OrderDetail, QueryError> {
        let url = self.endpoint(&["orders", order_id.as_str()]);
        debug!(%url, "fetching order detail");
        self.query_json(self.http.get(url)).await
    }
}

#[async_trait]
impl EnrichmentService for RestBackend {
    async fn request_update(&self, order_id: &OrderId) -> Result<(), EnrichmentError> {
        let url = self.endpoint(&["orders", order_id.as_str(), "weather"]);
        let res = self
            .http
            .post(url)
            .send()
            .await
            .map_err(|err| EnrichmentError::Transport {
                reason: err.to_string(),
            })?;
        let status = res.status();
        if !status.is_success() {
            return Err(EnrichmentError::Rejected {
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl MutationService for RestBackend {
    async fn create(&self, kind: EntityKind, fields: FieldMap) -> Result<RecordId, MutationError> {
        let url = self.endpoint(&["records", kind.as_str()]);
        let res = self.mutate(self.http.post(url).json(&fields)).await?;
        let status = res.status();
        let created = res
            .json::<CreatedRecord>()
            .await
            .map_err(|err| MutationError::Rejected {
                status: status.as_u16(),
                message: Some(format!("malformed create response: {err}")),
                body: None,
            })?;
        Ok(created.id)
    }

    async fn update(
        &self,
        kind: EntityKind,
        id: &RecordId,
        fields: FieldMap,
    ) -> Result<(), MutationError> {
        let url = self.endpoint(&["records", kind.as_str(), id.as_str()]);
        self.mutate(self.http.patch(url).json(&fields)).await?;
        Ok(())
    }

    async fn delete(&self, kind: EntityKind, id: &RecordId) -> Result<(), MutationError> {
        let url = self.endpoint(&["records", kind.as_str(), id.as_str()]);
        self.mutate(self.http.delete(url)).await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/rest_tests.rs"]
mod tests;
