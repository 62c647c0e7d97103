use super::{SearchHit, SearchIndex};
use crate::error::StoreError;
use async_trait::async_trait;
use elasticsearch::http::transport::{SingleNodeConnectionPool, TransportBuilder};
use elasticsearch::indices::{IndicesCreateParts, IndicesExistsParts};
use elasticsearch::params::Refresh;
use elasticsearch::{Elasticsearch, IndexParts, SearchParts};
use senser_core::query::SearchDescriptor;
use senser_core::SearchDocument;
use serde_json::{json, Value};
use tracing::{debug, info};

const BACKEND: &str = "elasticsearch";

pub struct ElasticSearchIndex {
    client: Elasticsearch,
    index: String,
}

impl ElasticSearchIndex {
    pub async fn connect(url: &str, index: &str) -> Result<Self, StoreError> {
        let url: elasticsearch::http::Url = url
            .parse()
            .map_err(|e| StoreError::backend(BACKEND, format!("Invalid URL: {}", e)))?;
        let transport = TransportBuilder::new(SingleNodeConnectionPool::new(url))
            .build()
            .map_err(|e| StoreError::backend(BACKEND, e))?;

        let store = ElasticSearchIndex {
            client: Elasticsearch::new(transport),
            index: index.to_owned(),
        };
        store.ensure_index().await?;
        Ok(store)
    }

    /// name and type are matched verbatim, description is analyzed
    async fn ensure_index(&self) -> Result<(), StoreError> {
        let exists = self
            .client
            .indices()
            .exists(IndicesExistsParts::Index(&[&self.index]))
            .send()
            .await
            .map_err(|e| StoreError::backend(BACKEND, e))?;
        if exists.status_code().is_success() {
            return Ok(());
        }

        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(&self.index))
            .body(json!({
                "mappings": {
                    "properties": {
                        "name": {"type": "keyword"},
                        "type": {"type": "keyword"},
                        "description": {"type": "text"}
                    }
                }
            }))
            .send()
            .await
            .map_err(|e| StoreError::backend(BACKEND, e))?;

        let status = response.status_code();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            // created concurrently by another gateway
            if body.contains("resource_already_exists_exception") {
                return Ok(());
            }
            return Err(StoreError::backend(
                BACKEND,
                format!("Failed to create index {} ({}): {}", self.index, status, body),
            ));
        }
        info!(index = self.index.as_str(), "Created search index");
        Ok(())
    }
}

#[async_trait]
impl SearchIndex for ElasticSearchIndex {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    async fn index(&self, document: &SearchDocument) -> Result<(), StoreError> {
        let body = serde_json::to_value(document).map_err(|source| StoreError::Payload {
            backend: BACKEND,
            source,
        })?;
        let response = self
            .client
            .index(IndexParts::Index(&self.index))
            .body(body)
            .refresh(Refresh::WaitFor)
            .send()
            .await
            .map_err(|e| StoreError::backend(BACKEND, e))?;

        let status = response.status_code();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::backend(
                BACKEND,
                format!("Failed to index document ({}): {}", status, body),
            ));
        }
        Ok(())
    }

    async fn search(
        &self,
        query: &SearchDescriptor,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<SearchHit>, StoreError> {
        let body = query.to_query_body(offset, limit);
        debug!("Search {}", body);
        let response = self
            .client
            .search(SearchParts::Index(&[&self.index]))
            .body(body)
            .send()
            .await
            .map_err(|e| StoreError::backend(BACKEND, e))?;

        if !response.status_code().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::backend(BACKEND, body));
        }
        let body: Value = response
            .json()
            .await
            .map_err(|e| StoreError::backend(BACKEND, e))?;

        let hits = body["hits"]["hits"].as_array().cloned().unwrap_or_default();
        hits.into_iter()
            .map(|hit| {
                let score = hit["_score"].as_f64().unwrap_or_default();
                let document = serde_json::from_value(hit["_source"].clone())
                    .map_err(|source| StoreError::Payload {
                        backend: BACKEND,
                        source,
                    })?;
                Ok(SearchHit { score, document })
            })
            .collect()
    }
}
