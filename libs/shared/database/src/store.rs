use anyhow::{anyhow, Result};
use reqwest::{
    header::{HeaderMap, HeaderValue, CONTENT_TYPE},
    Client,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, error};

use shared_config::AppConfig;

/// HTTP client for the document database's data API. Every call is a POST to
/// `{base}/action/{action}` carrying the data source, database and collection
/// in the body.
pub struct DocumentStore {
    client: Client,
    base_url: String,
    api_key: String,
    data_source: String,
    database: String,
}

impl DocumentStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.data_api_url.clone(),
            api_key: config.data_api_key.clone(),
            data_source: config.data_source.clone(),
            database: config.database_name.clone(),
        }
    }

    fn get_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "api-key",
            HeaderValue::from_str(&self.api_key)
                .map_err(|_| anyhow!("Invalid API key value"))?,
        );
        Ok(headers)
    }

    async fn action<T>(&self, action: &str, collection: &str, mut body: Value) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}/action/{}", self.base_url, action);
        debug!("Document API {} on {}", action, collection);

        if let Some(obj) = body.as_object_mut() {
            obj.insert("dataSource".to_string(), json!(self.data_source));
            obj.insert("database".to_string(), json!(self.database));
            obj.insert("collection".to_string(), json!(collection));
        }

        let response = self
            .client
            .post(&url)
            .headers(self.get_headers()?)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            error!("Document API error ({}): {}", status, error_text);
            return Err(anyhow!("Document API error ({}): {}", status, error_text));
        }

        let data = response.json::<T>().await?;
        Ok(data)
    }

    pub async fn find_one(&self, collection: &str, filter: Value) -> Result<Option<Value>> {
        let resp: Value = self
            .action("findOne", collection, json!({ "filter": filter }))
            .await?;
        match resp.get("document") {
            Some(Value::Null) | None => Ok(None),
            Some(doc) => Ok(Some(doc.clone())),
        }
    }

    pub async fn find(
        &self,
        collection: &str,
        filter: Value,
        sort: Option<Value>,
        skip: Option<i64>,
        limit: Option<i64>,
    ) -> Result<Vec<Value>> {
        let mut body = json!({ "filter": filter });
        if let Some(sort) = sort {
            body["sort"] = sort;
        }
        if let Some(skip) = skip {
            body["skip"] = json!(skip);
        }
        if let Some(limit) = limit {
            body["limit"] = json!(limit);
        }

        let resp: Value = self.action("find", collection, body).await?;
        let documents = resp
            .get("documents")
            .and_then(|d| d.as_array())
            .cloned()
            .unwrap_or_default();
        Ok(documents)
    }

    pub async fn insert_one(&self, collection: &str, document: Value) -> Result<String> {
        let resp: Value = self
            .action("insertOne", collection, json!({ "document": document }))
            .await?;
        resp.get("insertedId")
            .and_then(|id| id.as_str())
            .map(|id| id.to_string())
            .ok_or_else(|| anyhow!("Insert response missing insertedId"))
    }

    pub async fn update_one(&self, collection: &str, filter: Value, update: Value) -> Result<u64> {
        let resp: Value = self
            .action(
                "updateOne",
                collection,
                json!({ "filter": filter, "update": update }),
            )
            .await?;
        Ok(resp.get("matchedCount").and_then(|c| c.as_u64()).unwrap_or(0))
    }

    pub async fn upsert_one(&self, collection: &str, filter: Value, update: Value) -> Result<u64> {
        let resp: Value = self
            .action(
                "updateOne",
                collection,
                json!({ "filter": filter, "update": update, "upsert": true }),
            )
            .await?;
        Ok(resp.get("matchedCount").and_then(|c| c.as_u64()).unwrap_or(0))
    }

    pub async fn delete_one(&self, collection: &str, filter: Value) -> Result<u64> {
        let resp: Value = self
            .action("deleteOne", collection, json!({ "filter": filter }))
            .await?;
        Ok(resp.get("deletedCount").and_then(|c| c.as_u64()).unwrap_or(0))
    }

    pub async fn aggregate(&self, collection: &str, pipeline: Value) -> Result<Vec<Value>> {
        let resp: Value = self
            .action("aggregate", collection, json!({ "pipeline": pipeline }))
            .await?;
        let documents = resp
            .get("documents")
            .and_then(|d| d.as_array())
            .cloned()
            .unwrap_or_default();
        Ok(documents)
    }

    /// Counts documents matching the filter with a `$match`/`$count` pipeline.
    pub async fn count(&self, collection: &str, filter: Value) -> Result<i64> {
        let results = self
            .aggregate(
                collection,
                json!([
                    { "$match": filter },
                    { "$count": "total" }
                ]),
            )
            .await?;
        Ok(results
            .first()
            .and_then(|doc| doc.get("total"))
            .and_then(|t| t.as_i64())
            .unwrap_or(0))
    }
}
