use anyhow::{Result, anyhow};
use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue, CONTENT_TYPE},
};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tracing::{debug, error};

use shared_config::AppConfig;

/// JSON client for the document store's HTTP data API.
///
/// Every call is a single-document (or single-collection) atomic action;
/// there are no multi-document transactions.
pub struct StoreClient {
    client: Client,
    base_url: String,
    api_key: String,
    data_source: String,
    database: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateOutcome {
    #[serde(rename = "matchedCount")]
    pub matched_count: u64,
    #[serde(rename = "modifiedCount")]
    pub modified_count: u64,
}

#[derive(Deserialize)]
struct FindOneOutcome {
    document: Option<Value>,
}

#[derive(Deserialize)]
struct FindOutcome {
    documents: Vec<Value>,
}

#[derive(Deserialize)]
struct InsertOutcome {
    #[serde(rename = "insertedId")]
    inserted_id: Value,
}

#[derive(Deserialize)]
struct DeleteOutcome {
    #[serde(rename = "deletedCount")]
    deleted_count: u64,
}

impl StoreClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.store_api_url.clone(),
            api_key: config.store_api_key.clone(),
            data_source: config.store_data_source.clone(),
            database: config.database_name.clone(),
        }
    }

    fn get_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();

        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Ok(value) = HeaderValue::from_str(&self.api_key) {
            headers.insert("api-key", value);
        }

        headers
    }

    fn scoped_body(&self, collection: &str, extra: Value) -> Value {
        let mut body = Map::new();
        body.insert("dataSource".to_string(), json!(self.data_source));
        body.insert("database".to_string(), json!(self.database));
        body.insert("collection".to_string(), json!(collection));

        if let Value::Object(extra) = extra {
            for (key, value) in extra {
                body.insert(key, value);
            }
        }

        Value::Object(body)
    }

    async fn action<T>(&self, action: &str, body: Value) -> Result<T>
    where T: DeserializeOwned {
        let url = format!("{}/action/{}", self.base_url, action);
        debug!("Store request: {}", url);

        let response = self.client.post(&url)
            .headers(self.get_headers())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            error!("Store error ({}): {}", status, error_text);
            return Err(anyhow!("store error ({}): {}", status, error_text));
        }

        let data = response.json::<T>().await?;
        Ok(data)
    }

    pub async fn find_one(&self, collection: &str, filter: Value) -> Result<Option<Value>> {
        let body = self.scoped_body(collection, json!({ "filter": filter }));
        let outcome: FindOneOutcome = self.action("findOne", body).await?;
        Ok(outcome.document)
    }

    pub async fn find(
        &self,
        collection: &str,
        filter: Value,
        sort: Option<Value>,
        skip: u64,
        limit: u64,
    ) -> Result<Vec<Value>> {
        let mut extra = json!({
            "filter": filter,
            "skip": skip,
            "limit": limit,
        });
        if let Some(sort) = sort {
            extra["sort"] = sort;
        }

        let body = self.scoped_body(collection, extra);
        let outcome: FindOutcome = self.action("find", body).await?;
        Ok(outcome.documents)
    }

    pub async fn insert_one(&self, collection: &str, document: Value) -> Result<String> {
        let body = self.scoped_body(collection, json!({ "document": document }));
        let outcome: InsertOutcome = self.action("insertOne", body).await?;

        match outcome.inserted_id {
            Value::String(id) => Ok(id),
            other => Ok(other.to_string()),
        }
    }

    pub async fn update_one(
        &self,
        collection: &str,
        filter: Value,
        update: Value,
    ) -> Result<UpdateOutcome> {
        let body = self.scoped_body(collection, json!({
            "filter": filter,
            "update": update,
        }));
        self.action("updateOne", body).await
    }

    pub async fn delete_one(&self, collection: &str, filter: Value) -> Result<u64> {
        let body = self.scoped_body(collection, json!({ "filter": filter }));
        let outcome: DeleteOutcome = self.action("deleteOne", body).await?;
        Ok(outcome.deleted_count)
    }

    pub async fn aggregate(&self, collection: &str, pipeline: Value) -> Result<Vec<Value>> {
        let body = self.scoped_body(collection, json!({ "pipeline": pipeline }));
        let outcome: FindOutcome = self.action("aggregate", body).await?;
        Ok(outcome.documents)
    }

    /// Count documents matching a filter via a $match/$count pipeline.
    pub async fn count(&self, collection: &str, filter: Value) -> Result<u64> {
        let pipeline = json!([
            { "$match": filter },
            { "$count": "total" },
        ]);

        let results = self.aggregate(collection, pipeline).await?;
        let total = results.first()
            .and_then(|doc| doc.get("total"))
            .and_then(Value::as_u64)
            .unwrap_or(0);

        Ok(total)
    }
}
