//! Google Docs operations.

use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};

use super::GoogleClient;
use crate::error::Result;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedDocument {
    document_id: String,
}

impl GoogleClient {
    /// Create an empty document and return its id.
    pub async fn create_document(&self, title: &str) -> Result<String> {
        let url = self.docs_url(&["v1", "documents"])?;
        let body = json!({ "title": title });
        let created: CreatedDocument =
            serde_json::from_value(self.request_json(Method::POST, url, Some(&body)).await?)?;
        tracing::debug!(document_id = %created.document_id, "Created document");
        Ok(created.document_id)
    }

    /// Append `text` at the end of the document body.
    ///
    /// Returns the raw `batchUpdate` response.
    pub async fn append_text(&self, document_id: &str, text: &str) -> Result<Value> {
        let url = self.docs_url(&["v1", "documents", &format!("{document_id}:batchUpdate")])?;
        let body = json!({
            "requests": [
                {
                    "insertText": {
                        "endOfSegmentLocation": {},
                        "text": text,
                    }
                }
            ]
        });
        self.request_json(Method::POST, url, Some(&body)).await
    }
}
