use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

#[skip_serializing_none]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EntitySetResponse {
    /// The documents, shaped by `$select` and `$expand`
    pub value: Vec<serde_json::Value>,
    /// Number of documents matching `$filter`, when `$count=true`
    pub count: Option<i64>,
}
