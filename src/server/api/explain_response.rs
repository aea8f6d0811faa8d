use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplainResponse {
    /// The statement returning the requested documents
    pub query: String,
    /// The statement counting the documents matching `$filter`
    pub count_query: String,
}
