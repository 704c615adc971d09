use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct ExtractRequest {
    pub url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ExtractResponse {
    pub title: String,
    pub content: String,
    pub text: String,
}
