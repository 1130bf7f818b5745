//! Standard response envelope.

use serde::Serialize;

#[derive(Serialize)]
pub struct SuccessOne<T> {
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

#[derive(Serialize)]
pub struct SuccessPage<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}

#[derive(Serialize, Debug, PartialEq)]
pub struct PageMeta {
    /// Rows in this page.
    pub count: u64,
    /// Rows across all pages.
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}
