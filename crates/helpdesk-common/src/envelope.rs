use serde::{Deserialize, Serialize};

use crate::pagination::{Page, Pagination};

/// The `{ data, message, meta? }` shape shared by every response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub data: T,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meta {
    pub pagination: Pagination,
}

impl<T> ApiResponse<T> {
    pub fn new(data: T, message: impl Into<String>) -> Self {
        Self {
            data,
            message: message.into(),
            meta: None,
        }
    }
}

impl<T> ApiResponse<Vec<T>> {
    pub fn paginated(page: Page<T>, message: impl Into<String>) -> Self {
        Self {
            data: page.items,
            message: message.into(),
            meta: Some(Meta {
                pagination: page.pagination,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pagination::PageRequest;

    #[test]
    fn test_plain_response_omits_meta() {
        let resp = ApiResponse::new(serde_json::json!({"id": 1}), "Channel retrieved successfully");
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value["data"]["id"], 1);
        assert_eq!(value["message"], "Channel retrieved successfully");
        assert!(value.get("meta").is_none());
    }

    #[test]
    fn test_paginated_response_carries_meta() {
        let page = Page::new(vec!["a", "b"], PageRequest::new(1, 2), 5);
        let resp = ApiResponse::paginated(page, "Channels retrieved successfully");
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value["data"].as_array().unwrap().len(), 2);
        let pagination = &value["meta"]["pagination"];
        assert_eq!(pagination["current_page"], 1);
        assert_eq!(pagination["per_page"], 2);
        assert_eq!(pagination["from"], 1);
        assert_eq!(pagination["to"], 2);
        assert_eq!(pagination["total"], 5);
        assert_eq!(pagination["last_page"], 3);
    }
}
