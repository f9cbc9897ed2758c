use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq, Eq)]
pub struct Meta {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub total: Option<i64>,
}

impl Meta {
    pub fn new(page: i64, per_page: i64, total: i64) -> Self {
        Self {
            page: Some(page),
            per_page: Some(per_page),
            total: Some(total),
        }
    }

    pub fn empty() -> Self {
        Self {
            page: None,
            per_page: None,
            total: None,
        }
    }

    pub fn has_previous(&self) -> bool {
        self.page.is_some_and(|page| page > 1)
    }

    pub fn has_next(&self) -> bool {
        match (self.page, self.per_page, self.total) {
            (Some(page), Some(per_page), Some(total)) => page * per_page < total,
            _ => false,
        }
    }
}

/// Envelope for every JSON body: `{ message, data, meta }`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    pub message: String,
    pub data: Option<T>,
    pub meta: Option<Meta>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(message: impl Into<String>, data: T, meta: Option<Meta>) -> Self {
        Self {
            message: message.into(),
            data: Some(data),
            meta,
        }
    }

    pub fn empty(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            data: None,
            meta: Some(Meta::empty()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Meta;

    #[test]
    fn page_navigation() {
        let first = Meta::new(1, 3, 7);
        assert!(!first.has_previous());
        assert!(first.has_next());

        let last = Meta::new(3, 3, 7);
        assert!(last.has_previous());
        assert!(!last.has_next());

        assert!(!Meta::empty().has_next());
    }
}
