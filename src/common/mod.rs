//! Operations shared across Polaris domains

pub mod object;
pub mod primitives;

use crate::error::Result;
use crate::polaris::client::PolarisClient;
use crate::validation::check_first;
use serde_json::{Map, Value};

/// Default page size of list operations
pub const DEFAULT_FIRST: i64 = 20;

/// Paging and sorting arguments of list operations
#[derive(Debug, Clone)]
pub struct PageArgs {
    pub first: i64,
    pub after: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

impl Default for PageArgs {
    fn default() -> Self {
        Self {
            first: DEFAULT_FIRST,
            after: None,
            sort_by: None,
            sort_order: None,
        }
    }
}

impl PageArgs {
    pub fn first(first: i64) -> Self {
        Self {
            first,
            ..Default::default()
        }
    }

    pub fn sorted(mut self, sort_by: &str, sort_order: &str) -> Self {
        self.sort_by = Some(sort_by.to_string());
        self.sort_order = Some(sort_order.to_string());
        self
    }

    pub fn after(mut self, cursor: &str) -> Self {
        self.after = Some(cursor.to_string());
        self
    }

    /// Validate `first` and check sort values against their enums, writing
    /// `first`, `after`, `sortBy` and `sortOrder` into `variables`
    pub(crate) async fn apply(
        &self,
        client: &PolarisClient,
        variables: &mut Map<String, Value>,
        sort_by_enum: &str,
        sort_order_enum: &str,
    ) -> Result<()> {
        variables.insert("first".to_string(), Value::from(check_first(self.first)?));
        if let Some(sort_by) = non_empty(&self.sort_by) {
            let sort_by = client.check_enum(sort_by, "sort_by", sort_by_enum).await?;
            variables.insert("sortBy".to_string(), Value::String(sort_by));
        }
        if let Some(sort_order) = non_empty(&self.sort_order) {
            let sort_order = client.check_enum(sort_order, "sort_order", sort_order_enum).await?;
            variables.insert("sortOrder".to_string(), Value::String(sort_order));
        }
        if let Some(after) = non_empty(&self.after) {
            variables.insert("after".to_string(), Value::String(after.to_string()));
        }
        Ok(())
    }
}

pub(crate) fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
