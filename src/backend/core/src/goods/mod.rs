//! Goods data model.
//!
//! A [`Good`] belongs to a project and carries a priority that orders it
//! among the project's other non-removed goods. Priorities are unique by
//! convention only: the reordering engine keeps them distinct, the schema
//! does not.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{GoodsError, Result};

/// Default page size for list requests.
pub const DEFAULT_LIST_LIMIT: i64 = 10;

/// The managed item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Good {
    pub id: i64,
    pub project_id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub priority: i32,
    pub removed: bool,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a good.
#[derive(Debug, Clone, Deserialize)]
pub struct GoodCreate {
    pub project_id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl GoodCreate {
    pub fn validate(&self) -> Result<()> {
        if self.project_id <= 0 {
            return Err(GoodsError::validation("project_id must be a positive integer"));
        }
        if self.name.trim().is_empty() {
            return Err(GoodsError::validation("name must not be empty"));
        }
        Ok(())
    }
}

/// Partial update. Absent fields are left as they are.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GoodUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl GoodUpdate {
    pub fn validate(&self) -> Result<()> {
        if matches!(&self.name, Some(name) if name.trim().is_empty()) {
            return Err(GoodsError::validation("name must not be empty"));
        }
        Ok(())
    }

    /// Apply the patch to a row in place.
    pub fn apply(&self, good: &mut Good) {
        if let Some(name) = &self.name {
            good.name = name.clone();
        }
        if let Some(description) = &self.description {
            good.description = description.clone();
        }
    }
}

/// One page of goods plus table-wide counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoodsPage {
    pub goods: Vec<Good>,
    /// Every row, removed ones included
    pub total: i64,
    pub removed: i64,
}

/// Validated paging parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListParams {
    pub limit: i64,
    pub offset: i64,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIST_LIMIT,
            offset: 0,
        }
    }
}

impl ListParams {
    pub fn new(limit: i64, offset: i64) -> Result<Self> {
        if limit < 0 {
            return Err(GoodsError::validation("invalid limit"));
        }
        if offset < 0 {
            return Err(GoodsError::validation("invalid offset"));
        }
        Ok(Self { limit, offset })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListMeta {
    pub total: i64,
    pub removed: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Response body of the list endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResponse {
    pub meta: ListMeta,
    pub goods: Vec<Good>,
}

impl ListResponse {
    pub fn new(page: GoodsPage, params: ListParams) -> Self {
        Self {
            meta: ListMeta {
                total: page.total,
                removed: page.removed,
                limit: params.limit,
                offset: params.offset,
            },
            goods: page.goods,
        }
    }
}

/// Body of a reprioritize request.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReprioritizeRequest {
    pub new_priority: i32,
}

impl ReprioritizeRequest {
    pub fn validate(&self) -> Result<()> {
        if self.new_priority < 1 {
            return Err(GoodsError::validation("newPriority must be a positive integer"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PriorityEntry {
    pub id: i64,
    pub priority: i32,
}

/// Response body of the reprioritize endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReprioritizeResponse {
    pub priorities: Vec<PriorityEntry>,
}

impl From<&[Good]> for ReprioritizeResponse {
    fn from(changed: &[Good]) -> Self {
        Self {
            priorities: changed
                .iter()
                .map(|g| PriorityEntry {
                    id: g.id,
                    priority: g.priority,
                })
                .collect(),
        }
    }
}

/// Audit payload recorded for a reprioritization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReprioritizeAudit {
    pub project_id: i64,
    pub new_priority: i32,
    pub updated_ids: Vec<Good>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Good {
        Good {
            id: 1,
            project_id: 1,
            name: "widget".to_string(),
            description: String::new(),
            priority: 1,
            removed: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_empty_description_is_omitted() {
        let json = serde_json::to_value(sample()).unwrap();
        assert!(json.get("description").is_none());
        assert_eq!(json["project_id"], 1);
        assert_eq!(json["removed"], false);
    }

    #[test]
    fn test_create_validation() {
        let ok = GoodCreate {
            project_id: 1,
            name: "a".to_string(),
            description: None,
        };
        assert!(ok.validate().is_ok());

        let bad_project = GoodCreate {
            project_id: 0,
            ..ok.clone()
        };
        assert!(bad_project.validate().is_err());

        let blank = GoodCreate {
            name: "  ".to_string(),
            ..ok
        };
        assert!(blank.validate().is_err());
    }

    #[test]
    fn test_update_apply_leaves_absent_fields() {
        let mut good = sample();
        good.description = "old".to_string();
        GoodUpdate {
            name: Some("renamed".to_string()),
            description: None,
        }
        .apply(&mut good);

        assert_eq!(good.name, "renamed");
        assert_eq!(good.description, "old");
    }

    #[test]
    fn test_list_params() {
        assert_eq!(ListParams::default().limit, 10);
        assert!(ListParams::new(-1, 0).is_err());
        assert!(ListParams::new(0, -1).is_err());
        assert!(ListParams::new(0, 0).is_ok());
    }

    #[test]
    fn test_reprioritize_request_is_camel_case() {
        let req: ReprioritizeRequest = serde_json::from_str(r#"{"newPriority": 3}"#).unwrap();
        assert_eq!(req.new_priority, 3);
        assert!(req.validate().is_ok());

        let zero: ReprioritizeRequest = serde_json::from_str(r#"{"newPriority": 0}"#).unwrap();
        assert!(zero.validate().is_err());
    }
}
