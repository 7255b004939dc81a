use serde::{Deserialize, Serialize};

use super::types::ItemRef;

pub const API_PREFIX: &str = "/api/v1";

/// Hypermedia link attached to entity metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub rel: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub href: String,
}

impl Link {
    pub fn to_item(rel: impl Into<String>, title: Option<String>, item: ItemRef) -> Self {
        Self {
            rel: rel.into(),
            title,
            href: item_href(&item),
        }
    }
}

pub fn item_href(item: &ItemRef) -> String {
    format!(
        "{API_PREFIX}/{}/{}",
        item.item_type.api_collection(),
        item.item_id
    )
}
