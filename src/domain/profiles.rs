use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSummary {
    pub id: i64,
    pub site_id: i64,
    pub user_id: i64,
    pub name: String,
    pub avatar: Option<String>,
}
