use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::flags::LevelFlags;

/// Deepest nesting rendered in a tree.
pub const MAX_TREE_DEPTH: usize = 16;

/// Cached summary projection of a microcosm (container).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MicrocosmSummary {
    pub id: i64,
    pub site_id: i64,
    pub parent_id: Option<i64>,
    pub title: String,
    pub item_count: i64,
    pub deleted: bool,
    pub moderated: bool,
    pub created_by: i64,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_activity: Option<OffsetDateTime>,
}

impl MicrocosmSummary {
    pub fn level(&self) -> LevelFlags {
        LevelFlags::new(self.deleted, self.moderated)
    }

    fn root_level(&self) -> bool {
        self.parent_id.is_none_or(|parent| parent <= 0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MicrocosmTreeNode {
    pub id: i64,
    pub title: String,
    pub item_count: i64,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_activity: Option<OffsetDateTime>,
    pub children: Vec<MicrocosmTreeNode>,
}

/// Nest `microcosms` under their parents, ordered by id.
///
/// A microcosm whose parent is not in the input is dropped with its whole
/// branch, so a hidden parent hides everything below it.
pub fn build_tree(microcosms: Vec<MicrocosmSummary>) -> Vec<MicrocosmTreeNode> {
    let ids: HashSet<i64> = microcosms.iter().map(|microcosm| microcosm.id).collect();
    let mut roots = Vec::new();
    let mut children: BTreeMap<i64, Vec<MicrocosmSummary>> = BTreeMap::new();

    for microcosm in microcosms {
        if microcosm.root_level() {
            roots.push(microcosm);
        } else if let Some(parent) = microcosm.parent_id.filter(|parent| ids.contains(parent)) {
            children.entry(parent).or_default().push(microcosm);
        }
    }

    roots.sort_by_key(|microcosm| microcosm.id);
    roots
        .into_iter()
        .map(|root| attach(root, &mut children, 1))
        .collect()
}

fn attach(
    microcosm: MicrocosmSummary,
    children: &mut BTreeMap<i64, Vec<MicrocosmSummary>>,
    depth: usize,
) -> MicrocosmTreeNode {
    let mut below = if depth < MAX_TREE_DEPTH {
        children.remove(&microcosm.id).unwrap_or_default()
    } else {
        Vec::new()
    };
    below.sort_by_key(|child| child.id);

    MicrocosmTreeNode {
        id: microcosm.id,
        title: microcosm.title,
        item_count: microcosm.item_count,
        last_activity: microcosm.last_activity,
        children: below
            .into_iter()
            .map(|child| attach(child, children, depth + 1))
            .collect(),
    }
}
