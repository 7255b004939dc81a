//! Declared invalidation edges.
//!
//! Each mutated item type lists the related entities whose cached
//! projections embed data derived from it. A mutation names the concrete
//! relations it touched and the graph expands that into the identities to
//! purge. Only types this crate writes are declared; comments and
//! microcosms are read-only here, so no parent edge exists yet.

use std::collections::HashMap;

use crate::domain::types::{ItemRef, ItemType};

/// A relation whose cached projection embeds the mutated item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dependent {
    /// The containing microcosm (item counts, last activity).
    Container,
}

/// Concrete relations of one mutated item.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Touched {
    /// Containing microcosms; both old and new on a move.
    pub containers: Vec<i64>,
}

impl Touched {
    pub fn in_container(microcosm_id: i64) -> Self {
        Self {
            containers: vec![microcosm_id],
        }
    }

    pub fn moved(from: i64, to: i64) -> Self {
        let mut containers = vec![from];
        if to != from {
            containers.push(to);
        }
        Self { containers }
    }

    /// An item that sits outside any microcosm.
    pub fn standalone() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone)]
pub struct InvalidationGraph {
    edges: HashMap<ItemType, Vec<Dependent>>,
}

impl Default for InvalidationGraph {
    fn default() -> Self {
        Self::standard()
    }
}

impl InvalidationGraph {
    pub fn standard() -> Self {
        let edges = HashMap::from([
            (ItemType::Question, vec![Dependent::Container]),
            // Only the watcher's own projections embed its settings.
            (ItemType::Watcher, Vec::new()),
        ]);
        Self { edges }
    }

    pub fn dependents(&self, item_type: ItemType) -> &[Dependent] {
        self.edges.get(&item_type).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The mutated item followed by every dependent identity, without repeats.
    pub fn purge_set(&self, item: ItemRef, touched: &Touched) -> Vec<ItemRef> {
        let mut out = vec![item];
        for dependent in self.dependents(item.item_type) {
            match dependent {
                Dependent::Container => {
                    for id in &touched.containers {
                        push_unique(&mut out, ItemRef::microcosm(*id));
                    }
                }
            }
        }
        out
    }
}

fn push_unique(out: &mut Vec<ItemRef>, item: ItemRef) {
    if !out.contains(&item) {
        out.push(item);
    }
}
