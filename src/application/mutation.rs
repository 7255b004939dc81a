//! Transactional writes followed by synchronous cache invalidation.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::cache::{InvalidationGraph, ResultCache, Touched};
use crate::domain::types::{ItemRef, ItemType};

use super::error::AppError;
use super::repos::{Statement, StatementOutcome, StoreGateway};

/// The entity a mutation is about, for deriving its purge set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Existing(ItemRef),
    /// Resolved from the first `Inserted` outcome after commit.
    Inserted(ItemType),
}

#[derive(Debug, Clone)]
pub struct Mutation {
    pub statements: Vec<Statement>,
    pub target: Option<Target>,
    pub touched: Touched,
}

impl Mutation {
    pub fn new(statements: Vec<Statement>, target: Target, touched: Touched) -> Self {
        Self {
            statements,
            target: Some(target),
            touched,
        }
    }

    /// Writes whose results are not held in any cached projection.
    pub fn uncached(statements: Vec<Statement>) -> Self {
        Self {
            statements,
            target: None,
            touched: Touched::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationResult {
    pub item: Option<ItemRef>,
    pub outcomes: Vec<StatementOutcome>,
    pub purged: Vec<ItemRef>,
}

impl MutationResult {
    pub fn inserted_id(&self) -> Option<i64> {
        first_inserted(&self.outcomes)
    }
}

fn first_inserted(outcomes: &[StatementOutcome]) -> Option<i64> {
    outcomes.iter().find_map(|outcome| match outcome {
        StatementOutcome::Inserted { id } => Some(*id),
        StatementOutcome::Affected { .. } => None,
    })
}

#[derive(Clone)]
pub struct MutationCoordinator {
    store: Arc<dyn StoreGateway>,
    cache: ResultCache,
    graph: Arc<InvalidationGraph>,
}

impl MutationCoordinator {
    pub fn new(
        store: Arc<dyn StoreGateway>,
        cache: ResultCache,
        graph: Arc<InvalidationGraph>,
    ) -> Self {
        Self {
            store,
            cache,
            graph,
        }
    }

    /// Begin, apply every statement, commit or roll back, then purge.
    ///
    /// Nothing is purged unless the commit succeeded; once it has, a purge
    /// fault is reported as `Internal` even though the write is durable.
    pub async fn execute(&self, mutation: Mutation) -> Result<MutationResult, AppError> {
        let Mutation {
            statements,
            target,
            touched,
        } = mutation;

        let mut tx = self.store.begin().await?;
        let mut outcomes = Vec::with_capacity(statements.len());

        for statement in &statements {
            match tx.exec(statement).await {
                Ok(outcome) => outcomes.push(outcome),
                Err(err) => {
                    warn!(
                        target = "microcosm::mutation",
                        statement = statement.name(),
                        error = %err,
                        "statement failed, rolling back"
                    );
                    if let Err(rollback_err) = tx.rollback().await {
                        error!(
                            target = "microcosm::mutation",
                            error = %rollback_err,
                            "rollback failed"
                        );
                    }
                    return Err(err.into());
                }
            }
        }

        tx.commit().await?;

        let item = match target {
            None => None,
            Some(Target::Existing(item)) => Some(item),
            Some(Target::Inserted(item_type)) => {
                let id = first_inserted(&outcomes).ok_or_else(|| {
                    AppError::internal("insert mutation committed without an inserted id")
                })?;
                Some(ItemRef::new(item_type, id))
            }
        };

        let purged = item
            .map(|item| self.graph.purge_set(item, &touched))
            .unwrap_or_default();

        info!(
            target = "microcosm::mutation",
            statements = statements.len(),
            item = item.map(|item| item.to_string()).unwrap_or_default(),
            purge = purged.len(),
            "mutation committed"
        );

        self.cache.purge_all(&purged).map_err(|err| {
            error!(
                target = "microcosm::mutation",
                error = %err,
                "purge after commit failed"
            );
            AppError::internal(format!("write committed but cache purge failed: {err}"))
        })?;

        Ok(MutationResult {
            item,
            outcomes,
            purged,
        })
    }
}
