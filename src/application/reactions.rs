//! Yay/meh/grr reactions on any readable item.

use std::sync::Arc;

use crate::application::error::AppError;
use crate::application::mutation::{Mutation, MutationCoordinator};
use crate::application::permissions::PermissionResolver;
use crate::application::repos::{Lineage, ReactionsRepo, Statement};
use crate::cache::Clock;
use crate::domain::actor::Actor;
use crate::domain::reactions::{Reaction, ReactionChoice, ReactionValue};
use crate::domain::types::ItemRef;

#[derive(Clone)]
pub struct ReactionService {
    repo: Arc<dyn ReactionsRepo>,
    permissions: PermissionResolver,
    mutations: MutationCoordinator,
    clock: Arc<dyn Clock>,
}

impl ReactionService {
    pub fn new(
        repo: Arc<dyn ReactionsRepo>,
        permissions: PermissionResolver,
        mutations: MutationCoordinator,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repo,
            permissions,
            mutations,
            clock,
        }
    }

    pub async fn get(&self, actor: &Actor, item: ItemRef) -> Result<Reaction, AppError> {
        self.authorize(actor, item).await?;

        let row = self
            .repo
            .find_reaction(item, actor.profile_id)
            .await?
            .ok_or_else(|| AppError::not_found("reaction not found"))?;

        Ok(Reaction {
            id: row.id,
            item: row.item,
            profile_id: row.profile_id,
            item_profile_id: row.item_profile_id,
            created: row.created,
            value: ReactionValue::from_stored(row.value)?,
        })
    }

    pub async fn set(
        &self,
        actor: &Actor,
        item: ItemRef,
        choice: ReactionChoice,
    ) -> Result<Reaction, AppError> {
        let value = choice.resolve()?;
        let lineage = self.authorize(actor, item).await?;

        self.mutations
            .execute(Mutation::uncached(vec![Statement::UpsertReaction {
                item,
                profile_id: actor.profile_id,
                item_profile_id: lineage.created_by,
                created: self.clock.now(),
                value,
            }]))
            .await?;

        self.get(actor, item).await
    }

    /// Removing a reaction that was never set is not an error.
    pub async fn clear(&self, actor: &Actor, item: ItemRef) -> Result<(), AppError> {
        self.authorize(actor, item).await?;

        if self.repo.find_reaction(item, actor.profile_id).await?.is_none() {
            return Ok(());
        }

        self.mutations
            .execute(Mutation::uncached(vec![Statement::DeleteReaction {
                item,
                profile_id: actor.profile_id,
            }]))
            .await?;
        Ok(())
    }

    async fn authorize(&self, actor: &Actor, item: ItemRef) -> Result<Lineage, AppError> {
        if !actor.is_authenticated() {
            return Err(AppError::forbidden(
                "You must be logged in to react to an item",
            ));
        }
        let (permissions, lineage) = self
            .permissions
            .resolve_item_with_lineage(actor, item)
            .await?;
        if !permissions.can_read {
            return Err(AppError::forbidden(format!(
                "You do not have permission to view this {}",
                item.item_type
            )));
        }
        Ok(lineage)
    }
}
