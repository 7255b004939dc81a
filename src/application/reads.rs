use std::sync::Arc;

use tracing::debug;

use crate::application::error::AppError;
use crate::application::mutation::{Mutation, MutationCoordinator};
use crate::application::repos::Statement;
use crate::cache::Clock;
use crate::domain::actor::Actor;
use crate::domain::reads::ReadScope;

/// Read markers live outside every cached projection.
#[derive(Clone)]
pub struct ReadService {
    mutations: MutationCoordinator,
    clock: Arc<dyn Clock>,
}

impl ReadService {
    pub fn new(mutations: MutationCoordinator, clock: Arc<dyn Clock>) -> Self {
        Self { mutations, clock }
    }

    pub async fn mark_read(&self, actor: &Actor, scope: ReadScope) -> Result<(), AppError> {
        if !actor.is_authenticated() {
            return Err(AppError::forbidden(
                "You must be logged in to mark items as read",
            ));
        }

        self.mutations
            .execute(Mutation::uncached(vec![Statement::MarkRead {
                site_id: actor.site_id,
                profile_id: actor.profile_id,
                scope,
                read_at: self.clock.now(),
            }]))
            .await?;

        debug!(
            target = "microcosm::reads",
            profile_id = actor.profile_id,
            marker = %scope.marker(actor.site_id),
            "scope marked as read"
        );
        Ok(())
    }
}
