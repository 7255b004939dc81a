//! Wiring of the application services over one storage backend.

use std::sync::Arc;

use crate::application::microcosms::MicrocosmService;
use crate::application::mutation::MutationCoordinator;
use crate::application::permissions::PermissionResolver;
use crate::application::profiles::ProfileService;
use crate::application::questions::QuestionService;
use crate::application::reactions::ReactionService;
use crate::application::reads::ReadService;
use crate::application::repos::{
    MicrocosmsRepo, PermissionsRepo, ProfilesRepo, QuestionsRepo, ReactionsRepo, StoreGateway,
    WatchersRepo,
};
use crate::application::watchers::WatcherService;
use crate::cache::{DedupGuard, InvalidationGraph, ResultCache};

/// Trait-object handles onto a storage backend.
#[derive(Clone)]
pub struct Repositories {
    pub store: Arc<dyn StoreGateway>,
    pub questions: Arc<dyn QuestionsRepo>,
    pub microcosms: Arc<dyn MicrocosmsRepo>,
    pub profiles: Arc<dyn ProfilesRepo>,
    pub permissions: Arc<dyn PermissionsRepo>,
    pub reactions: Arc<dyn ReactionsRepo>,
    pub watchers: Arc<dyn WatchersRepo>,
}

impl Repositories {
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: StoreGateway
            + QuestionsRepo
            + MicrocosmsRepo
            + ProfilesRepo
            + PermissionsRepo
            + ReactionsRepo
            + WatchersRepo
            + 'static,
    {
        Self {
            store: backend.clone(),
            questions: backend.clone(),
            microcosms: backend.clone(),
            profiles: backend.clone(),
            permissions: backend.clone(),
            reactions: backend.clone(),
            watchers: backend,
        }
    }
}

#[derive(Clone)]
pub struct Services {
    pub questions: Arc<QuestionService>,
    pub microcosms: Arc<MicrocosmService>,
    pub profiles: Arc<ProfileService>,
    pub permissions: Arc<PermissionResolver>,
    pub reactions: Arc<ReactionService>,
    pub watchers: Arc<WatcherService>,
    pub reads: Arc<ReadService>,
    pub store: Arc<dyn StoreGateway>,
    pub cache: ResultCache,
}

impl Services {
    pub fn build(repos: Repositories, cache: ResultCache, dedup: Arc<DedupGuard>) -> Self {
        let clock = cache.clock().clone();
        let permissions = PermissionResolver::new(repos.permissions.clone(), cache.clone());
        let microcosms = MicrocosmService::new(
            repos.microcosms.clone(),
            cache.clone(),
            permissions.clone(),
        );
        let profiles =
            ProfileService::new(repos.profiles.clone(), cache.clone(), permissions.clone());
        let mutations = MutationCoordinator::new(
            repos.store.clone(),
            cache.clone(),
            Arc::new(InvalidationGraph::standard()),
        );

        let questions = QuestionService::new(
            repos.questions.clone(),
            microcosms.clone(),
            profiles.clone(),
            permissions.clone(),
            cache.clone(),
            dedup,
            mutations.clone(),
            clock.clone(),
        );
        let reactions = ReactionService::new(
            repos.reactions.clone(),
            permissions.clone(),
            mutations.clone(),
            clock.clone(),
        );
        let watchers = WatcherService::new(repos.watchers.clone(), cache.clone(), mutations.clone());
        let reads = ReadService::new(mutations, clock);

        Self {
            questions: Arc::new(questions),
            microcosms: Arc::new(microcosms),
            profiles: Arc::new(profiles),
            permissions: Arc::new(permissions),
            reactions: Arc::new(reactions),
            watchers: Arc::new(watchers),
            reads: Arc::new(reads),
            store: repos.store,
            cache,
        }
    }
}
