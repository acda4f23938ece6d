use serde::{Deserialize, Serialize};

use crate::{
    model::{ModelManager, error::DatabaseResult},
    web::AuthenticatedUser,
};

#[derive(Debug, Clone)]
pub enum ResourceType {
    Personne,
    Team,
    Domain,
    Formation,
    Module,
    Resource,
    Quiz,
    Question,
    UserFormation,
    UserModule,
    UserResource,
    UserQuiz,
    UserAnswer,
}

/// Window requested by a listing, already normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    limit: i64,
    offset: i64,
}

impl PageRequest {
    pub const MAX_LIMIT: i64 = 100;

    /// Clamps `limit` to `1..=MAX_LIMIT` and negative offsets to zero.
    pub fn new(limit: i64, offset: i64) -> Self {
        Self {
            limit: limit.clamp(1, Self::MAX_LIMIT),
            offset: offset.max(0),
        }
    }

    pub fn limit(&self) -> i64 {
        self.limit
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, request: PageRequest) -> Self {
        Self {
            items,
            total,
            limit: request.limit,
            offset: request.offset,
        }
    }

    /// Same window, different item representation.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            limit: self.limit,
            offset: self.offset,
        }
    }
}

pub trait ResourceTyped {
    fn get_resource_type() -> ResourceType;
}

#[async_trait::async_trait]
pub trait CrudRepository<T, CreateUpdate, V>
where
    T: ResourceTyped,
    V: Clone + Copy,
{
    async fn create(
        mm: &ModelManager,
        actor: &AuthenticatedUser,
        data: CreateUpdate,
    ) -> DatabaseResult<T>;
    async fn update(
        self,
        mm: &ModelManager,
        actor: &AuthenticatedUser,
        data: CreateUpdate,
    ) -> DatabaseResult<T>
    where
        Self: Sized;

    async fn delete(self, mm: &ModelManager, actor: &AuthenticatedUser) -> DatabaseResult<()>
    where
        Self: Sized;

    async fn find_by_id(
        mm: &ModelManager,
        actor: &AuthenticatedUser,
        id: V,
    ) -> DatabaseResult<Option<T>>;
    async fn list(
        mm: &ModelManager,
        actor: &AuthenticatedUser,
        request: PageRequest,
    ) -> DatabaseResult<Vec<T>>;
    async fn count(mm: &ModelManager, actor: &AuthenticatedUser) -> DatabaseResult<i64>;
}

#[async_trait::async_trait]
pub trait PaginatableRepository<T, CreateUpdate, V>
where
    T: ResourceTyped + CrudRepository<T, CreateUpdate, V>,
    V: Clone + Copy,
{
    async fn page(
        mm: &ModelManager,
        actor: &AuthenticatedUser,
        request: PageRequest,
    ) -> DatabaseResult<Page<T>>;
}

/// Derives `PaginatableRepository` from the entity's `list` and `count`.
#[macro_export]
macro_rules! impl_paginatable_for {
    ($ent:ident, $ent_write:ident, $ent_id:ident) => {
        #[async_trait::async_trait]
        impl $crate::model::PaginatableRepository<$ent, $ent_write, $ent_id> for $ent {
            async fn page(
                mm: &$crate::model::ModelManager,
                actor: &$crate::web::AuthenticatedUser,
                request: $crate::model::PageRequest,
            ) -> $crate::model::DatabaseResult<$crate::model::Page<$ent>> {
                let items = <$ent as $crate::model::CrudRepository<$ent, $ent_write, $ent_id>>::list(
                    mm, actor, request,
                )
                .await?;
                let total =
                    <$ent as $crate::model::CrudRepository<$ent, $ent_write, $ent_id>>::count(mm, actor)
                        .await?;
                Ok($crate::model::Page::new(items, total, request))
            }
        }
    };
}
