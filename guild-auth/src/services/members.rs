//! Read-only member directory: users joined with their self-introduction profile.

use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{Profile, User};
use crate::services::ServiceError;
use crate::store::{CredentialStore, ProfileStore, StoreError, UserStore};

pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone)]
pub struct Member {
    pub user: User,
    pub profile: Option<Profile>,
}

#[derive(Clone)]
pub struct MemberService {
    store: Arc<dyn CredentialStore>,
}

impl MemberService {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// One page of members. `limit` is clamped to `1..=MAX_PAGE_SIZE`.
    pub async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Member>, ServiceError> {
        let limit = limit.clamp(1, MAX_PAGE_SIZE);
        let offset = offset.max(0);

        let users = self.store.list_users(limit, offset).await?;
        let ids: Vec<Uuid> = users.iter().map(|u| u.id).collect();
        let mut profiles: HashMap<Uuid, Profile> = self
            .store
            .find_profiles_by_user_ids(&ids)
            .await?
            .into_iter()
            .map(|p| (p.user_id, p))
            .collect();

        Ok(users
            .into_iter()
            .map(|user| {
                let profile = profiles.remove(&user.id);
                Member { user, profile }
            })
            .collect())
    }

    pub async fn get(&self, user_id: Uuid) -> Result<Member, ServiceError> {
        let user = match self.store.get_user(user_id).await {
            Ok(user) => user,
            Err(StoreError::NotFound(_)) => return Err(ServiceError::UserNotFound),
            Err(e) => return Err(e.into()),
        };
        let profile = self.store.find_profile_by_user_id(user_id).await?;
        Ok(Member { user, profile })
    }

    pub async fn with_profile(&self, user: User) -> Result<Member, ServiceError> {
        let profile = self.store.find_profile_by_user_id(user.id).await?;
        Ok(Member { user, profile })
    }
}
