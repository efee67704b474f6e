use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::models::Profile;
use crate::services::members::{Member, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

#[derive(Debug, Serialize, ToSchema)]
pub struct ProfileResponse {
    pub real_name: Option<String>,
    pub student_id: Option<String>,
    pub hobbies: Option<String>,
    pub what_to_do: Option<String>,
    pub comment: Option<String>,
}

impl From<Profile> for ProfileResponse {
    fn from(p: Profile) -> Self {
        Self {
            real_name: p.real_name,
            student_id: p.student_id,
            hobbies: p.hobbies,
            what_to_do: p.what_to_do,
            comment: p.comment,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserWithProfile {
    pub id: Uuid,
    pub discord_id: String,
    pub username: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub guild_nickname: Option<String>,
    pub guild_roles: Vec<String>,
    pub joined_at: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub profile: Option<ProfileResponse>,
}

impl From<Member> for UserWithProfile {
    fn from(m: Member) -> Self {
        let user = m.user;
        Self {
            id: user.id,
            discord_id: user.discord_id,
            username: user.username,
            display_name: user.display_name,
            avatar_url: user.avatar_url,
            guild_nickname: user.guild_nickname,
            guild_roles: user.guild_roles,
            joined_at: user.joined_at,
            last_login_at: user.last_login_at,
            profile: m.profile.map(ProfileResponse::from),
        }
    }
}

/// Paging parameters. Unparseable or out-of-range values fall back to the
/// defaults instead of failing the request.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct MembersQuery {
    /// Page size, 1 to 100
    #[param(value_type = Option<i64>, example = 50)]
    pub limit: Option<String>,
    #[param(value_type = Option<i64>, example = 0)]
    pub offset: Option<String>,
}

impl MembersQuery {
    pub fn limit(&self) -> i64 {
        self.limit
            .as_deref()
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|v| (1..=MAX_PAGE_SIZE).contains(v))
            .unwrap_or(DEFAULT_PAGE_SIZE)
    }

    pub fn offset(&self) -> i64 {
        self.offset
            .as_deref()
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|v| *v >= 0)
            .unwrap_or(0)
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MembersResponse {
    pub members: Vec<UserWithProfile>,
    pub limit: i64,
    pub offset: i64,
    pub count: usize,
}

impl MembersResponse {
    pub fn page(members: Vec<Member>, limit: i64, offset: i64) -> Self {
        let members: Vec<UserWithProfile> = members.into_iter().map(Into::into).collect();
        Self {
            count: members.len(),
            members,
            limit,
            offset,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(limit: Option<&str>, offset: Option<&str>) -> MembersQuery {
        MembersQuery {
            limit: limit.map(str::to_string),
            offset: offset.map(str::to_string),
        }
    }

    #[test]
    fn test_paging_defaults() {
        let q = MembersQuery::default();
        assert_eq!((q.limit(), q.offset()), (50, 0));
    }

    #[test]
    fn test_paging_out_of_range_falls_back() {
        assert_eq!(query(Some("0"), None).limit(), 50);
        assert_eq!(query(Some("101"), None).limit(), 50);
        assert_eq!(query(Some("abc"), None).limit(), 50);
        assert_eq!(query(Some("100"), None).limit(), 100);
        assert_eq!(query(None, Some("-1")).offset(), 0);
        assert_eq!(query(None, Some("20")).offset(), 20);
    }
}
