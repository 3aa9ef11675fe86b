use std::collections::BTreeMap;

use chrono::Utc;
use diesel::dsl::count_star;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use bloodlink_shared::errors::{AppError, AppResult};
use bloodlink_shared::types::auth::{AccountStatus, UserRole};
use bloodlink_shared::types::pagination::PaginationParams;

use crate::domain::{DonationStatus, Lifecycle, VoluntaryStatus};
use crate::models::User;
use crate::schema::{blood_requests, donations, users, voluntary_donations};
use crate::services::auth_service;
use crate::services::notification_service::{self, entity_data, NotificationKind};

// --- Users ---

pub fn list_users(
    conn: &mut PgConnection,
    role: Option<UserRole>,
    status: Option<AccountStatus>,
    params: &PaginationParams,
) -> AppResult<(Vec<User>, i64)> {
    let mut count_query = users::table.into_boxed();
    let mut items_query = users::table.into_boxed();
    if let Some(role) = role {
        count_query = count_query.filter(users::role.eq(role.as_str()));
        items_query = items_query.filter(users::role.eq(role.as_str()));
    }
    if let Some(status) = status {
        count_query = count_query.filter(users::status.eq(status.as_str()));
        items_query = items_query.filter(users::status.eq(status.as_str()));
    }

    let total: i64 = count_query.count().get_result(conn)?;
    let items = items_query
        .order(users::created_at.desc())
        .limit(params.limit())
        .offset(params.offset())
        .load::<User>(conn)?;

    Ok((items, total))
}

/// Approves or rejects a pending account and tells its owner.
pub fn review_user(conn: &mut PgConnection, user_id: Uuid, admin_id: Uuid, approve: bool) -> AppResult<User> {
    let target = if approve { AccountStatus::Approved } else { AccountStatus::Rejected };

    conn.transaction::<_, AppError, _>(|conn| {
        let user = auth_service::find_user(conn, user_id)?;
        if user.status != AccountStatus::Pending.as_str() {
            return Err(AppError::conflict(format!(
                "account is {} and can no longer be reviewed",
                user.status
            )));
        }

        let user: User = diesel::update(
            users::table
                .filter(users::id.eq(user.id))
                .filter(users::status.eq(AccountStatus::Pending.as_str())),
        )
        .set((
            users::status.eq(target.as_str()),
            users::updated_at.eq(Utc::now()),
        ))
        .get_result::<User>(conn)
        .optional()?
        .ok_or_else(|| AppError::conflict("account was reviewed concurrently"))?;

        let (kind, title, message) = if approve {
            (
                NotificationKind::AccountApproved,
                "Account approved",
                "Your account has been approved. Welcome to BloodLink!",
            )
        } else {
            (
                NotificationKind::AccountRejected,
                "Account rejected",
                "Your registration could not be approved.",
            )
        };
        notification_service::notify(conn, user.id, kind, title, message, Some(entity_data("user", user.id)))?;

        tracing::info!(user_id = %user.id, admin_id = %admin_id, status = %target, "account reviewed");
        Ok(user)
    })
}

// --- Dashboard ---

#[derive(Debug, Serialize)]
pub struct DashboardStats {
    pub users_by_status: BTreeMap<String, i64>,
    pub users_by_role: BTreeMap<String, i64>,
    pub pending_users: i64,
    pub requests_by_status: BTreeMap<String, i64>,
    pub completed_donations: i64,
    pub open_voluntary_donations: i64,
}

pub fn stats(conn: &mut PgConnection) -> AppResult<DashboardStats> {
    let users_by_status: BTreeMap<String, i64> = users::table
        .group_by(users::status)
        .select((users::status, count_star()))
        .load::<(String, i64)>(conn)?
        .into_iter()
        .collect();

    let users_by_role: BTreeMap<String, i64> = users::table
        .group_by(users::role)
        .select((users::role, count_star()))
        .load::<(String, i64)>(conn)?
        .into_iter()
        .collect();

    let requests_by_status: BTreeMap<String, i64> = blood_requests::table
        .group_by(blood_requests::status)
        .select((blood_requests::status, count_star()))
        .load::<(String, i64)>(conn)?
        .into_iter()
        .collect();

    let completed_donations: i64 = donations::table
        .filter(donations::status.eq(DonationStatus::Completed.as_str()))
        .count()
        .get_result(conn)?;

    let open_voluntary_donations: i64 = voluntary_donations::table
        .filter(voluntary_donations::status.eq_any(VoluntaryStatus::open_labels()))
        .count()
        .get_result(conn)?;

    let pending_users = users_by_status
        .get(AccountStatus::Pending.as_str())
        .copied()
        .unwrap_or(0);

    Ok(DashboardStats {
        users_by_status,
        users_by_role,
        pending_users,
        requests_by_status,
        completed_donations,
        open_voluntary_donations,
    })
}
