use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use serde_json::json;
use uuid::Uuid;

use bloodlink_shared::errors::{AppError, AppResult, ErrorCode};
use bloodlink_shared::types::pagination::PaginationParams;

use crate::models::{NewNotification, Notification};
use crate::schema::{notifications, users};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Registration,
    AccountApproved,
    AccountRejected,
    RequestCreated,
    RequestApproved,
    RequestRejected,
    RequestMatch,
    RequestAccepted,
    DonationStatus,
    DonationCancelled,
    VoluntarySubmitted,
    VoluntaryApproved,
    VoluntaryRejected,
    VoluntaryAssigned,
    VoluntaryScheduled,
    VoluntaryConfirmed,
    VoluntaryCompleted,
    VoluntaryCancelled,
    CertificateIssued,
    EligibilityReminder,
    AppointmentReminder,
    PendingRequestReminder,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Registration => "registration",
            Self::AccountApproved => "account_approved",
            Self::AccountRejected => "account_rejected",
            Self::RequestCreated => "request_created",
            Self::RequestApproved => "request_approved",
            Self::RequestRejected => "request_rejected",
            Self::RequestMatch => "request_match",
            Self::RequestAccepted => "request_accepted",
            Self::DonationStatus => "donation_status",
            Self::DonationCancelled => "donation_cancelled",
            Self::VoluntarySubmitted => "voluntary_submitted",
            Self::VoluntaryApproved => "voluntary_approved",
            Self::VoluntaryRejected => "voluntary_rejected",
            Self::VoluntaryAssigned => "voluntary_assigned",
            Self::VoluntaryScheduled => "voluntary_scheduled",
            Self::VoluntaryConfirmed => "voluntary_confirmed",
            Self::VoluntaryCompleted => "voluntary_completed",
            Self::VoluntaryCancelled => "voluntary_cancelled",
            Self::CertificateIssued => "certificate_issued",
            Self::EligibilityReminder => "eligibility_reminder",
            Self::AppointmentReminder => "appointment_reminder",
            Self::PendingRequestReminder => "pending_request_reminder",
        }
    }
}

/// Payload linking a notification to the row it is about.
pub fn entity_data(entity_type: &str, entity_id: Uuid) -> serde_json::Value {
    json!({ "entity_type": entity_type, "entity_id": entity_id })
}

fn refers_to(notification: &Notification, entity_id: Uuid) -> bool {
    notification
        .data
        .as_ref()
        .and_then(|data| data.get("entity_id"))
        .and_then(|id| id.as_str())
        .is_some_and(|id| id == entity_id.to_string())
}

/// Insert a notification for one user.
pub fn notify(
    conn: &mut PgConnection,
    user_id: Uuid,
    kind: NotificationKind,
    title: &str,
    message: &str,
    data: Option<serde_json::Value>,
) -> AppResult<Notification> {
    let new_notification = NewNotification {
        user_id,
        notification_type: kind.as_str().to_string(),
        title: title.to_string(),
        message: message.to_string(),
        data,
    };

    let notification = diesel::insert_into(notifications::table)
        .values(&new_notification)
        .get_result::<Notification>(conn)?;

    tracing::debug!(
        notification_id = %notification.id,
        user_id = %user_id,
        notification_type = kind.as_str(),
        "notification created"
    );

    Ok(notification)
}

pub fn admin_ids(conn: &mut PgConnection) -> AppResult<Vec<Uuid>> {
    Ok(users::table
        .filter(users::role.eq("admin"))
        .filter(users::status.eq("approved"))
        .select(users::id)
        .load::<Uuid>(conn)?)
}

/// Fan a notification out to every approved admin.
pub fn notify_admins(
    conn: &mut PgConnection,
    kind: NotificationKind,
    title: &str,
    message: &str,
    data: Option<serde_json::Value>,
) -> AppResult<usize> {
    let rows: Vec<NewNotification> = admin_ids(conn)?
        .into_iter()
        .map(|user_id| NewNotification {
            user_id,
            notification_type: kind.as_str().to_string(),
            title: title.to_string(),
            message: message.to_string(),
            data: data.clone(),
        })
        .collect();

    if rows.is_empty() {
        tracing::warn!(notification_type = kind.as_str(), "no approved admin to notify");
        return Ok(0);
    }

    let inserted = diesel::insert_into(notifications::table)
        .values(&rows)
        .execute(conn)?;
    Ok(inserted)
}

/// Whether `user_id` already got a `kind` notification about `entity_id`
/// since `since` (start of the current day for the reminder job).
pub fn sent_since(
    conn: &mut PgConnection,
    user_id: Uuid,
    kind: NotificationKind,
    entity_id: Uuid,
    since: DateTime<Utc>,
) -> AppResult<bool> {
    let recent = notifications::table
        .filter(notifications::user_id.eq(user_id))
        .filter(notifications::notification_type.eq(kind.as_str()))
        .filter(notifications::created_at.ge(since))
        .load::<Notification>(conn)?;

    Ok(recent.iter().any(|n| refers_to(n, entity_id)))
}

pub fn list(
    conn: &mut PgConnection,
    user_id: Uuid,
    params: &PaginationParams,
) -> AppResult<(Vec<Notification>, i64)> {
    let total: i64 = notifications::table
        .filter(notifications::user_id.eq(user_id))
        .count()
        .get_result(conn)?;

    let items = notifications::table
        .filter(notifications::user_id.eq(user_id))
        .order(notifications::created_at.desc())
        .limit(params.limit())
        .offset(params.offset())
        .load::<Notification>(conn)?;

    Ok((items, total))
}

pub fn count_unread(conn: &mut PgConnection, user_id: Uuid) -> AppResult<i64> {
    let count: i64 = notifications::table
        .filter(notifications::user_id.eq(user_id))
        .filter(notifications::is_read.eq(false))
        .count()
        .get_result(conn)?;

    Ok(count)
}

/// Mark a single notification as read (only if it belongs to the user).
pub fn mark_read(conn: &mut PgConnection, notification_id: Uuid, user_id: Uuid) -> AppResult<Notification> {
    diesel::update(
        notifications::table
            .filter(notifications::id.eq(notification_id))
            .filter(notifications::user_id.eq(user_id)),
    )
    .set(notifications::is_read.eq(true))
    .get_result::<Notification>(conn)
    .optional()?
    .ok_or_else(|| AppError::new(ErrorCode::NotificationNotFound, "notification not found"))
}

pub fn mark_all_read(conn: &mut PgConnection, user_id: Uuid) -> AppResult<usize> {
    let updated = diesel::update(
        notifications::table
            .filter(notifications::user_id.eq(user_id))
            .filter(notifications::is_read.eq(false)),
    )
    .set(notifications::is_read.eq(true))
    .execute(conn)?;

    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notification(data: Option<serde_json::Value>) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            notification_type: NotificationKind::EligibilityReminder.as_str().into(),
            title: "t".into(),
            message: "m".into(),
            data,
            is_read: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn matches_entity_from_payload() {
        let id = Uuid::new_v4();
        assert!(refers_to(&notification(Some(entity_data("donor", id))), id));
        assert!(!refers_to(&notification(Some(entity_data("donor", Uuid::new_v4()))), id));
        assert!(!refers_to(&notification(None), id));
        assert!(!refers_to(&notification(Some(json!({ "entity_id": 42 }))), id));
    }

    #[test]
    fn kinds_are_snake_case() {
        assert_eq!(NotificationKind::PendingRequestReminder.as_str(), "pending_request_reminder");
        assert_eq!(NotificationKind::RequestAccepted.as_str(), "request_accepted");
    }
}
