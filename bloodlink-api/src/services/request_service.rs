use chrono::Utc;
use diesel::dsl::sql;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::sql_types::Integer;
use serde::Serialize;
use uuid::Uuid;

use bloodlink_shared::errors::{AppError, AppResult, ErrorCode};
use bloodlink_shared::types::auth::AuthUser;
use bloodlink_shared::types::pagination::PaginationParams;

use crate::domain::{DonationStatus, Lifecycle, RequestStatus};
use crate::models::{BloodRequest, Donation, Donor, NewBloodRequest};
use crate::schema::{blood_requests, donations, donors, users};
use crate::services::notification_service::{self, entity_data, NotificationKind};

/// Most critical first; ties broken by age in the caller's `order`.
const URGENCY_RANK: &str = "CASE blood_requests.urgency \
     WHEN 'critical' THEN 0 WHEN 'high' THEN 1 WHEN 'medium' THEN 2 ELSE 3 END";

pub fn find(conn: &mut PgConnection, request_id: Uuid) -> AppResult<BloodRequest> {
    blood_requests::table
        .find(request_id)
        .first::<BloodRequest>(conn)
        .optional()?
        .ok_or_else(|| AppError::new(ErrorCode::RequestNotFound, "blood request not found"))
}

/// Row-locked read used by every status change.
pub fn find_for_update(conn: &mut PgConnection, request_id: Uuid) -> AppResult<BloodRequest> {
    blood_requests::table
        .find(request_id)
        .for_update()
        .first::<BloodRequest>(conn)
        .optional()?
        .ok_or_else(|| AppError::new(ErrorCode::RequestNotFound, "blood request not found"))
}

/// Flips the status only if it is still `from`; a concurrent writer that got
/// there first turns this into a state conflict.
pub fn set_status(
    conn: &mut PgConnection,
    request_id: Uuid,
    from: RequestStatus,
    to: RequestStatus,
) -> AppResult<BloodRequest> {
    from.transition(to)?;
    diesel::update(
        blood_requests::table
            .filter(blood_requests::id.eq(request_id))
            .filter(blood_requests::status.eq(from.as_str())),
    )
    .set((
        blood_requests::status.eq(to.as_str()),
        blood_requests::updated_at.eq(Utc::now()),
    ))
    .get_result::<BloodRequest>(conn)
    .optional()?
    .ok_or_else(|| AppError::conflict(format!("blood request is no longer {from}")))
}

// --- Requesters ---

pub fn create(conn: &mut PgConnection, new_request: NewBloodRequest) -> AppResult<BloodRequest> {
    conn.transaction::<_, AppError, _>(|conn| {
        let request: BloodRequest = diesel::insert_into(blood_requests::table)
            .values(&new_request)
            .get_result(conn)?;

        notification_service::notify_admins(
            conn,
            NotificationKind::RequestCreated,
            "New blood request",
            &format!(
                "{} unit(s) of {} requested for {} at {} ({} urgency)",
                request.quantity, request.blood_type, request.patient_name, request.hospital_name, request.urgency
            ),
            Some(entity_data("blood_request", request.id)),
        )?;

        tracing::info!(
            request_id = %request.id,
            requester_id = %request.requester_id,
            blood_type = %request.blood_type,
            urgency = %request.urgency,
            "blood request created"
        );
        Ok(request)
    })
}

pub fn list_mine(
    conn: &mut PgConnection,
    requester_id: Uuid,
    params: &PaginationParams,
) -> AppResult<(Vec<BloodRequest>, i64)> {
    let total: i64 = blood_requests::table
        .filter(blood_requests::requester_id.eq(requester_id))
        .count()
        .get_result(conn)?;

    let items = blood_requests::table
        .filter(blood_requests::requester_id.eq(requester_id))
        .order(blood_requests::created_at.desc())
        .limit(params.limit())
        .offset(params.offset())
        .load::<BloodRequest>(conn)?;

    Ok((items, total))
}

#[derive(Debug, Serialize)]
pub struct RequestDetail {
    #[serde(flatten)]
    pub request: BloodRequest,
    pub active_donation: Option<Donation>,
}

/// Owner or admin view of a request with its live donation, if any.
pub fn detail(conn: &mut PgConnection, request_id: Uuid, caller: &AuthUser) -> AppResult<RequestDetail> {
    let request = find(conn, request_id)?;
    if request.requester_id != caller.id && !caller.is_admin() {
        return Err(AppError::new(ErrorCode::RequestNotFound, "blood request not found"));
    }

    let active_donation = donations::table
        .filter(donations::request_id.eq(request.id))
        .filter(donations::status.ne(DonationStatus::Cancelled.as_str()))
        .first::<Donation>(conn)
        .optional()?;

    Ok(RequestDetail { request, active_donation })
}

/// Requester withdraws a request that no donor is working on yet.
pub fn cancel(conn: &mut PgConnection, request_id: Uuid, caller: &AuthUser) -> AppResult<BloodRequest> {
    conn.transaction::<_, AppError, _>(|conn| {
        let request = find_for_update(conn, request_id)?;
        if request.requester_id != caller.id {
            return Err(AppError::new(ErrorCode::RequestNotFound, "blood request not found"));
        }

        let current = request.status()?;
        let cancelled = set_status(conn, request.id, current, RequestStatus::Cancelled)?;

        tracing::info!(request_id = %request.id, from = %current, "blood request cancelled by requester");
        Ok(cancelled)
    })
}

// --- Admin ---

pub fn list_all(
    conn: &mut PgConnection,
    status: Option<RequestStatus>,
    params: &PaginationParams,
) -> AppResult<(Vec<BloodRequest>, i64)> {
    let mut count_query = blood_requests::table.into_boxed();
    let mut items_query = blood_requests::table.into_boxed();
    if let Some(status) = status {
        count_query = count_query.filter(blood_requests::status.eq(status.as_str()));
        items_query = items_query.filter(blood_requests::status.eq(status.as_str()));
    }

    let total: i64 = count_query.count().get_result(conn)?;
    let items = items_query
        .order(blood_requests::created_at.desc())
        .limit(params.limit())
        .offset(params.offset())
        .load::<BloodRequest>(conn)?;

    Ok((items, total))
}

#[derive(Debug, Clone, Copy)]
pub enum Review {
    Approve,
    Reject,
}

/// Admin decision on a pending request. Approval also tells every available
/// compatible donor about it.
pub fn review(
    conn: &mut PgConnection,
    request_id: Uuid,
    admin_id: Uuid,
    decision: Review,
    admin_notes: Option<String>,
) -> AppResult<BloodRequest> {
    let target = match decision {
        Review::Approve => RequestStatus::Approved,
        Review::Reject => RequestStatus::Rejected,
    };

    conn.transaction::<_, AppError, _>(|conn| {
        let request = find_for_update(conn, request_id)?;
        let current = request.status()?;
        current.transition(target)?;

        let request: BloodRequest = diesel::update(
            blood_requests::table
                .filter(blood_requests::id.eq(request.id))
                .filter(blood_requests::status.eq(current.as_str())),
        )
        .set((
            blood_requests::status.eq(target.as_str()),
            blood_requests::admin_notes.eq(admin_notes),
            blood_requests::reviewed_by.eq(Some(admin_id)),
            blood_requests::reviewed_at.eq(Some(Utc::now())),
            blood_requests::updated_at.eq(Utc::now()),
        ))
        .get_result(conn)?;

        let data = Some(entity_data("blood_request", request.id));
        match decision {
            Review::Approve => {
                notification_service::notify(
                    conn,
                    request.requester_id,
                    NotificationKind::RequestApproved,
                    "Blood request approved",
                    &format!("Your request for {} is now visible to compatible donors.", request.patient_name),
                    data.clone(),
                )?;
                let notified = notify_matching_donors(conn, &request)?;
                tracing::info!(request_id = %request.id, admin_id = %admin_id, notified, "blood request approved");
            }
            Review::Reject => {
                let reason = request.admin_notes.as_deref().unwrap_or("no reason given");
                notification_service::notify(
                    conn,
                    request.requester_id,
                    NotificationKind::RequestRejected,
                    "Blood request rejected",
                    &format!("Your request for {} was rejected: {reason}", request.patient_name),
                    data,
                )?;
                tracing::info!(request_id = %request.id, admin_id = %admin_id, "blood request rejected");
            }
        }

        Ok(request)
    })
}

fn notify_matching_donors(conn: &mut PgConnection, request: &BloodRequest) -> AppResult<usize> {
    let blood_type = request.blood_type()?;
    let donor_users: Vec<Uuid> = donors::table
        .inner_join(users::table)
        .filter(donors::blood_type.eq_any(blood_type.donor_labels()))
        .filter(donors::is_available.eq(true))
        .filter(users::status.eq("approved"))
        .select(donors::user_id)
        .load(conn)?;

    let message = format!(
        "{} urgency: {} unit(s) of {} needed at {}, {}",
        request.urgency, request.quantity, request.blood_type, request.hospital_name, request.city
    );
    for user_id in &donor_users {
        notification_service::notify(
            conn,
            *user_id,
            NotificationKind::RequestMatch,
            "A patient needs your blood type",
            &message,
            Some(entity_data("blood_request", request.id)),
        )?;
    }
    Ok(donor_users.len())
}

// --- Donors ---

/// Approved requests the donor's blood can serve, most urgent first, then
/// oldest first.
pub fn matching_for_donor(
    conn: &mut PgConnection,
    donor: &Donor,
    params: &PaginationParams,
) -> AppResult<(Vec<BloodRequest>, i64)> {
    let recipients = donor.blood_type()?.recipient_labels();

    let total: i64 = blood_requests::table
        .filter(blood_requests::status.eq(RequestStatus::Approved.as_str()))
        .filter(blood_requests::blood_type.eq_any(recipients.clone()))
        .count()
        .get_result(conn)?;

    let items = blood_requests::table
        .filter(blood_requests::status.eq(RequestStatus::Approved.as_str()))
        .filter(blood_requests::blood_type.eq_any(recipients))
        .order((sql::<Integer>(URGENCY_RANK), blood_requests::created_at.asc()))
        .limit(params.limit())
        .offset(params.offset())
        .load::<BloodRequest>(conn)?;

    Ok((items, total))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urgency_rank_covers_all_levels() {
        for urgency in ["critical", "high", "medium"] {
            assert!(URGENCY_RANK.contains(&format!("'{urgency}'")));
        }
        assert!(URGENCY_RANK.contains("ELSE 3"));
    }

    #[test]
    fn requester_cannot_cancel_in_progress_request() {
        let err = RequestStatus::InProgress
            .transition(RequestStatus::Cancelled)
            .unwrap_err();
        assert_eq!(err.from, "in_progress");
        assert!(RequestStatus::Approved.transition(RequestStatus::Cancelled).is_ok());
    }
}
