//! Donor side of a blood request: accepting it, reporting progress and
//! backing out. Each operation is one transaction that keeps the donation
//! and its parent request in step.

use chrono::{NaiveDate, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use serde::Serialize;
use uuid::Uuid;

use bloodlink_shared::errors::{AppError, AppResult, ErrorCode};
use bloodlink_shared::types::pagination::PaginationParams;

use crate::domain::{DonationStatus, Lifecycle, RequestStatus};
use crate::models::{BloodRequest, Certificate, Donation, Donor, NewDonation};
use crate::schema::{blood_requests, donations, donors};
use crate::services::notification_service::{self, entity_data, NotificationKind};
use crate::services::{certificate_service, eligibility_service, profile_service, request_service, voluntary_service};

fn find_own_for_update(conn: &mut PgConnection, donor: &Donor, donation_id: Uuid) -> AppResult<Donation> {
    donations::table
        .filter(donations::id.eq(donation_id))
        .filter(donations::donor_id.eq(donor.id))
        .for_update()
        .first::<Donation>(conn)
        .optional()?
        .ok_or_else(|| AppError::new(ErrorCode::DonationNotFound, "donation not found"))
}

pub fn open_donation(conn: &mut PgConnection, donor_id: Uuid) -> AppResult<Option<Donation>> {
    Ok(donations::table
        .filter(donations::donor_id.eq(donor_id))
        .filter(donations::status.eq_any(DonationStatus::open_labels()))
        .first::<Donation>(conn)
        .optional()?)
}

/// Open work a donor already holds. Read under the donor row lock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Commitments {
    pub open_donation: bool,
    pub open_voluntary: bool,
}

impl Commitments {
    pub fn load(conn: &mut PgConnection, donor_id: Uuid) -> AppResult<Self> {
        Ok(Self {
            open_donation: open_donation(conn, donor_id)?.is_some(),
            open_voluntary: voluntary_service::open_record(conn, donor_id)?.is_some(),
        })
    }
}

fn donation_in_progress() -> AppError {
    AppError::new(ErrorCode::ActiveDonationExists, "you already have a donation in progress")
}

/// Donor-side compatibility check against a request.
pub fn ensure_compatible(donor: &Donor, request: &BloodRequest) -> AppResult<()> {
    let donor_type = donor.blood_type()?;
    let recipient_type = request.blood_type()?;
    if !donor_type.is_compatible_with(recipient_type) {
        return Err(AppError::new(
            ErrorCode::IncompatibleBloodType,
            format!("{donor_type} blood cannot be given to a {recipient_type} recipient"),
        ));
    }
    Ok(())
}

// --- Accept ---

#[derive(Debug, Serialize)]
pub struct AcceptedDonation {
    pub donation: Donation,
    pub request: BloodRequest,
}

/// Everything that must hold before a donor may take a request.
fn check_accept(
    donor: &Donor,
    request: &BloodRequest,
    commitments: Commitments,
    today: NaiveDate,
) -> AppResult<()> {
    let current = request.status()?;
    if current != RequestStatus::Approved {
        return Err(AppError::conflict(format!(
            "blood request is {current} and cannot be accepted"
        )));
    }

    ensure_compatible(donor, request)?;
    eligibility_service::ensure_eligible(donor, today)?;

    if commitments.open_donation {
        return Err(donation_in_progress());
    }
    if commitments.open_voluntary {
        return Err(AppError::new(
            ErrorCode::OpenVoluntaryDonationExists,
            "cancel your open voluntary donation before accepting a request",
        ));
    }
    Ok(())
}

/// Claims an approved request for the donor. The conditional
/// `approved -> in_progress` flip guarantees one winner when donors race.
pub fn accept(
    conn: &mut PgConnection,
    donor: &Donor,
    request_id: Uuid,
    today: NaiveDate,
) -> AppResult<AcceptedDonation> {
    conn.transaction::<_, AppError, _>(|conn| {
        let donor = profile_service::lock_donor(conn, donor.id)?;
        let request = request_service::find_for_update(conn, request_id)?;
        check_accept(&donor, &request, Commitments::load(conn, donor.id)?, today)?;

        let request = request_service::set_status(conn, request.id, RequestStatus::Approved, RequestStatus::InProgress)?;

        let donation: Donation = diesel::insert_into(donations::table)
            .values(&NewDonation {
                donor_id: donor.id,
                request_id: request.id,
                status: DonationStatus::Accepted.as_str().to_string(),
                notes: None,
                completed_at: None,
            })
            .get_result(conn)
            .map_err(|e| match e {
                DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => donation_in_progress(),
                other => other.into(),
            })?;

        notification_service::notify(
            conn,
            request.requester_id,
            NotificationKind::RequestAccepted,
            "A donor accepted your request",
            &format!("A {} donor is on board for {}.", donor.blood_type, request.patient_name),
            Some(entity_data("donation", donation.id)),
        )?;

        tracing::info!(
            donation_id = %donation.id,
            request_id = %request.id,
            donor_id = %donor.id,
            "blood request accepted"
        );
        Ok(AcceptedDonation { donation, request })
    })
}

// --- Progress ---

#[derive(Debug, Serialize)]
pub struct DonationUpdate {
    pub donation: Donation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate: Option<Certificate>,
}

/// Moves a donation forward. Reaching `completed` also completes the
/// request, stamps the donor's last donation date and issues the certificate.
pub fn advance(
    conn: &mut PgConnection,
    donor: &Donor,
    donation_id: Uuid,
    next: DonationStatus,
    notes: Option<String>,
    today: NaiveDate,
) -> AppResult<DonationUpdate> {
    if next == DonationStatus::Cancelled {
        return Err(AppError::bad_request("use the cancel endpoint to cancel a donation"));
    }

    conn.transaction::<_, AppError, _>(|conn| {
        let donation = find_own_for_update(conn, donor, donation_id)?;
        let current = donation.status()?;
        current.transition(next)?;

        let now = Utc::now();
        let completed_at = (next == DonationStatus::Completed).then_some(now);
        let donation: Donation = diesel::update(
            donations::table
                .filter(donations::id.eq(donation.id))
                .filter(donations::status.eq(current.as_str())),
        )
        .set((
            donations::status.eq(next.as_str()),
            donations::notes.eq(notes.or(donation.notes.clone())),
            donations::completed_at.eq(completed_at),
            donations::updated_at.eq(now),
        ))
        .get_result::<Donation>(conn)
        .optional()?
        .ok_or_else(|| AppError::conflict(format!("donation is no longer {current}")))?;

        let request = request_service::find_for_update(conn, donation.request_id)?;

        let certificate = if next == DonationStatus::Completed {
            request_service::set_status(conn, request.id, request.status()?, RequestStatus::Completed)?;
            diesel::update(donors::table.find(donor.id))
                .set((
                    donors::last_donation_date.eq(Some(today)),
                    donors::updated_at.eq(now),
                ))
                .execute(conn)?;
            Some(certificate_service::issue(conn, &donation, donor)?)
        } else {
            None
        };

        notification_service::notify(
            conn,
            request.requester_id,
            NotificationKind::DonationStatus,
            "Donation update",
            &status_message(next, &request.patient_name),
            Some(entity_data("donation", donation.id)),
        )?;

        tracing::info!(donation_id = %donation.id, from = %current, to = %next, "donation status updated");
        Ok(DonationUpdate { donation, certificate })
    })
}

fn status_message(status: DonationStatus, patient_name: &str) -> String {
    match status {
        DonationStatus::Accepted => format!("The donor accepted the request for {patient_name}."),
        DonationStatus::OnTheWay => format!("The donor for {patient_name} is on the way."),
        DonationStatus::Reached => format!("The donor for {patient_name} has arrived."),
        DonationStatus::Completed => format!("The donation for {patient_name} is complete."),
        DonationStatus::Cancelled => format!("The donor for {patient_name} cancelled."),
    }
}

// --- Cancel ---

/// Where the parent request goes when its donor backs out. Only an
/// in-progress request reopens; any other state is left alone.
fn request_after_cancel(current: RequestStatus) -> Option<RequestStatus> {
    match current {
        RequestStatus::InProgress => Some(RequestStatus::Approved),
        _ => None,
    }
}

/// Donor backs out. An in-progress request returns to `approved` so another
/// donor can pick it up.
pub fn cancel(
    conn: &mut PgConnection,
    donor: &Donor,
    donation_id: Uuid,
    reason: Option<String>,
) -> AppResult<Donation> {
    conn.transaction::<_, AppError, _>(|conn| {
        let donation = find_own_for_update(conn, donor, donation_id)?;
        let current = donation.status()?;
        current.transition(DonationStatus::Cancelled)?;

        let now = Utc::now();
        let donation: Donation = diesel::update(
            donations::table
                .filter(donations::id.eq(donation.id))
                .filter(donations::status.eq(current.as_str())),
        )
        .set((
            donations::status.eq(DonationStatus::Cancelled.as_str()),
            donations::notes.eq(reason.or(donation.notes.clone())),
            donations::cancelled_at.eq(Some(now)),
            donations::updated_at.eq(now),
        ))
        .get_result::<Donation>(conn)
        .optional()?
        .ok_or_else(|| AppError::conflict(format!("donation is no longer {current}")))?;

        let request = request_service::find_for_update(conn, donation.request_id)?;
        let current_request = request.status()?;
        let request = match request_after_cancel(current_request) {
            Some(reopened) => request_service::set_status(conn, request.id, current_request, reopened)?,
            None => request,
        };

        notification_service::notify(
            conn,
            request.requester_id,
            NotificationKind::DonationCancelled,
            "Donor cancelled",
            &format!(
                "The donor for {} cancelled. The request is open to other donors again.",
                request.patient_name
            ),
            Some(entity_data("blood_request", request.id)),
        )?;

        tracing::info!(donation_id = %donation.id, request_id = %request.id, "donation cancelled");
        Ok(donation)
    })
}

// --- Listing ---

#[derive(Debug, Serialize)]
pub struct DonationWithRequest {
    #[serde(flatten)]
    pub donation: Donation,
    pub request: BloodRequest,
}

pub fn list_for_donor(
    conn: &mut PgConnection,
    donor_id: Uuid,
    params: &PaginationParams,
) -> AppResult<(Vec<DonationWithRequest>, i64)> {
    let total: i64 = donations::table
        .filter(donations::donor_id.eq(donor_id))
        .count()
        .get_result(conn)?;

    let items = donations::table
        .inner_join(blood_requests::table)
        .filter(donations::donor_id.eq(donor_id))
        .order(donations::created_at.desc())
        .limit(params.limit())
        .offset(params.offset())
        .load::<(Donation, BloodRequest)>(conn)?
        .into_iter()
        .map(|(donation, request)| DonationWithRequest { donation, request })
        .collect();

    Ok((items, total))
}

pub fn list_all(
    conn: &mut PgConnection,
    status: Option<DonationStatus>,
    params: &PaginationParams,
) -> AppResult<(Vec<DonationWithRequest>, i64)> {
    let mut count_query = donations::table.into_boxed();
    let mut items_query = donations::table.inner_join(blood_requests::table).into_boxed();
    if let Some(status) = status {
        count_query = count_query.filter(donations::status.eq(status.as_str()));
        items_query = items_query.filter(donations::status.eq(status.as_str()));
    }

    let total: i64 = count_query.count().get_result(conn)?;
    let items = items_query
        .order(donations::created_at.desc())
        .limit(params.limit())
        .offset(params.offset())
        .load::<(Donation, BloodRequest)>(conn)?
        .into_iter()
        .map(|(donation, request)| DonationWithRequest { donation, request })
        .collect();

    Ok((items, total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn donor(blood_type: &str) -> Donor {
        Donor {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            blood_type: blood_type.into(),
            date_of_birth: NaiveDate::from_ymd_opt(1985, 3, 14).unwrap(),
            gender: None,
            weight_kg: 80.0,
            city: Some("Lyon".into()),
            address: None,
            is_available: true,
            last_donation_date: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn request(blood_type: &str) -> BloodRequest {
        BloodRequest {
            id: Uuid::new_v4(),
            requester_id: Uuid::new_v4(),
            requester_type: "seeker".into(),
            patient_name: "Patient".into(),
            blood_type: blood_type.into(),
            quantity: 2,
            urgency: "high".into(),
            hospital_name: "General".into(),
            city: "Lyon".into(),
            contact_phone: "+33100000000".into(),
            required_date: None,
            notes: None,
            is_voluntary: false,
            status: "approved".into(),
            admin_notes: None,
            reviewed_by: None,
            reviewed_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn compatibility_gate() {
        assert!(ensure_compatible(&donor("O-"), &request("AB-")).is_ok());
        assert!(ensure_compatible(&donor("A+"), &request("AB+")).is_ok());

        let err = ensure_compatible(&donor("AB+"), &request("O+")).unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::IncompatibleBloodType);
        assert_eq!(err.to_string(), "AB+ blood cannot be given to a O+ recipient");
    }

    #[test]
    fn progress_messages_mention_patient() {
        for status in DonationStatus::ALL {
            assert!(status_message(*status, "Lina").contains("Lina"));
        }
    }

    #[test]
    fn cancelling_reopens_only_in_progress_requests() {
        assert_eq!(request_after_cancel(RequestStatus::InProgress), Some(RequestStatus::Approved));
        for status in [
            RequestStatus::Pending,
            RequestStatus::Approved,
            RequestStatus::Rejected,
            RequestStatus::Completed,
            RequestStatus::Cancelled,
        ] {
            assert_eq!(request_after_cancel(status), None, "{status} should stay put");
        }
    }

    #[test]
    fn accept_needs_an_approved_request() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let mut pending = request("A+");
        pending.status = "pending".into();
        let err = check_accept(&donor("O+"), &pending, Commitments::default(), today).unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::InvalidStateTransition);

        assert!(check_accept(&donor("O+"), &request("A+"), Commitments::default(), today).is_ok());
    }

    #[test]
    fn accept_is_refused_while_other_work_is_open() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();

        let busy = Commitments { open_donation: true, open_voluntary: false };
        let err = check_accept(&donor("O+"), &request("A+"), busy, today).unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::ActiveDonationExists);

        let offered = Commitments { open_donation: false, open_voluntary: true };
        let err = check_accept(&donor("O+"), &request("A+"), offered, today).unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::OpenVoluntaryDonationExists);
    }

    #[test]
    fn accept_is_refused_inside_the_cooldown() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let mut recent = donor("O+");
        recent.last_donation_date = NaiveDate::from_ymd_opt(2024, 5, 20);
        let err = check_accept(&recent, &request("A+"), Commitments::default(), today).unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::DonorIneligible);
    }
}
