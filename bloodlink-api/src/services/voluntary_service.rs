//! Walk-in donations offered by a donor: admin review, hospital scheduling
//! and completion, which records a synthetic request, donation and
//! certificate in one go.

use chrono::{DateTime, NaiveDate, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use serde::Serialize;
use uuid::Uuid;

use bloodlink_shared::errors::{AppError, AppResult, ErrorCode};
use bloodlink_shared::types::pagination::PaginationParams;

use crate::domain::{DonationStatus, Lifecycle, RequestStatus, Urgency, VoluntaryStatus};
use crate::models::{
    BloodRequest, Certificate, Donation, Donor, Hospital, NewBloodRequest, NewDonation, NewVoluntaryDonation,
    User, VoluntaryDonation,
};
use crate::schema::{blood_requests, donations, donors, users, voluntary_donations};
use crate::services::donation_service::Commitments;
use crate::services::notification_service::{self, entity_data, NotificationKind};
use crate::services::{certificate_service, eligibility_service, profile_service};

fn not_found() -> AppError {
    AppError::new(ErrorCode::VoluntaryDonationNotFound, "voluntary donation not found")
}

fn find_for_update(conn: &mut PgConnection, id: Uuid) -> AppResult<VoluntaryDonation> {
    voluntary_donations::table
        .find(id)
        .for_update()
        .first::<VoluntaryDonation>(conn)
        .optional()?
        .ok_or_else(not_found)
}

pub(crate) fn open_record(conn: &mut PgConnection, donor_id: Uuid) -> AppResult<Option<VoluntaryDonation>> {
    Ok(voluntary_donations::table
        .filter(voluntary_donations::donor_id.eq(donor_id))
        .filter(voluntary_donations::status.eq_any(VoluntaryStatus::open_labels()))
        .first::<VoluntaryDonation>(conn)
        .optional()?)
}

fn open_exists() -> AppError {
    AppError::new(
        ErrorCode::OpenVoluntaryDonationExists,
        "you already have an open voluntary donation",
    )
}

/// Stores the new status if the row still holds `from`.
fn set_status(
    conn: &mut PgConnection,
    record: &VoluntaryDonation,
    from: VoluntaryStatus,
    to: VoluntaryStatus,
) -> AppResult<VoluntaryDonation> {
    from.transition(to)?;
    diesel::update(
        voluntary_donations::table
            .filter(voluntary_donations::id.eq(record.id))
            .filter(voluntary_donations::status.eq(from.as_str())),
    )
    .set((
        voluntary_donations::status.eq(to.as_str()),
        voluntary_donations::updated_at.eq(Utc::now()),
    ))
    .get_result::<VoluntaryDonation>(conn)
    .optional()?
    .ok_or_else(|| AppError::conflict(format!("voluntary donation is no longer {from}")))
}

fn donor_user_id(conn: &mut PgConnection, donor_id: Uuid) -> AppResult<Uuid> {
    Ok(donors::table.find(donor_id).select(donors::user_id).first(conn)?)
}

// --- Donor ---

#[derive(Debug)]
pub struct Submission {
    pub hospital_id: Option<Uuid>,
    pub available_date: NaiveDate,
    pub preferred_time: Option<String>,
    pub notes: Option<String>,
}

/// A donor may hold one open offer, must be eligible today and must not be
/// in the middle of a request donation.
fn check_submission(donor: &Donor, commitments: Commitments, today: NaiveDate) -> AppResult<()> {
    if commitments.open_voluntary {
        return Err(open_exists());
    }
    eligibility_service::ensure_eligible(donor, today)?;
    if commitments.open_donation {
        return Err(AppError::new(
            ErrorCode::ActiveDonationExists,
            "finish your current donation before offering another",
        ));
    }
    Ok(())
}

pub fn submit(
    conn: &mut PgConnection,
    donor: &Donor,
    submission: Submission,
    today: NaiveDate,
) -> AppResult<VoluntaryDonation> {
    if submission.available_date < today {
        return Err(AppError::new(ErrorCode::ValidationError, "available_date cannot be in the past"));
    }

    conn.transaction::<_, AppError, _>(|conn| {
        let donor = profile_service::lock_donor(conn, donor.id)?;
        check_submission(&donor, Commitments::load(conn, donor.id)?, today)?;
        if let Some(hospital_id) = submission.hospital_id {
            profile_service::find_hospital(conn, hospital_id)?;
        }

        let record = diesel::insert_into(voluntary_donations::table)
            .values(&NewVoluntaryDonation {
                donor_id: donor.id,
                hospital_id: submission.hospital_id,
                available_date: submission.available_date,
                preferred_time: submission.preferred_time,
                notes: submission.notes,
            })
            .get_result::<VoluntaryDonation>(conn)
            .map_err(|e| match e {
                // lost a race against a concurrent submission
                DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => open_exists(),
                other => other.into(),
            })?;

        notification_service::notify_admins(
            conn,
            NotificationKind::VoluntarySubmitted,
            "Voluntary donation offered",
            &format!(
                "A {} donor is available on {} and awaits review.",
                donor.blood_type, record.available_date
            ),
            Some(entity_data("voluntary_donation", record.id)),
        )?;

        tracing::info!(voluntary_id = %record.id, donor_id = %donor.id, "voluntary donation submitted");
        Ok(record)
    })
}

pub fn list_for_donor(conn: &mut PgConnection, donor_id: Uuid) -> AppResult<Vec<VoluntaryDonation>> {
    Ok(voluntary_donations::table
        .filter(voluntary_donations::donor_id.eq(donor_id))
        .order(voluntary_donations::created_at.desc())
        .load::<VoluntaryDonation>(conn)?)
}

pub fn cancel_by_donor(
    conn: &mut PgConnection,
    donor: &Donor,
    id: Uuid,
    reason: Option<String>,
) -> AppResult<VoluntaryDonation> {
    conn.transaction::<_, AppError, _>(|conn| {
        let record = find_for_update(conn, id)?;
        if record.donor_id != donor.id {
            return Err(not_found());
        }
        let record = cancel(conn, &record, reason)?;

        if let Some(hospital_id) = record.hospital_id {
            let hospital = profile_service::find_hospital(conn, hospital_id)?;
            notification_service::notify(
                conn,
                hospital.user_id,
                NotificationKind::VoluntaryCancelled,
                "Voluntary donation cancelled",
                &format!("The donor cancelled the donation planned for {}.", record.available_date),
                Some(entity_data("voluntary_donation", record.id)),
            )?;
        }
        Ok(record)
    })
}

// --- Admin ---

#[derive(Debug, Serialize)]
pub struct VoluntaryListing {
    #[serde(flatten)]
    pub record: VoluntaryDonation,
    pub donor_name: String,
    pub blood_type: String,
}

pub fn list_all(
    conn: &mut PgConnection,
    status: Option<VoluntaryStatus>,
    params: &PaginationParams,
) -> AppResult<(Vec<VoluntaryListing>, i64)> {
    let mut count_query = voluntary_donations::table.into_boxed();
    let mut items_query = voluntary_donations::table
        .inner_join(donors::table.inner_join(users::table))
        .select((voluntary_donations::all_columns, users::full_name, donors::blood_type))
        .into_boxed();
    if let Some(status) = status {
        count_query = count_query.filter(voluntary_donations::status.eq(status.as_str()));
        items_query = items_query.filter(voluntary_donations::status.eq(status.as_str()));
    }

    let total: i64 = count_query.count().get_result(conn)?;
    let items = items_query
        .order(voluntary_donations::created_at.desc())
        .limit(params.limit())
        .offset(params.offset())
        .load::<(VoluntaryDonation, String, String)>(conn)?
        .into_iter()
        .map(|(record, donor_name, blood_type)| VoluntaryListing { record, donor_name, blood_type })
        .collect();

    Ok((items, total))
}

#[derive(Debug)]
pub enum Review {
    Approve { hospital_id: Option<Uuid> },
    Reject,
}

/// Admin decision on a pending offer. Approval needs a hospital: the one
/// given here, or else the donor's preferred one.
pub fn review(
    conn: &mut PgConnection,
    id: Uuid,
    admin_id: Uuid,
    decision: Review,
    admin_notes: Option<String>,
) -> AppResult<VoluntaryDonation> {
    conn.transaction::<_, AppError, _>(|conn| {
        let record = find_for_update(conn, id)?;
        let current = record.status()?;

        let (target, hospital) = match decision {
            Review::Approve { hospital_id } => {
                let hospital_id = hospital_id.or(record.hospital_id).ok_or_else(|| {
                    AppError::new(
                        ErrorCode::ValidationError,
                        "a hospital must be assigned to approve this donation",
                    )
                })?;
                (VoluntaryStatus::Approved, Some(profile_service::find_hospital(conn, hospital_id)?))
            }
            Review::Reject => (VoluntaryStatus::Rejected, None),
        };
        current.transition(target)?;

        let record: VoluntaryDonation = diesel::update(
            voluntary_donations::table
                .filter(voluntary_donations::id.eq(record.id))
                .filter(voluntary_donations::status.eq(current.as_str())),
        )
        .set((
            voluntary_donations::status.eq(target.as_str()),
            voluntary_donations::hospital_id.eq(hospital.as_ref().map(|h| h.id).or(record.hospital_id)),
            voluntary_donations::admin_notes.eq(admin_notes),
            voluntary_donations::reviewed_by.eq(Some(admin_id)),
            voluntary_donations::updated_at.eq(Utc::now()),
        ))
        .get_result(conn)?;

        let donor_user = donor_user_id(conn, record.donor_id)?;
        let data = Some(entity_data("voluntary_donation", record.id));
        match hospital {
            Some(hospital) => {
                notification_service::notify(
                    conn,
                    donor_user,
                    NotificationKind::VoluntaryApproved,
                    "Voluntary donation approved",
                    &format!("{} will contact you to schedule your donation.", hospital.hospital_name),
                    data.clone(),
                )?;
                notification_service::notify(
                    conn,
                    hospital.user_id,
                    NotificationKind::VoluntaryAssigned,
                    "New voluntary donor assigned",
                    &format!("A donor available on {} is waiting to be scheduled.", record.available_date),
                    data,
                )?;
            }
            None => {
                let reason = record.admin_notes.as_deref().unwrap_or("no reason given");
                notification_service::notify(
                    conn,
                    donor_user,
                    NotificationKind::VoluntaryRejected,
                    "Voluntary donation not approved",
                    &format!("Your voluntary donation offer was not approved: {reason}"),
                    data,
                )?;
            }
        }

        tracing::info!(voluntary_id = %record.id, admin_id = %admin_id, status = %target, "voluntary donation reviewed");
        Ok(record)
    })
}

// --- Hospital ---

pub fn list_for_hospital(
    conn: &mut PgConnection,
    hospital_id: Uuid,
    status: Option<VoluntaryStatus>,
) -> AppResult<Vec<VoluntaryListing>> {
    let mut query = voluntary_donations::table
        .inner_join(donors::table.inner_join(users::table))
        .filter(voluntary_donations::hospital_id.eq(hospital_id))
        .select((voluntary_donations::all_columns, users::full_name, donors::blood_type))
        .into_boxed();
    if let Some(status) = status {
        query = query.filter(voluntary_donations::status.eq(status.as_str()));
    }

    Ok(query
        .order(voluntary_donations::available_date.asc())
        .load::<(VoluntaryDonation, String, String)>(conn)?
        .into_iter()
        .map(|(record, donor_name, blood_type)| VoluntaryListing { record, donor_name, blood_type })
        .collect())
}

fn find_assigned_for_update(conn: &mut PgConnection, hospital: &Hospital, id: Uuid) -> AppResult<VoluntaryDonation> {
    let record = find_for_update(conn, id)?;
    if record.hospital_id != Some(hospital.id) {
        return Err(not_found());
    }
    Ok(record)
}

pub fn schedule(
    conn: &mut PgConnection,
    hospital: &Hospital,
    id: Uuid,
    scheduled_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> AppResult<VoluntaryDonation> {
    if scheduled_at <= now {
        return Err(AppError::new(ErrorCode::ValidationError, "scheduled_at must be in the future"));
    }

    conn.transaction::<_, AppError, _>(|conn| {
        let record = find_assigned_for_update(conn, hospital, id)?;
        let current = record.status()?;
        current.transition(VoluntaryStatus::Scheduled)?;

        let record: VoluntaryDonation = diesel::update(
            voluntary_donations::table
                .filter(voluntary_donations::id.eq(record.id))
                .filter(voluntary_donations::status.eq(current.as_str())),
        )
        .set((
            voluntary_donations::status.eq(VoluntaryStatus::Scheduled.as_str()),
            voluntary_donations::scheduled_at.eq(Some(scheduled_at)),
            voluntary_donations::updated_at.eq(now),
        ))
        .get_result(conn)?;

        let donor_user = donor_user_id(conn, record.donor_id)?;
        notification_service::notify(
            conn,
            donor_user,
            NotificationKind::VoluntaryScheduled,
            "Donation appointment scheduled",
            &format!(
                "{} scheduled your donation for {}.",
                hospital.hospital_name,
                scheduled_at.format("%Y-%m-%d %H:%M UTC")
            ),
            Some(entity_data("voluntary_donation", record.id)),
        )?;

        tracing::info!(voluntary_id = %record.id, hospital_id = %hospital.id, %scheduled_at, "voluntary donation scheduled");
        Ok(record)
    })
}

/// Hospital confirms the donor showed up. No status change; completion
/// requires it.
pub fn confirm(conn: &mut PgConnection, hospital: &Hospital, id: Uuid) -> AppResult<VoluntaryDonation> {
    conn.transaction::<_, AppError, _>(|conn| {
        let record = find_assigned_for_update(conn, hospital, id)?;
        let current = record.status()?;
        if current != VoluntaryStatus::Scheduled {
            return Err(AppError::conflict(format!(
                "voluntary donation is {current}, only scheduled donations can be confirmed"
            )));
        }
        if record.confirmed_at.is_some() {
            return Err(AppError::conflict("voluntary donation is already confirmed"));
        }

        let record: VoluntaryDonation = diesel::update(voluntary_donations::table.find(record.id))
            .set((
                voluntary_donations::confirmed_at.eq(Some(Utc::now())),
                voluntary_donations::updated_at.eq(Utc::now()),
            ))
            .get_result(conn)?;

        let donor_user = donor_user_id(conn, record.donor_id)?;
        notification_service::notify(
            conn,
            donor_user,
            NotificationKind::VoluntaryConfirmed,
            "Donation confirmed",
            &format!("{} confirmed your donation appointment.", hospital.hospital_name),
            Some(entity_data("voluntary_donation", record.id)),
        )?;
        Ok(record)
    })
}

#[derive(Debug, Serialize)]
pub struct CompletedVoluntary {
    pub voluntary_donation: VoluntaryDonation,
    pub request: BloodRequest,
    pub donation: Donation,
    pub certificate: Certificate,
}

/// A scheduled, confirmed offer whose donor is still eligible today. The
/// donor may have given blood elsewhere since the offer was approved.
fn check_completion(record: &VoluntaryDonation, donor: &Donor, today: NaiveDate) -> AppResult<()> {
    record.status()?.transition(VoluntaryStatus::Completed)?;
    if record.confirmed_at.is_none() {
        return Err(AppError::conflict("voluntary donation must be confirmed before completion"));
    }
    eligibility_service::ensure_eligible(donor, today)?;
    Ok(())
}

/// Records a confirmed walk-in donation: a completed request owned by the
/// hospital, a completed donation, the certificate, and the donor's new
/// last donation date.
pub fn complete(
    conn: &mut PgConnection,
    hospital: &Hospital,
    id: Uuid,
    today: NaiveDate,
) -> AppResult<CompletedVoluntary> {
    conn.transaction::<_, AppError, _>(|conn| {
        let record = find_assigned_for_update(conn, hospital, id)?;
        let current = record.status()?;
        let donor = profile_service::lock_donor(conn, record.donor_id)?;
        check_completion(&record, &donor, today)?;
        let hospital_user: User = users::table.find(hospital.user_id).first(conn)?;
        let now = Utc::now();

        let request: BloodRequest = diesel::insert_into(blood_requests::table)
            .values(&NewBloodRequest {
                requester_id: hospital.user_id,
                requester_type: "hospital".to_string(),
                patient_name: "Voluntary donation".to_string(),
                blood_type: donor.blood_type.clone(),
                quantity: 1,
                urgency: Urgency::Low.as_str().to_string(),
                hospital_name: hospital.hospital_name.clone(),
                city: hospital.city.clone().or_else(|| donor.city.clone()).unwrap_or_default(),
                contact_phone: hospital_user.phone.unwrap_or_default(),
                required_date: Some(today),
                notes: record.notes.clone(),
                is_voluntary: true,
                status: RequestStatus::Completed.as_str().to_string(),
            })
            .get_result(conn)?;

        let donation: Donation = diesel::insert_into(donations::table)
            .values(&NewDonation {
                donor_id: donor.id,
                request_id: request.id,
                status: DonationStatus::Completed.as_str().to_string(),
                notes: record.notes.clone(),
                completed_at: Some(now),
            })
            .get_result(conn)?;

        let certificate = certificate_service::issue(conn, &donation, &donor)?;

        let voluntary_donation: VoluntaryDonation = diesel::update(
            voluntary_donations::table
                .filter(voluntary_donations::id.eq(record.id))
                .filter(voluntary_donations::status.eq(current.as_str())),
        )
        .set((
            voluntary_donations::status.eq(VoluntaryStatus::Completed.as_str()),
            voluntary_donations::donation_id.eq(Some(donation.id)),
            voluntary_donations::updated_at.eq(now),
        ))
        .get_result(conn)?;

        diesel::update(donors::table.find(donor.id))
            .set((
                donors::last_donation_date.eq(Some(today)),
                donors::updated_at.eq(now),
            ))
            .execute(conn)?;

        notification_service::notify(
            conn,
            donor.user_id,
            NotificationKind::VoluntaryCompleted,
            "Thank you for donating",
            &format!("Your donation at {} has been recorded.", hospital.hospital_name),
            Some(entity_data("voluntary_donation", voluntary_donation.id)),
        )?;

        tracing::info!(
            voluntary_id = %voluntary_donation.id,
            donation_id = %donation.id,
            hospital_id = %hospital.id,
            "voluntary donation completed"
        );
        Ok(CompletedVoluntary { voluntary_donation, request, donation, certificate })
    })
}

pub fn cancel_by_hospital(
    conn: &mut PgConnection,
    hospital: &Hospital,
    id: Uuid,
    reason: Option<String>,
) -> AppResult<VoluntaryDonation> {
    conn.transaction::<_, AppError, _>(|conn| {
        let record = find_assigned_for_update(conn, hospital, id)?;
        let record = cancel(conn, &record, reason)?;

        let donor_user = donor_user_id(conn, record.donor_id)?;
        notification_service::notify(
            conn,
            donor_user,
            NotificationKind::VoluntaryCancelled,
            "Voluntary donation cancelled",
            &format!("{} cancelled your planned donation.", hospital.hospital_name),
            Some(entity_data("voluntary_donation", record.id)),
        )?;
        Ok(record)
    })
}

fn cancel(conn: &mut PgConnection, record: &VoluntaryDonation, reason: Option<String>) -> AppResult<VoluntaryDonation> {
    let current = record.status()?;
    let cancelled = set_status(conn, record, current, VoluntaryStatus::Cancelled)?;
    let cancelled = match reason {
        Some(reason) => diesel::update(voluntary_donations::table.find(cancelled.id))
            .set(voluntary_donations::notes.eq(Some(reason)))
            .get_result(conn)?,
        None => cancelled,
    };
    tracing::info!(voluntary_id = %record.id, from = %current, "voluntary donation cancelled");
    Ok(cancelled)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn donor(last_donation_date: Option<NaiveDate>) -> Donor {
        Donor {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            blood_type: "B+".into(),
            date_of_birth: NaiveDate::from_ymd_opt(1992, 8, 30).unwrap(),
            gender: None,
            weight_kg: 72.0,
            city: None,
            address: None,
            is_available: true,
            last_donation_date,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    #[test]
    fn open_offer_blocks_a_second_submission() {
        let open = Commitments { open_donation: false, open_voluntary: true };
        let err = check_submission(&donor(None), open, today()).unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::OpenVoluntaryDonationExists);
    }

    #[test]
    fn donation_in_progress_blocks_submission() {
        let busy = Commitments { open_donation: true, open_voluntary: false };
        let err = check_submission(&donor(None), busy, today()).unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::ActiveDonationExists);
    }

    #[test]
    fn submission_respects_the_cooldown() {
        let recent = donor(NaiveDate::from_ymd_opt(2024, 4, 1));
        let err = check_submission(&recent, Commitments::default(), today()).unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::DonorIneligible);

        let rested = donor(NaiveDate::from_ymd_opt(2024, 2, 1));
        assert!(check_submission(&rested, Commitments::default(), today()).is_ok());
        assert!(check_submission(&donor(None), Commitments::default(), today()).is_ok());
    }

    fn record(status: &str, confirmed: bool, donor: &Donor) -> VoluntaryDonation {
        VoluntaryDonation {
            id: Uuid::new_v4(),
            donor_id: donor.id,
            hospital_id: Some(Uuid::new_v4()),
            available_date: today(),
            preferred_time: None,
            notes: None,
            status: status.into(),
            admin_notes: None,
            reviewed_by: None,
            scheduled_at: Some(Utc::now()),
            confirmed_at: confirmed.then(Utc::now),
            donation_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn completion_requires_a_confirmed_schedule() {
        let donor = donor(None);
        let err = check_completion(&record("approved", false, &donor), &donor, today()).unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::InvalidStateTransition);

        let err = check_completion(&record("scheduled", false, &donor), &donor, today()).unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::InvalidStateTransition);

        assert!(check_completion(&record("scheduled", true, &donor), &donor, today()).is_ok());
    }

    #[test]
    fn completion_is_refused_after_a_recent_donation() {
        // gave blood on a request a few days after the offer was scheduled
        let donor = donor(NaiveDate::from_ymd_opt(2024, 5, 28));
        let err = check_completion(&record("scheduled", true, &donor), &donor, today()).unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::DonorIneligible);
    }

    #[test]
    fn duplicate_error_code() {
        assert_eq!(open_exists().error_code(), ErrorCode::OpenVoluntaryDonationExists);
        assert_eq!(not_found().error_code(), ErrorCode::VoluntaryDonationNotFound);
    }
}
