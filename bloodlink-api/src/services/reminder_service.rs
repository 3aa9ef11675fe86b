//! Time-based reminders sent by the `bloodlink-reminders` job.
//!
//! Every reminder carries the entity it is about in its payload, and a
//! reminder of one kind is sent at most once per entity, user and day, so the
//! job can run as often as cron likes.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use bloodlink_shared::errors::AppResult;

use crate::domain::eligibility::COOLDOWN_DAYS;
use crate::domain::{Lifecycle, RequestStatus, VoluntaryStatus};
use crate::models::{BloodRequest, Donor, Hospital, VoluntaryDonation};
use crate::schema::{blood_requests, donors, hospitals, users, voluntary_donations};
use crate::services::notification_service::{self, entity_data, NotificationKind};

pub const APPOINTMENT_WINDOW_HOURS: i64 = 24;
pub const STALE_REQUEST_HOURS: i64 = 24;

#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub struct ReminderReport {
    pub eligibility: usize,
    pub appointments: usize,
    pub pending_requests: usize,
}

impl ReminderReport {
    pub fn total(&self) -> usize {
        self.eligibility + self.appointments + self.pending_requests
    }
}

pub fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|midnight| Utc.from_utc_datetime(&midnight))
        .unwrap_or(now)
}

/// Last donation date that makes a donor eligible again on `today`.
pub fn cooldown_ended_for(today: NaiveDate) -> NaiveDate {
    today - Duration::days(COOLDOWN_DAYS)
}

/// Sends `kind` to `user_id` unless it already went out today for `entity_id`.
fn remind_once(
    conn: &mut PgConnection,
    user_id: Uuid,
    kind: NotificationKind,
    entity: (&str, Uuid),
    title: &str,
    message: &str,
    since: DateTime<Utc>,
) -> AppResult<bool> {
    let (entity_type, entity_id) = entity;
    if notification_service::sent_since(conn, user_id, kind, entity_id, since)? {
        return Ok(false);
    }
    notification_service::notify(conn, user_id, kind, title, message, Some(entity_data(entity_type, entity_id)))?;
    Ok(true)
}

pub fn eligibility_restored(conn: &mut PgConnection, now: DateTime<Utc>) -> AppResult<usize> {
    let since = start_of_day(now);
    let donors_due: Vec<Donor> = donors::table
        .inner_join(users::table)
        .filter(donors::last_donation_date.eq(cooldown_ended_for(now.date_naive())))
        .filter(users::status.eq("approved"))
        .select(donors::all_columns)
        .load(conn)?;

    let mut sent = 0;
    for donor in &donors_due {
        let delivered = remind_once(
            conn,
            donor.user_id,
            NotificationKind::EligibilityReminder,
            ("donor", donor.id),
            "You can donate again",
            "Your recovery period is over. Thank you for considering another donation.",
            since,
        )?;
        sent += usize::from(delivered);
    }
    Ok(sent)
}

pub fn upcoming_appointments(conn: &mut PgConnection, now: DateTime<Utc>) -> AppResult<usize> {
    let since = start_of_day(now);
    let window_end = now + Duration::hours(APPOINTMENT_WINDOW_HOURS);
    let upcoming: Vec<(VoluntaryDonation, Donor, Hospital)> = voluntary_donations::table
        .inner_join(donors::table)
        .inner_join(hospitals::table)
        .filter(voluntary_donations::status.eq(VoluntaryStatus::Scheduled.as_str()))
        .filter(voluntary_donations::scheduled_at.ge(now))
        .filter(voluntary_donations::scheduled_at.le(window_end))
        .load(conn)?;

    let mut sent = 0;
    for (record, donor, hospital) in &upcoming {
        let Some(scheduled_at) = record.scheduled_at else { continue };
        let when = scheduled_at.format("%Y-%m-%d %H:%M UTC");

        sent += usize::from(remind_once(
            conn,
            donor.user_id,
            NotificationKind::AppointmentReminder,
            ("voluntary_donation", record.id),
            "Upcoming donation appointment",
            &format!("Reminder: your donation at {} is scheduled for {when}.", hospital.hospital_name),
            since,
        )?);
        sent += usize::from(remind_once(
            conn,
            hospital.user_id,
            NotificationKind::AppointmentReminder,
            ("voluntary_donation", record.id),
            "Upcoming donor appointment",
            &format!("A {} donor is expected at {when}.", donor.blood_type),
            since,
        )?);
    }
    Ok(sent)
}

pub fn stale_requests(conn: &mut PgConnection, now: DateTime<Utc>) -> AppResult<usize> {
    let since = start_of_day(now);
    let cutoff = now - Duration::hours(STALE_REQUEST_HOURS);
    let pending: Vec<BloodRequest> = blood_requests::table
        .filter(blood_requests::status.eq(RequestStatus::Pending.as_str()))
        .filter(blood_requests::created_at.lt(cutoff))
        .order(blood_requests::created_at.asc())
        .load(conn)?;
    if pending.is_empty() {
        return Ok(0);
    }

    let admins = notification_service::admin_ids(conn)?;
    let mut sent = 0;
    for request in &pending {
        let waiting = (now - request.created_at).num_hours();
        let message = format!(
            "The {} request for {} ({} urgency) has been waiting for review for {waiting} hours.",
            request.blood_type, request.patient_name, request.urgency
        );
        for admin_id in &admins {
            sent += usize::from(remind_once(
                conn,
                *admin_id,
                NotificationKind::PendingRequestReminder,
                ("blood_request", request.id),
                "Blood request awaiting review",
                &message,
                since,
            )?);
        }
    }
    Ok(sent)
}

pub fn run(conn: &mut PgConnection, now: DateTime<Utc>) -> AppResult<ReminderReport> {
    let report = ReminderReport {
        eligibility: eligibility_restored(conn, now)?,
        appointments: upcoming_appointments(conn, now)?,
        pending_requests: stale_requests(conn, now)?,
    };
    tracing::info!(
        eligibility = report.eligibility,
        appointments = report.appointments,
        pending_requests = report.pending_requests,
        "reminders sent"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn day_starts_at_utc_midnight() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 17, 45, 12).unwrap();
        assert_eq!(start_of_day(now), Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn cooldown_window_is_ninety_days_back() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        assert_eq!(cooldown_ended_for(today), NaiveDate::from_ymd_opt(2024, 3, 3).unwrap());
        assert_eq!(
            crate::domain::eligibility::next_eligible_date(cooldown_ended_for(today)),
            today
        );
    }

    #[test]
    fn report_total() {
        let report = ReminderReport { eligibility: 2, appointments: 3, pending_requests: 1 };
        assert_eq!(report.total(), 6);
        assert_eq!(ReminderReport::default().total(), 0);
    }
}
