use chrono::NaiveDate;
use diesel::pg::PgConnection;
use serde_json::json;

use bloodlink_shared::errors::{AppError, AppResult, ErrorCode};

use crate::domain::eligibility::{self, DonorFacts, Eligibility, HealthReadings};
use crate::models::{Donor, HealthProfile};
use crate::services::profile_service;

pub fn facts(donor: &Donor) -> DonorFacts {
    DonorFacts {
        date_of_birth: donor.date_of_birth,
        weight_kg: donor.weight_kg,
        last_donation_date: donor.last_donation_date,
    }
}

pub fn readings(profile: &HealthProfile) -> HealthReadings {
    HealthReadings {
        hemoglobin: profile.hemoglobin,
        systolic: profile.systolic_bp,
        diastolic: profile.diastolic_bp,
        has_chronic_disease: profile.has_chronic_disease,
    }
}

/// Full eligibility report, including health-profile advisories.
pub fn report(conn: &mut PgConnection, donor: &Donor, today: NaiveDate) -> AppResult<Eligibility> {
    let result = eligibility::evaluate(&facts(donor), today);
    let profile = profile_service::health_profile(conn, donor.id)?;
    Ok(match profile {
        Some(profile) => result.with_advisories(&readings(&profile)),
        None => result,
    })
}

/// Fails with `DonorIneligible` and the failed gates as details.
pub fn ensure_eligible(donor: &Donor, today: NaiveDate) -> AppResult<Eligibility> {
    let result = eligibility::evaluate(&facts(donor), today);
    if result.eligible {
        return Ok(result);
    }
    Err(AppError::with_details(
        ErrorCode::DonorIneligible,
        format!("donor is not eligible: {}", result.summary()),
        json!({
            "reasons": result.reasons,
            "next_eligible_date": result.next_eligible_date,
            "days_remaining": result.days_remaining,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    fn donor(last_donation_date: Option<NaiveDate>) -> Donor {
        Donor {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            blood_type: "A+".into(),
            date_of_birth: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
            gender: None,
            weight_kg: 68.0,
            city: None,
            address: None,
            is_available: true,
            last_donation_date,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn cooldown_error_carries_next_date() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let err = ensure_eligible(&donor(Some(today - Duration::days(30))), today).unwrap_err();
        match err {
            AppError::Known { code, details: Some(details), .. } => {
                assert_eq!(code, ErrorCode::DonorIneligible);
                assert_eq!(details["days_remaining"], 60);
                assert_eq!(details["next_eligible_date"], "2024-07-31");
                assert_eq!(details["reasons"][0]["reason"], "cooldown");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn first_time_donor_passes() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        assert!(ensure_eligible(&donor(None), today).is_ok());
    }
}
