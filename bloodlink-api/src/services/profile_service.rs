use diesel::pg::PgConnection;
use diesel::prelude::*;
use uuid::Uuid;

use bloodlink_shared::errors::{AppError, AppResult, ErrorCode};

use crate::models::{Donor, DonorChanges, HealthProfile, HealthProfileForm, Hospital, HospitalChanges};
use crate::schema::{donors, health_profiles, hospitals};

// --- Donors ---

pub fn donor_for_user(conn: &mut PgConnection, user_id: Uuid) -> AppResult<Donor> {
    donors::table
        .filter(donors::user_id.eq(user_id))
        .first::<Donor>(conn)
        .optional()?
        .ok_or_else(|| AppError::new(ErrorCode::DonorProfileNotFound, "donor profile not found"))
}

pub fn find_donor(conn: &mut PgConnection, donor_id: Uuid) -> AppResult<Donor> {
    donors::table
        .find(donor_id)
        .first::<Donor>(conn)
        .optional()?
        .ok_or_else(|| AppError::new(ErrorCode::DonorProfileNotFound, "donor profile not found"))
}

/// Row-locks the donor so two commitments by the same donor serialize.
pub fn lock_donor(conn: &mut PgConnection, donor_id: Uuid) -> AppResult<Donor> {
    donors::table
        .find(donor_id)
        .for_update()
        .first::<Donor>(conn)
        .optional()?
        .ok_or_else(|| AppError::new(ErrorCode::DonorProfileNotFound, "donor profile not found"))
}

pub fn update_donor(conn: &mut PgConnection, donor_id: Uuid, changes: &DonorChanges) -> AppResult<Donor> {
    if let Some(weight) = changes.weight_kg {
        validate_weight(weight)?;
    }
    Ok(diesel::update(donors::table.find(donor_id))
        .set(changes)
        .get_result::<Donor>(conn)?)
}

pub fn validate_weight(weight_kg: f64) -> AppResult<()> {
    if !weight_kg.is_finite() || weight_kg <= 0.0 || weight_kg > 400.0 {
        return Err(AppError::new(ErrorCode::ValidationError, "weight_kg must be between 0 and 400"));
    }
    Ok(())
}

// --- Hospitals ---

pub fn hospital_for_user(conn: &mut PgConnection, user_id: Uuid) -> AppResult<Hospital> {
    hospitals::table
        .filter(hospitals::user_id.eq(user_id))
        .first::<Hospital>(conn)
        .optional()?
        .ok_or_else(|| AppError::new(ErrorCode::HospitalProfileNotFound, "hospital profile not found"))
}

pub fn find_hospital(conn: &mut PgConnection, hospital_id: Uuid) -> AppResult<Hospital> {
    hospitals::table
        .find(hospital_id)
        .first::<Hospital>(conn)
        .optional()?
        .ok_or_else(|| AppError::new(ErrorCode::HospitalProfileNotFound, "hospital not found"))
}

pub fn update_hospital(
    conn: &mut PgConnection,
    hospital_id: Uuid,
    changes: &HospitalChanges,
) -> AppResult<Hospital> {
    Ok(diesel::update(hospitals::table.find(hospital_id))
        .set(changes)
        .get_result::<Hospital>(conn)?)
}

// --- Health profiles ---

pub fn health_profile(conn: &mut PgConnection, donor_id: Uuid) -> AppResult<Option<HealthProfile>> {
    Ok(health_profiles::table
        .filter(health_profiles::donor_id.eq(donor_id))
        .first::<HealthProfile>(conn)
        .optional()?)
}

/// Replaces the donor's health profile, creating it on first save.
pub fn save_health_profile(conn: &mut PgConnection, form: &HealthProfileForm) -> AppResult<HealthProfile> {
    validate_readings(form)?;
    Ok(diesel::insert_into(health_profiles::table)
        .values(form)
        .on_conflict(health_profiles::donor_id)
        .do_update()
        .set(form)
        .get_result::<HealthProfile>(conn)?)
}

/// Rejects readings that cannot be physiological; plausible but worrying
/// values are reported as eligibility advisories instead.
fn validate_readings(form: &HealthProfileForm) -> AppResult<()> {
    let checks = [
        ("hemoglobin", form.hemoglobin.map_or(true, |v| (0.0..=25.0).contains(&v))),
        ("systolic_bp", form.systolic_bp.map_or(true, |v| (40..=300).contains(&v))),
        ("diastolic_bp", form.diastolic_bp.map_or(true, |v| (20..=200).contains(&v))),
        ("pulse", form.pulse.map_or(true, |v| (20..=250).contains(&v))),
    ];
    match checks.iter().find(|(_, ok)| !ok) {
        Some((field, _)) => Err(AppError::new(
            ErrorCode::ValidationError,
            format!("{field} is out of range"),
        )),
        None => Ok(()),
    }
}
