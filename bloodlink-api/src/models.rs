use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use bloodlink_shared::errors::{AppError, AppResult};

use crate::domain::{BloodType, DonationStatus, RequestStatus, VoluntaryStatus};
use crate::schema::{
    blood_requests, certificates, donations, donors, health_profiles, hospitals, notifications, users,
    voluntary_donations,
};

/// Status and blood-type columns are stored as text; a value outside the
/// enum means the row was written by something other than this service.
fn parse_column<T: std::str::FromStr<Err = String>>(value: &str) -> AppResult<T> {
    value.parse::<T>().map_err(AppError::internal)
}

// --- Users ---

#[derive(Debug, Clone, Queryable, Identifiable, Serialize)]
#[diesel(table_name = users)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub role: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub role: String,
    pub status: String,
}

// --- Donors ---

#[derive(Debug, Clone, Queryable, Identifiable, Serialize)]
#[diesel(table_name = donors)]
pub struct Donor {
    pub id: Uuid,
    pub user_id: Uuid,
    pub blood_type: String,
    pub date_of_birth: NaiveDate,
    pub gender: Option<String>,
    pub weight_kg: f64,
    pub city: Option<String>,
    pub address: Option<String>,
    pub is_available: bool,
    pub last_donation_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Donor {
    pub fn blood_type(&self) -> AppResult<BloodType> {
        parse_column(&self.blood_type)
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = donors)]
pub struct NewDonor {
    pub user_id: Uuid,
    pub blood_type: String,
    pub date_of_birth: NaiveDate,
    pub gender: Option<String>,
    pub weight_kg: f64,
    pub city: Option<String>,
    pub address: Option<String>,
}

/// Partial update; `None` fields are left untouched.
#[derive(Debug, AsChangeset)]
#[diesel(table_name = donors)]
pub struct DonorChanges {
    pub gender: Option<String>,
    pub weight_kg: Option<f64>,
    pub city: Option<String>,
    pub address: Option<String>,
    pub is_available: Option<bool>,
    pub updated_at: DateTime<Utc>,
}

// --- Hospitals ---

#[derive(Debug, Clone, Queryable, Identifiable, Serialize)]
#[diesel(table_name = hospitals)]
pub struct Hospital {
    pub id: Uuid,
    pub user_id: Uuid,
    pub hospital_name: String,
    pub license_number: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = hospitals)]
pub struct NewHospital {
    pub user_id: Uuid,
    pub hospital_name: String,
    pub license_number: String,
    pub address: Option<String>,
    pub city: Option<String>,
}

#[derive(Debug, AsChangeset)]
#[diesel(table_name = hospitals)]
pub struct HospitalChanges {
    pub hospital_name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub updated_at: DateTime<Utc>,
}

// --- Health profiles ---

#[derive(Debug, Clone, Queryable, Identifiable, Serialize)]
#[diesel(table_name = health_profiles)]
pub struct HealthProfile {
    pub id: Uuid,
    pub donor_id: Uuid,
    pub hemoglobin: Option<f64>,
    pub systolic_bp: Option<i32>,
    pub diastolic_bp: Option<i32>,
    pub pulse: Option<i32>,
    pub has_chronic_disease: bool,
    pub chronic_disease_details: Option<String>,
    pub medications: Option<String>,
    pub recent_illness: Option<String>,
    pub last_checkup_date: Option<NaiveDate>,
    pub updated_at: DateTime<Utc>,
}

/// Full replacement of a donor's health profile, used for the upsert.
#[derive(Debug, Insertable, AsChangeset)]
#[diesel(table_name = health_profiles, treat_none_as_null = true)]
pub struct HealthProfileForm {
    pub donor_id: Uuid,
    pub hemoglobin: Option<f64>,
    pub systolic_bp: Option<i32>,
    pub diastolic_bp: Option<i32>,
    pub pulse: Option<i32>,
    pub has_chronic_disease: bool,
    pub chronic_disease_details: Option<String>,
    pub medications: Option<String>,
    pub recent_illness: Option<String>,
    pub last_checkup_date: Option<NaiveDate>,
    pub updated_at: DateTime<Utc>,
}

// --- Blood requests ---

#[derive(Debug, Clone, Queryable, Identifiable, Serialize)]
#[diesel(table_name = blood_requests)]
pub struct BloodRequest {
    pub id: Uuid,
    pub requester_id: Uuid,
    pub requester_type: String,
    pub patient_name: String,
    pub blood_type: String,
    pub quantity: i32,
    pub urgency: String,
    pub hospital_name: String,
    pub city: String,
    pub contact_phone: String,
    pub required_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub is_voluntary: bool,
    pub status: String,
    pub admin_notes: Option<String>,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BloodRequest {
    pub fn status(&self) -> AppResult<RequestStatus> {
        parse_column(&self.status)
    }

    pub fn blood_type(&self) -> AppResult<BloodType> {
        parse_column(&self.blood_type)
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = blood_requests)]
pub struct NewBloodRequest {
    pub requester_id: Uuid,
    pub requester_type: String,
    pub patient_name: String,
    pub blood_type: String,
    pub quantity: i32,
    pub urgency: String,
    pub hospital_name: String,
    pub city: String,
    pub contact_phone: String,
    pub required_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub is_voluntary: bool,
    pub status: String,
}

// --- Donations ---

#[derive(Debug, Clone, Queryable, Identifiable, Serialize)]
#[diesel(table_name = donations)]
pub struct Donation {
    pub id: Uuid,
    pub donor_id: Uuid,
    pub request_id: Uuid,
    pub status: String,
    pub notes: Option<String>,
    pub accepted_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Donation {
    pub fn status(&self) -> AppResult<DonationStatus> {
        parse_column(&self.status)
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = donations)]
pub struct NewDonation {
    pub donor_id: Uuid,
    pub request_id: Uuid,
    pub status: String,
    pub notes: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

// --- Voluntary donations ---

#[derive(Debug, Clone, Queryable, Identifiable, Serialize)]
#[diesel(table_name = voluntary_donations)]
pub struct VoluntaryDonation {
    pub id: Uuid,
    pub donor_id: Uuid,
    pub hospital_id: Option<Uuid>,
    pub available_date: NaiveDate,
    pub preferred_time: Option<String>,
    pub notes: Option<String>,
    pub status: String,
    pub admin_notes: Option<String>,
    pub reviewed_by: Option<Uuid>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub donation_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VoluntaryDonation {
    pub fn status(&self) -> AppResult<VoluntaryStatus> {
        parse_column(&self.status)
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = voluntary_donations)]
pub struct NewVoluntaryDonation {
    pub donor_id: Uuid,
    pub hospital_id: Option<Uuid>,
    pub available_date: NaiveDate,
    pub preferred_time: Option<String>,
    pub notes: Option<String>,
}

// --- Certificates ---

#[derive(Debug, Clone, Queryable, Identifiable, Serialize)]
#[diesel(table_name = certificates)]
pub struct Certificate {
    pub id: Uuid,
    pub certificate_number: String,
    pub donation_id: Uuid,
    pub donor_id: Uuid,
    pub issued_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = certificates)]
pub struct NewCertificate {
    pub certificate_number: String,
    pub donation_id: Uuid,
    pub donor_id: Uuid,
}

// --- Notifications ---

#[derive(Debug, Clone, Queryable, Identifiable, Serialize)]
#[diesel(table_name = notifications)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub notification_type: String,
    pub title: String,
    pub message: String,
    pub data: Option<serde_json::Value>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = notifications)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub notification_type: String,
    pub title: String,
    pub message: String,
    pub data: Option<serde_json::Value>,
}
