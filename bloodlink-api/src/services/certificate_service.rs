use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use rand::Rng;
use serde::Serialize;
use uuid::Uuid;

use bloodlink_shared::clients::email::escape_html;
use bloodlink_shared::errors::{AppError, AppResult, ErrorCode};
use bloodlink_shared::types::auth::AuthUser;

use crate::models::{BloodRequest, Certificate, Donation, Donor, NewCertificate, User};
use crate::schema::{blood_requests, certificates, donations, donors, users};
use crate::services::notification_service::{self, entity_data, NotificationKind};

/// `BL-YYYYMMDD-XXXXXXXX`, the suffix being 8 random uppercase hex digits.
pub fn certificate_number(issued_at: DateTime<Utc>) -> String {
    let suffix: u32 = rand::thread_rng().gen();
    format!("BL-{}-{:08X}", issued_at.format("%Y%m%d"), suffix)
}

const NUMBER_ATTEMPTS: u32 = 5;
const NUMBER_CONSTRAINT: &str = "certificates_certificate_number_key";

fn is_number_collision(err: &DieselError) -> bool {
    matches!(
        err,
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info)
            if info.constraint_name() == Some(NUMBER_CONSTRAINT)
    )
}

/// Runs `insert` until it stops colliding on the certificate number, giving
/// up after `NUMBER_ATTEMPTS` tries.
fn retry_on_number_collision<T>(mut insert: impl FnMut() -> QueryResult<T>) -> QueryResult<T> {
    let mut attempt = 1;
    loop {
        match insert() {
            Err(e) if is_number_collision(&e) && attempt < NUMBER_ATTEMPTS => {
                tracing::warn!(attempt, "certificate number already taken, drawing another");
                attempt += 1;
            }
            result => return result,
        }
    }
}

/// Issues the certificate for a completed donation. A donation only ever
/// gets one; a second call returns the existing row.
pub fn issue(conn: &mut PgConnection, donation: &Donation, donor: &Donor) -> AppResult<Certificate> {
    if let Some(existing) = certificates::table
        .filter(certificates::donation_id.eq(donation.id))
        .first::<Certificate>(conn)
        .optional()?
    {
        return Ok(existing);
    }

    // each try runs in a savepoint so a collision leaves the caller's transaction usable
    let certificate: Certificate = retry_on_number_collision(|| {
        conn.transaction::<Certificate, DieselError, _>(|conn| {
            diesel::insert_into(certificates::table)
                .values(&NewCertificate {
                    certificate_number: certificate_number(Utc::now()),
                    donation_id: donation.id,
                    donor_id: donor.id,
                })
                .get_result(conn)
        })
    })?;

    notification_service::notify(
        conn,
        donor.user_id,
        NotificationKind::CertificateIssued,
        "Donation certificate issued",
        &format!(
            "Thank you for donating. Certificate {} is ready to download.",
            certificate.certificate_number
        ),
        Some(entity_data("certificate", certificate.id)),
    )?;

    tracing::info!(
        certificate_id = %certificate.id,
        donation_id = %donation.id,
        certificate_number = %certificate.certificate_number,
        "certificate issued"
    );
    Ok(certificate)
}

pub fn list_for_donor(conn: &mut PgConnection, donor_id: Uuid) -> AppResult<Vec<Certificate>> {
    Ok(certificates::table
        .filter(certificates::donor_id.eq(donor_id))
        .order(certificates::issued_at.desc())
        .load::<Certificate>(conn)?)
}

/// Everything printed on a certificate.
#[derive(Debug, Serialize)]
pub struct CertificateView {
    pub certificate_number: String,
    pub donor_name: String,
    pub blood_type: String,
    pub donated_at: DateTime<Utc>,
    pub hospital_name: String,
    pub city: String,
    pub issued_at: DateTime<Utc>,
}

/// Loads a certificate for download. Visible to the donor it belongs to
/// and to admins; anyone else gets a not-found.
pub fn load_view(conn: &mut PgConnection, certificate_id: Uuid, caller: &AuthUser) -> AppResult<CertificateView> {
    let not_found = || AppError::new(ErrorCode::CertificateNotFound, "certificate not found");

    let certificate = certificates::table
        .find(certificate_id)
        .first::<Certificate>(conn)
        .optional()?
        .ok_or_else(not_found)?;

    let (donor, donor_user) = donors::table
        .inner_join(users::table)
        .filter(donors::id.eq(certificate.donor_id))
        .first::<(Donor, User)>(conn)?;

    if donor_user.id != caller.id && !caller.is_admin() {
        return Err(not_found());
    }

    let (donation, request) = donations::table
        .inner_join(blood_requests::table)
        .filter(donations::id.eq(certificate.donation_id))
        .first::<(Donation, BloodRequest)>(conn)?;

    Ok(CertificateView {
        certificate_number: certificate.certificate_number,
        donor_name: donor_user.full_name,
        blood_type: donor.blood_type,
        donated_at: donation.completed_at.unwrap_or(certificate.issued_at),
        hospital_name: request.hospital_name,
        city: request.city,
        issued_at: certificate.issued_at,
    })
}

pub fn file_name(view: &CertificateView) -> String {
    format!("certificate-{}.html", view.certificate_number)
}

pub fn render_html(view: &CertificateView) -> String {
    let location = if view.city.is_empty() {
        escape_html(&view.hospital_name)
    } else {
        format!("{}, {}", escape_html(&view.hospital_name), escape_html(&view.city))
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Blood Donation Certificate {number}</title>
<style>
  body {{ font-family: Georgia, serif; background: #fdf6f6; }}
  .certificate {{ max-width: 760px; margin: 40px auto; padding: 48px; background: #fff; border: 8px double #b91c1c; text-align: center; }}
  h1 {{ color: #b91c1c; letter-spacing: 2px; }}
  .name {{ font-size: 28px; font-weight: bold; margin: 16px 0; }}
  .meta {{ color: #555; margin-top: 32px; font-size: 14px; }}
</style>
</head>
<body>
<div class="certificate">
  <h1>Certificate of Blood Donation</h1>
  <p>This certifies that</p>
  <p class="name">{donor}</p>
  <p>generously donated blood of type <strong>{blood_type}</strong> on <strong>{date}</strong></p>
  <p>at {location}.</p>
  <p>Your gift helps save lives. Thank you.</p>
  <div class="meta">
    <p>Certificate No. {number}</p>
    <p>Issued on {issued} by BloodLink</p>
  </div>
</div>
</body>
</html>
"#,
        number = escape_html(&view.certificate_number),
        donor = escape_html(&view.donor_name),
        blood_type = escape_html(&view.blood_type),
        date = view.donated_at.format("%B %-d, %Y"),
        issued = view.issued_at.format("%Y-%m-%d"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn view() -> CertificateView {
        CertificateView {
            certificate_number: "BL-20240601-0A1B2C3D".into(),
            donor_name: "Ana <script>alert(1)</script>".into(),
            blood_type: "O-".into(),
            donated_at: Utc.with_ymd_and_hms(2024, 6, 1, 10, 30, 0).unwrap(),
            hospital_name: "St. Mary's".into(),
            city: "Lyon".into(),
            issued_at: Utc.with_ymd_and_hms(2024, 6, 1, 11, 0, 0).unwrap(),
        }
    }

    #[test]
    fn number_format() {
        let issued = Utc.with_ymd_and_hms(2024, 3, 9, 8, 0, 0).unwrap();
        let number = certificate_number(issued);
        assert_eq!(number.len(), "BL-20240309-".len() + 8);
        assert!(number.starts_with("BL-20240309-"));
        assert!(number[12..].chars().all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
    }

    #[test]
    fn html_escapes_interpolated_values() {
        let html = render_html(&view());
        assert!(html.contains("Ana &lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("St. Mary&#39;s, Lyon"));
        assert!(html.contains("June 1, 2024"));
        assert!(html.contains("Certificate No. BL-20240601-0A1B2C3D"));
    }

    #[derive(Debug)]
    struct ConstraintViolation(&'static str);

    impl diesel::result::DatabaseErrorInformation for ConstraintViolation {
        fn message(&self) -> &str {
            "duplicate key value violates unique constraint"
        }
        fn details(&self) -> Option<&str> {
            None
        }
        fn hint(&self) -> Option<&str> {
            None
        }
        fn table_name(&self) -> Option<&str> {
            Some("certificates")
        }
        fn column_name(&self) -> Option<&str> {
            None
        }
        fn constraint_name(&self) -> Option<&str> {
            Some(self.0)
        }
        fn statement_position(&self) -> Option<i32> {
            None
        }
    }

    fn unique_violation(constraint: &'static str) -> DieselError {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, Box::new(ConstraintViolation(constraint)))
    }

    #[test]
    fn number_collision_draws_a_new_number() {
        let mut calls = 0;
        let result = retry_on_number_collision(|| {
            calls += 1;
            if calls < 3 {
                Err(unique_violation(NUMBER_CONSTRAINT))
            } else {
                Ok(calls)
            }
        });
        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn collision_retries_are_bounded() {
        let mut calls = 0;
        let result: QueryResult<()> = retry_on_number_collision(|| {
            calls += 1;
            Err(unique_violation(NUMBER_CONSTRAINT))
        });
        assert!(is_number_collision(&result.unwrap_err()));
        assert_eq!(calls, NUMBER_ATTEMPTS);
    }

    #[test]
    fn other_unique_violations_are_not_retried() {
        let mut calls = 0;
        let result: QueryResult<()> = retry_on_number_collision(|| {
            calls += 1;
            Err(unique_violation("certificates_donation_id_key"))
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[test]
    fn attachment_name_uses_number() {
        assert_eq!(file_name(&view()), "certificate-BL-20240601-0A1B2C3D.html");
    }
}
