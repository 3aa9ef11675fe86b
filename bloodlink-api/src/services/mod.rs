pub mod admin_service;
pub mod auth_service;
pub mod certificate_service;
pub mod donation_service;
pub mod eligibility_service;
pub mod notification_service;
pub mod profile_service;
pub mod reminder_service;
pub mod request_service;
pub mod voluntary_service;
