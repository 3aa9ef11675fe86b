pub mod admin;
pub mod auth;
pub mod certificates;
pub mod donor;
pub mod health;
pub mod hospital;
pub mod notifications;
pub mod requests;

use axum::routing::{get, post, put};
use axum::Router;

use crate::AppState;

pub fn router(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .route("/password", put(auth::change_password));

    let request_routes = Router::new()
        .route("/", post(requests::create_request))
        .route("/mine", get(requests::list_my_requests))
        .route("/:id", get(requests::get_request))
        .route("/:id/cancel", post(requests::cancel_request));

    let admin_routes = Router::new()
        .route("/users", get(admin::list_users))
        .route("/users/:id/approve", post(admin::approve_user))
        .route("/users/:id/reject", post(admin::reject_user))
        .route("/requests", get(admin::list_requests))
        .route("/requests/:id/approve", post(admin::approve_request))
        .route("/requests/:id/reject", post(admin::reject_request))
        .route("/voluntary", get(admin::list_voluntary))
        .route("/voluntary/:id/approve", post(admin::approve_voluntary))
        .route("/voluntary/:id/reject", post(admin::reject_voluntary))
        .route("/donations", get(admin::list_donations))
        .route("/stats", get(admin::dashboard_stats));

    let donor_routes = Router::new()
        .route("/requests", get(donor::matching_requests))
        .route("/requests/:id/accept", post(donor::accept_request))
        .route("/donations", get(donor::list_donations))
        .route("/donations/:id/status", put(donor::update_donation_status))
        .route("/donations/:id/cancel", post(donor::cancel_donation))
        .route("/eligibility", get(donor::eligibility))
        .route("/profile", get(donor::get_profile).put(donor::update_profile))
        .route("/health-profile", get(donor::get_health_profile).put(donor::update_health_profile))
        .route("/voluntary", get(donor::list_voluntary).post(donor::submit_voluntary))
        .route("/voluntary/:id/cancel", post(donor::cancel_voluntary))
        .route("/certificates", get(donor::list_certificates));

    let hospital_routes = Router::new()
        .route("/profile", get(hospital::get_profile).put(hospital::update_profile))
        .route("/voluntary", get(hospital::list_voluntary))
        .route("/voluntary/:id/schedule", post(hospital::schedule_voluntary))
        .route("/voluntary/:id/confirm", post(hospital::confirm_voluntary))
        .route("/voluntary/:id/complete", post(hospital::complete_voluntary))
        .route("/voluntary/:id/cancel", post(hospital::cancel_voluntary));

    let notification_routes = Router::new()
        .route("/", get(notifications::list_notifications))
        .route("/unread-count", get(notifications::unread_count))
        .route("/mark-all-read", post(notifications::mark_all_read))
        .route("/:id/read", post(notifications::mark_read));

    Router::new()
        .route("/health", get(health::health_check))
        .route("/metrics", get(health::metrics))
        .route("/certificates/:id", get(certificates::download_certificate))
        .nest("/auth", auth_routes)
        .nest("/requests", request_routes)
        .nest("/admin", admin_routes)
        .nest("/donor", donor_routes)
        .nest("/hospital", hospital_routes)
        .nest("/notifications", notification_routes)
        .with_state(state)
}
