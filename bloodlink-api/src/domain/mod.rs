pub mod blood_type;
pub mod eligibility;
pub mod lifecycle;

pub use blood_type::BloodType;
pub use lifecycle::{DonationStatus, InvalidTransition, Lifecycle, RequestStatus, Urgency, VoluntaryStatus};
