//! Status machines for blood requests, donations and voluntary donations.
//!
//! Every status change in the service goes through [`Lifecycle::transition`].

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} cannot move from '{from}' to '{to}'")]
pub struct InvalidTransition {
    pub entity: &'static str,
    pub from: &'static str,
    pub to: &'static str,
}

pub trait Lifecycle: Copy + Eq + Sized {
    const ENTITY: &'static str;

    fn as_str(&self) -> &'static str;

    fn can_transition_to(&self, next: Self) -> bool;

    fn is_terminal(&self) -> bool;

    fn transition(self, next: Self) -> Result<Self, InvalidTransition> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(InvalidTransition {
                entity: Self::ENTITY,
                from: self.as_str(),
                to: next.as_str(),
            })
        }
    }
}

macro_rules! status_strings {
    ($ty:ident, $label:literal, { $($variant:ident => $s:literal),+ $(,)? }) => {
        impl $ty {
            pub const ALL: &'static [$ty] = &[$($ty::$variant),+];
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(Lifecycle::as_str(self))
            }
        }

        impl std::str::FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok($ty::$variant),)+
                    _ => Err(format!(concat!("unknown ", $label, " status: {}"), s)),
                }
            }
        }
    };
}

// --- Blood requests ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
    InProgress,
    Completed,
    Cancelled,
}

impl Lifecycle for RequestStatus {
    const ENTITY: &'static str = "blood request";

    fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    fn can_transition_to(&self, next: Self) -> bool {
        use RequestStatus::*;
        matches!(
            (self, next),
            (Pending, Approved | Rejected | Cancelled)
                | (Approved, InProgress | Cancelled)
                // a cancelled donation hands the request back to the pool
                | (InProgress, Completed | Approved)
        )
    }

    fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected | Self::Completed | Self::Cancelled)
    }
}

status_strings!(RequestStatus, "request", {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
    InProgress => "in_progress",
    Completed => "completed",
    Cancelled => "cancelled",
});

// --- Donations ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DonationStatus {
    Accepted,
    OnTheWay,
    Reached,
    Completed,
    Cancelled,
}

impl DonationStatus {
    /// Statuses that still occupy the donor and the request.
    pub const OPEN: [DonationStatus; 3] = [Self::Accepted, Self::OnTheWay, Self::Reached];

    fn progress(&self) -> Option<u8> {
        match self {
            Self::Accepted => Some(0),
            Self::OnTheWay => Some(1),
            Self::Reached => Some(2),
            Self::Completed => Some(3),
            Self::Cancelled => None,
        }
    }

    pub fn open_labels() -> Vec<&'static str> {
        Self::OPEN.iter().map(|s| s.as_str()).collect()
    }
}

impl Lifecycle for DonationStatus {
    const ENTITY: &'static str = "donation";

    fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::OnTheWay => "on_the_way",
            Self::Reached => "reached",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Forward only. Skipping ahead is allowed, going back is not.
    fn can_transition_to(&self, next: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        match (self.progress(), next.progress()) {
            (_, None) => true,
            (Some(from), Some(to)) => to > from,
            (None, Some(_)) => false,
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

status_strings!(DonationStatus, "donation", {
    Accepted => "accepted",
    OnTheWay => "on_the_way",
    Reached => "reached",
    Completed => "completed",
    Cancelled => "cancelled",
});

// --- Voluntary donations ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoluntaryStatus {
    Pending,
    Approved,
    Rejected,
    Scheduled,
    Completed,
    Cancelled,
}

impl VoluntaryStatus {
    /// A donor may hold at most one record in these states.
    pub const OPEN: [VoluntaryStatus; 3] = [Self::Pending, Self::Approved, Self::Scheduled];

    pub fn open_labels() -> Vec<&'static str> {
        Self::OPEN.iter().map(|s| s.as_str()).collect()
    }
}

impl Lifecycle for VoluntaryStatus {
    const ENTITY: &'static str = "voluntary donation";

    fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Scheduled => "scheduled",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    fn can_transition_to(&self, next: Self) -> bool {
        use VoluntaryStatus::*;
        matches!(
            (self, next),
            (Pending, Approved | Rejected | Cancelled)
                | (Approved, Scheduled | Cancelled)
                | (Scheduled, Completed | Cancelled)
        )
    }

    fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected | Self::Completed | Self::Cancelled)
    }
}

status_strings!(VoluntaryStatus, "voluntary donation", {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
    Scheduled => "scheduled",
    Completed => "completed",
    Cancelled => "cancelled",
});

// --- Urgency ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    Medium,
    High,
    Critical,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Urgency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            _ => Err(format!("unknown urgency: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_can_only_be_reviewed_while_pending() {
        use RequestStatus::*;
        assert_eq!(Pending.transition(Approved), Ok(Approved));
        assert_eq!(Pending.transition(Rejected), Ok(Rejected));

        let err = Approved.transition(Approved).unwrap_err();
        assert_eq!(err.from, "approved");
        assert_eq!(err.to, "approved");
        assert!(Rejected.transition(Approved).is_err());
        assert!(InProgress.transition(Rejected).is_err());
    }

    #[test]
    fn only_approved_requests_can_be_accepted() {
        use RequestStatus::*;
        for status in RequestStatus::ALL.iter().copied() {
            assert_eq!(status.can_transition_to(InProgress), status == Approved, "{status}");
        }
    }

    #[test]
    fn in_progress_request_returns_to_approved() {
        use RequestStatus::*;
        assert_eq!(InProgress.transition(Approved), Ok(Approved));
        assert_eq!(InProgress.transition(Completed), Ok(Completed));
        assert!(InProgress.transition(Cancelled).is_err());
    }

    #[test]
    fn terminal_request_states_are_final() {
        for from in RequestStatus::ALL.iter().filter(|s| s.is_terminal()) {
            for to in RequestStatus::ALL {
                assert!(!from.can_transition_to(*to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn donation_status_never_regresses() {
        use DonationStatus::*;
        assert!(Accepted.can_transition_to(OnTheWay));
        assert!(OnTheWay.can_transition_to(Reached));
        assert!(Reached.can_transition_to(Completed));
        assert!(Accepted.can_transition_to(Completed));

        assert!(!Reached.can_transition_to(OnTheWay));
        assert!(!OnTheWay.can_transition_to(Accepted));
        assert!(!Accepted.can_transition_to(Accepted));
        assert!(!Completed.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Accepted));
    }

    #[test]
    fn open_donations_can_be_cancelled() {
        for status in DonationStatus::OPEN {
            assert_eq!(status.transition(DonationStatus::Cancelled), Ok(DonationStatus::Cancelled));
        }
    }

    #[test]
    fn voluntary_flow() {
        use VoluntaryStatus::*;
        let status = Pending.transition(Approved).unwrap();
        let status = status.transition(Scheduled).unwrap();
        assert_eq!(status.transition(Completed), Ok(Completed));

        assert!(Pending.transition(Scheduled).is_err());
        assert!(Approved.transition(Completed).is_err());
        for open in VoluntaryStatus::OPEN {
            assert!(open.can_transition_to(Cancelled));
        }
        assert!(Completed.transition(Cancelled).is_err());
    }

    #[test]
    fn statuses_parse_from_their_labels() {
        for status in DonationStatus::ALL {
            assert_eq!(status.as_str().parse::<DonationStatus>().unwrap(), *status);
        }
        assert_eq!("in_progress".parse::<RequestStatus>().unwrap(), RequestStatus::InProgress);
        assert!("done".parse::<VoluntaryStatus>().is_err());
    }

    #[test]
    fn transition_error_message() {
        let err = RequestStatus::Completed
            .transition(RequestStatus::Cancelled)
            .unwrap_err();
        assert_eq!(err.to_string(), "blood request cannot move from 'completed' to 'cancelled'");
    }

    #[test]
    fn urgency_orders_by_severity() {
        assert!(Urgency::Critical > Urgency::High);
        assert!(Urgency::Medium > Urgency::Low);
        assert_eq!("critical".parse::<Urgency>().unwrap(), Urgency::Critical);
    }
}
