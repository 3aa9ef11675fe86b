use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Donor,
    Hospital,
    Seeker,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Donor => "donor",
            UserRole::Hospital => "hospital",
            UserRole::Seeker => "seeker",
        }
    }

    /// Roles allowed to open blood requests.
    pub fn can_request_blood(&self) -> bool {
        matches!(self, UserRole::Seeker | UserRole::Hospital)
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(UserRole::Admin),
            "donor" => Ok(UserRole::Donor),
            "hospital" => Ok(UserRole::Hospital),
            "seeker" => Ok(UserRole::Seeker),
            _ => Err(format!("unknown role: {s}")),
        }
    }
}

/// Approval state of an account. Only approved accounts may log in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Pending,
    Approved,
    Rejected,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Pending => "pending",
            AccountStatus::Approved => "approved",
            AccountStatus::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AccountStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(AccountStatus::Pending),
            "approved" => Ok(AccountStatus::Approved),
            "rejected" => Ok(AccountStatus::Rejected),
            _ => Err(format!("unknown account status: {s}")),
        }
    }
}

/// The caller of an authenticated request, resolved from the session cookie.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: UserRole,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_round_trip_through_strings() {
        for role in [UserRole::Admin, UserRole::Donor, UserRole::Hospital, UserRole::Seeker] {
            assert_eq!(role.as_str().parse::<UserRole>().unwrap(), role);
        }
        assert!("nurse".parse::<UserRole>().is_err());
    }

    #[test]
    fn only_seekers_and_hospitals_request_blood() {
        assert!(UserRole::Seeker.can_request_blood());
        assert!(UserRole::Hospital.can_request_blood());
        assert!(!UserRole::Donor.can_request_blood());
        assert!(!UserRole::Admin.can_request_blood());
    }
}
