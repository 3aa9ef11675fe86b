use serde::{Deserialize, Serialize};

/// ABO/Rh blood group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BloodType {
    #[serde(rename = "O-")]
    ONeg,
    #[serde(rename = "O+")]
    OPos,
    #[serde(rename = "A-")]
    ANeg,
    #[serde(rename = "A+")]
    APos,
    #[serde(rename = "B-")]
    BNeg,
    #[serde(rename = "B+")]
    BPos,
    #[serde(rename = "AB-")]
    AbNeg,
    #[serde(rename = "AB+")]
    AbPos,
}

use BloodType::*;

impl BloodType {
    pub const ALL: [BloodType; 8] = [ONeg, OPos, ANeg, APos, BNeg, BPos, AbNeg, AbPos];

    pub fn as_str(&self) -> &'static str {
        match self {
            ONeg => "O-",
            OPos => "O+",
            ANeg => "A-",
            APos => "A+",
            BNeg => "B-",
            BPos => "B+",
            AbNeg => "AB-",
            AbPos => "AB+",
        }
    }

    /// Recipient types this donor type can give red cells to.
    pub fn can_donate_to(&self) -> &'static [BloodType] {
        match self {
            ONeg => &Self::ALL,
            OPos => &[OPos, APos, BPos, AbPos],
            ANeg => &[ANeg, APos, AbNeg, AbPos],
            APos => &[APos, AbPos],
            BNeg => &[BNeg, BPos, AbNeg, AbPos],
            BPos => &[BPos, AbPos],
            AbNeg => &[AbNeg, AbPos],
            AbPos => &[AbPos],
        }
    }

    pub fn is_compatible_with(&self, recipient: BloodType) -> bool {
        self.can_donate_to().contains(&recipient)
    }

    /// Recipient types as stored in the database, for `IN (...)` filters.
    pub fn recipient_labels(&self) -> Vec<&'static str> {
        self.can_donate_to().iter().map(BloodType::as_str).collect()
    }

    /// Donor types whose blood this recipient type can receive.
    pub fn donor_labels(&self) -> Vec<&'static str> {
        Self::ALL
            .iter()
            .filter(|donor| donor.is_compatible_with(*self))
            .map(BloodType::as_str)
            .collect()
    }
}

impl std::fmt::Display for BloodType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BloodType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| format!("unknown blood type: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn o_negative_is_universal_donor() {
        for recipient in BloodType::ALL {
            assert!(ONeg.is_compatible_with(recipient), "O- -> {recipient}");
        }
    }

    #[test]
    fn ab_positive_only_gives_to_ab_positive() {
        let matches: Vec<_> = BloodType::ALL
            .into_iter()
            .filter(|r| AbPos.is_compatible_with(*r))
            .collect();
        assert_eq!(matches, vec![AbPos]);
    }

    #[test]
    fn every_type_can_give_to_ab_positive_and_itself() {
        for donor in BloodType::ALL {
            assert!(donor.is_compatible_with(AbPos));
            assert!(donor.is_compatible_with(donor));
        }
    }

    #[test]
    fn rh_positive_never_gives_to_rh_negative() {
        for donor in [OPos, APos, BPos, AbPos] {
            for recipient in [ONeg, ANeg, BNeg, AbNeg] {
                assert!(!donor.is_compatible_with(recipient), "{donor} -> {recipient}");
            }
        }
    }

    #[test]
    fn table_sizes() {
        let sizes: Vec<_> = BloodType::ALL.iter().map(|t| t.can_donate_to().len()).collect();
        assert_eq!(sizes, vec![8, 4, 4, 2, 4, 2, 2, 1]);
    }

    #[test]
    fn donor_labels_invert_the_table() {
        assert_eq!(ONeg.donor_labels(), vec!["O-"]);
        assert_eq!(AbPos.donor_labels().len(), 8);
        assert_eq!(ANeg.donor_labels(), vec!["O-", "A-"]);
    }

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("ab+".parse::<BloodType>().unwrap(), AbPos);
        assert_eq!(" O- ".parse::<BloodType>().unwrap(), ONeg);
        assert!("C+".parse::<BloodType>().is_err());
    }

    #[test]
    fn serializes_as_label() {
        assert_eq!(serde_json::to_string(&BNeg).unwrap(), "\"B-\"");
        let parsed: BloodType = serde_json::from_str("\"AB-\"").unwrap();
        assert_eq!(parsed, AbNeg);
    }
}
