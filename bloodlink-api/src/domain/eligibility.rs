//! Donor eligibility: cooldown since the last completed donation plus the
//! weight and age gates. Every path that needs an eligibility decision
//! (the eligibility query, accepting a request, submitting a voluntary
//! donation) calls [`evaluate`].

use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;

pub const COOLDOWN_DAYS: i64 = 90;
pub const MIN_WEIGHT_KG: f64 = 50.0;
pub const MIN_AGE: i32 = 18;
pub const MAX_AGE: i32 = 65;

const MIN_HEMOGLOBIN: f64 = 12.5;
const SYSTOLIC_RANGE: std::ops::RangeInclusive<i32> = 90..=180;
const DIASTOLIC_RANGE: std::ops::RangeInclusive<i32> = 50..=100;

/// What eligibility is decided on.
#[derive(Debug, Clone, Copy)]
pub struct DonorFacts {
    pub date_of_birth: NaiveDate,
    pub weight_kg: f64,
    pub last_donation_date: Option<NaiveDate>,
}

/// Optional health-profile readings; they produce advisories, never a refusal.
#[derive(Debug, Clone, Copy, Default)]
pub struct HealthReadings {
    pub hemoglobin: Option<f64>,
    pub systolic: Option<i32>,
    pub diastolic: Option<i32>,
    pub has_chronic_disease: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum IneligibilityReason {
    Cooldown { next_eligible_date: NaiveDate, days_remaining: i64 },
    Underweight { weight_kg: f64, minimum_kg: f64 },
    TooYoung { age: i32, minimum_age: i32 },
    TooOld { age: i32, maximum_age: i32 },
}

impl IneligibilityReason {
    pub fn describe(&self) -> String {
        match self {
            Self::Cooldown { next_eligible_date, days_remaining } => format!(
                "you can donate again on {next_eligible_date} ({days_remaining} days remaining)"
            ),
            Self::Underweight { weight_kg, minimum_kg } => {
                format!("weight {weight_kg} kg is below the {minimum_kg} kg minimum")
            }
            Self::TooYoung { age, minimum_age } => {
                format!("donors must be at least {minimum_age} years old (age {age})")
            }
            Self::TooOld { age, maximum_age } => {
                format!("donors must be at most {maximum_age} years old (age {age})")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthAdvisory {
    LowHemoglobin,
    BloodPressureOutOfRange,
    ChronicDisease,
}

#[derive(Debug, Clone, Serialize)]
pub struct Eligibility {
    pub eligible: bool,
    pub age: i32,
    pub last_donation_date: Option<NaiveDate>,
    pub next_eligible_date: Option<NaiveDate>,
    pub days_remaining: i64,
    pub reasons: Vec<IneligibilityReason>,
    pub advisories: Vec<HealthAdvisory>,
}

impl Eligibility {
    pub fn with_advisories(mut self, readings: &HealthReadings) -> Self {
        self.advisories = health_advisories(readings);
        self
    }

    /// Human-readable summary of the failed gates.
    pub fn summary(&self) -> String {
        self.reasons
            .iter()
            .map(IneligibilityReason::describe)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

pub fn next_eligible_date(last_donation: NaiveDate) -> NaiveDate {
    last_donation + Duration::days(COOLDOWN_DAYS)
}

/// Age in whole years on `today`.
pub fn age_on(date_of_birth: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - date_of_birth.year();
    if (today.month(), today.day()) < (date_of_birth.month(), date_of_birth.day()) {
        age -= 1;
    }
    age
}

pub fn evaluate(facts: &DonorFacts, today: NaiveDate) -> Eligibility {
    let mut reasons = Vec::new();

    let next_eligible = facts.last_donation_date.map(next_eligible_date);
    let days_remaining = next_eligible
        .map(|next| (next - today).num_days().max(0))
        .unwrap_or(0);
    if let Some(next) = next_eligible {
        if today < next {
            reasons.push(IneligibilityReason::Cooldown {
                next_eligible_date: next,
                days_remaining,
            });
        }
    }

    if facts.weight_kg < MIN_WEIGHT_KG {
        reasons.push(IneligibilityReason::Underweight {
            weight_kg: facts.weight_kg,
            minimum_kg: MIN_WEIGHT_KG,
        });
    }

    let age = age_on(facts.date_of_birth, today);
    if age < MIN_AGE {
        reasons.push(IneligibilityReason::TooYoung { age, minimum_age: MIN_AGE });
    } else if age > MAX_AGE {
        reasons.push(IneligibilityReason::TooOld { age, maximum_age: MAX_AGE });
    }

    Eligibility {
        eligible: reasons.is_empty(),
        age,
        last_donation_date: facts.last_donation_date,
        next_eligible_date: next_eligible,
        days_remaining,
        reasons,
        advisories: Vec::new(),
    }
}

pub fn health_advisories(readings: &HealthReadings) -> Vec<HealthAdvisory> {
    let mut advisories = Vec::new();
    if readings.hemoglobin.is_some_and(|hb| hb < MIN_HEMOGLOBIN) {
        advisories.push(HealthAdvisory::LowHemoglobin);
    }
    let systolic_off = readings.systolic.is_some_and(|v| !SYSTOLIC_RANGE.contains(&v));
    let diastolic_off = readings.diastolic.is_some_and(|v| !DIASTOLIC_RANGE.contains(&v));
    if systolic_off || diastolic_off {
        advisories.push(HealthAdvisory::BloodPressureOutOfRange);
    }
    if readings.has_chronic_disease {
        advisories.push(HealthAdvisory::ChronicDisease);
    }
    advisories
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn healthy_adult(last_donation_date: Option<NaiveDate>) -> DonorFacts {
        DonorFacts {
            date_of_birth: date(1990, 5, 20),
            weight_kg: 70.0,
            last_donation_date,
        }
    }

    #[test]
    fn never_donated_is_eligible() {
        let result = evaluate(&healthy_adult(None), date(2024, 6, 1));
        assert!(result.eligible);
        assert_eq!(result.next_eligible_date, None);
        assert_eq!(result.days_remaining, 0);
    }

    #[test]
    fn eighty_nine_days_is_too_soon() {
        let today = date(2024, 6, 1);
        let result = evaluate(&healthy_adult(Some(today - Duration::days(89))), today);
        assert!(!result.eligible);
        assert_eq!(result.days_remaining, 1);
        assert_eq!(
            result.reasons,
            vec![IneligibilityReason::Cooldown {
                next_eligible_date: today + Duration::days(1),
                days_remaining: 1,
            }]
        );
    }

    #[test]
    fn ninety_days_is_eligible() {
        let today = date(2024, 6, 1);
        let result = evaluate(&healthy_adult(Some(today - Duration::days(90))), today);
        assert!(result.eligible);
        assert_eq!(result.next_eligible_date, Some(today));
        assert_eq!(result.days_remaining, 0);
    }

    #[test]
    fn weight_gate_is_inclusive_at_fifty() {
        let today = date(2024, 6, 1);
        let mut facts = healthy_adult(None);
        facts.weight_kg = 50.0;
        assert!(evaluate(&facts, today).eligible);

        facts.weight_kg = 49.9;
        let result = evaluate(&facts, today);
        assert!(!result.eligible);
        assert!(matches!(result.reasons[0], IneligibilityReason::Underweight { .. }));
    }

    #[test]
    fn age_bounds_are_inclusive() {
        let today = date(2024, 6, 1);
        let mut facts = healthy_adult(None);

        facts.date_of_birth = date(2006, 6, 1);
        assert_eq!(evaluate(&facts, today).age, 18);
        assert!(evaluate(&facts, today).eligible);

        facts.date_of_birth = date(2006, 6, 2);
        let result = evaluate(&facts, today);
        assert_eq!(result.age, 17);
        assert!(!result.eligible);

        facts.date_of_birth = date(1959, 1, 1);
        assert_eq!(evaluate(&facts, today).age, 65);
        assert!(evaluate(&facts, today).eligible);

        facts.date_of_birth = date(1958, 6, 1);
        assert!(matches!(
            evaluate(&facts, today).reasons[..],
            [IneligibilityReason::TooOld { age: 66, .. }]
        ));
    }

    #[test]
    fn leap_day_birthdays() {
        let dob = date(2004, 2, 29);
        assert_eq!(age_on(dob, date(2022, 2, 28)), 17);
        assert_eq!(age_on(dob, date(2022, 3, 1)), 18);
    }

    #[test]
    fn reports_every_failed_gate() {
        let today = date(2024, 6, 1);
        let facts = DonorFacts {
            date_of_birth: date(2010, 1, 1),
            weight_kg: 40.0,
            last_donation_date: Some(today - Duration::days(10)),
        };
        let result = evaluate(&facts, today);
        assert_eq!(result.reasons.len(), 3);
        assert!(result.summary().contains("80 days remaining"));
    }

    #[test]
    fn advisories_do_not_change_eligibility() {
        let readings = HealthReadings {
            hemoglobin: Some(11.0),
            systolic: Some(190),
            diastolic: Some(80),
            has_chronic_disease: true,
        };
        let result = evaluate(&healthy_adult(None), date(2024, 6, 1)).with_advisories(&readings);
        assert!(result.eligible);
        assert_eq!(
            result.advisories,
            vec![
                HealthAdvisory::LowHemoglobin,
                HealthAdvisory::BloodPressureOutOfRange,
                HealthAdvisory::ChronicDisease,
            ]
        );
        assert!(health_advisories(&HealthReadings::default()).is_empty());
    }

    #[test]
    fn reasons_serialize_with_tag() {
        let reason = IneligibilityReason::Underweight { weight_kg: 45.0, minimum_kg: 50.0 };
        let json = serde_json::to_value(&reason).unwrap();
        assert_eq!(json["reason"], "underweight");
        assert_eq!(json["minimum_kg"], 50.0);
    }
}
