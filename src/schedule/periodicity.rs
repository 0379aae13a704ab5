use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{LedgerError, Result};
use crate::types::PeriodicityId;

/// unit a periodicity repeats in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntervalType {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

/// operator-defined repetition rule for installment due dates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Periodicity {
    pub id: PeriodicityId,
    pub name: String,
    pub interval_type: IntervalType,
    /// repeat every N units
    pub interval_value: u32,
    /// 0 = sunday .. 6 = saturday
    #[serde(default)]
    pub allowed_weekdays: Vec<u8>,
    /// 1 ..= 31
    #[serde(default)]
    pub allowed_month_days: Vec<u8>,
    /// 1 ..= 12
    #[serde(default)]
    pub allowed_months: Vec<u8>,
}

impl Periodicity {
    pub fn new(name: impl Into<String>, interval_type: IntervalType, interval_value: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            interval_type,
            interval_value,
            allowed_weekdays: Vec::new(),
            allowed_month_days: Vec::new(),
            allowed_months: Vec::new(),
        }
    }

    pub fn daily() -> Self {
        Self::new("daily", IntervalType::Daily, 1)
    }

    /// monday to friday
    pub fn business_days() -> Self {
        Self::daily()
            .with_weekdays(vec![1, 2, 3, 4, 5])
            .named("business days")
    }

    pub fn weekly() -> Self {
        Self::new("weekly", IntervalType::Weekly, 1)
    }

    pub fn biweekly() -> Self {
        Self::new("biweekly", IntervalType::Daily, 15)
    }

    pub fn monthly() -> Self {
        Self::new("monthly", IntervalType::Monthly, 1)
    }

    pub fn yearly() -> Self {
        Self::new("yearly", IntervalType::Yearly, 1)
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_weekdays(mut self, weekdays: Vec<u8>) -> Self {
        self.allowed_weekdays = weekdays;
        self
    }

    pub fn with_month_days(mut self, days: Vec<u8>) -> Self {
        self.allowed_month_days = days;
        self
    }

    pub fn with_months(mut self, months: Vec<u8>) -> Self {
        self.allowed_months = months;
        self
    }

    /// reject values that can never match a calendar date
    pub fn validate(&self) -> Result<()> {
        if self.interval_value == 0 {
            return Err(LedgerError::configuration(format!(
                "periodicity '{}' has an interval value of zero",
                self.name
            )));
        }

        if let Some(day) = self.allowed_weekdays.iter().find(|&&d| d > 6) {
            return Err(LedgerError::configuration(format!(
                "periodicity '{}' lists weekday {} outside 0..=6",
                self.name, day
            )));
        }

        if let Some(day) = self
            .allowed_month_days
            .iter()
            .find(|&&d| d == 0 || d > 31)
        {
            return Err(LedgerError::configuration(format!(
                "periodicity '{}' lists month day {} outside 1..=31",
                self.name, day
            )));
        }

        if let Some(month) = self
            .allowed_months
            .iter()
            .find(|&&m| m == 0 || m > 12)
        {
            return Err(LedgerError::configuration(format!(
                "periodicity '{}' lists month {} outside 1..=12",
                self.name, month
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_are_valid() {
        for p in [
            Periodicity::daily(),
            Periodicity::business_days(),
            Periodicity::weekly(),
            Periodicity::biweekly(),
            Periodicity::monthly(),
            Periodicity::yearly(),
        ] {
            assert!(p.validate().is_ok(), "{} should validate", p.name);
        }
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        assert!(Periodicity::new("zero", IntervalType::Daily, 0).validate().is_err());
        assert!(Periodicity::daily().with_weekdays(vec![7]).validate().is_err());
        assert!(Periodicity::monthly().with_month_days(vec![0]).validate().is_err());
        assert!(Periodicity::monthly().with_month_days(vec![32]).validate().is_err());
        assert!(Periodicity::yearly().with_months(vec![13]).validate().is_err());
    }

    #[test]
    fn test_json_shape() {
        let json = r#"{
            "id": "2f1c1b1e-8a8b-4a51-9d0f-4b0c2a1d9e11",
            "name": "weekdays",
            "interval_type": "DAILY",
            "interval_value": 1,
            "allowed_weekdays": [1, 2, 3, 4, 5]
        }"#;
        let p: Periodicity = serde_json::from_str(json).unwrap();
        assert_eq!(p.interval_type, IntervalType::Daily);
        assert_eq!(p.allowed_weekdays, vec![1, 2, 3, 4, 5]);
        assert!(p.allowed_months.is_empty());
    }
}
