//! Monthly usage metering for free and premium subscribers.
//!
//! A ledger is only meaningful for the calendar month it names. Once the
//! month rolls over, the stored count is ignored and the next recorded
//! analysis starts a fresh ledger at 1.

use crate::store::UserRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default number of analyses a free subscriber may run per calendar month.
pub const FREE_TIER_QUOTA: u32 = 10;

/// Subscription class of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Free,
    Premium,
}

impl std::str::FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "free" => Ok(Tier::Free),
            "premium" => Ok(Tier::Premium),
            _ => Err(format!("Unknown subscription tier: {}", s)),
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tier::Free => write!(f, "free"),
            Tier::Premium => write!(f, "premium"),
        }
    }
}

/// Per-user analysis counter for one calendar month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageLedger {
    /// Calendar month token, e.g. `2024-01`.
    pub month: String,
    /// Analyses recorded during `month`.
    pub count: u32,
}

impl UsageLedger {
    pub fn new(month: impl Into<String>, count: u32) -> Self {
        Self {
            month: month.into(),
            count,
        }
    }

    /// Count that applies in `current_month`; a stale ledger counts as empty.
    pub fn effective_count(&self, current_month: &str) -> u32 {
        if self.month == current_month {
            self.count
        } else {
            0
        }
    }

    /// The ledger after recording one more analysis in `current_month`.
    ///
    /// Rollover and increment happen together: a missing or stale ledger
    /// becomes `{current_month, 1}`, a current one is incremented.
    pub fn advanced(ledger: Option<&UsageLedger>, current_month: &str) -> UsageLedger {
        match ledger {
            Some(l) if l.month == current_month => UsageLedger::new(current_month, l.count.saturating_add(1)),
            _ => UsageLedger::new(current_month, 1),
        }
    }
}

/// Calendar year-month token (UTC) for `now`.
pub fn month_token(now: DateTime<Utc>) -> String {
    now.format("%Y-%m").to_string()
}

/// Gating rules for monthly analyses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsagePolicy {
    free_quota: u32,
}

impl Default for UsagePolicy {
    fn default() -> Self {
        Self::new(FREE_TIER_QUOTA)
    }
}

impl UsagePolicy {
    pub fn new(free_quota: u32) -> Self {
        Self { free_quota }
    }

    pub fn free_quota(&self) -> u32 {
        self.free_quota
    }

    /// Analyses the user has used this month.
    pub fn effective_count(&self, user: &UserRecord, now: DateTime<Utc>) -> u32 {
        let current_month = month_token(now);
        user.usage
            .as_ref()
            .map(|l| l.effective_count(&current_month))
            .unwrap_or(0)
    }

    /// Whether `user` may run another analysis at `now`.
    pub fn can_proceed(&self, user: &UserRecord, now: DateTime<Utc>) -> bool {
        match user.tier {
            Tier::Premium => true,
            Tier::Free => self.effective_count(user, now) < self.free_quota,
        }
    }

    /// Analyses left this month, `None` for unlimited.
    pub fn remaining(&self, user: &UserRecord, now: DateTime<Utc>) -> Option<u32> {
        match user.tier {
            Tier::Premium => None,
            Tier::Free => Some(self.free_quota.saturating_sub(self.effective_count(user, now))),
        }
    }
}

/// The ledger `user` should hold after one more delivered analysis at `now`.
pub fn record_usage(user: &UserRecord, now: DateTime<Utc>) -> UsageLedger {
    UsageLedger::advanced(user.usage.as_ref(), &month_token(now))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn user(tier: Tier, usage: Option<UsageLedger>) -> UserRecord {
        UserRecord {
            email: "a@x.com".to_string(),
            name: "A".to_string(),
            image: None,
            tier,
            usage,
            created_at: Utc.with_ymd_and_hms(2023, 12, 1, 0, 0, 0).unwrap(),
        }
    }

    fn jan_15() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_month_token() {
        assert_eq!(month_token(jan_15()), "2024-01");
        assert_eq!(
            month_token(Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 59).unwrap()),
            "2024-12"
        );
    }

    #[test]
    fn test_premium_always_proceeds() {
        let policy = UsagePolicy::default();
        let u = user(Tier::Premium, Some(UsageLedger::new("2024-01", 500)));
        assert!(policy.can_proceed(&u, jan_15()));
        assert_eq!(policy.remaining(&u, jan_15()), None);
    }

    #[test]
    fn test_free_at_nine_then_ten() {
        let policy = UsagePolicy::default();
        let mut u = user(Tier::Free, Some(UsageLedger::new("2024-01", 9)));
        assert!(policy.can_proceed(&u, jan_15()));

        u.usage = Some(record_usage(&u, jan_15()));
        assert_eq!(u.usage, Some(UsageLedger::new("2024-01", 10)));
        assert!(!policy.can_proceed(&u, jan_15()));
        assert_eq!(policy.remaining(&u, jan_15()), Some(0));
    }

    #[test]
    fn test_rollover_resets_instead_of_accumulating() {
        let policy = UsagePolicy::default();
        let feb_1 = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let u = user(Tier::Free, Some(UsageLedger::new("2024-01", 10)));

        assert!(policy.can_proceed(&u, feb_1));
        assert_eq!(policy.effective_count(&u, feb_1), 0);
        assert_eq!(record_usage(&u, feb_1), UsageLedger::new("2024-02", 1));
    }

    #[test]
    fn test_missing_ledger_is_empty() {
        let policy = UsagePolicy::default();
        let u = user(Tier::Free, None);
        assert!(policy.can_proceed(&u, jan_15()));
        assert_eq!(record_usage(&u, jan_15()), UsageLedger::new("2024-01", 1));
    }

    #[test]
    fn test_custom_quota() {
        let policy = UsagePolicy::new(2);
        let u = user(Tier::Free, Some(UsageLedger::new("2024-01", 2)));
        assert!(!policy.can_proceed(&u, jan_15()));
    }

    #[test]
    fn test_tier_parse() {
        assert_eq!("Premium".parse::<Tier>().unwrap(), Tier::Premium);
        assert_eq!("free".parse::<Tier>().unwrap(), Tier::Free);
        assert!("gold".parse::<Tier>().is_err());
        assert_eq!(Tier::Premium.to_string(), "premium");
    }
}
