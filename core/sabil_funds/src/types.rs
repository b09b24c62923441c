//! # Types
//!
//! Shared data structures used across the funds ledger.
//!
//! ## Design decisions
//!
//! ### Amounts are integer centimes
//!
//! Every monetary value is an [`Amount`]: a count of minor units (centimes).
//! Values arrive on the wire as major-unit JSON numbers and are rounded to two
//! decimals exactly once, when decoded. From then on all arithmetic is exact.
//!
//! ### Status follows the amounts
//!
//! [`ProjectStatus`] is never set independently of a project's totals:
//!
//! ```text
//! Active ──(current >= target)──► Completed
//! ```
//!
//! [`ProjectStatus::for_amounts`] is the only place the rule is written down.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Mosque name shown when no settings row exists yet.
pub const DEFAULT_MOSQUE_NAME: &str = "سبيل الخير";

/// Image used for projects created without one.
pub const PLACEHOLDER_IMAGE_URL: &str =
    "https://images.unsplash.com/photo-1469571483320-da58317449cc?q=80&w=1200&auto=format&fit=crop";

/// Largest magnitude accepted from the wire, in major units.
const MAX_MAJOR: f64 = 1e13;

// ─────────────────────────────────────────────────────────
// Amount
// ─────────────────────────────────────────────────────────

/// A monetary amount in centimes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(i64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub const fn from_cents(cents: i64) -> Self {
        Amount(cents)
    }

    /// Whole major units (dinars).
    pub const fn from_major(units: i64) -> Self {
        Amount(units * 100)
    }

    /// Round a major-unit value to the nearest centime.
    ///
    /// Returns `None` for NaN, infinities and magnitudes above 10^13.
    pub fn from_major_f64(value: f64) -> Option<Self> {
        if !value.is_finite() || value.abs() > MAX_MAJOR {
            return None;
        }
        Some(Amount((value * 100.0).round() as i64))
    }

    pub const fn cents(self) -> i64 {
        self.0
    }

    pub fn as_major_f64(self) -> f64 {
        self.0 as f64 / 100.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// `None` on `i64` overflow.
    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    /// `self - other`, floored at zero.
    pub fn saturating_sub_zero(self, other: Amount) -> Amount {
        Amount(self.0.saturating_sub(other.0).max(0))
    }

    pub fn clamp_non_negative(self) -> Amount {
        Amount(self.0.max(0))
    }
}

impl Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Amount) -> Amount {
        Amount(self.0 + rhs.0)
    }
}

impl AddAssign for Amount {
    fn add_assign(&mut self, rhs: Amount) {
        self.0 += rhs.0;
    }
}

impl Sub for Amount {
    type Output = Amount;

    fn sub(self, rhs: Amount) -> Amount {
        Amount(self.0 - rhs.0)
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Amount {
        iter.fold(Amount::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Amount> for Amount {
    fn sum<I: Iterator<Item = &'a Amount>>(iter: I) -> Amount {
        iter.copied().sum()
    }
}

/// `1234567` centimes renders as `12,345.67`.
impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let units = (abs / 100).to_string();
        let cents = abs % 100;

        let mut grouped = String::with_capacity(units.len() + units.len() / 3);
        for (i, ch) in units.chars().enumerate() {
            if i > 0 && (units.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(ch);
        }

        write!(f, "{sign}{grouped}.{cents:02}")
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_major_f64())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        Amount::from_major_f64(value).ok_or_else(|| {
            serde::de::Error::custom(format!("amount out of range: {value}"))
        })
    }
}

// ─────────────────────────────────────────────────────────
// Project
// ─────────────────────────────────────────────────────────

/// Lifecycle status of a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    /// Still accepting allocations.
    Active,
    /// Target reached; excluded from allocation candidates.
    Completed,
}

impl ProjectStatus {
    /// The status a project with these totals must have.
    pub fn for_amounts(current: Amount, target: Amount) -> Self {
        if current >= target {
            Self::Completed
        } else {
            Self::Active
        }
    }

    /// Parse the identifier stored in the database.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "active" => Some(Self::Active),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
        }
    }
}

/// A fundraising goal with a target amount and running total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub image_url: String,
    pub target_amount: Amount,
    pub current_amount: Amount,
    /// Display-only priority badge.
    pub is_important: bool,
    pub status: ProjectStatus,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl Project {
    /// How much more this project can absorb before reaching its target.
    pub fn remaining_need(&self) -> Amount {
        self.target_amount.saturating_sub_zero(self.current_amount)
    }

    pub fn is_active(&self) -> bool {
        self.status == ProjectStatus::Active
    }
}

// ─────────────────────────────────────────────────────────
// Reports, settings, balance
// ─────────────────────────────────────────────────────────

/// A published statement of one cycle's collected amount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: i64,
    pub title: String,
    pub description: String,
    /// Newly collected in that cycle, not cumulative.
    pub total_collected: Amount,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub date: DateTime<Utc>,
}

/// Singleton settings shown to donors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub mosque_name: String,
    /// Bank account reference donors transfer to.
    pub rip: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            mosque_name: DEFAULT_MOSQUE_NAME.to_string(),
            rip: String::new(),
        }
    }
}

/// Funds collected but not yet allocated to any project.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalBalance {
    pub amount: Amount,
}

impl GlobalBalance {
    /// Build a balance, clamping negative values to zero.
    pub fn clamped(amount: Amount) -> Self {
        GlobalBalance {
            amount: amount.clamp_non_negative(),
        }
    }
}
