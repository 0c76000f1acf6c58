use super::Ecosystem;
use serde::{Deserialize, Serialize};

/// Where a record's `total` came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TotalSource {
    /// The totals source reported a figure.
    Reported,

    /// The totals source was unavailable or reported zero, so `last_month` stands in.
    LastMonthFallback,
}

/// One entry of `stats.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageStats {
    pub name: String,
    pub title: String,
    #[serde(rename = "type")]
    pub ecosystem: Ecosystem,
    pub day: u64,
    pub week: u64,
    pub year: u64,
    pub total: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_day: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_week: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_month: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_source: Option<TotalSource>,
}

impl PackageStats {
    /// A record for an npm package, whose windows are all reported directly.
    #[must_use]
    pub fn npm(name: &str, day: u64, week: u64, year: u64, total: u64) -> Self {
        Self {
            name: name.to_string(),
            title: name.to_string(),
            ecosystem: Ecosystem::Npm,
            day,
            week,
            year,
            total,
            last_day: None,
            last_week: None,
            last_month: None,
            total_source: None,
        }
    }

    /// Packages with no recent downloads are left out of the snapshot.
    #[must_use]
    pub const fn has_downloads(&self) -> bool {
        self.day != 0 || self.week != 0 || self.year != 0
    }
}

/// Order for `stats.json`: most total downloads first, then by name.
pub fn sort_by_total(stats: &mut [PackageStats]) {
    stats.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.name.cmp(&b.name)));
}
