use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::DashboardError;

/// Cluster ids the upstream segmentation produces, with their persona labels.
pub const KNOWN_CLUSTERS: [(u8, &str); 3] = [
    (0, "sensitive (20s-30s, low return visits)"),
    (1, "steady (40s-60s, high return visits)"),
    (2, "newly opened (new customers across all ages)"),
];

pub fn cluster_label(cluster: u8) -> Option<&'static str> {
    KNOWN_CLUSTERS
        .iter()
        .find(|(id, _)| *id == cluster)
        .map(|(_, label)| *label)
}

/// A calendar month, ordered chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth(NaiveDate);

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(Self)
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    pub fn month(&self) -> u32 {
        self.0.month()
    }
}

impl FromStr for YearMonth {
    type Err = DashboardError;

    /// Accepts `202301`, `202301.0` (dataframe float export) and `2023-01`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DashboardError::InvalidYearMonth(s.to_string());
        let trimmed = s.trim();

        let (year, month) = match trimmed.split_once('-') {
            Some((year, month)) => (year, month),
            None => {
                let digits = trimmed.strip_suffix(".0").unwrap_or(trimmed);
                if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(invalid());
                }
                digits.split_at(4)
            }
        };

        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        Self::new(year, month).ok_or_else(invalid)
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year(), self.month())
    }
}

impl Serialize for YearMonth {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Inclusive range of months.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: YearMonth,
    pub end: YearMonth,
}

impl DateRange {
    pub fn new(start: YearMonth, end: YearMonth) -> Self {
        Self { start, end }
    }

    pub fn single(month: YearMonth) -> Self {
        Self::new(month, month)
    }

    pub fn contains(&self, month: YearMonth) -> bool {
        self.start <= month && month <= self.end
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}..{}", self.start, self.end)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RiskLevel {
    Stable,
    Moderate,
    High,
    VeryHigh,
}

impl FromStr for RiskLevel {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['_', ' '], "-");
        match normalized.as_str() {
            "stable" | "안정" => Ok(RiskLevel::Stable),
            "moderate" | "보통" => Ok(RiskLevel::Moderate),
            "high" | "높음" => Ok(RiskLevel::High),
            "very-high" | "매우-높음" => Ok(RiskLevel::VeryHigh),
            _ => Err(DashboardError::UnknownRiskLevel(s.to_string())),
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Stable => write!(f, "Stable"),
            RiskLevel::Moderate => write!(f, "Moderate"),
            RiskLevel::High => write!(f, "High"),
            RiskLevel::VeryHigh => write!(f, "Very high"),
        }
    }
}

/// The four predicted risk probabilities, in their declared order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RiskFactor {
    NewCustomer,
    Sales,
    ReturnVisit,
    FootTraffic,
}

impl RiskFactor {
    pub const ALL: [RiskFactor; 4] = [
        RiskFactor::NewCustomer,
        RiskFactor::Sales,
        RiskFactor::ReturnVisit,
        RiskFactor::FootTraffic,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            RiskFactor::NewCustomer => "New-customer decline",
            RiskFactor::Sales => "Sales decline",
            RiskFactor::ReturnVisit => "Return-visit decline",
            RiskFactor::FootTraffic => "Foot-traffic decline",
        }
    }

    pub fn value(&self, record: &RiskRecord) -> f64 {
        match self {
            RiskFactor::NewCustomer => record.new_customer,
            RiskFactor::Sales => record.sales,
            RiskFactor::ReturnVisit => record.return_visit,
            RiskFactor::FootTraffic => record.foot_traffic,
        }
    }
}

/// Numeric columns that can be averaged or charted over time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Metric {
    NewCustomer,
    Sales,
    ReturnVisit,
    FootTraffic,
    Composite,
}

impl Metric {
    /// Column order used for group averages and comparison tables.
    pub const ALL: [Metric; 5] = [
        Metric::NewCustomer,
        Metric::Sales,
        Metric::ReturnVisit,
        Metric::FootTraffic,
        Metric::Composite,
    ];

    /// Order the trend picker offers them in.
    pub const TREND_CHOICES: [Metric; 5] = [
        Metric::Composite,
        Metric::Sales,
        Metric::ReturnVisit,
        Metric::NewCustomer,
        Metric::FootTraffic,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Metric::Composite => "Composite risk score",
            Metric::NewCustomer => RiskFactor::NewCustomer.label(),
            Metric::Sales => RiskFactor::Sales.label(),
            Metric::ReturnVisit => RiskFactor::ReturnVisit.label(),
            Metric::FootTraffic => RiskFactor::FootTraffic.label(),
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            Metric::Composite => "composite",
            Metric::NewCustomer => "new-customer",
            Metric::Sales => "sales",
            Metric::ReturnVisit => "return-visit",
            Metric::FootTraffic => "foot-traffic",
        }
    }

    pub fn value(&self, record: &RiskRecord) -> f64 {
        match self {
            Metric::Composite => record.composite_score,
            Metric::NewCustomer => record.new_customer,
            Metric::Sales => record.sales,
            Metric::ReturnVisit => record.return_visit,
            Metric::FootTraffic => record.foot_traffic,
        }
    }
}

impl From<RiskFactor> for Metric {
    fn from(factor: RiskFactor) -> Self {
        match factor {
            RiskFactor::NewCustomer => Metric::NewCustomer,
            RiskFactor::Sales => Metric::Sales,
            RiskFactor::ReturnVisit => Metric::ReturnVisit,
            RiskFactor::FootTraffic => Metric::FootTraffic,
        }
    }
}

impl FromStr for Metric {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['_', ' '], "-");
        Metric::ALL
            .into_iter()
            .find(|metric| metric.key() == normalized)
            .ok_or_else(|| DashboardError::UnknownMetric(s.to_string()))
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One store's risk observation for one month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskRecord {
    pub store_id: String,
    pub store_name: Option<String>,
    pub region: String,
    pub category: String,
    pub market_area: String,
    pub year_month: YearMonth,
    pub new_customer: f64,
    pub sales: f64,
    pub return_visit: f64,
    pub foot_traffic: f64,
    pub composite_score: f64,
    /// Upstream label, validated when a recommendation is built.
    pub risk_level: String,
    pub cluster: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum GroupKey {
    Category(String),
    Cluster(u8),
}

impl GroupKey {
    pub fn matches(&self, record: &RiskRecord) -> bool {
        match self {
            GroupKey::Category(category) => record.category == *category,
            GroupKey::Cluster(cluster) => record.cluster == *cluster,
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupKey::Category(category) => write!(f, "category {category}"),
            GroupKey::Cluster(cluster) => write!(f, "cluster {cluster}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricMean {
    pub metric: Metric,
    pub mean: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupAverage {
    pub key: GroupKey,
    pub count: usize,
    pub means: Vec<MetricMean>,
}

impl GroupAverage {
    pub fn mean(&self, metric: Metric) -> Option<f64> {
        self.means
            .iter()
            .find(|entry| entry.metric == metric)
            .map(|entry| entry.mean)
    }
}
