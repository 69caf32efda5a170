//! One request, one freshly computed view.
//!
//! `build_view` is the whole per-interaction pipeline: select, aggregate,
//! interpret. Only an empty selection escapes as an error; a comparison or
//! recommendation that cannot be computed becomes a placeholder panel.

use serde::Serialize;
use tracing::{debug, warn};

use crate::aggregate::{self, ColumnLeader, MetricComparison};
use crate::config::InsightConfig;
use crate::data::Dataset;
use crate::error::{DashboardError, Result};
use crate::insight::{self, FactorRanking, GapBand, Recommendation, RiskZone};
use crate::models::{
    cluster_label, DateRange, GroupAverage, GroupKey, Metric, RiskFactor, RiskRecord, YearMonth,
};
use crate::selection;

pub const NO_DATA_MESSAGE: &str = "No data to display for this store and period.";
pub const INSUFFICIENT_DATA_MESSAGE: &str = "Insufficient data for comparison.";

#[derive(Debug, Clone, PartialEq)]
pub struct ViewRequest {
    pub store: String,
    /// Falls back to the store's own first and last month.
    pub range: Option<DateRange>,
    pub metric: Metric,
}

impl ViewRequest {
    pub fn new(store: impl Into<String>) -> Self {
        Self {
            store: store.into(),
            range: None,
            metric: Metric::Composite,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "data", rename_all = "lowercase")]
pub enum Panel<T> {
    Ready(T),
    Unavailable(String),
}

impl<T> Panel<T> {
    fn from_result(result: Result<T>, section: &str) -> Self {
        match result {
            Ok(value) => Panel::Ready(value),
            Err(err) => {
                warn!(section, error = %err, "section unavailable");
                let message = match err {
                    DashboardError::EmptyGroup { .. } => INSUFFICIENT_DATA_MESSAGE.to_string(),
                    other => other.to_string(),
                };
                Panel::Unavailable(message)
            }
        }
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            Panel::Ready(value) => Some(value),
            Panel::Unavailable(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreProfile {
    pub store_id: String,
    pub store_name: Option<String>,
    pub region: String,
    pub category: String,
    pub market_area: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Headline {
    pub year_month: YearMonth,
    pub composite_score: f64,
    pub risk_level: String,
    pub cluster: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ZonedReading {
    pub factor: RiskFactor,
    pub value: f64,
    pub zone: RiskZone,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndustryComparison {
    pub category: String,
    pub rows_in_sample: usize,
    pub rows: Vec<MetricComparison>,
    pub average_score: f64,
    pub gap: f64,
    pub band: GapBand,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterComparison {
    pub current: u8,
    pub current_label: &'static str,
    pub store_score: f64,
    pub averages: Vec<GroupAverage>,
    pub leaders: Vec<ColumnLeader>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrendPoint {
    pub year_month: YearMonth,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendSeries {
    pub metric: Metric,
    pub points: Vec<TrendPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insight {
    pub recommendation: Recommendation,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    pub range: DateRange,
    pub row_count: usize,
    pub profile: StoreProfile,
    pub headline: Headline,
    pub factors: Vec<ZonedReading>,
    pub ranking: FactorRanking,
    pub thresholds: InsightConfig,
    pub industry: Panel<IndustryComparison>,
    pub clusters: Panel<ClusterComparison>,
    pub trend: TrendSeries,
    pub insight: Panel<Insight>,
}

pub fn build_view(dataset: &Dataset, request: &ViewRequest, config: &InsightConfig) -> Result<DashboardView> {
    let range = match request.range.or_else(|| dataset.store_span(&request.store)) {
        Some(range) => range,
        None => {
            return Err(DashboardError::SelectionEmpty {
                store: request.store.clone(),
                range: "any month".to_string(),
            })
        }
    };

    let selection = selection::select(dataset, &request.store, range)?;
    let latest = selection.latest();
    let ranking = insight::rank_factors(latest);

    let industry = Panel::from_result(industry_comparison(dataset, latest, config), "industry");
    let clusters = Panel::from_result(cluster_comparison(dataset, latest), "clusters");

    // The narrative quotes the industry gap, so it shares that panel's fate.
    let insight = match industry.ready() {
        Some(industry) => Panel::from_result(
            insight::classify(&latest.risk_level, industry.gap).map(|recommendation| Insight {
                summary: recommendation.summary(latest.composite_score, &ranking),
                recommendation,
            }),
            "insight",
        ),
        None => Panel::Unavailable(INSUFFICIENT_DATA_MESSAGE.to_string()),
    };

    let trend = TrendSeries {
        metric: request.metric,
        points: selection
            .rows()
            .iter()
            .map(|row| TrendPoint {
                year_month: row.year_month,
                value: request.metric.value(row),
            })
            .collect(),
    };

    debug!(store = %request.store, range = %selection.range, rows = selection.rows().len(), "view built");

    Ok(DashboardView {
        range,
        row_count: selection.rows().len(),
        profile: StoreProfile {
            store_id: latest.store_id.clone(),
            store_name: latest.store_name.clone(),
            region: latest.region.clone(),
            category: latest.category.clone(),
            market_area: latest.market_area.clone(),
        },
        headline: Headline {
            year_month: latest.year_month,
            composite_score: latest.composite_score,
            risk_level: latest.risk_level.clone(),
            cluster: latest.cluster,
        },
        factors: RiskFactor::ALL
            .iter()
            .map(|factor| {
                let value = factor.value(latest);
                ZonedReading {
                    factor: *factor,
                    value,
                    zone: RiskZone::of(value, config.caution_threshold, config.urgent_threshold),
                }
            })
            .collect(),
        ranking,
        thresholds: *config,
        industry,
        clusters,
        trend,
        insight,
    })
}

fn industry_comparison(dataset: &Dataset, latest: &RiskRecord, config: &InsightConfig) -> Result<IndustryComparison> {
    let average = aggregate::group_average(
        dataset,
        GroupKey::Category(latest.category.clone()),
        &Metric::ALL,
    )?;
    let rows = aggregate::compare(latest, &average, &Metric::ALL);
    let average_score = average
        .mean(Metric::Composite)
        .ok_or_else(|| DashboardError::EmptyGroup {
            key: average.key.to_string(),
        })?;

    let gap = latest.composite_score - average_score;
    let band = GapBand::classify(gap, config.gap_threshold);

    Ok(IndustryComparison {
        category: latest.category.clone(),
        rows_in_sample: average.count,
        message: band.message(gap, &latest.category),
        rows,
        average_score,
        gap,
        band,
    })
}

fn cluster_comparison(dataset: &Dataset, latest: &RiskRecord) -> Result<ClusterComparison> {
    let averages = aggregate::cluster_averages(dataset, &Metric::ALL)?;
    let leaders = aggregate::column_leaders(&averages, &Metric::ALL);

    Ok(ClusterComparison {
        current: latest.cluster,
        current_label: cluster_label(latest.cluster).unwrap_or("unlabelled"),
        store_score: latest.composite_score,
        averages,
        leaders,
    })
}
