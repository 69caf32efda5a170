//! Rule-based interpretation of a store's latest risk reading.
//!
//! Two independent classifiers feed the narrative: the upstream risk level
//! picks one of four recommendation templates, and the gap to a group
//! average picks one of three inline bands. Nothing here cross-checks the
//! two, so callers show both side by side.

use serde::Serialize;

use crate::error::Result;
use crate::models::{RiskFactor, RiskLevel, RiskRecord};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FactorReading {
    pub factor: RiskFactor,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FactorRanking {
    pub top: FactorReading,
    pub bottom: FactorReading,
}

/// Highest and lowest of the four risk probabilities.
///
/// Ties resolve to the factor declared first in [`RiskFactor::ALL`].
pub fn rank_factors(latest: &RiskRecord) -> FactorRanking {
    let read = |factor: RiskFactor| FactorReading {
        factor,
        value: factor.value(latest),
    };

    let first = read(RiskFactor::ALL[0]);
    let rest = RiskFactor::ALL[1..].iter().map(|factor| read(*factor));

    let (top, bottom) = rest.fold((first, first), |(top, bottom), reading| {
        let top = if reading.value > top.value { reading } else { top };
        let bottom = if reading.value < bottom.value { reading } else { bottom };
        (top, bottom)
    });

    FactorRanking { top, bottom }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Critical,
    Warning,
    Info,
    Success,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub level: RiskLevel,
    pub tone: Tone,
    pub gap: f64,
    pub headline: String,
    pub actions: Vec<&'static str>,
}

const VERY_HIGH_ACTIONS: [&str; 3] = [
    "Secure regulars and strengthen return-visit events",
    "Rebuild trust by actively managing reviews",
    "Focus new-customer acquisition on external channels such as social media and delivery apps",
];

const HIGH_ACTIONS: [&str; 3] = [
    "Introduce a loyalty program with point rewards",
    "Plan marketing that sets the store apart from competitors in its category",
    "Pinpoint the months where sales dropped and concentrate improvements there",
];

const MODERATE_ACTIONS: [&str; 3] = [
    "Review the causes behind months with large sales swings",
    "Keep new-customer acquisition balanced against return-visit rates",
    "Benchmark stable stores in the same category",
];

const STABLE_ACTIONS: [&str; 3] = [
    "Keep customer experience quality steady (service, taste, hygiene)",
    "Continue regular-customer care and local retention efforts",
    "Monitor market-area changes such as foot traffic and new openings",
];

/// Maps an upstream risk level label to its recommendation.
///
/// Only the level chooses the template; `gap` is interpolated into the text.
/// Labels outside the four known levels are rejected.
pub fn classify(level: &str, gap: f64) -> Result<Recommendation> {
    let level: RiskLevel = level.parse()?;

    let (tone, headline, actions) = match level {
        RiskLevel::VeryHigh => (
            Tone::Critical,
            format!("Very high risk, {gap:+.2}p against the industry average."),
            VERY_HIGH_ACTIONS,
        ),
        RiskLevel::High => (
            Tone::Warning,
            format!("High risk, {gap:+.2}p against the industry average; attention needed."),
            HIGH_ACTIONS,
        ),
        RiskLevel::Moderate => (
            Tone::Info,
            format!("Moderate risk, {gap:+.2}p against the industry average; keep monitoring."),
            MODERATE_ACTIONS,
        ),
        RiskLevel::Stable => (
            Tone::Success,
            format!(
                "Stable, {:.2}p {} the industry average.",
                gap.abs(),
                if gap < 0.0 { "below" } else { "in line with" }
            ),
            STABLE_ACTIONS,
        ),
    };

    Ok(Recommendation {
        level,
        tone,
        gap,
        headline,
        actions: actions.to_vec(),
    })
}

impl Recommendation {
    /// Full narrative for the overall-insight section.
    pub fn summary(&self, score: f64, ranking: &FactorRanking) -> String {
        let gap = self.gap;
        let top = ranking.top.factor.label();
        let bottom = ranking.bottom.factor.label();

        match self.level {
            RiskLevel::VeryHigh => format!(
                "The store's composite risk score is {score:.2}, a very high level. \
                 {top} stands out in particular, at {gap:+.2}p against the industry average. \
                 This points to tougher local competition and weakening customer retention."
            ),
            RiskLevel::High => format!(
                "The store's composite risk score is {score:.2}, {gap:+.2}p against the \
                 industry average, so attention is needed. The main risk factor right now is \
                 {top}; the most stable one is {bottom}."
            ),
            RiskLevel::Moderate => format!(
                "Risk is moderate ({score:.2}). Short-term risk is low but the trend needs \
                 monitoring. {top} has room to improve, and the gap to the industry average \
                 is {gap:+.2}p."
            ),
            RiskLevel::Stable => format!(
                "The store is stable ({score:.2}), {:.2}p {} the industry average. \
                 All main factors remain in the stable zone.",
                gap.abs(),
                if gap < 0.0 { "below" } else { "in line with" }
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GapBand {
    Elevated,
    Improved,
    Comparable,
}

impl GapBand {
    pub fn classify(gap: f64, threshold: f64) -> Self {
        if gap > threshold {
            GapBand::Elevated
        } else if gap < -threshold {
            GapBand::Improved
        } else {
            GapBand::Comparable
        }
    }

    pub fn message(&self, gap: f64, group: &str) -> String {
        match self {
            GapBand::Elevated => format!(
                "{gap:.2}p above the {group} average; risk is high relative to competitors."
            ),
            GapBand::Improved => format!(
                "{:.2}p below the {group} average; relatively stable.",
                gap.abs()
            ),
            GapBand::Comparable => {
                format!("Risk is at a level similar to the {group} average.")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskZone {
    Normal,
    Caution,
    Urgent,
}

impl RiskZone {
    pub fn of(value: f64, caution: f64, urgent: f64) -> Self {
        if value >= urgent {
            RiskZone::Urgent
        } else if value >= caution {
            RiskZone::Caution
        } else {
            RiskZone::Normal
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RiskZone::Normal => "normal",
            RiskZone::Caution => "caution",
            RiskZone::Urgent => "act now",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::record;
    use crate::error::DashboardError;

    #[test]
    fn ranks_highest_and_lowest_factor() {
        let latest = record("S1", "202301", 0.5, "high", 0);
        let ranking = rank_factors(&latest);
        assert_eq!(ranking.top.factor, RiskFactor::Sales);
        assert_eq!(ranking.top.value, 0.4);
        assert_eq!(ranking.bottom.factor, RiskFactor::FootTraffic);
    }

    #[test]
    fn ties_resolve_to_declared_order() {
        let mut latest = record("S1", "202301", 0.5, "high", 0);
        latest.new_customer = 0.7;
        latest.sales = 0.2;
        latest.return_visit = 0.7;
        latest.foot_traffic = 0.2;

        let ranking = rank_factors(&latest);
        assert_eq!(ranking.top.factor, RiskFactor::NewCustomer);
        assert_eq!(ranking.bottom.factor, RiskFactor::Sales);
    }

    #[test]
    fn ranking_is_idempotent() {
        let latest = record("S1", "202301", 0.5, "high", 0);
        assert_eq!(rank_factors(&latest), rank_factors(&latest));
    }

    #[test]
    fn very_high_template_has_three_actions() {
        let recommendation = classify("very-high", 0.15).unwrap();
        assert_eq!(recommendation.level, RiskLevel::VeryHigh);
        assert_eq!(recommendation.tone, Tone::Critical);
        assert_eq!(recommendation.actions.len(), 3);
        assert!(recommendation.headline.contains("+0.15p"));
    }

    #[test]
    fn gap_does_not_change_the_template() {
        let above = classify("moderate", 0.4).unwrap();
        let below = classify("moderate", -0.4).unwrap();
        assert_eq!(above.tone, below.tone);
        assert_eq!(above.actions, below.actions);
    }

    #[test]
    fn every_level_selects_its_own_tone() {
        let tones: Vec<Tone> = ["very-high", "high", "moderate", "stable"]
            .iter()
            .map(|level| classify(level, 0.0).unwrap().tone)
            .collect();
        assert_eq!(tones, vec![Tone::Critical, Tone::Warning, Tone::Info, Tone::Success]);
    }

    #[test]
    fn unknown_level_is_not_treated_as_stable() {
        let err = classify("low", -0.2).unwrap_err();
        assert!(matches!(err, DashboardError::UnknownRiskLevel(label) if label == "low"));
    }

    #[test]
    fn summary_mentions_factors_and_signed_gap() {
        let latest = record("S1", "202301", 0.62, "high", 0);
        let ranking = rank_factors(&latest);
        let summary = classify("high", 0.12).unwrap().summary(latest.composite_score, &ranking);
        assert!(summary.contains("0.62"));
        assert!(summary.contains("+0.12p"));
        assert!(summary.contains("Sales decline"));
        assert!(summary.contains("Foot-traffic decline"));
    }

    #[test]
    fn very_high_summary_names_top_factor_and_gap() {
        let latest = record("S1", "202301", 0.91, "very-high", 2);
        let summary = classify("very-high", 0.27)
            .unwrap()
            .summary(latest.composite_score, &rank_factors(&latest));
        assert!(summary.contains("0.91, a very high level"));
        assert!(summary.contains("Sales decline stands out"));
        assert!(summary.contains("+0.27p against the industry average"));
    }

    #[test]
    fn moderate_summary_keeps_negative_gap_sign() {
        let latest = record("S1", "202301", 0.44, "moderate", 1);
        let summary = classify("moderate", -0.05)
            .unwrap()
            .summary(latest.composite_score, &rank_factors(&latest));
        assert!(summary.contains("Risk is moderate (0.44)"));
        assert!(summary.contains("Sales decline has room to improve"));
        assert!(summary.contains("is -0.05p"));
    }

    #[test]
    fn stable_summary_uses_absolute_gap() {
        let latest = record("S1", "202301", 0.2, "stable", 0);
        let summary = classify("stable", -0.18)
            .unwrap()
            .summary(latest.composite_score, &rank_factors(&latest));
        assert!(summary.contains("0.18p below"));
    }

    #[test]
    fn gap_bands_use_strict_threshold() {
        assert_eq!(GapBand::classify(0.15, 0.1), GapBand::Elevated);
        assert_eq!(GapBand::classify(-0.15, 0.1), GapBand::Improved);
        assert_eq!(GapBand::classify(0.1, 0.1), GapBand::Comparable);
        assert_eq!(GapBand::classify(-0.1, 0.1), GapBand::Comparable);
    }

    #[test]
    fn band_messages_interpolate_the_gap() {
        assert!(GapBand::Elevated.message(0.23, "Korean").contains("0.23p above the Korean average"));
        assert!(GapBand::Improved.message(-0.23, "Korean").contains("0.23p below"));
    }

    #[test]
    fn zones_follow_thresholds() {
        assert_eq!(RiskZone::of(0.2, 0.5, 0.7), RiskZone::Normal);
        assert_eq!(RiskZone::of(0.5, 0.5, 0.7), RiskZone::Caution);
        assert_eq!(RiskZone::of(0.71, 0.5, 0.7), RiskZone::Urgent);
    }
}
