use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::models::{GroupKey, Metric, KNOWN_CLUSTERS};
use crate::view::{DashboardView, Panel};

pub fn render_markdown(view: &DashboardView, generated_at: DateTime<Utc>) -> String {
    let mut output = String::new();
    let profile = &view.profile;
    let headline = &view.headline;

    let _ = writeln!(output, "# Store Risk Dashboard (3-month outlook)");
    let _ = writeln!(
        output,
        "Generated {} for {} over {} ({} months)",
        generated_at.format("%Y-%m-%d %H:%M UTC"),
        profile.store_id,
        view.range,
        view.row_count
    );
    let _ = writeln!(output);

    let mut info = Vec::new();
    if let Some(name) = &profile.store_name {
        info.push(format!("**Store**: {name}"));
    }
    info.push(format!("**Region**: {}", profile.region));
    info.push(format!("**Category**: {}", profile.category));
    info.push(format!("**Market area**: {}", profile.market_area));
    let _ = writeln!(output, "{}", info.join(" | "));
    let _ = writeln!(output);

    let _ = writeln!(output, "| Latest month | Composite score | Risk level | Cluster |");
    let _ = writeln!(output, "|---|---|---|---|");
    let _ = writeln!(
        output,
        "| {} | {:.2} | {} | Cluster {} |",
        headline.year_month, headline.composite_score, headline.risk_level, headline.cluster
    );
    let _ = writeln!(output);

    let _ = writeln!(output, "## Predicted Risk by Factor");
    for reading in &view.factors {
        let _ = writeln!(
            output,
            "- {}: {:.2} ({})",
            reading.factor.label(),
            reading.value,
            reading.zone.label()
        );
    }
    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "Highest risk: **{} ({:.2})**. Most stable: {} ({:.2}).",
        view.ranking.top.factor.label(),
        view.ranking.top.value,
        view.ranking.bottom.factor.label(),
        view.ranking.bottom.value
    );
    let _ = writeln!(
        output,
        "Higher values mean a higher chance of decline in three months; {:.1} and above is the caution zone, {:.1} and above needs immediate action.",
        view.thresholds.caution_threshold, view.thresholds.urgent_threshold
    );
    let _ = writeln!(output);

    let _ = writeln!(output, "## Industry Comparison");
    match &view.industry {
        Panel::Ready(industry) => {
            let _ = writeln!(
                output,
                "| Metric | This store | {} average | Gap |",
                industry.category
            );
            let _ = writeln!(output, "|---|---|---|---|");
            for row in &industry.rows {
                let _ = writeln!(
                    output,
                    "| {} | {:.2} | {:.2} | {:+.2} |",
                    row.metric.label(),
                    row.store,
                    row.group,
                    row.gap()
                );
            }
            let _ = writeln!(output);
            let _ = writeln!(output, "{}", industry.message);
            let _ = writeln!(
                output,
                "The {} average composite score is {:.2} across {} rows; this store sits at {:.2}, a {} level.",
                industry.category,
                industry.average_score,
                industry.rows_in_sample,
                headline.composite_score,
                if industry.gap > 0.0 { "somewhat higher" } else { "similar" }
            );
        }
        Panel::Unavailable(message) => {
            let _ = writeln!(output, "{message}");
        }
    }
    let _ = writeln!(output);

    let _ = writeln!(output, "## Cluster Comparison");
    match &view.clusters {
        Panel::Ready(clusters) => {
            let _ = writeln!(
                output,
                "This store belongs to **cluster {}** ({}); its composite score is {:.2}.",
                clusters.current, clusters.current_label, clusters.store_score
            );
            let _ = writeln!(output);

            let header: Vec<&str> = Metric::ALL.iter().map(|metric| metric.label()).collect();
            let _ = writeln!(output, "| Cluster | {} |", header.join(" | "));
            let _ = writeln!(output, "|---|{}", "---|".repeat(Metric::ALL.len()));
            for average in &clusters.averages {
                let GroupKey::Cluster(cluster) = average.key else {
                    continue;
                };
                let cells: Vec<String> = Metric::ALL
                    .iter()
                    .map(|metric| {
                        let mean = average.mean(*metric).unwrap_or(f64::NAN);
                        let leads = clusters
                            .leaders
                            .iter()
                            .any(|leader| leader.metric == *metric && leader.cluster == cluster);
                        if leads {
                            format!("**{mean:.2}**")
                        } else {
                            format!("{mean:.2}")
                        }
                    })
                    .collect();
                let _ = writeln!(output, "| {} | {} |", cluster, cells.join(" | "));
            }
            let _ = writeln!(output);
            let _ = writeln!(output, "Cluster profiles:");
            for (id, label) in KNOWN_CLUSTERS {
                let _ = writeln!(output, "- Cluster {id}: {label}");
            }
        }
        Panel::Unavailable(message) => {
            let _ = writeln!(output, "{message}");
        }
    }
    let _ = writeln!(output);

    let _ = writeln!(output, "## Monthly Trend: {}", view.trend.metric);
    for point in &view.trend.points {
        let _ = writeln!(output, "- {}: {:.2}", point.year_month, point.value);
    }
    let _ = writeln!(output);

    let _ = writeln!(output, "## Overall Insight");
    match &view.insight {
        Panel::Ready(insight) => {
            let _ = writeln!(
                output,
                "[{:?}] {}",
                insight.recommendation.tone, insight.recommendation.headline
            );
            let _ = writeln!(output, "Risk level: {}", insight.recommendation.level);
            let _ = writeln!(output);
            let _ = writeln!(output, "{}", insight.summary);
            let _ = writeln!(output);
            let _ = writeln!(output, "### Recommended Actions");
            for action in &insight.recommendation.actions {
                let _ = writeln!(output, "- {action}");
            }
        }
        Panel::Unavailable(message) => {
            let _ = writeln!(output, "{message}");
        }
    }

    output
}
