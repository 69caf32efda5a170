use std::collections::BTreeSet;

use serde::Serialize;

use crate::data::Dataset;
use crate::error::{DashboardError, Result};
use crate::models::{GroupAverage, GroupKey, Metric, MetricMean, RiskRecord};

/// Arithmetic mean of each metric over the rows matching `key`.
pub fn group_average(dataset: &Dataset, key: GroupKey, metrics: &[Metric]) -> Result<GroupAverage> {
    let rows: Vec<&RiskRecord> = dataset
        .records()
        .iter()
        .filter(|record| key.matches(record))
        .collect();

    if rows.is_empty() {
        return Err(DashboardError::EmptyGroup {
            key: key.to_string(),
        });
    }

    let count = rows.len();
    let means = metrics
        .iter()
        .map(|metric| MetricMean {
            metric: *metric,
            mean: rows.iter().map(|record| metric.value(record)).sum::<f64>() / count as f64,
        })
        .collect();

    Ok(GroupAverage { key, count, means })
}

/// One average per cluster present in the dataset, ordered by cluster id.
pub fn cluster_averages(dataset: &Dataset, metrics: &[Metric]) -> Result<Vec<GroupAverage>> {
    let clusters: BTreeSet<u8> = dataset.records().iter().map(|record| record.cluster).collect();

    if clusters.is_empty() {
        return Err(DashboardError::EmptyGroup {
            key: "any cluster".to_string(),
        });
    }

    clusters
        .into_iter()
        .map(|cluster| group_average(dataset, GroupKey::Cluster(cluster), metrics))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ColumnLeader {
    pub metric: Metric,
    pub cluster: u8,
    pub mean: f64,
}

/// For each metric, the cluster with the highest mean. Ties go to the lower id.
pub fn column_leaders(averages: &[GroupAverage], metrics: &[Metric]) -> Vec<ColumnLeader> {
    metrics
        .iter()
        .filter_map(|metric| {
            averages
                .iter()
                .filter_map(|average| match (&average.key, average.mean(*metric)) {
                    (GroupKey::Cluster(cluster), Some(mean)) => Some((*cluster, mean)),
                    _ => None,
                })
                .fold(None, |best: Option<(u8, f64)>, (cluster, mean)| match best {
                    Some((_, best_mean)) if best_mean >= mean => best,
                    _ => Some((cluster, mean)),
                })
                .map(|(cluster, mean)| ColumnLeader {
                    metric: *metric,
                    cluster,
                    mean,
                })
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricComparison {
    pub metric: Metric,
    pub store: f64,
    pub group: f64,
}

impl MetricComparison {
    pub fn gap(&self) -> f64 {
        self.store - self.group
    }
}

/// Pairs the store's own values with a group's means.
pub fn compare(latest: &RiskRecord, average: &GroupAverage, metrics: &[Metric]) -> Vec<MetricComparison> {
    metrics
        .iter()
        .filter_map(|metric| {
            average.mean(*metric).map(|group| MetricComparison {
                metric: *metric,
                store: metric.value(latest),
                group,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::record;

    fn dataset() -> Dataset {
        let mut cafe = record("C1", "202301", 0.8, "very-high", 2);
        cafe.category = "Cafe".to_string();
        cafe.sales = 0.9;

        Dataset::from_records(vec![
            record("S1", "202301", 0.3, "stable", 0),
            record("S1", "202302", 0.6, "high", 1),
            record("S2", "202301", 0.5, "moderate", 1),
            record("S2", "202302", 0.1, "stable", 0),
            cafe,
        ])
        .unwrap()
    }

    #[test]
    fn single_row_group_is_identity() {
        let dataset = dataset();
        let average = group_average(&dataset, GroupKey::Category("Cafe".to_string()), &Metric::ALL).unwrap();
        let row = &dataset.records()[4];

        assert_eq!(average.count, 1);
        for metric in Metric::ALL {
            assert_eq!(average.mean(metric), Some(metric.value(row)));
        }
    }

    #[test]
    fn averages_only_matching_rows() {
        let dataset = dataset();
        let average = group_average(&dataset, GroupKey::Category("Korean".to_string()), &[Metric::Composite]).unwrap();

        assert_eq!(average.count, 4);
        let mean = average.mean(Metric::Composite).unwrap();
        assert!((mean - 0.375).abs() < 1e-9);
        assert_eq!(average.mean(Metric::Sales), None);
    }

    #[test]
    fn empty_group_is_an_error() {
        let dataset = dataset();
        let err = group_average(&dataset, GroupKey::Category("Bakery".to_string()), &Metric::ALL).unwrap_err();
        assert!(matches!(err, DashboardError::EmptyGroup { ref key } if key == "category Bakery"));
    }

    #[test]
    fn one_average_per_cluster_in_id_order() {
        let dataset = dataset();
        let averages = cluster_averages(&dataset, &Metric::ALL).unwrap();

        let keys: Vec<_> = averages.iter().map(|average| average.key.clone()).collect();
        assert_eq!(
            keys,
            vec![GroupKey::Cluster(0), GroupKey::Cluster(1), GroupKey::Cluster(2)]
        );
        for average in &averages {
            let composite = average.mean(Metric::Composite).unwrap();
            assert!((0.0..=1.0).contains(&composite));
        }
        assert!((averages[0].mean(Metric::Composite).unwrap() - 0.2).abs() < 1e-9);
        assert!((averages[1].mean(Metric::Composite).unwrap() - 0.55).abs() < 1e-9);
    }

    #[test]
    fn leaders_pick_the_highest_cluster_mean() {
        let dataset = dataset();
        let averages = cluster_averages(&dataset, &Metric::ALL).unwrap();
        let leaders = column_leaders(&averages, &[Metric::Composite, Metric::Sales, Metric::FootTraffic]);

        assert_eq!(leaders[0].cluster, 2);
        assert_eq!(leaders[1].cluster, 2);
        // All clusters share the fixture's foot-traffic value.
        assert_eq!(leaders[2].cluster, 0);
    }

    #[test]
    fn comparison_pairs_store_and_group_values() {
        let dataset = dataset();
        let latest = &dataset.records()[1];
        let average = group_average(&dataset, GroupKey::Category("Korean".to_string()), &Metric::ALL).unwrap();
        let rows = compare(latest, &average, &Metric::ALL);

        assert_eq!(rows.len(), 5);
        let composite = rows.last().unwrap();
        assert_eq!(composite.metric, Metric::Composite);
        assert!((composite.gap() - (0.6 - 0.375)).abs() < 1e-9);
    }
}
