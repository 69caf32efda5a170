use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

use once_cell::sync::OnceCell;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{DashboardError, Result};
use crate::models::{cluster_label, DateRange, RiskRecord, YearMonth};

/// Where the upstream scoring job drops its export.
pub const DATA_PATH: &str = "./store_risk.csv";

static DATASET: OnceCell<Dataset> = OnceCell::new();

/// Returns the process-wide dataset, reading it on first use.
///
/// Concurrent first callers block until the single read finishes. A failed
/// read is not cached, so the next call retries.
pub fn load() -> Result<&'static Dataset> {
    load_cached(&DATASET, Path::new(DATA_PATH))
}

fn load_cached<'a>(cell: &'a OnceCell<Dataset>, path: &Path) -> Result<&'a Dataset> {
    cell.get_or_try_init(|| load_from(path))
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(alias = "가맹점구분번호")]
    store_id: String,
    #[serde(default, alias = "가맹점명")]
    store_name: Option<String>,
    #[serde(alias = "가맹점지역")]
    region: String,
    #[serde(alias = "업종")]
    category: String,
    #[serde(alias = "상권")]
    market_area: String,
    #[serde(alias = "기준년월")]
    year_month: String,
    #[serde(alias = "p_신규")]
    new_customer: f64,
    #[serde(alias = "p_매출")]
    sales: f64,
    #[serde(alias = "p_재방문")]
    return_visit: f64,
    #[serde(alias = "p_거주유동")]
    foot_traffic: f64,
    #[serde(alias = "종합위험지수")]
    composite_score: f64,
    #[serde(alias = "종합위험레벨")]
    risk_level: String,
    cluster: String,
}

impl CsvRow {
    fn into_record(self) -> std::result::Result<RiskRecord, String> {
        let year_month: YearMonth = self.year_month.parse().map_err(|err| format!("{err}"))?;
        let cluster = parse_cluster(&self.cluster)?;

        let store_name = self.store_name.filter(|name| !name.trim().is_empty());

        Ok(RiskRecord {
            store_id: self.store_id.trim().to_string(),
            store_name,
            region: self.region,
            category: self.category,
            market_area: self.market_area,
            year_month,
            new_customer: self.new_customer,
            sales: self.sales,
            return_visit: self.return_visit,
            foot_traffic: self.foot_traffic,
            composite_score: self.composite_score,
            risk_level: self.risk_level.trim().to_string(),
            cluster,
        })
    }
}

/// Cluster ids arrive as `1` or, from float columns, `1.0`.
fn parse_cluster(raw: &str) -> std::result::Result<u8, String> {
    let trimmed = raw.trim();
    let digits = trimmed.strip_suffix(".0").unwrap_or(trimmed);
    digits
        .parse()
        .map_err(|_| format!("invalid cluster id '{raw}'"))
}

pub fn load_from(path: &Path) -> Result<Dataset> {
    let started = Instant::now();
    let unavailable = |reason: String| DashboardError::DataUnavailable {
        path: path.to_path_buf(),
        reason,
    };

    let mut reader = csv::Reader::from_path(path).map_err(|err| unavailable(err.to_string()))?;
    let mut records = Vec::new();

    for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
        // Header is line 1.
        let line = index + 2;
        let row = result.map_err(|err| unavailable(format!("line {line}: {err}")))?;
        let record = row
            .into_record()
            .map_err(|reason| unavailable(format!("line {line}: {reason}")))?;
        records.push(record);
    }

    let dataset = Dataset::from_records(records).map_err(|err| match err {
        DashboardError::DataUnavailable { reason, .. } => unavailable(reason),
        other => other,
    })?;

    info!(
        path = %path.display(),
        rows = dataset.len(),
        stores = dataset.stores().len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "dataset loaded"
    );
    Ok(dataset)
}

/// Read-only table of risk observations.
#[derive(Debug, Clone)]
pub struct Dataset {
    records: Vec<RiskRecord>,
    stores: Vec<String>,
    months: Vec<YearMonth>,
}

impl Dataset {
    /// Validates an in-memory table.
    pub fn from_records(records: Vec<RiskRecord>) -> Result<Self> {
        let invalid = |reason: String| DashboardError::DataUnavailable {
            path: PathBuf::from("<memory>"),
            reason,
        };

        if records.is_empty() {
            return Err(invalid("dataset has no rows".to_string()));
        }

        for record in &records {
            if record.store_id.is_empty() {
                return Err(invalid(format!(
                    "row for {} has an empty store id",
                    record.year_month
                )));
            }
            let values = [
                record.new_customer,
                record.sales,
                record.return_visit,
                record.foot_traffic,
                record.composite_score,
            ];
            if values.iter().any(|value| !value.is_finite()) {
                return Err(invalid(format!(
                    "store {} at {} has a non-finite risk value",
                    record.store_id, record.year_month
                )));
            }
            if cluster_label(record.cluster).is_none() {
                return Err(invalid(format!(
                    "store {} at {} has unknown cluster {}",
                    record.store_id, record.year_month, record.cluster
                )));
            }
        }

        let stores: Vec<String> = {
            let mut seen = HashSet::new();
            records
                .iter()
                .filter(|record| seen.insert(record.store_id.as_str()))
                .map(|record| record.store_id.clone())
                .collect()
        };

        let mut months: Vec<YearMonth> = records.iter().map(|record| record.year_month).collect();
        months.sort();
        months.dedup();

        debug!(rows = records.len(), months = months.len(), "dataset validated");
        Ok(Self {
            records,
            stores,
            months,
        })
    }

    pub fn records(&self) -> &[RiskRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Distinct store ids in order of first appearance.
    pub fn stores(&self) -> &[String] {
        &self.stores
    }

    /// Distinct months, ascending.
    pub fn months(&self) -> &[YearMonth] {
        &self.months
    }

    pub fn contains_store(&self, store_id: &str) -> bool {
        self.stores.iter().any(|store| store == store_id)
    }

    /// First and last month observed for a store.
    pub fn store_span(&self, store_id: &str) -> Option<DateRange> {
        let mut months = self
            .records
            .iter()
            .filter(|record| record.store_id == store_id)
            .map(|record| record.year_month);
        let first = months.next()?;
        let (start, end) = months.fold((first, first), |(lo, hi), month| {
            (lo.min(month), hi.max(month))
        });
        Some(DateRange::new(start, end))
    }
}


#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::fixtures::{month, record};
    use super::*;

    const KOREAN_HEADER: &str = "가맹점구분번호,가맹점명,가맹점지역,업종,상권,기준년월,p_신규,p_매출,p_재방문,p_거주유동,종합위험지수,종합위험레벨,cluster";

    fn write_csv(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn loads_korean_headers() {
        let file = write_csv(&format!(
            "{KOREAN_HEADER}\n\
             A1,Mapo Noodle,Mapo-gu,Noodles,Hongdae,202302,0.31,0.52,0.44,0.12,0.41,보통,1.0\n\
             A1,Mapo Noodle,Mapo-gu,Noodles,Hongdae,202301,0.21,0.42,0.34,0.10,0.33,안정,1.0\n"
        ));

        let dataset = load_from(file.path()).unwrap();
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.stores(), ["A1".to_string()]);
        assert_eq!(dataset.months(), [month("202301"), month("202302")]);
        assert_eq!(dataset.records()[0].cluster, 1);
        assert_eq!(dataset.records()[0].store_name.as_deref(), Some("Mapo Noodle"));
    }

    #[test]
    fn loads_english_headers_without_store_name() {
        let file = write_csv(
            "store_id,region,category,market_area,year_month,new_customer,sales,return_visit,foot_traffic,composite_score,risk_level,cluster\n\
             B7,Jung-gu,Cafe,Myeongdong,2023-05,0.1,0.2,0.3,0.4,0.25,stable,2\n",
        );

        let dataset = load_from(file.path()).unwrap();
        let row = &dataset.records()[0];
        assert_eq!(row.store_name, None);
        assert_eq!(row.year_month, month("202305"));
        assert_eq!(row.risk_level, "stable");
    }

    #[test]
    fn cached_load_reads_once_and_reuses_the_table() {
        let file = write_csv(&format!(
            "{KOREAN_HEADER}\n\
             S1,,Mapo-gu,Noodles,Hongdae,202301,0.2,0.4,0.3,0.1,0.3,안정,0\n\
             S1,,Mapo-gu,Noodles,Hongdae,202303,0.2,0.4,0.3,0.1,0.9,매우 높음,2\n\
             S1,,Mapo-gu,Noodles,Hongdae,202302,0.2,0.4,0.3,0.1,0.6,높음,1\n"
        ));
        let cell = OnceCell::new();

        let first = load_cached(&cell, file.path()).unwrap();
        // Rewriting the file must not change what the cache hands back.
        std::fs::write(file.path(), format!("{KOREAN_HEADER}\n")).unwrap();
        let second = load_cached(&cell, file.path()).unwrap();

        assert!(std::ptr::eq(first, second));
        assert_eq!(second.len(), 3);
        let full = DateRange::new(month("202301"), month("202303"));
        let selection = crate::selection::select(second, "S1", full).unwrap();
        assert_eq!(selection.latest().composite_score, 0.9);
    }

    #[test]
    fn failed_load_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store_risk.csv");
        let cell = OnceCell::new();

        let err = load_cached(&cell, &path).unwrap_err();
        assert!(matches!(err, DashboardError::DataUnavailable { .. }));
        assert!(cell.get().is_none());

        std::fs::write(
            &path,
            format!("{KOREAN_HEADER}\nS1,,Mapo-gu,Noodles,Hongdae,202301,0.2,0.4,0.3,0.1,0.3,안정,0\n"),
        )
        .unwrap();
        let dataset = load_cached(&cell, &path).unwrap();
        assert_eq!(dataset.stores(), ["S1".to_string()]);
    }

    #[test]
    fn missing_file_is_data_unavailable() {
        let err = load_from(Path::new("/nonexistent/store_risk.csv")).unwrap_err();
        assert!(matches!(err, DashboardError::DataUnavailable { .. }));
    }

    #[test]
    fn malformed_row_reports_its_line() {
        let file = write_csv(&format!(
            "{KOREAN_HEADER}\n\
             A1,,Mapo-gu,Noodles,Hongdae,202301,0.2,0.4,0.3,0.1,0.3,안정,0\n\
             A1,,Mapo-gu,Noodles,Hongdae,202302,high,0.4,0.3,0.1,0.3,안정,0\n"
        ));

        let err = load_from(file.path()).unwrap_err();
        match err {
            DashboardError::DataUnavailable { reason, path } => {
                assert!(reason.contains("line 3"), "{reason}");
                assert_eq!(path, file.path());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unknown_cluster_is_rejected_at_load() {
        let file = write_csv(&format!(
            "{KOREAN_HEADER}\n\
             A1,,Mapo-gu,Noodles,Hongdae,202301,0.2,0.4,0.3,0.1,0.3,안정,7\n"
        ));

        let err = load_from(file.path()).unwrap_err();
        assert!(err.to_string().contains("unknown cluster 7"), "{err}");
    }

    #[test]
    fn header_only_file_is_rejected() {
        let file = write_csv(&format!("{KOREAN_HEADER}\n"));
        let err = load_from(file.path()).unwrap_err();
        assert!(err.to_string().contains("no rows"));
    }

    #[test]
    fn from_records_rejects_non_finite_scores() {
        let mut bad = record("S1", "202301", 0.5, "high", 0);
        bad.sales = f64::NAN;
        assert!(Dataset::from_records(vec![bad]).is_err());
    }

    #[test]
    fn stores_keep_first_appearance_order() {
        let dataset = Dataset::from_records(vec![
            record("S2", "202302", 0.5, "moderate", 0),
            record("S1", "202301", 0.3, "stable", 1),
            record("S2", "202301", 0.4, "moderate", 0),
        ])
        .unwrap();

        assert_eq!(dataset.stores(), ["S2".to_string(), "S1".to_string()]);
        assert_eq!(
            dataset.store_span("S2"),
            Some(DateRange::new(month("202301"), month("202302")))
        );
        assert_eq!(dataset.store_span("S9"), None);
        assert!(dataset.contains_store("S1"));
    }
}
