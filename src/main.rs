use std::io;
use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod aggregate;
mod browse;
mod config;
mod data;
mod error;
mod insight;
mod models;
mod report;
mod selection;
mod view;

use config::Config;
use error::DashboardError;
use models::{DateRange, Metric, YearMonth};
use view::{ViewRequest, NO_DATA_MESSAGE};

#[derive(Parser)]
#[command(name = "store-risk")]
#[command(about = "Restaurant store risk dashboard over precomputed monthly scores", long_about = None)]
struct Cli {
    /// Settings file (defaults to .riskdash.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Markdown,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// List store ids in the dataset
    Stores {
        #[arg(long)]
        limit: Option<usize>,
    },
    /// List the months available for range selection
    Months,
    /// Print the dashboard for one store
    View {
        #[arg(long)]
        store: String,
        #[arg(long)]
        from: Option<YearMonth>,
        #[arg(long)]
        to: Option<YearMonth>,
        /// composite, sales, return-visit, new-customer or foot-traffic
        #[arg(long)]
        metric: Option<Metric>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Markdown)]
        format: OutputFormat,
    },
    /// Write the dashboard for one store as a markdown report
    Report {
        #[arg(long)]
        store: String,
        #[arg(long)]
        from: Option<YearMonth>,
        #[arg(long)]
        to: Option<YearMonth>,
        #[arg(long)]
        metric: Option<Metric>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Explore stores interactively
    Browse,
    /// Write a default .riskdash.toml
    InitConfig,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    let config = Config::resolve(cli.config.as_deref())?;

    match cli.command {
        Commands::Stores { limit } => {
            let dataset = data::load()?;
            let limit = limit.unwrap_or(usize::MAX);
            for store in dataset.stores().iter().take(limit) {
                println!("{store}");
            }
        }
        Commands::Months => {
            let dataset = data::load()?;
            for month in dataset.months() {
                println!("{month}");
            }
        }
        Commands::View {
            store,
            from,
            to,
            metric,
            format,
        } => {
            let dataset = data::load()?;
            let request = ViewRequest {
                store,
                range: resolve_range(dataset, from, to),
                metric: metric.unwrap_or(config.report.default_metric),
            };

            match view::build_view(dataset, &request, &config.insight) {
                Ok(view) => match format {
                    OutputFormat::Markdown => print!("{}", report::render_markdown(&view, Utc::now())),
                    OutputFormat::Json => println!(
                        "{}",
                        serde_json::to_string_pretty(&view).context("failed to encode view")?
                    ),
                },
                Err(err @ DashboardError::SelectionEmpty { .. }) => {
                    info!(error = %err, "nothing to show");
                    println!("{NO_DATA_MESSAGE}");
                }
                Err(err) => return Err(err.into()),
            }
        }
        Commands::Report {
            store,
            from,
            to,
            metric,
            out,
        } => {
            let dataset = data::load()?;
            let request = ViewRequest {
                store,
                range: resolve_range(dataset, from, to),
                metric: metric.unwrap_or(config.report.default_metric),
            };

            match view::build_view(dataset, &request, &config.insight) {
                Ok(view) => {
                    let out = out.unwrap_or_else(|| PathBuf::from(&config.report.output));
                    let report = report::render_markdown(&view, Utc::now());
                    std::fs::write(&out, report)
                        .with_context(|| format!("failed to write report to {}", out.display()))?;
                    println!("Report written to {}.", out.display());
                }
                Err(err @ DashboardError::SelectionEmpty { .. }) => {
                    info!(error = %err, "nothing to report");
                    println!("{NO_DATA_MESSAGE}");
                }
                Err(err) => return Err(err.into()),
            }
        }
        Commands::Browse => {
            let dataset = data::load()?;
            let stdin = io::stdin();
            browse::Session::new(dataset, config.insight, config.report.default_metric)
                .run(stdin.lock(), io::stdout())?;
        }
        Commands::InitConfig => {
            let path = std::path::Path::new(config::DEFAULT_CONFIG_FILE);
            anyhow::ensure!(
                !path.exists(),
                "{} already exists; edit it or remove it first",
                path.display()
            );
            std::fs::write(path, Config::default_toml()?)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Created {}.", path.display());
        }
    }

    Ok(())
}

/// Missing ends default to the dataset's first and last month.
fn resolve_range(
    dataset: &data::Dataset,
    from: Option<YearMonth>,
    to: Option<YearMonth>,
) -> Option<DateRange> {
    if from.is_none() && to.is_none() {
        return None;
    }
    let months = dataset.months();
    let start = from.or_else(|| months.first().copied())?;
    let end = to.or_else(|| months.last().copied())?;
    Some(DateRange::new(start, end))
}

fn init_logging(cli: &Cli) {
    let level = if cli.verbose {
        Level::DEBUG
    } else if cli.quiet {
        Level::ERROR
    } else {
        Level::WARN
    };

    // RUST_LOG overrides the flag-derived level.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .compact()
        .finish();

    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("failed to install logger: {err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::{month, record};
    use crate::data::Dataset;

    fn dataset() -> Dataset {
        Dataset::from_records(vec![
            record("S1", "202302", 0.3, "stable", 0),
            record("S1", "202303", 0.6, "high", 1),
            record("S2", "202301", 0.2, "stable", 2),
            record("S2", "202306", 0.4, "moderate", 2),
        ])
        .unwrap()
    }

    #[test]
    fn no_bounds_leaves_range_to_the_store_span() {
        assert_eq!(resolve_range(&dataset(), None, None), None);
    }

    #[test]
    fn missing_end_falls_back_to_dataset_months() {
        let dataset = dataset();
        assert_eq!(
            resolve_range(&dataset, Some(month("202302")), None),
            Some(DateRange::new(month("202302"), month("202306")))
        );
        assert_eq!(
            resolve_range(&dataset, None, Some(month("202303"))),
            Some(DateRange::new(month("202301"), month("202303")))
        );
    }

    #[test]
    fn explicit_bounds_pass_through() {
        let range = resolve_range(&dataset(), Some(month("202303")), Some(month("202305")));
        assert_eq!(range, Some(DateRange::new(month("202303"), month("202305"))));
    }
}
