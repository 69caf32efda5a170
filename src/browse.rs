//! Line-oriented interactive session.
//!
//! Each command adjusts the current request; `show` recomputes the whole
//! view from the shared dataset, the way the dashboard reruns on every
//! widget change.

use std::io::{BufRead, Write};

use anyhow::Result;
use chrono::Utc;
use tracing::debug;

use crate::config::InsightConfig;
use crate::data::Dataset;
use crate::error::DashboardError;
use crate::models::{DateRange, Metric, YearMonth};
use crate::report;
use crate::view::{self, ViewRequest, NO_DATA_MESSAGE};

const HELP: &str = "\
Commands:
  stores                 list store ids
  months                 list available months
  store <id>             pick a store (range resets to its own span)
  range <from> <to>      limit the period, e.g. range 202301 202306
  range <month>          a single month
  range all              go back to the store's own span
  metrics                list trend metrics
  metric <name>          pick the trend metric
  show                   render the dashboard
  help                   this message
  quit                   leave";

#[derive(Debug, PartialEq)]
enum Command {
    Stores,
    Months,
    Store(String),
    Range(Option<DateRange>),
    Metrics,
    Metric(Metric),
    Show,
    Help,
    Quit,
}

fn parse_command(line: &str) -> std::result::Result<Command, String> {
    let mut parts = line.split_whitespace();
    let Some(verb) = parts.next() else {
        return Err("empty command".to_string());
    };
    let args: Vec<&str> = parts.collect();

    match (verb.to_lowercase().as_str(), args.as_slice()) {
        ("stores", []) => Ok(Command::Stores),
        ("months", []) => Ok(Command::Months),
        ("store", [id]) => Ok(Command::Store((*id).to_string())),
        ("range", ["all"]) => Ok(Command::Range(None)),
        ("range", [month]) => {
            let month: YearMonth = month.parse().map_err(|err: DashboardError| err.to_string())?;
            Ok(Command::Range(Some(DateRange::single(month))))
        }
        ("range", [from, to]) => {
            let from: YearMonth = from.parse().map_err(|err: DashboardError| err.to_string())?;
            let to: YearMonth = to.parse().map_err(|err: DashboardError| err.to_string())?;
            Ok(Command::Range(Some(DateRange::new(from, to))))
        }
        ("metrics", []) => Ok(Command::Metrics),
        ("metric", [name]) => name
            .parse()
            .map(Command::Metric)
            .map_err(|err: DashboardError| err.to_string()),
        ("show", []) => Ok(Command::Show),
        ("help" | "?", []) => Ok(Command::Help),
        ("quit" | "exit" | "q", []) => Ok(Command::Quit),
        _ => Err(format!("unrecognized command '{}'; type help", line.trim())),
    }
}

pub struct Session<'a> {
    dataset: &'a Dataset,
    config: InsightConfig,
    request: Option<ViewRequest>,
    metric: Metric,
}

impl<'a> Session<'a> {
    pub fn new(dataset: &'a Dataset, config: InsightConfig, metric: Metric) -> Self {
        Self {
            dataset,
            config,
            request: None,
            metric,
        }
    }

    pub fn run<R: BufRead, W: Write>(&mut self, input: R, mut output: W) -> Result<()> {
        writeln!(
            output,
            "{} stores, {} months loaded. Type help for commands.",
            self.dataset.stores().len(),
            self.dataset.months().len()
        )?;

        for line in input.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            match parse_command(&line) {
                Ok(Command::Quit) => break,
                Ok(command) => self.apply(command, &mut output)?,
                Err(message) => writeln!(output, "{message}")?,
            }
        }

        Ok(())
    }

    fn apply<W: Write>(&mut self, command: Command, output: &mut W) -> Result<()> {
        debug!(?command, "browse command");

        match command {
            Command::Stores => {
                for store in self.dataset.stores() {
                    writeln!(output, "{store}")?;
                }
            }
            Command::Months => {
                let months: Vec<String> = self.dataset.months().iter().map(ToString::to_string).collect();
                writeln!(output, "{}", months.join(" "))?;
            }
            Command::Store(store) => {
                if !self.dataset.contains_store(&store) {
                    writeln!(output, "Unknown store '{store}'.")?;
                    return Ok(());
                }
                writeln!(output, "Selected store {store}.")?;
                self.request = Some(ViewRequest {
                    metric: self.metric,
                    ..ViewRequest::new(store)
                });
            }
            Command::Range(range) => match self.request.as_mut() {
                Some(request) => {
                    request.range = range;
                    match range {
                        Some(range) => writeln!(output, "Range set to {range}.")?,
                        None => writeln!(output, "Range reset to the store's own span.")?,
                    }
                }
                None => writeln!(output, "Pick a store first.")?,
            },
            Command::Metrics => {
                for metric in Metric::TREND_CHOICES {
                    writeln!(output, "{:<14}{}", metric.key(), metric.label())?;
                }
            }
            Command::Metric(metric) => {
                self.metric = metric;
                if let Some(request) = self.request.as_mut() {
                    request.metric = metric;
                }
                writeln!(output, "Trend metric set to {}.", metric.label())?;
            }
            Command::Show => match &self.request {
                Some(request) => match view::build_view(self.dataset, request, &self.config) {
                    Ok(view) => write!(output, "{}", report::render_markdown(&view, Utc::now()))?,
                    Err(DashboardError::SelectionEmpty { .. }) => writeln!(output, "{NO_DATA_MESSAGE}")?,
                    Err(err) => writeln!(output, "{err}")?,
                },
                None => writeln!(output, "Pick a store first.")?,
            },
            Command::Help => writeln!(output, "{HELP}")?,
            Command::Quit => {}
        }

        Ok(())
    }
}
