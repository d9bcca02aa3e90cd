//! Tabular funnel data and the caller-side reductions around the engine.
//!
//! Two CSV shapes are understood:
//! - **wide**: `source[,period],<stage>,<stage>,...`, one row per traffic source
//!   and time window;
//! - **long**: `Stage,Count`, one row per stage for a single observation.
//!
//! The engine only ever sees one [`StageCounts`]. Multi-row tables are reduced
//! either by summing counts per stage ([`FunnelTable::sum_counts`]) or by running
//! the engine once per row ([`FunnelTable::reports_per_row`]).

use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::funnel::{self, FunnelEngine, FunnelReport, StageCounts};

/// Errors for reading and reducing funnel tables.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Underlying CSV read/parse failure.
    #[error("csv: {0}")]
    Csv(#[from] csv::Error),
    /// A required column is absent from the header.
    #[error("missing required column {0:?}")]
    MissingColumn(&'static str),
    /// The header names no stage columns.
    #[error("table has no stage columns")]
    NoStageColumns,
    /// A cell in a stage column is not a non-negative integer.
    #[error("line {line}: column {column:?} has invalid count {value:?}")]
    InvalidCount {
        /// 1-based line number in the input.
        line: u64,
        /// Stage column.
        column: String,
        /// Offending cell.
        value: String,
    },
    /// `source` or `period` appears more than once in the header.
    #[error("column {0:?} appears more than once")]
    DuplicateColumn(&'static str),
    /// The same stage appears twice in one observation.
    #[error("stage {0:?} appears more than once")]
    DuplicateStage(String),
    /// A selected traffic source has no rows.
    #[error("unknown traffic source {0:?}")]
    UnknownSource(String),
    /// Nothing was selected to aggregate.
    #[error("no rows selected")]
    EmptySelection,
    /// Summed count does not fit in `u64`.
    #[error("count overflow while summing stage {0:?}")]
    CountOverflow(String),
    /// Engine failure for a row.
    #[error(transparent)]
    Funnel(#[from] funnel::Error),
}

/// Convenience result type for this module.
pub type Result<T> = std::result::Result<T, Error>;

/// One observation: a traffic source, optionally a period, and its counts.
#[derive(Debug, Clone, PartialEq)]
pub struct FunnelRow {
    /// Traffic source, e.g. `"Google Ads"`.
    pub source: String,
    /// Time window label, if the table has one.
    pub period: Option<String>,
    /// Counts for every stage column of the table.
    pub counts: StageCounts,
}

/// Engine output for one table row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowReport {
    /// Traffic source of the row.
    pub source: String,
    /// Period of the row, if any.
    pub period: Option<String>,
    /// Report computed from the row's counts alone.
    pub report: FunnelReport,
}

/// A wide funnel table.
#[derive(Debug, Clone, PartialEq)]
pub struct FunnelTable {
    stages: Vec<String>,
    rows: Vec<FunnelRow>,
}

fn csv_reader<R: io::Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader)
}

fn warn_on_anomalies(source: &str, counts: &StageCounts) {
    let counts: Vec<(&str, u64)> = counts.iter().collect();
    for pair in counts.windows(2) {
        let ((from, upstream), (to, downstream)) = (pair[0], pair[1]);
        if downstream > upstream {
            tracing::warn!(
                source,
                from,
                to,
                upstream,
                downstream,
                "downstream count exceeds upstream count"
            );
        }
    }
}

impl FunnelTable {
    /// Parse a wide CSV table.
    pub fn from_reader<R: io::Read>(reader: R) -> Result<Self> {
        let mut rdr = csv_reader(reader);
        let headers = rdr.headers()?.clone();

        let mut source_idx = None;
        let mut period_idx = None;
        let mut stage_cols: Vec<(usize, String)> = Vec::new();
        for (i, name) in headers.iter().enumerate() {
            if name.eq_ignore_ascii_case("source") {
                if source_idx.replace(i).is_some() {
                    return Err(Error::DuplicateColumn("source"));
                }
            } else if name.eq_ignore_ascii_case("period") {
                if period_idx.replace(i).is_some() {
                    return Err(Error::DuplicateColumn("period"));
                }
            } else {
                if stage_cols.iter().any(|(_, s)| s == name) {
                    return Err(Error::DuplicateStage(name.to_string()));
                }
                stage_cols.push((i, name.to_string()));
            }
        }
        let source_idx = source_idx.ok_or(Error::MissingColumn("source"))?;
        if stage_cols.is_empty() {
            return Err(Error::NoStageColumns);
        }

        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record?;
            let line = record.position().map_or(0, |p| p.line());
            let field = |i: usize| record.get(i).unwrap_or("");

            let mut counts = StageCounts::new();
            for (i, stage) in &stage_cols {
                let raw = field(*i);
                let count = raw.parse::<u64>().map_err(|_| Error::InvalidCount {
                    line,
                    column: stage.clone(),
                    value: raw.to_string(),
                })?;
                counts.push(stage.as_str(), count);
            }
            let row = FunnelRow {
                source: field(source_idx).to_string(),
                period: period_idx.map(|i| field(i).to_string()).filter(|p| !p.is_empty()),
                counts,
            };
            warn_on_anomalies(&row.source, &row.counts);
            rows.push(row);
        }

        tracing::debug!(rows = rows.len(), stages = stage_cols.len(), "parsed funnel table");
        Ok(Self {
            stages: stage_cols.into_iter().map(|(_, s)| s).collect(),
            rows,
        })
    }

    /// Parse a wide CSV table from a file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref()).map_err(csv::Error::from)?;
        Self::from_reader(file)
    }

    /// Stage columns in header order.
    pub fn stages(&self) -> &[String] {
        &self.stages
    }

    /// Rows in table order.
    pub fn rows(&self) -> &[FunnelRow] {
        &self.rows
    }

    /// Distinct traffic sources, in first-seen order.
    pub fn sources(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for row in &self.rows {
            if !out.contains(&row.source.as_str()) {
                out.push(&row.source);
            }
        }
        out
    }

    /// Sum counts per stage over every row.
    pub fn sum_counts(&self) -> Result<StageCounts> {
        sum_rows(&self.stages, self.rows.iter())
    }

    /// Sum counts per stage over the rows of the given traffic sources.
    pub fn sum_counts_for<S: AsRef<str>>(&self, sources: &[S]) -> Result<StageCounts> {
        if sources.is_empty() {
            return Err(Error::EmptySelection);
        }
        for source in sources {
            let source = source.as_ref();
            if !self.rows.iter().any(|r| r.source == source) {
                return Err(Error::UnknownSource(source.to_string()));
            }
        }
        let selected = self
            .rows
            .iter()
            .filter(|r| sources.iter().any(|s| s.as_ref() == r.source));
        sum_rows(&self.stages, selected)
    }

    /// Run the engine once per row, in table order.
    ///
    /// Any row failure fails the whole call.
    pub fn reports_per_row(&self, engine: &FunnelEngine) -> Result<Vec<RowReport>> {
        self.rows
            .iter()
            .map(|row| {
                Ok(RowReport {
                    source: row.source.clone(),
                    period: row.period.clone(),
                    report: engine.report(&row.counts)?,
                })
            })
            .collect()
    }
}

fn sum_rows<'a>(stages: &[String], rows: impl Iterator<Item = &'a FunnelRow>) -> Result<StageCounts> {
    let mut totals = vec![0u64; stages.len()];
    let mut seen = 0usize;
    for row in rows {
        seen += 1;
        for (total, stage) in totals.iter_mut().zip(stages) {
            // Rows are built from the same header, so every stage is present.
            let count = row.counts.get(stage).unwrap_or(0);
            *total = total
                .checked_add(count)
                .ok_or_else(|| Error::CountOverflow(stage.clone()))?;
        }
    }
    if seen == 0 {
        return Err(Error::EmptySelection);
    }
    tracing::debug!(rows = seen, "summed funnel rows");
    Ok(stages.iter().cloned().zip(totals).collect())
}

#[derive(Debug, Deserialize)]
struct StageCountRecord {
    #[serde(alias = "stage", rename = "Stage")]
    stage: String,
    #[serde(alias = "count", rename = "Count")]
    count: u64,
}

/// Parse a long `Stage,Count` CSV into one observation.
pub fn read_stage_counts<R: io::Read>(reader: R) -> Result<StageCounts> {
    let mut rdr = csv_reader(reader);
    let mut counts = StageCounts::new();
    for record in rdr.deserialize() {
        let record: StageCountRecord = record?;
        if counts.get(&record.stage).is_some() {
            return Err(Error::DuplicateStage(record.stage));
        }
        counts.push(record.stage, record.count);
    }
    warn_on_anomalies("upload", &counts);
    tracing::debug!(stages = counts.len(), "parsed stage counts");
    Ok(counts)
}
