// src/bookmarks/export.rs
use std::str::FromStr;

use crate::error::ValidationError;

use super::{Bookmark, PersistenceError};

const CSV_HEADER: [&str; 7] = ["id", "title", "url", "sources", "status", "notes", "created_at"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
}

impl ExportFormat {
    pub fn content_type(self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv; charset=utf-8",
            ExportFormat::Json => "application/json",
        }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            ExportFormat::Csv => "bookmarks.csv",
            ExportFormat::Json => "bookmarks.json",
        }
    }

    pub fn render(self, bookmarks: &[Bookmark]) -> Result<Vec<u8>, PersistenceError> {
        match self {
            ExportFormat::Csv => to_csv(bookmarks),
            ExportFormat::Json => serde_json::to_vec_pretty(bookmarks)
                .map_err(|e| PersistenceError::Io(format!("json export: {e}"))),
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            other => Err(ValidationError::UnsupportedExportFormat(other.to_string())),
        }
    }
}

/// One row per bookmark; sources are `;`-joined wire tags.
pub fn to_csv(bookmarks: &[Bookmark]) -> Result<Vec<u8>, PersistenceError> {
    let mut w = csv::Writer::from_writer(Vec::new());
    w.write_record(CSV_HEADER).map_err(csv_err)?;
    for b in bookmarks {
        let sources = b
            .thread
            .sources
            .iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(";");
        let id = b.id.to_string();
        let created = b.created_at.to_rfc3339();
        w.write_record([
            id.as_str(),
            b.thread.title.as_str(),
            b.thread.url.as_str(),
            sources.as_str(),
            b.status.as_str(),
            b.notes.as_str(),
            created.as_str(),
        ])
        .map_err(csv_err)?;
    }
    w.into_inner()
        .map_err(|e| PersistenceError::Io(format!("csv export: {e}")))
}

fn csv_err(e: csv::Error) -> PersistenceError {
    PersistenceError::Io(format!("csv export: {e}"))
}
