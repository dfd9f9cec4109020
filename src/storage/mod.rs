// src/storage/mod.rs
use crate::layouts::{Layout, StatementTables};
use crate::models::StatementContext;
use crate::utils::error::StorageError;
use std::fs;
use std::path::{Path, PathBuf};

pub struct StorageManager {
    base_dir: PathBuf,
}

impl StorageManager {
    /// Creates a new StorageManager with the specified base directory
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self, StorageError> {
        let base_path = base_dir.as_ref().to_path_buf();

        if !base_path.exists() {
            fs::create_dir_all(&base_path).map_err(StorageError::IoError)?;
        }

        Ok(Self { base_dir: base_path })
    }

    /// `<base_dir>/<layout>/`, created on demand.
    pub fn layout_dir(&self, layout: Layout) -> Result<PathBuf, StorageError> {
        let target_dir = self.base_dir.join(layout.as_str());
        if !target_dir.exists() {
            fs::create_dir_all(&target_dir).map_err(StorageError::IoError)?;
        }
        Ok(target_dir)
    }

    /// Writes each table as `<base_dir>/<layout>/<stem>_<table>.json`.
    pub fn save_tables(
        &self,
        layout: Layout,
        ctx: &StatementContext,
        tables: &StatementTables,
    ) -> Result<Vec<PathBuf>, StorageError> {
        let target_dir = self.layout_dir(layout)?;
        let stem = file_stem(&ctx.source_file);

        let named = tables
            .tables()
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;

        let mut written = Vec::with_capacity(named.len());
        for (table, rows) in named {
            let file_path = target_dir.join(format!("{}_{}.json", stem, table));
            let body = serde_json::to_string_pretty(&rows)
                .map_err(|e| StorageError::SerializationError(e.to_string()))?;
            fs::write(&file_path, body).map_err(StorageError::IoError)?;

            tracing::info!("Saved {} table to {}", table, file_path.display());
            written.push(file_path);
        }
        Ok(written)
    }

    /// Saves metadata about the extraction in JSON format
    pub fn save_metadata(
        &self,
        layout: Layout,
        ctx: &StatementContext,
        tables: &StatementTables,
    ) -> Result<PathBuf, StorageError> {
        let target_dir = self.layout_dir(layout)?;
        let file_path = target_dir.join(format!("{}_meta.json", file_stem(&ctx.source_file)));

        let named = tables
            .tables()
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;
        let row_counts: serde_json::Map<String, serde_json::Value> = named
            .iter()
            .map(|(table, rows)| {
                let count = rows.as_array().map_or(0, Vec::len);
                (table.to_string(), serde_json::Value::from(count))
            })
            .collect();

        let metadata = serde_json::json!({
            "layout": layout.as_str(),
            "source_file": ctx.source_file,
            "reporting_date": ctx.reporting_date.to_string(),
            "report_month": ctx.report_month(),
            "account_id": ctx.account_id,
            "row_counts": row_counts,
            "extraction_timestamp": chrono::Utc::now().to_rfc3339(),
        });

        let metadata_str = serde_json::to_string_pretty(&metadata)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;

        fs::write(&file_path, metadata_str).map_err(StorageError::IoError)?;

        tracing::info!("Saved metadata to {}", file_path.display());

        Ok(file_path)
    }
}

/// File name without directories or extension.
pub fn file_stem(source_file: &str) -> String {
    Path::new(source_file)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| source_file.to_string())
}
