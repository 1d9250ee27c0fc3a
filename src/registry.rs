//! SQLite registry of acts, their versions and transformed representations.

use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, params};
use serde::Serialize;

use crate::config::Language;
use crate::util::now_utc_string;

pub const REGISTRY_FILE: &str = "lexparency.sqlite";

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformationStatus {
    SuccessFmx,
    SuccessHtm,
    Stubbed,
    Repealer,
    Redirected,
    Failed,
}

impl TransformationStatus {
    pub const ALL: [TransformationStatus; 6] = [
        Self::SuccessFmx,
        Self::SuccessHtm,
        Self::Stubbed,
        Self::Repealer,
        Self::Redirected,
        Self::Failed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::SuccessFmx => "success_fmx",
            Self::SuccessHtm => "success_htm",
            Self::Stubbed => "stubbed",
            Self::Repealer => "repealer",
            Self::Redirected => "redirected",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for TransformationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One transformed representation of an act version.
#[derive(Clone, Debug)]
pub struct Representation<'a> {
    pub celex: &'a str,
    pub folder: &'a str,
    pub language: Language,
    pub format: &'a str,
    pub status: TransformationStatus,
    pub source_sha256: Option<&'a str>,
    pub url_html: Option<&'a str>,
}

pub struct Registry {
    connection: Connection,
}

impl Registry {
    pub fn open(path: &Path) -> Result<Self> {
        let connection =
            Connection::open(path).with_context(|| format!("failed to open {}", path.display()))?;
        configure_connection(&connection)?;
        ensure_schema(&connection)?;
        Ok(Self { connection })
    }

    pub fn in_memory() -> Result<Self> {
        let connection = Connection::open_in_memory().context("failed to open in-memory registry")?;
        ensure_schema(&connection)?;
        Ok(Self { connection })
    }

    pub fn upsert_act(&self, celex: &str, domain: &str, in_force: Option<bool>) -> Result<()> {
        self.connection
            .execute(
                "INSERT INTO acts(celex, domain, in_force) VALUES(?1, ?2, ?3)
                 ON CONFLICT(celex) DO UPDATE SET
                   domain=excluded.domain,
                   in_force=COALESCE(excluded.in_force, acts.in_force)",
                params![celex, domain, in_force],
            )
            .with_context(|| format!("failed to upsert act {celex}"))?;
        Ok(())
    }

    pub fn upsert_version(&self, celex: &str, folder: &str, consolidation_date: Option<&str>) -> Result<()> {
        self.connection
            .execute(
                "INSERT INTO versions(celex, folder, consolidation_date) VALUES(?1, ?2, ?3)
                 ON CONFLICT(celex, folder) DO UPDATE SET
                   consolidation_date=COALESCE(excluded.consolidation_date, versions.consolidation_date)",
                params![celex, folder, consolidation_date],
            )
            .with_context(|| format!("failed to upsert version {celex}/{folder}"))?;
        Ok(())
    }

    /// Records a representation together with its act and version.
    pub fn record(&mut self, domain: &str, representation: &Representation<'_>) -> Result<()> {
        let tx = self.connection.transaction()?;
        tx.execute(
            "INSERT INTO acts(celex, domain) VALUES(?1, ?2)
             ON CONFLICT(celex) DO NOTHING",
            params![representation.celex, domain],
        )?;
        tx.execute(
            "INSERT INTO versions(celex, folder) VALUES(?1, ?2)
             ON CONFLICT(celex, folder) DO NOTHING",
            params![representation.celex, representation.folder],
        )?;
        tx.execute(
            "INSERT INTO representations(
               celex, folder, language, format, transformation, source_sha256, url_html, updated_at
             )
             VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(celex, folder, language) DO UPDATE SET
               format=excluded.format,
               transformation=excluded.transformation,
               source_sha256=excluded.source_sha256,
               url_html=excluded.url_html,
               updated_at=excluded.updated_at",
            params![
                representation.celex,
                representation.folder,
                representation.language.as_str(),
                representation.format,
                representation.status.as_str(),
                representation.source_sha256,
                representation.url_html,
                now_utc_string(),
            ],
        )?;
        tx.commit()
            .with_context(|| format!("failed to record {}/{}", representation.celex, representation.folder))?;
        Ok(())
    }

    pub fn status_of(&self, celex: &str, folder: &str, language: Language) -> Result<Option<String>> {
        let mut statement = self.connection.prepare(
            "SELECT transformation FROM representations
             WHERE celex = ?1 AND folder = ?2 AND language = ?3",
        )?;
        let mut rows = statement.query(params![celex, folder, language.as_str()])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    /// Number of representations per transformation status, in status order.
    pub fn counts(&self) -> Result<Vec<(TransformationStatus, i64)>> {
        let mut result = Vec::with_capacity(TransformationStatus::ALL.len());
        for status in TransformationStatus::ALL {
            let count: i64 = self.connection.query_row(
                "SELECT COUNT(*) FROM representations WHERE transformation = ?1",
                [status.as_str()],
                |row| row.get(0),
            )?;
            result.push((status, count));
        }
        Ok(result)
    }

    pub fn act_count(&self) -> Result<i64> {
        let count = self
            .connection
            .query_row("SELECT COUNT(*) FROM acts", [], |row| row.get(0))?;
        Ok(count)
    }
}

fn configure_connection(connection: &Connection) -> Result<()> {
    connection
        .pragma_update(None, "journal_mode", "WAL")
        .context("failed to set journal_mode=WAL")?;
    connection
        .pragma_update(None, "synchronous", "NORMAL")
        .context("failed to set synchronous=NORMAL")?;
    Ok(())
}

fn ensure_schema(connection: &Connection) -> Result<()> {
    connection
        .execute_batch(
            "
        CREATE TABLE IF NOT EXISTS acts (
          celex TEXT PRIMARY KEY,
          domain TEXT NOT NULL,
          in_force INTEGER
        );

        CREATE TABLE IF NOT EXISTS versions (
          celex TEXT NOT NULL,
          folder TEXT NOT NULL,
          consolidation_date TEXT,
          PRIMARY KEY(celex, folder),
          FOREIGN KEY(celex) REFERENCES acts(celex)
        );

        CREATE TABLE IF NOT EXISTS representations (
          celex TEXT NOT NULL,
          folder TEXT NOT NULL,
          language TEXT NOT NULL,
          format TEXT NOT NULL,
          transformation TEXT NOT NULL,
          source_sha256 TEXT,
          url_html TEXT,
          updated_at TEXT NOT NULL,
          PRIMARY KEY(celex, folder, language),
          FOREIGN KEY(celex, folder) REFERENCES versions(celex, folder)
        );

        CREATE INDEX IF NOT EXISTS idx_representations_transformation
          ON representations(transformation);
        ",
        )
        .context("failed to create registry schema")?;
    Ok(())
}
