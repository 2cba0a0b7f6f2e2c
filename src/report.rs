// fmctl - CLI for the Cisco Firepower Management Center API
// Copyright (C) 2026 The fmctl authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Group sync reporting.

use crate::error::FmcError;
use crate::output::OutputFormat;
use crate::reconcile::{ReconcilePlan, Reconciled};
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub group: String,
    pub dry_run: bool,
    pub diff_missing: Vec<String>,
    pub diff_extra: Vec<String>,
    /// Names of objects created, or to be created on a dry run.
    pub created: Vec<String>,
    pub dropped: Vec<String>,
}

impl SyncReport {
    pub fn planned(group: &str, plan: &ReconcilePlan) -> Self {
        Self {
            group: group.to_string(),
            dry_run: true,
            diff_missing: plan.diff_missing.clone(),
            diff_extra: plan.diff_extra.clone(),
            created: plan.to_create.iter().map(|e| e.object_name()).collect(),
            dropped: dropped_names(plan),
        }
    }

    pub fn applied(plan: &ReconcilePlan, result: &Reconciled) -> Self {
        Self {
            group: result.group.name.clone(),
            dry_run: false,
            diff_missing: result.diff_missing.clone(),
            diff_extra: result.diff_extra.clone(),
            created: result.created.iter().map(|o| o.name.clone()).collect(),
            dropped: dropped_names(plan),
        }
    }

    /// Report for a run that stopped with `err`. Only objects the server
    /// actually created are listed.
    pub fn failed(group: &str, plan: &ReconcilePlan, err: &FmcError) -> Self {
        let created = match err {
            FmcError::PartialCommit { created, .. } => created.clone(),
            _ => Vec::new(),
        };
        Self {
            dry_run: false,
            created,
            ..Self::planned(group, plan)
        }
    }

    pub fn is_clean(&self) -> bool {
        self.diff_missing.is_empty() && self.diff_extra.is_empty()
    }

    pub fn write<W: Write>(&self, out: &mut W, format: OutputFormat) -> Result<()> {
        match format {
            OutputFormat::Json => writeln!(out, "{}", serde_json::to_string_pretty(self)?)?,
            OutputFormat::Raw => writeln!(out, "{}", serde_json::to_string(self)?)?,
            OutputFormat::Pretty => self.write_text(out)?,
        }
        Ok(())
    }

    /// One `change,address` row per diff entry.
    pub fn write_csv<W: Write>(&self, writer: W) -> csv::Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(["change", "address"])?;
        for address in &self.diff_missing {
            wtr.write_record(["added", address.as_str()])?;
        }
        for address in &self.diff_extra {
            wtr.write_record(["removed", address.as_str()])?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Writes the `--report-json` and `--report-csv` files that were asked for.
    pub fn save(&self, json: Option<&Path>, csv: Option<&Path>) -> Result<()> {
        if let Some(path) = json {
            write_json(path, self)?;
        }
        if let Some(path) = csv {
            let out = File::create(path).with_context(|| format!("creating {}", path.display()))?;
            self.write_csv(out)
                .with_context(|| format!("writing {}", path.display()))?;
        }
        Ok(())
    }

    fn write_text<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        let prefix = if self.dry_run { "[dry run] " } else { "" };
        writeln!(out, "{prefix}network group {}", self.group)?;
        if self.is_clean() {
            writeln!(out, "  in sync with allow-list")?;
        }
        section(out, "added", '+', &self.diff_missing)?;
        section(out, "removed", '-', &self.diff_extra)?;
        let verb = if self.dry_run { "to create" } else { "created" };
        section(out, verb, '*', &self.created)?;
        section(out, "unresolved references dropped", '!', &self.dropped)
    }
}

fn section<W: Write>(out: &mut W, title: &str, mark: char, items: &[String]) -> std::io::Result<()> {
    if items.is_empty() {
        return Ok(());
    }
    writeln!(out, "  {title} ({}):", items.len())?;
    for item in items {
        writeln!(out, "    {mark} {item}")?;
    }
    Ok(())
}

fn dropped_names(plan: &ReconcilePlan) -> Vec<String> {
    plan.dropped
        .iter()
        .map(|r| r.name.clone().unwrap_or_else(|| r.id.clone()))
        .collect()
}

/// Writes `value` as pretty JSON to `path`.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let body = serde_json::to_string_pretty(value)?;
    fs::write(path, body).with_context(|| format!("writing {}", path.display()))
}
