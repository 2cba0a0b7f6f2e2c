//! Terminal rendering of API responses.

use clap::ValueEnum;
use serde_json::Value;
use std::io::{self, Write};

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    Pretty,
    Json,
    Raw,
}

#[derive(Clone, Debug, Default)]
pub struct RenderOpts {
    pub columns_override: Option<Vec<String>>,
    pub sort_by: Option<String>,
    pub filter: Option<String>,
    pub full_ids: bool,
}

impl RenderOpts {
    pub fn parse_columns(raw: Option<&str>) -> Option<Vec<String>> {
        raw.map(|cols| {
            cols.split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect()
        })
    }
}

/// FMC ids are 36-character UUIDs; tables show a prefix unless `--full-ids`.
const ID_WIDTH: usize = 12;
const AUTO_COLUMNS: usize = 8;

pub fn render(
    value: &Value,
    output: OutputFormat,
    opts: &RenderOpts,
    columns: Option<&[&str]>,
) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match output {
        OutputFormat::Raw => writeln!(out, "{value}"),
        OutputFormat::Json => writeln!(out, "{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Pretty => {
            if !write_table(&mut out, value, columns, opts)? {
                writeln!(out, "{}", serde_json::to_string_pretty(value)?)?;
            }
            Ok(())
        }
    }
}

/// Writes `json` as an aligned table. Returns `false` when the value is not
/// a list of objects (bare array or `items` collection).
pub fn write_table<W: Write>(
    out: &mut W,
    json: &Value,
    columns_hint: Option<&[&str]>,
    opts: &RenderOpts,
) -> io::Result<bool> {
    let rows: &[Value] = match json {
        Value::Array(arr) => arr.as_slice(),
        Value::Object(map) => match map.get("items") {
            Some(Value::Array(arr)) => arr.as_slice(),
            None if map.contains_key("paging") => &[],
            _ => return Ok(false),
        },
        _ => return Ok(false),
    };

    if rows.is_empty() {
        writeln!(out, "No resources found.")?;
        return Ok(true);
    }
    let Value::Object(first) = &rows[0] else {
        return Ok(false);
    };

    let populated = |key: &str| rows.iter().any(|row| row.get(key).is_some_and(is_non_empty));
    let mut columns: Vec<String> = Vec::new();
    if let Some(wanted) = &opts.columns_override {
        columns.extend(wanted.iter().filter(|k| populated(k.as_str())).cloned());
    }
    if columns.is_empty()
        && let Some(hint) = columns_hint
    {
        columns.extend(hint.iter().copied().filter(|k| populated(k)).map(str::to_string));
    }
    if columns.is_empty() {
        columns.extend(
            first
                .keys()
                .filter(|k| k.as_str() != "links" && populated(k.as_str()))
                .take(AUTO_COLUMNS)
                .cloned(),
        );
    }
    if !columns.iter().any(|c| c == "id") && populated("id") {
        columns.push("id".to_string());
    }
    if columns.is_empty() {
        return Ok(false);
    }

    let needle = opts.filter.as_ref().map(|f| f.to_ascii_lowercase());
    let mut table: Vec<Vec<String>> = Vec::new();
    for row in rows {
        let Value::Object(map) = row else { continue };
        let cells: Vec<String> = columns
            .iter()
            .map(|col| {
                let rendered = value_to_str(map.get(col).unwrap_or(&Value::Null));
                if col == "id" && !opts.full_ids && rendered.chars().count() > ID_WIDTH {
                    format!("{}…", rendered.chars().take(ID_WIDTH).collect::<String>())
                } else {
                    rendered
                }
            })
            .collect();
        if let Some(needle) = &needle
            && !cells.iter().any(|c| c.to_ascii_lowercase().contains(needle))
        {
            continue;
        }
        table.push(cells);
    }

    if table.is_empty() {
        writeln!(out, "No resources found.")?;
        return Ok(true);
    }
    if let Some(idx) = opts
        .sort_by
        .as_ref()
        .and_then(|sort| columns.iter().position(|c| c == sort))
    {
        table.sort_by(|a, b| a[idx].cmp(&b[idx]));
    }

    let mut widths: Vec<usize> = columns.iter().map(|c| c.chars().count()).collect();
    for row in &table {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(cell.chars().count());
        }
    }

    let separator: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    write_row(out, &columns, &widths)?;
    write_row(out, &separator, &widths)?;
    for row in &table {
        write_row(out, row, &widths)?;
    }
    Ok(true)
}

fn write_row<W: Write>(out: &mut W, cells: &[String], widths: &[usize]) -> io::Result<()> {
    let line: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{cell:width$}"))
        .collect();
    writeln!(out, "{}", line.join("  ").trim_end())
}

pub fn value_to_str(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

fn is_non_empty(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(_) | Value::Number(_) => true,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(arr) => !arr.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}
