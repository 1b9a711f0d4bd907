//! Query-string and structured-request front ends for [`SearchParams`].
//!
//! ## Query syntax
//!
//! Whitespace-separated terms; bare words form the name prefix.
//!
//! - `name:<prefix>`
//! - `glob:<pattern>`, e.g. `glob:*.rs`
//! - `type:<ext>[,<ext>...]` (alias `ext:`), e.g. `type:jpg,png`
//! - `size:<op><n><unit>` with ops `>`, `>=`, `<`, `<=`, `=` and units
//!   `B`, `K`, `M`, `G`, `T` (optionally followed by `B`); repeatable
//! - `after:<YYYY-MM-DD>`, `before:<YYYY-MM-DD>` (inclusive, `before`
//!   covers the whole day)
//! - `kind:file` / `kind:dir`
//! - `content:true` (accepted, not implemented)

use std::path::PathBuf;
use std::time::SystemTime;

use chrono::{Local, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};

use super::params::{KindFilter, SearchParams, normalize_extension};
use crate::error::{Result, ScourError};
use crate::size::parse_size;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d"];

impl SearchParams {
    /// Build parameters from a hand-written query string
    pub fn parse_query(base_dir: impl Into<PathBuf>, query: &str) -> Result<Self> {
        let mut params = SearchParams::new(base_dir);
        let mut words: Vec<&str> = Vec::new();

        for term in query.split_whitespace() {
            let Some((key, value)) = term.split_once(':') else {
                words.push(term);
                continue;
            };

            match key.to_ascii_lowercase().as_str() {
                "name" => params.name = Some(required(key, value)?.to_string()),
                "glob" => params.glob = Some(required(key, value)?.to_string()),
                "type" | "ext" => {
                    let extensions: Vec<String> =
                        value.split(',').filter_map(normalize_extension).collect();
                    if extensions.is_empty() {
                        return Err(missing_value(key));
                    }
                    params.extensions.extend(extensions);
                }
                "size" => apply_size_condition(&mut params, value)?,
                "after" | "since" => params.modified_after = Some(parse_date(value, DayEdge::Start)?),
                "before" | "until" => params.modified_before = Some(parse_date(value, DayEdge::End)?),
                "kind" => params.kind = parse_kind(value)?,
                "content" => params.search_content = parse_flag(value)?,
                // Unknown keys are treated as part of the name, e.g. `C:` drives
                _ => words.push(term),
            }
        }

        if params.name.is_none() && !words.is_empty() {
            params.name = Some(words.join(" "));
        }

        params.validate()?;
        Ok(params)
    }
}

/// Search request as delivered by a UI or by a natural-language translator
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchRequest {
    /// Free-form query string, parsed with [`SearchParams::parse_query`]
    pub query: String,
    pub current_path: PathBuf,
    pub file_type: Vec<String>,
    pub min_size: u64,
    pub max_size: u64,
    /// `YYYY-MM-DD`; unparseable values are ignored
    pub modified_after: String,
    /// `YYYY-MM-DD`; unparseable values are ignored
    pub modified_before: String,
}

impl SearchRequest {
    /// Merge the structured fields over whatever the query string specified
    pub fn into_params(self) -> Result<SearchParams> {
        let mut params = SearchParams::parse_query(self.current_path, &self.query)?
            .with_extensions(&self.file_type);

        if self.min_size > 0 {
            params.min_size = self.min_size;
        }
        if self.max_size > 0 {
            params.max_size = self.max_size;
        }
        if let Ok(after) = parse_date(&self.modified_after, DayEdge::Start) {
            params.modified_after = Some(after);
        }
        if let Ok(before) = parse_date(&self.modified_before, DayEdge::End) {
            params.modified_before = Some(before);
        }

        params.validate()?;
        Ok(params)
    }
}

fn required<'a>(key: &str, value: &'a str) -> Result<&'a str> {
    if value.is_empty() {
        return Err(missing_value(key));
    }
    Ok(value)
}

fn missing_value(key: &str) -> ScourError {
    ScourError::InvalidQuery(format!("{key}: requires a value"))
}

/// Apply one `size:` condition such as `>=10M`
fn apply_size_condition(params: &mut SearchParams, raw: &str) -> Result<()> {
    let op_len = raw.find(|c: char| !matches!(c, '<' | '>' | '=')).unwrap_or(raw.len());
    let (op, amount) = raw.split_at(op_len);
    let size = parse_size(amount)?;

    match op {
        ">=" => params.min_size = size,
        ">" => params.min_size = size.saturating_add(1),
        "<=" => params.max_size = size,
        "<" => {
            if size == 0 {
                return Err(ScourError::InvalidQuery(format!("size:{raw} matches nothing")));
            }
            params.max_size = size - 1;
        }
        "=" | "" => {
            params.min_size = size;
            params.max_size = size;
        }
        _ => {
            return Err(ScourError::InvalidQuery(format!(
                "invalid size operator: {op}"
            )));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy)]
enum DayEdge {
    Start,
    End,
}

/// Parse a calendar date into the first or last second of that local day
fn parse_date(raw: &str, edge: DayEdge) -> Result<SystemTime> {
    let raw = raw.trim();
    let date = DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .ok_or_else(|| ScourError::InvalidQuery(format!("invalid date: {raw:?}")))?;

    let (h, m, s) = match edge {
        DayEdge::Start => (0, 0, 0),
        DayEdge::End => (23, 59, 59),
    };
    let naive = date
        .and_hms_opt(h, m, s)
        .ok_or_else(|| ScourError::InvalidQuery(format!("invalid date: {raw:?}")))?;

    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(SystemTime::from)
        .ok_or_else(|| ScourError::InvalidQuery(format!("date does not exist locally: {raw}")))
}

fn parse_kind(raw: &str) -> Result<KindFilter> {
    match raw.to_ascii_lowercase().as_str() {
        "file" | "files" | "f" => Ok(KindFilter::Files),
        "dir" | "dirs" | "folder" | "directory" | "d" => Ok(KindFilter::Directories),
        "any" | "all" => Ok(KindFilter::Any),
        _ => Err(ScourError::InvalidQuery(format!("invalid kind: {raw}"))),
    }
}

fn parse_flag(raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Ok(true),
        "false" | "no" | "0" | "off" => Ok(false),
        _ => Err(ScourError::InvalidQuery(format!("invalid flag: {raw}"))),
    }
}
