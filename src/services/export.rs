use crate::domain::models::{Company, Evaluation};
use crate::time_utils;
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv; charset=utf-8",
            ExportFormat::Json => "application/json",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

const CSV_HEADER: &str = "Company,Score,Gender,Age,Comment,Date";

fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

/// One row per evaluation; unknown companies are written as `N/A`.
pub fn to_csv(evaluations: &[Evaluation], companies: &[Company], timezone: &str) -> String {
    let names: HashMap<Uuid, &str> = companies.iter().map(|c| (c.id, c.name.as_str())).collect();

    let mut lines = Vec::with_capacity(evaluations.len() + 1);
    lines.push(CSV_HEADER.to_string());
    for e in evaluations {
        let company = names.get(&e.company_id).copied().unwrap_or("N/A");
        lines.push(
            [
                quote(company),
                e.score.value().to_string(),
                quote(e.gender.as_str()),
                e.age.to_string(),
                quote(e.comment.as_deref().unwrap_or("")),
                quote(&time_utils::format_local_time(timezone, e.created_at)),
            ]
            .join(","),
        );
    }
    lines.join("\n")
}

pub fn to_json(evaluations: &[Evaluation]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(evaluations)
}

/// `scorehub-<company-slug|all-companies>-<YYYY-MM-DD>.<ext>`
pub fn file_name(company: Option<&Company>, date: NaiveDate, format: ExportFormat) -> String {
    let scope = company.map_or("all-companies", |c| c.slug.as_str());
    format!(
        "scorehub-{}-{}.{}",
        scope,
        date.format("%Y-%m-%d"),
        format.extension()
    )
}
