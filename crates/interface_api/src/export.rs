//! Claim reports
//!
//! Renders a list of claims as a downloadable CSV or XLSX file. One row per
//! claim; timestamps are UTC.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_xlsxwriter::{Format, Workbook, XlsxError};
use serde::Serialize;
use thiserror::Error;

use domain_claims::{ClaimRecord, ClaimStatus};

use crate::error::ApiError;

const COLUMNS: [&str; 12] = [
    "id",
    "user_id",
    "manager_id",
    "title",
    "type",
    "status",
    "amount",
    "currency",
    "claim_date",
    "created_at",
    "updated_at",
    "last_comment",
];

const AMOUNT_COLUMN: u16 = 6;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// File format of a claim report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Xlsx,
    Csv,
}

impl ExportFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
            ExportFormat::Csv => "text/csv; charset=utf-8",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Xlsx => "xlsx",
            ExportFormat::Csv => "csv",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "xlsx" | "excel" => Ok(ExportFormat::Xlsx),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(ApiError::Validation(
                format!("unsupported export format '{}'", other),
                Some(vec!["allowed: xlsx, csv".to_string()]),
            )),
        }
    }
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("XLSX error: {0}")]
    Xlsx(#[from] XlsxError),

    #[error("Buffer error: {0}")]
    Buffer(String),
}

impl From<ExportError> for ApiError {
    fn from(err: ExportError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

/// One report line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct ExportRow {
    id: String,
    user_id: String,
    manager_id: String,
    title: String,
    claim_type: String,
    status: String,
    amount: u64,
    currency: String,
    claim_date: String,
    created_at: String,
    updated_at: String,
    last_comment: String,
}

impl ExportRow {
    fn text_cells(&self) -> [(u16, &str); 11] {
        [
            (0, self.id.as_str()),
            (1, self.user_id.as_str()),
            (2, self.manager_id.as_str()),
            (3, self.title.as_str()),
            (4, self.claim_type.as_str()),
            (5, self.status.as_str()),
            (7, self.currency.as_str()),
            (8, self.claim_date.as_str()),
            (9, self.created_at.as_str()),
            (10, self.updated_at.as_str()),
            (11, self.last_comment.as_str()),
        ]
    }
}

impl From<&ClaimRecord> for ExportRow {
    fn from(claim: &ClaimRecord) -> Self {
        ExportRow {
            id: claim.id.to_string(),
            user_id: claim.user_id.to_string(),
            manager_id: claim.manager_id.to_string(),
            title: claim.title.clone(),
            claim_type: claim.claim_type.as_str().to_string(),
            status: claim.status.as_str().to_string(),
            amount: claim.amount.units(),
            currency: claim.currency.code().to_string(),
            claim_date: claim.claim_date.to_string(),
            created_at: timestamp(claim.created_at),
            updated_at: timestamp(claim.updated_at),
            last_comment: claim
                .last_entry()
                .map(|e| e.comment.clone())
                .unwrap_or_default(),
        }
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Renders the claims in the requested format
pub fn render(format: ExportFormat, claims: &[ClaimRecord]) -> Result<Vec<u8>, ExportError> {
    let rows: Vec<ExportRow> = claims.iter().map(ExportRow::from).collect();
    match format {
        ExportFormat::Csv => to_csv(&rows),
        ExportFormat::Xlsx => to_xlsx(&rows),
    }
}

/// Download name, e.g. `claims_2024-03-01_to_2024-03-31_closed.csv`
pub fn file_name(
    from: NaiveDate,
    to: NaiveDate,
    status: Option<ClaimStatus>,
    format: ExportFormat,
) -> String {
    let suffix = status.map(|s| format!("_{}", s.as_str())).unwrap_or_default();
    format!("claims_{from}_to_{to}{suffix}.{}", format.extension())
}

fn to_csv(rows: &[ExportRow]) -> Result<Vec<u8>, ExportError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(COLUMNS)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| ExportError::Buffer(e.error().to_string()))
}

fn to_xlsx(rows: &[ExportRow]) -> Result<Vec<u8>, ExportError> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();

    let sheet = workbook.add_worksheet();
    sheet.set_name("Claims")?;
    for (col, name) in (0u16..).zip(COLUMNS) {
        sheet.write_string_with_format(0, col, name, &header)?;
    }
    for (line, row) in (1u32..).zip(rows) {
        for (col, value) in row.text_cells() {
            sheet.write_string(line, col, value)?;
        }
        sheet.write_number(line, AMOUNT_COLUMN, row.amount as f64)?;
    }
    sheet.autofit();

    Ok(workbook.save_to_buffer()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::ClaimRecordBuilder;

    #[test]
    fn test_csv_has_header_and_one_line_per_claim() {
        let claims = vec![
            ClaimRecordBuilder::new().with_title("Airport cab").build(),
            ClaimRecordBuilder::new().at(ClaimStatus::Closed).build(),
        ];

        let bytes = render(ExportFormat::Csv, &claims).unwrap();
        let mut reader = csv::Reader::from_reader(bytes.as_slice());

        let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
        assert_eq!(headers, COLUMNS);

        let records: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 2);
        assert_eq!(&records[0][0], claims[0].id.to_string());
        assert_eq!(&records[0][3], "Airport cab");
        assert_eq!(&records[0][6], "550");
        assert_eq!(&records[1][5], "closed");
        assert_eq!(&records[1][11], claims[1].last_entry().unwrap().comment);
    }

    #[test]
    fn test_csv_quotes_embedded_commas() {
        let claim = ClaimRecordBuilder::new().with_title("Cab, airport").build();
        let bytes = render(ExportFormat::Csv, &[claim]).unwrap();

        let mut reader = csv::Reader::from_reader(bytes.as_slice());
        let record = reader.records().next().unwrap().unwrap();
        assert_eq!(&record[3], "Cab, airport");
    }

    #[test]
    fn test_empty_report_keeps_header() {
        let bytes = render(ExportFormat::Csv, &[]).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(text.starts_with("id,user_id,manager_id"));
    }

    #[test]
    fn test_xlsx_is_a_zip_package() {
        let claim = ClaimRecordBuilder::new().build();
        let bytes = render(ExportFormat::Xlsx, &[claim]).unwrap();
        assert!(bytes.starts_with(b"PK"));
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("".parse::<ExportFormat>().unwrap(), ExportFormat::Xlsx);
        assert_eq!("Excel".parse::<ExportFormat>().unwrap(), ExportFormat::Xlsx);
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert!(matches!(
            "pdf".parse::<ExportFormat>(),
            Err(ApiError::Validation(..))
        ));
    }

    #[test]
    fn test_file_name() {
        let from = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
        assert_eq!(
            file_name(from, to, Some(ClaimStatus::Closed), ExportFormat::Csv),
            "claims_2024-03-01_to_2024-03-31_closed.csv"
        );
        assert_eq!(
            file_name(from, to, None, ExportFormat::Xlsx),
            "claims_2024-03-01_to_2024-03-31.xlsx"
        );
    }
}
