/// CSV rendering for the report export endpoints
use crate::{
    config::ISO_SHORT_DATE_FORMAT,
    db::time::{ClientReportRow, PersonReportRow, ProjectReportRow, TaskReportRow},
    error::{ApiError, ApiResult},
};
use chrono::NaiveDate;
use regex::Regex;
use std::sync::LazyLock;

static NON_ALPHANUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("[^a-zA-Z0-9]+").expect("filename pattern must compile"));

/// Attachment filename: sanitized company name plus the date range.
pub fn export_filename(company: &str, from_date: NaiveDate, to_date: NaiveDate) -> String {
    let clean_company = NON_ALPHANUMERIC.replace_all(company, "-");

    format!(
        "export_{}_{}_to_{}.csv",
        clean_company,
        from_date.format(ISO_SHORT_DATE_FORMAT),
        to_date.format(ISO_SHORT_DATE_FORMAT)
    )
}

fn hours(value: Option<f64>) -> String {
    format!(" {:.2}", value.unwrap_or(0.0))
}

fn finish(writer: csv::Writer<Vec<u8>>) -> ApiResult<Vec<u8>> {
    writer
        .into_inner()
        .map_err(|e| ApiError::system("Failed to flush CSV").with_source(e))
}

pub fn client_report_csv(rows: &[ClientReportRow]) -> ApiResult<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer
        .write_record([
            "Client Name",
            "Non-Billable Hours",
            "Billable Hours",
            "Billable Total",
        ])
        .map_err(|e| ApiError::system("Failed to write CSV header").with_source(e))?;

    for row in rows {
        writer
            .write_record([
                row.client_name.clone(),
                hours(row.non_billable_hours),
                hours(row.billable_hours),
                hours(row.billable_total),
            ])
            .map_err(|e| ApiError::system("Failed to write CSV row").with_source(e))?;
    }

    finish(writer)
}

pub fn project_report_csv(rows: &[ProjectReportRow]) -> ApiResult<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer
        .write_record([
            "Client Name",
            "Project Name",
            "Non-Billable Hours",
            "Billable Hours",
            "Billable Total",
        ])
        .map_err(|e| ApiError::system("Failed to write CSV header").with_source(e))?;

    for row in rows {
        writer
            .write_record([
                row.client_name.clone(),
                row.project_name.clone(),
                hours(row.non_billable_hours),
                hours(row.billable_hours),
                hours(row.billable_total),
            ])
            .map_err(|e| ApiError::system("Failed to write CSV row").with_source(e))?;
    }

    finish(writer)
}

pub fn task_report_csv(rows: &[TaskReportRow]) -> ApiResult<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer
        .write_record([
            "Task Name",
            "Non-Billable Hours",
            "Billable Hours",
            "Billable Total",
        ])
        .map_err(|e| ApiError::system("Failed to write CSV header").with_source(e))?;

    for row in rows {
        writer
            .write_record([
                row.task_name.clone(),
                hours(row.non_billable_hours),
                hours(row.billable_hours),
                hours(row.billable_total),
            ])
            .map_err(|e| ApiError::system("Failed to write CSV row").with_source(e))?;
    }

    finish(writer)
}

pub fn person_report_csv(rows: &[PersonReportRow]) -> ApiResult<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer
        .write_record([
            "Last Name",
            "First Name",
            "Non-Billable Hours",
            "Billable Hours",
            "Billable Total",
        ])
        .map_err(|e| ApiError::system("Failed to write CSV header").with_source(e))?;

    for row in rows {
        writer
            .write_record([
                row.last_name.clone(),
                row.first_name.clone(),
                hours(row.non_billable_hours),
                hours(row.billable_hours),
                hours(row.billable_total),
            ])
            .map_err(|e| ApiError::system("Failed to write CSV row").with_source(e))?;
    }

    finish(writer)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn filename_sanitizes_company() {
        let name = export_filename("Müller & Co, Inc.", date("2019-01-06"), date("2019-01-12"));
        assert_eq!(name, "export_M-ller-Co-Inc-_2019-01-06_to_2019-01-12.csv");
    }

    #[test]
    fn client_csv_shape() {
        let rows = vec![ClientReportRow {
            client_id: 1,
            client_name: "Acme".to_string(),
            non_billable_hours: Some(2.0),
            billable_hours: Some(8.0),
            billable_total: Some(800.0),
        }];

        let bytes = client_report_csv(&rows).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "Client Name,Non-Billable Hours,Billable Hours,Billable Total"
        );
        assert_eq!(lines.next().unwrap(), "Acme, 2.00, 8.00, 800.00");
    }

    #[test]
    fn missing_sums_render_as_zero() {
        let rows = vec![TaskReportRow {
            task_id: 1,
            task_name: "Development".to_string(),
            non_billable_hours: None,
            billable_hours: Some(4.0),
            billable_total: None,
        }];

        let bytes = task_report_csv(&rows).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("Development, 0.00, 4.00, 0.00"));
    }
}
