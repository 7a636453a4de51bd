// lib/src/export.rs

//! Tabular reports and their CSV / Word renditions.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::Serialize;

pub const CSV_MIME: &str = "text/csv; charset=utf-8";
pub const WORD_MIME: &str = "application/vnd.ms-word";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportTable {
    pub title: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ReportTable {
    pub fn new<S: Into<String>>(title: impl Into<String>, headers: impl IntoIterator<Item = S>) -> Self {
        ReportTable { title: title.into(), headers: headers.into_iter().map(Into::into).collect(), rows: Vec::new() }
    }

    pub fn push_row<S: Into<String>>(&mut self, cells: impl IntoIterator<Item = S>) {
        self.rows.push(cells.into_iter().map(Into::into).collect());
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub title: String,
    pub generated_at: DateTime<Utc>,
    pub tables: Vec<ReportTable>,
}

impl Report {
    pub fn table(&self, title: &str) -> Option<&ReportTable> {
        self.tables.iter().find(|t| t.title == title)
    }

    /// File name stem such as `financial-summary-2026-03-04`.
    pub fn file_stem(&self) -> String {
        let slug: String = self
            .title
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
            .collect();
        let slug = slug.split('-').filter(|s| !s.is_empty()).collect::<Vec<_>>().join("-");
        format!("{}-{}", slug, self.generated_at.format("%Y-%m-%d"))
    }
}

/// Quotes a field when it holds a comma, quote or line break.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// A lone empty cell is written as `""` so the line is never blank.
fn csv_line<S: AsRef<str>>(out: &mut String, cells: &[S]) {
    let line = match cells {
        [only] if only.as_ref().is_empty() => "\"\"".to_string(),
        cells => cells.iter().map(|c| csv_field(c.as_ref())).collect::<Vec<_>>().join(","),
    };
    out.push_str(&line);
    out.push_str("\r\n");
}

/// Report title line, then per table a title line, the header row and
/// the data rows. Sections are separated by one empty line.
pub fn to_csv(report: &Report) -> String {
    let mut out = String::new();
    csv_line(&mut out, &[report.title.as_str()]);
    for table in &report.tables {
        out.push_str("\r\n");
        csv_line(&mut out, &[table.title.as_str()]);
        csv_line(&mut out, &table.headers);
        for row in &table.rows {
            csv_line(&mut out, row);
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvSection {
    pub title: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Splits CSV text into records, honouring quoted fields. A blank line
/// yields an empty record.
fn csv_records(input: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut line_started = false;
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\r' && c != '\n' {
            line_started = true;
        }
        match (c, quoted) {
            ('"', true) if chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            ('"', true) => quoted = false,
            ('"', false) if field.is_empty() => quoted = true,
            (',', false) => record.push(std::mem::take(&mut field)),
            ('\r', false) => {}
            ('\n', false) if !line_started => records.push(Vec::new()),
            ('\n', false) => {
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
                line_started = false;
            }
            (c, _) => field.push(c),
        }
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }
    records
}

/// Reads back the sections written by [`to_csv`]; the leading report title
/// is returned separately.
pub fn parse_csv_sections(input: &str) -> (String, Vec<CsvSection>) {
    let mut records = csv_records(input).into_iter();
    let title = records.next().and_then(|r| r.into_iter().next()).unwrap_or_default();
    let mut sections = Vec::new();
    let mut current: Option<CsvSection> = None;
    let mut expect_title = false;
    for record in records {
        if record.is_empty() {
            sections.extend(current.take());
            expect_title = true;
            continue;
        }
        match current.as_mut() {
            None if expect_title => {
                current = Some(CsvSection {
                    title: record.into_iter().next().unwrap_or_default(),
                    headers: Vec::new(),
                    rows: Vec::new(),
                });
                expect_title = false;
            }
            None => {}
            Some(section) if section.headers.is_empty() => section.headers = record,
            Some(section) => section.rows.push(record),
        }
    }
    sections.extend(current);
    (title, sections)
}

fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// HTML document Word opens as a `.doc` file.
pub fn to_word_html(report: &Report) -> String {
    let mut out = String::new();
    let title = escape_html(&report.title);
    let _ = write!(
        out,
        "<html xmlns:o=\"urn:schemas-microsoft-com:office:office\" \
         xmlns:w=\"urn:schemas-microsoft-com:office:word\" \
         xmlns=\"http://www.w3.org/TR/REC-html40\">\
         <head><meta charset=\"utf-8\"><title>{title}</title>\
         <style>table{{border-collapse:collapse;margin-bottom:18pt}}\
         th,td{{border:1px solid #999;padding:4pt 6pt;font-family:Calibri,sans-serif;font-size:10pt}}\
         th{{background:#eee}}</style></head><body>"
    );
    let _ = write!(
        out,
        "<h1>{}</h1><p>Generated {}</p>",
        title,
        report.generated_at.format("%Y-%m-%d %H:%M UTC")
    );
    for table in &report.tables {
        let _ = write!(out, "<h2>{}</h2><table><thead><tr>", escape_html(&table.title));
        for header in &table.headers {
            let _ = write!(out, "<th>{}</th>", escape_html(header));
        }
        out.push_str("</tr></thead><tbody>");
        for row in &table.rows {
            out.push_str("<tr>");
            for cell in row {
                let _ = write!(out, "<td>{}</td>", escape_html(cell));
            }
            out.push_str("</tr>");
        }
        out.push_str("</tbody></table>");
    }
    out.push_str("</body></html>");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> Report {
        let mut bills = ReportTable::new("Bills", ["Patient", "Total"]);
        bills.push_row(["Obi, Ada", "120.00"]);
        bills.push_row(["Musa \"Jnr\" Bello", "40.00"]);
        bills.push_row(["Line\nbreak", "0.00"]);
        let mut methods = ReportTable::new("Payments by method", ["Method", "Amount"]);
        methods.push_row(["Cash", "100.00"]);
        Report { title: "Financial Summary".to_string(), generated_at: Utc::now(), tables: vec![bills, methods] }
    }

    #[test]
    fn should_quote_fields_with_special_characters() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn should_read_back_each_section_with_its_rows() {
        let report = report();
        let (title, sections) = parse_csv_sections(&to_csv(&report));
        assert_eq!(title, "Financial Summary");
        assert_eq!(sections.len(), 2);
        for (section, table) in sections.iter().zip(&report.tables) {
            assert_eq!(section.title, table.title);
            assert_eq!(section.headers, table.headers);
            assert_eq!(section.rows, table.rows);
        }
    }

    #[test]
    fn should_keep_single_empty_cells_apart_from_separators() {
        let mut notes = ReportTable::new("Notes", ["Note"]);
        notes.push_row([""]);
        notes.push_row(["seen"]);
        let mut totals = ReportTable::new("Totals", ["Amount"]);
        totals.push_row(["10.00"]);
        let report = Report { title: "Ward Notes".to_string(), generated_at: Utc::now(), tables: vec![notes, totals] };

        let csv = to_csv(&report);
        assert!(csv.contains("Note\r\n\"\"\r\nseen\r\n\r\nTotals"));
        let (_, sections) = parse_csv_sections(&csv);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].rows, vec![vec![String::new()], vec!["seen".to_string()]]);
        assert_eq!(sections[1].title, "Totals");
    }

    #[test]
    fn should_escape_cells_in_word_export() {
        let mut table = ReportTable::new("Notes", ["Text"]);
        table.push_row(["<script>"]);
        let report = Report { title: "R & D".to_string(), generated_at: Utc::now(), tables: vec![table] };
        let html = to_word_html(&report);
        assert!(html.contains("urn:schemas-microsoft-com:office:word"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("R &amp; D"));
    }

    #[test]
    fn should_slug_file_stems() {
        let report = report();
        assert!(report.file_stem().starts_with("financial-summary-"));
    }
}
