//! CSV export of records, one row per record in sheet column order.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};

use crate::models::{Record, RECORD_COLUMNS};

fn needs_quotes(field: &str) -> bool {
    field.contains([',', '"', '\n', '\r'])
}

fn push_row<'a>(output: &mut String, cells: impl IntoIterator<Item = &'a str>) {
    for (position, cell) in cells.into_iter().enumerate() {
        if position > 0 {
            output.push(',');
        }
        if needs_quotes(cell) {
            let _ = write!(output, "\"{}\"", cell.replace('"', "\"\""));
        } else {
            output.push_str(cell);
        }
    }
    output.push('\n');
}

/// Render `records` as CSV with a header row.
#[must_use]
pub fn render_csv_export(records: &[Record]) -> String {
    let mut output = String::new();
    push_row(&mut output, RECORD_COLUMNS);
    for record in records {
        push_row(&mut output, record.values());
    }
    output
}

/// Default file name for an export taken at `now`.
#[must_use]
pub fn suggested_export_file_name(now: DateTime<Utc>) -> String {
    format!("linklog-{}.csv", now.format("%Y%m%d-%H%M%S"))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::models::RecordFields;

    #[test]
    fn empty_export_is_header_only() {
        assert_eq!(
            render_csv_export(&[]),
            "name,title,company,profile_url,requested_at,follow_up_date,tag,notes\n"
        );
    }

    #[test]
    fn fields_with_separators_are_quoted() {
        let record = Record::new(RecordFields {
            name: "Ada Lovelace".to_string(),
            title: "Engineer, Analytical".to_string(),
            company: "Babbage & Co".to_string(),
            profile_url: "https://example.com/in/ada".to_string(),
            requested_at: "2024-03-01T10:00:00.000Z".to_string(),
            follow_up_date: "2024-03-15".to_string(),
            tag: "math".to_string(),
            notes: "said \"call me\"\nnext week".to_string(),
        })
        .unwrap();

        let csv = render_csv_export(&[record]);
        let body = csv.lines().skip(1).collect::<Vec<_>>().join("\n");
        assert_eq!(
            body,
            "Ada Lovelace,\"Engineer, Analytical\",Babbage & Co,https://example.com/in/ada,\
             2024-03-01T10:00:00.000Z,2024-03-15,math,\"said \"\"call me\"\"\nnext week\""
        );
    }

    #[test]
    fn file_name_uses_timestamp() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 9, 5, 7).unwrap();
        assert_eq!(suggested_export_file_name(now), "linklog-20240301-090507.csv");
    }
}
