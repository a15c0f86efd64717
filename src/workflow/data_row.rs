//! A single row of batch input data, and the CSV reader that produces
//! rows from a data file (spec §4.7 "data source").

use std::collections::HashMap;

/// One row of named column values, addressed by workflow steps via
/// `${name}` substitution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataRow(HashMap<String, String>);

impl DataRow {
    pub fn new(columns: HashMap<String, String>) -> Self {
        DataRow(columns)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn columns(&self) -> Vec<String> {
        let mut names: Vec<String> = self.0.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Parses an RFC 4180-style CSV document into [`DataRow`]s, using the
/// first record as the column header. Hand-rolled rather than a `csv`
/// dependency: quoting is the only feature batch data files need
/// (embedded commas and escaped quotes), so a small state machine
/// covers it without pulling in a new crate.
pub fn parse_csv(text: &str) -> Vec<DataRow> {
    let records = split_csv_records(text);
    let Some((header, rows)) = records.split_first() else {
        return Vec::new();
    };
    rows.iter()
        .map(|row| {
            let mut columns = HashMap::with_capacity(header.len());
            for (name, value) in header.iter().zip(row.iter()) {
                columns.insert(name.clone(), value.clone());
            }
            DataRow::new(columns)
        })
        .collect()
}

/// Splits CSV text into records of unescaped fields, honoring
/// double-quoted fields (with `""` as an escaped quote) and both `\n`
/// and `\r\n` line endings. Blank lines are skipped.
fn split_csv_records(text: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();
    let mut row_has_content = false;

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    field.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(c);
            }
            continue;
        }

        match c {
            '"' => {
                in_quotes = true;
                row_has_content = true;
            }
            ',' => {
                fields.push(std::mem::take(&mut field));
                row_has_content = true;
            }
            '\r' => {}
            '\n' => {
                if row_has_content || !field.is_empty() || !fields.is_empty() {
                    fields.push(std::mem::take(&mut field));
                    records.push(std::mem::take(&mut fields));
                }
                row_has_content = false;
            }
            _ => {
                field.push(c);
                row_has_content = true;
            }
        }
    }
    if row_has_content || !field.is_empty() || !fields.is_empty() {
        fields.push(field);
        records.push(fields);
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_header_and_rows() {
        let rows = parse_csv("user,password\nUSER1,PASS1\nUSER2,PASS2\n");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("user"), Some("USER1"));
        assert_eq!(rows[1].get("password"), Some("PASS2"));
    }

    #[test]
    fn handles_quoted_fields_with_embedded_commas_and_quotes() {
        let rows = parse_csv("name,note\n\"Doe, Jane\",\"she said \"\"hi\"\"\"\n");
        assert_eq!(rows[0].get("name"), Some("Doe, Jane"));
        assert_eq!(rows[0].get("note"), Some("she said \"hi\""));
    }

    #[test]
    fn skips_blank_lines() {
        let rows = parse_csv("a,b\n\n1,2\n\n3,4\n");
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn empty_input_yields_no_rows() {
        assert!(parse_csv("").is_empty());
        assert!(parse_csv("a,b\n").is_empty());
    }
}
