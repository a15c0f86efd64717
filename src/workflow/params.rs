//! `${name}` parameter substitution against the current data row
//! (spec §4.7 "parameter substitution").

use crate::error::{Error, FieldError, Result};
use crate::workflow::data_row::DataRow;

/// Replaces every `${name}` placeholder in `value` with the matching
/// column from `row`. Unknown names are reported before any
/// replacement is returned, listing the row's available columns.
pub fn substitute(value: &str, row: &DataRow) -> Result<String> {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(start) = rest.find("${") {
        let Some(end) = rest[start..].find('}') else {
            out.push_str(rest);
            rest = "";
            break;
        };
        out.push_str(&rest[..start]);
        let name = &rest[start + 2..start + end];
        let resolved = row.get(name).ok_or_else(|| {
            Error::Field(FieldError::ParameterMissing {
                name: name.to_string(),
                available: row.columns(),
            })
        })?;
        out.push_str(resolved);
        rest = &rest[start + end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn row() -> DataRow {
        let mut cols = HashMap::new();
        cols.insert("user".to_string(), "USER1".to_string());
        cols.insert("password".to_string(), "PASS1".to_string());
        DataRow::new(cols)
    }

    #[test]
    fn substitutes_single_placeholder() {
        assert_eq!(substitute("${user}", &row()).unwrap(), "USER1");
    }

    #[test]
    fn substitutes_multiple_placeholders_in_one_string() {
        assert_eq!(substitute("${user}/${password}", &row()).unwrap(), "USER1/PASS1");
    }

    #[test]
    fn leaves_plain_text_untouched() {
        assert_eq!(substitute("MAINMENU", &row()).unwrap(), "MAINMENU");
    }

    #[test]
    fn unknown_name_reports_available_columns() {
        let err = substitute("${missing}", &row()).unwrap_err();
        match err {
            Error::Field(FieldError::ParameterMissing { name, mut available }) => {
                assert_eq!(name, "missing");
                available.sort();
                assert_eq!(available, vec!["password".to_string(), "user".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
