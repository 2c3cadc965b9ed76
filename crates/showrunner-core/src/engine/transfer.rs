//! List export/import file format.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::error::ImportError;
use crate::playlist::CategoryLists;

pub const EXPORT_FORMAT: &str = "wweAltLists";
pub const EXPORT_VERSION: &str = "1";

/// `{format, version, exportedAt, lists: {raw, sd, ppv, heat}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListsExport {
    pub format: String,
    pub version: String,
    pub exported_at: String,
    pub lists: ExportedLists,
}

/// All four fields are required on import; a missing list rejects the payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedLists {
    pub raw: Vec<String>,
    pub sd: Vec<String>,
    pub ppv: Vec<String>,
    pub heat: Vec<String>,
}

impl From<&CategoryLists> for ExportedLists {
    fn from(lists: &CategoryLists) -> Self {
        Self {
            raw: lists.raw.clone(),
            sd: lists.sd.clone(),
            ppv: lists.ppv.clone(),
            heat: lists.heat.clone(),
        }
    }
}

impl From<ExportedLists> for CategoryLists {
    fn from(lists: ExportedLists) -> Self {
        Self {
            raw: lists.raw,
            sd: lists.sd,
            ppv: lists.ppv,
            heat: lists.heat,
        }
    }
}

impl ListsExport {
    pub fn new(lists: &CategoryLists, exported_at: DateTime<Utc>) -> Self {
        Self {
            format: EXPORT_FORMAT.to_string(),
            version: EXPORT_VERSION.to_string(),
            exported_at: exported_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            lists: ExportedLists::from(lists),
        }
    }
}

#[derive(Deserialize)]
struct ImportPayload {
    format: String,
    lists: ExportedLists,
}

/// Validate an import payload and return its lists.
///
/// `version` and `exportedAt` are informational and not checked.
pub fn parse_import(payload: &str) -> Result<CategoryLists, ImportError> {
    let parsed: ImportPayload = serde_json::from_str(payload)?;
    if parsed.format != EXPORT_FORMAT {
        return Err(ImportError::Format {
            found: parsed.format,
            expected: EXPORT_FORMAT,
        });
    }
    Ok(parsed.lists.into())
}

/// `wwe_lists_<timestamp>.json`, with `:` and `.` made filename-safe.
pub fn export_file_name(at: DateTime<Utc>) -> String {
    let stamp = at
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "_");
    format!("wwe_lists_{stamp}.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap()
    }

    #[test]
    fn export_shape() {
        let lists = CategoryLists {
            heat: vec!["2004-01-01 https://a.example/h".into()],
            ..Default::default()
        };
        let json = serde_json::to_value(ListsExport::new(&lists, at())).unwrap();
        assert_eq!(json["format"], "wweAltLists");
        assert_eq!(json["version"], "1");
        assert_eq!(json["exportedAt"], "2024-05-06T07:08:09.000Z");
        assert_eq!(json["lists"]["heat"][0], "2004-01-01 https://a.example/h");
        assert!(json["lists"]["raw"].as_array().unwrap().is_empty());
    }

    #[test]
    fn import_accepts_exported_payload() {
        let lists = CategoryLists::from_texts("2004-01-01 https://a.example/r", "x", "", "");
        let payload = serde_json::to_string(&ListsExport::new(&lists, at())).unwrap();
        assert_eq!(parse_import(&payload).unwrap(), lists);
    }

    #[test]
    fn import_rejects_missing_list() {
        let payload = r#"{"format":"wweAltLists","version":"1","lists":{"raw":[],"sd":[],"ppv":[]}}"#;
        assert!(matches!(parse_import(payload), Err(ImportError::Schema(_))));
    }

    #[test]
    fn import_rejects_non_string_lines() {
        let payload = r#"{"format":"wweAltLists","lists":{"raw":[1],"sd":[],"ppv":[],"heat":[]}}"#;
        assert!(matches!(parse_import(payload), Err(ImportError::Schema(_))));
    }

    #[test]
    fn import_rejects_other_formats() {
        let payload = r#"{"format":"somethingElse","lists":{"raw":[],"sd":[],"ppv":[],"heat":[]}}"#;
        assert!(matches!(parse_import(payload), Err(ImportError::Format { .. })));
    }

    #[test]
    fn import_rejects_garbage() {
        assert!(parse_import("not json").is_err());
        assert!(parse_import("[]").is_err());
    }

    #[test]
    fn file_name_is_filesystem_safe() {
        assert_eq!(
            export_file_name(at()),
            "wwe_lists_2024-05-06T07_08_09_000Z.json"
        );
    }
}
