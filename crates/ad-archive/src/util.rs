use ad_core::error::ArchiveError;
use ad_core::types::DiffText;
use chrono::{DateTime, Utc};

pub fn to_rfc3339(value: &DateTime<Utc>) -> String {
    value.to_rfc3339()
}

/// Splits a diff into its `(diff_kind, diff_text)` columns.
pub fn encode_diff(diff: &DiffText) -> (&'static str, &str) {
    match diff {
        DiffText::Fetched(text) => ("fetched", text),
        DiffText::Failed(text) => ("failed", text),
    }
}

pub fn decode_diff(kind: &str, text: String) -> Result<DiffText, ArchiveError> {
    match kind {
        "fetched" => Ok(DiffText::Fetched(text)),
        "failed" => Ok(DiffText::Failed(text)),
        other => Err(ArchiveError::Decode {
            message: format!("invalid diff kind: {other}"),
        }),
    }
}

pub fn storage_error(err: &rusqlite::Error) -> ArchiveError {
    ArchiveError::Storage {
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_diff_kind_is_a_decode_error() {
        assert!(matches!(
            decode_diff("partial", String::new()),
            Err(ArchiveError::Decode { .. })
        ));
        assert_eq!(
            decode_diff("failed", "Error fetching diff: 404".to_string()).unwrap(),
            DiffText::Failed("Error fetching diff: 404".to_string())
        );
    }
}
