//! Recording acquisition
//!
//! Turns uploaded or on-disk CSV files into [`crate::types::RawRecording`]s:
//! parse the table, validate the machine identifier, then map columns with
//! the machine's profile.

pub mod channels;
pub mod csv_table;

pub use channels::{map_columns, normalize_header};
pub use csv_table::{read_table, read_table_from_path, write_table};

use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

use crate::error::{AnalysisError, AnalysisResult};

const MACHINE_ID_PATTERN: &str = r"^[A-Za-z0-9][A-Za-z0-9._-]{0,63}$";

static MACHINE_ID_RE: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();

/// Reject identifiers that are empty, too long or carry path characters.
pub fn validate_machine_id(machine_id: &str) -> AnalysisResult<()> {
    let re = MACHINE_ID_RE
        .get_or_init(|| Regex::new(MACHINE_ID_PATTERN))
        .as_ref()
        .map_err(|e| AnalysisError::InvalidConfig(format!("machine id pattern: {e}")))?;
    if re.is_match(machine_id) {
        Ok(())
    } else {
        Err(AnalysisError::malformed(format!(
            "invalid machine id '{machine_id}': expected 1-64 of [A-Za-z0-9._-], starting alphanumeric"
        )))
    }
}

/// Machine identifier encoded in a file name as the token before the first
/// underscore (`PUMP-07_2024-05-01.csv` → `PUMP-07`).
pub fn machine_id_from_filename(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let token = stem.split('_').next()?;
    validate_machine_id(token).ok()?;
    Some(token.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_machine_id_rules() {
        assert!(validate_machine_id("PUMP-07").is_ok());
        assert!(validate_machine_id("m1.a_b").is_ok());
        assert!(validate_machine_id("").is_err());
        assert!(validate_machine_id("../etc").is_err());
        assert!(validate_machine_id(&"x".repeat(65)).is_err());
    }

    #[test]
    fn test_machine_id_pattern_compiles() {
        assert!(Regex::new(MACHINE_ID_PATTERN).is_ok());
    }

    #[test]
    fn test_machine_id_from_filename() {
        assert_eq!(
            machine_id_from_filename(Path::new("data/PUMP-07_2024-05-01.csv")),
            Some("PUMP-07".to_string())
        );
        assert_eq!(
            machine_id_from_filename(Path::new("FAN3.csv")),
            Some("FAN3".to_string())
        );
        assert_eq!(machine_id_from_filename(Path::new("_x.csv")), None);
    }
}
