//! Question bank - test definitions served from a directory of JSON files.

use autotest_engine::TestDefinition;
use std::io::ErrorKind;
use std::path::Path;

use super::check_key;
use crate::error::{AppError, Result};

/// Read and validate `{dir}/{test_id}.json`.
pub async fn load_test(dir: &Path, test_id: &str) -> Result<TestDefinition> {
    check_key("test id", test_id)?;
    let path = dir.join(format!("{}.json", test_id));

    let text = match tokio::fs::read_to_string(&path).await {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(AppError::NotFound(format!("test {}", test_id)));
        }
        Err(e) => {
            return Err(AppError::Internal(format!(
                "reading {}: {}",
                path.display(),
                e
            )));
        }
    };

    let definition: TestDefinition = serde_json::from_str(&text)
        .map_err(|e| AppError::Internal(format!("parsing {}: {}", path.display(), e)))?;
    definition
        .validate()
        .map_err(|e| AppError::Internal(format!("invalid test {}: {}", test_id, e)))?;

    // Clients refuse a definition whose id is not the one they asked for.
    if definition.id != test_id {
        return Err(AppError::Internal(format!(
            "test definition id mismatch: {} holds {}",
            path.display(),
            definition.id
        )));
    }
    Ok(definition)
}
