use std::path::{Component, Path};

use crate::TransferError;

/// Validates a container (bucket) name.
///
/// Rejects empty or whitespace-only names and anything containing a path
/// separator or naming the current/parent directory.
pub fn validate_container(container: &str) -> Result<(), TransferError> {
    if container.trim().is_empty() {
        return Err(TransferError::Configuration(
            "container name must not be empty".into(),
        ));
    }
    if container.contains(['/', '\\']) || container == "." || container == ".." {
        return Err(TransferError::Configuration(format!(
            "invalid container name: {container}"
        )));
    }
    Ok(())
}

/// Validates that an object key is usable as a transfer destination.
pub fn validate_object_key(key: &str) -> Result<(), TransferError> {
    if key.trim().is_empty() {
        return Err(TransferError::Configuration(
            "object key must not be empty".into(),
        ));
    }
    Ok(())
}

/// Validates that an object key maps to a relative path that stays inside
/// its container directory.
///
/// Rejects:
/// - Empty keys
/// - Absolute paths (Unix `/` or Windows `C:\`)
/// - Parent directory traversal (`..`)
/// - Windows prefix components (`C:`, `\\server`)
pub fn validate_key_path(key: &str) -> Result<(), TransferError> {
    if key.is_empty() {
        return Err(TransferError::Configuration("empty object key".into()));
    }

    let path = Path::new(key);

    if path.is_absolute() {
        return Err(TransferError::Configuration(format!(
            "absolute object key not allowed: {key}"
        )));
    }

    for component in path.components() {
        match component {
            Component::ParentDir => {
                return Err(TransferError::Configuration(format!(
                    "parent directory traversal not allowed: {key}"
                )));
            }
            Component::Prefix(_) | Component::RootDir => {
                return Err(TransferError::Configuration(format!(
                    "absolute object key not allowed: {key}"
                )));
            }
            Component::CurDir | Component::Normal(_) => {}
        }
    }

    Ok(())
}
