use std::path::{Component, Path};

use crate::UploadError;

/// Longest server-side key accepted, in bytes.
pub const MAX_KEY_LEN: usize = 1024;

/// Validates a server-side upload key.
///
/// Rejects:
/// - Empty keys and keys longer than [`MAX_KEY_LEN`]
/// - Control characters
/// - Absolute paths (Unix `/` or Windows `C:\`)
/// - Parent directory traversal (`..`)
pub fn validate_target_key(key: &str) -> Result<(), UploadError> {
    if key.is_empty() {
        return Err(invalid("empty target key"));
    }

    if key.len() > MAX_KEY_LEN {
        return Err(invalid(format!(
            "target key is {} bytes, limit is {MAX_KEY_LEN}",
            key.len()
        )));
    }

    if key.chars().any(char::is_control) {
        return Err(invalid(format!(
            "control character in target key: {key:?}"
        )));
    }

    let path = Path::new(key);

    if path.is_absolute() {
        return Err(invalid(format!("absolute target key not allowed: {key}")));
    }

    for component in path.components() {
        match component {
            Component::ParentDir => {
                return Err(invalid(format!(
                    "parent directory traversal not allowed: {key}"
                )));
            }
            Component::Prefix(_) | Component::RootDir => {
                return Err(invalid(format!("absolute target key not allowed: {key}")));
            }
            Component::CurDir | Component::Normal(_) => {}
        }
    }

    Ok(())
}

fn invalid(msg: impl Into<String>) -> UploadError {
    UploadError::InvalidConfiguration(msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_key() {
        assert!(validate_target_key("").is_err());
    }

    #[test]
    fn rejects_parent_dir_traversal() {
        assert!(validate_target_key("../../../etc/passwd").is_err());
        assert!(validate_target_key("images/../../escape").is_err());
        assert!(validate_target_key("..").is_err());
    }

    #[test]
    fn rejects_absolute_unix_path() {
        assert!(validate_target_key("/tmp/malicious").is_err());
    }

    #[test]
    fn rejects_control_characters() {
        assert!(validate_target_key("cat\n.png").is_err());
        assert!(validate_target_key("cat\0.png").is_err());
    }

    #[test]
    fn rejects_overlong_key() {
        let key = "a".repeat(MAX_KEY_LEN + 1);
        assert!(validate_target_key(&key).is_err());
        assert!(validate_target_key(&"a".repeat(MAX_KEY_LEN)).is_ok());
    }

    #[test]
    fn error_is_invalid_configuration() {
        assert!(matches!(
            validate_target_key(""),
            Err(UploadError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn accepts_timestamped_name() {
        assert!(validate_target_key("1700000000000_cat photo.png").is_ok());
    }

    #[test]
    fn accepts_nested_key() {
        assert!(validate_target_key("nfts/2024/cat.png").is_ok());
        assert!(validate_target_key("./cat.png").is_ok());
    }
}
