//! Package layout contract
//!
//! File names and keys the customizer writes and the deployer reads back
//! out of the archive.

/// Process entry point; sits at the root of every managed-cloud archive
pub const ENTRY_POINT_FILE: &str = "wsgi.py";

/// Environment file at the site root
pub const ENV_FILE: &str = ".env";

/// Key of the storage connection string, in the environment file and in
/// the hosted application's settings
pub const CONNECTION_STRING_KEY: &str = "MONGODB_URI";

/// Environment file content carrying `connection_string`
pub fn env_file_content(connection_string: &str) -> String {
    format!("{}={}", CONNECTION_STRING_KEY, connection_string)
}

/// Connection string from environment file content, trimmed
pub fn connection_string_from_env(content: &str) -> Option<&str> {
    content.lines().find_map(|line| {
        line.strip_prefix(CONNECTION_STRING_KEY)
            .and_then(|rest| rest.strip_prefix('='))
            .map(str::trim)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_file_is_read_back() {
        let content = env_file_content("mongodb://db:27017/links");
        assert_eq!(content, "MONGODB_URI=mongodb://db:27017/links");
        assert_eq!(connection_string_from_env(&content), Some("mongodb://db:27017/links"));
    }

    #[test]
    fn test_connection_string_lookup_ignores_other_keys() {
        let content = "OTHER=1\nMONGODB_URI_BACKUP=x\nMONGODB_URI= mongodb://x:1/y \n";
        assert_eq!(connection_string_from_env(content), Some("mongodb://x:1/y"));
        assert_eq!(connection_string_from_env("OTHER=1"), None);
    }
}
