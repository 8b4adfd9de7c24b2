use std::path::PathBuf;

const APP_DIR_NAME: &str = "kitline";

/// Directory for locally persisted state (availability cache, offline database).
///
/// Falls back to the working directory when the platform has no data dir.
pub fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join(APP_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(".").join(APP_DIR_NAME))
}

pub fn availability_cache_path() -> PathBuf {
    data_dir().join("availability.json")
}

pub fn offline_database_path() -> PathBuf {
    data_dir().join("kitline.sqlite")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_path_lives_in_data_dir() {
        let path = availability_cache_path();
        assert!(path.starts_with(data_dir()));
        assert_eq!(path.file_name().unwrap(), "availability.json");
    }
}
