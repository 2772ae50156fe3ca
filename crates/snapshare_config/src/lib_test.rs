#[cfg(test)]
mod tests {
    use crate::*;
    use std::fs;

    fn write_default(dir: &std::path::Path, body: &str) {
        fs::write(dir.join("default.toml"), body).expect("write default.toml");
    }

    #[test]
    fn test_load_config_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        write_default(
            dir.path(),
            r#"
[database]
url = "sqlite://snapshare-test.db?mode=rwc"

[push]
base_url = "https://push.example.com/v1"
ios_application = "app/APNS/snapshare"
android_application = "app/GCM/snapshare"

[push.topics]
comments = "topic/comments"
follows = "topic/follows"
"#,
        );

        let config = load_config_from(dir.path()).unwrap();

        let database = config.database.expect("database section");
        assert_eq!(database.url, "sqlite://snapshare-test.db?mode=rwc");

        let push = config.push.expect("push section");
        assert_eq!(push.ios_application, "app/APNS/snapshare");
        assert_eq!(push.topics.len(), 2);
        assert_eq!(push.topics.get("follows").unwrap(), "topic/follows");
        assert!(push.api_key.is_none());
    }

    #[test]
    fn test_missing_files_yield_empty_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(dir.path()).unwrap();
        assert!(config.database.is_none());
        assert!(config.push.is_none());
    }

    #[test]
    fn test_secret_marker_is_replaced_from_env() {
        std::env::set_var("PUSH_API_KEY", "key-from-env");

        let config = AppConfig {
            database: None,
            push: Some(PushConfig {
                base_url: "https://push.example.com".to_string(),
                api_key: Some(SECRET_FROM_ENV.to_string()),
                ios_application: "ios".to_string(),
                android_application: "android".to_string(),
                topics: Default::default(),
            }),
        };

        let config = apply_env_overrides_from_marker(config).unwrap();
        assert_eq!(
            config.push.unwrap().api_key.as_deref(),
            Some("key-from-env")
        );
    }
}
