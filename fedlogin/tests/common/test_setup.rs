use std::sync::Once;

/// Environment bootstrap shared by every integration test.
///
/// Environment variables are set once per process; store initialization is
/// idempotent (`CREATE TABLE IF NOT EXISTS`) and safe to repeat per test.
pub async fn init_test_environment() {
    static ENV_INIT: Once = Once::new();
    ENV_INIT.call_once(|| {
        dotenvy::from_filename(".env_test").ok();

        let defaults = [
            ("ORIGIN", "http://localhost:3000"),
            ("CACHE_STORE_TYPE", "memory"),
            ("DATA_STORE_TYPE", "sqlite"),
            (
                "DATA_STORE_URL",
                "sqlite:file:fedlogin_integration?mode=memory&cache=shared",
            ),
        ];
        for (key, value) in defaults {
            if std::env::var(key).is_err() {
                unsafe {
                    std::env::set_var(key, value);
                }
            }
        }
    });

    fedlogin::init()
        .await
        .expect("Failed to initialize stores for integration tests");
}

pub fn test_origin() -> String {
    std::env::var("ORIGIN").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

pub fn test_rp_id() -> String {
    test_origin()
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .split(':')
        .next()
        .unwrap_or("localhost")
        .to_string()
}
