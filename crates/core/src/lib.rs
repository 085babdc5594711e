pub mod api;
pub mod domain;
pub mod time;
pub mod view;

pub mod config {
    #[derive(Debug, Clone)]
    pub struct Settings {
        pub api_base_url: Option<String>,
        pub sentry_dsn: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                api_base_url: std::env::var("API_BASE_URL").ok(),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
            })
        }
    }
}
