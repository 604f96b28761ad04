use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    #[serde(default)]
    pub options: OptionsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    #[serde(default = "default_expiry_hours")]
    pub expiry_hours: u64,
}

/// Select-option listing settings for the user form
#[derive(Debug, Clone, Deserialize)]
pub struct OptionsConfig {
    /// Upper bound for organization listing and search results
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

impl Default for OptionsConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_max_connections() -> u32 {
    10
}

fn default_expiry_hours() -> u64 {
    24
}

fn default_page_size() -> i64 {
    50
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::Environment::default().separator("__"))
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("database.url", "postgres://localhost/nova_user_admin")?
            .set_default("database.max_connections", 10)?
            .set_default("jwt.secret", "development-secret-change-in-production")?
            .set_default("jwt.expiry_hours", 24)?
            .set_default("options.page_size", 50)?
            .build()?;

        let config: Config = config.try_deserialize()?;
        if config.options.page_size < 1 {
            anyhow::bail!("options.page_size must be at least 1");
        }

        Ok(config)
    }

    /// Configuration used by tests and local tooling that never touch Postgres
    pub fn for_tests(jwt_secret: &str) -> Self {
        Self {
            server: ServerConfig {
                host: default_host(),
                port: default_port(),
            },
            database: DatabaseConfig {
                url: "postgres://localhost/nova_user_admin_test".to_string(),
                max_connections: 1,
            },
            jwt: JwtConfig {
                secret: jwt_secret.to_string(),
                expiry_hours: default_expiry_hours(),
            },
            options: OptionsConfig::default(),
        }
    }
}
