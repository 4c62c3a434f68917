use std::{net::SocketAddr, path::PathBuf};

use byte_unit::n_kib_bytes;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;

#[cfg(feature = "logging")]
use tracing_subscriber::filter::LevelFilter;

/// Database configuration.
#[derive(Deserialize)]
pub struct Database {
    /// Database URL string.
    pub url: String,
}

/// HTTP server configuration.
#[derive(Deserialize)]
pub struct Server {
    /// Address, that HTTP server will listen on.
    pub address: SocketAddr,
}

/// Implementation of [`serde`]'s deserializer for [`FromStr`] types.
#[cfg(feature = "logging")]
fn deserialize_from_str<'de, T, D>(deserializer: D) -> Result<T, D::Error>
where
    T: std::str::FromStr,
    T::Err: std::error::Error,
    D: serde::de::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    std::str::FromStr::from_str(&s).map_err(serde::de::Error::custom)
}

/// Logging configuration.
#[cfg(feature = "logging")]
#[derive(Deserialize)]
pub struct Logging {
    /// Log level.
    #[serde(deserialize_with = "deserialize_from_str")]
    pub level: LevelFilter,
}

#[cfg(feature = "logging")]
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: LevelFilter::WARN,
        }
    }
}

/// Deployment pipeline configuration.
#[derive(Deserialize)]
pub struct Deployment {
    /// Directory that contains rendered site builds, one sub-directory per project slug.
    pub builds_path: PathBuf,

    /// Delay between two readiness checks, in milliseconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,

    /// Max time to wait for a deployment to become ready, in milliseconds.
    ///
    /// Reaching this limit does not fail the deployment.
    #[serde(default = "default_max_wait")]
    pub max_wait: u64,

    /// Max count of file uploads running at the same time.
    #[serde(default = "default_upload_concurrency")]
    pub upload_concurrency: usize,

    /// Timeout of a single provider HTTP request, in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,

    /// Max size of a provider error body kept in logs and deployment records, in bytes.
    #[serde(default = "default_error_body_limit")]
    pub error_body_limit: usize,

    /// Build artifacts that are used for local bookkeeping only and must never be uploaded.
    #[serde(default = "default_excluded_files")]
    pub excluded_files: Vec<String>,
}

// Default values used for deployment configuration.
// Polling values match the providers' typical static build times.
fn default_poll_interval() -> u64 {
    2000
}

fn default_max_wait() -> u64 {
    60000
}

fn default_upload_concurrency() -> usize {
    8
}

fn default_request_timeout() -> u64 {
    30
}

fn default_error_body_limit() -> usize {
    n_kib_bytes!(2) as usize
}

fn default_excluded_files() -> Vec<String> {
    vec![String::from("config.schema.json")]
}

/// Vercel API configuration.
#[derive(Deserialize)]
pub struct Vercel {
    /// Bearer token, deployments to Vercel are rejected when absent.
    #[serde(default)]
    pub token: Option<String>,

    /// Team identifier, if projects are owned by a team.
    #[serde(default)]
    pub team_id: Option<String>,

    /// API base URL.
    #[serde(default = "default_vercel_api_url")]
    pub api_url: String,
}

impl Default for Vercel {
    fn default() -> Self {
        Self {
            token: None,
            team_id: None,
            api_url: default_vercel_api_url(),
        }
    }
}

fn default_vercel_api_url() -> String {
    String::from("https://api.vercel.com")
}

/// Netlify API configuration.
#[derive(Deserialize)]
pub struct Netlify {
    /// Bearer token, deployments to Netlify are rejected when absent.
    #[serde(default)]
    pub token: Option<String>,

    /// API base URL.
    #[serde(default = "default_netlify_api_url")]
    pub api_url: String,
}

impl Default for Netlify {
    fn default() -> Self {
        Self {
            token: None,
            api_url: default_netlify_api_url(),
        }
    }
}

fn default_netlify_api_url() -> String {
    String::from("https://api.netlify.com")
}

/// Hosting provider credentials and endpoints.
#[derive(Default, Deserialize)]
pub struct Providers {
    /// Vercel configuration.
    #[serde(default)]
    pub vercel: Vercel,

    /// Netlify configuration.
    #[serde(default)]
    pub netlify: Netlify,
}

/// Domain registration lookup configuration.
#[derive(Deserialize)]
pub struct Whois {
    /// RDAP bootstrap service URL.
    #[serde(default = "default_rdap_url")]
    pub rdap_url: String,
}

impl Default for Whois {
    fn default() -> Self {
        Self {
            rdap_url: default_rdap_url(),
        }
    }
}

fn default_rdap_url() -> String {
    String::from("https://rdap.org")
}

/// General configuration.
#[derive(Deserialize)]
pub struct Config {
    /// General database configuration.
    pub database: Database,

    /// HTTP server configuration.
    #[serde(default)]
    pub server: Option<Server>,

    /// Logging configuration.
    #[cfg(feature = "logging")]
    #[serde(default)]
    pub logging: Logging,

    /// Deployment pipeline configuration.
    pub deployment: Deployment,

    /// Hosting provider configuration.
    #[serde(default)]
    pub providers: Providers,

    /// Domain registration lookup configuration.
    #[serde(default)]
    pub whois: Whois,
}

impl Config {
    /// Create new config using default configuration file or environment variables.
    ///
    /// Nested environment variable keys are separated with a double underscore,
    /// for example `CONFIG_PROVIDERS__VERCEL__TOKEN`.
    ///
    /// See [`Env`] for more details on how to use environment variables configuration.
    ///
    /// [`Env`]: figment::providers::Env
    pub fn new(path: Option<PathBuf>) -> Result<Self, figment::Error> {
        Self::figment(path).extract()
    }

    fn figment(path: Option<PathBuf>) -> Figment {
        Figment::new()
            .merge(Toml::file(path.unwrap_or(PathBuf::from("Config.toml"))))
            .merge(Env::prefixed("CONFIG_").split("__"))
    }

    /// Create new config suitable for running unit tests.
    #[cfg(feature = "test-utils")]
    pub fn for_tests() -> Self {
        Self {
            database: Database {
                url: String::from("sqlite::memory:"),
            },
            server: Some(Server {
                address: "127.0.0.1:3000".parse().unwrap(),
            }),
            #[cfg(feature = "logging")]
            logging: Logging::default(),
            deployment: Deployment {
                builds_path: std::env::temp_dir(),
                poll_interval: 10,
                max_wait: 50,
                upload_concurrency: 4,
                request_timeout: 5,
                error_body_limit: default_error_body_limit(),
                excluded_files: default_excluded_files(),
            },
            providers: Providers::default(),
            whois: Whois::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use figment::Jail;

    use super::Config;

    #[test]
    fn defaults() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "Config.toml",
                r#"
                [database]
                url = "postgres://localhost/sites"

                [deployment]
                builds_path = "/var/lib/sites"
                "#,
            )?;

            let config = Config::new(None)?;

            assert_eq!(config.deployment.poll_interval, 2000);
            assert_eq!(config.deployment.max_wait, 60000);
            assert_eq!(config.deployment.upload_concurrency, 8);
            assert_eq!(config.deployment.error_body_limit, 2048);
            assert_eq!(
                config.deployment.excluded_files,
                vec![String::from("config.schema.json")]
            );
            assert!(config.providers.vercel.token.is_none());
            assert_eq!(config.providers.netlify.api_url, "https://api.netlify.com");
            assert_eq!(config.whois.rdap_url, "https://rdap.org");

            Ok(())
        });
    }

    #[test]
    fn environment_overrides() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "Sites.toml",
                r#"
                [database]
                url = "postgres://localhost/sites"

                [deployment]
                builds_path = "/var/lib/sites"
                max_wait = 1000
                "#,
            )?;

            jail.set_env("CONFIG_PROVIDERS__VERCEL__TOKEN", "secret");
            jail.set_env("CONFIG_DEPLOYMENT__MAX_WAIT", "5000");

            let config = Config::new(Some(PathBuf::from("Sites.toml")))?;

            assert_eq!(config.providers.vercel.token.as_deref(), Some("secret"));
            assert_eq!(config.deployment.max_wait, 5000);

            Ok(())
        });
    }
}
