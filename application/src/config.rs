//! [`Config`]-related definitions.

use std::time;

use config::{builder::DefaultState, ConfigBuilder, ConfigError};
use derive_more::{Display, Error, From};
use secrecy::{ExposeSecret as _, SecretString};
use serde::Deserialize;
use service::{
    domain::user,
    infra::{
        mailer::{self, Transport},
        postgres::retry,
    },
};
use smart_default::SmartDefault;
use tracerr::Traced;

/// Application configuration.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration.
    pub server: Server,

    /// Service configuration.
    pub service: Service,

    /// Postgres configuration.
    pub postgres: Postgres,

    /// Mailer configuration.
    pub mailer: Mailer,

    /// Log configuration.
    pub log: Log,
}

impl Config {
    /// Creates a new [`Config`] by:
    /// - loading it from the provided `path` (if any);
    /// - merging it with the environment variables (if any);
    /// - using default values for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(path: impl AsRef<str>) -> Result<Self, ConfigError> {
        ConfigBuilder::<DefaultState>::default()
            .add_source(config::File::with_name(path.as_ref()).required(false))
            .add_source(config::Environment::with_prefix("CONF").separator("."))
            .build()?
            .try_deserialize()
    }
}

/// Server configuration.
#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Server {
    /// Host to bind the server to.
    #[default("0.0.0.0".to_owned())]
    pub host: String,

    /// Port to bind the server to.
    #[default(8080)]
    pub port: u16,

    /// [CORS] configuration.
    ///
    /// [CORS]: https://developer.mozilla.org/en-US/docs/Web/HTTP/CORS
    pub cors: Cors,
}

/// [CORS] configuration.
///
/// [CORS]: https://developer.mozilla.org/en-US/docs/Web/HTTP/CORS
#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Cors {
    /// List of allowed origins.
    #[default(vec!["*".to_owned()])]
    pub origins: Vec<String>,
}

/// Service configuration.
#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Service {
    /// [JWT] secret shared with the authentication subsystem.
    ///
    /// [JWT]: https://wikipedia.org/wiki/JSON_Web_Token
    #[default(SecretString::from("secret"))]
    pub jwt_secret: SecretString,

    /// Agreement signing configuration.
    pub agreement: Agreement,

    /// Service tasks configuration.
    pub tasks: Tasks,
}

impl From<Service> for service::Config {
    fn from(value: Service) -> Self {
        let Service {
            jwt_secret,
            agreement:
                Agreement {
                    default_expires_in_days,
                    max_expires_in_days,
                },
            tasks: Tasks { expire_agreements },
        } = value;
        Self {
            jwt_decoding_key: jsonwebtoken::DecodingKey::from_secret(
                jwt_secret.expose_secret().as_bytes(),
            ),
            agreement: service::AgreementConfig {
                default_expires_in_days,
                max_expires_in_days,
            },
            expire_agreements: service::task::expire_agreements::Config {
                interval: expire_agreements.interval,
            },
        }
    }
}

/// Agreement signing configuration.
#[derive(Clone, Copy, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Agreement {
    /// Number of days given to sign when not specified on initiation.
    #[default(7)]
    pub default_expires_in_days: u16,

    /// Maximum number of days which may be given to sign.
    #[default(90)]
    pub max_expires_in_days: u16,
}

/// Service tasks configuration.
#[derive(Clone, Copy, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Tasks {
    /// `ExpireAgreements` task configuration.
    pub expire_agreements: Task,
}

/// Service task configuration.
#[derive(Clone, Copy, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Task {
    /// Task execution interval.
    #[default(time::Duration::from_secs(5 * 60))]
    #[serde(with = "humantime_serde")]
    pub interval: time::Duration,
}

/// Postgres configuration.
#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Postgres {
    /// Host to connect to.
    #[default("127.0.0.1".to_owned())]
    pub host: String,

    /// Port to connect to.
    #[default(5432)]
    pub port: u16,

    /// User to connect as.
    #[default("postgres".to_owned())]
    pub user: String,

    /// Password to connect with.
    #[default(SecretString::from("postgres"))]
    pub password: SecretString,

    /// Database name to connect to.
    #[default("postgres".to_owned())]
    pub dbname: String,

    /// Retrying of transient failures.
    pub retry: Retry,
}

impl From<Postgres> for service::infra::postgres::Config {
    fn from(value: Postgres) -> Self {
        let Postgres {
            host,
            port,
            user,
            password,
            dbname,
            retry: _,
        } = value;

        Self {
            host: Some(host),
            port: Some(port),
            user: Some(user),
            password: Some(password.expose_secret().to_owned()),
            dbname: Some(dbname),
            ..Self::default()
        }
    }
}

/// Configuration of retrying transient Postgres failures.
#[derive(Clone, Copy, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Retry {
    /// Maximum number of attempts, including the first one.
    #[default(3)]
    pub attempts: u32,

    /// Delay before the first retry, doubled on every next one.
    #[default(time::Duration::from_millis(100))]
    #[serde(with = "humantime_serde")]
    pub backoff: time::Duration,

    /// Upper bound of the delay between retries.
    #[default(time::Duration::from_secs(5))]
    #[serde(with = "humantime_serde")]
    pub max_backoff: time::Duration,
}

impl From<Retry> for retry::Policy {
    fn from(value: Retry) -> Self {
        let Retry {
            attempts,
            backoff,
            max_backoff,
        } = value;
        Self {
            attempts,
            backoff,
            max_backoff,
        }
    }
}

/// Mailer configuration.
#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Mailer {
    /// Kind of the mail transport.
    pub kind: MailerKind,

    /// Address the emails are sent from.
    #[default("no-reply@rentverse.com".to_owned())]
    pub from: String,

    /// HTTP email API configuration, used by [`MailerKind::Http`].
    pub http: MailerHttp,
}

impl Mailer {
    /// Builds the configured [`Transport`].
    ///
    /// # Errors
    ///
    /// If the sender address is invalid, or the HTTP client cannot be
    /// initialized.
    pub fn transport(self) -> Result<Transport, MailerError> {
        let Self { kind, from, http } = self;

        Ok(match kind {
            MailerKind::Log => Transport::Log(mailer::Log),
            MailerKind::Http => {
                let from = user::Email::new(from.clone())
                    .ok_or(MailerError::InvalidFrom(from))?;
                Transport::Http(mailer::Http::new(mailer::http::Config {
                    url: http.url,
                    api_key: http.api_key,
                    from,
                    timeout: http.timeout,
                })?)
            }
        })
    }
}

/// Kind of the mail transport.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MailerKind {
    /// Emails are written to the log.
    #[default]
    Log,

    /// Emails are posted to an HTTP email API.
    Http,
}

/// HTTP email API configuration.
#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct MailerHttp {
    /// URL of the endpoint accepting messages.
    #[default("http://127.0.0.1:8025/api/v1/send".to_owned())]
    pub url: String,

    /// Bearer key authorizing requests.
    #[default(SecretString::from(""))]
    pub api_key: SecretString,

    /// Timeout of a single request.
    #[default(time::Duration::from_secs(10))]
    #[serde(with = "humantime_serde")]
    pub timeout: time::Duration,
}

/// Error of building a [`Transport`].
#[derive(Debug, Display, Error, From)]
pub enum MailerError {
    /// HTTP transport cannot be initialized.
    #[display("Failed to initialize HTTP mailer: {_0}")]
    Http(Traced<mailer::Error>),

    /// Sender address is not a valid email.
    #[display("`{_0}` is not a valid sender address")]
    #[from(ignore)]
    InvalidFrom(#[error(not(source))] String),
}

/// Log configuration.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Log {
    /// Log level.
    pub level: LogLevel,
}

/// Log level.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogLevel {
    /// Designates very low priority, often extremely verbose, information.
    Trace,

    /// Designates lower priority information.
    Debug,

    /// Designates useful information.
    #[default]
    Info,

    /// Designates hazardous situations.
    Warn,

    /// Designates very serious errors.
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(value: LogLevel) -> Self {
        match value {
            LogLevel::Trace => Self::TRACE,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Info => Self::INFO,
            LogLevel::Warn => Self::WARN,
            LogLevel::Error => Self::ERROR,
        }
    }
}
