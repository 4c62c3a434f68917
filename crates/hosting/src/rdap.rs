//! Domain registration lookup over RDAP.
//!
//! RDAP responses are only partially parsed: the registration expiry event
//! and the registrar entity name are the only fields domain records rely on.

use std::time::Duration;

use async_trait::async_trait;
use common::config;
use derive_more::{Display, Error, From};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use time::{format_description::well_known::Rfc3339, OffsetDateTime, PrimitiveDateTime};

/// Registration details of a single domain.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RegistrationInfo {
    /// Registration expiry timestamp, in UTC.
    pub expires_at: Option<PrimitiveDateTime>,

    /// Registrar name.
    pub registrar: Option<String>,
}

/// Errors that may occur during a registration lookup.
#[derive(Debug, Display, From, Error)]
pub enum LookupError {
    /// HTTP client error.
    #[display(fmt = "registration lookup failed: {}", _0)]
    Http(reqwest::Error),

    /// Registry has no data about the domain.
    #[from(ignore)]
    #[display(fmt = "no registration data found for {}", domain)]
    NotFound { domain: String },

    /// Registry responded with an unexpected status.
    #[display(fmt = "registration lookup responded with status {}", _0)]
    Status(#[error(not(source))] u16),

    /// Expiration event contains an invalid date.
    #[display(fmt = "invalid expiration date: {}", _0)]
    InvalidDate(time::error::Parse),

    /// Expiration date cannot be represented in UTC.
    #[from(ignore)]
    #[display(fmt = "expiration date {} is out of range", _0)]
    DateOutOfRange(#[error(not(source))] String),
}

/// Source of domain registration details.
#[async_trait]
pub trait DomainLookup: Send + Sync {
    async fn lookup(&self, domain: &str) -> Result<RegistrationInfo, LookupError>;
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Event {
    event_action: String,
    event_date: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Entity {
    #[serde(default)]
    roles: Vec<String>,
    #[serde(default)]
    vcard_array: Option<Value>,
}

#[derive(Deserialize)]
struct DomainResponse {
    #[serde(default)]
    events: Vec<Event>,
    #[serde(default)]
    entities: Vec<Entity>,
}

impl Entity {
    /// Formatted name from a jCard (RFC 7095) array.
    fn name(&self) -> Option<String> {
        self.vcard_array
            .as_ref()?
            .get(1)?
            .as_array()?
            .iter()
            .find(|property| property.get(0).and_then(Value::as_str) == Some("fn"))?
            .get(3)?
            .as_str()
            .map(String::from)
    }
}

impl DomainResponse {
    fn into_info(self) -> Result<RegistrationInfo, LookupError> {
        let expires_at = self
            .events
            .iter()
            .find(|event| event.event_action == "expiration")
            .map(|event| parse_date(&event.event_date))
            .transpose()?;

        let registrar = self
            .entities
            .iter()
            .filter(|entity| entity.roles.iter().any(|role| role == "registrar"))
            .find_map(Entity::name);

        Ok(RegistrationInfo {
            expires_at,
            registrar,
        })
    }
}

/// Parse an RFC 3339 date into a UTC timestamp.
fn parse_date(value: &str) -> Result<PrimitiveDateTime, LookupError> {
    let date = OffsetDateTime::parse(value, &Rfc3339)?;
    let offset = time::Duration::seconds(date.offset().whole_seconds().into());

    PrimitiveDateTime::new(date.date(), date.time())
        .checked_sub(offset)
        .ok_or_else(|| LookupError::DateOutOfRange(value.to_owned()))
}

/// RDAP-backed [`DomainLookup`] implementation.
pub struct RdapLookup {
    client: Client,
    base_url: String,
}

impl RdapLookup {
    pub fn new(client: Client, base_url: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
        }
    }

    /// Create a new lookup client from the application configuration.
    pub fn from_config(config: &config::Config) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.deployment.request_timeout))
            .build()?;

        Ok(Self::new(client, config.whois.rdap_url.clone()))
    }
}

#[async_trait]
impl DomainLookup for RdapLookup {
    async fn lookup(&self, domain: &str) -> Result<RegistrationInfo, LookupError> {
        let response = self
            .client
            .get(format!("{}/domain/{domain}", self.base_url))
            .header("Accept", "application/rdap+json")
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => response.json::<DomainResponse>().await?.into_info(),
            StatusCode::NOT_FOUND => Err(LookupError::NotFound {
                domain: domain.to_owned(),
            }),
            status => Err(LookupError::Status(status.as_u16())),
        }
    }
}
