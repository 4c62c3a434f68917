use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest},
    http::{Request, StatusCode},
    Json,
};
use axum_derive_error::ErrorResponse;
use derive_more::{Display, Error};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer};
use validator::{Validate, ValidationErrors};

/// Regular expression to match fully-qualified domain names.
///
/// Internationalized domain names must be provided in their punycode form.
pub(crate) static DOMAIN_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^(?i)([a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z][a-z0-9-]{0,61}[a-z0-9]\.?$"#)
        .expect("invalid regex string")
});

/// Regular expression to match provider-side project names.
pub(crate) static SLUG_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?$"#).expect("invalid regex string"));

/// Deserialize a field that distinguishes between an absent value and an explicit `null`.
///
/// Use together with `#[serde(default)]`, so that absent fields become [`None`]
/// and `null` values become `Some(None)`.
pub(crate) fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Errors related to JSON validation.
#[derive(ErrorResponse, Display, Error)]
pub enum ValidatedJsonRejection {
    /// Unable to parse a JSON value.
    #[status(StatusCode::UNPROCESSABLE_ENTITY)]
    JsonParsingError(JsonRejection),

    /// Unable to validate a JSON value.
    #[status(StatusCode::UNPROCESSABLE_ENTITY)]
    ValidationError(ValidationErrors),
}

/// Wrapper for [`axum`] JSON value validation.
///
/// Equivalent to the [`axum`]'s [`Json`] struct
/// with [`validator`] crate support.
///
/// [`JSON`]: axum::extract::Json
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S, B> FromRequest<S, B> for ValidatedJson<T>
where
    T: Validate,
    B: Send + 'static,
    S: Sync,
    Json<T>: FromRequest<S, B, Rejection = JsonRejection>,
{
    type Rejection = ValidatedJsonRejection;

    async fn from_request(req: Request<B>, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::from_request(req, state)
            .await
            .map_err(ValidatedJsonRejection::JsonParsingError)?;

        match value.validate() {
            Ok(_) => Ok(ValidatedJson(value)),
            Err(err) => Err(ValidatedJsonRejection::ValidationError(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::{double_option, DOMAIN_REGEX, SLUG_REGEX};

    #[derive(Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "double_option")]
        notes: Option<Option<String>>,
    }

    #[test]
    fn patch_fields() {
        let absent: Patch = serde_json::from_str("{}").unwrap();
        let cleared: Patch = serde_json::from_str(r#"{"notes":null}"#).unwrap();
        let set: Patch = serde_json::from_str(r#"{"notes":"renewed"}"#).unwrap();

        assert_eq!(absent.notes, None);
        assert_eq!(cleared.notes, Some(None));
        assert_eq!(set.notes, Some(Some(String::from("renewed"))));
    }

    #[test]
    fn domains() {
        for domain in ["example.com", "www.Example.co.uk", "xn--e1afmkfd.xn--p1ai", "a.io."] {
            assert!(DOMAIN_REGEX.is_match(domain), "{domain}");
        }

        for domain in ["localhost", "-bad.com", "bad-.com", "spa ce.com", "example.123", ""] {
            assert!(!DOMAIN_REGEX.is_match(domain), "{domain}");
        }
    }

    #[test]
    fn slugs() {
        assert!(SLUG_REGEX.is_match("spring-landing-2024"));
        assert!(!SLUG_REGEX.is_match("Spring"));
        assert!(!SLUG_REGEX.is_match("landing-"));
    }
}
