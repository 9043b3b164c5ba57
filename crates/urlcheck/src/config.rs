//! Checks file loading.
//!
//! The file maps check names to records:
//!
//! ```yaml
//! homepage:
//!   cron-expression: "0 */5 * * * ?"
//!   url: https://example.com/
//!   accepted-code: 200
//!   timeout: 5
//!   method: GET
//!   headers:
//!     Accept: text/html
//!   proxy-url: http://proxy.internal:3128
//!   login: monitor
//!   password: $HOMEPAGE_PASSWORD
//!   email: ops@example.com
//! ```
//!
//! YAML is the default format; a `.toml` extension selects TOML. Every entry
//! is decoded on its own so one bad record only removes itself.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use reqwest::Method;
use serde::Deserialize;
use serde::de::IgnoredAny;
use tracing::{error, info, warn};
use url::Url;

use crate::definition::{CheckDefinition, Password};
use crate::error::CheckError;
use crate::notifier::is_valid_address;

/// Raw record as written in the checks file
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CheckEntry {
    pub cron_expression: String,
    pub url: String,
    pub accepted_code: u16,
    /// Connect timeout in seconds
    pub timeout: u64,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub proxy_url: Option<String>,
    #[serde(default)]
    pub login: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    /// Keys this version does not know, warned about and otherwise ignored
    #[serde(flatten)]
    pub unknown: BTreeMap<String, IgnoredAny>,
}

impl CheckEntry {
    /// Validate the record and build the definition named `name`.
    pub fn into_definition(self, name: &str) -> Result<CheckDefinition, CheckError> {
        if !self.unknown.is_empty() {
            let keys: Vec<&str> = self.unknown.keys().map(String::as_str).collect();
            warn!(check = %name, "Ignoring unknown keys: {}", keys.join(", "));
        }

        let url = Url::parse(&self.url)
            .map_err(|e| CheckError::definition(name, format!("invalid url `{}`: {e}", self.url)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(CheckError::definition(name, format!("unsupported scheme `{}`", url.scheme())));
        }

        let method = match non_blank(self.method) {
            Some(method) => Method::from_bytes(method.to_ascii_uppercase().as_bytes())
                .map_err(|_| CheckError::definition(name, format!("invalid method `{method}`")))?,
            None => Method::GET,
        };

        if self.timeout == 0 {
            return Err(CheckError::definition(name, "timeout must be at least 1 second"));
        }

        let proxy = non_blank(self.proxy_url)
            .map(|proxy| {
                Url::parse(&proxy)
                    .map_err(|e| CheckError::definition(name, format!("invalid proxy-url `{proxy}`: {e}")))
            })
            .transpose()?;

        let recipient = non_blank(self.email);
        if let Some(recipient) = &recipient {
            if !is_valid_address(recipient) {
                return Err(CheckError::definition(name, format!("invalid email `{recipient}`")));
            }
        }

        let mut definition = CheckDefinition::new(name, self.cron_expression, url, self.accepted_code)
            .with_method(method)
            .with_connect_timeout(Duration::from_secs(self.timeout));
        definition.headers = self.headers.unwrap_or_default();
        definition.proxy = proxy;
        definition.recipient = recipient;

        // Credentials only apply when both halves are present
        if let (Some(login), Some(password)) = (non_blank(self.login), non_blank(self.password)) {
            definition = definition.with_credentials(login, Password::parse(&password));
        }

        Ok(definition)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Result of loading a checks file.
#[derive(Debug, Default)]
pub struct LoadedChecks {
    pub definitions: Vec<CheckDefinition>,
    /// Rejected entries with the reason
    pub rejected: Vec<(String, CheckError)>,
}

/// Read and decode the checks file at `path`.
///
/// A file that cannot be read or is not a mapping is fatal; invalid entries are
/// logged and reported in [`LoadedChecks::rejected`].
pub fn load_checks_file(path: impl AsRef<Path>) -> Result<LoadedChecks, CheckError> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
        .map_err(|e| CheckError::ChecksFile(format!("{}: {e}", path.display())))?;

    let is_toml = path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let loaded = if is_toml { parse_toml_checks(&raw)? } else { parse_yaml_checks(&raw)? };

    info!(
        path = %path.display(),
        loaded = loaded.definitions.len(),
        rejected = loaded.rejected.len(),
        "Checks file loaded"
    );
    Ok(loaded)
}

/// Decode a YAML checks document.
pub fn parse_yaml_checks(raw: &str) -> Result<LoadedChecks, CheckError> {
    if raw.trim().is_empty() {
        return Ok(LoadedChecks::default());
    }
    let entries: BTreeMap<String, serde_yaml::Value> =
        serde_yaml::from_str(raw).map_err(|e| CheckError::ChecksFile(e.to_string()))?;

    Ok(collect_entries(entries, |value| serde_yaml::from_value(value).map_err(|e| e.to_string())))
}

/// Decode a TOML checks document, one table per check.
pub fn parse_toml_checks(raw: &str) -> Result<LoadedChecks, CheckError> {
    let entries: BTreeMap<String, toml::Value> =
        toml::from_str(raw).map_err(|e| CheckError::ChecksFile(e.to_string()))?;

    Ok(collect_entries(entries, |value| value.try_into().map_err(|e: toml::de::Error| e.to_string())))
}

fn collect_entries<V>(
    entries: BTreeMap<String, V>,
    decode: impl Fn(V) -> Result<CheckEntry, String>,
) -> LoadedChecks {
    let mut loaded = LoadedChecks::default();

    for (name, value) in entries {
        let result = decode(value)
            .map_err(|reason| CheckError::definition(&name, reason))
            .and_then(|entry| entry.into_definition(&name));

        match result {
            Ok(definition) => loaded.definitions.push(definition),
            Err(e) => {
                error!(check = %name, "Bad configuration: {e}");
                loaded.rejected.push((name, e));
            }
        }
    }

    loaded
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
google:
  cron-expression: "0 */1 * * * ?"
  url: https://www.google.com
  accepted-code: 200
  timeout: 5
intranet:
  cron-expression: "30 * * * * *"
  url: http://intranet.local/status
  accepted-code: 204
  timeout: 2
  method: head
  headers:
    X-Probe: urlcheck
  proxy-url: ""
  login: monitor
  password: $INTRANET_PASSWORD
  email: ops@example.com
"#;

    #[test]
    fn test_parse_yaml_checks() {
        let loaded = parse_yaml_checks(YAML).unwrap();
        assert!(loaded.rejected.is_empty());
        assert_eq!(loaded.definitions.len(), 2);

        let google = &loaded.definitions[0];
        assert_eq!(google.name, "google");
        assert_eq!(google.method, Method::GET);
        assert_eq!(google.connect_timeout, Duration::from_secs(5));
        assert!(google.credentials.is_none());

        let intranet = &loaded.definitions[1];
        assert_eq!(intranet.method, Method::HEAD);
        assert_eq!(intranet.expected_status, 204);
        assert_eq!(intranet.headers.get("X-Probe").map(String::as_str), Some("urlcheck"));
        assert!(intranet.proxy.is_none());
        assert_eq!(intranet.recipient.as_deref(), Some("ops@example.com"));
        let credentials = intranet.credentials.as_ref().unwrap();
        assert_eq!(credentials.login, "monitor");
        assert_eq!(credentials.password, Password::Env("INTRANET_PASSWORD".into()));
    }

    #[test]
    fn test_bad_entries_are_isolated() {
        let raw = r#"
good:
  cron-expression: "0 * * * * *"
  url: https://example.com
  accepted-code: 200
  timeout: 5
missing-url:
  cron-expression: "0 * * * * *"
  accepted-code: 200
  timeout: 5
ftp:
  cron-expression: "0 * * * * *"
  url: ftp://example.com
  accepted-code: 200
  timeout: 5
bad-mail:
  cron-expression: "0 * * * * *"
  url: https://example.com
  accepted-code: 200
  timeout: 5
  email: not-an-address
"#;
        let loaded = parse_yaml_checks(raw).unwrap();
        let names: Vec<_> = loaded.definitions.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["good"]);

        let mut rejected: Vec<_> = loaded.rejected.iter().map(|(name, _)| name.as_str()).collect();
        rejected.sort_unstable();
        assert_eq!(rejected, vec!["bad-mail", "ftp", "missing-url"]);
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let raw = r#"
legacy:
  cron-expression: "0 * * * * *"
  url: https://example.com
  accepted-code: 200
  timeout: 5
  retries: 3
  comment: moved from the old monitor
"#;
        let loaded = parse_yaml_checks(raw).unwrap();
        assert!(loaded.rejected.is_empty());
        assert_eq!(loaded.definitions.len(), 1);
        assert_eq!(loaded.definitions[0].name, "legacy");

        let toml = r#"
[legacy]
cron-expression = "0 * * * * *"
url = "https://example.com"
accepted-code = 200
timeout = 5
retries = 3
"#;
        assert_eq!(parse_toml_checks(toml).unwrap().definitions.len(), 1);
    }

    #[test]
    fn test_invalid_cron_is_left_to_the_registry() {
        let raw = r#"
later:
  cron-expression: "not a cron"
  url: https://example.com
  accepted-code: 200
  timeout: 5
"#;
        let loaded = parse_yaml_checks(raw).unwrap();
        assert_eq!(loaded.definitions.len(), 1);
    }

    #[test]
    fn test_parse_toml_checks() {
        let raw = r#"
[api]
cron-expression = "0 * * * * *"
url = "https://api.example.com/health"
accepted-code = 200
timeout = 3
method = "POST"

[broken]
url = "https://api.example.com/"
"#;
        let loaded = parse_toml_checks(raw).unwrap();
        assert_eq!(loaded.definitions.len(), 1);
        assert_eq!(loaded.definitions[0].method, Method::POST);
        assert_eq!(loaded.rejected.len(), 1);
        assert_eq!(loaded.rejected[0].0, "broken");
    }

    #[test]
    fn test_unparseable_document_is_fatal() {
        assert!(matches!(parse_yaml_checks("- just\n- a list\n"), Err(CheckError::ChecksFile(_))));
        assert!(parse_yaml_checks("").unwrap().definitions.is_empty());
    }
}
