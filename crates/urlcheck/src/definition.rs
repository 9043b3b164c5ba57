//! Check definitions and the credentials derived from them.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use reqwest::Method;
use tracing::warn;
use url::Url;

/// Prefix marking a password as the name of an environment variable.
pub const ENV_SENTINEL: char = '$';

/// Default connect timeout for definitions built in code.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// One periodically probed endpoint. Immutable once loaded.
#[derive(Debug, Clone)]
pub struct CheckDefinition {
    /// Unique key across the registry
    pub name: String,

    /// Schedule expression (six-field cron or `@every <duration>`)
    pub schedule: String,

    /// Target URL
    pub url: Url,

    pub method: Method,

    /// Status code the target must answer with
    pub expected_status: u16,

    /// Bound on establishing the connection
    pub connect_timeout: Duration,

    pub headers: BTreeMap<String, String>,

    /// Outbound proxy, when set
    pub proxy: Option<Url>,

    pub credentials: Option<BasicAuth>,

    /// Alert recipient address
    pub recipient: Option<String>,
}

impl CheckDefinition {
    /// Create a GET definition with default timeout and no optional settings.
    pub fn new(
        name: impl Into<String>,
        schedule: impl Into<String>,
        url: Url,
        expected_status: u16,
    ) -> Self {
        Self {
            name: name.into(),
            schedule: schedule.into(),
            url,
            method: Method::GET,
            expected_status,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            headers: BTreeMap::new(),
            proxy: None,
            credentials: None,
            recipient: None,
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_proxy(mut self, proxy: Url) -> Self {
        self.proxy = Some(proxy);
        self
    }

    pub fn with_credentials(mut self, login: impl Into<String>, password: Password) -> Self {
        self.credentials = Some(BasicAuth { login: login.into(), password });
        self
    }

    pub fn with_recipient(mut self, recipient: impl Into<String>) -> Self {
        self.recipient = Some(recipient.into());
        self
    }

    /// Derive the credentials for one probe, resolving the password against
    /// the process environment.
    pub fn scoped_credentials(&self) -> Option<ScopedCredentials> {
        self.scoped_credentials_with(|name| std::env::var(name).ok())
    }

    /// Same as [`CheckDefinition::scoped_credentials`] with a custom variable lookup.
    pub fn scoped_credentials_with(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Option<ScopedCredentials> {
        let auth = self.credentials.as_ref()?;

        let Some(scope) = AuthScope::of(&self.url) else {
            warn!(check = %self.name, url = %self.url, "Cannot derive credential scope from URL");
            return None;
        };

        let Some(password) = auth.password.resolve_with(lookup) else {
            warn!(
                check = %self.name,
                variable = auth.password.variable().unwrap_or_default(),
                "Password variable is not set, probing without credentials"
            );
            return None;
        };

        Some(ScopedCredentials { scope, username: auth.login.clone(), password })
    }
}

/// Login and password as configured, before resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicAuth {
    pub login: String,
    pub password: Password,
}

/// A configured password: literal, or indirected through an environment variable.
#[derive(Clone, PartialEq, Eq)]
pub enum Password {
    Plain(String),
    Env(String),
}

impl Password {
    /// `$NAME` becomes [`Password::Env`], anything else is taken literally.
    pub fn parse(raw: &str) -> Self {
        match raw.strip_prefix(ENV_SENTINEL) {
            Some(variable) if !variable.is_empty() => Self::Env(variable.to_string()),
            _ => Self::Plain(raw.to_string()),
        }
    }

    pub fn resolve(&self) -> Option<String> {
        self.resolve_with(|name| std::env::var(name).ok())
    }

    pub fn resolve_with(&self, lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
        match self {
            Self::Plain(value) => Some(value.clone()),
            Self::Env(variable) => lookup(variable),
        }
    }

    fn variable(&self) -> Option<&str> {
        match self {
            Self::Plain(_) => None,
            Self::Env(variable) => Some(variable),
        }
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(_) => f.write_str("Plain(<redacted>)"),
            Self::Env(variable) => f.debug_tuple("Env").field(variable).finish(),
        }
    }
}

/// Scheme, host and port a set of credentials is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthScope {
    pub scheme: String,
    pub host: String,
    pub port: u16,
}

impl AuthScope {
    pub fn of(url: &Url) -> Option<Self> {
        Some(Self {
            scheme: url.scheme().to_string(),
            host: url.host_str()?.to_ascii_lowercase(),
            port: url.port_or_known_default()?,
        })
    }

    pub fn contains(&self, url: &Url) -> bool {
        AuthScope::of(url).is_some_and(|other| other == *self)
    }
}

/// Basic-auth credentials resolved for a single probe.
#[derive(Clone)]
pub struct ScopedCredentials {
    pub scope: AuthScope,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for ScopedCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedCredentials")
            .field("scope", &self.scope)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
