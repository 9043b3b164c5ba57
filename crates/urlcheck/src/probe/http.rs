//! HTTP/HTTPS checker built on reqwest.

use std::error::Error as StdError;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Proxy, RequestBuilder};
use tracing::debug;
use uuid::Uuid;

use super::{Checker, ProbeReport, TlsTrustPolicy};
use crate::USER_AGENT;
use crate::definition::CheckDefinition;

/// HTTP/HTTPS checker
///
/// A client is built for every probe since proxy, timeout and trust settings
/// are per definition.
#[derive(Debug, Clone, Default)]
pub struct HttpChecker {
    tls_policy: TlsTrustPolicy,
}

impl HttpChecker {
    pub fn new(tls_policy: TlsTrustPolicy) -> Self {
        Self { tls_policy }
    }

    fn build_client(&self, definition: &CheckDefinition) -> Result<Client, reqwest::Error> {
        let builder = Client::builder()
            .connect_timeout(definition.connect_timeout)
            .user_agent(USER_AGENT);

        let builder = match &definition.proxy {
            Some(proxy) => builder.proxy(Proxy::all(proxy.as_str())?),
            None => builder.no_proxy(),
        };

        self.tls_policy.apply(builder).build()
    }

    fn build_request(
        &self,
        client: &Client,
        definition: &CheckDefinition,
    ) -> Result<RequestBuilder, String> {
        let mut headers = HeaderMap::with_capacity(definition.headers.len());
        for (name, value) in &definition.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| format!("invalid header name `{name}`: {e}"))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| format!("invalid value for header `{name}`: {e}"))?;
            headers.append(name, value);
        }

        let mut request =
            client.request(definition.method.clone(), definition.url.clone()).headers(headers);

        // Scoped to the target's origin: reqwest drops the header on
        // redirects to another scheme, host or port.
        if let Some(credentials) = definition.scoped_credentials() {
            request = request.basic_auth(credentials.username, Some(credentials.password));
        }

        Ok(request)
    }
}

#[async_trait::async_trait]
impl Checker for HttpChecker {
    #[tracing::instrument(
        name = "probe",
        skip_all,
        fields(check = %definition.name, probe_id = %Uuid::new_v4())
    )]
    async fn probe(&self, definition: &CheckDefinition) -> ProbeReport {
        let client = match self.build_client(definition) {
            Ok(client) => client,
            Err(e) => return ProbeReport::transport_error(definition, error_chain(&e)),
        };

        let request = match self.build_request(&client, definition) {
            Ok(request) => request,
            Err(cause) => return ProbeReport::transport_error(definition, cause),
        };

        debug!(method = %definition.method, url = %definition.url, "Sending probe request");

        match request.send().await {
            Ok(response) => ProbeReport::from_status(definition, response.status().as_u16()),
            Err(e) => ProbeReport::transport_error(definition, error_chain(&e)),
        }
    }
}

/// Flatten an error and its sources into one line.
fn error_chain(error: &dyn StdError) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
