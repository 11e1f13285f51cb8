use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};

use crate::domain::ConnectionContext;
use crate::envelope::{Envelope, fault_message};
use crate::error::MigrateError;
use crate::events::{EventSink, OperationEvent};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(100);

/// One SOAP round trip. Implementations make exactly one attempt per call.
pub trait SoapTransport: Send + Sync {
    fn send(&self, envelope_xml: &str, action: &str) -> Result<String, MigrateError>;

    fn call(&self, envelope: &Envelope) -> Result<String, MigrateError> {
        let xml = envelope.to_xml()?;
        self.send(&xml, &envelope.operation().action_uri())
    }
}

impl<T: SoapTransport + ?Sized> SoapTransport for &T {
    fn send(&self, envelope_xml: &str, action: &str) -> Result<String, MigrateError> {
        (**self).send(envelope_xml, action)
    }
}

impl<T: SoapTransport + ?Sized> SoapTransport for Arc<T> {
    fn send(&self, envelope_xml: &str, action: &str) -> Result<String, MigrateError> {
        (**self).send(envelope_xml, action)
    }
}

pub struct HttpTransport {
    client: Client,
    context: ConnectionContext,
    sink: Arc<dyn EventSink>,
}

impl HttpTransport {
    pub fn new(
        context: ConnectionContext,
        timeout: Duration,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self, MigrateError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("rdlm/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| MigrateError::Connection(err.to_string()))?,
        );
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/xml; charset=utf-8"),
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| MigrateError::Connection(err.to_string()))?;
        Ok(Self {
            client,
            context,
            sink,
        })
    }

    fn post(&self, envelope_xml: &str, action: &str) -> Result<String, MigrateError> {
        let action_header =
            HeaderValue::from_str(action).map_err(|err| MigrateError::Protocol(err.to_string()))?;
        let response = self
            .client
            .post(self.context.endpoint())
            .basic_auth(self.context.username(), Some(self.context.password()))
            .header("SOAPAction", action_header)
            .body(envelope_xml.to_string())
            .send()
            .map_err(map_send_error)?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|err| MigrateError::Protocol(format!("reading response body: {err}")))?;
        interpret_response(status, body)
    }
}

impl SoapTransport for HttpTransport {
    fn send(&self, envelope_xml: &str, action: &str) -> Result<String, MigrateError> {
        let operation = operation_name(action);
        self.sink
            .record(OperationEvent::started(operation, self.context.endpoint()));
        match self.post(envelope_xml, action) {
            Ok(body) => {
                self.sink
                    .record(OperationEvent::succeeded(operation, self.context.endpoint()));
                Ok(body)
            }
            Err(err) => {
                self.sink.record(OperationEvent::failed(
                    operation,
                    self.context.endpoint(),
                    err.to_string(),
                ));
                Err(err)
            }
        }
    }
}

/// Turns a status and body into the payload or the matching error.
pub fn interpret_response(status: StatusCode, body: String) -> Result<String, MigrateError> {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(MigrateError::Connection(format!(
            "authentication rejected ({})",
            status.as_u16()
        )));
    }
    if !status.is_success() {
        let message = fault_message(&body).unwrap_or(body);
        return Err(MigrateError::ProtocolStatus {
            status: status.as_u16(),
            message,
        });
    }
    if body.trim().is_empty() {
        return Err(MigrateError::Protocol("empty response body".to_string()));
    }
    Ok(body)
}

fn map_send_error(err: reqwest::Error) -> MigrateError {
    if err.is_connect() || err.is_builder() {
        MigrateError::Connection(err.to_string())
    } else {
        MigrateError::Protocol(err.to_string())
    }
}

fn operation_name(action: &str) -> &str {
    action.rsplit('/').next().unwrap_or(action)
}
