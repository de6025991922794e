//! HTTP access to the tax policy service.
//!
//! [`HttpClient`] talks to the service directly and reports every failure.
//! [`DegradingClient`] wraps any [`TaxPolicyApi`] and turns failures into
//! safe empty responses plus a user notice, so the wizard never sees a
//! transport error.

use std::cell::RefCell;
use std::time::Duration;

use reqwest::blocking::{Client, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::domain::{BasicData, FormTemplate, GeneratePdfResponse, StateData};

/// Message shown when a failed response carries no message of its own.
pub const DEFAULT_ERROR_MESSAGE: &str = "An error occurred. Please try again later.";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Server responded with {status}: {message}")]
    Status { status: u16, message: String },
    #[error("Unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ApiError {
    /// Text suitable for a notice in the UI.
    pub fn user_message(&self) -> &str {
        match self {
            ApiError::Status { message, .. } => message,
            _ => DEFAULT_ERROR_MESSAGE,
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Endpoints of the tax policy service used by the wizard.
pub trait TaxPolicyApi {
    /// `GET /api/taxPolicy/basicData`
    fn basic_data(&self) -> ApiResult<Vec<StateData>>;

    /// `GET /api/taxPolicy/{abbreviation}/formFields`
    fn form_template(&self, abbreviation: &str) -> ApiResult<FormTemplate>;

    /// `POST /api/taxPolicy/generatePdf/{abbreviation}`
    fn generate_pdf(
        &self,
        abbreviation: &str,
        payload: &Map<String, Value>,
    ) -> ApiResult<GeneratePdfResponse>;

    /// Fetches a generated document by absolute URL.
    fn download(&self, url: &str) -> ApiResult<Vec<u8>>;

    /// Takes the notice left by the most recent degraded failure, if any.
    fn take_notice(&self) -> Option<String> {
        None
    }
}

impl<T: TaxPolicyApi + ?Sized> TaxPolicyApi for Box<T> {
    fn basic_data(&self) -> ApiResult<Vec<StateData>> {
        (**self).basic_data()
    }

    fn form_template(&self, abbreviation: &str) -> ApiResult<FormTemplate> {
        (**self).form_template(abbreviation)
    }

    fn generate_pdf(
        &self,
        abbreviation: &str,
        payload: &Map<String, Value>,
    ) -> ApiResult<GeneratePdfResponse> {
        (**self).generate_pdf(abbreviation, payload)
    }

    fn download(&self, url: &str) -> ApiResult<Vec<u8>> {
        (**self).download(url)
    }

    fn take_notice(&self) -> Option<String> {
        (**self).take_notice()
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Blocking JSON client for the tax policy service.
pub struct HttpClient {
    client: Client,
    base_url: String,
}

impl HttpClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> ApiResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    /// Uses an already configured `reqwest` client.
    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn read_json<T: DeserializeOwned>(response: Response) -> ApiResult<T> {
        let body = check_status(response)?.text()?;
        Ok(serde_json::from_str(&body)?)
    }
}

fn check_status(response: Response) -> ApiResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response
        .json::<ErrorBody>()
        .ok()
        .and_then(|body| body.message)
        .unwrap_or_else(|| DEFAULT_ERROR_MESSAGE.to_string());
    Err(ApiError::Status {
        status: status.as_u16(),
        message,
    })
}

impl TaxPolicyApi for HttpClient {
    fn basic_data(&self) -> ApiResult<Vec<StateData>> {
        let url = self.endpoint("/api/taxPolicy/basicData");
        tracing::debug!(%url, "fetching state list");
        let data: BasicData = Self::read_json(self.client.get(&url).send()?)?;
        tracing::info!(count = data.states.len(), "fetched state list");
        Ok(data.states)
    }

    fn form_template(&self, abbreviation: &str) -> ApiResult<FormTemplate> {
        let url = self.endpoint(&format!("/api/taxPolicy/{}/formFields", abbreviation));
        tracing::debug!(%url, "fetching form fields");
        let template: FormTemplate = Self::read_json(self.client.get(&url).send()?)?;
        tracing::info!(state = abbreviation, fields = template.fields.len(), "fetched form fields");
        Ok(template)
    }

    fn generate_pdf(
        &self,
        abbreviation: &str,
        payload: &Map<String, Value>,
    ) -> ApiResult<GeneratePdfResponse> {
        let url = self.endpoint(&format!("/api/taxPolicy/generatePdf/{}", abbreviation));
        tracing::debug!(%url, fields = payload.len(), "requesting pdf generation");
        let response: GeneratePdfResponse =
            Self::read_json(self.client.post(&url).json(payload).send()?)?;
        tracing::info!(state = abbreviation, links = response.download_links.len(), "pdf generated");
        Ok(response)
    }

    fn download(&self, url: &str) -> ApiResult<Vec<u8>> {
        let response = check_status(self.client.get(url).send()?)?;
        let bytes = response.bytes()?;
        tracing::info!(%url, size = bytes.len(), "downloaded document");
        Ok(bytes.to_vec())
    }
}

/// Replaces failed responses with empty defaults and remembers a notice.
pub struct DegradingClient<A> {
    inner: A,
    notice: RefCell<Option<String>>,
}

impl<A: TaxPolicyApi> DegradingClient<A> {
    pub fn new(inner: A) -> Self {
        Self {
            inner,
            notice: RefCell::new(None),
        }
    }

    fn degrade<T>(&self, endpoint: &str, result: ApiResult<T>, fallback: impl FnOnce() -> T) -> T {
        result.unwrap_or_else(|err| {
            tracing::warn!(endpoint, error = %err, "request failed, using empty response");
            *self.notice.borrow_mut() = Some(err.user_message().to_string());
            fallback()
        })
    }
}

impl<A: TaxPolicyApi> TaxPolicyApi for DegradingClient<A> {
    fn basic_data(&self) -> ApiResult<Vec<StateData>> {
        Ok(self.degrade("basicData", self.inner.basic_data(), Vec::new))
    }

    fn form_template(&self, abbreviation: &str) -> ApiResult<FormTemplate> {
        Ok(self.degrade(
            "formFields",
            self.inner.form_template(abbreviation),
            FormTemplate::default,
        ))
    }

    fn generate_pdf(
        &self,
        abbreviation: &str,
        payload: &Map<String, Value>,
    ) -> ApiResult<GeneratePdfResponse> {
        Ok(self.degrade(
            "generatePdf",
            self.inner.generate_pdf(abbreviation, payload),
            GeneratePdfResponse::default,
        ))
    }

    fn download(&self, url: &str) -> ApiResult<Vec<u8>> {
        self.inner.download(url).inspect_err(|err| {
            *self.notice.borrow_mut() = Some(err.user_message().to_string());
        })
    }

    fn take_notice(&self) -> Option<String> {
        self.notice.borrow_mut().take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DownloadLink, FieldDescriptor, FieldType};
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    struct Failing;

    fn unavailable() -> ApiError {
        ApiError::Status {
            status: 503,
            message: "Service unavailable".into(),
        }
    }

    impl TaxPolicyApi for Failing {
        fn basic_data(&self) -> ApiResult<Vec<StateData>> {
            Err(unavailable())
        }

        fn form_template(&self, _: &str) -> ApiResult<FormTemplate> {
            Err(serde_json::from_str::<FormTemplate>("not json").unwrap_err().into())
        }

        fn generate_pdf(&self, _: &str, _: &Map<String, Value>) -> ApiResult<GeneratePdfResponse> {
            Err(unavailable())
        }

        fn download(&self, _: &str) -> ApiResult<Vec<u8>> {
            Err(unavailable())
        }
    }

    struct Working;

    impl TaxPolicyApi for Working {
        fn basic_data(&self) -> ApiResult<Vec<StateData>> {
            Ok(vec![StateData::new("Ohio", "OH")])
        }

        fn form_template(&self, _: &str) -> ApiResult<FormTemplate> {
            Ok(FormTemplate {
                fields: vec![FieldDescriptor::new("name", FieldType::String)],
                ..FormTemplate::default()
            })
        }

        fn generate_pdf(&self, _: &str, _: &Map<String, Value>) -> ApiResult<GeneratePdfResponse> {
            Ok(GeneratePdfResponse {
                download_links: vec![DownloadLink { id: 1, title: "Return".into(), url: "/r.pdf".into() }],
            })
        }

        fn download(&self, _: &str) -> ApiResult<Vec<u8>> {
            Ok(b"%PDF".to_vec())
        }
    }

    #[test]
    fn test_degrades_state_list_to_empty() {
        let client = DegradingClient::new(Failing);

        assert!(client.basic_data().unwrap().is_empty());
        assert_eq!(client.take_notice().as_deref(), Some("Service unavailable"));
        assert!(client.take_notice().is_none());
    }

    #[test]
    fn test_degrades_template_to_empty_schema() {
        let client = DegradingClient::new(Failing);

        let template = client.form_template("CA").unwrap();
        assert_eq!(template, FormTemplate::default());
        assert_eq!(client.take_notice().as_deref(), Some(DEFAULT_ERROR_MESSAGE));
    }

    #[test]
    fn test_degrades_pdf_response_to_no_links() {
        let client = DegradingClient::new(Failing);

        let response = client.generate_pdf("CA", &Map::new()).unwrap();
        assert!(response.download_links.is_empty());
    }

    #[test]
    fn test_download_errors_pass_through() {
        let client = DegradingClient::new(Failing);

        assert!(client.download("http://x/a.pdf").is_err());
        assert_eq!(client.take_notice().as_deref(), Some("Service unavailable"));
    }

    #[test]
    fn test_successful_responses_are_untouched() {
        let client = DegradingClient::new(Working);

        assert_eq!(client.basic_data().unwrap(), vec![StateData::new("Ohio", "OH")]);
        assert_eq!(client.form_template("OH").unwrap().fields.len(), 1);
        assert_eq!(client.generate_pdf("OH", &Map::new()).unwrap().download_links.len(), 1);
        assert_eq!(client.download("http://x/r.pdf").unwrap(), b"%PDF".to_vec());
        assert!(client.take_notice().is_none());
    }

    #[test]
    fn test_boxed_client_delegates() {
        let client: Box<dyn TaxPolicyApi> = Box::new(DegradingClient::new(Failing));

        assert!(client.basic_data().unwrap().is_empty());
        assert!(client.take_notice().is_some());
    }

    /// Serves one canned HTTP response on a loopback port and returns its base URL.
    fn serve_once(status: &str, body: &str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap();
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = [0u8; 4096];
            let _ = stream.read(&mut request);
            stream.write_all(response.as_bytes()).unwrap();
        });
        format!("http://{}", address)
    }

    fn local_client(base_url: String) -> HttpClient {
        let client = Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap();
        HttpClient::with_client(client, base_url)
    }

    #[test]
    fn test_error_status_carries_body_message() {
        let client = local_client(serve_once("500 Internal Server Error", r#"{"message":"State service offline"}"#));

        match client.basic_data() {
            Err(ApiError::Status { status, message }) => {
                assert_eq!(status, 500);
                assert_eq!(message, "State service offline");
            }
            other => panic!("expected status error, got {:?}", other),
        }
    }

    #[test]
    fn test_error_status_without_body_uses_default_message() {
        let client = local_client(serve_once("500 Internal Server Error", ""));

        let err = client.basic_data().unwrap_err();
        assert!(matches!(err, ApiError::Status { status: 500, .. }));
        assert_eq!(err.user_message(), DEFAULT_ERROR_MESSAGE);
    }

    #[test]
    fn test_basic_data_reads_states() {
        let client = local_client(serve_once(
            "200 OK",
            r#"{"states":[{"state":"Ohio","abbreviation":"OH"}]}"#,
        ));

        assert_eq!(client.basic_data().unwrap(), vec![StateData::new("Ohio", "OH")]);
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let client = HttpClient::new("http://localhost:3000/", Duration::from_secs(1)).unwrap();
        assert_eq!(
            client.endpoint("/api/taxPolicy/basicData"),
            "http://localhost:3000/api/taxPolicy/basicData"
        );
    }
}
