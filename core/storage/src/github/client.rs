//! GitHub contents API client.

use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use reqwest::{header, Client, Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use gitkv_common::{Binding, Error, Result};

use crate::contents::{ContentItem, ContentsApi, WriteRequest, WriteResponse};

/// Public GitHub REST endpoint.
pub const GITHUB_API_BASE: &str = "https://api.github.com";

/// Media type requested on every call.
const GITHUB_MEDIA_TYPE: &str = "application/vnd.github+json";

/// Characters escaped inside one path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// A contents GET answers with an object for a file and an array for a
/// directory.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ContentsPayload {
    Listing(Vec<ContentItem>),
    Item(ContentItem),
}

/// Error body returned by the API.
#[derive(Debug, Default, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
}

/// GitHub contents API client.
pub struct GitHubClient {
    http: Client,
    api_base: String,
}

impl GitHubClient {
    /// Create a client against `api_base`, or the public API when `None`.
    ///
    /// # Errors
    /// - `InvalidInput` if `api_base` is not an absolute URL
    /// - `Transport` if the HTTP client cannot be built
    pub fn new(api_base: Option<&str>) -> Result<Self> {
        let base = api_base.unwrap_or(GITHUB_API_BASE);
        let parsed = Url::parse(base)
            .map_err(|e| Error::InvalidInput(format!("Invalid API base \"{}\": {}", base, e)))?;

        let http = Client::builder()
            .user_agent(concat!("gitkv/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_base: parsed.as_str().trim_end_matches('/').to_string(),
        })
    }

    /// Endpoint the client talks to.
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// URL of the database directory, or of `key` inside it.
    fn contents_url(&self, binding: &Binding, key: Option<&str>) -> String {
        let mut url = format!(
            "{}/repos/{}/{}/contents",
            self.api_base,
            utf8_percent_encode(&binding.owner, PATH_SEGMENT),
            utf8_percent_encode(&binding.repo, PATH_SEGMENT),
        );

        let segments = binding
            .database
            .split('/')
            .filter(|s| !s.is_empty())
            .chain(key);
        for segment in segments {
            url.push('/');
            url.extend(utf8_percent_encode(segment, PATH_SEGMENT));
        }
        url
    }

    fn request(&self, method: Method, url: &str, binding: &Binding) -> RequestBuilder {
        let builder = self
            .http
            .request(method, url)
            .header(header::ACCEPT, GITHUB_MEDIA_TYPE);

        match &binding.token {
            Some(token) if !token.is_empty() => {
                builder.header(header::AUTHORIZATION, format!("token {}", token))
            }
            _ => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder, action: &str) -> Result<reqwest::Response> {
        builder
            .send()
            .await
            .map_err(|e| Error::Transport(format!("Failed to {}: {}", action, e)))
    }

    /// Map a response onto the common error taxonomy.
    ///
    /// `key` distinguishes a missing item (`NotFound`) from a missing
    /// repository or database (`NamespaceNotFound`).
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
        binding: &Binding,
        key: Option<&str>,
    ) -> Result<T> {
        let status = response.status();

        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| Error::Serialization(format!("Failed to parse response: {}", e)));
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiError>(&body)
            .map(|e| e.message)
            .unwrap_or(body);
        Err(map_status(status, message, binding, key))
    }
}

fn map_status(status: StatusCode, message: String, binding: &Binding, key: Option<&str>) -> Error {
    match status {
        StatusCode::UNAUTHORIZED => Error::InvalidCredentials(message),
        StatusCode::NOT_FOUND => match key {
            Some(key) => Error::NotFound(binding.location(key)),
            None => Error::NamespaceNotFound(format!("{}/{}", binding.repo, binding.database)),
        },
        StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => Error::VersionConflict(message),
        _ => Error::Remote {
            status: status.as_u16(),
            message,
        },
    }
}

#[async_trait]
impl ContentsApi for GitHubClient {
    fn provider(&self) -> &str {
        "github.com"
    }

    async fn get_item(&self, binding: &Binding, key: &str) -> Result<ContentItem> {
        let url = self.contents_url(binding, Some(key));
        debug!(url = %url, "GET contents");

        let builder = self
            .request(Method::GET, &url, binding)
            .query(&[("ref", binding.branch.as_str())]);
        let response = self.send(builder, "get key").await?;

        match self
            .handle_response::<ContentsPayload>(response, binding, Some(key))
            .await?
        {
            ContentsPayload::Item(item) if item.kind.is_empty() || item.kind == "file" => Ok(item),
            ContentsPayload::Item(item) => Err(Error::BadRequest(format!(
                "Key \"{}\" is a {}, not a file",
                key, item.kind
            ))),
            ContentsPayload::Listing(_) => Err(Error::BadRequest(format!(
                "Key \"{}\" is a folder",
                key
            ))),
        }
    }

    async fn list_items(&self, binding: &Binding) -> Result<Vec<ContentItem>> {
        let url = self.contents_url(binding, None);
        debug!(url = %url, "GET contents listing");

        let builder = self
            .request(Method::GET, &url, binding)
            .query(&[("ref", binding.branch.as_str())]);
        let response = self.send(builder, "list keys").await?;

        match self
            .handle_response::<ContentsPayload>(response, binding, None)
            .await?
        {
            ContentsPayload::Listing(items) => Ok(items),
            ContentsPayload::Item(_) => Err(Error::BadRequest(format!(
                "Database \"{}\" is a file",
                binding.database
            ))),
        }
    }

    async fn put_item(
        &self,
        binding: &Binding,
        key: &str,
        request: &WriteRequest,
    ) -> Result<WriteResponse> {
        let url = self.contents_url(binding, Some(key));
        debug!(url = %url, update = request.sha.is_some(), "PUT contents");

        let builder = self.request(Method::PUT, &url, binding).json(request);
        let response = self.send(builder, "write key").await?;
        self.handle_response(response, binding, Some(key)).await
    }

    async fn delete_item(
        &self,
        binding: &Binding,
        key: &str,
        request: &WriteRequest,
    ) -> Result<WriteResponse> {
        let url = self.contents_url(binding, Some(key));
        debug!(url = %url, "DELETE contents");

        let builder = self.request(Method::DELETE, &url, binding).json(request);
        let response = self.send(builder, "delete key").await?;
        self.handle_response(response, binding, Some(key)).await
    }
}
