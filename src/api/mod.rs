use crate::config::HttpClientConfig;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

pub mod dicomweb;
pub mod fhir;
pub mod hl7;
pub mod patients;

#[derive(Debug, Error)]
pub enum ClientError {
	#[error("invalid endpoint `{endpoint}`: {source}")]
	Endpoint {
		endpoint: &'static str,
		source: url::ParseError,
	},
	#[error("request to `{endpoint}` failed: {source}")]
	Transport {
		endpoint: &'static str,
		source: reqwest::Error,
	},
	#[error("`{endpoint}` answered with {status}")]
	Status {
		endpoint: &'static str,
		status: StatusCode,
	},
}

pub fn build_client(config: &HttpClientConfig) -> reqwest::Result<reqwest::Client> {
	let mut builder = reqwest::Client::builder().user_agent(config.user_agent.as_str());
	if let Some(timeout) = config.timeout() {
		builder = builder.timeout(timeout);
	}
	builder.build()
}

/// A backend reachable over HTTP. Endpoint paths are resolved against the base URL.
#[derive(Debug, Clone)]
pub struct HttpBackend {
	client: reqwest::Client,
	base_url: Url,
}

impl HttpBackend {
	pub const fn new(client: reqwest::Client, base_url: Url) -> Self {
		Self { client, base_url }
	}

	pub const fn base_url(&self) -> &Url {
		&self.base_url
	}

	fn url(&self, endpoint: &'static str) -> Result<Url, ClientError> {
		self.base_url
			.join(endpoint)
			.map_err(|source| ClientError::Endpoint { endpoint, source })
	}

	pub(crate) fn post(&self, endpoint: &'static str) -> Result<RequestBuilder, ClientError> {
		Ok(self.client.post(self.url(endpoint)?))
	}

	pub(crate) fn get(&self, endpoint: &'static str) -> Result<RequestBuilder, ClientError> {
		Ok(self.client.get(self.url(endpoint)?))
	}

	/// Sends the request and turns any non-2xx status into [`ClientError::Status`].
	pub(crate) async fn execute(
		endpoint: &'static str,
		request: RequestBuilder,
	) -> Result<Response, ClientError> {
		let response = request
			.send()
			.await
			.map_err(|source| ClientError::Transport { endpoint, source })?;

		let status = response.status();
		if !status.is_success() {
			warn!(endpoint, %status, "Backend rejected the request");
			return Err(ClientError::Status { endpoint, status });
		}
		debug!(endpoint, %status, "Backend answered");
		Ok(response)
	}

	pub(crate) async fn read_json<T: DeserializeOwned>(
		endpoint: &'static str,
		response: Response,
	) -> Result<T, ClientError> {
		response
			.json()
			.await
			.map_err(|source| ClientError::Transport { endpoint, source })
	}

	pub(crate) async fn post_json<B, T>(
		&self,
		endpoint: &'static str,
		body: &B,
	) -> Result<T, ClientError>
	where
		B: Serialize + Sync + ?Sized,
		T: DeserializeOwned,
	{
		let response = Self::execute(endpoint, self.post(endpoint)?.json(body)).await?;
		Self::read_json(endpoint, response).await
	}

	/// Posts a JSON body and discards whatever the backend answers on success.
	pub(crate) async fn post_json_discard<B>(
		&self,
		endpoint: &'static str,
		body: &B,
	) -> Result<(), ClientError>
	where
		B: Serialize + Sync + ?Sized,
	{
		Self::execute(endpoint, self.post(endpoint)?.json(body)).await?;
		Ok(())
	}
}
