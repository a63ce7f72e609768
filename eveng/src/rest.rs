
use std::fmt;
use std::time::Duration;

use log::{debug, info, trace};
use reqwest::{Client, Method, RequestBuilder, Response, header::{self, HeaderMap, HeaderValue}};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use thiserror::Error;

use crate::config::Endpoints;
use crate::rest_types as rt;
use crate::rest_types::{Envelope, NodeId, NodeTemplate};
use crate::utils::available_templates;

pub type RResult<T> = Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
	#[error("network error: {0}")]
	Network(#[from] reqwest::Error),
	#[error(transparent)]
	Response(#[from] ApiError),
	#[error("unable to encode request: {0}")]
	Serialization(#[from] serde_json::Error),
}
impl Error {
	/// Status code of the offending response, if the server answered at all.
	pub fn status(&self) -> Option<u16> {
		match self {
			Error::Response(ApiError { kind: ApiErrorKind::UnexpectedStatus { status, .. }, .. }) => Some(*status),
			Error::Response(ApiError { kind: ApiErrorKind::AuthenticationFailure { status, .. }, .. }) => Some(*status),
			Error::Network(e) => e.status().map(|s| s.as_u16()),
			_ => None,
		}
	}

	/// True when the server answered with a body that was not the JSON we expected.
	pub fn is_decode(&self) -> bool {
		matches!(self, Error::Response(ApiError { kind: ApiErrorKind::JsonDecode { .. }, .. }))
	}

	pub fn is_auth_failure(&self) -> bool {
		matches!(self, Error::Response(ApiError { kind: ApiErrorKind::AuthenticationFailure { .. }, .. }))
	}
}

#[derive(Debug, Error)]
#[error("{endpoint}: {kind}")]
pub struct ApiError {
	endpoint: String,
	kind: ApiErrorKind,
}
impl ApiError {
	fn new(endpoint: impl Into<String>, kind: ApiErrorKind) -> ApiError {
		ApiError {
			endpoint: endpoint.into(),
			kind,
		}
	}
	pub fn endpoint(&self) -> &str {
		&self.endpoint
	}
	pub fn kind(&self) -> &ApiErrorKind {
		&self.kind
	}
}

#[derive(Debug, Error)]
pub enum ApiErrorKind {
	/// Got a status other than the one the operation succeeds with. Contains the raw body.
	#[error("expected status {expected}, got {status}: {body}")]
	UnexpectedStatus { expected: u16, status: u16, body: String },

	/// Error decoding a JSON response. Contains erroring body, as well as decoding error.
	#[error("{context}: {source} (body: {body})")]
	JsonDecode { context: String, body: String, source: serde_json::Error },

	// - /api/auth/login
	#[error("authentication failed with status {status}: {body}")]
	AuthenticationFailure { status: u16, body: String },
}

#[derive(Debug)]
enum RawApiResponse {
	None,
	Json(Value),
	/// Anything that did not parse as JSON, with the reason it did not
	Text(String, serde_json::Error),
}
impl RawApiResponse {
	async fn extract(resp: Response) -> RResult<(u16, RawApiResponse)> {
		let status = resp.status().as_u16();
		let text = resp.text().await?;
		if text.trim().is_empty() {
			Ok((status, RawApiResponse::None))
		} else {
			match serde_json::from_str::<Value>(&text) {
				Ok(v) => Ok((status, RawApiResponse::Json(v))),
				Err(e) => Ok((status, RawApiResponse::Text(text, e))),
			}
		}
	}

	/// Decodes the `data` member of a JSON body as `T`.
	fn data<T: DeserializeOwned>(self, endpoint: &str) -> RResult<T> {
		match self {
			RawApiResponse::Json(j) => {
				Envelope::<T>::deserialize(&j)
					.map(|env| env.data)
					.map_err(|sje| ApiError::new(endpoint, ApiErrorKind::JsonDecode {
						context: "Unable to read JSON response as a proper type".into(),
						body: j.to_string(),
						source: sje,
					}).into())
			},
			RawApiResponse::Text(text, sje) => Err(ApiError::new(endpoint, ApiErrorKind::JsonDecode {
				context: "Unable to parse returned JSON".into(),
				body: text,
				source: sje,
			}).into()),
			RawApiResponse::None => Err(ApiError::new(endpoint, ApiErrorKind::JsonDecode {
				context: "Expected a JSON body".into(),
				body: String::new(),
				source: serde::de::Error::custom("empty response body"),
			}).into()),
		}
	}
}
impl fmt::Display for RawApiResponse {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			RawApiResponse::None => Ok(()),
			RawApiResponse::Json(j) => write!(f, "{}", j),
			RawApiResponse::Text(t, _) => f.write_str(t),
		}
	}
}

fn unexpected(endpoint: &str, expected: u16, status: u16, resp: RawApiResponse) -> Error {
	ApiError::new(endpoint, ApiErrorKind::UnexpectedStatus { expected, status, body: resp.to_string() }).into()
}

fn get_eve_client(timeout: Option<Duration>) -> RResult<Client> {
	let mut hm = HeaderMap::new();
	hm.insert(header::ACCEPT, HeaderValue::from_static("application/json"));

	let mut builder = Client::builder()
		.danger_accept_invalid_certs(true) // most EVE-NG installs are self-signed
		.cookie_store(true)
		.default_headers(hm);

	if let Some(t) = timeout {
		builder = builder.connect_timeout(t).timeout(t);
	}

	builder
		.build()
		.map_err(Error::Network)
}

/// Credentials and target for [`Authenticate::login`].
#[derive(Debug, Clone)]
pub struct Authenticate {
	/// `http[s]://host[:port]`, without a trailing slash
	pub base_url: String,
	pub username: String,
	pub password: String,
	pub endpoints: Endpoints,
	pub timeout: Option<Duration>,
}
impl Authenticate {
	/// Logs in and returns the session every other call is made through.
	pub async fn login(&self) -> RResult<EveSession> {
		#[derive(Serialize)]
		struct ReqAuth<'a> {
			username: &'a str,
			password: &'a str,
			html5: &'a str,
		}

		let client = get_eve_client(self.timeout)?;
		let base_url = self.base_url.trim_end_matches('/').to_owned();
		let endpoint = self.endpoints.login.clone();
		debug!("logging in to {} as {}", base_url, self.username);

		let resp = client.post(format!("{}/{}", base_url, endpoint.trim_start_matches('/')))
			.json(&ReqAuth { username: &self.username, password: &self.password, html5: "-1" })
			.send().await?;
		let rresp = RawApiResponse::extract(resp).await?;

		match rresp {
			(200, _) => {
				info!("logged in to {} as {}", base_url, self.username);
				Ok(EveSession {
					client,
					base_url,
					username: self.username.clone(),
					endpoints: self.endpoints.clone(),
				})
			},
			(status, resp) => Err(ApiError::new(endpoint, ApiErrorKind::AuthenticationFailure { status, body: resp.to_string() }).into()),
		}
	}
}

/// Outcome of probing one endpoint.
#[derive(Debug)]
pub struct ProbeResult {
	pub path: String,
	/// Status code and the first 200 characters of the body
	pub result: RResult<(u16, String)>,
}

/// An authenticated connection to one EVE-NG server. The session cookie lives in the client's cookie store.
#[derive(Debug, Clone)]
pub struct EveSession {
	client: Client,
	base_url: String,
	username: String,
	endpoints: Endpoints,
}

impl EveSession {
	fn url(&self, path: &str) -> String {
		format!("{}/{}", self.base_url, path.trim_start_matches('/'))
	}

	fn request(&self, method: Method, path: &str) -> RequestBuilder {
		self.client.request(method, self.url(path))
	}

	async fn send(&self, path: &str, rb: RequestBuilder) -> RResult<(u16, RawApiResponse)> {
		trace!("request {}", self.url(path));
		let resp = rb.send().await?;
		RawApiResponse::extract(resp).await
	}

	pub fn username(&self) -> &str {
		&self.username
	}

	pub fn base_url(&self) -> &str {
		&self.base_url
	}

	pub fn endpoints(&self) -> &Endpoints {
		&self.endpoints
	}

	/// Lists the folders and labs under `path` (`""` for the root folder).
	pub async fn folder(&self, path: &str) -> RResult<rt::FolderListing> {
		let endpoint = self.endpoints.folder(path);
		let rresp = self.send(&endpoint, self.request(Method::GET, &endpoint)).await?;

		match rresp {
			(200, resp) => resp.data(&endpoint),
			(status, resp) => Err(unexpected(&endpoint, 200, status, resp)),
		}
	}

	/// Labs in the root folder. An empty folder is `Ok(vec![])`; a body that is not
	/// the expected JSON is an error for which [`Error::is_decode`] holds.
	pub async fn labs(&self) -> RResult<Vec<rt::LabEntry>> {
		Ok(self.folder("").await?.labs)
	}

	/// Gets a lab's information. If the lab is not found, returns `Ok(None)`
	pub async fn lab(&self, lab: &str) -> RResult<Option<rt::LabInfo>> {
		let endpoint = self.endpoints.lab(lab);
		let rresp = self.send(&endpoint, self.request(Method::GET, &endpoint)).await?;

		match rresp {
			(200, resp) => resp.data(&endpoint).map(Some),
			(404, _) => Ok(None),
			(status, resp) => Err(unexpected(&endpoint, 200, status, resp)),
		}
	}

	pub async fn node_types(&self) -> RResult<Vec<String>> {
		let endpoint = self.endpoints.nodetypes.clone();
		let rresp = self.send(&endpoint, self.request(Method::GET, &endpoint)).await?;

		match rresp {
			(200, resp) => resp.data::<rt::NodeTypeList>(&endpoint).map(rt::NodeTypeList::into_ids),
			(status, resp) => Err(unexpected(&endpoint, 200, status, resp)),
		}
	}

	/// Templates of the given node type that can actually be instantiated.
	pub async fn templates(&self, node_type: &str) -> RResult<Vec<rt::TemplateDescriptor>> {
		let endpoint = self.endpoints.templates(node_type);
		let rresp = self.send(&endpoint, self.request(Method::GET, &endpoint)).await?;

		match rresp {
			(200, resp) => {
				let all = resp.data::<rt::TemplateList>(&endpoint)?.into_descriptors();
				let total = all.len();
				let available = available_templates(all);
				debug!("{}: {} of {} templates available", endpoint, available.len(), total);
				Ok(available)
			},
			(status, resp) => Err(unexpected(&endpoint, 200, status, resp)),
		}
	}

	/// Get's the nodes currently defined in the lab, ordered by id.
	pub async fn lab_nodes(&self, lab: &str) -> RResult<Vec<rt::NodeSummary>> {
		let endpoint = self.endpoints.nodes(lab);
		let rresp = self.send(&endpoint, self.request(Method::GET, &endpoint)).await?;

		match rresp {
			(200, resp) => resp.data::<rt::NodeList>(&endpoint).map(rt::NodeList::into_nodes),
			(status, resp) => Err(unexpected(&endpoint, 200, status, resp)),
		}
	}

	/// Creates one node from a template and returns the id the server assigned it.
	pub async fn create_node(&self, lab: &str, template: &NodeTemplate) -> RResult<NodeId> {
		#[derive(Deserialize)]
		struct RespCreated {
			id: NodeId,
		}

		let endpoint = self.endpoints.nodes(lab);
		let body = serde_json::to_value(template)?;
		let rresp = self.send(&endpoint, self.request(Method::POST, &endpoint).json(&body)).await?;

		match rresp {
			(201, resp) => resp.data::<RespCreated>(&endpoint).map(|c| c.id),
			(status, resp) => Err(unexpected(&endpoint, 201, status, resp)),
		}
	}

	pub async fn start_node(&self, lab: &str, id: NodeId) -> RResult<()> {
		let endpoint = self.endpoints.node_start(lab, id);
		self.expect_ok(Method::GET, endpoint).await
	}

	pub async fn stop_node(&self, lab: &str, id: NodeId) -> RResult<()> {
		let endpoint = self.endpoints.node_stop(lab, id);
		self.expect_ok(Method::GET, endpoint).await
	}

	/// Removes the node from the lab. Does not check whether it is still running.
	pub async fn delete_node(&self, lab: &str, id: NodeId) -> RResult<()> {
		let endpoint = self.endpoints.node(lab, id);
		self.expect_ok(Method::DELETE, endpoint).await
	}

	async fn expect_ok(&self, method: Method, endpoint: String) -> RResult<()> {
		let rresp = self.send(&endpoint, self.request(method, &endpoint)).await?;

		match rresp {
			(200, _) => Ok(()),
			(status, resp) => Err(unexpected(&endpoint, 200, status, resp)),
		}
	}

	/// GETs each path and records what came back. Never fails as a whole.
	pub async fn probe<S: AsRef<str>>(&self, paths: &[S]) -> Vec<ProbeResult> {
		let mut results = Vec::with_capacity(paths.len());
		for path in paths {
			let path = path.as_ref();
			let result = self.send(path, self.request(Method::GET, path)).await
				.map(|(status, resp)| (status, resp.to_string().chars().take(200).collect()));
			results.push(ProbeResult { path: path.to_owned(), result });
		}
		results
	}
}
