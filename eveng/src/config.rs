use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::Engine;
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::rest::Authenticate;
use crate::rest_types::{NodeId, NodeTemplate};
use crate::utils::{render_path, render_trailing};

pub const ENV_EVE_HOST: &str = "EVE_HOST";
pub const ENV_EVE_PORT: &str = "EVE_PORT";
pub const ENV_EVE_USER: &str = "EVE_USER";
pub const ENV_EVE_PASS: &str = "EVE_PASS";
pub const ENV_EVE_PASS64: &str = "EVE_PASS64";
pub const ENV_EVE_SSL: &str = "EVE_SSL";
pub const ENV_EVE_LAB: &str = "EVE_LAB";

/// Looked up in the working directory when neither a path nor `EVE_HOST` is given.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("unable to read `{}`: {source}", .path.display())]
	Read { path: PathBuf, source: std::io::Error },
	#[error("unable to parse `{}`: {source}", .path.display())]
	Parse { path: PathBuf, source: serde_yaml::Error },
	#[error("missing or invalid environment variable `{0}`")]
	Env(&'static str),
	#[error("missing or invalid environment variable(s): `{}` or `{}`", ENV_EVE_PASS64, ENV_EVE_PASS)]
	EnvPassword,
	#[error("no configuration found: pass a config file, set `{}`, or create `{}`", ENV_EVE_HOST, DEFAULT_CONFIG_FILE)]
	NotFound,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	pub eve_ng: ServerConfig,
	#[serde(default)]
	pub api_endpoints: Endpoints,
	#[serde(default)]
	pub lab: LabConfig,
	/// Nodes to create on `provision`, unless a separate node file is given
	#[serde(default)]
	pub nodes: Vec<NodeTemplate>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
	pub host: String,
	#[serde(default)]
	pub port: Option<u16>,
	pub username: String,
	pub password: String,
	#[serde(default)]
	pub use_ssl: bool,
	/// Applies to connecting and to each whole request. Unset waits forever.
	#[serde(default)]
	pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LabConfig {
	#[serde(default)]
	pub target_lab: Option<String>,
}

/// Path templates for every API call. `{lab}`, `{id}`, `{type}` and `{path}` are substituted.
/// `folders` and `templates` may leave out their placeholder, the argument is then appended.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Endpoints {
	pub login: String,
	pub folders: String,
	pub nodetypes: String,
	pub templates: String,
	pub lab: String,
	pub nodes: String,
	pub node: String,
	pub node_start: String,
	pub node_stop: String,
}
impl Default for Endpoints {
	fn default() -> Endpoints {
		Endpoints {
			login: "/api/auth/login".into(),
			folders: "/api/folders/{path}".into(),
			nodetypes: "/api/list/nodetypes".into(),
			templates: "/api/list/templates/{type}".into(),
			lab: "/api/labs/{lab}".into(),
			nodes: "/api/labs/{lab}/nodes".into(),
			node: "/api/labs/{lab}/nodes/{id}".into(),
			node_start: "/api/labs/{lab}/nodes/{id}/start".into(),
			node_stop: "/api/labs/{lab}/nodes/{id}/stop".into(),
		}
	}
}
impl Endpoints {
	pub fn folder(&self, path: &str) -> String {
		render_trailing(&self.folders, "path", path)
	}
	pub fn templates(&self, node_type: &str) -> String {
		render_trailing(&self.templates, "type", node_type)
	}
	pub fn lab(&self, lab: &str) -> String {
		render_path(&self.lab, &[("lab", lab)])
	}
	pub fn nodes(&self, lab: &str) -> String {
		render_path(&self.nodes, &[("lab", lab)])
	}
	pub fn node(&self, lab: &str, id: NodeId) -> String {
		render_path(&self.node, &[("lab", lab), ("id", &id.to_string())])
	}
	pub fn node_start(&self, lab: &str, id: NodeId) -> String {
		render_path(&self.node_start, &[("lab", lab), ("id", &id.to_string())])
	}
	pub fn node_stop(&self, lab: &str, id: NodeId) -> String {
		render_path(&self.node_stop, &[("lab", lab), ("id", &id.to_string())])
	}
}

impl ServerConfig {
	/// `http[s]://host[:port]`, leaving out the port when it is the scheme's default.
	pub fn base_url(&self) -> String {
		let (scheme, default_port) = if self.use_ssl { ("https", 443) } else { ("http", 80) };
		match self.port {
			Some(port) if port != default_port => format!("{}://{}:{}", scheme, self.host, port),
			_ => format!("{}://{}", scheme, self.host),
		}
	}

	pub fn timeout(&self) -> Option<Duration> {
		self.timeout_secs.map(Duration::from_secs)
	}
}

impl Config {
	/// Loads from `path` if given, then from the environment when `EVE_HOST` is set,
	/// then from `config.yaml` in the working directory.
	pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
		Config::load_from(path, |key| std::env::var(key).ok(), Path::new(DEFAULT_CONFIG_FILE))
	}

	/// [`Config::load`] with the environment and the fallback file supplied by the caller.
	pub fn load_from<F: Fn(&str) -> Option<String>>(path: Option<&Path>, env: F, default: &Path) -> Result<Config, ConfigError> {
		if let Some(path) = path {
			return Config::from_file(path);
		}
		if env(ENV_EVE_HOST).is_some() {
			debug!("reading configuration from environment");
			return Config::from_lookup(env);
		}
		if default.exists() {
			return Config::from_file(default);
		}
		Err(ConfigError::NotFound)
	}

	pub fn from_file(path: &Path) -> Result<Config, ConfigError> {
		debug!("reading configuration from {}", path.display());
		let text = std::fs::read_to_string(path)
			.map_err(|source| ConfigError::Read { path: path.to_owned(), source })?;
		Config::from_yaml(&text)
			.map_err(|source| ConfigError::Parse { path: path.to_owned(), source })
	}

	pub fn from_yaml(text: &str) -> Result<Config, serde_yaml::Error> {
		let config: Config = serde_yaml::from_str(text)?;
		trace!("loaded configuration for {}", config.eve_ng.base_url());
		Ok(config)
	}

	/// Used to get connection info from environment variables (EVE_HOST, EVE_PORT, EVE_USER, EVE_PASS64, EVE_PASS, EVE_SSL, EVE_LAB)
	pub fn from_env() -> Result<Config, ConfigError> {
		Config::from_lookup(|key| std::env::var(key).ok())
	}

	/// Same as [`Config::from_env`], reading variables through `env`.
	pub fn from_lookup<F: Fn(&str) -> Option<String>>(env: F) -> Result<Config, ConfigError> {
		let host = env(ENV_EVE_HOST).ok_or(ConfigError::Env(ENV_EVE_HOST))?;
		let username = env(ENV_EVE_USER).ok_or(ConfigError::Env(ENV_EVE_USER))?;
		let password: String = env(ENV_EVE_PASS64)
			.and_then(|s| base64::engine::general_purpose::STANDARD.decode(s.trim()).ok())
			.and_then(|vu8| String::from_utf8(vu8).ok())
			.or_else(|| env(ENV_EVE_PASS))
			.ok_or(ConfigError::EnvPassword)?;
		let port = match env(ENV_EVE_PORT) {
			Some(p) => Some(p.trim().parse().map_err(|_| ConfigError::Env(ENV_EVE_PORT))?),
			None => None,
		};
		let use_ssl = env(ENV_EVE_SSL)
			.map(|s| matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
			.unwrap_or(false);

		Ok(Config {
			eve_ng: ServerConfig { host, port, username, password, use_ssl, timeout_secs: None },
			api_endpoints: Endpoints::default(),
			lab: LabConfig { target_lab: env(ENV_EVE_LAB) },
			nodes: Vec::new(),
		})
	}

	pub fn authenticate(&self) -> Authenticate {
		Authenticate {
			base_url: self.eve_ng.base_url(),
			username: self.eve_ng.username.clone(),
			password: self.eve_ng.password.clone(),
			endpoints: self.api_endpoints.clone(),
			timeout: self.eve_ng.timeout(),
		}
	}
}
