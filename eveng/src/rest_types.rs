use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

/// Every EVE-NG JSON reply wraps its payload in `data`, next to `code`, `status` and `message`.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
	pub data: T,
}

/// Server-assigned node identifier. The API hands these out as integers,
/// but some versions quote them.
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u64);
impl<'de> Deserialize<'de> for NodeId {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<NodeId, D::Error> {
		#[derive(Deserialize)]
		#[serde(untagged)]
		enum Raw {
			Number(u64),
			Text(String),
		}

		match Raw::deserialize(deserializer)? {
			Raw::Number(n) => Ok(NodeId(n)),
			Raw::Text(s) => s.trim().parse()
				.map_err(|_| serde::de::Error::custom(format!("node id `{}` is not numeric", s))),
		}
	}
}
impl FromStr for NodeId {
	type Err = ParseIntError;
	fn from_str(s: &str) -> Result<NodeId, ParseIntError> {
		s.trim().parse().map(NodeId)
	}
}
impl fmt::Display for NodeId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}
impl From<u64> for NodeId { fn from(n: u64) -> NodeId { NodeId(n) } }

/// A single value inside a node template. The server decides what is legal.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum Scalar {
	Integer(i64),
	Float(f64),
	Text(String),
}
impl fmt::Display for Scalar {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Scalar::Integer(i) => write!(f, "{}", i),
			Scalar::Float(x) => write!(f, "{}", x),
			Scalar::Text(s) => f.write_str(s),
		}
	}
}
impl From<i64> for Scalar { fn from(i: i64) -> Scalar { Scalar::Integer(i) } }
impl From<i32> for Scalar { fn from(i: i32) -> Scalar { Scalar::Integer(i.into()) } }
impl From<f64> for Scalar { fn from(x: f64) -> Scalar { Scalar::Float(x) } }
impl From<&str> for Scalar { fn from(s: &str) -> Scalar { Scalar::Text(s.to_owned()) } }
impl From<String> for Scalar { fn from(s: String) -> Scalar { Scalar::Text(s) } }

/// Flat description of one node to create: `template`, `type`, `image`, `name`,
/// `icon`, `cpu`, `ram`, `ethernet`, `left`/`top`, ... Sent verbatim as the creation body.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(transparent)]
pub struct NodeTemplate(BTreeMap<String, Scalar>);
impl NodeTemplate {
	pub fn new() -> NodeTemplate {
		NodeTemplate::default()
	}

	/// Builder-style setter
	pub fn with(mut self, key: impl Into<String>, value: impl Into<Scalar>) -> NodeTemplate {
		self.0.insert(key.into(), value.into());
		self
	}

	pub fn get(&self, key: &str) -> Option<&Scalar> {
		self.0.get(key)
	}

	pub fn fields(&self) -> &BTreeMap<String, Scalar> {
		&self.0
	}

	/// The display name of the node, if the template sets one.
	pub fn name(&self) -> Option<String> {
		self.get("name").map(|s| s.to_string())
	}
}
impl<K: Into<String>, V: Into<Scalar>> FromIterator<(K, V)> for NodeTemplate {
	fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> NodeTemplate {
		NodeTemplate(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
	}
}
impl fmt::Display for NodeTemplate {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match (self.name(), self.get("template")) {
			(Some(name), Some(t)) => write!(f, "{} ({})", name, t),
			(Some(name), None) => f.write_str(&name),
			(None, Some(t)) => write!(f, "<unnamed> ({})", t),
			(None, None) => f.write_str("<unnamed>"),
		}
	}
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LabEntry {
	/// Lab file name, eg. `demo.unl`
	pub file: String,
	pub path: String,
	#[serde(default)]
	pub mtime: Option<Scalar>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FolderEntry {
	pub name: String,
	pub path: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct FolderListing {
	#[serde(default)]
	pub folders: Vec<FolderEntry>,
	#[serde(default)]
	pub labs: Vec<LabEntry>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LabInfo {
	#[serde(default)]
	pub id: Option<String>,
	#[serde(default)]
	pub name: Option<String>,
	#[serde(default)]
	pub filename: Option<String>,
	#[serde(default)]
	pub author: Option<String>,
	#[serde(default)]
	pub version: Option<Scalar>,
	#[serde(default)]
	pub description: Option<String>,
	#[serde(default)]
	pub body: Option<String>,

	#[serde(flatten)]
	pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct TemplateDescriptor {
	#[serde(default)]
	pub id: String,
	#[serde(default)]
	pub name: Option<String>,
	#[serde(default)]
	pub description: Option<String>,
	#[serde(default)]
	pub image: Option<String>,
	#[serde(default)]
	pub path: Option<String>,
	#[serde(default)]
	pub available: Option<bool>,

	#[serde(flatten)]
	pub extra: BTreeMap<String, Value>,
}
impl TemplateDescriptor {
	/// Templates exposing neither an image, a path, nor an availability marker cannot be instantiated.
	pub fn is_available(&self) -> bool {
		let non_empty = |o: &Option<String>| o.as_deref().map(|s| !s.trim().is_empty()).unwrap_or(false);
		non_empty(&self.image) || non_empty(&self.path) || self.available == Some(true)
	}
}

/// `data` of a template listing: either a plain array, or an object keyed by template id
/// whose values are full descriptors or just a description string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum TemplateList {
	List(Vec<TemplateDescriptor>),
	Map(BTreeMap<String, TemplateEntry>),
}
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum TemplateEntry {
	Full(TemplateDescriptor),
	Description(String),
}
impl TemplateList {
	pub fn into_descriptors(self) -> Vec<TemplateDescriptor> {
		match self {
			TemplateList::List(v) => v,
			TemplateList::Map(m) => m.into_iter()
				.map(|(id, entry)| match entry {
					TemplateEntry::Full(mut d) => {
						if d.id.is_empty() { d.id = id; }
						d
					},
					TemplateEntry::Description(description) => TemplateDescriptor {
						id,
						description: Some(description),
						..Default::default()
					},
				})
				.collect(),
		}
	}
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum NodeTypeList {
	List(Vec<String>),
	Map(BTreeMap<String, Value>),
}
impl NodeTypeList {
	pub fn into_ids(self) -> Vec<String> {
		match self {
			NodeTypeList::List(v) => v,
			NodeTypeList::Map(m) => m.into_keys().collect(),
		}
	}
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(from = "i64", into = "i64")]
pub enum NodeStatus {
	Stopped,
	Running,
	Other(i64),
}
impl From<i64> for NodeStatus {
	fn from(i: i64) -> NodeStatus {
		match i {
			0 => NodeStatus::Stopped,
			2 => NodeStatus::Running,
			n => NodeStatus::Other(n),
		}
	}
}
impl From<NodeStatus> for i64 {
	fn from(s: NodeStatus) -> i64 {
		match s {
			NodeStatus::Stopped => 0,
			NodeStatus::Running => 2,
			NodeStatus::Other(n) => n,
		}
	}
}
impl fmt::Display for NodeStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			NodeStatus::Stopped => f.write_str("Stopped"),
			NodeStatus::Running => f.write_str("Running"),
			NodeStatus::Other(n) => write!(f, "Status {}", n),
		}
	}
}

/// A node already present in a lab, as returned by the node listing.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NodeSummary {
	pub id: NodeId,
	#[serde(default)]
	pub name: String,
	#[serde(default)]
	pub status: Option<NodeStatus>,
	#[serde(default)]
	pub template: Option<String>,
	#[serde(default, rename = "type")]
	pub kind: Option<String>,
	#[serde(default)]
	pub image: Option<String>,

	#[serde(flatten)]
	pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum NodeList {
	Map(BTreeMap<String, NodeSummary>),
	List(Vec<NodeSummary>),
}
impl NodeList {
	pub fn into_nodes(self) -> Vec<NodeSummary> {
		let mut nodes = match self {
			NodeList::Map(m) => m.into_values().collect(),
			NodeList::List(v) => v,
		};
		nodes.sort_by_key(|n: &NodeSummary| n.id);
		nodes
	}
}
