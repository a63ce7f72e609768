
use std::path::Path;

use serde::{Serialize, Deserialize};

use crate::config::ConfigError;
use crate::rest_types::NodeTemplate;

/// A batch of nodes to provision, kept apart from the connection settings.
///
/// ```yaml
/// lab: demo.unl
/// nodes:
///   - { name: R1, template: vios, type: qemu, image: vios-adventerprisek9-m, left: 100, top: 100 }
///   - { name: SW1, template: iol, type: iol, ethernet: 4, left: 300, top: 100 }
/// ```
#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeFile {
    /// Lab to create the nodes in, if not given elsewhere
    #[serde(default)]
    pub lab: Option<String>,
    pub nodes: Vec<NodeTemplate>,
}

impl NodeFile {
    pub fn load(path: &Path) -> Result<NodeFile, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_owned(), source })?;
        serde_yaml::from_str(&text)
            .map_err(|source| ConfigError::Parse { path: path.to_owned(), source })
    }
}
