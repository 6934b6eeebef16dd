use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::ServerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum TransportMode {
    Stdio,
    #[default]
    Http,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
    pub endpoint: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8082,
            endpoint: "/mcp".to_string(),
        }
    }
}

impl HttpConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Endpoint with exactly one leading slash
    pub fn endpoint_path(&self) -> String {
        format!("/{}", self.endpoint.trim().trim_start_matches('/'))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Run a workflow owner so the bridge tools work; off means headless
    pub attach: bool,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self { attach: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Also write log lines to `<directory>/imaging-mcp-server.log`
    pub capture: bool,
    pub directory: PathBuf,
    /// `EnvFilter` directives used when `RUST_LOG` is unset
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            capture: false,
            directory: PathBuf::from("./logs"),
            filter: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub transport: TransportMode,
    pub http: HttpConfig,
    pub workflow: WorkflowConfig,
    pub log: LogConfig,
}

impl ServerConfig {
    pub fn from_toml(content: &str) -> Result<Self, ServerError> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_json(content: &str) -> Result<Self, ServerError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Pick the format from the file extension
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ServerError> {
        let path = path.as_ref();
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml(&fs::read_to_string(path)?),
            Some("json") => Self::from_json(&fs::read_to_string(path)?),
            _ => Err(ServerError::UnsupportedFileFormat),
        }
    }

    pub fn to_toml(&self) -> Result<String, ServerError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ServerConfig::from_toml("transport = \"stdio\"\n[http]\nport = 9000\n").unwrap();
        assert_eq!(config.transport, TransportMode::Stdio);
        assert_eq!(config.http.port, 9000);
        assert_eq!(config.http.host, "localhost");
        assert!(config.workflow.attach);
        assert_eq!(config.log.filter, "info");
    }

    #[test]
    fn test_from_file_dispatches_on_extension() {
        let dir = tempfile::tempdir().unwrap();
        let json = dir.path().join("server.json");
        std::fs::write(&json, r#"{"workflow": {"attach": false}}"#).unwrap();
        assert!(!ServerConfig::from_file(&json).unwrap().workflow.attach);

        let yaml = dir.path().join("server.yaml");
        std::fs::write(&yaml, "transport: http").unwrap();
        assert!(matches!(ServerConfig::from_file(&yaml), Err(ServerError::UnsupportedFileFormat)));
    }

    #[test]
    fn test_toml_output_reads_back() {
        let config = ServerConfig::default();
        assert_eq!(ServerConfig::from_toml(&config.to_toml().unwrap()).unwrap(), config);
    }

    #[test]
    fn test_endpoint_is_normalized() {
        let http = HttpConfig { endpoint: "mcp".to_string(), ..HttpConfig::default() };
        assert_eq!(http.endpoint_path(), "/mcp");
        assert_eq!("STDIO".parse::<TransportMode>().unwrap(), TransportMode::Stdio);
    }
}
