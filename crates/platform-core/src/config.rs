//! SDK configuration and runtime context

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

use crate::{Error, ProjectId, Result, UserId};

/// Default platform domain
pub const DEFAULT_DOMAIN: &str = "services.cloud.my.faculty.ai";

/// Default protocol for service URLs
pub const DEFAULT_PROTOCOL: &str = "https";

/// Main SDK configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SdkConfig {
    /// Platform domain that service hosts are resolved under
    pub domain: String,

    /// Protocol used to reach services
    pub protocol: String,

    /// Request timeout handed to the transport
    #[serde(with = "millis_serde")]
    pub request_timeout: Duration,

    /// Page size sent with list requests when the caller gives none
    pub default_page_limit: Option<u64>,

    /// Datasets settings
    pub datasets: DatasetsConfig,
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            domain: DEFAULT_DOMAIN.to_string(),
            protocol: DEFAULT_PROTOCOL.to_string(),
            request_timeout: Duration::from_secs(30),
            default_page_limit: None,
            datasets: DatasetsConfig::default(),
        }
    }
}

impl SdkConfig {
    /// Defaults overlaid with `FACULTY_DOMAIN` and `FACULTY_PROTOCOL`
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with values from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(domain) = lookup("FACULTY_DOMAIN").filter(|v| !v.is_empty()) {
            config.domain = domain;
        }
        if let Some(protocol) = lookup("FACULTY_PROTOCOL").filter(|v| !v.is_empty()) {
            config.protocol = protocol;
        }
        config
    }

    /// Base URL of a named platform service
    pub fn service_url(&self, service: &str) -> String {
        format!("{}://{}.{}", self.protocol, service, self.domain)
    }
}

/// Datasets configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetsConfig {
    /// Where `open` stages downloads; the system temp dir when unset
    pub temp_dir: Option<PathBuf>,

    /// Number of keys a local object store returns per listing page
    pub list_page_size: usize,
}

impl Default for DatasetsConfig {
    fn default() -> Self {
        Self {
            temp_dir: None,
            list_page_size: 1000,
        }
    }
}

/// Project and user the process runs on behalf of
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectContext {
    pub project_id: Option<ProjectId>,
    pub user_id: Option<UserId>,
}

impl ProjectContext {
    /// Read `FACULTY_PROJECT_ID` and `FACULTY_USER_ID`
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the context from an arbitrary variable lookup
    ///
    /// Unset or empty variables leave the field empty; malformed ids are
    /// rejected.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let project_id = match lookup("FACULTY_PROJECT_ID").filter(|v| !v.is_empty()) {
            Some(value) => Some(value.parse::<ProjectId>()?),
            None => None,
        };

        let user_id = match lookup("FACULTY_USER_ID").filter(|v| !v.is_empty()) {
            Some(value) => Some(Uuid::parse_str(value.trim()).map_err(|e| {
                Error::InvalidConfig {
                    message: format!("invalid FACULTY_USER_ID {:?}: {}", value, e),
                }
            })?),
            None => None,
        };

        Ok(Self {
            project_id,
            user_id,
        })
    }
}

/// Serializes a `Duration` as whole milliseconds
mod millis_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
