//! Versioned tool groups — which capabilities a protocol version unlocks.
//!
//! Each [`ToolVersion`] maps to an immutable [`ToolGroup`]: the ordered
//! capability list plus the provider beta flag required to unlock their
//! schemas. The registry is built once at startup and passed by reference
//! into the orchestrator; groups share no mutable state, so adding a version
//! can never change behavior for existing ones.

use std::collections::HashMap;
use std::sync::Arc;

use deskclaw_core::error::ConfigError;
use deskclaw_core::tool::ToolCapability;
use tracing::warn;

use crate::bash::BashTool;
use crate::computer::ComputerTool;
use crate::edit::EditTool;

/// Supported computer-use protocol versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolVersion {
    ComputerUse20241022,
    ComputerUse20250124,
}

impl ToolVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ComputerUse20241022 => "computer_use_20241022",
            Self::ComputerUse20250124 => "computer_use_20250124",
        }
    }

    /// The provider feature flag that unlocks this version's tool schemas.
    pub fn beta_flag(&self) -> Option<&'static str> {
        match self {
            Self::ComputerUse20241022 => Some("computer-use-2024-10-22"),
            Self::ComputerUse20250124 => Some("computer-use-2025-01-24"),
        }
    }
}

impl std::str::FromStr for ToolVersion {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "computer_use_20241022" => Ok(Self::ComputerUse20241022),
            "computer_use_20250124" => Ok(Self::ComputerUse20250124),
            other => Err(ConfigError::UnknownToolVersion(other.into())),
        }
    }
}

impl std::fmt::Display for ToolVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The concrete capability set for one protocol version. Immutable after
/// construction; cloning is cheap (capabilities are shared).
#[derive(Clone)]
pub struct ToolGroup {
    version: ToolVersion,
    tools: Vec<Arc<dyn ToolCapability>>,
}

impl std::fmt::Debug for ToolGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolGroup")
            .field("version", &self.version)
            .field("tools", &self.tools.iter().map(|t| t.name()).collect::<Vec<_>>())
            .finish()
    }
}

impl ToolGroup {
    /// Build a group, enforcing name uniqueness: a duplicate name is logged
    /// and dropped, keeping the first registration.
    pub fn new(version: ToolVersion, tools: Vec<Arc<dyn ToolCapability>>) -> Self {
        let mut seen: Vec<String> = Vec::new();
        let mut unique = Vec::with_capacity(tools.len());
        for tool in tools {
            if seen.iter().any(|n| n == tool.name()) {
                warn!(version = %version, tool = tool.name(), "Duplicate tool name in group, dropping");
                continue;
            }
            seen.push(tool.name().to_string());
            unique.push(tool);
        }
        Self {
            version,
            tools: unique,
        }
    }

    pub fn version(&self) -> ToolVersion {
        self.version
    }

    pub fn beta_flag(&self) -> Option<&'static str> {
        self.version.beta_flag()
    }

    /// Look up a capability by name. Unknown names are never invoked.
    pub fn get(&self, name: &str) -> Option<&dyn ToolCapability> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    /// Provider-facing schemas, in registration order.
    pub fn schemas(&self) -> Vec<serde_json::Value> {
        self.tools.iter().map(|t| t.schema()).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }
}

/// Maps protocol versions to their tool groups. Built once at process start
/// and injected wherever tools are resolved — there is no global.
pub struct VersionRegistry {
    groups: HashMap<ToolVersion, ToolGroup>,
}

impl VersionRegistry {
    /// The built-in registry: both computer-use versions, each with the
    /// computer, editor, and bash capabilities at matching schema revisions.
    pub fn builtin(display_width: u32, display_height: u32) -> Self {
        let mut groups = HashMap::new();
        for version in [
            ToolVersion::ComputerUse20241022,
            ToolVersion::ComputerUse20250124,
        ] {
            let tools: Vec<Arc<dyn ToolCapability>> = vec![
                Arc::new(ComputerTool::new(version, display_width, display_height)),
                Arc::new(EditTool::new(version)),
                Arc::new(BashTool::new(version)),
            ];
            groups.insert(version, ToolGroup::new(version, tools));
        }
        Self { groups }
    }

    /// An empty registry for tests.
    pub fn empty() -> Self {
        Self {
            groups: HashMap::new(),
        }
    }

    /// Add or replace a group (test doubles).
    pub fn with_group(mut self, group: ToolGroup) -> Self {
        self.groups.insert(group.version(), group);
        self
    }

    /// Resolve a version tag. An unknown version is a fatal configuration
    /// error — the caller must fail before any model call is made.
    pub fn group(&self, version: &str) -> Result<ToolGroup, ConfigError> {
        let version: ToolVersion = version.parse()?;
        self.groups
            .get(&version)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownToolVersion(version.as_str().into()))
    }
}
