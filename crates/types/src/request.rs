//! Start requests issued to the command-execution backend

use rscoop_errors::OpsError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of package-manager command an operation runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationType {
    Install,
    Uninstall,
    Update,
    ForceUpdate,
    ClearCache,
    UpdateAll,
    Cleanup,
    CleanupCache,
    UpdateBuckets,
}

impl OperationType {
    pub const ALL: [Self; 9] = [
        Self::Install,
        Self::Uninstall,
        Self::Update,
        Self::ForceUpdate,
        Self::ClearCache,
        Self::UpdateAll,
        Self::Cleanup,
        Self::CleanupCache,
        Self::UpdateBuckets,
    ];

    /// Tag used as the operation id prefix
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Uninstall => "uninstall",
            Self::Update => "update",
            Self::ForceUpdate => "force-update",
            Self::ClearCache => "clear-cache",
            Self::UpdateAll => "update-all",
            Self::Cleanup => "cleanup",
            Self::CleanupCache => "cleanup-cache",
            Self::UpdateBuckets => "update-buckets",
        }
    }

    /// Whether the command targets a single package
    #[must_use]
    pub fn requires_package(self) -> bool {
        matches!(
            self,
            Self::Install | Self::Uninstall | Self::Update | Self::ForceUpdate | Self::ClearCache
        )
    }

    /// Human-readable label for an operation of this type
    #[must_use]
    pub fn title(self, package: Option<&str>) -> String {
        let package = package.unwrap_or("package");
        match self {
            Self::Install => format!("Installing {package}"),
            Self::Uninstall => format!("Uninstalling {package}"),
            Self::Update => format!("Updating {package}"),
            Self::ForceUpdate => format!("Force updating {package}"),
            Self::ClearCache => format!("Clearing cache for {package}"),
            Self::UpdateAll => "Updating all packages".to_string(),
            Self::Cleanup => "Cleaning up old app versions".to_string(),
            Self::CleanupCache => "Cleaning up outdated app caches".to_string(),
            Self::UpdateBuckets => "Updating buckets".to_string(),
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for OperationType {
    type Err = OpsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|ty| ty.tag() == s)
            .ok_or_else(|| OpsError::UnknownOperationType {
                value: s.to_string(),
            })
    }
}

/// Request to start one operation on the backend.
///
/// The backend call returns immediately; progress arrives later as events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest {
    pub operation_type: OperationType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    #[serde(default)]
    pub force: bool,
    /// Start parked in the minimized indicator instead of in the foreground
    #[serde(default)]
    pub minimized: bool,
}

impl StartRequest {
    #[must_use]
    pub fn new(operation_type: OperationType) -> Self {
        Self {
            operation_type,
            package_name: None,
            bucket: None,
            force: false,
            minimized: false,
        }
    }

    #[must_use]
    pub fn for_package(operation_type: OperationType, package: impl Into<String>) -> Self {
        Self::new(operation_type).with_package(package)
    }

    #[must_use]
    pub fn with_package(mut self, package: impl Into<String>) -> Self {
        self.package_name = Some(package.into());
        self
    }

    #[must_use]
    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }

    #[must_use]
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    #[must_use]
    pub fn with_minimized(mut self, minimized: bool) -> Self {
        self.minimized = minimized;
        self
    }

    /// Operation type after applying the `force` flag
    #[must_use]
    pub fn effective_type(&self) -> OperationType {
        match self.operation_type {
            OperationType::Update if self.force => OperationType::ForceUpdate,
            other => other,
        }
    }

    /// Check that package-scoped operations name a package
    ///
    /// # Errors
    ///
    /// Returns `OpsError::InvalidRequest` when a package-scoped operation has
    /// no (or an empty) package name.
    pub fn validate(&self) -> Result<(), OpsError> {
        let ty = self.effective_type();
        if ty.requires_package()
            && self
                .package_name
                .as_deref()
                .is_none_or(|name| name.trim().is_empty())
        {
            return Err(OpsError::InvalidRequest {
                operation: ty.tag().to_string(),
                reason: "package name is required".to_string(),
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn title(&self) -> String {
        self.effective_type().title(self.package_name.as_deref())
    }
}
