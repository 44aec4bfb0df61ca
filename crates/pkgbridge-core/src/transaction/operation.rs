use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A package operation the worker can perform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "operation", content = "targets", rename_all = "snake_case")]
pub enum Operation {
    /// Refresh the package databases
    SyncDatabases,
    /// Install packages from the repositories
    InstallPackages(Vec<String>),
    /// Remove installed packages
    RemovePackages(Vec<String>),
    /// Update the named packages
    UpdatePackages(Vec<String>),
    /// Update everything
    UpgradeSystem,
    /// Install a package file from disk
    InstallLocalPackage(PathBuf),
    /// Remove packages nothing depends on any more
    RemoveOrphans,
    /// List available updates without changing anything
    CheckUpdates,
}

impl Operation {
    /// Verb passed to the worker
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::SyncDatabases => "sync",
            Self::InstallPackages(_) => "install",
            Self::RemovePackages(_) => "remove",
            Self::UpdatePackages(_) => "update",
            Self::UpgradeSystem => "upgrade",
            Self::InstallLocalPackage(_) => "install-local",
            Self::RemoveOrphans => "remove-orphans",
            Self::CheckUpdates => "check-updates",
        }
    }

    /// Whether the worker has to run with elevated rights
    #[must_use]
    pub fn wants_elevation(&self) -> bool {
        !matches!(self, Self::CheckUpdates)
    }

    /// Worker arguments for this operation: the verb, then its targets
    #[must_use]
    pub fn worker_args(&self) -> Vec<String> {
        let mut args = vec![self.name().to_string()];
        match self {
            Self::InstallPackages(names)
            | Self::RemovePackages(names)
            | Self::UpdatePackages(names) => {
                args.extend(names.iter().cloned());
            }
            Self::InstallLocalPackage(path) => args.push(path.to_string_lossy().into_owned()),
            Self::SyncDatabases
            | Self::UpgradeSystem
            | Self::RemoveOrphans
            | Self::CheckUpdates => {}
        }
        args
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InstallPackages(names)
            | Self::RemovePackages(names)
            | Self::UpdatePackages(names) => {
                write!(f, "{} {}", self.name(), names.join(" "))
            }
            Self::InstallLocalPackage(path) => write!(f, "{} {}", self.name(), path.display()),
            _ => f.write_str(self.name()),
        }
    }
}
