//! Error-code classification into tracker projects.
//!
//! Codes are matched by substring against a fixed list of prefixes; the
//! first rule that matches wins, in the order listed in [`RULES`]. A code
//! matching none of them lands in the catch-all project.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Vm,
    Database,
    Kubernetes,
    Api,
    Unclassified,
}

/// Match order matters: `"db_k8s_x"` is a database error.
const RULES: [(&str, ErrorClass); 4] = [
    ("vm_", ErrorClass::Vm),
    ("db_", ErrorClass::Database),
    ("k8s_", ErrorClass::Kubernetes),
    ("api_", ErrorClass::Api),
];

impl ErrorClass {
    pub fn classify(error_code: &str) -> Self {
        RULES
            .iter()
            .find(|(needle, _)| error_code.contains(needle))
            .map(|(_, class)| *class)
            .unwrap_or(Self::Unclassified)
    }

    /// Tracker project receiving tickets of this class.
    pub fn project_id(self) -> &'static str {
        match self {
            Self::Vm => "10000",
            Self::Kubernetes => "10001",
            Self::Database => "10002",
            Self::Api => "10003",
            Self::Unclassified => "10004",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Vm => "vm",
            Self::Database => "database",
            Self::Kubernetes => "kubernetes",
            Self::Api => "api",
            Self::Unclassified => "unclassified",
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
