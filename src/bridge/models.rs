use serde::{Deserialize, Serialize};

/// A reported operational error mirrored into the tracker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub id: i64,
    pub tenant_id: String,
    pub vpc_id: String,
    pub region_id: String,
    #[serde(rename = "issueJiraID")]
    pub issue_jira_id: String,
    pub name: String,
    pub data_log: String,
    pub error_code: String,
    pub status: String,
    pub service: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Insert payload for the `issues` table.
#[derive(Debug, Clone)]
pub struct NewIssue {
    pub tenant_id: String,
    pub vpc_id: String,
    pub region_id: String,
    pub issue_jira_id: String,
    pub name: String,
    pub data_log: String,
    pub error_code: String,
    pub status: String,
    pub service: String,
}

/// Catalog entry describing a known error code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorStore {
    pub id: i64,
    pub error_code: String,
    pub name: String,
    pub description: String,
    pub service: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Audit trail entry. `issue_id` holds the issue's tracker ID.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StepLog {
    pub id: i64,
    pub issue_id: String,
    pub reporter_name: String,
    pub supporter_name: String,
    pub description: String,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Who wrote a step-log entry and what it says. The entry's status is
/// always the issue status at the time of writing.
#[derive(Debug, Clone)]
pub struct StepNote {
    pub reporter_name: String,
    pub supporter_name: String,
    pub description: String,
}

// API view types
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueWithLogs {
    pub issue: Issue,
    pub logs: Vec<StepLog>,
}

/// Tracker IDs are Jira numeric IDs or keys such as `OPS-12`.
pub fn is_valid_tracker_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 64
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_serializes_with_legacy_field_names() {
        let issue = Issue {
            id: 7,
            tenant_id: "t".into(),
            vpc_id: "v".into(),
            region_id: "r".into(),
            issue_jira_id: "10021".into(),
            name: "n".into(),
            data_log: "log".into(),
            error_code: "vm_down".into(),
            status: "TO DO".into(),
            service: "VM".into(),
            created_at: "2026-01-01T00:00:00+00:00".into(),
            updated_at: "2026-01-01T00:00:00+00:00".into(),
        };
        let value = serde_json::to_value(&issue).unwrap();
        assert_eq!(value["issueJiraID"], "10021");
        assert_eq!(value["tenantId"], "t");
        assert_eq!(value["dataLog"], "log");
        assert_eq!(value["errorCode"], "vm_down");
        assert_eq!(value["createdAt"], "2026-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_is_valid_tracker_id() {
        assert!(is_valid_tracker_id("10042"));
        assert!(is_valid_tracker_id("OPS-12"));
        assert!(!is_valid_tracker_id(""));
        assert!(!is_valid_tracker_id("10042' OR '1'='1"));
        assert!(!is_valid_tracker_id("a/b"));
        assert!(!is_valid_tracker_id(&"9".repeat(65)));
    }
}
