//! Provider-neutral views of CloudFormation stacks and change sets.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::stack::KeyValue;

/// CloudFormation stack status.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StackStatus {
    /// `CREATE_IN_PROGRESS`
    CreateInProgress,
    /// `CREATE_FAILED`
    CreateFailed,
    /// `CREATE_COMPLETE`
    CreateComplete,
    /// `ROLLBACK_IN_PROGRESS`
    RollbackInProgress,
    /// `ROLLBACK_FAILED`
    RollbackFailed,
    /// `ROLLBACK_COMPLETE`
    RollbackComplete,
    /// `DELETE_IN_PROGRESS`
    DeleteInProgress,
    /// `DELETE_FAILED`
    DeleteFailed,
    /// `DELETE_COMPLETE`
    DeleteComplete,
    /// `UPDATE_IN_PROGRESS`
    UpdateInProgress,
    /// `UPDATE_COMPLETE_CLEANUP_IN_PROGRESS`
    UpdateCompleteCleanupInProgress,
    /// `UPDATE_COMPLETE`
    UpdateComplete,
    /// `UPDATE_FAILED`
    UpdateFailed,
    /// `UPDATE_ROLLBACK_IN_PROGRESS`
    UpdateRollbackInProgress,
    /// `UPDATE_ROLLBACK_FAILED`
    UpdateRollbackFailed,
    /// `UPDATE_ROLLBACK_COMPLETE_CLEANUP_IN_PROGRESS`
    UpdateRollbackCompleteCleanupInProgress,
    /// `UPDATE_ROLLBACK_COMPLETE`
    UpdateRollbackComplete,
    /// `REVIEW_IN_PROGRESS`
    ReviewInProgress,
    /// `IMPORT_IN_PROGRESS`
    ImportInProgress,
    /// `IMPORT_COMPLETE`
    ImportComplete,
    /// `IMPORT_ROLLBACK_IN_PROGRESS`
    ImportRollbackInProgress,
    /// `IMPORT_ROLLBACK_FAILED`
    ImportRollbackFailed,
    /// `IMPORT_ROLLBACK_COMPLETE`
    ImportRollbackComplete,
    /// A status this tool does not know about.
    Other(String),
}

static KNOWN_STATUSES: [(&str, StackStatus); 23] = [
    ("CREATE_IN_PROGRESS", StackStatus::CreateInProgress),
    ("CREATE_FAILED", StackStatus::CreateFailed),
    ("CREATE_COMPLETE", StackStatus::CreateComplete),
    ("ROLLBACK_IN_PROGRESS", StackStatus::RollbackInProgress),
    ("ROLLBACK_FAILED", StackStatus::RollbackFailed),
    ("ROLLBACK_COMPLETE", StackStatus::RollbackComplete),
    ("DELETE_IN_PROGRESS", StackStatus::DeleteInProgress),
    ("DELETE_FAILED", StackStatus::DeleteFailed),
    ("DELETE_COMPLETE", StackStatus::DeleteComplete),
    ("UPDATE_IN_PROGRESS", StackStatus::UpdateInProgress),
    (
        "UPDATE_COMPLETE_CLEANUP_IN_PROGRESS",
        StackStatus::UpdateCompleteCleanupInProgress,
    ),
    ("UPDATE_COMPLETE", StackStatus::UpdateComplete),
    ("UPDATE_FAILED", StackStatus::UpdateFailed),
    ("UPDATE_ROLLBACK_IN_PROGRESS", StackStatus::UpdateRollbackInProgress),
    ("UPDATE_ROLLBACK_FAILED", StackStatus::UpdateRollbackFailed),
    (
        "UPDATE_ROLLBACK_COMPLETE_CLEANUP_IN_PROGRESS",
        StackStatus::UpdateRollbackCompleteCleanupInProgress,
    ),
    ("UPDATE_ROLLBACK_COMPLETE", StackStatus::UpdateRollbackComplete),
    ("REVIEW_IN_PROGRESS", StackStatus::ReviewInProgress),
    ("IMPORT_IN_PROGRESS", StackStatus::ImportInProgress),
    ("IMPORT_COMPLETE", StackStatus::ImportComplete),
    ("IMPORT_ROLLBACK_IN_PROGRESS", StackStatus::ImportRollbackInProgress),
    ("IMPORT_ROLLBACK_FAILED", StackStatus::ImportRollbackFailed),
    ("IMPORT_ROLLBACK_COMPLETE", StackStatus::ImportRollbackComplete),
];

impl StackStatus {
    /// Parses a status string; unknown values are kept verbatim.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        KNOWN_STATUSES
            .iter()
            .find(|(name, _)| *name == value)
            .map_or_else(|| Self::Other(value.to_string()), |(_, s)| s.clone())
    }

    /// Returns the CloudFormation spelling of the status.
    #[must_use]
    pub fn as_str(&self) -> &str {
        if let Self::Other(value) = self {
            return value;
        }
        KNOWN_STATUSES
            .iter()
            .find(|(_, s)| s == self)
            .map_or("UNKNOWN", |(name, _)| *name)
    }

    /// Returns true while CloudFormation is working on the stack.
    #[must_use]
    pub fn in_progress(&self) -> bool {
        self.as_str().ends_with("_IN_PROGRESS")
    }

    /// Returns true for failed creations that must be deleted before the
    /// stack can be created again.
    #[must_use]
    pub const fn requires_cleanup(&self) -> bool {
        matches!(
            self,
            Self::CreateFailed | Self::RollbackComplete | Self::RollbackFailed
        )
    }

    /// Returns true for states in which the stack is healthy and idle.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(
            self,
            Self::CreateComplete
                | Self::UpdateComplete
                | Self::UpdateRollbackComplete
                | Self::ImportComplete
        )
    }
}

impl fmt::Display for StackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for StackStatus {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

impl Serialize for StackStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A snapshot of a remote stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StackDescription {
    /// Stack ARN.
    pub stack_id: Option<String>,
    /// Stack name.
    pub stack_name: String,
    /// Current status.
    pub status: StackStatus,
    /// Reason for the current status, when CloudFormation reports one.
    pub status_reason: Option<String>,
    /// Stack outputs keyed by output name.
    pub outputs: BTreeMap<String, String>,
}

impl StackDescription {
    /// Creates a description with no id and no outputs.
    #[must_use]
    pub fn new(stack_name: impl Into<String>, status: StackStatus) -> Self {
        Self {
            stack_id: None,
            stack_name: stack_name.into(),
            status,
            status_reason: None,
            outputs: BTreeMap::new(),
        }
    }

    /// Sets the stack id.
    #[must_use]
    pub fn with_id(mut self, stack_id: impl Into<String>) -> Self {
        self.stack_id = Some(stack_id.into());
        self
    }

    /// Adds an output.
    #[must_use]
    pub fn with_output(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.outputs.insert(key.into(), value.into());
        self
    }

    /// Returns the stack id, or the name if CloudFormation gave no id.
    #[must_use]
    pub fn id_or_name(&self) -> &str {
        self.stack_id.as_deref().unwrap_or(&self.stack_name)
    }
}

/// Whether a change set creates a new stack or updates an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeSetType {
    /// `CREATE`
    Create,
    /// `UPDATE`
    Update,
}

impl ChangeSetType {
    /// Returns the CloudFormation spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
        }
    }
}

impl fmt::Display for ChangeSetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Change set creation status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeSetStatus {
    /// `CREATE_PENDING`
    CreatePending,
    /// `CREATE_IN_PROGRESS`
    CreateInProgress,
    /// `CREATE_COMPLETE`
    CreateComplete,
    /// `DELETE_PENDING`, `DELETE_IN_PROGRESS` or `DELETE_COMPLETE`
    Deleting,
    /// `FAILED` or `DELETE_FAILED`
    Failed,
    /// A status this tool does not know about.
    Other(String),
}

impl ChangeSetStatus {
    /// Parses a status string.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value {
            "CREATE_PENDING" => Self::CreatePending,
            "CREATE_IN_PROGRESS" => Self::CreateInProgress,
            "CREATE_COMPLETE" => Self::CreateComplete,
            "DELETE_PENDING" | "DELETE_IN_PROGRESS" | "DELETE_COMPLETE" => Self::Deleting,
            "FAILED" | "DELETE_FAILED" => Self::Failed,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ChangeSetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::CreatePending => "CREATE_PENDING",
            Self::CreateInProgress => "CREATE_IN_PROGRESS",
            Self::CreateComplete => "CREATE_COMPLETE",
            Self::Deleting => "DELETING",
            Self::Failed => "FAILED",
            Self::Other(value) => value,
        };
        f.write_str(text)
    }
}

/// Everything needed to request a change set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSetInput {
    /// Target stack name.
    pub stack_name: String,
    /// Unique change set name.
    pub change_set_name: String,
    /// Create or update.
    pub change_set_type: ChangeSetType,
    /// Rendered template body.
    pub template_body: String,
    /// Template parameters.
    pub parameters: Vec<KeyValue>,
    /// Stack tags.
    pub tags: Vec<KeyValue>,
}

/// Identifies a created change set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSetHandle {
    /// Change set id (ARN).
    pub id: String,
    /// Id of the stack the change set belongs to.
    pub stack_id: String,
}

/// A snapshot of a change set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSetDescription {
    /// Creation status.
    pub status: ChangeSetStatus,
    /// Reason for the status.
    pub status_reason: Option<String>,
    /// Number of planned resource changes.
    pub change_count: usize,
}

/// Status reasons CloudFormation gives when a change set has nothing to do.
const EMPTY_CHANGE_SET_REASONS: &[&str] = &[
    "didn't contain changes",
    "No updates are to be performed",
];

impl ChangeSetDescription {
    /// Returns true if the change set failed only because the stack already
    /// matches the submitted template and parameters.
    #[must_use]
    pub fn is_empty_diff(&self) -> bool {
        self.status == ChangeSetStatus::Failed
            && self.change_count == 0
            && self
                .status_reason
                .as_deref()
                .is_some_and(|reason| EMPTY_CHANGE_SET_REASONS.iter().any(|m| reason.contains(m)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed(reason: &str, change_count: usize) -> ChangeSetDescription {
        ChangeSetDescription {
            status: ChangeSetStatus::Failed,
            status_reason: Some(reason.to_string()),
            change_count,
        }
    }

    #[test]
    fn test_empty_diff_requires_the_no_changes_reason() {
        assert!(failed("The submitted information didn't contain changes. Submit different information to create a change set.", 0).is_empty_diff());
        assert!(failed("No updates are to be performed.", 0).is_empty_diff());
        assert!(!failed("No export named oam-ecs-environment-default-VpcId found", 0).is_empty_diff());
        assert!(!failed("No updates are to be performed.", 1).is_empty_diff());

        let pending = ChangeSetDescription {
            status: ChangeSetStatus::CreatePending,
            status_reason: Some(String::from("No updates are to be performed.")),
            change_count: 0,
        };
        assert!(!pending.is_empty_diff());
    }

    #[test]
    fn test_status_round_trips_known_and_unknown() {
        assert_eq!(StackStatus::parse("UPDATE_COMPLETE"), StackStatus::UpdateComplete);
        assert_eq!(StackStatus::UpdateComplete.as_str(), "UPDATE_COMPLETE");

        let other = StackStatus::parse("SOMETHING_NEW");
        assert_eq!(other, StackStatus::Other(String::from("SOMETHING_NEW")));
        assert_eq!(other.to_string(), "SOMETHING_NEW");
    }

    #[test]
    fn test_status_predicates() {
        assert!(StackStatus::CreateInProgress.in_progress());
        assert!(StackStatus::UpdateRollbackCompleteCleanupInProgress.in_progress());
        assert!(StackStatus::ReviewInProgress.in_progress());
        assert!(StackStatus::Other(String::from("FUTURE_IN_PROGRESS")).in_progress());
        assert!(!StackStatus::UpdateComplete.in_progress());

        assert!(StackStatus::RollbackComplete.requires_cleanup());
        assert!(StackStatus::CreateFailed.requires_cleanup());
        assert!(!StackStatus::UpdateRollbackComplete.requires_cleanup());

        assert!(StackStatus::UpdateRollbackComplete.is_success());
        assert!(!StackStatus::UpdateRollbackFailed.is_success());
    }

    #[test]
    fn test_change_set_status_parse() {
        assert_eq!(ChangeSetStatus::parse("FAILED"), ChangeSetStatus::Failed);
        assert_eq!(ChangeSetStatus::parse("CREATE_COMPLETE"), ChangeSetStatus::CreateComplete);
        assert_eq!(ChangeSetType::Update.to_string(), "UPDATE");
    }
}
