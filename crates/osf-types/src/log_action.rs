//! Audit log actions
//!
//! Every mutating operation on a node appends a log tagged with one of these
//! actions. The string values are the stored wire names and must not change.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! log_actions {
    ($($variant:ident => $name:literal,)+) => {
        /// Kind of state change recorded in a node log.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum LogAction {
            $(
                #[serde(rename = $name)]
                $variant,
            )+
        }

        impl LogAction {
            /// Every known action, in declaration order.
            pub const ALL: &'static [LogAction] = &[$(LogAction::$variant,)+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(LogAction::$variant => $name,)+
                }
            }
        }

        impl FromStr for LogAction {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok(LogAction::$variant),)+
                    _ => Err(format!("Unknown log action: {}", s)),
                }
            }
        }
    };
}

log_actions! {
    CheckedIn => "checked_in",
    CheckedOut => "checked_out",
    FileTagRemoved => "file_tag_removed",
    FileTagAdded => "file_tag_added",
    CreatedFrom => "created_from",
    ProjectCreated => "project_created",
    ProjectRegistered => "project_registered",
    ProjectDeleted => "project_deleted",
    NodeCreated => "node_created",
    NodeForked => "node_forked",
    NodeRemoved => "node_removed",
    PointerCreated => "pointer_created",
    PointerForked => "pointer_forked",
    PointerRemoved => "pointer_removed",
    WikiUpdated => "wiki_updated",
    WikiDeleted => "wiki_deleted",
    WikiRenamed => "wiki_renamed",
    MadeWikiPublic => "made_wiki_public",
    MadeWikiPrivate => "made_wiki_private",
    ContribAdded => "contributor_added",
    ContribRemoved => "contributor_removed",
    ContribReordered => "contributors_reordered",
    PermissionsUpdated => "permissions_updated",
    MadePrivate => "made_private",
    MadePublic => "made_public",
    TagAdded => "tag_added",
    TagRemoved => "tag_removed",
    EditedTitle => "edit_title",
    EditedDescription => "edit_description",
    ChangedLicense => "license_changed",
    UpdatedFields => "updated_fields",
    FileMoved => "addon_file_moved",
    FileCopied => "addon_file_copied",
    FileRenamed => "addon_file_renamed",
    FolderCreated => "folder_created",
    FileAdded => "file_added",
    FileUpdated => "file_updated",
    FileRemoved => "file_removed",
    FileRestored => "file_restored",
    AddonAdded => "addon_added",
    AddonRemoved => "addon_removed",
    CommentAdded => "comment_added",
    CommentRemoved => "comment_removed",
    CommentUpdated => "comment_updated",
    CommentRestored => "comment_restored",
    MadeContributorVisible => "made_contributor_visible",
    MadeContributorInvisible => "made_contributor_invisible",
    ExternalIdsAdded => "external_ids_added",
    EmbargoApproved => "embargo_approved",
    EmbargoTerminated => "embargo_terminated",
    EmbargoCancelled => "embargo_cancelled",
    EmbargoCompleted => "embargo_completed",
    EmbargoInitiated => "embargo_initiated",
    RetractionApproved => "retraction_approved",
    RetractionCancelled => "retraction_cancelled",
    RetractionInitiated => "retraction_initiated",
    RegistrationApprovalCancelled => "registration_cancelled",
    RegistrationApprovalInitiated => "registration_initiated",
    RegistrationApprovalApproved => "registration_approved",
    PreregRegistrationInitiated => "prereg_registration_initiated",
    CitationAdded => "citation_added",
    CitationEdited => "citation_edited",
    CitationRemoved => "citation_removed",
    AffiliatedInstitutionAdded => "affiliated_institution_added",
    AffiliatedInstitutionRemoved => "affiliated_institution_removed",
}

impl fmt::Display for LogAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
