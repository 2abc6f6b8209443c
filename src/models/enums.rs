use serde::{Deserialize, Serialize};

use crate::store::DatabaseError;

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(DocumentCategory {
    Identity => "identity",
    License => "license",
    Contract => "contract",
    Certificate => "certificate",
    Generic => "generic",
});

impl DocumentCategory {
    /// Pipeline fusion order. Partials are merged in this order, so
    /// earlier categories win ties against later ones.
    pub const FUSION_ORDER: [DocumentCategory; 5] = [
        DocumentCategory::Identity,
        DocumentCategory::License,
        DocumentCategory::Contract,
        DocumentCategory::Certificate,
        DocumentCategory::Generic,
    ];

    /// Position in the fusion order (lower merges earlier).
    pub fn fusion_rank(&self) -> usize {
        Self::FUSION_ORDER
            .iter()
            .position(|c| c == self)
            .unwrap_or(Self::FUSION_ORDER.len())
    }
}

str_enum!(RecordStatus {
    Active => "active",
    Deleted => "deleted",
});

str_enum!(AuditAction {
    Insert => "insert",
    Update => "update",
    SoftDelete => "soft_delete",
});

str_enum!(CheckpointKind {
    BeforeNode => "before_node",
    AfterNode => "after_node",
    Milestone => "milestone",
});

str_enum!(NodeStatus {
    Pending => "pending",
    Running => "running",
    Completed => "completed",
    Failed => "failed",
});

str_enum!(NodeId {
    Classify => "classify",
    Recognize => "recognize",
    Extract => "extract",
    Fuse => "fuse",
    Archive => "archive",
    Persist => "persist",
    Generate => "generate",
});

impl NodeId {
    /// The fixed node sequence one pipeline run walks through.
    pub const SEQUENCE: [NodeId; 7] = [
        NodeId::Classify,
        NodeId::Recognize,
        NodeId::Extract,
        NodeId::Fuse,
        NodeId::Archive,
        NodeId::Persist,
        NodeId::Generate,
    ];

    /// The node after this one, or None for the last node.
    pub fn next(&self) -> Option<NodeId> {
        let idx = Self::SEQUENCE.iter().position(|n| n == self)?;
        Self::SEQUENCE.get(idx + 1).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn category_round_trips() {
        for cat in DocumentCategory::FUSION_ORDER {
            assert_eq!(DocumentCategory::from_str(cat.as_str()).unwrap(), cat);
        }
    }

    #[test]
    fn invalid_enum_value_rejected() {
        let err = RecordStatus::from_str("archived").unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidEnum { .. }));
    }

    #[test]
    fn identity_merges_before_license() {
        assert!(
            DocumentCategory::Identity.fusion_rank() < DocumentCategory::License.fusion_rank()
        );
    }

    #[test]
    fn node_sequence_ends_at_generate() {
        assert_eq!(NodeId::Persist.next(), Some(NodeId::Generate));
        assert_eq!(NodeId::Generate.next(), None);
    }

    #[test]
    fn checkpoint_kind_serializes_as_snake_case() {
        assert_eq!(CheckpointKind::BeforeNode.as_str(), "before_node");
        let json = serde_json::to_string(&CheckpointKind::AfterNode).unwrap();
        assert_eq!(json, "\"after_node\"");
    }
}
