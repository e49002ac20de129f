//! Workflow endpoint vocabulary.

use serde::{Deserialize, Serialize};

/// The fixed set of endpoints the scripted workflow drives.
///
/// Serde tags double as per-endpoint metric names in reports and as keys in
/// the allow-list configuration map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Endpoint {
    /// `GET /health`: unauthenticated liveness probe.
    #[serde(rename = "health")]
    Health,

    /// `GET /team/get`: fetch a team by name.
    #[serde(rename = "team_get")]
    TeamGet,

    /// `POST /team/add`: create a team with members.
    #[serde(rename = "team_add")]
    TeamAdd,

    /// `GET /users/getReview`: fetch pull requests assigned to a user.
    #[serde(rename = "user_getreview")]
    UserGetReview,

    /// `POST /pullRequest/create`: create a PR; response echoes assigned reviewers.
    #[serde(rename = "pr_create")]
    PrCreate,

    /// `POST /pullRequest/reassign`: swap a reviewer; conflict is an expected outcome.
    #[serde(rename = "pr_reassign")]
    PrReassign,

    /// `POST /pullRequest/merge`: merge a PR.
    #[serde(rename = "pr_merge")]
    PrMerge,

    /// `POST /users/setIsActive`: toggle a user's active flag.
    #[serde(rename = "user_setactive")]
    UserSetActive,
}

impl Endpoint {
    /// Every endpoint, in workflow order. Index order is stable and used for
    /// enum-indexed metric sinks.
    pub const ALL: [Endpoint; 8] = [
        Endpoint::Health,
        Endpoint::TeamGet,
        Endpoint::UserGetReview,
        Endpoint::TeamAdd,
        Endpoint::PrCreate,
        Endpoint::PrReassign,
        Endpoint::PrMerge,
        Endpoint::UserSetActive,
    ];

    /// Number of endpoints, for sizing enum-indexed sink arrays.
    pub const COUNT: usize = Self::ALL.len();

    /// Stable metric tag for this endpoint.
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Health => "health",
            Self::TeamGet => "team_get",
            Self::TeamAdd => "team_add",
            Self::UserGetReview => "user_getreview",
            Self::PrCreate => "pr_create",
            Self::PrReassign => "pr_reassign",
            Self::PrMerge => "pr_merge",
            Self::UserSetActive => "user_setactive",
        }
    }

    /// Position in [`Endpoint::ALL`], used as the sink array index.
    #[must_use]
    pub fn index(&self) -> usize {
        Self::ALL
            .iter()
            .position(|e| e == self)
            .unwrap_or_default()
    }

    /// Whether the endpoint mutates remote state. Mutating steps use the
    /// longer pacing delay.
    #[must_use]
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Self::TeamAdd | Self::PrCreate | Self::PrReassign | Self::PrMerge | Self::UserSetActive
        )
    }

    /// Whether requests to this endpoint carry the bearer credential.
    /// Only the health probe is unauthenticated.
    #[must_use]
    pub fn requires_auth(&self) -> bool {
        !matches!(self, Self::Health)
    }

    /// Looks up an endpoint by its metric tag.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.tag() == tag)
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_round_trip() {
        for endpoint in Endpoint::ALL {
            assert_eq!(Endpoint::from_tag(endpoint.tag()), Some(endpoint));
        }
        assert_eq!(Endpoint::from_tag("nope"), None);
    }

    #[test]
    fn test_indexes_are_dense() {
        for (i, endpoint) in Endpoint::ALL.iter().enumerate() {
            assert_eq!(endpoint.index(), i);
        }
    }

    #[test]
    fn test_auth_and_mutation_flags() {
        assert!(!Endpoint::Health.requires_auth());
        assert!(Endpoint::TeamGet.requires_auth());
        assert!(!Endpoint::TeamGet.is_mutating());
        assert!(Endpoint::PrMerge.is_mutating());
    }

    #[test]
    fn test_serde_tags_match() {
        let json = serde_json::to_string(&Endpoint::UserGetReview).unwrap();
        assert_eq!(json, "\"user_getreview\"");
        let back: Endpoint = serde_json::from_str("\"pr_reassign\"").unwrap();
        assert_eq!(back, Endpoint::PrReassign);
    }
}
