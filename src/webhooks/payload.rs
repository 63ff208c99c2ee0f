//! Release webhook payloads.
//!
//! Only the fields the watcher acts on or logs are modelled; everything else
//! in the delivery is ignored.

use serde::Deserialize;

use crate::types::ReleaseId;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RepositoryPayload {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReleasePayload {
    pub id: Option<ReleaseId>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub assets_url: Option<String>,
    #[serde(default)]
    pub repository: Option<RepositoryPayload>,
}

/// A `release` event delivery.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReleaseEvent {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub release: Option<ReleasePayload>,
    #[serde(default)]
    pub repository: Option<RepositoryPayload>,
}

impl ReleaseEvent {
    pub fn parse(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }

    /// The announced release, if the delivery names one.
    pub fn release_id(&self) -> Option<ReleaseId> {
        self.release.as_ref()?.id
    }

    /// Name of the repository the release belongs to, for logging.
    pub fn repository_name(&self) -> &str {
        self.release
            .as_ref()
            .and_then(|r| r.repository.as_ref())
            .or(self.repository.as_ref())
            .map_or("unknown", |r| r.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::arb_release_id;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn parses_release_delivery() {
        let body = json!({
            "action": "published",
            "release": {
                "id": 146_027_410,
                "name": "v6.0.5217-CICD-release",
                "assets_url": "https://api.github.com/repos/subsurface/nightly-builds/releases/146027410/assets",
                "draft": false
            },
            "repository": { "name": "nightly-builds", "full_name": "subsurface/nightly-builds" }
        });

        let event = ReleaseEvent::parse(body.to_string().as_bytes()).unwrap();

        assert_eq!(event.action.as_deref(), Some("published"));
        assert_eq!(event.release_id(), Some(ReleaseId(146_027_410)));
        assert_eq!(event.repository_name(), "nightly-builds");
    }

    #[test]
    fn release_repository_takes_precedence() {
        let body = br#"{"release": {"id": 1, "repository": {"name": "inner"}}, "repository": {"name": "outer"}}"#;
        let event = ReleaseEvent::parse(body).unwrap();
        assert_eq!(event.repository_name(), "inner");
    }

    #[test]
    fn deliveries_without_release_have_no_id() {
        let event = ReleaseEvent::parse(br#"{"zen": "Keep it logically awesome."}"#).unwrap();
        assert_eq!(event.release_id(), None);
        assert_eq!(event.repository_name(), "unknown");

        let event = ReleaseEvent::parse(br#"{"action": "created", "release": {"name": "x"}}"#).unwrap();
        assert_eq!(event.release_id(), None);
    }

    #[test]
    fn non_json_is_an_error() {
        assert!(ReleaseEvent::parse(b"not json").is_err());
        assert!(ReleaseEvent::parse(b"[1, 2]").is_err());
    }

    proptest! {
        #[test]
        fn any_release_id_is_read(id in arb_release_id()) {
            let body = json!({ "action": "created", "release": { "id": id.0 } });
            let event = ReleaseEvent::parse(body.to_string().as_bytes()).unwrap();
            prop_assert_eq!(event.release_id(), Some(id));
        }
    }
}
