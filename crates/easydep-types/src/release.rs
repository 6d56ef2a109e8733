//! The `Release` descriptor handed from a release feed to the supervisor.

use serde::{Deserialize, Serialize};

/// An externally-defined unit of deployable source.
///
/// `id` is the canonical ordering key: two distinct releases never share
/// an id, and the supervisor treats a larger id as newer regardless of
/// `tag_name` or wall-clock arrival order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    pub id: i64,
    pub tag_name: String,
    pub owner: String,
    pub repo_name: String,
    #[serde(default)]
    pub body: Option<String>,
}

impl Release {
    pub fn new(
        id: i64,
        tag_name: impl Into<String>,
        owner: impl Into<String>,
        repo_name: impl Into<String>,
    ) -> Self {
        Self {
            id,
            tag_name: tag_name.into(),
            owner: owner.into(),
            repo_name: repo_name.into(),
            body: None,
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_body() {
        let r = Release::new(1, "v1.0.0", "acme", "widgets").with_body("labels = {}");
        assert_eq!(r.body.as_deref(), Some("labels = {}"));
    }

    #[test]
    fn roundtrips_through_json() {
        let r = Release::new(42, "v2.0.0", "acme", "widgets");
        let json = serde_json::to_string(&r).unwrap();
        let back: Release = serde_json::from_str(&json).unwrap();
        assert_eq!(r, back);
    }
}
