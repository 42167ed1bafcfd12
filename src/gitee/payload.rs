//! Gitee wire structures
//!
//! Two layouts of the same events are seen in the wild. The `Basic` layout
//! identifies commit authors by display name only and has no merged flag
//! on merge requests. The `Extended` layout adds a login `username` to
//! commit identities, an explicit `ref_type`, a `merged` flag and an
//! `action_desc`. Each layout has its own decoder; both lower into the
//! same decoded form which the mappers in `convert` consume.

use chrono::{DateTime, Utc};
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer};

use crate::error::Result;

/// Which payload layout to decode with
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadSchema {
    Basic,
    Extended,
    /// Probe every payload for extended-only fields
    #[default]
    Auto,
}

impl PayloadSchema {
    /// Resolves `Auto` against the payload bytes; concrete variants are
    /// returned unchanged.
    pub fn resolve(self, data: &[u8]) -> PayloadSchema {
        match self {
            PayloadSchema::Auto => Self::detect(data),
            schema => schema,
        }
    }

    /// Capability probe. A payload that fails to parse here is reported
    /// as `Basic`; the real decoder will surface the error.
    pub fn detect(data: &[u8]) -> PayloadSchema {
        let Ok(probe) = serde_json::from_slice::<Probe>(data) else {
            return PayloadSchema::Basic;
        };
        let has_username = probe
            .head_commit
            .iter()
            .chain(probe.commits.iter().flatten())
            .flat_map(|c| c.author.iter().chain(c.committer.iter()))
            .any(|identity| identity.username.is_some());
        let has_merged = probe
            .pull_request
            .as_ref()
            .is_some_and(|pr| pr.merged.is_some());

        if probe.ref_type.is_some() || probe.action_desc.is_some() || has_username || has_merged {
            PayloadSchema::Extended
        } else {
            PayloadSchema::Basic
        }
    }
}

#[derive(Deserialize)]
struct Probe {
    ref_type: Option<IgnoredAny>,
    action_desc: Option<IgnoredAny>,
    head_commit: Option<ProbeCommit>,
    commits: Option<Vec<ProbeCommit>>,
    pull_request: Option<ProbePullRequest>,
}

#[derive(Deserialize)]
struct ProbeCommit {
    author: Option<ProbeIdentity>,
    committer: Option<ProbeIdentity>,
}

#[derive(Deserialize)]
struct ProbeIdentity {
    username: Option<IgnoredAny>,
}

#[derive(Deserialize)]
struct ProbePullRequest {
    merged: Option<IgnoredAny>,
}

/// Treats an explicit `null` the same as a missing field.
fn nullable<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Timestamps are optional and never fatal: anything that is not a
/// parseable string becomes `None`.
fn lenient_time<'de, D>(deserializer: D) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(|v| v.as_str()).and_then(parse_time))
}

fn parse_time(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .or_else(|_| DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S %z"))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

/// Repository ids arrive as numbers from Gitee but as strings from some
/// proxies. Both stringify the same way.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum RawId {
    Number(serde_json::Number),
    Text(String),
}

impl std::fmt::Display for RawId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RawId::Number(n) => write!(f, "{}", n),
            RawId::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawRepository {
    pub id: RawId,
    #[serde(default, deserialize_with = "nullable")]
    pub owner: RawOwner,
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub private: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub html_url: String,
    #[serde(default, deserialize_with = "nullable")]
    pub ssh_url: String,
    #[serde(default, deserialize_with = "nullable")]
    pub clone_url: String,
    #[serde(default, deserialize_with = "nullable")]
    pub default_branch: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct RawOwner {
    #[serde(default, deserialize_with = "nullable")]
    pub login: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct RawUser {
    #[serde(default, deserialize_with = "nullable")]
    pub login: String,
    #[serde(default, deserialize_with = "nullable")]
    pub username: String,
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub email: String,
    #[serde(default, deserialize_with = "nullable")]
    pub avatar_url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct RawBranch {
    #[serde(rename = "ref", default, deserialize_with = "nullable")]
    pub reference: String,
    #[serde(default, deserialize_with = "nullable")]
    pub sha: String,
    #[serde(default, deserialize_with = "nullable")]
    pub repo: RawForkRepository,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct RawForkRepository {
    #[serde(default, deserialize_with = "nullable")]
    pub full_name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct RawLabel {
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub color: String,
}

/// Push fields common to both layouts
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PushFields {
    #[serde(rename = "ref", default, deserialize_with = "nullable")]
    pub reference: String,
    #[serde(default, deserialize_with = "nullable")]
    pub base_ref: String,
    #[serde(default, deserialize_with = "nullable")]
    pub before: String,
    #[serde(default, deserialize_with = "nullable")]
    pub after: String,
    #[serde(default, deserialize_with = "nullable")]
    pub created: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub deleted: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub compare: String,
    pub repository: RawRepository,
    #[serde(default)]
    pub pusher: Option<RawUser>,
    #[serde(default)]
    pub sender: Option<RawUser>,
}

/// Pull request detail fields common to both layouts
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PullRequestFields {
    #[serde(default, deserialize_with = "nullable")]
    pub number: u64,
    #[serde(default, deserialize_with = "nullable")]
    pub title: String,
    #[serde(default, deserialize_with = "nullable")]
    pub body: String,
    #[serde(default, deserialize_with = "nullable")]
    pub state: String,
    #[serde(default, deserialize_with = "nullable")]
    pub html_url: String,
    #[serde(default, deserialize_with = "nullable")]
    pub diff_url: String,
    #[serde(default, deserialize_with = "nullable")]
    pub head: RawBranch,
    #[serde(default, deserialize_with = "nullable")]
    pub base: RawBranch,
    #[serde(default, deserialize_with = "nullable")]
    pub user: RawUser,
    #[serde(default, deserialize_with = "nullable")]
    pub labels: Vec<RawLabel>,
    #[serde(default, deserialize_with = "lenient_time")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_time")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Identity {
    pub name: String,
    pub email: String,
    /// Login handle; only the extended layout carries one
    pub username: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct CommitPayload {
    pub id: String,
    pub message: String,
    pub url: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub author: Identity,
    pub committer: Identity,
}

#[derive(Debug, Clone)]
pub(crate) struct PushPayload {
    pub fields: PushFields,
    /// `"branch"` or `"tag"` when the provider states it explicitly
    pub ref_type: Option<String>,
    pub head_commit: Option<CommitPayload>,
    pub commits: Vec<CommitPayload>,
}

#[derive(Debug, Clone)]
pub(crate) struct PullRequestPayload {
    pub action: String,
    pub action_desc: Option<String>,
    pub number: u64,
    pub pull_request: PullRequestFields,
    /// `None` when the layout has no merged flag
    pub merged: Option<bool>,
    pub repository: RawRepository,
    pub sender: RawUser,
}

/// Decodes a push-family payload with the given (resolved) layout.
pub(crate) fn decode_push(schema: PayloadSchema, data: &[u8]) -> Result<PushPayload> {
    let payload: PushPayload = match schema.resolve(data) {
        PayloadSchema::Extended => serde_json::from_slice::<extended::Push>(data)?.into(),
        _ => serde_json::from_slice::<basic::Push>(data)?.into(),
    };
    Ok(payload)
}

/// Decodes a merge request payload with the given (resolved) layout.
pub(crate) fn decode_pull_request(
    schema: PayloadSchema,
    data: &[u8],
) -> Result<PullRequestPayload> {
    let payload: PullRequestPayload = match schema.resolve(data) {
        PayloadSchema::Extended => {
            serde_json::from_slice::<extended::PullRequestHook>(data)?.into()
        }
        _ => serde_json::from_slice::<basic::PullRequestHook>(data)?.into(),
    };
    Ok(payload)
}

/// Layout without commit usernames or a merged flag
mod basic {
    use super::*;

    #[derive(Debug, Default, Deserialize)]
    pub struct Identity {
        #[serde(default, deserialize_with = "nullable")]
        pub name: String,
        #[serde(default, deserialize_with = "nullable")]
        pub email: String,
    }

    #[derive(Debug, Deserialize)]
    pub struct Commit {
        #[serde(default, deserialize_with = "nullable")]
        pub id: String,
        #[serde(default, deserialize_with = "nullable")]
        pub message: String,
        #[serde(default, deserialize_with = "nullable")]
        pub url: String,
        #[serde(default, deserialize_with = "lenient_time")]
        pub timestamp: Option<DateTime<Utc>>,
        #[serde(default, deserialize_with = "nullable")]
        pub author: Identity,
        #[serde(default, deserialize_with = "nullable")]
        pub committer: Identity,
    }

    #[derive(Debug, Deserialize)]
    pub struct Push {
        #[serde(flatten)]
        pub fields: PushFields,
        #[serde(default)]
        pub head_commit: Option<Commit>,
        #[serde(default, deserialize_with = "nullable")]
        pub commits: Vec<Commit>,
    }

    #[derive(Debug, Deserialize)]
    pub struct PullRequestHook {
        pub action: String,
        #[serde(default, deserialize_with = "nullable")]
        pub number: u64,
        pub pull_request: PullRequestFields,
        pub repository: RawRepository,
        #[serde(default, deserialize_with = "nullable")]
        pub sender: RawUser,
    }

    impl From<Identity> for super::Identity {
        fn from(src: Identity) -> Self {
            Self {
                name: src.name,
                email: src.email,
                username: None,
            }
        }
    }

    impl From<Commit> for CommitPayload {
        fn from(src: Commit) -> Self {
            Self {
                id: src.id,
                message: src.message,
                url: src.url,
                timestamp: src.timestamp,
                author: src.author.into(),
                committer: src.committer.into(),
            }
        }
    }

    impl From<Push> for PushPayload {
        fn from(src: Push) -> Self {
            Self {
                fields: src.fields,
                ref_type: None,
                head_commit: src.head_commit.map(Into::into),
                commits: src.commits.into_iter().map(Into::into).collect(),
            }
        }
    }

    impl From<PullRequestHook> for PullRequestPayload {
        fn from(src: PullRequestHook) -> Self {
            Self {
                action: src.action,
                action_desc: None,
                number: src.number,
                pull_request: src.pull_request,
                merged: None,
                repository: src.repository,
                sender: src.sender,
            }
        }
    }
}

/// Layout with `username`, `ref_type`, `action_desc` and `merged`
mod extended {
    use super::*;

    #[derive(Debug, Default, Deserialize)]
    pub struct Identity {
        #[serde(default, deserialize_with = "nullable")]
        pub name: String,
        #[serde(default, deserialize_with = "nullable")]
        pub email: String,
        #[serde(default)]
        pub username: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Commit {
        #[serde(default, deserialize_with = "nullable")]
        pub id: String,
        #[serde(default, deserialize_with = "nullable")]
        pub message: String,
        #[serde(default, deserialize_with = "nullable")]
        pub url: String,
        #[serde(default, deserialize_with = "lenient_time")]
        pub timestamp: Option<DateTime<Utc>>,
        #[serde(default, deserialize_with = "nullable")]
        pub author: Identity,
        #[serde(default, deserialize_with = "nullable")]
        pub committer: Identity,
    }

    #[derive(Debug, Deserialize)]
    pub struct Push {
        #[serde(flatten)]
        pub fields: PushFields,
        #[serde(default)]
        pub ref_type: Option<String>,
        #[serde(default)]
        pub head_commit: Option<Commit>,
        #[serde(default, deserialize_with = "nullable")]
        pub commits: Vec<Commit>,
    }

    #[derive(Debug, Deserialize)]
    pub struct PullRequest {
        #[serde(flatten)]
        pub fields: PullRequestFields,
        #[serde(default)]
        pub merged: Option<bool>,
    }

    #[derive(Debug, Deserialize)]
    pub struct PullRequestHook {
        pub action: String,
        #[serde(default)]
        pub action_desc: Option<String>,
        #[serde(default, deserialize_with = "nullable")]
        pub number: u64,
        pub pull_request: PullRequest,
        pub repository: RawRepository,
        #[serde(default, deserialize_with = "nullable")]
        pub sender: RawUser,
    }

    impl From<Identity> for super::Identity {
        fn from(src: Identity) -> Self {
            Self {
                name: src.name,
                email: src.email,
                username: src.username,
            }
        }
    }

    impl From<Commit> for CommitPayload {
        fn from(src: Commit) -> Self {
            Self {
                id: src.id,
                message: src.message,
                url: src.url,
                timestamp: src.timestamp,
                author: src.author.into(),
                committer: src.committer.into(),
            }
        }
    }

    impl From<Push> for PushPayload {
        fn from(src: Push) -> Self {
            Self {
                fields: src.fields,
                ref_type: src.ref_type,
                head_commit: src.head_commit.map(Into::into),
                commits: src.commits.into_iter().map(Into::into).collect(),
            }
        }
    }

    impl From<PullRequestHook> for PullRequestPayload {
        fn from(src: PullRequestHook) -> Self {
            Self {
                action: src.action,
                action_desc: src.action_desc,
                number: src.number,
                pull_request: src.pull_request.fields,
                merged: src.pull_request.merged,
                repository: src.repository,
                sender: src.sender,
            }
        }
    }
}
