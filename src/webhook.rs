//! Normalized webhook structures
//!
//! Every provider decoder produces one of these values. Nothing here knows
//! about a provider's wire format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A normalized webhook delivery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Webhook {
    Push(PushHook),
    Branch(BranchHook),
    Tag(TagHook),
    PullRequest(PullRequestHook),
}

/// Discriminant of a [`Webhook`], handy for logging and matching without
/// borrowing the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookKind {
    Push,
    Branch,
    Tag,
    PullRequest,
}

impl std::fmt::Display for HookKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HookKind::Push => "push",
            HookKind::Branch => "branch",
            HookKind::Tag => "tag",
            HookKind::PullRequest => "pull_request",
        };
        f.write_str(s)
    }
}

impl Webhook {
    pub fn kind(&self) -> HookKind {
        match self {
            Webhook::Push(_) => HookKind::Push,
            Webhook::Branch(_) => HookKind::Branch,
            Webhook::Tag(_) => HookKind::Tag,
            Webhook::PullRequest(_) => HookKind::PullRequest,
        }
    }

    /// Repository the delivery belongs to. Secret resolvers key on this.
    pub fn repository(&self) -> &Repository {
        match self {
            Webhook::Push(h) => &h.repo,
            Webhook::Branch(h) => &h.repo,
            Webhook::Tag(h) => &h.repo,
            Webhook::PullRequest(h) => &h.repo,
        }
    }

    pub fn sender(&self) -> &User {
        match self {
            Webhook::Push(h) => &h.sender,
            Webhook::Branch(h) => &h.sender,
            Webhook::Tag(h) => &h.sender,
            Webhook::PullRequest(h) => &h.sender,
        }
    }
}

/// Action performed on a reference or pull request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Delete,
    Update,
    Open,
    Reopen,
    Close,
    Label,
    Unlabel,
    Merge,
    Sync,
    #[default]
    Unknown,
}

impl From<&str> for Action {
    /// Maps a provider action string onto the shared enum. Both the
    /// imperative and the past-tense spellings are accepted; anything else
    /// is [`Action::Unknown`].
    fn from(s: &str) -> Self {
        match s {
            "create" | "created" => Action::Create,
            "delete" | "deleted" => Action::Delete,
            "update" | "updated" | "edit" | "edited" => Action::Update,
            "open" | "opened" => Action::Open,
            "reopen" | "reopened" => Action::Reopen,
            "close" | "closed" => Action::Close,
            "label" | "labeled" => Action::Label,
            "unlabel" | "unlabeled" => Action::Unlabel,
            "merge" | "merged" => Action::Merge,
            "synchronize" | "synchronized" => Action::Sync,
            _ => Action::Unknown,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub id: String,
    pub namespace: String,
    pub name: String,
    /// Default branch
    pub branch: String,
    pub private: bool,
    pub clone: String,
    pub clone_ssh: String,
    pub link: String,
}

impl Repository {
    /// `namespace/name`
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub login: String,
    pub name: String,
    pub email: String,
    pub avatar: String,
}

/// Commit author or committer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub login: String,
    pub name: String,
    pub email: String,
    /// Zero time (`DateTime::default()`) when the provider did not send one.
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub sha: String,
    pub message: String,
    pub link: String,
    pub author: Signature,
    pub committer: Signature,
}

/// A branch or tag. `name` never carries a `refs/heads/` or `refs/tags/`
/// prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub name: String,
    pub path: String,
    pub sha: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
    pub color: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub body: String,
    /// Head commit
    pub sha: String,
    /// `refs/pull/{number}/head`
    #[serde(rename = "ref")]
    pub reference: String,
    pub source: String,
    pub target: String,
    pub fork: String,
    pub link: String,
    pub diff: String,
    pub closed: bool,
    pub merged: bool,
    pub author: User,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub labels: Vec<Label>,
}

/// A push of one or more commits. `reference` keeps the raw `refs/...`
/// form so consumers can tell a branch push from a tag push.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushHook {
    #[serde(rename = "ref")]
    pub reference: String,
    pub base_ref: String,
    pub before: String,
    pub after: String,
    pub commit: Commit,
    pub commits: Vec<Commit>,
    pub repo: Repository,
    pub sender: User,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchHook {
    pub action: Action,
    #[serde(rename = "ref")]
    pub reference: Reference,
    pub repo: Repository,
    pub sender: User,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagHook {
    pub action: Action,
    #[serde(rename = "ref")]
    pub reference: Reference,
    pub repo: Repository,
    pub sender: User,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestHook {
    pub action: Action,
    pub repo: Repository,
    pub pull_request: PullRequest,
    pub sender: User,
}
