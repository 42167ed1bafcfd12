//! Decoded Gitee payloads to normalized webhooks

use tracing::debug;

use super::payload::{
    CommitPayload, Identity, PullRequestFields, PullRequestPayload, PushPayload, RawBranch,
    RawRepository, RawUser,
};
use crate::utils::{expand_pull_ref, is_branch, is_tag, trim_ref};
use crate::webhook::{
    Action, BranchHook, Commit, Label, PullRequest, PullRequestHook, PushHook, Reference,
    Repository, Signature, TagHook, User, Webhook,
};

/// Merge request actions that describe review workflow rather than a change
/// to the request. `merge_via_push` is sent when a merge happens through a
/// plain push to the target branch; the push event covers it.
const NOOP_PULL_REQUEST_ACTIONS: &[&str] =
    &["assign", "test", "tested", "approved", "merge_via_push"];

/// Gitee reports new commits on the source branch as an `update` with this
/// description.
const SOURCE_BRANCH_CHANGED: &str = "source_branch_changed";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RefKind {
    Branch,
    Tag,
}

/// Maps a push-family payload. `ref_event` is set when the delivery came in
/// on the tag/ref event type, which always yields a branch or tag hook.
pub(crate) fn convert_push_family(src: PushPayload, ref_event: bool) -> Webhook {
    if !(ref_event || src.fields.created || src.fields.deleted) {
        return Webhook::Push(convert_push_hook(src));
    }
    let fallback = if ref_event { RefKind::Tag } else { RefKind::Branch };
    match ref_kind(&src, fallback) {
        RefKind::Branch => Webhook::Branch(convert_branch_hook(src)),
        RefKind::Tag => Webhook::Tag(convert_tag_hook(src)),
    }
}

/// An explicit `ref_type` wins, then the reference prefix, then whatever the
/// event type implies.
fn ref_kind(src: &PushPayload, fallback: RefKind) -> RefKind {
    match src.ref_type.as_deref() {
        Some("tag") => return RefKind::Tag,
        Some("branch") => return RefKind::Branch,
        _ => {}
    }
    let reference = src.fields.reference.as_str();
    if is_tag(reference) {
        RefKind::Tag
    } else if is_branch(reference) {
        RefKind::Branch
    } else {
        fallback
    }
}

pub(crate) fn convert_push_hook(src: PushPayload) -> PushHook {
    let fields = src.fields;
    let head = src.head_commit.unwrap_or_default();
    let link = if fields.compare.is_empty() {
        head.url.clone()
    } else {
        fields.compare.clone()
    };
    let mut dst = PushHook {
        reference: fields.reference,
        base_ref: fields.base_ref,
        before: fields.before,
        after: fields.after.clone(),
        commit: Commit {
            sha: fields.after,
            message: head.message.clone(),
            link,
            author: convert_signature(&head.author, &head),
            committer: convert_signature(&head.committer, &head),
        },
        commits: src.commits.into_iter().map(convert_commit).collect(),
        repo: convert_repository(fields.repository),
        sender: convert_sender(fields.sender, fields.pusher),
    };

    // Tag pushes carry the tag object in `after`; consumers want the commit.
    if is_tag(&dst.reference) && !head.id.is_empty() && head.id != dst.after {
        debug!(
            "Tag push '{}': using head commit {} instead of {}",
            dst.reference, head.id, dst.after
        );
        dst.commit.sha = head.id.clone();
        dst.after = head.id;
    }
    dst
}

pub(crate) fn convert_branch_hook(src: PushPayload) -> BranchHook {
    let (action, reference) = convert_reference(&src, RefKind::Branch);
    let fields = src.fields;
    BranchHook {
        action,
        reference,
        repo: convert_repository(fields.repository),
        sender: convert_sender(fields.sender, fields.pusher),
    }
}

pub(crate) fn convert_tag_hook(src: PushPayload) -> TagHook {
    let (action, reference) = convert_reference(&src, RefKind::Tag);
    let fields = src.fields;
    TagHook {
        action,
        reference,
        repo: convert_repository(fields.repository),
        sender: convert_sender(fields.sender, fields.pusher),
    }
}

/// Action and prefix-free reference for a created or deleted ref.
fn convert_reference(src: &PushPayload, kind: RefKind) -> (Action, Reference) {
    let fields = &src.fields;
    let action = if fields.created {
        Action::Create
    } else if fields.deleted {
        Action::Delete
    } else {
        Action::Unknown
    };

    let name = trim_ref(&fields.reference).to_string();
    let path = if fields.reference.starts_with("refs/") {
        fields.reference.clone()
    } else {
        match kind {
            RefKind::Branch => format!("refs/heads/{}", name),
            RefKind::Tag => format!("refs/tags/{}", name),
        }
    };

    let head_id = src
        .head_commit
        .as_ref()
        .map(|c| c.id.as_str())
        .filter(|id| !id.is_empty());
    let sha = match (action, kind, head_id) {
        (Action::Delete, _, _) => fields.before.clone(),
        (_, RefKind::Tag, Some(id)) => id.to_string(),
        _ => fields.after.clone(),
    };

    (action, Reference { name, path, sha })
}

pub(crate) fn convert_pull_request_hook(src: PullRequestPayload) -> Option<PullRequestHook> {
    let action = convert_action(&src)?;
    Some(PullRequestHook {
        action,
        repo: convert_repository(src.repository),
        pull_request: convert_pull_request(src.number, src.pull_request, src.merged),
        sender: convert_user(src.sender),
    })
}

/// `None` for review-workflow actions that carry nothing actionable.
fn convert_action(src: &PullRequestPayload) -> Option<Action> {
    let raw = src.action.as_str();
    if NOOP_PULL_REQUEST_ACTIONS.contains(&raw) {
        debug!("Ignoring merge request action '{}'", raw);
        return None;
    }
    let action = match Action::from(raw) {
        // Layouts without a merged flag always report Close here.
        Action::Close if src.merged == Some(true) => Action::Merge,
        Action::Update if src.action_desc.as_deref() == Some(SOURCE_BRANCH_CHANGED) => Action::Sync,
        action => action,
    };
    Some(action)
}

fn convert_pull_request(
    hook_number: u64,
    src: PullRequestFields,
    merged: Option<bool>,
) -> PullRequest {
    let number = if src.number != 0 { src.number } else { hook_number };
    let merged = merged.unwrap_or(src.state == "merged");
    PullRequest {
        number,
        title: src.title,
        body: src.body,
        sha: src.head.sha.clone(),
        reference: expand_pull_ref(number),
        source: src.head.reference.clone(),
        target: src.base.reference.clone(),
        fork: fork_name(&src.head),
        link: src.html_url,
        diff: src.diff_url,
        closed: merged || src.state == "closed",
        merged,
        author: convert_user(src.user),
        created: src.created_at.unwrap_or_default(),
        updated: src.updated_at.unwrap_or_default(),
        labels: src
            .labels
            .into_iter()
            .map(|l| Label {
                name: l.name,
                color: l.color,
            })
            .collect(),
    }
}

fn fork_name(head: &RawBranch) -> String {
    head.repo.full_name.clone()
}

fn convert_commit(src: CommitPayload) -> Commit {
    Commit {
        author: convert_signature(&src.author, &src),
        committer: convert_signature(&src.committer, &src),
        sha: src.id,
        message: src.message,
        link: src.url,
    }
}

/// The login falls back to the display name when the layout has no
/// distinct username.
fn convert_signature(identity: &Identity, commit: &CommitPayload) -> Signature {
    let login = identity
        .username
        .as_deref()
        .filter(|u| !u.is_empty())
        .unwrap_or(&identity.name)
        .to_string();
    Signature {
        login,
        name: identity.name.clone(),
        email: identity.email.clone(),
        date: commit.timestamp.unwrap_or_default(),
    }
}

fn convert_repository(src: RawRepository) -> Repository {
    Repository {
        id: src.id.to_string(),
        namespace: src.owner.login,
        name: src.name,
        branch: src.default_branch,
        private: src.private,
        clone: src.clone_url,
        clone_ssh: src.ssh_url,
        link: src.html_url,
    }
}

fn convert_sender(sender: Option<RawUser>, pusher: Option<RawUser>) -> User {
    sender.or(pusher).map(convert_user).unwrap_or_default()
}

fn convert_user(src: RawUser) -> User {
    let login = if src.login.is_empty() {
        src.username
    } else {
        src.login
    };
    User {
        login,
        name: src.name,
        email: src.email,
        avatar: src.avatar_url,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gitee::payload::{PayloadSchema, decode_pull_request, decode_push};

    fn push(schema: PayloadSchema, json: &str) -> PushPayload {
        decode_push(schema, json.as_bytes()).unwrap()
    }

    fn pull_request(schema: PayloadSchema, json: &str) -> PullRequestPayload {
        decode_pull_request(schema, json.as_bytes()).unwrap()
    }

    #[test]
    fn plain_push_keeps_prefixed_ref() {
        let src = push(
            PayloadSchema::Auto,
            r#"{
                "ref": "refs/heads/master",
                "before": "aaa",
                "after": "bbb",
                "compare": "https://gitee.com/o/r/compare/aaa...bbb",
                "head_commit": { "id": "bbb", "message": "fix" },
                "repository": { "id": 9 }
            }"#,
        );
        match convert_push_family(src, false) {
            Webhook::Push(hook) => {
                assert_eq!(hook.reference, "refs/heads/master");
                assert_eq!(hook.after, "bbb");
                assert_eq!(hook.commit.sha, "bbb");
                assert_eq!(hook.commit.message, "fix");
                assert_eq!(hook.commit.link, "https://gitee.com/o/r/compare/aaa...bbb");
                assert_eq!(hook.repo.id, "9");
            }
            other => panic!("expected push hook, got {:?}", other.kind()),
        }
    }

    #[test]
    fn created_flag_yields_branch_hook() {
        let src = push(
            PayloadSchema::Auto,
            r#"{ "ref": "refs/heads/feature-x", "created": true, "after": "ccc", "repository": { "id": 1 } }"#,
        );
        match convert_push_family(src, false) {
            Webhook::Branch(hook) => {
                assert_eq!(hook.action, Action::Create);
                assert_eq!(hook.reference.name, "feature-x");
                assert_eq!(hook.reference.path, "refs/heads/feature-x");
                assert_eq!(hook.reference.sha, "ccc");
            }
            other => panic!("expected branch hook, got {:?}", other.kind()),
        }
    }

    #[test]
    fn deleted_tag_on_push_event_is_a_tag_hook() {
        let src = push(
            PayloadSchema::Auto,
            r#"{ "ref": "refs/tags/v1.0", "deleted": true, "before": "ddd", "after": "0000000000000000000000000000000000000000", "repository": { "id": 1 } }"#,
        );
        match convert_push_family(src, false) {
            Webhook::Tag(hook) => {
                assert_eq!(hook.action, Action::Delete);
                assert_eq!(hook.reference.name, "v1.0");
                assert_eq!(hook.reference.sha, "ddd");
            }
            other => panic!("expected tag hook, got {:?}", other.kind()),
        }
    }

    #[test]
    fn explicit_ref_type_beats_event_type() {
        let src = push(
            PayloadSchema::Extended,
            r#"{ "ref": "release", "ref_type": "branch", "created": true, "repository": { "id": 1 } }"#,
        );
        match convert_push_family(src, true) {
            Webhook::Branch(hook) => {
                assert_eq!(hook.reference.name, "release");
                assert_eq!(hook.reference.path, "refs/heads/release");
            }
            other => panic!("expected branch hook, got {:?}", other.kind()),
        }
    }

    #[test]
    fn unprefixed_ref_follows_event_type() {
        let src = push(
            PayloadSchema::Basic,
            r#"{ "ref": "v2.0", "created": true, "repository": { "id": 1 } }"#,
        );
        assert!(matches!(convert_push_family(src.clone(), true), Webhook::Tag(_)));
        assert!(matches!(convert_push_family(src, false), Webhook::Branch(_)));
    }

    #[test]
    fn ref_event_without_flags_has_unknown_action() {
        let src = push(
            PayloadSchema::Basic,
            r#"{ "ref": "refs/tags/v3", "repository": { "id": 1 } }"#,
        );
        match convert_push_family(src, true) {
            Webhook::Tag(hook) => assert_eq!(hook.action, Action::Unknown),
            other => panic!("expected tag hook, got {:?}", other.kind()),
        }
    }

    #[test]
    fn tag_push_prefers_head_commit_id() {
        let src = push(
            PayloadSchema::Basic,
            r#"{
                "ref": "refs/tags/v1.0",
                "after": "tagobject",
                "head_commit": { "id": "commitsha" },
                "repository": { "id": 1 }
            }"#,
        );
        let hook = convert_push_hook(src);
        assert_eq!(hook.after, "commitsha");
        assert_eq!(hook.commit.sha, "commitsha");
    }

    #[test]
    fn branch_push_ignores_head_commit_id() {
        let src = push(
            PayloadSchema::Basic,
            r#"{
                "ref": "refs/heads/master",
                "after": "aftersha",
                "head_commit": { "id": "othersha" },
                "repository": { "id": 1 }
            }"#,
        );
        let hook = convert_push_hook(src);
        assert_eq!(hook.after, "aftersha");
        assert_eq!(hook.commit.sha, "aftersha");
    }

    #[test]
    fn signature_login_uses_username_then_name() {
        let commit = r#"{
            "ref": "refs/heads/master",
            "commits": [{
                "id": "a",
                "timestamp": "2018-12-04T14:29:42+08:00",
                "author": { "name": "Jane Doe", "email": "jane@x.io", "username": "jdoe" },
                "committer": { "name": "Gitee", "email": "noreply@gitee.com", "username": "" }
            }],
            "repository": { "id": 1 }
        }"#;

        let extended = convert_push_hook(push(PayloadSchema::Extended, commit));
        assert_eq!(extended.commits[0].author.login, "jdoe");
        assert_eq!(extended.commits[0].author.name, "Jane Doe");
        assert_eq!(extended.commits[0].committer.login, "Gitee");

        let basic = convert_push_hook(push(PayloadSchema::Basic, commit));
        assert_eq!(basic.commits[0].author.login, "Jane Doe");
        assert_eq!(
            basic.commits[0].author.date,
            extended.commits[0].author.date
        );
    }

    #[test]
    fn committer_username_selects_login_under_auto() {
        let commit = r#"{
            "ref": "refs/heads/master",
            "commits": [{
                "id": "a",
                "author": { "name": "Jane Doe", "email": "jane@x.io" },
                "committer": { "name": "Jane Doe", "email": "jane@x.io", "username": "jdoe" }
            }],
            "repository": { "id": 1 }
        }"#;

        let hook = convert_push_hook(push(PayloadSchema::Auto, commit));
        assert_eq!(hook.commits[0].committer.login, "jdoe");
        assert_eq!(hook.commits[0].author.login, "Jane Doe");
    }

    #[test]
    fn missing_timestamp_is_zero_time() {
        let hook = convert_push_hook(push(
            PayloadSchema::Basic,
            r#"{ "ref": "refs/heads/master", "commits": [{ "id": "a" }], "repository": { "id": 1 } }"#,
        ));
        assert_eq!(hook.commits[0].author.date, chrono::DateTime::<chrono::Utc>::default());
        assert_eq!(hook.commit.author.date, chrono::DateTime::<chrono::Utc>::default());
    }

    #[test]
    fn sender_falls_back_to_pusher() {
        let hook = convert_push_hook(push(
            PayloadSchema::Basic,
            r#"{ "ref": "refs/heads/master", "pusher": { "name": "Jane", "username": "jane" }, "repository": { "id": 1 } }"#,
        ));
        assert_eq!(hook.sender.login, "jane");
        assert_eq!(hook.sender.name, "Jane");
    }

    #[test]
    fn commits_keep_provider_order() {
        let hook = convert_push_hook(push(
            PayloadSchema::Basic,
            r#"{ "ref": "refs/heads/master", "commits": [{ "id": "1" }, { "id": "2" }, { "id": "3" }], "repository": { "id": 1 } }"#,
        ));
        let shas: Vec<_> = hook.commits.iter().map(|c| c.sha.as_str()).collect();
        assert_eq!(shas, ["1", "2", "3"]);
    }

    const PR: &str = r#"{
        "action": "{action}",
        "number": 7,
        "pull_request": {
            "number": 7,
            "title": "Add feature",
            "state": "{state}",
            "head": { "ref": "feature", "sha": "headsha", "repo": { "full_name": "fork/repo" } },
            "base": { "ref": "master", "sha": "basesha" },
            "user": { "login": "jane" },
            "labels": [{ "name": "bug", "color": "d73a4a" }]
            {merged}
        },
        "repository": { "id": 1, "owner": { "login": "octocat" }, "name": "repo" },
        "sender": { "login": "jane" }
    }"#;

    fn pr_json(action: &str, state: &str, merged: Option<bool>) -> String {
        let merged = merged
            .map(|m| format!(r#", "merged": {}"#, m))
            .unwrap_or_default();
        PR.replace("{action}", action)
            .replace("{state}", state)
            .replace("{merged}", &merged)
    }

    #[test]
    fn pull_request_fields_are_mapped() {
        let hook = convert_pull_request_hook(pull_request(
            PayloadSchema::Auto,
            &pr_json("open", "open", None),
        ))
        .unwrap();
        assert_eq!(hook.action, Action::Open);
        let pr = hook.pull_request;
        assert_eq!(pr.number, 7);
        assert_eq!(pr.reference, "refs/pull/7/head");
        assert_eq!(pr.source, "feature");
        assert_eq!(pr.target, "master");
        assert_eq!(pr.sha, "headsha");
        assert_eq!(pr.fork, "fork/repo");
        assert!(!pr.closed);
        assert!(!pr.merged);
        assert_eq!(pr.labels[0].name, "bug");
        assert_eq!(hook.repo.namespace, "octocat");
    }

    #[test]
    fn noop_actions_produce_nothing() {
        for action in ["assign", "test", "tested", "approved", "merge_via_push"] {
            let src = pull_request(PayloadSchema::Auto, &pr_json(action, "open", None));
            assert!(convert_pull_request_hook(src).is_none(), "{}", action);
        }
    }

    #[test]
    fn close_with_merged_flag_is_merge() {
        let src = pull_request(PayloadSchema::Auto, &pr_json("close", "merged", Some(true)));
        let hook = convert_pull_request_hook(src).unwrap();
        assert_eq!(hook.action, Action::Merge);
        assert!(hook.pull_request.merged);
        assert!(hook.pull_request.closed);

        let src = pull_request(PayloadSchema::Auto, &pr_json("closed", "closed", Some(false)));
        assert_eq!(convert_pull_request_hook(src).unwrap().action, Action::Close);
    }

    #[test]
    fn basic_layout_always_reports_close() {
        let src = pull_request(PayloadSchema::Basic, &pr_json("close", "merged", Some(true)));
        let hook = convert_pull_request_hook(src).unwrap();
        assert_eq!(hook.action, Action::Close);
        // The detail still reflects the state field.
        assert!(hook.pull_request.merged);
    }

    #[test]
    fn source_branch_update_is_sync() {
        let json = pr_json("update", "open", None).replacen(
            r#""number": 7,"#,
            r#""number": 7, "action_desc": "source_branch_changed","#,
            1,
        );
        let hook = convert_pull_request_hook(pull_request(PayloadSchema::Auto, &json)).unwrap();
        assert_eq!(hook.action, Action::Sync);

        let hook = convert_pull_request_hook(pull_request(
            PayloadSchema::Auto,
            &pr_json("update", "open", None),
        ))
        .unwrap();
        assert_eq!(hook.action, Action::Update);
    }

    #[test]
    fn unrecognized_action_is_unknown() {
        let src = pull_request(PayloadSchema::Auto, &pr_json("frobnicate", "open", None));
        assert_eq!(convert_pull_request_hook(src).unwrap().action, Action::Unknown);
    }
}
