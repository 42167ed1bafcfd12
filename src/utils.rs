use hmac::{Hmac, Mac};
use sha2::Sha256;
type HmacSha256 = Hmac<Sha256>;

const BRANCH_PREFIX: &str = "refs/heads/";
const TAG_PREFIX: &str = "refs/tags/";

/// Compares a shared webhook token with the expected secret.
///
/// The provider sends the secret itself, not a digest of the payload.
/// Both values are run through HMAC-SHA256 under the secret so the final
/// comparison happens on equal-length tags via `verify_slice`, which is
/// constant-time.
pub fn verify_token(secret: &str, token: &str) -> bool {
    let Ok(mut expected) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    expected.update(secret.as_bytes());
    let expected = expected.finalize().into_bytes();

    let Ok(mut received) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    received.update(token.as_bytes());
    received.verify_slice(&expected).is_ok()
}

/// Strips a leading `refs/heads/` or `refs/tags/` from a git reference.
pub fn trim_ref(reference: &str) -> &str {
    reference
        .strip_prefix(BRANCH_PREFIX)
        .or_else(|| reference.strip_prefix(TAG_PREFIX))
        .unwrap_or(reference)
}

/// Returns true if the reference points at a tag.
pub fn is_tag(reference: &str) -> bool {
    reference.starts_with(TAG_PREFIX)
}

/// Returns true if the reference points at a branch.
pub fn is_branch(reference: &str) -> bool {
    reference.starts_with(BRANCH_PREFIX)
}

/// Git reference of a pull request's head commit.
pub fn expand_pull_ref(number: u64) -> String {
    format!("refs/pull/{}/head", number)
}
