//! Role-set authorization.

use std::collections::BTreeSet;

/// Decide whether `granted` satisfies `required`.
///
/// Grants when the two sets intersect. An empty `required` set means
/// "authenticated only": any caller holding at least one role is granted,
/// an anonymous caller (no roles) is not.
pub fn authorize(granted: &BTreeSet<String>, required: &BTreeSet<String>) -> bool {
    if required.is_empty() {
        return !granted.is_empty();
    }
    !granted.is_disjoint(required)
}

/// Normalize a list of role names into a set, dropping blanks.
pub fn role_set<I, S>(roles: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    roles
        .into_iter()
        .map(|r| r.as_ref().trim().to_string())
        .filter(|r| !r.is_empty())
        .collect()
}
