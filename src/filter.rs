//! Client side filters of a revision history.
//!
//! All filters consume the revision list and return the revisions they keep, in their original order.

use std::collections::BTreeSet;

use crate::{
    api::RevisionSource,
    query::QuerySpec,
    revision::{Revision, RevisionError},
};

/// Apply the tag filter and then the keyword filter of `spec`, each only if it is active.
///
/// The tag filter is local while the keyword filter needs one comparison per revision, so the order
/// keeps the number of API calls down.
pub fn apply<S: RevisionSource + ?Sized>(
    revisions: Vec<Revision>,
    spec: &QuerySpec,
    source: &S,
) -> Result<Vec<Revision>, RevisionError> {
    let revisions = if spec.tags.is_empty() {
        revisions
    } else {
        by_tags(revisions, &spec.tags)?
    };

    match &spec.keyword {
        Some(keyword) => by_keyword(revisions, keyword, source),
        None => Ok(revisions),
    }
}

/// Keep revisions that carry every tag in `tags`.
///
/// Revisions without tag information are dropped with a warning, unless the `strict` feature is
/// enabled, in which case they abort the filter.
pub fn by_tags(
    revisions: Vec<Revision>,
    tags: &BTreeSet<String>,
) -> Result<Vec<Revision>, RevisionError> {
    let mut kept = Vec::with_capacity(revisions.len());

    for revision in revisions {
        match revision.contains_all_tags(tags) {
            Ok(true) => kept.push(revision),
            Ok(false) => {}
            Err(RevisionError::MissingField(field)) if !cfg!(feature = "strict") => {
                tracing::warn!(
                    message = "Revision without tag information, excluding it",
                    revid = revision.revision_id,
                    field
                );
            }
            Err(e) => return Err(e),
        }
    }

    Ok(kept)
}

/// Keep revisions whose changes contain `keyword`.
///
/// Any failure aborts the whole filter, a revision that could not be checked is never treated as
/// not matching.
pub fn by_keyword<S: RevisionSource + ?Sized>(
    revisions: Vec<Revision>,
    keyword: &str,
    source: &S,
) -> Result<Vec<Revision>, RevisionError> {
    let candidates = revisions.len();
    let mut kept = Vec::with_capacity(candidates);

    for revision in revisions {
        if revision.contains_keyword(source, keyword)? {
            kept.push(revision);
        }
    }

    tracing::debug!(
        message = "Filtered revisions by keyword",
        keyword,
        candidates,
        kept = kept.len()
    );
    Ok(kept)
}

/// Keep revisions of the page `title`. Underscores and spaces are treated the same, like the API does.
pub fn by_title(revisions: Vec<Revision>, title: &str) -> Vec<Revision> {
    let wanted = normalize_title(title);
    revisions
        .into_iter()
        .filter(|revision| {
            revision
                .title
                .as_deref()
                .is_some_and(|title| normalize_title(title) == wanted)
        })
        .collect()
}

fn normalize_title(title: &str) -> String {
    title.trim().replace('_', " ")
}
