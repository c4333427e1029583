use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use compact_str::CompactString;
use memchr::memmem;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::instrument;

use crate::{
    api::{self, ApiError, RevisionId, RevisionSource},
    highlight::highlight_changes,
    query::parse_timestamp,
};

#[derive(Debug, thiserror::Error)]
pub enum RevisionError {
    /// The operation needs an id that this revision does not carry.
    #[error("missing identifier: `{0}` is not set")]
    MissingIdentifier(&'static str),
    #[error("revision field `{0}` is not set")]
    MissingField(&'static str),
    #[error("unexpected `{action}` response from the MediaWiki API: missing `{key}`")]
    UnexpectedShape {
        action: &'static str,
        key: &'static str,
    },
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// The metadata of a single revision as returned by the API.
///
/// Every field is optional because the API omits what it does not know or is not allowed to show
/// (e.g. `user` of a suppressed revision). Fields serialize in the order they are declared, using
/// the API's key names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    #[serde(rename = "pageid")]
    pub page_id: Option<u64>,
    pub title: Option<CompactString>,
    #[serde(rename = "revid")]
    pub revision_id: Option<RevisionId>,
    #[serde(rename = "parentid")]
    pub parent_revision_id: Option<RevisionId>,
    #[serde(rename = "minor")]
    pub is_minor_edit: Option<bool>,
    pub user: Option<CompactString>,
    #[serde(rename = "userid")]
    pub user_id: Option<u64>,
    pub timestamp: Option<String>,
    #[serde(rename = "size")]
    pub size_bytes: Option<u64>,
    pub comment: Option<String>,
    pub tags: Option<Vec<String>>,
}

fn get_u64(payload: &Value, key: &str) -> Option<u64> {
    payload.get(key).and_then(Value::as_u64)
}

fn get_str<'a>(payload: &'a Value, key: &str) -> Option<&'a str> {
    payload.get(key).and_then(Value::as_str)
}

/// What `action=compare` produced for a revision.
enum Comparison {
    Diff(String),
    // comparison was not available, this is the rendered content instead
    Content(String),
}

impl Comparison {
    fn into_text(self) -> String {
        match self {
            Comparison::Diff(text) | Comparison::Content(text) => text,
        }
    }
}

impl Revision {
    /// Map one revision object of an API response. Unknown keys are ignored, missing or mistyped keys
    /// leave the field unset.
    pub fn from_payload(payload: &Value) -> Self {
        Self {
            page_id: get_u64(payload, "pageid"),
            title: get_str(payload, "title").map(CompactString::from),
            revision_id: get_u64(payload, "revid"),
            parent_revision_id: get_u64(payload, "parentid"),
            is_minor_edit: match payload.get("minor") {
                Some(Value::Bool(minor)) => Some(*minor),
                // formatversion=1 flags are present-but-empty strings
                Some(Value::String(_)) => Some(true),
                _ => None,
            },
            user: get_str(payload, "user").map(CompactString::from),
            user_id: get_u64(payload, "userid"),
            timestamp: get_str(payload, "timestamp").map(str::to_string),
            size_bytes: get_u64(payload, "size"),
            comment: get_str(payload, "comment").map(str::to_string),
            tags: payload.get("tags").and_then(Value::as_array).map(|tags| {
                tags.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            }),
        }
    }

    pub fn parsed_timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp.as_deref().and_then(parse_timestamp)
    }

    /// Whether every tag of `required` is among the tags of this revision.
    ///
    /// An empty `required` set matches any revision. A revision whose tags are unknown cannot satisfy
    /// a non-empty set, which is reported as [`RevisionError::MissingField`] so the caller decides.
    pub fn contains_all_tags(&self, required: &BTreeSet<String>) -> Result<bool, RevisionError> {
        if required.is_empty() {
            return Ok(true);
        }

        let tags = self
            .tags
            .as_ref()
            .ok_or(RevisionError::MissingField("tags"))?;
        Ok(required.iter().all(|tag| tags.contains(tag)))
    }

    /// Whether `keyword` occurs anywhere in the changes this revision made, including at the very start.
    ///
    /// The unhighlighted comparison markup is searched, so the highlight styles can't produce matches.
    pub fn contains_keyword<S: RevisionSource + ?Sized>(
        &self,
        source: &S,
        keyword: &str,
    ) -> Result<bool, RevisionError> {
        let text = self.fetch_comparison(source, None)?.into_text();
        Ok(memmem::find(text.as_bytes(), keyword.as_bytes()).is_some())
    }

    /// The rendered text of the page as of this revision, with line breaks removed.
    #[instrument(skip_all, fields(revid = self.revision_id))]
    pub fn fetch_content<S: RevisionSource + ?Sized>(
        &self,
        source: &S,
    ) -> Result<String, RevisionError> {
        let rev_id = self
            .revision_id
            .ok_or(RevisionError::MissingIdentifier("revid"))?;

        let payload = source.parse(rev_id)?;
        if let Some(error) = api::remote_error(&payload) {
            return Err(error.into());
        }

        let text = payload
            .get("parse")
            .and_then(|parse| parse.get("text"))
            // formatversion=2 has the markup directly, formatversion=1 wraps it in `*`
            .and_then(|text| text.as_str().or_else(|| get_str(text, "*")))
            .ok_or(RevisionError::UnexpectedShape {
                action: "parse",
                key: "parse.text",
            })?;

        Ok(text.replace('\n', ""))
    }

    /// The changes between this revision and `to_rev`, with inserted and deleted spans highlighted.
    ///
    /// Without `to_rev` this revision is compared against its parent, i.e. the result shows what this
    /// edit changed. With `to_rev` the comparison runs from this revision to `to_rev`.
    ///
    /// If the API does not deliver a comparison (e.g. the parent was deleted or this revision created
    /// the page), the rendered content of this revision is returned instead. Transport errors are not
    /// recovered.
    #[instrument(skip(self, source), fields(revid = self.revision_id))]
    pub fn fetch_diff<S: RevisionSource + ?Sized>(
        &self,
        source: &S,
        to_rev: Option<RevisionId>,
    ) -> Result<String, RevisionError> {
        match self.fetch_comparison(source, to_rev)? {
            Comparison::Diff(markup) => Ok(highlight_changes(&markup)),
            Comparison::Content(content) => Ok(content),
        }
    }

    fn fetch_comparison<S: RevisionSource + ?Sized>(
        &self,
        source: &S,
        to_rev: Option<RevisionId>,
    ) -> Result<Comparison, RevisionError> {
        let (from, to) = match to_rev {
            Some(to_rev) => {
                let rev_id = self
                    .revision_id
                    .ok_or(RevisionError::MissingIdentifier("revid"))?;
                (rev_id, to_rev)
            }
            None => {
                let parent_id = self
                    .parent_revision_id
                    .ok_or(RevisionError::MissingIdentifier("parentid"))?;
                let rev_id = self
                    .revision_id
                    .ok_or(RevisionError::MissingIdentifier("revid"))?;

                if parent_id == 0 {
                    // page creation, the whole content is the change
                    tracing::debug!(message = "Revision has no parent, using its content", rev_id);
                    return Ok(Comparison::Content(self.fetch_content(source)?));
                }
                (parent_id, rev_id)
            }
        };

        let payload = source.compare(from, to)?;
        let body = payload
            .get("compare")
            .and_then(|compare| get_str(compare, "body").or_else(|| get_str(compare, "*")));

        match body {
            Some(body) => Ok(Comparison::Diff(body.to_string())),
            None => {
                tracing::warn!(
                    message = "Comparison unavailable, falling back to revision content",
                    from,
                    to,
                    error = ?api::remote_error(&payload)
                );
                Ok(Comparison::Content(self.fetch_content(source)?))
            }
        }
    }
}
