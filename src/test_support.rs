//! Fixtures shared by the unit tests: a scripted stand-in for the MediaWiki API and payload builders.

use std::{
    cell::RefCell,
    collections::{HashMap, HashSet, VecDeque},
};

use serde_json::{json, Value};

use crate::api::{ApiError, RevisionId, RevisionSource};

pub mod prelude {
    pub(crate) use super::strategies as proptest_support;
    pub(crate) use super::{
        article_response, revision_payload, user_contrib_payload, user_response, Call, FakeSource,
    };
    pub(crate) use proptest::prelude::*;
    pub(crate) use serde_json::json;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Query(Vec<(&'static str, String)>),
    Compare(RevisionId, RevisionId),
    Parse(RevisionId),
}

/// Answers from canned payloads and records every call made against it.
///
/// Query responses are served in the order they were added. Comparisons and content that were not
/// registered are answered with the API's `nosuchrevid` error object.
#[derive(Debug, Default)]
pub struct FakeSource {
    query_responses: RefCell<VecDeque<Value>>,
    compares: HashMap<(RevisionId, RevisionId), Value>,
    contents: HashMap<RevisionId, Value>,
    failing: HashSet<RevisionId>,
    calls: RefCell<Vec<Call>>,
}

fn no_such_revision(rev_id: RevisionId) -> Value {
    json!({
        "error": {
            "code": "nosuchrevid",
            "info": format!("There is no revision with ID {rev_id}."),
        }
    })
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_query(self, response: Value) -> Self {
        self.query_responses.borrow_mut().push_back(response);
        self
    }

    pub fn with_compare(mut self, from_rev: RevisionId, to_rev: RevisionId, body: &str) -> Self {
        self.compares.insert(
            (from_rev, to_rev),
            json!({ "compare": { "fromrevid": from_rev, "torevid": to_rev, "body": body } }),
        );
        self
    }

    pub fn with_compare_payload(
        mut self,
        from_rev: RevisionId,
        to_rev: RevisionId,
        payload: Value,
    ) -> Self {
        self.compares.insert((from_rev, to_rev), payload);
        self
    }

    pub fn with_content(mut self, rev_id: RevisionId, html: &str) -> Self {
        self.contents.insert(
            rev_id,
            json!({ "parse": { "title": "Test", "pageid": 20, "revid": rev_id, "text": html } }),
        );
        self
    }

    pub fn with_content_payload(mut self, rev_id: RevisionId, payload: Value) -> Self {
        self.contents.insert(rev_id, payload);
        self
    }

    /// Every call involving this revision fails like a dropped connection would.
    pub fn with_failure(mut self, rev_id: RevisionId) -> Self {
        self.failing.insert(rev_id);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn compare_calls(&self) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|call| matches!(call, Call::Compare(..)))
            .count()
    }

    pub fn parse_calls(&self) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|call| matches!(call, Call::Parse(_)))
            .count()
    }

    pub fn query_calls(&self) -> Vec<Vec<(&'static str, String)>> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|call| match call {
                Call::Query(params) => Some(params.clone()),
                _ => None,
            })
            .collect()
    }
}

impl RevisionSource for FakeSource {
    fn query(&self, params: &[(&'static str, String)]) -> Result<Value, ApiError> {
        self.calls.borrow_mut().push(Call::Query(params.to_vec()));
        Ok(self
            .query_responses
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| json!({ "batchcomplete": true })))
    }

    fn compare(&self, from_rev: RevisionId, to_rev: RevisionId) -> Result<Value, ApiError> {
        self.calls.borrow_mut().push(Call::Compare(from_rev, to_rev));
        if self.failing.contains(&from_rev) || self.failing.contains(&to_rev) {
            return Err(ApiError::Status(reqwest::StatusCode::BAD_GATEWAY));
        }
        Ok(self
            .compares
            .get(&(from_rev, to_rev))
            .cloned()
            .unwrap_or_else(|| no_such_revision(from_rev)))
    }

    fn parse(&self, rev_id: RevisionId) -> Result<Value, ApiError> {
        self.calls.borrow_mut().push(Call::Parse(rev_id));
        if self.failing.contains(&rev_id) {
            return Err(ApiError::Status(reqwest::StatusCode::BAD_GATEWAY));
        }
        Ok(self
            .contents
            .get(&rev_id)
            .cloned()
            .unwrap_or_else(|| no_such_revision(rev_id)))
    }
}

/// One entry of `prop=revisions`, shaped like `formatversion=2` output.
pub fn revision_payload(
    rev_id: RevisionId,
    parent_id: RevisionId,
    timestamp: &str,
    tags: &[&str],
) -> Value {
    json!({
        "revid": rev_id,
        "parentid": parent_id,
        "minor": false,
        "user": "Rio65trio",
        "userid": 4_511_234,
        "timestamp": timestamp,
        "size": 1000 + rev_id,
        "comment": format!("edit {rev_id}"),
        "tags": tags,
    })
}

/// One entry of `list=usercontribs`.
pub fn user_contrib_payload(
    rev_id: RevisionId,
    parent_id: RevisionId,
    title: &str,
    timestamp: &str,
    tags: &[&str],
) -> Value {
    json!({
        "userid": 24,
        "user": "Jimbo Wales",
        "pageid": 500 + rev_id,
        "revid": rev_id,
        "parentid": parent_id,
        "ns": 0,
        "title": title,
        "timestamp": timestamp,
        "minor": true,
        "comment": "",
        "size": 42,
        "tags": tags,
    })
}

pub fn article_response(page_id: u64, title: &str, revisions: Vec<Value>) -> Value {
    json!({
        "batchcomplete": true,
        "query": {
            "pages": [
                { "pageid": page_id, "ns": 0, "title": title, "revisions": revisions }
            ]
        }
    })
}

pub fn user_response(contribs: Vec<Value>) -> Value {
    json!({
        "batchcomplete": true,
        "query": { "usercontribs": contribs }
    })
}

pub mod strategies {
    use proptest::prelude::*;
    use serde_json::{Map, Value};

    fn maybe(key: &'static str, value: impl Strategy<Value = Value>) -> impl Strategy<Value = Option<(&'static str, Value)>> {
        proptest::option::weighted(0.7, value.prop_map(move |value| (key, value)))
    }

    prop_compose! {
        /// Revision payloads with an arbitrary subset of the known keys.
        pub fn sparse_revision_payload()
                (revid in maybe("revid", any::<u32>().prop_map(Value::from)),
                 parentid in maybe("parentid", any::<u32>().prop_map(Value::from)),
                 minor in maybe("minor", any::<bool>().prop_map(Value::from)),
                 user in maybe("user", "[a-zA-Z ]{1,12}".prop_map(Value::from)),
                 timestamp in maybe("timestamp", "20[0-2][0-9]{11}".prop_map(Value::from)),
                 size in maybe("size", any::<u32>().prop_map(Value::from)),
                 comment in maybe("comment", ".{0,20}".prop_map(Value::from)),
                 tags in maybe("tags", proptest::collection::vec("[a-z]{1,6}", 0..4).prop_map(Value::from)),
                 junk in maybe("sha1", any::<i64>().prop_map(Value::from)))
        -> Value {
            let entries = [revid, parentid, minor, user, timestamp, size, comment, tags, junk];
            let map: Map<String, Value> = entries
                .into_iter()
                .flatten()
                .map(|(key, value)| (key.to_string(), value))
                .collect();
            Value::Object(map)
        }
    }
}
