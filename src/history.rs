use std::ops::Deref;

use compact_str::CompactString;
use serde_json::Value;
use tracing::instrument;

use crate::{
    api::{self, ApiError, RevisionSource, PAGE_SIZE},
    filter,
    query::{format_timestamp, QuerySpec},
    revision::{Revision, RevisionError},
};

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    /// The API answered, but not in the shape it is documented to have.
    #[error("unexpected response from the MediaWiki API: missing `{0}`")]
    UpstreamContractViolation(&'static str),
    #[error("no {0} given to fetch the history of")]
    MissingSubject(&'static str),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Revision(#[from] RevisionError),
}

/// Which field of a [`QuerySpec`] names the subject of a history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubjectField {
    Title,
    User,
}

/// One page of an API listing.
#[derive(Debug, Default)]
struct Listing {
    page_id: Option<u64>,
    revisions: Vec<Revision>,
}

/// How one kind of history is requested from the API and read from its responses.
pub struct Subject {
    pub field: SubjectField,
    pub name: &'static str,
    continue_key: &'static str,
    fetch_params: fn(&str, &QuerySpec) -> Vec<(&'static str, String)>,
    list: fn(&Value, &str) -> Result<Listing, HistoryError>,
}

impl std::fmt::Debug for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subject")
            .field("field", &self.field)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// All revisions of one article, `prop=revisions`.
pub static ARTICLE: Subject = Subject {
    field: SubjectField::Title,
    name: "article",
    continue_key: "rvcontinue",
    fetch_params: article_params,
    list: article_listing,
};

/// All contributions of one user, `list=usercontribs`.
pub static USER: Subject = Subject {
    field: SubjectField::User,
    name: "user",
    continue_key: "uccontinue",
    fetch_params: user_params,
    list: user_listing,
};

fn article_params(title: &str, spec: &QuerySpec) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("prop", "revisions".to_string()),
        ("titles", title.to_string()),
        (
            "rvprop",
            "comment|ids|flags|size|tags|timestamp|user|userid".to_string(),
        ),
        ("rvlimit", PAGE_SIZE.to_string()),
        // oldest first, `rvstart` has to be the earlier bound then
        ("rvdir", "newer".to_string()),
    ];
    if let Some(start) = &spec.start {
        params.push(("rvstart", format_timestamp(start)));
    }
    if let Some(end) = &spec.end {
        params.push(("rvend", format_timestamp(end)));
    }
    if let Some(user) = &spec.user {
        params.push(("rvuser", user.to_string()));
    }
    params
}

fn user_params(user: &str, spec: &QuerySpec) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("list", "usercontribs".to_string()),
        ("ucuser", user.to_string()),
        (
            "ucprop",
            "ids|title|timestamp|comment|size|flags|tags".to_string(),
        ),
        ("uclimit", PAGE_SIZE.to_string()),
        ("ucdir", "newer".to_string()),
    ];
    if let Some(start) = &spec.start {
        params.push(("ucstart", format_timestamp(start)));
    }
    if let Some(end) = &spec.end {
        params.push(("ucend", format_timestamp(end)));
    }
    params
}

fn article_listing(payload: &Value, title: &str) -> Result<Listing, HistoryError> {
    let pages = payload
        .pointer("/query/pages")
        .and_then(Value::as_array)
        .ok_or(HistoryError::UpstreamContractViolation("query.pages"))?;

    if pages.len() > 1 {
        tracing::warn!(
            message = "Query returned more than one page, only using the first",
            pages = pages.len()
        );
    }
    let Some(page) = pages.first() else {
        return Ok(Listing::default());
    };

    if page.get("missing").is_some() || page.get("invalid").is_some() {
        tracing::info!(message = "Article does not exist", title);
    }

    let page_id = page.get("pageid").and_then(Value::as_u64);
    // prefer the title as normalized by the API
    let page_title = page.get("title").and_then(Value::as_str).unwrap_or(title);

    // `revisions` is left out entirely if none match
    let revisions = page
        .get("revisions")
        .and_then(Value::as_array)
        .map(|revisions| {
            revisions
                .iter()
                .map(|payload| {
                    let mut revision = Revision::from_payload(payload);
                    revision.page_id = revision.page_id.or(page_id);
                    if revision.title.is_none() {
                        revision.title = Some(CompactString::from(page_title));
                    }
                    revision
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(Listing { page_id, revisions })
}

fn user_listing(payload: &Value, user: &str) -> Result<Listing, HistoryError> {
    let contribs = payload
        .pointer("/query/usercontribs")
        .and_then(Value::as_array)
        .ok_or(HistoryError::UpstreamContractViolation("query.usercontribs"))?;

    let revisions = contribs
        .iter()
        .map(|payload| {
            let mut revision = Revision::from_payload(payload);
            if revision.user.is_none() {
                revision.user = Some(CompactString::from(user));
            }
            revision
        })
        .collect();

    Ok(Listing {
        page_id: None,
        revisions,
    })
}

fn continuation(payload: &Value, key: &'static str) -> Option<Vec<(&'static str, String)>> {
    let next = payload.get("continue")?;
    let token = next.get(key)?.as_str()?;

    let mut params = vec![(key, token.to_string())];
    if let Some(marker) = next.get("continue").and_then(Value::as_str) {
        params.push(("continue", marker.to_string()));
    }
    Some(params)
}

/// The filtered revisions of one article or one user, oldest first.
#[derive(Debug, Clone)]
pub struct RevisionCollection {
    subject: CompactString,
    field: SubjectField,
    spec: QuerySpec,
    page_id: Option<u64>,
    revisions: Vec<Revision>,
    truncated: bool,
}

impl RevisionCollection {
    /// Fetch the history described by `spec` and filter it.
    ///
    /// Follows the API's continuation for at most `max_pages` requests of [`PAGE_SIZE`] revisions each.
    /// Then the tag filter and the keyword filter are applied once. An empty result is not an error,
    /// a response without the expected listing is.
    #[instrument(skip(source, kind, spec), fields(kind = kind.name))]
    pub fn fetch<S: RevisionSource + ?Sized>(
        source: &S,
        kind: &Subject,
        spec: QuerySpec,
        max_pages: usize,
    ) -> Result<Self, HistoryError> {
        let subject = match kind.field {
            SubjectField::Title => spec.titles.clone(),
            SubjectField::User => spec.user.clone(),
        }
        .ok_or(HistoryError::MissingSubject(kind.name))?;

        let base_params = (kind.fetch_params)(&subject, &spec);
        let mut params = base_params.clone();
        let mut page_id = None;
        let mut revisions = Vec::new();
        let mut truncated = false;
        let mut requests = 0;

        loop {
            let payload = source.query(&params)?;
            requests += 1;
            if let Some(error) = api::remote_error(&payload) {
                return Err(error.into());
            }

            let listing = (kind.list)(&payload, &subject)?;
            page_id = page_id.or(listing.page_id);
            revisions.extend(listing.revisions);

            let Some(next) = continuation(&payload, kind.continue_key) else {
                break;
            };
            if requests >= max_pages {
                tracing::warn!(
                    message = "Reached the page limit, the history is incomplete",
                    subject = subject.as_str(),
                    requests,
                    revisions = revisions.len()
                );
                truncated = true;
                break;
            }

            params.clone_from(&base_params);
            params.extend(next);
        }

        let fetched = revisions.len();
        // the title of a user history can't be restricted remotely
        let revisions = match (&kind.field, &spec.titles) {
            (SubjectField::User, Some(title)) => filter::by_title(revisions, title),
            _ => revisions,
        };
        let revisions = filter::apply(revisions, &spec, source)?;

        if revisions.is_empty() {
            tracing::info!(
                message = "No revisions found matching the search parameters",
                subject = subject.as_str(),
                fetched
            );
        } else {
            tracing::debug!(
                message = "Fetched history",
                subject = subject.as_str(),
                fetched,
                kept = revisions.len()
            );
        }

        Ok(Self {
            subject,
            field: kind.field,
            spec,
            page_id,
            revisions,
            truncated,
        })
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn subject_field(&self) -> SubjectField {
        self.field
    }

    pub fn spec(&self) -> &QuerySpec {
        &self.spec
    }

    /// Page id of an article history, as reported by the API.
    pub fn page_id(&self) -> Option<u64> {
        self.page_id
    }

    pub fn revisions(&self) -> &[Revision] {
        &self.revisions
    }

    pub fn into_revisions(self) -> Vec<Revision> {
        self.revisions
    }

    pub fn len(&self) -> usize {
        self.revisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.revisions.is_empty()
    }

    /// Whether fetching stopped at the page limit before the API ran out of revisions.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// The revisions as a JSON array, keys in the order of [`Revision`]'s fields.
    pub fn revisions_as_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.revisions)
    }
}

/// Revisions of one article, optionally restricted to the edits of `spec.user`.
#[derive(Debug, Clone)]
pub struct ArticleHistory(RevisionCollection);

impl ArticleHistory {
    pub fn fetch<S: RevisionSource + ?Sized>(
        source: &S,
        title: &str,
        spec: QuerySpec,
        max_pages: usize,
    ) -> Result<Self, HistoryError> {
        RevisionCollection::fetch(source, &ARTICLE, spec.with_titles(title), max_pages).map(Self)
    }

    pub fn into_inner(self) -> RevisionCollection {
        self.0
    }
}

impl Deref for ArticleHistory {
    type Target = RevisionCollection;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Contributions of one user, optionally restricted to the page `spec.titles`.
#[derive(Debug, Clone)]
pub struct UserHistory(RevisionCollection);

impl UserHistory {
    pub fn fetch<S: RevisionSource + ?Sized>(
        source: &S,
        user: &str,
        spec: QuerySpec,
        max_pages: usize,
    ) -> Result<Self, HistoryError> {
        RevisionCollection::fetch(source, &USER, spec.with_user(user), max_pages).map(Self)
    }

    pub fn into_inner(self) -> RevisionCollection {
        self.0
    }
}

impl Deref for UserHistory {
    type Target = RevisionCollection;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
