//! The request router: turns request targets like `/articleHistory/Cat?tags=[bot]` into responses.

use std::time::Duration;

use reqwest::Url;
use tracing::instrument;

use crate::{
    api::{ApiError, RevisionSource},
    cache::{CacheConfig, ResponseCache},
    chart::{ChartError, Visualization},
    history::{ArticleHistory, HistoryError, SubjectField, UserHistory},
    query::{DateParts, QueryError, QuerySpec},
    revision::RevisionError,
};

const JSON: &str = "application/json";
const HTML: &str = "text/html; charset=utf-8";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

impl Response {
    pub fn json(body: String) -> Self {
        Self {
            status: 200,
            content_type: JSON,
            body,
        }
    }

    pub fn error(error: &ServiceError) -> Self {
        let status = error.status();
        let heading = match status {
            400 => "Bad Request",
            404 => "Not Found",
            502 => "Bad Gateway",
            _ => "Internal Server Error",
        };
        Self {
            status,
            content_type: HTML,
            body: format!("<h1>{heading}</h1>{error}"),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    BadRequest(String),
    #[error("no revisions found for `{0}`")]
    NotFound(String),
    #[error("unknown endpoint `{0}`")]
    UnknownEndpoint(String),
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error(transparent)]
    Chart(#[from] ChartError),
    #[error(transparent)]
    History(#[from] HistoryError),
    #[error(transparent)]
    Revision(#[from] RevisionError),
    #[error("failed to serialize the response")]
    Json(#[from] serde_json::Error),
}

impl ServiceError {
    /// The HTTP status code this error is answered with.
    pub fn status(&self) -> u16 {
        match self {
            Self::BadRequest(_) | Self::Query(_) | Self::Chart(_) => 400,
            Self::NotFound(_) | Self::UnknownEndpoint(_) => 404,
            Self::History(error) => match error {
                HistoryError::UpstreamContractViolation(_) | HistoryError::MissingSubject(_) => 400,
                HistoryError::Api(error) => api_status(error),
                HistoryError::Revision(error) => revision_status(error),
            },
            Self::Revision(error) => revision_status(error),
            Self::Json(_) => 500,
        }
    }
}

fn api_status(error: &ApiError) -> u16 {
    match error {
        // the API rejected what the caller asked for, e.g. an invalid username
        ApiError::Remote { .. } => 400,
        ApiError::Http(_) | ApiError::Status(_) => 502,
    }
}

fn revision_status(error: &RevisionError) -> u16 {
    match error {
        RevisionError::UnexpectedShape { .. } => 400,
        RevisionError::MissingIdentifier(_) | RevisionError::MissingField(_) => 502,
        RevisionError::Api(error) => api_status(error),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endpoint {
    ArticleHistory,
    UserHistory,
    GetRevision,
    CompareRevisions,
}

impl Endpoint {
    fn from_path(name: &str) -> Option<Self> {
        match name {
            "articleHistory" => Some(Self::ArticleHistory),
            "userHistory" => Some(Self::UserHistory),
            "getRevision" => Some(Self::GetRevision),
            "compareRevisions" => Some(Self::CompareRevisions),
            _ => None,
        }
    }

    fn ttl(self, config: &CacheConfig) -> Duration {
        match self {
            Self::CompareRevisions => config.compare_ttl,
            _ => config.history_ttl,
        }
    }
}

/// The query parameters shared by all endpoints. Each endpoint only looks at the ones it supports.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryParams {
    pub tags: Vec<String>,
    pub keyword: Option<String>,
    pub user: Option<String>,
    pub title: Option<String>,
    pub start: DateParts,
    pub end: DateParts,
    pub visualize: Option<String>,
}

impl HistoryParams {
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, ServiceError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut params = Self::default();

        for (key, value) in pairs {
            let (key, value) = (key.as_ref(), value.as_ref());
            match key {
                "tags" => params.tags = parse_tags(value)?,
                "keyword" => params.keyword = Some(value.to_string()),
                "user" => params.user = Some(value.to_string()),
                "title" => params.title = Some(value.to_string()),
                "visualize" => params.visualize = Some(value.to_string()),
                "startyear" => params.start.year = Some(parse_number(key, value)?),
                "startmonth" => params.start.month = Some(parse_number(key, value)?),
                "startday" => params.start.day = Some(parse_number(key, value)?),
                "starthour" => params.start.hour = Some(parse_number(key, value)?),
                "startminute" => params.start.minute = Some(parse_number(key, value)?),
                "startsecond" => params.start.second = Some(parse_number(key, value)?),
                "endyear" => params.end.year = Some(parse_number(key, value)?),
                "endmonth" => params.end.month = Some(parse_number(key, value)?),
                "endday" => params.end.day = Some(parse_number(key, value)?),
                "endhour" => params.end.hour = Some(parse_number(key, value)?),
                "endminute" => params.end.minute = Some(parse_number(key, value)?),
                "endsecond" => params.end.second = Some(parse_number(key, value)?),
                _ => tracing::debug!(message = "Ignoring unknown query parameter", key),
            }
        }

        Ok(params)
    }

    /// Date window, tags and keyword. The subject and the reciprocal filter are up to the endpoint.
    pub fn query_spec(&self) -> Result<QuerySpec, ServiceError> {
        let spec = QuerySpec::new(&self.start, &self.end)?.with_tags(self.tags.iter().cloned());
        Ok(match &self.keyword {
            Some(keyword) => spec.with_keyword(keyword.as_str()),
            None => spec,
        })
    }
}

/// Parse a tag list of the form `[a,b]`. Entries are trimmed, empty entries dropped.
pub fn parse_tags(text: &str) -> Result<Vec<String>, ServiceError> {
    let inner = text
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .ok_or_else(|| {
            ServiceError::BadRequest(format!(
                "tags must be a bracketed, comma separated list like `[a,b]`, got `{text}`"
            ))
        })?;

    Ok(inner
        .split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect())
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ServiceError> {
    value
        .trim()
        .parse()
        .map_err(|_| ServiceError::BadRequest(format!("invalid value for `{key}`: `{value}`")))
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Request {
    endpoint: Endpoint,
    subject: String,
    params: HistoryParams,
}

impl Request {
    fn parse(target: &str) -> Result<Self, ServiceError> {
        let url = Url::parse("http://wikiwatcher.invalid/")
            .and_then(|base| base.join(target))
            .map_err(|e| ServiceError::BadRequest(format!("invalid request target: {e}")))?;

        let mut segments = url.path_segments().into_iter().flatten();
        let name = segments.next().unwrap_or_default();
        let endpoint = Endpoint::from_path(name)
            .ok_or_else(|| ServiceError::UnknownEndpoint(url.path().to_string()))?;

        // titles may contain slashes, e.g. `AC/DC`
        let subject = segments
            .map(|segment| {
                urlencoding::decode(segment)
                    .map(|decoded| decoded.into_owned())
                    .map_err(|_| ServiceError::BadRequest(format!("invalid path segment `{segment}`")))
            })
            .collect::<Result<Vec<_>, _>>()?
            .join("/");
        if subject.is_empty() {
            return Err(ServiceError::UnknownEndpoint(url.path().to_string()));
        }

        let params = HistoryParams::from_pairs(url.query_pairs())?;
        Ok(Self {
            endpoint,
            subject,
            params,
        })
    }
}

/// Answers request targets from a [`RevisionSource`], caching successful responses.
#[derive(Debug)]
pub struct Service<S> {
    source: S,
    cache: ResponseCache<Response>,
    max_pages: usize,
}

impl<S: RevisionSource> Service<S> {
    pub fn new(source: S, cache: CacheConfig, max_pages: usize) -> Self {
        Self {
            source,
            cache: ResponseCache::new(cache),
            max_pages,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Answer one request target. Never fails, errors are rendered into the response.
    #[instrument(skip(self))]
    pub fn handle(&mut self, target: &str) -> Response {
        if let Some(response) = self.cache.get(target) {
            tracing::debug!(message = "Serving cached response", status = response.status);
            return response;
        }

        let result = Request::parse(target).and_then(|request| {
            let ttl = request.endpoint.ttl(self.cache.config());
            self.respond(&request).map(|response| (response, ttl))
        });

        match result {
            Ok((response, ttl)) => {
                self.cache.insert(target, response.clone(), ttl);
                response
            }
            Err(error) => {
                let response = Response::error(&error);
                if response.status >= 500 {
                    tracing::error!(message = "Request failed", status = response.status, %error);
                } else {
                    tracing::info!(message = "Request rejected", status = response.status, %error);
                }
                response
            }
        }
    }

    fn respond(&self, request: &Request) -> Result<Response, ServiceError> {
        let params = &request.params;
        match request.endpoint {
            Endpoint::ArticleHistory => {
                // validated up front, it is pointless to fetch a history that can't be answered
                let visualization = params
                    .visualize
                    .as_deref()
                    .map(|value| Visualization::parse(value, SubjectField::Title))
                    .transpose()?;
                let mut spec = params.query_spec()?;
                if let Some(user) = &params.user {
                    spec = spec.with_user(user.as_str());
                }

                let history = ArticleHistory::fetch(&self.source, &request.subject, spec, self.max_pages)?;
                let body = match visualization {
                    Some(visualization) => serde_json::to_string(&visualization.render(&history))?,
                    None => history.revisions_as_json()?,
                };
                Ok(Response::json(body))
            }
            Endpoint::UserHistory => {
                let visualization = params
                    .visualize
                    .as_deref()
                    .map(|value| Visualization::parse(value, SubjectField::User))
                    .transpose()?;
                let mut spec = params.query_spec()?;
                if let Some(title) = &params.title {
                    spec = spec.with_titles(title.as_str());
                }

                let history = UserHistory::fetch(&self.source, &request.subject, spec, self.max_pages)?;
                let body = match visualization {
                    Some(visualization) => serde_json::to_string(&visualization.render(&history))?,
                    None => history.revisions_as_json()?,
                };
                Ok(Response::json(body))
            }
            Endpoint::GetRevision => {
                // only the oldest revision in the window matters, one page is enough
                let spec = QuerySpec::new(&params.start, &DateParts::default())?;
                let history = ArticleHistory::fetch(&self.source, &request.subject, spec, 1)?;
                let revision = history
                    .revisions()
                    .first()
                    .ok_or_else(|| ServiceError::NotFound(request.subject.clone()))?;

                let content = revision.fetch_content(&self.source)?;
                Ok(Response::json(serde_json::to_string(&content)?))
            }
            Endpoint::CompareRevisions => {
                let spec = QuerySpec::new(&params.start, &params.end)?;
                let history = ArticleHistory::fetch(&self.source, &request.subject, spec, self.max_pages)?;
                let (Some(first), Some(last)) = (history.revisions().first(), history.revisions().last()) else {
                    return Err(ServiceError::NotFound(request.subject.clone()));
                };
                let to_rev = last
                    .revision_id
                    .ok_or(RevisionError::MissingIdentifier("revid"))?;

                let diff = first.fetch_diff(&self.source, Some(to_rev))?;
                Ok(Response::json(serde_json::to_string(&diff)?))
            }
        }
    }
}
