//! Chart data for revision histories.
//!
//! Charts are returned as plain serializable data: the per-revision x-axis values and the bucketed
//! series a front end needs to draw them.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Datelike, Months, Utc};
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::{
    history::{RevisionCollection, SubjectField},
    revision::Revision,
};

const HIDDEN_LABEL: &str = "(hidden)";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChartError {
    #[error("unknown revision field `{0}`")]
    UnknownField(String),
    #[error("Invalid choice of visualization: `{0}`")]
    InvalidVisualization(String),
}

/// Revision fields that can be put on an x-axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AxisField {
    Timestamp,
    Size,
    Tags,
    User,
    Title,
}

impl FromStr for AxisField {
    type Err = ChartError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "timestamp" => Ok(Self::Timestamp),
            "size" => Ok(Self::Size),
            "tags" => Ok(Self::Tags),
            "user" => Ok(Self::User),
            "title" => Ok(Self::Title),
            _ => Err(ChartError::UnknownField(s.to_string())),
        }
    }
}

/// One revision's value of an [`AxisField`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum AxisValue {
    Text(String),
    Number(u64),
    List(Vec<String>),
    /// Serialized as `null`.
    Missing,
}

impl AxisValue {
    fn of(revision: &Revision, field: AxisField) -> Self {
        let value = match field {
            AxisField::Timestamp => revision.timestamp.clone().map(Self::Text),
            AxisField::Size => revision.size_bytes.map(Self::Number),
            AxisField::Tags => revision.tags.clone().map(Self::List),
            AxisField::User => revision.user.as_ref().map(|user| Self::Text(user.to_string())),
            AxisField::Title => revision
                .title
                .as_ref()
                .map(|title| Self::Text(title.to_string())),
        };
        value.unwrap_or(Self::Missing)
    }
}

/// Extract one value of `field` per revision, in order.
pub fn x_axis(revisions: &[Revision], field: &str) -> Result<Vec<AxisValue>, ChartError> {
    Ok(axis(revisions, field.parse()?))
}

/// The visualizations a history can be requested as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visualization {
    /// Histogram of edits over time.
    EditsPerTime,
    /// Pie of edits per editor, for article histories.
    EditsPerUser,
    /// Pie of edits per page, for user histories.
    EditsPerArticle,
}

impl Visualization {
    /// Parse the `visualize` parameter. The pie is only available keyed by the field that isn't the
    /// history's subject.
    pub fn parse(value: &str, subject: SubjectField) -> Result<Self, ChartError> {
        match (value, subject) {
            ("edits_per_time", _) => Ok(Self::EditsPerTime),
            ("edits_per_user", SubjectField::Title) => Ok(Self::EditsPerUser),
            ("edits_per_article", SubjectField::User) => Ok(Self::EditsPerArticle),
            _ => Err(ChartError::InvalidVisualization(value.to_string())),
        }
    }

    pub fn render(self, history: &RevisionCollection) -> Chart {
        match self {
            Self::EditsPerTime => Chart::histogram(history),
            Self::EditsPerUser => Chart::pie(history, AxisField::User),
            Self::EditsPerArticle => Chart::pie(history, AxisField::Title),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Histogram,
    Pie,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bucket {
    pub label: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chart {
    pub kind: ChartKind,
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub x_axis: Vec<AxisValue>,
    pub series: Vec<Bucket>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Granularity {
    Day,
    Month,
}

impl Granularity {
    fn label(self, timestamp: &DateTime<Utc>) -> String {
        match self {
            Self::Day => timestamp.format("%Y-%m-%d").to_string(),
            Self::Month => timestamp.format("%Y-%m").to_string(),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Day => f.write_str("day"),
            Self::Month => f.write_str("month"),
        }
    }
}

impl Chart {
    /// Edits per day, or per month if the revisions span more than a year. Buckets are chronological,
    /// revisions without a parseable timestamp are skipped.
    pub fn histogram(history: &RevisionCollection) -> Self {
        let mut timestamps: Vec<DateTime<Utc>> = history
            .revisions()
            .iter()
            .filter_map(Revision::parsed_timestamp)
            .collect();
        timestamps.sort_unstable();

        let granularity = match (timestamps.first(), timestamps.last()) {
            (Some(first), Some(last))
                if first
                    .checked_add_months(Months::new(12))
                    .is_some_and(|year_later| *last > year_later) =>
            {
                Granularity::Month
            }
            _ => Granularity::Day,
        };

        // sorted input, so equal labels are adjacent
        let mut series: Vec<Bucket> = Vec::new();
        for timestamp in &timestamps {
            let label = granularity.label(timestamp);
            match series.last_mut() {
                Some(bucket) if bucket.label == label => bucket.count += 1,
                _ => series.push(Bucket { label, count: 1 }),
            }
        }

        if let (Some(first), Some(last)) = (timestamps.first(), timestamps.last()) {
            tracing::debug!(
                message = "Built histogram",
                from = first.year(),
                to = last.year(),
                %granularity,
                buckets = series.len()
            );
        }

        Self {
            kind: ChartKind::Histogram,
            title: format!("Edits per {granularity} of {}", history.subject()),
            x_label: granularity.to_string(),
            y_label: "edits".to_string(),
            x_axis: axis(history.revisions(), AxisField::Timestamp),
            series,
        }
    }

    /// Edits per distinct value of `field`, largest share first.
    pub fn pie(history: &RevisionCollection, field: AxisField) -> Self {
        let mut counts: FxHashMap<&str, usize> = FxHashMap::default();
        for revision in history.revisions() {
            let label = match field {
                AxisField::Title => revision.title.as_deref(),
                _ => revision.user.as_deref(),
            };
            // suppressed usernames and deleted pages
            *counts.entry(label.unwrap_or(HIDDEN_LABEL)).or_default() += 1;
        }

        let mut series: Vec<Bucket> = counts
            .into_iter()
            .map(|(label, count)| Bucket {
                label: label.to_string(),
                count,
            })
            .collect();
        series.sort_unstable_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));

        let (title, x_label) = match field {
            AxisField::Title => (format!("Edits per article by {}", history.subject()), "article"),
            _ => (format!("Edits per user on {}", history.subject()), "user"),
        };

        Self {
            kind: ChartKind::Pie,
            title,
            x_label: x_label.to_string(),
            y_label: "edits".to_string(),
            x_axis: axis(history.revisions(), field),
            series,
        }
    }
}

fn axis(revisions: &[Revision], field: AxisField) -> Vec<AxisValue> {
    revisions
        .iter()
        .map(|revision| AxisValue::of(revision, field))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        history::{ArticleHistory, UserHistory},
        query::QuerySpec,
        test_support::prelude::*,
    };

    fn article(revisions: Vec<serde_json::Value>) -> ArticleHistory {
        let source = FakeSource::new().with_query(article_response(1, "Techno", revisions));
        ArticleHistory::fetch(&source, "Techno", QuerySpec::default(), 1).unwrap()
    }

    fn with_user(mut payload: serde_json::Value, user: &str) -> serde_json::Value {
        payload["user"] = json!(user);
        payload
    }

    #[test]
    fn test_x_axis() {
        let history = article(vec![
            revision_payload(11, 10, "2022-12-01T10:00:00Z", &["a"]),
            json!({ "revid": 12 }),
        ]);

        assert_eq!(
            x_axis(history.revisions(), "timestamp").unwrap(),
            vec![
                AxisValue::Text("2022-12-01T10:00:00Z".to_string()),
                AxisValue::Missing
            ]
        );
        assert_eq!(
            x_axis(history.revisions(), "size").unwrap()[0],
            AxisValue::Number(1011)
        );
        assert_eq!(
            x_axis(history.revisions(), "tags").unwrap()[0],
            AxisValue::List(vec!["a".to_string()])
        );
        assert_eq!(
            x_axis(history.revisions(), "title").unwrap(),
            vec![
                AxisValue::Text("Techno".to_string()),
                AxisValue::Text("Techno".to_string())
            ]
        );
        assert_eq!(
            x_axis(history.revisions(), ""),
            Err(ChartError::UnknownField(String::new()))
        );
        assert!(x_axis(history.revisions(), "sha1").is_err());
    }

    #[test]
    fn test_axis_serialization() {
        let values = vec![
            AxisValue::Text("x".to_string()),
            AxisValue::Number(3),
            AxisValue::List(vec!["a".to_string()]),
            AxisValue::Missing,
        ];
        assert_eq!(
            serde_json::to_string(&values).unwrap(),
            r#"["x",3,["a"],null]"#
        );
    }

    #[test]
    fn test_visualization_parse() {
        use SubjectField::*;
        assert_eq!(
            Visualization::parse("edits_per_time", Title),
            Ok(Visualization::EditsPerTime)
        );
        assert_eq!(
            Visualization::parse("edits_per_user", Title),
            Ok(Visualization::EditsPerUser)
        );
        assert_eq!(
            Visualization::parse("edits_per_article", User),
            Ok(Visualization::EditsPerArticle)
        );
        assert!(Visualization::parse("edits_per_article", Title).is_err());
        assert!(Visualization::parse("edits_per_user", User).is_err());
        assert!(Visualization::parse("pie", Title).is_err());
    }

    #[test]
    fn test_daily_histogram() {
        let history = article(vec![
            revision_payload(11, 10, "2022-12-01T10:00:00Z", &[]),
            revision_payload(12, 11, "2022-12-01T23:00:00Z", &[]),
            revision_payload(13, 12, "20221203000000", &[]),
            json!({ "revid": 14, "timestamp": "not a time" }),
            json!({ "revid": 15, "timestamp": "2022-12-1T1:2:3Z" }),
        ]);
        let chart = Chart::histogram(&history);

        assert_eq!(chart.kind, ChartKind::Histogram);
        assert_eq!(chart.x_label, "day");
        assert_eq!(chart.x_axis.len(), 5);
        assert_eq!(chart.x_axis, x_axis(history.revisions(), "timestamp").unwrap());
        assert_eq!(
            chart.series,
            vec![
                Bucket { label: "2022-12-01".to_string(), count: 2 },
                Bucket { label: "2022-12-03".to_string(), count: 1 },
            ]
        );
    }

    #[test]
    fn test_monthly_histogram() {
        let history = article(vec![
            revision_payload(11, 10, "2020-01-15T00:00:00Z", &[]),
            revision_payload(12, 11, "2020-01-20T00:00:00Z", &[]),
            revision_payload(13, 12, "2021-06-01T00:00:00Z", &[]),
        ]);
        let chart = Chart::histogram(&history);

        assert_eq!(chart.x_label, "month");
        assert_eq!(
            chart.series,
            vec![
                Bucket { label: "2020-01".to_string(), count: 2 },
                Bucket { label: "2021-06".to_string(), count: 1 },
            ]
        );
    }

    #[test]
    fn test_empty_histogram() {
        let chart = Chart::histogram(&article(vec![]));
        assert!(chart.series.is_empty());
        assert!(chart.x_axis.is_empty());
    }

    #[test]
    fn test_user_pie() {
        let history = article(vec![
            with_user(revision_payload(11, 10, "20221201000000", &[]), "Bob"),
            with_user(revision_payload(12, 11, "20221202000000", &[]), "Alice"),
            with_user(revision_payload(13, 12, "20221203000000", &[]), "Carol"),
            with_user(revision_payload(14, 13, "20221204000000", &[]), "Carol"),
            json!({ "revid": 15, "userhidden": true }),
        ]);
        let chart = Visualization::EditsPerUser.render(&history);

        assert_eq!(chart.kind, ChartKind::Pie);
        let labels: Vec<&str> = chart.series.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, vec!["Carol", HIDDEN_LABEL, "Alice", "Bob"]);
        assert_eq!(chart.series[0].count, 2);
        assert_eq!(chart.series.iter().map(|b| b.count).sum::<usize>(), 5);
    }

    #[test]
    fn test_article_pie() {
        let source = FakeSource::new().with_query(user_response(vec![
            user_contrib_payload(11, 10, "Wikipedia", "20221201000000", &[]),
            user_contrib_payload(21, 20, "Jimmy Wales", "20221202000000", &[]),
            user_contrib_payload(31, 30, "Wikipedia", "20221203000000", &[]),
        ]));
        let history = UserHistory::fetch(&source, "Jimbo Wales", QuerySpec::default(), 1).unwrap();
        let chart = Visualization::EditsPerArticle.render(&history);

        assert_eq!(chart.x_label, "article");
        assert_eq!(
            chart.series,
            vec![
                Bucket { label: "Wikipedia".to_string(), count: 2 },
                Bucket { label: "Jimmy Wales".to_string(), count: 1 },
            ]
        );
    }
}
