//! Defines the [`Article`] type, the parsed and rendered form of a single
//! `.md` source file, and its conversion into template [`Value`]s.

use chrono::NaiveDate;
use gtmpl_value::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// The `strftime` format of article dates (`DD-MM-YYYY`).
pub const DATE_FORMAT: &str = "%d-%m-%Y";

/// Represents an article. Articles are created once per load by
/// [`crate::parser::parse`] and never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Article {
    /// The publish date from the info line.
    pub date: NaiveDate,

    /// The tags from the info line. This is `None` rather than an empty list
    /// when the info line carries no tags.
    pub tags: Option<Vec<String>>,

    /// The title from the title line.
    pub title: String,

    /// The summary lines joined by newlines, possibly empty.
    pub summary: String,

    /// The raw Markdown body.
    pub body: String,

    /// The body rendered as HTML.
    pub html: String,

    /// The canonical URL path of the article (e.g., `/posts/hello` or
    /// `/posts/` for a directory index).
    pub path: String,
}

impl From<&Article> for Value {
    /// Converts an [`Article`] into a [`Value::Object`] with the fields
    /// `Title`, `Date`, `Tags`, `Summary`, `Body`, `Html`, and `Path`.
    fn from(a: &Article) -> Value {
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("Title".to_owned(), Value::String(a.title.clone()));
        m.insert(
            "Date".to_owned(),
            Value::String(a.date.format(DATE_FORMAT).to_string()),
        );
        m.insert(
            "Tags".to_owned(),
            match &a.tags {
                Some(tags) => Value::Array(
                    tags.iter().map(|t| Value::String(t.clone())).collect(),
                ),
                None => Value::Nil,
            },
        );
        m.insert("Summary".to_owned(), Value::String(a.summary.clone()));
        m.insert("Body".to_owned(), Value::String(a.body.clone()));
        m.insert("Html".to_owned(), Value::String(a.html.clone()));
        m.insert("Path".to_owned(), Value::String(a.path.clone()));
        Value::Object(m)
    }
}

/// Converts a list of articles into a [`Value::Array`] for templating.
pub fn to_values(articles: &[Arc<Article>]) -> Value {
    Value::Array(articles.iter().map(|a| Value::from(a.as_ref())).collect())
}

/// Sorts articles by date, oldest first. Articles sharing a date are ordered
/// by path.
pub fn sort_by_date(articles: &mut [Arc<Article>]) {
    articles.sort_by(|a, b| {
        a.date.cmp(&b.date).then_with(|| a.path.cmp(&b.path))
    });
}
