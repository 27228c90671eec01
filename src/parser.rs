//! Parses [`Article`]s from their source text. An article source file is
//! structured as follows:
//!
//! 1. A title line starting with `#`
//! 2. An info line starting with `>`, holding the date (`DD-MM-YYYY`) and
//!    optionally tags, each starting with `#`
//! 3. Zero or more summary lines, each starting with `>`
//! 4. The Markdown body
//!
//! Blank lines may appear anywhere between these parts. For example:
//!
//! ```md
//! # Hello world
//!
//! > 20-10-2016 #foo #bar
//! >
//! > Welcome!
//!
//! Hello!
//! ```

use crate::article::{Article, DATE_FORMAT};
use crate::markdown;
use chrono::NaiveDate;
use std::fmt;

const TITLE_MARKER: &str = "#";
const INFO_MARKER: &str = ">";
const TAG_MARKER: &str = "#";

/// Parses an article from its source text. The returned article's `path` is
/// left empty; it's the caller's job to fill it in.
pub fn parse(input: &str) -> Result<Article> {
    let mut cursor = Cursor { rest: input };
    let title = cursor.title()?;
    let (date, tags) = cursor.info()?;
    let summary = cursor.summary();
    let body = cursor.body()?;

    let mut html = String::new();
    markdown::to_html(&mut html, body);

    Ok(Article {
        date,
        tags,
        title: title.to_owned(),
        summary,
        body: body.to_owned(),
        html: html.trim().to_owned(),
        path: String::new(),
    })
}

/// Parses a `DD-MM-YYYY` date. Day and month must be two digits and the year
/// must be four.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let shaped = s.len() == 10
        && s.bytes().enumerate().all(|(i, c)| match i {
            2 | 5 => c == b'-',
            _ => c.is_ascii_digit(),
        });
    match shaped {
        true => NaiveDate::parse_from_str(s, DATE_FORMAT).ok(),
        false => None,
    }
}

/// Tracks the unconsumed portion of the input. Each parsing stage consumes a
/// prefix of `rest`; nothing is ever re-read.
struct Cursor<'a> {
    rest: &'a str,
}

impl<'a> Cursor<'a> {
    /// Returns the contents of the next non-blank line with `marker` stripped
    /// and consumes it. Lines holding only the marker are consumed and
    /// skipped. A non-blank line without the marker is left in place and
    /// `None` is returned, as it is when no newline-terminated line remains.
    fn next_line(&mut self, marker: &str) -> Option<&'a str> {
        loop {
            let rest = self.rest;
            let end = rest.find('\n')?;
            let line = rest[..end].trim();
            if line.is_empty() {
                self.rest = &rest[end + 1..];
                continue;
            }

            let value = line.strip_prefix(marker)?.trim();
            self.rest = &rest[end + 1..];
            if !value.is_empty() {
                return Some(value);
            }
        }
    }

    fn title(&mut self) -> Result<&'a str> {
        self.next_line(TITLE_MARKER).ok_or(Error::MissingTitle)
    }

    fn info(&mut self) -> Result<(NaiveDate, Option<Vec<String>>)> {
        let line = self.next_line(INFO_MARKER).ok_or(Error::MissingDate)?;
        let mut tokens = line.split_whitespace();
        let date = tokens
            .next()
            .and_then(parse_date)
            .ok_or(Error::MissingDate)?;

        let tags: Vec<String> = tokens
            .filter_map(|token| token.strip_prefix(TAG_MARKER))
            .map(str::to_owned)
            .collect();
        Ok((date, if tags.is_empty() { None } else { Some(tags) }))
    }

    fn summary(&mut self) -> String {
        let mut lines = Vec::new();
        while let Some(line) = self.next_line(INFO_MARKER) {
            lines.push(line);
        }
        lines.join("\n")
    }

    fn body(&mut self) -> Result<&'a str> {
        let body = self.rest.trim();
        self.rest = "";
        match body.is_empty() {
            true => Err(Error::MissingContent),
            false => Ok(body),
        }
    }
}

/// Represents the result of an [`Article`]-parse operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error parsing an [`Article`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Returned when the first non-blank line isn't a title line.
    MissingTitle,

    /// Returned when the info line is missing or doesn't start with a valid
    /// date.
    MissingDate,

    /// Returned when nothing remains after the summary.
    MissingContent,
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::MissingTitle => write!(f, "Missing title"),
            Error::MissingDate => write!(f, "Missing date"),
            Error::MissingContent => write!(f, "Missing content"),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod test {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_full() -> Result<()> {
        let article = parse(concat!(
            "# Hello world\n\n",
            "> 20-10-2016 #foo #bar\n>\n> Welcome!\n\nHello!\n",
        ))?;
        assert_eq!(article.title, "Hello world");
        assert_eq!(article.date, date(2016, 10, 20));
        assert_eq!(
            article.tags,
            Some(vec![String::from("foo"), String::from("bar")])
        );
        assert_eq!(article.summary, "Welcome!");
        assert_eq!(article.body, "Hello!");
        assert_eq!(article.html, "<p>Hello!</p>");
        Ok(())
    }

    #[test]
    fn test_parse_indented_info() -> Result<()> {
        let article = parse(
            "\n# Hello world\n\n    > 20-10-2016\n  > Welcome!\n\nHello!\n",
        )?;
        assert_eq!(article.title, "Hello world");
        assert_eq!(article.date, date(2016, 10, 20));
        assert_eq!(article.tags, None);
        assert_eq!(article.summary, "Welcome!");
        assert_eq!(article.body, "Hello!");
        assert_eq!(article.html, "<p>Hello!</p>");
        Ok(())
    }

    #[test]
    fn test_parse_without_summary() -> Result<()> {
        let article = parse("\n# Hello world\n\n    > 20-10-2016\n\nHello!\n")?;
        assert_eq!(article.summary, "");
        assert_eq!(article.tags, None);
        assert_eq!(article.body, "Hello!");
        Ok(())
    }

    #[test]
    fn test_parse_multiline_summary() -> Result<()> {
        let article = parse(concat!(
            "# T\n> 01-02-2003 plain #x\n> first\n\n> second\n\n",
            "# Heading\n\nText\n",
        ))?;
        assert_eq!(article.date, date(2003, 2, 1));
        assert_eq!(article.tags, Some(vec![String::from("x")]));
        assert_eq!(article.summary, "first\nsecond");
        assert_eq!(article.body, "# Heading\n\nText");
        assert_eq!(article.html, "<h1>Heading</h1>\n<p>Text</p>");
        Ok(())
    }

    #[test]
    fn test_bare_title_marker_is_skipped() -> Result<()> {
        let article = parse("#\n# Real title\n> 20-10-2016\nBody\n")?;
        assert_eq!(article.title, "Real title");
        Ok(())
    }

    #[test]
    fn test_parse_errors() {
        let cases = [
            ("\nHello world\n", Error::MissingTitle),
            ("", Error::MissingTitle),
            ("> 20-10-2016\n# Hello\nBody\n", Error::MissingTitle),
            ("\n# Hello world\n", Error::MissingDate),
            ("\n# Hello world\n\n> Hello\n", Error::MissingDate),
            ("# Hello world\nBody\n", Error::MissingDate),
            ("# Hello world\n> 2016-10-20\nBody\n", Error::MissingDate),
            ("# Hello world\n> 1-10-2016\nBody\n", Error::MissingDate),
            ("# Hello world\n> 31-02-2016\nBody\n", Error::MissingDate),
            ("# Hello world\n\n> 20-10-2016\n", Error::MissingContent),
            ("# Hi\n> 20-10-2016\n> summary\n  \n", Error::MissingContent),
        ];
        for (input, wanted) in cases.iter() {
            assert_eq!(parse(input).err(), Some(*wanted), "input: {:?}", input);
        }
    }

    #[test]
    fn test_unterminated_line_is_body_only() {
        // The title must be newline-terminated to count as a line.
        assert_eq!(parse("# Hello world").err(), Some(Error::MissingTitle));

        let article =
            parse("# Hello\n> 20-10-2016\nno trailing newline").unwrap();
        assert_eq!(article.body, "no trailing newline");
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(Error::MissingTitle.to_string(), "Missing title");
        assert_eq!(Error::MissingDate.to_string(), "Missing date");
        assert_eq!(Error::MissingContent.to_string(), "Missing content");
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date("20-10-2016"), Some(date(2016, 10, 20)));
        assert_eq!(parse_date("20/10/2016"), None);
        assert_eq!(parse_date("20-10-16"), None);
        assert_eq!(parse_date("+0-10-2016"), None);
    }
}
