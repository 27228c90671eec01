//! Turns request paths into [`Response`]s. An entry is rendered in two
//! passes: the article through the entry's layout, then the resulting
//! fragment through the main layout.

use crate::load::{Entry, Snapshot};
use crate::util;
use gtmpl_value::Value;
use std::sync::Arc;
use tracing::error;

/// The message rendered through the main layout for unknown paths.
pub const NOT_FOUND: &str = "404 Not Found";

/// The message rendered through the main layout when rendering fails.
pub const SERVER_ERROR: &str = "500 Server Error";

/// The outcome of rendering a request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// A rendered page.
    Page(String),

    /// The request named a directory index without a trailing slash; the
    /// client should be sent to the contained location.
    Redirect(String),

    /// No entry exists for the path. Holds the rendered not-found page.
    NotFound(String),

    /// Rendering the entry failed. Holds the rendered error page; the
    /// underlying error is logged, not exposed.
    ServerError(String),
}

impl Response {
    /// The HTTP status code matching the response.
    pub fn status(&self) -> u16 {
        match self {
            Response::Page(_) => 200,
            Response::Redirect(_) => 301,
            Response::NotFound(_) => 404,
            Response::ServerError(_) => 500,
        }
    }
}

/// Converts a request path (e.g., `/posts/hello?x=1`) into an entry key
/// (e.g., `posts/hello`). Returns `None` for paths that can't name an entry.
pub fn entry_key(request_path: &str) -> Option<String> {
    let path = strip_query(request_path);
    let decoded = urlencoding::decode(path).ok()?;
    util::clean(&decoded)
}

fn strip_query(request_path: &str) -> &str {
    request_path.split('?').next().unwrap_or(request_path)
}

/// Renders the entry addressed by `request_path` from `snapshot`.
/// Directory indexes are only rendered at their canonical URL (`/posts/`);
/// any other spelling that resolves to one is redirected there.
pub fn render(snapshot: &Arc<Snapshot>, request_path: &str) -> Response {
    let key = match entry_key(request_path) {
        Some(key) => key,
        None => return Response::NotFound(wrap(snapshot, NOT_FOUND)),
    };
    let entry = match snapshot.entry(&key) {
        Some(entry) => entry,
        None => return Response::NotFound(wrap(snapshot, NOT_FOUND)),
    };

    let path = strip_query(request_path);
    if entry.is_dir {
        let canonical = util::directory_url(&key);
        let decoded = urlencoding::decode(path).ok();
        if decoded.as_deref() != Some(canonical.as_str()) {
            return Response::Redirect(encode_path(&canonical));
        }
    }

    match render_entry(snapshot, entry) {
        Ok(page) => Response::Page(page),
        Err(err) => {
            error!(path = %path, error = %err, "rendering entry");
            Response::ServerError(wrap(snapshot, SERVER_ERROR))
        }
    }
}

/// Percent-encodes each segment of a slash-separated URL path.
fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn render_entry(
    snapshot: &Arc<Snapshot>,
    entry: &Entry,
) -> crate::template::Result<String> {
    let fragment = entry
        .layout
        .render(snapshot, Value::from(entry.article.as_ref()))?;
    snapshot.main_layout.render(snapshot, Value::String(fragment))
}

/// Renders `message` through the main layout, falling back to the bare
/// message if the main layout fails.
fn wrap(snapshot: &Arc<Snapshot>, message: &str) -> String {
    snapshot
        .main_layout
        .render(snapshot, Value::String(message.to_owned()))
        .unwrap_or_else(|err| {
            error!(error = %err, "rendering main layout");
            message.to_owned()
        })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::load::test::{post, site, write};
    use crate::load::{self, MAIN_LAYOUT};

    fn snapshot(root: &std::path::Path) -> Arc<Snapshot> {
        Arc::new(load::load(root).unwrap())
    }

    #[test]
    fn test_entry_key() {
        assert_eq!(entry_key("/"), Some(String::from(".")));
        assert_eq!(entry_key("/posts/"), Some(String::from("posts")));
        assert_eq!(
            entry_key("/posts/first?page=2"),
            Some(String::from("posts/first"))
        );
        assert_eq!(entry_key("/my%20post"), Some(String::from("my post")));
        assert_eq!(entry_key("/../secret"), None);
    }

    #[test]
    fn test_render_page() {
        let dir = tempfile::tempdir().unwrap();
        site(dir.path());
        let snapshot = snapshot(dir.path());

        let response = render(&snapshot, "/posts/first");
        let page = String::from("<html>post:First</html>");
        assert_eq!(response, Response::Page(page));
        assert_eq!(response.status(), 200);

        // rendering is a pure function of the snapshot and the entry
        assert_eq!(render(&snapshot, "/posts/first"), response);

        assert_eq!(
            render(&snapshot, "/"),
            Response::Page(String::from("<html>root:Home</html>"))
        );
        assert_eq!(
            render(&snapshot, "/posts/"),
            Response::Page(String::from("<html>First;Second;</html>"))
        );
    }

    #[test]
    fn test_render_redirects_directory_index() {
        let dir = tempfile::tempdir().unwrap();
        site(dir.path());
        let snapshot = snapshot(dir.path());

        let response = render(&snapshot, "/posts");
        assert_eq!(response, Response::Redirect(String::from("/posts/")));
        assert_eq!(response.status(), 301);

        let posts = Response::Redirect(String::from("/posts/"));
        assert_eq!(render(&snapshot, "/posts?page=2"), posts);
        assert_eq!(render(&snapshot, "/posts//"), posts);
        assert_eq!(render(&snapshot, "/posts/./"), posts);
        let page = render(&snapshot, "/posts/?page=2");
        assert!(matches!(page, Response::Page(_)));
    }

    #[test]
    fn test_redirect_stays_on_site() {
        let dir = tempfile::tempdir().unwrap();
        site(dir.path());
        write(dir.path(), "my notes/index.md", &post("Notes", "01-01-2016"));
        let snapshot = snapshot(dir.path());

        // cleans to the root index; the raw path would leave the site
        assert_eq!(
            render(&snapshot, "//evil.example/.."),
            Response::Redirect(String::from("/"))
        );
        assert_eq!(
            render(&snapshot, "//evil.example/../posts"),
            Response::Redirect(String::from("/posts/"))
        );
        assert_eq!(
            render(&snapshot, "/my%20notes"),
            Response::Redirect(String::from("/my%20notes/"))
        );
        assert!(matches!(
            render(&snapshot, "/my%20notes/"),
            Response::Page(_)
        ));
    }

    #[test]
    fn test_render_not_found() {
        let dir = tempfile::tempdir().unwrap();
        site(dir.path());
        let snapshot = snapshot(dir.path());

        let response = render(&snapshot, "/posts/missing");
        assert_eq!(
            response,
            Response::NotFound(String::from("<html>404 Not Found</html>"))
        );
        assert_eq!(response.status(), 404);

        // directories without an index aren't entries
        let not_found = |path| render(&snapshot, path).status() == 404;
        assert!(not_found("/posts/2016/"));
        assert!(not_found("/../etc/passwd"));
    }

    #[test]
    fn test_render_error_is_not_leaked() {
        let dir = tempfile::tempdir().unwrap();
        site(dir.path());
        let broken = "{{ range dir \"nowhere\" }}{{ end }}";
        write(dir.path(), "about.tpl.html", broken);
        let snapshot = snapshot(dir.path());

        let response = render(&snapshot, "/about");
        assert_eq!(
            response,
            Response::ServerError(String::from("<html>500 Server Error</html>"))
        );
        assert_eq!(response.status(), 500);
    }

    #[test]
    fn test_broken_main_layout_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        site(dir.path());
        let broken = "{{ range dir \"nowhere\" }}{{ end }}{{ . }}";
        write(dir.path(), MAIN_LAYOUT, broken);
        let snapshot = snapshot(dir.path());

        assert_eq!(
            render(&snapshot, "/missing"),
            Response::NotFound(String::from(NOT_FOUND))
        );
        assert_eq!(
            render(&snapshot, "/about"),
            Response::ServerError(String::from(SERVER_ERROR))
        );
    }
}
