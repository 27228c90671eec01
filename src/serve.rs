//! The HTTP server, built on `tiny_http`:
//!
//! - `/static/...` serves files from the static directory
//! - `/__reload__` reloads the content, at most once per cooldown
//! - everything else is rendered from the [`Store`] (see
//!   [`crate::render`])
//!
//! In development mode the content is reloaded before every content request
//! so edits show up without hitting the reload endpoint.

use crate::config::Config;
use crate::render::{self, Response as Rendered};
use crate::store::{self, Store};
use crate::util;
use anyhow::{anyhow, Context, Result};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tiny_http::{Header, Request, Response, Server, StatusCode};
use tracing::{error, info, warn};

/// The path of the reload endpoint.
pub const RELOAD_PATH: &str = "/__reload__";

/// The URL prefix of static files.
pub const STATIC_PREFIX: &str = "/static/";

const RELOAD_FAILED: &str =
    "Could not reload, keep serving old content. Please check server logs!";

const DEVELOPMENT_RELOAD_FAILED: &str =
    "DEVELOPMENT MODE: Unable to reload content. Please check server log";

/// A response ready to be written to the client.
#[derive(Debug)]
pub struct Reply {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,

    /// The `Location` header, for redirects.
    pub location: Option<String>,
}

impl Reply {
    fn html(status: u16, body: String) -> Reply {
        Reply {
            status,
            content_type: "text/html; charset=utf-8",
            body: body.into_bytes(),
            location: None,
        }
    }

    fn text(status: u16, body: &str) -> Reply {
        Reply {
            status,
            content_type: "text/plain; charset=utf-8",
            body: body.as_bytes().to_vec(),
            location: None,
        }
    }
}

/// Routes requests to the store, the reload endpoint, and the static
/// directory.
pub struct Router {
    store: Arc<Store>,
    static_dir: PathBuf,
    development: bool,
}

impl Router {
    pub fn new(
        store: Arc<Store>,
        static_dir: PathBuf,
        development: bool,
    ) -> Router {
        Router {
            store,
            static_dir,
            development,
        }
    }

    /// Produces the reply for a request URL (path and query).
    pub fn route(&self, url: &str) -> Reply {
        if url == RELOAD_PATH || url.starts_with("/__reload__?") {
            return self.reload();
        }
        if let Some(rest) = url.strip_prefix(STATIC_PREFIX) {
            return self.static_file(rest);
        }
        self.content(url)
    }

    fn reload(&self) -> Reply {
        match self.store.trigger_reload() {
            Ok(()) => Reply::text(200, "Reloaded!"),
            Err(store::Error::TooSoon { wait }) => Reply::text(
                400,
                &format!(
                    "Must wait {} seconds before reloading again!",
                    wait.as_secs() + 1
                ),
            ),
            Err(_) => Reply::text(500, RELOAD_FAILED),
        }
    }

    fn content(&self, url: &str) -> Reply {
        if self.development {
            if let Err(err) = self.store.reload() {
                return Reply::text(
                    500,
                    &format!("{}: {}", DEVELOPMENT_RELOAD_FAILED, err),
                );
            }
        }

        let rendered = render::render(&self.store.snapshot(), url);
        let status = rendered.status();
        match rendered {
            Rendered::Redirect(location) => Reply {
                status,
                content_type: "text/plain; charset=utf-8",
                body: Vec::new(),
                location: Some(location),
            },
            Rendered::Page(body)
            | Rendered::NotFound(body)
            | Rendered::ServerError(body) => Reply::html(status, body),
        }
    }

    fn static_file(&self, rest: &str) -> Reply {
        let not_found = || Reply::text(404, render::NOT_FOUND);
        let key = match render::entry_key(rest) {
            Some(key) if key != util::ROOT => key,
            _ => return not_found(),
        };
        let path = self.static_dir.join(&key);
        if !path.is_file() {
            return not_found();
        }
        match std::fs::read(&path) {
            Ok(body) => Reply {
                status: 200,
                content_type: guess_content_type(&path),
                body,
                location: None,
            },
            Err(err) => {
                error!(
                    path = %path.display(),
                    error = %err,
                    "reading static file"
                );
                Reply::text(500, render::SERVER_ERROR)
            }
        }
    }

    /// Handles a single HTTP request and logs its outcome.
    fn handle(&self, request: Request) {
        let started = Instant::now();
        let method = request.method().to_string();
        let url = request.url().to_owned();
        info!(method = %method, url = %url, "started request");

        let reply = recover(&url, || self.route(&url));
        let status = reply.status;
        if let Err(err) = request.respond(into_response(reply)) {
            error!(url = %url, error = %err, "writing response");
        }

        let elapsed_ms = started.elapsed().as_millis() as u64;
        if status < 400 {
            info!(
                method = %method,
                url = %url,
                status,
                elapsed_ms,
                "completed request"
            );
        } else {
            warn!(
                method = %method,
                url = %url,
                status,
                elapsed_ms,
                "completed request with error"
            );
        }
    }
}

/// Runs `route`, turning a panic into a logged `500 Server Error` reply so
/// the worker thread survives and the client still gets a response.
fn recover<F: FnOnce() -> Reply>(url: &str, route: F) -> Reply {
    match panic::catch_unwind(AssertUnwindSafe(route)) {
        Ok(reply) => reply,
        Err(payload) => {
            let message = panic_message(&*payload);
            error!(url = %url, error = %message, "handler panicked");
            Reply::text(500, render::SERVER_ERROR)
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

fn into_response(reply: Reply) -> Response<std::io::Cursor<Vec<u8>>> {
    let mut response = Response::from_data(reply.body)
        .with_status_code(StatusCode(reply.status));
    let content_type = reply.content_type.as_bytes();
    if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], content_type) {
        response = response.with_header(header);
    }
    if let Some(location) = reply.location {
        let location = location.as_bytes();
        if let Ok(header) = Header::from_bytes(&b"Location"[..], location) {
            response = response.with_header(header);
        }
    }
    response
}

/// Guess MIME content type from file extension.
fn guess_content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js" | "mjs") => "application/javascript; charset=utf-8",
        Some("json") => "application/json; charset=utf-8",
        Some("xml") => "application/xml; charset=utf-8",
        Some("txt") => "text/plain; charset=utf-8",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("ico") => "image/x-icon",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        _ => "application/octet-stream",
    }
}

/// Serves the store until Ctrl+C is received. Requests are handled by a
/// pool of worker threads sharing the listening socket.
pub fn serve(config: &Config, store: Arc<Store>) -> Result<()> {
    let server = Server::http(config.listen_addr.as_str())
        .map_err(|e| anyhow!("Listening on {}: {}", config.listen_addr, e))?;
    let server = Arc::new(server);

    let server_for_signal = Arc::clone(&server);
    ctrlc::set_handler(move || {
        info!("shutting down");
        server_for_signal.unblock();
    })
    .context("Failed to set Ctrl+C handler")?;

    if config.development {
        warn!("development mode, content reloads on every request");
    }
    info!(addr = %config.listen_addr, "server is listening");

    let router = Arc::new(Router::new(
        store,
        config.static_dir.clone(),
        config.development,
    ));
    let workers = thread::available_parallelism().map_or(4, |n| n.get());
    let handles: Vec<_> = (0..workers)
        .map(|_| {
            let server = Arc::clone(&server);
            let router = Arc::clone(&router);
            thread::spawn(move || {
                for request in server.incoming_requests() {
                    router.handle(request);
                }
            })
        })
        .collect();

    for handle in handles {
        if handle.join().is_err() {
            error!("worker thread panicked");
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::load::test::{post, site, write};
    use std::time::Duration;

    fn router(root: &Path, development: bool, cooldown: Duration) -> Router {
        site(&root.join("content"));
        write(root, "static/style.css", "body {}");
        let store = Store::new(root.join("content"), cooldown).unwrap();
        Router::new(Arc::new(store), root.join("static"), development)
    }

    #[test]
    fn test_route_content() {
        let dir = tempfile::tempdir().unwrap();
        let router = router(dir.path(), false, store::DEFAULT_COOLDOWN);

        let reply = router.route("/posts/first");
        assert_eq!(reply.status, 200);
        assert_eq!(reply.body, b"<html>post:First</html>".to_vec());

        let reply = router.route("/posts");
        assert_eq!(reply.status, 301);
        assert_eq!(reply.location.as_deref(), Some("/posts/"));

        assert_eq!(router.route("/nope").status, 404);
    }

    #[test]
    fn test_route_static() {
        let dir = tempfile::tempdir().unwrap();
        let router = router(dir.path(), false, store::DEFAULT_COOLDOWN);

        let reply = router.route("/static/style.css");
        assert_eq!(reply.status, 200);
        assert_eq!(reply.content_type, "text/css; charset=utf-8");
        assert_eq!(reply.body, b"body {}".to_vec());

        assert_eq!(router.route("/static/missing.css").status, 404);
        assert_eq!(router.route("/static/../content/index.md").status, 404);
        assert_eq!(router.route("/static/").status, 404);
    }

    #[test]
    fn test_route_reload_throttled() {
        let dir = tempfile::tempdir().unwrap();
        let cooldown = Duration::from_millis(200);
        let router = router(dir.path(), false, cooldown);

        assert_eq!(router.route(RELOAD_PATH).status, 400);
        thread::sleep(cooldown + Duration::from_millis(50));
        let reply = router.route(RELOAD_PATH);
        assert_eq!(reply.status, 200);
        assert_eq!(reply.body, b"Reloaded!".to_vec());
        assert_eq!(router.route(RELOAD_PATH).status, 400);

        thread::sleep(cooldown + Duration::from_millis(50));
        write(&dir.path().join("content"), "posts/bad.md", "bad\n");
        assert_eq!(router.route(RELOAD_PATH).status, 500);
        // old content keeps serving
        assert_eq!(router.route("/posts/first").status, 200);
    }

    #[test]
    fn test_development_mode_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let router = router(dir.path(), true, store::DEFAULT_COOLDOWN);
        let content = dir.path().join("content");

        assert_eq!(router.route("/posts/third").status, 404);
        write(&content, "posts/third.md", &post("Third", "22-10-2016"));
        assert_eq!(router.route("/posts/third").status, 200);

        write(&content, "posts/bad.md", "bad\n");
        assert_eq!(router.route("/posts/third").status, 500);
    }

    #[test]
    fn test_recover_from_panic() {
        let reply = recover("/boom", || panic!("template blew up"));
        assert_eq!(reply.status, 500);
        assert_eq!(reply.body, render::SERVER_ERROR.as_bytes().to_vec());

        let message = String::from("formatted panic");
        let reply = recover("/boom", move || panic!("{}", message));
        assert_eq!(reply.status, 500);

        let reply = recover("/fine", || Reply::text(200, "ok"));
        assert_eq!(reply.status, 200);
        assert_eq!(reply.body, b"ok".to_vec());
    }
}
