//! Compiles and executes [`Layout`]s, the Go-style text templates used to
//! render entries and pages.
//!
//! Every layout can call the `dir` function, which takes a directory path
//! relative to the layout's own directory and returns that directory's
//! articles, oldest first:
//!
//! ```html
//! <ul>
//! {{ range dir "posts" }}
//!   <li><a href="{{ .Path }}">{{ .Title | html }}</a></li>
//! {{ end }}
//! </ul>
//! ```
//!
//! Template functions are plain function pointers, so `dir` can't close over
//! anything. Instead, [`Layout::render`] installs a render scope holding the
//! [`Snapshot`] being rendered and the layout's directory for the duration of
//! the execution, and `dir` reads it from there.

use crate::article;
use crate::load::Snapshot;
use crate::util;
use gtmpl::{Context, Template};
use gtmpl_value::Value;
use std::cell::RefCell;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// The name of the directory-listing template function.
pub const DIR_FUNC: &str = "dir";

/// A compiled template together with the directory it was loaded from.
pub struct Layout {
    /// The template's name, typically its path relative to the content root.
    name: String,

    /// The key of the directory the template lives in. `dir` paths are
    /// resolved against it.
    base: String,

    template: Template,
}

impl Layout {
    /// Compiles `text` into a layout. `base` is the key of the directory the
    /// layout belongs to.
    pub fn compile(name: &str, base: &str, text: &str) -> Result<Layout> {
        let mut template = Template::default();
        template.add_func(DIR_FUNC, dir);
        template.parse(text).map_err(|message| Error::Parse {
            name: name.to_owned(),
            message,
        })?;
        Ok(Layout {
            name: name.to_owned(),
            base: base.to_owned(),
            template,
        })
    }

    /// Reads and compiles the template file at `path`. Returns `Ok(None)` if
    /// the file doesn't exist.
    pub fn load(path: &Path, name: &str, base: &str) -> Result<Option<Layout>> {
        match std::fs::read_to_string(path) {
            Ok(text) => Layout::compile(name, base, &text).map(Some),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Open {
                path: path.to_owned(),
                err: e,
            }),
        }
    }

    /// Like [`Layout::load`], but a missing file is an error.
    pub fn load_required(
        path: &Path,
        name: &str,
        base: &str,
    ) -> Result<Layout> {
        match std::fs::read_to_string(path) {
            Ok(text) => Layout::compile(name, base, &text),
            Err(e) => Err(Error::Open {
                path: path.to_owned(),
                err: e,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Executes the layout against `data`. `dir` calls made by the template
    /// resolve against `snapshot`.
    pub fn render(
        &self,
        snapshot: &Arc<Snapshot>,
        data: Value,
    ) -> Result<String> {
        let _scope = Scope::enter(Arc::clone(snapshot), self.base.clone());
        let context = Context::from(data)
            .map_err(|message| self.render_error(message))?;
        let mut out: Vec<u8> = Vec::new();
        self.template
            .execute(&mut out, &context)
            .map_err(|message| self.render_error(message))?;
        String::from_utf8(out).map_err(|e| self.render_error(e.to_string()))
    }

    fn render_error(&self, message: String) -> Error {
        Error::Render {
            name: self.name.clone(),
            message,
        }
    }
}

impl fmt::Debug for Layout {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Layout")
            .field("name", &self.name)
            .field("base", &self.base)
            .finish()
    }
}

struct ScopeFrame {
    snapshot: Arc<Snapshot>,
    base: String,
}

thread_local! {
    static SCOPES: RefCell<Vec<ScopeFrame>> = RefCell::new(Vec::new());
}

/// Keeps a render scope installed on the current thread until dropped.
struct Scope;

impl Scope {
    fn enter(snapshot: Arc<Snapshot>, base: String) -> Scope {
        let frame = ScopeFrame { snapshot, base };
        SCOPES.with(|scopes| scopes.borrow_mut().push(frame));
        Scope
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        SCOPES.with(|scopes| {
            scopes.borrow_mut().pop();
        });
    }
}

/// Implements the `dir` template function.
fn dir(args: &[Value]) -> std::result::Result<Value, String> {
    let relative = match args {
        [Value::String(path)] => path,
        _ => return Err(format!("{} expects a single path argument", DIR_FUNC)),
    };

    SCOPES.with(|scopes| {
        let scopes = scopes.borrow();
        let frame = scopes
            .last()
            .ok_or_else(|| format!("{} called outside of a render", DIR_FUNC))?;
        let key = util::join(&frame.base, relative).ok_or_else(|| {
            format!("directory is outside the content root: {}", relative)
        })?;
        match frame.snapshot.directory(&key) {
            Some(directory) => Ok(article::to_values(&directory.articles)),
            None => Err(format!("directory does not exist: {}", key)),
        }
    })
}

/// The result of a fallible template operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error loading, compiling, or executing a [`Layout`].
#[derive(Debug)]
pub enum Error {
    /// Returned for I/O problems while opening template files.
    Open { path: PathBuf, err: io::Error },

    /// Returned for template syntax errors.
    Parse { name: String, message: String },

    /// Returned when executing a template fails, e.g., because it lists a
    /// directory that doesn't exist.
    Render { name: String, message: String },
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Open { path, err } => {
                write!(f, "Opening template file '{}': {}", path.display(), err)
            }
            Error::Parse { name, message } => {
                write!(f, "Parsing template '{}': {}", name, message)
            }
            Error::Render { name, message } => {
                write!(f, "Rendering template '{}': {}", name, message)
            }
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Open { path: _, err } => Some(err),
            Error::Parse { .. } => None,
            Error::Render { .. } => None,
        }
    }
}
