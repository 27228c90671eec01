//! Exports the [`load`] function, which walks a content directory and builds
//! a [`Snapshot`]: every directory, every article, and the layouts used to
//! render them. A content directory looks like this:
//!
//! ```text
//! content/
//! ├── _layout_main.tpl.html   # Main layout, wraps every page (required)
//! ├── _layout.tpl.html        # Directory layout (optional)
//! ├── index.md                # Index entry for the root, served at `/`
//! ├── about.md                # Served at `/about`
//! ├── about.tpl.html          # Layout for `about.md` only (optional)
//! └── posts/
//!     ├── _layout.tpl.html
//!     ├── index.md            # Served at `/posts/`
//!     └── hello.md            # Served at `/posts/hello`
//! ```
//!
//! An article without its own layout uses the layout of the nearest
//! directory, starting with the one holding the article and moving up
//! towards the root. Loading fails if no such directory exists.
//!
//! Loading is all-or-nothing: any error aborts the load and no snapshot is
//! produced.

use crate::article::{self, Article};
use crate::parser;
use crate::template::{self, Layout};
use crate::util;
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use walkdir::WalkDir;

/// The file name of the main layout at the content root.
pub const MAIN_LAYOUT: &str = "_layout_main.tpl.html";

/// The file name of a directory's layout.
pub const DIRECTORY_LAYOUT: &str = "_layout.tpl.html";

/// The extension of article source files.
pub const ARTICLE_EXTENSION: &str = "md";

/// The suffix of per-article layout files, which share the article's base
/// name (e.g., `hello.tpl.html` for `hello.md`).
pub const TEMPLATE_SUFFIX: &str = ".tpl.html";

/// The base name of a directory's index article.
pub const INDEX: &str = "index";

/// An addressable unit of content: an article and the layout that renders
/// it.
#[derive(Debug)]
pub struct Entry {
    pub article: Arc<Article>,
    pub layout: Arc<Layout>,

    /// Whether the entry is its directory's index article.
    pub is_dir: bool,
}

/// A folder in the content tree.
#[derive(Debug)]
pub struct Directory {
    /// The directory's key (its path relative to the content root).
    pub path: String,

    /// The directory's own layout, if it has one.
    pub layout: Option<Arc<Layout>>,

    /// The directory's articles keyed by their source path relative to the
    /// content root (e.g., `posts/hello.md`). The index article is not
    /// included.
    pub entries: HashMap<String, Arc<Entry>>,

    /// The articles of `entries`, oldest first.
    pub articles: Vec<Arc<Article>>,
}

/// An immutable view of the whole content tree.
#[derive(Debug)]
pub struct Snapshot {
    pub main_layout: Arc<Layout>,

    /// All entries keyed by their path relative to the content root, less
    /// the extension. Index entries are keyed by their directory's path.
    pub entries: HashMap<String, Arc<Entry>>,

    /// All directories keyed by their path relative to the content root.
    pub directories: HashMap<String, Arc<Directory>>,

    /// All articles, oldest first.
    pub articles: Vec<Arc<Article>>,
}

impl Snapshot {
    pub fn entry(&self, key: &str) -> Option<&Arc<Entry>> {
        self.entries.get(key)
    }

    pub fn directory(&self, key: &str) -> Option<&Arc<Directory>> {
        self.directories.get(key)
    }

    #[cfg(test)]
    pub(crate) fn empty() -> Snapshot {
        Snapshot {
            main_layout: Arc::new(
                Layout::compile("main", util::ROOT, "{{ . }}").unwrap(),
            ),
            entries: HashMap::new(),
            directories: HashMap::new(),
            articles: Vec::new(),
        }
    }
}

/// Loads the content tree rooted at `root` into a [`Snapshot`].
pub fn load(root: &Path) -> Result<Snapshot> {
    let main_layout = Layout::load_required(
        &root.join(MAIN_LAYOUT),
        MAIN_LAYOUT,
        util::ROOT,
    )?;

    let mut walk = Walk {
        root,
        directories: HashMap::new(),
        articles: Vec::new(),
    };

    // Directories must be registered before their contents. `WalkDir` yields
    // a directory before anything inside it unless `contents_first` is set.
    for result in WalkDir::new(root)
        .contents_first(false)
        .sort_by(|a, b| a.file_name().cmp(b.file_name()))
    {
        let dirent = result?;
        let is_article = dirent
            .path()
            .extension()
            .map_or(false, |ext| ext == ARTICLE_EXTENSION);
        if dirent.file_type().is_dir() {
            walk.visit_directory(dirent.path())?;
        } else if is_article {
            walk.visit_article(dirent.path())?;
        }
    }

    let snapshot = walk.finish(Arc::new(main_layout))?;
    info!(
        root = %root.display(),
        directories = snapshot.directories.len(),
        entries = snapshot.entries.len(),
        "loaded content"
    );
    Ok(snapshot)
}

/// The state accumulated while walking the content tree.
struct Walk<'a> {
    root: &'a Path,
    directories: HashMap<String, Directory>,
    articles: Vec<LoadedArticle>,
}

/// An article whose layout hasn't been resolved yet.
struct LoadedArticle {
    /// The entry key.
    key: String,

    /// The source path relative to the content root.
    file: String,

    /// The key of the directory holding the source file.
    directory: String,

    article: Article,
    layout: Option<Arc<Layout>>,
    is_dir: bool,
}

impl Walk<'_> {
    fn relative_key(&self, path: &Path) -> Result<String> {
        path.strip_prefix(self.root)
            .ok()
            .and_then(util::key_from_path)
            .ok_or_else(|| Error::InvalidPath(path.to_owned()))
    }

    fn visit_directory(&mut self, path: &Path) -> Result<()> {
        let key = self.relative_key(path)?;
        let layout = Layout::load(
            &path.join(DIRECTORY_LAYOUT),
            &layout_name(&key, DIRECTORY_LAYOUT),
            &key,
        )?;
        debug!(directory = %key, layout = layout.is_some(), "loaded directory");

        self.directories.insert(
            key.clone(),
            Directory {
                path: key,
                layout: layout.map(Arc::new),
                entries: HashMap::new(),
                articles: Vec::new(),
            },
        );
        Ok(())
    }

    fn visit_article(&mut self, path: &Path) -> Result<()> {
        let file = self.relative_key(path)?;
        let directory = util::parent(&file).unwrap_or(util::ROOT).to_owned();
        let stem = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| Error::InvalidPath(path.to_owned()))?;
        let stripped = &file[..file.len() - ARTICLE_EXTENSION.len() - 1];

        let is_dir = stem == INDEX;
        let (key, url_path) = match is_dir {
            true => (directory.clone(), util::directory_url(&directory)),
            false => (stripped.to_owned(), format!("/{}", stripped)),
        };

        if !self.directories.contains_key(&directory) {
            return Err(Error::MissingDirectory {
                directory,
                article: path.to_owned(),
            });
        }

        let input = std::fs::read_to_string(path).map_err(|err| Error::Read {
            path: path.to_owned(),
            err,
        })?;
        let mut article = parser::parse(&input).map_err(|err| Error::Parse {
            path: path.to_owned(),
            err,
        })?;
        article.path = url_path;

        let template_file = format!("{}{}", stem, TEMPLATE_SUFFIX);
        let layout = Layout::load(
            &path.with_file_name(&template_file),
            &layout_name(&directory, &template_file),
            &directory,
        )?;
        debug!(
            article = %file,
            key = %key,
            layout = layout.is_some(),
            "loaded article"
        );

        self.articles.push(LoadedArticle {
            key,
            file,
            directory,
            article,
            layout: layout.map(Arc::new),
            is_dir,
        });
        Ok(())
    }

    /// Resolves inherited layouts, links entries into their directories, and
    /// sorts the article lists.
    fn finish(self, main_layout: Arc<Layout>) -> Result<Snapshot> {
        let Walk {
            mut directories,
            articles,
            ..
        } = self;

        let mut entries = HashMap::with_capacity(articles.len());
        for loaded in articles {
            // An index isn't an article of the directory it indexes, so it
            // inherits from the directory above.
            let start = match loaded.is_dir {
                true => util::parent(&loaded.key).unwrap_or(util::ROOT),
                false => loaded.directory.as_str(),
            };
            let layout = match loaded.layout {
                Some(layout) => layout,
                None => inherit_layout(&directories, start)
                    .ok_or_else(|| Error::NoLayout(loaded.key.clone()))?,
            };
            let entry = Arc::new(Entry {
                article: Arc::new(loaded.article),
                layout,
                is_dir: loaded.is_dir,
            });
            if !loaded.is_dir {
                let directory = directories.get_mut(&loaded.directory);
                if let Some(directory) = directory {
                    directory.entries.insert(loaded.file, Arc::clone(&entry));
                }
            }
            entries.insert(loaded.key, entry);
        }

        let directories = directories
            .into_iter()
            .map(|(key, mut directory)| {
                directory.articles =
                    sorted_articles(directory.entries.values());
                (key, Arc::new(directory))
            })
            .collect();

        Ok(Snapshot {
            main_layout,
            articles: sorted_articles(entries.values()),
            entries,
            directories,
        })
    }
}

/// Finds the layout of the nearest directory, starting at `key` and walking
/// up towards the root.
fn inherit_layout(
    directories: &HashMap<String, Directory>,
    key: &str,
) -> Option<Arc<Layout>> {
    let mut current = Some(key);
    while let Some(key) = current {
        let layout = directories.get(key).and_then(|d| d.layout.as_ref());
        if let Some(layout) = layout {
            return Some(Arc::clone(layout));
        }
        current = util::parent(key);
    }
    None
}

fn sorted_articles<'a>(
    entries: impl Iterator<Item = &'a Arc<Entry>>,
) -> Vec<Arc<Article>> {
    let mut articles: Vec<Arc<Article>> =
        entries.map(|e| Arc::clone(&e.article)).collect();
    article::sort_by_date(&mut articles);
    articles
}

fn layout_name(directory: &str, file_name: &str) -> String {
    match directory == util::ROOT {
        true => file_name.to_owned(),
        false => format!("{}/{}", directory, file_name),
    }
}

/// The result of a fallible load operation.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for loading a content tree. Any of these aborts the load.
#[derive(Debug)]
pub enum Error {
    /// Returned when a layout can't be read or compiled.
    Template(template::Error),

    /// Returned when an article source file can't be read.
    Read { path: PathBuf, err: io::Error },

    /// Returned when an article source file is malformed.
    Parse { path: PathBuf, err: parser::Error },

    /// Returned for errors walking the content directory.
    WalkDir(walkdir::Error),

    /// Returned for paths that can't be expressed as keys (e.g., non-UTF-8
    /// file names).
    InvalidPath(PathBuf),

    /// Returned when an article is found before its directory was
    /// registered.
    MissingDirectory { directory: String, article: PathBuf },

    /// Returned when no layout applies to an entry.
    NoLayout(String),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Template(err) => err.fmt(f),
            Error::Read { path, err } => {
                write!(f, "Reading article '{}': {}", path.display(), err)
            }
            Error::Parse { path, err } => {
                write!(f, "Parsing article '{}': {}", path.display(), err)
            }
            Error::WalkDir(err) => err.fmt(f),
            Error::InvalidPath(path) => write!(f, "Invalid path: {:?}", path),
            Error::MissingDirectory { directory, article } => write!(
                f,
                "Directory '{}' not registered before article '{}'",
                directory,
                article.display()
            ),
            Error::NoLayout(key) => {
                write!(f, "No layout found for entry '{}'", key)
            }
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Template(err) => Some(err),
            Error::Read { path: _, err } => Some(err),
            Error::Parse { path: _, err } => Some(err),
            Error::WalkDir(err) => Some(err),
            Error::InvalidPath(_) => None,
            Error::MissingDirectory { .. } => None,
            Error::NoLayout(_) => None,
        }
    }
}

impl From<template::Error> for Error {
    /// Converts [`template::Error`]s into [`Error`]. This allows us to use the
    /// `?` operator.
    fn from(err: template::Error) -> Error {
        Error::Template(err)
    }
}

impl From<walkdir::Error> for Error {
    /// Converts [`walkdir::Error`]s into [`Error`]. This allows us to use the
    /// `?` operator.
    fn from(err: walkdir::Error) -> Error {
        Error::WalkDir(err)
    }
}
