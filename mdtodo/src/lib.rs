//! Markdown checklist index.
//! Scans a workspace for `- [ ]` style items grouped under headings, keeps an ordered
//! in-memory tree of them in sync with file changes, and projects it into display rows.

pub mod core {
    use serde::{Deserialize, Serialize};
    use std::{
        fmt,
        path::{Path, PathBuf},
    };

    /* ------------------------------ Aggregate ------------------------------ */

    /// Aggregate root: every checklist item found in one Markdown file.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct TodoFile {
        /// Absolute path of the source document.
        pub path: PathBuf,

        /// Items that appear before the first heading.
        #[serde(default)]
        pub headless_todos: Vec<Todo>,

        /// Headings that own at least one item, in document order.
        #[serde(default)]
        pub heads: Vec<Head>,
    }

    impl TodoFile {
        pub fn new(path: PathBuf) -> Self {
            Self {
                path,
                headless_todos: vec![],
                heads: vec![],
            }
        }

        /// A file with neither headless items nor heads is never cached.
        pub fn is_empty(&self) -> bool {
            self.headless_todos.is_empty() && self.heads.is_empty()
        }

        /// All items in document order.
        pub fn todos(&self) -> impl Iterator<Item = &Todo> {
            self.headless_todos
                .iter()
                .chain(self.heads.iter().flat_map(|head| head.todos.iter()))
        }

        pub fn counts(&self) -> Counts {
            Counts::of(self.todos())
        }

        pub fn id(&self) -> String {
            self.path.display().to_string()
        }

        pub fn todo_at(&self, line: usize) -> Option<&Todo> {
            self.todos().find(|todo| todo.line == line)
        }
    }

    /* ------------------------------ Entities ------------------------------ */

    /// A Markdown heading and the items written below it.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Head {
        pub text: String,
        /// 0-based source line.
        pub line: usize,
        /// Owning file, by path.
        pub file: PathBuf,
        #[serde(default)]
        pub todos: Vec<Todo>,
    }

    impl Head {
        pub fn new(file: &Path, text: &str, line: usize) -> Self {
            Self {
                text: text.to_string(),
                line,
                file: file.to_path_buf(),
                todos: vec![],
            }
        }

        pub fn counts(&self) -> Counts {
            Counts::of(&self.todos)
        }

        pub fn id(&self) -> String {
            node_id(&self.file, self.line)
        }
    }

    /// One checklist line.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Todo {
        pub text: String,
        pub checked: bool,
        /// 0-based source line.
        pub line: usize,
        /// Whitespace before the bullet, verbatim.
        pub indent: String,
        /// Owning file, by path.
        pub file: PathBuf,
    }

    impl Todo {
        pub fn id(&self) -> String {
            node_id(&self.file, self.line)
        }

        pub fn location(&self) -> Location {
            Location {
                path: self.file.clone(),
                line: self.line,
            }
        }
    }

    /* --------------------------- Value objects --------------------------- */

    /// Checked/unchecked tallies for a file or a heading.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Counts {
        pub checked: usize,
        pub unchecked: usize,
    }

    impl Counts {
        pub fn of<'a>(todos: impl IntoIterator<Item = &'a Todo>) -> Self {
            todos.into_iter().fold(Self::default(), |mut counts, todo| {
                if todo.checked {
                    counts.checked += 1;
                } else {
                    counts.unchecked += 1;
                }
                counts
            })
        }

        pub fn total(&self) -> usize {
            self.checked + self.unchecked
        }
    }

    /// Where a navigation sink should put the cursor.
    #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct Location {
        pub path: PathBuf,
        /// 0-based source line.
        pub line: usize,
    }

    impl fmt::Display for Location {
        // Editors count lines from 1.
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}:{}", self.path.display(), self.line + 1)
        }
    }

    /// Composite key shared by heads and todos: `<path>:<line>`.
    pub fn node_id(path: &Path, line: usize) -> String {
        format!("{}:{}", path.display(), line)
    }

    /// Inverse of [`node_id`]. Splits on the last `:` so drive prefixes survive.
    pub fn parse_node_id(id: &str) -> Option<(PathBuf, usize)> {
        let (path, line) = id.rsplit_once(':')?;
        if path.is_empty() {
            return None;
        }
        Some((PathBuf::from(path), line.parse().ok()?))
    }

    /* ---------------------------- Errors (domain) ---------------------------- */

    #[derive(Debug, thiserror::Error)]
    pub enum IndexError {
        #[error("reading {path:?}: {source}")]
        Read {
            path: PathBuf,
            source: std::io::Error,
        },
        #[error("invalid glob {pattern:?}: {source}")]
        Glob {
            pattern: String,
            source: globset::Error,
        },
        #[error("walking {root:?}: {source}")]
        Walk {
            root: PathBuf,
            source: walkdir::Error,
        },
        #[error("watching {path:?}: {source}")]
        Watch {
            path: PathBuf,
            source: notify::Error,
        },
        #[error("parsing config {path:?}: {source}")]
        Config {
            path: PathBuf,
            source: serde_json::Error,
        },
    }

}

pub mod config {
    //! Scan settings. `ScanConfig` is the serialisable form read from `.mdtodo.json`;
    //! `ScanRules` is the compiled form the scanner and watcher match against.

    use crate::core::IndexError;
    use globset::{Glob, GlobMatcher};
    use serde::{Deserialize, Serialize};
    use std::{fs, io, path::Path};

    pub const CONFIG_FILE_NAME: &str = ".mdtodo.json";
    pub const DEFAULT_INCLUDE: &str = "**/*.md";

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(default)]
    pub struct ScanConfig {
        /// Root-relative glob a file must match to be indexed.
        pub include: String,
        /// Root-relative globs; each is evaluated as its own rule.
        pub exclude: Vec<String>,
        /// Whether to follow symlinks while scanning.
        pub follow_symlinks: bool,
    }

    impl Default for ScanConfig {
        fn default() -> Self {
            Self {
                include: DEFAULT_INCLUDE.into(),
                exclude: vec![
                    "**/node_modules/**".into(),
                    "**/bower_components/**".into(),
                    "**/.git/**".into(),
                ],
                follow_symlinks: false,
            }
        }
    }

    impl ScanConfig {
        /// Read a config file. A missing file yields the defaults.
        pub fn load(path: &Path) -> Result<Self, IndexError> {
            match fs::read_to_string(path) {
                Ok(text) => serde_json::from_str(&text).map_err(|source| IndexError::Config {
                    path: path.to_path_buf(),
                    source,
                }),
                Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
                Err(source) => Err(IndexError::Read {
                    path: path.to_path_buf(),
                    source,
                }),
            }
        }

        /// Load `<root>/.mdtodo.json`.
        pub fn discover(root: &Path) -> Result<Self, IndexError> {
            Self::load(&root.join(CONFIG_FILE_NAME))
        }

        pub fn compile(&self) -> Result<ScanRules, IndexError> {
            Ok(ScanRules {
                include: compile_glob(&self.include)?,
                excludes: self
                    .exclude
                    .iter()
                    .map(|pattern| ExcludeRule::new(pattern))
                    .collect::<Result<_, _>>()?,
                follow_symlinks: self.follow_symlinks,
            })
        }
    }

    #[derive(Debug, Clone)]
    pub struct ScanRules {
        pub include: GlobMatcher,
        pub excludes: Vec<ExcludeRule>,
        pub follow_symlinks: bool,
    }

    impl ScanRules {
        pub fn includes(&self, rel: &Path) -> bool {
            self.include.is_match(rel)
        }

        /// Included and not hit by any exclude rule.
        pub fn accepts(&self, rel: &Path) -> bool {
            self.includes(rel) && !self.excludes.iter().any(|rule| rule.excludes(rel))
        }
    }

    #[derive(Debug, Clone)]
    pub struct ExcludeRule {
        pattern: String,
        matcher: GlobMatcher,
    }

    impl ExcludeRule {
        pub fn new(pattern: &str) -> Result<Self, IndexError> {
            Ok(Self {
                pattern: pattern.to_string(),
                matcher: compile_glob(pattern)?,
            })
        }

        pub fn pattern(&self) -> &str {
            &self.pattern
        }

        /// A rule excludes a path when it matches the path or one of its ancestor folders,
        /// so `**/node_modules` hides everything below such a folder.
        pub fn excludes(&self, rel: &Path) -> bool {
            rel.ancestors()
                .filter(|p| !p.as_os_str().is_empty())
                .any(|p| self.matcher.is_match(p))
        }
    }

    fn compile_glob(pattern: &str) -> Result<GlobMatcher, IndexError> {
        Glob::new(pattern)
            .map(|glob| glob.compile_matcher())
            .map_err(|source| IndexError::Glob {
                pattern: pattern.to_string(),
                source,
            })
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use std::path::Path;

        #[test]
        fn missing_file_yields_defaults() {
            let tmp = tempfile::tempdir().expect("tempdir");
            let config = ScanConfig::discover(tmp.path()).expect("load");
            assert_eq!(config, ScanConfig::default());
        }

        #[test]
        fn partial_file_keeps_unset_fields_at_default() {
            let tmp = tempfile::tempdir().expect("tempdir");
            std::fs::write(
                tmp.path().join(CONFIG_FILE_NAME),
                r#"{ "exclude": ["drafts/**"] }"#,
            )
            .expect("write config");

            let config = ScanConfig::discover(tmp.path()).expect("load");
            assert_eq!(config.include, DEFAULT_INCLUDE);
            assert_eq!(config.exclude, vec!["drafts/**".to_string()]);
            assert!(!config.follow_symlinks);
        }

        #[test]
        fn malformed_file_is_a_config_error() {
            let tmp = tempfile::tempdir().expect("tempdir");
            let path = tmp.path().join(CONFIG_FILE_NAME);
            std::fs::write(&path, "{ not json").expect("write config");
            assert!(matches!(
                ScanConfig::load(&path),
                Err(IndexError::Config { .. })
            ));
        }

        #[test]
        fn bad_glob_is_reported_with_its_pattern() {
            let config = ScanConfig {
                exclude: vec!["a[".into()],
                ..ScanConfig::default()
            };
            match config.compile() {
                Err(IndexError::Glob { pattern, .. }) => assert_eq!(pattern, "a["),
                other => panic!("expected glob error, got {:?}", other),
            }
        }

        #[test]
        fn exclude_rules_cover_descendants_of_matching_folders() {
            let rule = ExcludeRule::new("**/node_modules").expect("rule");
            assert!(rule.excludes(Path::new("node_modules/pkg/README.md")));
            assert!(rule.excludes(Path::new("web/node_modules/x.md")));
            assert!(!rule.excludes(Path::new("web/notes.md")));
        }

        #[test]
        fn default_rules_accept_markdown_outside_excluded_folders() {
            let rules = ScanConfig::default().compile().expect("compile");
            assert!(rules.accepts(Path::new("README.md")));
            assert!(rules.accepts(Path::new("docs/plan.md")));
            assert!(!rules.accepts(Path::new("docs/plan.txt")));
            assert!(!rules.accepts(Path::new(".git/COMMIT_EDITMSG.md")));
        }
    }
}

pub mod storage {
    //! Collaborator seams: where file paths and file text come from.

    use crate::config::ExcludeRule;
    use crate::core::IndexError;
    use crate::indexer::split_lines;
    use globset::GlobMatcher;
    use std::{
        borrow::Cow,
        fs,
        path::{Path, PathBuf},
    };
    use tracing::{debug, warn};
    use walkdir::WalkDir;

    /// Lists files below a root.
    pub trait FileEnumerator {
        /// Absolute paths under `root` whose root-relative path matches `include` and is
        /// not hit by `exclude`.
        fn find_files(
            &self,
            root: &Path,
            include: &GlobMatcher,
            exclude: Option<&ExcludeRule>,
        ) -> Result<Vec<PathBuf>, IndexError>;
    }

    /// Reads a document as lines without their terminators.
    pub trait TextReader {
        fn read_lines(&self, path: &Path) -> Result<Vec<String>, IndexError>;
    }

    /// `walkdir`-backed enumerator. Excluded folders are pruned, not descended.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct WalkEnumerator {
        pub follow_symlinks: bool,
    }

    impl FileEnumerator for WalkEnumerator {
        fn find_files(
            &self,
            root: &Path,
            include: &GlobMatcher,
            exclude: Option<&ExcludeRule>,
        ) -> Result<Vec<PathBuf>, IndexError> {
            let walker = WalkDir::new(root)
                .follow_links(self.follow_symlinks)
                .into_iter()
                .filter_entry(|entry| match (exclude, entry.path().strip_prefix(root)) {
                    (Some(rule), Ok(rel)) if !rel.as_os_str().is_empty() => !rule.excludes(rel),
                    _ => true,
                });

            let mut out = Vec::new();
            for entry in walker {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(source) if source.depth() == 0 => {
                        return Err(IndexError::Walk {
                            root: root.to_path_buf(),
                            source,
                        });
                    }
                    Err(err) => {
                        warn!(error = %err, "skipping unreadable directory entry");
                        continue;
                    }
                };
                if !entry.file_type().is_file() {
                    continue;
                }
                let Ok(rel) = entry.path().strip_prefix(root) else {
                    continue;
                };
                if include.is_match(rel) {
                    out.push(entry.path().to_path_buf());
                }
            }
            debug!(
                root = %root.display(),
                exclude = exclude.map(ExcludeRule::pattern).unwrap_or("<none>"),
                found = out.len(),
                "enumerated files"
            );
            Ok(out)
        }
    }

    #[derive(Debug, Clone, Copy, Default)]
    pub struct FsReader;

    /// Decodes lossily and drops a leading byte-order mark, so stray bytes cost one
    /// character rather than the whole document.
    impl TextReader for FsReader {
        fn read_lines(&self, path: &Path) -> Result<Vec<String>, IndexError> {
            let bytes = fs::read(path).map_err(|source| IndexError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            let text = String::from_utf8_lossy(&bytes);
            if let Cow::Owned(_) = text {
                debug!(path = %path.display(), "replaced invalid UTF-8");
            }
            let text = text.strip_prefix('\u{FEFF}').unwrap_or(&*text);
            Ok(split_lines(text).map(str::to_owned).collect())
        }
    }

}

pub mod parser {
    //! Line classifier built on `nom`.
    //!
    //! Two patterns are recognised, tested in this order:
    //! - heading: one or more `#`, a space, then the heading text;
    //! - checklist item: optional whitespace, a `-`/`*`/`+` bullet, a space, a one-character
    //!   checkbox `[c]`, a space, then the item text. `x` or `X` means checked. The item
    //!   may start anywhere in the line (`> - [ ] quoted`, `1. - [ ] nested`); the leftmost
    //!   match wins and the whitespace directly before its bullet is the indent.
    //!
    //! Anything else is not part of the tree.

    use nom::{
        IResult,
        bytes::complete::{take_while, take_while1},
        character::complete::{anychar, char, one_of},
        combinator::{map, rest},
        error::VerboseError,
        sequence::{delimited, preceded, terminated, tuple},
    };

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum LineKind<'a> {
        Heading {
            text: &'a str,
        },
        Checklist {
            indent: &'a str,
            checked: bool,
            text: &'a str,
        },
    }

    /// Classify one line (without its terminator). Text captures are trimmed.
    pub fn classify_line(line: &str) -> Option<LineKind<'_>> {
        if let Ok((_, text)) = heading(line) {
            return Some(LineKind::Heading { text: text.trim() });
        }
        line.char_indices()
            .find_map(|(at, _)| checklist(&line[at..]).ok())
            .map(|(_, kind)| kind)
    }

    type PResult<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

    fn heading(i: &str) -> PResult<'_, &str> {
        preceded(terminated(take_while1(|c: char| c == '#'), char(' ')), rest)(i)
    }

    fn checklist(i: &str) -> PResult<'_, LineKind<'_>> {
        map(
            tuple((
                take_while(char::is_whitespace),
                terminated(one_of("-*+"), char(' ')),
                terminated(checkbox, char(' ')),
                rest,
            )),
            |(indent, _bullet, checked, text): (&str, char, bool, &str)| LineKind::Checklist {
                indent,
                checked,
                text: text.trim(),
            },
        )(i)
    }

    fn checkbox(i: &str) -> PResult<'_, bool> {
        map(delimited(char('['), anychar, char(']')), |mark| {
            matches!(mark, 'x' | 'X')
        })(i)
    }

}

pub mod indexer {
    //! Document → `TodoFile`. Always builds a fresh tree; callers replace, never patch.

    use crate::core::{Head, Todo, TodoFile};
    use crate::parser::{LineKind, classify_line};
    use std::path::Path;

    /// Index a document given as lines. Line numbers are 0-based positions in `lines`.
    pub fn index_lines<I, S>(path: &Path, lines: I) -> TodoFile
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut file = TodoFile::new(path.to_path_buf());

        for (line_no, line) in lines.into_iter().enumerate() {
            match classify_line(line.as_ref()) {
                Some(LineKind::Heading { text }) => {
                    file.heads.push(Head::new(path, text, line_no));
                }
                Some(LineKind::Checklist {
                    indent,
                    checked,
                    text,
                }) => {
                    let todo = Todo {
                        text: text.to_string(),
                        checked,
                        line: line_no,
                        indent: indent.to_string(),
                        file: path.to_path_buf(),
                    };
                    match file.heads.last_mut() {
                        Some(head) => head.todos.push(todo),
                        None => file.headless_todos.push(todo),
                    }
                }
                None => {}
            }
        }

        file.heads.retain(|head| !head.todos.is_empty());
        file
    }

    pub fn index_str(path: &Path, text: &str) -> TodoFile {
        index_lines(path, split_lines(text))
    }

    /// Split on `\r\n`, `\n` or a lone `\r`. A trailing terminator does not start a line.
    pub fn split_lines(text: &str) -> impl Iterator<Item = &str> {
        let mut rest = Some(text).filter(|t| !t.is_empty());
        std::iter::from_fn(move || {
            let current = rest?;
            let Some(at) = current.find(['\r', '\n']) else {
                rest = None;
                return Some(current);
            };
            let width = if current[at..].starts_with("\r\n") { 2 } else { 1 };
            rest = Some(&current[at + width..]).filter(|t| !t.is_empty());
            Some(&current[..at])
        })
    }

}

pub mod cache {
    //! The single source of truth: an ordered set of `TodoFile`s keyed by path.
    //!
    //! Every mutation that changes what a tree view would show fires exactly one
    //! `ChangeNotice` to the subscribers.

    use crate::core::{Todo, TodoFile};
    use indexmap::IndexMap;
    use serde::{Deserialize, Serialize};
    use std::{
        cmp::Ordering,
        path::{Path, PathBuf},
    };
    use uuid::Uuid;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub enum ChangeKind {
        Inserted,
        Updated,
        Removed,
        NoChange,
    }

    /// What a presentation layer needs to redraw.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub enum ChangeNotice {
        /// Only this file's subtree changed.
        File(PathBuf),
        /// Set membership changed; redraw from the roots.
        Tree,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct SubscriptionId(pub Uuid);

    impl SubscriptionId {
        pub fn new() -> Self {
            Self(Uuid::new_v4())
        }
    }

    type Listener = Box<dyn FnMut(&ChangeNotice) + Send>;

    #[derive(Default)]
    pub struct CacheStore {
        files: IndexMap<PathBuf, TodoFile>,
        listeners: Vec<(SubscriptionId, Listener)>,
    }

    impl CacheStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Insert, replace in place, or drop `file` depending on whether its path is
        /// cached and whether it still has items.
        pub fn upsert(&mut self, file: TodoFile) -> ChangeKind {
            let path = file.path.clone();
            let kind = match (self.files.contains_key(&path), file.is_empty()) {
                (true, false) => {
                    // Existing keys keep their position.
                    self.files.insert(path.clone(), file);
                    ChangeKind::Updated
                }
                (true, true) => {
                    self.files.shift_remove(&path);
                    ChangeKind::Removed
                }
                (false, false) => {
                    self.files.insert(path.clone(), file);
                    ChangeKind::Inserted
                }
                (false, true) => ChangeKind::NoChange,
            };

            match kind {
                ChangeKind::Updated => self.notify(ChangeNotice::File(path)),
                ChangeKind::Inserted | ChangeKind::Removed => self.notify(ChangeNotice::Tree),
                ChangeKind::NoChange => {}
            }
            kind
        }

        pub fn remove_by_path(&mut self, path: &Path) -> bool {
            let removed = self.files.shift_remove(path).is_some();
            if removed {
                self.notify(ChangeNotice::Tree);
            }
            removed
        }

        /// Swap in a whole new file set, ordered by `compare`. Empty files are dropped.
        pub fn replace_all<I, F>(&mut self, files: I, compare: F)
        where
            I: IntoIterator<Item = TodoFile>,
            F: FnMut(&TodoFile, &TodoFile) -> Ordering,
        {
            let mut files: Vec<TodoFile> =
                files.into_iter().filter(|file| !file.is_empty()).collect();
            files.sort_by(compare);
            self.files = files
                .into_iter()
                .map(|file| (file.path.clone(), file))
                .collect();
            self.notify(ChangeNotice::Tree);
        }

        pub fn snapshot(&self) -> Vec<&TodoFile> {
            self.files.values().collect()
        }

        pub fn get(&self, path: &Path) -> Option<&TodoFile> {
            self.files.get(path)
        }

        pub fn contains(&self, path: &Path) -> bool {
            self.files.contains_key(path)
        }

        /// Resolve a todo by its file path and line.
        pub fn locate(&self, path: &Path, line: usize) -> Option<&Todo> {
            self.files.get(path)?.todo_at(line)
        }

        pub fn len(&self) -> usize {
            self.files.len()
        }

        pub fn is_empty(&self) -> bool {
            self.files.is_empty()
        }

        pub fn subscribe(
            &mut self,
            listener: impl FnMut(&ChangeNotice) + Send + 'static,
        ) -> SubscriptionId {
            let id = SubscriptionId::new();
            self.listeners.push((id, Box::new(listener)));
            id
        }

        pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
            let before = self.listeners.len();
            self.listeners.retain(|(existing, _)| *existing != id);
            self.listeners.len() != before
        }

        pub fn notify(&mut self, notice: ChangeNotice) {
            for (_, listener) in self.listeners.iter_mut() {
                listener(&notice);
            }
        }
    }

    #[cfg(test)]
    pub(crate) mod tests {
        use super::*;
        use crate::indexer::index_str;
        use std::sync::{Arc, Mutex};

        pub(crate) fn record(store: &mut CacheStore) -> Arc<Mutex<Vec<ChangeNotice>>> {
            let seen = Arc::new(Mutex::new(Vec::new()));
            let sink = Arc::clone(&seen);
            store.subscribe(move |notice| sink.lock().unwrap().push(notice.clone()));
            seen
        }

        fn file(path: &str, text: &str) -> TodoFile {
            index_str(Path::new(path), text)
        }

        fn paths(store: &CacheStore) -> Vec<&Path> {
            store.snapshot().iter().map(|f| f.path.as_path()).collect()
        }

        #[test]
        fn upsert_covers_all_four_outcomes() {
            let mut store = CacheStore::new();
            let seen = record(&mut store);

            assert_eq!(store.upsert(file("/w/a.md", "# x\n")), ChangeKind::NoChange);
            assert_eq!(store.len(), 0);

            assert_eq!(store.upsert(file("/w/a.md", "- [ ] a")), ChangeKind::Inserted);
            assert_eq!(store.len(), 1);

            assert_eq!(store.upsert(file("/w/a.md", "- [x] a")), ChangeKind::Updated);
            assert_eq!(store.len(), 1);
            assert!(store.get(Path::new("/w/a.md")).unwrap().headless_todos[0].checked);

            assert_eq!(store.upsert(file("/w/a.md", "nothing")), ChangeKind::Removed);
            assert_eq!(store.len(), 0);

            assert_eq!(
                *seen.lock().unwrap(),
                vec![
                    ChangeNotice::Tree,
                    ChangeNotice::File(PathBuf::from("/w/a.md")),
                    ChangeNotice::Tree,
                ]
            );
        }

        #[test]
        fn updates_keep_their_position() {
            let mut store = CacheStore::new();
            store.upsert(file("/w/a.md", "- [ ] a"));
            store.upsert(file("/w/b.md", "- [ ] b"));
            store.upsert(file("/w/c.md", "- [ ] c"));
            store.upsert(file("/w/a.md", "- [ ] a\n- [ ] a2"));
            assert_eq!(
                paths(&store),
                vec![Path::new("/w/a.md"), Path::new("/w/b.md"), Path::new("/w/c.md")]
            );

            store.upsert(file("/w/b.md", ""));
            assert_eq!(paths(&store), vec![Path::new("/w/a.md"), Path::new("/w/c.md")]);
        }

        #[test]
        fn remove_by_path_reports_and_notifies_only_on_removal() {
            let mut store = CacheStore::new();
            store.upsert(file("/w/a.md", "- [ ] a"));
            let seen = record(&mut store);

            assert!(store.remove_by_path(Path::new("/w/a.md")));
            assert!(!store.remove_by_path(Path::new("/w/a.md")));
            assert!(store.is_empty());
            assert_eq!(*seen.lock().unwrap(), vec![ChangeNotice::Tree]);
        }

        #[test]
        fn replace_all_sorts_and_drops_empty_files() {
            let mut store = CacheStore::new();
            store.upsert(file("/w/old.md", "- [ ] stale"));
            let seen = record(&mut store);

            store.replace_all(
                vec![
                    file("/w/c.md", "- [ ] c"),
                    file("/w/empty.md", "# nothing"),
                    file("/w/a.md", "- [ ] a"),
                ],
                |a, b| a.path.cmp(&b.path),
            );

            assert_eq!(paths(&store), vec![Path::new("/w/a.md"), Path::new("/w/c.md")]);
            assert_eq!(*seen.lock().unwrap(), vec![ChangeNotice::Tree]);
        }

        #[test]
        fn unsubscribed_listeners_stop_hearing() {
            let mut store = CacheStore::new();
            let seen = Arc::new(Mutex::new(0usize));
            let sink = Arc::clone(&seen);
            let id = store.subscribe(move |_| *sink.lock().unwrap() += 1);

            store.upsert(file("/w/a.md", "- [ ] a"));
            assert!(store.unsubscribe(id));
            assert!(!store.unsubscribe(id));
            store.upsert(file("/w/b.md", "- [ ] b"));
            assert_eq!(*seen.lock().unwrap(), 1);
        }

        #[test]
        fn locate_finds_todos_by_line() {
            let mut store = CacheStore::new();
            store.upsert(file("/w/a.md", "- [ ] a\n# H\n- [x] b"));
            let todo = store.locate(Path::new("/w/a.md"), 2).expect("todo");
            assert_eq!(todo.text, "b");
            assert!(store.locate(Path::new("/w/a.md"), 1).is_none());
            assert!(store.locate(Path::new("/w/z.md"), 0).is_none());
        }
    }
}

pub mod scanner {
    //! Full workspace scans.

    use crate::cache::CacheStore;
    use crate::config::ScanRules;
    use crate::core::{IndexError, TodoFile};
    use crate::indexer::index_lines;
    use crate::storage::{FileEnumerator, TextReader};
    use indexmap::{IndexMap, IndexSet};
    use std::{
        cmp::Ordering,
        path::{Path, PathBuf},
    };
    use tracing::{debug, info, warn};

    /// Display key for a file: `<parent folder>/<file name>`.
    pub fn tree_filename(path: &Path) -> String {
        let name = |p: Option<&Path>| {
            p.and_then(Path::file_name)
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        };
        format!("{}/{}", name(path.parent()), name(Some(path)))
    }

    /// Tree order: case-insensitive on the display key, lowercase before uppercase on
    /// ties, then the full path so the order is total.
    ///
    /// Keys are compared by code point after lowercasing, not by locale collation, so
    /// punctuation sorts by its code point (`-` before digits, `_` between digits and
    /// letters).
    pub fn compare_tree_order(a: &Path, b: &Path) -> Ordering {
        let (ka, kb) = (tree_filename(a), tree_filename(b));
        ka.to_lowercase()
            .cmp(&kb.to_lowercase())
            .then_with(|| kb.cmp(&ka))
            .then_with(|| a.cmp(b))
    }

    pub struct WorkspaceScanner<E, R> {
        root: PathBuf,
        rules: ScanRules,
        enumerator: E,
        reader: R,
    }

    impl<E: FileEnumerator, R: TextReader> WorkspaceScanner<E, R> {
        pub fn new(root: PathBuf, rules: ScanRules, enumerator: E, reader: R) -> Self {
            Self {
                root,
                rules,
                enumerator,
                reader,
            }
        }

        pub fn root(&self) -> &Path {
            &self.root
        }

        pub fn rules(&self) -> &ScanRules {
            &self.rules
        }

        pub fn reader(&self) -> &R {
            &self.reader
        }

        /// Files that survive every exclude rule, in tree order.
        ///
        /// Each rule gets its own enumeration and a file must show up in all of them.
        pub fn candidates(&self) -> Result<Vec<PathBuf>, IndexError> {
            let include = &self.rules.include;
            let mut files: Vec<PathBuf> = if self.rules.excludes.is_empty() {
                self.enumerator.find_files(&self.root, include, None)?
            } else {
                let mut occurrences: IndexMap<PathBuf, usize> = IndexMap::new();
                for rule in &self.rules.excludes {
                    let found: IndexSet<PathBuf> = self
                        .enumerator
                        .find_files(&self.root, include, Some(rule))?
                        .into_iter()
                        .collect();
                    for path in found {
                        *occurrences.entry(path).or_default() += 1;
                    }
                }
                let required = self.rules.excludes.len();
                occurrences
                    .into_iter()
                    .filter(|(_, seen)| *seen == required)
                    .map(|(path, _)| path)
                    .collect()
            };
            files.sort_by(|a, b| compare_tree_order(a, b));
            files.dedup();
            Ok(files)
        }

        /// Index every candidate. Unreadable files are skipped; empty ones dropped.
        pub fn scan(&self) -> Result<Vec<TodoFile>, IndexError> {
            let mut out = Vec::new();
            for path in self.candidates()? {
                match self.reader.read_lines(&path) {
                    Ok(lines) => {
                        let file = index_lines(&path, &lines);
                        if file.is_empty() {
                            debug!(path = %path.display(), "no checklist items");
                        } else {
                            out.push(file);
                        }
                    }
                    Err(err) => warn!(path = %path.display(), error = %err, "skipping file"),
                }
            }
            Ok(out)
        }

        /// Scan and install the result as the store's whole contents.
        pub fn reindex(&self, store: &mut CacheStore) -> Result<usize, IndexError> {
            let files = self.scan()?;
            store.replace_all(files, |a, b| compare_tree_order(&a.path, &b.path));
            info!(root = %self.root.display(), files = store.len(), "indexed workspace");
            Ok(store.len())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::cache::{ChangeNotice, tests::record};
        use crate::config::ScanConfig;
        use crate::fixtures::{MemoryReader, StaticEnumerator};
        use crate::storage::{FsReader, WalkEnumerator};
        use std::fs;

        fn rules(excludes: &[&str]) -> ScanRules {
            ScanConfig {
                exclude: excludes.iter().map(|s| s.to_string()).collect(),
                ..ScanConfig::default()
            }
            .compile()
            .expect("compile")
        }

        #[test]
        fn tree_keys_use_parent_folder_and_name() {
            assert_eq!(tree_filename(Path::new("/w/notes/todo.md")), "notes/todo.md");
            assert_eq!(tree_filename(Path::new("/todo.md")), "/todo.md");
        }

        #[test]
        fn tree_order_ignores_case_then_prefers_lowercase() {
            let mut paths = vec![
                PathBuf::from("/w/b/Zeta.md"),
                PathBuf::from("/w/a/beta.md"),
                PathBuf::from("/w/A/beta.md"),
                PathBuf::from("/w/a/Alpha.md"),
            ];
            paths.sort_by(|a, b| compare_tree_order(a, b));
            assert_eq!(
                paths,
                vec![
                    PathBuf::from("/w/a/Alpha.md"),
                    PathBuf::from("/w/a/beta.md"),
                    PathBuf::from("/w/A/beta.md"),
                    PathBuf::from("/w/b/Zeta.md"),
                ]
            );
        }

        #[test]
        fn punctuation_sorts_by_code_point() {
            let mut paths = vec![
                PathBuf::from("/w/x/a_b.md"),
                PathBuf::from("/w/x/a1.md"),
                PathBuf::from("/w/x/a-b.md"),
                PathBuf::from("/w/x/ab.md"),
            ];
            paths.sort_by(|a, b| compare_tree_order(a, b));
            assert_eq!(
                paths,
                vec![
                    PathBuf::from("/w/x/a-b.md"),
                    PathBuf::from("/w/x/a1.md"),
                    PathBuf::from("/w/x/a_b.md"),
                    PathBuf::from("/w/x/ab.md"),
                ]
            );
        }

        #[test]
        fn a_file_must_survive_every_rule() {
            let enumerator =
                StaticEnumerator::new(&["keep.md", "drafts/x.md", "archive/y.md", "notes/z.md"]);
            let scanner = WorkspaceScanner::new(
                PathBuf::from("/w"),
                rules(&["drafts/**", "archive/**"]),
                enumerator,
                MemoryReader::default(),
            );

            // Tree keys are "notes/z.md" and "w/keep.md".
            let found = scanner.candidates().expect("candidates");
            assert_eq!(
                found,
                vec![PathBuf::from("/w/notes/z.md"), PathBuf::from("/w/keep.md")]
            );
            assert_eq!(scanner.enumerator.calls(), 2);
        }

        #[test]
        fn no_rules_means_one_unfiltered_enumeration() {
            let scanner = WorkspaceScanner::new(
                PathBuf::from("/w"),
                rules(&[]),
                StaticEnumerator::new(&["b.md", "a.md"]),
                MemoryReader::default(),
            );
            assert_eq!(
                scanner.candidates().expect("candidates"),
                vec![PathBuf::from("/w/a.md"), PathBuf::from("/w/b.md")]
            );
            assert_eq!(scanner.enumerator.calls(), 1);
        }

        #[test]
        fn scan_skips_unreadable_and_empty_files() {
            let reader = MemoryReader::default()
                .with("/w/a.md", "- [ ] a")
                .with("/w/empty.md", "# only a heading");
            let scanner = WorkspaceScanner::new(
                PathBuf::from("/w"),
                rules(&[]),
                StaticEnumerator::new(&["a.md", "empty.md", "gone.md"]),
                reader,
            );
            let files = scanner.scan().expect("scan");
            assert_eq!(files.len(), 1);
            assert_eq!(files[0].path, PathBuf::from("/w/a.md"));
        }

        #[test]
        fn reindex_replaces_store_contents_from_disk() {
            let tmp = tempfile::tempdir().expect("tempdir");
            let root = fs::canonicalize(tmp.path()).expect("canonical root");
            fs::create_dir_all(root.join("b")).expect("mkdir b");
            fs::create_dir_all(root.join("a")).expect("mkdir a");
            fs::create_dir_all(root.join("node_modules")).expect("mkdir node_modules");
            fs::write(root.join("b/list.md"), "# H\n- [ ] from b\n").expect("write b");
            fs::write(root.join("a/list.md"), "- [x] from a\n").expect("write a");
            fs::write(root.join("a/none.md"), "just prose\n").expect("write none");
            fs::write(root.join("node_modules/dep.md"), "- [ ] dep\n").expect("write dep");

            let scanner = WorkspaceScanner::new(
                root.clone(),
                ScanConfig::default().compile().expect("compile"),
                WalkEnumerator::default(),
                FsReader,
            );
            let mut store = CacheStore::new();
            store.upsert(crate::indexer::index_str(&root.join("stale.md"), "- [ ] old"));
            let seen = record(&mut store);

            assert_eq!(scanner.reindex(&mut store).expect("reindex"), 2);
            let paths: Vec<_> = store.snapshot().iter().map(|f| f.path.clone()).collect();
            assert_eq!(paths, vec![root.join("a/list.md"), root.join("b/list.md")]);
            assert_eq!(*seen.lock().unwrap(), vec![ChangeNotice::Tree]);
        }
    }
}

pub mod coordinator {
    //! Incremental refresh: one external signal at a time, each applied to completion.

    use crate::cache::{CacheStore, ChangeKind, ChangeNotice};
    use crate::indexer::index_lines;
    use crate::storage::TextReader;
    use serde::{Deserialize, Serialize};
    use std::{
        path::{Path, PathBuf},
        sync::mpsc::Receiver,
    };
    use tracing::{debug, warn};

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub enum ChangeSignal {
        Changed(PathBuf),
        Created(PathBuf),
        Deleted(PathBuf),
    }

    impl ChangeSignal {
        pub fn path(&self) -> &Path {
            match self {
                Self::Changed(path) | Self::Created(path) | Self::Deleted(path) => path,
            }
        }
    }

    pub struct ChangeCoordinator<R> {
        reader: R,
    }

    impl<R: TextReader> ChangeCoordinator<R> {
        pub fn new(reader: R) -> Self {
            Self { reader }
        }

        /// Apply one signal. `None` means the document could not be read and nothing
        /// changed.
        pub fn apply(&self, store: &mut CacheStore, signal: &ChangeSignal) -> Option<ChangeKind> {
            match signal {
                ChangeSignal::Changed(path) | ChangeSignal::Created(path) => {
                    self.refresh(store, path)
                }
                ChangeSignal::Deleted(path) => {
                    // A deletion always redraws from the roots, cached or not.
                    let removed = store.remove_by_path(path);
                    if !removed {
                        store.notify(ChangeNotice::Tree);
                    }
                    debug!(path = %path.display(), removed, "deleted");
                    Some(if removed {
                        ChangeKind::Removed
                    } else {
                        ChangeKind::NoChange
                    })
                }
            }
        }

        fn refresh(&self, store: &mut CacheStore, path: &Path) -> Option<ChangeKind> {
            match self.reader.read_lines(path) {
                Ok(lines) => {
                    let kind = store.upsert(index_lines(path, &lines));
                    debug!(path = %path.display(), ?kind, "refreshed");
                    Some(kind)
                }
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "dropping change");
                    None
                }
            }
        }

        /// Drain `signals` until every sender is gone. Returns how many were handled.
        pub fn run(&self, store: &mut CacheStore, signals: Receiver<ChangeSignal>) -> usize {
            let mut handled = 0;
            for signal in signals {
                self.apply(store, &signal);
                handled += 1;
            }
            handled
        }
    }

}

pub mod watch {
    //! File-system change source on top of `notify`.

    use crate::config::ScanRules;
    use crate::coordinator::ChangeSignal;
    use crate::core::IndexError;
    use notify::{
        Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher,
        event::{ModifyKind, RenameMode},
    };
    use std::{
        path::{Path, PathBuf},
        sync::mpsc::{self, Receiver},
    };
    use tracing::warn;

    /// Translate one `notify` event into signals for paths the rules accept.
    pub fn signals_from_event(root: &Path, rules: &ScanRules, event: &Event) -> Vec<ChangeSignal> {
        let paths = event.paths.iter().cloned();
        let existence = |path: PathBuf| {
            if path.exists() {
                ChangeSignal::Created(path)
            } else {
                ChangeSignal::Deleted(path)
            }
        };

        let signals: Vec<ChangeSignal> = match &event.kind {
            EventKind::Create(_) => paths.map(ChangeSignal::Created).collect(),
            EventKind::Remove(_) => paths.map(ChangeSignal::Deleted).collect(),
            EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
                paths.map(ChangeSignal::Deleted).collect()
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
                paths.map(ChangeSignal::Created).collect()
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
                let mut paths = paths;
                let mut out = Vec::new();
                if let Some(from) = paths.next() {
                    out.push(ChangeSignal::Deleted(from));
                }
                out.extend(paths.map(ChangeSignal::Created));
                out
            }
            EventKind::Modify(ModifyKind::Name(_)) => paths.map(existence).collect(),
            EventKind::Modify(_) => paths.map(ChangeSignal::Changed).collect(),
            EventKind::Any => paths
                .map(|path| match existence(path) {
                    ChangeSignal::Created(path) => ChangeSignal::Changed(path),
                    other => other,
                })
                .collect(),
            EventKind::Access(_) | EventKind::Other => vec![],
        };

        signals
            .into_iter()
            .filter(|signal| {
                signal
                    .path()
                    .strip_prefix(root)
                    .is_ok_and(|rel| rules.accepts(rel))
            })
            .collect()
    }

    /// Watch `root` recursively. Dropping the watcher closes the returned channel.
    pub fn watch_workspace(
        root: &Path,
        rules: ScanRules,
    ) -> Result<(RecommendedWatcher, Receiver<ChangeSignal>), IndexError> {
        let (tx, rx) = mpsc::channel();
        let watch_root = root.to_path_buf();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            match res {
                Ok(event) => {
                    for signal in signals_from_event(&watch_root, &rules, &event) {
                        if tx.send(signal).is_err() {
                            break;
                        }
                    }
                }
                Err(err) => warn!(error = %err, "watch error"),
            }
        })
        .map_err(|source| IndexError::Watch {
            path: root.to_path_buf(),
            source,
        })?;

        watcher
            .watch(root, RecursiveMode::Recursive)
            .map_err(|source| IndexError::Watch {
                path: root.to_path_buf(),
                source,
            })?;
        Ok((watcher, rx))
    }

}

pub mod view {
    //! Presentation projection: tree nodes, display rows, and visibility of ticked items.
    //! Reads only store snapshots; nothing here mutates the index.

    use crate::core::{Counts, Head, Location, Todo, TodoFile};
    use crate::scanner::tree_filename;
    use serde::Serialize;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Node<'a> {
        File(&'a TodoFile),
        Head(&'a Head),
        Todo(&'a Todo),
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
    #[serde(rename_all = "kebab-case")]
    pub enum RowKind {
        File,
        Head,
        TodoTicked,
        TodoUnticked,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
    #[serde(rename_all = "kebab-case")]
    pub enum Icon {
        Folder,
        File,
    }

    #[derive(Debug, Clone, PartialEq, Eq, Serialize)]
    pub struct Row {
        pub id: String,
        pub label: String,
        pub tooltip: String,
        pub kind: RowKind,
        pub icon: Icon,
        pub expanded: bool,
        /// Where activating the row should navigate. Todos only.
        #[serde(skip_serializing_if = "Option::is_none")]
        pub target: Option<Location>,
    }

    pub fn row(node: Node<'_>) -> Row {
        match node {
            Node::File(file) => Row {
                id: file.id(),
                label: format!(
                    "{} {}",
                    tree_filename(&file.path),
                    count_suffix(file.counts())
                ),
                tooltip: file.path.display().to_string(),
                kind: RowKind::File,
                icon: Icon::Folder,
                expanded: true,
                target: None,
            },
            Node::Head(head) => Row {
                id: head.id(),
                label: format!("{} {}", head.text, count_suffix(head.counts())),
                tooltip: head.text.clone(),
                kind: RowKind::Head,
                icon: Icon::Folder,
                expanded: true,
                target: None,
            },
            Node::Todo(todo) => Row {
                id: todo.id(),
                label: format!("{} {}", if todo.checked { '☒' } else { '☐' }, todo.text),
                tooltip: todo.text.clone(),
                kind: if todo.checked {
                    RowKind::TodoTicked
                } else {
                    RowKind::TodoUnticked
                },
                icon: Icon::File,
                expanded: false,
                target: Some(todo.location()),
            },
        }
    }

    fn count_suffix(counts: Counts) -> String {
        let done = if counts.checked == 0 {
            String::new()
        } else {
            format!("{} done, ", counts.checked)
        };
        format!(
            "({done}{} to do, {} total)",
            counts.unchecked,
            counts.total()
        )
    }

    /// Top-level nodes. With ticked items hidden, files with nothing left to do vanish.
    pub fn roots<'a>(
        files: impl IntoIterator<Item = &'a TodoFile>,
        display_ticked: bool,
    ) -> Vec<Node<'a>> {
        files
            .into_iter()
            .filter(|file| display_ticked || file.counts().unchecked > 0)
            .map(Node::File)
            .collect()
    }

    pub fn children(node: Node<'_>, display_ticked: bool) -> Vec<Node<'_>> {
        let visible = |todo: &&Todo| display_ticked || !todo.checked;
        match node {
            Node::File(file) => file
                .headless_todos
                .iter()
                .filter(visible)
                .map(Node::Todo)
                .chain(
                    file.heads
                        .iter()
                        .filter(|head| display_ticked || head.counts().unchecked > 0)
                        .map(Node::Head),
                )
                .collect(),
            Node::Head(head) => head.todos.iter().filter(visible).map(Node::Todo).collect(),
            Node::Todo(_) => vec![],
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq, Serialize)]
    pub struct RenderedNode {
        #[serde(flatten)]
        pub row: Row,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        pub children: Vec<RenderedNode>,
    }

    /// The whole visible tree.
    pub fn render<'a>(
        files: impl IntoIterator<Item = &'a TodoFile>,
        display_ticked: bool,
    ) -> Vec<RenderedNode> {
        roots(files, display_ticked)
            .into_iter()
            .map(|node| render_node(node, display_ticked))
            .collect()
    }

    fn render_node(node: Node<'_>, display_ticked: bool) -> RenderedNode {
        RenderedNode {
            row: row(node),
            children: children(node, display_ticked)
                .into_iter()
                .map(|child| render_node(child, display_ticked))
                .collect(),
        }
    }

    /// Plain-text outline, two spaces per level.
    pub fn format_tree(nodes: &[RenderedNode]) -> String {
        fn rec(out: &mut String, nodes: &[RenderedNode], depth: usize) {
            for node in nodes {
                out.push_str(&"  ".repeat(depth));
                out.push_str(&node.row.label);
                out.push('\n');
                rec(out, &node.children, depth + 1);
            }
        }
        let mut out = String::new();
        rec(&mut out, nodes, 0);
        out
    }

}

pub mod session {
    //! One active index: store, scanner, coordinator and the ticked-visibility toggle.

    use crate::cache::{CacheStore, ChangeKind, ChangeNotice, SubscriptionId};
    use crate::config::ScanConfig;
    use crate::coordinator::{ChangeCoordinator, ChangeSignal};
    use crate::core::{IndexError, Location, parse_node_id};
    use crate::scanner::WorkspaceScanner;
    use crate::storage::{FileEnumerator, FsReader, TextReader, WalkEnumerator};
    use crate::view::{self, RenderedNode};
    use std::path::Path;

    pub struct Session<E = WalkEnumerator, R = FsReader> {
        store: CacheStore,
        scanner: WorkspaceScanner<E, R>,
        coordinator: ChangeCoordinator<R>,
        display_ticked: bool,
    }

    impl Session {
        /// Filesystem-backed session rooted at `root` (expected absolute).
        pub fn open(root: &Path, config: &ScanConfig) -> Result<Self, IndexError> {
            let rules = config.compile()?;
            let enumerator = WalkEnumerator {
                follow_symlinks: rules.follow_symlinks,
            };
            Ok(Self::new(WorkspaceScanner::new(
                root.to_path_buf(),
                rules,
                enumerator,
                FsReader,
            )))
        }
    }

    impl<E: FileEnumerator, R: TextReader + Clone> Session<E, R> {
        pub fn new(scanner: WorkspaceScanner<E, R>) -> Self {
            let coordinator = ChangeCoordinator::new(scanner.reader().clone());
            Self {
                store: CacheStore::new(),
                scanner,
                coordinator,
                display_ticked: false,
            }
        }

        pub fn reindex(&mut self) -> Result<usize, IndexError> {
            self.scanner.reindex(&mut self.store)
        }

        pub fn handle(&mut self, signal: &ChangeSignal) -> Option<ChangeKind> {
            self.coordinator.apply(&mut self.store, signal)
        }

        pub fn display_ticked(&self) -> bool {
            self.display_ticked
        }

        pub fn set_display_ticked(&mut self, value: bool) {
            self.display_ticked = value;
            self.store.notify(ChangeNotice::Tree);
        }

        pub fn toggle_ticked(&mut self) -> bool {
            self.set_display_ticked(!self.display_ticked);
            self.display_ticked
        }

        pub fn render(&self) -> Vec<RenderedNode> {
            view::render(self.store.snapshot(), self.display_ticked)
        }

        /// Resolve a todo id (`<path>:<line>`) to a navigable location.
        pub fn focus(&self, id: &str) -> Option<Location> {
            let (path, line) = parse_node_id(id)?;
            self.store.locate(&path, line).map(|todo| todo.location())
        }

        pub fn store(&self) -> &CacheStore {
            &self.store
        }

        pub fn scanner(&self) -> &WorkspaceScanner<E, R> {
            &self.scanner
        }

        pub fn subscribe(
            &mut self,
            listener: impl FnMut(&ChangeNotice) + Send + 'static,
        ) -> SubscriptionId {
            self.store.subscribe(listener)
        }
    }

}


pub use cache::{CacheStore, ChangeKind, ChangeNotice};
pub use config::{ScanConfig, ScanRules};
pub use coordinator::{ChangeCoordinator, ChangeSignal};
pub use crate::core::{Head, IndexError, Location, Todo, TodoFile};
pub use indexer::{index_lines, index_str};
pub use parser::{LineKind, classify_line};
pub use scanner::WorkspaceScanner;
pub use session::Session;
