use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, warn};
use wind_lang::{Node, Program};

use crate::path::FunctionPath;

pub const SOURCE_EXTENSION: &str = "fn";
pub const DEFAULT_SOURCE_ROOT: &str = "resources/wind";
pub const DEFAULT_CACHE_ROOT: &str = "resources/windc";

const ARTIFACT_VERSION: u32 = 1;

static BLOCK_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/").expect("block comment pattern is valid"));

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Function not found: {0}")]
    NotFound(FunctionPath),
    #[error("Failed to parse \"{path}\": {source}")]
    Parse {
        path: FunctionPath,
        #[source]
        source: wind_lang::Error,
    },
    #[error("Failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl CacheError {
    fn io(path: &Path, source: io::Error) -> Self {
        CacheError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Last-modified time of a source file, compared by equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    pub secs: u64,
    pub nanos: u32,
}

impl Fingerprint {
    pub fn from_time(time: SystemTime) -> Self {
        let duration = time.duration_since(UNIX_EPOCH).unwrap_or_default();
        Self {
            secs: duration.as_secs(),
            nanos: duration.subsec_nanos(),
        }
    }

    pub fn to_time(self) -> SystemTime {
        UNIX_EPOCH + Duration::new(self.secs, self.nanos)
    }

    fn of(metadata: &fs::Metadata) -> io::Result<Self> {
        metadata.modified().map(Self::from_time)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Artifact {
    version: u32,
    fingerprint: Fingerprint,
    nodes: Program,
}

/// Resolves function paths to compiled programs, reusing a persisted
/// artifact while its fingerprint matches the source's modification time.
///
/// One instance is shared by every request; concurrent writers of the same
/// artifact are harmless because each write is an atomic rename of an
/// identical document.
#[derive(Debug)]
pub struct ProgramCache {
    source_root: PathBuf,
    cache_root: PathBuf,
    parse_count: AtomicUsize,
}

impl Default for ProgramCache {
    fn default() -> Self {
        Self::new(DEFAULT_SOURCE_ROOT, DEFAULT_CACHE_ROOT)
    }
}

impl ProgramCache {
    pub fn new(source_root: impl Into<PathBuf>, cache_root: impl Into<PathBuf>) -> Self {
        Self {
            source_root: source_root.into(),
            cache_root: cache_root.into(),
            parse_count: AtomicUsize::new(0),
        }
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }

    /// Number of source parses performed so far. A cache hit never parses.
    pub fn parse_count(&self) -> usize {
        self.parse_count.load(Ordering::Relaxed)
    }

    /// `a.b.c` lives at `<source-root>/a/b/c.fn`.
    pub fn source_path(&self, path: &FunctionPath) -> PathBuf {
        let mut segments: Vec<&str> = path.segments().collect();
        let last = segments.pop().unwrap_or_default();
        let mut source = self.source_root.clone();
        source.extend(segments);
        source.push(format!("{}.{}", last, SOURCE_EXTENSION));
        source
    }

    /// `a.b.c` is cached flat at `<cache-root>/a.b.c.fn`.
    pub fn artifact_path(&self, path: &FunctionPath) -> PathBuf {
        self.cache_root
            .join(format!("{}.{}", path.as_str(), SOURCE_EXTENSION))
    }

    pub fn resolve(&self, path: &FunctionPath) -> Result<Program, CacheError> {
        let source = self.source_path(path);
        let fingerprint = match fs::metadata(&source) {
            Ok(metadata) if metadata.is_file() => {
                Fingerprint::of(&metadata).map_err(|e| CacheError::io(&source, e))?
            }
            Ok(_) => return Err(CacheError::NotFound(path.clone())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(CacheError::NotFound(path.clone()));
            }
            Err(e) => return Err(CacheError::io(&source, e)),
        };

        let artifact = self.artifact_path(path);
        if let Some(program) = self.load(&artifact, fingerprint) {
            debug!(path = %path, "compiled program cache hit");
            return Ok(program);
        }

        debug!(path = %path, source = %source.display(), "compiled program cache miss");
        let program = self.compile(path, &source)?;

        if let Err(e) = self.store(&artifact, fingerprint, &program) {
            warn!(path = %path, error = %e, "failed to persist compiled program");
        }

        Ok(program)
    }

    /// Removes every artifact under the cache root, returning how many were
    /// deleted.
    pub fn clear(&self) -> Result<usize, CacheError> {
        let entries = match fs::read_dir(&self.cache_root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(CacheError::io(&self.cache_root, e)),
        };

        let mut removed = 0;
        for entry in entries {
            let entry = entry.map_err(|e| CacheError::io(&self.cache_root, e))?;
            let path = entry.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == SOURCE_EXTENSION) {
                fs::remove_file(&path).map_err(|e| CacheError::io(&path, e))?;
                removed += 1;
            }
        }

        debug!(removed, cache_root = %self.cache_root.display(), "cleared compiled program cache");
        Ok(removed)
    }

    fn load(&self, artifact: &Path, fingerprint: Fingerprint) -> Option<Program> {
        let metadata = fs::metadata(artifact).ok()?;
        if Fingerprint::of(&metadata).ok()? != fingerprint {
            return None;
        }

        let decoded = fs::read(artifact)
            .map_err(|e| e.to_string())
            .and_then(|bytes| {
                serde_json::from_slice::<Artifact>(&bytes).map_err(|e| e.to_string())
            });

        match decoded {
            Ok(stored) if stored.version == ARTIFACT_VERSION && stored.fingerprint == fingerprint => {
                Some(stored.nodes)
            }
            Ok(_) => None,
            Err(error) => {
                warn!(artifact = %artifact.display(), %error, "ignoring unreadable compiled program");
                None
            }
        }
    }

    fn compile(&self, path: &FunctionPath, source: &Path) -> Result<Program, CacheError> {
        let code = fs::read_to_string(source).map_err(|e| CacheError::io(source, e))?;
        let code = BLOCK_COMMENT.replace_all(&code, "");

        let nodes = wind_lang::parse(&code).map_err(|source| CacheError::Parse {
            path: path.clone(),
            source,
        })?;
        self.parse_count.fetch_add(1, Ordering::Relaxed);

        Ok(nodes.into_iter().filter(Node::is_template).collect())
    }

    fn store(
        &self,
        artifact: &Path,
        fingerprint: Fingerprint,
        program: &Program,
    ) -> Result<(), CacheError> {
        fs::create_dir_all(&self.cache_root).map_err(|e| CacheError::io(&self.cache_root, e))?;

        let document = serde_json::to_vec(&Artifact {
            version: ARTIFACT_VERSION,
            fingerprint,
            nodes: program.clone(),
        })
        .map_err(|e| CacheError::io(artifact, e.into()))?;

        let mut file =
            NamedTempFile::new_in(&self.cache_root).map_err(|e| CacheError::io(&self.cache_root, e))?;
        file.write_all(&document)
            .and_then(|_| file.flush())
            .and_then(|_| file.as_file().set_modified(fingerprint.to_time()))
            .map_err(|e| CacheError::io(file.path(), e))?;
        file.persist(artifact)
            .map_err(|e| CacheError::io(artifact, e.error))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs::File;

    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    use super::*;

    struct Roots {
        _dir: TempDir,
        cache: ProgramCache,
    }

    #[fixture]
    fn roots() -> Roots {
        let dir = tempfile::tempdir().unwrap();
        let cache = ProgramCache::new(dir.path().join("src"), dir.path().join("cache"));
        Roots { _dir: dir, cache }
    }

    fn write_source(cache: &ProgramCache, path: &str, code: &str) -> PathBuf {
        let source = cache.source_path(&path.into());
        fs::create_dir_all(source.parent().unwrap()).unwrap();
        fs::write(&source, code).unwrap();
        source
    }

    fn touch(path: &Path, offset_secs: u64) {
        let current = fs::metadata(path).unwrap().modified().unwrap();
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(current + Duration::from_secs(offset_secs))
            .unwrap();
    }

    #[rstest]
    fn test_paths(roots: Roots) {
        let path = FunctionPath::from("a.b.c");
        assert!(roots.cache.source_path(&path).ends_with("src/a/b/c.fn"));
        assert!(roots.cache.artifact_path(&path).ends_with("cache/a.b.c.fn"));
    }

    #[rstest]
    fn test_second_resolve_skips_parse(roots: Roots) {
        write_source(&roots.cache, "users.list", "header (set a 1) text (get a)");
        let path = FunctionPath::from("users.list");

        let first = roots.cache.resolve(&path).unwrap();
        let second = roots.cache.resolve(&path).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        assert!(first.iter().all(Node::is_template));
        assert_eq!(roots.cache.parse_count(), 1);
    }

    #[rstest]
    fn test_touch_invalidates(roots: Roots) {
        let source = write_source(&roots.cache, "a", "(set x 1)");
        let path = FunctionPath::from("a");

        roots.cache.resolve(&path).unwrap();
        touch(&source, 10);
        roots.cache.resolve(&path).unwrap();
        assert_eq!(roots.cache.parse_count(), 2);

        let source_mtime = fs::metadata(&source).unwrap().modified().unwrap();
        let artifact_mtime = fs::metadata(roots.cache.artifact_path(&path))
            .unwrap()
            .modified()
            .unwrap();
        assert_eq!(artifact_mtime, source_mtime);

        roots.cache.resolve(&path).unwrap();
        assert_eq!(roots.cache.parse_count(), 2);
    }

    #[rstest]
    fn test_artifact_records_fingerprint(roots: Roots) {
        let source = write_source(&roots.cache, "a", "(set x 1)");
        let path = FunctionPath::from("a");
        roots.cache.resolve(&path).unwrap();

        let stored: Artifact =
            serde_json::from_slice(&fs::read(roots.cache.artifact_path(&path)).unwrap()).unwrap();
        let expected = Fingerprint::from_time(fs::metadata(&source).unwrap().modified().unwrap());
        assert_eq!(stored.version, ARTIFACT_VERSION);
        assert_eq!(stored.fingerprint, expected);
    }

    #[rstest]
    fn test_corrupt_artifact_is_a_miss(roots: Roots) {
        let source = write_source(&roots.cache, "a", "(set x 1)");
        let path = FunctionPath::from("a");
        let program = roots.cache.resolve(&path).unwrap();

        let artifact = roots.cache.artifact_path(&path);
        fs::write(&artifact, b"not json").unwrap();
        let mtime = fs::metadata(&source).unwrap().modified().unwrap();
        File::options()
            .write(true)
            .open(&artifact)
            .unwrap()
            .set_modified(mtime)
            .unwrap();

        assert_eq!(roots.cache.resolve(&path).unwrap(), program);
        assert_eq!(roots.cache.parse_count(), 2);
    }

    #[rstest]
    fn test_block_comments_are_stripped(roots: Roots) {
        write_source(&roots.cache, "a", "/* (echo\n \"unbalanced\" */ (set x 1)");
        let program = roots.cache.resolve(&"a".into()).unwrap();
        assert_eq!(program.len(), 1);
    }

    #[rstest]
    fn test_missing_source(roots: Roots) {
        assert!(matches!(
            roots.cache.resolve(&"nope.fn".into()),
            Err(CacheError::NotFound(_))
        ));
    }

    #[rstest]
    fn test_parse_error(roots: Roots) {
        write_source(&roots.cache, "broken", "(set x");
        assert!(matches!(
            roots.cache.resolve(&"broken".into()),
            Err(CacheError::Parse { .. })
        ));
    }

    #[rstest]
    fn test_clear(roots: Roots) {
        write_source(&roots.cache, "a", "(set x 1)");
        write_source(&roots.cache, "b.c", "(set x 1)");
        roots.cache.resolve(&"a".into()).unwrap();
        roots.cache.resolve(&"b.c".into()).unwrap();

        assert_eq!(roots.cache.clear().unwrap(), 2);
        assert_eq!(roots.cache.clear().unwrap(), 0);

        roots.cache.resolve(&"a".into()).unwrap();
        assert_eq!(roots.cache.parse_count(), 3);
    }

    #[rstest]
    fn test_concurrent_resolvers_agree(roots: Roots) {
        let source = write_source(&roots.cache, "shared.list", "/* c */ (set x 1) (concat x \"!\")");
        let path = FunctionPath::from("shared.list");

        let programs = std::thread::scope(|scope| {
            let handles = (0..8)
                .map(|_| scope.spawn(|| roots.cache.resolve(&path).unwrap()))
                .collect::<Vec<_>>();
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap())
                .collect::<Vec<_>>()
        });

        assert_eq!(programs.len(), 8);
        assert!(programs.iter().all(|program| program == &programs[0]));
        assert_eq!(programs[0].len(), 2);

        let stored: Artifact =
            serde_json::from_slice(&fs::read(roots.cache.artifact_path(&path)).unwrap()).unwrap();
        let expected = Fingerprint::from_time(fs::metadata(&source).unwrap().modified().unwrap());
        assert_eq!(stored.fingerprint, expected);
        assert_eq!(stored.nodes, programs[0]);

        let leftovers = fs::read_dir(roots.cache.cache_root())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|entry| entry.path() != roots.cache.artifact_path(&path))
            .count();
        assert_eq!(leftovers, 0);

        let before = roots.cache.parse_count();
        assert_eq!(roots.cache.resolve(&path).unwrap(), programs[0]);
        assert_eq!(roots.cache.parse_count(), before);
    }

    #[test]
    fn test_cache_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ProgramCache>();
    }
}
