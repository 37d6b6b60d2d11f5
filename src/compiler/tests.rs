use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use tempfile::TempDir;

use super::*;
use crate::config::SiteConfig;
use crate::utils::path::normalize_path;

/// Counts renders so tests can prove a move did not re-render.
#[derive(Default)]
struct CountingRenderer {
    calls: AtomicUsize,
}

impl CountingRenderer {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Render for CountingRenderer {
    fn render(&self, source: &[u8]) -> anyhow::Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if source.starts_with(b"FAIL") {
            anyhow::bail!("refusing to render");
        }
        let mut html = b"<main>".to_vec();
        html.extend_from_slice(source);
        html.extend_from_slice(b"</main>");
        Ok(html)
    }
}

struct Site {
    _temp: TempDir,
    content: PathBuf,
    output: PathBuf,
}

impl Site {
    fn new(files: &[(&str, &str)]) -> Self {
        let temp = TempDir::new().unwrap();
        let root = normalize_path(temp.path());
        let content = root.join("content");
        let output = root.join("content-build");
        fs::create_dir_all(&content).unwrap();

        let site = Self {
            _temp: temp,
            content,
            output,
        };
        for (path, body) in files {
            site.write(path, body);
        }
        site
    }

    fn write(&self, path: &str, body: &str) {
        let file = self.content.join(path);
        fs::create_dir_all(file.parent().unwrap()).unwrap();
        fs::write(file, body).unwrap();
    }

    fn src(&self, path: &str) -> PathBuf {
        self.content.join(path)
    }

    fn out(&self, path: &str) -> PathBuf {
        self.output.join(path)
    }

    fn builder(&self) -> Builder<CountingRenderer> {
        let config = SiteConfig::for_dirs(&self.content, &self.output);
        Builder::new(PathMapper::new(&config), CountingRenderer::default())
    }

    fn read(&self, path: &str) -> String {
        fs::read_to_string(self.out(path)).unwrap()
    }

    /// Every file below the output root, relative and sorted.
    fn output_files(&self) -> Vec<String> {
        let mut files: Vec<String> = jwalk::WalkDir::new(&self.output)
            .skip_hidden(false)
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(|e| e.file_type().is_file())
            .map(|e| {
                e.path()
                    .strip_prefix(&self.output)
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect();
        files.sort();
        files
    }

    fn has_empty_dir(&self) -> bool {
        jwalk::WalkDir::new(&self.output)
            .skip_hidden(false)
            .min_depth(1)
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(|e| e.file_type().is_dir())
            .any(|e| fs::read_dir(e.path()).unwrap().next().is_none())
    }
}

// ============================================================================
// full_build
// ============================================================================

#[test]
fn test_full_build_index_and_nested() {
    let site = Site::new(&[("index.md", "home"), ("guide/intro.md", "intro")]);
    let builder = site.builder();

    let report = builder.full_build().unwrap();

    assert_eq!(report, BuildReport { built: 2, failed: 0 });
    assert_eq!(site.output_files(), ["guide/intro/index.html", "index.html"]);
    assert_eq!(site.read("index.html"), "<main>home</main>");
    assert_eq!(site.read("guide/intro/index.html"), "<main>intro</main>");
}

#[test]
fn test_full_build_wipes_stale_output() {
    let site = Site::new(&[("a.md", "a")]);
    fs::create_dir_all(site.out("stale/deep")).unwrap();
    fs::write(site.out("stale/deep/index.html"), "old").unwrap();

    site.builder().full_build().unwrap();

    assert_eq!(site.output_files(), ["a/index.html"]);
}

#[test]
fn test_full_build_skips_non_markdown_keeps_hidden() {
    let site = Site::new(&[
        ("a.md", "a"),
        ("notes.txt", "txt"),
        ("README.MD", "upper"),
        (".drafts/post.md", "draft"),
        ("dir.md/inner.md", "inner"),
    ]);

    let report = site.builder().full_build().unwrap();

    assert_eq!(report.built, 3);
    assert_eq!(
        site.output_files(),
        [".drafts/post/index.html", "a/index.html", "dir.md/inner/index.html"]
    );
    assert_eq!(site.read(".drafts/post/index.html"), "<main>draft</main>");
}

#[test]
fn test_full_build_counts_failures_and_continues() {
    let site = Site::new(&[("ok.md", "fine"), ("bad.md", "FAIL"), ("z/ok.md", "fine")]);

    let report = site.builder().full_build().unwrap();

    assert_eq!(report, BuildReport { built: 2, failed: 1 });
    assert_eq!(report.total(), 3);
    assert!(!site.out("bad").exists());
}

#[test]
fn test_full_build_output_matches_sources() {
    let site = Site::new(&[
        ("index.md", "home"),
        ("about.md", "about"),
        ("guide/index.md", "guide"),
        ("guide/intro.md", "intro"),
        ("a/b/c.md", "deep"),
    ]);

    let report = site.builder().full_build().unwrap();

    assert_eq!(report.built, 5);
    assert_eq!(
        site.output_files(),
        [
            "a/b/c/index.html",
            "about/index.html",
            "guide/index/index.html",
            "guide/intro/index.html",
            "index.html",
        ]
    );
}

// ============================================================================
// build_one
// ============================================================================

#[test]
fn test_build_one_creates_ancestors() {
    let site = Site::new(&[]);
    let builder = site.builder();
    builder.full_build().unwrap();

    site.write("a/b/c.md", "deep");
    let index = builder.build_one(&site.src("a/b/c.md")).unwrap();

    assert_eq!(index, site.out("a/b/c/index.html"));
    assert_eq!(site.read("a/b/c/index.html"), "<main>deep</main>");
}

#[test]
fn test_build_one_is_idempotent() {
    let site = Site::new(&[("page.md", "same")]);
    let builder = site.builder();
    builder.full_build().unwrap();
    let first = fs::read(site.out("page/index.html")).unwrap();

    builder.build_one(&site.src("page.md")).unwrap();
    builder.build_one(&site.src("page.md")).unwrap();

    assert_eq!(fs::read(site.out("page/index.html")).unwrap(), first);
}

#[test]
fn test_build_one_overwrites_on_modify() {
    let site = Site::new(&[("page.md", "v1")]);
    let builder = site.builder();
    builder.full_build().unwrap();

    site.write("page.md", "v2");
    builder.build_one(&site.src("page.md")).unwrap();

    assert_eq!(site.read("page/index.html"), "<main>v2</main>");
}

#[test]
fn test_build_one_failure_keeps_previous_output() {
    let site = Site::new(&[("page.md", "v1")]);
    let builder = site.builder();
    builder.full_build().unwrap();

    site.write("page.md", "FAIL now");
    let err = builder.build_one(&site.src("page.md")).unwrap_err();

    assert!(matches!(err, BuildError::Render { .. }));
    assert_eq!(site.read("page/index.html"), "<main>v1</main>");
}

#[test]
fn test_build_one_missing_source_is_io_error() {
    let site = Site::new(&[]);
    let err = site.builder().build_one(&site.src("ghost.md")).unwrap_err();
    assert!(matches!(err, BuildError::Io { action: "read", .. }));
}

#[test]
fn test_build_one_out_of_scope() {
    let site = Site::new(&[]);
    let err = site
        .builder()
        .build_one(Path::new("/definitely/elsewhere.md"))
        .unwrap_err();
    assert!(matches!(err, BuildError::OutOfScope { .. }));
}

#[cfg(unix)]
#[test]
fn test_build_one_rejects_symlink_out_of_root() {
    let site = Site::new(&[]);
    let outside = site.content.parent().unwrap().join("outside");
    fs::create_dir_all(&outside).unwrap();
    fs::write(outside.join("secret.md"), "secret").unwrap();
    std::os::unix::fs::symlink(&outside, site.src("link")).unwrap();
    let builder = site.builder();

    let err = builder.build_one(&site.src("link/secret.md")).unwrap_err();

    assert!(matches!(err, BuildError::OutOfScope { .. }));
    assert_eq!(builder.renderer.calls(), 0);
    assert!(!site.out("link").exists());
}

#[test]
fn test_build_one_with_markdown_renderer() {
    let site = Site::new(&[("post.md", "---\ntitle: x\n---\n\n# Hi\n")]);
    let config = SiteConfig::for_dirs(&site.content, &site.output);
    let builder = Builder::new(PathMapper::new(&config), MarkdownRenderer::default());

    builder.build_one(&site.src("post.md")).unwrap();

    assert_eq!(site.read("post/index.html"), "<h1 id=\"hi\">Hi</h1>\n");
}

// ============================================================================
// remove_one
// ============================================================================

#[test]
fn test_remove_only_file_prunes_guide() {
    let site = Site::new(&[("index.md", "home"), ("guide/intro.md", "intro")]);
    let builder = site.builder();
    builder.full_build().unwrap();

    fs::remove_file(site.src("guide/intro.md")).unwrap();
    builder.remove_one(&site.src("guide/intro.md")).unwrap();
    builder.prune();

    assert!(!site.out("guide").exists());
    assert_eq!(site.output_files(), ["index.html"]);
    assert!(!site.has_empty_dir());
}

#[test]
fn test_remove_keeps_nested_units() {
    let site = Site::new(&[("guide.md", "guide"), ("guide/intro.md", "intro")]);
    let builder = site.builder();
    builder.full_build().unwrap();

    builder.remove_one(&site.src("guide.md")).unwrap();
    builder.prune();

    assert_eq!(site.output_files(), ["guide/intro/index.html"]);
}

#[test]
fn test_remove_root_sentinel_keeps_output_root() {
    let site = Site::new(&[("index.md", "home"), ("about.md", "about")]);
    let builder = site.builder();
    builder.full_build().unwrap();

    builder.remove_one(&site.src("index.md")).unwrap();
    builder.prune();

    assert!(site.output.is_dir());
    assert_eq!(site.output_files(), ["about/index.html"]);
}

#[test]
fn test_remove_last_document_leaves_empty_root() {
    let site = Site::new(&[("only.md", "x")]);
    let builder = site.builder();
    builder.full_build().unwrap();

    builder.remove_one(&site.src("only.md")).unwrap();
    let report = builder.prune();

    assert_eq!(report.failed, 0);
    assert!(site.output.is_dir());
    assert!(site.output_files().is_empty());
}

#[test]
fn test_remove_missing_output_is_ok() {
    let site = Site::new(&[]);
    let builder = site.builder();
    builder.full_build().unwrap();

    builder.remove_one(&site.src("never/built.md")).unwrap();
}

// ============================================================================
// move_one
// ============================================================================

#[test]
fn test_rename_within_guide_relocates_without_render() {
    let site = Site::new(&[("index.md", "home"), ("guide/intro.md", "intro")]);
    let builder = site.builder();
    builder.full_build().unwrap();
    let renders = builder.renderer.calls();

    fs::rename(site.src("guide/intro.md"), site.src("guide/start.md")).unwrap();
    let outcome = builder
        .move_one(&site.src("guide/intro.md"), &site.src("guide/start.md"))
        .unwrap();
    builder.prune();

    assert_eq!(
        outcome,
        MoveOutcome::Relocated(site.out("guide/start/index.html"))
    );
    assert_eq!(builder.renderer.calls(), renders);
    assert_eq!(site.output_files(), ["guide/start/index.html", "index.html"]);
    assert_eq!(site.read("guide/start/index.html"), "<main>intro</main>");
    assert!(!site.has_empty_dir());
}

#[test]
fn test_move_across_directories_prunes_old_chain() {
    let site = Site::new(&[("a/b/c.md", "deep")]);
    let builder = site.builder();
    builder.full_build().unwrap();

    fs::create_dir_all(site.src("x")).unwrap();
    fs::rename(site.src("a/b/c.md"), site.src("x/y.md")).unwrap();
    builder
        .move_one(&site.src("a/b/c.md"), &site.src("x/y.md"))
        .unwrap();
    builder.prune();

    assert_eq!(site.output_files(), ["x/y/index.html"]);
    assert!(!site.out("a").exists());
}

#[test]
fn test_move_without_old_output_rebuilds() {
    let site = Site::new(&[]);
    let builder = site.builder();
    builder.full_build().unwrap();

    site.write("new.md", "fresh");
    let outcome = builder
        .move_one(&site.src("old.md"), &site.src("new.md"))
        .unwrap();

    assert_eq!(outcome, MoveOutcome::Rebuilt(site.out("new/index.html")));
    assert_eq!(builder.renderer.calls(), 1);
    assert_eq!(site.read("new/index.html"), "<main>fresh</main>");
}

#[test]
fn test_move_onto_root_sentinel() {
    let site = Site::new(&[("home.md", "home")]);
    let builder = site.builder();
    builder.full_build().unwrap();

    fs::rename(site.src("home.md"), site.src("index.md")).unwrap();
    let outcome = builder
        .move_one(&site.src("home.md"), &site.src("index.md"))
        .unwrap();
    builder.prune();

    assert_eq!(outcome, MoveOutcome::Relocated(site.out("index.html")));
    assert_eq!(site.output_files(), ["index.html"]);
}

// ============================================================================
// incremental sequence
// ============================================================================

#[test]
fn test_incremental_matches_full_build() {
    let site = Site::new(&[("index.md", "home"), ("guide/intro.md", "intro")]);
    let builder = site.builder();
    builder.full_build().unwrap();

    site.write("a/b/c.md", "deep");
    builder.build_one(&site.src("a/b/c.md")).unwrap();

    fs::rename(site.src("guide/intro.md"), site.src("guide/start.md")).unwrap();
    builder
        .move_one(&site.src("guide/intro.md"), &site.src("guide/start.md"))
        .unwrap();
    builder.prune();

    fs::remove_file(site.src("index.md")).unwrap();
    builder.remove_one(&site.src("index.md")).unwrap();
    builder.prune();

    let incremental = site.output_files();
    builder.full_build().unwrap();
    assert_eq!(incremental, site.output_files());
    assert_eq!(incremental, ["a/b/c/index.html", "guide/start/index.html"]);
}

#[test]
fn test_collect_sources_sorted() {
    let site = Site::new(&[("b.md", ""), ("a/z.md", ""), ("a/a.md", ""), ("c.txt", "")]);
    let sources = collect_sources(&site.content);
    assert_eq!(
        sources,
        [site.src("a/a.md"), site.src("a/z.md"), site.src("b.md")]
    );
}
