//! Test helpers that lay out PBF inputs and tag rule files on disk.

use camino::{Utf8Path, Utf8PathBuf};
use sieve_core::test_support::{node, relation, tags, way};
use sieve_core::{ElementKind, Entity, Matcher, TagRules};
use sieve_data::test_support::PbfFixture;
use std::fs;
use tempfile::TempDir;

pub(super) const BOUNDARY_RULES: &str = "boundary: true\n";

/// Scratch directory holding the files a CLI invocation reads and writes.
pub(super) struct Workspace {
    _dir: TempDir,
    root: Utf8PathBuf,
}

impl Workspace {
    pub(super) fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 tempdir");
        Self { _dir: dir, root }
    }

    pub(super) fn path(&self, name: &str) -> Utf8PathBuf {
        self.root.join(name)
    }

    pub(super) fn staging_dir(&self) -> Utf8PathBuf {
        self.path("staging")
    }

    pub(super) fn write_rules(&self, name: &str, contents: &str) -> Utf8PathBuf {
        let path = self.path(name);
        write_utf8(&path, contents.as_bytes());
        path
    }

    pub(super) fn write_pbf(&self, name: &str, fixture: &PbfFixture) -> Utf8PathBuf {
        let path = self.path(name);
        fixture
            .write_to(path.as_std_path())
            .expect("write PBF fixture");
        path
    }
}

pub(super) fn write_utf8(path: &Utf8Path, contents: &[u8]) {
    fs::write(path.as_std_path(), contents).expect("write fixture file");
}

/// A boundary relation over one way and one node, plus an unrelated node.
pub(super) fn boundary_extract() -> PbfFixture {
    PbfFixture::new()
        .with(node(20))
        .with(node(21))
        .with(way(10, tags([("highway", "residential")])))
        .with(relation(
            1,
            tags([("boundary", "administrative")]),
            [(ElementKind::Way, 10), (ElementKind::Node, 20)],
        ))
}

/// Rules equivalent to [`BOUNDARY_RULES`].
pub(super) fn boundary_rules() -> TagRules {
    TagRules::from_iter([("boundary", Matcher::Present(true))])
}

/// Parse CLI output into entities, checking the trailing newline.
pub(super) fn parse_output(bytes: &[u8]) -> Vec<Entity> {
    let json = bytes
        .strip_suffix(b"\n")
        .unwrap_or_else(|| panic!("output should end with a newline: {bytes:?}"));
    serde_json::from_slice(json).expect("output must be a JSON array")
}
