//! Multi-part documents (MPD).
//!
//! An MPD file concatenates several LDraw files, each introduced by a
//! `0 FILE <name>` marker. Segments whose name is a `.dat` file are inline
//! unofficial parts; they can be written into the library so the locator
//! finds them like any installed part.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::library::{normalize_reference, LibraryLayout, PartKind};
use crate::line::MetaCommand;

/// Errors that can occur while materializing inline parts.
#[derive(Error, Debug)]
pub enum MpdError {
    #[error("IO error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for MPD operations.
pub type MpdResult<T> = Result<T, MpdError>;

/// One named section of a document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Segment {
    name: String,
    lines: Vec<String>,
}

impl Segment {
    pub fn new(name: impl Into<String>, lines: Vec<String>) -> Self {
        Self {
            name: name.into(),
            lines,
        }
    }

    /// Segment name with spaces removed; empty for lines before the first marker.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// The segment as file content, newline terminated.
    pub fn content(&self) -> String {
        let mut content = self.lines.join("\n");
        content.push('\n');
        content
    }

    /// True for inline part files (`.dat`) as opposed to submodels.
    pub fn is_part(&self) -> bool {
        self.name.to_lowercase().contains(".dat")
    }

    /// Organization type from `0 !LDRAW_ORG`; plain part when absent.
    pub fn kind(&self) -> PartKind {
        self.lines
            .iter()
            .find_map(|line| match MetaCommand::from_line(line) {
                Some(MetaCommand::Organization(kind)) => Some(kind),
                _ => None,
            })
            .unwrap_or(PartKind::Part)
    }

    /// File name used when writing the segment into the library: the last
    /// path component, so `s\foo.dat` lands in the subpart directory as `foo.dat`.
    pub fn file_name(&self) -> &str {
        self.name
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(&self.name)
    }
}

/// A document split into segments, in document order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MpdDocument {
    segments: Vec<Segment>,
}

impl MpdDocument {
    /// Split MPD content into segments.
    ///
    /// Every line is kept. Subfile references are re-serialized with the
    /// spaces inside their file name removed.
    pub fn split(content: &str) -> Self {
        let mut segments = Vec::new();
        let mut current = Segment::new("", Vec::new());

        for raw in content.lines() {
            if let Some(MetaCommand::File(name)) = MetaCommand::from_line(raw) {
                if !current.name.is_empty() || !current.lines.is_empty() {
                    segments.push(current);
                }
                current = Segment::new(name, Vec::new());
            }
            current.lines.push(normalize_line(raw));
        }

        if !current.name.is_empty() || !current.lines.is_empty() {
            segments.push(current);
        }

        log::debug!("Split document into {} segments", segments.len());
        Self { segments }
    }

    /// A plain `.ldr` file: one segment holding every line unchanged.
    pub fn single(name: &str, content: &str) -> Self {
        Self {
            segments: vec![Segment::new(
                name.replace(' ', ""),
                content.lines().map(String::from).collect(),
            )],
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn line_count(&self) -> usize {
        self.segments.iter().map(|s| s.lines.len()).sum()
    }

    /// Find a segment by reference, ignoring case and whitespace.
    pub fn get(&self, reference: &str) -> Option<&Segment> {
        let wanted = normalize_reference(reference).to_lowercase();
        self.segments
            .iter()
            .find(|s| !s.name.is_empty() && normalize_reference(&s.name).to_lowercase() == wanted)
    }

    /// The model to build: a segment named like `main` if there is one,
    /// otherwise the first named segment.
    pub fn main_segment(&self) -> Option<&Segment> {
        self.segments
            .iter()
            .find(|s| s.name.to_lowercase().contains("main"))
            .or_else(|| self.segments.iter().find(|s| !s.name.is_empty()))
            .or_else(|| self.segments.first())
    }

    /// Write every inline part into the unofficial library.
    ///
    /// Existing files are left alone unless `force` is set. Returns the
    /// files that were written.
    pub fn materialize(&self, layout: &LibraryLayout, force: bool) -> MpdResult<Vec<PathBuf>> {
        let mut written = Vec::new();

        for segment in self.segments.iter().filter(|s| s.is_part()) {
            let dir = layout.unofficial_dir(segment.kind());
            let path = dir.join(segment.file_name());

            if path.exists() && !force {
                log::debug!("Keeping existing unofficial part {}", path.display());
                continue;
            }

            fs::create_dir_all(&dir).map_err(|source| MpdError::Io {
                path: dir.clone(),
                source,
            })?;
            write_segment(&path, segment)?;
            log::info!("Materialized '{}' to {}", segment.name, path.display());
            written.push(path);
        }

        Ok(written)
    }
}

fn write_segment(path: &Path, segment: &Segment) -> MpdResult<()> {
    fs::write(path, segment.content()).map_err(|source| MpdError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Split MPD content; see [`MpdDocument::split`].
pub fn split(content: &str) -> MpdDocument {
    MpdDocument::split(content)
}

/// Rejoin a subfile reference with its trailing file name collapsed.
/// Other lines are returned unchanged.
fn normalize_line(raw: &str) -> String {
    let tokens: Vec<&str> = raw.split_whitespace().collect();
    if tokens.first() != Some(&"1") || tokens.len() < 15 {
        return raw.to_string();
    }
    format!("{} {}", tokens[..14].join(" "), tokens[14..].concat())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestLibrary;

    const DOCUMENT: &str = "\
0 FILE main model.ldr
0 Main Model
1 4 0 0 0 1 0 0 0 1 0 0 0 1 wheel   assembly.ldr
1 16 0 -24 0 1 0 0 0 1 0 0 0 1 3001.dat
0 NOFILE
0 FILE wheel assembly.ldr
1 0 0 0 0 1 0 0 0 1 0 0 0 1 custom.dat

0 FILE custom.dat
0 Custom part
0 !LDRAW_ORG Unofficial_Part
4 16 0 0 0 1 0 0 1 1 0 0 1 0
0 FILE s\\custom s01.dat
0 !LDRAW_ORG Unofficial_Subpart
3 16 0 0 0 1 0 0 0 1 0
";

    #[test]
    fn test_split_segments() {
        let doc = MpdDocument::split(DOCUMENT);

        let names: Vec<&str> = doc.segments().iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            vec!["mainmodel.ldr", "wheelassembly.ldr", "custom.dat", "s\\customs01.dat"]
        );
        assert_eq!(doc.main_segment().unwrap().name(), "mainmodel.ldr");
        assert_eq!(
            doc.segments()[0].lines()[2],
            "1 4 0 0 0 1 0 0 0 1 0 0 0 1 wheelassembly.ldr"
        );
    }

    #[test]
    fn test_round_trip_line_count() {
        let doc = MpdDocument::split(DOCUMENT);
        assert_eq!(doc.line_count(), DOCUMENT.lines().count());

        let rejoined: Vec<&str> = doc
            .segments()
            .iter()
            .flat_map(|s| s.lines().iter().map(String::as_str))
            .collect();
        let original: Vec<&str> = DOCUMENT.lines().collect();
        assert_eq!(rejoined.len(), original.len());
        assert_eq!(rejoined[0], original[0]);
        assert_eq!(rejoined[6], original[6]);
    }

    #[test]
    fn test_preamble_segment() {
        let doc = MpdDocument::split("0 Author: someone\n0 FILE a.ldr\n0 A\n");
        assert_eq!(doc.len(), 2);
        assert_eq!(doc.segments()[0].name(), "");
        assert_eq!(doc.main_segment().unwrap().name(), "a.ldr");
    }

    #[test]
    fn test_main_named_segment_preferred() {
        let doc = MpdDocument::split("0 FILE sub.ldr\n0 FILE Castle_Main.ldr\n");
        assert_eq!(doc.main_segment().unwrap().name(), "Castle_Main.ldr");
    }

    #[test]
    fn test_lookup_ignores_case_and_spaces() {
        let doc = MpdDocument::split(DOCUMENT);
        assert!(doc.get("Wheel Assembly.LDR").is_some());
        assert!(doc.get("missing.ldr").is_none());
    }

    #[test]
    fn test_segment_kind_and_file_name() {
        let doc = MpdDocument::split(DOCUMENT);
        let sub = doc.get("s\\customs01.dat").unwrap();
        assert_eq!(sub.kind(), PartKind::Subpart);
        assert_eq!(sub.file_name(), "customs01.dat");
        assert!(sub.is_part());
        assert!(doc.get("S/CustomS01.dat").is_some());
        assert!(!doc.get("wheelassembly.ldr").unwrap().is_part());
        assert_eq!(doc.get("mainmodel.ldr").unwrap().kind(), PartKind::Part);
    }

    #[test]
    fn test_materialize_inline_parts() {
        let lib = TestLibrary::new();
        let doc = MpdDocument::split(DOCUMENT);

        let written = doc.materialize(&lib.layout(), false).unwrap();
        assert_eq!(
            written,
            vec![
                lib.path("UnOfficial/parts/custom.dat"),
                lib.path("UnOfficial/parts/s/customs01.dat"),
            ]
        );

        let content = std::fs::read_to_string(lib.path("UnOfficial/parts/custom.dat")).unwrap();
        assert!(content.starts_with("0 FILE custom.dat\n"));
        assert!(content.contains("4 16 0 0 0 1 0 0 1 1 0 0 1 0"));

        // The locator now finds the inline part
        assert!(lib.locator().resolve("custom.dat", false).exists);
    }

    #[test]
    fn test_materialize_keeps_existing_unless_forced() {
        let lib = TestLibrary::new();
        lib.write("UnOfficial/parts/custom.dat", "0 hand edited\n");
        let doc = MpdDocument::split(DOCUMENT);

        let written = doc.materialize(&lib.layout(), false).unwrap();
        assert_eq!(written.len(), 1);
        let kept = std::fs::read_to_string(lib.path("UnOfficial/parts/custom.dat")).unwrap();
        assert_eq!(kept, "0 hand edited\n");

        let written = doc.materialize(&lib.layout(), true).unwrap();
        assert_eq!(written.len(), 2);
        let replaced = std::fs::read_to_string(lib.path("UnOfficial/parts/custom.dat")).unwrap();
        assert!(replaced.contains("Custom part"));
    }

    #[test]
    fn test_single_segment() {
        let doc = MpdDocument::single("my house.ldr", "0 House\n1 4 0 0 0 1 0 0 0 1 0 0 0 1 3001.dat\n");
        assert_eq!(doc.len(), 1);
        assert_eq!(doc.main_segment().unwrap().name(), "myhouse.ldr");
        assert_eq!(doc.line_count(), 2);
    }
}
