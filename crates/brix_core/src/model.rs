//! Model loading.
//!
//! A model is a `.mpd`, `.ldr` or `.l3b` document. Loading walks its main
//! segment, descending into submodels, and produces one [`Placement`] per
//! part reference with the accumulated transform and color.

use std::path::{Path, PathBuf};

use brix_math::Mat4;
use thiserror::Error;

use crate::builder::{BuildError, DEFAULT_MAX_DEPTH};
use crate::color::ColorToken;
use crate::config::Session;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::library::normalize_reference;
use crate::line::{classify, LineRecord};
use crate::mpd::{MpdDocument, MpdError, Segment};

/// Errors that can occur during model loading.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported model format: {0}")]
    UnsupportedFormat(String),

    #[error("Document has no segments")]
    Empty,

    #[error("MPD error: {0}")]
    Mpd(#[from] MpdError),

    #[error("Build error: {0}")]
    Build(#[from] BuildError),

    #[error("Submodels nested deeper than {depth} at '{name}'")]
    SubmodelDepth { name: String, depth: usize },
}

/// Result type for loading operations.
pub type LoadResult<T> = Result<T, LoadError>;

/// Options for [`Model::load`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadOptions {
    /// Rewrite inline parts that already exist in the unofficial library
    pub force_unofficial: bool,

    /// Maximum submodel nesting before loading fails
    pub max_depth: usize,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            force_unofficial: false,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// One part placed in the model.
#[derive(Clone, Debug, PartialEq)]
pub struct Placement {
    /// Normalized part reference, e.g. `3001.dat`
    pub part: String,

    /// Color after submodel inheritance; `Ambient` when nothing painted it
    pub color: ColorToken,

    /// Model-space transform
    pub transform: Mat4,

    /// Submodel that placed the part, `None` for the main model
    pub submodel: Option<String>,
}

/// A loaded model.
#[derive(Clone, Debug)]
pub struct Model {
    name: String,
    document: MpdDocument,
    placements: Vec<Placement>,
    materialized: Vec<PathBuf>,
    diagnostics: Diagnostics,
}

impl Model {
    /// Load a model file. MPD documents have their inline parts written
    /// into the unofficial library first.
    pub fn load<P: AsRef<Path>>(session: &Session, path: P, options: &LoadOptions) -> LoadResult<Self> {
        let path = path.as_ref();
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unnamed")
            .to_string();
        let extension = path
            .extension()
            .and_then(|s| s.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        let bytes = std::fs::read(path)?;
        let content = String::from_utf8_lossy(&bytes);

        let (document, materialized) = match extension.as_str() {
            "mpd" => {
                let document = MpdDocument::split(&content);
                let written = document.materialize(session.layout(), options.force_unofficial)?;
                (document, written)
            }
            "ldr" | "l3b" => {
                let file_name = path.file_name().and_then(|s| s.to_str()).unwrap_or(&name);
                (MpdDocument::single(file_name, &content), Vec::new())
            }
            _ => return Err(LoadError::UnsupportedFormat(path.display().to_string())),
        };

        let mut model = Self::from_document_with(&name, document, options)?;
        model.materialized = materialized;
        log::info!(
            "Loaded model '{}': {} placements of {} unique parts",
            model.name,
            model.placements.len(),
            model.unique_parts().len()
        );
        Ok(model)
    }

    /// Walk an already split document with default options.
    pub fn from_document(name: &str, document: MpdDocument) -> LoadResult<Self> {
        Self::from_document_with(name, document, &LoadOptions::default())
    }

    pub fn from_document_with(name: &str, document: MpdDocument, options: &LoadOptions) -> LoadResult<Self> {
        let main = document.main_segment().ok_or(LoadError::Empty)?;

        let mut walker = Walker {
            document: &document,
            max_depth: options.max_depth,
            placements: Vec::new(),
            diagnostics: Diagnostics::new(),
        };
        let root = Walk {
            segment: main,
            transform: Mat4::IDENTITY,
            color: ColorToken::Ambient,
            submodel: None,
            depth: 0,
        };
        walker.walk(root)?;
        let Walker {
            placements,
            diagnostics,
            ..
        } = walker;

        Ok(Self {
            name: name.to_string(),
            document,
            placements,
            materialized: Vec::new(),
            diagnostics,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn document(&self) -> &MpdDocument {
        &self.document
    }

    pub fn placements(&self) -> &[Placement] {
        &self.placements
    }

    /// Inline parts written into the library while loading.
    pub fn materialized(&self) -> &[PathBuf] {
        &self.materialized
    }

    /// Malformed lines met while walking the document.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Distinct parts in first-placed order, compared case-insensitively.
    pub fn unique_parts(&self) -> Vec<&str> {
        let mut seen = std::collections::HashSet::new();
        self.placements
            .iter()
            .filter(|p| seen.insert(p.part.to_lowercase()))
            .map(|p| p.part.as_str())
            .collect()
    }
}

struct Walk<'d> {
    segment: &'d Segment,
    transform: Mat4,
    color: ColorToken,
    submodel: Option<&'d str>,
    depth: usize,
}

struct Walker<'d> {
    document: &'d MpdDocument,
    max_depth: usize,
    placements: Vec<Placement>,
    diagnostics: Diagnostics,
}

impl<'d> Walker<'d> {
    fn walk(&mut self, at: Walk<'d>) -> LoadResult<()> {
        let document = self.document;
        for (index, line) in at.segment.lines().iter().enumerate() {
            let (color, transform, reference) = match classify(line) {
                Ok(Some(LineRecord::SubfileRef {
                    color,
                    transform,
                    reference,
                })) => (color, transform, reference),
                Ok(_) => continue,
                Err(error) => {
                    self.diagnostics.push(Diagnostic::MalformedLine {
                        source: at.segment.name().to_string(),
                        line: index + 1,
                        error,
                    });
                    continue;
                }
            };

            let color = color.inherit(&at.color);
            let transform = at.transform * transform;

            let submodel = if reference.to_lowercase().contains(".dat") {
                None
            } else {
                document.get(&reference)
            };

            match submodel {
                Some(segment) => {
                    if at.depth + 1 > self.max_depth {
                        return Err(LoadError::SubmodelDepth {
                            name: segment.name().to_string(),
                            depth: self.max_depth,
                        });
                    }
                    self.walk(Walk {
                        segment,
                        transform,
                        color,
                        submodel: Some(segment.name()),
                        depth: at.depth + 1,
                    })?;
                }
                None => self.placements.push(Placement {
                    part: normalize_reference(&reference),
                    color,
                    transform,
                    submodel: at.submodel.map(String::from),
                }),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestLibrary;
    use brix_math::Vec3;

    const CASTLE: &str = "\
0 FILE castle.ldr
0 Castle
1 16 0 0 0 1 0 0 0 1 0 0 0 1 tower.ldr
1 4 100 0 0 1 0 0 0 1 0 0 0 1 tower.ldr
1 15 0 -24 0 1 0 0 0 1 0 0 0 1 3001.dat
0 FILE tower.ldr
1 16 0 0 10 1 0 0 0 1 0 0 0 1 3005.dat
1 1 0 -24 10 1 0 0 0 1 0 0 0 1 flag.dat
0 FILE flag.dat
0 !LDRAW_ORG Unofficial_Part
3 16 0 0 0 1 0 0 0 1 0
";

    #[test]
    fn test_submodels_compose_transform_and_color() {
        let model = Model::from_document("castle", MpdDocument::split(CASTLE)).unwrap();
        let placements = model.placements();
        assert_eq!(placements.len(), 5);

        // First tower: unpainted, so its 3005 stays code 16
        assert_eq!(placements[0].part, "3005.dat");
        assert_eq!(placements[0].color, ColorToken::Ambient);
        assert_eq!(placements[0].submodel.as_deref(), Some("tower.ldr"));

        // Second tower is painted red and shifted
        assert_eq!(placements[2].color, ColorToken::Code(4));
        assert_eq!(
            placements[2].transform.transform_point3(Vec3::ZERO),
            Vec3::new(100.0, 0.0, 10.0)
        );
        // Explicit colors inside the submodel win
        assert_eq!(placements[3].color, ColorToken::Code(1));

        assert_eq!(placements[4].part, "3001.dat");
        assert_eq!(placements[4].submodel, None);
        assert_eq!(model.unique_parts(), vec!["3005.dat", "flag.dat", "3001.dat"]);
    }

    #[test]
    fn test_submodel_with_backslash_name() {
        let doc = MpdDocument::split(
            "0 FILE ship.ldr\n1 16 0 0 0 1 0 0 0 1 0 0 0 1 sub\\wing.ldr\n\
             0 FILE sub\\wing.ldr\n1 4 0 0 0 1 0 0 0 1 0 0 0 1 3023.dat\n",
        );
        let model = Model::from_document("ship", doc).unwrap();

        assert_eq!(model.placements().len(), 1);
        assert_eq!(model.placements()[0].part, "3023.dat");
        assert_eq!(model.placements()[0].submodel.as_deref(), Some("sub\\wing.ldr"));
    }

    #[test]
    fn test_load_mpd_materializes_inline_parts() {
        let lib = TestLibrary::new();
        let path = lib.write("models/castle.mpd", CASTLE);

        let model = Model::load(&lib.session(), &path, &LoadOptions::default()).unwrap();
        assert_eq!(model.name(), "castle");
        assert_eq!(model.materialized(), &[lib.path("UnOfficial/parts/flag.dat")]);
        assert!(lib.path("UnOfficial/parts/flag.dat").is_file());
    }

    #[test]
    fn test_load_ldr() {
        let lib = TestLibrary::new();
        let path = lib.write(
            "models/wall.ldr",
            "0 Wall\n1 4 0 0 0 1 0 0 0 1 0 0 0 1 3001.dat\n1 4 40 0 0 1 0 0 0 1 0 0 0 1 3001.DAT\n",
        );

        let model = Model::load(&lib.session(), &path, &LoadOptions::default()).unwrap();
        assert_eq!(model.placements().len(), 2);
        assert_eq!(model.unique_parts(), vec!["3001.dat"]);
        assert!(model.materialized().is_empty());
    }

    #[test]
    fn test_unsupported_extension() {
        let lib = TestLibrary::new();
        let path = lib.write("models/wall.obj", "o wall\n");

        let err = Model::load(&lib.session(), &path, &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, LoadError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_empty_document() {
        let err = Model::from_document("empty", MpdDocument::split("")).unwrap_err();
        assert!(matches!(err, LoadError::Empty));
    }

    #[test]
    fn test_self_referencing_submodel() {
        let doc = MpdDocument::split("0 FILE a.ldr\n1 16 0 0 0 1 0 0 0 1 0 0 0 1 a.ldr\n");
        let err = Model::from_document("a", doc).unwrap_err();
        assert!(matches!(err, LoadError::SubmodelDepth { depth: DEFAULT_MAX_DEPTH, .. }));
    }

    #[test]
    fn test_submodel_depth_is_configurable() {
        let options = LoadOptions {
            max_depth: 1,
            ..Default::default()
        };

        // Main model -> tower -> 3005 stays within one level of nesting
        let model = Model::from_document_with("castle", MpdDocument::split(CASTLE), &options).unwrap();
        assert_eq!(model.placements().len(), 5);

        let nested = "0 FILE a.ldr\n1 16 0 0 0 1 0 0 0 1 0 0 0 1 b.ldr\n\
                      0 FILE b.ldr\n1 16 0 0 0 1 0 0 0 1 0 0 0 1 c.ldr\n\
                      0 FILE c.ldr\n1 4 0 0 0 1 0 0 0 1 0 0 0 1 3001.dat\n";
        let err = Model::from_document_with("a", MpdDocument::split(nested), &options).unwrap_err();
        match err {
            LoadError::SubmodelDepth { name, depth } => {
                assert_eq!(name, "c.ldr");
                assert_eq!(depth, 1);
            }
            other => panic!("expected depth error, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_lines_are_diagnostics() {
        let doc = MpdDocument::split("0 FILE a.ldr\n1 4 0 0 0 1 0 0\n1 4 0 0 0 1 0 0 0 1 0 0 0 1 3001.dat\n");
        let model = Model::from_document("a", doc).unwrap();

        assert_eq!(model.placements().len(), 1);
        assert_eq!(model.diagnostics().malformed_lines(), 1);
        match model.diagnostics().iter().next() {
            Some(Diagnostic::MalformedLine { source, line, .. }) => {
                assert_eq!(source, "a.ldr");
                assert_eq!(*line, 2);
            }
            other => panic!("expected malformed line, got {:?}", other),
        };
    }
}
