//! LDraw part library layout and part lookup.
//!
//! A library root has a fixed layout:
//!
//! ```text
//! <root>/parts        <root>/UnOfficial/parts
//! <root>/parts/s      <root>/UnOfficial/parts/s
//! <root>/p            <root>/UnOfficial/p
//! <root>/p/48         <root>/UnOfficial/p/48
//! <root>/p/8          <root>/UnOfficial/p/8
//! ```
//!
//! plus an optional local override root searched last. Lookups never fail:
//! an unresolvable reference maps to the "part not found" placeholder.

use std::path::{Path, PathBuf};

/// File name of the placeholder substituted for parts that cannot be found.
pub const PLACEHOLDER_PART: &str = "box-part-not-found.dat";

/// Built-in placeholder geometry, used when the override root does not ship
/// its own `box-part-not-found.dat`. A 20 x 24 x 20 LDU box in code 16.
pub const PLACEHOLDER_GEOMETRY: &str = "\
0 Part Not Found Box
0 BFC CERTIFY CCW
4 16 -10 0 -10 10 0 -10 10 0 10 -10 0 10
4 16 -10 24 10 10 24 10 10 24 -10 -10 24 -10
4 16 -10 0 -10 -10 24 -10 10 24 -10 10 0 -10
4 16 10 0 -10 10 24 -10 10 24 10 10 0 10
4 16 10 0 10 10 24 10 -10 24 10 -10 0 10
4 16 -10 0 10 -10 24 10 -10 24 -10 -10 0 -10
";

/// Organization type of a library file, as declared by `0 !LDRAW_ORG`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PartKind {
    Part,
    Subpart,
    Primitive,
    /// 48-segment high resolution primitive
    HiResPrimitive,
    /// 8-segment low resolution primitive
    LoResPrimitive,
}

impl PartKind {
    /// Map an `!LDRAW_ORG` type (`Unofficial_Subpart`, `Primitive`, ...) to a kind.
    /// Unknown types are treated as plain parts.
    pub fn from_organization(org: &str) -> Self {
        let org = org.strip_prefix("Unofficial_").unwrap_or(org);
        match org {
            "Subpart" => PartKind::Subpart,
            "Primitive" => PartKind::Primitive,
            "48_Primitive" => PartKind::HiResPrimitive,
            "8_Primitive" => PartKind::LoResPrimitive,
            _ => PartKind::Part,
        }
    }

    /// Directory of this kind relative to a library (or unofficial) root.
    fn relative_dir(self) -> PathBuf {
        match self {
            PartKind::Part => PathBuf::from("parts"),
            PartKind::Subpart => Path::new("parts").join("s"),
            PartKind::Primitive => PathBuf::from("p"),
            PartKind::HiResPrimitive => Path::new("p").join("48"),
            PartKind::LoResPrimitive => Path::new("p").join("8"),
        }
    }
}

/// Directory layout of an LDraw library installation.
#[derive(Clone, Debug)]
pub struct LibraryLayout {
    root: PathBuf,
    overrides: Option<PathBuf>,
}

impl LibraryLayout {
    pub fn new(root: impl Into<PathBuf>, overrides: Option<PathBuf>) -> Self {
        Self {
            root: root.into(),
            overrides,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Local override root, searched after everything else.
    pub fn overrides(&self) -> Option<&Path> {
        self.overrides.as_deref()
    }

    pub fn official_dir(&self, kind: PartKind) -> PathBuf {
        self.root.join(kind.relative_dir())
    }

    pub fn unofficial_root(&self) -> PathBuf {
        self.root.join("UnOfficial")
    }

    pub fn unofficial_dir(&self, kind: PartKind) -> PathBuf {
        self.unofficial_root().join(kind.relative_dir())
    }

    /// Where the "part not found" placeholder lives.
    pub fn placeholder_path(&self) -> PathBuf {
        self.overrides
            .as_deref()
            .unwrap_or(&self.root)
            .join(PLACEHOLDER_PART)
    }
}

/// Result of a part lookup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedPart {
    /// Normalized reference that was looked up
    pub reference: String,

    /// Resolved file, or the placeholder location when `exists` is false
    pub path: PathBuf,

    /// False when every search root was exhausted
    pub exists: bool,
}

impl ResolvedPart {
    /// True when this is the "part not found" substitute.
    pub fn is_placeholder(&self) -> bool {
        !self.exists
    }
}

/// One directory searched by the locator, with its high-res sibling if any.
#[derive(Clone, Debug)]
struct SearchRoot {
    dir: PathBuf,
    hi_res: Option<PathBuf>,
}

/// Resolves raw part references against a prioritized list of library roots.
#[derive(Clone, Debug)]
pub struct PartLocator {
    layout: LibraryLayout,
    roots: Vec<SearchRoot>,
}

impl PartLocator {
    pub fn new(layout: LibraryLayout) -> Self {
        let mut roots = Vec::new();

        let mut push_tree = |part: PathBuf, sub: PathBuf, prim: PathBuf, prim48: PathBuf| {
            roots.push(SearchRoot { dir: part, hi_res: None });
            roots.push(SearchRoot { dir: sub, hi_res: None });
            roots.push(SearchRoot {
                dir: prim,
                hi_res: Some(prim48),
            });
        };

        push_tree(
            layout.official_dir(PartKind::Part),
            layout.official_dir(PartKind::Subpart),
            layout.official_dir(PartKind::Primitive),
            layout.official_dir(PartKind::HiResPrimitive),
        );
        push_tree(
            layout.unofficial_dir(PartKind::Part),
            layout.unofficial_dir(PartKind::Subpart),
            layout.unofficial_dir(PartKind::Primitive),
            layout.unofficial_dir(PartKind::HiResPrimitive),
        );

        if let Some(overrides) = layout.overrides() {
            roots.push(SearchRoot {
                dir: overrides.to_path_buf(),
                hi_res: None,
            });
        }

        Self { layout, roots }
    }

    pub fn layout(&self) -> &LibraryLayout {
        &self.layout
    }

    /// Resolve a raw reference to a file.
    ///
    /// Each root is tried with the name as given, then fully lowercased.
    /// With `allow_high_res`, a match in a primitives root is swapped for its
    /// 48-segment sibling when one exists.
    pub fn resolve(&self, reference: &str, allow_high_res: bool) -> ResolvedPart {
        let name = normalize_reference(reference);
        let lower = name.to_lowercase();

        for root in &self.roots {
            for candidate in [name.as_str(), lower.as_str()] {
                let path = root.dir.join(candidate);
                if !path.is_file() {
                    continue;
                }

                if allow_high_res {
                    if let Some(hi_res) = &root.hi_res {
                        let hi_res_path = hi_res.join(candidate);
                        if hi_res_path.is_file() {
                            return ResolvedPart {
                                reference: name.clone(),
                                path: hi_res_path,
                                exists: true,
                            };
                        }
                    }
                }

                return ResolvedPart {
                    reference: name.clone(),
                    path,
                    exists: true,
                };
            }
        }

        log::debug!("Part '{}' not found in any library root", name);
        ResolvedPart {
            reference: name,
            path: self.layout.placeholder_path(),
            exists: false,
        }
    }
}

/// Normalize a reference for lookup: Windows separators become `/`,
/// all whitespace is removed and leading separators are dropped.
pub fn normalize_reference(reference: &str) -> String {
    let cleaned: String = reference
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == '\\' { '/' } else { c })
        .collect();
    cleaned.trim_start_matches('/').to_string()
}
