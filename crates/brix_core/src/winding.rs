//! Backface-culling (BFC) winding state.
//!
//! Every part file is read with an inherited polarity. Polygons authored in
//! the file are reordered according to the file's current polarity, which
//! `0 BFC` directives may change for the rest of the file. Children derive
//! their polarity from the inherited one, flipped once for a mirroring
//! transform and once more for a pending `INVERTNEXT`.

use brix_math::{Mat4, Mat4Ext};

/// Winding polarity. `Ccw` keeps authored vertex order, `Cw` reverses it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Winding {
    #[default]
    Ccw,
    Cw,
}

impl Winding {
    pub fn flipped(self) -> Self {
        match self {
            Winding::Ccw => Winding::Cw,
            Winding::Cw => Winding::Ccw,
        }
    }

    pub fn flipped_if(self, flip: bool) -> Self {
        if flip {
            self.flipped()
        } else {
            self
        }
    }

    /// Put polygon vertices into output order.
    ///
    /// `Cw` uses a fixed permutation per vertex count: a triangle becomes
    /// (0, 2, 1) and a quad (0, 3, 2, 1), keeping the first vertex in place.
    pub fn reorder<T>(self, points: &mut [T]) {
        if self == Winding::Ccw {
            return;
        }
        match points.len() {
            3 => points.swap(1, 2),
            4 => points.swap(1, 3),
            _ => {}
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Winding::Ccw => "CCW",
            Winding::Cw => "CW",
        }
    }
}

/// A decoded `0 BFC ...` directive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BfcCommand {
    /// `CERTIFY` was present
    pub certify: bool,

    /// `NOCERTIFY` was present
    pub no_certify: bool,

    /// Declared winding, if any
    pub winding: Option<Winding>,

    /// `INVERTNEXT` was present
    pub invert_next: bool,
}

impl BfcCommand {
    /// Parse the tokens following `BFC`. Keywords may appear in any order and
    /// combination, e.g. `CERTIFY CCW`, `CLIP CW`, `INVERTNEXT`.
    pub fn parse<S: AsRef<str>>(tokens: &[S]) -> Self {
        let mut command = Self::default();
        for token in tokens {
            match token.as_ref().to_ascii_uppercase().as_str() {
                "CERTIFY" => command.certify = true,
                "NOCERTIFY" => command.no_certify = true,
                "CW" => command.winding = Some(Winding::Cw),
                "CCW" => command.winding = Some(Winding::Ccw),
                "INVERTNEXT" => command.invert_next = true,
                _ => {}
            }
        }
        command
    }
}

/// Polarity of a child reference, given the ambient polarity, the child's
/// transform and whether an `INVERTNEXT` is pending. The two flips compose.
pub fn child_winding(ambient: Winding, transform: &Mat4, invert_next: bool) -> Winding {
    ambient
        .flipped_if(transform.flips_winding())
        .flipped_if(invert_next)
}

/// Winding state of one part file invocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindingState {
    inherited: Winding,
    polarity: Winding,
    invert_next: bool,
}

impl WindingState {
    /// State at the top of a file read with the given inherited polarity.
    pub fn new(inherited: Winding) -> Self {
        Self {
            inherited,
            polarity: inherited,
            invert_next: false,
        }
    }

    /// Polarity applied to polygons authored in this file.
    pub fn polarity(&self) -> Winding {
        self.polarity
    }

    pub fn inherited(&self) -> Winding {
        self.inherited
    }

    pub fn invert_next_pending(&self) -> bool {
        self.invert_next
    }

    /// Apply a BFC directive.
    ///
    /// `CERTIFY CW` flips the file's polarity relative to the inherited one
    /// and `CERTIFY CCW` keeps it. A bare `CW` or `CCW` sets the polarity
    /// outright for the rest of the file.
    pub fn apply(&mut self, command: &BfcCommand) {
        if command.invert_next {
            self.invert_next = true;
        }
        if let Some(declared) = command.winding {
            self.polarity = match (command.certify, declared) {
                (true, Winding::Ccw) => self.inherited,
                (true, Winding::Cw) => self.inherited.flipped(),
                (false, declared) => declared,
            };
        }
    }

    /// Polarity for the next subfile reference. Consumes any pending `INVERTNEXT`.
    pub fn next_child(&mut self, transform: &Mat4) -> Winding {
        let winding = child_winding(self.inherited, transform, self.invert_next);
        self.invert_next = false;
        winding
    }
}
