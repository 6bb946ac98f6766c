//! LDraw line classification.
//!
//! Every physical line of a part file starts with a numeric type code:
//!
//! - `0` meta command or comment
//! - `1` subfile reference: `1 <color> x y z a b c d e f g h i <file>`
//! - `2` line: `2 <color> x1 y1 z1 x2 y2 z2`
//! - `3` triangle: `3 <color>` followed by three points
//! - `4` quad: `4 <color>` followed by four points
//!
//! Type `5` (optional lines) and unknown types carry nothing the builder uses.

use brix_math::{ldraw_matrix, Mat4, Vec3};
use thiserror::Error;

use crate::color::ColorToken;
use crate::library::PartKind;
use crate::winding::BfcCommand;

/// Errors for lines that declare a type but cannot be decoded.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LineError {
    #[error("line type {kind} needs {expected} fields, found {found}")]
    TooFewTokens {
        kind: u8,
        expected: usize,
        found: usize,
    },

    #[error("invalid number '{0}'")]
    InvalidNumber(String),
}

/// Result type for line classification.
pub type LineResult<T> = Result<T, LineError>;

/// A classified physical line.
#[derive(Clone, Debug, PartialEq)]
pub enum LineRecord {
    /// Type 0; the tokens after the type code
    Meta(Vec<String>),

    /// Type 1
    SubfileRef {
        color: ColorToken,
        transform: Mat4,
        reference: String,
    },

    /// Type 2
    Line { points: [Vec3; 2] },

    /// Type 3
    Triangle { color: ColorToken, points: [Vec3; 3] },

    /// Type 4
    Quad { color: ColorToken, points: [Vec3; 4] },
}

/// Classify one physical line.
///
/// Returns `Ok(None)` for lines with fewer than 3 tokens and for line types
/// that carry no geometry, and an error for geometry lines that are too short
/// or hold non-numeric coordinates.
pub fn classify(raw: &str) -> LineResult<Option<LineRecord>> {
    let tokens: Vec<&str> = raw.split_whitespace().collect();
    if tokens.len() < 3 {
        return Ok(None);
    }

    let record = match tokens[0] {
        "0" => LineRecord::Meta(tokens[1..].iter().map(|t| t.to_string()).collect()),
        "1" => {
            require(1, &tokens, 15)?;
            let params = parse_floats::<12>(&tokens[2..14])?;
            LineRecord::SubfileRef {
                color: ColorToken::parse(tokens[1]),
                transform: ldraw_matrix(params),
                reference: tokens[14..].join(" "),
            }
        }
        "2" => {
            require(2, &tokens, 8)?;
            LineRecord::Line {
                points: parse_points::<2>(&tokens[2..])?,
            }
        }
        "3" => {
            require(3, &tokens, 11)?;
            LineRecord::Triangle {
                color: ColorToken::parse(tokens[1]),
                points: parse_points::<3>(&tokens[2..])?,
            }
        }
        "4" => {
            require(4, &tokens, 14)?;
            LineRecord::Quad {
                color: ColorToken::parse(tokens[1]),
                points: parse_points::<4>(&tokens[2..])?,
            }
        }
        _ => return Ok(None),
    };

    Ok(Some(record))
}

fn require(kind: u8, tokens: &[&str], expected: usize) -> LineResult<()> {
    if tokens.len() < expected {
        return Err(LineError::TooFewTokens {
            kind,
            expected,
            found: tokens.len(),
        });
    }
    Ok(())
}

fn parse_float(token: &str) -> LineResult<f32> {
    token
        .parse::<f32>()
        .map_err(|_| LineError::InvalidNumber(token.to_string()))
}

fn parse_floats<const N: usize>(tokens: &[&str]) -> LineResult<[f32; N]> {
    let mut values = [0.0; N];
    for (value, token) in values.iter_mut().zip(tokens) {
        *value = parse_float(token)?;
    }
    Ok(values)
}

fn parse_points<const N: usize>(tokens: &[&str]) -> LineResult<[Vec3; N]> {
    let mut points = [Vec3::ZERO; N];
    for (i, point) in points.iter_mut().enumerate() {
        let xyz = &tokens[i * 3..i * 3 + 3];
        *point = Vec3::new(parse_float(xyz[0])?, parse_float(xyz[1])?, parse_float(xyz[2])?);
    }
    Ok(points)
}

/// Decoded meta command.
#[derive(Clone, Debug, PartialEq)]
pub enum MetaCommand {
    /// `0 BFC ...`
    Bfc(BfcCommand),

    /// `0 FILE <name>`; the name has its spaces removed
    File(String),

    /// `0 NOFILE`
    NoFile,

    /// `0 !LDRAW_ORG <type> ...`
    Organization(PartKind),

    /// Comments and every meta command the engine does not act on
    Other,
}

impl MetaCommand {
    /// Decode the tokens following the `0` type code.
    pub fn parse<S: AsRef<str>>(tokens: &[S]) -> Self {
        let Some(keyword) = tokens.first() else {
            return MetaCommand::Other;
        };

        match keyword.as_ref() {
            "BFC" => MetaCommand::Bfc(BfcCommand::parse(&tokens[1..])),
            "FILE" if tokens.len() > 1 => {
                MetaCommand::File(tokens[1..].iter().map(|t| t.as_ref()).collect())
            }
            "NOFILE" => MetaCommand::NoFile,
            "!LDRAW_ORG" if tokens.len() > 1 => {
                MetaCommand::Organization(PartKind::from_organization(tokens[1].as_ref()))
            }
            _ => MetaCommand::Other,
        }
    }

    /// Decode a raw line, if it is a meta line.
    pub fn from_line(raw: &str) -> Option<Self> {
        let tokens: Vec<&str> = raw.split_whitespace().collect();
        match tokens.split_first() {
            Some((&"0", rest)) => Some(Self::parse(rest)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::winding::Winding;

    #[test]
    fn test_short_lines_discarded() {
        assert_eq!(classify("").unwrap(), None);
        assert_eq!(classify("0").unwrap(), None);
        assert_eq!(classify("0 NOFILE").unwrap(), None);
    }

    #[test]
    fn test_meta_tokens() {
        let record = classify("0 BFC CERTIFY CCW").unwrap().unwrap();
        assert_eq!(
            record,
            LineRecord::Meta(vec!["BFC".into(), "CERTIFY".into(), "CCW".into()])
        );
    }

    #[test]
    fn test_subfile_reference() {
        let record = classify("1 4 10 20 30 1 0 0 0 1 0 0 0 1 3001.dat").unwrap().unwrap();
        match record {
            LineRecord::SubfileRef {
                color,
                transform,
                reference,
            } => {
                assert_eq!(color, ColorToken::Code(4));
                assert_eq!(reference, "3001.dat");
                assert_eq!(
                    transform.transform_point3(Vec3::ZERO),
                    Vec3::new(10.0, 20.0, 30.0)
                );
            }
            other => panic!("unexpected record {:?}", other),
        }
    }

    #[test]
    fn test_reference_with_spaces_rejoined() {
        let record = classify("1 16 0 0 0 1 0 0 0 1 0 0 0 1 my   sub model.ldr").unwrap().unwrap();
        let LineRecord::SubfileRef { reference, .. } = record else {
            panic!("expected a subfile reference");
        };
        assert_eq!(reference, "my sub model.ldr");
    }

    #[test]
    fn test_rotation_is_transposed() {
        // Row-major 3x3 of a quarter turn about Y
        let record = classify("1 16 0 0 0 0 0 1 0 1 0 -1 0 0 stud.dat").unwrap().unwrap();
        let LineRecord::SubfileRef { transform, .. } = record else {
            panic!("expected a subfile reference");
        };
        let p = transform.transform_point3(Vec3::X);
        assert!((p - Vec3::new(0.0, 0.0, -1.0)).length() < 1e-6);
    }

    #[test]
    fn test_polygons() {
        let tri = classify("3 16 0 0 0 1 0 0 0 1 0").unwrap().unwrap();
        assert!(matches!(tri, LineRecord::Triangle { color: ColorToken::Ambient, .. }));

        let quad = classify("4 0x2FF0000 0 0 0 1 0 0 1 1 0 0 1 0").unwrap().unwrap();
        let LineRecord::Quad { color, points } = quad else {
            panic!("expected a quad");
        };
        assert_eq!(color, ColorToken::Direct("FF0000".into()));
        assert_eq!(points[2], Vec3::new(1.0, 1.0, 0.0));

        let line = classify("2 24 0 0 0 1 1 1").unwrap().unwrap();
        assert_eq!(
            line,
            LineRecord::Line {
                points: [Vec3::ZERO, Vec3::ONE]
            }
        );
    }

    #[test]
    fn test_malformed_geometry() {
        assert_eq!(
            classify("4 16 0 0 0 1 0 0 1 1 0").unwrap_err(),
            LineError::TooFewTokens {
                kind: 4,
                expected: 14,
                found: 11
            }
        );
        assert!(matches!(
            classify("3 16 0 0 0 1 0 x 0 1 0").unwrap_err(),
            LineError::InvalidNumber(_)
        ));
        assert!(classify("1 16 0 0 0 1 0 0 0 1 0 0 0 1").is_err());
    }

    #[test]
    fn test_optional_and_unknown_lines_ignored() {
        assert_eq!(classify("5 24 0 0 0 1 0 0 0 1 0 1 1 0").unwrap(), None);
        assert_eq!(classify("9 whatever goes here").unwrap(), None);
    }

    #[test]
    fn test_meta_commands() {
        assert_eq!(
            MetaCommand::from_line("0 BFC INVERTNEXT"),
            Some(MetaCommand::Bfc(BfcCommand {
                invert_next: true,
                ..Default::default()
            }))
        );
        assert_eq!(
            MetaCommand::from_line("0 BFC CERTIFY CW"),
            Some(MetaCommand::Bfc(BfcCommand {
                certify: true,
                winding: Some(Winding::Cw),
                ..Default::default()
            }))
        );
        assert_eq!(
            MetaCommand::from_line("0 FILE my model.ldr"),
            Some(MetaCommand::File("mymodel.ldr".into()))
        );
        assert_eq!(MetaCommand::from_line("0 NOFILE"), Some(MetaCommand::NoFile));
        assert_eq!(
            MetaCommand::from_line("0 !LDRAW_ORG Unofficial_Subpart UPDATE 2024-01"),
            Some(MetaCommand::Organization(PartKind::Subpart))
        );
        assert_eq!(MetaCommand::from_line("0 // comment"), Some(MetaCommand::Other));
        assert_eq!(MetaCommand::from_line("3 16 0 0 0 1 0 0 0 1 0"), None);
    }
}
