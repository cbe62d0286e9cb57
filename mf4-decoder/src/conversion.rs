//! Raw-to-physical value conversion (`##CC` blocks)

use crate::blocks::ConversionBlock;

/// A conversion rule the decoder knows how to apply
#[derive(Debug, Clone, PartialEq)]
pub enum Conversion {
    /// Physical value equals the raw value
    Identity,
    /// `phys = offset + factor * raw`
    Linear { offset: f64, factor: f64 },
    /// `phys = (p1·x² + p2·x + p3) / (p4·x² + p5·x + p6)`
    Rational([f64; 6]),
    /// Table lookup on (raw, phys) pairs sorted by raw value
    Table {
        points: Vec<(f64, f64)>,
        interpolate: bool,
    },
}

impl Conversion {
    /// Build a conversion from a parsed `##CC` block
    ///
    /// Conversion types without a numeric mapping (algebraic formulas,
    /// text tables, ...) fall back to the identity with a warning.
    pub(crate) fn from_block(block: &ConversionBlock, channel: &str) -> Self {
        let v = &block.values;
        match block.conversion_type {
            0 => Conversion::Identity,
            1 if v.len() >= 2 => Conversion::Linear {
                offset: v[0],
                factor: v[1],
            },
            2 if v.len() >= 6 => Conversion::Rational([v[0], v[1], v[2], v[3], v[4], v[5]]),
            4 | 5 if v.len() >= 2 => {
                let points = v.chunks_exact(2).map(|pair| (pair[0], pair[1])).collect();
                Conversion::Table {
                    points,
                    interpolate: block.conversion_type == 4,
                }
            }
            other => {
                log::warn!(
                    "Channel '{}': conversion type {} not supported, using raw values",
                    channel,
                    other
                );
                Conversion::Identity
            }
        }
    }

    /// Apply the conversion to one raw value
    pub fn apply(&self, raw: f64) -> f64 {
        match self {
            Conversion::Identity => raw,
            Conversion::Linear { offset, factor } => offset + factor * raw,
            Conversion::Rational(p) => {
                let numerator = p[0] * raw * raw + p[1] * raw + p[2];
                let denominator = p[3] * raw * raw + p[4] * raw + p[5];
                numerator / denominator
            }
            Conversion::Table {
                points,
                interpolate,
            } => lookup(points, raw, *interpolate),
        }
    }

    pub fn is_identity(&self) -> bool {
        matches!(self, Conversion::Identity)
    }
}

fn lookup(points: &[(f64, f64)], raw: f64, interpolate: bool) -> f64 {
    let (first, last) = match (points.first(), points.last()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => return raw,
    };
    if raw <= first.0 {
        return first.1;
    }
    if raw >= last.0 {
        return last.1;
    }

    // first index whose key is > raw; guaranteed in 1..len by the clamps above
    let upper = points.partition_point(|(key, _)| *key <= raw);
    let (x0, y0) = points[upper - 1];
    let (x1, y1) = points[upper];

    if interpolate {
        if x1 == x0 {
            return y0;
        }
        y0 + (y1 - y0) * (raw - x0) / (x1 - x0)
    } else if raw - x0 <= x1 - raw {
        y0
    } else {
        y1
    }
}
