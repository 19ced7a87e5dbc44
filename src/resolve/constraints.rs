//! Dependency declaration and version constraint parsing.
//!
//! Handles the PEP 508 shapes found in `requires_dist` metadata and
//! requirements files:
//! - `numpy>=1.20`
//! - `urllib3<3,>=1.21.1`
//! - `PySocks!=1.5.7,>=1.5.6; extra == "socks"`
//! - `requests (>=2.0)`
//! - `pandas[sql]>=1.3.0`

use lazy_static::lazy_static;
use regex::Regex;

use crate::model::{VersionBound, VersionSpec};

lazy_static! {
    static ref DECLARATION_RE: Regex =
        Regex::new(r"^\s*([A-Za-z0-9][A-Za-z0-9._-]*)\s*(?:\[([^\]]*)\])?\s*(.*)$").unwrap();
    static ref CONSTRAINT_RE: Regex =
        Regex::new(r"(===|==|~=|!=|>=|<=|>|<)\s*([A-Za-z0-9.*+!_-]+)").unwrap();
}

/// A version comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// `===`
    Arbitrary,
    /// `==`
    Equal,
    /// `~=`
    Compatible,
    /// `!=`
    NotEqual,
    /// `>=`
    GreaterEqual,
    /// `>`
    Greater,
    /// `<=`
    LessEqual,
    /// `<`
    Less,
}

impl Operator {
    pub fn parse(op: &str) -> Option<Self> {
        match op {
            "===" => Some(Operator::Arbitrary),
            "==" => Some(Operator::Equal),
            "~=" => Some(Operator::Compatible),
            "!=" => Some(Operator::NotEqual),
            ">=" => Some(Operator::GreaterEqual),
            ">" => Some(Operator::Greater),
            "<=" => Some(Operator::LessEqual),
            "<" => Some(Operator::Less),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Arbitrary => "===",
            Operator::Equal => "==",
            Operator::Compatible => "~=",
            Operator::NotEqual => "!=",
            Operator::GreaterEqual => ">=",
            Operator::Greater => ">",
            Operator::LessEqual => "<=",
            Operator::Less => "<",
        }
    }
}

/// One `<op><version>` clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    pub op: Operator,
    pub version: String,
}

/// A parsed dependency declaration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Declaration {
    pub name: String,
    pub extras: Vec<String>,
    pub constraints: Vec<Constraint>,
    pub marker: Option<String>,
}

impl Declaration {
    /// Fold the constraints into a version descriptor.
    pub fn version_spec(&self) -> VersionSpec {
        fold_constraints(&self.constraints)
    }
}

/// Parse a declaration string. Returns `None` when no package name can be
/// recognized.
pub fn parse_declaration(input: &str) -> Option<Declaration> {
    let (requirement, marker) = match input.split_once(';') {
        Some((req, marker)) => (req, Some(marker.trim().to_string())),
        None => (input, None),
    };

    let caps = DECLARATION_RE.captures(requirement)?;
    let name = caps.get(1)?.as_str().to_string();

    let extras = caps
        .get(2)
        .map(|m| {
            m.as_str()
                .split(',')
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let rest = caps.get(3).map(|m| m.as_str()).unwrap_or("");
    let constraints = parse_constraints(rest);

    Some(Declaration {
        name,
        extras,
        constraints,
        marker: marker.filter(|m| !m.is_empty()),
    })
}

/// Extract every `<op><version>` clause from a constraint list.
pub fn parse_constraints(input: &str) -> Vec<Constraint> {
    CONSTRAINT_RE
        .captures_iter(input)
        .filter_map(|caps| {
            let op = Operator::parse(caps.get(1)?.as_str())?;
            let version = caps.get(2)?.as_str().to_string();
            Some(Constraint { op, version })
        })
        .collect()
}

/// Fold constraints into a [`VersionSpec`], applying them in order.
///
/// `>`, `>=` and `~=` set the lower bound, `<` and `<=` the upper one,
/// `==`/`===` an exact version. `~=X.Y.Z` also sets the exclusive upper
/// bound `X.(Y+1)`. Each shape replaces the other when assigned, so the
/// last write wins. `!=` carries no bound.
pub fn fold_constraints(constraints: &[Constraint]) -> VersionSpec {
    let mut spec = VersionSpec::Unspecified;

    for c in constraints {
        match c.op {
            Operator::Equal | Operator::Arbitrary => {
                spec = VersionSpec::Exact(c.version.clone());
            }
            Operator::GreaterEqual => set_lower(&mut spec, VersionBound::inclusive(&c.version)),
            Operator::Compatible => {
                set_lower(&mut spec, VersionBound::inclusive(&c.version));
                if let Some(upper) = compatible_upper(&c.version) {
                    set_upper(&mut spec, VersionBound::exclusive(upper));
                }
            }
            Operator::Greater => set_lower(&mut spec, VersionBound::exclusive(&c.version)),
            Operator::LessEqual => set_upper(&mut spec, VersionBound::inclusive(&c.version)),
            Operator::Less => set_upper(&mut spec, VersionBound::exclusive(&c.version)),
            Operator::NotEqual => {}
        }
    }

    spec
}

/// Upper bound implied by a compatible release clause: drop the last
/// release segment and bump the one before it. `None` when the release
/// has fewer than two numeric segments.
fn compatible_upper(version: &str) -> Option<String> {
    let mut release: Vec<u64> = version
        .split('.')
        .map_while(|segment| segment.parse().ok())
        .collect();
    if release.len() < 2 {
        return None;
    }
    release.pop();
    *release.last_mut()? += 1;
    Some(
        release
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join("."),
    )
}

fn range_mut(spec: &mut VersionSpec) -> (&mut Option<VersionBound>, &mut Option<VersionBound>) {
    if !matches!(spec, VersionSpec::Range { .. }) {
        *spec = VersionSpec::Range {
            lower: None,
            upper: None,
        };
    }
    match spec {
        VersionSpec::Range { lower, upper } => (lower, upper),
        _ => unreachable!("spec was just set to a range"),
    }
}

fn set_lower(spec: &mut VersionSpec, bound: VersionBound) {
    let (lower, _) = range_mut(spec);
    *lower = Some(bound);
}

fn set_upper(spec: &mut VersionSpec, bound: VersionBound) {
    let (_, upper) = range_mut(spec);
    *upper = Some(bound);
}
