//! Core domain types shared by the court, district, and trial agents

use crate::error::Error;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Lawsuit identifier
// ---------------------------------------------------------------------------

/// Lawsuit identifier `"D.T.N"` — district id, trial id, per-trial sequence.
/// All three components are positive; anything else fails to parse.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct LawsuitId {
    pub district: u32,
    pub trial: u32,
    pub seq: u64,
}

impl LawsuitId {
    pub fn new(district: u32, trial: u32, seq: u64) -> Self {
        Self {
            district,
            trial,
            seq,
        }
    }
}

impl fmt::Display for LawsuitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.district, self.trial, self.seq)
    }
}

impl FromStr for LawsuitId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('.');
        let district = parse_component(parts.next(), s)?;
        let trial = parse_component(parts.next(), s)?;
        let seq = parse_component(parts.next(), s)?;
        if parts.next().is_some() {
            return Err(Error::InvalidId(s.to_string()));
        }
        let district = u32::try_from(district).map_err(|_| Error::InvalidId(s.to_string()))?;
        let trial = u32::try_from(trial).map_err(|_| Error::InvalidId(s.to_string()))?;
        Ok(Self {
            district,
            trial,
            seq,
        })
    }
}

fn parse_component(part: Option<&str>, whole: &str) -> Result<u64, Error> {
    let part = part.ok_or_else(|| Error::InvalidId(whole.to_string()))?;
    // Only ASCII digits; rejects signs, whitespace, and empty components.
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::InvalidId(whole.to_string()));
    }
    let n: u64 = part
        .parse()
        .map_err(|_| Error::InvalidId(whole.to_string()))?;
    if n == 0 {
        return Err(Error::InvalidId(whole.to_string()));
    }
    Ok(n)
}

impl Serialize for LawsuitId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for LawsuitId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Claim sets
// ---------------------------------------------------------------------------

/// A set of claim ids. Kept sorted and deduplicated, so equality, subset,
/// and overlap checks are plain slice operations.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ClaimSet(Vec<u32>);

impl ClaimSet {
    pub fn new(mut claims: Vec<u32>) -> Self {
        claims.sort_unstable();
        claims.dedup();
        Self(claims)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }

    pub fn contains(&self, claim: u32) -> bool {
        self.0.binary_search(&claim).is_ok()
    }

    pub fn is_subset_of(&self, other: &Self) -> bool {
        self.0.iter().all(|c| other.contains(*c))
    }

    /// Strict subset: contained in `other` and not equal to it.
    pub fn is_strict_subset_of(&self, other: &Self) -> bool {
        self.0.len() < other.0.len() && self.is_subset_of(other)
    }

    pub fn overlaps(&self, other: &Self) -> bool {
        self.0.iter().any(|c| other.contains(*c))
    }

    /// Union `other` into this set. Returns whether anything was added.
    pub fn merge(&mut self, other: &Self) -> bool {
        let before = self.0.len();
        self.0.extend_from_slice(&other.0);
        self.0.sort_unstable();
        self.0.dedup();
        self.0.len() != before
    }
}

impl From<Vec<u32>> for ClaimSet {
    fn from(claims: Vec<u32>) -> Self {
        Self::new(claims)
    }
}

impl Serialize for ClaimSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ClaimSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Vec::<u32>::deserialize(deserializer).map(Self::new)
    }
}

// ---------------------------------------------------------------------------
// Admissibility stages and verdicts
// ---------------------------------------------------------------------------

/// The five query stages of the admissibility pipeline, in evaluation order.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    ResJudicata,
    LisPendens,
    RepeatedRequest,
    Joinder,
    Connection,
}

impl Stage {
    /// All stages in the order the pipeline evaluates them.
    pub const ALL: [Stage; 5] = [
        Stage::ResJudicata,
        Stage::LisPendens,
        Stage::RepeatedRequest,
        Stage::Joinder,
        Stage::Connection,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::ResJudicata => "res_judicata",
            Stage::LisPendens => "lis_pendens",
            Stage::RepeatedRequest => "repeated_request",
            Stage::Joinder => "joinder",
            Stage::Connection => "connection",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-stage match verdict returned by a trial (or by a district acting as
/// aggregator for its trials).
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    None,
    ResJudicata,
    LisPendens,
    RepeatedRequest,
    JoinderContained,
    JoinderContinent,
    Connection,
}

impl MatchKind {
    pub fn is_positive(&self) -> bool {
        !matches!(self, MatchKind::None)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchKind::None => "none",
            MatchKind::ResJudicata => "res_judicata",
            MatchKind::LisPendens => "lis_pendens",
            MatchKind::RepeatedRequest => "repeated_request",
            MatchKind::JoinderContained => "joinder_contained",
            MatchKind::JoinderContinent => "joinder_continent",
            MatchKind::Connection => "connection",
        }
    }
}

impl fmt::Display for MatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Lawsuits
// ---------------------------------------------------------------------------

/// A lawsuit as stored by its owning trial.
///
/// The `claim` field only exists to read files written before claims became
/// a list; it is folded into `claims` on load and never written back.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Lawsuit {
    pub id: LawsuitId,
    pub plaintiff: String,
    pub defendant: String,
    pub cause_action: u32,
    #[serde(default)]
    pub claims: ClaimSet,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub connected: Vec<LawsuitId>,
    #[serde(rename = "claim", default, skip_serializing)]
    pub legacy_claim: Option<u32>,
}

impl Lawsuit {
    /// Fold a pre-claims-list `claim` singleton into `claims`. No-op when
    /// the lawsuit already carries a claim list.
    pub fn migrate_legacy_claim(&mut self) {
        if self.claims.is_empty() {
            if let Some(claim) = self.legacy_claim.take() {
                self.claims = ClaimSet::new(vec![claim]);
            }
        }
        self.legacy_claim = None;
    }

    pub fn connect(&mut self, other: LawsuitId) {
        if other != self.id && !self.connected.contains(&other) {
            self.connected.push(other);
        }
    }
}

/// A filing as submitted to a district, before any lawsuit exists.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CandidateLawsuit {
    pub plaintiff: String,
    pub defendant: String,
    pub cause_id: u32,
    pub claims: ClaimSet,
}

impl CandidateLawsuit {
    pub fn new(
        plaintiff: impl Into<String>,
        defendant: impl Into<String>,
        cause_id: u32,
        claims: Vec<u32>,
    ) -> Self {
        Self {
            plaintiff: plaintiff.into(),
            defendant: defendant.into(),
            cause_id,
            claims: ClaimSet::new(claims),
        }
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.plaintiff.trim().is_empty() {
            return Err(Error::validation("plaintiff must not be blank"));
        }
        if self.defendant.trim().is_empty() {
            return Err(Error::validation("defendant must not be blank"));
        }
        if self.cause_id == 0 {
            return Err(Error::validation("cause of action must be positive"));
        }
        if self.claims.is_empty() {
            return Err(Error::validation("claims must not be empty"));
        }
        Ok(())
    }

    /// Same parties (case-insensitive) and same cause of action.
    pub fn same_parties_and_cause(&self, other: &Lawsuit) -> bool {
        self.plaintiff.eq_ignore_ascii_case(&other.plaintiff)
            && self.defendant.eq_ignore_ascii_case(&other.defendant)
            && self.cause_id == other.cause_action
    }

    /// The identical 4-tuple the identity stages look for.
    pub fn is_identical_to(&self, other: &Lawsuit) -> bool {
        self.same_parties_and_cause(other) && self.claims == other.claims
    }
}

// ---------------------------------------------------------------------------
// Lists, search fields, identity
// ---------------------------------------------------------------------------

/// Which of a trial's three lists a lawsuit lives in.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum ListKind {
    #[serde(rename = "Active")]
    Active,
    #[serde(rename = "Dismissed with merit")]
    DismissedWithMerit,
    #[serde(rename = "Dismissed without merit")]
    DismissedWithoutMerit,
}

impl fmt::Display for ListKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListKind::Active => f.write_str("Active"),
            ListKind::DismissedWithMerit => f.write_str("Dismissed with merit"),
            ListKind::DismissedWithoutMerit => f.write_str("Dismissed without merit"),
        }
    }
}

/// Field selector for `search_lawsuit`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SearchField {
    Id,
    Plaintiff,
    Defendant,
    Cause,
    Claim,
}

/// The identity block every trial response carries: where the answer came
/// from. A trial that has not completed its handshake leaves the district
/// fields empty; the aggregating district fills them in.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct TrialIdentity {
    #[serde(default, skip_serializing_if = "is_zero")]
    pub district_id: u32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub district_name: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub trial_id: u32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub trial_addr: String,
}

fn is_zero(n: &u32) -> bool {
    *n == 0
}

impl TrialIdentity {
    pub fn is_established(&self) -> bool {
        self.district_id > 0 && self.trial_id > 0
    }
}
