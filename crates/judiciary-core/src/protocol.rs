//! Datagram wire protocol — JSON messages dispatched on a `type` tag
//!
//! Every request is a single JSON object with a `type` field; every response
//! carries `success: bool` and `message: String`. Responses are unicast back
//! to the sender. Datagrams are capped at 64 KiB.
//!
//! Court (registry):
//!   { "type": "list" }
//!   { "type": "create", "name": "Alpha", "trials": 2 }
//!
//! District (from trials and peer districts):
//!   { "type": "trial_info", "trial_id": 1 }
//!   { "type": "lawsuit_query", "stage": "res_judicata", "lawsuit": { ... } }
//!
//! Trial (from its district or peer districts):
//!   { "type": "lawsuit_query", "stage": "joinder", "lawsuit": { ... } }
//!   { "type": "lawsuit_create", "reason": "connection", "lawsuit": { ... }, "related": "2.1.1" }

use crate::types::{
    CandidateLawsuit, ClaimSet, LawsuitId, ListKind, MatchKind, SearchField, Stage, TrialIdentity,
};
use serde::{Deserialize, Serialize};

/// Largest datagram any agent sends or accepts.
pub const MAX_DATAGRAM: usize = 64 * 1024;

// ---------------------------------------------------------------------------
// Court registry
// ---------------------------------------------------------------------------

/// Requests the Court accepts from districts (and from its own CLI).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CourtRequest {
    /// All districts except the caller's own address.
    List,
    /// Insert a district keyed by name; the address is the sender's source
    /// address. Idempotent: an existing name returns the existing record.
    Create { name: String, trials: u32 },
    Remove { name: String },
    UpdateTrials { name: String, trials: u32 },
}

/// One row of the Court's directory (and of every district's mirror of it).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DistrictRecord {
    pub id: u32,
    pub name: String,
    pub address: String,
    pub trials: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CourtResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub district: Option<DistrictRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub districts: Option<Vec<DistrictRecord>>,
}

impl CourtResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            district: None,
            districts: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            district: None,
            districts: None,
        }
    }

    pub fn with_district(mut self, district: DistrictRecord) -> Self {
        self.district = Some(district);
        self
    }

    pub fn with_districts(mut self, districts: Vec<DistrictRecord>) -> Self {
        self.districts = Some(districts);
        self
    }
}

// ---------------------------------------------------------------------------
// District agent
// ---------------------------------------------------------------------------

/// Requests a district accepts: the handshake and aggregator endpoints used
/// by trials and peer districts, plus the admin endpoints its CLI drives.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DistrictRequest {
    /// A trial asking who it is (startup handshake).
    TrialInfo { trial_id: u32 },
    /// A peer district asking this district to check ALL of its trials for
    /// one stage and return the first positive verdict.
    LawsuitQuery {
        stage: Stage,
        lawsuit: CandidateLawsuit,
    },
    /// Run the full admissibility pipeline for a locally submitted filing.
    LawsuitFile { lawsuit: CandidateLawsuit },
    /// Roster management.
    TrialRegister { address: String },
    TrialRemove { trial_id: u32 },
    TrialList,
    /// Refresh the mirror from the Court (best effort) and return it.
    DistrictList,
    /// Fan a search out over every local trial.
    SearchLawsuit { field: SearchField, value: String },
}

/// Response to `trial_info`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrialInfoResponse {
    pub success: bool,
    pub message: String,
    #[serde(flatten)]
    pub identity: TrialIdentity,
}

impl TrialInfoResponse {
    pub fn ok(message: impl Into<String>, identity: TrialIdentity) -> Self {
        Self {
            success: true,
            message: message.into(),
            identity,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            identity: TrialIdentity::default(),
        }
    }
}

/// Roster listing returned by `trial_list`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrialListResponse {
    pub success: bool,
    pub message: String,
    pub trials: Vec<TrialEntry>,
}

/// One locally owned trial as the district tracks it.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TrialEntry {
    pub id: u32,
    pub address: String,
}

/// Mirror listing returned by `district_list`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DistrictListResponse {
    pub success: bool,
    pub message: String,
    pub districts: Vec<DistrictRecord>,
}

// ---------------------------------------------------------------------------
// Trial agent
// ---------------------------------------------------------------------------

/// Why a trial is being told to create a lawsuit.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CreateReason {
    Free,
    RepeatedRequest,
    Connection,
}

/// Requests a trial accepts from its district, from peer districts, and
/// from its own CLI.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TrialRequest {
    /// Evaluate one stage's predicate against the candidate.
    LawsuitQuery {
        stage: Stage,
        lawsuit: CandidateLawsuit,
    },
    /// Create a new active lawsuit, optionally related to an existing one.
    LawsuitCreate {
        reason: CreateReason,
        lawsuit: CandidateLawsuit,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        related: Option<LawsuitId>,
    },
    /// Union new claims into an active lawsuit (joinder consolidation).
    LawsuitMergeClaims {
        lawsuit_id: LawsuitId,
        new_claims: ClaimSet,
    },
    /// Move an active lawsuit to one of the terminal dismissal lists.
    LawsuitDismiss {
        lawsuit_id: LawsuitId,
        with_merit: bool,
    },
    SearchLawsuit {
        field: SearchField,
        value: String,
    },
    WorkloadInfo,
    /// Dump one list in search-result form.
    LawsuitList {
        list: ListKind,
    },
}

/// Response to `lawsuit_query`, from a trial or from an aggregating district.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueryResponse {
    pub success: bool,
    pub stage: Stage,
    #[serde(rename = "match")]
    pub matched: MatchKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lawsuit_id: Option<LawsuitId>,
    #[serde(flatten)]
    pub identity: TrialIdentity,
    /// Present on joinder verdicts: the matched lawsuit's current claims.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub existent_claims: Option<ClaimSet>,
    /// Present on connection verdicts: ids already linked to the match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connected_lawsuits: Option<Vec<LawsuitId>>,
}

impl QueryResponse {
    /// The "nothing here" answer every stage falls back to.
    pub fn none(stage: Stage, identity: TrialIdentity) -> Self {
        Self {
            success: true,
            stage,
            matched: MatchKind::None,
            message: "no corresponding lawsuit found".to_string(),
            lawsuit_id: None,
            identity,
            existent_claims: None,
            connected_lawsuits: None,
        }
    }

    pub fn matched(
        stage: Stage,
        matched: MatchKind,
        message: impl Into<String>,
        lawsuit_id: LawsuitId,
        identity: TrialIdentity,
    ) -> Self {
        Self {
            success: true,
            stage,
            matched,
            message: message.into(),
            lawsuit_id: Some(lawsuit_id),
            identity,
            existent_claims: None,
            connected_lawsuits: None,
        }
    }

    pub fn err(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            success: false,
            stage,
            matched: MatchKind::None,
            message: message.into(),
            lawsuit_id: None,
            identity: TrialIdentity::default(),
            existent_claims: None,
            connected_lawsuits: None,
        }
    }

    pub fn is_positive(&self) -> bool {
        self.success && self.matched.is_positive()
    }
}

/// Response to `lawsuit_create`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateResponse {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lawsuit_id: Option<LawsuitId>,
    #[serde(flatten)]
    pub identity: TrialIdentity,
}

impl CreateResponse {
    pub fn ok(message: impl Into<String>, lawsuit_id: LawsuitId, identity: TrialIdentity) -> Self {
        Self {
            success: true,
            message: message.into(),
            lawsuit_id: Some(lawsuit_id),
            identity,
        }
    }

    pub fn err(message: impl Into<String>, identity: TrialIdentity) -> Self {
        Self {
            success: false,
            message: message.into(),
            lawsuit_id: None,
            identity,
        }
    }
}

/// Response to `lawsuit_merge_claims` and `lawsuit_dismiss`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AckResponse {
    pub success: bool,
    pub message: String,
}

impl AckResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// One search hit, flattened for display.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    pub list: ListKind,
    pub id: LawsuitId,
    pub plaintiff: String,
    pub defendant: String,
    pub cause_action: u32,
    pub claims: ClaimSet,
}

/// Response to `search_lawsuit` and `lawsuit_list` on a trial.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    pub success: bool,
    pub message: String,
    #[serde(flatten)]
    pub identity: TrialIdentity,
    #[serde(default)]
    pub results: Vec<SearchResult>,
}

/// Response to `workload_info`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkloadResponse {
    pub success: bool,
    pub message: String,
    #[serde(flatten)]
    pub identity: TrialIdentity,
    pub active_workload: usize,
}

// ---------------------------------------------------------------------------
// Filing outcome (district pipeline -> CLI)
// ---------------------------------------------------------------------------

/// What the admissibility pipeline decided for one filing.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilingOutcome {
    /// Filing barred; cites the blocking lawsuit and where it lives.
    Rejected {
        reason: MatchKind,
        lawsuit_id: LawsuitId,
        #[serde(flatten)]
        location: TrialIdentity,
    },
    /// A new lawsuit was created at the matched trial, related to the match.
    CreatedRelated {
        reason: MatchKind,
        related: LawsuitId,
        lawsuit_id: LawsuitId,
        #[serde(flatten)]
        location: TrialIdentity,
    },
    /// The new claims were folded into the matched (continent-to-be) lawsuit.
    MergedClaims {
        lawsuit_id: LawsuitId,
        #[serde(flatten)]
        location: TrialIdentity,
    },
    /// No stage matched; created at the least-loaded local trial.
    FreeDistributed {
        lawsuit_id: LawsuitId,
        #[serde(flatten)]
        location: TrialIdentity,
        /// Workload of the chosen trial, absent when the random fallback ran.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        workload: Option<usize>,
    },
}

/// Response to `lawsuit_file`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FileResponse {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<FilingOutcome>,
}

impl FileResponse {
    pub fn ok(message: impl Into<String>, outcome: FilingOutcome) -> Self {
        Self {
            success: true,
            message: message.into(),
            outcome: Some(outcome),
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            outcome: None,
        }
    }
}

/// District search fan-out: one hit plus the trial it came from.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DistrictSearchHit {
    pub trial_id: u32,
    pub trial_addr: String,
    #[serde(flatten)]
    pub result: SearchResult,
}

/// Response to the district-level `search_lawsuit`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DistrictSearchResponse {
    pub success: bool,
    pub message: String,
    #[serde(default)]
    pub results: Vec<DistrictSearchHit>,
}

// ---------------------------------------------------------------------------
// Fallback reply
// ---------------------------------------------------------------------------

/// Minimal `success`/`message` reply for malformed or unknown requests.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorReply {
    pub success: bool,
    pub message: String,
}

impl ErrorReply {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }

    pub fn unknown_type() -> Self {
        Self::new("unknown type")
    }

    pub fn malformed() -> Self {
        Self::new("malformed request")
    }
}

/// Peek at the `type` tag of an incoming datagram without committing to a
/// full schema, so unknown tags can be answered instead of dropped.
#[derive(Debug, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
}
