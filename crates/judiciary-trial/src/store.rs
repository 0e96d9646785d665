//! Lawsuit store — the trial's persisted state machine
//!
//! Single-writer / multi-reader: mutators serialize on the write lock and
//! hold it through the disk write, so a create is observable by the next
//! query only after it is durable. Mutations build the successor state,
//! persist it, and only then swap it in; a failed write leaves memory at
//! the pre-mutation snapshot.

use judiciary_core::{
    CandidateLawsuit, ClaimSet, CreateReason, Error, Lawsuit, LawsuitId, ListKind, MatchKind,
    Result, SearchField, SearchResult, Stage, TrialIdentity,
};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::info;

use crate::predicates;

fn first_seq() -> u64 {
    1
}

/// Everything a trial persists, in one JSON document.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrialState {
    #[serde(default)]
    pub district_id: u32,
    #[serde(default)]
    pub district_name: String,
    #[serde(default)]
    pub trial_id: u32,
    #[serde(default)]
    pub trial_addr: String,
    #[serde(default = "first_seq")]
    pub next_seq: u64,
    #[serde(default)]
    pub active: Vec<Lawsuit>,
    #[serde(default)]
    pub dismissed_with_merit: Vec<Lawsuit>,
    #[serde(default)]
    pub dismissed_without_merit: Vec<Lawsuit>,
}

impl Default for TrialState {
    fn default() -> Self {
        Self {
            district_id: 0,
            district_name: String::new(),
            trial_id: 0,
            trial_addr: String::new(),
            next_seq: 1,
            active: Vec::new(),
            dismissed_with_merit: Vec::new(),
            dismissed_without_merit: Vec::new(),
        }
    }
}

impl TrialState {
    pub fn identity(&self) -> TrialIdentity {
        TrialIdentity {
            district_id: self.district_id,
            district_name: self.district_name.clone(),
            trial_id: self.trial_id,
            trial_addr: self.trial_addr.clone(),
        }
    }

    fn list(&self, kind: ListKind) -> &[Lawsuit] {
        match kind {
            ListKind::Active => &self.active,
            ListKind::DismissedWithMerit => &self.dismissed_with_merit,
            ListKind::DismissedWithoutMerit => &self.dismissed_without_merit,
        }
    }

    fn find_anywhere_mut(&mut self, id: &LawsuitId) -> Option<&mut Lawsuit> {
        self.active
            .iter_mut()
            .chain(self.dismissed_with_merit.iter_mut())
            .chain(self.dismissed_without_merit.iter_mut())
            .find(|l| &l.id == id)
    }

    /// Fold legacy single-claim fields and make sure `next_seq` can never
    /// hand out an id that is already taken.
    fn normalize_after_load(&mut self) {
        for suit in self
            .active
            .iter_mut()
            .chain(self.dismissed_with_merit.iter_mut())
            .chain(self.dismissed_without_merit.iter_mut())
        {
            suit.migrate_legacy_claim();
        }
        let max_seq = self
            .active
            .iter()
            .chain(self.dismissed_with_merit.iter())
            .chain(self.dismissed_without_merit.iter())
            .map(|l| l.id.seq)
            .max()
            .unwrap_or(0);
        self.next_seq = self.next_seq.max(max_seq + 1).max(1);
    }
}

/// The store: state behind a lock, plus the canonical file it lives in.
pub struct LawsuitStore {
    state: RwLock<TrialState>,
    path: PathBuf,
}

impl LawsuitStore {
    /// Load from `path`, treating a missing file as empty initial state.
    /// A present-but-unreadable file is an error, not a silent reset.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut state = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<TrialState>(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => TrialState::default(),
            Err(e) => return Err(Error::Io(e)),
        };
        state.normalize_after_load();
        Ok(Self {
            state: RwLock::new(state),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, state: &TrialState) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(state)?;
        let mut tmp = OsString::from(self.path.as_os_str());
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    pub async fn identity(&self) -> TrialIdentity {
        self.state.read().await.identity()
    }

    /// Merge handshake results into the persisted identity. Empty or zero
    /// incoming fields leave the stored value alone.
    pub async fn update_identity(&self, incoming: &TrialIdentity) -> Result<()> {
        let mut guard = self.state.write().await;
        let mut next = guard.clone();
        if incoming.district_id > 0 {
            next.district_id = incoming.district_id;
        }
        if !incoming.district_name.trim().is_empty() {
            next.district_name = incoming.district_name.trim().to_string();
        }
        if incoming.trial_id > 0 {
            next.trial_id = incoming.trial_id;
        }
        if !incoming.trial_addr.trim().is_empty() {
            next.trial_addr = incoming.trial_addr.trim().to_string();
        }
        self.persist(&next).await?;
        *guard = next;
        Ok(())
    }

    /// Create a new active lawsuit and persist it before returning.
    ///
    /// For `connection` creations with a `related` id the new lawsuit
    /// records the link; when the related lawsuit is resident in this trial
    /// the link is made bidirectional.
    pub async fn create(
        &self,
        candidate: &CandidateLawsuit,
        reason: CreateReason,
        related: Option<&LawsuitId>,
    ) -> Result<Lawsuit> {
        candidate.validate()?;

        let mut guard = self.state.write().await;
        if guard.district_id == 0 || guard.trial_id == 0 {
            return Err(Error::IdentityIncomplete);
        }

        let mut next = guard.clone();
        let id = LawsuitId::new(next.district_id, next.trial_id, next.next_seq);
        next.next_seq += 1;

        let mut suit = Lawsuit {
            id: id.clone(),
            plaintiff: candidate.plaintiff.clone(),
            defendant: candidate.defendant.clone(),
            cause_action: candidate.cause_id,
            claims: candidate.claims.clone(),
            connected: Vec::new(),
            legacy_claim: None,
        };

        if reason == CreateReason::Connection {
            if let Some(related) = related {
                suit.connect(related.clone());
                if let Some(other) = next.find_anywhere_mut(related) {
                    other.connect(id.clone());
                }
            }
        }

        next.active.push(suit.clone());
        self.persist(&next).await?;
        *guard = next;

        info!(lawsuit = %id, reason = ?reason, "lawsuit created");
        Ok(suit)
    }

    /// Union `new_claims` into an active lawsuit. Idempotent; rejects ids
    /// outside the active list.
    pub async fn merge_claims(&self, id: &LawsuitId, new_claims: &ClaimSet) -> Result<ClaimSet> {
        if new_claims.is_empty() {
            return Err(Error::validation("new_claims must not be empty"));
        }

        let mut guard = self.state.write().await;
        let mut next = guard.clone();
        let suit = next
            .active
            .iter_mut()
            .find(|l| &l.id == id)
            .ok_or_else(|| Error::not_found(format!("lawsuit {id} is not active")))?;

        let changed = suit.claims.merge(new_claims);
        let merged = suit.claims.clone();
        if changed {
            self.persist(&next).await?;
            *guard = next;
            info!(lawsuit = %id, "claims merged");
        }
        Ok(merged)
    }

    /// Move an active lawsuit to one of the terminal dismissal lists.
    pub async fn dismiss(&self, id: &LawsuitId, with_merit: bool) -> Result<Lawsuit> {
        let mut guard = self.state.write().await;
        let mut next = guard.clone();
        let pos = next
            .active
            .iter()
            .position(|l| &l.id == id)
            .ok_or_else(|| Error::not_found(format!("lawsuit {id} is not active")))?;

        let suit = next.active.remove(pos);
        if with_merit {
            next.dismissed_with_merit.push(suit.clone());
        } else {
            next.dismissed_without_merit.push(suit.clone());
        }
        self.persist(&next).await?;
        *guard = next;

        info!(lawsuit = %id, with_merit, "lawsuit dismissed");
        Ok(suit)
    }

    /// Evaluate one stage's predicate. Returns the verdict and a clone of
    /// the matched lawsuit.
    pub async fn evaluate(
        &self,
        stage: Stage,
        candidate: &CandidateLawsuit,
    ) -> Option<(MatchKind, Lawsuit)> {
        let guard = self.state.read().await;
        predicates::evaluate(&guard, stage, candidate).map(|(kind, suit)| (kind, suit.clone()))
    }

    /// Search all three lists by one field.
    pub async fn search(&self, field: SearchField, value: &str) -> Vec<SearchResult> {
        let guard = self.state.read().await;
        let mut results = Vec::new();
        for kind in [
            ListKind::Active,
            ListKind::DismissedWithMerit,
            ListKind::DismissedWithoutMerit,
        ] {
            for suit in guard.list(kind) {
                if matches_field(suit, field, value) {
                    results.push(to_result(kind, suit));
                }
            }
        }
        results
    }

    /// Dump one list in search-result form.
    pub async fn list(&self, kind: ListKind) -> Vec<SearchResult> {
        let guard = self.state.read().await;
        guard.list(kind).iter().map(|s| to_result(kind, s)).collect()
    }

    /// Number of active lawsuits.
    pub async fn workload(&self) -> usize {
        self.state.read().await.active.len()
    }
}

fn matches_field(suit: &Lawsuit, field: SearchField, value: &str) -> bool {
    match field {
        SearchField::Id => suit.id.to_string().eq_ignore_ascii_case(value.trim()),
        SearchField::Plaintiff => suit
            .plaintiff
            .to_lowercase()
            .contains(&value.to_lowercase()),
        SearchField::Defendant => suit
            .defendant
            .to_lowercase()
            .contains(&value.to_lowercase()),
        SearchField::Cause => value
            .trim()
            .parse::<u32>()
            .is_ok_and(|n| suit.cause_action == n),
        SearchField::Claim => value
            .trim()
            .parse::<u32>()
            .is_ok_and(|n| suit.claims.contains(n)),
    }
}

fn to_result(list: ListKind, suit: &Lawsuit) -> SearchResult {
    SearchResult {
        list,
        id: suit.id.clone(),
        plaintiff: suit.plaintiff.clone(),
        defendant: suit.defendant.clone(),
        cause_action: suit.cause_action,
        claims: suit.claims.clone(),
    }
}
