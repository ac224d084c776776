use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::conflict::Conflict;
use crate::error::TypeError;
use crate::platform::Platform;
use crate::resolution::Resolution;
use crate::state::StateDocument;

/// Where one field of the unified document came from.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldProvenance {
    /// The platform whose value the field holds.
    pub source: Option<Platform>,
    /// Every platform that reported the field.
    pub contributors: Vec<Platform>,
    /// Platforms whose conflicting value lost to `source`.
    pub resolved_over: Vec<Platform>,
    /// The conflict that touched this field, if any.
    pub conflict_id: Option<String>,
    /// The field was in conflict and kept its baseline value.
    pub unresolved: bool,
}

impl FieldProvenance {
    /// A field passed through unchanged from `source`.
    pub fn baseline(source: Platform, contributors: Vec<Platform>) -> Self {
        Self {
            source: Some(source),
            contributors,
            ..Default::default()
        }
    }
}

impl fmt::Display for FieldProvenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.source {
            Some(p) => write!(f, "{p}")?,
            None => write!(f, "unsourced")?,
        }
        if self.unresolved {
            if let Some(id) = &self.conflict_id {
                write!(f, " (unresolved, conflict {id})")?;
            } else {
                write!(f, " (unresolved)")?;
            }
        } else if !self.resolved_over.is_empty() {
            let losers: Vec<&str> = self.resolved_over.iter().map(Platform::as_str).collect();
            write!(f, " (resolved over {})", losers.join(", "))?;
        }
        Ok(())
    }
}

/// The single merged document produced by a completed merge.
///
/// Immutable once sealed. `digest` is the BLAKE3 hash of the canonical JSON
/// encoding of everything else, so two snapshots built from the same inputs
/// have equal digests.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnifiedSnapshot {
    document: StateDocument,
    provenance: BTreeMap<String, FieldProvenance>,
    conflicts: Vec<Conflict>,
    resolutions: Vec<Resolution>,
    unresolved: Vec<String>,
    digest: String,
}

#[derive(Serialize)]
struct DigestInput<'a> {
    document: &'a StateDocument,
    provenance: &'a BTreeMap<String, FieldProvenance>,
    conflicts: &'a [Conflict],
    resolutions: &'a [Resolution],
}

impl UnifiedSnapshot {
    /// Seal a snapshot, computing the unresolved path list and digest.
    pub fn seal(
        document: StateDocument,
        provenance: BTreeMap<String, FieldProvenance>,
        conflicts: Vec<Conflict>,
        resolutions: Vec<Resolution>,
    ) -> Result<Self, TypeError> {
        let bytes = serde_json::to_vec(&DigestInput {
            document: &document,
            provenance: &provenance,
            conflicts: &conflicts,
            resolutions: &resolutions,
        })
        .map_err(|e| TypeError::Serialization(e.to_string()))?;
        let digest = hex::encode(blake3::hash(&bytes).as_bytes());

        let unresolved = provenance
            .iter()
            .filter(|(_, p)| p.unresolved)
            .map(|(path, _)| path.clone())
            .collect();

        Ok(Self {
            document,
            provenance,
            conflicts,
            resolutions,
            unresolved,
            digest,
        })
    }

    pub fn document(&self) -> &StateDocument {
        &self.document
    }

    pub fn provenance(&self) -> &BTreeMap<String, FieldProvenance> {
        &self.provenance
    }

    /// Provenance of one dotted path.
    pub fn provenance_of(&self, path: &str) -> Option<&FieldProvenance> {
        self.provenance.get(path)
    }

    pub fn conflicts(&self) -> &[Conflict] {
        &self.conflicts
    }

    pub fn resolutions(&self) -> &[Resolution] {
        &self.resolutions
    }

    /// Paths left unresolved, in sorted order.
    pub fn unresolved(&self) -> &[String] {
        &self.unresolved
    }

    /// Hex-encoded BLAKE3 content digest.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn is_fully_resolved(&self) -> bool {
        self.unresolved.is_empty()
    }

    /// The merged document as a JSON object.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.document
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }
}
