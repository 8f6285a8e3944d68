//! Merge policy engine
//!
//! Folds an ordered list of fetched secrets into one merged view,
//! deterministically resolving key collisions and recording every
//! contested key so callers can audit ambiguity.

use std::collections::HashMap;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::source::{RawSecret, SourceDescriptor};

/// How raw keys map into the merged namespace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergePolicy {
    /// Resolved key = raw key; the higher-precedence source wins contested
    /// keys. This is the platform's own env-merge behavior.
    #[default]
    LastWins,
    /// Resolved key = `<prefix><raw key>`; sources collide only when they
    /// share a prefix.
    Prefixed,
    /// Resolved key = `<segment>/<raw key>`; distinctly named sources can
    /// never collide.
    PathSegmented,
}

/// Which end of the source list wins contested keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precedence {
    /// Later sources override earlier ones.
    #[default]
    Later,
    /// Earlier sources override later ones.
    Earlier,
}

/// One resolved entry in the merged view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedEntry {
    /// Decoded value bytes.
    pub value: Vec<u8>,
    /// `namespace/name` of the winning source.
    pub source_id: String,
    /// True when another source contended for this resolved key.
    pub collided: bool,
}

/// Record of a contested key, one per key per refresh cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollisionRecord {
    /// The contested key: the resolved key for real collisions, the raw
    /// key for avoided ones.
    pub key: String,
    /// Contending source ids, in merge order.
    pub contenders: Vec<String>,
    /// The source whose value won. For avoided records, the source that
    /// would have won had the policy flattened the keys.
    pub winner: String,
    /// True when the policy kept the contenders structurally apart and no
    /// value was overwritten.
    pub avoided: bool,
}

/// Immutable result of one merge cycle. Built fully formed and published
/// atomically; never mutated in place.
#[derive(Debug, Clone)]
pub struct MergedView {
    entries: HashMap<String, MergedEntry>,
    collisions: Vec<CollisionRecord>,
    refreshed_at: DateTime<Utc>,
}

impl MergedView {
    pub fn get(&self, key: &str) -> Option<&MergedEntry> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MergedEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn entries(&self) -> &HashMap<String, MergedEntry> {
        &self.entries
    }

    /// All collision records for this cycle, real and avoided, sorted by key.
    pub fn collisions(&self) -> &[CollisionRecord] {
        &self.collisions
    }

    /// Records where a value was actually overwritten.
    pub fn real_collisions(&self) -> impl Iterator<Item = &CollisionRecord> {
        self.collisions.iter().filter(|c| !c.avoided)
    }

    pub fn real_collision_count(&self) -> usize {
        self.real_collisions().count()
    }

    pub fn refreshed_at(&self) -> DateTime<Utc> {
        self.refreshed_at
    }

    /// Render the view as dotenv `KEY=value` lines, sorted by key.
    ///
    /// Separators that cannot appear in an environment variable name are
    /// mapped to `_`; values that are not UTF-8 are base64-encoded.
    pub fn to_dotenv(&self) -> String {
        let mut keys: Vec<&String> = self.entries.keys().collect();
        keys.sort();

        let mut out = String::new();
        for key in keys {
            let entry = &self.entries[key];
            let name: String = key
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
                .collect();
            match std::str::from_utf8(&entry.value) {
                Ok(text) => {
                    out.push_str(&name);
                    out.push('=');
                    out.push_str(text);
                    out.push('\n');
                }
                Err(_) => {
                    out.push_str(&name);
                    out.push('=');
                    out.push_str(&BASE64.encode(&entry.value));
                    out.push('\n');
                }
            }
        }
        out
    }
}

/// Fold fetched secrets into a merged view.
///
/// `sources` must be in configuration order; `precedence` decides which end
/// of the list wins contested keys. The fold is pure: it never starts
/// before every fetch outcome is in, and its result becomes visible only
/// when the caller publishes it.
pub fn merge(
    policy: MergePolicy,
    precedence: Precedence,
    sources: &[(SourceDescriptor, RawSecret)],
) -> MergedView {
    let ordered: Vec<&(SourceDescriptor, RawSecret)> = match precedence {
        Precedence::Later => sources.iter().collect(),
        Precedence::Earlier => sources.iter().rev().collect(),
    };

    let mut entries: HashMap<String, MergedEntry> = HashMap::new();
    // Resolved key -> contending source ids, in merge order.
    let mut contenders: HashMap<String, Vec<String>> = HashMap::new();
    // Raw key -> (source id, resolved key) pairs, for the avoided audit.
    let mut raw_owners: HashMap<String, Vec<(String, String)>> = HashMap::new();

    for (descriptor, secret) in ordered {
        let source_id = descriptor.id();
        // Sorted key iteration keeps collision records deterministic.
        let mut raw_keys: Vec<&String> = secret.data.keys().collect();
        raw_keys.sort();

        for raw_key in raw_keys {
            let resolved = match policy {
                MergePolicy::LastWins => raw_key.clone(),
                MergePolicy::Prefixed => {
                    format!("{}{}", descriptor.merge_prefix(), raw_key)
                }
                MergePolicy::PathSegmented => {
                    format!("{}/{}", descriptor.segment(), raw_key)
                }
            };

            raw_owners
                .entry(raw_key.clone())
                .or_default()
                .push((source_id.clone(), resolved.clone()));

            let slot = contenders.entry(resolved.clone()).or_default();
            slot.push(source_id.clone());
            let collided = slot.len() > 1;

            entries.insert(
                resolved,
                MergedEntry {
                    value: secret.data[raw_key].clone(),
                    source_id: source_id.clone(),
                    collided,
                },
            );
        }
    }

    let mut collisions = Vec::new();
    for (resolved, sources_for_key) in &contenders {
        if sources_for_key.len() < 2 {
            continue;
        }
        collisions.push(CollisionRecord {
            key: resolved.clone(),
            contenders: sources_for_key.clone(),
            winner: entries[resolved].source_id.clone(),
            avoided: false,
        });
    }

    if policy != MergePolicy::LastWins {
        for (raw_key, owners) in &raw_owners {
            if owners.len() < 2 {
                continue;
            }
            // Owners that landed on the same resolved key are already a
            // real collision; record the structurally separated remainder.
            let distinct_resolved: Vec<&String> = {
                let mut seen = Vec::new();
                for (_, resolved) in owners {
                    if !seen.contains(&resolved) {
                        seen.push(resolved);
                    }
                }
                seen
            };
            if distinct_resolved.len() < 2 {
                continue;
            }
            collisions.push(CollisionRecord {
                key: raw_key.clone(),
                contenders: owners.iter().map(|(id, _)| id.clone()).collect(),
                winner: owners
                    .last()
                    .map(|(id, _)| id.clone())
                    .unwrap_or_default(),
                avoided: true,
            });
        }
    }

    collisions.sort_by(|a, b| (&a.key, a.avoided).cmp(&(&b.key, b.avoided)));

    MergedView {
        entries,
        collisions,
        refreshed_at: Utc::now(),
    }
}
