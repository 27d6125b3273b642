//! Per-session match state machine.
//!
//! A session compiles one query via [`MatchSession::setup_match`] and
//! then evaluates a stream of targets against it: `load_target_*`
//! caches one target, `match_loaded` dispatches on the search mode.
//! Sessions hold mutable per-call caches and are confined to one thread
//! by `&mut self`; clone the compiled options and open a second session
//! for parallel matching.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use tethys_chem::{
    aromatize, parse_record, structure_gross_formula, GrossQuery, Molecule, SmilesOptions,
    Structure,
};
use tethys_core::{Result, TethysError};

use crate::codec;
use crate::dict::LzwDict;
use crate::fingerprint::{
    self, Fingerprint, FingerprintLayout, FingerprintMode, Segment, SimilarityMetric,
};
use crate::matcher::{self, ConditionMask};
use crate::prepare::structural_hash;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchMode {
    #[default]
    Undefined,
    Substructure,
    Tautomer,
    Exact,
    Similarity,
    Gross,
}

#[derive(Debug, Clone)]
pub struct MatchOptions {
    pub smiles: SmilesOptions,
    pub layout: FingerprintLayout,
    /// Deadline for substructure/tautomer/exact matching; `None` never
    /// cancels.
    pub timeout: Option<Duration>,
    /// Exact-match condition string, e.g. `"ELE CHG ISO STE"`.
    pub conditions: String,
    pub metric: SimilarityMetric,
}

impl Default for MatchOptions {
    fn default() -> Self {
        MatchOptions {
            smiles: SmilesOptions::default(),
            layout: FingerprintLayout::default(),
            timeout: Some(Duration::from_secs(60)),
            conditions: String::new(),
            metric: SimilarityMetric::Tanimoto,
        }
    }
}

/// Outcome of one `match_loaded` call: a yes/no for the structural
/// modes, a score for similarity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatchResult {
    Matched(bool),
    Score(f64),
}

impl MatchResult {
    pub fn is_match(&self) -> bool {
        match *self {
            MatchResult::Matched(m) => m,
            MatchResult::Score(s) => s > 0.0,
        }
    }
}

/// Compiled once per `setup_match`, reused across targets.
struct CompiledQuery {
    structure: Structure,
    /// Per-member embedding orders (substructure/tautomer).
    orders: Vec<Vec<usize>>,
    /// Tautomer skeletons, parallel to `orders` in tautomer mode.
    skeletons: Vec<Molecule>,
    fingerprint: Option<Fingerprint>,
    hash: u32,
    mask: ConditionMask,
    gross: Option<GrossQuery>,
}

struct LoadedTarget {
    structure: Structure,
    hash: u32,
}

pub struct MatchSession {
    mode: SearchMode,
    options: MatchOptions,
    query: Option<CompiledQuery>,
    target: Option<LoadedTarget>,
}

impl Default for MatchSession {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchSession {
    pub fn new() -> Self {
        MatchSession {
            mode: SearchMode::Undefined,
            options: MatchOptions::default(),
            query: None,
            target: None,
        }
    }

    pub fn mode(&self) -> SearchMode {
        self.mode
    }

    /// Compile the query once. Any previously loaded target is dropped.
    pub fn setup_match(
        &mut self,
        mode: SearchMode,
        query_text: &str,
        options: MatchOptions,
    ) -> Result<()> {
        if mode == SearchMode::Undefined {
            return Err(TethysError::Internal("cannot set up an undefined search mode".into()));
        }

        let compiled = if mode == SearchMode::Gross {
            CompiledQuery {
                structure: Structure::Molecule(Molecule::new(String::new(), Vec::new(), Vec::new())),
                orders: Vec::new(),
                skeletons: Vec::new(),
                fingerprint: None,
                hash: 0,
                mask: ConditionMask::default(),
                gross: Some(GrossQuery::parse(query_text)?),
            }
        } else {
            let parsed = parse_record(query_text.as_bytes(), options.smiles)?;
            let mut structure = parsed.structure;
            if !parsed.already_aromatic {
                for mol in structure.members_mut() {
                    aromatize(mol);
                }
            }

            let (orders, skeletons) = match mode {
                SearchMode::Substructure => {
                    (structure.members().iter().map(|m| matcher::compile_order(m)).collect(), Vec::new())
                }
                SearchMode::Tautomer => {
                    let skeletons: Vec<Molecule> =
                        structure.members().iter().map(|m| matcher::skeleton(m)).collect();
                    let orders = skeletons.iter().map(matcher::compile_order).collect();
                    (orders, skeletons)
                }
                _ => (Vec::new(), Vec::new()),
            };

            let fingerprint = match mode {
                // Screened modes relax query bits; similarity needs the
                // full-precision vector.
                SearchMode::Substructure | SearchMode::Tautomer => Some(fingerprint::build(
                    &structure,
                    options.layout,
                    FingerprintMode::Query,
                )),
                SearchMode::Similarity => Some(fingerprint::build(
                    &structure,
                    options.layout,
                    FingerprintMode::Target,
                )),
                _ => None,
            };

            CompiledQuery {
                hash: structural_hash(&structure),
                mask: ConditionMask::parse(&options.conditions)?,
                fingerprint,
                orders,
                skeletons,
                gross: None,
                structure,
            }
        };

        self.mode = mode;
        self.options = options;
        self.query = Some(compiled);
        self.target = None;
        Ok(())
    }

    /// Parse and normalize a text target, then cache it.
    pub fn load_target_text(&mut self, text: &str) -> Result<()> {
        let parsed = parse_record(text.as_bytes(), self.options.smiles)?;
        let mut structure = parsed.structure;
        // Skipping renormalization of already-canonical input changes
        // nothing about the match outcome, only the cost.
        if !parsed.already_aromatic {
            for mol in structure.members_mut() {
                aromatize(mol);
            }
        }
        self.cache_target(structure)
    }

    /// Decode a stored blob target; dictionary-mode blobs need the
    /// index dictionary. Stored blobs were aromatized at indexing time,
    /// so renormalization is skipped.
    pub fn load_target_blob(
        &mut self,
        blob: &[u8],
        dict: Option<&Arc<Mutex<LzwDict>>>,
    ) -> Result<()> {
        let structure = codec::decode(blob, dict.map(|d| &**d))?;
        self.cache_target(structure)
    }

    fn cache_target(&mut self, structure: Structure) -> Result<()> {
        let hash = structural_hash(&structure);
        self.target = Some(LoadedTarget { structure, hash });
        Ok(())
    }

    /// Screen a stored fingerprint against the compiled query; callers
    /// skip decoding candidates this rejects. Always true for modes
    /// without a screening segment.
    pub fn screen(&self, target_fp: &Fingerprint) -> bool {
        let Some(query) = &self.query else { return false };
        let Some(query_fp) = &query.fingerprint else { return true };
        match self.mode {
            SearchMode::Substructure => {
                fingerprint::subset_test(query_fp, target_fp, &[Segment::Ord, Segment::Any])
            }
            SearchMode::Tautomer => {
                // ORD and ANY bits hash bond orders, which is exactly
                // what tautomers disagree on; only the bond-collapsed
                // TAU segment is safe to assert here.
                fingerprint::subset_test(query_fp, target_fp, &[Segment::Tau])
            }
            _ => true,
        }
    }

    /// Evaluate the loaded target against the compiled query.
    pub fn match_loaded(&mut self) -> Result<MatchResult> {
        if self.mode == SearchMode::Undefined {
            return Err(TethysError::Internal("match called with no query set up".into()));
        }
        let query = self
            .query
            .as_ref()
            .ok_or_else(|| TethysError::Internal("match called with no query set up".into()))?;
        let target = self
            .target
            .as_ref()
            .ok_or_else(|| TethysError::Internal("match called with no target loaded".into()))?;

        let deadline = self.options.timeout.map(|t| Instant::now() + t);

        match self.mode {
            SearchMode::Undefined => unreachable!("checked above"),
            SearchMode::Substructure => {
                let members = query.structure.members();
                let targets = target.structure.members();
                let found = embed_all(&members, &query.orders, &targets, deadline)?;
                Ok(MatchResult::Matched(found))
            }
            SearchMode::Tautomer => {
                let target_skeletons: Vec<Molecule> =
                    target.structure.members().iter().map(|m| matcher::skeleton(m)).collect();
                let members: Vec<&Molecule> = query.skeletons.iter().collect();
                let targets: Vec<&Molecule> = target_skeletons.iter().collect();
                let found = embed_all(&members, &query.orders, &targets, deadline)?;
                Ok(MatchResult::Matched(found))
            }
            SearchMode::Exact => {
                // Hash disagreement is a guaranteed non-match.
                if query.hash != target.hash && query.mask == ConditionMask::default() {
                    return Ok(MatchResult::Matched(false));
                }
                let same =
                    matcher::exact_match(&query.structure, &target.structure, query.mask, deadline)?;
                Ok(MatchResult::Matched(same))
            }
            SearchMode::Similarity => {
                let query_fp = query.fingerprint.as_ref().ok_or_else(|| {
                    TethysError::Internal("similarity query has no fingerprint".into())
                })?;
                let target_fp = fingerprint::build(
                    &target.structure,
                    self.options.layout,
                    FingerprintMode::Target,
                );
                Ok(MatchResult::Score(fingerprint::similarity(
                    query_fp,
                    &target_fp,
                    self.options.metric,
                )))
            }
            SearchMode::Gross => {
                let constraint = query
                    .gross
                    .as_ref()
                    .ok_or_else(|| TethysError::Internal("gross query not compiled".into()))?;
                let formula = structure_gross_formula(&target.structure);
                Ok(MatchResult::Matched(constraint.matches(&formula)))
            }
        }
    }
}

/// Every query member must embed in some target member.
fn embed_all(
    members: &[&Molecule],
    orders: &[Vec<usize>],
    targets: &[&Molecule],
    deadline: Option<Instant>,
) -> Result<bool> {
    for (member, order) in members.iter().zip(orders) {
        let mut found = false;
        for &target in targets {
            if matcher::embedding_exists(member, target, order, deadline)? {
                found = true;
                break;
            }
        }
        if !found {
            return Ok(false);
        }
    }
    Ok(true)
}
