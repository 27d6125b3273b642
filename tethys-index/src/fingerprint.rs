//! Segmented structure fingerprints and bit-vector screening.
//!
//! A fingerprint is the byte-wise concatenation of four named segments:
//!
//! - `ORD`: hashed linear fragments with full atom and bond codes, the
//!   main substructure screen;
//! - `ANY`: the same fragments with atoms wildcarded, so query atoms
//!   without an element constraint still screen on bond patterns;
//! - `TAU`: skeleton fragments with bond orders collapsed and charges
//!   ignored, tautomer-invariant;
//! - `SIM`: Morgan-refined atom environments for similarity scoring.
//!
//! Segment sizes are index-wide configuration; changing them
//! invalidates every stored fingerprint. Bits are folded into a segment
//! as `hash % segment_bits`, LSB-first within each byte.

use tethys_chem::{BondOrder, Molecule, Structure};
use tethys_core::hash::Fnv1a;
use tethys_core::{Result, TethysError};

/// Longest linear fragment walked, in bonds.
const MAX_PATH_BONDS: usize = 5;

/// Morgan environment radius for the similarity segment.
const SIM_RADIUS: usize = 2;

/// Byte sizes of the four segments, in ORD, ANY, TAU, SIM order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FingerprintLayout {
    pub ord_bytes: usize,
    pub any_bytes: usize,
    pub tau_bytes: usize,
    pub sim_bytes: usize,
}

impl Default for FingerprintLayout {
    fn default() -> Self {
        FingerprintLayout { ord_bytes: 64, any_bytes: 32, tau_bytes: 32, sim_bytes: 64 }
    }
}

impl FingerprintLayout {
    pub fn total_bytes(&self) -> usize {
        self.ord_bytes + self.any_bytes + self.tau_bytes + self.sim_bytes
    }

    /// Byte range of one segment within the concatenated vector.
    fn range(&self, segment: Segment) -> std::ops::Range<usize> {
        let (start, len) = match segment {
            Segment::Ord => (0, self.ord_bytes),
            Segment::Any => (self.ord_bytes, self.any_bytes),
            Segment::Tau => (self.ord_bytes + self.any_bytes, self.tau_bytes),
            Segment::Sim => (self.ord_bytes + self.any_bytes + self.tau_bytes, self.sim_bytes),
        };
        start..start + len
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    Ord,
    Any,
    Tau,
    Sim,
}

/// Whether the fingerprint describes a stored target (all segments,
/// full precision) or a query (relaxed codes, no similarity bits).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FingerprintMode {
    Query,
    Target,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    layout: FingerprintLayout,
    bits: Vec<u8>,
}

impl Fingerprint {
    fn empty(layout: FingerprintLayout) -> Self {
        Fingerprint { layout, bits: vec![0u8; layout.total_bytes()] }
    }

    /// Reattach a layout to stored fingerprint bytes.
    pub fn from_bytes(layout: FingerprintLayout, bytes: Vec<u8>) -> Result<Self> {
        if bytes.len() != layout.total_bytes() {
            return Err(TethysError::Consistency(format!(
                "fingerprint is {} bytes, layout expects {}",
                bytes.len(),
                layout.total_bytes()
            )));
        }
        Ok(Fingerprint { layout, bits: bytes })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bits
    }

    pub fn layout(&self) -> FingerprintLayout {
        self.layout
    }

    pub fn segment(&self, segment: Segment) -> &[u8] {
        &self.bits[self.layout.range(segment)]
    }

    /// Total set bits.
    pub fn ones_count(&self) -> usize {
        self.bits.iter().map(|b| b.count_ones() as usize).sum()
    }

    pub fn segment_ones(&self, segment: Segment) -> usize {
        self.segment(segment).iter().map(|b| b.count_ones() as usize).sum()
    }

    fn set(&mut self, segment: Segment, hash: u64) {
        let range = self.layout.range(segment);
        let seg_bits = (range.end - range.start) * 8;
        if seg_bits == 0 {
            return;
        }
        let bit = (hash % seg_bits as u64) as usize;
        self.bits[range.start + bit / 8] |= 1 << (bit % 8);
    }

    fn or_with(&mut self, other: &Fingerprint) {
        for (dst, src) in self.bits.iter_mut().zip(&other.bits) {
            *dst |= *src;
        }
    }
}

/// Build the fingerprint of a structure; reactions are the bit-union of
/// their members. Deterministic bit-for-bit for a canonical aromatized
/// input under fixed layout and mode.
pub fn build(structure: &Structure, layout: FingerprintLayout, mode: FingerprintMode) -> Fingerprint {
    let mut fp = Fingerprint::empty(layout);
    for mol in structure.members() {
        let mut part = Fingerprint::empty(layout);
        build_molecule(mol, mode, &mut part);
        fp.or_with(&part);
    }
    fp
}

fn build_molecule(mol: &Molecule, mode: FingerprintMode, fp: &mut Fingerprint) {
    enumerate_paths(mol, |path| {
        let has_wildcard = path.atoms.iter().any(|&a| wildcard(mol, a));

        if !has_wildcard {
            fp.set(Segment::Ord, path_hash(mol, path, AtomCode::Base, BondCode::Order));
            if mode == FingerprintMode::Target {
                // Extra precision bits queries never assert.
                fp.set(Segment::Ord, path_hash(mol, path, AtomCode::Decorated, BondCode::Order));
            }
            fp.set(Segment::Tau, path_hash(mol, path, AtomCode::Skeleton, BondCode::Collapsed));
        }
        fp.set(Segment::Any, path_hash(mol, path, AtomCode::Wildcard, BondCode::Order));
    });

    if mode == FingerprintMode::Target {
        for hash in morgan_environments(mol) {
            fp.set(Segment::Sim, hash);
        }
    }
}

fn wildcard(mol: &Molecule, atom_idx: usize) -> bool {
    mol.atoms[atom_idx].kind.atomic_number().is_none()
}

#[derive(Clone, Copy, PartialEq)]
enum AtomCode {
    /// Element + aromaticity; charge-insensitive so relaxed queries
    /// still screen targets.
    Base,
    /// Base plus charge and isotope, target-side precision.
    Decorated,
    /// Element only, tautomer skeleton.
    Skeleton,
    /// Constant code, bond pattern only.
    Wildcard,
}

#[derive(Clone, Copy, PartialEq)]
enum BondCode {
    Order,
    Collapsed,
}

fn atom_code(mol: &Molecule, atom_idx: usize, code: AtomCode) -> u64 {
    let atom = &mol.atoms[atom_idx];
    let element = atom.kind.atomic_number().unwrap_or(0) as u64;
    match code {
        AtomCode::Base => element << 1 | atom.is_aromatic as u64,
        AtomCode::Decorated => {
            let mut v = element << 1 | atom.is_aromatic as u64;
            v = v << 8 | (atom.formal_charge as i64 + 16) as u64;
            v = v << 16 | atom.isotope.unwrap_or(0) as u64;
            v
        }
        AtomCode::Skeleton => element,
        AtomCode::Wildcard => 1,
    }
}

fn bond_code(order: BondOrder, code: BondCode) -> u64 {
    match code {
        BondCode::Order => order.code() as u64,
        BondCode::Collapsed => 1,
    }
}

struct Path {
    atoms: Vec<usize>,
    bonds: Vec<usize>,
}

/// Direction-independent hash of one linear fragment.
fn path_hash(mol: &Molecule, path: &Path, atoms: AtomCode, bonds: BondCode) -> u64 {
    let forward = directed_hash(mol, path, atoms, bonds, false);
    let reverse = directed_hash(mol, path, atoms, bonds, true);
    forward.min(reverse)
}

fn directed_hash(mol: &Molecule, path: &Path, atoms: AtomCode, bonds: BondCode, rev: bool) -> u64 {
    let mut h = Fnv1a::new();
    let n = path.atoms.len();
    for step in 0..n {
        let ai = if rev { n - 1 - step } else { step };
        h.update(atom_code(mol, path.atoms[ai], atoms));
        if step + 1 < n {
            let bi = if rev { n - 2 - step } else { step };
            h.update(bond_code(mol.bonds[path.bonds[bi]].order, bonds));
        }
    }
    h.finish()
}

/// Walk every simple linear path of 1..=MAX_PATH_BONDS bonds. Each
/// undirected path is visited twice (once per end); the hash collapses
/// the two, so duplicate visits only cost time.
fn enumerate_paths(mol: &Molecule, mut f: impl FnMut(&Path)) {
    let mut path = Path { atoms: Vec::new(), bonds: Vec::new() };
    let mut on_path = vec![false; mol.atom_count()];
    for start in 0..mol.atom_count() {
        path.atoms.push(start);
        on_path[start] = true;
        extend_path(mol, &mut path, &mut on_path, &mut f);
        on_path[start] = false;
        path.atoms.pop();
    }
}

fn extend_path(
    mol: &Molecule,
    path: &mut Path,
    on_path: &mut Vec<bool>,
    f: &mut impl FnMut(&Path),
) {
    let last = *path.atoms.last().unwrap_or(&0);
    for (nb, bond_idx) in mol.neighbors(last) {
        if on_path[nb] {
            continue;
        }
        path.atoms.push(nb);
        path.bonds.push(bond_idx);
        on_path[nb] = true;
        f(path);
        if path.bonds.len() < MAX_PATH_BONDS {
            extend_path(mol, path, on_path, f);
        }
        on_path[nb] = false;
        path.atoms.pop();
        path.bonds.pop();
    }
}

/// Per-atom environment hashes at radii `0..=SIM_RADIUS`, refined the
/// Morgan way: each round mixes the sorted neighbor hashes of the
/// previous round.
fn morgan_environments(mol: &Molecule) -> Vec<u64> {
    let n = mol.atom_count();
    let mut current: Vec<u64> = (0..n)
        .map(|i| {
            let mut h = Fnv1a::new();
            h.update(atom_code(mol, i, AtomCode::Decorated));
            h.update(mol.degree(i) as u64);
            h.finish()
        })
        .collect();

    let mut out = current.clone();
    for _ in 0..SIM_RADIUS {
        let mut next = vec![0u64; n];
        for i in 0..n {
            let mut nbr: Vec<u64> = mol
                .neighbors(i)
                .map(|(nb, bi)| {
                    let mut h = Fnv1a::new();
                    h.update(bond_code(mol.bonds[bi].order, BondCode::Order));
                    h.update(current[nb]);
                    h.finish()
                })
                .collect();
            nbr.sort_unstable();
            let mut h = Fnv1a::new();
            h.update(current[i]);
            for v in nbr {
                h.update(v);
            }
            next[i] = h.finish();
        }
        out.extend_from_slice(&next);
        current = next;
    }
    out
}

/// Screening test: every set bit of the query's given segments must be
/// set in the target. Necessary, not sufficient, for a structural match.
pub fn subset_test(query: &Fingerprint, target: &Fingerprint, segments: &[Segment]) -> bool {
    segments.iter().all(|&seg| {
        query
            .segment(seg)
            .iter()
            .zip(target.segment(seg))
            .all(|(q, t)| q & t == *q)
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SimilarityMetric {
    Tanimoto,
    Tversky { alpha: f64, beta: f64 },
    /// Fraction of the query's bits found in the target.
    EuclidSub,
}

impl SimilarityMetric {
    /// Score from (query ones, target ones, common ones).
    pub fn score(self, query_ones: usize, target_ones: usize, common: usize) -> f64 {
        let (a, b, c) = (query_ones as f64, target_ones as f64, common as f64);
        match self {
            SimilarityMetric::Tanimoto => {
                let denom = a + b - c;
                if denom <= 0.0 {
                    0.0
                } else {
                    c / denom
                }
            }
            SimilarityMetric::Tversky { alpha, beta } => {
                let denom = alpha * (a - c) + beta * (b - c) + c;
                if denom <= 0.0 {
                    0.0
                } else {
                    c / denom
                }
            }
            SimilarityMetric::EuclidSub => {
                if a <= 0.0 {
                    0.0
                } else {
                    c / a
                }
            }
        }
    }

    /// Common-bit count that would yield score `s` for (a, b); the
    /// algebraic inverse of [`score`](Self::score).
    fn common_from_score(self, query_ones: usize, target_ones: usize, s: f64) -> f64 {
        let (a, b) = (query_ones as f64, target_ones as f64);
        match self {
            SimilarityMetric::Tanimoto => s * (a + b) / (1.0 + s),
            SimilarityMetric::Tversky { alpha, beta } => {
                s * (alpha * a + beta * b) / (1.0 + s * (alpha + beta - 1.0))
            }
            SimilarityMetric::EuclidSub => s * a,
        }
    }
}

/// Number of bits set in both vectors' similarity segments.
pub fn common_ones(query: &Fingerprint, target: &Fingerprint) -> usize {
    sim_slice(query)
        .iter()
        .zip(sim_slice(target))
        .map(|(q, t)| (q & t).count_ones() as usize)
        .sum()
}

/// Similarity score over the SIM segment (the whole vector when the
/// layout has no SIM bytes).
pub fn similarity(query: &Fingerprint, target: &Fingerprint, metric: SimilarityMetric) -> f64 {
    let q_ones: usize = sim_slice(query).iter().map(|b| b.count_ones() as usize).sum();
    let t_ones: usize = sim_slice(target).iter().map(|b| b.count_ones() as usize).sum();
    metric.score(q_ones, t_ones, common_ones(query, target))
}

fn sim_slice(fp: &Fingerprint) -> &[u8] {
    if fp.layout().sim_bytes > 0 {
        fp.segment(Segment::Sim)
    } else {
        fp.as_bytes()
    }
}

/// Tightest achievable `(min_common, max_common)` for a candidate known
/// only by its set-bit count, given a required score range. Candidates
/// whose true common count falls outside can be rejected without ever
/// decoding them.
pub fn similarity_bounds(
    query_ones: usize,
    target_ones: usize,
    metric: SimilarityMetric,
    score_range: (f64, f64),
) -> (usize, usize) {
    let cap = query_ones.min(target_ones);
    let lo = metric.common_from_score(query_ones, target_ones, score_range.0);
    let hi = metric.common_from_score(query_ones, target_ones, score_range.1);
    let min_common = ((lo - 1e-9).ceil().max(0.0) as usize).min(cap);
    let max_common = (((hi + 1e-9).floor().max(0.0)) as usize).min(cap);
    (min_common, max_common)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tethys_chem::{aromatize, parse_smiles};

    fn target_fp(smiles: &str) -> Fingerprint {
        let mut mol = parse_smiles(smiles).unwrap();
        aromatize(&mut mol);
        build(&Structure::Molecule(mol), FingerprintLayout::default(), FingerprintMode::Target)
    }

    fn query_fp(smiles: &str) -> Fingerprint {
        let mut mol = parse_smiles(smiles).unwrap();
        aromatize(&mut mol);
        build(&Structure::Molecule(mol), FingerprintLayout::default(), FingerprintMode::Query)
    }

    #[test]
    fn deterministic_bit_for_bit() {
        let a = target_fp("CC(=O)Oc1ccccc1C(=O)O");
        let b = target_fp("CC(=O)Oc1ccccc1C(=O)O");
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn query_mode_skips_sim_segment() {
        let q = query_fp("c1ccccc1");
        assert_eq!(q.segment_ones(Segment::Sim), 0);
        let t = target_fp("c1ccccc1");
        assert!(t.segment_ones(Segment::Sim) > 0);
    }

    #[test]
    fn substructure_screens_in() {
        // True substructures must never be screened out.
        let cases = [
            ("CCO", "CCCCO"),
            ("c1ccccc1", "Cc1ccccc1"),
            ("C=O", "CC(=O)OC"),
            ("CCl", "ClCCCl"),
        ];
        for (sub, sup) in cases {
            let q = query_fp(sub);
            let t = target_fp(sup);
            assert!(
                subset_test(&q, &t, &[Segment::Ord, Segment::Any]),
                "{sub} in {sup}"
            );
        }
    }

    #[test]
    fn unrelated_structures_screen_out() {
        let q = query_fp("c1ccncc1");
        let t = target_fp("CCCCCC");
        assert!(!subset_test(&q, &t, &[Segment::Ord, Segment::Any]));
    }

    #[test]
    fn wildcard_query_screens_on_bond_pattern() {
        let mut mol = parse_smiles("C*C").unwrap();
        aromatize(&mut mol);
        let q = build(
            &Structure::Molecule(mol),
            FingerprintLayout::default(),
            FingerprintMode::Query,
        );
        let t = target_fp("CCC");
        assert!(subset_test(&q, &t, &[Segment::Ord, Segment::Any]));
    }

    #[test]
    fn kekule_and_aromatic_inputs_agree_after_aromatization() {
        assert_eq!(target_fp("C1=CC=CC=C1").as_bytes(), target_fp("c1ccccc1").as_bytes());
    }

    #[test]
    fn self_similarity_is_one() {
        let t = target_fp("CC(=O)Oc1ccccc1");
        let score = similarity(&t, &t, SimilarityMetric::Tanimoto);
        assert!((score - 1.0).abs() < 1e-12);
    }

    #[test]
    fn similar_structures_score_higher_than_dissimilar() {
        let q = target_fp("CCCCCO");
        let close = target_fp("CCCCO");
        let far = target_fp("c1ccncc1");
        let m = SimilarityMetric::Tanimoto;
        assert!(similarity(&q, &close, m) > similarity(&q, &far, m));
    }

    #[test]
    fn bounds_bracket_true_common_count() {
        let q = target_fp("CCCCO");
        for target in ["CCCCO", "CCCCCO", "c1ccccc1", "CC(C)CO"] {
            let t = target_fp(target);
            let a = sim_ones(&q);
            let b = sim_ones(&t);
            let c = common_ones(&q, &t);
            for metric in [
                SimilarityMetric::Tanimoto,
                SimilarityMetric::Tversky { alpha: 0.7, beta: 0.3 },
                SimilarityMetric::EuclidSub,
            ] {
                let score = metric.score(a, b, c);
                let (lo, hi) = similarity_bounds(a, b, metric, (score, score));
                assert!(lo <= c && c <= hi, "{target} {metric:?}: {lo} <= {c} <= {hi}");
            }
        }
    }

    fn sim_ones(fp: &Fingerprint) -> usize {
        fp.segment_ones(Segment::Sim)
    }

    #[test]
    fn from_bytes_validates_length() {
        let layout = FingerprintLayout::default();
        assert!(Fingerprint::from_bytes(layout, vec![0; layout.total_bytes()]).is_ok());
        assert!(Fingerprint::from_bytes(layout, vec![0; 3]).is_err());
    }
}
