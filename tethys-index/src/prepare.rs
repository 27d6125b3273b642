//! Record preparation: one raw record in, one indexed record out.
//!
//! The preparer owns the per-record pipeline: parse, annotation
//! stripping, consistency checks, aromatization, structural hash,
//! encoding, fingerprint. Parsing and normalization run lock-free; the
//! only shared state touched is the compression dictionary, locked for
//! the duration of the encode call alone. One preparer instance is
//! confined to one thread.

use std::sync::Arc;

use parking_lot::Mutex;

use tethys_chem::{
    aromatize, canonical_ranks, molecular_mass, parse_record, structure_gross_formula, Molecule,
    SmilesOptions, Structure,
};
use tethys_core::hash::{sha256, Fnv1a};
use tethys_core::{ContentAddressable, Result, TethysError};

use crate::codec;
use crate::dict::LzwDict;
use crate::fingerprint::{self, Fingerprint, FingerprintLayout, FingerprintMode};

#[derive(Debug, Clone, Default)]
pub struct PrepareOptions {
    pub smiles: SmilesOptions,
    /// Escalate consistency violations into run-aborting errors instead
    /// of per-record ones.
    pub reject_invalid: bool,
    /// Index modes without similarity search can skip fingerprints.
    pub skip_fingerprint: bool,
    /// Keep atom-map annotations (reaction indexes); molecule indexes
    /// strip them.
    pub keep_atom_maps: bool,
    pub layout: FingerprintLayout,
}

/// One fully prepared record, immutable once built.
#[derive(Debug, Clone)]
pub struct PreparedRecord {
    pub id: u64,
    pub blob: Vec<u8>,
    pub fingerprint: Option<Fingerprint>,
    /// Range-packed coordinate block, present when the input carried
    /// positions.
    pub coords: Option<Vec<u8>>,
    /// 32-bit structural hash for exact-match prefiltering.
    pub hash: u32,
    pub mass: f64,
    /// Hill-order gross formula.
    pub gross: String,
}

impl ContentAddressable for PreparedRecord {
    fn content_hash(&self) -> String {
        sha256(&self.blob)
    }
}

pub struct RecordPreparer {
    options: PrepareOptions,
    dict: Arc<Mutex<LzwDict>>,
}

impl RecordPreparer {
    pub fn new(options: PrepareOptions, dict: Arc<Mutex<LzwDict>>) -> Self {
        RecordPreparer { options, dict }
    }

    pub fn options(&self) -> &PrepareOptions {
        &self.options
    }

    /// Run the full pipeline on one raw record.
    pub fn prepare(&self, id: u64, raw: &[u8]) -> Result<PreparedRecord> {
        let parsed = parse_record(raw, self.options.smiles)?;
        let mut structure = parsed.structure;

        if !self.options.keep_atom_maps {
            if let Structure::Molecule(mol) = &mut structure {
                mol.strip_atom_maps();
            }
        }

        match structure.check_consistency() {
            Ok(()) => {}
            Err(err) if self.options.reject_invalid => {
                return Err(TethysError::Internal(format!(
                    "record {id} rejected: {err}"
                )));
            }
            Err(err) => return Err(err),
        }

        if !parsed.already_aromatic {
            for mol in structure.members_mut() {
                aromatize(mol);
            }
        }

        let hash = structural_hash(&structure);
        let mass: f64 = structure.members().iter().map(|m| molecular_mass(m)).sum();
        let gross = structure_gross_formula(&structure).hill_string();

        let coords = match &structure {
            Structure::Molecule(mol) => codec::pack_coords(mol),
            Structure::Reaction(_) => None,
        };

        let blob = codec::encode(&structure, Some(&self.dict))?;

        let fingerprint = if self.options.skip_fingerprint {
            None
        } else {
            Some(fingerprint::build(&structure, self.options.layout, FingerprintMode::Target))
        };

        Ok(PreparedRecord { id, blob, fingerprint, coords, hash, mass, gross })
    }
}

/// Structural hash for exact-match prefiltering: each heavy-atom
/// component is hashed on its own, and component hashes are summed so
/// the result does not depend on component order.
pub fn structural_hash(structure: &Structure) -> u32 {
    let mut total: u32 = 0;
    for mol in structure.members() {
        for component in mol.connected_components() {
            total = total.wrapping_add(component_hash(mol, &component));
        }
    }
    total
}

fn component_hash(mol: &Molecule, component: &[usize]) -> u32 {
    // Skip hydrogen-only components; implicit hydrogens are already
    // excluded by construction.
    let heavy: Vec<usize> = component
        .iter()
        .copied()
        .filter(|&i| mol.atoms[i].kind.atomic_number() != Some(1))
        .collect();
    if heavy.is_empty() {
        return 0;
    }

    // Canonical ranks make the per-atom walk order-independent.
    let ranks = canonical_ranks(mol);
    let mut atom_hashes: Vec<u64> = heavy
        .iter()
        .map(|&i| {
            let atom = &mol.atoms[i];
            let mut h = Fnv1a::new();
            h.update(atom.kind.atomic_number().unwrap_or(0) as u64);
            h.update((atom.formal_charge as i64 + 16) as u64);
            h.update(atom.isotope.unwrap_or(0) as u64);
            h.update(atom.is_aromatic as u64);
            let mut nbr: Vec<u64> = mol
                .neighbors(i)
                .map(|(nb, bi)| {
                    ((mol.bonds[bi].order.code() as u64) << 32) ^ ranks[nb] as u64
                })
                .collect();
            nbr.sort_unstable();
            for v in nbr {
                h.update(v);
            }
            h.finish()
        })
        .collect();
    atom_hashes.sort_unstable();

    let mut h = Fnv1a::new();
    h.update(heavy.len() as u64);
    for v in atom_hashes {
        h.update(v);
    }
    h.finish() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn preparer() -> RecordPreparer {
        let dict = Arc::new(Mutex::new(LzwDict::new(crate::dict::DEFAULT_ALPHABET)));
        RecordPreparer::new(PrepareOptions::default(), dict)
    }

    #[test]
    fn prepare_simple_molecule() {
        let p = preparer();
        let rec = p.prepare(7, b"CCO").unwrap();
        assert_eq!(rec.id, 7);
        assert!(!rec.blob.is_empty());
        assert!(rec.fingerprint.is_some());
        assert_eq!(rec.gross, "C2H6O");
        assert!((rec.mass - 46.07).abs() < 0.05);
        assert!(rec.coords.is_none());
    }

    #[test]
    fn prepare_grows_shared_dictionary() {
        let dict = Arc::new(Mutex::new(LzwDict::new(crate::dict::DEFAULT_ALPHABET)));
        let p = RecordPreparer::new(PrepareOptions::default(), dict.clone());
        let before = dict.lock().code_count();
        p.prepare(0, b"C1CCCCC1CCCC").unwrap();
        assert!(dict.lock().code_count() > before);
    }

    #[test]
    fn malformed_record_is_recoverable() {
        let p = preparer();
        let err = p.prepare(1, b"not-a-molecule").unwrap_err();
        assert!(err.is_record_level(), "{err}");
    }

    #[test]
    fn reject_invalid_escalates() {
        // Carbon with five bonds fails the valence check.
        let bad = b"C(C)(C)(C)(C)C";
        let p = preparer();
        assert!(p.prepare(0, bad).unwrap_err().is_record_level());

        let dict = Arc::new(Mutex::new(LzwDict::new(crate::dict::DEFAULT_ALPHABET)));
        let strict = RecordPreparer::new(
            PrepareOptions { reject_invalid: true, ..Default::default() },
            dict,
        );
        assert!(!strict.prepare(0, bad).unwrap_err().is_record_level());
    }

    #[test]
    fn kekule_input_is_aromatized() {
        let p = preparer();
        let rec = p.prepare(0, b"C1=CC=CC=C1").unwrap();
        let aromatic = p.prepare(1, b"c1ccccc1").unwrap();
        assert_eq!(
            rec.fingerprint.as_ref().map(|f| f.as_bytes()),
            aromatic.fingerprint.as_ref().map(|f| f.as_bytes())
        );
        assert_eq!(rec.hash, aromatic.hash);
    }

    #[test]
    fn atom_maps_stripped_for_molecules() {
        // Fresh dictionaries so the two blobs are byte-comparable.
        let rec = preparer().prepare(0, b"[CH3:4]O").unwrap();
        let plain = preparer().prepare(1, b"CO").unwrap();
        assert_eq!(rec.hash, plain.hash);
        assert_eq!(rec.blob, plain.blob);
    }

    #[test]
    fn content_hash_follows_the_blob() {
        let a = preparer().prepare(0, b"CCO").unwrap();
        let b = preparer().prepare(1, b"CCO").unwrap();
        let c = preparer().prepare(2, b"CCC").unwrap();
        assert_eq!(a.content_hash(), b.content_hash());
        assert_ne!(a.content_hash(), c.content_hash());
    }

    #[test]
    fn skip_fingerprint_option() {
        let dict = Arc::new(Mutex::new(LzwDict::new(crate::dict::DEFAULT_ALPHABET)));
        let p = RecordPreparer::new(
            PrepareOptions { skip_fingerprint: true, ..Default::default() },
            dict,
        );
        assert!(p.prepare(0, b"CCO").unwrap().fingerprint.is_none());
    }

    #[test]
    fn hash_ignores_component_order() {
        let p = preparer();
        let a = p.prepare(0, b"CCO.c1ccccc1").unwrap();
        let b = p.prepare(1, b"c1ccccc1.CCO").unwrap();
        assert_eq!(a.hash, b.hash);
    }

    #[test]
    fn reaction_record_prepares() {
        let dict = Arc::new(Mutex::new(LzwDict::new(crate::dict::DEFAULT_ALPHABET)));
        let p = RecordPreparer::new(
            PrepareOptions { keep_atom_maps: true, ..Default::default() },
            dict,
        );
        let rec = p.prepare(0, b"[CH3:1][OH:2]>>[CH3:1][OH:2]").unwrap();
        assert!(!rec.blob.is_empty());
        assert!(rec.fingerprint.is_some());
    }
}
