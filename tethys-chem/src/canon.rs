//! Canonical atom ordering.
//!
//! Morgan-style iterative refinement: atoms start from an invariant
//! built from their local properties and are repeatedly re-ranked by
//! the sorted ranks of their neighbors until the partition stabilizes.
//! Remaining ties are broken deterministically, so two isomorphic
//! inputs with different atom numbering serialize to identical feature
//! streams.

use crate::molecule::Molecule;

/// Canonical rank per atom: a permutation of `0..atom_count`, stable
/// across input atom order for isomorphic graphs.
pub fn canonical_ranks(mol: &Molecule) -> Vec<usize> {
    let n = mol.atom_count();
    if n == 0 {
        return Vec::new();
    }

    let initial: Vec<u64> = (0..n).map(|i| initial_invariant(mol, i)).collect();
    let mut ranks = refine(mol, ranks_from_keys(&initial));

    // Symmetric atoms stay tied after refinement; split the lowest tied
    // class one member at a time and re-refine until ranks are unique.
    while count_classes(&ranks) < n {
        let promoted = lowest_tied_atom(&ranks);
        let mut keys: Vec<u64> = ranks.iter().map(|&r| (r as u64) << 1).collect();
        keys[promoted] |= 1;
        ranks = refine(mol, ranks_from_keys(&keys));
    }
    ranks
}

fn initial_invariant(mol: &Molecule, atom_idx: usize) -> u64 {
    let atom = &mol.atoms[atom_idx];
    let mut key: u64 = atom.kind.atomic_number().unwrap_or(0) as u64;
    key = key << 8 | mol.degree(atom_idx) as u64;
    key = key << 8 | (atom.formal_charge as i64 + 16) as u64;
    key = key << 8 | (atom.isotope.unwrap_or(0) as u64 & 0xff);
    key = key << 8 | atom.implicit_hydrogens as u64;
    key = key << 1 | atom.is_aromatic as u64;
    key = key << 8 | mol.bond_order_sum(atom_idx) as u64;
    key
}

/// Refine ranks by neighbor ranks until the class count stops growing.
fn refine(mol: &Molecule, mut ranks: Vec<usize>) -> Vec<usize> {
    let n = mol.atom_count();
    loop {
        let mut keys = vec![0u64; n];
        for i in 0..n {
            let mut nbr: Vec<usize> = mol.neighbors(i).map(|(nb, _)| ranks[nb]).collect();
            nbr.sort_unstable();
            let mut key = ranks[i] as u64;
            for r in nbr {
                key = key.wrapping_mul(1_000_003).wrapping_add(r as u64 + 1);
            }
            keys[i] = key;
        }
        let refined = ranks_from_keys(&keys);
        if count_classes(&refined) == count_classes(&ranks) {
            return refined;
        }
        ranks = refined;
    }
}

/// Dense ranks of a key vector (equal keys share a rank).
fn ranks_from_keys(keys: &[u64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..keys.len()).collect();
    order.sort_by_key(|&i| keys[i]);

    let mut ranks = vec![0usize; keys.len()];
    let mut rank = 0;
    for w in 0..order.len() {
        if w > 0 && keys[order[w]] != keys[order[w - 1]] {
            rank = w;
        }
        ranks[order[w]] = rank;
    }
    ranks
}

fn count_classes(ranks: &[usize]) -> usize {
    let mut seen = vec![false; ranks.len()];
    let mut count = 0;
    for &r in ranks {
        if !seen[r] {
            seen[r] = true;
            count += 1;
        }
    }
    count
}

/// First member of the smallest-ranked tied class.
fn lowest_tied_atom(ranks: &[usize]) -> usize {
    let mut best = 0;
    let mut best_rank = usize::MAX;
    for (i, &r) in ranks.iter().enumerate() {
        let class_size = ranks.iter().filter(|&&x| x == r).count();
        if class_size > 1 && r < best_rank {
            best_rank = r;
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smiles::parse_smiles;

    fn is_permutation(ranks: &[usize]) -> bool {
        let mut seen = vec![false; ranks.len()];
        for &r in ranks {
            if r >= ranks.len() || seen[r] {
                return false;
            }
            seen[r] = true;
        }
        true
    }

    #[test]
    fn ranks_are_a_permutation() {
        for smi in ["C", "CCO", "c1ccccc1", "CC(C)(C)C", "C1CC1CCl"] {
            let mol = parse_smiles(smi).unwrap();
            let ranks = canonical_ranks(&mol);
            assert!(is_permutation(&ranks), "{smi}");
        }
    }

    #[test]
    fn heteroatom_distinguished() {
        let mol = parse_smiles("CCO").unwrap();
        let ranks = canonical_ranks(&mol);
        // The oxygen cannot share a rank with either carbon.
        assert_ne!(ranks[2], ranks[0]);
        assert_ne!(ranks[2], ranks[1]);
    }

    #[test]
    fn isomorphic_inputs_same_canonical_order() {
        // Ethanol written from each end.
        let a = parse_smiles("CCO").unwrap();
        let b = parse_smiles("OCC").unwrap();
        assert_eq!(canonical_elements(&a), canonical_elements(&b));
    }

    fn canonical_elements(mol: &crate::Molecule) -> Vec<u8> {
        let ranks = canonical_ranks(mol);
        let mut order: Vec<usize> = (0..mol.atom_count()).collect();
        order.sort_by_key(|&i| ranks[i]);
        order
            .iter()
            .map(|&i| mol.atoms[i].kind.atomic_number().unwrap_or(0))
            .collect()
    }

    #[test]
    fn symmetric_atoms_tie_broken() {
        let mol = parse_smiles("c1ccccc1").unwrap();
        assert!(is_permutation(&canonical_ranks(&mol)));
    }
}
