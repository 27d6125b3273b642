//! Ring normalization: detect aromatic rings written in Kekulé form and
//! rewrite them to aromatic atoms and bonds.
//!
//! Both indexed records and incoming queries pass through this step so
//! that `C1=CC=CC=C1` and `c1ccccc1` produce identical features. The
//! detection is Hückel-style over SSSR rings: a ring is aromatized when
//! every member is sp2-capable and the pi-electron count is 4n+2.

use crate::molecule::{BondOrder, Molecule};
use crate::ring::find_sssr;

/// Rewrite Kekulé aromatic rings in place. Returns the number of rings
/// converted; idempotent, so a second call always returns zero.
pub fn aromatize(mol: &mut Molecule) -> usize {
    let rings = find_sssr(mol);
    let mut converted = 0;

    // Fused systems may need another pass once a neighboring ring has
    // been marked (e.g. azulene-like perimeters), so iterate to a fixed
    // point over the ring set.
    loop {
        let mut changed = false;
        for ring in &rings {
            if ring_is_marked(mol, ring) {
                continue;
            }
            if !ring_is_aromatic(mol, ring) {
                continue;
            }
            mark_ring(mol, ring);
            converted += 1;
            changed = true;
        }
        if !changed {
            break;
        }
    }
    converted
}

fn ring_is_marked(mol: &Molecule, ring: &[usize]) -> bool {
    ring_bonds(mol, ring).all(|b| mol.bonds[b].order == BondOrder::Aromatic)
}

fn ring_is_aromatic(mol: &Molecule, ring: &[usize]) -> bool {
    let mut pi_electrons = 0usize;
    for (pos, &atom_idx) in ring.iter().enumerate() {
        let prev = ring[(pos + ring.len() - 1) % ring.len()];
        let next = ring[(pos + 1) % ring.len()];
        match pi_contribution(mol, atom_idx, prev, next) {
            Some(n) => pi_electrons += n,
            None => return false,
        }
    }
    pi_electrons >= 2 && (pi_electrons - 2) % 4 == 0
}

/// Pi electrons an atom donates to the ring, or `None` when the atom
/// cannot sit in an aromatic ring at all.
fn pi_contribution(mol: &Molecule, atom_idx: usize, ring_prev: usize, ring_next: usize) -> Option<usize> {
    let atom = &mol.atoms[atom_idx];

    // sp3 centers with four sigma neighbors break conjugation.
    if mol.degree(atom_idx) + atom.implicit_hydrogens as usize > 3 {
        return None;
    }

    let mut double_in_ring = false;
    let mut double_outside = false;
    for (nbr, bond_idx) in mol.neighbors(atom_idx) {
        let order = mol.bonds[bond_idx].order;
        match order {
            BondOrder::Double => {
                if nbr == ring_prev || nbr == ring_next {
                    double_in_ring = true;
                } else {
                    double_outside = true;
                }
            }
            BondOrder::Triple => return None,
            BondOrder::Single | BondOrder::Aromatic => {}
        }
    }

    if double_in_ring || atom.is_aromatic {
        return Some(1);
    }
    if double_outside {
        // Exocyclic double bond (e.g. the carbonyl carbon of pyranones)
        // keeps the center sp2 but donates nothing.
        return Some(0);
    }

    // Saturated heteroatom with a lone pair: pyrrole N, furan O,
    // thiophene S. Carbanions are out of scope, plain carbon fails.
    match atom.kind.atomic_number() {
        Some(7) | Some(8) | Some(16) => Some(2),
        Some(15) => Some(2),
        _ => None,
    }
}

fn mark_ring(mol: &mut Molecule, ring: &[usize]) {
    for &atom_idx in ring {
        mol.atoms[atom_idx].is_aromatic = true;
    }
    let bonds: Vec<usize> = ring_bonds(mol, ring).collect();
    for bond_idx in bonds {
        mol.bonds[bond_idx].order = BondOrder::Aromatic;
    }
}

fn ring_bonds<'a>(mol: &'a Molecule, ring: &'a [usize]) -> impl Iterator<Item = usize> + 'a {
    ring.iter().enumerate().filter_map(move |(pos, &a)| {
        let b = ring[(pos + 1) % ring.len()];
        mol.bond_between(a, b)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smiles::parse_smiles;

    #[test]
    fn kekule_benzene_aromatizes() {
        let mut mol = parse_smiles("C1=CC=CC=C1").unwrap();
        assert_eq!(aromatize(&mut mol), 1);
        assert!(mol.atoms.iter().all(|a| a.is_aromatic));
        assert!(mol.bonds.iter().all(|b| b.order == BondOrder::Aromatic));
    }

    #[test]
    fn aromatize_is_idempotent() {
        let mut mol = parse_smiles("C1=CC=CC=C1").unwrap();
        aromatize(&mut mol);
        assert_eq!(aromatize(&mut mol), 0);
    }

    #[test]
    fn cyclohexane_untouched() {
        let mut mol = parse_smiles("C1CCCCC1").unwrap();
        assert_eq!(aromatize(&mut mol), 0);
        assert!(mol.atoms.iter().all(|a| !a.is_aromatic));
    }

    #[test]
    fn pyrrole_lone_pair_counts() {
        let mut mol = parse_smiles("C1=CC=C[NH]1").unwrap();
        assert_eq!(aromatize(&mut mol), 1);
        assert!(mol.atoms.iter().all(|a| a.is_aromatic));
    }

    #[test]
    fn pyridine_aromatizes() {
        let mut mol = parse_smiles("C1=CC=CC=N1").unwrap();
        assert_eq!(aromatize(&mut mol), 1);
    }

    #[test]
    fn cyclobutadiene_rejected() {
        // 4 pi electrons, antiaromatic.
        let mut mol = parse_smiles("C1=CC=C1").unwrap();
        assert_eq!(aromatize(&mut mol), 0);
    }

    #[test]
    fn naphthalene_both_rings() {
        let mut mol = parse_smiles("C1=CC=C2C=CC=CC2=C1").unwrap();
        assert!(aromatize(&mut mol) >= 2);
        assert!(mol.atoms.iter().all(|a| a.is_aromatic));
    }

    #[test]
    fn acyclic_double_bond_untouched() {
        let mut mol = parse_smiles("CC=O").unwrap();
        assert_eq!(aromatize(&mut mol), 0);
        assert_eq!(mol.bonds[1].order, BondOrder::Double);
    }
}
