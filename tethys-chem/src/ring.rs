//! Ring perception (smallest set of smallest rings).

use std::collections::VecDeque;

use crate::molecule::Molecule;

/// Find the smallest set of smallest rings in a molecule.
///
/// For every ring bond, the shortest cycle through it is located by a
/// BFS that avoids the bond itself; duplicates are removed and the set
/// is trimmed to the cyclomatic count `bonds - atoms + components`.
pub fn find_sssr(mol: &Molecule) -> Vec<Vec<usize>> {
    let expected = mol.bond_count() as isize - mol.atom_count() as isize
        + mol.connected_components().len() as isize;
    if expected <= 0 {
        return Vec::new();
    }

    let in_ring = ring_atom_mask(mol);
    let mut rings: Vec<Vec<usize>> = Vec::new();

    for (bi, bond) in mol.bonds.iter().enumerate() {
        if !in_ring[bond.atom1] || !in_ring[bond.atom2] {
            continue;
        }
        if let Some(mut ring) = shortest_path_avoiding(mol, bond.atom1, bond.atom2, bi, &in_ring) {
            normalize_ring(&mut ring);
            if !rings.contains(&ring) {
                rings.push(ring);
            }
        }
    }

    rings.sort_by_key(|r| r.len());
    rings.truncate(expected as usize);
    rings
}

/// Per-atom flag: part of at least one ring.
///
/// Computed by iteratively pruning degree-<=1 atoms; whatever survives
/// lies on a cycle.
pub fn ring_atom_mask(mol: &Molecule) -> Vec<bool> {
    let n = mol.atom_count();
    let mut degree: Vec<usize> = (0..n).map(|i| mol.degree(i)).collect();
    let mut pruned = vec![false; n];
    let mut queue: VecDeque<usize> = (0..n).filter(|&i| degree[i] <= 1).collect();

    while let Some(atom) = queue.pop_front() {
        if pruned[atom] {
            continue;
        }
        pruned[atom] = true;
        for &(nb, _) in &mol.adjacency[atom] {
            if !pruned[nb] {
                degree[nb] -= 1;
                if degree[nb] <= 1 {
                    queue.push_back(nb);
                }
            }
        }
    }

    pruned.into_iter().map(|p| !p).collect()
}

/// Per-bond flag: both endpoints are ring atoms and the bond closes a cycle.
pub fn ring_bond_mask(mol: &Molecule) -> Vec<bool> {
    let atoms = ring_atom_mask(mol);
    mol.bonds
        .iter()
        .map(|b| atoms[b.atom1] && atoms[b.atom2])
        .collect()
}

fn shortest_path_avoiding(
    mol: &Molecule,
    start: usize,
    end: usize,
    excluded_bond: usize,
    in_ring: &[bool],
) -> Option<Vec<usize>> {
    let n = mol.atom_count();
    let mut parent = vec![usize::MAX; n];
    let mut seen = vec![false; n];
    let mut queue = VecDeque::new();
    seen[start] = true;
    queue.push_back(start);

    while let Some(curr) = queue.pop_front() {
        if curr == end {
            let mut path = vec![end];
            let mut node = end;
            while node != start {
                node = parent[node];
                path.push(node);
            }
            path.reverse();
            return Some(path);
        }
        for &(nb, bi) in &mol.adjacency[curr] {
            if bi == excluded_bond || seen[nb] || !in_ring[nb] {
                continue;
            }
            seen[nb] = true;
            parent[nb] = curr;
            queue.push_back(nb);
        }
    }
    None
}

/// Rotate/reflect a ring so equal rings compare equal: smallest atom
/// first, then the direction with the smaller second element.
fn normalize_ring(ring: &mut Vec<usize>) {
    if ring.is_empty() {
        return;
    }
    let min_pos = ring.iter().enumerate().min_by_key(|&(_, &v)| v).map(|(i, _)| i).unwrap_or(0);
    ring.rotate_left(min_pos);
    if ring.len() > 2 && ring[ring.len() - 1] < ring[1] {
        ring[1..].reverse();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smiles::parse_smiles;

    #[test]
    fn benzene_one_ring() {
        let mol = parse_smiles("c1ccccc1").unwrap();
        let rings = find_sssr(&mol);
        assert_eq!(rings.len(), 1);
        assert_eq!(rings[0].len(), 6);
    }

    #[test]
    fn naphthalene_two_rings() {
        let mol = parse_smiles("c1ccc2ccccc2c1").unwrap();
        let rings = find_sssr(&mol);
        assert_eq!(rings.len(), 2);
        assert!(rings.iter().all(|r| r.len() == 6));
    }

    #[test]
    fn chain_has_no_rings() {
        let mol = parse_smiles("CCCC").unwrap();
        assert!(find_sssr(&mol).is_empty());
        assert!(ring_bond_mask(&mol).iter().all(|&b| !b));
    }

    #[test]
    fn spiro_rings_share_one_atom() {
        // Spiro system: two rings sharing a single atom.
        let mol = parse_smiles("C1CCC2(CC1)CCCC2").unwrap();
        let rings = find_sssr(&mol);
        assert_eq!(rings.len(), 2);
    }
}
