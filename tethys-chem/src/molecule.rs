//! Molecular graph representation.
//!
//! The [`Molecule`] type is the structure every Tethys component operates
//! on: the SMILES reader produces it, the aromatizer and codec mutate and
//! serialize it, the fingerprint builder and matchers read it. Atoms can
//! carry a concrete element or a wildcard query constraint, so the same
//! graph type serves stored targets and compiled queries.

use tethys_core::{Annotated, Summarizable};

use crate::element::element_by_number;

/// What an atom node stands for: a concrete element, or a query wildcard
/// that matches any element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AtomKind {
    Element(u8),
    /// "Any atom" query constraint; only valid in query structures.
    Any,
}

impl AtomKind {
    pub fn atomic_number(&self) -> Option<u8> {
        match self {
            AtomKind::Element(n) => Some(*n),
            AtomKind::Any => None,
        }
    }
}

/// Bond order classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BondOrder {
    Single,
    Double,
    Triple,
    Aromatic,
}

impl BondOrder {
    /// Numeric bond order for valence calculations.
    pub fn as_f64(self) -> f64 {
        match self {
            BondOrder::Single => 1.0,
            BondOrder::Double => 2.0,
            BondOrder::Triple => 3.0,
            BondOrder::Aromatic => 1.5,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            BondOrder::Single => 1,
            BondOrder::Double => 2,
            BondOrder::Triple => 3,
            BondOrder::Aromatic => 4,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(BondOrder::Single),
            2 => Some(BondOrder::Double),
            3 => Some(BondOrder::Triple),
            4 => Some(BondOrder::Aromatic),
            _ => None,
        }
    }
}

/// Cis-trans bond direction (`/` and `\` in SMILES).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BondDirection {
    #[default]
    None,
    Up,
    Down,
}

/// Per-bond reacting-center classification inside a reaction.
///
/// `NotCenter` is the implied value for bonds the reaction does not
/// touch; it is absent from encoded blobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ReactingCenter {
    #[default]
    NotCenter,
    Unchanged,
    MadeOrBroken,
    OrderChanged,
}

impl ReactingCenter {
    pub fn code(self) -> u8 {
        match self {
            ReactingCenter::NotCenter => 0,
            ReactingCenter::Unchanged => 1,
            ReactingCenter::MadeOrBroken => 2,
            ReactingCenter::OrderChanged => 3,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(ReactingCenter::NotCenter),
            1 => Some(ReactingCenter::Unchanged),
            2 => Some(ReactingCenter::MadeOrBroken),
            3 => Some(ReactingCenter::OrderChanged),
            _ => None,
        }
    }
}

/// An atom in a molecular graph.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Atom {
    pub kind: AtomKind,
    pub formal_charge: i8,
    pub isotope: Option<u16>,
    /// Number of unpaired radical electrons.
    pub radical: u8,
    pub is_aromatic: bool,
    pub implicit_hydrogens: u8,
    /// Optional 3-D (or 2-D with z = 0) position.
    pub position: Option<[f32; 3]>,
    /// Atom-atom mapping number; 0 = unmapped.
    pub atom_map: u16,
}

impl Atom {
    /// A plain uncharged atom of the given element.
    pub fn of_element(atomic_number: u8) -> Self {
        Atom {
            kind: AtomKind::Element(atomic_number),
            formal_charge: 0,
            isotope: None,
            radical: 0,
            is_aromatic: false,
            implicit_hydrogens: 0,
            position: None,
            atom_map: 0,
        }
    }

    /// A wildcard query atom.
    pub fn any() -> Self {
        Atom { kind: AtomKind::Any, ..Atom::of_element(0) }
    }
}

/// A bond between two atoms.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Bond {
    pub atom1: usize,
    pub atom2: usize,
    pub order: BondOrder,
    pub direction: BondDirection,
    pub reacting_center: ReactingCenter,
}

impl Bond {
    pub fn new(atom1: usize, atom2: usize, order: BondOrder) -> Self {
        Bond { atom1, atom2, order, direction: BondDirection::None, reacting_center: ReactingCenter::NotCenter }
    }

    /// The endpoint opposite to `atom_idx`.
    pub fn other(&self, atom_idx: usize) -> usize {
        if self.atom1 == atom_idx {
            self.atom2
        } else {
            self.atom1
        }
    }
}

/// A molecular graph with atoms, bonds, and adjacency information.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Molecule {
    pub name: String,
    pub atoms: Vec<Atom>,
    pub bonds: Vec<Bond>,
    /// adjacency[atom_idx] = Vec<(neighbor_atom_idx, bond_idx)>
    pub adjacency: Vec<Vec<(usize, usize)>>,
}

impl Molecule {
    /// Create a molecule, building the adjacency list from atoms and bonds.
    pub fn new(name: String, atoms: Vec<Atom>, bonds: Vec<Bond>) -> Self {
        let mut adjacency = vec![Vec::new(); atoms.len()];
        for (bi, bond) in bonds.iter().enumerate() {
            adjacency[bond.atom1].push((bond.atom2, bi));
            adjacency[bond.atom2].push((bond.atom1, bi));
        }
        Molecule { name, atoms, bonds, adjacency }
    }

    /// Append an atom, returning its index.
    pub fn add_atom(&mut self, atom: Atom) -> usize {
        self.atoms.push(atom);
        self.adjacency.push(Vec::new());
        self.atoms.len() - 1
    }

    /// Append a bond, returning its index.
    pub fn add_bond(&mut self, bond: Bond) -> usize {
        let bi = self.bonds.len();
        self.adjacency[bond.atom1].push((bond.atom2, bi));
        self.adjacency[bond.atom2].push((bond.atom1, bi));
        self.bonds.push(bond);
        bi
    }

    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    pub fn bond_count(&self) -> usize {
        self.bonds.len()
    }

    /// Number of non-hydrogen atoms.
    pub fn heavy_atom_count(&self) -> usize {
        self.atoms
            .iter()
            .filter(|a| a.kind != AtomKind::Element(1))
            .count()
    }

    /// Neighbor (atom index, bond index) pairs for a given atom.
    pub fn neighbors(&self, atom_idx: usize) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.adjacency[atom_idx].iter().copied()
    }

    /// Graph degree of an atom (number of explicit bonds).
    pub fn degree(&self, atom_idx: usize) -> usize {
        self.adjacency[atom_idx].len()
    }

    /// Find the index of the bond between two atoms, if any.
    pub fn bond_between(&self, a1: usize, a2: usize) -> Option<usize> {
        self.adjacency[a1]
            .iter()
            .find(|&&(n, _)| n == a2)
            .map(|&(_, bi)| bi)
    }

    /// Sum of bond orders at an atom, rounded to the nearest integer.
    pub fn bond_order_sum(&self, atom_idx: usize) -> u8 {
        let v: f64 = self.adjacency[atom_idx]
            .iter()
            .map(|&(_, bi)| self.bonds[bi].order.as_f64())
            .sum();
        v.round() as u8
    }

    /// Whether any atom carries a query constraint.
    pub fn has_query_features(&self) -> bool {
        self.atoms.iter().any(|a| a.kind == AtomKind::Any)
    }

    /// Whether any atom has a coordinate block.
    pub fn has_coordinates(&self) -> bool {
        self.atoms.iter().any(|a| a.position.is_some())
    }

    /// Whether any atom carries an atom-map number.
    pub fn has_atom_maps(&self) -> bool {
        self.atoms.iter().any(|a| a.atom_map != 0)
    }

    /// Clear all atom-map annotations.
    pub fn strip_atom_maps(&mut self) {
        for atom in &mut self.atoms {
            atom.atom_map = 0;
        }
    }

    /// Connected components as lists of atom indices, in first-seen order.
    pub fn connected_components(&self) -> Vec<Vec<usize>> {
        let n = self.atom_count();
        let mut visited = vec![false; n];
        let mut components = Vec::new();
        for start in 0..n {
            if visited[start] {
                continue;
            }
            let mut component = vec![start];
            visited[start] = true;
            let mut head = 0;
            while head < component.len() {
                let curr = component[head];
                head += 1;
                for &(nb, _) in &self.adjacency[curr] {
                    if !visited[nb] {
                        visited[nb] = true;
                        component.push(nb);
                    }
                }
            }
            components.push(component);
        }
        components
    }

    /// Run valence and stereo well-formedness checks.
    ///
    /// Charged atoms, radicals, and query wildcards are skipped; the
    /// check flags only states no neutral element can be in.
    pub fn check_consistency(&self) -> tethys_core::Result<()> {
        for (i, atom) in self.atoms.iter().enumerate() {
            if atom.formal_charge != 0 || atom.radical != 0 {
                continue;
            }
            let number = match atom.kind {
                AtomKind::Element(n) => n,
                AtomKind::Any => continue,
            };
            let Some(elem) = element_by_number(number) else {
                return Err(tethys_core::TethysError::Consistency(format!(
                    "atom {i}: unknown element {number}"
                )));
            };
            if elem.default_valence().is_none() {
                continue;
            }
            let total = self.bond_order_sum(i) + atom.implicit_hydrogens;
            // Aromatic atoms get one extra pi electron that the rounded
            // order sum may not capture; accept either interpretation.
            let ok = elem.valence_ok(total) || (atom.is_aromatic && elem.valence_ok(total + 1));
            if !ok {
                return Err(tethys_core::TethysError::Consistency(format!(
                    "atom {i} ({}): valence {total} not admissible",
                    elem.symbol
                )));
            }
        }
        for (bi, bond) in self.bonds.iter().enumerate() {
            if bond.direction != BondDirection::None {
                if bond.order != BondOrder::Single {
                    return Err(tethys_core::TethysError::Consistency(format!(
                        "bond {bi}: direction mark on non-single bond"
                    )));
                }
                let near_double = [bond.atom1, bond.atom2].iter().any(|&a| {
                    self.adjacency[a]
                        .iter()
                        .any(|&(_, other)| self.bonds[other].order == BondOrder::Double)
                });
                if !near_double {
                    return Err(tethys_core::TethysError::Consistency(format!(
                        "bond {bi}: direction mark with no adjacent double bond"
                    )));
                }
            }
        }
        Ok(())
    }
}

impl Annotated for Molecule {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Summarizable for Molecule {
    fn summary(&self) -> String {
        format!(
            "{}: {} atoms, {} bonds",
            if self.name.is_empty() { "Molecule" } else { &self.name },
            self.atom_count(),
            self.bond_count()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ethane() -> Molecule {
        let mut c0 = Atom::of_element(6);
        c0.implicit_hydrogens = 3;
        let mut c1 = Atom::of_element(6);
        c1.implicit_hydrogens = 3;
        Molecule::new(
            "ethane".into(),
            vec![c0, c1],
            vec![Bond::new(0, 1, BondOrder::Single)],
        )
    }

    #[test]
    fn construction_and_adjacency() {
        let mol = ethane();
        assert_eq!(mol.atom_count(), 2);
        assert_eq!(mol.bond_count(), 1);
        assert_eq!(mol.degree(0), 1);
        assert_eq!(mol.neighbors(0).collect::<Vec<_>>(), vec![(1, 0)]);
        assert!(mol.bond_between(0, 1).is_some());
    }

    #[test]
    fn incremental_build_matches_bulk() {
        let mut mol = Molecule::default();
        let a = mol.add_atom(Atom::of_element(6));
        let b = mol.add_atom(Atom::of_element(8));
        mol.add_bond(Bond::new(a, b, BondOrder::Double));
        assert_eq!(mol.bond_order_sum(a), 2);
        assert_eq!(mol.degree(b), 1);
    }

    #[test]
    fn components_of_salt() {
        let mut mol = Molecule::default();
        mol.add_atom(Atom::of_element(11));
        let c = mol.add_atom(Atom::of_element(6));
        let o = mol.add_atom(Atom::of_element(8));
        mol.add_bond(Bond::new(c, o, BondOrder::Single));
        let comps = mol.connected_components();
        assert_eq!(comps.len(), 2);
        assert_eq!(comps[0], vec![0]);
        assert_eq!(comps[1], vec![1, 2]);
    }

    #[test]
    fn valence_check_accepts_ethane() {
        assert!(ethane().check_consistency().is_ok());
    }

    #[test]
    fn valence_check_rejects_pentavalent_carbon() {
        let mut c = Atom::of_element(6);
        c.implicit_hydrogens = 5;
        let mol = Molecule::new("bad".into(), vec![c], vec![]);
        assert!(matches!(
            mol.check_consistency(),
            Err(tethys_core::TethysError::Consistency(_))
        ));
    }

    #[test]
    fn direction_mark_needs_double_bond() {
        let mut mol = Molecule::default();
        let a = mol.add_atom(Atom::of_element(6));
        let b = mol.add_atom(Atom::of_element(6));
        let mut bond = Bond::new(a, b, BondOrder::Single);
        bond.direction = BondDirection::Up;
        mol.add_bond(bond);
        assert!(mol.check_consistency().is_err());
    }

    #[test]
    fn strip_atom_maps_clears_all() {
        let mut mol = ethane();
        mol.atoms[0].atom_map = 3;
        assert!(mol.has_atom_maps());
        mol.strip_atom_maps();
        assert!(!mol.has_atom_maps());
    }
}
