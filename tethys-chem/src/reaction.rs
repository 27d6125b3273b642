//! Chemical reactions: ordered structure groups with atom-atom mapping.

use tethys_core::{Result, Summarizable, TethysError};

use crate::molecule::Molecule;

/// The role a molecule plays inside a reaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ReactionRole {
    Reactant,
    Product,
    Catalyst,
}

impl ReactionRole {
    pub fn code(self) -> u8 {
        match self {
            ReactionRole::Reactant => 0,
            ReactionRole::Product => 1,
            ReactionRole::Catalyst => 2,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(ReactionRole::Reactant),
            1 => Some(ReactionRole::Product),
            2 => Some(ReactionRole::Catalyst),
            _ => None,
        }
    }
}

/// A reaction: reactant, product, and catalyst groups in order, with
/// per-atom mapping numbers stored on the member molecules
/// ([`crate::Atom::atom_map`], 0 = unmapped) and reacting-center flags on
/// their bonds.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Reaction {
    pub name: String,
    pub molecules: Vec<(ReactionRole, Molecule)>,
}

impl Reaction {
    pub fn new(name: String) -> Self {
        Reaction { name, molecules: Vec::new() }
    }

    pub fn add(&mut self, role: ReactionRole, mol: Molecule) {
        self.molecules.push((role, mol));
    }

    pub fn count_of(&self, role: ReactionRole) -> usize {
        self.molecules.iter().filter(|(r, _)| *r == role).count()
    }

    pub fn molecules_of(&self, role: ReactionRole) -> impl Iterator<Item = &Molecule> {
        self.molecules
            .iter()
            .filter(move |(r, _)| *r == role)
            .map(|(_, m)| m)
    }

    /// Whether any member atom carries a mapping number.
    pub fn has_atom_maps(&self) -> bool {
        self.molecules.iter().any(|(_, m)| m.has_atom_maps())
    }

    /// The largest mapping number used, or 0 if unmapped.
    pub fn max_atom_map(&self) -> u16 {
        self.molecules
            .iter()
            .flat_map(|(_, m)| m.atoms.iter().map(|a| a.atom_map))
            .max()
            .unwrap_or(0)
    }

    /// Check the atom-atom mapping: every nonzero mapping number must
    /// occur at most once on each side, and a reactant-side number must
    /// have a product-side partner.
    pub fn check_aam(&self) -> Result<()> {
        let mut reactant_seen = std::collections::HashSet::new();
        let mut product_seen = std::collections::HashSet::new();
        for (role, mol) in &self.molecules {
            let seen = match role {
                ReactionRole::Reactant => &mut reactant_seen,
                ReactionRole::Product => &mut product_seen,
                ReactionRole::Catalyst => continue,
            };
            for atom in &mol.atoms {
                if atom.atom_map != 0 && !seen.insert(atom.atom_map) {
                    return Err(TethysError::Consistency(format!(
                        "duplicate atom map {} on one reaction side",
                        atom.atom_map
                    )));
                }
            }
        }
        for &map in &reactant_seen {
            if !product_seen.contains(&map) {
                return Err(TethysError::Consistency(format!(
                    "atom map {map} has no product partner"
                )));
            }
        }
        Ok(())
    }

    /// Run per-molecule consistency checks plus the AAM pairing check.
    pub fn check_consistency(&self) -> Result<()> {
        for (_, mol) in &self.molecules {
            mol.check_consistency()?;
        }
        self.check_aam()
    }
}

impl Summarizable for Reaction {
    fn summary(&self) -> String {
        format!(
            "{}: {} -> {} ({} catalysts)",
            if self.name.is_empty() { "Reaction" } else { &self.name },
            self.count_of(ReactionRole::Reactant),
            self.count_of(ReactionRole::Product),
            self.count_of(ReactionRole::Catalyst),
        )
    }
}

/// A structure record: one molecule, or one reaction.
///
/// The closed set of variants every index component dispatches on;
/// query-ness is a property of the contained graphs, not a separate type.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Structure {
    Molecule(Molecule),
    Reaction(Reaction),
}

impl Structure {
    pub fn is_reaction(&self) -> bool {
        matches!(self, Structure::Reaction(_))
    }

    /// All member molecules, in order (one for the molecule variant).
    pub fn members(&self) -> Vec<&Molecule> {
        match self {
            Structure::Molecule(m) => vec![m],
            Structure::Reaction(r) => r.molecules.iter().map(|(_, m)| m).collect(),
        }
    }

    pub fn members_mut(&mut self) -> Vec<&mut Molecule> {
        match self {
            Structure::Molecule(m) => vec![m],
            Structure::Reaction(r) => r.molecules.iter_mut().map(|(_, m)| m).collect(),
        }
    }

    pub fn check_consistency(&self) -> Result<()> {
        match self {
            Structure::Molecule(m) => m.check_consistency(),
            Structure::Reaction(r) => r.check_consistency(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smiles::parse_reaction_smiles;

    #[test]
    fn roles_are_ordered() {
        let rxn = parse_reaction_smiles("CCO.CC(=O)O>[H+]>CC(=O)OCC").unwrap();
        assert_eq!(rxn.count_of(ReactionRole::Reactant), 2);
        assert_eq!(rxn.count_of(ReactionRole::Catalyst), 1);
        assert_eq!(rxn.count_of(ReactionRole::Product), 1);
    }

    #[test]
    fn aam_pairing_rejects_orphans() {
        let rxn = parse_reaction_smiles("[CH3:1][OH:2]>>[CH3:1]O").unwrap();
        // Map 2 never shows up on the product side.
        assert!(rxn.check_aam().is_err());
    }

    #[test]
    fn aam_pairing_accepts_complete_map() {
        let rxn = parse_reaction_smiles("[CH3:1][OH:2]>>[CH3:1][OH:2]").unwrap();
        assert!(rxn.check_aam().is_ok());
        assert_eq!(rxn.max_atom_map(), 2);
    }

    #[test]
    fn duplicate_map_on_one_side_rejected() {
        let rxn = parse_reaction_smiles("[CH3:1].[CH4:1]>>[CH3:1]C").unwrap();
        assert!(rxn.check_aam().is_err());
    }
}
