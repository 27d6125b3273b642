//! Chemistry data model for the Tethys structure index.
//!
//! Provides the molecular graph and reaction representation, the SMILES
//! reader used by the record preparer and match session, ring perception,
//! aromatization, canonical atom ranking, and gross-formula handling.
//!
//! # Example
//!
//! ```
//! use tethys_chem::{parse_smiles, aromatize, gross_formula};
//!
//! let mut mol = parse_smiles("C1=CC=CC=C1").unwrap();
//! aromatize(&mut mol);
//! assert!(mol.atoms.iter().all(|a| a.is_aromatic));
//! assert_eq!(gross_formula(&mol).hill_string(), "C6H6");
//! ```

pub mod aromatize;
pub mod canon;
pub mod element;
pub mod formula;
pub mod molecule;
pub mod reaction;
pub mod ring;
pub mod smiles;

pub use aromatize::aromatize;
pub use canon::canonical_ranks;
pub use element::{element_by_number, element_by_symbol, Element};
pub use formula::{
    gross_formula, molecular_mass, structure_gross_formula, GrossFormula, GrossOp, GrossQuery,
};
pub use molecule::{Atom, AtomKind, Bond, BondDirection, BondOrder, Molecule, ReactingCenter};
pub use reaction::{Reaction, ReactionRole, Structure};
pub use smiles::{
    parse_reaction_smiles, parse_record, parse_smiles, parse_smiles_with, ParsedRecord,
    SmilesOptions,
};
