//! SMILES reader for molecules and reactions.
//!
//! This is the auto-detecting text reader the record preparer and match
//! session consume: `A>B>C` input produces a [`Reaction`], everything
//! else a [`Molecule`]. Beyond plain connectivity it understands bracket
//! atoms (isotope, charge, explicit hydrogens, atom maps), cis-trans
//! direction marks, the `*` wildcard, and multi-fragment input.

use std::collections::BTreeMap;

use tethys_core::{Result, TethysError};

use crate::element::element_by_symbol;
use crate::molecule::{Atom, Bond, BondDirection, BondOrder, Molecule};
use crate::reaction::{Reaction, ReactionRole, Structure};
use crate::ring::ring_bond_mask;

/// Reader behavior switches; index-wide configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct SmilesOptions {
    /// Parse unknown element symbols as wildcard query atoms instead of failing.
    pub treat_unknown_as_wildcard: bool,
    /// Accept ring-closure bonds whose two direction marks disagree.
    pub ignore_closing_bond_direction_mismatch: bool,
}

/// A parsed record plus what the reader learned about its normalization
/// state.
#[derive(Debug, Clone)]
pub struct ParsedRecord {
    pub structure: Structure,
    /// True when aromatization would be a no-op (no Kekulé ring bonds),
    /// letting the match session skip renormalization.
    pub already_aromatic: bool,
}

/// Parse a SMILES string into a `Molecule` with default options.
pub fn parse_smiles(smiles: &str) -> Result<Molecule> {
    parse_smiles_with(smiles, SmilesOptions::default())
}

/// Parse a SMILES string into a `Molecule`.
pub fn parse_smiles_with(smiles: &str, options: SmilesOptions) -> Result<Molecule> {
    let mut parser = SmilesParser::new(smiles, options);
    parser.run()?;
    parser.finish()
}

/// Parse reaction SMILES (`reactants>agents>products`).
pub fn parse_reaction_smiles(text: &str) -> Result<Reaction> {
    parse_reaction_smiles_with(text, SmilesOptions::default())
}

/// Parse reaction SMILES with explicit options. Agents between the two
/// `>` separators become catalysts.
pub fn parse_reaction_smiles_with(text: &str, options: SmilesOptions) -> Result<Reaction> {
    let parts: Vec<&str> = text.split('>').collect();
    if parts.len() != 3 {
        return Err(TethysError::Parse(format!(
            "reaction SMILES needs exactly two '>' separators, found {}",
            parts.len().saturating_sub(1)
        )));
    }
    let mut rxn = Reaction::new(String::new());
    let roles = [ReactionRole::Reactant, ReactionRole::Catalyst, ReactionRole::Product];
    for (part, role) in parts.iter().zip(roles) {
        for component in part.split('.') {
            let component = component.trim();
            if component.is_empty() {
                continue;
            }
            rxn.add(role, parse_smiles_with(component, options)?);
        }
    }
    if rxn.count_of(ReactionRole::Reactant) == 0 && rxn.count_of(ReactionRole::Product) == 0 {
        return Err(TethysError::Parse("empty reaction".into()));
    }
    Ok(rxn)
}

/// Auto-detecting reader over raw record bytes.
pub fn parse_record(raw: &[u8], options: SmilesOptions) -> Result<ParsedRecord> {
    let text = std::str::from_utf8(raw)
        .map_err(|_| TethysError::Parse("record is not valid UTF-8".into()))?
        .trim();
    if text.is_empty() {
        return Err(TethysError::Parse("empty record".into()));
    }
    let structure = if text.contains('>') {
        Structure::Reaction(parse_reaction_smiles_with(text, options)?)
    } else {
        Structure::Molecule(parse_smiles_with(text, options)?)
    };
    let already_aromatic = structure.members().iter().all(|m| is_kekule_free(m));
    Ok(ParsedRecord { structure, already_aromatic })
}

/// No double/triple bonds on rings, so ring normalization cannot change
/// the graph.
fn is_kekule_free(mol: &Molecule) -> bool {
    let ring_bonds = ring_bond_mask(mol);
    mol.bonds
        .iter()
        .zip(&ring_bonds)
        .all(|(b, &in_ring)| !in_ring || matches!(b.order, BondOrder::Single | BondOrder::Aromatic))
}

struct SmilesParser<'a> {
    input: &'a [u8],
    pos: usize,
    options: SmilesOptions,
    atoms: Vec<Atom>,
    bonds: Vec<Bond>,
    /// Bracket atoms carry their hydrogen count explicitly.
    explicit_h: Vec<bool>,
    /// ring_closures[number] = (atom_idx, pending order, pending direction)
    ring_closures: BTreeMap<u16, (usize, Option<BondOrder>, BondDirection)>,
    stack: Vec<usize>,
    prev_atom: Option<usize>,
    pending_bond: Option<BondOrder>,
    pending_direction: BondDirection,
}

impl<'a> SmilesParser<'a> {
    fn new(input: &'a str, options: SmilesOptions) -> Self {
        SmilesParser {
            input: input.trim().as_bytes(),
            pos: 0,
            options,
            atoms: Vec::new(),
            bonds: Vec::new(),
            explicit_h: Vec::new(),
            ring_closures: BTreeMap::new(),
            stack: Vec::new(),
            prev_atom: None,
            pending_bond: None,
            pending_direction: BondDirection::None,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let ch = self.peek();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn run(&mut self) -> Result<()> {
        while let Some(ch) = self.peek() {
            match ch {
                b'(' => {
                    self.advance();
                    if let Some(prev) = self.prev_atom {
                        self.stack.push(prev);
                    }
                }
                b')' => {
                    self.advance();
                    self.prev_atom = self.stack.pop();
                    self.pending_bond = None;
                    self.pending_direction = BondDirection::None;
                }
                b'-' => {
                    self.advance();
                    self.pending_bond = Some(BondOrder::Single);
                }
                b'=' => {
                    self.advance();
                    self.pending_bond = Some(BondOrder::Double);
                }
                b'#' => {
                    self.advance();
                    self.pending_bond = Some(BondOrder::Triple);
                }
                b':' => {
                    self.advance();
                    self.pending_bond = Some(BondOrder::Aromatic);
                }
                b'/' => {
                    self.advance();
                    self.pending_bond = Some(BondOrder::Single);
                    self.pending_direction = BondDirection::Up;
                }
                b'\\' => {
                    self.advance();
                    self.pending_bond = Some(BondOrder::Single);
                    self.pending_direction = BondDirection::Down;
                }
                b'%' => {
                    self.advance();
                    let number = self.two_digit_ring_number()?;
                    self.ring_closure(number)?;
                }
                b'[' => self.bracket_atom()?,
                b'*' => {
                    self.advance();
                    self.push_atom(Atom::any(), true)?;
                }
                b'.' => {
                    self.advance();
                    self.prev_atom = None;
                    self.pending_bond = None;
                    self.pending_direction = BondDirection::None;
                }
                ch if ch.is_ascii_digit() => {
                    self.advance();
                    self.ring_closure((ch - b'0') as u16)?;
                }
                ch if is_organic_start(ch) => self.organic_atom()?,
                ch => {
                    return Err(TethysError::Parse(format!(
                        "unexpected character '{}' at position {}",
                        ch as char, self.pos
                    )));
                }
            }
        }
        Ok(())
    }

    fn organic_atom(&mut self) -> Result<()> {
        let Some(ch) = self.advance() else {
            return Err(TethysError::Parse("truncated input".into()));
        };
        let is_aromatic = ch.is_ascii_lowercase();
        let upper = ch.to_ascii_uppercase();

        // Two-letter organic-subset symbols are never aromatic.
        let symbol: &str = match upper {
            b'B' if !is_aromatic && self.peek() == Some(b'r') => {
                self.advance();
                "Br"
            }
            b'C' if !is_aromatic && self.peek() == Some(b'l') => {
                self.advance();
                "Cl"
            }
            b'B' => "B",
            b'C' => "C",
            b'N' => "N",
            b'O' => "O",
            b'P' => "P",
            b'S' => "S",
            b'F' => "F",
            b'I' => "I",
            _ => {
                return Err(TethysError::Parse(format!(
                    "unknown organic-subset atom '{}'",
                    upper as char
                )))
            }
        };

        let elem = element_by_symbol(symbol)
            .ok_or_else(|| TethysError::Parse(format!("unknown element '{symbol}'")))?;
        let mut atom = Atom::of_element(elem.atomic_number);
        atom.is_aromatic = is_aromatic;
        self.push_atom(atom, false)
    }

    fn bracket_atom(&mut self) -> Result<()> {
        self.advance(); // '['

        let isotope = self.optional_number();

        let ch = self
            .advance()
            .ok_or_else(|| TethysError::Parse("unterminated bracket atom".into()))?;

        let mut atom = if ch == b'*' {
            Atom::any()
        } else {
            let is_aromatic = ch.is_ascii_lowercase();
            let upper = ch.to_ascii_uppercase();
            let symbol = match self.peek() {
                Some(next) if next.is_ascii_lowercase() && next != b'h' => {
                    let two = format!("{}{}", upper as char, next as char);
                    if element_by_symbol(&two).is_some() {
                        self.advance();
                        two
                    } else {
                        String::from(upper as char)
                    }
                }
                _ => String::from(upper as char),
            };
            match element_by_symbol(&symbol) {
                Some(elem) => {
                    let mut a = Atom::of_element(elem.atomic_number);
                    a.is_aromatic = is_aromatic;
                    a
                }
                None if self.options.treat_unknown_as_wildcard => Atom::any(),
                None => {
                    return Err(TethysError::Parse(format!("unknown element '{symbol}'")))
                }
            }
        };
        atom.isotope = isotope.map(|n| n as u16);

        // Tetrahedral markers are accepted and dropped; stereo centers
        // are out of the index core's scope.
        while self.peek() == Some(b'@') {
            self.advance();
        }

        if self.peek() == Some(b'H') {
            self.advance();
            atom.implicit_hydrogens = match self.peek() {
                Some(d) if d.is_ascii_digit() => {
                    self.advance();
                    d - b'0'
                }
                _ => 1,
            };
        }

        atom.formal_charge = self.optional_charge();

        if self.peek() == Some(b':') {
            self.advance();
            let map = self
                .optional_number()
                .ok_or_else(|| TethysError::Parse("expected digits after ':'".into()))?;
            atom.atom_map = map as u16;
        }

        if self.advance() != Some(b']') {
            return Err(TethysError::Parse("expected ']' in bracket atom".into()));
        }

        self.push_atom(atom, true)
    }

    fn optional_charge(&mut self) -> i8 {
        let sign: i8 = match self.peek() {
            Some(b'+') => 1,
            Some(b'-') => -1,
            _ => return 0,
        };
        self.advance();
        match self.peek() {
            Some(d) if d.is_ascii_digit() => {
                self.advance();
                sign * (d - b'0') as i8
            }
            Some(c) if c == if sign > 0 { b'+' } else { b'-' } => {
                let mut magnitude = 1i8;
                while self.peek() == Some(c) {
                    self.advance();
                    magnitude += 1;
                }
                sign * magnitude
            }
            _ => sign,
        }
    }

    fn optional_number(&mut self) -> Option<u32> {
        let mut n: u32 = 0;
        let mut found = false;
        while let Some(ch) = self.peek() {
            if !ch.is_ascii_digit() {
                break;
            }
            self.advance();
            n = n * 10 + (ch - b'0') as u32;
            found = true;
        }
        found.then_some(n)
    }

    fn two_digit_ring_number(&mut self) -> Result<u16> {
        let d1 = self.advance();
        let d2 = self.advance();
        match (d1, d2) {
            (Some(a), Some(b)) if a.is_ascii_digit() && b.is_ascii_digit() => {
                Ok((a - b'0') as u16 * 10 + (b - b'0') as u16)
            }
            _ => Err(TethysError::Parse("expected two digits after '%'".into())),
        }
    }

    fn ring_closure(&mut self, number: u16) -> Result<()> {
        let current = self
            .prev_atom
            .ok_or_else(|| TethysError::Parse("ring closure without preceding atom".into()))?;

        if let Some((open_atom, open_order, open_dir)) = self.ring_closures.remove(&number) {
            if open_dir != BondDirection::None
                && self.pending_direction != BondDirection::None
                && open_dir == self.pending_direction
                && !self.options.ignore_closing_bond_direction_mismatch
            {
                return Err(TethysError::Parse(format!(
                    "conflicting direction marks on ring closure {number}"
                )));
            }
            let order = self.pending_bond.take().or(open_order).unwrap_or_else(|| {
                if self.atoms[open_atom].is_aromatic && self.atoms[current].is_aromatic {
                    BondOrder::Aromatic
                } else {
                    BondOrder::Single
                }
            });
            let mut bond = Bond::new(open_atom, current, order);
            bond.direction = if open_dir != BondDirection::None { open_dir } else { self.pending_direction };
            self.bonds.push(bond);
            self.pending_direction = BondDirection::None;
        } else {
            self.ring_closures.insert(
                number,
                (current, self.pending_bond.take(), std::mem::take(&mut self.pending_direction)),
            );
        }
        Ok(())
    }

    fn push_atom(&mut self, atom: Atom, explicit_h: bool) -> Result<()> {
        let idx = self.atoms.len();
        self.atoms.push(atom);
        self.explicit_h.push(explicit_h);

        if let Some(prev) = self.prev_atom {
            let both_aromatic = self.atoms[prev].is_aromatic && self.atoms[idx].is_aromatic;
            let order = self
                .pending_bond
                .take()
                .unwrap_or(if both_aromatic { BondOrder::Aromatic } else { BondOrder::Single });
            let mut bond = Bond::new(prev, idx, order);
            bond.direction = std::mem::take(&mut self.pending_direction);
            self.bonds.push(bond);
        } else {
            self.pending_bond = None;
            self.pending_direction = BondDirection::None;
        }
        self.prev_atom = Some(idx);
        Ok(())
    }

    fn finish(mut self) -> Result<Molecule> {
        if !self.ring_closures.is_empty() {
            let open: Vec<u16> = self.ring_closures.keys().copied().collect();
            return Err(TethysError::Parse(format!("unmatched ring closure(s): {open:?}")));
        }
        if !self.stack.is_empty() {
            return Err(TethysError::Parse(format!(
                "{} unmatched '(' in SMILES",
                self.stack.len()
            )));
        }
        if self.atoms.is_empty() {
            return Err(TethysError::Parse("no atoms in SMILES".into()));
        }
        self.fill_implicit_hydrogens();
        Ok(Molecule::new(String::new(), self.atoms, self.bonds))
    }

    /// Fill organic-subset atoms up to their default valence; bracket
    /// atoms already carry an explicit count.
    fn fill_implicit_hydrogens(&mut self) {
        for i in 0..self.atoms.len() {
            if self.explicit_h[i] {
                continue;
            }
            let Some(number) = self.atoms[i].kind.atomic_number() else {
                continue;
            };
            let Some(target) = crate::element::element_by_number(number)
                .and_then(|e| e.default_valence())
            else {
                continue;
            };
            let (available, used) = if self.atoms[i].is_aromatic {
                // One electron sits in the pi system; aromatic bonds
                // count as one sigma bond each.
                (target.saturating_sub(1) as usize, self.degree(i))
            } else {
                (target as usize, self.order_sum(i))
            };
            if available > used {
                self.atoms[i].implicit_hydrogens = (available - used) as u8;
            }
        }
    }

    fn degree(&self, atom_idx: usize) -> usize {
        self.bonds
            .iter()
            .filter(|b| b.atom1 == atom_idx || b.atom2 == atom_idx)
            .count()
    }

    fn order_sum(&self, atom_idx: usize) -> usize {
        let v: f64 = self
            .bonds
            .iter()
            .filter(|b| b.atom1 == atom_idx || b.atom2 == atom_idx)
            .map(|b| b.order.as_f64())
            .sum();
        v.round() as usize
    }
}

fn is_organic_start(ch: u8) -> bool {
    matches!(
        ch,
        b'B' | b'C' | b'N' | b'O' | b'P' | b'S' | b'F' | b'I' | b'b' | b'c' | b'n' | b'o' | b'p' | b's'
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::molecule::AtomKind;

    #[test]
    fn parse_methane() {
        let mol = parse_smiles("C").unwrap();
        assert_eq!(mol.atom_count(), 1);
        assert_eq!(mol.atoms[0].kind, AtomKind::Element(6));
        assert_eq!(mol.atoms[0].implicit_hydrogens, 4);
    }

    #[test]
    fn parse_ethanol() {
        let mol = parse_smiles("CCO").unwrap();
        assert_eq!(mol.atom_count(), 3);
        assert_eq!(mol.bond_count(), 2);
        assert_eq!(mol.atoms[0].implicit_hydrogens, 3);
        assert_eq!(mol.atoms[1].implicit_hydrogens, 2);
        assert_eq!(mol.atoms[2].implicit_hydrogens, 1);
    }

    #[test]
    fn parse_benzene_aromatic() {
        let mol = parse_smiles("c1ccccc1").unwrap();
        assert_eq!(mol.atom_count(), 6);
        assert_eq!(mol.bond_count(), 6);
        assert!(mol.atoms.iter().all(|a| a.is_aromatic));
        assert!(mol.atoms.iter().all(|a| a.implicit_hydrogens == 1));
    }

    #[test]
    fn parse_charges_and_isotopes() {
        let mol = parse_smiles("[13CH3-]").unwrap();
        assert_eq!(mol.atoms[0].isotope, Some(13));
        assert_eq!(mol.atoms[0].formal_charge, -1);
        assert_eq!(mol.atoms[0].implicit_hydrogens, 3);

        let mol = parse_smiles("[Fe+2]").unwrap();
        assert_eq!(mol.atoms[0].formal_charge, 2);
    }

    #[test]
    fn parse_atom_maps() {
        let mol = parse_smiles("[CH3:7]O").unwrap();
        assert_eq!(mol.atoms[0].atom_map, 7);
        assert_eq!(mol.atoms[1].atom_map, 0);
    }

    #[test]
    fn parse_wildcard() {
        let mol = parse_smiles("C*C").unwrap();
        assert_eq!(mol.atoms[1].kind, AtomKind::Any);
        assert!(mol.has_query_features());
    }

    #[test]
    fn unknown_element_wildcard_option() {
        assert!(parse_smiles("[Xq]").is_err());
        let opts = SmilesOptions { treat_unknown_as_wildcard: true, ..Default::default() };
        let mol = parse_smiles_with("[Xq]", opts).unwrap();
        assert_eq!(mol.atoms[0].kind, AtomKind::Any);
    }

    #[test]
    fn direction_marks_kept() {
        let mol = parse_smiles("F/C=C/F").unwrap();
        assert_eq!(mol.bonds[0].direction, BondDirection::Up);
        assert_eq!(mol.bonds[1].order, BondOrder::Double);
        assert_eq!(mol.bonds[2].direction, BondDirection::Up);
    }

    #[test]
    fn invalid_smiles_error() {
        assert!(parse_smiles("C(").is_err());
        assert!(parse_smiles("C1CC").is_err());
        assert!(parse_smiles("[").is_err());
        assert!(parse_smiles("").is_err());
        assert!(parse_smiles("not-a-molecule").is_err());
    }

    #[test]
    fn reaction_autodetect() {
        let rec = parse_record(b"CCO>>CC=O", SmilesOptions::default()).unwrap();
        assert!(rec.structure.is_reaction());
        let rec = parse_record(b"CCO", SmilesOptions::default()).unwrap();
        assert!(!rec.structure.is_reaction());
    }

    #[test]
    fn already_aromatic_flag() {
        let rec = parse_record(b"c1ccccc1", SmilesOptions::default()).unwrap();
        assert!(rec.already_aromatic);
        let rec = parse_record(b"C1=CC=CC=C1", SmilesOptions::default()).unwrap();
        assert!(!rec.already_aromatic);
        // Acyclic double bonds don't prevent the flag.
        let rec = parse_record(b"CC=O", SmilesOptions::default()).unwrap();
        assert!(rec.already_aromatic);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn simple_smiles() -> impl Strategy<Value = String> {
        let atoms = prop_oneof![
            Just("C"),
            Just("N"),
            Just("O"),
            Just("S"),
            Just("c"),
            Just("n"),
            Just("o"),
        ];
        proptest::collection::vec(atoms, 1..=20).prop_map(|parts| parts.join(""))
    }

    proptest! {
        #[test]
        fn parser_never_panics(s in "\\PC{0,80}") {
            let _ = parse_smiles(&s);
        }

        #[test]
        fn atom_count_positive_on_success(smi in simple_smiles()) {
            if let Ok(mol) = parse_smiles(&smi) {
                prop_assert!(mol.atom_count() > 0);
            }
        }
    }
}
