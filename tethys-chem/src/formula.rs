//! Gross formula, molecular mass, and formula queries.

use std::collections::BTreeMap;
use std::fmt;

use tethys_core::{Result, TethysError};

use crate::element::{element_by_number, element_by_symbol};
use crate::molecule::Molecule;
use crate::reaction::Structure;

/// Element counts of a structure, implicit hydrogens included.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrossFormula {
    /// atomic number -> count
    counts: BTreeMap<u8, u32>,
}

impl GrossFormula {
    pub fn count(&self, atomic_number: u8) -> u32 {
        self.counts.get(&atomic_number).copied().unwrap_or(0)
    }

    pub fn add(&mut self, atomic_number: u8, count: u32) {
        if count > 0 {
            *self.counts.entry(atomic_number).or_insert(0) += count;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn elements(&self) -> impl Iterator<Item = (u8, u32)> + '_ {
        self.counts.iter().map(|(&n, &c)| (n, c))
    }

    /// Hill order: carbon first, then hydrogen, then everything else
    /// alphabetically. Without carbon, all elements go alphabetically.
    pub fn hill_string(&self) -> String {
        let mut parts: Vec<(String, u32)> = Vec::new();
        let has_carbon = self.count(6) > 0;

        if has_carbon {
            parts.push(("C".into(), self.count(6)));
            if self.count(1) > 0 {
                parts.push(("H".into(), self.count(1)));
            }
        }
        let mut rest: Vec<(String, u32)> = self
            .counts
            .iter()
            .filter(|&(&n, _)| !(has_carbon && (n == 6 || n == 1)))
            .filter_map(|(&n, &c)| element_by_number(n).map(|e| (e.symbol.to_string(), c)))
            .collect();
        rest.sort();
        parts.extend(rest);

        let mut out = String::new();
        for (symbol, count) in parts {
            out.push_str(&symbol);
            if count > 1 {
                out.push_str(&count.to_string());
            }
        }
        out
    }
}

impl fmt::Display for GrossFormula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hill_string())
    }
}

/// Element counts of a molecule, including implicit hydrogens. Wildcard
/// atoms contribute nothing.
pub fn gross_formula(mol: &Molecule) -> GrossFormula {
    let mut formula = GrossFormula::default();
    for atom in &mol.atoms {
        if let Some(n) = atom.kind.atomic_number() {
            formula.add(n, 1);
        }
        formula.add(1, atom.implicit_hydrogens as u32);
    }
    formula
}

/// Combined gross formula of a multi-component structure. For reactions
/// this sums every member regardless of role.
pub fn structure_gross_formula(structure: &Structure) -> GrossFormula {
    let mut formula = GrossFormula::default();
    for mol in structure.members() {
        for (n, c) in gross_formula(mol).elements() {
            formula.add(n, c);
        }
    }
    formula
}

/// Average molecular mass in Daltons, implicit hydrogens included.
pub fn molecular_mass(mol: &Molecule) -> f64 {
    gross_formula(mol)
        .elements()
        .filter_map(|(n, c)| element_by_number(n).map(|e| e.atomic_weight * c as f64))
        .sum()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrossOp {
    Eq,
    Ge,
    Le,
    Gt,
    Lt,
}

impl GrossOp {
    fn test(self, target: u32, bound: u32) -> bool {
        match self {
            GrossOp::Eq => target == bound,
            GrossOp::Ge => target >= bound,
            GrossOp::Le => target <= bound,
            GrossOp::Gt => target > bound,
            GrossOp::Lt => target < bound,
        }
    }
}

/// A gross-formula match condition like `>= C6 H6` or `= C2H6O`.
///
/// The comparator applies element-wise to every element named in the
/// query; equality additionally requires the target to carry no
/// elements the query omits.
#[derive(Debug, Clone)]
pub struct GrossQuery {
    pub op: GrossOp,
    pub counts: GrossFormula,
}

impl GrossQuery {
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        let (op, rest) = if let Some(r) = text.strip_prefix(">=") {
            (GrossOp::Ge, r)
        } else if let Some(r) = text.strip_prefix("<=") {
            (GrossOp::Le, r)
        } else if let Some(r) = text.strip_prefix('=') {
            (GrossOp::Eq, r)
        } else if let Some(r) = text.strip_prefix('>') {
            (GrossOp::Gt, r)
        } else if let Some(r) = text.strip_prefix('<') {
            (GrossOp::Lt, r)
        } else {
            (GrossOp::Eq, text)
        };
        let counts = parse_formula(rest)?;
        if counts.is_empty() {
            return Err(TethysError::Parse("empty gross-formula query".into()));
        }
        Ok(GrossQuery { op, counts })
    }

    pub fn matches(&self, target: &GrossFormula) -> bool {
        for (n, bound) in self.counts.elements() {
            if !self.op.test(target.count(n), bound) {
                return false;
            }
        }
        if self.op == GrossOp::Eq {
            for (n, c) in target.elements() {
                if c > 0 && self.counts.count(n) == 0 {
                    return false;
                }
            }
        }
        true
    }
}

/// Parse `C6H6`, `C6 H6`, `C2H5OH`-style text into element counts.
fn parse_formula(text: &str) -> Result<GrossFormula> {
    let mut formula = GrossFormula::default();
    let bytes = text.as_bytes();
    let mut pos = 0;
    while pos < bytes.len() {
        let ch = bytes[pos];
        if ch.is_ascii_whitespace() {
            pos += 1;
            continue;
        }
        if !ch.is_ascii_uppercase() {
            return Err(TethysError::Parse(format!(
                "unexpected character '{}' in gross formula",
                ch as char
            )));
        }
        let mut symbol = String::from(ch as char);
        pos += 1;
        if pos < bytes.len() && bytes[pos].is_ascii_lowercase() {
            symbol.push(bytes[pos] as char);
            pos += 1;
        }
        let elem = element_by_symbol(&symbol)
            .ok_or_else(|| TethysError::Parse(format!("unknown element '{symbol}'")))?;

        let mut count: u32 = 0;
        let mut has_digits = false;
        while pos < bytes.len() && bytes[pos].is_ascii_digit() {
            count = count * 10 + (bytes[pos] - b'0') as u32;
            has_digits = true;
            pos += 1;
        }
        formula.add(elem.atomic_number, if has_digits { count } else { 1 });
    }
    Ok(formula)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smiles::parse_smiles;

    #[test]
    fn benzene_hill_string() {
        let mol = parse_smiles("c1ccccc1").unwrap();
        assert_eq!(gross_formula(&mol).hill_string(), "C6H6");
    }

    #[test]
    fn ethanol_formula_and_mass() {
        let mol = parse_smiles("CCO").unwrap();
        assert_eq!(gross_formula(&mol).hill_string(), "C2H6O");
        let mass = molecular_mass(&mol);
        assert!((mass - 46.07).abs() < 0.05, "mass {mass}");
    }

    #[test]
    fn no_carbon_is_alphabetical() {
        let mol = parse_smiles("O").unwrap();
        assert_eq!(gross_formula(&mol).hill_string(), "H2O");
        let mol = parse_smiles("[Na+].[Cl-]").unwrap();
        assert_eq!(gross_formula(&mol).hill_string(), "ClNa");
    }

    #[test]
    fn query_comparators() {
        let benzene = gross_formula(&parse_smiles("c1ccccc1").unwrap());

        assert!(GrossQuery::parse("= C6 H6").unwrap().matches(&benzene));
        assert!(GrossQuery::parse(">= C6").unwrap().matches(&benzene));
        assert!(GrossQuery::parse("> C5").unwrap().matches(&benzene));
        assert!(GrossQuery::parse("< C7").unwrap().matches(&benzene));
        assert!(GrossQuery::parse("<= C6 H6").unwrap().matches(&benzene));
        assert!(!GrossQuery::parse("> C6").unwrap().matches(&benzene));
        assert!(!GrossQuery::parse("= C6").unwrap().matches(&benzene), "extra H fails equality");
    }

    #[test]
    fn query_without_comparator_is_equality() {
        let water = gross_formula(&parse_smiles("O").unwrap());
        assert!(GrossQuery::parse("H2O").unwrap().matches(&water));
        assert!(!GrossQuery::parse("H2O2").unwrap().matches(&water));
    }

    #[test]
    fn query_parse_errors() {
        assert!(GrossQuery::parse("").is_err());
        assert!(GrossQuery::parse(">= Xx3").is_err());
        assert!(GrossQuery::parse("6C").is_err());
    }
}
