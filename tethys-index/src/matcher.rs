//! Structural matchers behind the match session: substructure
//! embedding, exact matching under a condition mask, and tautomer
//! skeleton matching.
//!
//! The embedding search maps query atoms onto target atoms in a
//! precompiled order (most-constrained first), extending a partial
//! injective mapping and backtracking on conflict. Deadlines are
//! checked inside the search so a pathological case fails with
//! [`TethysError::Cancelled`] instead of hanging the session.

use std::time::Instant;

use tethys_chem::{Atom, Bond, BondOrder, Molecule, ReactionRole, Structure};
use tethys_core::{Result, TethysError};

/// Which attributes exact matching compares. Defaults to full
/// structural identity without reaction annotations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConditionMask {
    /// Elements, aromaticity, and hydrogen counts.
    pub ele: bool,
    pub chg: bool,
    pub iso: bool,
    /// Bond direction marks.
    pub ste: bool,
    /// Atom-map agreement (reactions).
    pub aam: bool,
    /// Reacting-center agreement (reactions).
    pub rct: bool,
}

impl Default for ConditionMask {
    fn default() -> Self {
        ConditionMask { ele: true, chg: true, iso: true, ste: true, aam: false, rct: false }
    }
}

impl ConditionMask {
    /// Parse a condition string like `"ELE CHG ISO"`. An empty string
    /// keeps the default mask; `ALL` turns every condition on.
    pub fn parse(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(ConditionMask::default());
        }
        let mut mask =
            ConditionMask { ele: false, chg: false, iso: false, ste: false, aam: false, rct: false };
        for token in trimmed.split([' ', ',']).filter(|t| !t.is_empty()) {
            match token.to_ascii_uppercase().as_str() {
                "ELE" => mask.ele = true,
                "CHG" => mask.chg = true,
                "ISO" => mask.iso = true,
                "STE" => mask.ste = true,
                "AAM" => mask.aam = true,
                "RCT" => mask.rct = true,
                "ALL" => {
                    mask = ConditionMask { ele: true, chg: true, iso: true, ste: true, aam: true, rct: true }
                }
                other => {
                    return Err(TethysError::Parse(format!(
                        "unknown exact-match condition '{other}'"
                    )))
                }
            }
        }
        Ok(mask)
    }
}

/// Query atom order for the embedding search: start at the
/// most-connected atom and grow outward, preferring atoms with the most
/// already-placed neighbors, then the highest degree. Computed once per
/// compiled query.
pub fn compile_order(query: &Molecule) -> Vec<usize> {
    let n = query.atom_count();
    let mut order = Vec::with_capacity(n);
    let mut placed = vec![false; n];

    while order.len() < n {
        let next = (0..n)
            .filter(|&i| !placed[i])
            .max_by_key(|&i| {
                let anchored = query.neighbors(i).filter(|&(nb, _)| placed[nb]).count();
                (anchored, query.degree(i))
            });
        let Some(next) = next else { break };
        placed[next] = true;
        order.push(next);
    }
    order
}

fn substructure_atom_matches(query: &Atom, target: &Atom) -> bool {
    if let Some(qn) = query.kind.atomic_number() {
        if target.kind.atomic_number() != Some(qn) {
            return false;
        }
    }
    query.is_aromatic == target.is_aromatic
        && query.formal_charge == target.formal_charge
        && query.isotope.map_or(true, |iso| target.isotope == Some(iso))
}

fn substructure_bond_matches(query: &Bond, target: &Bond) -> bool {
    query.order == target.order
}

/// True iff the query graph embeds in the target under substructure
/// semantics. `order` comes from [`compile_order`].
pub fn embedding_exists(
    query: &Molecule,
    target: &Molecule,
    order: &[usize],
    deadline: Option<Instant>,
) -> Result<bool> {
    if query.atom_count() == 0 {
        return Ok(true);
    }
    if query.atom_count() > target.atom_count() || query.bond_count() > target.bond_count() {
        return Ok(false);
    }
    let mut search = Embedding {
        query,
        target,
        order,
        mapping: vec![usize::MAX; query.atom_count()],
        used: vec![false; target.atom_count()],
        deadline,
    };
    search.extend(0)
}

struct Embedding<'a> {
    query: &'a Molecule,
    target: &'a Molecule,
    order: &'a [usize],
    /// query atom -> target atom, MAX when unmapped.
    mapping: Vec<usize>,
    used: Vec<bool>,
    deadline: Option<Instant>,
}

impl Embedding<'_> {
    fn check_deadline(&self) -> Result<()> {
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(TethysError::Cancelled("embedding search timed out".into()));
            }
        }
        Ok(())
    }

    fn extend(&mut self, depth: usize) -> Result<bool> {
        if depth == self.order.len() {
            return Ok(true);
        }
        self.check_deadline()?;

        let q_atom = self.order[depth];
        for t_atom in 0..self.target.atom_count() {
            if self.used[t_atom] || !self.candidate_ok(q_atom, t_atom) {
                continue;
            }
            self.mapping[q_atom] = t_atom;
            self.used[t_atom] = true;
            if self.extend(depth + 1)? {
                return Ok(true);
            }
            self.mapping[q_atom] = usize::MAX;
            self.used[t_atom] = false;
        }
        Ok(false)
    }

    fn candidate_ok(&self, q_atom: usize, t_atom: usize) -> bool {
        if !substructure_atom_matches(&self.query.atoms[q_atom], &self.target.atoms[t_atom]) {
            return false;
        }
        if self.target.degree(t_atom) < self.query.degree(q_atom) {
            return false;
        }
        // Every already-mapped query neighbor must be a target neighbor
        // through a compatible bond.
        for (q_nb, q_bond) in self.query.neighbors(q_atom) {
            let t_nb = self.mapping[q_nb];
            if t_nb == usize::MAX {
                continue;
            }
            match self.target.bond_between(t_atom, t_nb) {
                Some(t_bond) => {
                    if !substructure_bond_matches(
                        &self.query.bonds[q_bond],
                        &self.target.bonds[t_bond],
                    ) {
                        return false;
                    }
                }
                None => return false,
            }
        }
        true
    }
}

/// Bond-order-collapsed, charge-insensitive copy used for tautomer
/// matching: two tautomers share this skeleton even though their bond
/// orders and protonation differ.
pub fn skeleton(mol: &Molecule) -> Molecule {
    let mut out = mol.clone();
    for bond in &mut out.bonds {
        bond.order = BondOrder::Single;
    }
    for atom in &mut out.atoms {
        atom.is_aromatic = false;
        atom.formal_charge = 0;
        atom.implicit_hydrogens = 0;
        atom.radical = 0;
    }
    out
}

/// Exact structural identity under the condition mask. Molecule-level:
/// graph isomorphism with attribute equality; reaction-level: every
/// role group pairs off one-to-one.
pub fn exact_match(
    query: &Structure,
    target: &Structure,
    mask: ConditionMask,
    deadline: Option<Instant>,
) -> Result<bool> {
    match (query, target) {
        (Structure::Molecule(q), Structure::Molecule(t)) => {
            exact_molecule_match(q, t, mask, deadline)
        }
        (Structure::Reaction(q), Structure::Reaction(t)) => {
            for role in [ReactionRole::Reactant, ReactionRole::Product, ReactionRole::Catalyst] {
                let q_mols: Vec<&Molecule> = q.molecules_of(role).collect();
                let t_mols: Vec<&Molecule> = t.molecules_of(role).collect();
                if q_mols.len() != t_mols.len() {
                    return Ok(false);
                }
                let mut taken = vec![false; t_mols.len()];
                if !pair_off(&q_mols, &t_mols, &mut taken, 0, mask, deadline)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        _ => Ok(false),
    }
}

/// Backtracking assignment of query molecules to distinct exact-equal
/// target molecules.
fn pair_off(
    q_mols: &[&Molecule],
    t_mols: &[&Molecule],
    taken: &mut Vec<bool>,
    depth: usize,
    mask: ConditionMask,
    deadline: Option<Instant>,
) -> Result<bool> {
    if depth == q_mols.len() {
        return Ok(true);
    }
    for (ti, t_mol) in t_mols.iter().enumerate() {
        if taken[ti] || !exact_molecule_match(q_mols[depth], t_mol, mask, deadline)? {
            continue;
        }
        taken[ti] = true;
        if pair_off(q_mols, t_mols, taken, depth + 1, mask, deadline)? {
            return Ok(true);
        }
        taken[ti] = false;
    }
    Ok(false)
}

fn exact_molecule_match(
    query: &Molecule,
    target: &Molecule,
    mask: ConditionMask,
    deadline: Option<Instant>,
) -> Result<bool> {
    if query.atom_count() != target.atom_count() || query.bond_count() != target.bond_count() {
        return Ok(false);
    }
    if query.atom_count() == 0 {
        return Ok(true);
    }
    let order = compile_order(query);
    let mut search = ExactSearch {
        mask,
        inner: Embedding {
            query,
            target,
            order: &order,
            mapping: vec![usize::MAX; query.atom_count()],
            used: vec![false; target.atom_count()],
            deadline,
        },
    };
    search.extend(0)
}

struct ExactSearch<'a> {
    mask: ConditionMask,
    inner: Embedding<'a>,
}

impl ExactSearch<'_> {
    fn extend(&mut self, depth: usize) -> Result<bool> {
        if depth == self.inner.order.len() {
            return Ok(true);
        }
        self.inner.check_deadline()?;

        let q_atom = self.inner.order[depth];
        for t_atom in 0..self.inner.target.atom_count() {
            if self.inner.used[t_atom] || !self.candidate_ok(q_atom, t_atom) {
                continue;
            }
            self.inner.mapping[q_atom] = t_atom;
            self.inner.used[t_atom] = true;
            if self.extend(depth + 1)? {
                return Ok(true);
            }
            self.inner.mapping[q_atom] = usize::MAX;
            self.inner.used[t_atom] = false;
        }
        Ok(false)
    }

    fn candidate_ok(&self, q_atom: usize, t_atom: usize) -> bool {
        let q = &self.inner.query.atoms[q_atom];
        let t = &self.inner.target.atoms[t_atom];
        if self.mask.ele
            && (q.kind != t.kind
                || q.is_aromatic != t.is_aromatic
                || q.implicit_hydrogens != t.implicit_hydrogens)
        {
            return false;
        }
        if self.mask.chg && q.formal_charge != t.formal_charge {
            return false;
        }
        if self.mask.iso && q.isotope != t.isotope {
            return false;
        }
        if self.mask.aam && q.atom_map != t.atom_map {
            return false;
        }
        if self.inner.target.degree(t_atom) != self.inner.query.degree(q_atom) {
            return false;
        }
        for (q_nb, q_bond) in self.inner.query.neighbors(q_atom) {
            let t_nb = self.inner.mapping[q_nb];
            if t_nb == usize::MAX {
                continue;
            }
            let Some(t_bond) = self.inner.target.bond_between(t_atom, t_nb) else {
                return false;
            };
            let qb = &self.inner.query.bonds[q_bond];
            let tb = &self.inner.target.bonds[t_bond];
            if qb.order != tb.order {
                return false;
            }
            if self.mask.ste && qb.direction != tb.direction {
                return false;
            }
            if self.mask.rct && qb.reacting_center != tb.reacting_center {
                return false;
            }
        }
        true
    }
}
