//! Feature codec: structures and reactions to/from compact byte blobs.
//!
//! A molecule is serialized as a symbol stream produced by a DFS walk
//! in canonical rank order: atom symbols with attribute codes, bond
//! codes, branch brackets, and back-references to earlier atoms for
//! ring closures. Reactions wrap per-molecule streams with a header
//! carrying group counts and feature flags; when atom maps are present
//! the per-atom mapping values and per-bond reacting-center flags
//! follow each molecule block in that molecule's own write order, so
//! decode realigns them without any external index.
//!
//! Two operating modes share the stream format. Dictionary mode runs
//! the stream through the shared [`LzwDict`], learning patterns as a
//! side effect; standalone mode stores the raw stream so a blob stays
//! self-describing.

use parking_lot::Mutex;

use tethys_chem::{
    canonical_ranks, Atom, AtomKind, Bond, BondDirection, BondOrder, Molecule, Reaction,
    ReactingCenter, ReactionRole, Structure,
};
use tethys_core::{Result, TethysError};

const BLOB_VERSION: u8 = 1;

const FLAG_DICT: u8 = 0x01;
const FLAG_REACTION: u8 = 0x02;

const RXN_FLAG_AAM: u8 = 0x01;
const RXN_FLAG_CATALYSTS: u8 = 0x02;

// Symbol alphabet. Codes 1..=118 are atomic numbers; the upper range
// holds attribute, bond, and stream-control codes.
const SYM_ANY_ATOM: u8 = 0xd0;
const ATTR_CHARGE: u8 = 0xd1;
const ATTR_ISOTOPE: u8 = 0xd2;
const ATTR_RADICAL: u8 = 0xd3;
const ATTR_HYDROGENS: u8 = 0xd4;
const ATTR_AROMATIC: u8 = 0xd5;
const ATTR_MAP: u8 = 0xd6;
const BOND_DOUBLE: u8 = 0xe0;
const BOND_TRIPLE: u8 = 0xe1;
const BOND_AROMATIC: u8 = 0xe2;
const DIR_UP: u8 = 0xe3;
const DIR_DOWN: u8 = 0xe4;
const OPEN_BRANCH: u8 = 0xe8;
const CLOSE_BRANCH: u8 = 0xe9;
const RING_REF: u8 = 0xea;
const COMPONENT_SEP: u8 = 0xeb;
const END_MOLECULE: u8 = 0xee;

/// Encode a structure. `dict` selects dictionary mode; encoding then
/// extends the dictionary under its lock.
pub fn encode(structure: &Structure, dict: Option<&Mutex<crate::dict::LzwDict>>) -> Result<Vec<u8>> {
    let payload = match structure {
        Structure::Molecule(mol) => {
            let mut walk = MoleculeWalk::new(mol);
            walk.emit(true)?;
            walk.stream
        }
        Structure::Reaction(rxn) => encode_reaction_payload(rxn)?,
    };

    let mut flags = 0u8;
    if structure.is_reaction() {
        flags |= FLAG_REACTION;
    }

    let mut blob = Vec::with_capacity(payload.len() + 4);
    blob.push(BLOB_VERSION);
    match dict {
        Some(dict) => {
            blob.push(flags | FLAG_DICT);
            let codes = dict.lock().compress(&payload)?;
            blob.extend_from_slice(&crate::dict::pack_codes(&codes)?);
        }
        None => {
            blob.push(flags);
            blob.extend_from_slice(&payload);
        }
    }
    Ok(blob)
}

/// Decode a blob. Dictionary-mode blobs need the dictionary that was
/// live when they were written, or any later snapshot of it.
pub fn decode(blob: &[u8], dict: Option<&Mutex<crate::dict::LzwDict>>) -> Result<Structure> {
    let header = blob
        .get(..2)
        .ok_or_else(|| TethysError::Codec("truncated blob header".into()))?;
    if header[0] != BLOB_VERSION {
        return Err(TethysError::Codec(format!(
            "unsupported blob version {}",
            header[0]
        )));
    }
    let flags = header[1];

    let payload: Vec<u8> = if flags & FLAG_DICT != 0 {
        let dict = dict.ok_or_else(|| {
            TethysError::Dictionary("dictionary-mode blob decoded without a dictionary".into())
        })?;
        let (codes, _) = crate::dict::unpack_codes(&blob[2..])?;
        dict.lock().decompress(&codes)?
    } else {
        blob[2..].to_vec()
    };

    let mut cursor = Cursor::new(&payload);
    let structure = if flags & FLAG_REACTION != 0 {
        Structure::Reaction(decode_reaction_payload(&mut cursor)?)
    } else {
        Structure::Molecule(decode_molecule_stream(&mut cursor)?)
    };
    Ok(structure)
}

fn encode_reaction_payload(rxn: &Reaction) -> Result<Vec<u8>> {
    let reactants = rxn.count_of(ReactionRole::Reactant);
    let products = rxn.count_of(ReactionRole::Product);
    let catalysts = rxn.count_of(ReactionRole::Catalyst);
    if reactants > u8::MAX as usize || products > u8::MAX as usize || catalysts > u8::MAX as usize
    {
        return Err(TethysError::Codec("too many molecules in reaction".into()));
    }

    let with_aam = rxn.has_atom_maps();
    let mut rflags = 0u8;
    if with_aam {
        rflags |= RXN_FLAG_AAM;
    }
    if catalysts > 0 {
        rflags |= RXN_FLAG_CATALYSTS;
    }

    let mut payload = vec![reactants as u8, products as u8, rflags];
    if catalysts > 0 {
        payload.push(catalysts as u8);
    }

    for role in [ReactionRole::Reactant, ReactionRole::Catalyst, ReactionRole::Product] {
        for mol in rxn.molecules_of(role) {
            let mut walk = MoleculeWalk::new(mol);
            // Maps travel in the AAM block, not in the stream.
            walk.emit(false)?;
            if with_aam {
                append_aam_block(&walk, mol, &mut payload)?;
            } else {
                payload.extend_from_slice(&walk.stream);
                continue;
            }
        }
    }
    Ok(payload)
}

fn append_aam_block(walk: &MoleculeWalk<'_>, mol: &Molecule, payload: &mut Vec<u8>) -> Result<()> {
    payload.extend_from_slice(&walk.stream);
    for &atom_idx in &walk.atom_order {
        let map = mol.atoms[atom_idx].atom_map;
        if map as usize >= crate::dict::DEFAULT_ALPHABET {
            return Err(TethysError::Codec(format!(
                "atom map {map} outside [1, {})",
                crate::dict::DEFAULT_ALPHABET
            )));
        }
        payload.push(map as u8);
    }
    for &bond_idx in &walk.bond_order {
        payload.push(mol.bonds[bond_idx].reacting_center.code());
    }
    Ok(())
}

fn decode_reaction_payload(cursor: &mut Cursor<'_>) -> Result<Reaction> {
    let reactants = cursor.take_u8()? as usize;
    let products = cursor.take_u8()? as usize;
    let rflags = cursor.take_u8()?;
    let with_aam = rflags & RXN_FLAG_AAM != 0;
    let catalysts = if rflags & RXN_FLAG_CATALYSTS != 0 {
        cursor.take_u8()? as usize
    } else {
        0
    };

    let mut rxn = Reaction::new(String::new());
    for (role, count) in [
        (ReactionRole::Reactant, reactants),
        (ReactionRole::Catalyst, catalysts),
        (ReactionRole::Product, products),
    ] {
        for _ in 0..count {
            let mut mol = decode_molecule_stream(cursor)?;
            if with_aam {
                for i in 0..mol.atom_count() {
                    mol.atoms[i].atom_map = cursor.take_u8()? as u16;
                }
                for i in 0..mol.bond_count() {
                    let code = cursor.take_u8()?;
                    mol.bonds[i].reacting_center = ReactingCenter::from_code(code)
                        .ok_or_else(|| {
                            TethysError::Codec(format!("bad reacting-center code {code}"))
                        })?;
                }
            }
            rxn.add(role, mol);
        }
    }
    Ok(rxn)
}

/// DFS serializer for one molecule. After `emit`, `atom_order` is the
/// visit order (stream atom order) and `bond_order` the emission order,
/// the alignment contract for reaction AAM blocks.
struct MoleculeWalk<'a> {
    mol: &'a Molecule,
    ranks: Vec<usize>,
    stream: Vec<u8>,
    atom_order: Vec<usize>,
    bond_order: Vec<usize>,
    visit_index: Vec<usize>,
    bond_done: Vec<bool>,
}

impl<'a> MoleculeWalk<'a> {
    fn new(mol: &'a Molecule) -> Self {
        MoleculeWalk {
            mol,
            ranks: canonical_ranks(mol),
            stream: Vec::new(),
            atom_order: Vec::new(),
            bond_order: Vec::new(),
            visit_index: vec![usize::MAX; mol.atom_count()],
            bond_done: vec![false; mol.bond_count()],
        }
    }

    fn emit(&mut self, include_maps: bool) -> Result<()> {
        let mut roots: Vec<usize> = (0..self.mol.atom_count()).collect();
        roots.sort_by_key(|&i| self.ranks[i]);

        let mut first = true;
        for root in roots {
            if self.visit_index[root] != usize::MAX {
                continue;
            }
            if !first {
                self.stream.push(COMPONENT_SEP);
            }
            first = false;
            self.visit(root, None, include_maps)?;
        }
        self.stream.push(END_MOLECULE);
        Ok(())
    }

    fn visit(&mut self, atom_idx: usize, parent: Option<usize>, include_maps: bool) -> Result<()> {
        self.visit_index[atom_idx] = self.atom_order.len();
        self.atom_order.push(atom_idx);
        self.emit_atom(atom_idx, include_maps)?;

        let mut neighbors: Vec<(usize, usize)> = self
            .mol
            .neighbors(atom_idx)
            .filter(|&(nb, _)| Some(nb) != parent)
            .collect();
        neighbors.sort_by_key(|&(nb, _)| self.ranks[nb]);

        // Ring closures to already-visited atoms come first.
        let mut children = Vec::new();
        for (nb, bond_idx) in neighbors {
            if self.visit_index[nb] != usize::MAX {
                if !self.bond_done[bond_idx] {
                    self.bond_done[bond_idx] = true;
                    self.bond_order.push(bond_idx);
                    self.emit_bond(bond_idx);
                    self.stream.push(RING_REF);
                    let idx = self.visit_index[nb] as u16;
                    self.stream.extend_from_slice(&idx.to_le_bytes());
                }
            } else {
                children.push((nb, bond_idx));
            }
        }

        let last = children.len().saturating_sub(1);
        for (pos, (child, bond_idx)) in children.into_iter().enumerate() {
            // A sibling may have reached this child through a ring.
            if self.visit_index[child] != usize::MAX {
                if !self.bond_done[bond_idx] {
                    self.bond_done[bond_idx] = true;
                    self.bond_order.push(bond_idx);
                    self.emit_bond(bond_idx);
                    self.stream.push(RING_REF);
                    let idx = self.visit_index[child] as u16;
                    self.stream.extend_from_slice(&idx.to_le_bytes());
                }
                continue;
            }
            let branch = pos != last;
            if branch {
                self.stream.push(OPEN_BRANCH);
            }
            self.bond_done[bond_idx] = true;
            self.bond_order.push(bond_idx);
            self.emit_bond(bond_idx);
            self.visit(child, Some(atom_idx), include_maps)?;
            if branch {
                self.stream.push(CLOSE_BRANCH);
            }
        }
        Ok(())
    }

    fn emit_atom(&mut self, atom_idx: usize, include_maps: bool) -> Result<()> {
        let atom = &self.mol.atoms[atom_idx];
        match atom.kind {
            AtomKind::Element(n) if (1..=118).contains(&n) => self.stream.push(n),
            AtomKind::Element(n) => {
                return Err(TethysError::Codec(format!("atomic number {n} out of range")))
            }
            AtomKind::Any => self.stream.push(SYM_ANY_ATOM),
        }
        if atom.is_aromatic {
            self.stream.push(ATTR_AROMATIC);
        }
        if atom.formal_charge != 0 {
            self.stream.push(ATTR_CHARGE);
            self.stream.push((atom.formal_charge as i16 + 16) as u8);
        }
        if let Some(isotope) = atom.isotope {
            self.stream.push(ATTR_ISOTOPE);
            self.stream.extend_from_slice(&isotope.to_le_bytes());
        }
        if atom.radical != 0 {
            self.stream.push(ATTR_RADICAL);
            self.stream.push(atom.radical);
        }
        if atom.implicit_hydrogens != 0 {
            self.stream.push(ATTR_HYDROGENS);
            self.stream.push(atom.implicit_hydrogens);
        }
        if include_maps && atom.atom_map != 0 {
            self.stream.push(ATTR_MAP);
            self.stream.extend_from_slice(&atom.atom_map.to_le_bytes());
        }
        Ok(())
    }

    fn emit_bond(&mut self, bond_idx: usize) {
        let bond = &self.mol.bonds[bond_idx];
        match bond.order {
            BondOrder::Single => {}
            BondOrder::Double => self.stream.push(BOND_DOUBLE),
            BondOrder::Triple => self.stream.push(BOND_TRIPLE),
            BondOrder::Aromatic => self.stream.push(BOND_AROMATIC),
        }
        match bond.direction {
            BondDirection::None => {}
            BondDirection::Up => self.stream.push(DIR_UP),
            BondDirection::Down => self.stream.push(DIR_DOWN),
        }
    }
}

/// Decode one molecule stream starting at the cursor; stops after the
/// end-of-molecule code. Atoms land in stream order and bonds in
/// emission order, which is what aligns reaction AAM blocks.
fn decode_molecule_stream(cursor: &mut Cursor<'_>) -> Result<Molecule> {
    let mut atoms: Vec<Atom> = Vec::new();
    let mut bonds: Vec<Bond> = Vec::new();
    let mut stack: Vec<Option<usize>> = Vec::new();
    let mut prev: Option<usize> = None;
    let mut pending_order = BondOrder::Single;
    let mut pending_dir = BondDirection::None;

    loop {
        let code = cursor.take_u8()?;
        match code {
            END_MOLECULE => break,
            1..=118 | SYM_ANY_ATOM => {
                let mut atom = if code == SYM_ANY_ATOM {
                    Atom::any()
                } else {
                    Atom::of_element(code)
                };
                decode_atom_attrs(cursor, &mut atom)?;
                let idx = atoms.len();
                atoms.push(atom);
                if let Some(p) = prev {
                    let mut bond = Bond::new(p, idx, pending_order);
                    bond.direction = pending_dir;
                    bonds.push(bond);
                }
                pending_order = BondOrder::Single;
                pending_dir = BondDirection::None;
                prev = Some(idx);
            }
            BOND_DOUBLE => pending_order = BondOrder::Double,
            BOND_TRIPLE => pending_order = BondOrder::Triple,
            BOND_AROMATIC => pending_order = BondOrder::Aromatic,
            DIR_UP => pending_dir = BondDirection::Up,
            DIR_DOWN => pending_dir = BondDirection::Down,
            OPEN_BRANCH => stack.push(prev),
            CLOSE_BRANCH => {
                prev = stack
                    .pop()
                    .ok_or_else(|| TethysError::Codec("unbalanced branch close".into()))?;
            }
            RING_REF => {
                let target = cursor.take_u16()? as usize;
                let from = prev
                    .ok_or_else(|| TethysError::Codec("ring reference before any atom".into()))?;
                if target >= atoms.len() {
                    return Err(TethysError::Codec(format!(
                        "ring reference to unseen atom {target}"
                    )));
                }
                let mut bond = Bond::new(from, target, pending_order);
                bond.direction = pending_dir;
                bonds.push(bond);
                pending_order = BondOrder::Single;
                pending_dir = BondDirection::None;
            }
            COMPONENT_SEP => {
                prev = None;
                stack.clear();
            }
            other => {
                return Err(TethysError::Codec(format!("unexpected stream code {other:#04x}")))
            }
        }
    }

    if atoms.is_empty() {
        return Err(TethysError::Codec("empty molecule stream".into()));
    }
    Ok(Molecule::new(String::new(), atoms, bonds))
}

fn decode_atom_attrs(cursor: &mut Cursor<'_>, atom: &mut Atom) -> Result<()> {
    while let Some(code) = cursor.peek() {
        match code {
            ATTR_AROMATIC => {
                cursor.skip();
                atom.is_aromatic = true;
            }
            ATTR_CHARGE => {
                cursor.skip();
                atom.formal_charge = (cursor.take_u8()? as i16 - 16) as i8;
            }
            ATTR_ISOTOPE => {
                cursor.skip();
                atom.isotope = Some(cursor.take_u16()?);
            }
            ATTR_RADICAL => {
                cursor.skip();
                atom.radical = cursor.take_u8()?;
            }
            ATTR_HYDROGENS => {
                cursor.skip();
                atom.implicit_hydrogens = cursor.take_u8()?;
            }
            ATTR_MAP => {
                cursor.skip();
                atom.atom_map = cursor.take_u16()?;
            }
            _ => break,
        }
    }
    Ok(())
}

/// Quantized coordinate block: per-axis `(min, max)` range header, then
/// one 16-bit value per atom per axis. Decoding reproduces the
/// quantized values exactly from `(code, min, max)`.
pub fn pack_coords(mol: &Molecule) -> Option<Vec<u8>> {
    if !mol.has_coordinates() {
        return None;
    }
    let positions: Vec<[f32; 3]> = mol
        .atoms
        .iter()
        .map(|a| a.position.unwrap_or([0.0; 3]))
        .collect();

    let mut out = Vec::with_capacity(24 + positions.len() * 6);
    for axis in 0..3 {
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        for p in &positions {
            min = min.min(p[axis]);
            max = max.max(p[axis]);
        }
        out.extend_from_slice(&min.to_le_bytes());
        out.extend_from_slice(&max.to_le_bytes());
        let span = if max > min { max - min } else { 1.0 };
        for p in &positions {
            let code = (((p[axis] - min) / span) * u16::MAX as f32).round() as u16;
            out.extend_from_slice(&code.to_le_bytes());
        }
    }
    Some(out)
}

/// Inverse of [`pack_coords`] for a known atom count.
pub fn unpack_coords(data: &[u8], atom_count: usize) -> Result<Vec<[f32; 3]>> {
    let mut cursor = Cursor::new(data);
    let mut positions = vec![[0.0f32; 3]; atom_count];
    for axis in 0..3 {
        let min = f32::from_le_bytes(cursor.take_array()?);
        let max = f32::from_le_bytes(cursor.take_array()?);
        let span = if max > min { max - min } else { 1.0 };
        for pos in positions.iter_mut() {
            let code = cursor.take_u16()?;
            pos[axis] = min + (code as f32 / u16::MAX as f32) * span;
        }
    }
    Ok(positions)
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Cursor { data, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    fn skip(&mut self) {
        self.pos += 1;
    }

    fn take_u8(&mut self) -> Result<u8> {
        let b = self
            .data
            .get(self.pos)
            .copied()
            .ok_or_else(|| TethysError::Codec("truncated stream".into()))?;
        self.pos += 1;
        Ok(b)
    }

    fn take_u16(&mut self) -> Result<u16> {
        let bytes: [u8; 2] = self.take_array()?;
        Ok(u16::from_le_bytes(bytes))
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let slice = self
            .data
            .get(self.pos..self.pos + N)
            .ok_or_else(|| TethysError::Codec("truncated stream".into()))?;
        self.pos += N;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tethys_chem::{gross_formula, parse_reaction_smiles, parse_smiles};

    fn round_trip_mol(smiles: &str) -> (Molecule, Molecule) {
        let mol = parse_smiles(smiles).unwrap();
        let blob = encode(&Structure::Molecule(mol.clone()), None).unwrap();
        match decode(&blob, None).unwrap() {
            Structure::Molecule(decoded) => (mol, decoded),
            Structure::Reaction(_) => panic!("expected molecule"),
        }
    }

    #[test]
    fn molecule_round_trip_preserves_graph() {
        for smiles in ["C", "CCO", "c1ccccc1", "C1CCCCC1", "CC(C)(C)C#N", "[13CH3-]C"] {
            let (orig, decoded) = round_trip_mol(smiles);
            assert_eq!(orig.atom_count(), decoded.atom_count(), "{smiles}");
            assert_eq!(orig.bond_count(), decoded.bond_count(), "{smiles}");
            assert_eq!(
                gross_formula(&orig).hill_string(),
                gross_formula(&decoded).hill_string(),
                "{smiles}"
            );
        }
    }

    #[test]
    fn attributes_survive_round_trip() {
        let (_, decoded) = round_trip_mol("[13CH3-]");
        assert_eq!(decoded.atoms[0].isotope, Some(13));
        assert_eq!(decoded.atoms[0].formal_charge, -1);
        assert_eq!(decoded.atoms[0].implicit_hydrogens, 3);
    }

    #[test]
    fn multi_component_round_trip() {
        let (orig, decoded) = round_trip_mol("[Na+].[Cl-]");
        assert_eq!(decoded.connected_components().len(), 2);
        assert_eq!(orig.atom_count(), decoded.atom_count());
    }

    #[test]
    fn canonical_order_makes_isomorphic_inputs_identical() {
        let a = parse_smiles("CCO").unwrap();
        let b = parse_smiles("OCC").unwrap();
        let blob_a = encode(&Structure::Molecule(a), None).unwrap();
        let blob_b = encode(&Structure::Molecule(b), None).unwrap();
        assert_eq!(blob_a, blob_b);
    }

    #[test]
    fn dictionary_mode_round_trip_and_growth() {
        let dict = Mutex::new(crate::dict::LzwDict::new(crate::dict::DEFAULT_ALPHABET));
        let before = dict.lock().code_count();

        let mol = parse_smiles("C1CCCCC1CCCCC").unwrap();
        let blob = encode(&Structure::Molecule(mol.clone()), Some(&dict)).unwrap();
        assert!(dict.lock().code_count() > before, "dictionary grew");

        let decoded = decode(&blob, Some(&dict)).unwrap();
        assert_eq!(decoded.members()[0].atom_count(), mol.atom_count());
    }

    #[test]
    fn dictionary_blob_needs_dictionary() {
        let dict = Mutex::new(crate::dict::LzwDict::new(crate::dict::DEFAULT_ALPHABET));
        let mol = parse_smiles("CCCC").unwrap();
        let blob = encode(&Structure::Molecule(mol), Some(&dict)).unwrap();
        assert!(matches!(decode(&blob, None), Err(TethysError::Dictionary(_))));
    }

    #[test]
    fn reaction_round_trip_with_aam() {
        let rxn = parse_reaction_smiles("[CH3:1][OH:2]>>[CH3:1][OH:2]").unwrap();
        let blob = encode(&Structure::Reaction(rxn.clone()), None).unwrap();
        let decoded = match decode(&blob, None).unwrap() {
            Structure::Reaction(r) => r,
            Structure::Molecule(_) => panic!("expected reaction"),
        };
        assert_eq!(decoded.count_of(ReactionRole::Reactant), 1);
        assert_eq!(decoded.count_of(ReactionRole::Product), 1);
        assert_eq!(decoded.max_atom_map(), 2);
    }

    #[test]
    fn reaction_with_catalyst_round_trip() {
        let rxn = parse_reaction_smiles("CCO.CC(=O)O>[H+]>CC(=O)OCC").unwrap();
        let blob = encode(&Structure::Reaction(rxn), None).unwrap();
        let decoded = match decode(&blob, None).unwrap() {
            Structure::Reaction(r) => r,
            Structure::Molecule(_) => panic!("expected reaction"),
        };
        assert_eq!(decoded.count_of(ReactionRole::Reactant), 2);
        assert_eq!(decoded.count_of(ReactionRole::Catalyst), 1);
        assert_eq!(decoded.count_of(ReactionRole::Product), 1);
    }

    #[test]
    fn oversized_atom_map_rejected() {
        let mut rxn = parse_reaction_smiles("[CH4:1]>>[CH4:1]").unwrap();
        rxn.molecules[0].1.atoms[0].atom_map = 300;
        assert!(matches!(
            encode(&Structure::Reaction(rxn), None),
            Err(TethysError::Codec(_))
        ));
    }

    #[test]
    fn truncated_blob_rejected() {
        let mol = parse_smiles("c1ccccc1").unwrap();
        let blob = encode(&Structure::Molecule(mol), None).unwrap();
        for cut in [0, 1, blob.len() / 2, blob.len() - 1] {
            assert!(decode(&blob[..cut], None).is_err(), "cut at {cut}");
        }
    }

    #[test]
    fn garbage_blob_rejected() {
        assert!(matches!(
            decode(&[BLOB_VERSION, 0, 0xff, 0xff, 0xff], None),
            Err(TethysError::Codec(_))
        ));
        assert!(decode(&[9, 0], None).is_err());
    }

    #[test]
    fn coordinate_block_round_trip() {
        let mut mol = parse_smiles("CCO").unwrap();
        mol.atoms[0].position = Some([0.0, 0.0, 0.0]);
        mol.atoms[1].position = Some([1.5, 0.2, -0.3]);
        mol.atoms[2].position = Some([2.9, -1.1, 0.7]);

        let block = pack_coords(&mol).unwrap();
        let decoded = unpack_coords(&block, 3).unwrap();
        for (atom, got) in mol.atoms.iter().zip(&decoded) {
            let want = atom.position.unwrap();
            for axis in 0..3 {
                assert!((want[axis] - got[axis]).abs() < 1e-3);
            }
        }
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use tethys_chem::parse_smiles;

    fn chain_smiles() -> impl Strategy<Value = String> {
        let atom = prop_oneof![Just("C"), Just("N"), Just("O"), Just("S"), Just("Cl")];
        proptest::collection::vec(atom, 1..=24).prop_map(|parts| parts.join(""))
    }

    proptest! {
        #[test]
        fn round_trip_preserves_counts(smi in chain_smiles()) {
            let mol = parse_smiles(&smi).unwrap();
            let blob = encode(&Structure::Molecule(mol.clone()), None).unwrap();
            let decoded = decode(&blob, None).unwrap();
            prop_assert_eq!(decoded.members()[0].atom_count(), mol.atom_count());
            prop_assert_eq!(decoded.members()[0].bond_count(), mol.bond_count());
        }

        #[test]
        fn decode_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..128)) {
            let _ = decode(&bytes, None);
        }
    }
}
