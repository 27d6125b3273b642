//! Periodic table data and element lookup.

/// A chemical element from the periodic table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Element {
    pub atomic_number: u8,
    pub symbol: &'static str,
    pub atomic_weight: f64,
    /// Usual valences, most common first. Zero entries are padding.
    pub valences: [u8; 3],
}

impl Element {
    /// Whether `total` (bond order sum + hydrogens, adjusted for charge)
    /// is an admissible valence for this element.
    pub fn valence_ok(&self, total: u8) -> bool {
        self.valences.iter().any(|&v| v != 0 && v == total) || total == 0
    }

    /// The default (most common) valence, if the element has one.
    pub fn default_valence(&self) -> Option<u8> {
        if self.valences[0] != 0 {
            Some(self.valences[0])
        } else {
            None
        }
    }
}

/// Elements 1–54 (H through Xe). Weights are standard atomic weights.
static ELEMENTS: [Element; 54] = [
    Element { atomic_number: 1, symbol: "H", atomic_weight: 1.008, valences: [1, 0, 0] },
    Element { atomic_number: 2, symbol: "He", atomic_weight: 4.003, valences: [0, 0, 0] },
    Element { atomic_number: 3, symbol: "Li", atomic_weight: 6.941, valences: [1, 0, 0] },
    Element { atomic_number: 4, symbol: "Be", atomic_weight: 9.012, valences: [2, 0, 0] },
    Element { atomic_number: 5, symbol: "B", atomic_weight: 10.81, valences: [3, 0, 0] },
    Element { atomic_number: 6, symbol: "C", atomic_weight: 12.011, valences: [4, 0, 0] },
    Element { atomic_number: 7, symbol: "N", atomic_weight: 14.007, valences: [3, 5, 0] },
    Element { atomic_number: 8, symbol: "O", atomic_weight: 15.999, valences: [2, 0, 0] },
    Element { atomic_number: 9, symbol: "F", atomic_weight: 18.998, valences: [1, 0, 0] },
    Element { atomic_number: 10, symbol: "Ne", atomic_weight: 20.180, valences: [0, 0, 0] },
    Element { atomic_number: 11, symbol: "Na", atomic_weight: 22.990, valences: [1, 0, 0] },
    Element { atomic_number: 12, symbol: "Mg", atomic_weight: 24.305, valences: [2, 0, 0] },
    Element { atomic_number: 13, symbol: "Al", atomic_weight: 26.982, valences: [3, 0, 0] },
    Element { atomic_number: 14, symbol: "Si", atomic_weight: 28.086, valences: [4, 0, 0] },
    Element { atomic_number: 15, symbol: "P", atomic_weight: 30.974, valences: [3, 5, 0] },
    Element { atomic_number: 16, symbol: "S", atomic_weight: 32.06, valences: [2, 4, 6] },
    Element { atomic_number: 17, symbol: "Cl", atomic_weight: 35.45, valences: [1, 0, 0] },
    Element { atomic_number: 18, symbol: "Ar", atomic_weight: 39.948, valences: [0, 0, 0] },
    Element { atomic_number: 19, symbol: "K", atomic_weight: 39.098, valences: [1, 0, 0] },
    Element { atomic_number: 20, symbol: "Ca", atomic_weight: 40.078, valences: [2, 0, 0] },
    Element { atomic_number: 21, symbol: "Sc", atomic_weight: 44.956, valences: [3, 0, 0] },
    Element { atomic_number: 22, symbol: "Ti", atomic_weight: 47.867, valences: [4, 3, 0] },
    Element { atomic_number: 23, symbol: "V", atomic_weight: 50.942, valences: [5, 4, 3] },
    Element { atomic_number: 24, symbol: "Cr", atomic_weight: 51.996, valences: [3, 6, 2] },
    Element { atomic_number: 25, symbol: "Mn", atomic_weight: 54.938, valences: [2, 4, 7] },
    Element { atomic_number: 26, symbol: "Fe", atomic_weight: 55.845, valences: [3, 2, 0] },
    Element { atomic_number: 27, symbol: "Co", atomic_weight: 58.933, valences: [3, 2, 0] },
    Element { atomic_number: 28, symbol: "Ni", atomic_weight: 58.693, valences: [2, 3, 0] },
    Element { atomic_number: 29, symbol: "Cu", atomic_weight: 63.546, valences: [2, 1, 0] },
    Element { atomic_number: 30, symbol: "Zn", atomic_weight: 65.38, valences: [2, 0, 0] },
    Element { atomic_number: 31, symbol: "Ga", atomic_weight: 69.723, valences: [3, 0, 0] },
    Element { atomic_number: 32, symbol: "Ge", atomic_weight: 72.63, valences: [4, 0, 0] },
    Element { atomic_number: 33, symbol: "As", atomic_weight: 74.922, valences: [3, 5, 0] },
    Element { atomic_number: 34, symbol: "Se", atomic_weight: 78.96, valences: [2, 4, 6] },
    Element { atomic_number: 35, symbol: "Br", atomic_weight: 79.904, valences: [1, 0, 0] },
    Element { atomic_number: 36, symbol: "Kr", atomic_weight: 83.798, valences: [0, 0, 0] },
    Element { atomic_number: 37, symbol: "Rb", atomic_weight: 85.468, valences: [1, 0, 0] },
    Element { atomic_number: 38, symbol: "Sr", atomic_weight: 87.62, valences: [2, 0, 0] },
    Element { atomic_number: 39, symbol: "Y", atomic_weight: 88.906, valences: [3, 0, 0] },
    Element { atomic_number: 40, symbol: "Zr", atomic_weight: 91.224, valences: [4, 0, 0] },
    Element { atomic_number: 41, symbol: "Nb", atomic_weight: 92.906, valences: [5, 3, 0] },
    Element { atomic_number: 42, symbol: "Mo", atomic_weight: 95.95, valences: [6, 4, 2] },
    Element { atomic_number: 43, symbol: "Tc", atomic_weight: 98.0, valences: [7, 4, 0] },
    Element { atomic_number: 44, symbol: "Ru", atomic_weight: 101.07, valences: [4, 3, 0] },
    Element { atomic_number: 45, symbol: "Rh", atomic_weight: 102.906, valences: [3, 0, 0] },
    Element { atomic_number: 46, symbol: "Pd", atomic_weight: 106.42, valences: [2, 4, 0] },
    Element { atomic_number: 47, symbol: "Ag", atomic_weight: 107.868, valences: [1, 0, 0] },
    Element { atomic_number: 48, symbol: "Cd", atomic_weight: 112.414, valences: [2, 0, 0] },
    Element { atomic_number: 49, symbol: "In", atomic_weight: 114.818, valences: [3, 0, 0] },
    Element { atomic_number: 50, symbol: "Sn", atomic_weight: 118.710, valences: [4, 2, 0] },
    Element { atomic_number: 51, symbol: "Sb", atomic_weight: 121.760, valences: [3, 5, 0] },
    Element { atomic_number: 52, symbol: "Te", atomic_weight: 127.60, valences: [2, 4, 6] },
    Element { atomic_number: 53, symbol: "I", atomic_weight: 126.904, valences: [1, 0, 0] },
    Element { atomic_number: 54, symbol: "Xe", atomic_weight: 131.293, valences: [0, 0, 0] },
];

/// Look up an element by its symbol (e.g. "C", "Fe").
pub fn element_by_symbol(symbol: &str) -> Option<&'static Element> {
    ELEMENTS.iter().find(|e| e.symbol == symbol)
}

/// Look up an element by its atomic number (1-based).
pub fn element_by_number(n: u8) -> Option<&'static Element> {
    if (1..=54).contains(&n) {
        Some(&ELEMENTS[(n - 1) as usize])
    } else {
        None
    }
}
