use std::collections::HashMap;

/// A monomer (repeat unit) of the polymer.
///
/// Identity persists across trajectory frames through `id`; the geometry does
/// not, and is looked up per frame through the atom indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Residue {
    pub id: isize,                         // Residue sequence number from source file
    pub name: String,                      // Residue-type name (e.g., "PTMA", "PMAP")
    pub(crate) atoms: Vec<usize>,          // Topology indices of atoms belonging to this residue
    atom_name_map: HashMap<String, usize>, // Map from atom name to its topology index
}

impl Residue {
    pub(crate) fn new(id: isize, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            atoms: Vec::new(),
            atom_name_map: HashMap::new(),
        }
    }

    pub(crate) fn add_atom(&mut self, atom_name: &str, atom_index: usize) {
        self.atoms.push(atom_index);
        self.atom_name_map
            .entry(atom_name.to_string())
            .or_insert(atom_index);
    }

    pub fn atoms(&self) -> &[usize] {
        &self.atoms
    }

    pub fn get_atom_index_by_name(&self, name: &str) -> Option<usize> {
        self.atom_name_map.get(name).copied()
    }
}
