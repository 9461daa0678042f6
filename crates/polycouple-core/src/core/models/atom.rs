use crate::core::utils::elements::{guess_element, mass_of, normalize_symbol};

/// Represents one atom of a molecular topology.
///
/// Coordinates are deliberately not stored here: trajectory positions change
/// every frame and live in [`Frame`](super::frame::Frame), while reference
/// geometries keep theirs in [`Structure`](super::structure::Structure).
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    /// The name of the atom (e.g., "C1", "N09", "O3").
    pub name: String,
    /// Index of the parent residue within the owning topology.
    pub residue_index: usize,
    /// Element symbol, either read from the input file or guessed from the name.
    pub element: String,
    /// Atomic mass in Daltons, used for centers of mass and weighted fits.
    pub mass: f64,
}

impl Atom {
    /// Creates a new `Atom`, guessing its element and mass from the atom name.
    ///
    /// # Arguments
    ///
    /// * `name` - The name of the atom.
    /// * `residue_index` - The index of the residue this atom belongs to.
    pub fn new(name: &str, residue_index: usize) -> Self {
        let element = guess_element(name);
        Self::with_element(name, residue_index, &element)
    }

    /// Creates a new `Atom` with an explicitly known element symbol.
    ///
    /// Unknown symbols fall back to guessing from the atom name, so a blank
    /// element column in a PDB file behaves like a missing one.
    pub fn with_element(name: &str, residue_index: usize, element: &str) -> Self {
        let element = if mass_of(element).is_some() {
            normalize_symbol(element)
        } else {
            guess_element(name)
        };
        let mass = mass_of(&element).unwrap_or(0.0);
        Self {
            name: name.to_string(),
            residue_index,
            element,
            mass,
        }
    }
}
