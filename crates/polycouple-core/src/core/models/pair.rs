/// One admitted monomer pair.
///
/// Created once when the pair passes the cutoff and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct PairRecord {
    /// Run-wide admission counter, starting at 1.
    pub pair_index: usize,
    /// Topology index of the first monomer residue.
    pub i_residue: usize,
    /// Topology index of the second monomer residue.
    pub j_residue: usize,
    /// Residue id of the first monomer as written in the input file.
    pub i_residue_id: isize,
    /// Residue id of the second monomer as written in the input file.
    pub j_residue_id: isize,
    /// Center-of-mass distance in Å.
    pub com_distance: f64,
    /// Frame time in ps.
    pub time: f64,
}
