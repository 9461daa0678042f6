use super::atom::Atom;
use super::residue::Residue;

/// Static atom/residue metadata shared by every frame of a trajectory.
///
/// Atoms are stored in file order; residues hold the indices of their atoms.
/// This mirrors the topology half of an MD-analysis universe: names, residue
/// membership, and masses, with no coordinates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Topology {
    atoms: Vec<Atom>,
    residues: Vec<Residue>,
}

impl Topology {
    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub fn residues(&self) -> &[Residue] {
        &self.residues
    }

    pub fn atom(&self, index: usize) -> Option<&Atom> {
        self.atoms.get(index)
    }

    pub fn residue(&self, index: usize) -> Option<&Residue> {
        self.residues.get(index)
    }

    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    /// Returns the indices of all residues with the given residue-type name, in file order.
    pub fn residues_named(&self, name: &str) -> Vec<usize> {
        self.residues
            .iter()
            .enumerate()
            .filter(|(_, r)| r.name == name)
            .map(|(i, _)| i)
            .collect()
    }
}

/// Incrementally constructs a [`Topology`] while a structure file is parsed.
///
/// A new residue starts whenever the residue id or name differs from the one
/// of the previously added atom, so wrapped residue numbers (as in GRO files
/// with more than 99999 residues) still produce distinct residues.
#[derive(Debug, Default)]
pub struct TopologyBuilder {
    topology: Topology,
    current: Option<(isize, String)>,
}

impl TopologyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_atom(
        &mut self,
        residue_id: isize,
        residue_name: &str,
        atom_name: &str,
        element: Option<&str>,
    ) -> usize {
        let starts_new_residue = match &self.current {
            Some((id, name)) => *id != residue_id || name != residue_name,
            None => true,
        };
        if starts_new_residue {
            self.topology
                .residues
                .push(Residue::new(residue_id, residue_name));
            self.current = Some((residue_id, residue_name.to_string()));
        }

        let residue_index = self.topology.residues.len() - 1;
        let atom_index = self.topology.atoms.len();
        let atom = match element {
            Some(symbol) => Atom::with_element(atom_name, residue_index, symbol),
            None => Atom::new(atom_name, residue_index),
        };
        self.topology.atoms.push(atom);
        self.topology.residues[residue_index].add_atom(atom_name, atom_index);
        atom_index
    }

    pub fn build(self) -> Topology {
        self.topology
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_residue_topology() -> Topology {
        let mut builder = TopologyBuilder::new();
        builder.add_atom(1, "PTMA", "C1", None);
        builder.add_atom(1, "PTMA", "N1", None);
        builder.add_atom(2, "PTMA", "C1", None);
        builder.add_atom(3, "END", "H1", Some("H"));
        builder.build()
    }

    #[test]
    fn builder_groups_consecutive_atoms_into_residues() {
        let topology = two_residue_topology();
        assert_eq!(topology.atom_count(), 4);
        assert_eq!(topology.residues().len(), 3);
        assert_eq!(topology.residue(0).unwrap().atoms(), &[0, 1]);
        assert_eq!(topology.residue(1).unwrap().atoms(), &[2]);
        assert_eq!(topology.atom(2).unwrap().residue_index, 1);
    }

    #[test]
    fn builder_starts_new_residue_when_id_repeats_after_other_residue() {
        let mut builder = TopologyBuilder::new();
        builder.add_atom(1, "PTMA", "C1", None);
        builder.add_atom(2, "PTMA", "C1", None);
        builder.add_atom(1, "PTMA", "C1", None);
        let topology = builder.build();
        assert_eq!(topology.residues().len(), 3);
    }

    #[test]
    fn residues_named_filters_by_type_in_file_order() {
        let topology = two_residue_topology();
        assert_eq!(topology.residues_named("PTMA"), vec![0, 1]);
        assert_eq!(topology.residues_named("END"), vec![2]);
        assert!(topology.residues_named("XXX").is_empty());
    }
}
