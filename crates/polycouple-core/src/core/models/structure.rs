use super::topology::Topology;
use nalgebra::Point3;

/// A single-frame atomic geometry, such as a quantum-chemistry optimized reference monomer.
///
/// Reference structures are loaded once and shared read-only; alignment never
/// mutates them and instead returns a caller-owned coordinate copy.
#[derive(Debug, Clone, PartialEq)]
pub struct Structure {
    topology: Topology,
    positions: Vec<Point3<f64>>,
}

impl Structure {
    pub fn new(topology: Topology, positions: Vec<Point3<f64>>) -> Self {
        debug_assert_eq!(topology.atom_count(), positions.len());
        Self {
            topology,
            positions,
        }
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn positions(&self) -> &[Point3<f64>] {
        &self.positions
    }

    pub fn atom_count(&self) -> usize {
        self.positions.len()
    }

    pub fn masses(&self) -> Vec<f64> {
        self.topology.atoms().iter().map(|a| a.mass).collect()
    }

    pub fn atom_names(&self) -> Vec<&str> {
        self.topology
            .atoms()
            .iter()
            .map(|a| a.name.as_str())
            .collect()
    }

    /// Name of the first residue, used to label single-monomer references.
    pub fn residue_name(&self) -> Option<&str> {
        self.topology.residues().first().map(|r| r.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::topology::TopologyBuilder;

    #[test]
    fn structure_exposes_topology_data() {
        let mut builder = TopologyBuilder::new();
        builder.add_atom(1, "PTMA", "C1", None);
        builder.add_atom(1, "PTMA", "O1", None);
        let structure = Structure::new(
            builder.build(),
            vec![Point3::new(0.0, 0.0, 0.0), Point3::new(1.2, 0.0, 0.0)],
        );

        assert_eq!(structure.atom_count(), 2);
        assert_eq!(structure.atom_names(), vec!["C1", "O1"]);
        assert_eq!(structure.residue_name(), Some("PTMA"));
        let masses = structure.masses();
        assert!((masses[0] - 12.011).abs() < 1e-9);
        assert!((masses[1] - 15.999).abs() < 1e-9);
    }
}
