//! Resolution definitions (the "mapping table").
//!
//! A mapping file lists, in order, the coarse-graining resolutions for which
//! feature matrices are built, plus declared output shapes for residue types
//! whose matrices are cut down before use:
//!
//! ```toml
//! group-selection = "all"
//!
//! [[resolution]]
//! name = "AA"
//! selection = "not name H*"
//!
//! [[resolution]]
//! name = "M3COG"
//! beads = ["C1 C2 C3", "N1 O1"]
//!
//! [[truncate]]
//! residues = ["PMAP"]
//! resolution = "AA"
//! from = [16, 16]
//! to = [12, 12]
//! ```
//!
//! Each resolution is resolved into a [`ResolutionKind`] once, at load time.

use crate::core::selection::{Selection, SelectionError};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

/// Residue types whose 16x16 matrices are reduced to their top-left 12x12 block.
const BUILTIN_TRUNCATED_RESIDUES: [&str; 3] = ["PMAP", "PEPP", "PVBP"];

#[derive(Debug, Error)]
pub enum MappingError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
    #[error("Invalid selection for resolution '{resolution}': {source}")]
    Selection {
        resolution: String,
        source: SelectionError,
    },
    #[error("Invalid resolution '{name}': {reason}")]
    InvalidResolution { name: String, reason: String },
    #[error("Resolution '{0}' is defined more than once")]
    DuplicateResolution(String),
    #[error("Mapping table defines no resolutions")]
    Empty,
    #[error("Unknown resolution '{0}'")]
    UnknownResolution(String),
    #[error("Invalid truncation rule: {0}")]
    InvalidTruncation(String),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct MappingFile {
    group_selection: Option<String>,
    #[serde(default)]
    resolution: Vec<ResolutionEntry>,
    #[serde(default)]
    truncate: Vec<TruncateEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct ResolutionEntry {
    name: String,
    selection: Option<String>,
    beads: Option<Vec<String>>,
    atoms: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct TruncateEntry {
    residues: Vec<String>,
    resolution: Option<String>,
    from: [usize; 2],
    to: [usize; 2],
}

/// How a resolution reduces a monomer to the points that enter a feature matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionKind {
    /// The selected atoms themselves, in topology order.
    Explicit(Selection),
    /// One pseudo-bead per selection, placed at the unweighted centroid of its atoms.
    BeadCentroid(Vec<Selection>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub name: String,
    pub kind: ResolutionKind,
}

impl Resolution {
    pub fn explicit(name: &str, selection: &str) -> Result<Self, MappingError> {
        let selection = Selection::parse(selection).map_err(|source| MappingError::Selection {
            resolution: name.to_string(),
            source,
        })?;
        Ok(Self {
            name: name.to_string(),
            kind: ResolutionKind::Explicit(selection),
        })
    }

    /// Builds a bead resolution; each group is a whitespace-separated list of atom names.
    pub fn beads<S: AsRef<str>>(name: &str, groups: &[S]) -> Result<Self, MappingError> {
        if groups.is_empty() {
            return Err(MappingError::InvalidResolution {
                name: name.to_string(),
                reason: "bead list is empty".to_string(),
            });
        }
        let selections = groups
            .iter()
            .map(|group| {
                let atoms: Vec<&str> = group.as_ref().split_whitespace().collect();
                if atoms.is_empty() {
                    return Err(MappingError::InvalidResolution {
                        name: name.to_string(),
                        reason: "bead with no atom names".to_string(),
                    });
                }
                Selection::names(&atoms).map_err(|source| MappingError::Selection {
                    resolution: name.to_string(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            name: name.to_string(),
            kind: ResolutionKind::BeadCentroid(selections),
        })
    }

    pub fn is_explicit(&self) -> bool {
        matches!(self.kind, ResolutionKind::Explicit(_))
    }

    fn from_entry(entry: &ResolutionEntry) -> Result<Self, MappingError> {
        match (&entry.selection, &entry.beads, &entry.atoms) {
            (Some(selection), None, None) => Self::explicit(&entry.name, selection),
            (None, Some(beads), None) => Self::beads(&entry.name, beads),
            (None, None, Some(atoms)) => {
                if entry.name.contains("GB") || entry.name.contains("COG") {
                    let groups: Vec<&str> = atoms.split(',').collect();
                    Self::beads(&entry.name, &groups)
                } else {
                    Self::explicit(&entry.name, atoms)
                }
            }
            _ => Err(MappingError::InvalidResolution {
                name: entry.name.clone(),
                reason: "exactly one of 'selection', 'beads' or 'atoms' must be given"
                    .to_string(),
            }),
        }
    }
}

/// Declared output shape for matching residue types and resolutions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TruncationRule {
    pub residues: Vec<String>,
    /// `None` applies the rule to every resolution.
    pub resolution: Option<String>,
    pub from: (usize, usize),
    pub to: (usize, usize),
}

impl TruncationRule {
    pub fn applies_to(&self, residue_name: &str, resolution: &str, shape: (usize, usize)) -> bool {
        shape == self.from
            && self.residues.iter().any(|r| r == residue_name)
            && self.resolution.as_deref().is_none_or(|r| r == resolution)
    }

    fn builtin() -> Self {
        Self {
            residues: BUILTIN_TRUNCATED_RESIDUES
                .iter()
                .map(|r| r.to_string())
                .collect(),
            resolution: None,
            from: (16, 16),
            to: (12, 12),
        }
    }
}

/// Ordered, immutable collection of resolutions and output-shape rules.
#[derive(Debug, Clone)]
pub struct MappingTable {
    group_selection: Selection,
    resolutions: Vec<Resolution>,
    truncations: Vec<TruncationRule>,
}

impl MappingTable {
    /// Builds a table from already-resolved resolutions; the built-in truncation rule is included.
    pub fn new(
        group_selection: Selection,
        resolutions: Vec<Resolution>,
    ) -> Result<Self, MappingError> {
        if resolutions.is_empty() {
            return Err(MappingError::Empty);
        }
        let mut seen = HashSet::new();
        for resolution in &resolutions {
            if !seen.insert(resolution.name.as_str()) {
                return Err(MappingError::DuplicateResolution(resolution.name.clone()));
            }
        }
        Ok(Self {
            group_selection,
            resolutions,
            truncations: vec![TruncationRule::builtin()],
        })
    }

    pub fn load(path: &Path) -> Result<Self, MappingError> {
        let content = std::fs::read_to_string(path).map_err(|e| MappingError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        let file: MappingFile = toml::from_str(&content).map_err(|e| MappingError::Toml {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        Self::from_file(file)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, MappingError> {
        let file: MappingFile = toml::from_str(content).map_err(|e| MappingError::Toml {
            path: "<inline>".to_string(),
            source: e,
        })?;
        Self::from_file(file)
    }

    fn from_file(file: MappingFile) -> Result<Self, MappingError> {
        let group_source = file.group_selection.as_deref().unwrap_or("all");
        let group_selection =
            Selection::parse(group_source).map_err(|source| MappingError::Selection {
                resolution: "group-selection".to_string(),
                source,
            })?;
        let resolutions = file
            .resolution
            .iter()
            .map(Resolution::from_entry)
            .collect::<Result<Vec<_>, _>>()?;
        let mut table = Self::new(group_selection, resolutions)?;
        for entry in file.truncate {
            table.add_truncation(TruncationRule {
                residues: entry.residues,
                resolution: entry.resolution,
                from: (entry.from[0], entry.from[1]),
                to: (entry.to[0], entry.to[1]),
            })?;
        }
        Ok(table)
    }

    /// Adds a declared output shape. Rules added later take precedence over earlier ones.
    pub fn add_truncation(&mut self, rule: TruncationRule) -> Result<(), MappingError> {
        if rule.to.0 > rule.from.0 || rule.to.1 > rule.from.1 {
            return Err(MappingError::InvalidTruncation(format!(
                "target shape {:?} exceeds source shape {:?}",
                rule.to, rule.from
            )));
        }
        if rule.residues.is_empty() {
            return Err(MappingError::InvalidTruncation(
                "rule names no residue types".to_string(),
            ));
        }
        if let Some(name) = &rule.resolution {
            if self.get(name).is_none() {
                return Err(MappingError::UnknownResolution(name.clone()));
            }
        }
        self.truncations.push(rule);
        Ok(())
    }

    /// Atoms of a monomer used for its center of mass and for the alignment fit.
    pub fn group_selection(&self) -> &Selection {
        &self.group_selection
    }

    pub fn resolutions(&self) -> &[Resolution] {
        &self.resolutions
    }

    pub fn get(&self, name: &str) -> Option<&Resolution> {
        self.resolutions.iter().find(|r| r.name == name)
    }

    pub fn require(&self, name: &str) -> Result<&Resolution, MappingError> {
        self.get(name)
            .ok_or_else(|| MappingError::UnknownResolution(name.to_string()))
    }

    /// The last resolution in file order.
    pub fn last(&self) -> &Resolution {
        // `new` rejects empty tables.
        &self.resolutions[self.resolutions.len() - 1]
    }

    pub fn truncations(&self) -> &[TruncationRule] {
        &self.truncations
    }

    /// Shape a `shape`-sized matrix of `residue_name` at `resolution` is cut down to, if any.
    pub fn truncation_for(
        &self,
        residue_name: &str,
        resolution: &str,
        shape: (usize, usize),
    ) -> Option<(usize, usize)> {
        self.truncations
            .iter()
            .rev()
            .find(|rule| rule.applies_to(residue_name, resolution, shape))
            .map(|rule| rule.to)
    }

    /// Final matrix shape after any declared truncation.
    pub fn output_shape(
        &self,
        residue_name: &str,
        resolution: &str,
        shape: (usize, usize),
    ) -> (usize, usize) {
        self.truncation_for(residue_name, resolution, shape)
            .unwrap_or(shape)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    const MAPPING: &str = r#"
        group-selection = "not name H*"

        [[resolution]]
        name = "AA"
        selection = "all"

        [[resolution]]
        name = "M3COG"
        beads = ["C1 C2", "N1"]

        [[resolution]]
        name = "M2GB"
        atoms = "C1 C2,O1"

        [[resolution]]
        name = "HEAVY"
        atoms = "not name H*"

        [[truncate]]
        residues = ["PTMA"]
        resolution = "AA"
        from = [10, 10]
        to = [8, 8]
    "#;

    #[test]
    fn load_resolves_resolutions_in_file_order() {
        let table = MappingTable::from_toml_str(MAPPING).unwrap();
        let names: Vec<&str> = table.resolutions().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["AA", "M3COG", "M2GB", "HEAVY"]);
        assert_eq!(table.group_selection().as_str(), "not name H*");
        assert_eq!(table.last().name, "HEAVY");

        assert!(table.get("AA").unwrap().is_explicit());
        match &table.get("M3COG").unwrap().kind {
            ResolutionKind::BeadCentroid(beads) => {
                assert_eq!(beads.len(), 2);
                assert_eq!(beads[0].as_str(), "name C1 C2");
            }
            other => panic!("expected beads, got {:?}", other),
        }
    }

    #[test]
    fn legacy_atoms_string_uses_naming_convention() {
        let table = MappingTable::from_toml_str(MAPPING).unwrap();
        match &table.get("M2GB").unwrap().kind {
            ResolutionKind::BeadCentroid(beads) => {
                assert_eq!(beads.len(), 2);
                assert_eq!(beads[1].as_str(), "name O1");
            }
            other => panic!("expected beads, got {:?}", other),
        }
        assert!(table.get("HEAVY").unwrap().is_explicit());
    }

    #[test]
    fn builtin_truncation_applies_to_designated_residues_only() {
        let table = MappingTable::from_toml_str(MAPPING).unwrap();
        assert_eq!(table.truncation_for("PMAP", "AA", (16, 16)), Some((12, 12)));
        assert_eq!(table.truncation_for("PVBP", "M3COG", (16, 16)), Some((12, 12)));
        assert_eq!(table.truncation_for("PMAP", "AA", (14, 14)), None);
        assert_eq!(table.truncation_for("PTMA", "M3COG", (16, 16)), None);
        assert_eq!(table.output_shape("PTMA", "M3COG", (16, 16)), (16, 16));
    }

    #[test]
    fn file_truncation_rules_are_scoped_to_their_resolution() {
        let table = MappingTable::from_toml_str(MAPPING).unwrap();
        assert_eq!(table.output_shape("PTMA", "AA", (10, 10)), (8, 8));
        assert_eq!(table.output_shape("PTMA", "HEAVY", (10, 10)), (10, 10));
    }

    #[test]
    fn ambiguous_or_missing_definition_is_rejected() {
        let toml = r#"
            [[resolution]]
            name = "AA"
            selection = "all"
            beads = ["C1"]
        "#;
        assert!(matches!(
            MappingTable::from_toml_str(toml),
            Err(MappingError::InvalidResolution { .. })
        ));

        let toml = r#"
            [[resolution]]
            name = "AA"
        "#;
        assert!(matches!(
            MappingTable::from_toml_str(toml),
            Err(MappingError::InvalidResolution { .. })
        ));
    }

    #[test]
    fn empty_bead_and_bad_selection_are_rejected() {
        let toml = r#"
            [[resolution]]
            name = "XCOG"
            atoms = "C1,,O1"
        "#;
        assert!(matches!(
            MappingTable::from_toml_str(toml),
            Err(MappingError::InvalidResolution { .. })
        ));

        let toml = r#"
            [[resolution]]
            name = "AA"
            selection = "bynum 1:4"
        "#;
        assert!(matches!(
            MappingTable::from_toml_str(toml),
            Err(MappingError::Selection { .. })
        ));
    }

    #[test]
    fn duplicate_and_empty_tables_are_rejected() {
        let toml = r#"
            [[resolution]]
            name = "AA"
            selection = "all"
            [[resolution]]
            name = "AA"
            selection = "name C*"
        "#;
        assert!(matches!(
            MappingTable::from_toml_str(toml),
            Err(MappingError::DuplicateResolution(_))
        ));
        assert!(matches!(
            MappingTable::from_toml_str("group-selection = \"all\""),
            Err(MappingError::Empty)
        ));
    }

    #[test]
    fn truncation_rule_must_reference_known_resolution_and_shrink() {
        let toml = r#"
            [[resolution]]
            name = "AA"
            selection = "all"
            [[truncate]]
            residues = ["PTMA"]
            resolution = "CG"
            from = [4, 4]
            to = [2, 2]
        "#;
        assert!(matches!(
            MappingTable::from_toml_str(toml),
            Err(MappingError::UnknownResolution(_))
        ));

        let toml = r#"
            [[resolution]]
            name = "AA"
            selection = "all"
            [[truncate]]
            residues = ["PTMA"]
            from = [4, 4]
            to = [6, 2]
        "#;
        assert!(matches!(
            MappingTable::from_toml_str(toml),
            Err(MappingError::InvalidTruncation(_))
        ));
    }

    #[test]
    fn load_reports_missing_file_and_unknown_keys() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        assert!(matches!(
            MappingTable::load(&missing),
            Err(MappingError::Io { .. })
        ));

        let path = dir.path().join("mapping.toml");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "colour = \"blue\"").unwrap();
        assert!(matches!(
            MappingTable::load(&path),
            Err(MappingError::Toml { .. })
        ));
    }
}
