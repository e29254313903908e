use thiserror::Error;

/// One dihedral: four particle tags in bonded order and a dihedral type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dihedral {
    pub tags: [u32; 4],
    pub type_id: u32,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TopologyError {
    #[error("Dihedral {tags:?} lists the same particle more than once")]
    RepeatedMember { tags: [u32; 4] },
    #[error("Unknown dihedral type '{0}'")]
    UnknownTypeName(String),
    #[error("Dihedral type id {type_id} is out of range ({n_types} types defined)")]
    TypeOutOfRange { type_id: u32, n_types: usize },
}

/// Store of dihedral quadruples, immutable while a force is being evaluated.
#[derive(Debug, Clone, Default)]
pub struct DihedralData {
    dihedrals: Vec<Dihedral>,
    type_names: Vec<String>,
}

impl DihedralData {
    pub fn new(type_names: &[&str]) -> Self {
        Self {
            dihedrals: Vec::new(),
            type_names: type_names.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn add(&mut self, tags: [u32; 4], type_id: u32) -> Result<usize, TopologyError> {
        if type_id as usize >= self.type_names.len() {
            return Err(TopologyError::TypeOutOfRange {
                type_id,
                n_types: self.type_names.len(),
            });
        }
        for a in 0..4 {
            if tags[a + 1..].contains(&tags[a]) {
                return Err(TopologyError::RepeatedMember { tags });
            }
        }
        self.dihedrals.push(Dihedral { tags, type_id });
        Ok(self.dihedrals.len() - 1)
    }

    pub fn add_named(&mut self, tags: [u32; 4], type_name: &str) -> Result<usize, TopologyError> {
        let type_id = self.type_id(type_name)?;
        self.add(tags, type_id)
    }

    pub fn type_id(&self, name: &str) -> Result<u32, TopologyError> {
        self.type_names
            .iter()
            .position(|t| t == name)
            .map(|i| i as u32)
            .ok_or_else(|| TopologyError::UnknownTypeName(name.to_string()))
    }

    pub fn type_names(&self) -> &[String] {
        &self.type_names
    }

    pub fn n_types(&self) -> usize {
        self.type_names.len()
    }

    pub fn dihedrals(&self) -> &[Dihedral] {
        &self.dihedrals
    }

    pub fn len(&self) -> usize {
        self.dihedrals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dihedrals.is_empty()
    }

    /// Tag pairs separated by three bonds (the outer members of each dihedral).
    pub fn one_four_pairs(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.dihedrals.iter().map(|d| (d.tags[0], d.tags[3]))
    }
}
