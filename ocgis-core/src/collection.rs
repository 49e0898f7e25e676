//! Collections of variables sharing a selection geometry
//!
//! An [`OcgCollection`] owns the variables produced for one selection geometry (`ugid`)
//! and the identifier tables that give variables, data sources and calculations stable
//! integer ids across the collection.

use crate::config::OcgConfig;
use crate::dimension::RenameToken;
use crate::errors::{OcgError, OcgResult};
use crate::identifier::Identifier;
use crate::variable::{DimensionKind, OcgVariable};
use indexmap::IndexMap;
use log::{debug, warn};
use std::ops::Deref;

/// Variables of one selection geometry with their shared id tables
///
/// Variables keep their insertion order, which is also the order they are melted in.
#[derive(Debug, Clone, PartialEq)]
pub struct OcgCollection {
    ugid: i64,
    variables: IndexMap<String, OcgVariable>,
    vid: Identifier,
    did: Identifier,
    cid: Identifier,
}

impl Default for OcgCollection {
    fn default() -> Self {
        Self::new()
    }
}

impl OcgCollection {
    pub fn new() -> Self {
        Self::with_ugid(1)
    }

    /// An empty collection for the selection geometry `ugid`
    pub fn with_ugid(ugid: i64) -> Self {
        Self {
            ugid,
            variables: IndexMap::new(),
            vid: Identifier::empty(),
            did: Identifier::empty(),
            cid: Identifier::empty(),
        }
    }

    /// An empty collection for the configured selection geometry
    pub fn from_config(config: &OcgConfig) -> Self {
        Self::with_ugid(config.ugid)
    }

    /// Id of the selection geometry
    pub fn ugid(&self) -> i64 {
        self.ugid
    }

    pub fn variables(&self) -> &IndexMap<String, OcgVariable> {
        &self.variables
    }

    pub fn variable(&self, name: &str) -> Option<&OcgVariable> {
        self.variables.get(name)
    }

    pub fn variable_mut(&mut self, name: &str) -> Option<&mut OcgVariable> {
        self.variables.get_mut(name)
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Variable name ids
    pub fn vid(&self) -> &Identifier {
        &self.vid
    }

    /// Data source ids, keyed by uri
    pub fn did(&self) -> &Identifier {
        &self.did
    }

    /// Calculation name ids
    pub fn cid(&self) -> &Identifier {
        &self.cid
    }

    /// True when every variable has been grouped in time
    pub fn is_grouped(&self) -> bool {
        !self.variables.is_empty()
            && self
                .variables
                .values()
                .all(|variable| variable.temporal_group().is_some())
    }

    /// Add a variable, registering its name and uri
    ///
    /// Fails with [`OcgError::DuplicateName`] if a variable of the same name exists.
    pub fn add_variable(&mut self, variable: OcgVariable) -> OcgResult<()> {
        let name = variable.name().to_string();
        if self.variables.contains_key(&name) {
            return Err(OcgError::DuplicateName(name));
        }
        self.vid.add([name.as_str()])?;
        match variable.uri() {
            Some(uri) => {
                self.did.add([uri])?;
            }
            None => warn!("variable {} has no uri, its did will be empty", name),
        }
        debug!("added variable {} to collection {}", name, self.ugid);
        self.variables.insert(name, variable);
        Ok(())
    }

    /// Register the calculation names of a variable and return their ids
    pub fn add_calculation(&mut self, var_name: &str) -> OcgResult<Vec<i64>> {
        let variable = self
            .variables
            .get(var_name)
            .ok_or_else(|| OcgError::Lookup(format!("no variable named {}", var_name)))?;
        self.cid
            .add(variable.calc_value().keys().map(|name| name.as_str()))
    }

    /// Move every variable of `other` into this collection
    ///
    /// Nothing is moved if any variable name is already taken.
    pub fn merge(&mut self, other: OcgCollection) -> OcgResult<()> {
        if let Some(name) = other
            .variables
            .keys()
            .find(|name| self.variables.contains_key(*name))
        {
            return Err(OcgError::DuplicateName(name.clone()));
        }
        let n = other.variables.len();
        for (_, variable) in other.variables {
            let has_calculations = !variable.calc_value().is_empty();
            let name = variable.name().to_string();
            self.add_variable(variable)?;
            if has_calculations {
                self.add_calculation(&name)?;
            }
        }
        debug!("merged {} variables into collection {}", n, self.ugid);
        Ok(())
    }

    /// Rename the output columns of one dimension on every variable
    ///
    /// The names are restored when the returned guard is dropped.
    pub fn renamed_dimensions(
        &mut self,
        kind: DimensionKind,
        uid: &str,
        value: &str,
    ) -> RenamedDimensions<'_> {
        let tokens = self
            .variables
            .iter_mut()
            .filter_map(|(name, variable)| {
                variable
                    .rename_dimension(kind, uid, value)
                    .map(|token| (name.clone(), token))
            })
            .collect();
        RenamedDimensions {
            collection: self,
            kind,
            tokens,
        }
    }
}

/// A collection with renamed dimensions, see [`OcgCollection::renamed_dimensions`]
pub struct RenamedDimensions<'a> {
    collection: &'a mut OcgCollection,
    kind: DimensionKind,
    tokens: Vec<(String, RenameToken)>,
}

impl Deref for RenamedDimensions<'_> {
    type Target = OcgCollection;

    fn deref(&self) -> &OcgCollection {
        self.collection
    }
}

impl Drop for RenamedDimensions<'_> {
    fn drop(&mut self) {
        for (name, token) in self.tokens.drain(..) {
            if let Some(variable) = self.collection.variables.get_mut(&name) {
                variable.restore_dimension(self.kind, token);
            }
        }
    }
}
