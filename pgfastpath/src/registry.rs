//! Function name to function id lookup table.
use std::collections::{HashMap, hash_map::Entry};

use parking_lot::RwLock;

use crate::{
    Result,
    common::{unit_error, verbose},
};

/// Connection scoped map of function name to function id.
///
/// Function ids are not guaranteed to stay the same across servers, even
/// of the same version. Prefer loading them from `pg_proc` with
/// [`register_all`][FunctionRegistry::register_all] over hard coding them.
///
/// Names are case sensitive. There is no removal.
#[derive(Debug, Default)]
pub struct FunctionRegistry {
    functions: RwLock<HashMap<String, i32>>,
}

impl FunctionRegistry {
    /// Create empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a function, replacing any previous id of the same name.
    pub fn register(&self, name: impl Into<String>, id: i32) {
        let name = name.into();
        verbose!(%name, id, "function registered");
        self.functions.write().insert(name, id);
    }

    /// Add functions from rows of `(name, id)`, usually a `pg_proc` query result.
    ///
    /// Unlike [`register`][FunctionRegistry::register], a name that is already
    /// present is skipped, the first registration wins. The id of a skipped row
    /// is not parsed.
    ///
    /// Returns the number of functions added.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidFunctionId`] if an id is not numeric. Rows before the
    /// invalid one stay registered.
    ///
    /// ```
    /// use pgfastpath::registry::FunctionRegistry;
    ///
    /// let registry = FunctionRegistry::new();
    /// registry.register_all([("lo_open", "952"), ("lo_open", "999")]).unwrap();
    /// assert_eq!(registry.resolve("lo_open").unwrap(), 952);
    /// ```
    pub fn register_all<R, N, I>(&self, rows: R) -> Result<usize>
    where
        R: IntoIterator<Item = (N, I)>,
        N: Into<String>,
        I: IntoFunctionId,
    {
        let mut functions = self.functions.write();
        let mut added = 0;
        for (name, id) in rows {
            if let Entry::Vacant(entry) = functions.entry(name.into()) {
                entry.insert(id.into_function_id()?);
                added += 1;
            }
        }
        verbose!(added, "functions registered");
        Ok(added)
    }

    /// Returns the function id of `name`.
    ///
    /// # Errors
    ///
    /// Returns [`FunctionNotFound`] if `name` was never registered.
    pub fn resolve(&self, name: &str) -> Result<i32> {
        match self.functions.read().get(name) {
            Some(id) => Ok(*id),
            None => Err(FunctionNotFound { name: name.into() }.into()),
        }
    }

    /// Returns `true` if `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.functions.read().contains_key(name)
    }

    /// Returns the number of registered functions.
    pub fn len(&self) -> usize {
        self.functions.read().len()
    }

    /// Returns `true` if no function is registered.
    pub fn is_empty(&self) -> bool {
        self.functions.read().is_empty()
    }
}

/// A function id column value.
///
/// Implemented for numeric ids and their text representation.
pub trait IntoFunctionId {
    fn into_function_id(self) -> Result<i32, InvalidFunctionId>;
}

impl IntoFunctionId for i32 {
    fn into_function_id(self) -> Result<i32, InvalidFunctionId> {
        Ok(self)
    }
}

impl IntoFunctionId for u32 {
    /// Oid above [`i32::MAX`] wrap, as it is sent on the wire.
    fn into_function_id(self) -> Result<i32, InvalidFunctionId> {
        Ok(self as i32)
    }
}

impl IntoFunctionId for &str {
    fn into_function_id(self) -> Result<i32, InvalidFunctionId> {
        let id = self.trim();
        match id.parse::<i32>() {
            Ok(id) => Ok(id),
            Err(_) => match id.parse::<u32>() {
                Ok(oid) => oid.into_function_id(),
                Err(_) => Err(InvalidFunctionId { id: self.into() }),
            },
        }
    }
}

impl IntoFunctionId for String {
    fn into_function_id(self) -> Result<i32, InvalidFunctionId> {
        self.as_str().into_function_id()
    }
}

unit_error! {
    /// An error when calling a function by a name that was never registered.
    pub struct FunctionNotFound("function not found", name: String);
}

unit_error! {
    /// An error when a registered function id is not numeric.
    pub struct InvalidFunctionId("invalid function id", id: String);
}
