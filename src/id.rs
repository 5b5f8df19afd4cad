//! Code for handling string identifiers (projects, load zones, timepoints etc.)
use anyhow::{Context, Result};
use indexmap::{IndexMap, IndexSet};
use std::borrow::Borrow;
use std::collections::HashSet;
use std::fmt::Display;
use std::hash::Hash;

/// The trait bounds shared by all ID types
pub trait IDLike: Eq + Hash + Borrow<str> + Clone + Display + From<String> {}
impl<T> IDLike for T where T: Eq + Hash + Borrow<str> + Clone + Display + From<String> {}

/// Define a new reference-counted string ID type
macro_rules! define_id_type {
    ($name:ident) => {
        #[derive(
            Clone,
            std::hash::Hash,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Debug,
            serde::Deserialize,
            serde::Serialize,
        )]
        /// An identifier (e.g. `ProjectID`, `ZoneID`) backed by a shared string
        pub struct $name(pub std::rc::Rc<str>);

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(std::rc::Rc::from(s))
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                $name(std::rc::Rc::from(s))
            }
        }

        impl $name {
            /// Create a new ID from a string slice
            pub fn new(id: &str) -> Self {
                $name(std::rc::Rc::from(id))
            }
        }
    };
}
pub(crate) use define_id_type;

#[cfg(test)]
define_id_type!(GenericID);

/// Look up IDs by their string form, returning a shared copy of the stored ID
pub trait IDCollection<ID: IDLike> {
    /// Get the ID from the collection by its string representation.
    ///
    /// Returns an error naming the ID if it is not present.
    fn get_id(&self, id: &str) -> Result<ID>;
}

impl<ID: IDLike> IDCollection<ID> for HashSet<ID> {
    fn get_id(&self, id: &str) -> Result<ID> {
        self.get(id)
            .cloned()
            .with_context(|| format!("Unknown ID {id} found"))
    }
}

impl<ID: IDLike> IDCollection<ID> for IndexSet<ID> {
    fn get_id(&self, id: &str) -> Result<ID> {
        self.get(id)
            .cloned()
            .with_context(|| format!("Unknown ID {id} found"))
    }
}

impl<ID: IDLike, V> IDCollection<ID> for IndexMap<ID, V> {
    fn get_id(&self, id: &str) -> Result<ID> {
        self.get_key_value(id)
            .map(|(key, _)| key.clone())
            .with_context(|| format!("Unknown ID {id} found"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("a", true)]
    #[case("b", true)]
    #[case("c", false)]
    fn test_get_id(#[case] id: &str, #[case] found: bool) {
        let ids: IndexSet<GenericID> = ["a".into(), "b".into()].into_iter().collect();
        assert_eq!(ids.get_id(id).is_ok(), found);

        let map: IndexMap<GenericID, u32> = ids.into_iter().map(|id| (id, 0)).collect();
        assert_eq!(map.get_id(id).is_ok(), found);
    }

    #[test]
    fn test_get_id_error_message() {
        let ids: HashSet<GenericID> = HashSet::new();
        assert_eq!(
            ids.get_id("missing").unwrap_err().to_string(),
            "Unknown ID missing found"
        );
    }
}
