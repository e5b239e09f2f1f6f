//! Error taxonomy for loading scenes
//!
//! Two kinds of failure never mix:
//!
//! - [`SceneError`]: fatal for the resource being loaded ([`DocumentCorrupt`]
//!   or [`ReentrancyViolation`]). The partial result is discarded.
//! - [`ObjectResolutionFailure`]: one object could not be resolved. It is
//!   logged and recorded, and loading continues with its siblings.

use thiserror::Error;

use crate::host::HostError;
use crate::resource::ResourceError;

/// The document cannot be materialized
#[derive(Debug, Error)]
pub enum DocumentCorrupt {
    /// XML syntax error
    #[error("malformed XML: {0}")]
    Xml(String),

    /// Root element is not `scene`
    #[error("missing <scene> root element (found <{0}>)")]
    MissingRoot(String),

    /// A required attribute is absent
    #[error("<{element}> is missing required attribute '{attribute}'")]
    MissingAttribute {
        /// Element tag
        element: String,
        /// Attribute name
        attribute: String,
    },

    /// An attribute that must be numeric is not
    #[error("<{element}> attribute '{attribute}' is not a valid number: '{value}'")]
    MalformedNumber {
        /// Element tag
        element: String,
        /// Attribute name
        attribute: String,
        /// Offending text
        value: String,
    },

    /// A token has no safe fallback
    #[error("<{element}> attribute '{attribute}' has unsupported value '{value}'")]
    InvalidValue {
        /// Element tag
        element: String,
        /// Attribute name
        attribute: String,
        /// Offending text
        value: String,
    },

    /// The document could not be read
    #[error("cannot read document: {0}")]
    Resource(#[from] ResourceError),
}

/// A resource was materialized twice without an unload in between
#[derive(Debug, Error)]
#[error("scene root node '{root}' already exists")]
pub struct ReentrancyViolation {
    /// Computed root node name
    pub root: String,
}

/// Fatal load failure
#[derive(Debug, Error)]
pub enum SceneError {
    /// Corrupt document
    #[error(transparent)]
    Corrupt(#[from] DocumentCorrupt),

    /// Re-entrant materialization
    #[error(transparent)]
    Reentrancy(#[from] ReentrancyViolation),

    /// The host rejected an operation the structure depends on
    #[error("host failure: {0}")]
    Host(#[from] HostError),
}

impl From<ResourceError> for SceneError {
    fn from(error: ResourceError) -> Self {
        Self::Corrupt(DocumentCorrupt::Resource(error))
    }
}

/// One object could not be resolved against the host
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{category} '{object}': cannot resolve '{reference}': {reason}")]
pub struct ObjectResolutionFailure {
    /// Category of the object being built
    pub category: &'static str,
    /// Object being built
    pub object: String,
    /// Reference that failed (mesh, material, node, ...)
    pub reference: String,
    /// Host explanation
    pub reason: String,
}

impl ObjectResolutionFailure {
    /// Failure for `object` caused by `reference`
    pub fn new(
        category: &'static str,
        object: impl Into<String>,
        reference: impl Into<String>,
        reason: impl ToString,
    ) -> Self {
        Self {
            category,
            object: object.into(),
            reference: reference.into(),
            reason: reason.to_string(),
        }
    }
}

/// Outcome of processing one leaf element
#[derive(Debug)]
pub(crate) enum LeafError {
    /// Abort the whole load
    Fatal(SceneError),
    /// Skip or degrade this object and carry on
    Unresolved(ObjectResolutionFailure),
}

impl From<SceneError> for LeafError {
    fn from(error: SceneError) -> Self {
        Self::Fatal(error)
    }
}

impl From<DocumentCorrupt> for LeafError {
    fn from(error: DocumentCorrupt) -> Self {
        Self::Fatal(SceneError::Corrupt(error))
    }
}

impl From<ObjectResolutionFailure> for LeafError {
    fn from(failure: ObjectResolutionFailure) -> Self {
        Self::Unresolved(failure)
    }
}

impl From<HostError> for LeafError {
    fn from(error: HostError) -> Self {
        Self::Fatal(SceneError::Host(error))
    }
}

/// Scene catalog errors
#[derive(Debug, Error)]
pub enum CatalogError {
    /// No scene of that name
    #[error("unknown scene '{0}'")]
    UnknownScene(String),

    /// Loading the scene failed
    #[error("failed to load scene '{name}': {source}")]
    Load {
        /// Scene name
        name: String,
        /// Cause
        #[source]
        source: SceneError,
    },

    /// Unloading the scene failed
    #[error("failed to unload scene '{name}': {source}")]
    Unload {
        /// Scene name
        name: String,
        /// Cause
        #[source]
        source: SceneError,
    },
}

/// Export errors
#[derive(Debug, Error)]
pub enum ExportError {
    /// Writing the file failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Producing XML failed
    #[error("XML error: {0}")]
    Xml(String),

    /// Only loaded scenes can be exported
    #[error("scene '{0}' is not loaded")]
    NotLoaded(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaf_error_routing() {
        let fatal: LeafError = DocumentCorrupt::MissingRoot("nodes".into()).into();
        assert!(matches!(fatal, LeafError::Fatal(SceneError::Corrupt(_))));

        let unresolved: LeafError = ObjectResolutionFailure::new("entity", "Box", "box.mesh", "not found").into();
        assert!(matches!(unresolved, LeafError::Unresolved(_)));
    }

    #[test]
    fn test_messages() {
        let err = DocumentCorrupt::MissingAttribute {
            element: "position".into(),
            attribute: "x".into(),
        };
        assert_eq!(err.to_string(), "<position> is missing required attribute 'x'");

        let failure = ObjectResolutionFailure::new("entity", "Box", "Rock", "material 'Rock' not found");
        assert_eq!(
            failure.to_string(),
            "entity 'Box': cannot resolve 'Rock': material 'Rock' not found"
        );
    }
}
