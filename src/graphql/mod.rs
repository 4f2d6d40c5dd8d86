//! GraphQL documents and response handling

pub mod document;
pub mod nodes;
pub mod registry;

pub use document::{GraphQlDocument, OperationKind, VariableDef};
pub use nodes::dump_nodes;
pub use registry::{get_document, query_names};
