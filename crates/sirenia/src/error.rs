#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("graph contains an edge with a missing endpoint: {edge_id}")]
    MissingEndpoint { edge_id: String },

    #[error("graph contains the node id more than once: {node_id}")]
    DuplicateNode { node_id: String },

    #[error("node {node_id} references an unknown parent: {parent_id}")]
    UnknownParent { node_id: String, parent_id: String },

    #[error("node {node_id} is part of a parent cycle")]
    ParentCycle { node_id: String },

    #[error("invalid graph operation: {message}")]
    InvalidGraphOperation { message: String },
}

impl Error {
    pub(crate) fn invalid_op(message: impl Into<String>) -> Self {
        Self::InvalidGraphOperation {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
