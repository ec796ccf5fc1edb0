//! Event handlers, one module per event family.
//!
//! Every handler runs inside the transaction opened for its event and
//! either completes or returns the error that rolls the event back.

pub(crate) mod content_stream;
pub(crate) mod dimension;
pub(crate) mod node_creation;
pub(crate) mod node_modification;
pub(crate) mod node_move;
pub(crate) mod node_removal;
pub(crate) mod node_variation;
pub(crate) mod restriction;
pub(crate) mod subtree_tagging;
pub(crate) mod workspace;
