//! Chatbot option tree editor
//!
//! A queue's chatbot menu is a tree of options. Each option may carry an
//! attachment and either end the chatbot or forward the chat to another
//! queue. Nodes are persisted one at a time.

pub mod editor;
pub mod node;
pub mod tree;

pub use editor::OptionTreeEditor;
pub use node::{NodeKey, NodeState, OptionNode};
pub use tree::{OptionTree, OutlineRow};
