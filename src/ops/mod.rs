pub mod shortcut;
pub mod suggest;
pub mod tree_ops;
pub mod validate;
