//! Arrow reference resolution and smart join materialization.

mod resolver;
mod smart_join;

pub use resolver::{is_path, BindingSide, PathBinding, PathResolver, TargetSide, INCOMING, OUTGOING};
pub use smart_join::{
    rewrite_delete, rewrite_select, rewrite_update, PathRewriter, SmartJoinKey, SmartJoins,
};
