//! Request handlers for the `/api/v1` surface.

mod health;
mod microcosms;
mod profiles;
mod questions;
mod reactions;
mod watchers;

pub use health::db_health;
pub use microcosms::microcosm_tree;
pub use profiles::{get_permissions, mark_read, whoami};
pub use questions::{
    create_question, delete_question, get_question, get_question_summary, import_question,
    list_questions, patch_question, update_question,
};
pub use reactions::{clear_reaction, get_reaction, set_reaction};
pub use watchers::{delete_watcher, delete_watcher_for_item, get_watcher, update_watcher};
