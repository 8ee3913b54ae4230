//! Replay engine: cursors over recorded responses, response materialization
//! and the per-request router used by every replay listener.

mod cursor;
mod materialize;
mod router;
mod state;

pub use cursor::{ConsumeError, Cursor};
pub use materialize::{materialize, MaterializedResponse};
pub use router::handle_replay_request;
pub use state::ReplayState;
