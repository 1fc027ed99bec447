/*!
 * Resumable translation progress.
 *
 * - `connection`: SQLite connection shared across workers
 * - `schema`: table definitions
 * - `store`: checkpoint load, mark_done, reset and listing
 */

pub mod connection;
pub mod schema;
pub mod store;

pub use connection::DatabaseConnection;
pub use store::{Checkpoint, CheckpointKey, CheckpointStore, CheckpointSummary};
