//! Registering elections, casting votes and counting them.
//!
//! Every component borrows the store and config for the duration of one
//! request; none of them hold state of their own.

mod coordinator;
mod registry;
mod tally;

pub use coordinator::{Committed, VoteCoordinator, VoteStage};
pub use registry::{CandidateRegistry, ElectionRegistry, VoterRegistry};
pub use tally::TallyAggregator;
