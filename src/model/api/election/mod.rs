mod desc;
mod results;
mod spec;

pub use desc::ElectionDescription;
pub use results::{CandidateResult, ReconcileReport, TallyAdjustment};
pub use spec::ElectionSpec;
