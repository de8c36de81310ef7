// Pipeline: one list run end to end, and the batch that runs them all.

pub mod batch;
pub mod list;
