#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod classify;
pub mod enhance;
pub mod orchestrator;
pub mod trace;

pub use orchestrator::{cancel_flag, CancelFlag, Pipeline, PipelineFailure};
