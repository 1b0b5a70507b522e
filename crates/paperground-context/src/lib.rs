#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod assemble;
pub mod synthesize;

pub use assemble::ContextAssembler;
pub use synthesize::{AnswerSynthesizer, SynthesisOutcome};
