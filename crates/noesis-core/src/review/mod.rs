//! Review services backed by the remote text service: question generation,
//! answer checking and link inference.

mod generator;
pub mod json_parser;
mod links;
pub mod prompts;
mod question;

pub use generator::QuestionGenerator;
pub use links::{InferredLink, LinkInferrer};
pub use question::{parse_question, QuestionOption, ReviewQuestion, MAX_OPTIONS, MIN_OPTIONS};
