//! Composable pipelines for Chainloom.
//!
//! Everything here is a [`Step`]: a JSON value goes in, a JSON value comes
//! out. Steps compose sequentially ([`Sequence`], or `a.pipe(b)`) and in
//! parallel ([`Parallel`]), and composites are steps themselves.
//!
//! ```text
//! prompt ── model ── parser            (Sequence)
//!        ┌─ sentiment ─┐
//! input ─┼─ category  ─┼─ {…}          (Parallel)
//!        └─ urgency   ─┘
//! ```

pub mod assign;
pub mod history;
pub mod model;
pub mod parallel;
pub mod parser;
pub mod prompt;
pub mod retry;
pub mod sequence;
pub mod step;

pub use assign::{Assign, Pick};
pub use history::WithMessageHistory;
pub use model::ModelStep;
pub use parallel::Parallel;
pub use parser::{CommaSeparatedListOutputParser, JsonOutputParser, OutputParser, StrOutputParser};
pub use prompt::{ChatPromptTemplate, PromptTemplate};
pub use retry::Retry;
pub use sequence::Sequence;
pub use step::{FnStep, Passthrough, Step, StepExt, StepStream};
