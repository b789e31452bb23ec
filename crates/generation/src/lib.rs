//! Candidate generation and ranking
//!
//! Produces N answer drafts for a (query, context) pair under distinct
//! sampling regimes, then selects the winner on a composite of
//! length-normalized likelihood, context grounding and self-confidence.

pub mod context;
pub mod generator;
pub mod profiles;
pub mod ranker;
pub mod runtime;

pub use context::build_context;
pub use generator::{CandidateGenerator, GeneratorConfig};
pub use profiles::{profiles_for, SamplingProfile, PROFILES};
pub use ranker::{CandidateRanker, RankerConfig};
pub use runtime::{HttpGenerator, HttpGeneratorConfig, UnavailableGenerator};
