//! The research control loop, composed from the capability interfaces in
//! `nowhere-web`/`nowhere-llm`: gap-queue traversal, content extraction,
//! candidate accumulation, and the definitiveness test, per SPEC_FULL §4.

pub mod agent;
pub mod composite;
pub mod definitiveness;
pub mod diary;
pub mod extractor_factory;
pub mod prompt;

pub use agent::ResearchAgent;
pub use composite::CompositeSearchProvider;
pub use extractor_factory::ExtractorFactory;
