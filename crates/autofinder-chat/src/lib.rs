//! Conversational engine for AutoFinder.
//!
//! Classifies each turn, decides when to discard prior context, extracts
//! structured constraints, validates retrieved candidates against them and
//! renders the prompt handed to the text generator.

pub mod controller;
pub mod error;
pub mod extractor;
pub mod generation;
pub mod intent;
pub mod orchestrator;
pub mod prompt;
pub mod text;
pub mod validator;

pub use controller::{ConversationController, TurnPlan};
pub use error::ChatError;
pub use extractor::{ConstraintExtractor, ExtractionRule, EXTRACTION_RULES};
pub use generation::{LlamaServerGenerator, TextGenerator, STOP_SEQUENCES};
pub use intent::{Intent, IntentClassifier};
pub use orchestrator::{CandidateSource, ChatOrchestrator, TurnReply};
pub use prompt::PromptAssembler;
pub use validator::FilterValidator;
