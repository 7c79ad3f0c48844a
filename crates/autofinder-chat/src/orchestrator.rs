//! Chat orchestrator: one conversational turn end to end.
//!
//! history → controller (intent, reset, window) → [car search] extractor →
//! candidate source → validator → prompt assembler → generator.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info};

use autofinder_core::config::AutoFinderConfig;
use autofinder_core::error::Result;
use autofinder_core::types::{ConstraintSet, Turn, VehicleRecord};
use autofinder_vector::catalog_index::CatalogIndex;

use crate::controller::ConversationController;
use crate::error::ChatError;
use crate::extractor::ConstraintExtractor;
use crate::generation::TextGenerator;
use crate::intent::{Intent, IntentClassifier};
use crate::prompt::PromptAssembler;
use crate::validator::FilterValidator;

/// Anything that can return constraint-restricted, similarity-ranked vehicles.
#[async_trait]
pub trait CandidateSource: Send + Sync {
    async fn retrieve(
        &self,
        query: &str,
        k: usize,
        constraints: &ConstraintSet,
    ) -> Result<Vec<VehicleRecord>>;
}

#[async_trait]
impl CandidateSource for CatalogIndex {
    async fn retrieve(
        &self,
        query: &str,
        k: usize,
        constraints: &ConstraintSet,
    ) -> Result<Vec<VehicleRecord>> {
        CatalogIndex::retrieve(self, query, k, constraints).await
    }
}

/// Reply plus the decisions that produced it.
#[derive(Debug, Clone, Serialize)]
pub struct TurnReply {
    pub reply: String,
    pub intent: Intent,
    pub reset: bool,
    /// Extracted constraints; present on search turns only.
    pub constraints: Option<ConstraintSet>,
    /// IDs of the vehicles shown to the generator, in prompt order.
    pub vehicle_ids: Vec<u64>,
}

/// Central coordinator for conversational turns.
pub struct ChatOrchestrator {
    source: Arc<dyn CandidateSource>,
    generator: Arc<dyn TextGenerator>,
    controller: ConversationController,
    extractor: ConstraintExtractor,
    validator: FilterValidator,
    assembler: PromptAssembler,
    top_k: usize,
    max_message_chars: usize,
}

impl ChatOrchestrator {
    pub fn new(
        source: Arc<dyn CandidateSource>,
        generator: Arc<dyn TextGenerator>,
        config: &AutoFinderConfig,
    ) -> Self {
        Self {
            source,
            generator,
            controller: ConversationController::new(
                IntentClassifier::new(),
                config.conversation.history_window,
            ),
            extractor: ConstraintExtractor::new(),
            validator: FilterValidator::new(),
            assembler: PromptAssembler::new(config.retrieval.max_prompt_vehicles),
            top_k: config.retrieval.top_k,
            max_message_chars: config.conversation.max_message_chars,
        }
    }

    /// Handle one turn and return the assistant reply.
    pub async fn handle_turn(&self, history: &[Turn]) -> std::result::Result<String, ChatError> {
        Ok(self.handle_turn_detailed(history).await?.reply)
    }

    /// Handle one turn, also reporting intent, reset and the vehicles shown.
    pub async fn handle_turn_detailed(
        &self,
        history: &[Turn],
    ) -> std::result::Result<TurnReply, ChatError> {
        let start = Instant::now();
        info!(history_len = history.len(), "Chat turn received");

        let plan = self.controller.plan(history);
        if plan.last_user.chars().count() > self.max_message_chars {
            return Err(ChatError::MessageTooLong(self.max_message_chars));
        }
        debug!(
            intent = %plan.intent,
            reset = plan.reset,
            effective_len = plan.effective_history.len(),
            "Turn planned"
        );

        let (prompt, constraints, vehicle_ids) = match plan.intent {
            Intent::CarSearch => {
                let constraints = self.extractor.extract(&plan.last_user);
                info!(?constraints, "Constraints extracted");

                let candidates = self
                    .source
                    .retrieve(&plan.last_user, self.top_k, &constraints)
                    .await?;
                let retrieved = candidates.len();
                let validated = self.validator.validate(candidates, &constraints);
                info!(
                    retrieved,
                    validated = validated.len(),
                    "Candidates validated"
                );

                let shown = &validated[..validated.len().min(self.assembler.max_vehicles())];
                let prompt =
                    self.assembler
                        .render_search(&constraints, shown, &plan.effective_history);
                let ids = shown.iter().map(|v| v.id).collect();
                (prompt, Some(constraints), ids)
            }
            intent => (
                self.assembler
                    .render_conversation(intent, &plan.effective_history),
                None,
                Vec::new(),
            ),
        };

        info!(max_tokens = self.generator.max_tokens(), "Calling generator");
        let llm_start = Instant::now();
        let reply = self.generator.generate(&prompt).await?;
        info!(
            llm_ms = llm_start.elapsed().as_millis() as u64,
            total_ms = start.elapsed().as_millis() as u64,
            "Generation done"
        );

        Ok(TurnReply {
            reply,
            intent: plan.intent,
            reset: plan.reset,
            constraints,
            vehicle_ids,
        })
    }
}
