//! French prompt rendering for the generation collaborator.

use std::fmt::Display;
use std::fmt::Write as _;

use autofinder_core::types::{ConstraintSet, Role, Turn, VehicleRecord};

use crate::intent::Intent;

// =============================================================================
// System instructions
// =============================================================================

const SMALLTALK_INSTRUCTION: &str = "Tu es un assistant spécialisé pour aider l'utilisateur à \
trouver une voiture d'occasion à acheter. Réponds brièvement au small talk, puis ramène la \
discussion vers la recherche de voiture en posant UNE question simple (budget, carburant, boîte, \
usage, ville).";

const OTHER_INSTRUCTION: &str = "Tu es un assistant spécialisé pour aider l'utilisateur à trouver \
une voiture à acheter. Même si la question est hors sujet, réponds brièvement puis oriente vers la \
recherche de voiture en demandant ce que l'utilisateur cherche (budget, type, carburant, boîte, \
usage).";

const SEARCH_INSTRUCTION: &str = "Tu es un assistant expert pour aider l'utilisateur à trouver une \
voiture à acheter. Tu reçois: (1) des FILTRES extraits du message utilisateur, (2) un CATALOGUE \
filtré. Règles strictes: \
1) Ne propose QUE des voitures présentes dans le CATALOGUE FILTRÉ. \
2) Ne contredis pas les FILTRES. \
3) Si le CATALOGUE FILTRÉ n'est pas vide, commence toujours par lister TOUTES les voitures (ne \
saute aucun ID), même si des filtres sont manquants. Mets UNE voiture par ligne. \
4) Après la liste, dis que des critères plus précis donnent des résultats plus précis, puis pose \
AU PLUS UNE question de précision. \
5) Si le CATALOGUE FILTRÉ est vide, explique clairement qu'aucune voiture ne correspond. Propose \
de 'rafraîchir la conversation' (repartir de zéro) ET demande UN ajustement concret (ex: augmenter \
budget, changer carburant, augmenter km, élargir marque). \
6) Quand tu proposes une voiture, mentionne toujours son ID. \
7) N'invente aucune voiture ni caractéristique.";

pub const FILTERS_HEADER: &str = "FILTRES APPLIQUÉS:";
pub const CATALOG_HEADER: &str = "CATALOGUE FILTRÉ:";
pub const NO_RESULT_LINE: &str = "- (Aucun résultat)";

const USER_PREFIX: &str = "Utilisateur:";
const ASSISTANT_PREFIX: &str = "Assistant:";

/// System instruction for an intent.
pub fn system_instruction(intent: Intent) -> &'static str {
    match intent {
        Intent::CarSearch => SEARCH_INSTRUCTION,
        Intent::Smalltalk => SMALLTALK_INSTRUCTION,
        Intent::Other => OTHER_INSTRUCTION,
    }
}

/// One catalog line, always carrying the vehicle ID.
pub fn vehicle_line(vehicle: &VehicleRecord) -> String {
    let mut line = format!(
        "- ID: {} | {} {} | {} | {} | {} | {} km | {} DHS",
        vehicle.id,
        vehicle.brand,
        vehicle.model,
        vehicle.year,
        vehicle.fuel,
        vehicle.transmission,
        vehicle.mileage_km,
        vehicle.price
    );
    if !vehicle.options.is_empty() {
        let _ = write!(line, " | Options: {}", vehicle.options_text());
    }
    line
}

fn filter_entry(out: &mut String, key: &str, value: Option<impl Display>, missing: &str) {
    let _ = match value {
        Some(v) => writeln!(out, "- {key}: {v}"),
        None => writeln!(out, "- {key}: {missing}"),
    };
}

/// The applied-filters block; every key is listed, set or not.
pub fn filters_block(constraints: &ConstraintSet) -> String {
    const M: &str = "non spécifié";
    const F: &str = "non spécifiée";

    let mut out = format!("{FILTERS_HEADER}\n");
    filter_entry(&mut out, "marque", constraints.brand.as_deref(), F);
    filter_entry(&mut out, "carburant", constraints.fuel, M);
    filter_entry(&mut out, "transmission", constraints.transmission, F);
    filter_entry(&mut out, "prix_min", constraints.price_min, M);
    filter_entry(&mut out, "prix_max", constraints.price_max, M);
    filter_entry(&mut out, "km_max", constraints.mileage_max, M);
    filter_entry(&mut out, "annee_min", constraints.year_min, F);
    filter_entry(&mut out, "annee_max", constraints.year_max, F);
    out
}

// =============================================================================
// PromptAssembler
// =============================================================================

/// Renders the final prompt text.
#[derive(Debug, Clone)]
pub struct PromptAssembler {
    max_vehicles: usize,
}

impl PromptAssembler {
    pub fn new(max_vehicles: usize) -> Self {
        Self { max_vehicles }
    }

    pub fn max_vehicles(&self) -> usize {
        self.max_vehicles
    }

    /// Prompt for a smalltalk or off-topic turn: instruction and history only.
    pub fn render_conversation(&self, intent: Intent, history: &[Turn]) -> String {
        let mut prompt = format!("{}\n\n", system_instruction(intent).trim());
        self.push_history(&mut prompt, history);
        prompt
    }

    /// Prompt for a search turn. Only `vehicles` (already validated) are
    /// shown, truncated to `max_vehicles`.
    pub fn render_search(
        &self,
        constraints: &ConstraintSet,
        vehicles: &[VehicleRecord],
        history: &[Turn],
    ) -> String {
        let mut prompt = format!("{}\n\n", system_instruction(Intent::CarSearch).trim());
        prompt.push_str(&filters_block(constraints));
        prompt.push('\n');
        prompt.push_str(CATALOG_HEADER);
        prompt.push('\n');

        let shown = &vehicles[..vehicles.len().min(self.max_vehicles)];
        if shown.is_empty() {
            prompt.push_str(NO_RESULT_LINE);
            prompt.push('\n');
        } else {
            for vehicle in shown {
                prompt.push_str(&vehicle_line(vehicle));
                prompt.push('\n');
            }
        }
        prompt.push('\n');

        self.push_history(&mut prompt, history);
        prompt
    }

    fn push_history(&self, prompt: &mut String, history: &[Turn]) {
        for turn in history {
            let prefix = match turn.role {
                Role::User => USER_PREFIX,
                Role::Assistant => ASSISTANT_PREFIX,
            };
            let _ = writeln!(prompt, "{prefix} {}", turn.content.trim());
        }
        prompt.push_str(ASSISTANT_PREFIX);
    }
}

impl Default for PromptAssembler {
    fn default() -> Self {
        Self::new(5)
    }
}
