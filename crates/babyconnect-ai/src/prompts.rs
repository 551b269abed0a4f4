//! Requests for each AI feature, and the typed shapes of their replies.

use babyconnect_store::models::{AppConfig, Product, WeekInfo};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::generator::{ChatTurn, GenerateRequest};

const DOULA_TEMPERATURE: f32 = 0.7;

/// Doula chat: the operator's system instruction plus the conversation.
pub fn doula_request(config: &AppConfig, history: &[ChatTurn], message: &str) -> GenerateRequest {
    GenerateRequest {
        system_instruction: Some(config.doula_system_instruction.clone()),
        history: history.to_vec(),
        prompt: message.to_string(),
        schema: None,
        temperature: Some(DOULA_TEMPERATURE),
    }
}

/// Meaning, origin and similar names for a baby name.
pub fn name_meaning_request(name: &str) -> GenerateRequest {
    let prompt = format!(
        "Analise o nome \"{name}\". Forneça o significado, origem, personalidade associada e \
         3 sugestões de nomes parecidos."
    );
    GenerateRequest::new(prompt).with_schema(json!({
        "type": "OBJECT",
        "properties": {
            "name": { "type": "STRING" },
            "meaning": { "type": "STRING" },
            "origin": { "type": "STRING" },
            "personality": { "type": "STRING" },
            "suggestions": { "type": "ARRAY", "items": { "type": "STRING" } }
        }
    }))
}

/// Draft content for one week, for the operator to review.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeneratedWeek {
    pub body_changes: String,
    pub symptoms: String,
    pub tips: String,
    /// One of the offered product ids, or empty.
    pub recommended_product_id: String,
    pub weekly_checklist: Vec<String>,
}

impl GeneratedWeek {
    /// Copy the generated fields onto `week`. A recommendation that is not
    /// one of `products` is dropped.
    pub fn apply_to(&self, week: &mut WeekInfo, products: &[Product]) {
        week.body_changes = self.body_changes.clone();
        week.symptoms = self.symptoms.clone();
        week.tips = self.tips.clone();
        week.weekly_checklist = self.weekly_checklist.clone();
        week.recommended_product_id = products
            .iter()
            .find(|p| p.id == self.recommended_product_id)
            .map(|p| p.id.clone());
    }
}

/// Body changes, symptoms, a tip, a short checklist and a product pick for
/// `week`, choosing only among `products`.
pub fn weekly_info_request(week: u8, products: &[Product]) -> GenerateRequest {
    let catalog: Vec<String> = products
        .iter()
        .map(|p| format!("ID: \"{}\", Nome: \"{}\"", p.id, p.name))
        .collect();
    let prompt = format!(
        "Gere um conteúdo completo, carinhoso e útil para uma gestante na {week}ª semana de \
         gravidez.\n\n\
         Produtos Disponíveis na Loja do App:\n{}\n\n\
         Tarefas:\n\
         1. Descreva mudanças no corpo e sintomas.\n\
         2. Dê uma dica valiosa ou aviso de segurança.\n\
         3. Crie uma checklist com 3 a 4 tarefas curtas para fazer nesta semana.\n\
         4. Da lista de \"Produtos Disponíveis\" acima, escolha o ID do produto que faz mais \
         sentido recomendar para esta semana. Se nenhum for relevante, retorne string vazia.\n\n\
         Tom de voz: Gentil, maternal e direto.\n\
         Idioma: Português do Brasil.",
        catalog.join("\n")
    );
    GenerateRequest::new(prompt).with_schema(weekly_schema())
}

fn weekly_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "bodyChanges": { "type": "STRING" },
            "symptoms": { "type": "STRING" },
            "tips": { "type": "STRING" },
            "recommendedProductId": { "type": "STRING" },
            "weeklyChecklist": { "type": "ARRAY", "items": { "type": "STRING" } }
        }
    })
}
