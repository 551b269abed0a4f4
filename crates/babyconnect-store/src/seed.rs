//! Seed values written when a collection does not exist yet.

use crate::models::{
    AppConfig, ChecklistCategory, ChecklistItem, Product, ProductCategory, WeekInfo,
};

/// First and last week tracked by the week catalog.
pub const FIRST_WEEK: u8 = 1;
pub const LAST_WEEK: u8 = 42;

const DEFAULT_SYSTEM_INSTRUCTION: &str = "You are Doula AI, a calm and caring assistant for \
pregnant users. Answer about common symptoms, self-care, signs of labour, breastfeeding and \
maternity items. You are not a doctor and never give a diagnosis. If the user reports intense \
pain, bleeding or anything worrying, tell them to seek a doctor or emergency care immediately.";

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app_name: "BabyConnect".into(),
            logo_url: String::new(),
            banner_url: String::new(),
            footer_text: "Feito com amor para mamães.".into(),
            social_link: String::new(),
            whatsapp_group_link: None,
            doula_system_instruction: DEFAULT_SYSTEM_INSTRUCTION.into(),
            api_key: None,
        }
    }
}

pub fn products() -> Vec<Product> {
    vec![
        Product {
            id: "1".into(),
            name: "Almofada de Amamentação".into(),
            description: "Conforto para mamãe e bebê durante a amamentação.".into(),
            price: None,
            image: String::new(),
            category: ProductCategory::Amamentacao,
            shopee_link: "https://shopee.com.br".into(),
            active: true,
        },
        Product {
            id: "2".into(),
            name: "Kit Higiene Bebê".into(),
            description: "Tudo que você precisa para a troca de fraldas.".into(),
            price: None,
            image: String::new(),
            category: ProductCategory::Enxoval,
            shopee_link: "https://shopee.com.br".into(),
            active: true,
        },
    ]
}

pub fn checklist() -> Vec<ChecklistItem> {
    [
        ("c1", "Camisolas com abertura", ChecklistCategory::Mae),
        ("c2", "Absorventes noturnos", ChecklistCategory::Mae),
        ("c3", "Saída de maternidade", ChecklistCategory::Bebe),
        ("c4", "Fraldas RN", ChecklistCategory::Bebe),
        ("c5", "Documentos Pessoais", ChecklistCategory::Documentos),
        ("c6", "Lanche para o pai", ChecklistCategory::Acompanhante),
    ]
    .into_iter()
    .map(|(id, name, category)| ChecklistItem {
        id: id.into(),
        name: name.into(),
        category,
        shopee_link: None,
        checked: false,
    })
    .collect()
}

/// One empty entry per tracked week; content is filled in by the operator.
pub fn weeks() -> Vec<WeekInfo> {
    (FIRST_WEEK..=LAST_WEEK)
        .map(|week| WeekInfo {
            week,
            baby_size: String::new(),
            development: String::new(),
            body_changes: String::new(),
            symptoms: String::new(),
            tips: String::new(),
            recommended_product_id: None,
            weekly_checklist: Vec::new(),
        })
        .collect()
}
