// ABOUTME: Local, offline demo of the generate_plan pipeline with an in-memory dish catalog
// ABOUTME: Every adapter is an in-process fake; no embedding, index, or language model credentials are used
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! Command-line demo for exercising [`Orchestrator::generate_plan`] end to
//! end without any external service credentials.
//!
//! ```bash
//! rmge-cli --diet vegetarian --meals-per-day 3 --duration-days 3
//! rmge-cli --diet non-vegetarian --keto --region Kerala --budget 400
//! ```
//!
//! The embedding service hashes tokens into a small fixed-dimension vector,
//! the vector index is a `Vec` scored by cosine similarity at query time,
//! and the language model always declines (no credentials configured),
//! which routes every run through the deterministic template fallback.

use async_trait::async_trait;
use clap::Parser;
use rmge::{
    ActivityLevel, CancellationToken, Completion, DietType, Document, DocumentMetadata,
    DurationDays, Embedder, EmbeddingError, EmbeddingService, GenerationParams, GiLevel,
    IndexError, IndexStats, LlmClient, LlmError, LlmService, MealType, MealsPerDay, Orchestrator,
    Plan, PlanRequest, QuotaRepository, QuotaState, RmgeConfig, RmgeError, Stage,
    SubscriptionStatus, TokenUsage, UserProfile, Vector, VectorIndex, VectorIndexService,
    WeightGoal,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};
use tracing::info;

const EMBED_DIMS: usize = 16;

fn hash_token(token: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in token.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

fn embed_text(text: &str) -> Vector {
    let mut vector = vec![0.0_f32; EMBED_DIMS];
    for raw_token in text.split_whitespace() {
        let token: String =
            raw_token.chars().filter(|c| c.is_alphanumeric()).collect::<String>().to_lowercase();
        if token.is_empty() {
            continue;
        }
        let hash = hash_token(&token);
        let dim = (hash % EMBED_DIMS as u64) as usize;
        let sign = if (hash >> 3) & 1 == 0 { 1.0 } else { -1.0 };
        vector[dim] += sign;
    }
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in &mut vector {
            *value /= norm;
        }
    }
    vector
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        (dot / (norm_a * norm_b)).clamp(0.0, 1.0)
    }
}

/// Deterministic bag-of-hashed-tokens embedding; stands in for a real
/// embedding provider so the demo never makes a network call.
struct HashEmbedding;

#[async_trait]
impl EmbeddingService for HashEmbedding {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vector>, EmbeddingError> {
        Ok(texts.iter().map(|text| embed_text(text)).collect())
    }
}

/// In-memory vector store scored by cosine similarity at query time.
struct InMemoryIndex {
    docs: Mutex<Vec<(Document, Vector)>>,
}

impl InMemoryIndex {
    fn new() -> Self {
        Self { docs: Mutex::new(Vec::new()) }
    }
}

#[async_trait]
impl VectorIndexService for InMemoryIndex {
    async fn upsert(&self, docs: &[(Document, Vector)]) -> Result<(), IndexError> {
        self.docs.lock().unwrap_or_else(std::sync::PoisonError::into_inner).extend_from_slice(docs);
        Ok(())
    }

    async fn query(&self, query_vector: &Vector, k: usize) -> Result<Vec<(Document, f32)>, IndexError> {
        let store = self.docs.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut scored: Vec<(Document, f32)> = store
            .iter()
            .map(|(doc, vector)| (doc.clone(), cosine_similarity(query_vector, vector)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    async fn describe_stats(&self) -> Result<IndexStats, IndexError> {
        let count = self.docs.lock().unwrap_or_else(std::sync::PoisonError::into_inner).len();
        Ok(IndexStats { count: count as u64 })
    }

    async fn delete_all(&self, _namespace: &str) -> Result<(), IndexError> {
        self.docs.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clear();
        Ok(())
    }
}

/// Always declines: this demo carries no language model credentials, so
/// every run exercises the deterministic template fallback path.
struct DemoLlm;

#[async_trait]
impl LlmService for DemoLlm {
    async fn generate(&self, _prompt: &str, _params: &GenerationParams) -> Result<Completion, LlmError> {
        Ok(Completion {
            text: "no language model is configured in this offline demo".to_owned(),
            usage: TokenUsage::default(),
        })
    }
}

/// Per-process quota bookkeeping; nothing survives past the run.
struct InMemoryQuota {
    states: Mutex<BTreeMap<String, QuotaState>>,
}

#[async_trait]
impl QuotaRepository for InMemoryQuota {
    async fn get_quota_state(&self, user_id: &str) -> Result<QuotaState, RmgeError> {
        let mut states = self.states.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(states
            .entry(user_id.to_owned())
            .or_insert_with(|| QuotaState {
                plan: Plan::Free,
                status: SubscriptionStatus::Active,
                total_count: 0,
                weekly_count: 0,
                last_reset_date: chrono::Utc::now(),
                subscription_end_date: None,
            })
            .clone())
    }

    async fn save_quota_state(&self, user_id: &str, state: &QuotaState) -> Result<(), RmgeError> {
        self.states
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(user_id.to_owned(), state.clone());
        Ok(())
    }
}

#[allow(clippy::too_many_arguments)]
fn seed_doc(
    id: &str,
    name: &str,
    state: &str,
    meal_type: MealType,
    diet_type: DietType,
    gi: GiLevel,
    protein: f64,
    carbs: f64,
    fats: f64,
    fiber: f64,
    budget_max: f64,
    prep_time: &str,
    tags: &[&str],
) -> Document {
    let calories = 4.0_f64.mul_add(protein, 4.0_f64.mul_add(carbs, 9.0 * fats));
    Document {
        id: id.to_owned(),
        content: name.to_owned(),
        metadata: DocumentMetadata {
            meal_name: Some(name.to_owned()),
            state: Some(state.to_owned()),
            meal_type: Some(meal_type),
            diet_type: Some(diet_type),
            gi: Some(gi),
            protein: Some(protein),
            carbs: Some(carbs),
            fats: Some(fats),
            fiber: Some(fiber),
            calories: Some(calories),
            prep_time: Some(prep_time.to_owned()),
            budget_friendly: Some(budget_max <= 80.0),
            budget_min: Some((budget_max * 0.6).round()),
            budget_max: Some(budget_max),
            category: None,
            ingredient_tags: tags.iter().map(|tag| (*tag).to_owned()).collect(),
            extra: BTreeMap::new(),
        },
    }
}

/// A small fixed dish catalog spanning every meal slot, several states (plus
/// the `"All States"` sentinel), and both keto-friendly and carb-heavy
/// templates, so a single demo run exercises filtering, dedup, and rerank.
fn seed_catalog() -> Vec<Document> {
    vec![
        seed_doc(
            "d1", "Moong Dal Chilla", "Gujarat", MealType::Breakfast, DietType::Vegetarian,
            GiLevel::Low, 18.0, 22.0, 6.0, 5.0, 40.0, "20 mins", &["moong dal", "vegetable oil"],
        ),
        seed_doc(
            "d2", "Masala Oats", "All States", MealType::Breakfast, DietType::Vegetarian,
            GiLevel::Medium, 10.0, 28.0, 5.0, 4.0, 35.0, "15 mins", &["oats", "vegetable"],
        ),
        seed_doc(
            "d3", "Egg Bhurji", "Punjab", MealType::Breakfast, DietType::Eggetarian,
            GiLevel::Low, 20.0, 6.0, 14.0, 0.0, 45.0, "15 mins", &["egg", "onion"],
        ),
        seed_doc(
            "d4", "Keto Paneer Bhurji", "All States", MealType::Breakfast, DietType::Vegetarian,
            GiLevel::Low, 22.0, 5.0, 24.0, 1.0, 70.0, "15 mins", &["paneer", "butter"],
        ),
        seed_doc(
            "d5", "Rajma Chawal", "Punjab", MealType::Lunch, DietType::Vegetarian,
            GiLevel::Medium, 16.0, 55.0, 8.0, 9.0, 60.0, "45 mins", &["rajma", "rice"],
        ),
        seed_doc(
            "d6", "Sambar with Rice", "Tamil Nadu", MealType::Lunch, DietType::Vegetarian,
            GiLevel::Medium, 14.0, 52.0, 6.0, 7.0, 50.0, "40 mins", &["toor dal", "rice", "vegetable"],
        ),
        seed_doc(
            "d7", "Chicken Curry", "Kerala", MealType::Lunch, DietType::NonVegetarian,
            GiLevel::Low, 32.0, 18.0, 16.0, 2.0, 90.0, "50 mins", &["chicken", "coconut"],
        ),
        seed_doc(
            "d8", "Grilled Chicken Salad", "All States", MealType::Lunch, DietType::NonVegetarian,
            GiLevel::Low, 35.0, 10.0, 14.0, 3.0, 110.0, "25 mins", &["chicken", "lettuce"],
        ),
        seed_doc(
            "d9", "Palak Paneer with Roti", "Punjab", MealType::Dinner, DietType::Vegetarian,
            GiLevel::Medium, 18.0, 34.0, 14.0, 5.0, 65.0, "35 mins", &["paneer", "spinach", "wheat"],
        ),
        seed_doc(
            "d10", "Keto Chicken Stir Fry", "All States", MealType::Dinner, DietType::NonVegetarian,
            GiLevel::Low, 34.0, 8.0, 22.0, 3.0, 95.0, "30 mins", &["chicken", "broccoli", "olive oil"],
        ),
        seed_doc(
            "d11", "Dal Tadka", "Rajasthan", MealType::Dinner, DietType::Vegetarian,
            GiLevel::Medium, 15.0, 30.0, 7.0, 6.0, 40.0, "30 mins", &["toor dal", "ghee"],
        ),
        seed_doc(
            "d12", "Sprouts Chaat", "All States", MealType::Snack, DietType::Vegan,
            GiLevel::Low, 12.0, 20.0, 4.0, 6.0, 25.0, "10 mins", &["sprouts", "onion"],
        ),
        seed_doc(
            "d13", "Roasted Makhana", "All States", MealType::Snack, DietType::Vegan,
            GiLevel::Low, 6.0, 16.0, 5.0, 3.0, 30.0, "10 mins", &["makhana", "ghee"],
        ),
        seed_doc(
            "d14", "Greek Yogurt with Nuts", "All States", MealType::Snack, DietType::Vegetarian,
            GiLevel::Low, 14.0, 10.0, 10.0, 1.0, 50.0, "5 mins", &["yogurt", "almonds"],
        ),
    ]
}

fn parse_activity(raw: &str) -> Option<ActivityLevel> {
    match raw.trim().to_lowercase().as_str() {
        "sedentary" => Some(ActivityLevel::Sedentary),
        "light" => Some(ActivityLevel::Light),
        "moderate" => Some(ActivityLevel::Moderate),
        "very" => Some(ActivityLevel::Very),
        _ => None,
    }
}

fn parse_weight_goal(raw: &str) -> Option<WeightGoal> {
    match raw.trim().to_lowercase().as_str() {
        "maintain" => Some(WeightGoal::Maintain),
        "lose" => Some(WeightGoal::Lose),
        "gain" => Some(WeightGoal::Gain),
        _ => None,
    }
}

const fn parse_meals_per_day(n: u8) -> Option<MealsPerDay> {
    match n {
        2 => Some(MealsPerDay::Two),
        3 => Some(MealsPerDay::Three),
        4 => Some(MealsPerDay::Four),
        _ => None,
    }
}

const fn parse_duration_days(n: u8) -> Option<DurationDays> {
    match n {
        3 => Some(DurationDays::Three),
        5 => Some(DurationDays::Five),
        7 => Some(DurationDays::Seven),
        _ => None,
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "rmge-cli",
    about = "Retrieval-augmented meal plan generation engine, local demo",
    long_about = "Seeds an in-memory dish catalog and runs one generate_plan request through the \
                  full retrieval, ranking, prompting, and validation pipeline using in-process \
                  fakes for the embedding service, vector index, and language model."
)]
struct Args {
    /// Opaque user id; drives quota bookkeeping.
    #[arg(long, default_value = "demo-user")]
    user_id: String,

    /// vegetarian | non-vegetarian | vegan | jain | eggetarian
    #[arg(long, default_value = "vegetarian")]
    diet: String,

    /// Require a ketogenic macro split.
    #[arg(long)]
    keto: bool,

    /// sedentary | light | moderate | very
    #[arg(long, default_value = "moderate")]
    activity: String,

    /// maintain | lose | gain
    #[arg(long, default_value = "maintain")]
    goal: String,

    /// Age bucket, e.g. "25-29".
    #[arg(long, default_value = "25-29")]
    age_range: String,

    #[arg(long, default_value_t = 165.0)]
    height_cm: f64,

    #[arg(long, default_value_t = 65.0)]
    weight_kg: f64,

    /// 2, 3, or 4.
    #[arg(long, default_value_t = 3)]
    meals_per_day: u8,

    /// 3, 5, or 7.
    #[arg(long, default_value_t = 3)]
    duration_days: u8,

    /// Daily budget, rupees.
    #[arg(long, default_value_t = 300.0)]
    budget: f64,

    /// Cuisine state to bias retrieval toward, e.g. "Punjab".
    #[arg(long)]
    region: Option<String>,
}

fn fatal(message: &str) -> ! {
    eprintln!("rmge-cli: {message}");
    std::process::exit(2);
}

#[tokio::main]
async fn main() -> Result<(), RmgeError> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_owned()))
        .init();

    let args = Args::parse();

    let Some(diet_type) = DietType::parse_loose(&args.diet) else {
        fatal(&format!("unrecognized --diet {:?}", args.diet));
    };
    let Some(activity_level) = parse_activity(&args.activity) else {
        fatal(&format!("unrecognized --activity {:?}", args.activity));
    };
    let Some(weight_goal) = parse_weight_goal(&args.goal) else {
        fatal(&format!("unrecognized --goal {:?}", args.goal));
    };
    let Some(meals_per_day) = parse_meals_per_day(args.meals_per_day) else {
        fatal("--meals-per-day must be 2, 3, or 4");
    };
    let Some(duration) = parse_duration_days(args.duration_days) else {
        fatal("--duration-days must be 3, 5, or 7");
    };

    let mut cuisine_states = BTreeSet::new();
    if let Some(region) = &args.region {
        cuisine_states.insert(region.clone());
    }

    let profile = UserProfile {
        user_id: args.user_id.clone(),
        age_range: args.age_range,
        height_cm: args.height_cm,
        weight_kg: args.weight_kg,
        target_weight_kg: None,
        activity_level,
        weight_goal,
        diet_type,
        regions: BTreeSet::new(),
        cuisine_states,
        allergies: BTreeSet::new(),
        symptoms: BTreeSet::new(),
        goals: BTreeSet::new(),
    };

    let request = PlanRequest {
        profile,
        meals_per_day,
        duration,
        budget: args.budget,
        is_keto: args.keto,
        restrictions: BTreeSet::new(),
        forbidden_dishes: BTreeSet::new(),
        lab_values: None,
        targeted_meal_type: None,
    };

    let embedder = Arc::new(Embedder::new(Arc::new(HashEmbedding)));
    let index_service: Arc<dyn VectorIndexService> = Arc::new(InMemoryIndex::new());
    let vector_index = Arc::new(VectorIndex::new(index_service));
    let llm = Arc::new(LlmClient::new(Arc::new(DemoLlm)));
    let quota = Arc::new(InMemoryQuota { states: Mutex::new(BTreeMap::new()) });
    let cancel = CancellationToken::new();

    let catalog = seed_catalog();
    let texts: Vec<String> = catalog.iter().map(|doc| doc.content.clone()).collect();
    let vectors = embedder.embed_many(&texts, &cancel).await?;
    let pairs: Vec<(Document, Vector)> = catalog.into_iter().zip(vectors).collect();
    vector_index.upsert(&pairs, &cancel).await?;

    info!(catalog_size = pairs.len(), "seeded in-memory catalog");

    let config = RmgeConfig::from_env();
    let orchestrator = Orchestrator::new(embedder, vector_index, llm, quota, config);

    let plan = orchestrator.generate_plan(&request, &args.user_id, &cancel).await?;
    let rendered = serde_json::to_string_pretty(&plan)
        .map_err(|err| RmgeError::Parse { message: format!("plan could not be rendered: {err}") })?;
    println!("{rendered}");

    let metrics = orchestrator.metrics();
    for stage in
        [Stage::Expand, Stage::Embed, Stage::Rank, Stage::Generate, Stage::Validate, Stage::Total]
    {
        let percentiles = metrics.stage_percentiles(stage);
        info!(
            ?stage,
            p50_ms = percentiles.p50,
            p95_ms = percentiles.p95,
            samples = percentiles.sample_count,
            "stage timing"
        );
    }

    Ok(())
}
