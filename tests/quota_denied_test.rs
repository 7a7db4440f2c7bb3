// ABOUTME: A free-plan user who already used their lifetime generation is denied before any
// ABOUTME: retrieval or generation work happens, and the denial carries plan/count/limit/reason
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

mod support;

use rmge::{CancellationToken, DietType, Embedder, LlmClient, MealType, Orchestrator, QuotaRepository, RmgeConfig, RmgeError, VectorIndex};
use std::sync::Arc;
use support::{free_state, sample_doc, sample_profile, sample_request, FakeEmbedding, FakeIndex, InMemoryQuota, ScriptedLlm};

#[tokio::test]
async fn exhausted_free_quota_is_denied_with_no_retrieval_or_increment() {
    let profile = sample_profile(DietType::Vegetarian, &[]);
    let request = sample_request(profile, false);

    let mut state = free_state();
    state.total_count = 1; // matches the default free_total limit of 1

    let embedder = Arc::new(Embedder::new(Arc::new(FakeEmbedding)));
    let index = Arc::new(VectorIndex::new(Arc::new(FakeIndex::new(vec![sample_doc(
        "d1",
        "Masala Oats",
        "Kerala",
        MealType::Breakfast,
        DietType::Vegetarian,
    )]))));
    let llm = Arc::new(LlmClient::new(Arc::new(ScriptedLlm::new(vec![]))));
    let quota = Arc::new(InMemoryQuota::seeded("u1", state));

    let orchestrator = Orchestrator::new(embedder, index, llm, quota.clone(), RmgeConfig::default());
    let cancel = CancellationToken::new();

    let err = orchestrator.generate_plan(&request, "u1", &cancel).await.unwrap_err();
    match err {
        RmgeError::QuotaExceeded { plan, current_count, limit, reason } => {
            assert_eq!(plan, "free");
            assert_eq!(current_count, 1);
            assert_eq!(limit, 1);
            assert_eq!(reason, "free_total_exhausted");
        }
        other => panic!("expected QuotaExceeded, got {other:?}"),
    }

    let saved = quota.get_quota_state("u1").await.unwrap();
    assert_eq!(saved.total_count, 1, "denial must not increment the quota");
}
