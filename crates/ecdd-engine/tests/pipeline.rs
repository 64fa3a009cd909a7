//! End-to-end pipeline tests over scripted back-ends

use ecdd_engine::{
    CaseCoordinator, CoordinatorConfig, EngineError, JsonFileRepository, ScriptedBackend,
};
use ecdd_model::{
    PepHit, Responses, ReviewDecision, RiskRating, SanctionHit, SessionStatus, SubjectProfile,
};
use serde_json::json;
use std::sync::Arc;

fn questionnaire_payload() -> String {
    json!({
        "client_type": "Business Owner",
        "sections": [{
            "section_title": "Business Profile",
            "questions": [
                {"question_text": "Industry?", "field_type": "dropdown", "options": ["Finance", "Retail"], "aml_relevant": true},
                {"question_text": "Ownership structure?", "field_type": "textarea"}
            ]
        }]
    })
    .to_string()
}

fn report_payload(rating: &str, flags: serde_json::Value) -> String {
    format!(
        "Assessment:\n{}\nChecklist:\n{}",
        json!({
            "overall_risk_rating": rating,
            "risk_score": 0.6,
            "compliance_flags": flags,
            "recommendations": ["Standard monitoring"]
        }),
        json!({
            "identity_documents": [{"name": "Passport", "priority": "required", "category": "identity"}],
            "source_of_wealth_documents": [],
            "source_of_funds_documents": [{"name": "Bank statements", "priority": "recommended", "category": "sof"}],
            "compliance_documents": [],
            "additional_documents": []
        }),
    )
}

fn coordinator_with(question_output: String, report_output: String) -> CaseCoordinator {
    init_tracing();
    CaseCoordinator::new(
        Arc::new(ScriptedBackend::succeeding(question_output)),
        Arc::new(ScriptedBackend::succeeding(report_output)),
        CoordinatorConfig::default(),
    )
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

#[tokio::test]
async fn happy_path_to_approval() {
    let coordinator = coordinator_with(
        questionnaire_payload(),
        report_payload("medium", json!({"adverse_media": false})),
    );
    let profile = SubjectProfile::new("C-1001", "Ada Example");

    let (session_id, questionnaire) = coordinator.create_session(profile).await.unwrap();
    assert_eq!(questionnaire.subject_type, "Business Owner");
    assert_eq!(questionnaire.total_questions(), 2);

    let responses = Responses::from([
        ("industry".to_string(), json!("Finance")),
        ("ownership".to_string(), json!("Sole owner")),
    ]);
    let (assessment, checklist) = coordinator
        .submit_responses(session_id, responses)
        .await
        .unwrap();
    assert_eq!(assessment.overall_rating, RiskRating::Medium);
    assert_eq!(checklist.required_documents().len(), 1);

    let closed = coordinator
        .complete_review(
            session_id,
            ReviewDecision::Approved,
            None,
            Some("rev-1".to_string()),
        )
        .await
        .unwrap();
    assert_eq!(closed.status, SessionStatus::Approved);

    let output = coordinator.case_output(session_id).await.unwrap();
    assert_eq!(output.decision, Some(ReviewDecision::Approved));
    let record = output.to_record().unwrap();
    assert!(record["assessment"].is_string());
}

#[tokio::test]
async fn profile_facts_override_remote_flags() {
    // Report service misses the PEP fact the institution already holds
    let coordinator = coordinator_with(
        questionnaire_payload(),
        report_payload("medium", json!({"adverse_media": true})),
    );
    let mut profile = SubjectProfile::new("C-2002", "Petra Exposed");
    profile.pep_hits.push(PepHit {
        is_pep: true,
        ..PepHit::default()
    });

    let (session_id, _) = coordinator.create_session(profile).await.unwrap();
    let (assessment, _) = coordinator
        .submit_responses(session_id, Responses::new())
        .await
        .unwrap();

    assert!(assessment.compliance_flags.pep);
    assert!(assessment.compliance_flags.adverse_media);
}

#[tokio::test]
async fn full_outage_still_completes_with_fallbacks() {
    let coordinator = CaseCoordinator::new(
        Arc::new(ScriptedBackend::always_failing("question service down")),
        Arc::new(ScriptedBackend::always_failing("report service down")),
        CoordinatorConfig::default(),
    );
    let mut profile = SubjectProfile::new("C-3003", "Sana Sanctioned");
    profile.sanction_hits.push(SanctionHit::default());

    let (session_id, questionnaire) = coordinator.create_session(profile).await.unwrap();
    assert_eq!(questionnaire.sections.len(), 3);

    let (assessment, checklist) = coordinator
        .submit_responses(session_id, Responses::new())
        .await
        .unwrap();
    assert_eq!(assessment.overall_rating, RiskRating::Critical);
    assert!(assessment.compliance_flags.sanctions);
    assert!(!checklist.is_empty());
}

#[tokio::test]
async fn followup_merges_and_compares() {
    let coordinator = CaseCoordinator::new(
        Arc::new(ScriptedBackend::always_failing("down")),
        Arc::new(ScriptedBackend::new(vec![
            ecdd_engine::PollResult::succeeded(report_payload("medium", json!({}))),
        ])),
        CoordinatorConfig::default(),
    );
    let mut profile = SubjectProfile::new("C-4004", "Ada Example");
    profile.pep_hits.push(PepHit {
        is_pep: true,
        ..PepHit::default()
    });

    let (parent_id, _) = coordinator.create_session(profile).await.unwrap();
    let parent_responses = Responses::from([
        ("a".to_string(), json!(1)),
        ("b".to_string(), json!(2)),
    ]);
    coordinator
        .submit_responses(parent_id, parent_responses)
        .await
        .unwrap();

    let (child_id, followup_questionnaire) = coordinator
        .request_followup(parent_id, "clarify source of wealth")
        .await
        .unwrap();
    assert!(followup_questionnaire.is_followup());

    let child_responses = Responses::from([
        ("b".to_string(), json!(3)),
        ("c".to_string(), json!(4)),
    ]);
    coordinator
        .submit_followup_responses(child_id, child_responses)
        .await
        .unwrap();

    let child = coordinator.session(child_id).await.unwrap();
    assert_eq!(child.responses["a"], json!(1));
    assert_eq!(child.responses["b"], json!(3));
    assert_eq!(child.responses["c"], json!(4));

    // Both assessments carry the forced PEP flag, so the diff is flat
    let diff = coordinator.compare_with_parent(child_id).await.unwrap();
    assert!(!diff.rating_changed);
    assert!(diff.new_concerns.is_empty());

    let chain = coordinator.session_chain(child_id).await.unwrap();
    assert_eq!(chain.len(), 2);
    assert_eq!(chain[0].session_id, parent_id);
}

#[tokio::test]
async fn review_queue_and_history() {
    let coordinator = coordinator_with(
        questionnaire_payload(),
        report_payload("low", json!({})),
    );

    let (first, _) = coordinator
        .create_session(SubjectProfile::new("C-5", "Ada"))
        .await
        .unwrap();
    coordinator
        .submit_responses(first, Responses::new())
        .await
        .unwrap();
    coordinator.open_review(first).await.unwrap();

    coordinator
        .create_session(SubjectProfile::new("C-5", "Ada"))
        .await
        .unwrap();

    let pending = coordinator.pending_reviews().await;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].session_id, first);

    assert_eq!(coordinator.subject_history("C-5", true).await.len(), 2);
    assert_eq!(coordinator.list_sessions(1).await.len(), 1);

    let (assessment, _) = coordinator.latest_assessment_for("C-5").await.unwrap();
    assert_eq!(assessment.overall_rating, RiskRating::Low);
}

#[tokio::test]
async fn sessions_survive_a_restart() {
    let dir = tempfile::tempdir().unwrap();

    let session_id = {
        let coordinator = CaseCoordinator::with_repository(
            Arc::new(ScriptedBackend::always_failing("down")),
            Arc::new(ScriptedBackend::always_failing("down")),
            CoordinatorConfig::default(),
            Arc::new(JsonFileRepository::new(dir.path()).unwrap()),
        );
        let (session_id, _) = coordinator
            .create_session(SubjectProfile::new("C-6", "Ada"))
            .await
            .unwrap();
        coordinator
            .submit_responses(session_id, Responses::new())
            .await
            .unwrap();
        coordinator.flush().await;
        session_id
    };

    let coordinator = CaseCoordinator::with_repository(
        Arc::new(ScriptedBackend::always_failing("down")),
        Arc::new(ScriptedBackend::always_failing("down")),
        CoordinatorConfig::default(),
        Arc::new(JsonFileRepository::new(dir.path()).unwrap()),
    );
    let reloaded = coordinator.session(session_id).await.unwrap();
    assert_eq!(reloaded.status, SessionStatus::ReportsGenerated);
    assert!(reloaded.assessment.is_some());
}

#[tokio::test]
async fn terminal_sessions_reject_further_work() {
    let coordinator = coordinator_with(
        questionnaire_payload(),
        report_payload("low", json!({})),
    );
    let (session_id, _) = coordinator
        .create_session(SubjectProfile::new("C-7", "Ada"))
        .await
        .unwrap();
    coordinator
        .submit_responses(session_id, Responses::new())
        .await
        .unwrap();
    coordinator
        .complete_review(session_id, ReviewDecision::Rejected, None, None)
        .await
        .unwrap();

    let err = coordinator
        .complete_review(session_id, ReviewDecision::Approved, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidTransition(_)));

    let err = coordinator.open_review(session_id).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidTransition(_)));
}
