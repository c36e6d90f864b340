//! End-to-end conversational flows against an engine with fake models.

mod common;

use common::{TenantFixture, registry};

const ASK_NAME: &str = "Before we continue, may I have your name please?";

#[tokio::test]
async fn first_time_pricing_flow_produces_one_complete_lead() {
    let tenant = TenantFixture::new("tenant-pricing");
    tenant
        .seed(&[(
            "a1",
            "Enterprise plans include dedicated support and onboarding.",
            Some("https://x.test/pricing"),
        )])
        .await;

    let registry = registry();
    let engine = registry.get(&tenant.ctx, false).await.unwrap();
    let session = "s1";

    let reply = engine.chat("How much does enterprise cost?", session).await;
    assert_eq!(reply, ASK_NAME);

    let reply = engine.chat("Alice O'Connor", session).await;
    assert_eq!(
        reply,
        "Hey there Alice O'Connor! What would you like to know about?"
    );

    let reply = engine.chat("what's your pricing tiers?", session).await;
    assert!(reply.contains("phone number"), "expected phone prompt, got: {reply}");

    let reply = engine.chat("not really", session).await;
    assert!(reply.contains("Invalid phone number format"));
    assert!(reply.contains("Please try again."));

    let reply = engine.chat("+1 415 555 2671", session).await;
    assert!(reply.contains("email address"), "expected email prompt, got: {reply}");

    let reply = engine.chat("alice@example.com", session).await;
    assert!(reply.contains("Thank you Alice O'Connor"));

    let leads = engine.all_leads().await.unwrap();
    assert_eq!(leads.len(), 1);
    let lead = &leads[0];
    assert_eq!(lead.session_id, "s1");
    assert_eq!(lead.status, "complete");
    assert_eq!(lead.original_question, "what's your pricing tiers?");
    assert_eq!(lead.phone, "+1 415 555 2671");
    assert_eq!(lead.email, "alice@example.com");
}

#[tokio::test]
async fn lead_statuses_never_regress() {
    let tenant = TenantFixture::new("tenant-status");
    tenant.seed(&[("a1", "Our plans scale with usage.", None)]).await;

    let registry = registry();
    let engine = registry.get(&tenant.ctx, false).await.unwrap();
    let session = "s-status";

    engine.chat("hello", session).await;
    engine.chat("Bob", session).await;
    assert_eq!(
        engine.records().find_lead(session).await.unwrap().unwrap().status,
        "partial"
    );

    engine.chat("what does it cost?", session).await;
    engine.chat("415-555-2671", session).await;
    engine.chat("bob@example.com", session).await;
    assert_eq!(
        engine.records().find_lead(session).await.unwrap().unwrap().status,
        "complete"
    );

    // Another pricing question after completion behaves like retrieval.
    let reply = engine.chat("what is the cost of the starter plan?", session).await;
    assert!(!reply.contains("phone number"));
    assert_eq!(
        engine.records().find_lead(session).await.unwrap().unwrap().status,
        "complete"
    );
}

#[tokio::test]
async fn inline_contact_before_name_capture_is_gated() {
    let tenant = TenantFixture::new("tenant-inline");
    tenant.seed(&[("a1", "General information about the service.", None)]).await;

    let registry = registry();
    let engine = registry.get(&tenant.ctx, false).await.unwrap();
    let session = "s2";

    // Name gate fires first; the phone is neither validated nor saved.
    let reply = engine.chat("my number is 415-555-2671", session).await;
    assert_eq!(reply, ASK_NAME);
    assert!(engine.records().find_lead(session).await.unwrap().is_none());

    let reply = engine.chat("Bob", session).await;
    assert!(reply.starts_with("Hey there Bob!"));

    // Replayed after name capture: phone stored, email requested.
    let reply = engine.chat("my number is 415-555-2671", session).await;
    assert!(reply.contains("saved your phone number"));
    assert!(reply.contains("email address"));

    let lead = engine.records().find_lead(session).await.unwrap().unwrap();
    assert_eq!(lead.status, "phone_collected");
    assert_eq!(lead.phone, "415-555-2671");

    // Inline email completes the lead.
    let reply = engine.chat("reach me at bob@example.com please", session).await;
    assert!(reply.contains("saved your email address"));
    let lead = engine.records().find_lead(session).await.unwrap().unwrap();
    assert_eq!(lead.status, "complete");
    assert_eq!(lead.email, "bob@example.com");
}

#[tokio::test]
async fn location_fast_path_returns_title_and_url_only() {
    let tenant = TenantFixture::new("tenant-location");
    tenant
        .seed(&[
            (
                "about-1",
                "Learn about our story and the mission behind the company.",
                Some("https://x.test/about"),
            ),
            (
                "blog-1",
                "Our story continues in this blog post about growth.",
                Some("https://x.test/blog/foo"),
            ),
            (
                "cat-1",
                "Category archive for company news and stories.",
                Some("https://x.test/category/news"),
            ),
        ])
        .await;

    let registry = registry();
    let engine = registry.get(&tenant.ctx, false).await.unwrap();

    let reply = engine
        .chat("which page talks about your company story?", "s3")
        .await;
    assert_eq!(reply, "about\nhttps://x.test/about");
}

#[tokio::test]
async fn cross_tenant_isolation() {
    let tenant_a = TenantFixture::new("tenant-a");
    let tenant_b = TenantFixture::new("tenant-b");
    tenant_a
        .seed(&[("a1", "The zebrafish facility opened in 2019.", None)])
        .await;
    tenant_b
        .seed(&[("b1", "The quokka sanctuary tour runs daily.", None)])
        .await;

    let registry = registry();
    let engine_a = registry.get(&tenant_a.ctx, false).await.unwrap();
    let engine_b = registry.get(&tenant_b.ctx, false).await.unwrap();

    let session = "sa";
    engine_a.chat("hello", session).await;
    engine_a.chat("Ann", session).await;
    let answer = engine_a.chat("tell me about the quokka sanctuary", session).await;

    // A's corpus cannot produce B's documents.
    assert!(!answer.contains("quokka sanctuary tour"));
    // And nothing about the conversation leaked a session into B's store.
    assert_eq!(engine_b.leads_count().await.unwrap(), 0);
    assert!(engine_b.records().find_lead(session).await.unwrap().is_none());
}

#[tokio::test]
async fn retrieval_answers_echo_only_seeded_context() {
    let tenant = TenantFixture::new("tenant-retrieval");
    tenant
        .seed(&[(
            "a1",
            "The company was founded in Lisbon and builds navigation software.",
            Some("https://x.test/about"),
        )])
        .await;

    let registry = registry();
    let engine = registry.get(&tenant.ctx, false).await.unwrap();
    let session = "s4";

    engine.chat("hi", session).await;
    engine.chat("Cara", session).await;
    let answer = engine.chat("where was the company founded", session).await;
    assert!(answer.contains("Lisbon"), "retrieval missed the seeded chunk: {answer}");

    // The answered question stored source snippets for the session.
    let sources = engine.recent_sources(session, 3);
    assert!(!sources.is_empty());
    assert!(sources[0].contains("Lisbon"));
}
