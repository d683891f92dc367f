mod common;

use std::time::Duration;

use assert_matches::assert_matches;
use common::{session, session_with, ScriptedClient, Step, API_KEY, JPEG, PNG};
use recycle_scan::{
    Analyzer, AnalyzeRejection, ErrorKind, RetryConfig, RetryingTransport, ScanSession, ViewState,
};

#[tokio::test(start_paused = true)]
async fn test_photo_to_verdict() {
    let client = ScriptedClient::new(vec![Step::verdict("**Recyclable** Rinse it first.")]);
    let mut session = session(client.clone());
    let mut views = session.subscribe();

    assert_eq!(views.borrow().select_label, "Upload Item Photo");

    session.select_image(PNG.to_vec(), "image/png");
    {
        let view = views.borrow_and_update();
        assert_eq!(view.state, ViewState::Previewing);
        assert_eq!(view.select_label, "Change Photo");
        assert!(view.analyze_enabled);
    }

    session.analyze().unwrap();
    assert_eq!(views.borrow_and_update().state, ViewState::Analyzing);
    assert!(!views.borrow().analyze_enabled);

    session.run_until_settled().await;

    assert_matches!(
        &views.borrow_and_update().state,
        ViewState::Resolved { is_recyclable: true, headline, explanation } => {
            assert_eq!(headline, "Recyclable");
            assert_eq!(explanation, "Rinse it first.");
        }
    );

    let calls = client.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].url.contains(&format!("key={API_KEY}")));
    let inline = &calls[0].body["contents"][0]["parts"][1]["inlineData"];
    assert_eq!(inline["mimeType"], "image/png");
    let preview = session.view().preview.unwrap();
    assert_eq!(
        preview.data_url,
        format!("data:image/png;base64,{}", inline["data"].as_str().unwrap())
    );
    assert!(calls[0].body["systemInstruction"]["parts"][0]["text"]
        .as_str()
        .unwrap()
        .contains("**Not Recyclable**"));
}

#[tokio::test(start_paused = true)]
async fn test_not_recyclable_verdict() {
    let client = ScriptedClient::new(vec![Step::verdict(
        "**Not Recyclable** Contains mixed materials.",
    )]);
    let mut session = session(client);

    session.select_image(JPEG.to_vec(), "image/jpeg");
    session.analyze().unwrap();
    session.run_until_settled().await;

    assert_matches!(
        session.view().state,
        ViewState::Resolved { is_recyclable: false, headline, explanation } => {
            assert_eq!(headline, "Not Recyclable");
            assert_eq!(explanation, "Contains mixed materials.");
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_reset_during_analysis_discards_late_response() {
    let client = ScriptedClient::new(vec![Step::verdict_after(
        "**Recyclable** too late",
        Duration::from_secs(5),
    )]);
    let mut session = session(client.clone());

    session.select_image(PNG.to_vec(), "image/png");
    session.analyze().unwrap();
    session.reset();
    assert_eq!(session.view().state, ViewState::Empty);

    session.run_until_settled().await;

    assert_eq!(session.pending(), 0);
    assert_eq!(client.calls().len(), 1);
    let view = session.view();
    assert_eq!(view.state, ViewState::Empty);
    assert!(view.preview.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_superseded_attempt_cannot_overwrite_newer_one() {
    let client = ScriptedClient::new(vec![
        Step::verdict_after("**Not Recyclable** old photo", Duration::from_secs(10)),
        Step::verdict_after("**Recyclable** new photo", Duration::from_secs(1)),
    ]);
    let mut session = session(client.clone());

    session.select_image(PNG.to_vec(), "image/png");
    session.analyze().unwrap();
    while client.calls().is_empty() {
        tokio::task::yield_now().await;
    }

    session.select_image(JPEG.to_vec(), "image/jpeg");
    session.analyze().unwrap();
    assert_eq!(session.pending(), 2);

    // the newer attempt lands first and resolves
    assert!(session.next_completion().await);
    assert_matches!(session.view().state, ViewState::Resolved { is_recyclable: true, explanation, .. } => {
        assert_eq!(explanation, "new photo");
    });

    // the older one arrives later and is dropped
    assert!(session.next_completion().await);
    assert!(!session.next_completion().await);
    assert_matches!(session.view().state, ViewState::Resolved { is_recyclable: true, .. });
    assert_eq!(session.view().preview.unwrap().media_type, "image/jpeg");
}

#[tokio::test(start_paused = true)]
async fn test_new_selection_replaces_image_and_clears_result() {
    let client = ScriptedClient::new(vec![Step::verdict("**Recyclable** ok")]);
    let mut session = session(client);

    session.select_image(PNG.to_vec(), "image/png");
    session.analyze().unwrap();
    session.run_until_settled().await;
    assert_matches!(session.view().state, ViewState::Resolved { .. });

    session.select_image(JPEG.to_vec(), "image/jpg");

    let view = session.view();
    assert_eq!(view.state, ViewState::Previewing);
    let preview = view.preview.unwrap();
    assert_eq!(preview.media_type, "image/jpeg");
    assert_eq!(preview.size_bytes, JPEG.len());
    assert!(preview.data_url.starts_with("data:image/jpeg;base64,"));
}

#[tokio::test(start_paused = true)]
async fn test_rejected_selection_only_sets_notice() {
    let client = ScriptedClient::new(Vec::new());
    let mut session = session(client);

    session.select_image(b"GIF89a".to_vec(), "image/png");

    let view = session.view();
    assert_eq!(view.state, ViewState::Empty);
    assert!(!view.analyze_enabled);
    let notice = view.notice.unwrap();
    assert_eq!(notice.error_code, ErrorKind::ImageRejected.code());

    session.select_image(PNG.to_vec(), "image/png");
    assert!(session.view().notice.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_analyze_without_image_is_refused() {
    let client = ScriptedClient::new(Vec::new());
    let mut session = session(client.clone());

    assert_eq!(session.analyze(), Err(AnalyzeRejection::NoImageSelected));
    assert_eq!(session.pending(), 0);
    assert!(client.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_retries_fail_and_can_be_retried() {
    let client = ScriptedClient::always(503);
    let config = RetryConfig {
        max_attempts: 3,
        base_delay_ms: 100,
        ..Default::default()
    };
    let mut session = session_with(client.clone(), config);

    session.select_image(PNG.to_vec(), "image/png");
    session.analyze().unwrap();
    session.run_until_settled().await;

    assert_eq!(client.calls().len(), 3);
    let view = session.view();
    assert_matches!(view.state, ViewState::Failed { error_code, is_retryable: true, .. } => {
        assert_eq!(error_code, "RETRIES_EXHAUSTED");
    });
    assert!(view.analyze_enabled);

    session.analyze().unwrap();
    assert_eq!(session.view().state, ViewState::Analyzing);
}

#[tokio::test(start_paused = true)]
async fn test_malformed_request_fails_without_retry() {
    let client = ScriptedClient::new(vec![Step::api_error(400, "Unable to process input image")]);
    let mut session = session(client.clone());

    session.select_image(PNG.to_vec(), "image/png");
    session.analyze().unwrap();
    session.run_until_settled().await;

    assert_eq!(client.calls().len(), 1);
    assert_matches!(session.view().state, ViewState::Failed { error_code, is_retryable: false, .. } => {
        assert_eq!(error_code, ErrorKind::TerminalRequest.code());
    });
}

#[tokio::test(start_paused = true)]
async fn test_empty_answer_fails() {
    let client = ScriptedClient::new(vec![Step::verdict("")]);
    let mut session = session(client);

    session.select_image(PNG.to_vec(), "image/png");
    session.analyze().unwrap();
    session.run_until_settled().await;

    assert_matches!(session.view().state, ViewState::Failed { error_code, .. } => {
        assert_eq!(error_code, "EMPTY_RESPONSE");
    });
}

#[tokio::test(start_paused = true)]
async fn test_unmarked_answer_falls_back_to_not_recyclable() {
    let client = ScriptedClient::new(vec![Step::verdict("It looks like a ceramic mug.")]);
    let mut session = session(client);

    session.select_image(PNG.to_vec(), "image/png");
    session.analyze().unwrap();
    session.run_until_settled().await;

    assert_matches!(session.view().state, ViewState::Resolved { is_recyclable: false, explanation, .. } => {
        assert_eq!(explanation, "It looks like a ceramic mug.");
    });
}

#[tokio::test(start_paused = true)]
async fn test_end_to_end_timeout() {
    let client = ScriptedClient::new(vec![Step::verdict_after(
        "**Recyclable** slow",
        Duration::from_secs(60),
    )]);
    let analyzer = Analyzer::new(
        RetryingTransport::new(client, RetryConfig::default()),
        common::endpoint(),
    )
    .with_timeout(Some(Duration::from_secs(5)));
    let mut session = ScanSession::new(analyzer);

    session.select_image(PNG.to_vec(), "image/png");
    session.analyze().unwrap();
    session.run_until_settled().await;

    assert_matches!(session.view().state, ViewState::Failed { error_code, .. } => {
        assert_eq!(error_code, ErrorKind::Timeout.code());
    });
}

#[tokio::test(start_paused = true)]
async fn test_crashed_analysis_fails_instead_of_hanging() {
    // No scripted steps, so the first call panics inside the analysis task.
    let client = ScriptedClient::new(Vec::new());
    let mut session = session(client.clone());

    session.select_image(PNG.to_vec(), "image/png");
    session.analyze().unwrap();

    tokio::time::timeout(Duration::from_secs(30), session.run_until_settled())
        .await
        .expect("session should settle after a crashed analysis");

    assert_eq!(session.pending(), 0);
    assert_eq!(client.calls().len(), 1);
    let view = session.view();
    assert!(view.analyze_enabled);
    assert_matches!(view.state, ViewState::Failed { error_code, .. } => {
        assert_eq!(error_code, ErrorKind::Internal.code());
    });
}
