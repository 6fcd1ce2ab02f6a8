mod support;

use pretty_assertions::assert_eq;
use research_api::{ApiError, ResearchDepth};
use research_chat::{Role, Session, SessionError};
use support::{progress_frame, result_frame, sse, stored_record, Harness, TOKEN};
use time::macros::datetime;

fn completed_run(topic: &str, briefing: &str) -> research_provider_mock::ScriptedStream {
    sse(&[
        progress_frame("Searching", 0.5),
        result_frame(topic, briefing),
        "[DONE]".to_string(),
    ])
}

#[tokio::test]
async fn load_replaces_session_with_stored_conversation() {
    let mut harness = Harness::new(vec![completed_run("tidal energy", "live briefing")]);
    harness.submit("tidal energy").await;
    harness.controller.flush_persistence().await;
    harness.store.insert(TOKEN, stored_record(7));

    harness
        .controller
        .load_conversation(7)
        .await
        .expect("conversation loads");

    let session = harness.session();
    assert_eq!(session.linked_conversation_id(), Some(7));
    assert!(!session.is_loading());
    assert_eq!(session.messages().len(), 2);

    let user = &session.messages()[0];
    assert_eq!(user.id, "100");
    assert_eq!(user.role, Role::User);
    assert_eq!(user.content, "ocean acidification");
    assert_eq!(user.timestamp, datetime!(2025-02-01 10:00:00 UTC));
    assert!(user.metadata.is_none());

    let assistant = &session.messages()[1];
    assert_eq!(assistant.id, "101");
    assert_eq!(assistant.role, Role::Assistant);
    let result = assistant.result().expect("assistant carries the stored result");
    assert_eq!(result.topic, "ocean acidification");
    assert_eq!(result.model_used, "stored-model");
    assert_eq!(result.total_time_seconds, 42.0);
    assert!(result.sources.is_empty());
    assert_eq!(session.last_result(), Some(result));
}

#[tokio::test]
async fn stored_conversation_without_briefing_has_no_result() {
    let mut harness = Harness::new(Vec::new());
    let mut record = stored_record(3);
    record.briefing = None;
    record.messages.truncate(1);
    harness.store.insert(TOKEN, record);

    harness
        .controller
        .load_conversation(3)
        .await
        .expect("conversation loads");

    assert!(harness.session().last_result().is_none());
    assert_eq!(harness.session().messages().len(), 1);
}

#[tokio::test]
async fn completed_run_can_be_reloaded_from_the_store() {
    let mut harness = Harness::new(vec![completed_run("tidal energy", "## Tidal energy")]);
    harness.submit("tidal energy").await;
    harness.controller.flush_persistence().await;

    harness.controller.new_conversation().expect("idle session resets");
    assert!(harness.session().messages().is_empty());

    harness
        .controller
        .load_conversation(1)
        .await
        .expect("conversation loads");

    let contents: Vec<(Role, &str)> = harness
        .session()
        .messages()
        .iter()
        .map(|message| (message.role, message.content.as_str()))
        .collect();
    assert_eq!(
        contents,
        vec![
            (Role::User, "tidal energy"),
            (Role::Assistant, "## Tidal energy"),
        ]
    );
    let reloaded = harness.session().last_result().expect("reloaded result");
    assert_eq!(reloaded.briefing, "## Tidal energy");
    assert!(reloaded.sources.is_empty());
}

#[tokio::test]
async fn load_of_foreign_conversation_keeps_session() {
    let mut harness = Harness::new(Vec::new());
    harness.store.insert("someone-else", stored_record(8));
    harness.controller.session_mut().push_system_message("hello");

    let error = harness
        .controller
        .load_conversation(8)
        .await
        .expect_err("foreign conversation is forbidden");

    assert!(matches!(error, SessionError::Api(ApiError::Forbidden(_))));
    assert_eq!(
        error.user_message(),
        "You don't have access to this conversation."
    );
    assert_eq!(harness.session().messages().len(), 1);
    assert!(harness.session().linked_conversation_id().is_none());
}

#[tokio::test]
async fn load_of_missing_conversation_reports_not_found() {
    let mut harness = Harness::new(Vec::new());

    let error = harness
        .controller
        .load_conversation(404)
        .await
        .expect_err("missing conversation");

    assert!(matches!(error, SessionError::Api(ApiError::NotFound(_))));
}

#[test]
fn load_is_refused_while_a_submission_is_active() {
    let mut session = Session::new();
    session.begin_submission("tidal energy", ResearchDepth::Quick, false);
    let before = session.clone();

    assert!(!session.load_conversation(&stored_record(7)));
    assert_eq!(session, before);
}

#[tokio::test]
async fn deleting_the_linked_conversation_resets_the_session() {
    let mut harness = Harness::new(Vec::new());
    harness.store.insert(TOKEN, stored_record(7));
    harness.store.insert(TOKEN, stored_record(9));
    harness
        .controller
        .load_conversation(7)
        .await
        .expect("conversation loads");

    harness
        .controller
        .delete_conversation(9)
        .await
        .expect("other conversation deletes");
    assert_eq!(harness.session().linked_conversation_id(), Some(7));
    assert_eq!(harness.session().messages().len(), 2);

    harness
        .controller
        .delete_conversation(7)
        .await
        .expect("linked conversation deletes");
    assert!(harness.session().linked_conversation_id().is_none());
    assert!(harness.session().messages().is_empty());
    assert!(harness.store.record(7).is_none());
}

#[tokio::test]
async fn list_returns_newest_first() {
    let mut harness = Harness::new(vec![
        completed_run("tidal energy", "first"),
        completed_run("wave energy", "second"),
    ]);
    harness.submit("tidal energy").await;
    harness.submit("wave energy").await;
    harness.controller.flush_persistence().await;

    let listed = harness
        .controller
        .list_conversations(10, 0)
        .await
        .expect("list succeeds");

    let topics: Vec<(i64, &str)> = listed
        .iter()
        .map(|summary| (summary.id, summary.topic.as_str()))
        .collect();
    assert_eq!(topics, vec![(2, "wave energy"), (1, "tidal energy")]);
    assert_eq!(listed[0].message_count, 2);
}

#[tokio::test]
async fn signed_out_list_requires_authentication() {
    let mut harness = Harness::signed_out(Vec::new());

    let error = harness
        .controller
        .list_conversations(10, 0)
        .await
        .expect_err("signed out");

    assert!(matches!(error, SessionError::Api(ApiError::MissingAccessToken)));
    assert_eq!(
        error.user_message(),
        "Authentication required. Please sign in and try again."
    );
}
