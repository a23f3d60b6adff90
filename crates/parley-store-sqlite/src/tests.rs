//! Integration tests for `SqliteStore` against an in-memory database.

use parley_core::{
  conversation::{FeedbackUpdate, Role},
  store::{ConversationStore, NewConversation, PromptUpdate},
};
use uuid::Uuid;

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn new_conversation(prompt: &str, sources: &[&str]) -> NewConversation {
  NewConversation {
    variant_label:     Some("a".into()),
    profile_name:      Some("a".into()),
    system_prompt:     prompt.into(),
    knowledge_sources: sources.iter().map(|s| s.to_string()).collect(),
  }
}

// ─── Conversations ───────────────────────────────────────────────────────────

#[tokio::test]
async fn create_and_get_bare_conversation() {
  let s = store().await;

  let conv = s.create_conversation(None).await.unwrap();
  assert!(conv.prompt_profile_id.is_none());

  let fetched = s.get_conversation(conv.conversation_id).await.unwrap().unwrap();
  assert_eq!(fetched.conversation_id, conv.conversation_id);
  assert!(fetched.prompt_profile_id.is_none());
  assert!(fetched.variant_label.is_none());
}

#[tokio::test]
async fn get_conversation_missing_returns_none() {
  let s = store().await;
  assert!(s.get_conversation(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn list_conversations_oldest_first() {
  let s = store().await;
  let first = s.create_conversation(Some("a".into())).await.unwrap();
  let second = s.create_conversation(Some("b".into())).await.unwrap();

  let all = s.list_conversations().await.unwrap();
  assert_eq!(all.len(), 2);
  assert_eq!(all[0].conversation_id, first.conversation_id);
  assert_eq!(all[1].conversation_id, second.conversation_id);
}

// ─── Materialize ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn materialize_attaches_profile_and_sources_in_order() {
  let s = store().await;

  let m = s
    .materialize(new_conversation("You are a helpful assistant.", &[
      "This is source one.",
      "This is source two.",
    ]))
    .await
    .unwrap();

  let conv = s
    .get_conversation(m.conversation.conversation_id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(conv.prompt_profile_id, Some(m.profile.profile_id));
  assert_eq!(conv.variant_label.as_deref(), Some("a"));

  let sources = s.knowledge_sources(conv.conversation_id).await.unwrap();
  let contents: Vec<_> = sources.iter().map(|k| k.content.as_str()).collect();
  assert_eq!(contents, ["This is source one.", "This is source two."]);
  assert_eq!(m.sources.len(), 2);
  assert_eq!(m.sources[1].source_id, sources[1].source_id);
  assert_eq!(m.profile.system_prompt, "You are a helpful assistant.");
}

#[tokio::test]
async fn start_conversation_writes_configuration_and_first_exchange() {
  let s = store().await;
  let earlier = s.materialize(new_conversation("Shared.", &[])).await.unwrap();

  let started = s
    .start_conversation(
      new_conversation("Shared.", &["k1", "k2"]),
      "  hi  ".into(),
      "hello".into(),
    )
    .await
    .unwrap();
  let conversation_id = started.materialized.conversation.conversation_id;
  assert_eq!(started.materialized.profile.profile_id, earlier.profile.profile_id);

  let conv = s.get_conversation(conversation_id).await.unwrap().unwrap();
  assert_eq!(conv.prompt_profile_id, Some(earlier.profile.profile_id));

  let sources = s.knowledge_sources(conversation_id).await.unwrap();
  let contents: Vec<_> = sources.iter().map(|k| k.content.as_str()).collect();
  assert_eq!(contents, ["k1", "k2"]);

  let messages = s.messages(conversation_id).await.unwrap();
  assert_eq!(messages.len(), 2);
  assert_eq!(messages[0].message_id, started.user.message_id);
  assert_eq!(messages[0].content, "  hi  ");
  assert_eq!(messages[1].message_id, started.assistant.message_id);
  assert_eq!(messages[1].role, Role::Assistant);
  assert!(messages[0].created_at < messages[1].created_at);
}

#[tokio::test]
async fn materialize_reuses_profile_with_same_text() {
  let s = store().await;

  let a = s.materialize(new_conversation("Same.", &[])).await.unwrap();
  let b = s.materialize(new_conversation("Same.", &[])).await.unwrap();
  let c = s.materialize(new_conversation("Different.", &[])).await.unwrap();

  assert_eq!(a.profile.profile_id, b.profile.profile_id);
  assert_ne!(a.profile.profile_id, c.profile.profile_id);
  assert_ne!(a.conversation.conversation_id, b.conversation.conversation_id);
}

#[tokio::test]
async fn concurrent_materialize_on_two_connections_shares_one_profile() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("parley.db");
  let s1 = SqliteStore::open(&path).await.unwrap();
  let s2 = SqliteStore::open(&path).await.unwrap();

  let (a, b) = tokio::join!(
    s1.materialize(new_conversation("Shared prompt.", &["k"])),
    s2.materialize(new_conversation("Shared prompt.", &["k"])),
  );
  let (a, b) = (a.unwrap(), b.unwrap());

  assert_eq!(a.profile.profile_id, b.profile.profile_id);
  let via_s2 = s2.get_profile(a.profile.profile_id).await.unwrap().unwrap();
  assert_eq!(via_s2.system_prompt, "Shared prompt.");
}

// ─── Profiles ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn get_or_create_profile_is_keyed_by_text() {
  let s = store().await;
  let p1 = s
    .get_or_create_profile("Be brief.".into(), Some("first".into()))
    .await
    .unwrap();
  let p2 = s
    .get_or_create_profile("Be brief.".into(), Some("second".into()))
    .await
    .unwrap();

  assert_eq!(p1.profile_id, p2.profile_id);
  // The first writer's name sticks.
  assert_eq!(p2.name.as_deref(), Some("first"));
}

#[tokio::test]
async fn update_profile_prompt_changes_in_place() {
  let s = store().await;
  let p = s.get_or_create_profile("Old.".into(), None).await.unwrap();

  let outcome = s.update_profile_prompt(p.profile_id, "New.".into()).await.unwrap();
  assert_eq!(outcome, PromptUpdate::Changed);

  let fetched = s.get_profile(p.profile_id).await.unwrap().unwrap();
  assert_eq!(fetched.system_prompt, "New.");

  // The old text is free again.
  let again = s.get_or_create_profile("Old.".into(), None).await.unwrap();
  assert_ne!(again.profile_id, p.profile_id);
}

#[tokio::test]
async fn update_profile_prompt_same_text_is_unchanged() {
  let s = store().await;
  let p = s.get_or_create_profile("Stable.".into(), None).await.unwrap();
  let outcome = s
    .update_profile_prompt(p.profile_id, "Stable.".into())
    .await
    .unwrap();
  assert_eq!(outcome, PromptUpdate::Unchanged);
}

#[tokio::test]
async fn update_profile_prompt_rejects_text_held_elsewhere() {
  let s = store().await;
  let p = s.get_or_create_profile("One.".into(), None).await.unwrap();
  let other = s.get_or_create_profile("Two.".into(), None).await.unwrap();

  let err = s
    .update_profile_prompt(p.profile_id, "Two.".into())
    .await
    .unwrap_err();
  assert!(matches!(err, crate::Error::DuplicatePrompt(id) if id == other.profile_id));
}

#[tokio::test]
async fn update_missing_profile_errors() {
  let s = store().await;
  let err = s
    .update_profile_prompt(Uuid::new_v4(), "x".into())
    .await
    .unwrap_err();
  assert!(matches!(err, crate::Error::ProfileNotFound(_)));
}

#[tokio::test]
async fn attach_profile_only_once() {
  let s = store().await;
  let conv = s.create_conversation(None).await.unwrap();
  let p1 = s.get_or_create_profile("First.".into(), None).await.unwrap();
  let p2 = s.get_or_create_profile("Second.".into(), None).await.unwrap();

  let attached = s.attach_profile(conv.conversation_id, p1.profile_id).await.unwrap();
  assert_eq!(attached.prompt_profile_id, Some(p1.profile_id));

  let again = s.attach_profile(conv.conversation_id, p2.profile_id).await.unwrap();
  assert_eq!(again.prompt_profile_id, Some(p1.profile_id));
}

#[tokio::test]
async fn attach_profile_missing_targets_error() {
  let s = store().await;
  let conv = s.create_conversation(None).await.unwrap();
  let p = s.get_or_create_profile("P.".into(), None).await.unwrap();

  let err = s.attach_profile(Uuid::new_v4(), p.profile_id).await.unwrap_err();
  assert!(matches!(err, crate::Error::ConversationNotFound(_)));

  let err = s
    .attach_profile(conv.conversation_id, Uuid::new_v4())
    .await
    .unwrap_err();
  assert!(matches!(err, crate::Error::ProfileNotFound(_)));
}

// ─── Messages ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn append_exchange_orders_turns() {
  let s = store().await;
  let conv = s.create_conversation(None).await.unwrap();

  for i in 0..3 {
    s.append_exchange(conv.conversation_id, format!("q{i}"), format!("a{i}"))
      .await
      .unwrap();
  }

  let msgs = s.messages(conv.conversation_id).await.unwrap();
  let contents: Vec<_> = msgs.iter().map(|m| m.content.as_str()).collect();
  assert_eq!(contents, ["q0", "a0", "q1", "a1", "q2", "a2"]);
  assert!(msgs.windows(2).all(|w| w[0].created_at < w[1].created_at));
  assert_eq!(msgs[0].role, Role::User);
  assert_eq!(msgs[1].role, Role::Assistant);
}

#[tokio::test]
async fn append_exchange_unknown_conversation_writes_nothing() {
  let s = store().await;
  let missing = Uuid::new_v4();
  let err = s
    .append_exchange(missing, "hi".into(), "hello".into())
    .await
    .unwrap_err();
  assert!(matches!(err, crate::Error::ConversationNotFound(id) if id == missing));
  assert!(s.messages(missing).await.unwrap().is_empty());
}

#[tokio::test]
async fn update_feedback_overwrites_supplied_fields_only() {
  let s = store().await;
  let conv = s.create_conversation(None).await.unwrap();
  let (_, reply) = s
    .append_exchange(conv.conversation_id, "hi".into(), "hello".into())
    .await
    .unwrap();

  s.update_feedback(reply.message_id, FeedbackUpdate {
    thumbs_up:     Some(true),
    feedback_text: Some("nice".into()),
    ..Default::default()
  })
  .await
  .unwrap();

  let updated = s
    .update_feedback(reply.message_id, FeedbackUpdate {
      feedback_text: Some("too verbose".into()),
      ..Default::default()
    })
    .await
    .unwrap()
    .unwrap();

  assert_eq!(updated.feedback.thumbs_up, Some(true));
  assert_eq!(updated.feedback.thumbs_down, None);
  assert_eq!(updated.feedback.feedback_text.as_deref(), Some("too verbose"));

  let fetched = s.get_message(reply.message_id).await.unwrap().unwrap();
  assert_eq!(fetched.feedback, updated.feedback);
}

#[tokio::test]
async fn update_feedback_missing_message_returns_none() {
  let s = store().await;
  let result = s
    .update_feedback(Uuid::new_v4(), FeedbackUpdate {
      thumbs_up: Some(true),
      ..Default::default()
    })
    .await
    .unwrap();
  assert!(result.is_none());
}
