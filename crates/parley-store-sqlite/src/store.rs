//! [`SqliteStore`] — the SQLite implementation of [`ConversationStore`].

use std::{path::Path, time::Duration};

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension as _, TransactionBehavior};
use uuid::Uuid;

use parley_core::{
  conversation::{Conversation, FeedbackUpdate, Message, Role},
  profile::{KnowledgeSource, PromptProfile},
  store::{ConversationStore, Materialized, NewConversation, PromptUpdate, Started},
};

use crate::{
  encode::{
    CONVERSATION_COLUMNS, MESSAGE_COLUMNS, PROFILE_COLUMNS, RawConversation,
    RawMessage, RawProfile, RawSource, SOURCE_COLUMNS, decode_dt, decode_uuid,
    encode_dt, encode_uuid, next_timestamp, now, prompt_digest,
  },
  schema::SCHEMA,
  Error, Result,
};

/// How long a writer waits for another connection's lock before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Parley conversation store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── Synchronous helpers (run inside `Connection::call`) ─────────────────────

/// Insert a profile unless one with the same prompt digest exists, then read
/// back whichever row holds the digest. The first writer wins; a losing
/// insert is a silent no-op.
fn upsert_profile(
  conn: &rusqlite::Connection,
  system_prompt: &str,
  name: Option<&str>,
) -> rusqlite::Result<RawProfile> {
  let digest = prompt_digest(system_prompt);
  conn.execute(
    "INSERT INTO prompt_profiles (profile_id, name, system_prompt, prompt_digest, created_at)
     VALUES (?1, ?2, ?3, ?4, ?5)
     ON CONFLICT (prompt_digest) DO NOTHING",
    rusqlite::params![
      encode_uuid(Uuid::new_v4()),
      name,
      system_prompt,
      digest,
      encode_dt(now()),
    ],
  )?;
  conn.query_row(
    &format!("SELECT {PROFILE_COLUMNS} FROM prompt_profiles WHERE prompt_digest = ?1"),
    rusqlite::params![digest],
    RawProfile::from_row,
  )
}

fn select_conversation(
  conn: &rusqlite::Connection,
  id_str: &str,
) -> rusqlite::Result<Option<RawConversation>> {
  conn
    .query_row(
      &format!(
        "SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE conversation_id = ?1"
      ),
      rusqlite::params![id_str],
      RawConversation::from_row,
    )
    .optional()
}

fn insert_message(
  conn: &rusqlite::Connection,
  message_id: &str,
  conversation_id: &str,
  role: Role,
  content: &str,
  created_at: &str,
) -> rusqlite::Result<()> {
  conn.execute(
    "INSERT INTO messages (message_id, conversation_id, role, content, created_at)
     VALUES (?1, ?2, ?3, ?4, ?5)",
    rusqlite::params![message_id, conversation_id, role.as_ref(), content, created_at],
  )?;
  Ok(())
}

/// A configured conversation about to be written: its ids and timestamps
/// are fixed before the rows go in.
#[derive(Clone)]
struct PendingConversation {
  conversation_id: Uuid,
  started_at:      DateTime<Utc>,
  input:           NewConversation,
  source_ids:      Vec<Uuid>,
}

impl PendingConversation {
  fn new(input: NewConversation) -> Self {
    Self {
      conversation_id: Uuid::new_v4(),
      started_at:      now(),
      source_ids:      input.knowledge_sources.iter().map(|_| Uuid::new_v4()).collect(),
      input,
    }
  }

  /// Get-or-create the profile, then insert the conversation and its
  /// sources. Returns the profile row.
  fn insert(&self, conn: &rusqlite::Connection) -> rusqlite::Result<RawProfile> {
    let id_str = encode_uuid(self.conversation_id);
    let at_str = encode_dt(self.started_at);

    let profile = upsert_profile(
      conn,
      &self.input.system_prompt,
      self.input.profile_name.as_deref(),
    )?;
    conn.execute(
      "INSERT INTO conversations (conversation_id, started_at, prompt_profile_id, variant_label)
       VALUES (?1, ?2, ?3, ?4)",
      rusqlite::params![id_str, at_str, profile.profile_id, self.input.variant_label],
    )?;
    let sources = self.source_ids.iter().zip(&self.input.knowledge_sources);
    for (position, (source_id, content)) in sources.enumerate() {
      conn.execute(
        "INSERT INTO knowledge_sources (source_id, conversation_id, position, content, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![encode_uuid(*source_id), id_str, position as i64, content, at_str],
      )?;
    }
    Ok(profile)
  }

  fn into_materialized(self, profile: PromptProfile) -> Materialized {
    let Self { conversation_id, started_at, input, source_ids } = self;
    Materialized {
      conversation: Conversation {
        conversation_id,
        started_at,
        prompt_profile_id: Some(profile.profile_id),
        variant_label: input.variant_label,
      },
      sources: source_ids
        .into_iter()
        .zip(input.knowledge_sources)
        .map(|(source_id, content)| KnowledgeSource {
          source_id,
          conversation_id,
          content,
          created_at: started_at,
        })
        .collect(),
      profile,
    }
  }
}

/// A user message and its reply about to be appended.
#[derive(Clone)]
struct PendingExchange {
  user_id:      Uuid,
  assistant_id: Uuid,
  user:         String,
  assistant:    String,
}

impl PendingExchange {
  fn new(user: String, assistant: String) -> Self {
    Self {
      user_id:      Uuid::new_v4(),
      assistant_id: Uuid::new_v4(),
      user,
      assistant,
    }
  }

  /// Insert both messages after the conversation's latest one. Returns their
  /// timestamps; the reply's is strictly later.
  fn insert(
    &self,
    conn: &rusqlite::Connection,
    conv_str: &str,
  ) -> rusqlite::Result<(DateTime<Utc>, DateTime<Utc>)> {
    let last: Option<String> = conn.query_row(
      "SELECT MAX(created_at) FROM messages WHERE conversation_id = ?1",
      rusqlite::params![conv_str],
      |r| r.get(0),
    )?;
    let user_at      = next_timestamp(last.and_then(|s| decode_dt(&s).ok()));
    let assistant_at = next_timestamp(Some(user_at));

    insert_message(
      conn,
      &encode_uuid(self.user_id),
      conv_str,
      Role::User,
      &self.user,
      &encode_dt(user_at),
    )?;
    insert_message(
      conn,
      &encode_uuid(self.assistant_id),
      conv_str,
      Role::Assistant,
      &self.assistant,
      &encode_dt(assistant_at),
    )?;
    Ok((user_at, assistant_at))
  }

  fn into_messages(
    self,
    conversation_id: Uuid,
    (user_at, assistant_at): (DateTime<Utc>, DateTime<Utc>),
  ) -> (Message, Message) {
    (
      Message {
        message_id: self.user_id,
        conversation_id,
        role: Role::User,
        content: self.user,
        created_at: user_at,
        feedback: Default::default(),
      },
      Message {
        message_id: self.assistant_id,
        conversation_id,
        role: Role::Assistant,
        content: self.assistant,
        created_at: assistant_at,
        feedback: Default::default(),
      },
    )
  }
}

/// What happened to a prompt rewrite inside the transaction.
enum Rewrite {
  MissingProfile,
  Same,
  Taken(String),
  Written,
}

/// What happened to a profile attachment inside the transaction.
enum Attach {
  MissingConversation,
  MissingProfile,
  Done(RawConversation),
}

// ─── ConversationStore impl ──────────────────────────────────────────────────

impl ConversationStore for SqliteStore {
  type Error = Error;

  // ── Conversations ─────────────────────────────────────────────────────────

  async fn create_conversation(
    &self,
    variant_label: Option<String>,
  ) -> Result<Conversation> {
    let conversation = Conversation {
      conversation_id:   Uuid::new_v4(),
      started_at:        now(),
      prompt_profile_id: None,
      variant_label,
    };

    let id_str = encode_uuid(conversation.conversation_id);
    let at_str = encode_dt(conversation.started_at);
    let label  = conversation.variant_label.clone();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO conversations (conversation_id, started_at, variant_label)
           VALUES (?1, ?2, ?3)",
          rusqlite::params![id_str, at_str, label],
        )?;
        Ok(())
      })
      .await?;

    Ok(conversation)
  }

  async fn materialize(&self, input: NewConversation) -> Result<Materialized> {
    let pending = PendingConversation::new(input);
    let rows = pending.clone();

    let raw_profile: RawProfile = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let profile = rows.insert(&tx)?;
        tx.commit()?;
        Ok(profile)
      })
      .await?;

    let materialized = pending.into_materialized(raw_profile.into_profile()?);
    tracing::debug!(
      conversation_id = %materialized.conversation.conversation_id,
      profile_id = %materialized.profile.profile_id,
      sources = materialized.sources.len(),
      "materialized conversation"
    );
    Ok(materialized)
  }

  async fn start_conversation(
    &self,
    input: NewConversation,
    user: String,
    assistant: String,
  ) -> Result<Started> {
    let pending  = PendingConversation::new(input);
    let exchange = PendingExchange::new(user, assistant);
    let rows     = (pending.clone(), exchange.clone());

    let (raw_profile, stamps) = self
      .conn
      .call(move |conn| {
        let (conversation, messages) = rows;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let profile = conversation.insert(&tx)?;
        let stamps = messages.insert(&tx, &encode_uuid(conversation.conversation_id))?;
        tx.commit()?;
        Ok((profile, stamps))
      })
      .await?;

    let conversation_id = pending.conversation_id;
    let materialized = pending.into_materialized(raw_profile.into_profile()?);
    let (user, assistant) = exchange.into_messages(conversation_id, stamps);
    tracing::debug!(
      %conversation_id,
      profile_id = %materialized.profile.profile_id,
      sources = materialized.sources.len(),
      "started conversation"
    );
    Ok(Started { materialized, user, assistant })
  }

  async fn get_conversation(&self, id: Uuid) -> Result<Option<Conversation>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawConversation> = self
      .conn
      .call(move |conn| Ok(select_conversation(conn, &id_str)?))
      .await?;

    raw.map(RawConversation::into_conversation).transpose()
  }

  async fn list_conversations(&self) -> Result<Vec<Conversation>> {
    let raws: Vec<RawConversation> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {CONVERSATION_COLUMNS} FROM conversations ORDER BY started_at, rowid"
        ))?;
        let rows = stmt
          .query_map([], RawConversation::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawConversation::into_conversation).collect()
  }

  async fn attach_profile(
    &self,
    conversation_id: Uuid,
    profile_id: Uuid,
  ) -> Result<Conversation> {
    let conv_str    = encode_uuid(conversation_id);
    let profile_str = encode_uuid(profile_id);

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let profile_exists = tx
          .query_row(
            "SELECT 1 FROM prompt_profiles WHERE profile_id = ?1",
            rusqlite::params![profile_str],
            |_| Ok(()),
          )
          .optional()?
          .is_some();
        if !profile_exists {
          return Ok(Attach::MissingProfile);
        }
        tx.execute(
          "UPDATE conversations SET prompt_profile_id = ?2
           WHERE conversation_id = ?1 AND prompt_profile_id IS NULL",
          rusqlite::params![conv_str, profile_str],
        )?;
        let raw = select_conversation(&tx, &conv_str)?;
        tx.commit()?;
        Ok(match raw {
          Some(raw) => Attach::Done(raw),
          None => Attach::MissingConversation,
        })
      })
      .await?;

    match outcome {
      Attach::Done(raw) => raw.into_conversation(),
      Attach::MissingConversation => Err(Error::ConversationNotFound(conversation_id)),
      Attach::MissingProfile => Err(Error::ProfileNotFound(profile_id)),
    }
  }

  // ── Prompt profiles ───────────────────────────────────────────────────────

  async fn get_or_create_profile(
    &self,
    system_prompt: String,
    name: Option<String>,
  ) -> Result<PromptProfile> {
    let raw: RawProfile = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let raw = upsert_profile(&tx, &system_prompt, name.as_deref())?;
        tx.commit()?;
        Ok(raw)
      })
      .await?;

    raw.into_profile()
  }

  async fn get_profile(&self, id: Uuid) -> Result<Option<PromptProfile>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawProfile> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {PROFILE_COLUMNS} FROM prompt_profiles WHERE profile_id = ?1"),
            rusqlite::params![id_str],
            RawProfile::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawProfile::into_profile).transpose()
  }

  async fn update_profile_prompt(
    &self,
    id: Uuid,
    system_prompt: String,
  ) -> Result<PromptUpdate> {
    let id_str = encode_uuid(id);
    let digest = prompt_digest(&system_prompt);

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let current: Option<String> = tx
          .query_row(
            "SELECT system_prompt FROM prompt_profiles WHERE profile_id = ?1",
            rusqlite::params![id_str],
            |r| r.get(0),
          )
          .optional()?;

        let Some(current) = current else {
          return Ok(Rewrite::MissingProfile);
        };
        if current == system_prompt {
          return Ok(Rewrite::Same);
        }

        let holder: Option<String> = tx
          .query_row(
            "SELECT profile_id FROM prompt_profiles
             WHERE prompt_digest = ?1 AND profile_id != ?2",
            rusqlite::params![digest, id_str],
            |r| r.get(0),
          )
          .optional()?;
        if let Some(holder) = holder {
          return Ok(Rewrite::Taken(holder));
        }

        tx.execute(
          "UPDATE prompt_profiles SET system_prompt = ?2, prompt_digest = ?3
           WHERE profile_id = ?1",
          rusqlite::params![id_str, system_prompt, digest],
        )?;
        tx.commit()?;
        Ok(Rewrite::Written)
      })
      .await?;

    match outcome {
      Rewrite::Written => Ok(PromptUpdate::Changed),
      Rewrite::Same => Ok(PromptUpdate::Unchanged),
      Rewrite::MissingProfile => Err(Error::ProfileNotFound(id)),
      Rewrite::Taken(holder) => Err(Error::DuplicatePrompt(decode_uuid(&holder)?)),
    }
  }

  async fn knowledge_sources(&self, conversation_id: Uuid) -> Result<Vec<KnowledgeSource>> {
    let id_str = encode_uuid(conversation_id);

    let raws: Vec<RawSource> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {SOURCE_COLUMNS} FROM knowledge_sources
           WHERE conversation_id = ?1 ORDER BY position"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], RawSource::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSource::into_source).collect()
  }

  // ── Messages ──────────────────────────────────────────────────────────────

  async fn append_exchange(
    &self,
    conversation_id: Uuid,
    user: String,
    assistant: String,
  ) -> Result<(Message, Message)> {
    let conv_str = encode_uuid(conversation_id);
    let exchange = PendingExchange::new(user, assistant);
    let rows     = exchange.clone();

    let stamps = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        if select_conversation(&tx, &conv_str)?.is_none() {
          return Ok(None);
        }
        let stamps = rows.insert(&tx, &conv_str)?;
        tx.commit()?;
        Ok(Some(stamps))
      })
      .await?;

    let stamps = stamps.ok_or(Error::ConversationNotFound(conversation_id))?;
    Ok(exchange.into_messages(conversation_id, stamps))
  }

  async fn messages(&self, conversation_id: Uuid) -> Result<Vec<Message>> {
    let id_str = encode_uuid(conversation_id);

    let raws: Vec<RawMessage> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {MESSAGE_COLUMNS} FROM messages
           WHERE conversation_id = ?1 ORDER BY created_at, rowid"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], RawMessage::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawMessage::into_message).collect()
  }

  async fn get_message(&self, id: Uuid) -> Result<Option<Message>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawMessage> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE message_id = ?1"),
            rusqlite::params![id_str],
            RawMessage::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawMessage::into_message).transpose()
  }

  async fn update_feedback(
    &self,
    message_id: Uuid,
    update: FeedbackUpdate,
  ) -> Result<Option<Message>> {
    let id_str = encode_uuid(message_id);

    let raw: Option<RawMessage> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let Some(mut raw) = tx
          .query_row(
            &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE message_id = ?1"),
            rusqlite::params![id_str],
            RawMessage::from_row,
          )
          .optional()?
        else {
          return Ok(None);
        };

        update.apply_to(&mut raw.feedback);
        tx.execute(
          "UPDATE messages SET thumbs_up = ?2, thumbs_down = ?3, feedback_text = ?4
           WHERE message_id = ?1",
          rusqlite::params![
            id_str,
            raw.feedback.thumbs_up,
            raw.feedback.thumbs_down,
            raw.feedback.feedback_text,
          ],
        )?;
        tx.commit()?;
        Ok(Some(raw))
      })
      .await?;

    raw.map(RawMessage::into_message).transpose()
  }
}
