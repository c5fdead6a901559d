use std::sync::Arc;

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    dao::{
        document_store::{Document, DocumentStore},
        models::{GameEntity, QuestionEntity, QuestionPatchEntity},
        storage::{StorageError, StorageResult},
    },
    state::game::{GameState, Question},
};

/// Identifier of the single shared game document.
pub const GAME_DOC_ID: &str = "game::main";
/// Prefix of every question bank document.
pub const QUESTION_PREFIX: &str = "question::";

/// Document id of a question.
pub fn question_doc_id(id: Uuid) -> String {
    format!("{QUESTION_PREFIX}{id}")
}

/// Outcome of reading the game document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadedGame {
    /// No game has been persisted yet.
    Missing,
    /// A valid game document.
    Found {
        /// Decoded state.
        state: GameState,
        /// Revision to use for the next conditional write.
        rev: String,
    },
    /// A document exists but cannot be decoded.
    Malformed {
        /// Revision of the broken document, so it can be overwritten.
        rev: String,
    },
}

/// Maps the domain state onto documents of the shared store.
#[derive(Clone)]
pub struct GameRepository {
    store: Arc<dyn DocumentStore>,
}

impl GameRepository {
    /// Repository over `store`.
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Read the game document.
    pub async fn load_game(&self) -> StorageResult<LoadedGame> {
        let Some(doc) = self.store.get(GAME_DOC_ID).await? else {
            return Ok(LoadedGame::Missing);
        };

        match decode::<GameEntity>(&doc) {
            Ok(entity) => Ok(LoadedGame::Found {
                state: entity.into(),
                rev: doc.rev,
            }),
            Err(err) => {
                warn!(error = %err, rev = %doc.rev, "persisted game document is malformed");
                Ok(LoadedGame::Malformed { rev: doc.rev })
            }
        }
    }

    /// Write the game document, conditionally on `expected_rev` when given.
    pub async fn save_game(
        &self,
        state: &GameState,
        expected_rev: Option<String>,
    ) -> StorageResult<String> {
        let body = encode(GAME_DOC_ID, &GameEntity::from(state.clone()))?;
        self.store.set(GAME_DOC_ID, body, expected_rev).await
    }

    /// Every question of the bank, oldest first.
    pub async fn list_questions(&self) -> StorageResult<Vec<Question>> {
        let docs = self.store.list(QUESTION_PREFIX).await?;
        let mut questions: Vec<QuestionEntity> = docs
            .iter()
            .filter_map(|doc| match decode::<QuestionEntity>(doc) {
                Ok(entity) => Some(entity),
                Err(err) => {
                    warn!(doc_id = %doc.id, error = %err, "skipping malformed question");
                    None
                }
            })
            .collect();
        questions.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(questions.into_iter().map(Into::into).collect())
    }

    /// Store a new question document.
    pub async fn add_question(&self, question: &Question) -> StorageResult<()> {
        let doc_id = question_doc_id(question.id);
        let body = encode(&doc_id, &QuestionEntity::from(question.clone()))?;
        self.store.set(&doc_id, body, None).await?;
        Ok(())
    }

    /// Apply a partial update, resolving to `None` for unknown questions.
    pub async fn update_question(
        &self,
        id: Uuid,
        patch: QuestionPatchEntity,
    ) -> StorageResult<Option<Question>> {
        let doc_id = question_doc_id(id);
        let patch = encode(&doc_id, &patch)?;
        if self.store.merge(&doc_id, patch).await?.is_none() {
            return Ok(None);
        }

        let Some(doc) = self.store.get(&doc_id).await? else {
            return Ok(None);
        };
        let entity = decode::<QuestionEntity>(&doc).map_err(|source| StorageError::Malformed {
            doc_id: doc.id.clone(),
            source,
        })?;
        Ok(Some(entity.into()))
    }

    /// Delete a question, returning whether it existed.
    pub async fn delete_question(&self, id: Uuid) -> StorageResult<bool> {
        self.store.delete(&question_doc_id(id)).await
    }

    /// Insert `seeds` when the bank is empty, returning how many were added.
    pub async fn seed_questions(&self, seeds: &[Question]) -> StorageResult<usize> {
        if !self.store.list(QUESTION_PREFIX).await?.is_empty() {
            return Ok(0);
        }
        for question in seeds {
            self.add_question(question).await?;
        }
        debug!(count = seeds.len(), "question bank seeded");
        Ok(seeds.len())
    }
}

fn decode<T: DeserializeOwned>(doc: &Document) -> Result<T, serde_json::Error> {
    serde_json::from_value(doc.body.clone())
}

fn encode<T: Serialize>(doc_id: &str, value: &T) -> StorageResult<Value> {
    serde_json::to_value(value).map_err(|source| StorageError::Malformed {
        doc_id: doc_id.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use serde_json::json;

    use super::*;
    use crate::{dao::document_store::memory::MemoryStore, state::game::Player};

    fn repository() -> (MemoryStore, GameRepository) {
        let store = MemoryStore::new();
        (store.clone(), GameRepository::new(Arc::new(store)))
    }

    fn question(prompt: &str, offset_secs: u64) -> Question {
        let mut question = Question::new(prompt.into(), "answer".into(), None);
        question.created_at = SystemTime::UNIX_EPOCH + Duration::from_secs(offset_secs);
        question
    }

    #[tokio::test]
    async fn game_round_trips_through_the_store() {
        let (_, repo) = repository();
        assert_eq!(repo.load_game().await.unwrap(), LoadedGame::Missing);

        let mut state = GameState::new(30);
        state.players.insert("a".into(), Player::new("a", "Ada"));
        let rev = repo.save_game(&state, None).await.unwrap();

        assert_eq!(
            repo.load_game().await.unwrap(),
            LoadedGame::Found { state, rev }
        );
    }

    #[tokio::test]
    async fn stale_revision_is_reported_as_conflict() {
        let (_, repo) = repository();
        let state = GameState::new(30);
        let rev = repo.save_game(&state, None).await.unwrap();
        repo.save_game(&state, Some(rev.clone())).await.unwrap();

        let err = repo.save_game(&state, Some(rev)).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict { .. }));
    }

    #[tokio::test]
    async fn malformed_game_is_detected() {
        let (store, repo) = repository();
        let rev = store
            .set(GAME_DOC_ID, json!({"players": "nope"}), None)
            .await
            .unwrap();
        assert_eq!(repo.load_game().await.unwrap(), LoadedGame::Malformed { rev });
    }

    #[tokio::test]
    async fn questions_are_listed_oldest_first() {
        let (_, repo) = repository();
        let newer = question("second", 20);
        let older = question("first", 10);
        repo.add_question(&newer).await.unwrap();
        repo.add_question(&older).await.unwrap();

        let prompts: Vec<_> = repo
            .list_questions()
            .await
            .unwrap()
            .into_iter()
            .map(|q| q.prompt)
            .collect();
        assert_eq!(prompts, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn update_merges_fields_and_clears_clip() {
        let (_, repo) = repository();
        let mut original = question("prompt", 1);
        original.clip_url = Some("https://example.com/clip".into());
        repo.add_question(&original).await.unwrap();

        let updated = repo
            .update_question(
                original.id,
                QuestionPatchEntity {
                    answer: Some("new answer".into()),
                    clip_url: Some(None),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.prompt, "prompt");
        assert_eq!(updated.answer, "new answer");
        assert_eq!(updated.clip_url, None);

        assert!(
            repo.update_question(Uuid::new_v4(), QuestionPatchEntity::default())
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn seeding_only_fills_an_empty_bank() {
        let (_, repo) = repository();
        let seeds = vec![question("a", 1), question("b", 2)];
        assert_eq!(repo.seed_questions(&seeds).await.unwrap(), 2);
        assert_eq!(repo.seed_questions(&seeds).await.unwrap(), 0);
        assert!(repo.delete_question(seeds[0].id).await.unwrap());
        assert_eq!(repo.list_questions().await.unwrap().len(), 1);
    }
}
