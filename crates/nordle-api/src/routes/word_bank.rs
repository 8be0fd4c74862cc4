//! Read-only routes over the configured vocabulary.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use nordle_registry::domain::word::Word;
use nordle_registry::domain::word_bank::WordBank;
use serde::Serialize;

use crate::error::ApiError;
use crate::state::AppState;

/// Response body for GET /.
#[derive(Debug, Serialize)]
pub struct WordBankResponse {
    /// Number of words.
    pub count: usize,
    /// The vocabulary, in bank order.
    pub words: Vec<Word>,
}

/// Response body for GET /{word}.
#[derive(Debug, Serialize)]
pub struct WordLookupResponse {
    /// The normalized word.
    pub word: Word,
    /// Whether the bank holds it.
    pub exists: bool,
    /// Its position in the bank.
    pub index: Option<usize>,
}

/// GET /
async fn list_words(State(state): State<AppState>) -> Json<WordBankResponse> {
    let words = state.word_bank.words().to_vec();
    Json(WordBankResponse {
        count: words.len(),
        words,
    })
}

/// GET /{word}
async fn lookup_word(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> Result<Json<WordLookupResponse>, ApiError> {
    let word = Word::parse(&raw)?;
    Ok(Json(WordLookupResponse {
        exists: state.word_bank.exists(&word),
        index: state.word_bank.index_of(&word),
        word,
    }))
}

/// Returns the router for the word bank.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_words))
        .route("/{word}", get(lookup_word))
}
