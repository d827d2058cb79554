//! Session orchestration: files to review text, review text to a
//! structured result, and assistant edits on that result.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::ai::StatementAi;
use crate::error::{Result, StmtxError, StoreError};
use crate::extract::{DocumentExtractor, SourceFile, FILE_SEPARATOR};
use crate::models::config::StmtxConfig;
use crate::models::statement::StatementResult;
use crate::persist::{PersistedSession, SessionStore};
use crate::store::ResultStore;

/// What the session is currently waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadingState {
    #[default]
    Idle,
    /// Decoding files and recovering text from page images.
    Extracting,
    /// Waiting for the model to structure the text or propose edits.
    Processing,
}

/// One user's working session.
///
/// Every operation borrows the session mutably, so at most one is in
/// flight and a reply can never overwrite the result of a later request.
pub struct Session<A: StatementAi, P: SessionStore> {
    ai: A,
    persistence: P,
    extractor: Arc<DocumentExtractor>,
    store: ResultStore,
    file_label: String,
    raw_text: String,
    error: Option<String>,
    state: watch::Sender<LoadingState>,
}

impl<A: StatementAi, P: SessionStore> Session<A, P> {
    /// Create a session, restoring the last file label and raw text.
    pub fn new(config: &StmtxConfig, ai: A, persistence: P) -> Self {
        let restored = persistence.load().unwrap_or_else(|e| {
            warn!("Ignoring unreadable saved session: {}", e);
            PersistedSession::default()
        });
        if !restored.raw_text.is_empty() {
            debug!("Restored session for '{}'", restored.file_label);
        }

        let (state, _) = watch::channel(LoadingState::Idle);

        Self {
            ai,
            persistence,
            extractor: Arc::new(DocumentExtractor::new(config)),
            store: ResultStore::new(config.store.clone()),
            file_label: restored.file_label,
            raw_text: restored.raw_text,
            error: None,
            state,
        }
    }

    /// Watch loading state changes.
    pub fn subscribe(&self) -> watch::Receiver<LoadingState> {
        self.state.subscribe()
    }

    pub fn loading_state(&self) -> LoadingState {
        *self.state.borrow()
    }

    /// Message from the last failed operation.
    pub fn error_banner(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn file_label(&self) -> &str {
        &self.file_label
    }

    /// Statement text awaiting review or submission.
    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    /// Replace the review text. Not persisted until the next lifecycle event.
    pub fn set_raw_text(&mut self, text: impl Into<String>) {
        self.raw_text = text.into();
    }

    pub fn ai(&self) -> &A {
        &self.ai
    }

    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ResultStore {
        &mut self.store
    }

    pub fn result(&self) -> Option<&StatementResult> {
        self.store.current()
    }

    /// Balance mismatch warning for the current result.
    pub fn mismatch(&self) -> Option<String> {
        self.store.mismatch()
    }

    /// Extract the selected files into review text.
    ///
    /// Page images are sent for OCR; their text follows any directly
    /// extracted text. All files succeed or the whole selection fails.
    pub async fn select_files(&mut self, files: Vec<SourceFile>) -> Result<()> {
        self.begin(LoadingState::Extracting);
        let outcome = self.extract_files(files).await;
        self.finish(outcome)
    }

    async fn extract_files(&mut self, files: Vec<SourceFile>) -> Result<()> {
        if files.is_empty() {
            return Err(StmtxError::Validation("no files selected".to_string()));
        }

        let label = files
            .iter()
            .map(|f| f.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        info!("Selected {}", label);

        let content = Arc::clone(&self.extractor).extract_batch(files).await?;

        let mut parts: Vec<String> = content.text.into_iter().collect();
        if !content.images.is_empty() {
            let recovered = self.ai.text_from_images(&content.images).await?;
            if !recovered.trim().is_empty() {
                parts.push(recovered);
            }
        }

        self.file_label = label;
        self.raw_text = parts.join(FILE_SEPARATOR);
        self.persist();
        Ok(())
    }

    /// Send the review text for structured extraction.
    pub async fn submit(&mut self) -> Result<()> {
        if self.raw_text.trim().is_empty() {
            self.error = None;
            return self.finish(Err(StmtxError::Validation(
                "Statement text is empty. Select a file or paste the statement first.".to_string(),
            )));
        }

        self.begin(LoadingState::Processing);
        let outcome = self
            .ai
            .process_statement(&self.raw_text)
            .await
            .map_err(StmtxError::from);

        if let Ok(result) = &outcome {
            info!("Extracted {} transactions", result.transactions.len());
            self.store.load(result.clone());
            self.persist();
        }
        self.finish(outcome.map(|_| ()))
    }

    /// Ask the assistant to edit the current result.
    ///
    /// The proposed edits are applied together: if any is rejected, none
    /// are. Returns the number of edits applied.
    pub async fn assist(&mut self, instruction: &str) -> Result<usize> {
        self.begin(LoadingState::Processing);
        let outcome = self.apply_assistant_edits(instruction).await;
        self.finish(outcome)
    }

    async fn apply_assistant_edits(&mut self, instruction: &str) -> Result<usize> {
        if instruction.trim().is_empty() {
            return Err(StmtxError::Validation("instruction is empty".to_string()));
        }
        let current = self.store.current().ok_or(StoreError::Empty)?;

        let edits = self.ai.propose_edits(current, instruction).await?;
        let count = edits.len();

        let mut staged = self.store.clone();
        for edit in edits {
            staged.apply(edit)?;
        }
        self.store = staged;

        debug!("Applied {} assistant edit(s)", count);
        Ok(count)
    }

    fn begin(&mut self, state: LoadingState) {
        self.error = None;
        self.state.send_replace(state);
    }

    fn finish<T>(&mut self, outcome: Result<T>) -> Result<T> {
        self.state.send_replace(LoadingState::Idle);
        if let Err(e) = &outcome {
            warn!("{}", e);
            self.error = Some(e.to_string());
        }
        outcome
    }

    fn persist(&self) {
        let session = PersistedSession {
            file_label: self.file_label.clone(),
            raw_text: self.raw_text.clone(),
        };
        if let Err(e) = self.persistence.save(&session) {
            warn!("Failed to save session: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AiError;
    use crate::models::statement::{PageImage, Transaction};
    use crate::persist::MemorySessionStore;
    use crate::store::{BalanceKind, StatementEdit};
    use image::{DynamicImage, ImageFormat};
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeAi {
        ocr_calls: AtomicUsize,
        process_calls: AtomicUsize,
        fail_processing: bool,
        edits: Vec<StatementEdit>,
        observer: Mutex<Option<watch::Receiver<LoadingState>>>,
        observed: Mutex<Vec<LoadingState>>,
    }

    impl FakeAi {
        fn observe(&self) {
            if let Some(rx) = self.observer.lock().unwrap().as_ref() {
                self.observed.lock().unwrap().push(*rx.borrow());
            }
        }
    }

    impl StatementAi for FakeAi {
        async fn text_from_images(&self, images: &[PageImage]) -> std::result::Result<String, AiError> {
            self.ocr_calls.fetch_add(1, Ordering::SeqCst);
            self.observe();
            Ok(format!("OCR of {} page(s)", images.len()))
        }

        async fn process_statement(&self, _text: &str) -> std::result::Result<StatementResult, AiError> {
            self.process_calls.fetch_add(1, Ordering::SeqCst);
            self.observe();
            if self.fail_processing {
                return Err(AiError::Status {
                    status: 500,
                    body: "upstream unavailable".to_string(),
                });
            }
            Ok(statement())
        }

        async fn propose_edits(
            &self,
            _result: &StatementResult,
            _instruction: &str,
        ) -> std::result::Result<Vec<StatementEdit>, AiError> {
            Ok(self.edits.clone())
        }
    }

    fn statement() -> StatementResult {
        StatementResult {
            opening_balance: Some(Decimal::from(1000)),
            ending_balance: Some(Decimal::from(1400)),
            transactions: vec![Transaction {
                transaction_code: "T1".to_string(),
                date: "05/03/2024".to_string(),
                description: "Salary".to_string(),
                debit: Decimal::from(500),
                credit: Decimal::ZERO,
                fee: None,
                vat: None,
            }],
            ..Default::default()
        }
    }

    fn png_file(name: &str) -> SourceFile {
        let mut data = Vec::new();
        DynamicImage::new_rgb8(2, 2)
            .write_to(&mut Cursor::new(&mut data), ImageFormat::Png)
            .unwrap();
        SourceFile::new(name, data)
    }

    fn session(ai: FakeAi) -> Session<FakeAi, MemorySessionStore> {
        Session::new(&StmtxConfig::default(), ai, MemorySessionStore::new())
    }

    #[tokio::test]
    async fn test_text_files_become_review_text() {
        let mut session = session(FakeAi::default());

        session
            .select_files(vec![
                SourceFile::new("a.txt", b"A".to_vec()),
                SourceFile::new("b.txt", b"B".to_vec()),
            ])
            .await
            .unwrap();

        assert_eq!(session.raw_text(), format!("A{}B", FILE_SEPARATOR));
        assert_eq!(session.file_label(), "a.txt, b.txt");
        assert_eq!(session.ai().ocr_calls.load(Ordering::SeqCst), 0);
        assert_eq!(session.loading_state(), LoadingState::Idle);

        let saved = session.persistence.load().unwrap();
        assert_eq!(saved.file_label, "a.txt, b.txt");
        assert_eq!(saved.raw_text, session.raw_text());
    }

    #[tokio::test]
    async fn test_images_are_sent_for_ocr_after_text() {
        let mut session = session(FakeAi::default());
        *session.ai().observer.lock().unwrap() = Some(session.subscribe());

        session
            .select_files(vec![SourceFile::new("notes.txt", b"Header".to_vec()), png_file("p1.png")])
            .await
            .unwrap();

        assert_eq!(session.ai().ocr_calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            session.raw_text(),
            format!("Header{}OCR of 1 page(s)", FILE_SEPARATOR)
        );
        assert_eq!(*session.ai().observed.lock().unwrap(), vec![LoadingState::Extracting]);
    }

    #[tokio::test]
    async fn test_failed_file_aborts_selection() {
        let mut session = session(FakeAi::default());
        session.set_raw_text("previous");

        let err = session
            .select_files(vec![
                SourceFile::new("a.txt", b"A".to_vec()),
                SourceFile::new("statement.odt", b"?".to_vec()),
            ])
            .await
            .unwrap_err();

        assert!(matches!(err, StmtxError::Extract(_)));
        assert!(session.error_banner().unwrap().contains("statement.odt"));
        assert_eq!(session.raw_text(), "previous");
        assert_eq!(session.loading_state(), LoadingState::Idle);
    }

    #[tokio::test]
    async fn test_empty_text_rejected_without_ai_call() {
        let mut session = session(FakeAi::default());
        session.set_raw_text("  \n ");

        let err = session.submit().await.unwrap_err();

        assert!(matches!(err, StmtxError::Validation(_)));
        assert!(session.error_banner().is_some());
        assert_eq!(session.ai().process_calls.load(Ordering::SeqCst), 0);
        assert!(session.result().is_none());
    }

    #[tokio::test]
    async fn test_submit_loads_store_and_reports_mismatch() {
        let mut session = session(FakeAi::default());
        *session.ai().observer.lock().unwrap() = Some(session.subscribe());
        session.set_raw_text("Opening 1000 ... Closing 1400");

        session.submit().await.unwrap();

        assert_eq!(session.result(), Some(&statement()));
        assert_eq!(session.store().history_len(), 1);
        assert_eq!(*session.ai().observed.lock().unwrap(), vec![LoadingState::Processing]);
        assert_eq!(session.loading_state(), LoadingState::Idle);

        let warning = session.mismatch().unwrap();
        assert!(warning.contains("1,500.00"), "{}", warning);
        assert!(warning.contains("1,400.00"), "{}", warning);
        assert!(warning.contains("100.00"), "{}", warning);

        assert_eq!(
            session.persistence.load().unwrap().raw_text,
            "Opening 1000 ... Closing 1400"
        );
    }

    #[tokio::test]
    async fn test_ai_failure_sets_banner_and_next_operation_clears_it() {
        let mut session = session(FakeAi {
            fail_processing: true,
            ..Default::default()
        });
        session.set_raw_text("statement");

        let err = session.submit().await.unwrap_err();
        assert!(matches!(err, StmtxError::Ai(AiError::Status { status: 500, .. })));
        assert!(session.error_banner().unwrap().contains("upstream unavailable"));
        assert!(session.result().is_none());
        assert_eq!(session.loading_state(), LoadingState::Idle);

        session
            .select_files(vec![SourceFile::new("a.txt", b"A".to_vec())])
            .await
            .unwrap();
        assert_eq!(session.error_banner(), None);
    }

    #[tokio::test]
    async fn test_restores_persisted_session() {
        let persistence = MemorySessionStore::new();
        persistence
            .save(&PersistedSession {
                file_label: "march.pdf".to_string(),
                raw_text: "saved text".to_string(),
            })
            .unwrap();

        let session = Session::new(&StmtxConfig::default(), FakeAi::default(), persistence);

        assert_eq!(session.file_label(), "march.pdf");
        assert_eq!(session.raw_text(), "saved text");
        assert!(session.result().is_none());
    }

    #[tokio::test]
    async fn test_assist_applies_edits_through_store() {
        let mut session = session(FakeAi {
            edits: vec![
                StatementEdit::SetBalance(BalanceKind::Ending, Some(Decimal::from(1500))),
                StatementEdit::AddTransaction(Default::default()),
            ],
            ..Default::default()
        });
        session.set_raw_text("statement");
        session.submit().await.unwrap();

        let applied = session.assist("fix the closing balance").await.unwrap();

        assert_eq!(applied, 2);
        assert_eq!(session.store().history_len(), 3);
        assert_eq!(session.result().unwrap().transactions.len(), 2);
        assert_eq!(session.mismatch(), None);
    }

    #[tokio::test]
    async fn test_assist_rejects_all_edits_when_one_fails() {
        let mut session = session(FakeAi {
            edits: vec![
                StatementEdit::SetBalance(BalanceKind::Ending, Some(Decimal::from(1500))),
                StatementEdit::SetField {
                    row: 7,
                    edit: crate::store::FieldEdit::Text(
                        crate::store::TextField::Description,
                        "x".to_string(),
                    ),
                },
            ],
            ..Default::default()
        });
        session.set_raw_text("statement");
        session.submit().await.unwrap();

        let err = session.assist("edit row 8").await.unwrap_err();

        assert!(matches!(
            err,
            StmtxError::Store(StoreError::IndexOutOfRange { index: 7, len: 1 })
        ));
        assert_eq!(session.store().history_len(), 1);
        assert_eq!(session.result(), Some(&statement()));
    }

    #[tokio::test]
    async fn test_assist_without_result() {
        let mut session = session(FakeAi::default());

        let err = session.assist("add a row").await.unwrap_err();
        assert!(matches!(err, StmtxError::Store(StoreError::Empty)));
    }
}
