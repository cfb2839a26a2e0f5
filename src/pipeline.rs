//! Natural-language query orchestration.
//!
//! One request runs strictly in order: resolve the database, list its
//! tables, render the prompt, ask the completion model, sanitize and validate
//! the returned statement, execute it and normalize the rows. Nothing is
//! cached between requests; the database handle is supplied per call.

use crate::completion::CompletionClient;
use crate::config::QueryConfig;
use crate::constants::LOG_QUERY_PREVIEW_LEN;
use crate::database::{normalize, truncate_for_log, Database, ExecutionOutcome, ResultRow};
use crate::database::SchemaIntrospector;
use crate::error::ServerError;
use crate::prompts::build_prompt;
use crate::security::{sanitize, QueryValidator};
use crate::telemetry::{RequestContext, ServiceMetrics, SharedMetrics};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// A natural-language question, optionally scoped to a database.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NaturalLanguageQueryRequest {
    pub database_name: Option<String>,
    pub natural_language: String,
}

impl NaturalLanguageQueryRequest {
    pub fn new(database_name: Option<String>, natural_language: impl Into<String>) -> Self {
        Self {
            database_name,
            natural_language: natural_language.into(),
        }
    }
}

/// The executed statement and its rows.
#[derive(Debug, Clone, Serialize)]
pub struct NaturalLanguageQueryResponse {
    /// Statement as executed.
    pub query: String,

    /// One mapping per row, keyed by column name in column order.
    pub results: Vec<ResultRow>,

    /// Column list, only when enabled in configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
}

/// Pick the database a question runs against.
///
/// With no databases configured nothing can be queried, whatever the caller
/// asked for. A non-blank supplied name is used as given. Otherwise a single
/// configured database is chosen implicitly and several are ambiguous.
pub fn resolve_database(known: &[String], supplied: Option<&str>) -> Result<String, ServerError> {
    if known.is_empty() {
        return Err(ServerError::NoDatabasesAvailable);
    }

    if let Some(name) = supplied.map(str::trim).filter(|n| !n.is_empty()) {
        return Ok(name.to_string());
    }

    match known {
        [only] => Ok(only.clone()),
        _ => Err(ServerError::disambiguation()),
    }
}

/// Translates questions into statements and runs them.
pub struct NaturalLanguageQueryService {
    completion: Arc<dyn CompletionClient>,
    validator: QueryValidator,
    databases: Vec<String>,
    max_rows: Option<usize>,
    include_columns: bool,
    metrics: SharedMetrics,
}

impl NaturalLanguageQueryService {
    /// Create a service from a completion client and query settings.
    pub fn new(completion: Arc<dyn CompletionClient>, config: &QueryConfig) -> Self {
        Self {
            completion,
            validator: QueryValidator::new(config.validation_mode, config.max_query_length),
            databases: config.databases.clone(),
            max_rows: config.max_rows,
            include_columns: config.include_columns,
            metrics: Arc::new(ServiceMetrics::new()),
        }
    }

    /// Configured database names.
    pub fn databases(&self) -> &[String] {
        &self.databases
    }

    /// Outcome counters.
    pub fn metrics(&self) -> &SharedMetrics {
        &self.metrics
    }

    /// Model used for translation.
    pub fn model(&self) -> &str {
        self.completion.model()
    }

    /// Answer one question against `db`.
    pub async fn run(
        &self,
        db: &dyn Database,
        request: &NaturalLanguageQueryRequest,
    ) -> Result<NaturalLanguageQueryResponse, ServerError> {
        let ctx = RequestContext::new("naturalLanguageSQLQuery");
        let span = info_span!(
            "nl_query",
            operation = ctx.operation,
            correlation_id = %ctx.correlation_id
        );

        self.metrics.record_received();
        let result = self.translate_and_run(db, request).instrument(span).await;

        match &result {
            Ok(_) => self.metrics.record_success(ctx.elapsed()),
            Err(ServerError::FailedToTranslateQuery) => self.metrics.record_translation_failure(),
            Err(_) => self.metrics.record_failure(),
        }
        result
    }

    async fn translate_and_run(
        &self,
        db: &dyn Database,
        request: &NaturalLanguageQueryRequest,
    ) -> Result<NaturalLanguageQueryResponse, ServerError> {
        if request.natural_language.trim().is_empty() {
            return Err(ServerError::invalid_input(
                "naturalLanguage must not be empty",
            ));
        }

        let database = resolve_database(&self.databases, request.database_name.as_deref())?;

        let tables = SchemaIntrospector::new(db, &self.databases)
            .list_tables(&database)
            .await?;

        let prompt = build_prompt(&tables, &request.natural_language);
        debug!("Rendered prompt:\n\n{}", prompt);

        let raw_completion = self.completion.complete(&prompt).await?;
        let statement = sanitize(&raw_completion);
        info!(
            database = %database,
            "Generated statement: {}",
            truncate_for_log(&statement, LOG_QUERY_PREVIEW_LEN)
        );

        if let Err(e) = self.validator.validate(&statement) {
            warn!("Generated statement rejected: {} (statement: {})", e, statement);
            return Err(ServerError::FailedToTranslateQuery);
        }

        let outcome = match db.execute(&database, &statement).await {
            Ok(outcome) => outcome,
            Err(e) if e.is_connectivity() => return Err(e),
            Err(e) => {
                error!("Generated statement failed: {} (statement: {})", e, statement);
                return Err(ServerError::FailedToTranslateQuery);
            }
        };

        let mut cursor = match outcome {
            ExecutionOutcome::Rows(cursor) => cursor,
            ExecutionOutcome::NoRows => {
                error!("Generated statement returned no result set: {}", statement);
                return Err(ServerError::FailedToTranslateQuery);
            }
        };

        let result = normalize(cursor.as_mut(), self.max_rows);
        if result.truncated {
            warn!(
                "Result truncated to {} rows",
                self.max_rows.unwrap_or_default()
            );
        }

        Ok(NaturalLanguageQueryResponse {
            query: statement,
            results: result.rows,
            columns: self.include_columns.then_some(result.columns),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{BufferedCursor, RawColumn};
    use crate::security::ValidationMode;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct CannedCompletion {
        text: String,
        prompts: Mutex<Vec<String>>,
    }

    impl CannedCompletion {
        fn new(text: &str) -> Arc<Self> {
            Arc::new(Self {
                text: text.to_string(),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl CompletionClient for CannedCompletion {
        async fn complete(&self, prompt: &str) -> Result<String, ServerError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.text.clone())
        }

        fn model(&self) -> &str {
            "canned"
        }
    }

    enum Behavior {
        Rows(Vec<&'static str>, Vec<Vec<&'static str>>),
        NoRows,
        Fail(fn() -> ServerError),
    }

    struct StubDatabase {
        tables: Vec<String>,
        behavior: Behavior,
        executed: Mutex<Vec<(String, String)>>,
    }

    impl StubDatabase {
        fn new(behavior: Behavior) -> Self {
            Self {
                tables: vec!["products".to_string()],
                behavior,
                executed: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Database for StubDatabase {
        async fn list_tables(&self, _database: &str) -> Result<Vec<String>, ServerError> {
            Ok(self.tables.clone())
        }

        async fn primary_key(
            &self,
            _database: &str,
            _table: &str,
        ) -> Result<Option<String>, ServerError> {
            Ok(None)
        }

        async fn describe_columns(
            &self,
            _database: &str,
            _table: &str,
        ) -> Result<Vec<RawColumn>, ServerError> {
            Ok(Vec::new())
        }

        async fn execute(
            &self,
            database: &str,
            statement: &str,
        ) -> Result<ExecutionOutcome, ServerError> {
            self.executed
                .lock()
                .unwrap()
                .push((database.to_string(), statement.to_string()));
            match &self.behavior {
                Behavior::Rows(columns, rows) => Ok(ExecutionOutcome::Rows(Box::new(
                    BufferedCursor::from_text(columns.clone(), rows.clone()),
                ))),
                Behavior::NoRows => Ok(ExecutionOutcome::NoRows),
                Behavior::Fail(make_error) => Err(make_error()),
            }
        }
    }

    fn query_config(databases: &[&str]) -> QueryConfig {
        QueryConfig {
            databases: databases.iter().map(|d| d.to_string()).collect(),
            ..QueryConfig::default()
        }
    }

    fn known(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_resolve_no_databases() {
        assert!(matches!(
            resolve_database(&[], None),
            Err(ServerError::NoDatabasesAvailable)
        ));
        assert!(matches!(
            resolve_database(&[], Some("shop")),
            Err(ServerError::NoDatabasesAvailable)
        ));
    }

    #[test]
    fn test_resolve_supplied_name_passthrough() {
        let dbs = known(&["shop", "hr"]);
        assert_eq!(resolve_database(&dbs, Some("hr")).unwrap(), "hr");
        assert_eq!(resolve_database(&dbs, Some("other")).unwrap(), "other");
    }

    #[test]
    fn test_resolve_single_database_implicit() {
        let dbs = known(&["shop"]);
        assert_eq!(resolve_database(&dbs, None).unwrap(), "shop");
        assert_eq!(resolve_database(&dbs, Some("  ")).unwrap(), "shop");
    }

    #[test]
    fn test_resolve_ambiguous() {
        let dbs = known(&["shop", "hr"]);
        match resolve_database(&dbs, None) {
            Err(ServerError::Disambiguation { needed_input }) => {
                assert_eq!(needed_input, "databaseName")
            }
            other => panic!("expected disambiguation, got {:?}", other.map(|_| ())),
        }
        assert!(resolve_database(&dbs, Some("")).is_err());
    }

    #[tokio::test]
    async fn test_end_to_end_count() {
        let completion = CannedCompletion::new(" SELECT COUNT(*) AS n FROM products;");
        let service = NaturalLanguageQueryService::new(completion.clone(), &query_config(&["shop"]));
        let db = StubDatabase::new(Behavior::Rows(vec!["n"], vec![vec!["42"]]));

        let response = service
            .run(&db, &NaturalLanguageQueryRequest::new(None, "how many products?"))
            .await
            .unwrap();

        assert_eq!(response.query, "SELECT COUNT(*) AS n FROM products");
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            serde_json::json!({
                "query": "SELECT COUNT(*) AS n FROM products",
                "results": [{"n": "42"}]
            })
        );

        let prompts = completion.prompts.lock().unwrap();
        assert!(prompts[0].contains("# - products\n"));
        assert!(prompts[0].ends_with("how many products?"));

        let executed = db.executed.lock().unwrap();
        assert_eq!(
            executed[0],
            ("shop".to_string(), "SELECT COUNT(*) AS n FROM products".to_string())
        );

        let snapshot = service.metrics().snapshot();
        assert_eq!(snapshot.queries_total, 1);
        assert_eq!(snapshot.queries_succeeded, 1);
    }

    #[tokio::test]
    async fn test_columns_included_when_enabled() {
        let completion = CannedCompletion::new("SELECT id, name FROM products");
        let config = QueryConfig {
            include_columns: true,
            ..query_config(&["shop"])
        };
        let service = NaturalLanguageQueryService::new(completion, &config);
        let db = StubDatabase::new(Behavior::Rows(
            vec!["id", "name"],
            vec![vec!["1", "a"], vec!["2", "b"]],
        ));

        let response = service
            .run(&db, &NaturalLanguageQueryRequest::new(None, "list products"))
            .await
            .unwrap();

        assert_eq!(response.columns, Some(known(&["id", "name"])));
        assert_eq!(response.results.len(), 2);
    }

    #[tokio::test]
    async fn test_no_rows_outcome_fails_translation() {
        let completion = CannedCompletion::new("SELECT 1");
        let service = NaturalLanguageQueryService::new(completion, &query_config(&["shop"]));
        let db = StubDatabase::new(Behavior::NoRows);

        let err = service
            .run(&db, &NaturalLanguageQueryRequest::new(None, "anything"))
            .await
            .unwrap_err();

        assert!(matches!(err, ServerError::FailedToTranslateQuery));
        assert_eq!(service.metrics().snapshot().translations_failed, 1);
    }

    #[tokio::test]
    async fn test_rejected_statement_not_executed() {
        let completion = CannedCompletion::new("DELETE FROM products");
        let service = NaturalLanguageQueryService::new(completion, &query_config(&["shop"]));
        let db = StubDatabase::new(Behavior::NoRows);

        let err = service
            .run(&db, &NaturalLanguageQueryRequest::new(None, "remove everything"))
            .await
            .unwrap_err();

        assert!(matches!(err, ServerError::FailedToTranslateQuery));
        assert!(db.executed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unrestricted_mode_passes_statement_through() {
        let completion = CannedCompletion::new("DELETE FROM products");
        let config = QueryConfig {
            validation_mode: ValidationMode::Unrestricted,
            ..query_config(&["shop"])
        };
        let service = NaturalLanguageQueryService::new(completion, &config);
        let db = StubDatabase::new(Behavior::NoRows);

        let err = service
            .run(&db, &NaturalLanguageQueryRequest::new(None, "remove everything"))
            .await
            .unwrap_err();

        assert!(matches!(err, ServerError::FailedToTranslateQuery));
        assert_eq!(db.executed.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_engine_error_masked() {
        let completion = CannedCompletion::new("SELECT nope FROM products");
        let service = NaturalLanguageQueryService::new(completion, &query_config(&["shop"]));
        let db = StubDatabase::new(Behavior::Fail(|| {
            ServerError::query_error_with_code("Unknown column 'nope'", 1054, None)
        }));

        let err = service
            .run(&db, &NaturalLanguageQueryRequest::new(None, "nope"))
            .await
            .unwrap_err();

        assert!(matches!(err, ServerError::FailedToTranslateQuery));
    }

    #[tokio::test]
    async fn test_connectivity_error_propagates() {
        let completion = CannedCompletion::new("SELECT 1");
        let service = NaturalLanguageQueryService::new(completion, &query_config(&["shop"]));
        let db = StubDatabase::new(Behavior::Fail(|| {
            ServerError::connection("Lost connection to MySQL server")
        }));

        let err = service
            .run(&db, &NaturalLanguageQueryRequest::new(None, "anything"))
            .await
            .unwrap_err();

        assert!(err.is_connectivity());
        assert_eq!(service.metrics().snapshot().queries_failed, 1);
    }

    #[tokio::test]
    async fn test_ambiguous_database_never_calls_completion() {
        let completion = CannedCompletion::new("SELECT 1");
        let service =
            NaturalLanguageQueryService::new(completion.clone(), &query_config(&["shop", "hr"]));
        let db = StubDatabase::new(Behavior::NoRows);

        let err = service
            .run(&db, &NaturalLanguageQueryRequest::new(None, "anything"))
            .await
            .unwrap_err();

        assert!(matches!(err, ServerError::Disambiguation { .. }));
        assert!(completion.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_row_cap_applies() {
        let completion = CannedCompletion::new("SELECT id FROM products");
        let config = QueryConfig {
            max_rows: Some(1),
            ..query_config(&["shop"])
        };
        let service = NaturalLanguageQueryService::new(completion, &config);
        let db = StubDatabase::new(Behavior::Rows(vec!["id"], vec![vec!["1"], vec!["2"]]));

        let response = service
            .run(&db, &NaturalLanguageQueryRequest::new(None, "ids"))
            .await
            .unwrap();

        assert_eq!(response.results.len(), 1);
    }

    #[tokio::test]
    async fn test_blank_question_rejected() {
        let completion = CannedCompletion::new("SELECT 1");
        let service = NaturalLanguageQueryService::new(completion, &query_config(&["shop"]));
        let db = StubDatabase::new(Behavior::NoRows);

        let err = service
            .run(&db, &NaturalLanguageQueryRequest::new(None, "   "))
            .await
            .unwrap_err();

        assert!(matches!(err, ServerError::InvalidInput(_)));
    }
}
