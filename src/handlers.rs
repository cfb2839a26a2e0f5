//! HTTP handlers for the PlanetScale AI API.
//!
//! Every handler is a thin adapter: it extracts query parameters, calls the
//! introspector or the pipeline, and serializes the result. Errors become
//! JSON bodies through [`ServerError`]'s `IntoResponse` impl.

use crate::constants::ROOT_REDIRECT_URL;
use crate::database::{SchemaIntrospector, TableSchema};
use crate::error::ServerError;
use crate::pipeline::{NaturalLanguageQueryRequest, NaturalLanguageQueryResponse};
use crate::server::AppState;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const PLUGIN_MANIFEST: &str = include_str!("../static/ai-plugin.json");
const OPENAPI_DOCUMENT: &str = include_str!("../static/openapi.json");

/// Response of `listOfDatabasesByName`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListDatabaseNamesResponse {
    pub database_names: Vec<String>,
}

/// Response of `listTablesForDatabaseByName`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTableNamesResponse {
    pub database_name: String,
    pub table_names: Vec<String>,
}

/// Query parameters of `listTablesForDatabaseByName`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableListParams {
    pub database_name: Option<String>,
}

/// Query parameters of `tableSchemaByName`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSchemaParams {
    pub database_name: Option<String>,
    pub table_name: Option<String>,
}

/// Query parameters of `naturalLanguageSQLQuery`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NaturalLanguageQueryParams {
    pub database_name: Option<String>,
    pub natural_language: Option<String>,
}

/// Require a non-blank query parameter.
fn required(value: Option<String>, name: &str) -> Result<String, ServerError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ServerError::invalid_input(format!("Missing required parameter: {}", name)))
}

/// `GET /planetscaleAi/listOfDatabasesByName`
pub async fn list_databases(State(state): State<AppState>) -> Json<ListDatabaseNamesResponse> {
    let introspector = SchemaIntrospector::new(state.database.as_ref(), state.databases());
    Json(ListDatabaseNamesResponse {
        database_names: introspector.list_databases(),
    })
}

/// `GET /planetscaleAi/listTablesForDatabaseByName`
pub async fn list_tables(
    State(state): State<AppState>,
    Query(params): Query<TableListParams>,
) -> Result<Json<ListTableNamesResponse>, ServerError> {
    let database_name = required(params.database_name, "databaseName")?;

    let introspector = SchemaIntrospector::new(state.database.as_ref(), state.databases());
    let table_names = introspector.list_tables(&database_name).await?;

    Ok(Json(ListTableNamesResponse {
        database_name,
        table_names,
    }))
}

/// `GET /planetscaleAi/tableSchemaByName`
pub async fn table_schema(
    State(state): State<AppState>,
    Query(params): Query<TableSchemaParams>,
) -> Result<Json<TableSchema>, ServerError> {
    let database_name = required(params.database_name, "databaseName")?;
    let table_name = required(params.table_name, "tableName")?;

    let introspector = SchemaIntrospector::new(state.database.as_ref(), state.databases());
    let schema = introspector
        .describe_table(&database_name, &table_name)
        .await?;

    Ok(Json(schema))
}

/// `GET /planetscaleAi/naturalLanguageSQLQuery`
pub async fn natural_language_query(
    State(state): State<AppState>,
    Query(params): Query<NaturalLanguageQueryParams>,
) -> Result<Json<NaturalLanguageQueryResponse>, ServerError> {
    let natural_language = required(params.natural_language, "naturalLanguage")?;
    let request = NaturalLanguageQueryRequest::new(params.database_name, natural_language);

    let response = state
        .pipeline
        .run(state.database.as_ref(), &request)
        .await?;

    Ok(Json(response))
}

/// `GET /`
pub async fn root_redirect() -> Redirect {
    Redirect::temporary(ROOT_REDIRECT_URL)
}

/// `GET /.well-known/ai-plugin.json`
pub async fn plugin_manifest(State(state): State<AppState>) -> Result<Json<Value>, ServerError> {
    let mut manifest = parse_descriptor(PLUGIN_MANIFEST)?;
    if let Some(public_url) = &state.config.http.public_url {
        manifest["api"]["url"] = Value::String(format!("{}/openapi.json", public_url));
    }
    Ok(Json(manifest))
}

/// `GET /openapi.json`
pub async fn openapi_document(State(state): State<AppState>) -> Result<Json<Value>, ServerError> {
    let mut document = parse_descriptor(OPENAPI_DOCUMENT)?;
    if let Some(public_url) = &state.config.http.public_url {
        document["servers"][0]["url"] = Value::String(public_url.clone());
    }
    Ok(Json(document))
}

fn parse_descriptor(raw: &str) -> Result<Value, ServerError> {
    serde_json::from_str(raw)
        .map_err(|e| ServerError::internal(format!("Invalid bundled descriptor: {}", e)))
}

/// `GET /health`
///
/// Answers 503 once shutdown has begun so load balancers stop routing here.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let (status_code, status) = if state.shutdown.is_shutting_down() {
        (StatusCode::SERVICE_UNAVAILABLE, "shutting_down")
    } else {
        (StatusCode::OK, "healthy")
    };

    let body = Json(serde_json::json!({
        "status": status,
        "shutdownPhase": state.shutdown.phase(),
        "server": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "model": state.pipeline.model(),
        "databases": state.databases().len(),
        "pool": state.database.pool_status(),
        "queries": state.pipeline.metrics().snapshot(),
    }));

    (status_code, body)
}
