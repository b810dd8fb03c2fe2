use crate::analytics::SearchType;
use crate::error::{ApiError, Result};
use crate::state::AppState;
use crate::templates::{self, CATALOG, Category, DEFAULT_SUGGESTIONS, SmartTemplate};
use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use serde::{Deserialize, Serialize};

// Larger limits just return the whole ranked catalog
const MAX_SUGGESTIONS: usize = 20;

#[derive(Debug, Deserialize)]
pub struct SuggestRequest {
    pub content: String,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct TemplateList {
    pub count: usize,
    pub templates: Vec<&'static SmartTemplate>,
}

impl From<Vec<&'static SmartTemplate>> for TemplateList {
    fn from(templates: Vec<&'static SmartTemplate>) -> Self {
        Self {
            count: templates.len(),
            templates,
        }
    }
}

pub async fn suggest_handler(
    payload: std::result::Result<Json<SuggestRequest>, JsonRejection>,
) -> Result<Json<TemplateList>> {
    let Json(req) = payload?;
    let limit = req.limit.unwrap_or(DEFAULT_SUGGESTIONS).min(MAX_SUGGESTIONS);
    Ok(Json(templates::suggest(&req.content, limit).into()))
}

pub async fn template_handler(Path(id): Path<String>) -> Result<Json<&'static SmartTemplate>> {
    templates::find(id.trim())
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Template"))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub category: Option<String>,
    pub q: Option<String>,
}

pub async fn list_templates_handler(
    State(state): State<AppState>,
    query: std::result::Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<TemplateList>> {
    let Query(query) = query?;

    let category = match query.category.as_deref().filter(|c| !c.trim().is_empty()) {
        Some(raw) => Some(Category::parse(raw).ok_or_else(|| {
            ApiError::invalid_input(format!("Unknown template category: {raw}"))
        })?),
        None => None,
    };
    let search = query.q.as_deref().map(str::trim).filter(|q| !q.is_empty());

    let found: Vec<&'static SmartTemplate> = match (search, category) {
        (Some(q), Some(category)) => templates::search(q)
            .into_iter()
            .filter(|t| t.category == category)
            .collect(),
        (Some(q), None) => templates::search(q),
        (None, Some(category)) => templates::by_category(category),
        (None, None) => CATALOG.iter().collect(),
    };

    if let Some(q) = search.filter(|_| state.analytics.is_configured()) {
        let analytics = state.analytics.clone();
        let (q, count) = (q.to_string(), found.len());
        tokio::spawn(async move {
            analytics.track_search(&q, count, SearchType::Template, None).await;
        });
    }
    Ok(Json(found.into()))
}
