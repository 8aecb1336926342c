//! Route handlers

use crate::crawler::{RunMode, ScrapeRequest};
use crate::output::ScrapeResult;
use crate::server::AppState;
use crate::HarvestError;
use actix_files::NamedFile;
use actix_web::{error, get, post, web, HttpRequest, HttpResponse, Responder};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Request body of both scrape routes
///
/// Every field is optional here so that a missing field is reported as a
/// validation message rather than a deserialization failure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeBody {
    pub base_url: Option<String>,
    pub start_page: Option<i64>,
    pub end_page: Option<i64>,
}

impl ScrapeBody {
    /// Validates the body into a request
    pub fn into_request(self, mode: RunMode) -> Result<ScrapeRequest, String> {
        let (Some(base_url), Some(start_page), Some(end_page)) =
            (self.base_url, self.start_page, self.end_page)
        else {
            return Err("Missing required parameters: baseUrl, startPage, endPage".to_string());
        };

        if base_url.trim().is_empty() {
            return Err("baseUrl must not be empty".to_string());
        }
        if start_page < 1 || end_page < 1 {
            return Err("startPage and endPage must be positive integers".to_string());
        }
        if start_page > end_page {
            return Err("startPage must not be greater than endPage".to_string());
        }

        let start_page =
            u32::try_from(start_page).map_err(|_| "startPage is too large".to_string())?;
        let end_page = u32::try_from(end_page).map_err(|_| "endPage is too large".to_string())?;

        Ok(ScrapeRequest::new(base_url, start_page, end_page, mode))
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ScrapeResponse {
    success: bool,
    #[serde(flatten)]
    result: ScrapeResult,
    download_link: String,
}

/// Registers every route plus the JSON error handler
pub fn configure(cfg: &mut web::ServiceConfig) {
    let json_config = web::JsonConfig::default().error_handler(|err, _req| {
        let response = bad_request(format!("Invalid request body: {}", err));
        error::InternalError::from_response(err, response).into()
    });

    cfg.app_data(json_config)
        .service(index)
        .service(scrape)
        .service(scrape_category)
        .service(download);
}

#[get("/")]
async fn index() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "name": "biz-harvest",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Scrapes business listings from a paginated directory into a deduplicated CSV dataset",
        "endpoints": {
            "POST /scrape": "{ baseUrl, startPage, endPage }: scrape a page range into the default dataset",
            "POST /scrape-category": "{ baseUrl, startPage, endPage }: baseUrl must contain /category/<name>; results go to that category's dataset",
            "GET /download/{filename}": "download a dataset file",
        }
    }))
}

#[post("/scrape")]
async fn scrape(state: web::Data<AppState>, body: web::Json<ScrapeBody>) -> HttpResponse {
    run_scrape(&state, body.into_inner(), RunMode::Standard).await
}

#[post("/scrape-category")]
async fn scrape_category(state: web::Data<AppState>, body: web::Json<ScrapeBody>) -> HttpResponse {
    run_scrape(&state, body.into_inner(), RunMode::Category).await
}

#[get("/download/{filename}")]
async fn download(
    req: HttpRequest,
    state: web::Data<AppState>,
    filename: web::Path<String>,
) -> HttpResponse {
    let filename = filename.into_inner();

    let Some(path) = state.store.resolve_download(&filename) else {
        return not_found(&filename);
    };

    match NamedFile::open(&path) {
        Ok(file) => file.into_response(&req),
        Err(e) => {
            tracing::warn!(path = %path.display(), "Failed to open download: {}", e);
            not_found(&filename)
        }
    }
}

async fn run_scrape(state: &AppState, body: ScrapeBody, mode: RunMode) -> HttpResponse {
    let request = match body.into_request(mode) {
        Ok(request) => request,
        Err(message) => return bad_request(message),
    };

    match state.orchestrator.run(&request).await {
        Ok(result) => {
            let download_link = format!("/download/{}", result.stats.output_file);
            HttpResponse::Ok().json(ScrapeResponse {
                success: true,
                result,
                download_link,
            })
        }
        Err(e) if e.is_validation() => bad_request(e.to_string()),
        Err(e) => {
            tracing::error!(base_url = %request.base_url, "Scrape failed: {}", e);
            let summary = match &e {
                HarvestError::EmptyResult { .. } => "No businesses were scraped",
                HarvestError::PersistenceWrite { .. } => "Failed to save scraped businesses",
                _ => "Scrape failed",
            };
            HttpResponse::InternalServerError().json(json!({
                "success": false,
                "error": summary,
                "details": e.to_string(),
            }))
        }
    }
}

fn bad_request(message: impl Into<String>) -> HttpResponse {
    HttpResponse::BadRequest().json(json!({
        "success": false,
        "error": message.into(),
    }))
}

fn not_found(filename: &str) -> HttpResponse {
    HttpResponse::NotFound().json(json!({
        "success": false,
        "error": format!("File not found: {}", filename),
    }))
}
