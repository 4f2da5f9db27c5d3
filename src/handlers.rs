use actix_web::cookie::Cookie;
use actix_web::http::header;
use actix_web::{get, post, web, HttpRequest, HttpResponse, Responder};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::db::{self, User};
use crate::fetchers;
use crate::identity;
use crate::session::SESSION_COOKIE;

pub const ERROR_PAGE: &str = "/admin/404/";
const LOGIN_MESSAGE: &str = "Please Login to Continue";

pub fn session_token(req: &HttpRequest) -> Option<Uuid> {
    req.cookie(SESSION_COOKIE)
        .and_then(|c| Uuid::parse_str(c.value()).ok())
}

fn redirect(location: &str) -> HttpResponse {
    HttpResponse::Found()
        .insert_header((header::LOCATION, location))
        .finish()
}

/// Stores a one-shot message in the session (creating a session when the
/// request carries none) and redirects to the shared error page.
fn error_redirect(state: &AppState, req: &HttpRequest, message: &str) -> HttpResponse {
    let existing = session_token(req).filter(|t| state.sessions.contains(t));
    let (token, created) = match existing {
        Some(token) => (token, false),
        None => (state.sessions.create(), true),
    };
    state.sessions.set_error_message(&token, message);

    let mut builder = HttpResponse::Found();
    builder.insert_header((header::LOCATION, ERROR_PAGE));
    if created {
        builder.cookie(
            Cookie::build(SESSION_COOKIE, token.to_string())
                .path("/")
                .finish(),
        );
    }
    builder.finish()
}

/// The `anonymous -> identified` transition shared by every protected page:
/// a session, a logged-in id in it, and a user record that id resolves to.
async fn require_user(
    state: &AppState,
    req: &HttpRequest,
    message: &str,
) -> Result<(Uuid, User), HttpResponse> {
    let Some(token) = session_token(req).filter(|t| state.sessions.contains(t)) else {
        return Err(error_redirect(state, req, message));
    };
    let Some(id) = state.sessions.user_id(&token) else {
        return Err(error_redirect(state, req, message));
    };
    match identity::resolve_user(state, id).await {
        Ok(user) => Ok((token, user)),
        Err(e) => {
            log::error!("Identity resolution failed: {e}");
            Err(error_redirect(state, req, message))
        }
    }
}

#[get("/heartbeat")]
pub async fn heartbeat(data: web::Data<AppState>) -> impl Responder {
    match data.pool.get().await {
        Ok(client) => match client.query_one("SELECT COUNT(*) FROM users", &[]).await {
            Ok(row) => {
                let farmers: i64 = row.get(0);
                HttpResponse::Ok().body(format!("OK - serving {farmers} registered farmers"))
            }
            Err(e) => {
                log::error!("Heartbeat query failed: {e}");
                HttpResponse::InternalServerError().body("Heartbeat query failed")
            }
        },
        Err(e) => {
            log::error!("Heartbeat could not reach the database: {e}");
            HttpResponse::InternalServerError().body("Database unreachable")
        }
    }
}

/// Error page. The stored session message is consumed exactly once; a second
/// visit sees the generic default.
#[get("/admin/404/")]
pub async fn e404_page(data: web::Data<AppState>, req: HttpRequest) -> impl Responder {
    let message = session_token(&req)
        .and_then(|t| data.sessions.take_error_message(&t))
        .unwrap_or_else(|| "An error occurred".to_string());
    HttpResponse::Ok().json(json!({ "errormsg": message }))
}

#[get("/dashboard/home")]
pub async fn home_page(data: web::Data<AppState>, req: HttpRequest) -> impl Responder {
    let user = match require_user(&data, &req, "An unexpected error occurred").await {
        Ok((_, user)) => user,
        Err(resp) => return resp,
    };

    let client = match data.pool.get().await {
        Ok(client) => client,
        Err(e) => {
            log::error!("Home page error: {e}");
            return error_redirect(&data, &req, "An unexpected error occurred");
        }
    };
    let my_products = match db::produce_for_farmer(&client, user.id).await {
        Ok(products) => products,
        Err(e) => {
            log::error!("Home page error: {e}");
            return error_redirect(&data, &req, "An unexpected error occurred");
        }
    };
    let public_count = match db::count_all_produce(&client).await {
        Ok(count) => count,
        Err(e) => {
            log::error!("Home page error: {e}");
            return error_redirect(&data, &req, "An unexpected error occurred");
        }
    };

    // Aggregator calls degrade to empty values; they never fail the page.
    let weather = fetchers::cached_weather(&data, user.coords()).await;
    let news = fetchers::cached_news(&data).await;
    let headlines: Vec<_> = news.iter().take(3).collect();

    let last_listing = my_products
        .last()
        .map(|p| json!(p))
        .unwrap_or_else(|| json!(""));

    HttpResponse::Ok().json(json!({
        "user": user,
        "produces_count": my_products.len(),
        "public_produces_count": public_count,
        "last_listing": last_listing,
        "produces": my_products,
        "news": headlines,
        "weather": weather,
    }))
}

#[get("/dashboard/forum")]
pub async fn forum(data: web::Data<AppState>, req: HttpRequest) -> impl Responder {
    let logged = session_token(&req)
        .filter(|t| data.sessions.contains(t))
        .and_then(|t| data.sessions.user_id(&t));
    if logged.is_none() {
        return error_redirect(&data, &req, LOGIN_MESSAGE);
    }
    HttpResponse::Ok().json(json!({}))
}

#[get("/dashboard/news")]
pub async fn news_page(data: web::Data<AppState>, req: HttpRequest) -> impl Responder {
    let user = match require_user(&data, &req, LOGIN_MESSAGE).await {
        Ok((_, user)) => user,
        Err(resp) => return resp,
    };

    let news = fetchers::cached_news(&data).await;
    HttpResponse::Ok().json(json!({
        "news": news,
        "userid": user.id,
        "user": user,
    }))
}

#[get("/dashboard/prices")]
pub async fn crop_prices_page(data: web::Data<AppState>, req: HttpRequest) -> impl Responder {
    let user = match require_user(&data, &req, LOGIN_MESSAGE).await {
        Ok((_, user)) => user,
        Err(resp) => return resp,
    };

    let prices = fetchers::cached_prices(&data, user.id).await;
    HttpResponse::Ok().json(json!({
        "userid": user.id,
        "user": user,
        "date": Utc::now(),
        "prices": prices,
    }))
}

#[derive(Debug, Deserialize)]
pub struct CropForm {
    pub nitrogen: f64,
    pub phosphorus: f64,
    pub potassium: f64,
    #[serde(rename = "PH")]
    pub ph: f64,
    pub rainfall: f64,
}

#[get("/dashboard/croprec")]
pub async fn croprec_page(data: web::Data<AppState>, req: HttpRequest) -> impl Responder {
    let user = match require_user(&data, &req, LOGIN_MESSAGE).await {
        Ok((_, user)) => user,
        Err(resp) => return resp,
    };
    HttpResponse::Ok().json(json!({
        "userid": user.id,
        "user": user,
    }))
}

#[post("/dashboard/croprec")]
pub async fn croprec_submit(
    data: web::Data<AppState>,
    req: HttpRequest,
    form: web::Form<CropForm>,
) -> impl Responder {
    let user = match require_user(&data, &req, LOGIN_MESSAGE).await {
        Ok((_, user)) => user,
        Err(resp) => return resp,
    };

    let weather = fetchers::cached_weather(&data, user.coords()).await;
    match data.models.recommend_crop(
        form.nitrogen,
        form.phosphorus,
        form.potassium,
        weather.as_ref(),
        form.ph,
        form.rainfall,
    ) {
        Ok(prediction) => HttpResponse::Ok().json(json!({
            "userid": user.id,
            "user": user,
            "prediction": prediction,
        })),
        Err(e) => {
            log::error!("Crop recommendation prediction error: {e}");
            HttpResponse::Ok().json(json!({
                "userid": user.id,
                "user": user,
                "error": "Prediction failed",
            }))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct FertilizerForm {
    pub nitrogen: f64,
    pub phosphorus: f64,
    pub potassium: f64,
    pub moisture: f64,
    pub soil_type: String,
    pub crop: String,
}

#[get("/dashboard/fertrec")]
pub async fn fertrec_page(data: web::Data<AppState>, req: HttpRequest) -> impl Responder {
    let user = match require_user(&data, &req, LOGIN_MESSAGE).await {
        Ok((_, user)) => user,
        Err(resp) => return resp,
    };
    HttpResponse::Ok().json(json!({
        "userid": user.id,
        "user": user,
    }))
}

#[post("/dashboard/fertrec")]
pub async fn fertrec_submit(
    data: web::Data<AppState>,
    req: HttpRequest,
    form: web::Form<FertilizerForm>,
) -> impl Responder {
    let user = match require_user(&data, &req, LOGIN_MESSAGE).await {
        Ok((_, user)) => user,
        Err(resp) => return resp,
    };

    let weather = fetchers::cached_weather(&data, user.coords()).await;
    match data.models.recommend_fertilizer(
        form.nitrogen,
        form.phosphorus,
        form.potassium,
        weather.as_ref(),
        form.moisture,
        &form.soil_type,
        &form.crop,
    ) {
        Ok(prediction) => HttpResponse::Ok().json(json!({
            "userid": user.id,
            "user": user,
            "prediction": prediction,
        })),
        Err(e) => {
            log::error!("Fertilizer recommendation error: {e}");
            HttpResponse::Ok().json(json!({
                "userid": user.id,
                "user": user,
                "error": "Prediction failed",
            }))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatForm {
    pub userinput: String,
}

#[get("/dashboard/help")]
pub async fn help_page(data: web::Data<AppState>, req: HttpRequest) -> impl Responder {
    let (token, user) = match require_user(&data, &req, LOGIN_MESSAGE).await {
        Ok(pair) => pair,
        Err(resp) => return resp,
    };
    HttpResponse::Ok().json(json!({
        "userid": user.id,
        "user": user,
        "log": data.sessions.chatlog(&token),
    }))
}

#[post("/dashboard/help")]
pub async fn help_submit(
    data: web::Data<AppState>,
    req: HttpRequest,
    form: web::Form<ChatForm>,
) -> impl Responder {
    let (token, user) = match require_user(&data, &req, LOGIN_MESSAGE).await {
        Ok(pair) => pair,
        Err(resp) => return resp,
    };

    let form = form.into_inner();
    let reply = data.chat.respond(&form.userinput).await;
    let chatlog = data.sessions.append_chat_turn(&token, form.userinput, reply);

    HttpResponse::Ok().json(json!({
        "userid": user.id,
        "user": user,
        "log": chatlog,
    }))
}

#[get("/dashboard/profile")]
pub async fn profile_page(data: web::Data<AppState>, req: HttpRequest) -> impl Responder {
    let user = match require_user(&data, &req, LOGIN_MESSAGE).await {
        Ok((_, user)) => user,
        Err(resp) => return resp,
    };
    HttpResponse::Ok().json(json!({
        "userid": user.id,
        "user": user,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ProduceForm {
    pub crop: String,
    pub variety: String,
    pub quantity: f64,
}

#[get("/dashboard/market/list")]
pub async fn list_page(data: web::Data<AppState>, req: HttpRequest) -> impl Responder {
    let user = match require_user(&data, &req, "Please login to continue").await {
        Ok((_, user)) => user,
        Err(resp) => return resp,
    };
    HttpResponse::Ok().json(json!({
        "userid": user.id,
        "user": user,
    }))
}

#[post("/dashboard/market/list")]
pub async fn list_submit(
    data: web::Data<AppState>,
    req: HttpRequest,
    form: web::Form<ProduceForm>,
) -> impl Responder {
    let user = match require_user(&data, &req, "Please login to continue").await {
        Ok((_, user)) => user,
        Err(resp) => return resp,
    };

    // Listing quantity is always denominated in quintals.
    let inserted = match data.pool.get().await {
        Ok(client) => {
            db::insert_produce(
                &client,
                user.id,
                &form.crop,
                &form.variety,
                form.quantity,
                "quintals",
            )
            .await
        }
        Err(e) => {
            log::error!("Listing creation error: {e}");
            return HttpResponse::Ok().json(json!({
                "userid": user.id,
                "user": user,
                "error": "Failed to list produce",
            }));
        }
    };

    match inserted {
        Ok(_) => HttpResponse::Ok().json(json!({
            "userid": user.id,
            "user": user,
            "success": "Your produce has been listed.",
        })),
        Err(e) => {
            log::error!("Listing creation error: {e}");
            HttpResponse::Ok().json(json!({
                "userid": user.id,
                "user": user,
                "error": "Failed to list produce",
            }))
        }
    }
}

#[get("/dashboard/market/listings")]
pub async fn check_my_listings(data: web::Data<AppState>, req: HttpRequest) -> impl Responder {
    let user = match require_user(&data, &req, LOGIN_MESSAGE).await {
        Ok((_, user)) => user,
        Err(resp) => return resp,
    };

    let client = match data.pool.get().await {
        Ok(client) => client,
        Err(e) => {
            log::error!("Check listings error: {e}");
            return error_redirect(&data, &req, LOGIN_MESSAGE);
        }
    };
    match db::produce_for_farmer(&client, user.id).await {
        Ok(produces) => HttpResponse::Ok().json(json!({
            "user": user,
            "produces": produces,
        })),
        Err(e) => {
            log::error!("Check listings error: {e}");
            error_redirect(&data, &req, LOGIN_MESSAGE)
        }
    }
}

/// Deletes one of the caller's own listings. The ownership filter means a
/// foreign id matches no row and the listing stays untouched.
#[get("/dashboard/market/delete/{id}")]
pub async fn delete_listing(
    data: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> impl Responder {
    let listing_id = path.into_inner();
    let user = match require_user(&data, &req, LOGIN_MESSAGE).await {
        Ok((_, user)) => user,
        Err(resp) => return resp,
    };

    let client = match data.pool.get().await {
        Ok(client) => client,
        Err(e) => {
            log::error!("Delete listing error: {e}");
            return error_redirect(&data, &req, LOGIN_MESSAGE);
        }
    };
    let deleted = db::delete_listing(&client, listing_id, user.id).await;
    delete_listing_response(&data, &req, listing_id, user.id, deleted)
}

fn delete_listing_response(
    state: &AppState,
    req: &HttpRequest,
    listing_id: i64,
    farmer_id: i64,
    deleted: Result<bool, tokio_postgres::Error>,
) -> HttpResponse {
    match deleted {
        Ok(true) => redirect("/dashboard/market/listings"),
        Ok(false) => {
            log::error!(
                "Delete listing error: listing {listing_id} not found for farmer {farmer_id}"
            );
            error_redirect(state, req, LOGIN_MESSAGE)
        }
        Err(e) => {
            log::error!("Delete listing error: {e}");
            error_redirect(state, req, LOGIN_MESSAGE)
        }
    }
}

#[get("/dashboard/logout")]
pub async fn logout_view(data: web::Data<AppState>, req: HttpRequest) -> impl Responder {
    let token = session_token(&req).filter(|t| data.sessions.contains(t));
    match token {
        Some(token) if data.sessions.log_out(&token) => redirect("/"),
        _ => {
            log::error!("Logout error: not logged in");
            error_redirect(&data, &req, "You are not logged in yet.")
        }
    }
}
