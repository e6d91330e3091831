use crate::{
    Result,
    app::query_api::{
        Query,
        QueryAPI,
        QueryError,
        Responder,
        Stats,
    },
};
use actix_cors::Cors;
use actix_web::{
    App,
    HttpResponse,
    HttpServer,
    ResponseError,
    dev::ServerHandle,
    error::{
        ErrorBadRequest,
        ErrorInternalServerError,
    },
    http::StatusCode,
    web,
};
use anyhow::{
    Context,
    anyhow,
};
use cipher_loot::{
    Address,
    CiphertextHandle,
    auth::Authorization,
    draw::{
        EncryptedHistory,
        EncryptedResult,
        LatestEncryptedResult,
    },
    events::EventRecord,
    probability::ProbabilityConfig,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    collections::BTreeMap,
    net::TcpListener,
    str::FromStr,
    thread::JoinHandle,
};
use tokio::sync::{
    mpsc,
    oneshot,
};

pub const DEFAULT_HISTORY_LIMIT: u64 = 10;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DrawRequestDto {
    pub player: Address,
    /// Signature of `player` over their next draw id.
    pub authorization: Authorization,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DrawCountDto {
    pub count: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryParams {
    pub offset: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventsParams {
    pub from_block: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DecryptRequestDto {
    pub user: Address,
    pub handles: Vec<CiphertextHandle>,
    pub authorization: Authorization,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DecryptResponseDto {
    pub values: BTreeMap<CiphertextHandle, u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorDto {
    pub error: String,
    pub message: String,
}

impl ResponseError for QueryError {
    fn status_code(&self) -> StatusCode {
        match self {
            QueryError::InvalidDrawId { .. } | QueryError::UnknownHandle(_) => {
                StatusCode::NOT_FOUND
            }
            QueryError::NotAuthorized(_) => StatusCode::FORBIDDEN,
            QueryError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            QueryError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorDto {
            error: self.kind().to_string(),
            message: self.to_string(),
        })
    }
}

pub struct ActixQueryApi {
    receiver: mpsc::Receiver<Query>,
    base_url: String,
    server_handle: ServerHandle,
    server_thread: Option<JoinHandle<()>>,
}

impl ActixQueryApi {
    /// Listen on localhost; `None` picks a free port.
    pub async fn new(port: Option<u16>) -> Result<Self> {
        Self::bind("127.0.0.1", port).await
    }

    pub async fn bind(host: &str, port: Option<u16>) -> Result<Self> {
        let (sender, receiver) = mpsc::channel(16);

        let listener = TcpListener::bind((host, port.unwrap_or(0)))
            .context("failed to bind HTTP listener for query API")?;
        let address = listener
            .local_addr()
            .context("failed to read listener address")?;
        let base_url = format!("http://{}", address);

        tracing::info!("query API listening on {}", base_url);

        let server = HttpServer::new(move || {
            App::new()
                .wrap(Cors::permissive())
                .app_data(web::Data::new(sender.clone()))
                .configure(routes)
        })
        .shutdown_timeout(1)
        .listen(listener)
        .context("failed to start Actix server")?
        .run();

        let server_handle = server.handle();
        let server_thread = std::thread::spawn(move || {
            let sys = actix_web::rt::System::new();
            let _ = sys.block_on(server);
        });

        Ok(Self {
            receiver,
            base_url,
            server_handle,
            server_thread: Some(server_thread),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/draw", web::post().to(handle_draw))
        .route(
            "/players/{player}/draws/{draw_id}",
            web::get().to(handle_encrypted_result),
        )
        .route("/players/{player}/latest", web::get().to(handle_latest))
        .route("/players/{player}/history", web::get().to(handle_history))
        .route("/players/{player}/count", web::get().to(handle_draw_count))
        .route("/stats", web::get().to(handle_stats))
        .route("/config/probability", web::get().to(handle_probability_config))
        .route("/events", web::get().to(handle_events))
        .route("/decrypt", web::post().to(handle_decrypt));
}

impl QueryAPI for ActixQueryApi {
    async fn query(&mut self) -> Result<Query> {
        self.receiver
            .recv()
            .await
            .ok_or_else(|| anyhow!("query server closed"))
    }
}

impl Drop for ActixQueryApi {
    fn drop(&mut self) {
        let _ = self.server_handle.stop(true);
        if let Some(thread) = self.server_thread.take() {
            let _ = thread.join();
        }
    }
}

/// Hand a query to the ledger task and wait for its answer.
async fn forward<T>(
    sender: &web::Data<mpsc::Sender<Query>>,
    build: impl FnOnce(Responder<T>) -> Query,
) -> actix_web::Result<T> {
    let (response_sender, response_receiver) = oneshot::channel();
    sender
        .get_ref()
        .send(build(response_sender))
        .await
        .map_err(|_| ErrorInternalServerError("unable to forward query to the ledger"))?;
    let response = response_receiver
        .await
        .map_err(|_| ErrorInternalServerError("ledger dropped the query"))?;
    Ok(response?)
}

fn parse_player(raw: &str) -> actix_web::Result<Address> {
    Address::from_str(raw).map_err(|e| {
        tracing::warn!("rejecting malformed player address {raw}: {e}");
        ErrorBadRequest(format!("invalid player address: {e}"))
    })
}

async fn handle_draw(
    sender: web::Data<mpsc::Sender<Query>>,
    body: web::Json<DrawRequestDto>,
) -> actix_web::Result<web::Json<EventRecord>> {
    let DrawRequestDto {
        player,
        authorization,
    } = body.into_inner();
    tracing::info!(%player, "received draw request");
    let record = forward(&sender, |sender| Query::Draw {
        player,
        authorization,
        sender,
    })
    .await?;
    Ok(web::Json(record))
}

async fn handle_encrypted_result(
    sender: web::Data<mpsc::Sender<Query>>,
    path: web::Path<(String, u64)>,
) -> actix_web::Result<web::Json<EncryptedResult>> {
    let (raw_player, draw_id) = path.into_inner();
    let player = parse_player(&raw_player)?;
    let result = forward(&sender, |sender| Query::EncryptedResult {
        player,
        draw_id,
        sender,
    })
    .await?;
    Ok(web::Json(result))
}

async fn handle_latest(
    sender: web::Data<mpsc::Sender<Query>>,
    path: web::Path<String>,
) -> actix_web::Result<web::Json<LatestEncryptedResult>> {
    let player = parse_player(&path)?;
    let latest =
        forward(&sender, |sender| Query::LatestEncryptedResult { player, sender }).await?;
    Ok(web::Json(latest))
}

async fn handle_history(
    sender: web::Data<mpsc::Sender<Query>>,
    path: web::Path<String>,
    params: web::Query<HistoryParams>,
) -> actix_web::Result<web::Json<EncryptedHistory>> {
    let player = parse_player(&path)?;
    let offset = params.offset.unwrap_or(0);
    let limit = params.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    let history = forward(&sender, |sender| Query::EncryptedHistory {
        player,
        offset,
        limit,
        sender,
    })
    .await?;
    Ok(web::Json(history))
}

async fn handle_draw_count(
    sender: web::Data<mpsc::Sender<Query>>,
    path: web::Path<String>,
) -> actix_web::Result<web::Json<DrawCountDto>> {
    let player = parse_player(&path)?;
    let count = forward(&sender, |sender| Query::DrawCount { player, sender }).await?;
    Ok(web::Json(DrawCountDto { count }))
}

async fn handle_stats(
    sender: web::Data<mpsc::Sender<Query>>,
) -> actix_web::Result<web::Json<Stats>> {
    let stats = forward(&sender, Query::Stats).await?;
    Ok(web::Json(stats))
}

async fn handle_probability_config(
    sender: web::Data<mpsc::Sender<Query>>,
) -> actix_web::Result<web::Json<ProbabilityConfig>> {
    let config = forward(&sender, Query::ProbabilityConfig).await?;
    Ok(web::Json(config))
}

async fn handle_events(
    sender: web::Data<mpsc::Sender<Query>>,
    params: web::Query<EventsParams>,
) -> actix_web::Result<web::Json<Vec<EventRecord>>> {
    let from_block = params.from_block.unwrap_or(0);
    let events = forward(&sender, |sender| Query::Events { from_block, sender }).await?;
    Ok(web::Json(events))
}

async fn handle_decrypt(
    sender: web::Data<mpsc::Sender<Query>>,
    body: web::Json<DecryptRequestDto>,
) -> actix_web::Result<web::Json<DecryptResponseDto>> {
    let DecryptRequestDto {
        user,
        handles,
        authorization,
    } = body.into_inner();
    tracing::info!(%user, handles = handles.len(), "received decrypt request");
    let values = forward(&sender, |sender| Query::Decrypt {
        user,
        handles,
        authorization,
        sender,
    })
    .await?;
    Ok(web::Json(DecryptResponseDto { values }))
}
