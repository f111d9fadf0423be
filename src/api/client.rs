/// Client CRUD plus the nested project routes
use crate::{
    api::{data, empty, project, ApiJson, DataBody},
    auth::AuthSession,
    context::AppContext,
    db::time::Client,
    error::{ApiError, ApiResult, ErrorCode},
    validation,
};
use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    Json, Router,
};
use axum_extra::extract::WithRejection;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientRequest {
    pub name: String,
    pub address: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateClientRequest {
    pub client_id: i64,
    pub name: String,
    pub address: Option<String>,
    pub active: bool,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientIdRequest {
    pub client_id: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientResponse {
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub active: bool,
}

impl ClientResponse {
    pub fn new(client: &Client) -> Self {
        Self {
            id: client.client_id,
            name: client.client_name.clone(),
            address: client.address.clone(),
            active: client.client_active,
        }
    }
}

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/", post(create_client).put(update_client).delete(delete_client))
        .route("/all", get(get_all_clients))
        .route("/archived", get(get_archived_clients))
        .route("/archive", put(archive_client))
        .route("/restore", put(restore_client))
        .route("/:clientId", get(get_client))
        .nest("/project", project::routes())
}

fn parse_id(value: &str, field: &str) -> ApiResult<i64> {
    value
        .parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| ApiError::field(ErrorCode::InvalidField, "Invalid id", field))
}

async fn get_client(
    State(ctx): State<AppContext>,
    session: AuthSession,
    Path(client_id): Path<String>,
) -> ApiResult<Json<DataBody<ClientResponse>>> {
    let client_id = parse_id(&client_id, "clientId")?;

    let client = ctx
        .clients
        .client(client_id, session.auth.account.account_id)
        .await?
        .ok_or_else(|| ApiError::new(ErrorCode::InvalidClient, "Client not found"))?;

    Ok(data(ClientResponse::new(&client)))
}

async fn get_all_clients(
    State(ctx): State<AppContext>,
    session: AuthSession,
) -> ApiResult<Json<DataBody<Vec<ClientResponse>>>> {
    let clients = ctx
        .clients
        .clients(session.auth.account.account_id, true)
        .await?;

    Ok(data(clients.iter().map(ClientResponse::new).collect()))
}

async fn get_archived_clients(
    State(ctx): State<AppContext>,
    session: AuthSession,
) -> ApiResult<Json<DataBody<Vec<ClientResponse>>>> {
    let clients = ctx
        .clients
        .clients(session.auth.account.account_id, false)
        .await?;

    Ok(data(clients.iter().map(ClientResponse::new).collect()))
}

async fn create_client(
    State(ctx): State<AppContext>,
    session: AuthSession,
    WithRejection(Json(request), _): ApiJson<ClientRequest>,
) -> ApiResult<Json<DataBody<ClientResponse>>> {
    if !validation::is_length(
        &request.name,
        validation::CLIENT_NAME_MIN_LENGTH,
        validation::CLIENT_NAME_MAX_LENGTH,
    ) {
        return Err(ApiError::field(
            ErrorCode::FieldSize,
            "Client name must be between 1 and 64 characters",
            "name",
        ));
    }

    let client = ctx
        .clients
        .create_client(
            session.auth.account.account_id,
            &request.name,
            request.address.as_deref(),
        )
        .await?;

    Ok(data(ClientResponse::new(&client)))
}

async fn update_client(
    State(ctx): State<AppContext>,
    session: AuthSession,
    WithRejection(Json(request), _): ApiJson<UpdateClientRequest>,
) -> ApiResult<Json<DataBody<()>>> {
    if request.client_id <= 0 {
        return Err(ApiError::field(ErrorCode::InvalidClient, "Missing clientId", "clientId"));
    }

    if !validation::is_length(
        &request.name,
        validation::CLIENT_NAME_MIN_LENGTH,
        validation::CLIENT_NAME_MAX_LENGTH,
    ) {
        return Err(ApiError::field(
            ErrorCode::FieldSize,
            "Client name must be between 1 and 64 characters",
            "name",
        ));
    }

    ctx.clients
        .update_client(&Client {
            client_id: request.client_id,
            account_id: session.auth.account.account_id,
            client_name: request.name,
            address: request.address,
            client_active: request.active,
        })
        .await?;

    Ok(empty())
}

async fn archive_client(
    State(ctx): State<AppContext>,
    session: AuthSession,
    WithRejection(Json(request), _): ApiJson<ClientIdRequest>,
) -> ApiResult<Json<DataBody<()>>> {
    if request.client_id <= 0 {
        return Err(ApiError::field(ErrorCode::InvalidClient, "Missing clientId", "clientId"));
    }

    ctx.clients
        .set_client_active(request.client_id, session.auth.account.account_id, false)
        .await?;

    Ok(empty())
}

async fn restore_client(
    State(ctx): State<AppContext>,
    session: AuthSession,
    WithRejection(Json(request), _): ApiJson<ClientIdRequest>,
) -> ApiResult<Json<DataBody<()>>> {
    if request.client_id <= 0 {
        return Err(ApiError::field(ErrorCode::InvalidClient, "Missing clientId", "clientId"));
    }

    ctx.clients
        .set_client_active(request.client_id, session.auth.account.account_id, true)
        .await?;

    Ok(empty())
}

async fn delete_client(
    State(ctx): State<AppContext>,
    session: AuthSession,
    WithRejection(Json(request), _): ApiJson<ClientIdRequest>,
) -> ApiResult<Json<DataBody<()>>> {
    if request.client_id <= 0 {
        return Err(ApiError::field(ErrorCode::InvalidClient, "Missing clientId", "clientId"));
    }

    ctx.clients
        .delete_client(request.client_id, session.auth.account.account_id)
        .await?;

    Ok(empty())
}
