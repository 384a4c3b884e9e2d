//! JSON/HTTP API
//!
//! hyper http1 server exposing the access-admission core: the device scan
//! endpoint, evaluated event creation, the manual barrier override, sensor
//! and zone CRUD, and the read-only event history. Uses the same
//! accept-loop / `service_fn` shape as the rest of our hyper servers, with
//! a watch channel for shutdown.

use crate::domain::error::ApiError;
use crate::domain::types::{
    AccessAction, AccessEvent, Barrier, EventKind, Outcome, Role, Sensor, SensorId, Zone, ZoneId,
};
use crate::infra::store::BARRIER_ID;
use crate::infra::Store;
use crate::io::auth::{require_admin, require_role, Authenticator};
use crate::services::{AccessEvaluator, BarrierService, EventLog, Registry, SensorPatch, ZonePatch};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::AUTHORIZATION;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

/// Everything the handlers need, shared across connections
pub struct ApiContext {
    pub site_id: String,
    pub auth: Authenticator,
    pub store: Arc<Store>,
    pub registry: Registry,
    pub evaluator: AccessEvaluator,
    pub barrier: BarrierService,
    pub events: Arc<EventLog>,
}

// ----- Wire DTOs -----

#[derive(Serialize)]
struct SensorDto {
    id: i64,
    uid: String,
    alias: String,
    estado: &'static str,
    departamento: i64,
    usuario: Option<String>,
    creado_en: DateTime<Utc>,
    actualizado_en: DateTime<Utc>,
}

impl From<Sensor> for SensorDto {
    fn from(sensor: Sensor) -> Self {
        Self {
            id: sensor.id.0,
            uid: sensor.uid,
            alias: sensor.alias,
            estado: sensor.status.as_str(),
            departamento: sensor.zone.0,
            usuario: sensor.user,
            creado_en: sensor.created_at,
            actualizado_en: sensor.updated_at,
        }
    }
}

#[derive(Serialize)]
struct ZoneDto {
    id: i64,
    nombre: String,
    descripcion: String,
    is_active: bool,
}

impl From<Zone> for ZoneDto {
    fn from(zone: Zone) -> Self {
        Self {
            id: zone.id.0,
            nombre: zone.name,
            descripcion: zone.description,
            is_active: zone.active,
        }
    }
}

#[derive(Serialize)]
struct BarrierDto {
    id: i64,
    estado: &'static str,
    actualizado_en: DateTime<Utc>,
}

impl From<Barrier> for BarrierDto {
    fn from(barrier: Barrier) -> Self {
        Self {
            id: barrier.id,
            estado: barrier.state.as_str(),
            actualizado_en: barrier.updated_at,
        }
    }
}

// ----- Request bodies -----

#[derive(Debug, Default, Deserialize)]
struct AccesoBody {
    uid: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct EventoBody {
    uid: Option<String>,
    accion: Option<String>,
    tipo: Option<String>,
    detalle: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SensorBody {
    uid: Option<String>,
    alias: Option<String>,
    estado: Option<String>,
    departamento: Option<i64>,
    /// Absent = keep; null = unbind; value = bind
    #[serde(default, deserialize_with = "double_option")]
    usuario: Option<Option<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct ZoneBody {
    nombre: Option<String>,
    descripcion: Option<String>,
    is_active: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct EstadoBody {
    estado: Option<String>,
}

/// Distinguish an absent field from an explicit null
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

// ----- Response helpers -----

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let json = serde_json::to_vec(body).unwrap_or_else(|_| b"{}".to_vec());
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(json)))
        .expect("static response should not fail")
}

/// Map an ApiError to its wire envelope
fn error_response(err: &ApiError) -> Response<Full<Bytes>> {
    match err {
        ApiError::Validation(errors) => json_response(
            StatusCode::BAD_REQUEST,
            &json!({ "detail": "Error de validación.", "errors": errors }),
        ),
        ApiError::NotAuthenticated => json_response(
            StatusCode::UNAUTHORIZED,
            &json!({ "detail": "Autenticación requerida." }),
        ),
        ApiError::PermissionDenied => json_response(
            StatusCode::FORBIDDEN,
            &json!({ "detail": "No tienes permisos para realizar esta acción." }),
        ),
        ApiError::NotFound(_) => json_response(
            StatusCode::NOT_FOUND,
            &json!({ "detail": "Recurso no encontrado." }),
        ),
    }
}

fn route_not_found() -> Response<Full<Bytes>> {
    json_response(StatusCode::NOT_FOUND, &json!({ "detail": "Ruta no encontrada." }))
}

fn parse_json<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ApiError> {
    if body.is_empty() {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|_| ApiError::non_field("Cuerpo JSON inválido."))
}

// ----- Routing -----

/// Dispatch one request. Split from the hyper plumbing so tests can drive
/// it with constructed parts and bodies.
pub async fn route(
    method: &Method,
    path: &str,
    auth_header: Option<&str>,
    body: Bytes,
    ctx: &ApiContext,
) -> Response<Full<Bytes>> {
    let segments: Vec<&str> = path.trim_matches('/').split('/').filter(|s| !s.is_empty()).collect();

    let result = match (method, segments.as_slice()) {
        (&Method::GET, ["api", "health"]) => Ok(json_response(StatusCode::OK, &json!({ "status": "ok" }))),
        (&Method::GET, ["api", "info"]) => Ok(handle_info(ctx)),
        (&Method::POST, ["api", "acceso"]) => handle_acceso(ctx, &body),
        (&Method::POST, ["api", "eventos"]) => handle_evento_create(ctx, auth_header, &body),
        (&Method::GET, ["api", "eventos"]) => handle_eventos_list(ctx, auth_header),
        (&Method::GET, ["api", "eventos", id]) => handle_evento_get(ctx, auth_header, id),
        (&Method::GET, ["api", "sensores"]) => handle_sensores_list(ctx, auth_header),
        (&Method::POST, ["api", "sensores"]) => handle_sensor_create(ctx, auth_header, &body),
        (&Method::GET, ["api", "sensores", id]) => handle_sensor_get(ctx, auth_header, id),
        (&Method::PUT | &Method::PATCH, ["api", "sensores", id]) => {
            handle_sensor_update(ctx, auth_header, id, &body)
        }
        (&Method::DELETE, ["api", "sensores", id]) => handle_sensor_delete(ctx, auth_header, id),
        (&Method::POST, ["api", "sensores", id, "cambiar_estado"]) => {
            handle_sensor_change_status(ctx, auth_header, id, &body)
        }
        (&Method::GET, ["api", "departamentos"]) => handle_zones_list(ctx, auth_header),
        (&Method::POST, ["api", "departamentos"]) => handle_zone_create(ctx, auth_header, &body),
        (&Method::GET, ["api", "departamentos", id]) => handle_zone_get(ctx, auth_header, id),
        (&Method::PUT | &Method::PATCH, ["api", "departamentos", id]) => {
            handle_zone_update(ctx, auth_header, id, &body)
        }
        (&Method::DELETE, ["api", "departamentos", id]) => handle_zone_delete(ctx, auth_header, id),
        (&Method::GET, ["api", "barreras"]) => handle_barreras_list(ctx, auth_header),
        (&Method::GET, ["api", "barreras", id]) => handle_barrera_get(ctx, auth_header, id),
        (&Method::POST, ["api", "barreras", id, "abrir"]) => {
            handle_barrera_set(ctx, auth_header, id, true)
        }
        (&Method::POST, ["api", "barreras", id, "cerrar"]) => {
            handle_barrera_set(ctx, auth_header, id, false)
        }
        (_, ["api", ..]) => return route_not_found(),
        _ => return route_not_found(),
    };

    result.unwrap_or_else(|err| error_response(&err))
}

fn handle_info(ctx: &ApiContext) -> Response<Full<Bytes>> {
    json_response(
        StatusCode::OK,
        &json!({
            "proyecto": "rfid-gate",
            "descripcion": "API RESTful para gestión de sensores RFID, zonas, eventos de acceso y barrera.",
            "sitio": ctx.site_id,
            "version": env!("CARGO_PKG_VERSION"),
            "commit": env!("GIT_HASH"),
        }),
    )
}

/// Device scan endpoint. Open by design: the scanning hardware carries no
/// user identity.
fn handle_acceso(ctx: &ApiContext, body: &Bytes) -> Result<Response<Full<Bytes>>, ApiError> {
    let body: AccesoBody = parse_json(body)?;
    let uid = body.uid.unwrap_or_default();
    if uid.trim().is_empty() {
        return Err(ApiError::field("uid", "Este campo es requerido."));
    }

    let event = ctx.evaluator.evaluate(
        &uid,
        AccessAction::Attempt,
        EventKind::Attempt,
        Some("Acceso concedido"),
    );

    let response = match (event.outcome, event.sensor_id) {
        (Outcome::Denied, None) => json_response(
            StatusCode::NOT_FOUND,
            &json!({ "resultado": "DENEGADO", "detalle": "UID no válido" }),
        ),
        (Outcome::Denied, Some(_)) => json_response(
            StatusCode::FORBIDDEN,
            &json!({ "resultado": "DENEGADO", "detalle": "Sensor no autorizado" }),
        ),
        (Outcome::Allowed, _) => json_response(
            StatusCode::OK,
            &json!({ "resultado": "PERMITIDO", "detalle": "Acceso autorizado" }),
        ),
    };
    Ok(response)
}

/// Evaluated event creation: uid + action, decides the outcome and drives
/// the barrier when permitted. Field errors come back as a raw map, the
/// shape this endpoint has always had.
fn handle_evento_create(
    ctx: &ApiContext,
    auth_header: Option<&str>,
    body: &Bytes,
) -> Result<Response<Full<Bytes>>, ApiError> {
    ctx.auth.authenticate(auth_header)?;

    let body: EventoBody = parse_json(body)?;

    let mut errors = serde_json::Map::new();

    let uid = body.uid.unwrap_or_default();
    if uid.trim().is_empty() {
        errors.insert("uid".to_string(), json!(["Este campo es requerido."]));
    } else if ctx.store.sensor_by_uid(&uid).is_none() {
        errors.insert("uid".to_string(), json!(["Sensor no encontrado"]));
    }

    let action = match body.accion.as_deref() {
        Some("ABRIR") => Some(AccessAction::Open),
        Some("CERRAR") => Some(AccessAction::Close),
        Some(_) => {
            errors.insert("accion".to_string(), json!(["Acción no válida."]));
            None
        }
        None => {
            errors.insert("accion".to_string(), json!(["Este campo es requerido."]));
            None
        }
    };

    let kind = match body.tipo.as_deref() {
        None => Some(EventKind::Attempt),
        Some(tipo) => match tipo.parse::<EventKind>() {
            Ok(kind) => Some(kind),
            Err(()) => {
                errors.insert("tipo".to_string(), json!(["Tipo no válido."]));
                None
            }
        },
    };

    if !errors.is_empty() {
        // raw field-error map, no envelope; no event is recorded
        return Ok(json_response(StatusCode::BAD_REQUEST, &serde_json::Value::Object(errors)));
    }
    let (action, kind) = (action.expect("validated"), kind.expect("validated"));

    let event = ctx.evaluator.evaluate(&uid, action, kind, body.detalle.as_deref());

    Ok(json_response(
        StatusCode::CREATED,
        &json!({
            "mensaje": "Evento procesado correctamente",
            "sensor": event.sensor_uid,
            "resultado": event.outcome.as_str(),
            "accion": event.action.as_str(),
            "tipo": event.kind.as_str(),
            "barrera_estado": ctx.barrier.current().state.as_str(),
            "fecha": event.at,
        }),
    ))
}

fn handle_eventos_list(
    ctx: &ApiContext,
    auth_header: Option<&str>,
) -> Result<Response<Full<Bytes>>, ApiError> {
    ctx.auth.authenticate(auth_header)?;
    let events: Vec<AccessEvent> = ctx.events.list();
    Ok(json_response(StatusCode::OK, &events))
}

fn handle_evento_get(
    ctx: &ApiContext,
    auth_header: Option<&str>,
    id: &str,
) -> Result<Response<Full<Bytes>>, ApiError> {
    ctx.auth.authenticate(auth_header)?;
    let event = ctx
        .events
        .get(id)
        .ok_or_else(|| ApiError::NotFound(format!("event {id}")))?;
    Ok(json_response(StatusCode::OK, &event))
}

// ----- Sensors -----

fn parse_id(id: &str) -> Result<i64, ApiError> {
    id.parse().map_err(|_| ApiError::NotFound(format!("bad id {id}")))
}

fn sensor_patch(body: SensorBody) -> SensorPatch {
    SensorPatch {
        uid: body.uid,
        alias: body.alias,
        status: body.estado,
        zone: body.departamento,
        user: body.usuario,
    }
}

fn handle_sensores_list(
    ctx: &ApiContext,
    auth_header: Option<&str>,
) -> Result<Response<Full<Bytes>>, ApiError> {
    ctx.auth.authenticate(auth_header)?;
    let sensors: Vec<SensorDto> = ctx.registry.sensors().into_iter().map(Into::into).collect();
    Ok(json_response(StatusCode::OK, &sensors))
}

fn handle_sensor_create(
    ctx: &ApiContext,
    auth_header: Option<&str>,
    body: &Bytes,
) -> Result<Response<Full<Bytes>>, ApiError> {
    let caller = ctx.auth.authenticate(auth_header)?;
    require_admin(&caller)?;

    let body: SensorBody = parse_json(body)?;
    let sensor = ctx.registry.create_sensor(sensor_patch(body))?;
    Ok(json_response(StatusCode::CREATED, &SensorDto::from(sensor)))
}

fn handle_sensor_get(
    ctx: &ApiContext,
    auth_header: Option<&str>,
    id: &str,
) -> Result<Response<Full<Bytes>>, ApiError> {
    ctx.auth.authenticate(auth_header)?;
    let sensor = ctx.registry.sensor(SensorId(parse_id(id)?))?;
    Ok(json_response(StatusCode::OK, &SensorDto::from(sensor)))
}

fn handle_sensor_update(
    ctx: &ApiContext,
    auth_header: Option<&str>,
    id: &str,
    body: &Bytes,
) -> Result<Response<Full<Bytes>>, ApiError> {
    let caller = ctx.auth.authenticate(auth_header)?;
    require_admin(&caller)?;

    let body: SensorBody = parse_json(body)?;
    let sensor = ctx.registry.update_sensor(SensorId(parse_id(id)?), sensor_patch(body))?;
    Ok(json_response(StatusCode::OK, &SensorDto::from(sensor)))
}

fn handle_sensor_delete(
    ctx: &ApiContext,
    auth_header: Option<&str>,
    id: &str,
) -> Result<Response<Full<Bytes>>, ApiError> {
    let caller = ctx.auth.authenticate(auth_header)?;
    require_admin(&caller)?;

    ctx.registry.delete_sensor(SensorId(parse_id(id)?))?;
    Ok(Response::builder()
        .status(StatusCode::NO_CONTENT)
        .body(Full::new(Bytes::new()))
        .expect("static response should not fail"))
}

fn handle_sensor_change_status(
    ctx: &ApiContext,
    auth_header: Option<&str>,
    id: &str,
    body: &Bytes,
) -> Result<Response<Full<Bytes>>, ApiError> {
    let caller = ctx.auth.authenticate(auth_header)?;
    require_admin(&caller)?;

    let body: EstadoBody = parse_json(body)?;
    let estado = body
        .estado
        .ok_or_else(|| ApiError::field("estado", "Este campo es requerido."))?;
    let sensor = ctx.registry.change_status(SensorId(parse_id(id)?), &estado)?;
    Ok(json_response(StatusCode::OK, &SensorDto::from(sensor)))
}

// ----- Zones -----

fn zone_patch(body: ZoneBody) -> ZonePatch {
    ZonePatch { name: body.nombre, description: body.descripcion, active: body.is_active }
}

fn handle_zones_list(
    ctx: &ApiContext,
    auth_header: Option<&str>,
) -> Result<Response<Full<Bytes>>, ApiError> {
    ctx.auth.authenticate(auth_header)?;
    let zones: Vec<ZoneDto> = ctx.registry.zones().into_iter().map(Into::into).collect();
    Ok(json_response(StatusCode::OK, &zones))
}

fn handle_zone_create(
    ctx: &ApiContext,
    auth_header: Option<&str>,
    body: &Bytes,
) -> Result<Response<Full<Bytes>>, ApiError> {
    let caller = ctx.auth.authenticate(auth_header)?;
    require_admin(&caller)?;

    let body: ZoneBody = parse_json(body)?;
    let zone = ctx.registry.create_zone(zone_patch(body))?;
    Ok(json_response(StatusCode::CREATED, &ZoneDto::from(zone)))
}

fn handle_zone_get(
    ctx: &ApiContext,
    auth_header: Option<&str>,
    id: &str,
) -> Result<Response<Full<Bytes>>, ApiError> {
    ctx.auth.authenticate(auth_header)?;
    let zone = ctx.registry.zone(ZoneId(parse_id(id)?))?;
    Ok(json_response(StatusCode::OK, &ZoneDto::from(zone)))
}

fn handle_zone_update(
    ctx: &ApiContext,
    auth_header: Option<&str>,
    id: &str,
    body: &Bytes,
) -> Result<Response<Full<Bytes>>, ApiError> {
    let caller = ctx.auth.authenticate(auth_header)?;
    require_admin(&caller)?;

    let body: ZoneBody = parse_json(body)?;
    let zone = ctx.registry.update_zone(ZoneId(parse_id(id)?), zone_patch(body))?;
    Ok(json_response(StatusCode::OK, &ZoneDto::from(zone)))
}

fn handle_zone_delete(
    ctx: &ApiContext,
    auth_header: Option<&str>,
    id: &str,
) -> Result<Response<Full<Bytes>>, ApiError> {
    let caller = ctx.auth.authenticate(auth_header)?;
    require_admin(&caller)?;

    ctx.registry.delete_zone(ZoneId(parse_id(id)?))?;
    Ok(Response::builder()
        .status(StatusCode::NO_CONTENT)
        .body(Full::new(Bytes::new()))
        .expect("static response should not fail"))
}

// ----- Barrier -----

fn handle_barreras_list(
    ctx: &ApiContext,
    auth_header: Option<&str>,
) -> Result<Response<Full<Bytes>>, ApiError> {
    ctx.auth.authenticate(auth_header)?;
    let barriers = vec![BarrierDto::from(ctx.barrier.current())];
    Ok(json_response(StatusCode::OK, &barriers))
}

fn check_barrier_id(id: &str) -> Result<(), ApiError> {
    if parse_id(id)? != BARRIER_ID {
        return Err(ApiError::NotFound(format!("barrier {id}")));
    }
    Ok(())
}

fn handle_barrera_get(
    ctx: &ApiContext,
    auth_header: Option<&str>,
    id: &str,
) -> Result<Response<Full<Bytes>>, ApiError> {
    ctx.auth.authenticate(auth_header)?;
    check_barrier_id(id)?;
    Ok(json_response(StatusCode::OK, &BarrierDto::from(ctx.barrier.current())))
}

/// Manual override: any authenticated role may drive the barrier
fn handle_barrera_set(
    ctx: &ApiContext,
    auth_header: Option<&str>,
    id: &str,
    open: bool,
) -> Result<Response<Full<Bytes>>, ApiError> {
    let caller = ctx.auth.authenticate(auth_header)?;
    require_role(&caller, &[Role::Admin, Role::Operator])?;
    check_barrier_id(id)?;

    let barrier = if open { ctx.barrier.open(&caller) } else { ctx.barrier.close(&caller) };
    Ok(json_response(StatusCode::OK, &BarrierDto::from(barrier)))
}

// ----- Server plumbing -----

async fn handle_request(
    req: Request<Incoming>,
    ctx: Arc<ApiContext>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();

    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            error!(error = %e, "api_body_read_failed");
            return Ok(error_response(&ApiError::non_field("Cuerpo JSON inválido.")));
        }
    };

    let auth_header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    let response = route(&parts.method, parts.uri.path(), auth_header.as_deref(), body, &ctx).await;

    info!(
        method = %parts.method,
        path = %parts.uri.path(),
        status = %response.status().as_u16(),
        "api_request"
    );
    Ok(response)
}

/// Start the API HTTP server
pub async fn start_api_server(
    ctx: Arc<ApiContext>,
    bind: &str,
    port: u16,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(format!("{}:{}", bind, port)).await?;
    info!(bind = %bind, port = %port, "api_server_started");

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, _addr)) => {
                        let io = TokioIo::new(stream);
                        let ctx = ctx.clone();

                        tokio::spawn(async move {
                            let service = service_fn(move |req| {
                                let ctx = ctx.clone();
                                async move { handle_request(req, ctx).await }
                            });

                            if let Err(e) = http1::Builder::new()
                                .serve_connection(io, service)
                                .await
                            {
                                error!(error = %e, "api_http_error");
                            }
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "api_accept_error");
                    }
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("api_server_shutdown");
                    return Ok(());
                }
            }
        }
    }
}
