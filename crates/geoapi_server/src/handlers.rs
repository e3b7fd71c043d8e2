//! # Request Handlers
//!
//! One function per endpoint. Each validates its query, acquires what it
//! needs from the lifecycle manager and builds a complete [`Response`].
//! Leases are dropped when the handler returns, which clears the worker's
//! activity flag.

use std::collections::BTreeMap;

use geoapi_terrain::{coord_key, GeoBounds, LAT_LIMIT, LON_LIMIT};
use serde::Serialize;

use crate::config::LimitsConfig;
use crate::context::ServerContext;
use crate::error::ApiError;
use crate::lifecycle::WorkerId;
use crate::protocol::{Request, Response, Route};
use crate::tile_cache::{TileLayer, TileRequest};

/// Grid step used by `/map` when none (or garbage) is given.
pub const DEFAULT_GRID_STEP: f64 = 0.5;

#[derive(Serialize)]
struct PointBody {
    r: u8,
    g: u8,
    b: u8,
    e: f64,
}

#[derive(Serialize)]
struct RegionBody<'a> {
    r: f64,
    g: f64,
    b: f64,
    e: f64,
    name: &'a str,
}

/// Routes a request to its handler.
///
/// # Errors
///
/// Returns [`ApiError::NotFound`] for unknown routes, or whatever the
/// handler returns.
pub fn dispatch(ctx: &ServerContext, worker: WorkerId, request: &Request) -> Result<Response, ApiError> {
    match Route::resolve(&request.method, &request.path).ok_or(ApiError::NotFound)? {
        Route::Regions => regions_chunk(ctx, worker, request),
        Route::MapData => map_data(ctx, worker, request),
        Route::LiveMap => live_map(ctx, worker, request),
        Route::Tile(layer) => tile(ctx, worker, request, layer),
    }
}

fn regions_chunk(ctx: &ServerContext, worker: WorkerId, request: &Request) -> Result<Response, ApiError> {
    let bounds = parse_bounds(request)?;
    let regions = ctx.lifecycle.acquire_store(worker)?.query_regions(&bounds)?;

    let body: BTreeMap<String, RegionBody<'_>> = regions
        .iter()
        .map(|region| {
            let value = RegionBody {
                r: 1.0,
                g: 1.0,
                b: 1.0,
                e: region.elevation,
                name: &region.name,
            };
            (coord_key(region.lat, region.lon), value)
        })
        .collect();
    json_response(&body)
}

fn map_data(ctx: &ServerContext, worker: WorkerId, request: &Request) -> Result<Response, ApiError> {
    let bounds = parse_bounds(request)?;
    let points = ctx
        .lifecycle
        .acquire_store(worker)?
        .query_points(&bounds, ctx.config.limits.max_points)?;

    let body: BTreeMap<String, PointBody> = points
        .iter()
        .map(|p| {
            let value = PointBody {
                r: p.color.r,
                g: p.color.g,
                b: p.color.b,
                e: p.elevation,
            };
            (coord_key(p.lat, p.lon), value)
        })
        .collect();
    json_response(&body)
}

fn live_map(ctx: &ServerContext, worker: WorkerId, request: &Request) -> Result<Response, ApiError> {
    let bounds = parse_bounds(request)?;
    let step = grid_step(request);
    if step <= 0.0 {
        return Err(ApiError::BadRequest(format!("step must be positive, got {step}")));
    }
    if bounds.is_degenerate() {
        return Err(ApiError::BadRequest("empty range".into()));
    }
    let budget = ctx.config.limits.max_points as f64;
    let (rows, cols) = (bounds.lat_span() / step, bounds.lon_span() / step);
    let cells = rows * cols;
    // A thin strip can pass the product test with one very long axis
    if cells > budget || rows > budget || cols > budget {
        return Err(ApiError::TooLarge(format!(
            "{cells:.0} grid points exceed the budget of {}",
            ctx.config.limits.max_points
        )));
    }

    let terrain = ctx.lifecycle.acquire_terrain(worker)?;
    let mut body = BTreeMap::new();
    let mut i = 0u32;
    loop {
        let lat = bounds.lat_min + f64::from(i) * step;
        if lat > bounds.lat_max {
            break;
        }
        let mut j = 0u32;
        loop {
            let lon = bounds.lon_min + f64::from(j) * step;
            if lon > bounds.lon_max {
                break;
            }
            let point = terrain.terrain_info_at(lat, lon);
            body.insert(
                coord_key(lat, lon),
                PointBody {
                    r: point.color.r,
                    g: point.color.g,
                    b: point.color.b,
                    e: point.elevation,
                },
            );
            j += 1;
        }
        i += 1;
    }
    drop(terrain);

    json_response(&body)
}

fn tile(
    ctx: &ServerContext,
    worker: WorkerId,
    request: &Request,
    layer: TileLayer,
) -> Result<Response, ApiError> {
    let limits = &ctx.config.limits;
    let tile = TileRequest {
        layer,
        bounds: parse_bounds(request)?,
        width: parse_tile_side(request, "width", limits)?,
        height: parse_tile_side(request, "height", limits)?,
    };
    let cached = ctx.tiles.get(&tile, || ctx.lifecycle.acquire_terrain(worker))?;
    Ok(Response::png(cached.bytes))
}

fn json_response<T: Serialize>(body: &T) -> Result<Response, ApiError> {
    serde_json::to_vec(body)
        .map(Response::json)
        .map_err(|e| ApiError::Handler(format!("json encode: {e}")))
}

/// Reads `lat_min`, `lat_max`, `lon_min`, `lon_max`, defaulting each to the
/// globe edge, then clamps and orders them.
///
/// # Errors
///
/// Returns [`ApiError::BadRequest`] if a present value is not a finite
/// number.
pub fn parse_bounds(request: &Request) -> Result<GeoBounds, ApiError> {
    Ok(GeoBounds::normalized(
        parse_coord(request, "lat_min", -LAT_LIMIT)?,
        parse_coord(request, "lat_max", LAT_LIMIT)?,
        parse_coord(request, "lon_min", -LON_LIMIT)?,
        parse_coord(request, "lon_max", LON_LIMIT)?,
    ))
}

fn parse_coord(request: &Request, name: &str, default: f64) -> Result<f64, ApiError> {
    let Some(raw) = request.param(name) else {
        return Ok(default);
    };
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(ApiError::BadRequest(format!("{name}={raw:?} is not a number"))),
    }
}

/// `/map` step; anything missing, unparseable or infinite falls back to
/// [`DEFAULT_GRID_STEP`].
#[must_use]
pub fn grid_step(request: &Request) -> f64 {
    request
        .param("step")
        .and_then(|raw| raw.parse::<f64>().ok())
        .filter(|step| step.is_finite())
        .unwrap_or(DEFAULT_GRID_STEP)
}

fn parse_tile_side(request: &Request, name: &str, limits: &LimitsConfig) -> Result<u32, ApiError> {
    let Some(raw) = request.param(name) else {
        return Ok(limits.default_tile_size);
    };
    let side = raw
        .parse::<u64>()
        .map_err(|_| ApiError::BadRequest(format!("{name}={raw:?} is not a size")))?;
    if side == 0 {
        return Err(ApiError::BadRequest(format!("{name} must be positive")));
    }
    if side > u64::from(limits.max_tile_side) {
        return Err(ApiError::TooLarge(format!(
            "{name}={side} exceeds {}",
            limits.max_tile_side
        )));
    }
    u32::try_from(side).map_err(|_| ApiError::TooLarge(format!("{name}={side}")))
}
