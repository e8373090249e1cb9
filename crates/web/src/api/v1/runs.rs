use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        OriginalUri, Path, Query, State,
    },
    http::{Method, StatusCode},
    routing::{get, on, post},
    Extension, Json, Router,
};
use chrono::NaiveDateTime;
use model::{
    point::GeoPoint,
    run::{Run, RunState, RunStats},
    user::User,
    StartRange, WithId,
};
use rust_decimal::Decimal;
use run_tracker::database::Database;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use utility::{id::Id, let_also::LetAlso, serde::date_time};

use crate::{
    common::{
        route_not_found, schema, HateoasResult, RouteErrorResponse, RouteResult,
        VecResponse, METHOD_FILTER_ALL,
    },
    hateoas::{self, Relation},
    middleware::base_url::{base_url_middleware, BaseUrl},
    WebState,
};

macro_rules! resource {
    ($($arg:tt)*) => {
        crate::api::v1::resource!("/runs{}", format_args!($($arg)*))
    };
}
pub(crate) use resource;

pub(crate) fn routes<D: Database + 'static>(state: WebState<D>) -> Router {
    Router::new()
        .route("/schema", get(schema::<Run>))
        .route("/stats", get(get_stats::<D>))
        .route("/stats/schema", get(schema::<RunStats>))
        .route("/:id", get(get_run::<D>).patch(finish_run::<D>))
        .route("/", post(start_run::<D>).get(get_runs::<D>))
        .layer(axum::middleware::from_fn(base_url_middleware))
        .with_state(state)
        .fallback_service(on(METHOD_FILTER_ALL, route_not_found))
}

/// A run as returned by the api, with the derived values filled in.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RunDto {
    #[serde(flatten)]
    run: WithId<Run>,
    state: RunState,
    avg_speed: Option<f64>,
}

impl From<WithId<Run>> for RunDto {
    fn from(run: WithId<Run>) -> Self {
        Self {
            state: run.content.state(),
            avg_speed: run.content.average_speed_kmh(),
            run,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartRunPayload {
    user_id: Id<User>,
    #[serde(deserialize_with = "date_time::deserialize_naive")]
    datetime: NaiveDateTime,
    latitude: Decimal,
    longitude: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FinishRunPayload {
    #[serde(deserialize_with = "date_time::deserialize_naive")]
    datetime: NaiveDateTime,
    latitude: Decimal,
    longitude: Decimal,
    distance: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserRunsQuery {
    user_id: Id<User>,

    #[serde(deserialize_with = "date_time::deserialize_naive_option", default)]
    from_datetime: Option<NaiveDateTime>,

    #[serde(deserialize_with = "date_time::deserialize_naive_option", default)]
    to_datetime: Option<NaiveDateTime>,
}

impl UserRunsQuery {
    fn range(&self) -> StartRange {
        StartRange::new(self.from_datetime, self.to_datetime)
    }

    fn query_string(&self) -> String {
        let mut query = format!("?userId={}", self.user_id);
        if let Some(from) = self.from_datetime {
            query.push_str(&format!("&fromDatetime={}", from.format(date_time::FORMAT)));
        }
        if let Some(to) = self.to_datetime {
            query.push_str(&format!("&toDatetime={}", to.format(date_time::FORMAT)));
        }
        query
    }
}

fn point(
    datetime: NaiveDateTime,
    latitude: Decimal,
    longitude: Decimal,
) -> Result<GeoPoint, RouteErrorResponse> {
    GeoPoint::new(datetime, latitude, longitude).map_err(|why| {
        RouteErrorResponse::new(StatusCode::BAD_REQUEST).with_message(why.to_string())
    })
}

async fn start_run<D: Database + 'static>(
    OriginalUri(original_uri): OriginalUri,
    State(WebState { run_client }): State<WebState<D>>,
    Extension(base_url): Extension<Arc<BaseUrl>>,
    payload: Result<Json<StartRunPayload>, JsonRejection>,
) -> RouteResult<(StatusCode, Json<hateoas::Response<RunDto>>)> {
    let error = |why: RouteErrorResponse| why.with_method(&Method::POST).with_uri(original_uri.path());

    let Json(payload) = payload.map_err(|why| error(why.into()))?;
    let start_point = point(payload.datetime, payload.latitude, payload.longitude).map_err(error)?;
    run_client
        .start_run(payload.user_id, start_point)
        .await
        .map_err(|why| error(why.into()))?
        .let_owned(|run| Ok((StatusCode::CREATED, run_hateoas(run, base_url).json())))
}

async fn finish_run<D: Database + 'static>(
    OriginalUri(original_uri): OriginalUri,
    path: Result<Path<i64>, PathRejection>,
    State(WebState { run_client }): State<WebState<D>>,
    Extension(base_url): Extension<Arc<BaseUrl>>,
    payload: Result<Json<FinishRunPayload>, JsonRejection>,
) -> HateoasResult<RunDto> {
    let error = |why: RouteErrorResponse| why.with_method(&Method::PATCH).with_uri(original_uri.path());

    let Path(id) = path.map_err(|why| error(why.into()))?;
    let Json(payload) = payload.map_err(|why| error(why.into()))?;
    let finish_point = point(payload.datetime, payload.latitude, payload.longitude).map_err(error)?;
    match run_client
        .finish_run(Id::new(id), finish_point, payload.distance)
        .await
        .map_err(|why| error(why.into()))?
    {
        Some(run) => Ok(run_hateoas(run, base_url).json()),
        None => Err(RouteErrorResponse::not_found(&Method::PATCH, original_uri.path())),
    }
}

async fn get_run<D: Database + 'static>(
    OriginalUri(original_uri): OriginalUri,
    path: Result<Path<i64>, PathRejection>,
    State(WebState { run_client }): State<WebState<D>>,
    Extension(base_url): Extension<Arc<BaseUrl>>,
) -> HateoasResult<RunDto> {
    let error = |why: RouteErrorResponse| why.with_method(&Method::GET).with_uri(original_uri.path());

    let Path(id) = path.map_err(|why| error(why.into()))?;
    match run_client
        .get_run(Id::new(id))
        .await
        .map_err(|why| error(why.into()))?
    {
        Some(run) => Ok(run_hateoas(run, base_url).json()),
        None => Err(RouteErrorResponse::not_found(&Method::GET, original_uri.path())),
    }
}

async fn get_runs<D: Database + 'static>(
    OriginalUri(original_uri): OriginalUri,
    State(WebState { run_client }): State<WebState<D>>,
    Extension(base_url): Extension<Arc<BaseUrl>>,
    query: Result<Query<UserRunsQuery>, QueryRejection>,
) -> HateoasResult<VecResponse<hateoas::Response<RunDto>>> {
    let Query(query) = query.map_err(|why| {
        RouteErrorResponse::bad_request(&Method::GET, original_uri.path())
            .with_detailed_information(why.body_text())
    })?;
    run_client
        .get_runs_by_user(query.user_id, query.range())
        .await
        .map(|runs| {
            runs.into_iter()
                .map(|run| run_hateoas(run, base_url.clone()))
                .collect::<Vec<_>>()
                .let_owned(|data| {
                    hateoas::Response::builder(VecResponse::new(data), base_url.clone())
                        .link(Relation::Itself, resource!("{}", query.query_string()))
                        .link(Relation::Stats, resource!("/stats{}", query.query_string()))
                        .filter("userId", query.user_id)
                        .build()
                        .json()
                })
        })
        .map_err(|why| {
            RouteErrorResponse::from(why)
                .with_method(&Method::GET)
                .with_uri(original_uri.path())
        })
}

async fn get_stats<D: Database + 'static>(
    OriginalUri(original_uri): OriginalUri,
    State(WebState { run_client }): State<WebState<D>>,
    Extension(base_url): Extension<Arc<BaseUrl>>,
    query: Result<Query<UserRunsQuery>, QueryRejection>,
) -> HateoasResult<RunStats> {
    let Query(query) = query.map_err(|why| {
        RouteErrorResponse::bad_request(&Method::GET, original_uri.path())
            .with_detailed_information(why.body_text())
    })?;
    run_client
        .get_stats_by_user(query.user_id, query.range())
        .await
        .map(|stats| {
            hateoas::Response::builder(stats, base_url)
                .link(Relation::Itself, resource!("/stats{}", query.query_string()))
                .link(Relation::Runs, resource!("{}", query.query_string()))
                .filter("userId", query.user_id)
                .build()
                .json()
        })
        .map_err(|why| {
            RouteErrorResponse::from(why)
                .with_method(&Method::GET)
                .with_uri(original_uri.path())
        })
}

pub(crate) fn run_hateoas(
    run: WithId<Run>,
    base_url: Arc<BaseUrl>,
) -> hateoas::Response<RunDto> {
    let id = run.id;
    let user_id = run.content.user_id();
    hateoas::Response::builder(RunDto::from(run), base_url)
        .link(Relation::Itself, resource!("/{}", id))
        .link(Relation::User, crate::api::v1::users::resource!("/{}", user_id))
        .build()
}
