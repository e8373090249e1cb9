use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        OriginalUri, Path, State,
    },
    http::{Method, StatusCode},
    routing::{get, on},
    Extension, Json, Router,
};
use model::{user::User, WithId};
use run_tracker::database::Database;
use utility::{id::Id, let_also::LetAlso};

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
        crate::api::v1::resource!("/users{}", format_args!($($arg)*))
    };
}
pub(crate) use resource;

pub(crate) fn routes<D: Database + 'static>(state: WebState<D>) -> Router {
    Router::new()
        .route("/schema", get(schema::<User>))
        .route(
            "/:id",
            get(get_user::<D>)
                .put(update_user::<D>)
                .delete(delete_user::<D>),
        )
        .route("/", get(get_users::<D>).post(create_user::<D>))
        .layer(axum::middleware::from_fn(base_url_middleware))
        .with_state(state)
        .fallback_service(on(METHOD_FILTER_ALL, route_not_found))
}

async fn get_users<D: Database + 'static>(
    OriginalUri(original_uri): OriginalUri,
    State(WebState { run_client }): State<WebState<D>>,
    Extension(base_url): Extension<Arc<BaseUrl>>,
) -> HateoasResult<VecResponse<hateoas::Response<WithId<User>>>> {
    run_client
        .get_users()
        .await
        .map(|users| {
            users
                .into_iter()
                .map(|user| user_hateoas(user, base_url.clone()))
                .collect::<Vec<_>>()
                .let_owned(|data| {
                    hateoas::Response::builder(VecResponse::new(data), base_url.clone())
                        .link(Relation::Itself, resource!(""))
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

async fn get_user<D: Database + 'static>(
    OriginalUri(original_uri): OriginalUri,
    path: Result<Path<i64>, PathRejection>,
    State(WebState { run_client }): State<WebState<D>>,
    Extension(base_url): Extension<Arc<BaseUrl>>,
) -> HateoasResult<WithId<User>> {
    let error = |why: RouteErrorResponse| why.with_method(&Method::GET).with_uri(original_uri.path());

    let Path(id) = path.map_err(|why| error(why.into()))?;
    run_client
        .get_user(Id::new(id))
        .await
        .map_err(|why| error(why.into()))?
        .map(|user| user_hateoas(user, base_url).json())
        .ok_or_else(|| RouteErrorResponse::not_found(&Method::GET, original_uri.path()))
}

async fn create_user<D: Database + 'static>(
    OriginalUri(original_uri): OriginalUri,
    State(WebState { run_client }): State<WebState<D>>,
    Extension(base_url): Extension<Arc<BaseUrl>>,
    payload: Result<Json<User>, JsonRejection>,
) -> RouteResult<(StatusCode, Json<hateoas::Response<WithId<User>>>)> {
    let error = |why: RouteErrorResponse| why.with_method(&Method::POST).with_uri(original_uri.path());

    let Json(user) = payload.map_err(|why| error(why.into()))?;
    run_client
        .create_user(user)
        .await
        .map_err(|why| error(why.into()))?
        .let_owned(|user| Ok((StatusCode::CREATED, user_hateoas(user, base_url).json())))
}

async fn update_user<D: Database + 'static>(
    OriginalUri(original_uri): OriginalUri,
    path: Result<Path<i64>, PathRejection>,
    State(WebState { run_client }): State<WebState<D>>,
    Extension(base_url): Extension<Arc<BaseUrl>>,
    payload: Result<Json<User>, JsonRejection>,
) -> HateoasResult<WithId<User>> {
    let error = |why: RouteErrorResponse| why.with_method(&Method::PUT).with_uri(original_uri.path());

    let Path(id) = path.map_err(|why| error(why.into()))?;
    let Json(user) = payload.map_err(|why| error(why.into()))?;
    run_client
        .update_user(Id::new(id), user)
        .await
        .map_err(|why| error(why.into()))?
        .map(|user| user_hateoas(user, base_url).json())
        .ok_or_else(|| RouteErrorResponse::not_found(&Method::PUT, original_uri.path()))
}

async fn delete_user<D: Database + 'static>(
    OriginalUri(original_uri): OriginalUri,
    path: Result<Path<i64>, PathRejection>,
    State(WebState { run_client }): State<WebState<D>>,
) -> RouteResult<StatusCode> {
    let error = |why: RouteErrorResponse| why.with_method(&Method::DELETE).with_uri(original_uri.path());

    let Path(id) = path.map_err(|why| error(why.into()))?;
    let deleted = run_client
        .delete_user(Id::new(id))
        .await
        .map_err(|why| error(why.into()))?;
    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(RouteErrorResponse::not_found(&Method::DELETE, original_uri.path()))
    }
}

pub(crate) fn user_hateoas(
    user: WithId<User>,
    base_url: Arc<BaseUrl>,
) -> hateoas::Response<WithId<User>> {
    let id = user.id;
    hateoas::Response::builder(user, base_url)
        .link(Relation::Itself, resource!("/{}", id))
        .link(Relation::Runs, crate::api::v1::runs::resource!("?userId={}", id))
        .link(
            Relation::Stats,
            crate::api::v1::runs::resource!("/stats?userId={}", id),
        )
        .build()
}
