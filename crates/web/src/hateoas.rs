//! Json envelopes that put links to related resources next to a payload.

use std::{collections::BTreeMap, sync::Arc};

use axum::Json;
use serde::Serialize;
use serde_json::Value;

use crate::middleware::base_url::BaseUrl;

/// How a linked resource relates to the one in the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Relation {
    #[serde(rename = "self")]
    Itself,
    Runs,
    Stats,
    User,
}

#[derive(Debug, Clone, Serialize)]
pub struct Link {
    pub rel: Relation,
    pub href: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Response<T> {
    #[serde(flatten)]
    pub content: T,
    /// Request parameters the content was selected by.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub filter: BTreeMap<&'static str, Value>,
    pub links: Vec<Link>,
}

impl<T> Response<T> {
    pub fn builder(content: T, base_url: Arc<BaseUrl>) -> ResponseBuilder<T> {
        ResponseBuilder {
            response: Response {
                content,
                filter: BTreeMap::new(),
                links: Vec::new(),
            },
            base_url,
        }
    }

    pub fn json(self) -> Json<Self> {
        Json(self)
    }
}

pub struct ResponseBuilder<T> {
    response: Response<T>,
    base_url: Arc<BaseUrl>,
}

impl<T> ResponseBuilder<T> {
    /// Links `path`, resolved against the base url of the request.
    pub fn link(mut self, rel: Relation, path: impl Into<String>) -> Self {
        let href = self.base_url.full_url(path);
        self.response.links.push(Link { rel, href });
        self
    }

    pub fn filter(mut self, name: &'static str, value: impl Serialize) -> Self {
        match serde_json::to_value(value) {
            Ok(value) => {
                self.response.filter.insert(name, value);
            }
            Err(why) => log::warn!("dropping filter {} from response: {}", name, why),
        }
        self
    }

    pub fn build(self) -> Response<T> {
        self.response
    }
}
