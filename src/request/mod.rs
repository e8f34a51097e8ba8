mod template;


use std::collections::BTreeMap;
use std::sync::Arc;

use rand::Rng;
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::{Client, Method, Request, Url};

use crate::error::GenerateError;
use crate::params::ParameterSource;
use crate::util::epoch_ms;

pub use template::{RequestTemplate, render_template};

/// Per-request parameter mapping. The reserved keys `requestId`,
/// `timestamp`, and `elapsedTime` are always present and win over
/// user-defined sources of the same name.
#[must_use]
pub fn build_parameter_bag(
    request_id: u64,
    elapsed_ms: u64,
    sources: &BTreeMap<String, Arc<ParameterSource>>,
) -> BTreeMap<String, String> {
    let mut params: BTreeMap<String, String> = BTreeMap::new();
    for (name, source) in sources {
        params.insert(name.clone(), source.next());
    }
    params.insert("requestId".to_owned(), request_id.to_string());
    params.insert("timestamp".to_owned(), epoch_ms().to_string());
    params.insert("elapsedTime".to_owned(), elapsed_ms.to_string());
    params
}

/// Weighted template selection plus placeholder substitution plus
/// `reqwest` request materialization.
pub struct RequestGenerator {
    templates: Vec<RequestTemplate>,
    prefix_weights: Vec<u64>,
    total_weight: u64,
    sources: BTreeMap<String, Arc<ParameterSource>>,
    base_url: Option<Url>,
}

impl RequestGenerator {
    /// # Errors
    ///
    /// Returns an error when constructed with no templates.
    pub fn new(
        templates: Vec<RequestTemplate>,
        sources: BTreeMap<String, Arc<ParameterSource>>,
        base_url: Option<Url>,
    ) -> Result<Self, GenerateError> {
        if templates.is_empty() {
            return Err(GenerateError::NoTemplates);
        }
        let mut prefix_weights = Vec::with_capacity(templates.len());
        let mut total_weight: u64 = 0;
        for template in &templates {
            total_weight = total_weight.saturating_add(u64::from(template.weight.max(1)));
            prefix_weights.push(total_weight);
        }
        Ok(Self {
            templates,
            prefix_weights,
            total_weight,
            sources,
            base_url,
        })
    }

    /// Pick a template with probability proportional to its weight.
    #[must_use]
    pub fn pick_template(&self) -> Option<&RequestTemplate> {
        if self.templates.len() == 1 || self.total_weight == 0 {
            return self.templates.first();
        }
        let draw: u64 = rand::thread_rng().gen_range(0..self.total_weight);
        let index = self.prefix_weights.partition_point(|&prefix| prefix <= draw);
        self.templates.get(index).or_else(|| self.templates.first())
    }

    /// Materialize one HTTP request for the given id.
    ///
    /// # Errors
    ///
    /// Returns an error when the rendered URL fails to parse or a header
    /// survives substitution with an invalid name or value. Such units
    /// are recorded as skipped by the caller.
    pub fn generate(
        &self,
        client: &Client,
        request_id: u64,
        elapsed_ms: u64,
    ) -> Result<GeneratedRequest, GenerateError> {
        let template = self.pick_template().ok_or(GenerateError::NoTemplates)?;
        let params = build_parameter_bag(request_id, elapsed_ms, &self.sources);

        let rendered_url = render_template(&template.url, &params);
        let url = self.resolve_url(&rendered_url)?;

        let mut builder = client.request(template.method.clone(), url);

        for (name, value_template) in &template.headers {
            let value = render_template(value_template, &params);
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
                GenerateError::InvalidHeaderName { name: name.clone() }
            })?;
            let header_value = HeaderValue::from_str(&value).map_err(|_| {
                GenerateError::InvalidHeaderValue { name: name.clone() }
            })?;
            builder = builder.header(header_name, header_value);
        }

        if carries_body(&template.method, template.body.as_deref()) {
            let body = template
                .body
                .as_deref()
                .map(|body_template| render_template(body_template, &params))
                .unwrap_or_default();
            builder = builder.body(body);
        }

        let request = builder
            .build()
            .map_err(|err| GenerateError::BuildRequestFailed {
                template: template.name.clone(),
                source: err,
            })?;

        Ok(GeneratedRequest {
            template_name: template.name.clone(),
            request,
        })
    }

    fn resolve_url(&self, rendered: &str) -> Result<Url, GenerateError> {
        if rendered.starts_with("http://") || rendered.starts_with("https://") {
            return Url::parse(rendered).map_err(|err| GenerateError::InvalidUrl {
                url: rendered.to_owned(),
                source: err,
            });
        }
        match self.base_url.as_ref() {
            Some(base) => base.join(rendered).map_err(|err| GenerateError::InvalidUrl {
                url: rendered.to_owned(),
                source: err,
            }),
            None => Url::parse(rendered).map_err(|err| GenerateError::InvalidUrl {
                url: rendered.to_owned(),
                source: err,
            }),
        }
    }
}

pub struct GeneratedRequest {
    pub template_name: String,
    pub request: Request,
}

/// GET and DELETE never carry a body; POST and PUT always do (possibly
/// empty); any other method carries one only when a template exists.
fn carries_body(method: &Method, body_template: Option<&str>) -> bool {
    if *method == Method::GET || *method == Method::DELETE {
        false
    } else if *method == Method::POST || *method == Method::PUT {
        true
    } else {
        body_template.is_some()
    }
}
