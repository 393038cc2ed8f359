//! Automated HTML form login.
//!
//! [`FormLoginHandler`] reads the login page a chain landed on, fills in the
//! first matching form and submits it with the chain's cookie store. The
//! response to the submission continues the chain.

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use ssochain_core::{ChainRequest, ChainResponse, CookieStore, Method, Transport};
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

use crate::error::InteractionError;
use crate::interaction::{InteractionHandler, InteractionReply};

/// Default selector for the login form.
const DEFAULT_FORM_SELECTOR: &str = "form";

/// Input types that are never submitted as plain fields.
const SKIPPED_INPUT_TYPES: &[&str] = &["submit", "button", "reset", "image", "file"];

/// Input types that are only submitted while checked.
const CHECKABLE_INPUT_TYPES: &[&str] = &["checkbox", "radio"];

// ============================================================================
// Login Form
// ============================================================================

/// A form extracted from a login page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginForm {
    /// Absolute submission URL.
    pub action: Url,
    /// Submission method.
    pub method: Method,
    /// Field names and values in document order.
    pub fields: Vec<(String, String)>,
}

impl LoginForm {
    /// Parses the first form matching `selector` out of `html`.
    ///
    /// `base` is the address the page was served from; relative actions are
    /// resolved against it and a missing action submits back to it.
    pub fn parse(html: &str, base: &Url, selector: &str) -> Result<Self, InteractionError> {
        let form_selector = Selector::parse(selector)
            .map_err(|e| InteractionError::InvalidSelector(format!("{selector}: {e}")))?;
        let input_selector = Selector::parse("input[name], textarea[name], select[name]")
            .map_err(|e| InteractionError::InvalidSelector(e.to_string()))?;
        let option_selector =
            Selector::parse("option").map_err(|e| InteractionError::InvalidSelector(e.to_string()))?;

        let document = Html::parse_document(html);
        let form = document
            .select(&form_selector)
            .next()
            .ok_or_else(|| InteractionError::FormNotFound(base.to_string()))?;

        let action = match form.value().attr("action").map(str::trim) {
            None | Some("") => base.clone(),
            Some(action) => base
                .join(action)
                .map_err(|e| InteractionError::InvalidFormAction(format!("{action}: {e}")))?,
        };

        let method = match form.value().attr("method") {
            Some(m) if m.eq_ignore_ascii_case("get") => Method::Get,
            _ => Method::Post,
        };

        let mut fields: Vec<(String, String)> = Vec::new();
        for input in form.select(&input_selector).filter(|input| !is_skipped(input)) {
            let Some(name) = input.value().attr("name") else {
                continue;
            };
            match input.value().name() {
                "textarea" => fields.push((name.to_string(), input.text().collect())),
                "select" => fields.extend(
                    selected_options(&input, &option_selector)
                        .into_iter()
                        .map(|value| (name.to_string(), value)),
                ),
                _ => {
                    // Checked boxes without a value submit "on".
                    let default = if is_checkable(&input) { "on" } else { "" };
                    let value = input.value().attr("value").unwrap_or(default);
                    fields.push((name.to_string(), value.to_string()));
                }
            }
        }

        Ok(Self {
            action,
            method,
            fields,
        })
    }

    /// Returns the value of the first field called `name`.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Applies configured values. Existing fields are overwritten, unknown
    /// ones are appended.
    pub fn fill<'a>(&mut self, values: impl IntoIterator<Item = (&'a str, &'a str)>) {
        for (name, value) in values {
            match self.fields.iter_mut().find(|(n, _)| n == name) {
                Some(field) => field.1 = value.to_string(),
                None => self.fields.push((name.to_string(), value.to_string())),
            }
        }
    }

    /// Builds the submission request.
    pub fn into_request(self, cookie_store: Arc<CookieStore>) -> ChainRequest {
        match self.method {
            Method::Get => {
                let mut url = self.action;
                url.set_query(None);
                url.query_pairs_mut().extend_pairs(&self.fields);
                ChainRequest::get(url, cookie_store)
            }
            _ => ChainRequest::post_form(self.action, cookie_store, self.fields),
        }
    }
}

fn input_type_in(input: &ElementRef<'_>, types: &[&str]) -> bool {
    input
        .value()
        .attr("type")
        .is_some_and(|t| types.iter().any(|s| t.eq_ignore_ascii_case(s)))
}

fn is_checkable(input: &ElementRef<'_>) -> bool {
    input.value().name() == "input" && input_type_in(input, CHECKABLE_INPUT_TYPES)
}

/// Disabled controls, buttons and unchecked boxes are not part of a submission.
fn is_skipped(input: &ElementRef<'_>) -> bool {
    let element = input.value();
    element.attr("disabled").is_some()
        || (element.name() == "input" && input_type_in(input, SKIPPED_INPUT_TYPES))
        || (is_checkable(input) && element.attr("checked").is_none())
}

/// Values a `<select>` submits: the selected options, or the first option
/// of a single-choice list when none is selected.
fn selected_options(select: &ElementRef<'_>, option_selector: &Selector) -> Vec<String> {
    let options: Vec<ElementRef<'_>> = select
        .select(option_selector)
        .filter(|option| option.value().attr("disabled").is_none())
        .collect();
    let option_value = |option: &ElementRef<'_>| {
        option
            .value()
            .attr("value")
            .map_or_else(|| option.text().collect::<String>().trim().to_string(), str::to_string)
    };

    let selected: Vec<String> = options
        .iter()
        .filter(|option| option.value().attr("selected").is_some())
        .map(option_value)
        .collect();

    if select.value().attr("multiple").is_some() {
        return selected;
    }
    match selected.into_iter().last() {
        Some(value) => vec![value],
        None => options.first().map(option_value).into_iter().collect(),
    }
}

// ============================================================================
// Form Login Handler
// ============================================================================

/// Interaction handler that submits the login form on the page.
pub struct FormLoginHandler {
    transport: Arc<dyn Transport>,
    values: Vec<(String, String)>,
    form_selector: String,
}

impl FormLoginHandler {
    /// Creates a handler that submits forms through `transport`.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            values: Vec::new(),
            form_selector: DEFAULT_FORM_SELECTOR.to_string(),
        }
    }

    /// Sets a field value, overriding the value on the page.
    pub fn with_value(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.push((name.into(), value.into()));
        self
    }

    /// Sets several field values.
    pub fn with_values<K, V>(mut self, values: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.values
            .extend(values.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Sets the CSS selector of the login form.
    pub fn with_form_selector(mut self, selector: impl Into<String>) -> Self {
        self.form_selector = selector.into();
        self
    }
}

#[async_trait]
impl InteractionHandler for FormLoginHandler {
    fn name(&self) -> &str {
        "form-login"
    }

    async fn interact(
        &self,
        response: &mut ChainResponse,
        reply: InteractionReply,
    ) -> Result<(), InteractionError> {
        let html = response.text().await?;
        let mut form = LoginForm::parse(&html, response.resolved_url(), &self.form_selector)?;
        form.fill(self.values.iter().map(|(k, v)| (k.as_str(), v.as_str())));

        let names: Vec<&str> = form.fields.iter().map(|(n, _)| n.as_str()).collect();
        info!(action = %form.action, method = %form.method, "Submitting login form");
        debug!(fields = ?names, "Login form fields");

        let request = form.into_request(Arc::clone(response.cookie_store()));
        let next = self.transport.send(request).await?;
        reply.continue_with(next);
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
