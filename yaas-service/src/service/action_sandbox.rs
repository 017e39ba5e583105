//! # Action Sandbox
//!
//! Embeds [`boa_engine`] to run operator-authored Action scripts (spec §4.3)
//! with a restricted host API: `yaas.allow()`, `yaas.deny(message)`,
//! `yaas.setUser(userMap)`, `yaas.log(message)`, plus `console.log` and a
//! network-restricted `fetch`. No filesystem, timers, module imports, or
//! process/environment access is ever registered into the context, so a
//! script has no way to reach past the globals this module builds.
//!
//! ## Isolation
//!
//! Every script gets a brand new [`boa_engine::Context`] - nothing is
//! shared between scripts or invocations, matching §9's "do not share
//! globals" note. The only thing carried from one script to the next
//! within a pipeline run is the plain-data [`ActionContext`] snapshot,
//! rebuilt with the previous script's staged mutation folded in.
//!
//! ## Timeout
//!
//! Boa's interpreter loop is synchronous and has no built-in cooperative
//! cancellation, so each script runs on a dedicated blocking thread
//! (`tokio::task::spawn_blocking`) and the pipeline wraps the join with
//! `tokio::time::timeout`. A breach surfaces as
//! [`shared::errors::ApiError::ActionTimeout`]; the blocking thread itself
//! is abandoned (Rust has no safe way to preempt it), matching spec §9's
//! note that the original never wired a timeout at all - this fixes that
//! gap rather than reproducing it.

use std::time::Duration;

use boa_engine::{
    js_string,
    object::{builtins::JsArray, ObjectInitializer},
    property::Attribute,
    Context, JsArgs, JsResult, JsValue, NativeFunction, Source,
};
use serde::{Deserialize, Serialize};
use shared::errors::ApiError;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::UserMutation;

/// Default wall-clock budget per script (spec §5 recommends 2s).
pub const DEFAULT_SCRIPT_TIMEOUT: Duration = Duration::from_secs(2);

// =============================================================================
// Action context (input snapshot)
// =============================================================================

/// The read-only user view exposed to a script as `context.user`. Omits
/// `password_hash` entirely - a script can stage mutations to
/// `is_active`/`is_verified` via `setUser`, but never reads or writes
/// credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionUserView {
    pub id: Uuid,
    pub email: String,
    pub provider: String,
    pub is_active: bool,
    pub is_verified: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ActionConnection {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRequestInfo {
    pub flow_id: Uuid,
    pub flow_type: String,
}

/// Immutable snapshot passed to every script in a pipeline invocation
/// (spec §4.3, §GLOSSARY `ActionContext`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionContext {
    pub user: ActionUserView,
    pub connection: ActionConnection,
    pub request_info: ActionRequestInfo,
}

// =============================================================================
// Outcome of a single script run
// =============================================================================

#[derive(Debug, Clone, Default)]
struct ScriptDecision {
    allow: Option<bool>,
    message: Option<String>,
    mutation: UserMutation,
}

/// Result of running one script.
#[derive(Debug, Clone)]
pub enum ScriptOutcome {
    Allow { mutation: UserMutation },
    Deny { message: String },
}

/// Runs Action scripts against an [`ActionContext`] in a fresh sandbox
/// each time.
#[derive(Debug, Clone, Default)]
pub struct ActionSandbox {
    timeout: Duration,
}

impl ActionSandbox {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Runs one script against `context`, enforcing the wall-clock budget.
    ///
    /// ## Errors
    ///
    /// - `ApiError::ActionTimeout` if the script exceeds `self.timeout`.
    /// - `ApiError::ActionRuntimeError` if the script throws, fails to
    ///   parse, or returns without calling `allow()`/`deny()` (spec §8
    ///   property 5).
    pub async fn run(&self, code: String, context: ActionContext) -> Result<ScriptOutcome, ApiError> {
        let join = tokio::task::spawn_blocking(move || Self::evaluate(&code, &context));

        match tokio::time::timeout(self.timeout, join).await {
            Ok(Ok(result)) => result,
            Ok(Err(_join_err)) => Err(ApiError::ActionRuntimeError {
                message: "action script panicked".to_string(),
            }),
            Err(_elapsed) => {
                warn!("action script exceeded {:?} budget", self.timeout);
                Err(ApiError::ActionTimeout)
            }
        }
    }

    /// Builds a fresh [`Context`], installs the host API, evaluates the
    /// script source, and inspects the decision the script staged.
    fn evaluate(code: &str, ctx: &ActionContext) -> Result<ScriptOutcome, ApiError> {
        let mut js = Context::default();
        let decision = Rc::new(RefCell::new(ScriptDecision::default()));

        install_console(&mut js);
        install_fetch(&mut js)?;
        install_context_global(&mut js, ctx)?;
        install_yaas_namespace(&mut js, decision.clone())?;

        js.eval(Source::from_bytes(code.as_bytes())).map_err(|e| {
            debug!(error = %e, "action script threw");
            ApiError::ActionRuntimeError { message: e.to_string() }
        })?;

        let decision = decision.borrow();
        match decision.allow {
            Some(true) => Ok(ScriptOutcome::Allow { mutation: decision.mutation.clone() }),
            Some(false) => Ok(ScriptOutcome::Deny {
                message: decision.message.clone().unwrap_or_else(|| "denied".to_string()),
            }),
            None => Err(ApiError::ActionRuntimeError {
                message: "action script returned without calling allow() or deny()".to_string(),
            }),
        }
    }
}

// =============================================================================
// Host API installation
// =============================================================================

/// `console.log(...)` forwards to `tracing::info!`, never to stdout - the
/// original's `fmt.Printf` is a debugging leftover, not a pattern kept here.
fn install_console(js: &mut Context) {
    let console = ObjectInitializer::new(js)
        .function(
            NativeFunction::from_fn_ptr(|_this, args, _ctx| {
                let line = join_args_as_string(args);
                tracing::info!(target: "action.console", "{}", line);
                Ok(JsValue::undefined())
            }),
            js_string!("log"),
            1,
        )
        .build();

    js.register_global_property(js_string!("console"), console, Attribute::READONLY)
        .expect("console is a fresh global");
}

/// A network-restricted `fetch(url, options?)` returning `{ok, status,
/// json(), text()}`. Only `method`, `headers` (string -> string), and
/// `body` are read from `options`; nothing else the script passes reaches
/// the request.
fn install_fetch(js: &mut Context) -> Result<(), ApiError> {
    js.register_global_callable(
        js_string!("fetch"),
        2,
        NativeFunction::from_fn_ptr(|_this, args, ctx| {
            let url = args
                .get_or_undefined(0)
                .to_string(ctx)?
                .to_std_string_escaped();

            let mut method = "GET".to_string();
            let mut headers: Vec<(String, String)> = Vec::new();
            let mut body: Option<String> = None;

            if let Some(opts) = args.get(1).and_then(|v| v.as_object()) {
                if let Ok(m) = opts.get(js_string!("method"), ctx) {
                    if !m.is_undefined() {
                        method = m.to_string(ctx)?.to_std_string_escaped();
                    }
                }
                if let Ok(b) = opts.get(js_string!("body"), ctx) {
                    if !b.is_undefined() {
                        body = Some(b.to_string(ctx)?.to_std_string_escaped());
                    }
                }
                if let Ok(h) = opts.get(js_string!("headers"), ctx) {
                    if let Some(h_obj) = h.as_object() {
                        for key in h_obj.own_property_keys(ctx).unwrap_or_default() {
                            if let Ok(val) = h_obj.get(key.clone(), ctx) {
                                headers.push((
                                    key.to_string(),
                                    val.to_string(ctx)?.to_std_string_escaped(),
                                ));
                            }
                        }
                    }
                }
            }

            let response = blocking_fetch(&method, &url, &headers, body.as_deref());
            response_to_js_object(response, ctx)
        }),
    )
    .map_err(|e| ApiError::ActionRuntimeError { message: e.to_string() })?;

    Ok(())
}

struct FetchResponse {
    ok: bool,
    status: u16,
    body: String,
}

/// Uses a blocking `reqwest` client - safe here because `evaluate` always
/// runs on a `spawn_blocking` thread, never on the async reactor.
fn blocking_fetch(method: &str, url: &str, headers: &[(String, String)], body: Option<&str>) -> FetchResponse {
    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(10))
        .build();

    let Ok(client) = client else {
        return FetchResponse { ok: false, status: 0, body: String::new() };
    };

    let method = method.parse::<reqwest::Method>().unwrap_or(reqwest::Method::GET);
    let mut request = client.request(method, url);
    for (key, value) in headers {
        request = request.header(key, value);
    }
    if let Some(body) = body {
        request = request.body(body.to_string());
    }

    match request.send() {
        Ok(resp) => {
            let status = resp.status().as_u16();
            let ok = resp.status().is_success();
            let body = resp.text().unwrap_or_default();
            FetchResponse { ok, status, body }
        }
        Err(_) => FetchResponse { ok: false, status: 0, body: String::new() },
    }
}

fn response_to_js_object(response: FetchResponse, ctx: &mut Context) -> JsResult<JsValue> {
    let body = response.body;
    let text_body = body.clone();

    let obj = ObjectInitializer::new(ctx)
        .property(js_string!("ok"), response.ok, Attribute::all())
        .property(js_string!("status"), response.status as i32, Attribute::all())
        .function(
            NativeFunction::from_copy_closure_with_captures(
                |_this, _args, captured, ctx| {
                    let value: serde_json::Value = serde_json::from_str(captured).unwrap_or(serde_json::Value::Null);
                    json_to_js(&value, ctx)
                },
                body,
            ),
            js_string!("json"),
            0,
        )
        .function(
            NativeFunction::from_copy_closure_with_captures(
                |_this, _args, captured: &String, _ctx| Ok(JsValue::from(js_string!(captured.as_str()))),
                text_body,
            ),
            js_string!("text"),
            0,
        )
        .build();

    Ok(obj.into())
}

/// Sets the immutable `context` global from a serialized [`ActionContext`].
fn install_context_global(js: &mut Context, ctx: &ActionContext) -> Result<(), ApiError> {
    let value = serde_json::to_value(ctx)
        .map_err(|e| ApiError::ActionRuntimeError { message: format!("context serialization failed: {e}") })?;
    let js_value = json_to_js(&value, js)
        .map_err(|e| ApiError::ActionRuntimeError { message: e.to_string() })?;

    js.register_global_property(js_string!("context"), js_value, Attribute::READONLY)
        .map_err(|e| ApiError::ActionRuntimeError { message: e.to_string() })?;

    Ok(())
}

/// The `yaas` namespace: `allow()`, `deny(message)`, `setUser(userMap)`,
/// `log(message)`. All four write into the shared `decision` cell so
/// [`ActionSandbox::evaluate`] can read the verdict after the script runs.
fn install_yaas_namespace(js: &mut Context, decision: Rc<RefCell<ScriptDecision>>) -> Result<(), ApiError> {
    let allow_decision = decision.clone();
    let deny_decision = decision.clone();
    let set_user_decision = decision.clone();
    let log_decision = decision;

    let namespace = ObjectInitializer::new(js)
        .function(
            NativeFunction::from_copy_closure_with_captures(
                move |_this, _args, decision, _ctx| {
                    decision.borrow_mut().allow = Some(true);
                    Ok(JsValue::undefined())
                },
                allow_decision,
            ),
            js_string!("allow"),
            0,
        )
        .function(
            NativeFunction::from_copy_closure_with_captures(
                move |_this, args, decision, ctx| {
                    let message = args
                        .get_or_undefined(0)
                        .to_string(ctx)
                        .map(|s| s.to_std_string_escaped())
                        .unwrap_or_default();
                    let mut decision = decision.borrow_mut();
                    decision.allow = Some(false);
                    decision.message = Some(message);
                    Ok(JsValue::undefined())
                },
                deny_decision,
            ),
            js_string!("deny"),
            1,
        )
        .function(
            NativeFunction::from_copy_closure_with_captures(
                move |_this, args, decision, ctx| {
                    let Some(user_map) = args.get_or_undefined(0).as_object().cloned() else {
                        return Ok(JsValue::undefined());
                    };

                    let mut mutation = UserMutation::default();
                    if let Ok(v) = user_map.get(js_string!("IsActive"), ctx) {
                        if let Some(b) = v.as_boolean() {
                            mutation.is_active = Some(b);
                        }
                    }
                    if let Ok(v) = user_map.get(js_string!("IsVerified"), ctx) {
                        if let Some(b) = v.as_boolean() {
                            mutation.is_verified = Some(b);
                        }
                    }
                    // Unknown keys (and the identity-anchor fields ID/Email/Password,
                    // which are never read here) are silently ignored per spec §4.3.
                    decision.borrow_mut().mutation = mutation;
                    Ok(JsValue::undefined())
                },
                set_user_decision,
            ),
            js_string!("setUser"),
            1,
        )
        .function(
            NativeFunction::from_copy_closure_with_captures(
                move |_this, args, _decision, ctx| {
                    let line = args
                        .get_or_undefined(0)
                        .to_string(ctx)
                        .map(|s| s.to_std_string_escaped())
                        .unwrap_or_default();
                    tracing::info!(target: "action.yaas_log", "{}", line);
                    Ok(JsValue::undefined())
                },
                log_decision,
            ),
            js_string!("log"),
            1,
        )
        .build();

    js.register_global_property(js_string!("yaas"), namespace, Attribute::READONLY)
        .map_err(|e| ApiError::ActionRuntimeError { message: e.to_string() })?;

    Ok(())
}

fn join_args_as_string(args: &[JsValue]) -> String {
    args.iter()
        .map(|v| format!("{v:?}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Converts a `serde_json::Value` into a `boa_engine::JsValue`, used both
/// for the `context` global and for `response.json()`.
fn json_to_js(value: &serde_json::Value, ctx: &mut Context) -> JsResult<JsValue> {
    match value {
        serde_json::Value::Null => Ok(JsValue::null()),
        serde_json::Value::Bool(b) => Ok(JsValue::from(*b)),
        serde_json::Value::Number(n) => Ok(JsValue::from(n.as_f64().unwrap_or(0.0))),
        serde_json::Value::String(s) => Ok(JsValue::from(js_string!(s.as_str()))),
        serde_json::Value::Array(items) => {
            let array = JsArray::new(ctx);
            for item in items {
                let js_item = json_to_js(item, ctx)?;
                array.push(js_item, ctx)?;
            }
            Ok(array.into())
        }
        serde_json::Value::Object(map) => {
            let obj = ObjectInitializer::new(ctx).build();
            for (key, val) in map {
                let js_val = json_to_js(val, ctx)?;
                obj.set(js_string!(key.as_str()), js_val, false, ctx)?;
            }
            Ok(obj.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_context() -> ActionContext {
        ActionContext {
            user: ActionUserView {
                id: Uuid::new_v4(),
                email: "a@x.test".into(),
                provider: "password".into(),
                is_active: true,
                is_verified: true,
            },
            connection: ActionConnection { ip: Some("127.0.0.1".into()), user_agent: None },
            request_info: ActionRequestInfo { flow_id: Uuid::new_v4(), flow_type: "login".into() },
        }
    }

    #[tokio::test]
    async fn allow_script_permits() {
        let sandbox = ActionSandbox::new(DEFAULT_SCRIPT_TIMEOUT);
        let outcome = sandbox.run("yaas.allow();".to_string(), sample_context()).await.unwrap();
        assert!(matches!(outcome, ScriptOutcome::Allow { .. }));
    }

    #[tokio::test]
    async fn deny_script_carries_message() {
        let sandbox = ActionSandbox::new(DEFAULT_SCRIPT_TIMEOUT);
        let outcome = sandbox.run("yaas.deny('blocked');".to_string(), sample_context()).await.unwrap();
        match outcome {
            ScriptOutcome::Deny { message } => assert_eq!(message, "blocked"),
            _ => panic!("expected deny"),
        }
    }

    #[tokio::test]
    async fn script_without_verdict_is_runtime_error() {
        let sandbox = ActionSandbox::new(DEFAULT_SCRIPT_TIMEOUT);
        let result = sandbox.run("1 + 1;".to_string(), sample_context()).await;
        assert!(matches!(result, Err(ApiError::ActionRuntimeError { .. })));
    }

    #[tokio::test]
    async fn throwing_script_is_runtime_error() {
        let sandbox = ActionSandbox::new(DEFAULT_SCRIPT_TIMEOUT);
        let result = sandbox.run("throw new Error('boom');".to_string(), sample_context()).await;
        assert!(matches!(result, Err(ApiError::ActionRuntimeError { .. })));
    }

    #[tokio::test]
    async fn set_user_stages_whitelisted_fields_only() {
        let sandbox = ActionSandbox::new(DEFAULT_SCRIPT_TIMEOUT);
        let script = "yaas.setUser({IsVerified: false, ID: 'x', Email: 'y'}); yaas.allow();";
        let outcome = sandbox.run(script.to_string(), sample_context()).await.unwrap();
        match outcome {
            ScriptOutcome::Allow { mutation } => {
                assert_eq!(mutation.is_verified, Some(false));
                assert_eq!(mutation.is_active, None);
            }
            _ => panic!("expected allow"),
        }
    }

    #[tokio::test]
    async fn context_user_is_readable() {
        let sandbox = ActionSandbox::new(DEFAULT_SCRIPT_TIMEOUT);
        let ctx = sample_context();
        let email = ctx.user.email.clone();
        let script = format!("if (context.user.email === '{email}') {{ yaas.allow(); }} else {{ yaas.deny('mismatch'); }}");
        let outcome = sandbox.run(script, ctx).await.unwrap();
        assert!(matches!(outcome, ScriptOutcome::Allow { .. }));
    }

    #[tokio::test]
    async fn script_exceeding_timeout_fails() {
        let sandbox = ActionSandbox::new(Duration::from_millis(50));
        let result = sandbox.run("while (true) {}".to_string(), sample_context()).await;
        assert!(matches!(result, Err(ApiError::ActionTimeout)));
    }
}
