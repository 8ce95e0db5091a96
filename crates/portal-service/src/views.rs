//! HTML views.
//!
//! Pages are Handlebars templates compiled once into a process-wide registry.
//! `{{value}}` expressions are HTML-escaped, so claim values coming from the
//! identity provider cannot inject markup.

use axum::response::Html;
use handlebars::Handlebars;
use serde_json::json;
use std::sync::OnceLock;

const NAV_PARTIAL: &str = r#"<nav><a href="/">Home</a> | <a href="/student">Student</a> | <a href="/admin">Admin</a> | <a href="/debug">Claims</a> | {{#if signed_in}}<a href="/logout">Logout</a>{{else}}<a href="/login">Login</a>{{/if}}</nav>"#;

const HOME_TEMPLATE: &str = r#"<!DOCTYPE html>
<html><head><title>University Portal</title></head>
<body>
{{> nav signed_in=signed_in}}
<h1>University Portal</h1>
{{#if signed_in}}
<p>Welcome, <strong>{{username}}</strong>!</p>
<p>Roles: {{role_info}}</p>
{{else}}
<p>You are not signed in. <a href="/login">Sign in with your university account</a>.</p>
{{/if}}
</body></html>"#;

const LOGIN_FAILED_TEMPLATE: &str = r#"<!DOCTYPE html>
<html><head><title>Login failed</title></head>
<body>
{{> nav signed_in=false}}
<h1>Login failed</h1>
<pre>{{error}}</pre>
<p><a href="/login">Try again</a></p>
</body></html>"#;

const ACCESS_DENIED_TEMPLATE: &str = r#"<!DOCTYPE html>
<html><head><title>Access denied</title></head>
<body>
{{> nav signed_in=true}}
<h1>Access denied</h1>
<p>{{reason}}</p>
</body></html>"#;

const STUDENT_TEMPLATE: &str = r#"<!DOCTYPE html>
<html><head><title>Student dashboard</title></head>
<body>
{{> nav signed_in=true}}
<h1>Student dashboard</h1>
<p>Hello {{username}}, here are your courses and grades.</p>
</body></html>"#;

const ADMIN_TEMPLATE: &str = r#"<!DOCTYPE html>
<html><head><title>Admin dashboard</title></head>
<body>
{{> nav signed_in=true}}
<h1>Admin dashboard</h1>
<p>Hello {{username}}, you can manage courses, students and staff.</p>
</body></html>"#;

const DEBUG_TEMPLATE: &str = r#"<!DOCTYPE html>
<html><head><title>Session claims</title></head>
<body>
{{> nav signed_in=true}}
<h1>Session claims</h1>
<pre>{{user_data}}</pre>
</body></html>"#;

const TEMPLATES: [(&str, &str); 6] = [
    ("home", HOME_TEMPLATE),
    ("login_failed", LOGIN_FAILED_TEMPLATE),
    ("access_denied", ACCESS_DENIED_TEMPLATE),
    ("student_dashboard", STUDENT_TEMPLATE),
    ("admin_dashboard", ADMIN_TEMPLATE),
    ("debug", DEBUG_TEMPLATE),
];

static REGISTRY: OnceLock<Handlebars<'static>> = OnceLock::new();

fn registry() -> &'static Handlebars<'static> {
    REGISTRY.get_or_init(|| {
        let mut handlebars = Handlebars::new();
        if let Err(e) = handlebars.register_partial("nav", NAV_PARTIAL) {
            tracing::error!(target: "portal.views", error = %e, "Failed to register nav partial");
        }
        for (name, source) in TEMPLATES {
            if let Err(e) = handlebars.register_template_string(name, source) {
                tracing::error!(target: "portal.views", template = name, error = %e, "Failed to register template");
            }
        }
        handlebars
    })
}

fn render(template: &str, data: &serde_json::Value) -> Html<String> {
    match registry().render(template, data) {
        Ok(body) => Html(body),
        Err(e) => {
            tracing::error!(target: "portal.views", template, error = %e, "Template rendering failed");
            Html("<!DOCTYPE html><html><body><h1>Internal error</h1></body></html>".to_string())
        }
    }
}

/// Signed-in summary shown on the home page.
#[derive(Debug, Clone)]
pub struct HomeUser {
    pub username: String,
    pub roles: Vec<String>,
}

/// Home page; `None` renders the anonymous variant.
pub fn home(user: Option<&HomeUser>) -> Html<String> {
    let data = match user {
        Some(user) => {
            let role_info = if user.roles.is_empty() {
                "No roles".to_string()
            } else {
                user.roles.join(", ")
            };
            json!({ "signed_in": true, "username": user.username, "role_info": role_info })
        }
        None => json!({ "signed_in": false }),
    };
    render("home", &data)
}

pub fn login_failed(error: &str) -> Html<String> {
    render("login_failed", &json!({ "error": error }))
}

pub fn access_denied(reason: &str) -> Html<String> {
    render("access_denied", &json!({ "reason": reason }))
}

pub fn student_dashboard(username: &str) -> Html<String> {
    render("student_dashboard", &json!({ "username": username }))
}

pub fn admin_dashboard(username: &str) -> Html<String> {
    render("admin_dashboard", &json!({ "username": username }))
}

/// Claims inspection page; `user_data` is pre-formatted JSON.
pub fn debug_claims(user_data: &str) -> Html<String> {
    render("debug", &json!({ "user_data": user_data }))
}
