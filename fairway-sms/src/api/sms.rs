//! Inbound SMS webhook
//!
//! The provider posts form fields `From` and `Body`; the reply text goes
//! back as TwiML so the provider delivers it to the sender.

use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    routing::post,
    Form, Router,
};
use serde::Deserialize;
use tracing::info;

use crate::commands::handle_inbound;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct InboundSms {
    #[serde(rename = "From")]
    pub from: String,
    #[serde(rename = "Body", default)]
    pub body: String,
}

/// POST /sms
pub async fn inbound_sms(State(state): State<AppState>, Form(sms): Form<InboundSms>) -> impl IntoResponse {
    info!("Inbound SMS from {}", sms.from);
    let reply = handle_inbound(&state, &sms.from, &sms.body).await;

    (
        [(header::CONTENT_TYPE, "application/xml")],
        twiml_message(&reply),
    )
}

/// Wrap a reply in a TwiML `<Message>`
pub fn twiml_message(text: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response><Message>{}</Message></Response>",
        html_escape::encode_safe(text)
    )
}

pub fn sms_routes() -> Router<AppState> {
    Router::new().route("/sms", post(inbound_sms))
}
