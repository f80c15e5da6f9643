use axum::{extract::State, Json};
use serde_json::Value;
use tracing::{info, instrument};

use super::dispatcher::DispatchReport;
use super::events::InboundEvent;
use super::router::{route_inbound, RouteOutcome};
use crate::shared::{AppState, FanoutError};

/// HTTP handler publishing one application event
///
/// POST /publish
/// Returns the settled dispatch report
#[instrument(name = "publish_event", skip(state, raw))]
pub async fn publish_event(
    State(state): State<AppState>,
    Json(raw): Json<Value>,
) -> Result<Json<DispatchReport>, FanoutError> {
    let InboundEvent::Application(event) = InboundEvent::from_value(raw)? else {
        return Err(FanoutError::malformed(
            "expected an application event, got a transport frame",
        ));
    };

    info!(event = %event.name, "Publishing event");
    let report = state.dispatcher.dispatch(&event, &state.context).await;

    Ok(Json(report))
}

/// HTTP handler for raw inbound payloads (transport frames or events)
///
/// POST /events
#[instrument(name = "receive_inbound", skip(state, raw))]
pub async fn receive_inbound(
    State(state): State<AppState>,
    Json(raw): Json<Value>,
) -> Result<Json<RouteOutcome>, FanoutError> {
    let outcome = route_inbound(&state, raw).await?;
    Ok(Json(outcome))
}
