use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use super::dispatcher::DispatchReport;
use super::events::InboundEvent;
use crate::shared::{AppState, FanoutError};

/// What the inbound boundary did with a payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RouteOutcome {
    Dispatched { report: DispatchReport },
    Frame { connection_id: String },
}

/// Route one raw inbound payload
///
/// Transport frames go to the subscription server, application events to the
/// dispatcher. Only a malformed shape (or a failed frame) is returned as an
/// error; dispatch itself never fails.
#[instrument(skip(state, raw))]
pub async fn route_inbound(state: &AppState, raw: Value) -> Result<RouteOutcome, FanoutError> {
    match InboundEvent::from_value(raw)? {
        InboundEvent::Application(event) => {
            let report = state.dispatcher.dispatch(&event, &state.context).await;
            Ok(RouteOutcome::Dispatched { report })
        }
        InboundEvent::Transport(frame) => {
            debug!(
                connection_id = %frame.connection_id,
                event_type = %frame.event_type,
                "Routing transport frame"
            );
            let connection_id = frame.connection_id.clone();
            state.server.handle_frame(frame).await?;
            Ok(RouteOutcome::Frame { connection_id })
        }
    }
}
