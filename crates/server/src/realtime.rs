//! Row-level change feed.
//!
//! Every successful mutation publishes a [`ChangeEvent`] on a bounded
//! broadcast channel. `GET /api/realtime` turns a subscription into an SSE
//! stream filtered by table.

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::Stream;
use tokio::sync::broadcast;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tokio_stream::StreamExt;

use taskboard_api::{
    ChangeEvent, ChangeOp, ChangeTable, RealtimeQuery, ServiceError, SSE_EVENT_CHANGE,
    SSE_EVENT_LAGGED,
};

use crate::error::{ApiErr, ApiQuery};
use crate::routes::auth::AuthUser;

/// Buffered events per subscriber before it is reported as lagged.
pub const CHANNEL_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct ChangeHub {
    tx: broadcast::Sender<ChangeEvent>,
}

impl Default for ChangeHub {
    fn default() -> Self {
        Self::new(CHANNEL_CAPACITY)
    }
}

impl ChangeHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Announce a committed change. No-op when nobody is listening.
    pub fn publish(&self, table: ChangeTable, op: ChangeOp, id: &str) {
        let event = ChangeEvent {
            table,
            op,
            id: id.to_string(),
        };
        tracing::debug!(table = %table, op = %op, id, "change");
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Parse `?tables=tasks,projects`. `None` (or an empty list) means every table.
pub fn parse_tables(raw: Option<&str>) -> Result<Option<Vec<ChangeTable>>, ServiceError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let tables = raw
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::parse)
        .collect::<Result<Vec<ChangeTable>, _>>()?;
    Ok((!tables.is_empty()).then_some(tables))
}

fn change_frame(event: &ChangeEvent) -> Result<Event, axum::Error> {
    Event::default().event(SSE_EVENT_CHANGE).json_data(event)
}

/// GET /api/realtime: SSE stream of change events for the requested tables.
pub async fn stream(
    State(hub): State<ChangeHub>,
    user: AuthUser,
    ApiQuery(query): ApiQuery<RealtimeQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiErr> {
    let tables = parse_tables(query.tables.as_deref())?;
    tracing::info!(user = user.id(), ?tables, "realtime subscriber connected");

    let events = BroadcastStream::new(hub.subscribe()).filter_map(move |msg| match msg {
        Ok(event) => tables
            .as_ref()
            .is_none_or(|t| t.contains(&event.table))
            .then(|| change_frame(&event)),
        Err(BroadcastStreamRecvError::Lagged(missed)) => {
            tracing::warn!(missed, "realtime subscriber lagged");
            Some(Ok(Event::default()
                .event(SSE_EVENT_LAGGED)
                .data(missed.to_string())))
        }
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
