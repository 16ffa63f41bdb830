//! WebSocket handler for the dashboard page.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::future::{self, Either};
use futures::{Sink, SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

use crate::monitor::ActivityEvent;
use crate::server::envelope;
use crate::server::state::AppState;
use crate::surface::WarningAction;

/// Messages the page sends.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Activity(ActivityEvent),
    StayLoggedIn,
    LogoutNow,
}

/// WebSocket upgrade handler.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handles an individual WebSocket connection.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    // Subscribe before the snapshot so nothing is missed in between
    let rx = state.subscribe();

    // Send current session state on connection
    if sender.send(Message::Text(session_state(&state))).await.is_err() {
        return;
    }

    // Forward surface commands to the page
    let send_task = tokio::spawn(forward_updates(rx, sender));

    // Activity and dialog actions from the page
    let recv_state = Arc::clone(&state);
    let recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => handle_client_message(&recv_state, &text).await,
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    join_first(send_task, recv_task).await;
    tracing::debug!("WebSocket connection closed");
}

/// Initial message for a connecting page. A page load renews an expired
/// session first.
fn session_state(state: &AppState) -> String {
    envelope("session_state", &state.begin_session().snapshot())
}

/// Pushes broadcast updates into the socket until either side closes.
async fn forward_updates<S>(mut rx: broadcast::Receiver<String>, mut sink: S)
where
    S: Sink<Message> + Unpin,
{
    loop {
        match rx.recv().await {
            Ok(msg) => {
                if sink.send(Message::Text(msg)).await.is_err() {
                    break;
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "WebSocket client lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// Waits for either task, then cancels the other.
async fn join_first(first: JoinHandle<()>, second: JoinHandle<()>) {
    let loser = match future::select(first, second).await {
        Either::Left((_, second)) => second,
        Either::Right((_, first)) => first,
    };
    loser.abort();
    let _ = loser.await;
}

async fn handle_client_message(state: &AppState, text: &str) {
    let message = match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => message,
        Err(e) => {
            tracing::debug!(error = %e, "Ignoring malformed client message");
            return;
        }
    };

    match message {
        ClientMessage::Activity(event) => {
            state.monitor().hub().publish(event);
        }
        ClientMessage::StayLoggedIn => {
            state
                .monitor()
                .handle_action(WarningAction::StayLoggedIn)
                .await
        }
        ClientMessage::LogoutNow => {
            state
                .monitor()
                .handle_action(WarningAction::LogoutNow)
                .await
        }
    }
}
