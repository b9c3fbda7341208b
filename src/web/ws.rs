//! Signaling WebSocket endpoint
//!
//! Upgrades `/ws` and hands the socket to the [`ConnectionDriver`](crate::session::ConnectionDriver).

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    response::Response,
};
use futures::{future, SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::debug;

use crate::session::Frame;
use crate::state::AppState;

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, addr, state))
}

async fn handle_socket(socket: WebSocket, addr: SocketAddr, state: Arc<AppState>) {
    let _client = state.register_client();
    let (sender, receiver) = socket.split();

    let stream = receiver.map(|msg| msg.map(Frame::from));
    let sink = sender.with(|frame: Frame| future::ready(Ok::<_, axum::Error>(Message::from(frame))));

    if let Err(e) = state.driver.run(&addr.to_string(), stream, sink).await {
        debug!("WebSocket from {} ended with error: {}", addr, e);
    }
}

impl From<Message> for Frame {
    fn from(msg: Message) -> Self {
        match msg {
            Message::Text(text) => Frame::Text(text),
            Message::Binary(data) => Frame::Binary(data),
            Message::Ping(data) => Frame::Ping(data),
            Message::Pong(data) => Frame::Pong(data),
            Message::Close(_) => Frame::Close,
        }
    }
}

impl From<Frame> for Message {
    fn from(frame: Frame) -> Self {
        match frame {
            Frame::Text(text) => Message::Text(text),
            Frame::Binary(data) => Message::Binary(data),
            Frame::Ping(data) => Message::Ping(data),
            Frame::Pong(data) => Message::Pong(data),
            Frame::Close => Message::Close(None),
        }
    }
}
