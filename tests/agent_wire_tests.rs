// Agent protocol tests: message shapes on the wire and the WebSocket
// transport against a local server.

use futures::{SinkExt, StreamExt};
use live_interview::agent::messages::Blob;
use live_interview::agent::{
    AgentTransport, ClientMessage, LinkEvent, ServerMessage, SetupConfig, WsTransport,
};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

fn setup() -> SetupConfig {
    SetupConfig::new("models/live-audio", "Kore", "You are Sarah.")
}

#[test]
fn test_setup_shape() {
    let value = serde_json::to_value(ClientMessage::Setup(setup())).unwrap();
    let setup = &value["setup"];

    assert_eq!(setup["model"], "models/live-audio");
    assert_eq!(setup["generationConfig"]["responseModalities"], json!(["AUDIO"]));
    assert_eq!(
        setup["generationConfig"]["speechConfig"]["voiceConfig"]["prebuiltVoiceConfig"]["voiceName"],
        "Kore"
    );
    assert_eq!(setup["systemInstruction"]["parts"][0]["text"], "You are Sarah.");
    assert_eq!(setup["inputAudioTranscription"], json!({}));
    assert_eq!(setup["outputAudioTranscription"], json!({}));

    let declaration = &setup["tools"][0]["functionDeclarations"][0];
    assert_eq!(declaration["name"], "notifyResult");
    assert_eq!(declaration["parameters"]["required"], json!(["passed", "reason"]));
}

#[test]
fn test_client_message_shapes() {
    let audio = ClientMessage::audio(Blob {
        mime_type: "audio/pcm;rate=16000".to_string(),
        data: "AAA=".to_string(),
    });
    assert_eq!(
        serde_json::to_value(audio).unwrap(),
        json!({ "realtimeInput": { "mediaChunks": [{ "mimeType": "audio/pcm;rate=16000", "data": "AAA=" }] } })
    );

    let directive = ClientMessage::system_text("[SYSTEM NOTIFICATION: hello]");
    assert_eq!(directive.directive_text(), Some("[SYSTEM NOTIFICATION: hello]"));
    assert_eq!(
        serde_json::to_value(directive).unwrap(),
        json!({ "clientContent": {
            "turns": [{ "role": "user", "parts": [{ "text": "[SYSTEM NOTIFICATION: hello]" }] }],
            "turnComplete": true
        } })
    );

    let ack = ClientMessage::tool_ack("call-7", "notifyResult", json!({ "result": "ok" }));
    assert_eq!(ack.directive_text(), None);
    assert_eq!(
        serde_json::to_value(ack).unwrap(),
        json!({ "toolResponse": { "functionResponses": [
            { "id": "call-7", "name": "notifyResult", "response": { "result": "ok" } }
        ] } })
    );
}

#[test]
fn test_server_content_parses_and_ignores_unknown_fields() {
    let msg: ServerMessage = serde_json::from_value(json!({
        "serverContent": {
            "modelTurn": { "parts": [
                { "inlineData": { "mimeType": "audio/pcm;rate=24000", "data": "AQA=" } },
                { "text": "thinking" }
            ] },
            "outputTranscription": { "text": "Hello Asha" },
            "interrupted": false,
            "turnComplete": true
        },
        "usageMetadata": { "totalTokenCount": 12 }
    }))
    .unwrap();

    let content = msg.server_content.unwrap();
    assert!(content.turn_complete);
    assert_eq!(
        content.output_transcription.as_ref().unwrap().text.as_deref(),
        Some("Hello Asha")
    );
    assert!(content.input_transcription.is_none());
    let blobs: Vec<_> = content.audio_blobs().collect::<Vec<_>>();
    assert_eq!(blobs.len(), 1);
    assert_eq!(blobs[0].mime_type, "audio/pcm;rate=24000");
}

#[test]
fn test_tool_call_and_decision_args() {
    let msg: ServerMessage = serde_json::from_value(json!({
        "toolCall": { "functionCalls": [
            { "id": "fc-1", "name": "notifyResult", "args": { "passed": true, "reason": "Solid answers" } },
            { "id": "fc-2", "name": "notifyResult", "args": { "passed": "yes" } }
        ] }
    }))
    .unwrap();

    let calls = msg.tool_call.unwrap().function_calls;
    let args = calls[0].decision_args().unwrap();
    assert!(args.passed);
    assert_eq!(args.reason, "Solid answers");
    assert!(calls[1].decision_args().is_err());
}

#[test]
fn test_setup_complete_and_go_away() {
    let ready: ServerMessage = serde_json::from_str(r#"{"setupComplete":{}}"#).unwrap();
    assert!(ready.setup_complete.is_some());

    let leaving: ServerMessage = serde_json::from_str(r#"{"goAway":{"timeLeft":"10s"}}"#).unwrap();
    assert_eq!(leaving.go_away.unwrap().time_left.as_deref(), Some("10s"));
}

async fn agent_server() -> (String, tokio::sync::oneshot::Receiver<(Value, Value)>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/live", listener.local_addr().unwrap());
    let (seen_tx, seen_rx) = tokio::sync::oneshot::channel();

    tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();

        let setup = match ws.next().await.unwrap().unwrap() {
            Message::Text(text) => serde_json::from_str::<Value>(&text).unwrap(),
            other => panic!("expected setup, got {other:?}"),
        };
        ws.send(Message::Text(r#"{"setupComplete":{}}"#.to_string()))
            .await
            .unwrap();
        ws.send(Message::Binary(
            br#"{"serverContent":{"outputTranscription":{"text":"Hello"}}}"#.to_vec(),
        ))
        .await
        .unwrap();

        let input = loop {
            match ws.next().await.unwrap().unwrap() {
                Message::Text(text) => break serde_json::from_str::<Value>(&text).unwrap(),
                _ => continue,
            }
        };
        let _ = seen_tx.send((setup, input));

        ws.close(Some(CloseFrame {
            code: CloseCode::Normal,
            reason: "session over".into(),
        }))
        .await
        .unwrap();
        while ws.next().await.is_some() {}
    });

    (url, seen_rx)
}

#[tokio::test]
async fn test_websocket_transport_negotiates_and_relays() {
    let (url, seen) = agent_server().await;
    let transport = WsTransport::new(url, "", Duration::from_secs(5));
    assert_eq!(transport.name(), "websocket");

    let mut link = transport.connect(&setup()).await.unwrap();

    match link.inbound.recv().await.unwrap() {
        LinkEvent::Message(msg) => {
            let text = msg.server_content.unwrap().output_transcription.unwrap().text;
            assert_eq!(text.as_deref(), Some("Hello"));
        }
        other => panic!("unexpected event {other:?}"),
    }

    link.outbound
        .send(ClientMessage::system_text("ping"))
        .await
        .unwrap();

    let (setup, input) = seen.await.unwrap();
    assert_eq!(setup["setup"]["model"], "models/live-audio");
    assert_eq!(input["clientContent"]["turns"][0]["parts"][0]["text"], "ping");

    assert_eq!(
        link.inbound.recv().await.unwrap(),
        LinkEvent::Closed(Some("session over".to_string()))
    );
}

#[tokio::test]
async fn test_websocket_transport_fails_when_setup_is_refused() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/live", listener.local_addr().unwrap());

    tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
        let _setup = ws.next().await;
        let _ = ws
            .close(Some(CloseFrame {
                code: CloseCode::Policy,
                reason: "invalid model".into(),
            }))
            .await;
        while ws.next().await.is_some() {}
    });

    let transport = WsTransport::new(url, "", Duration::from_secs(5));
    let err = transport.connect(&setup()).await.err().unwrap();
    assert!(format!("{err:#}").contains("invalid model"));
}

#[tokio::test]
async fn test_websocket_transport_unreachable() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("ws://{}/live", listener.local_addr().unwrap());
    drop(listener);

    let transport = WsTransport::new(url, "", Duration::from_secs(5));
    assert!(transport.connect(&setup()).await.is_err());
}
