// Client session tests. Most drive the client against a scripted server
// end; the last one runs a real coordinator on the other side.

mod common;

use common::{
    three_phases, wait_for, FakeMic, FakeResponder, FakeSpeaker, FakeSynthesizer, RecordingSink,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use voice_turns::channel::{duplex, ClientEvent, ServerChannel, ServerEvent};
use voice_turns::client::console::{SilentOutput, TextOnlySynthesizer};
use voice_turns::client::{
    AudioOutput, ClientControl, ClientNotice, ClientSession, PlaybackController,
    RecognitionController, VoiceSynthesizer,
};
use voice_turns::config::ClientTiming;
use voice_turns::turn::{
    ConversationMessage, CoordinatorTiming, MachineConfig, Role, Session, TurnCoordinator,
};

struct Harness {
    server: ServerChannel,
    control: ClientControl,
    notices: UnboundedReceiver<ClientNotice>,
    task: JoinHandle<Vec<ConversationMessage>>,
}

fn start_client(
    mic: &Arc<FakeMic>,
    output: Box<dyn AudioOutput>,
    synthesizer: Arc<dyn VoiceSynthesizer>,
) -> Harness {
    let timing = ClientTiming::default();
    let (client_end, server) = duplex();
    let (recognition, recognition_rx) = RecognitionController::spawn(mic.clone(), timing.clone());
    let (playback, playback_rx) =
        PlaybackController::spawn(output, recognition.clone(), timing.clone());
    let (session, control, notices) = ClientSession::new(
        client_end,
        recognition,
        recognition_rx,
        playback,
        playback_rx,
        synthesizer,
        timing,
    );

    Harness {
        server,
        control,
        notices,
        task: tokio::spawn(session.run()),
    }
}

async fn next_client_event(server: &mut ServerChannel) -> ClientEvent {
    match server.recv().await {
        Some(Ok(event)) => event,
        other => panic!("expected a client event, got {:?}", other),
    }
}

fn drain(notices: &mut UnboundedReceiver<ClientNotice>) -> Vec<ClientNotice> {
    let mut seen = Vec::new();
    while let Ok(notice) = notices.try_recv() {
        seen.push(notice);
    }
    seen
}

#[tokio::test(start_paused = true)]
async fn test_utterance_reply_and_relisten() {
    let mic = FakeMic::new();
    let speaker = FakeSpeaker::default();
    let mut h = start_client(&mic, Box::new(speaker.clone()), FakeSynthesizer::working());

    wait_for(|| mic.created() == 1).await;
    mic.latest().final_result("what is rust");

    assert_eq!(
        next_client_event(&mut h.server).await,
        ClientEvent::UserSpeech {
            text: "what is rust".to_string()
        }
    );

    let answer = "A systems language.".to_string();
    h.server
        .send(ServerEvent::AiResponse {
            text: answer.clone(),
        })
        .unwrap();
    h.server
        .send(ServerEvent::SpeechRequest {
            text: answer.clone(),
        })
        .unwrap();
    wait_for(|| speaker.played() == 1).await;

    // ready arrives while the reply is still playing; listening waits for playback
    h.server.send(ServerEvent::ready()).unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(mic.created(), 1);

    speaker.sink(0).ended();
    assert_eq!(
        next_client_event(&mut h.server).await,
        ClientEvent::SpeechEnded {}
    );
    wait_for(|| mic.created() == 2).await;
    assert_eq!(mic.active(), 1);

    h.server
        .send(ServerEvent::SessionEnded {
            reason: "done".to_string(),
        })
        .unwrap();
    let transcript = h.task.await.unwrap();

    let lines: Vec<(Role, &str)> = transcript
        .iter()
        .map(|m| (m.role, m.content.as_str()))
        .collect();
    assert_eq!(
        lines,
        vec![
            (Role::User, "what is rust"),
            (Role::Assistant, "A systems language.")
        ]
    );

    let notices = drain(&mut h.notices);
    assert!(notices.contains(&ClientNotice::UserSaid("what is rust".to_string())));
    assert!(notices.contains(&ClientNotice::AssistantSaid(answer)));
    assert_eq!(notices.last(), Some(&ClientNotice::Ended("done".to_string())));
}

#[tokio::test(start_paused = true)]
async fn test_synthesis_failure_reported_and_speech_ended() {
    let mic = FakeMic::new();
    let mut h = start_client(&mic, Box::new(FakeSpeaker::default()), FakeSynthesizer::broken());

    wait_for(|| mic.created() == 1).await;
    h.server
        .send(ServerEvent::SpeechRequest {
            text: "unspeakable".to_string(),
        })
        .unwrap();

    assert!(matches!(
        next_client_event(&mut h.server).await,
        ClientEvent::TtsError { .. }
    ));
    assert_eq!(
        next_client_event(&mut h.server).await,
        ClientEvent::SpeechEnded {}
    );
}

#[tokio::test(start_paused = true)]
async fn test_reply_timeout_offers_retry() {
    let mic = FakeMic::new();
    let mut h = start_client(&mic, Box::new(FakeSpeaker::default()), FakeSynthesizer::working());

    wait_for(|| mic.created() == 1).await;
    mic.latest().final_result("anyone there");
    assert!(matches!(
        next_client_event(&mut h.server).await,
        ClientEvent::UserSpeech { .. }
    ));

    loop {
        match h.notices.recv().await {
            Some(ClientNotice::Retry(_)) => break,
            Some(_) => continue,
            None => panic!("client stopped"),
        }
    }
    wait_for(|| mic.created() == 2).await;
}

#[tokio::test(start_paused = true)]
async fn test_recoverable_and_blocking_errors() {
    let mic = FakeMic::new();
    let mut h = start_client(&mic, Box::new(FakeSpeaker::default()), FakeSynthesizer::working());

    h.server
        .send(ServerEvent::Error {
            message: "try again".to_string(),
            recoverable: true,
        })
        .unwrap();
    h.server
        .send(ServerEvent::Error {
            message: "check settings".to_string(),
            recoverable: false,
        })
        .unwrap();

    assert_eq!(
        h.notices.recv().await,
        Some(ClientNotice::Retry("try again".to_string()))
    );
    assert_eq!(
        h.notices.recv().await,
        Some(ClientNotice::Blocking("check settings".to_string()))
    );
}

#[tokio::test(start_paused = true)]
async fn test_end_session_and_ping() {
    let mic = FakeMic::new();
    let mut h = start_client(&mic, Box::new(FakeSpeaker::default()), FakeSynthesizer::working());

    h.server.send(ServerEvent::Ping {}).unwrap();
    assert_eq!(next_client_event(&mut h.server).await, ClientEvent::Pong {});

    h.control.end_session();
    assert_eq!(
        next_client_event(&mut h.server).await,
        ClientEvent::EndSession {}
    );

    drop(h.server);
    let transcript = h.task.await.unwrap();
    assert!(transcript.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_conversation_against_coordinator() {
    let mic = FakeMic::new();
    let responder = FakeResponder::new(Duration::from_millis(200));
    let mut h = start_client(&mic, Box::new(SilentOutput::default()), Arc::new(TextOnlySynthesizer));

    let coordinator = TurnCoordinator::new(
        Session::new("e2e"),
        three_phases(),
        MachineConfig::default(),
        CoordinatorTiming::default(),
        responder.clone(),
        Arc::new(RecordingSink::default()),
    );
    let server_task = tokio::spawn(coordinator.run(h.server));

    wait_for(|| mic.created() == 1).await;
    mic.latest().final_result("hello there");
    wait_for(|| mic.created() == 2).await;

    mic.latest().final_result("another question");
    let mut replies = 0;
    while replies < 2 {
        match h.notices.recv().await {
            Some(ClientNotice::AssistantSaid(_)) => replies += 1,
            Some(_) => {}
            None => panic!("client stopped"),
        }
    }

    h.control.end_session();
    let transcript = h.task.await.unwrap();
    let snapshot = server_task.await.unwrap();

    assert_eq!(transcript.len(), 4);
    assert_eq!(snapshot.history.len(), 4);
    assert_eq!(snapshot.history[3].content, "You said: another question");
    assert_eq!(responder.max_in_flight(), 1);
}
