use crate::*;

fn started(commands: &[OverlayCommand]) -> Vec<(&'static str, PeerId)> {
    commands
        .iter()
        .filter_map(|c| match c {
            OverlayCommand::StartConnection { service, peer, .. } => Some((*service, peer.id)),
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn chat_locates_then_starts() {
    let mut h = Harness::start("chat").unwrap();
    h.send(HostEvent::Chat(peer(1)));
    let status = h.status().await;
    assert_eq!(status.pending_connections, 1);
    let commands = h.drain_commands();
    assert!(matches!(&commands[..], [OverlayCommand::FindNode(id)] if *id == peer(1)));

    h.send(HostEvent::PeerLocated(located(1)));
    assert_eq!(h.status().await.pending_connections, 0);
    assert_eq!(started(&h.drain_commands()), vec![("chat", peer(1))]);

    let events = h.drain_connections();
    assert!(matches!(
        &events[..],
        [ConnectionEvent::Started { peer: p, kind: ConnectionKind::Chat, .. }] if *p == peer(1)
    ));

    // a late negative result changes nothing
    h.send(HostEvent::PeerNotLocated {
        peer: peer(1),
        candidates: vec![],
    });
    h.status().await;
    assert!(h.drain_connections().is_empty());

    h.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn file_upload_opens_the_file_on_resolution() {
    let mut h = Harness::start("upload").unwrap();
    let path = h.dir.join("holiday.jpg");

    // requested before the file exists, written before the peer is found
    h.send(HostEvent::SendFile {
        peer: peer(2),
        path: path.clone(),
    });
    h.status().await;
    std::fs::write(&path, vec![7u8; 1024]).unwrap();

    h.send(HostEvent::PeerLocated(located(2)));
    h.status().await;
    let commands = h.drain_commands();
    let upload = commands.iter().find_map(|c| match c {
        OverlayCommand::StartConnection {
            service: "fileupload",
            session: Session::Upload(upload),
            ..
        } => Some(upload),
        _ => None,
    });
    let upload = upload.expect("upload should have started");
    assert_eq!(upload.size, 1024);
    assert_eq!(upload.path, path);

    h.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn missing_upload_file_reports_failure() {
    let mut h = Harness::start("upload-missing").unwrap();
    let path = h.dir.join("gone.bin");
    h.send(HostEvent::SendFile { peer: peer(3), path });
    h.send(HostEvent::PeerLocated(located(3)));
    h.status().await;

    assert!(started(&h.drain_commands()).is_empty());
    let events = h.drain_connections();
    assert!(matches!(
        &events[..],
        [ConnectionEvent::Failed { kind: ConnectionKind::FileUpload, .. }]
    ));

    h.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn second_request_for_same_peer_is_dropped() {
    let mut h = Harness::start("busy").unwrap();
    h.send(HostEvent::Chat(peer(4)));
    h.send(HostEvent::Call(peer(4)));
    assert_eq!(h.status().await.pending_connections, 1);

    let finds = h
        .drain_commands()
        .iter()
        .filter(|c| matches!(c, OverlayCommand::FindNode(_)))
        .count();
    assert_eq!(finds, 1);

    // the first request still owns the entry
    h.send(HostEvent::PeerLocated(located(4)));
    h.status().await;
    assert_eq!(started(&h.drain_commands()), vec![("chat", peer(4))]);

    h.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn unlocated_peer_is_reported_unreachable() {
    let mut h = Harness::start("unreachable").unwrap();
    h.send(HostEvent::Call(peer(5)));
    h.send(HostEvent::PeerNotLocated {
        peer: peer(5),
        candidates: vec![located(6), located(7)],
    });
    h.send(HostEvent::PeerLocated(located(5)));
    h.status().await;

    assert_eq!(
        h.drain_connections(),
        vec![ConnectionEvent::Unreachable {
            peer: peer(5),
            kind: ConnectionKind::Call,
        }]
    );
    assert!(started(&h.drain_commands()).is_empty());

    h.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn cancelled_request_ignores_late_results() {
    let mut h = Harness::start("cancel").unwrap();
    h.send(HostEvent::Chat(peer(6)));
    h.send(HostEvent::Cancel(peer(6)));
    h.send(HostEvent::PeerLocated(located(6)));
    assert_eq!(h.status().await.pending_connections, 0);

    assert!(started(&h.drain_commands()).is_empty());
    assert!(h.drain_connections().is_empty());

    h.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn stalled_locate_expires() {
    let mut h = Harness::start("expire").unwrap();
    h.send(HostEvent::Chat(peer(7)));
    h.status().await;

    h.advance(115).await;
    assert_eq!(h.status().await.pending_connections, 1);

    // presence tick at 120s fails the entry
    h.advance(10).await;
    assert_eq!(h.status().await.pending_connections, 0);
    assert_eq!(
        h.drain_connections(),
        vec![ConnectionEvent::Unreachable {
            peer: peer(7),
            kind: ConnectionKind::Chat,
        }]
    );

    h.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn handshake_failure_is_reported() {
    let mut h = Harness::start("handshake").unwrap();
    h.send(HostEvent::Chat(peer(8)));
    h.send(HostEvent::PeerLocated(located(8)));
    h.status().await;
    let session = match h.drain_connections().as_slice() {
        [ConnectionEvent::Started { session, .. }] => *session,
        other => panic!("expected a started connection, got {other:?}"),
    };

    h.send(HostEvent::ConnectionFailed {
        service: "chat".into(),
        peer: peer(8),
        session,
        reason: "handshake timed out".into(),
    });
    h.status().await;
    assert_eq!(
        h.drain_connections(),
        vec![ConnectionEvent::Failed {
            peer: peer(8),
            kind: ConnectionKind::Chat,
            reason: "handshake timed out".into(),
        }]
    );

    h.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn inbound_chat_is_for_buddies_only() {
    let mut h = Harness::start("inbound").unwrap();
    h.send(HostEvent::AddBuddy {
        name: "alice".into(),
        peer: peer(1),
    });
    h.send(HostEvent::IncomingConnection {
        service: "chat".into(),
        peer: peer(1),
    });
    h.send(HostEvent::IncomingConnection {
        service: "call".into(),
        peer: peer(9),
    });
    h.status().await;

    let commands = h.drain_commands();
    assert_eq!(commands.len(), 2);
    assert!(matches!(
        &commands[0],
        OverlayCommand::AcceptConnection { service, peer: p, payload: Some(_) }
            if service == "chat" && *p == peer(1)
    ));
    assert!(matches!(
        &commands[1],
        OverlayCommand::RejectConnection { service, peer: p } if service == "call" && *p == peer(9)
    ));
    assert_eq!(
        h.drain_connections(),
        vec![ConnectionEvent::Refused {
            peer: peer(9),
            service: "call".into(),
        }]
    );

    h.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn socks_admission_follows_settings() {
    let mut h = Harness::start("socks").unwrap();
    h.send(HostEvent::IncomingConnection {
        service: "socks".into(),
        peer: peer(3),
    });
    h.status().await;
    assert!(matches!(
        &h.drain_commands()[..],
        [OverlayCommand::RejectConnection { .. }]
    ));

    let mut settings = vlf_core::Settings::default();
    settings.socks_service.enabled = true;
    settings.socks_service.allow_whitelist = true;
    settings.socks_service.whitelist.insert(peer(3));
    h.send(HostEvent::UpdateSettings(settings.clone()));
    h.send(HostEvent::IncomingConnection {
        service: "socks".into(),
        peer: peer(3),
    });
    h.status().await;
    assert!(matches!(
        &h.drain_commands()[..],
        [OverlayCommand::AcceptConnection { payload: None, .. }]
    ));

    // settings were written for the next start
    let saved = vlf_core::Settings::load(&h.dir.join("settings.json")).unwrap();
    assert_eq!(saved, settings);

    h.stop().await.unwrap();
}
