use crate::*;

fn host_pings(commands: &[OverlayCommand]) -> Vec<(String, u16)> {
    commands
        .iter()
        .filter_map(|c| match c {
            OverlayCommand::PingHost { host, port } => Some((host.clone(), *port)),
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn bootstrap_nodes_are_pinged_until_connected() {
    let dir = data_dir("rejoin");
    std::fs::write(
        dir.join("bootstrap.json"),
        r#"["boot.example:9000", "second.example"]"#,
    )
    .unwrap();
    let mut h = Harness::start_in(dir).unwrap();
    let nodes: Vec<(String, u16)> = vec![
        ("boot.example".to_string(), 9000),
        ("second.example".to_string(), 7741),
    ];

    // once at start-up
    h.status().await;
    assert_eq!(host_pings(&h.drain_commands()), nodes);

    // and every minute while disconnected
    h.advance(61).await;
    assert_eq!(host_pings(&h.drain_commands()), nodes);

    h.send(HostEvent::Connected);
    h.advance(180).await;
    assert!(host_pings(&h.drain_commands()).is_empty());
    assert!(h.status().await.connected);

    // losing the link rejoins right away, then every minute
    h.send(HostEvent::Disconnected);
    h.status().await;
    assert_eq!(host_pings(&h.drain_commands()), nodes);
    h.advance(30).await;
    assert!(host_pings(&h.drain_commands()).is_empty());
    h.advance(31).await;
    assert_eq!(host_pings(&h.drain_commands()), nodes);

    let dir = h.stop().await.unwrap();
    let _ = std::fs::remove_dir_all(dir);
}

#[tokio::test(start_paused = true)]
async fn bootstrap_action_pings_and_persists() {
    let mut h = Harness::start("bootstrap").unwrap();
    h.send(HostEvent::Bootstrap("fresh.example".into()));
    h.send(HostEvent::Bootstrap("10.1.2.3:8000".into()));
    h.send(HostEvent::Bootstrap("a:b:c".into()));
    let status = h.status().await;
    assert_eq!(status.bootstrap_nodes, 2);
    assert_eq!(
        host_pings(&h.drain_commands()),
        vec![
            ("fresh.example".to_string(), 7741),
            ("10.1.2.3".to_string(), 8000),
        ]
    );

    let text = std::fs::read_to_string(h.dir.join("bootstrap.json")).unwrap();
    let saved: Vec<String> = serde_json::from_str(&text).unwrap();
    assert_eq!(saved, vec!["fresh.example:7741", "10.1.2.3:8000"]);

    h.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn status_reports_overlay_counters() {
    let h = Harness::start("status").unwrap();
    h.stats.send_replace(OverlayStats {
        peers: 42,
        active_sessions: 3,
        bytes_in: 1000,
        bytes_out: 2000,
        in_rate: 1.5,
        out_rate: 0.5,
    });
    h.send(HostEvent::AddBuddy {
        name: "alice".into(),
        peer: peer(1),
    });

    let status = h.status().await;
    assert_eq!(status.self_id, peer(0xee).to_hex());
    assert!(!status.connected);
    assert_eq!(status.buddies, 1);
    assert_eq!(status.overlay.peers, 42);
    assert_eq!(status.overlay.active_sessions, 3);

    let json: serde_json::Value = serde_json::from_str(&status.to_json().unwrap()).unwrap();
    assert_eq!(json["buddies"], 1);
    assert_eq!(json["overlay"]["bytes_out"], 2000);

    h.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn loop_exits_when_all_senders_are_gone() {
    let h = Harness::start("senders").unwrap();
    let Harness { events, task, .. } = h;
    drop(events);
    task.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_the_loop() {
    let h = Harness::start("shutdown").unwrap();
    h.status().await;
    h.stop().await.unwrap();
}

#[test]
fn config_file_named_by_the_environment_is_used() {
    let dir = data_dir("from-env");
    let state = dir.join("state");
    let config_path = dir.join("config.toml");
    std::fs::write(
        &config_path,
        format!("[storage]\ndata_dir = {:?}\n", state.display().to_string()),
    )
    .unwrap();

    // no other test reads VLF_CONFIG
    std::env::set_var("VLF_CONFIG", &config_path);
    let (overlay, _commands, _stats) = ChannelOverlay::pair(peer(0xee));
    let host = ControlLoop::from_env(overlay);
    std::env::remove_var("VLF_CONFIG");

    assert!(host.is_ok());
    assert!(state.is_dir());
    let _ = std::fs::remove_dir_all(dir);
}
