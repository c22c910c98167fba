// End-to-end replay of captured frame text through the public API
use can_telemetry::{
    Decoder, EventStatus, FrameOutcome, MemorySink, MessageKind, Pipeline, PipelineConfig, Source, TimeSource,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn bms_dbc() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .join("dbc/bms.dbc")
}

fn replay_pipeline(config: PipelineConfig) -> (Pipeline, Arc<MemorySink>) {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut decoder = Decoder::with_bms_config(&config.bms);
    decoder.add_dbc(&bms_dbc()).unwrap();
    let sink = Arc::new(MemorySink::new());
    let pipeline = Pipeline::new(config, decoder, sink.clone()).unwrap();
    (pipeline, sink)
}

fn line(timestamp: f64, id: &str, payload: &[u8]) -> String {
    let bytes: Vec<String> = payload.iter().map(|b| format!("{:02x}", b)).collect();
    format!(
        "Timestamp: {:.6}    ID: {}    S Rx    DL:  {}    {}    Channel: can0",
        timestamp,
        id,
        payload.len(),
        bytes.join(" ")
    )
}

/// PDO2 with both temperature bytes set to `temp`
fn pdo2(timestamp: f64, temp: u8) -> String {
    line(timestamp, "0281", &[temp, temp, 0x50, 0x01, 0x0C, 0x00, 0x0A, 0x00])
}

#[test]
fn replay_motor_temperature_fault_lifecycle() {
    let config = PipelineConfig::default().with_time_source(TimeSource::Frame);
    let (mut pipeline, sink) = replay_pipeline(config);

    for (t, temp) in [(0.0, 50), (1.0, 85), (2.0, 95), (3.0, 40)] {
        let outcome = pipeline.handle_line(&pdo2(t, temp));
        assert!(matches!(outcome, FrameOutcome::Decoded { kind: MessageKind::MotorPdo2, .. }));
    }

    let events = sink.fault_events();
    let statuses: Vec<EventStatus> = events.iter().map(|e| e.status).collect();
    assert_eq!(statuses, vec![EventStatus::WarnHigh, EventStatus::FaultHigh, EventStatus::Resolved]);
    assert!(events.iter().all(|e| e.signal == "Motor Temperature" && e.source == Source::Mc));
    assert_eq!(events[0].message, "Motor Temperature >= 80");
    assert_eq!(events[1].message, "Motor Temperature > 90");

    let alarm: Vec<f64> = sink
        .readings_named("FAULT Motor Temperature")
        .iter()
        .map(|r| r.value)
        .collect();
    assert_eq!(alarm, vec![0.0, 0.0, 1.0, 1.0, 0.0, 0.0]);

    // Controller temperature is shown under its dashboard name
    let shown: Vec<f64> = sink.readings_named("Motor Temp").iter().map(|r| r.value).collect();
    assert_eq!(shown, vec![50.0, 85.0, 95.0, 40.0]);
    assert!(sink.readings_named("Motor Temp").iter().all(|r| r.unit == "degC"));
}

#[test]
fn replay_mixed_bus_traffic() {
    let config = PipelineConfig::default().with_time_source(TimeSource::Frame);
    let (mut pipeline, sink) = replay_pipeline(config);

    let lines = vec![
        // VCU traffic is not decoded here
        line(0.0, "0100", &[0x10, 0x20, 0x30, 0x40, 0x00, 0x00, 0x00, 0x00]),
        line(0.1, "181", &[0x37, 0x02, 0xFE, 0xFF, 0xFF, 0xFF, 0x2C, 0x01]),
        line(0.2, "0381", &[0x64, 0x00, 0x10, 0x00, 0x9C, 0xFF]),
        line(0.3, "0481", &[0x01, 0x00, 0x02, 0x00, 0xE8, 0x03, 0x00]),
        // 50.0 A, 300.0 V, 80 %, 70 °C, 75 A DCL
        line(0.4, "004D", &[0xF4, 0x01, 0xB8, 0x0B, 0x6A, 0xB4, 0x04, 0x00]),
        "garbage".to_string(),
        String::new(),
    ];

    let outcomes: Vec<FrameOutcome> = lines.iter().map(|l| pipeline.handle_line(l)).collect();
    assert_eq!(outcomes[0], FrameOutcome::Ignored { id: 0x100 });
    assert!(matches!(outcomes[1], FrameOutcome::Decoded { kind: MessageKind::MotorPdo1, readings: 3, .. }));
    assert!(matches!(outcomes[2], FrameOutcome::Decoded { kind: MessageKind::MotorPdo3, readings: 3, .. }));
    assert!(matches!(outcomes[3], FrameOutcome::Decoded { kind: MessageKind::MotorPdo4, readings: 3, .. }));
    assert!(matches!(outcomes[4], FrameOutcome::Decoded { kind: MessageKind::Bms, readings: 8, events: 1 }));
    assert!(matches!(outcomes[5], FrameOutcome::Rejected { .. }));
    assert!(matches!(outcomes[6], FrameOutcome::Rejected { .. }));

    assert_eq!(sink.readings_named("position actual")[0].value, -2.0);
    assert_eq!(sink.readings_named("phase a current")[0].value, -100.0);
    assert_eq!(sink.readings_named("velocity actual value")[0].value, 1000.0);
    assert_eq!(sink.readings_named("Battery Current")[0].value, 50.0);

    let events = sink.fault_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].signal, "Battery Temperature");
    assert_eq!(events[0].source, Source::Bms);

    let stats = pipeline.stats();
    assert_eq!(stats.frames_seen, 7);
    assert_eq!(stats.decoded, 4);
    assert_eq!(stats.ignored, 1);
    assert_eq!(stats.rejected, 2);
    assert_eq!(pipeline.decoder().bms().history().len(), 1);
}

#[test]
fn watchdog_reports_idle_and_resume() {
    let config = PipelineConfig::default().with_watchdog_timeout(1);
    let (mut pipeline, sink) = replay_pipeline(config);

    pipeline.handle_line(&pdo2(0.0, 30));
    thread::sleep(Duration::from_millis(1600));
    assert!(pipeline.is_idle());

    pipeline.handle_line(&pdo2(1.6, 30));
    assert!(!pipeline.is_idle());

    let idle: Vec<(f64, Source)> = sink
        .readings()
        .into_iter()
        .filter(|(r, _)| r.name == "Bridge Idle")
        .map(|(r, s)| (r.value, s))
        .collect();
    assert_eq!(idle, vec![(1.0, Source::Bridge), (0.0, Source::Bridge)]);
}
