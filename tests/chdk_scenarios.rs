//! CHDK workflows against a scripted camera

mod common;

use anyhow::{Context, Result};
use chdk_ptp::container::codes::chdk;
use chdk_ptp::{
    ChdkCamera, ConnectionConfig, LiveViewFlags, MessageKind, ScriptStatus, ValueType,
};
use common::{ScriptedCamera, data, ok};
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(1);

fn connect(camera: &ScriptedCamera) -> Result<ChdkCamera<ScriptedCamera>> {
    let config = ConnectionConfig { poll_interval: Duration::from_millis(1), ..Default::default() };
    Ok(ChdkCamera::connect(camera.clone(), config)?)
}

fn sub_ops(camera: &ScriptedCamera) -> Vec<u32> {
    camera
        .sent()
        .iter()
        .filter(|c| c.kind() == chdk_ptp::ContainerKind::Command)
        .filter_map(|c| c.param(0))
        .collect()
}

#[test]
fn script_runs_to_completion() -> Result<()> {
    let camera = ScriptedCamera::new();
    camera
        .reply(ok(vec![0, 7]))
        .reply(ok(vec![ScriptStatus::RUN]))
        .reply(ok(vec![ScriptStatus::RUN]))
        .reply(ok(vec![ScriptStatus::MSG]))
        .reply(data(b"hello from lua".to_vec()))
        .reply(ok(vec![2, 4, 7]));
    let mut cam = connect(&camera)?;

    let handle = cam.submit_script("return 'hello from lua'", false)?;
    assert_eq!(handle.script_id, 7);

    let message = cam.wait_and_read(&handle, TIMEOUT).context("waiting for script")?;
    assert_eq!(message.kind, MessageKind::Return);
    assert_eq!(message.value_type(), Some(ValueType::String));
    assert_eq!(message.text(), "hello from lua");

    assert_eq!(
        sub_ops(&camera),
        vec![
            chdk::EXECUTE_SCRIPT,
            chdk::SCRIPT_STATUS,
            chdk::SCRIPT_STATUS,
            chdk::SCRIPT_STATUS,
            chdk::READ_SCRIPT_MSG
        ]
    );
    assert_eq!(camera.pending(), 0);
    Ok(())
}

#[test]
fn compile_error_is_read_as_error_message() -> Result<()> {
    let camera = ScriptedCamera::new();
    camera
        .reply(ok(vec![0, 3]))
        .reply(ok(vec![ScriptStatus::MSG]))
        .reply(data(b"[string \"x(\"]:1: unexpected symbol\0".to_vec()))
        .reply(ok(vec![1, 1, 3]));
    let mut cam = connect(&camera)?;

    let message = cam.run_script("x(", TIMEOUT)?;
    assert!(message.is_error());
    assert!(message.text().contains("unexpected symbol"));
    Ok(())
}

#[test]
fn file_round_trip() -> Result<()> {
    let camera = ScriptedCamera::new();
    camera
        .reply(ok(vec![]))
        .reply(ok(vec![]))
        .reply(data(b"contents".to_vec()))
        .reply(ok(vec![0]));
    let mut cam = connect(&camera)?;

    cam.upload_bytes("A/TEST.TXT", b"contents", TIMEOUT)?;
    let downloaded = cam.download_file("A/TEST.TXT", TIMEOUT)?;
    assert_eq!(downloaded, b"contents");

    assert_eq!(sub_ops(&camera), vec![chdk::UPLOAD_FILE, chdk::TEMP_DATA, chdk::DOWNLOAD_FILE]);
    Ok(())
}

#[test]
fn live_view_frame_from_camera() -> Result<()> {
    // v2.1 header, one 2x1 Yuv422 viewport right after its descriptor
    let mut payload = Vec::new();
    for field in [2i32, 1, 1, 0, 0, 32, 0, 0] {
        payload.extend_from_slice(&field.to_le_bytes());
    }
    for field in [2i32, 68, 2, 2, 1, 0, 0, 0, 0] {
        payload.extend_from_slice(&field.to_le_bytes());
    }
    payload.extend_from_slice(&[128, 40, 128, 200]);

    let camera = ScriptedCamera::new();
    camera.reply(data(payload)).reply(ok(vec![]));
    let mut cam = connect(&camera)?;

    let frame = cam.live_view(LiveViewFlags::viewport(), false, TIMEOUT)?;
    assert_eq!((frame.width, frame.height), (2, 1));
    assert_eq!(frame.pixels, vec![40, 40, 40, 200, 200, 200]);
    assert!((frame.version() - 2.1).abs() < 1e-6);
    Ok(())
}
