//! Full-stack scenarios: simulated microphone and speaker, directory store.

use std::fs;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use recorder_core::{
    decode_header, Command, CommandOutcome, PlaybackAbort, PlaybackOutcome, Recorder, RecorderConfig, RecorderError,
    RecorderEvent, StoreError, SystemState,
};
use recorder_host::{FsStore, SimulatedSink, SimulatedSource};

const WAIT: Duration = Duration::from_secs(10);

type HostRecorder = Recorder<SimulatedSource, SimulatedSink, FsStore>;

struct Rig {
    recorder: HostRecorder,
    delivered: Arc<std::sync::atomic::AtomicUsize>,
    played: Arc<parking_lot::Mutex<Vec<i16>>>,
    dir: tempfile::TempDir,
}

fn rig(limit: usize) -> Rig {
    let dir = tempfile::tempdir().unwrap();
    let config = RecorderConfig::default();
    let store = Arc::new(FsStore::open_dir(dir.path()).unwrap());
    let source = SimulatedSource::new(&config, 440.0, false).with_limit(limit);
    let delivered = source.delivered();
    let sink = SimulatedSink::new(&config, false).recording();
    let played = sink.recorded().unwrap();
    let recorder = Recorder::new(config, source, sink, store).unwrap();
    Rig {
        recorder,
        delivered,
        played,
        dir,
    }
}

fn wait_delivered(rig: &Rig, samples: usize) {
    let deadline = Instant::now() + WAIT;
    while rig.delivered.load(Ordering::SeqCst) < samples {
        assert!(Instant::now() < deadline, "source never delivered {} samples", samples);
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn record_save_and_play_back() {
    let mut rig = rig(32_000);

    rig.recorder.handle(Command::StartRecord).unwrap();
    wait_delivered(&rig, 32_000);
    let stopped = rig.recorder.handle(Command::StopRecord).unwrap();
    assert_eq!(stopped, CommandOutcome::RecordingStopped { sample_count: Some(32_000) });
    assert_eq!(rig.recorder.state(), SystemState::Idle);

    let saved = rig
        .recorder
        .wait_for(WAIT, |e| matches!(e, RecorderEvent::RecordingSaved(_)));
    let Some(RecorderEvent::RecordingSaved(report)) = saved else {
        panic!("recording was not saved");
    };
    assert_eq!(report.file_name, "rec_0000.wav");
    assert_eq!(report.bytes_written, 64_044);
    approx::assert_relative_eq!(report.duration_secs, 1.0);

    let bytes = fs::read(rig.dir.path().join("rec_0000.wav")).unwrap();
    assert_eq!(bytes.len(), 64_044);
    let decoded = decode_header(&bytes, &rig.recorder.config().expected_format()).unwrap();
    assert_eq!(decoded.header.sample_rate, 16_000);
    assert_eq!(decoded.header.channels, 2);
    assert_eq!(decoded.header.bits_per_sample, 16);
    assert_eq!(decoded.header.data_size, 64_000);
    assert_eq!(decoded.total_samples, 32_000);

    rig.recorder.handle(Command::Play("rec_0000.wav".into())).unwrap();
    assert_eq!(rig.recorder.state(), SystemState::Playing);
    let finished = rig
        .recorder
        .wait_for(WAIT, |e| matches!(e, RecorderEvent::PlaybackFinished(_)));
    let Some(RecorderEvent::PlaybackFinished(PlaybackOutcome::Completed(playback))) = finished else {
        panic!("playback did not complete: {:?}", finished);
    };
    assert_eq!(playback.samples_played, 32_000);
    assert_eq!(playback.chunks.len(), 8);
    assert_eq!(rig.recorder.state(), SystemState::Idle);

    let payload: Vec<i16> = bytes[44..]
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
        .collect();
    assert_eq!(*rig.played.lock(), payload);
}

#[test]
fn playing_a_missing_file_reports_open_failure() {
    let mut rig = rig(0);

    rig.recorder.handle(Command::Play("missing.wav".into())).unwrap();
    let finished = rig
        .recorder
        .wait_for(WAIT, |e| matches!(e, RecorderEvent::PlaybackFinished(_)));

    assert_eq!(
        finished,
        Some(RecorderEvent::PlaybackFinished(PlaybackOutcome::Aborted(PlaybackAbort::ReadError(
            RecorderError::Storage(StoreError::NotFound("missing.wav".into()))
        ))))
    );
    assert_eq!(rig.recorder.state(), SystemState::Idle);
    assert_eq!(rig.recorder.cursor().active_buffer(), None);
    assert!(rig.played.lock().is_empty());
}

#[test]
fn second_recording_takes_the_next_name() {
    let mut rig = rig(640);

    for _ in 0..2 {
        rig.recorder.start_record().unwrap();
        wait_delivered(&rig, 640);
        rig.recorder.stop_record().unwrap();
        rig.recorder
            .wait_for(WAIT, |e| matches!(e, RecorderEvent::RecordingSaved(_)))
            .unwrap();
    }

    let names: Vec<String> = rig.recorder.list().unwrap().into_iter().map(|e| e.name).collect();
    assert_eq!(names, vec!["rec_0000.wav", "rec_0001.wav"]);

    rig.recorder.handle(Command::Delete("rec_0000.wav".into())).unwrap();
    assert!(!rig.dir.path().join("rec_0000.wav").exists());
    let listed = rig.recorder.list().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].size_bytes, 44 + 640 * 2);
}

#[test]
fn corrupt_file_is_rejected_and_recorder_stays_usable() {
    let mut rig = rig(64);
    fs::write(rig.dir.path().join("junk.wav"), b"this is not a wav file at all, just some text....").unwrap();

    rig.recorder.play("junk.wav").unwrap();
    let finished = rig
        .recorder
        .wait_for(WAIT, |e| matches!(e, RecorderEvent::PlaybackFinished(_)));
    assert!(matches!(
        finished,
        Some(RecorderEvent::PlaybackFinished(PlaybackOutcome::Aborted(
            PlaybackAbort::ValidationError(_)
        )))
    ));
    assert_eq!(rig.recorder.state(), SystemState::Idle);

    rig.recorder.start_record().unwrap();
    assert_eq!(rig.recorder.state(), SystemState::Recording);
}
