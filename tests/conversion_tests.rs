//! 端到端转换测试
//!
//! 通过 BatchOrchestrator 转换单个文件，验证输出字节、失败清理、取消和超时。


use audio_test_fixtures::{
    FixtureDir, corrupt_byte, le_bytes, log, read_u16, read_u32, sine_samples, truncate_file,
};
use mac_audio_converter::{
    BatchOptions, BatchOrchestrator, ErrorKind, JobState, Stage, TargetFormat,
};
use std::fs;
use std::path::Path;
use std::time::Duration;

fn failure_of(state: &JobState) -> (Stage, ErrorKind) {
    match state {
        JobState::Failed(failure) => (failure.stage, failure.kind),
        other => panic!("期望失败状态，实际为 {other:?}"),
    }
}

fn no_partial_files(dir: &Path) -> bool {
    fs::read_dir(dir)
        .unwrap()
        .filter_map(Result::ok)
        .all(|entry| entry.path().extension().is_none_or(|ext| ext != "part"))
}

#[test]
fn test_wav_roundtrip_is_byte_identical() {
    let fixtures = FixtureDir::new();
    let (input, samples) = fixtures.sine_wav("tone.wav", 44100, 2, 10_000);
    let out_dir = fixtures.subdir("out");

    let mut orchestrator = BatchOrchestrator::new();
    let submission = orchestrator.add_files([&input]);
    assert_eq!(submission.accepted, vec![0]);

    let options = BatchOptions::default().with_output_dir(&out_dir);
    let report = orchestrator.run(TargetFormat::Wav, &options, |_| {});
    assert!(report.all_succeeded());

    let output = out_dir.join("tone.wav");
    assert_eq!(orchestrator.jobs()[0].output(), Some(output.as_path()));
    assert_eq!(
        orchestrator.jobs()[0].state(),
        &JobState::Completed {
            bytes_written: 44 + 40_000
        }
    );

    let bytes = fs::read(&output).unwrap();
    assert_eq!(&bytes[0..4], b"RIFF");
    assert_eq!(read_u32(&bytes, 4), 36 + 40_000);
    assert_eq!(&bytes[8..16], b"WAVEfmt ");
    assert_eq!(read_u32(&bytes, 16), 16);
    assert_eq!(read_u16(&bytes, 20), 1);
    assert_eq!(read_u16(&bytes, 22), 2);
    assert_eq!(read_u32(&bytes, 24), 44100);
    assert_eq!(read_u32(&bytes, 28), 176_400);
    assert_eq!(read_u16(&bytes, 32), 4);
    assert_eq!(read_u16(&bytes, 34), 16);
    assert_eq!(&bytes[36..40], b"data");
    assert_eq!(read_u32(&bytes, 40), 40_000);
    assert_eq!(&bytes[44..], le_bytes(&samples).as_slice());

    log("WAV往返转换逐字节一致", "WAV round trip is byte identical");
}

#[test]
fn test_output_is_readable_by_hound() {
    let fixtures = FixtureDir::new();
    let (input, samples) = fixtures.sine_wav("mono.wav", 8000, 1, 1234);
    let out_dir = fixtures.subdir("out");

    let mut orchestrator = BatchOrchestrator::new();
    orchestrator.add_files([&input]);
    let report = orchestrator.run(
        TargetFormat::Wav,
        &BatchOptions::default().with_output_dir(&out_dir),
        |_| {},
    );
    assert!(report.all_succeeded());

    let mut reader = hound::WavReader::open(out_dir.join("mono.wav")).unwrap();
    let spec = reader.spec();
    assert_eq!(spec.sample_rate, 8000);
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.bits_per_sample, 16);
    let decoded: Vec<i16> = reader.samples::<i16>().map(Result::unwrap).collect();
    assert_eq!(decoded, samples);

    log("输出可被hound读取", "output parses as a standard WAV");
}

#[test]
fn test_hi_res_source_is_reduced_to_16_bit() {
    let fixtures = FixtureDir::new();
    let input = fixtures.wav_i24("studio.wav", 96000, 2, &[256_000, -256_000, 0, 8_388_607]);
    let out_dir = fixtures.subdir("out");

    let mut orchestrator = BatchOrchestrator::new();
    orchestrator.add_files([&input]);
    orchestrator.run(
        TargetFormat::Wav,
        &BatchOptions::default().with_output_dir(&out_dir),
        |_| {},
    );

    let bytes = fs::read(out_dir.join("studio.wav")).unwrap();
    assert_eq!(read_u32(&bytes, 24), 96000);
    assert_eq!(read_u16(&bytes, 34), 16);
    assert_eq!(&bytes[44..], le_bytes(&[1000, -1000, 0, 32767]).as_slice());

    log("24位源转换为16位输出", "24-bit source written as 16-bit PCM");
}

#[test]
fn test_conversion_is_idempotent() {
    let fixtures = FixtureDir::new();
    let (input, _) = fixtures.sine_wav("again.wav", 22050, 2, 5000);
    let out_dir = fixtures.subdir("out");
    let options = BatchOptions::default().with_output_dir(&out_dir);

    let mut orchestrator = BatchOrchestrator::new();
    orchestrator.add_files([&input]);

    assert!(orchestrator.run(TargetFormat::Wav, &options, |_| {}).all_succeeded());
    let first = fs::read(out_dir.join("again.wav")).unwrap();

    // 第二次运行覆盖上一次的输出
    assert!(orchestrator.run(TargetFormat::Wav, &options, |_| {}).all_succeeded());
    let second = fs::read(out_dir.join("again.wav")).unwrap();

    assert_eq!(first, second);
    log("重复转换结果一致", "repeated conversion yields identical bytes");
}

#[test]
fn test_truncated_input_leaves_no_output() {
    let fixtures = FixtureDir::new();
    let (input, _) = fixtures.sine_wav("broken.wav", 44100, 2, 10_000);
    let out_dir = fixtures.subdir("out");

    let mut orchestrator = BatchOrchestrator::new();
    assert_eq!(orchestrator.add_files([&input]).accepted_count(), 1);

    // 提交之后文件被截断：探测仍然成功，解码阶段失败
    let full_len = fs::metadata(&input).unwrap().len();
    truncate_file(&input, full_len / 2);

    let report = orchestrator.run(
        TargetFormat::Wav,
        &BatchOptions::default().with_output_dir(&out_dir),
        |_| {},
    );

    assert_eq!(report.failed, 1);
    assert_eq!(
        failure_of(orchestrator.jobs()[0].state()),
        (Stage::Decoding, ErrorKind::DecodeError)
    );
    assert!(!out_dir.join("broken.wav").exists());
    assert!(no_partial_files(&out_dir));

    log("截断输入不产生输出文件", "truncated input leaves no output behind");
}

#[test]
fn test_flac_converts_to_identical_pcm() {
    let fixtures = FixtureDir::new();
    let (input, samples) = fixtures.sine_flac("album.flac", 44100, 2, 20_000);
    let out_dir = fixtures.subdir("out");

    let mut orchestrator = BatchOrchestrator::new();
    assert_eq!(orchestrator.add_files([&input]).accepted_count(), 1);

    let report = orchestrator.run(
        TargetFormat::Wav,
        &BatchOptions::default().with_output_dir(&out_dir),
        |_| {},
    );
    assert!(report.all_succeeded());
    assert_eq!(
        orchestrator.jobs()[0].state(),
        &JobState::Completed {
            bytes_written: 44 + 80_000
        }
    );

    let bytes = fs::read(out_dir.join("album.wav")).unwrap();
    assert_eq!(read_u16(&bytes, 22), 2);
    assert_eq!(read_u32(&bytes, 24), 44100);
    assert_eq!(read_u32(&bytes, 40), 80_000);
    assert_eq!(&bytes[44..], le_bytes(&samples).as_slice());

    log("FLAC转换为逐样本一致的WAV", "FLAC converts to sample-identical WAV");
}

#[test]
fn test_damaged_flac_leaves_no_output() {
    let fixtures = FixtureDir::new();
    let samples = sine_samples(44100, 2, 20_000);
    // 未声明总帧数：只能靠帧时间戳发现被跳过的帧
    let (corrupt, image) = fixtures.flac_i16("corrupt.flac", 44100, 2, &samples, false);
    let (cut, _) = fixtures.sine_flac("cut.flac", 44100, 2, 20_000);
    let out_dir = fixtures.subdir("out");

    let mut orchestrator = BatchOrchestrator::new();
    assert_eq!(orchestrator.add_files([&corrupt, &cut]).accepted_count(), 2);

    // 提交之后再损坏：探测成功，解码阶段失败
    let second = image.frame_offsets[1];
    corrupt_byte(&corrupt, second + (image.frame_offsets[2] - second) / 2);
    let full_len = fs::metadata(&cut).unwrap().len();
    truncate_file(&cut, full_len / 2);

    let report = orchestrator.run(
        TargetFormat::Wav,
        &BatchOptions::default().with_output_dir(&out_dir),
        |_| {},
    );

    assert_eq!(report.failed, 2);
    for job in orchestrator.jobs() {
        assert_eq!(failure_of(job.state()), (Stage::Decoding, ErrorKind::DecodeError));
    }
    assert_eq!(fs::read_dir(&out_dir).unwrap().count(), 0);

    log("损坏或截断的FLAC不产生输出", "damaged or truncated FLAC leaves no output");
}

#[test]
fn test_output_equal_to_input_is_write_error() {
    let fixtures = FixtureDir::new();
    let (input, _) = fixtures.sine_wav("in_place.wav", 44100, 1, 100);
    let original = fs::read(&input).unwrap();

    let mut orchestrator = BatchOrchestrator::new();
    orchestrator.add_files([&input]);
    let report = orchestrator.run(TargetFormat::Wav, &BatchOptions::default(), |_| {});

    assert_eq!(report.failed, 1);
    assert_eq!(
        failure_of(orchestrator.jobs()[0].state()),
        (Stage::Writing, ErrorKind::WriteError)
    );
    assert_eq!(fs::read(&input).unwrap(), original);

    log("输出与输入相同时拒绝覆盖", "refuses to overwrite its own input");
}

#[test]
fn test_missing_output_dir_is_write_error() {
    let fixtures = FixtureDir::new();
    let (input, _) = fixtures.sine_wav("tone.wav", 44100, 1, 100);

    let mut orchestrator = BatchOrchestrator::new();
    orchestrator.add_files([&input]);
    let options = BatchOptions::default().with_output_dir(fixtures.join("does/not/exist"));
    orchestrator.run(TargetFormat::Wav, &options, |_| {});

    assert_eq!(
        failure_of(orchestrator.jobs()[0].state()),
        (Stage::Writing, ErrorKind::WriteError)
    );
    log("输出目录不存在时写入失败", "missing output directory fails the write");
}

#[test]
fn test_cancelled_batch_produces_nothing() {
    let fixtures = FixtureDir::new();
    let out_dir = fixtures.subdir("out");
    let inputs: Vec<_> = (0..3)
        .map(|i| fixtures.sine_wav(&format!("t{i}.wav"), 44100, 2, 1000).0)
        .collect();

    let mut orchestrator = BatchOrchestrator::new();
    orchestrator.add_files(&inputs);
    orchestrator.cancel_token().cancel();

    let options = BatchOptions::default().with_output_dir(&out_dir);
    let report = orchestrator.run(TargetFormat::Wav, &options, |_| {});
    assert_eq!(report.failed, 3);
    for job in orchestrator.jobs() {
        assert_eq!(failure_of(job.state()), (Stage::Probing, ErrorKind::Cancelled));
    }
    assert_eq!(fs::read_dir(&out_dir).unwrap().count(), 0);

    // 重置令牌后可以重新运行
    orchestrator.cancel_token().reset();
    assert!(orchestrator.run(TargetFormat::Wav, &options, |_| {}).all_succeeded());

    log("取消后不产生输出，重置后可重跑", "cancel writes nothing; reset allows a rerun");
}

#[test]
fn test_zero_timeout_is_reported_as_timeout() {
    let fixtures = FixtureDir::new();
    let (input, _) = fixtures.sine_wav("slow.wav", 44100, 2, 1000);
    let out_dir = fixtures.subdir("out");

    let mut orchestrator = BatchOrchestrator::new();
    orchestrator.add_files([&input]);
    let options = BatchOptions::default()
        .with_output_dir(&out_dir)
        .with_stage_timeout(Duration::ZERO);
    let report = orchestrator.run(TargetFormat::Wav, &options, |_| {});

    assert_eq!(report.failed, 1);
    assert_eq!(
        failure_of(orchestrator.jobs()[0].state()),
        (Stage::Probing, ErrorKind::TimedOut)
    );
    assert!(report.error_stats.contains_key(&ErrorKind::TimedOut));
    assert!(!out_dir.join("slow.wav").exists());

    log("超时与截断分开报告", "timeouts are reported distinctly");
}

#[test]
fn test_generous_timeout_does_not_interfere() {
    let fixtures = FixtureDir::new();
    let (input, _) = fixtures.sine_wav("quick.wav", 44100, 2, 1000);
    let out_dir = fixtures.subdir("out");

    let mut orchestrator = BatchOrchestrator::new();
    orchestrator.add_files([&input]);
    let options = BatchOptions::default()
        .with_output_dir(&out_dir)
        .with_stage_timeout(Duration::from_secs(60));

    assert!(orchestrator.run(TargetFormat::Wav, &options, |_| {}).all_succeeded());
    log("宽松超时不影响转换", "generous timeout does not interfere");
}
