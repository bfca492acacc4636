mod common;
use common::*;

use sftp_sliding_upload::*;

use std::io::Write;
use std::time::Duration;

use tokio::time::sleep;
use upload_test_common::{gen_content, large_content, ReadStep, ScriptedReader};

use pretty_assertions::assert_eq;

#[tokio::test]
async fn total_equals_source_length() {
    for len in [1, 100, 4095, 4096, 4097, 50_000] {
        let content = gen_content(len, len as u64);
        let mut sink = MockSink::new().fallback(Step::Accept(1000));

        let summary = upload(
            ScriptedReader::new(content.clone(), 3000),
            &mut sink,
            options(4096),
        )
        .await
        .unwrap();

        assert_eq!(summary.transferred, len as u64);
        assert_eq!(&sink.received[..], &content[..]);
    }
}

#[tokio::test]
/// Random mixes of partial acceptance, would-block and zero acceptance
/// must never drop nor reorder a byte.
async fn arbitrary_responses_preserve_order() {
    const CAPACITY: usize = 8192;

    for seed in 1..=8u64 {
        let content = gen_content(100_000, seed);

        let mut state = seed;
        let mut next = move || {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            state
        };

        let script: Vec<_> = (0..2000)
            .map(|_| match next() % 4 {
                0 => Step::WouldBlock,
                1 => Step::Zero,
                _ => Step::Accept((next() % (CAPACITY as u64 + 1)) as usize),
            })
            .collect();

        let reads: Vec<_> = (0..200)
            .map(|_| ReadStep::Chunk((next() % 5000) as usize + 1))
            .collect();

        let mut sink = MockSink::new().script(script);

        let summary = upload(
            ScriptedReader::new(content.clone(), 5000).script(reads),
            &mut sink,
            options(CAPACITY).zero_write_budget(1000),
        )
        .await
        .unwrap();

        assert_eq!(summary.transferred, content.len() as u64);
        assert_eq!(&sink.received[..], &content[..]);

        // Nothing beyond the buffer capacity is ever buffered.
        assert!(sink.offered.iter().all(|len| *len > 0 && *len <= CAPACITY));
        assert_eq!(summary.write_calls, sink.write_calls as u64);
        assert_eq!(summary.suspensions, sink.ready_polls.len() as u64);
    }
}

#[tokio::test]
async fn would_block_n_times_suspends_n_times() {
    const N: usize = 5;

    let content = gen_content(10_000, 7);
    let mut sink = MockSink::new().script([Step::WouldBlock; N]);

    let summary = upload(
        ScriptedReader::new(content.clone(), usize::MAX),
        &mut sink,
        options(16_384),
    )
    .await
    .unwrap();

    assert_eq!(summary.suspensions, N as u64);
    assert_eq!(sink.ready_polls.len(), N);
    assert_eq!(summary.wait_timeouts, 0);
    assert_eq!(summary.write_calls, N as u64 + 1);

    // Every retry offers the very same bytes.
    assert_eq!(sink.offered, vec![10_000; N + 1]);
    assert_eq!(&sink.received[..], &content[..]);
}

#[tokio::test]
async fn waits_in_the_reported_direction() {
    let mut sink = MockSink::new()
        .directions(BlockDirections::Inbound)
        .script([Step::WouldBlock, Step::WouldBlock]);

    upload(
        ScriptedReader::new(gen_content(10, 1), 10),
        &mut sink,
        options(64),
    )
    .await
    .unwrap();

    assert_eq!(sink.ready_polls, vec![BlockDirections::Inbound; 2]);
}

#[tokio::test]
async fn would_block_without_direction_waits_for_both() {
    let content = gen_content(10, 2);
    let mut sink = MockSink::new()
        .directions(BlockDirections::None)
        .script([Step::WouldBlock, Step::WouldBlock, Step::WouldBlock]);

    let summary = upload(ScriptedReader::new(content.clone(), 10), &mut sink, options(64))
        .await
        .unwrap();

    assert_eq!(summary.suspensions, 3);
    assert_eq!(sink.ready_polls, vec![BlockDirections::Both; 3]);
    assert_eq!(&sink.received[..], &content[..]);
}

#[tokio::test]
async fn fatal_error_reports_accepted_bytes() {
    let content = gen_content(1000, 3);
    let mut sink = MockSink::new().script([
        Step::Accept(300),
        Step::WouldBlock,
        Step::Accept(200),
        Step::Fail,
    ]);

    let err = upload(
        ScriptedReader::new(content.clone(), usize::MAX),
        &mut sink,
        options(4096),
    )
    .await
    .unwrap_err();

    assert_eq!(err.transferred(), Some(500));

    let incomplete = into_incomplete(err);
    assert_eq!(incomplete.transferred, 500);
    assert_eq!(incomplete.unsent, 500);
    assert!(matches!(incomplete.error, Error::IOError(_)));

    assert_eq!(&sink.received[..], &content[..500]);
}

#[tokio::test]
/// 2,500,000 bytes through a 1,024,000 bytes buffer into a sink taking
/// exactly 500,000 bytes per call.
async fn large_transfer_in_fixed_chunks() {
    let content = large_content();
    let mut sink = MockSink::new().fallback(Step::Accept(500_000));

    let mut upload = SlidingUpload::new(UploadOptions::new());

    let summary = upload
        .run(ScriptedReader::new(content.clone(), usize::MAX), &mut sink)
        .await
        .unwrap();

    assert_eq!(summary.transferred, 2_500_000);
    assert_eq!(summary.write_calls, 5);
    assert_eq!(summary.suspensions, 0);
    assert_eq!(sink.received.len(), content.len());
    assert!(sink.received[..] == content[..]);

    assert_eq!(
        sink.offered,
        vec![1_024_000, 1_024_000, 1_024_000, 1_000_000, 500_000]
    );

    let buffer = upload.into_buffer();
    assert_eq!(buffer.capacity(), 1_024_000);
    assert_eq!(buffer.used(), 0);
}

#[tokio::test]
async fn empty_source_issues_no_write() {
    let mut sink = MockSink::new();

    let summary = upload(
        ScriptedReader::new(Default::default(), 100),
        &mut sink,
        options(100),
    )
    .await
    .unwrap();

    assert_eq!(summary.transferred, 0);
    assert_eq!(summary.write_calls, 0);
    assert_eq!(sink.write_calls, 0);
}

#[tokio::test]
async fn zero_acceptance_exhausts_budget() {
    let mut sink = MockSink::new().fallback(Step::Zero);

    let err = upload(
        ScriptedReader::new(gen_content(100, 2), 100),
        &mut sink,
        options(100).zero_write_budget(3),
    )
    .await
    .unwrap_err();

    let incomplete = into_incomplete(err);
    assert!(matches!(
        incomplete.error,
        Error::SinkStalled { attempts: 4 }
    ));
    assert_eq!(incomplete.transferred, 0);
    assert_eq!(incomplete.unsent, 100);
    assert_eq!(sink.write_calls, 4);
}

#[tokio::test]
async fn would_block_resets_zero_budget() {
    let mut sink = MockSink::new().script([
        Step::Zero,
        Step::Zero,
        Step::WouldBlock,
        Step::Zero,
        Step::Zero,
        Step::AcceptAll,
    ]);

    let summary = upload(
        ScriptedReader::new(gen_content(100, 2), 100),
        &mut sink,
        options(100).zero_write_budget(2),
    )
    .await
    .unwrap();

    assert_eq!(summary.transferred, 100);
}

#[tokio::test]
async fn over_acceptance_is_fatal() {
    let mut sink = MockSink::new().script([Step::OverAccept]);

    let err = upload(
        ScriptedReader::new(gen_content(10, 2), 10),
        &mut sink,
        options(100),
    )
    .await
    .unwrap_err();

    assert!(matches!(
        into_incomplete(err).error,
        Error::SinkOverAccepted {
            accepted: 11,
            offered: 10
        }
    ));
}

#[tokio::test]
async fn cancelled_before_start() {
    let mut sink = MockSink::new();
    let mut upload = SlidingUpload::new(options(100));

    upload.cancellation_token().cancel();

    let err = upload
        .run(ScriptedReader::new(gen_content(10, 2), 10), &mut sink)
        .await
        .unwrap_err();

    assert!(matches!(into_incomplete(err).error, Error::Cancelled));
    assert_eq!(sink.write_calls, 0);
}

#[tokio::test]
async fn cancelled_while_waiting() {
    let mut sink = MockSink::new()
        .fallback(Step::WouldBlock)
        .never_ready();

    let cancel_token = CancellationToken::new();
    let mut upload = SlidingUpload::new(options(100)).with_cancellation_token(cancel_token.clone());

    tokio::spawn(async move {
        sleep(Duration::from_millis(20)).await;
        cancel_token.cancel();
    });

    let err = upload
        .run(ScriptedReader::new(gen_content(10, 2), 10), &mut sink)
        .await
        .unwrap_err();

    let incomplete = into_incomplete(err);
    assert!(matches!(incomplete.error, Error::Cancelled));
    assert_eq!(incomplete.unsent, 10);
    assert_eq!(sink.write_calls, 1);
}

#[tokio::test]
async fn deadline_stops_a_stuck_sink() {
    let mut sink = MockSink::new()
        .fallback(Step::WouldBlock)
        .never_ready();

    let err = upload(
        ScriptedReader::new(gen_content(10, 2), 10),
        &mut sink,
        options(100)
            .readiness_timeout(Duration::from_secs(3600))
            .deadline(Duration::from_millis(50)),
    )
    .await
    .unwrap_err();

    assert!(matches!(
        into_incomplete(err).error,
        Error::DeadlineExceeded(deadline) if deadline == Duration::from_millis(50)
    ));
}

#[tokio::test]
async fn readiness_timeout_retries_the_write() {
    let content = gen_content(10, 2);
    let mut sink = MockSink::new()
        .script([Step::WouldBlock, Step::WouldBlock])
        .never_ready();

    let summary = upload(
        ScriptedReader::new(content.clone(), 10),
        &mut sink,
        options(100).readiness_timeout(Duration::from_millis(10)),
    )
    .await
    .unwrap();

    assert_eq!(summary.suspensions, 2);
    assert_eq!(summary.wait_timeouts, 2);
    assert_eq!(&sink.received[..], &content[..]);
}

#[tokio::test]
async fn transient_source_errors_are_retried() {
    let content = gen_content(64, 9);
    let mut sink = MockSink::new();

    let source = ScriptedReader::new(content.clone(), 16).script([
        ReadStep::Interrupted,
        ReadStep::Pending,
        ReadStep::Chunk(10),
        ReadStep::WouldBlock,
    ]);

    let summary = upload(source, &mut sink, options(32)).await.unwrap();

    assert_eq!(summary.transferred, 64);
    assert_eq!(&sink.received[..], &content[..]);
}

#[tokio::test]
async fn source_failure_is_fatal() {
    let mut sink = MockSink::new();

    let source = ScriptedReader::new(gen_content(64, 9), 16).script([
        ReadStep::Chunk(16),
        ReadStep::Fail,
    ]);

    let incomplete = into_incomplete(upload(source, &mut sink, options(16)).await.unwrap_err());

    assert!(matches!(incomplete.error, Error::IOError(_)));
    assert_eq!(incomplete.transferred, 16);
    assert_eq!(incomplete.unsent, 0);
}

#[tokio::test]
async fn upload_local_file() {
    let content = gen_content(300_000, 11);

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&content).unwrap();
    file.flush().unwrap();

    let source = tokio::fs::File::open(file.path()).await.unwrap();
    let mut sink = MockSink::new().script([
        Step::Accept(12_345),
        Step::WouldBlock,
        Step::Accept(1),
    ]);

    let summary = upload(source, &mut sink, options(65_536)).await.unwrap();

    assert_eq!(summary.transferred, 300_000);
    assert_eq!(&sink.received[..], &content[..]);
}

#[tokio::test]
async fn buffer_is_reusable() {
    let mut upload = SlidingUpload::new(options(1000));

    for seed in 1..=3 {
        let content = gen_content(5000, seed);
        let mut sink = MockSink::new().fallback(Step::Accept(333));

        let summary = upload
            .run(ScriptedReader::new(content.clone(), 777), &mut sink)
            .await
            .unwrap();

        assert_eq!(summary.transferred, 5000);
        assert_eq!(&sink.received[..], &content[..]);
    }

    // A failed transfer must not leak bytes into the next one.
    let mut sink = MockSink::new().script([Step::Fail]);
    upload
        .run(ScriptedReader::new(gen_content(10, 4), 10), &mut sink)
        .await
        .unwrap_err();

    let content = gen_content(10, 5);
    let mut sink = MockSink::new();
    upload
        .run(ScriptedReader::new(content.clone(), 10), &mut sink)
        .await
        .unwrap();

    assert_eq!(&sink.received[..], &content[..]);
}

#[test]
fn summary_report() {
    let summary = TransferSummary {
        transferred: 2_500_000,
        elapsed: Duration::from_secs(2),
        ..Default::default()
    };

    assert_eq!(
        summary.to_string(),
        "2500000 bytes in 2.0 seconds makes 1250000.0 bytes/sec"
    );
}
