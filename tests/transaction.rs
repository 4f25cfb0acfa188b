// Integration tests for the transaction engine
mod common;

use common::{ScriptedLink, chunks, open_connection, written_text};
use std::time::Duration;
use tokio::time::Instant;
use yzscan_rs::{Command, Connection, MachineError, RealtimeCommand, TransactionResult, TransactionTiming};

#[tokio::test(start_paused = true)]
async fn test_ok_response_is_classified_ok() {
    let (link, written) = ScriptedLink::new(|_| chunks(&["ok\r\n"]));
    let mut connection = open_connection(link);

    let result = connection.execute(&Command::line("$H")).await.unwrap();
    assert_eq!(result, TransactionResult::Ok("ok".to_string()));
    assert_eq!(written_text(&written), vec!["$H\n".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_token_split_across_chunks() {
    let (link, _) = ScriptedLink::new(|_| chunks(&["o", "K\r\n"]));
    let mut connection = open_connection(link);

    let result = connection.execute(&Command::line("G0 Y1")).await.unwrap();
    assert_eq!(result, TransactionResult::Ok("oK".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_error_response_keeps_firmware_text() {
    let (link, _) = ScriptedLink::new(|_| chunks(&["error:20\r\n"]));
    let mut connection = open_connection(link);

    let result = connection.execute(&Command::line("M3")).await.unwrap();
    assert_eq!(result, TransactionResult::Error("error:20".to_string()));
    assert!(!result.is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_first_arriving_token_wins() {
    let (link, _) = ScriptedLink::new(|_| chunks(&["error:9\r\n", "ok\r\n"]));
    let mut connection = open_connection(link);

    let result = connection.execute(&Command::line("G1 Y5 F100")).await.unwrap();
    assert_eq!(result, TransactionResult::Error("error:9".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_silence_times_out_after_three_seconds() {
    let (link, _) = ScriptedLink::silent();
    let mut connection = open_connection(link);

    let start = Instant::now();
    let result = connection.execute(&Command::line("$HY")).await.unwrap();
    let elapsed = start.elapsed();

    assert_eq!(result, TransactionResult::Timeout(String::new()));
    assert!(elapsed >= Duration::from_secs(3), "returned early: {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(3100), "returned late: {:?}", elapsed);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_retains_partial_text() {
    let (link, _) = ScriptedLink::new(|_| chunks(&["[MSG:Caution: Unlocked]\r\n"]));
    let mut connection = open_connection(link);

    let result = connection.execute(&Command::line("$X")).await.unwrap();
    assert_eq!(result, TransactionResult::Timeout("[MSG:Caution: Unlocked]".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_soft_reset_completes_on_banner() {
    let (link, written) = ScriptedLink::new(|_| chunks(&["\r\nGrblHAL 1.1f ", "['$' or '$HELP' for help]\r\n"]));
    let mut connection = open_connection(link);

    let start = Instant::now();
    let result = connection
        .execute(&Command::Realtime(RealtimeCommand::SoftReset))
        .await
        .unwrap();
    assert!(start.elapsed() < Duration::from_millis(100));
    assert_eq!(
        result,
        TransactionResult::Ok("GrblHAL 1.1f ['$' or '$HELP' for help]".to_string())
    );
    assert_eq!(written.lock().unwrap()[0], vec![0x18]);
}

#[tokio::test(start_paused = true)]
async fn test_status_query_completes_on_frame() {
    let (link, written) = ScriptedLink::new(|_| chunks(&["<Idle|MPos:0.000,", "1.000,2.000|FS:0,0>\r\n"]));
    let mut connection = open_connection(link);

    let start = Instant::now();
    let result = connection.execute(&Command::status_query()).await.unwrap();
    assert!(start.elapsed() < Duration::from_millis(100));
    assert_eq!(
        result,
        TransactionResult::Ok("<Idle|MPos:0.000,1.000,2.000|FS:0,0>".to_string())
    );
    assert_eq!(written.lock().unwrap()[0], vec![b'?']);
}

#[tokio::test(start_paused = true)]
async fn test_closed_connection_refuses_to_transmit() {
    let (link, written) = ScriptedLink::new(|_| chunks(&["ok\r\n"]));
    let mut connection = open_connection(link);
    assert!(connection.close());
    assert!(!connection.close());
    assert!(!connection.is_open());

    let result = connection.execute(&Command::line("$H")).await;
    assert!(matches!(result, Err(MachineError::NotConnected)));
    assert!(written.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_never_opened_connection_is_not_connected() {
    let mut connection: Connection<ScriptedLink> =
        Connection::new("none", 115200, 1000.0, TransactionTiming::default());
    let result = connection.execute(&Command::status_query()).await;
    assert!(matches!(result, Err(MachineError::NotConnected)));
}

#[tokio::test(start_paused = true)]
async fn test_statistics_track_outcomes() {
    let mut replies = vec![chunks(&["ok\r\n"]), chunks(&["error:1\r\n"]), vec![]].into_iter();
    let (link, _) = ScriptedLink::new(move |_| replies.next().unwrap_or_default());
    let mut connection = open_connection(link);

    connection.execute(&Command::line("G0 Y1")).await.unwrap();
    connection.execute(&Command::line("G0 Y")).await.unwrap();
    connection.execute(&Command::line("G0 Y2")).await.unwrap();

    let stats = connection.stats();
    assert_eq!(stats.commands_sent, 3);
    assert_eq!((stats.ok, stats.errors, stats.timeouts), (1, 1, 1));
    assert_eq!(stats.bytes_sent, 6 + 5 + 6);
}

#[tokio::test(start_paused = true)]
async fn test_custom_timing_is_honoured() {
    let (link, _) = ScriptedLink::silent();
    let mut connection = Connection::new(
        "test",
        115200,
        1000.0,
        TransactionTiming {
            timeout: Duration::from_millis(500),
            poll_interval: Duration::from_millis(50),
        },
    );
    connection.attach(link);

    let start = Instant::now();
    let result = connection.execute(&Command::line("$H")).await.unwrap();
    let elapsed = start.elapsed();
    assert!(matches!(result, TransactionResult::Timeout(_)));
    assert!(elapsed >= Duration::from_millis(500) && elapsed < Duration::from_millis(550));
}

#[tokio::test(start_paused = true)]
async fn test_feed_hold_silence_is_acceptance() {
    let (link, written) = ScriptedLink::silent();
    let mut connection = open_connection(link);

    let start = Instant::now();
    let result = connection.execute(&Command::Realtime(RealtimeCommand::FeedHold)).await.unwrap();
    let elapsed = start.elapsed();
    assert_eq!(result, TransactionResult::Ok(String::new()));
    assert!(elapsed <= Duration::from_millis(150), "waited {:?}", elapsed);
    assert_eq!(written.lock().unwrap()[0], vec![b'!']);
    assert_eq!(connection.stats().timeouts, 0);
}

#[tokio::test(start_paused = true)]
async fn test_cycle_start_still_reports_an_error_reply() {
    let (link, _) = ScriptedLink::new(|_| chunks(&["error:9\r\n"]));
    let mut connection = open_connection(link);

    let result = connection.execute(&Command::Realtime(RealtimeCommand::CycleStart)).await.unwrap();
    assert_eq!(result, TransactionResult::Error("error:9".to_string()));
}
