//! Integration tests for the `REQ` / `OK` session handshake.
//!
//! The well-behaved cases run both real endpoints over a duplex pipe.  The
//! misbehaving-peer cases script one side by hand through a `FrameLink`.

use tokio::io::{duplex, DuplexStream};

use arq_over_tcp::error::HandshakeError;
use arq_over_tcp::link::FrameLink;
use arq_over_tcp::{ArqError, ArqReceiver, ArqSender, FaultPlan, Mode, SenderOptions};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn options(mode: Mode, min_len: u16, max_len: u16) -> SenderOptions {
    SenderOptions {
        mode,
        min_len,
        max_len,
        ..SenderOptions::default()
    }
}

/// Run the real sender against a scripted receiver that answers `reply`.
async fn sender_against(reply: &str, mode: Mode) -> (Result<ArqSender<DuplexStream>, ArqError>, String) {
    let (a, b) = duplex(1024);
    let mut peer = FrameLink::new(b);

    let (sender, request) = tokio::join!(ArqSender::connect(a, options(mode, 30, 50)), async {
        let request = peer.read_line(128).await.unwrap();
        peer.send_line(reply).await.unwrap();
        request
    });
    (sender, request)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

/// Both sides agree on mode, length range and the receiver's window.
#[tokio::test]
async fn both_sides_agree_on_session() {
    for mode in [Mode::GoBackN, Mode::SelectiveRepeat] {
        let (a, b) = duplex(1024);
        let (tx, rx) = tokio::join!(
            ArqSender::connect(a, options(mode, 35, 45)),
            ArqReceiver::accept(b, 3, FaultPlan::default())
        );
        let (tx, rx) = (tx.unwrap(), rx.unwrap());

        assert_eq!(tx.config(), rx.config());
        assert_eq!(tx.config().mode, mode);
        assert_eq!(tx.config().window_size, 3);
        assert_eq!((tx.config().min_len, tx.config().max_len), (35, 45));
    }
}

/// The receiver clamps its advertised window into 1..=5.
#[tokio::test]
async fn advertised_window_is_clamped() {
    for (asked, confirmed) in [(0u8, 1u8), (9, 5)] {
        let (a, b) = duplex(1024);
        let (tx, _rx) = tokio::join!(
            ArqSender::connect(a, SenderOptions::default()),
            ArqReceiver::accept(b, asked, FaultPlan::default())
        );
        assert_eq!(tx.unwrap().config().window_size, confirmed);
    }
}

/// The sender's request line is exactly what goes on the wire.
#[tokio::test]
async fn request_line_format() {
    let (sender, request) = sender_against("OK:SR:30-50:W2:M0", Mode::SelectiveRepeat).await;
    assert_eq!(request, "REQ:SR:30-50");
    let sender = sender.unwrap();
    assert_eq!(sender.config().window_size, 2);
}

/// A receiver that confirms a different mode is refused.
#[tokio::test]
async fn confirmed_mode_mismatch_is_an_error() {
    let (sender, _) = sender_against("OK:GBN:30-50:W5:M1", Mode::SelectiveRepeat).await;
    match sender {
        Err(ArqError::Handshake(HandshakeError::ModeMismatch {
            requested,
            confirmed,
        })) => {
            assert_eq!(requested, Mode::SelectiveRepeat);
            assert_eq!(confirmed, Mode::GoBackN);
        }
        other => panic!("expected mode mismatch, got {other:?}"),
    }
}

#[tokio::test]
async fn unparseable_confirmation_is_an_error() {
    for reply in ["HELLO", "OK:GBN:30-50", "OK:GBN:30-50:W5:M0"] {
        let (sender, _) = sender_against(reply, Mode::GoBackN).await;
        assert!(
            matches!(sender, Err(ArqError::Handshake(HandshakeError::Malformed(_)))),
            "{reply}"
        );
    }
}

/// An unknown requested mode falls back to GBN on the receiver.
#[tokio::test]
async fn unknown_requested_mode_defaults_to_gbn() {
    let (a, b) = duplex(1024);
    let mut peer = FrameLink::new(a);

    let (rx, reply) = tokio::join!(ArqReceiver::accept(b, 4, FaultPlan::default()), async {
        peer.send_line("REQ:STOPWAIT:30-50").await.unwrap();
        peer.read_line(128).await.unwrap()
    });
    assert_eq!(reply, "OK:GBN:30-50:W4:M1");
    assert_eq!(rx.unwrap().config().mode, Mode::GoBackN);
}

/// A maximum beyond the two-digit length prefix is capped.
#[tokio::test]
async fn oversized_length_range_is_capped() {
    let (a, b) = duplex(1024);
    let mut peer = FrameLink::new(a);

    let (rx, reply) = tokio::join!(ArqReceiver::accept(b, 5, FaultPlan::default()), async {
        peer.send_line("REQ:SR:10-120").await.unwrap();
        peer.read_line(128).await.unwrap()
    });
    assert_eq!(reply, "OK:SR:10-99:W5:M0");
    assert_eq!(rx.unwrap().config().max_len, 99);
}

/// Zero-length messages cannot be framed, so the minimum is raised to 1.
#[tokio::test]
async fn zero_minimum_length_is_raised_to_one() {
    let (a, b) = duplex(1024);
    let mut peer = FrameLink::new(a);

    let (rx, reply) = tokio::join!(ArqReceiver::accept(b, 5, FaultPlan::default()), async {
        peer.send_line("REQ:GBN:0-50").await.unwrap();
        peer.read_line(128).await.unwrap()
    });
    assert_eq!(reply, "OK:GBN:1-50:W5:M1");
    assert_eq!(rx.unwrap().config().min_len, 1);
}

#[tokio::test]
async fn malformed_request_is_rejected() {
    let (a, b) = duplex(1024);
    let mut peer = FrameLink::new(a);

    let (rx, _) = tokio::join!(ArqReceiver::accept(b, 5, FaultPlan::default()), async {
        peer.send_line("REQ:GBN:thirty-fifty").await.unwrap();
    });
    assert!(matches!(
        rx,
        Err(ArqError::Handshake(HandshakeError::Malformed(_)))
    ));
}

/// A peer that hangs up before confirming surfaces as a closed transport.
#[tokio::test]
async fn peer_hangup_during_handshake() {
    let (a, b) = duplex(1024);
    drop(b);
    assert!(matches!(
        ArqSender::connect(a, SenderOptions::default()).await,
        Err(ArqError::TransportClosed)
    ));
}
