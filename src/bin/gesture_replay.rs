//! Replays recorded hand-landmark predictions through the gesture pipeline
//! and drives a sample order board with the committed gestures.
//!
//! Input is JSON lines: one `HandFrame` object per poll, or `null` for a
//! poll where no hand was detected.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use clap::Parser;
use eco_relay::gesture::{
    EstimateError, GestureListener, GestureSession, GestureSignal, HandFrame, HandPoseEstimator,
    SessionOptions,
};
use eco_relay::orders::{OrderBoard, OrderItem};
use log::{error, info};

#[derive(Parser, Debug)]
#[command(about = "Replay hand-pose predictions through the gesture classifier")]
struct Args {
    /// JSON-lines file with one prediction per poll, stdin when omitted
    input: Option<PathBuf>,

    /// Poll interval in milliseconds
    #[arg(long, default_value_t = 100)]
    interval_ms: u64,

    /// Settle window in milliseconds
    #[arg(long, default_value_t = 500)]
    settle_ms: u64,
}

struct Replay {
    frames: VecDeque<Result<Option<HandFrame>, EstimateError>>,
}

#[async_trait]
impl HandPoseEstimator for Replay {
    async fn estimate(&mut self) -> Result<Option<HandFrame>, EstimateError> {
        self.frames.pop_front().unwrap_or(Err(EstimateError::NoFrame))
    }
}

struct Console {
    board: OrderBoard,
}

impl GestureListener for Console {
    fn on_gesture_detected(&mut self, signal: GestureSignal) {
        let action = self.board.apply(signal);
        println!("{signal:<14} {action:?}");
    }
}

fn read_frames(reader: impl BufRead) -> io::Result<VecDeque<Result<Option<HandFrame>, EstimateError>>> {
    let mut frames = VecDeque::new();
    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let frame = serde_json::from_str::<Option<HandFrame>>(&line)
            .map_err(|e| EstimateError::Inference(format!("line {}: {e}", number + 1)));
        frames.push_back(frame);
    }
    Ok(frames)
}

fn sample_board() -> OrderBoard {
    let mut board = OrderBoard::new();
    board.add_order(
        "green-grocer",
        vec![OrderItem {
            id: "1".to_string(),
            name: "Organic Apples".to_string(),
            quantity: 5,
        }],
    );
    board.add_order(
        "eco-home",
        vec![OrderItem {
            id: "2".to_string(),
            name: "Bamboo Toothbrush".to_string(),
            quantity: 2,
        }],
    );
    board.add_order(
        "zero-waste",
        vec![OrderItem {
            id: "3".to_string(),
            name: "Reusable Produce Bags".to_string(),
            quantity: 3,
        }],
    );
    board
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let frames = match &args.input {
        Some(path) => File::open(path).and_then(|file| read_frames(BufReader::new(file))),
        None => read_frames(io::stdin().lock()),
    };
    let frames = match frames {
        Ok(frames) => frames,
        Err(e) => {
            error!("Failed to read predictions: {e}");
            std::process::exit(1);
        }
    };
    let polls = frames.len();
    info!("Replaying {polls} predictions");

    let options = SessionOptions {
        poll_interval: Duration::from_millis(args.interval_ms),
        settle: Duration::from_millis(args.settle_ms),
        ..SessionOptions::default()
    };
    let mut session = GestureSession::new(
        Replay { frames },
        Console {
            board: sample_board(),
        },
        options,
    );
    session.initialize().await;

    for _ in 0..polls {
        session.tick().await;
        tokio::time::sleep(options.poll_interval).await;
        session.flush();
    }
    tokio::time::sleep(options.settle).await;
    session.flush();

    let (_, console) = session.into_parts();
    for order in console.board.orders() {
        println!("{} {:<10} {:?}", order.id, order.vendor_id, order.status);
    }
}
