//! Heuristic hand-gesture classification for hands-free order control.
//!
//! A [`HandFrame`] holds the landmark sequences of one detected hand. Each
//! finger sequence starts at the base joint (index 0) and reaches the
//! fingertip at index 3. Image coordinates are used, so `y` grows downward.

pub mod debounce;
pub mod session;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use debounce::Debouncer;
pub use session::{
    DisplayStrings, EstimateError, GestureListener, GestureSession, GestureStatus,
    HandPoseEstimator, LoadError, SessionOptions,
};

const BASE: usize = 0;
const TIP: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "PointRepr", into = "[f32; 3]")]
pub struct Point {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Point { x, y, z: 0.0 }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PointRepr {
    Planar([f32; 2]),
    Spatial([f32; 3]),
}

impl From<PointRepr> for Point {
    fn from(repr: PointRepr) -> Self {
        match repr {
            PointRepr::Planar([x, y]) => Point { x, y, z: 0.0 },
            PointRepr::Spatial([x, y, z]) => Point { x, y, z },
        }
    }
}

impl From<Point> for [f32; 3] {
    fn from(point: Point) -> Self {
        [point.x, point.y, point.z]
    }
}

/// Landmarks of a single detected hand.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandFrame {
    pub thumb: Vec<Point>,
    pub index_finger: Vec<Point>,
    pub middle_finger: Vec<Point>,
    pub ring_finger: Vec<Point>,
    pub pinky: Vec<Point>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GestureSignal {
    AcceptOrder,
    CancelOrder,
    CompleteOrder,
    PreviousOrder,
    NextOrder,
    OpenHand,
    PointingHand,
    ClosedHand,
    #[serde(rename = "none")]
    NoGesture,
}

impl GestureSignal {
    pub fn as_str(self) -> &'static str {
        match self {
            GestureSignal::AcceptOrder => "acceptOrder",
            GestureSignal::CancelOrder => "cancelOrder",
            GestureSignal::CompleteOrder => "completeOrder",
            GestureSignal::PreviousOrder => "previousOrder",
            GestureSignal::NextOrder => "nextOrder",
            GestureSignal::OpenHand => "openHand",
            GestureSignal::PointingHand => "pointingHand",
            GestureSignal::ClosedHand => "closedHand",
            GestureSignal::NoGesture => "none",
        }
    }

    pub fn is_none(self) -> bool {
        self == GestureSignal::NoGesture
    }
}

impl fmt::Display for GestureSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Pixel distances used by the predicates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureThresholds {
    /// Max thumb/index tip separation on each axis for the OK sign.
    pub pinch_distance: f32,
    /// Horizontal index tip travel past its base that counts as a swipe.
    pub swipe_distance: f32,
    /// Max vertical spread between neighbouring tips for an open hand.
    pub open_hand_spread: f32,
}

impl Default for GestureThresholds {
    fn default() -> Self {
        GestureThresholds {
            pinch_distance: 30.0,
            swipe_distance: 100.0,
            open_hand_spread: 20.0,
        }
    }
}

#[derive(Clone, Copy)]
struct Joints {
    base: Point,
    tip: Point,
}

impl Joints {
    fn of(finger: &[Point]) -> Option<Self> {
        Some(Joints {
            base: *finger.get(BASE)?,
            tip: *finger.get(TIP)?,
        })
    }

    fn raised(self) -> bool {
        self.tip.y < self.base.y
    }

    fn folded(self) -> bool {
        self.tip.y > self.base.y
    }
}

struct Hand {
    thumb: Joints,
    index: Joints,
    middle: Joints,
    ring: Joints,
    pinky: Joints,
}

impl Hand {
    fn of(frame: &HandFrame) -> Option<Self> {
        Some(Hand {
            thumb: Joints::of(&frame.thumb)?,
            index: Joints::of(&frame.index_finger)?,
            middle: Joints::of(&frame.middle_finger)?,
            ring: Joints::of(&frame.ring_finger)?,
            pinky: Joints::of(&frame.pinky)?,
        })
    }

    fn last_three_folded(&self) -> bool {
        self.middle.folded() && self.ring.folded() && self.pinky.folded()
    }

    fn four_folded(&self) -> bool {
        self.index.folded() && self.last_three_folded()
    }
}

type Predicate = fn(&Hand, &GestureThresholds) -> bool;

/// Evaluated in order, the first match wins.
const PREDICATES: [(GestureSignal, Predicate); 8] = [
    (GestureSignal::AcceptOrder, thumbs_up),
    (GestureSignal::CancelOrder, thumbs_down),
    (GestureSignal::CompleteOrder, ok_sign),
    (GestureSignal::PreviousOrder, swipe_left),
    (GestureSignal::NextOrder, swipe_right),
    (GestureSignal::OpenHand, open_hand),
    (GestureSignal::PointingHand, pointing_hand),
    (GestureSignal::ClosedHand, closed_hand),
];

fn thumbs_up(hand: &Hand, _: &GestureThresholds) -> bool {
    hand.thumb.raised() && hand.four_folded()
}

fn thumbs_down(hand: &Hand, _: &GestureThresholds) -> bool {
    hand.thumb.folded() && hand.four_folded()
}

fn ok_sign(hand: &Hand, t: &GestureThresholds) -> bool {
    (hand.thumb.tip.x - hand.index.tip.x).abs() < t.pinch_distance
        && (hand.thumb.tip.y - hand.index.tip.y).abs() < t.pinch_distance
        && hand.middle.raised()
        && hand.ring.raised()
        && hand.pinky.raised()
}

fn swipe_left(hand: &Hand, t: &GestureThresholds) -> bool {
    hand.index.tip.x < hand.index.base.x - t.swipe_distance && hand.last_three_folded()
}

fn swipe_right(hand: &Hand, t: &GestureThresholds) -> bool {
    hand.index.tip.x > hand.index.base.x + t.swipe_distance && hand.last_three_folded()
}

fn open_hand(hand: &Hand, t: &GestureThresholds) -> bool {
    hand.thumb.tip.y < hand.index.tip.y
        && (hand.index.tip.y - hand.middle.tip.y).abs() < t.open_hand_spread
        && (hand.middle.tip.y - hand.ring.tip.y).abs() < t.open_hand_spread
        && (hand.ring.tip.y - hand.pinky.tip.y).abs() < t.open_hand_spread
}

fn pointing_hand(hand: &Hand, _: &GestureThresholds) -> bool {
    hand.index.tip.y < hand.middle.base.y && hand.last_three_folded()
}

fn closed_hand(hand: &Hand, _: &GestureThresholds) -> bool {
    hand.thumb.tip.y > hand.index.base.y && hand.four_folded()
}

/// Raw, undebounced classification of a single prediction.
pub fn classify(frame: Option<&HandFrame>, thresholds: &GestureThresholds) -> GestureSignal {
    let Some(hand) = frame.and_then(Hand::of) else {
        return GestureSignal::NoGesture;
    };

    PREDICATES
        .iter()
        .find(|(_, predicate)| predicate(&hand, thresholds))
        .map_or(GestureSignal::NoGesture, |(signal, _)| *signal)
}
