use log::{debug, info};
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};

use crate::gesture::{GestureListener, GestureSignal};

const ORDER_ID_LEN: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Accepted,
    Cancelled,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: String,
    pub name: String,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub status: OrderStatus,
    pub vendor_id: String,
    pub items: Vec<OrderItem>,
}

/// What a gesture did to the board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardAction {
    StatusChanged { order_id: String, status: OrderStatus },
    Moved { index: usize },
    Ignored,
}

/// Order list navigated and updated by committed gestures.
#[derive(Debug, Default)]
pub struct OrderBoard {
    orders: Vec<Order>,
    active: Option<usize>,
    history: Vec<BoardAction>,
}

impl OrderBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_order(&mut self, vendor_id: impl Into<String>, items: Vec<OrderItem>) -> &Order {
        let id: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(ORDER_ID_LEN)
            .map(|b| char::from(b).to_ascii_lowercase())
            .collect();

        self.orders.push(Order {
            id,
            status: OrderStatus::Pending,
            vendor_id: vendor_id.into(),
            items,
        });
        if self.active.is_none() {
            self.active = Some(0);
        }
        &self.orders[self.orders.len() - 1]
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn active(&self) -> Option<&Order> {
        self.active.and_then(|index| self.orders.get(index))
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active
    }

    /// Actions performed so far, including ignored signals.
    pub fn history(&self) -> &[BoardAction] {
        &self.history
    }

    pub fn update_status(&mut self, order_id: &str, status: OrderStatus) -> bool {
        match self.orders.iter_mut().find(|order| order.id == order_id) {
            Some(order) => {
                info!("Order {order_id} is now {status:?}");
                order.status = status;
                true
            }
            None => false,
        }
    }

    pub fn apply(&mut self, signal: GestureSignal) -> BoardAction {
        let action = self.perform(signal);
        debug!("Gesture {signal} -> {action:?}");
        self.history.push(action.clone());
        action
    }

    fn perform(&mut self, signal: GestureSignal) -> BoardAction {
        let Some(index) = self.active else {
            return BoardAction::Ignored;
        };

        let status = match signal {
            GestureSignal::AcceptOrder => OrderStatus::Accepted,
            GestureSignal::CancelOrder => OrderStatus::Cancelled,
            GestureSignal::CompleteOrder => OrderStatus::Completed,
            GestureSignal::PreviousOrder if index > 0 => {
                self.active = Some(index - 1);
                return BoardAction::Moved { index: index - 1 };
            }
            GestureSignal::NextOrder if index + 1 < self.orders.len() => {
                self.active = Some(index + 1);
                return BoardAction::Moved { index: index + 1 };
            }
            _ => return BoardAction::Ignored,
        };

        let order_id = self.orders[index].id.clone();
        self.update_status(&order_id, status);
        BoardAction::StatusChanged { order_id, status }
    }
}

impl GestureListener for OrderBoard {
    fn on_gesture_detected(&mut self, signal: GestureSignal) {
        self.apply(signal);
    }
}
