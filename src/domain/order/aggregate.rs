use crate::events::Aggregate;

use super::commands::OrderCommand;
use super::errors::OrderError;
use super::events::*;
use super::value_objects::{Order, OrderItem, OrderStatus, PaymentStatus};

// ============================================================================
// Order Aggregate - Domain Logic
// ============================================================================
//
// Wraps the current order row and its items. Commands are checked against
// the status and payment graphs; applying the resulting events is the only
// way the wrapped order changes. Stock side effects are left to the caller.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct OrderAggregate {
    order: Order,
    items: Vec<OrderItem>,
}

impl OrderAggregate {
    pub fn new(order: Order, items: Vec<OrderItem>) -> Self {
        Self { order, items }
    }

    pub fn order(&self) -> &Order {
        &self.order
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn into_parts(self) -> (Order, Vec<OrderItem>) {
        (self.order, self.items)
    }

    /// Ascending product id, the same order checkout locks products in.
    fn stock_lines(&self) -> Vec<StockLine> {
        let mut lines: Vec<StockLine> = self
            .items
            .iter()
            .map(|item| StockLine {
                product_id: item.product_id,
                quantity: item.quantity,
            })
            .collect();
        lines.sort_by_key(|line| line.product_id);
        lines
    }

    fn change_status(
        &self,
        to: OrderStatus,
        tracking_number: Option<&String>,
        at: chrono::DateTime<chrono::Utc>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        let from = self.order.status;
        if !from.can_transition_to(to) {
            return Err(OrderError::IllegalTransition { from, to });
        }

        let mut events = vec![OrderEvent::StatusChanged(OrderStatusChanged {
            from,
            to,
            tracking_number: tracking_number.filter(|_| to == OrderStatus::Shipped).cloned(),
            changed_at: at,
        })];

        // Stock was taken at checkout, so every cancellable state holds it.
        if to == OrderStatus::Cancelled {
            events.push(OrderEvent::StockRestored(StockRestored {
                lines: self.stock_lines(),
            }));
        }

        Ok(events)
    }

    fn change_payment(
        &self,
        to: PaymentStatus,
        at: chrono::DateTime<chrono::Utc>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        let from = self.order.payment_status;
        let is_refund = from == PaymentStatus::Paid && to == PaymentStatus::Refunded;
        if self.order.status == OrderStatus::Cancelled && !is_refund {
            return Err(OrderError::PaymentOnCancelledOrder(self.order.id));
        }
        if !from.can_transition_to(to) {
            return Err(OrderError::IllegalPaymentTransition { from, to });
        }

        Ok(vec![OrderEvent::PaymentStatusChanged(PaymentStatusChanged {
            from,
            to,
            changed_at: at,
        })])
    }
}

// ============================================================================
// Aggregate Trait Implementation
// ============================================================================

impl Aggregate for OrderAggregate {
    type Event = OrderEvent;
    type Command = OrderCommand;
    type Error = OrderError;

    fn handle_command(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            OrderCommand::ChangeStatus {
                to,
                tracking_number,
                at,
            } => self.change_status(*to, tracking_number.as_ref(), *at),
            OrderCommand::ChangePaymentStatus { to, at } => self.change_payment(*to, *at),
        }
    }

    fn apply_event(&mut self, event: &Self::Event) -> Result<(), Self::Error> {
        match event {
            // The row is written by checkout; placement only advances the version.
            OrderEvent::Placed(_) => {}
            OrderEvent::StatusChanged(e) => {
                if self.order.status != e.from {
                    return Err(OrderError::IllegalTransition {
                        from: self.order.status,
                        to: e.to,
                    });
                }
                self.order.status = e.to;
                self.order.updated_at = e.changed_at;
                match e.to {
                    OrderStatus::Shipped => {
                        self.order.shipped_at.get_or_insert(e.changed_at);
                        if let Some(tracking) = &e.tracking_number {
                            self.order.tracking_number = Some(tracking.clone());
                        }
                    }
                    OrderStatus::Delivered => self.order.delivered_at = Some(e.changed_at),
                    _ => {}
                }
            }
            OrderEvent::PaymentStatusChanged(e) => {
                if self.order.payment_status != e.from {
                    return Err(OrderError::IllegalPaymentTransition {
                        from: self.order.payment_status,
                        to: e.to,
                    });
                }
                self.order.payment_status = e.to;
                self.order.updated_at = e.changed_at;
            }
            OrderEvent::StockRestored(_) => {}
        }

        self.order.version += 1;
        Ok(())
    }

    fn aggregate_id(&self) -> i64 {
        self.order.id.as_i64()
    }

    fn version(&self) -> i64 {
        self.order.version
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::{AddressId, OrderId, OrderItemId, ProductId, UserId};
    use crate::domain::order::{
        NewOrder, NewOrderItem, OrderTotals, PaymentMethod, ProductSnapshot,
    };
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    fn aggregate_in(status: OrderStatus) -> OrderAggregate {
        let mut order = NewOrder {
            order_number: "ORD-20240301-000000000001".to_string(),
            user_id: UserId::new(1),
            totals: OrderTotals::compute(dec!(200.00), dec!(10.00), dec!(5.00), dec!(0)),
            payment_method: PaymentMethod::BankTransfer,
            shipping_address_id: AddressId::new(1),
            notes: None,
            created_at: t0(),
        }
        .into_order(OrderId::new(7));
        order.status = status;

        let item = NewOrderItem {
            product_id: ProductId::new(3),
            quantity: 2,
            unit_price: dec!(100.00),
            total_price: dec!(200.00),
            product_snapshot: ProductSnapshot {
                name: "Keyboard".to_string(),
                sku: "KB-75-BLK".to_string(),
                price: dec!(100.00),
                image: None,
                brand: None,
                model: None,
            },
        }
        .into_item(OrderItemId::new(1), OrderId::new(7));

        OrderAggregate::new(order, vec![item])
    }

    fn change(to: OrderStatus) -> OrderCommand {
        OrderCommand::ChangeStatus {
            to,
            tracking_number: None,
            at: t0() + Duration::hours(1),
        }
    }

    #[test]
    fn test_confirm_emits_single_event() {
        let mut aggregate = aggregate_in(OrderStatus::Pending);
        let events = aggregate.execute(&change(OrderStatus::Confirmed)).unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(aggregate.order().status, OrderStatus::Confirmed);
        assert_eq!(aggregate.version(), 1);
        assert_eq!(aggregate.order().updated_at, t0() + Duration::hours(1));
    }

    #[test]
    fn test_cancel_emits_stock_restored() {
        for status in [OrderStatus::Pending, OrderStatus::Confirmed, OrderStatus::Processing] {
            let aggregate = aggregate_in(status);
            let events = aggregate.handle_command(&change(OrderStatus::Cancelled)).unwrap();

            assert_eq!(events.len(), 2);
            match &events[1] {
                OrderEvent::StockRestored(e) => {
                    assert_eq!(e.lines, vec![StockLine { product_id: ProductId::new(3), quantity: 2 }]);
                }
                other => panic!("unexpected event {other:?}"),
            }
        }
    }

    #[test]
    fn test_restored_lines_in_product_order() {
        let base = aggregate_in(OrderStatus::Confirmed);
        let mut items = base.items.clone();
        let mut extra = items[0].clone();
        extra.id = OrderItemId::new(2);
        extra.product_id = ProductId::new(1);
        extra.quantity = 5;
        items.push(extra);
        let aggregate = OrderAggregate::new(base.order().clone(), items);

        let events = aggregate.handle_command(&change(OrderStatus::Cancelled)).unwrap();

        match &events[1] {
            OrderEvent::StockRestored(e) => {
                let ids: Vec<_> = e.lines.iter().map(|l| l.product_id).collect();
                assert_eq!(ids, vec![ProductId::new(1), ProductId::new(3)]);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_delivered_rejects_every_transition() {
        let aggregate = aggregate_in(OrderStatus::Delivered);
        for to in OrderStatus::ALL {
            let err = aggregate.handle_command(&change(to)).unwrap_err();
            assert!(matches!(
                err,
                OrderError::IllegalTransition { from: OrderStatus::Delivered, to: t } if t == to
            ));
        }
    }

    #[test]
    fn test_ship_sets_timestamp_and_tracking() {
        let mut aggregate = aggregate_in(OrderStatus::Processing);
        aggregate
            .execute(&OrderCommand::ChangeStatus {
                to: OrderStatus::Shipped,
                tracking_number: Some("JNE-123".to_string()),
                at: t0() + Duration::days(1),
            })
            .unwrap();
        aggregate
            .execute(&OrderCommand::ChangeStatus {
                to: OrderStatus::Delivered,
                tracking_number: Some("ignored".to_string()),
                at: t0() + Duration::days(3),
            })
            .unwrap();

        let order = aggregate.order();
        assert_eq!(order.tracking_number.as_deref(), Some("JNE-123"));
        assert_eq!(order.shipped_at, Some(t0() + Duration::days(1)));
        assert_eq!(order.delivered_at, Some(t0() + Duration::days(3)));
        assert_eq!(order.version, 2);
    }

    #[test]
    fn test_payment_rules_on_cancelled_order() {
        let mut aggregate = aggregate_in(OrderStatus::Cancelled);
        let pay = OrderCommand::ChangePaymentStatus {
            to: PaymentStatus::Paid,
            at: t0(),
        };
        assert!(matches!(
            aggregate.handle_command(&pay),
            Err(OrderError::PaymentOnCancelledOrder(_))
        ));

        aggregate.order.payment_status = PaymentStatus::Paid;
        let refund = OrderCommand::ChangePaymentStatus {
            to: PaymentStatus::Refunded,
            at: t0(),
        };
        aggregate.execute(&refund).unwrap();
        assert_eq!(aggregate.order().payment_status, PaymentStatus::Refunded);
    }

    #[test]
    fn test_same_payment_state_is_illegal() {
        let aggregate = aggregate_in(OrderStatus::Pending);
        let err = aggregate
            .handle_command(&OrderCommand::ChangePaymentStatus {
                to: PaymentStatus::Pending,
                at: t0(),
            })
            .unwrap_err();
        assert!(matches!(err, OrderError::IllegalPaymentTransition { .. }));
    }

    #[test]
    fn test_amounts_never_change() {
        let mut aggregate = aggregate_in(OrderStatus::Pending);
        let before = aggregate.order().totals();
        for to in [OrderStatus::Confirmed, OrderStatus::Processing, OrderStatus::Cancelled] {
            aggregate.execute(&change(to)).unwrap();
        }
        assert_eq!(aggregate.order().totals(), before);
        assert!(before.is_consistent());
    }
}
