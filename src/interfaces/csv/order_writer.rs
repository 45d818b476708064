use crate::domain::order::Order;
use crate::error::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct OrderRow<'a> {
    id: u64,
    user: u64,
    course: u64,
    original_price: Decimal,
    discount_amount: Decimal,
    final_price: Decimal,
    coupon: Option<u64>,
    status: &'static str,
    method: Option<&'a str>,
    order_code: &'a str,
}

impl<'a> From<&'a Order> for OrderRow<'a> {
    fn from(order: &'a Order) -> Self {
        Self {
            id: order.id.value(),
            user: order.user_id.value(),
            course: order.course_id.value(),
            original_price: order.original_price.value().normalize(),
            discount_amount: order.discount_amount.value().normalize(),
            final_price: order.final_price.value().normalize(),
            coupon: order.coupon_id.map(|id| id.value()),
            status: order.payment_status.as_str(),
            method: order.payment_method.as_deref(),
            order_code: order.code.as_str(),
        }
    }
}

/// Writes the order table as CSV, one row per order sorted by id.
pub struct OrderWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> OrderWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_orders(&mut self, orders: impl IntoIterator<Item = Order>) -> Result<()> {
        let mut orders: Vec<Order> = orders.into_iter().collect();
        orders.sort_by_key(|o| o.id);
        if orders.is_empty() {
            self.writer.write_record([
                "id",
                "user",
                "course",
                "original_price",
                "discount_amount",
                "final_price",
                "coupon",
                "status",
                "method",
                "order_code",
            ])?;
        }
        for order in &orders {
            self.writer.serialize(OrderRow::from(order))?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::course::PriceBreakdown;
    use crate::domain::ids::{CouponId, CourseId, OrderId, UserId};
    use crate::domain::money::Money;
    use crate::domain::order::{NewOrder, OrderCode};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn order(id: u64, coupon: Option<CouponId>) -> Order {
        let prices = PriceBreakdown::new(
            Money::new(dec!(100.00)).unwrap(),
            Money::new(dec!(20.50)).unwrap(),
        );
        Order::new(
            OrderId(id),
            NewOrder {
                code: OrderCode::from(format!("ORD-TESTCODE-{id}")),
                user_id: UserId(1),
                course_id: CourseId(7),
                prices,
                coupon_id: coupon,
                created_at: Utc::now(),
            },
        )
    }

    fn render(orders: Vec<Order>) -> String {
        let mut out = Vec::new();
        OrderWriter::new(&mut out).write_orders(orders).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_writes_sorted_normalized_rows() {
        let output = render(vec![order(2, None), order(1, Some(CouponId(3)))]);
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(
            lines[0],
            "id,user,course,original_price,discount_amount,final_price,coupon,status,method,order_code"
        );
        assert_eq!(lines[1], "1,1,7,100,20.5,79.5,3,pending,,ORD-TESTCODE-1");
        assert_eq!(lines[2], "2,1,7,100,20.5,79.5,,pending,,ORD-TESTCODE-2");
    }

    #[test]
    fn test_empty_table_still_has_header() {
        let output = render(Vec::new());
        assert!(output.starts_with("id,user,course,"));
    }
}
