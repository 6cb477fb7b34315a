//! CSV export of stored orders.

use ordersieve_store::rows::OrderRow;

const HEADER: &str =
    "id,message_id,chat_id,author_id,author_name,category,relevance_score,detected_by,telegram_link,created_at,text";

/// Render orders as CSV, header included.
pub fn orders_to_csv(orders: &[OrderRow]) -> String {
    let mut out = String::from(HEADER);
    out.push('\n');
    for order in orders {
        let row = [
            order.id.to_string(),
            escape(&order.message_id),
            escape(&order.chat_id),
            escape(&order.author_id),
            escape(order.author_name.as_deref().unwrap_or("")),
            escape(&order.category),
            format!("{:.2}", order.relevance_score),
            escape(&order.detected_by),
            escape(order.telegram_link.as_deref().unwrap_or("")),
            order.created_at.to_rfc3339(),
            escape(&order.text),
        ];
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out
}

/// Quote a field when it contains a separator, a quote or a newline.
fn escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
