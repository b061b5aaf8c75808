use crate::models::{Booking, Payment, Ticket, User, Vehicle};

/// Snapshot of everything the receipt shows, taken when the payment is
/// recorded and stored alongside it.
pub fn build_ticket(payment: &Payment, booking: &Booking, vehicle: &Vehicle, customer: &User) -> Ticket {
    Ticket {
        booking_id: booking.id.clone(),
        transaction_id: payment.transaction_id.clone(),
        processed_at: payment.created_at,
        card_masked: payment.card_masked.clone(),
        card_holder: payment.card_holder.clone(),
        customer_name: customer.name.clone(),
        customer_email: customer.email.clone(),
        vehicle_label: vehicle.label(),
        start_date: booking.start_date,
        end_date: booking.end_date,
        total_days: booking.total_days,
        amount: payment.amount,
        currency: payment.currency.clone(),
        payment_method: payment.payment_method.clone(),
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn format_amount(amount: i64, currency: &str) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    let sign = if amount < 0 { "-" } else { "" };
    format!("{sign}{grouped} {currency}")
}

fn fields(ticket: &Ticket) -> Vec<(&'static str, String)> {
    vec![
        ("Transaction", ticket.transaction_id.clone()),
        ("Processed", ticket.processed_at.format("%Y-%m-%d %H:%M:%S UTC").to_string()),
        ("Customer", ticket.customer_name.clone()),
        ("Email", ticket.customer_email.clone()),
        ("Vehicle", ticket.vehicle_label.clone()),
        (
            "Rental period",
            format!(
                "{} to {} ({} days)",
                ticket.start_date.format("%Y-%m-%d"),
                ticket.end_date.format("%Y-%m-%d"),
                ticket.total_days
            ),
        ),
        ("Payment method", ticket.payment_method.clone()),
        ("Card", ticket.card_masked.clone()),
        ("Card holder", ticket.card_holder.clone()),
        ("Total paid", format_amount(ticket.amount, &ticket.currency)),
    ]
}

/// Standalone print view. Only the receipt is on the page, and print media
/// drops the button.
pub fn render_print_html(ticket: &Ticket) -> String {
    let rows: String = fields(ticket)
        .into_iter()
        .map(|(label, value)| {
            format!(
                "      <tr><th>{}</th><td>{}</td></tr>\n",
                label,
                escape_html(&value)
            )
        })
        .collect();

    format!(
        "<!DOCTYPE html>\n\
         <html lang=\"en\">\n\
         <head>\n\
         <meta charset=\"utf-8\">\n\
         <title>Ticket {txn}</title>\n\
         <style>\n\
         body {{ font-family: sans-serif; margin: 2rem; }}\n\
         table {{ border-collapse: collapse; }}\n\
         th {{ text-align: left; padding: 0.25rem 1rem 0.25rem 0; }}\n\
         @media print {{ .no-print {{ display: none; }} body {{ margin: 0; }} }}\n\
         </style>\n\
         </head>\n\
         <body>\n\
         <h1>Rental payment receipt</h1>\n\
         <table>\n\
         {rows}\
         </table>\n\
         <button class=\"no-print\" onclick=\"window.print()\">Print</button>\n\
         </body>\n\
         </html>\n",
        txn = escape_html(&ticket.transaction_id),
    )
}

/// Plain-text receipt, one `label: value` per line.
pub fn render_text(ticket: &Ticket) -> String {
    let mut out = String::from("RENTAL PAYMENT RECEIPT\n======================\n");
    for (label, value) in fields(ticket) {
        out.push_str(&format!("{label:<15} {value}\n"));
    }
    out
}
