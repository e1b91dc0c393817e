//! Terminal rendering.

#![allow(clippy::print_stdout)]

use crumb_client::models::{Branch, Offer, Order, OrderItem, Product, SalesReport, User};
use crumb_client::session::Identity;
use crumb_client::{CartLine, CartStore, SalesSummary};

pub fn identity(identity: &Identity) {
    println!("{} (#{})", identity.display_name(), identity.id);
    if let Some(email) = &identity.email {
        println!("  email:  {email}");
    }
    println!("  role:   {}", identity.role);
    if let Some(branch) = identity.branch {
        println!("  branch: {branch}");
    }
}

pub fn user(user: &User) {
    println!(
        "#{:<5} {:<20} {:<30} {:<14} {}",
        user.id,
        user.username,
        user.email,
        user.role,
        user.branch.map(|b| format!("branch {b}")).unwrap_or_default()
    );
}

pub fn products(products: &[Product]) {
    if products.is_empty() {
        println!("No products.");
        return;
    }
    for product in products {
        let stock = product
            .stock
            .map_or_else(|| "-".to_string(), |stock| stock.to_string());
        let flag = if product.active { "" } else { " (inactive)" };
        println!(
            "#{:<5} {:<30} {:>10}  stock {:>4}{flag}",
            product.id, product.name, product.price, stock
        );
    }
}

pub fn offers(offers: &[Offer]) {
    if offers.is_empty() {
        println!("No offers.");
        return;
    }
    for offer in offers {
        println!("#{:<5} {:<30} {:>10}", offer.id, offer.name, offer.price);
        for component in &offer.products {
            println!("         {} x {}", component.multiplier, component.name);
        }
        if let Some(end) = offer.ends_at {
            println!("         until {}", end.format("%Y-%m-%d %H:%M"));
        }
    }
}

pub fn cart(cart: &CartStore) {
    if cart.is_empty() {
        println!("Your cart is empty.");
        return;
    }
    for line in cart.lines() {
        println!(
            "{:<12} {:<30} {:>3} x {:>9} = {:>10}",
            line.key().to_string(),
            line.name(),
            line.quantity(),
            line.unit_price(),
            line.subtotal()
        );
        if let CartLine::Offer { products, .. } = line {
            for component in products {
                println!("             {} x {}", component.multiplier, component.name);
            }
        }
    }
    println!("{} items, total {}", cart.item_count(), cart.total());
}

pub fn order_row(order: &Order) {
    let delivery = order
        .delivery
        .address()
        .map_or_else(|| "pickup".to_string(), |address| format!("to {address}"));
    println!(
        "#{:<6} {:<10} {:>10}  {}  {}",
        order.id,
        order.status,
        order.total,
        order.created_at.format("%Y-%m-%d %H:%M"),
        delivery
    );
}

pub fn orders(orders: &[Order]) {
    if orders.is_empty() {
        println!("No orders.");
        return;
    }
    for order in orders {
        order_row(order);
    }
}

pub fn order(order: &Order) {
    order_row(order);
    for item in &order.items {
        match item {
            OrderItem::Product { name, quantity, .. } => println!("    {quantity} x {name}"),
            OrderItem::Offer {
                name,
                quantity,
                products,
                ..
            } => {
                println!("    {quantity} x {name}");
                for component in products {
                    println!(
                        "        {} x {}",
                        component.multiplier.saturating_mul(*quantity),
                        component.name
                    );
                }
            }
        }
        println!("      {}", item.subtotal());
    }
    if let Some(next) = order.status.next() {
        println!("  next step: {next}");
    }
}

pub fn branches(branches: &[Branch]) {
    for branch in branches {
        let flag = if branch.active { "" } else { " (closed)" };
        println!("#{:<4} {:<24} {}{flag}", branch.id, branch.name, branch.address);
    }
}

pub fn sales_report(report: &SalesReport) {
    println!("Sales {} to {}", report.from, report.to);
    println!("  orders:  {}", report.orders);
    println!("  revenue: {}", report.revenue);
    if !report.by_branch.is_empty() {
        println!("  by branch:");
        for branch in &report.by_branch {
            println!(
                "    {:<24} {:>5} orders {:>12}",
                branch.name, branch.orders, branch.revenue
            );
        }
    }
    if !report.by_product.is_empty() {
        println!("  by product:");
        for product in &report.by_product {
            println!(
                "    {:<24} {:>6} units {:>12}",
                product.name, product.units, product.revenue
            );
        }
    }
}

pub fn summary(summary: &SalesSummary) {
    println!("  orders:  {}", summary.orders);
    println!("  revenue: {}", summary.revenue);
    if let Some(average) = summary.average_ticket() {
        println!("  average: {average}");
    }
    for (status, count) in &summary.by_status {
        println!("    {status:<10} {count}");
    }
    for (name, units) in summary.top_products(5) {
        println!("    {name:<24} {units} units");
    }
}

pub fn message(text: &str) {
    println!("{text}");
}
