//! Cart command helpers: store wiring, notices and cart rendering.

use std::sync::Arc;

use rocketshoes_cart::{CartConfig, CartServices, CartStore, Notice, Notifier};
use rocketshoes_core::{CartState, Price};

/// Prints notices for the person at the terminal.
struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    #[allow(clippy::print_stderr)]
    fn notify(&self, notice: Notice) {
        tracing::debug!(kind = ?notice.kind, "Cart notice");
        eprintln!("error: {}", notice.message());
    }
}

/// Open the cart stored at the configured path.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be built or the stored cart is
/// unreadable or invalid.
pub fn open_store(config: &CartConfig) -> Result<CartStore, Box<dyn std::error::Error>> {
    tracing::debug!(
        api = %config.api.base_url,
        storage = %config.storage_path.display(),
        "Opening cart"
    );

    let services = CartServices::from_config(config, Arc::new(TerminalNotifier))?;
    Ok(CartStore::open(services)?)
}

/// Render the cart as a table with totals.
#[must_use]
pub fn render(cart: &CartState) -> String {
    if cart.is_empty() {
        return "Cart is empty\n".to_string();
    }

    let mut out = format!(
        "{:>6}  {:<40}  {:>4}  {:>10}  {:>10}\n",
        "ID", "PRODUCT", "QTY", "PRICE", "SUBTOTAL"
    );
    for line in cart {
        let product = line.product();
        out.push_str(&format!(
            "{:>6}  {:<40}  {:>4}  {:>10}  {:>10}\n",
            product.id.as_i32(),
            product.title().unwrap_or("-"),
            line.quantity(),
            display_price(product.price()),
            display_price(line.line_total()),
        ));
    }
    out.push_str(&format!(
        "\n{} item(s), total {}\n",
        cart.item_count(),
        cart.subtotal().display()
    ));
    out
}

fn display_price(price: Option<Price>) -> String {
    price.map_or_else(|| "-".to_string(), |price| price.display())
}

#[allow(clippy::print_stdout)]
pub fn show(cart: &CartState) {
    print!("{}", render(cart));
}
