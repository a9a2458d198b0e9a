//! Command implementations.
//!
//! Every command works through [`Storefront`], so guest and signed-in
//! invocations take the same code path; the session restored at startup
//! decides where changes go.

#![allow(clippy::print_stdout)]

use basket_client::{Notice, NoticeLevel, Storage, Storefront};
use basket_core::{Email, ItemView, ProductId, format_price};
use clap::Subcommand;
use secrecy::SecretString;
use tokio::sync::broadcast::{self, error::TryRecvError};

use crate::error::CliError;

#[derive(Subcommand)]
pub enum CartAction {
    /// Add a product to the cart
    Add {
        /// Product ID
        product_id: ProductId,

        /// Quantity to add
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,
    },
    /// Set the quantity of a cart entry (0 removes it)
    Set {
        /// Product ID
        product_id: ProductId,

        /// New quantity
        quantity: u32,
    },
    /// Remove a product from the cart
    Remove {
        /// Product ID
        product_id: ProductId,
    },
    /// Empty the cart
    Clear,
    /// List cart entries with the subtotal
    List,
}

#[derive(Subcommand)]
pub enum FavoritesAction {
    /// Add a product to favorites
    Add {
        /// Product ID
        product_id: ProductId,
    },
    /// Remove a product from favorites
    Remove {
        /// Product ID
        product_id: ProductId,
    },
    /// Add the product if absent, remove it otherwise
    Toggle {
        /// Product ID
        product_id: ProductId,
    },
    /// List favorites
    List,
}

pub async fn cart<S: Storage + 'static>(
    storefront: &Storefront<S>,
    action: CartAction,
) -> Result<(), CliError> {
    let cart = storefront.cart();
    match action {
        CartAction::Add {
            product_id,
            quantity,
        } => {
            storefront.add_to_cart(product_id, quantity).await?;
            println!(
                "Cart: {} item(s) ({} in cart for product {product_id})",
                cart.total(),
                cart.quantity_of(product_id)
            );
        }
        CartAction::Set {
            product_id,
            quantity,
        } => {
            cart.update_item(product_id, quantity).await?;
            println!("Cart: {} item(s)", cart.total());
        }
        CartAction::Remove { product_id } => {
            cart.remove_item(product_id).await?;
            println!("Cart: {} item(s)", cart.total());
        }
        CartAction::Clear => {
            cart.clear().await?;
            println!("Cart emptied");
        }
        CartAction::List => {
            let items = cart.items();
            if items.is_empty() {
                println!("Your cart is empty");
                return Ok(());
            }
            print_items(&items, true);
            println!();
            println!(
                "{} item(s), subtotal {}",
                cart.total(),
                format_price(cart.subtotal())
            );
        }
    }
    Ok(())
}

pub async fn favorites<S: Storage + 'static>(
    storefront: &Storefront<S>,
    action: FavoritesAction,
) -> Result<(), CliError> {
    let favorites = storefront.favorites();
    match action {
        FavoritesAction::Add { product_id } => {
            storefront.add_favorite(product_id).await?;
            println!("Favorites: {} product(s)", favorites.total());
        }
        FavoritesAction::Remove { product_id } => {
            favorites.remove_item(product_id).await?;
            println!("Favorites: {} product(s)", favorites.total());
        }
        FavoritesAction::Toggle { product_id } => {
            if storefront.toggle_favorite(product_id).await? {
                println!("Product {product_id} added to favorites");
            } else {
                println!("Product {product_id} removed from favorites");
            }
        }
        FavoritesAction::List => {
            let items = favorites.items();
            if items.is_empty() {
                println!("You have no favorites yet");
                return Ok(());
            }
            print_items(&items, false);
        }
    }
    Ok(())
}

pub async fn login<S: Storage + 'static>(
    storefront: &Storefront<S>,
    email: &str,
    password: String,
) -> Result<(), CliError> {
    let email = Email::parse(email)?;
    let password = SecretString::from(password);

    let summary = storefront.sign_in(&email, &password).await?;
    println!("Signed in as {email}");

    for (label, report) in [("cart", summary.cart), ("favorites", summary.favorites)] {
        let Some(report) = report else { continue };
        println!("Moved {} guest {label} item(s) to your account", report.pushed);
        if !report.is_complete() {
            let failed: Vec<String> = report.failed.iter().map(ToString::to_string).collect();
            println!(
                "Could not move {label} item(s) for product(s): {}",
                failed.join(", ")
            );
        }
    }
    Ok(())
}

pub async fn logout<S: Storage + 'static>(storefront: &Storefront<S>) {
    if !storefront.session().is_authenticated() {
        println!("Not signed in");
        return;
    }
    storefront.sign_out().await;
    println!("Signed out");
}

pub fn status<S: Storage + 'static>(storefront: &Storefront<S>) {
    println!("API:       {}", storefront.config().api_url);
    println!("State dir: {}", storefront.config().state_dir.display());
    match storefront.session().current().account() {
        Some(account) => println!("Session:   signed in as {}", account.email),
        None => println!("Session:   guest"),
    }
    println!("Cart:      {} item(s)", storefront.cart().total());
    println!("Favorites: {} product(s)", storefront.favorites().total());
}

/// Print every notice raised during the command.
pub fn print_notices(notices: &mut broadcast::Receiver<Notice>) {
    loop {
        match notices.try_recv() {
            Ok(notice) => match notice.level {
                NoticeLevel::Success => println!("✓ {}", notice.message),
                NoticeLevel::Error => println!("✗ {}", notice.message),
            },
            Err(TryRecvError::Lagged(_)) => {}
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }
}

fn print_items(items: &[ItemView], with_quantity: bool) {
    for item in items {
        let price = item.discount.apply(item.unit_price);
        let discount = match item.discount.percent() {
            0 => String::new(),
            percent => format!(" (-{percent}%)"),
        };
        if with_quantity {
            println!(
                "{:>6}  {:<32} {:>3} x {}{discount} = {}",
                item.product_id.as_i32(),
                item.name,
                item.quantity,
                format_price(price),
                format_price(item.line_total()),
            );
        } else {
            println!(
                "{:>6}  {:<32} {}{discount}",
                item.product_id.as_i32(),
                item.name,
                format_price(price),
            );
        }
    }
}
