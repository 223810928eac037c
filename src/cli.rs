use clap::{Parser, Subcommand};
use quickbite_marketplace::{
    Cart, CartItemId, DynMarketplace, MenuItemId, Order, PaymentDetails, RestaurantId,
    SimulatedGateway,
};
use std::io::Write;
use tracing::{error, info};

use crate::cart::CartService;
use crate::checkout::Checkout;
use crate::env::Env;
use crate::error::CheckoutError;
use crate::poller::{OrderStatusPoller, PollingStopped};

#[derive(Debug, Parser)]
#[command(name = "quickbite")]
#[command(about = "Browse restaurants, manage your cart, check out and track orders")]
#[command(version)]
pub struct CliEnv {
    #[clap(flatten)]
    pub env: Env,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List restaurants, optionally filtered by category
    Restaurants {
        #[arg(short = 'c', long = "category")]
        category: Option<String>,
    },
    /// Show a restaurant's menu
    Menu {
        #[arg(short = 'r', long = "restaurant")]
        restaurant: u64,
    },
    /// Show or change the cart
    Cart {
        #[command(subcommand)]
        action: CartCommand,
    },
    /// Pay for the cart and place the order
    Checkout {
        #[arg(long = "cardholder")]
        cardholder: String,
        #[arg(long = "address")]
        address: String,
    },
    /// List orders with their current status
    Orders,
    /// Follow active orders until they are delivered or cancelled
    Track,
}

#[derive(Debug, Subcommand)]
pub enum CartCommand {
    Show,
    /// Add a menu item to the cart
    Add {
        #[arg(short = 'm', long = "menu-item")]
        menu_item: u64,
        #[arg(short = 'q', long = "quantity", default_value = "1")]
        quantity: u32,
    },
    /// Remove one unit of a cart line
    Remove {
        #[arg(short = 'i', long = "item")]
        item: u64,
    },
    Clear,
}

impl CliEnv {
    pub fn parse_and_convert() -> (Env, Commands) {
        let cli_env = Self::parse();
        (cli_env.env, cli_env.command)
    }
}

pub async fn run_command(env: Env, command: Commands) -> anyhow::Result<()> {
    run_command_with_writers(env, command, &mut std::io::stdout()).await
}

async fn run_command_with_writers<W: Write>(
    env: Env,
    command: Commands,
    stdout: &mut W,
) -> anyhow::Result<()> {
    let marketplace = env.get_marketplace()?;
    execute_command_with_writers(&env, marketplace, command, stdout).await?;

    info!("CLI operation completed successfully");
    Ok(())
}

async fn execute_command_with_writers<W: Write>(
    env: &Env,
    marketplace: DynMarketplace,
    command: Commands,
    stdout: &mut W,
) -> anyhow::Result<()> {
    match command {
        Commands::Restaurants { category } => {
            info!("Listing restaurants: category={category:?}");
            let restaurants: Vec<_> = marketplace
                .restaurants(category.as_deref())
                .await?
                .into_iter()
                .filter(|restaurant| restaurant.active)
                .collect();

            if restaurants.is_empty() {
                writeln!(stdout, "No restaurants found")?;
            }

            for restaurant in &restaurants {
                writeln!(stdout, "{}  {}", restaurant.id, restaurant.name)?;
                if let Some(rating) = restaurant.rating {
                    writeln!(stdout, "   Rating: {rating:.1}")?;
                }
                if let Some(minutes) = restaurant.estimated_delivery_time {
                    writeln!(stdout, "   Delivery: ~{minutes} min")?;
                }
                let categories = restaurant.category_list();
                if !categories.is_empty() {
                    writeln!(stdout, "   Categories: {}", categories.join(", "))?;
                }
            }
        }
        Commands::Menu { restaurant } => {
            info!("Fetching menu: restaurant={restaurant}");
            let restaurant = marketplace.restaurant(RestaurantId(restaurant)).await?;

            writeln!(stdout, "{}", restaurant.name)?;
            if restaurant.menu.is_empty() {
                writeln!(stdout, "   No menu items available")?;
            }
            for item in &restaurant.menu {
                writeln!(stdout, "[{}] {} {:.2}", item.id, item.name, item.price)?;
            }
        }
        Commands::Cart { action } => {
            cart_command_with_writers(marketplace, action, stdout).await?;
        }
        Commands::Checkout {
            cardholder,
            address,
        } => {
            let details = PaymentDetails::new(cardholder, address);
            checkout_with_writers(marketplace, &details, stdout).await?;
        }
        Commands::Orders => {
            let orders = marketplace.fetch_orders().await?;
            write_orders(&orders, stdout)?;
        }
        Commands::Track => {
            track_with_writers(env, marketplace, stdout).await?;
        }
    }

    Ok(())
}

async fn cart_command_with_writers<W: Write>(
    marketplace: DynMarketplace,
    action: CartCommand,
    stdout: &mut W,
) -> anyhow::Result<()> {
    let mut service = CartService::new(marketplace);

    let result = match action {
        CartCommand::Show => service.load().await,
        CartCommand::Add {
            menu_item,
            quantity,
        } => service.add(MenuItemId(menu_item), quantity).await,
        CartCommand::Remove { item } => service.remove(CartItemId(item)).await,
        CartCommand::Clear => service.clear().await,
    };

    match result {
        Ok(cart) => write_cart(cart, stdout)?,
        Err(e) => {
            error!("Cart operation failed: {e}");
            writeln!(stdout, "❌ Cart operation failed: {e}")?;
            return Err(e.into());
        }
    }

    Ok(())
}

async fn checkout_with_writers<W: Write>(
    marketplace: DynMarketplace,
    details: &PaymentDetails,
    stdout: &mut W,
) -> anyhow::Result<()> {
    let mut service = CartService::new(marketplace.clone());
    service.load().await?;

    let mut checkout = Checkout::new();
    if let Err(e) = checkout.proceed_to_payment(service.cart()) {
        writeln!(stdout, "❌ {e}")?;
        return Err(e.into());
    }

    let gateway = SimulatedGateway::new();
    let result = checkout
        .submit_payment(service.cart_mut(), details, &*marketplace, &gateway)
        .await;

    match result {
        Ok(order) => {
            writeln!(stdout, "✅ Order placed successfully!")?;
            writeln!(stdout, "   Order: #{}", order.id)?;
            writeln!(stdout, "   Total: {:.2}", order.total_price)?;
            writeln!(stdout, "   Status: {}", order.order_status)?;
            Ok(())
        }
        Err(e) => {
            error!("Checkout failed: {e}");
            writeln!(stdout, "❌ Checkout failed: {e}")?;
            if matches!(e, CheckoutError::Payment(_) | CheckoutError::Marketplace(_)) {
                writeln!(stdout, "   Your cart was kept, you can retry")?;
            }
            Err(e.into())
        }
    }
}

async fn track_with_writers<W: Write>(
    env: &Env,
    marketplace: DynMarketplace,
    stdout: &mut W,
) -> anyhow::Result<()> {
    let poller = OrderStatusPoller::new(env.get_order_poller_config(), marketplace);
    let handle = poller.spawn();

    let stopped = tokio::select! {
        result = handle.join() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, stopping order tracking");
            PollingStopped::Cancelled
        }
    };

    match stopped {
        PollingStopped::Idle => writeln!(stdout, "No active orders left to track")?,
        PollingStopped::Cancelled => writeln!(stdout, "Stopped tracking orders")?,
    }

    write_orders(&poller.orders().await, stdout)?;
    Ok(())
}

fn write_cart<W: Write>(cart: &Cart, stdout: &mut W) -> std::io::Result<()> {
    if cart.is_empty() {
        return writeln!(stdout, "Your cart is empty");
    }

    for item in &cart.items {
        writeln!(
            stdout,
            "[{}] {} x{} @ {:.2} = {:.2}",
            item.id,
            item.menu_item.name,
            item.quantity,
            item.unit_price(),
            item.line_total()
        )?;
    }
    writeln!(stdout, "Total: {:.2}", cart.total_price())
}

fn write_orders<W: Write>(orders: &[Order], stdout: &mut W) -> std::io::Result<()> {
    if orders.is_empty() {
        return writeln!(stdout, "No orders yet");
    }

    for order in orders {
        writeln!(
            stdout,
            "#{} {} {:.2} placed {}",
            order.id,
            order.order_status,
            order.total_price,
            order.placed_at.format("%Y-%m-%d %H:%M")
        )?;
        if let Some(delivery) = &order.delivery {
            writeln!(stdout, "   Delivery: {}", delivery.status)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::tests::create_test_env;
    use httpmock::MockServer;
    use quickbite_marketplace::test::stub_order;
    use quickbite_marketplace::{Marketplace, OrderStatus, TestMarketplace, UserId};
    use serde_json::json;
    use std::sync::Arc;

    fn output(stdout: Vec<u8>) -> String {
        String::from_utf8(stdout).unwrap()
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        CliEnv::command().debug_assert();
    }

    #[test]
    fn test_cli_command_structure_validation() {
        use clap::CommandFactory;

        let cmd = CliEnv::command();
        let base = ["quickbite", "--user-id", "1", "--auth-token", "t"];

        let parse = |args: &[&str]| {
            cmd.clone()
                .try_get_matches_from(base.iter().chain(args.iter()).copied())
        };

        assert!(parse(&["cart", "add"]).is_err());
        assert!(parse(&["cart", "add", "-m", "1"]).is_ok());
        assert!(parse(&["cart", "remove", "--item", "3"]).is_ok());
        assert!(parse(&["checkout", "--cardholder", "Asha"]).is_err());
        assert!(parse(&["checkout", "--cardholder", "Asha", "--address", "MG Road"]).is_ok());
        assert!(parse(&["track"]).is_ok());
        assert!(parse(&["restaurants", "-c", "Breads"]).is_ok());
        assert!(parse(&["menu"]).is_err());
        assert!(parse(&["menu", "--restaurant", "4"]).is_ok());
    }

    #[tokio::test]
    async fn test_cart_add_prints_totals() {
        let marketplace: DynMarketplace = Arc::new(TestMarketplace::new(UserId(7)));
        let mut stdout = Vec::new();

        cart_command_with_writers(
            marketplace.clone(),
            CartCommand::Add {
                menu_item: 1,
                quantity: 2,
            },
            &mut stdout,
        )
        .await
        .unwrap();
        cart_command_with_writers(
            marketplace,
            CartCommand::Add {
                menu_item: 2,
                quantity: 1,
            },
            &mut stdout,
        )
        .await
        .unwrap();

        let output = output(stdout);
        assert!(output.contains("Paneer Butter Masala x2 @ 200.00 = 400.00"));
        assert!(output.contains("Total: 445.50"));
    }

    #[tokio::test]
    async fn test_cart_zero_quantity_is_rejected() {
        let marketplace: DynMarketplace = Arc::new(TestMarketplace::new(UserId(7)));
        let mut stdout = Vec::new();

        let result = cart_command_with_writers(
            marketplace,
            CartCommand::Add {
                menu_item: 1,
                quantity: 0,
            },
            &mut stdout,
        )
        .await;

        assert!(result.is_err());
        assert!(output(stdout).contains("Invalid quantity: 0"));
    }

    #[tokio::test]
    async fn test_checkout_places_order_and_empties_cart() {
        let test_marketplace = Arc::new(TestMarketplace::new(UserId(7)));
        let marketplace: DynMarketplace = test_marketplace.clone();
        marketplace.add_to_cart(MenuItemId(3), 2).await.unwrap();
        let mut stdout = Vec::new();

        checkout_with_writers(
            marketplace,
            &PaymentDetails::new("Asha Rao", "12 MG Road"),
            &mut stdout,
        )
        .await
        .unwrap();

        let output = output(stdout);
        assert!(output.contains("Order placed successfully"));
        assert!(output.contains("Total: 180.00"));
        assert!(output.contains("Status: PENDING"));
        assert_eq!(test_marketplace.place_order_calls(), 1);
        assert!(test_marketplace.cart().is_empty());
    }

    #[tokio::test]
    async fn test_checkout_with_empty_cart_places_nothing() {
        let test_marketplace = Arc::new(TestMarketplace::new(UserId(7)));
        let mut stdout = Vec::new();

        let result = checkout_with_writers(
            test_marketplace.clone(),
            &PaymentDetails::new("Asha Rao", "12 MG Road"),
            &mut stdout,
        )
        .await;

        assert!(result.is_err());
        assert!(output(stdout).contains("empty cart"));
        assert_eq!(test_marketplace.place_order_calls(), 0);
        assert_eq!(test_marketplace.payment_intents(), 0);
    }

    #[tokio::test]
    async fn test_checkout_placement_failure_keeps_cart() {
        let test_marketplace = Arc::new(TestMarketplace::new(UserId(7)));
        test_marketplace.add_to_cart(MenuItemId(1), 1).await.unwrap();
        test_marketplace.set_placement_failure(Some("backend unavailable"));
        let mut stdout = Vec::new();

        let result = checkout_with_writers(
            test_marketplace.clone(),
            &PaymentDetails::new("Asha Rao", "12 MG Road"),
            &mut stdout,
        )
        .await;

        assert!(result.is_err());
        assert!(output(stdout).contains("you can retry"));
        assert!(!test_marketplace.cart().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_track_until_delivered() {
        let test_marketplace = Arc::new(TestMarketplace::new(UserId(7)).with_order_snapshots(vec![
            vec![stub_order(5, OrderStatus::Preparing)],
            vec![stub_order(5, OrderStatus::Delivered)],
        ]));
        let mut stdout = Vec::new();

        track_with_writers(&create_test_env(), test_marketplace.clone(), &mut stdout)
            .await
            .unwrap();

        let output = output(stdout);
        assert!(output.contains("No active orders left to track"));
        assert!(output.contains("#5 DELIVERED"));
        assert_eq!(test_marketplace.fetch_orders_calls(), 2);
    }

    #[tokio::test]
    async fn test_restaurants_and_orders_against_api() {
        let server = MockServer::start();
        let mut env = create_test_env();
        env.dry_run = false;
        env.api.api_base_url = server.url("/api");

        let restaurants_mock = server.mock(|when, then| {
            when.method(httpmock::Method::GET)
                .path("/api/restaurants")
                .query_param("category", "Breads")
                .header("authorization", "Bearer test_token");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!([{
                    "id": 4,
                    "name": "Tandoor House",
                    "categories": "Breads, Curries",
                    "rating": 4.2,
                    "estimatedDeliveryTime": 25,
                    "active": true
                }]));
        });

        let orders_mock = server.mock(|when, then| {
            when.method(httpmock::Method::GET)
                .path("/api/orders/user/7")
                .header("authorization", "Bearer test_token");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!([{
                    "id": 11,
                    "orderDate": "2025-03-01T12:30:00Z",
                    "totalPrice": 245.5,
                    "orderStatus": "OUT_FOR_DELIVERY",
                    "delivery": { "status": "PICKED_UP" }
                }]));
        });

        let mut stdout = Vec::new();
        run_command_with_writers(
            env.clone(),
            Commands::Restaurants {
                category: Some("Breads".to_string()),
            },
            &mut stdout,
        )
        .await
        .unwrap();
        run_command_with_writers(env, Commands::Orders, &mut stdout)
            .await
            .unwrap();

        restaurants_mock.assert();
        orders_mock.assert();

        let output = output(stdout);
        assert!(output.contains("Tandoor House"));
        assert!(output.contains("Delivery: ~25 min"));
        assert!(output.contains("#11 OUT_FOR_DELIVERY 245.50 placed 2025-03-01 12:30"));
        assert!(output.contains("Delivery: PICKED_UP"));
    }

    #[tokio::test]
    async fn test_menu_lists_items_in_dry_run() {
        let env = create_test_env();
        let mut stdout = Vec::new();

        run_command_with_writers(env, Commands::Menu { restaurant: 1 }, &mut stdout)
            .await
            .unwrap();

        let output = output(stdout);
        assert!(output.starts_with("Spice Route\n"));
        assert!(output.contains("[1] Paneer Butter Masala 200.00"));
        assert!(output.contains("[2] Garlic Naan 45.50"));
        assert!(output.contains("[3] Mango Lassi 90.00"));
    }

    #[tokio::test]
    async fn test_menu_against_api() {
        let server = MockServer::start();
        let mut env = create_test_env();
        env.dry_run = false;
        env.api.api_base_url = server.url("/api");

        let restaurant_mock = server.mock(|when, then| {
            when.method(httpmock::Method::GET)
                .path("/api/restaurants/4")
                .header("authorization", "Bearer test_token");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({
                    "id": 4,
                    "name": "Tandoor House",
                    "menu": [{"id": 8, "name": "Butter Roti", "price": 30}]
                }));
        });

        let mut stdout = Vec::new();
        run_command_with_writers(env, Commands::Menu { restaurant: 4 }, &mut stdout)
            .await
            .unwrap();

        restaurant_mock.assert();
        let output = output(stdout);
        assert!(output.contains("Tandoor House"));
        assert!(output.contains("[8] Butter Roti 30.00"));
    }

    #[tokio::test]
    async fn test_restaurants_only_inactive_reports_none_found() {
        let server = MockServer::start();
        let mut env = create_test_env();
        env.dry_run = false;
        env.api.api_base_url = server.url("/api");

        server.mock(|when, then| {
            when.method(httpmock::Method::GET).path("/api/restaurants");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!([
                    {"id": 2, "name": "Closed Kitchen", "active": false},
                    {"id": 3, "name": "Shuttered Grill", "active": false}
                ]));
        });

        let mut stdout = Vec::new();
        run_command_with_writers(env, Commands::Restaurants { category: None }, &mut stdout)
            .await
            .unwrap();

        let output = output(stdout);
        assert_eq!(output, "No restaurants found\n");
    }

    #[tokio::test]
    async fn test_orders_backend_failure_surfaces_error() {
        let server = MockServer::start();
        let mut env = create_test_env();
        env.dry_run = false;
        env.api.api_base_url = server.url("/api");

        server.mock(|when, then| {
            when.method(httpmock::Method::GET).path("/api/orders/user/7");
            then.status(500).body("Internal Server Error");
        });

        let result = run_command_with_writers(env, Commands::Orders, &mut std::io::sink()).await;

        assert!(result.unwrap_err().to_string().contains("500"));
    }
}
