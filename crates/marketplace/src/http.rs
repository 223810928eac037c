use async_trait::async_trait;
use clap::Parser;
use reqwest::RequestBuilder;
use reqwest::header::{self, HeaderMap, HeaderValue};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info};

use crate::{
    Cart, CartItemId, Marketplace, MarketplaceError, MenuItemId, Order, OrderRequest,
    PaymentIntent, Restaurant, RestaurantId, Session, UserId,
};

#[derive(Parser, Debug, Clone)]
pub struct ApiEnv {
    /// Base URL of the marketplace REST API
    #[clap(long, env, default_value = "http://localhost:8080/api")]
    pub api_base_url: String,
    /// Timeout in seconds applied to every backend request
    #[clap(long, env, default_value = "30")]
    pub request_timeout_secs: u64,
}

impl ApiEnv {
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AddToCartRequest {
    user_id: UserId,
    menu_item_id: MenuItemId,
    quantity: u32,
}

#[derive(Debug, Serialize)]
struct PaymentIntentRequest {
    amount: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaymentIntentResponse {
    client_secret: String,
}

/// Marketplace backend reached over its REST API
#[derive(Debug, Clone)]
pub struct HttpMarketplace {
    client: reqwest::Client,
    base_url: String,
    session: Session,
}

impl HttpMarketplace {
    pub fn new(env: &ApiEnv, session: Session) -> Result<Self, MarketplaceError> {
        url::Url::parse(&env.api_base_url)?;

        let client = reqwest::Client::builder()
            .timeout(env.request_timeout())
            .build()?;

        info!(
            "Using marketplace API at {} for user {}",
            env.api_base_url, session.user_id
        );

        Ok(Self {
            client,
            base_url: env.api_base_url.trim_end_matches('/').to_string(),
            session,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    fn headers(&self) -> Result<HeaderMap, MarketplaceError> {
        Ok([
            (header::AUTHORIZATION, self.session.token.authorization_header()?),
            (header::ACCEPT, HeaderValue::from_str("application/json")?),
        ]
        .into_iter()
        .collect::<HeaderMap>())
    }

    async fn send<T: DeserializeOwned>(
        &self,
        action: &str,
        request: RequestBuilder,
    ) -> Result<T, MarketplaceError> {
        let response = request.headers(self.headers()?).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(action, %status, body = %body, "Marketplace request failed");
            return Err(MarketplaceError::RequestFailed {
                action: action.to_string(),
                status,
                body,
            });
        }

        let response_text = response.text().await?;
        debug!(action, "Marketplace response: {response_text}");

        serde_json::from_str::<T>(&response_text).map_err(|parse_error| {
            error!(
                action,
                response_text = %response_text,
                parse_error = %parse_error,
                "Failed to parse marketplace response"
            );
            MarketplaceError::ApiResponseParse {
                action: action.to_string(),
                response_text,
                parse_error: parse_error.to_string(),
            }
        })
    }
}

#[async_trait]
impl Marketplace for HttpMarketplace {
    async fn restaurants(
        &self,
        category: Option<&str>,
    ) -> Result<Vec<Restaurant>, MarketplaceError> {
        let mut request = self.client.get(self.url("restaurants"));
        if let Some(category) = category.filter(|category| *category != "All") {
            request = request.query(&[("category", category)]);
        }

        self.send("list restaurants", request).await
    }

    async fn restaurant(&self, id: RestaurantId) -> Result<Restaurant, MarketplaceError> {
        let path = format!("restaurants/{id}");
        self.send("fetch restaurant", self.client.get(self.url(&path)))
            .await
    }

    async fn fetch_cart(&self) -> Result<Cart, MarketplaceError> {
        let path = format!("cart/{}", self.session.user_id);
        self.send("fetch cart", self.client.get(self.url(&path))).await
    }

    async fn add_to_cart(
        &self,
        menu_item_id: MenuItemId,
        quantity: u32,
    ) -> Result<Cart, MarketplaceError> {
        if quantity == 0 {
            return Err(MarketplaceError::InvalidQuantity(quantity));
        }

        let body = AddToCartRequest {
            user_id: self.session.user_id,
            menu_item_id,
            quantity,
        };

        self.send(
            "add to cart",
            self.client.post(self.url("cart/add")).json(&body),
        )
        .await
    }

    async fn remove_from_cart(&self, cart_item_id: CartItemId) -> Result<Cart, MarketplaceError> {
        let path = format!("cart/remove/{cart_item_id}");
        self.send("remove from cart", self.client.delete(self.url(&path)))
            .await
    }

    async fn clear_cart(&self) -> Result<Cart, MarketplaceError> {
        let path = format!("cart/clear/{}", self.session.user_id);
        self.send("clear cart", self.client.post(self.url(&path)))
            .await
    }

    async fn create_payment_intent(
        &self,
        amount: Decimal,
    ) -> Result<PaymentIntent, MarketplaceError> {
        let response: PaymentIntentResponse = self
            .send(
                "create payment intent",
                self.client
                    .post(self.url("payments/create-payment-intent"))
                    .json(&PaymentIntentRequest { amount }),
            )
            .await?;

        Ok(PaymentIntent {
            client_secret: response.client_secret,
            amount,
        })
    }

    async fn place_order(&self, request: &OrderRequest) -> Result<Order, MarketplaceError> {
        self.send(
            "place order",
            self.client.post(self.url("orders")).json(request),
        )
        .await
    }

    async fn fetch_orders(&self) -> Result<Vec<Order>, MarketplaceError> {
        let path = format!("orders/user/{}", self.session.user_id);
        self.send("fetch orders", self.client.get(self.url(&path)))
            .await
    }

    fn user_id(&self) -> UserId {
        self.session.user_id
    }
}
