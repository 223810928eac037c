use serde::{Deserialize, Serialize};

use crate::{MenuItem, RestaurantId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Restaurant {
    pub id: RestaurantId,
    pub name: String,
    /// Comma-separated category list as stored by the backend
    #[serde(default)]
    pub categories: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub estimated_delivery_time: Option<u32>,
    #[serde(default = "default_active")]
    pub active: bool,
    /// Only populated when a single restaurant is fetched
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub menu: Vec<MenuItem>,
}

const fn default_active() -> bool {
    true
}

impl Restaurant {
    pub fn category_list(&self) -> Vec<&str> {
        self.categories
            .as_deref()
            .map(|categories| {
                categories
                    .split(',')
                    .map(str::trim)
                    .filter(|category| !category.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }
}
