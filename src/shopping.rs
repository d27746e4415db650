//! The household shopping list.

use crate::error::{AppError, AppResult};
use crate::models::{CatalogItem, GroupMember, LIST_TYPE_SHOPPING, ListItemRow, ListRow};
use crate::supabase::SupabaseService;
use chrono::Utc;
use log::info;
use std::collections::HashMap;
use uuid::Uuid;

/// Name given to a household's first shopping list
pub const DEFAULT_LIST_NAME: &str = "Weekly Shopping";

/// Quantities that are not positive become 1
pub fn normalize_quantity(quantity: f64) -> f64 {
    if quantity.is_nan() || quantity <= 0.0 {
        1.0
    } else {
        quantity
    }
}

/// Blank units are dropped, others trimmed
pub fn normalize_unit(unit: Option<&str>) -> Option<String> {
    unit.map(str::trim)
        .filter(|u| !u.is_empty())
        .map(str::to_string)
}

/// Unchecked items first, then by name ignoring case
pub fn sort_items(items: &mut [ListItemRow]) {
    items.sort_by_cached_key(|item| {
        (
            item.is_checked,
            item.custom_name.as_deref().unwrap_or("").to_lowercase(),
        )
    });
}

pub struct ShoppingListService {
    supabase: SupabaseService,
}

impl ShoppingListService {
    pub fn new(supabase: SupabaseService) -> Self {
        ShoppingListService { supabase }
    }

    /// Household of the user's first membership
    pub async fn user_group_id(&self, user_id: Uuid) -> AppResult<Option<Uuid>> {
        let membership = self
            .supabase
            .from::<GroupMember>()
            .eq("user_id", user_id)
            .first()
            .await?;
        Ok(membership.map(|m| m.group_id))
    }

    pub async fn get_or_create_shopping_list(
        &self,
        group_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<ListRow> {
        let lists = self
            .supabase
            .from::<ListRow>()
            .eq("group_id", group_id)
            .get()
            .await?;

        let existing = lists.into_iter().find(|l| {
            l.archived_at.is_none() && l.list_type.eq_ignore_ascii_case(LIST_TYPE_SHOPPING)
        });
        if let Some(list) = existing {
            return Ok(list);
        }

        let list = self
            .supabase
            .from::<ListRow>()
            .insert(&ListRow {
                list_id: Uuid::new_v4(),
                group_id,
                name: DEFAULT_LIST_NAME.to_string(),
                list_type: LIST_TYPE_SHOPPING.to_string(),
                created_by_user: user_id,
                created_at: Some(Utc::now()),
                archived_at: None,
            })
            .await?;
        info!("Created shopping list {} for household {group_id}.", list.list_id);
        Ok(list)
    }

    pub async fn items(&self, list_id: Uuid) -> AppResult<Vec<ListItemRow>> {
        let mut items = self
            .supabase
            .from::<ListItemRow>()
            .eq("list_id", list_id)
            .get()
            .await?;
        sort_items(&mut items);
        Ok(items)
    }

    pub async fn item(&self, list_item_id: Uuid) -> AppResult<Option<ListItemRow>> {
        Ok(self
            .supabase
            .from::<ListItemRow>()
            .eq("list_item_id", list_item_id)
            .first()
            .await?)
    }

    /// Catalog rows keyed by item id
    pub async fn catalog_map(&self) -> AppResult<HashMap<Uuid, CatalogItem>> {
        let catalog = self
            .supabase
            .from::<CatalogItem>()
            .order("name", true)
            .get()
            .await?;
        Ok(catalog.into_iter().map(|c| (c.item_id, c)).collect())
    }

    pub async fn add_custom(
        &self,
        list_id: Uuid,
        user_id: Uuid,
        name: &str,
        quantity: f64,
        unit: Option<&str>,
    ) -> AppResult<ListItemRow> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::invalid_input("item name is required"));
        }
        self.insert_item(list_id, user_id, None, Some(name.to_string()), quantity, unit)
            .await
    }

    pub async fn add_catalog(
        &self,
        list_id: Uuid,
        user_id: Uuid,
        item_id: Uuid,
        quantity: f64,
        unit: Option<&str>,
    ) -> AppResult<ListItemRow> {
        self.insert_item(list_id, user_id, Some(item_id), None, quantity, unit)
            .await
    }

    pub async fn toggle_checked(&self, row: &ListItemRow) -> AppResult<ListItemRow> {
        let mut row = row.clone();
        row.is_checked = !row.is_checked;
        Ok(self.supabase.from::<ListItemRow>().update_row(&row).await?)
    }

    pub async fn update_qty_unit(
        &self,
        row: &ListItemRow,
        quantity: f64,
        unit: Option<&str>,
    ) -> AppResult<ListItemRow> {
        let mut row = row.clone();
        row.quantity = normalize_quantity(quantity);
        row.unit = normalize_unit(unit);
        Ok(self.supabase.from::<ListItemRow>().update_row(&row).await?)
    }

    pub async fn delete(&self, row: &ListItemRow) -> AppResult<()> {
        self.supabase.from::<ListItemRow>().delete_row(row).await?;
        Ok(())
    }

    async fn insert_item(
        &self,
        list_id: Uuid,
        user_id: Uuid,
        item_id: Option<Uuid>,
        custom_name: Option<String>,
        quantity: f64,
        unit: Option<&str>,
    ) -> AppResult<ListItemRow> {
        let row = ListItemRow {
            list_item_id: Uuid::new_v4(),
            list_id,
            item_id,
            custom_name,
            quantity: normalize_quantity(quantity),
            unit: normalize_unit(unit),
            is_checked: false,
            added_by_user: Some(user_id),
            created_at: Some(Utc::now()),
        };
        Ok(self.supabase.from::<ListItemRow>().insert(&row).await?)
    }
}
