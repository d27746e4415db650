//! Pantries, their storage locations, inventory and item categories of a
//! household.

use crate::changes::{AppDataChanges, DataScope};
use crate::error::{AppError, AppResult};
use crate::models::{
    CatalogItem, InventoryDisplayItem, InventoryEditLocationRow, InventoryItem, ItemCategory,
    Pantry, PantryLocation, SidebarLocationLink, SidebarPantrySection,
};
use crate::supabase::SupabaseService;
use crate::text::slugify;
use chrono::Utc;
use log::info;
use std::collections::HashMap;
use uuid::Uuid;

const UNNAMED: &str = "Unnamed";
const UNCATEGORIZED: &str = "Uncategorized";

/// "2 kg", or just "2" without a unit
pub fn format_amount(quantity: f64, unit: &str) -> String {
    let unit = unit.trim();
    if unit.is_empty() {
        quantity.to_string()
    } else {
        format!("{quantity} {unit}")
    }
}

fn name_or_unnamed(name: Option<&str>) -> String {
    name.map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(UNNAMED)
        .to_string()
}

fn by_name(a: &Option<String>, b: &Option<String>) -> std::cmp::Ordering {
    let a = a.as_deref().unwrap_or("").to_lowercase();
    let b = b.as_deref().unwrap_or("").to_lowercase();
    a.cmp(&b)
}

pub struct PantryService {
    supabase: SupabaseService,
    changes: AppDataChanges,
}

impl PantryService {
    pub fn new(supabase: SupabaseService, changes: AppDataChanges) -> Self {
        PantryService { supabase, changes }
    }

    /// Pantries of the household ordered by name
    pub async fn pantries(&self, group_id: Uuid) -> AppResult<Vec<Pantry>> {
        let mut pantries = self
            .supabase
            .from::<Pantry>()
            .eq("group_id", group_id)
            .get()
            .await?;
        pantries.sort_by(|a, b| by_name(&a.name, &b.name));
        Ok(pantries)
    }

    pub async fn add_pantry(&self, group_id: Uuid, name: &str) -> AppResult<Pantry> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::invalid_input("pantry name is required"));
        }
        let pantry = self
            .supabase
            .from::<Pantry>()
            .insert(&Pantry {
                pantry_id: Uuid::new_v4(),
                group_id,
                name: Some(name.to_string()),
                created_at: Some(Utc::now()),
            })
            .await?;
        self.changes
            .notify_changed(DataScope::Locations, Some(group_id));
        Ok(pantry)
    }

    /// Navigation entries: each pantry with its locations, both by name
    pub async fn sidebar(&self, group_id: Uuid) -> AppResult<Vec<SidebarPantrySection>> {
        let pantries = self.pantries(group_id).await?;
        let locations = self.locations_of(&pantries).await?;

        Ok(pantries
            .iter()
            .map(|pantry| SidebarPantrySection {
                pantry_name: name_or_unnamed(pantry.name.as_deref()),
                locations: locations
                    .iter()
                    .filter(|l| l.pantry_id == pantry.pantry_id)
                    .map(|l| {
                        let name = name_or_unnamed(l.name.as_deref());
                        SidebarLocationLink {
                            slug: slugify(&name),
                            name,
                            notes: l.notes.clone(),
                        }
                    })
                    .collect(),
            })
            .collect())
    }

    /// Rows of the location editor, ordered by pantry then location name
    pub async fn location_rows(&self, group_id: Uuid) -> AppResult<Vec<InventoryEditLocationRow>> {
        let pantries = self.pantries(group_id).await?;
        let locations = self.locations_of(&pantries).await?;

        let mut rows = Vec::with_capacity(locations.len());
        for pantry in &pantries {
            for location in locations.iter().filter(|l| l.pantry_id == pantry.pantry_id) {
                rows.push(InventoryEditLocationRow {
                    location_id: location.location_id,
                    pantry_id: pantry.pantry_id,
                    pantry_name: name_or_unnamed(pantry.name.as_deref()),
                    location_name: name_or_unnamed(location.name.as_deref()),
                    notes: location.notes.clone(),
                });
            }
        }
        Ok(rows)
    }

    pub async fn add_location(
        &self,
        group_id: Uuid,
        user_id: Uuid,
        pantry_id: Uuid,
        name: &str,
        notes: Option<&str>,
    ) -> AppResult<PantryLocation> {
        let pantries = self.pantries(group_id).await?;
        if !pantries.iter().any(|p| p.pantry_id == pantry_id) {
            return Err(AppError::not_found("pantry"));
        }

        let location = self
            .supabase
            .from::<PantryLocation>()
            .insert(&PantryLocation {
                location_id: Uuid::new_v4(),
                pantry_id,
                name: Some(name.to_string()),
                notes: notes.map(str::to_string),
                created_by_user: Some(user_id),
                created_at: Some(Utc::now()),
            })
            .await?;

        info!("Added location {} to pantry {pantry_id}.", location.location_id);
        self.changes
            .notify_changed(DataScope::Locations, Some(group_id));
        Ok(location)
    }

    pub async fn update_location(
        &self,
        group_id: Uuid,
        location_id: Uuid,
        name: &str,
        notes: Option<&str>,
    ) -> AppResult<PantryLocation> {
        let mut location = self.household_location(group_id, location_id).await?;
        location.name = Some(name.to_string());
        location.notes = notes.map(str::to_string);

        let location = self
            .supabase
            .from::<PantryLocation>()
            .update_row(&location)
            .await?;
        self.changes
            .notify_changed(DataScope::Locations, Some(group_id));
        Ok(location)
    }

    pub async fn delete_location(&self, group_id: Uuid, location_id: Uuid) -> AppResult<()> {
        let location = self.household_location(group_id, location_id).await?;
        self.supabase
            .from::<PantryLocation>()
            .delete_row(&location)
            .await?;

        info!("Deleted location {location_id}.");
        self.changes
            .notify_changed(DataScope::Locations, Some(group_id));
        Ok(())
    }

    /// Inventory of the location whose name slugs to `slug`
    pub async fn items_for_location(
        &self,
        group_id: Uuid,
        slug: &str,
    ) -> AppResult<Vec<InventoryDisplayItem>> {
        let pantries = self.pantries(group_id).await?;
        let locations = self.locations_of(&pantries).await?;
        let location = locations
            .iter()
            .find(|l| slugify(&name_or_unnamed(l.name.as_deref())) == slug)
            .ok_or_else(|| AppError::not_found("location"))?;

        let items = self
            .supabase
            .from::<InventoryItem>()
            .eq("location_id", location.location_id)
            .get()
            .await?;
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let catalog: HashMap<Uuid, CatalogItem> = {
            let ids: Vec<Uuid> = items.iter().filter_map(|i| i.item_id).collect();
            if ids.is_empty() {
                HashMap::new()
            } else {
                self.supabase
                    .from::<CatalogItem>()
                    .is_in("item_id", ids)
                    .get()
                    .await?
                    .into_iter()
                    .map(|c| (c.item_id, c))
                    .collect()
            }
        };
        let categories: HashMap<Uuid, String> = self
            .categories(group_id)
            .await?
            .into_iter()
            .filter_map(|c| c.name.map(|name| (c.category_id, name)))
            .collect();

        let mut display: Vec<InventoryDisplayItem> = items
            .into_iter()
            .map(|item| {
                let entry = item.item_id.and_then(|id| catalog.get(&id));
                let name = item
                    .custom_name
                    .as_deref()
                    .filter(|n| !n.trim().is_empty())
                    .or(entry.map(|c| c.name.as_str()))
                    .unwrap_or(UNNAMED)
                    .trim()
                    .to_string();
                let category = entry
                    .and_then(|c| c.category_id)
                    .and_then(|id| categories.get(&id).cloned())
                    .unwrap_or_else(|| UNCATEGORIZED.to_string());
                let description = item
                    .notes
                    .clone()
                    .filter(|n| !n.trim().is_empty())
                    .or_else(|| entry.and_then(|c| c.description.clone()))
                    .unwrap_or_default();

                InventoryDisplayItem {
                    id: item.inventory_id.to_string(),
                    name,
                    amount: format_amount(item.quantity, &item.unit),
                    category,
                    description,
                }
            })
            .collect();
        display.sort_by_cached_key(|d| d.name.to_lowercase());
        Ok(display)
    }

    /// Item categories of the household by name
    pub async fn categories(&self, group_id: Uuid) -> AppResult<Vec<ItemCategory>> {
        let mut categories = self
            .supabase
            .from::<ItemCategory>()
            .eq("group_id", group_id)
            .get()
            .await?;
        categories.sort_by(|a, b| by_name(&a.name, &b.name));
        Ok(categories)
    }

    pub async fn add_category(
        &self,
        group_id: Uuid,
        user_id: Uuid,
        name: &str,
    ) -> AppResult<ItemCategory> {
        let category = self
            .supabase
            .from::<ItemCategory>()
            .insert(&ItemCategory {
                category_id: Uuid::new_v4(),
                group_id,
                name: Some(name.trim().to_string()),
                created_by_user: Some(user_id),
                created_at: Some(Utc::now()),
            })
            .await?;
        self.changes
            .notify_changed(DataScope::Categories, Some(group_id));
        Ok(category)
    }

    async fn locations_of(&self, pantries: &[Pantry]) -> AppResult<Vec<PantryLocation>> {
        if pantries.is_empty() {
            return Ok(Vec::new());
        }
        let mut locations = self
            .supabase
            .from::<PantryLocation>()
            .is_in("pantry_id", pantries.iter().map(|p| p.pantry_id))
            .get()
            .await?;
        locations.sort_by(|a, b| by_name(&a.name, &b.name));
        Ok(locations)
    }

    /// A location, only if it sits in one of the household's pantries
    async fn household_location(&self, group_id: Uuid, location_id: Uuid) -> AppResult<PantryLocation> {
        let location = self
            .supabase
            .from::<PantryLocation>()
            .eq("location_id", location_id)
            .first()
            .await?
            .ok_or_else(|| AppError::not_found("location"))?;

        let pantries = self.pantries(group_id).await?;
        if !pantries.iter().any(|p| p.pantry_id == location.pantry_id) {
            return Err(AppError::not_found("location"));
        }
        Ok(location)
    }
}
