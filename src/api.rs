//! JSON endpoints behind [`require_auth`](crate::login::require_auth).

use crate::app::AppState;
use crate::changes::DataChange;
use crate::error::{AppError, AppResult};
use crate::forms::{
    HouseholdForm, JoinHouseholdForm, ListItemAddForm, ListItemUpdateForm, LocationForm,
    NameForm, NewListItem, NewLocationForm, PasswordForm, ProfileForm,
};
use crate::household::{HouseholdContext, HouseholdContextService, HouseholdMember};
use crate::login::RequestScope;
use crate::models::{
    AppUser, CatalogItem, Group, InventoryDisplayItem, InventoryEditLocationRow, InventoryLocationDto,
    ItemCategory, ListItemRow, ListRow, Pantry, PantryLocation, SidebarPantrySection,
};
use crate::pantry::PantryService;
use crate::principal::Principal;
use crate::shopping::ShoppingListService;
use crate::user_context::{UserContext, UserContextService};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{self, Stream};
use log::debug;
use serde::Serialize;
use std::convert::Infallible;
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

/// The household shopping list with its items
#[derive(Debug, Serialize)]
pub struct ShoppingListView {
    pub list: ListRow,
    pub items: Vec<ListItemRow>,
}

fn households(state: &AppState, scope: &RequestScope) -> HouseholdContextService {
    HouseholdContextService::new(
        scope.supabase.clone(),
        scope.principal.clone(),
        state.changes.clone(),
    )
}

async fn household(state: &AppState, scope: &RequestScope) -> AppResult<HouseholdContext> {
    households(state, scope)
        .ensure_for_principal(None)
        .await
}

fn pantry_service(state: &AppState, scope: &RequestScope) -> PantryService {
    PantryService::new(scope.supabase.clone(), state.changes.clone())
}

pub async fn me(
    State(state): State<AppState>,
    Extension(scope): Extension<RequestScope>,
) -> AppResult<Json<UserContext>> {
    let users = UserContextService::new(
        scope.supabase.clone(),
        scope.principal.clone(),
        state.changes.clone(),
    );
    let context = users
        .get_for_claims(
            scope.principal.user_id_claim(),
            scope.principal.email_claim(),
            None,
        )
        .await?;
    Ok(Json(context))
}

pub async fn context(
    State(state): State<AppState>,
    Extension(scope): Extension<RequestScope>,
) -> AppResult<Json<HouseholdContext>> {
    Ok(Json(household(&state, &scope).await?))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(scope): Extension<RequestScope>,
    Json(form): Json<ProfileForm>,
) -> AppResult<(Extension<Principal>, Json<AppUser>)> {
    let (display_name, email) = form.validate()?;
    let context = household(&state, &scope).await?;
    let users = UserContextService::new(
        scope.supabase.clone(),
        scope.principal.clone(),
        state.changes.clone(),
    );
    let update = users
        .update_profile(
            context.user.user_id,
            Some(context.group.group_id),
            &display_name,
            &email,
        )
        .await?;
    // require_auth stores the principal with the new email claim
    Ok((Extension(update.principal), Json(update.user)))
}

pub async fn change_password(
    State(state): State<AppState>,
    Extension(scope): Extension<RequestScope>,
    Json(form): Json<PasswordForm>,
) -> AppResult<StatusCode> {
    let password = form.validate()?;
    let users = UserContextService::new(
        scope.supabase.clone(),
        scope.principal.clone(),
        state.changes.clone(),
    );
    users.change_password(password).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn rename_household(
    State(state): State<AppState>,
    Extension(scope): Extension<RequestScope>,
    Json(form): Json<HouseholdForm>,
) -> AppResult<Json<Group>> {
    let name = form.validate()?;
    let context = household(&state, &scope).await?;
    let group = households(&state, &scope)
        .rename_household(context.group.group_id, &name)
        .await?;
    Ok(Json(group))
}

pub async fn join_household(
    State(state): State<AppState>,
    Extension(scope): Extension<RequestScope>,
    Json(form): Json<JoinHouseholdForm>,
) -> AppResult<Json<Group>> {
    let context = household(&state, &scope).await?;
    let group = households(&state, &scope)
        .join_household(context.user.user_id, form.group_id)
        .await?;
    Ok(Json(group))
}

pub async fn members(
    State(state): State<AppState>,
    Extension(scope): Extension<RequestScope>,
) -> AppResult<Json<Vec<HouseholdMember>>> {
    let context = household(&state, &scope).await?;
    let members = households(&state, &scope)
        .members(context.group.group_id)
        .await?;
    Ok(Json(members))
}

/// Shopping list of the caller's household, plus the caller's user id
async fn shopping_list(
    state: &AppState,
    scope: &RequestScope,
) -> AppResult<(ShoppingListService, ListRow, Uuid)> {
    let context = household(state, scope).await?;
    let shopping = ShoppingListService::new(scope.supabase.clone());
    let list = shopping
        .get_or_create_shopping_list(context.group.group_id, context.user.user_id)
        .await?;
    Ok((shopping, list, context.user.user_id))
}

/// An item of the caller's list; items of other lists read as missing
async fn list_item(
    shopping: &ShoppingListService,
    list: &ListRow,
    list_item_id: Uuid,
) -> AppResult<ListItemRow> {
    shopping
        .item(list_item_id)
        .await?
        .filter(|item| item.list_id == list.list_id)
        .ok_or_else(|| AppError::not_found("list item"))
}

pub async fn shopping(
    State(state): State<AppState>,
    Extension(scope): Extension<RequestScope>,
) -> AppResult<Json<ShoppingListView>> {
    let (shopping, list, _) = shopping_list(&state, &scope).await?;
    let items = shopping.items(list.list_id).await?;
    Ok(Json(ShoppingListView { list, items }))
}

pub async fn add_list_item(
    State(state): State<AppState>,
    Extension(scope): Extension<RequestScope>,
    Json(form): Json<ListItemAddForm>,
) -> AppResult<(StatusCode, Json<ListItemRow>)> {
    let new_item = form.validate()?;
    let (shopping, list, user_id) = shopping_list(&state, &scope).await?;
    let unit = form.unit.as_deref();

    let row = match new_item {
        NewListItem::Catalog(item_id) => {
            shopping
                .add_catalog(list.list_id, user_id, item_id, form.quantity, unit)
                .await?
        }
        NewListItem::Custom(name) => {
            shopping
                .add_custom(list.list_id, user_id, &name, form.quantity, unit)
                .await?
        }
    };
    Ok((StatusCode::CREATED, Json(row)))
}

pub async fn toggle_list_item(
    State(state): State<AppState>,
    Extension(scope): Extension<RequestScope>,
    Path(item): Path<Uuid>,
) -> AppResult<Json<ListItemRow>> {
    let (shopping, list, _) = shopping_list(&state, &scope).await?;
    let row = list_item(&shopping, &list, item).await?;
    Ok(Json(shopping.toggle_checked(&row).await?))
}

pub async fn update_list_item(
    State(state): State<AppState>,
    Extension(scope): Extension<RequestScope>,
    Path(item): Path<Uuid>,
    Json(form): Json<ListItemUpdateForm>,
) -> AppResult<Json<ListItemRow>> {
    let (shopping, list, _) = shopping_list(&state, &scope).await?;
    let row = list_item(&shopping, &list, item).await?;
    let row = shopping
        .update_qty_unit(&row, form.quantity, form.unit.as_deref())
        .await?;
    Ok(Json(row))
}

pub async fn delete_list_item(
    State(state): State<AppState>,
    Extension(scope): Extension<RequestScope>,
    Path(item): Path<Uuid>,
) -> AppResult<StatusCode> {
    let (shopping, list, _) = shopping_list(&state, &scope).await?;
    let row = list_item(&shopping, &list, item).await?;
    shopping.delete(&row).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Catalog ordered by name
pub async fn catalog(Extension(scope): Extension<RequestScope>) -> AppResult<Json<Vec<CatalogItem>>> {
    let shopping = ShoppingListService::new(scope.supabase.clone());
    let mut items: Vec<CatalogItem> = shopping.catalog_map().await?.into_values().collect();
    items.sort_by_cached_key(|c| c.name.to_lowercase());
    Ok(Json(items))
}

pub async fn pantries(
    State(state): State<AppState>,
    Extension(scope): Extension<RequestScope>,
) -> AppResult<Json<Vec<Pantry>>> {
    let context = household(&state, &scope).await?;
    let pantries = pantry_service(&state, &scope)
        .pantries(context.group.group_id)
        .await?;
    Ok(Json(pantries))
}

pub async fn add_pantry(
    State(state): State<AppState>,
    Extension(scope): Extension<RequestScope>,
    Json(form): Json<NameForm>,
) -> AppResult<(StatusCode, Json<Pantry>)> {
    let name = form.validate("pantry name")?;
    let context = household(&state, &scope).await?;
    let pantry = pantry_service(&state, &scope)
        .add_pantry(context.group.group_id, &name)
        .await?;
    Ok((StatusCode::CREATED, Json(pantry)))
}

pub async fn sidebar(
    State(state): State<AppState>,
    Extension(scope): Extension<RequestScope>,
) -> AppResult<Json<Vec<SidebarPantrySection>>> {
    let context = household(&state, &scope).await?;
    let sections = pantry_service(&state, &scope)
        .sidebar(context.group.group_id)
        .await?;
    Ok(Json(sections))
}

pub async fn location_rows(
    State(state): State<AppState>,
    Extension(scope): Extension<RequestScope>,
) -> AppResult<Json<Vec<InventoryEditLocationRow>>> {
    let context = household(&state, &scope).await?;
    let rows = pantry_service(&state, &scope)
        .location_rows(context.group.group_id)
        .await?;
    Ok(Json(rows))
}

pub async fn add_location(
    State(state): State<AppState>,
    Extension(scope): Extension<RequestScope>,
    Json(form): Json<NewLocationForm>,
) -> AppResult<(StatusCode, Json<PantryLocation>)> {
    let (name, notes) = form.location.validate()?;
    let context = household(&state, &scope).await?;
    let location = pantry_service(&state, &scope)
        .add_location(
            context.group.group_id,
            context.user.user_id,
            form.pantry_id,
            &name,
            notes.as_deref(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(location)))
}

pub async fn update_location(
    State(state): State<AppState>,
    Extension(scope): Extension<RequestScope>,
    Path(location): Path<Uuid>,
    Json(form): Json<LocationForm>,
) -> AppResult<Json<PantryLocation>> {
    let (name, notes) = form.validate()?;
    let context = household(&state, &scope).await?;
    let location = pantry_service(&state, &scope)
        .update_location(context.group.group_id, location, &name, notes.as_deref())
        .await?;
    Ok(Json(location))
}

pub async fn delete_location(
    State(state): State<AppState>,
    Extension(scope): Extension<RequestScope>,
    Path(location): Path<Uuid>,
) -> AppResult<StatusCode> {
    let context = household(&state, &scope).await?;
    pantry_service(&state, &scope)
        .delete_location(context.group.group_id, location)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Inventory of a location, addressed by its slug
pub async fn location_items(
    State(state): State<AppState>,
    Extension(scope): Extension<RequestScope>,
    Path(location): Path<String>,
) -> AppResult<Json<Vec<InventoryDisplayItem>>> {
    let context = household(&state, &scope).await?;
    let items = pantry_service(&state, &scope)
        .items_for_location(context.group.group_id, &location)
        .await?;
    Ok(Json(items))
}

pub async fn categories(
    State(state): State<AppState>,
    Extension(scope): Extension<RequestScope>,
) -> AppResult<Json<Vec<ItemCategory>>> {
    let context = household(&state, &scope).await?;
    let categories = pantry_service(&state, &scope)
        .categories(context.group.group_id)
        .await?;
    Ok(Json(categories))
}

pub async fn add_category(
    State(state): State<AppState>,
    Extension(scope): Extension<RequestScope>,
    Json(form): Json<NameForm>,
) -> AppResult<(StatusCode, Json<ItemCategory>)> {
    let name = form.validate("category name")?;
    let context = household(&state, &scope).await?;
    let category = pantry_service(&state, &scope)
        .add_category(context.group.group_id, context.user.user_id, &name)
        .await?;
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn inventory_locations(State(state): State<AppState>) -> Json<Vec<InventoryLocationDto>> {
    Json(state.inventory.locations())
}

pub async fn inventory_location(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<InventoryLocationDto>> {
    state
        .inventory
        .location(&id)
        .map(Json)
        .ok_or_else(|| AppError::not_found("location"))
}

pub async fn save_inventory_location(
    State(state): State<AppState>,
    Json(dto): Json<InventoryLocationDto>,
) -> AppResult<Json<InventoryLocationDto>> {
    Ok(Json(state.inventory.save_location(dto)?))
}

pub async fn delete_inventory_location(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> StatusCode {
    state.inventory.delete_location(&id);
    StatusCode::NO_CONTENT
}

fn change_event(change: &DataChange) -> Event {
    let event = Event::default().event(change.scope.as_str());
    match serde_json::to_string(change) {
        Ok(data) => event.data(data),
        Err(_) => event.data(change.scope.as_str()),
    }
}

/// Server-sent events for data changes of the caller's household
pub async fn events(
    State(state): State<AppState>,
    Extension(scope): Extension<RequestScope>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let context = household(&state, &scope).await?;
    let group_id = Some(context.group.group_id);
    let receiver = state.changes.subscribe();

    let stream = stream::unfold(receiver, move |mut receiver| async move {
        loop {
            match receiver.recv().await {
                Ok(change) if change.visible_to(group_id) => {
                    return Some((Ok(change_event(&change)), receiver));
                }
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    debug!("Change stream lagged, skipped {skipped} events.");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
