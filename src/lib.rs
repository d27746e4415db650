/*!
# Household Pantry

A web application for households to share a pantry inventory and a shopping
list, built in Rust on top of a Supabase project.

## Overview

Users sign up and sign in with email and password against Supabase auth. On
first sign-in every user gets a profile row and a household of their own
("Ann Lee's Household"). Members of a household share its pantries, storage
locations, item categories and a weekly shopping list.

## Architecture

### Web Layer (feature `web`)
- **Technologies**: axum, handlebars, encrypted cookies
- **Key Components**:
  - Login, signup and logout endpoints with antiforgery tokens
  - Authentication middleware that restores the Supabase session of each request
  - JSON API for settings, households, shopping list and pantry
  - Server-sent events announcing data changes to the members of a household

### Service Layer
- Household provisioning and profile reconciliation
- Shopping list and pantry services over PostgREST tables
- In-memory change bus and inventory location scaffold

### Supabase Client
- Auth (GoTrue) calls: sign-in, sign-up, refresh, sign-out, password change
- Typed row queries with filters, ordering and representation returns
- One session per request; sessions never leak between users

## Modules

- **config**: Command line and environment settings
- **text**: Display-name, email masking and return-url helpers
- **models**: Table rows and view models
- **jwt**: Unverified access-token claims
- **supabase**: Auth and row client
- **principal**: Claims carried in the auth cookie
- **identity**: Reconciliation of cookie claims with the Supabase session
- **household**: Profile and household provisioning
- **user_context**: Read-only user view and profile settings
- **auth_state**: Authentication state of a long-lived Supabase handle
- **changes**: Data change notifications
- **shopping**: Shopping list
- **pantry**: Pantries, locations, inventory and categories
- **inventory**: In-memory location editor store
- **forms**: Validated request payloads
- **login**, **api**, **app**: Web endpoints and routing

## Configuration

| Variable | Meaning |
|----------|---------|
| `SUPABASE_URL` | Project url |
| `SUPABASE_ANON_KEY` | Public anon key |
| `PANTRY_BIND` | Listen address (default `127.0.0.1:3000`) |
| `PANTRY_COOKIE_SECRET` | Cookie encryption secret, 64+ bytes |
| `PANTRY_SECURE_COOKIES` | Mark the auth cookie `Secure` |
| `PANTRY_SESSION_DAYS` | Auth cookie lifetime |
| `PANTRY_STATIC_DIR` | Directory served under `/static` |
| `SUPABASE_TIMEOUT_SECS` | Timeout of Supabase requests |

Logging goes through `env_logger`; set `RUST_LOG=info` to see it.
*/

pub mod auth_state;
pub mod changes;
pub mod config;
pub mod error;
pub mod forms;
pub mod household;
pub mod identity;
pub mod inventory;
pub mod jwt;
pub mod models;
pub mod pantry;
pub mod principal;
pub mod shopping;
pub mod supabase;
pub mod text;
pub mod user_context;

#[cfg(feature = "web")]
pub mod api;
#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod login;

pub use config::Settings;
pub use error::{AppError, AppResult};
